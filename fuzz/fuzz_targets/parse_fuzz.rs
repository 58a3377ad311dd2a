#![no_main]
use arkparse::testing::check_span_coverage;
use arkparse::{Parser, arkts};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let parser = Parser::new(arkts::language().clone());
    let tree = parser.parse_bytes(data).unwrap();
    assert_eq!(tree.text_len().to_usize(), data.len());

    if std::str::from_utf8(data).is_ok()
        && let Err(violation) = check_span_coverage(&tree, data)
    {
        panic!("{violation}");
    }
    assert_eq!(parser.parse_bytes(data).unwrap(), tree);
});
