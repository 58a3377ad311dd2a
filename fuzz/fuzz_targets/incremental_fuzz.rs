#![no_main]
use arkparse::testing::assert_incremental_equivalent;
use arkparse::{Parser, arkts};
use libfuzzer_sys::fuzz_target;

// Input layout: two bytes of edit position, one byte of removed length,
// then the document; the replacement is the document's first few chars.
fuzz_target!(|data: &[u8]| {
    let Some((header, rest)) = data.split_first_chunk::<3>() else {
        return;
    };
    let Ok(text) = std::str::from_utf8(rest) else {
        return;
    };

    let mut start = usize::from(u16::from_le_bytes([header[0], header[1]])) % (text.len() + 1);
    while !text.is_char_boundary(start) {
        start -= 1;
    }
    let mut end = (start + usize::from(header[2] % 16)).min(text.len());
    while !text.is_char_boundary(end) {
        end += 1;
    }
    let replacement: String = text.chars().take(usize::from(header[2] >> 4)).collect();

    let parser = Parser::new(arkts::language().clone());
    assert_incremental_equivalent(&parser, text, start..end, &replacement);
});
