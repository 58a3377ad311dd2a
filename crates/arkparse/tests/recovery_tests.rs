//! Error recovery on a small statement grammar

use arkparse::testing::{assert_incremental_equivalent, check_span_coverage};
use arkparse::{Language, Parser, ParserConfig, SyntaxTree};
use std::sync::Arc;

const STATEMENTS: &str = r#"
    #![grammar(statements)]
    #![start(program)]
    #![recover(";", "}")]

    #[extra] @_ws = /\s+/;
    @name = /[a-z]+/;
    @number = /[0-9]+/;

    program = _statement*;
    _statement = assignment | block;
    assignment = target: name "=" value: _value ";";
    block = "{" _statement* "}";
    _value = name | number | call;
    call = callee: name "(" (_value ("," _value)*)? ")";
"#;

fn language() -> Arc<Language> {
    Arc::new(Language::from_grammar_source(STATEMENTS, None).unwrap())
}

fn parse_with(config: ParserConfig, text: &str) -> SyntaxTree {
    let tree = Parser::with_config(language(), config).parse(text).unwrap();
    check_span_coverage(&tree, text.as_bytes()).unwrap();
    tree
}

fn parse(text: &str) -> SyntaxTree {
    parse_with(ParserConfig::default(), text)
}

fn clean_assignments(tree: &SyntaxTree) -> Vec<String> {
    tree.walk()
        .preorder()
        .filter(|node| node.kind_name() == "assignment" && !node.has_error())
        .map(|node| node.field("target").unwrap().text())
        .collect()
}

#[test]
fn test_missing_token_is_inserted() {
    let tree = parse("a = 1 b = 2;");
    let errors = tree.errors();
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert!(errors[0].missing);
    assert_eq!(errors[0].kind, ";");
    assert_eq!(errors[0].range.start().to_usize(), 5);
}

#[test]
fn test_unexpected_tokens_are_skipped() {
    let tree = parse("a = 1;\nb = = 2;\nc = 3;");
    let errors = tree.errors();
    assert!(errors.iter().all(|error| (7..16).contains(&error.range.start().to_usize())), "{errors:?}");
    assert_eq!(clean_assignments(&tree), ["a", "c"]);
}

#[test]
fn test_error_inside_block_stays_inside() {
    let tree = parse("{ a = f(1,; b = 2; }\nc = 3;");
    assert!(tree.has_error());
    let block = tree.root_node().children().find(|node| node.kind_name() == "block").unwrap();
    assert!(block.has_error());
    assert!(clean_assignments(&tree).contains(&"c".to_owned()));
}

#[test]
fn test_garbage_becomes_error_nodes() {
    for text in [")))", "= = =", "{{{", "}}}", "a ( ( (", "1 2 3"] {
        let tree = parse(text);
        assert!(tree.has_error(), "{text:?}");
        assert_eq!(tree.text_len().to_usize(), text.len());
    }
}

#[test]
fn test_without_missing_insertions_recovery_skips() {
    let config = ParserConfig::new().with_max_missing_insertions(0);
    let tree = parse_with(config, "a = 1 b = 2;");
    let errors = tree.errors();
    assert!(errors.iter().all(|error| !error.missing), "{errors:?}");
    assert!(tree.has_error());
}

#[test]
fn test_single_stack_still_recovers() {
    let tree = parse_with(ParserConfig::new().with_max_stacks(1), "a = f(1, 2;\nb = 3;");
    assert!(tree.has_error());
    assert_eq!(clean_assignments(&tree), ["b"]);
}

#[test]
fn test_error_spans_follow_edits() {
    let parser = Parser::new(language());
    let broken = assert_incremental_equivalent(&parser, "a = 1;\nb = 2;\nc = 3;", 9..11, "= =");
    assert!(broken.has_error());
    let fixed = assert_incremental_equivalent(&parser, "a = 1;\nb = = 2;\nc = 3;", 9..11, "");
    assert!(!fixed.has_error(), "{}", fixed.to_sexp());
}

#[test]
fn test_node_budget_applies_during_recovery() {
    let text = ") ".repeat(500);
    let parser = Parser::with_config(language(), ParserConfig::new().with_node_budget(50));
    assert!(parser.parse(&text).is_err());
}
