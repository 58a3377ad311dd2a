//! End-to-end tests for the built-in ArkTS language

use arkparse::testing::check_span_coverage;
use arkparse::{Edit, Parser, SyntaxNode, SyntaxTree, arkts};

fn parser() -> Parser {
    Parser::new(arkts::language().clone())
}

fn parse(text: &str) -> SyntaxTree {
    let tree = parser().parse(text).unwrap();
    check_span_coverage(&tree, text.as_bytes()).unwrap();
    tree
}

fn statements(tree: &SyntaxTree) -> Vec<SyntaxNode> {
    tree.root_node().named_children().filter(|node| !node.is_extra()).collect()
}

/// Non-extra tokens in document order.
fn tokens(tree: &SyntaxTree) -> Vec<SyntaxNode> {
    tree.walk().preorder().filter(|node| node.is_token() && !node.is_extra()).collect()
}

#[test]
fn test_variable_declaration_fields() {
    let tree = parse("let x = 1;");
    assert!(!tree.has_error());
    assert_eq!(tree.to_sexp(), "(program (variable_declaration name: (identifier) value: (number)))");

    let declaration = &statements(&tree)[0];
    assert_eq!(declaration.kind_name(), "variable_declaration");
    assert_eq!(declaration.field("name").unwrap().text(), "x");
    assert_eq!(declaration.field("value").unwrap().text(), "1");
    assert_eq!(declaration.byte_range().to_std(), 0..10);
}

#[test]
fn test_missing_semicolon_at_end_of_input() {
    let tree = parse("let x = 1");
    let errors = tree.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].missing);
    assert_eq!(errors[0].kind, ";");
    assert_eq!(errors[0].range.start().to_usize(), 9);
    assert!(errors[0].range.is_empty());
    assert_eq!(
        tree.to_sexp(),
        "(program (variable_declaration name: (identifier) value: (number) (MISSING \";\")))"
    );
}

#[test]
fn test_reparse_keeps_tokens_before_edit() {
    let parser = parser();
    let old = parser.parse("let x = 1;").unwrap();
    let mut text = String::from("let x = 1;");
    let edit = Edit::apply(&mut text, 8..9, "42");
    assert_eq!(text, "let x = 42;");

    let new = parser.reparse(&old, &[edit], &text).unwrap();
    assert_eq!(new, parser.parse(&text).unwrap());
    assert_eq!(new.revision(), old.revision() + 1);

    let before = tokens(&old);
    let after = tokens(&new);
    for index in 0..3 {
        assert!(
            before[index].green().ptr_eq(after[index].green()),
            "token {:?} was not reused",
            after[index].text()
        );
    }
    assert_eq!(after[3].text(), "42");
    assert!(!before[3].green().ptr_eq(after[3].green()));
}

#[test]
fn test_unterminated_interpolation_is_contained() {
    let text = "let a = `x${b;\nlet c = 1;\n";
    let tree = parse(text);
    let errors = tree.errors();
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert!(!errors[0].missing);
    let range = errors[0].range.to_std();
    assert!(range.start <= 10 && range.end >= 12, "error at {range:?}");
    assert!(range.end <= 14, "error at {range:?}");

    let last = statements(&tree).pop().unwrap();
    assert_eq!(last.kind_name(), "variable_declaration");
    assert!(!last.has_error());
    assert_eq!(last.field("name").unwrap().text(), "c");
}

#[test]
fn test_automatic_semicolons() {
    let tree = parse("let x = 1\nlet y = x\n+ 2\nfoo();\n");
    assert!(!tree.has_error(), "{}", tree.to_sexp());
    let kinds: Vec<String> = statements(&tree).iter().map(|node| node.kind_name().to_owned()).collect();
    assert_eq!(kinds, ["variable_declaration", "variable_declaration", "expression_statement"]);
    let y = &statements(&tree)[1];
    assert_eq!(y.field("value").unwrap().kind_name(), "binary_expression");
}

#[test]
fn test_semicolon_before_closing_brace() {
    let tree = parse("function f() { return 1 }");
    assert!(!tree.has_error(), "{}", tree.to_sexp());
}

#[test]
fn test_operator_precedence() {
    let tree = parse("a = b + c * d(e);");
    assert_eq!(
        tree.to_sexp(),
        "(program (expression_statement (assignment_expression left: (identifier) right: \
         (binary_expression left: (identifier) right: (binary_expression left: (identifier) \
         right: (call_expression function: (identifier) (identifier)))))))"
    );
}

#[test]
fn test_left_associative_subtraction() {
    let tree = parse("a - b - c;");
    let statement = &statements(&tree)[0];
    let outer = statement.named_children().next().unwrap();
    assert_eq!(outer.field("left").unwrap().kind_name(), "binary_expression");
    assert_eq!(outer.field("right").unwrap().text(), "c");
}

#[test]
fn test_template_literal() {
    let tree = parse("let s = `a ${b + 1} c ${`nested ${d}`}`;");
    assert!(!tree.has_error(), "{}", tree.to_sexp());
    let template = statements(&tree)[0].field("value").unwrap();
    assert_eq!(template.kind_name(), "template_string");
    let substitutions = template.named_children().filter(|node| node.kind_name() == "template_substitution");
    assert_eq!(substitutions.count(), 2);
}

#[test]
fn test_struct_component() {
    let text = "\
@Entry
@Component
struct Index {
  @State message: string = 'Hello'

  build() {
    Column() {
      Text(this.message)
        .fontSize(50)
      if (this.message) {
        Button('Reset')
      }
    }
    .width('100%')
  }
}
";
    let tree = parse(text);
    assert!(!tree.has_error(), "{}", tree.to_sexp());
    let component = &statements(&tree)[0];
    assert_eq!(component.kind_name(), "component_declaration");
    assert_eq!(component.field("name").unwrap().text(), "Index");

    let body = component.field("body").unwrap();
    let build = body.named_children().find(|node| node.kind_name() == "build_method").unwrap();
    let column = build.field("body").unwrap().named_children().next().unwrap();
    assert_eq!(column.field("component").unwrap().text(), "Column");
    assert_eq!(column.named_children().filter(|node| node.kind_name() == "modifier").count(), 1);
}

#[test]
fn test_imports_and_exports() {
    let tree = parse(
        "import { a, b as c } from './mod';\nimport * as all from \"lib\"\nexport default a\nexport class K {}\n",
    );
    assert!(!tree.has_error(), "{}", tree.to_sexp());
    let kinds: Vec<String> = statements(&tree).iter().map(|node| node.kind_name().to_owned()).collect();
    assert_eq!(kinds, ["import_declaration", "import_declaration", "export_statement", "export_statement"]);
}

#[test]
fn test_keywords_prefix_identifiers() {
    let tree = parse("letter = 1;\nlet iffy = letter;");
    assert!(!tree.has_error(), "{}", tree.to_sexp());
    let statements = statements(&tree);
    assert_eq!(statements[0].kind_name(), "expression_statement");
    assert_eq!(statements[1].field("name").unwrap().text(), "iffy");
}

#[test]
fn test_error_is_local_to_statement() {
    let tree = parse("let a = 1;\nlet b = ) ;\nlet c = 3;\n");
    let errors = tree.errors();
    assert!(!errors.is_empty());
    for error in &errors {
        assert!(error.range.start().to_usize() >= 11 && error.range.end().to_usize() <= 22, "{errors:?}");
    }
    let names: Vec<String> = statements(&tree)
        .iter()
        .filter(|node| node.kind_name() == "variable_declaration" && !node.has_error())
        .map(|node| node.field("name").unwrap().text())
        .collect();
    assert_eq!(names, ["a", "c"]);
}

#[test]
fn test_error_points_use_lines_and_columns() {
    let tree = parse("let a = 1;\nlet b = 2");
    let error = &tree.errors()[0];
    assert_eq!((error.start.row, error.start.column), (1, 9));
}

#[test]
fn test_invalid_utf8_is_an_error_token() {
    let text = b"let a = \xff;";
    let tree = parser().parse_bytes(text).unwrap();
    assert!(tree.has_error());
    assert_eq!(tree.text_len().to_usize(), text.len());
}

#[test]
fn test_reparse_inside_template() {
    let parser = parser();
    let old_text = "let s = `a ${b} c`;\nlet t = 2;";
    let old = parser.parse(old_text).unwrap();
    let mut text = old_text.to_owned();
    let edit = Edit::apply(&mut text, 13..14, "bb + 1");
    let new = parser.reparse(&old, &[edit], &text).unwrap();
    assert_eq!(new, parser.parse(&text).unwrap());
    assert!(!new.has_error());
}

#[test]
fn test_edit_recorded_on_tree() {
    let parser = parser();
    let mut text = String::from("let x = 1;\nlet y = 2;");
    let old = parser.parse(&text).unwrap();
    let edit = Edit::apply(&mut text, 19..20, "22");
    let edited = edit.apply_to_tree(&old);
    assert_eq!(edited.pending_edits(), [edit]);

    let new = parser.reparse(&edited, &[], &text).unwrap();
    assert_eq!(new, parser.parse(&text).unwrap());
    let declaration = &statements(&new)[1];
    assert_eq!((declaration.end_point().row, declaration.end_point().column), (1, 11));
}

fn assert_clean(text: &str) -> SyntaxTree {
    let tree = parse(text);
    assert!(!tree.has_error(), "{text:?} => {}", tree.to_sexp());
    tree
}

#[test]
fn test_object_literals_in_expression_position() {
    assert_eq!(
        assert_clean("let a = {x: 1};").to_sexp(),
        "(program (variable_declaration name: (identifier) value: (object (pair key: (identifier) value: (number)))))"
    );
    assert_clean("let o = {\n  a: 1,\n  b: [1, 2],\n};\n");
    assert_clean("x = { a: () => {} };");
    assert_clean("f({ a: 1 }, { b: { c: 2 } });\n");
    assert_clean("function f() { return {a: 1}; }");
    assert_clean("export default {a: 1};");
}

#[test]
fn test_statement_after_block() {
    let tree = assert_clean("if (a) {}\nb;");
    let kinds: Vec<String> = statements(&tree).iter().map(|node| node.kind_name().to_owned()).collect();
    assert_eq!(kinds, ["if_statement", "expression_statement"]);

    assert_clean("while (a) { b(); }\nc;\n");
    assert_clean("for (let i = 0; i < n; i++) {\n  f(i);\n}\ng();\n");
    assert_clean("if (a) { b; } else { c; }\nd;\n");
    assert_clean("function f() {\n  g();\n}\nf();\n");
    assert_clean("items.forEach((item) => {\n  log(item)\n})\n");
}

#[test]
fn test_ternary_expression() {
    assert_eq!(
        assert_clean("let x = a ? b : c;").to_sexp(),
        "(program (variable_declaration name: (identifier) value: (ternary_expression \
         condition: (identifier) consequence: (identifier) alternative: (identifier))))"
    );

    let tree = assert_clean("let y = a ? 1 : b ? 2 : 3;");
    let value = statements(&tree)[0].field("value").unwrap();
    assert_eq!(value.kind_name(), "ternary_expression");
    assert_eq!(value.field("alternative").unwrap().kind_name(), "ternary_expression");

    let tree = assert_clean("let f = ok ? () => 1 : () => 2;");
    let value = statements(&tree)[0].field("value").unwrap();
    assert_eq!(value.field("consequence").unwrap().kind_name(), "arrow_function");
}

#[test]
fn test_many_statements() {
    let text = "let a = 1;\n".repeat(100_000);
    let tree = assert_clean(&text);
    assert_eq!(statements(&tree).len(), 100_000);
    assert_eq!(tree, parser().parse(&text).unwrap());
}

#[test]
fn test_reparse_reuses_last_statement() {
    let parser = parser();
    let mut text = String::from("let x = 1;\nlet y = 2;\n");
    let old = parser.parse(&text).unwrap();
    let edit = Edit::apply(&mut text, 8..9, "10");
    let new = parser.reparse(&old, &[edit], &text).unwrap();
    assert_eq!(new, parser.parse(&text).unwrap());

    let before = statements(&old);
    let after = statements(&new);
    assert!(!before[0].green().ptr_eq(after[0].green()));
    assert!(before[1].green().ptr_eq(after[1].green()), "last statement was parsed again");

    // Appending changes what followed it, so it is rebuilt.
    let end = text.len();
    let edit = Edit::apply(&mut text, end..end, "z");
    let appended = parser.reparse(&new, &[edit], &text).unwrap();
    assert_eq!(appended, parser.parse(&text).unwrap());
}
