//! End-to-end behavior of the grammar pipeline: DSL → compiled grammar → parse tree

use regex::Regex;
use regram::regram::{
    build_tree, parse_grammar, CompiledGrammar, DslError, GrammarError, ParseNode,
    RuleDescription,
};
use rstest::rstest;

fn compile(source: &str) -> CompiledGrammar {
    parse_grammar(source)
        .expect("grammar to parse")
        .compile()
        .expect("grammar to compile")
}

fn child_names(node: &ParseNode) -> Vec<&str> {
    node.children.iter().map(ParseNode::rule_name).collect()
}

#[test]
fn number_is_a_repetition_of_digits() {
    let grammar = compile("digit := {[0-9]}\nnumber := digit+\n");
    let tree = build_tree(&grammar, "42").unwrap();

    assert_eq!(child_names(&tree), vec!["number"]);
    let number = &tree.children[0];
    assert_eq!(number.text, "42");
    assert_eq!(child_names(number), vec!["digit", "digit"]);
    assert_eq!(number.children[0].text, "4");
    assert_eq!(number.children[1].text, "2");
}

#[test]
fn choice_keeps_the_taken_alternative() {
    let grammar = compile("yes := {yes}\nno := {no}\nanswer := yes | no\n");
    let tree = build_tree(&grammar, "no").unwrap();

    assert_eq!(child_names(&tree), vec!["answer"]);
    let answer = &tree.children[0];
    assert_eq!(child_names(answer), vec!["no"]);
    assert_eq!(answer.children[0].span, 0..2);
}

#[test]
fn class_escapes_match_real_whitespace() {
    let grammar = compile("ws := {[\\n\\t]}\n");
    let pattern = grammar.regex_of("ws").unwrap();
    let regex = Regex::new(&format!("^{pattern}$")).unwrap();

    assert!(regex.is_match("\n"));
    assert!(regex.is_match("\t"));
    assert!(!regex.is_match("n"));
    assert!(!regex.is_match("t"));
}

#[test]
fn unknown_rule_has_no_regex() {
    let grammar = compile("digit := {[0-9]}\n");
    assert_eq!(grammar.regex_of("letter"), None);
    assert_eq!(grammar.direct_regex_of("letter"), None);
}

#[test]
fn malformed_line_is_a_syntax_error() {
    match parse_grammar("foo->bar\n") {
        Err(DslError::Syntax(error)) => {
            assert_eq!(error.line_number, 1);
            assert_eq!(error.line, "foo->bar");
        }
        other => panic!("Expected a syntax error, got {other:?}"),
    }
}

#[test]
fn grammar_file_round_trips_through_canonical_form() {
    let source = "\
# key/value lines
pair := key {\\s*=\\s*} value
key := {[A-Za-z_][A-Za-z0-9_]*}
value := number | word
number := digit{1,3}
digit := {[0-9]}
word := {[a-z]+}
";
    let grammar = parse_grammar(source).unwrap();
    let canonical: String = grammar
        .rules()
        .iter()
        .map(|rule| format!("{rule}\n"))
        .collect();
    assert_eq!(parse_grammar(&canonical).unwrap(), grammar);
}

#[test]
fn key_value_line_is_fully_structured() {
    let grammar = compile(
        "pair := key {\\s*=\\s*} value\n\
         key := {[A-Za-z_][A-Za-z0-9_]*}\n\
         value := number | flag\n\
         number := digit{1,3}\n\
         digit := {[0-9]}\n\
         flag := {on|off}\n",
    );
    let tree = build_tree(&grammar, "depth = 128").unwrap();

    let pair = &tree.children[0];
    assert_eq!(pair.rule_name(), "pair");
    assert_eq!(child_names(pair), vec!["key", "value"]);
    assert_eq!(pair.children[0].text, "depth");

    let value = &pair.children[1];
    assert_eq!(value.span, 8..11);
    assert_eq!(child_names(value), vec!["number"]);
    assert_eq!(value.find_all("digit").count(), 3);
}

#[test]
fn unexplained_input_falls_back_to_start_rule_matches() {
    let grammar = compile("word := {[a-z]+}\nnumber := digit+\ndigit := {[0-9]}\n");
    let tree = build_tree(&grammar, "one, two; three").unwrap();

    let words: Vec<_> = tree.children.iter().map(|n| n.text.as_str()).collect();
    assert_eq!(words, vec!["one", "two", "three"]);
    assert!(tree.children.iter().all(ParseNode::is_leaf));
}

#[rstest]
#[case("list := item*\n", "item")]
#[case("pair := key {=} value\nkey := {k}\n", "value")]
#[case("either := a | b\na := {a}\n", "b")]
fn references_must_resolve(#[case] source: &str, #[case] missing: &str) {
    match parse_grammar(source).unwrap().compile() {
        Err(GrammarError::UnknownRuleReference { reference, .. }) => assert_eq!(reference, missing),
        other => panic!("Expected UnknownRuleReference, got {other:?}"),
    }
}

#[test]
fn self_reference_is_a_cycle() {
    let error = parse_grammar("list := item list\nitem := {x}\n")
        .unwrap()
        .compile()
        .unwrap_err();
    assert_eq!(
        error,
        GrammarError::CyclicReference {
            path: vec!["list".into(), "list".into()]
        }
    );
}

#[test]
fn root_node_wraps_the_whole_input() {
    let grammar = compile("word := {[a-z]+}\n");
    let tree = build_tree(&grammar, "ab\ncd").unwrap();

    assert!(tree.is_root());
    assert_eq!(tree.rule_name(), "");
    assert!(matches!(tree.rule.description, RuleDescription::Literal { .. }));
    assert_eq!(tree.span, 0..5);
    assert_eq!(tree.text, "ab\ncd");
}
