mod helpers;

use helpers::{compile, reference};
use sigcond_parser::{
    AggregationFunction, Combinator, ComparisonOperator, ConditionNode, ParseOptions, SearchValue,
    parse_rules_directory, parse_rules_file, parse_rules_path, parse_rules_yaml,
};

fn sub(node: ConditionNode) -> ConditionNode {
    ConditionNode::subexpression(node)
}

// =============================================================================
// Search expressions against a YAML detection
// =============================================================================

#[test]
fn selection_and_not_filter() {
    let parsed = compile("selection and not filter_system");
    assert_eq!(
        parsed.search,
        Combinator::And.combine(
            reference("Image", r"\cmd.exe"),
            ConditionNode::not(reference("User", "SYSTEM")),
        )
    );
    assert!(parsed.aggregation.is_none());
}

#[test]
fn one_of_filters_wraps_each_definition() {
    let parsed = compile("selection and not 1 of filter_*");
    let filters = sub(ConditionNode::Or(vec![
        sub(ConditionNode::field_match("User", SearchValue::String("SYSTEM".into()))),
        sub(ConditionNode::field_match(
            "User",
            SearchValue::String("LOCAL SERVICE".into()),
        )),
    ]));
    assert_eq!(
        parsed.search,
        Combinator::And.combine(reference("Image", r"\cmd.exe"), ConditionNode::not(filters))
    );
}

#[test]
fn all_of_keywords_uses_and() {
    let parsed = compile("all of keywords");
    let ConditionNode::Subexpression(inner) = &parsed.search else {
        panic!("expected subexpression, got {}", parsed.search);
    };
    assert!(matches!(**inner, ConditionNode::And(ref v) if v.len() == 2));
}

#[test]
fn all_of_them_covers_every_definition() {
    let parsed = compile("all of them");
    let ConditionNode::Subexpression(inner) = &parsed.search else {
        panic!("expected subexpression, got {}", parsed.search);
    };
    assert_eq!(inner.operands().len(), 5);
}

#[test]
fn precedence_and_binds_tighter_than_or() {
    let a = compile("selection or selection_ps and not filter_system");
    let b = compile("selection or (selection_ps and not filter_system)");
    assert_eq!(a.to_string(), b.to_string());
    assert!(matches!(a.search, ConditionNode::Or(_)));
}

#[test]
fn keywords_are_case_insensitive() {
    let lower = compile("selection and not 1 of filter_*");
    let upper = compile("selection AND NOT 1 OF filter_*");
    assert_eq!(lower, upper);
}

#[test]
fn multi_line_condition() {
    let parsed = compile("selection\n    and not filter_system\n    and not filter_service");
    assert_eq!(
        parsed.to_string(),
        r#"((Image="\\cmd.exe" and not User="SYSTEM") and not User="LOCAL SERVICE")"#
    );
}

// =============================================================================
// Aggregations
// =============================================================================

#[test]
fn count_by_group() {
    let parsed = compile("selection | count() by host > 5");
    let agg = parsed.aggregation.expect("aggregation");
    assert_eq!(agg.function, AggregationFunction::Count);
    assert_eq!(agg.group_by.as_deref(), Some("host"));
    assert_eq!(agg.comparator, Some(ComparisonOperator::Gt));
    assert_eq!(agg.threshold.as_deref(), Some("5"));
    assert_eq!(parsed.search, reference("Image", r"\cmd.exe"));
}

#[test]
fn near_with_exclusion() {
    let parsed = compile("selection | near selection and selection_ps and not filter_system");
    let agg = parsed.aggregation.expect("aggregation");
    assert_eq!(agg.function, AggregationFunction::Near);
    assert_eq!(agg.include, ["selection", "selection_ps"]);
    assert_eq!(agg.exclude, ["filter_system"]);
    assert_eq!(
        agg.to_string(),
        "near selection and selection_ps and not filter_system"
    );
}

#[test]
fn aggregation_serializes_to_json() {
    let parsed = compile("selection | max(duration) by user <= 30");
    let json = serde_json::to_value(&parsed).unwrap();
    assert_eq!(json["aggregation"]["function"], "max");
    assert_eq!(json["aggregation"]["comparator"], "<=");
    assert_eq!(json["aggregation"]["field"], "duration");
}

// =============================================================================
// Rule documents
// =============================================================================

const RULES: &str = r#"
title: Suspicious Shell
id: 5f2a
detection:
    selection:
        Image|endswith:
            - '\cmd.exe'
            - '\powershell.exe'
    filter:
        ParentImage: null
    condition: selection and not filter
---
title: Brute Force
detection:
    selection:
        EventID: 4625
    timeframe: 10m
    condition:
        - selection | count() by TargetUserName > 10
        - selection and
"#;

#[test]
fn rule_set_compiles_every_condition() {
    let set = parse_rules_yaml(RULES).unwrap();
    assert!(set.errors.is_empty(), "{:?}", set.errors);
    assert_eq!(set.len(), 2);

    let first = set.rules[0].detection.compile_conditions(ParseOptions::default());
    let first = first[0].as_ref().unwrap();
    assert_eq!(
        first.to_string(),
        r#"((Image|endswith="\\cmd.exe" or Image|endswith="\\powershell.exe") and not ParentImage is null)"#
    );

    let second = set.rules[1].detection.compile_conditions(ParseOptions::default());
    assert_eq!(second.len(), 2);
    assert!(second[0].is_ok());
    assert!(second[1].is_err());
    assert_eq!(set.rules[1].detection.timeframe(), Some("10m"));
}

#[test]
fn integer_values_stay_integers() {
    let set = parse_rules_yaml(RULES).unwrap();
    let compiled = set.rules[1].detection.compile_conditions(ParseOptions::default());
    let search = &compiled[0].as_ref().unwrap().search;
    assert_eq!(
        *search,
        sub(ConditionNode::field_match("EventID", SearchValue::Integer(4625)))
    );
}

#[test]
fn rule_file_and_directory_loading() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("windows");
    std::fs::create_dir(&nested).unwrap();
    std::fs::write(dir.path().join("a.yml"), RULES).unwrap();
    std::fs::write(nested.join("b.yaml"), "title: Broken\n").unwrap();
    std::fs::write(nested.join("notes.txt"), "not a rule").unwrap();

    let file = parse_rules_file(&dir.path().join("a.yml")).unwrap();
    assert_eq!(file.len(), 2);

    let all = parse_rules_directory(dir.path()).unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all.errors.len(), 1);

    let via_path = parse_rules_path(dir.path()).unwrap();
    assert_eq!(via_path, all);
}

#[test]
fn missing_rule_file_is_an_error() {
    let err = parse_rules_file(std::path::Path::new("/nonexistent/rule.yml")).unwrap_err();
    assert_eq!(err.kind(), sigcond_parser::ErrorKind::Document);
}
