#![allow(dead_code)]

use sigcond_parser::{
    ConditionError, ConditionNode, ConditionParser, DetectionContext, ParseOptions,
    ParsedCondition, SearchValue, parse_condition,
};

/// Detection section shared by the integration suites.
pub const DETECTION: &str = r#"
selection:
    Image: '\cmd.exe'
selection_ps:
    Image: '\powershell.exe'
filter_system:
    User: SYSTEM
filter_service:
    User: LOCAL SERVICE
keywords:
    - mimikatz
    - sekurlsa
condition: selection
"#;

pub fn context() -> DetectionContext {
    DetectionContext::from_yaml_str(DETECTION).unwrap()
}

pub fn compile(condition: &str) -> ParsedCondition {
    parse_condition(condition, &context())
        .unwrap_or_else(|e| panic!("'{condition}' failed to compile: {e}"))
}

pub fn compile_err(condition: &str) -> ConditionError {
    match parse_condition(condition, &context()) {
        Ok(parsed) => panic!("'{condition}' compiled unexpectedly to {parsed}"),
        Err(e) => e,
    }
}

pub fn compile_with(
    condition: &str,
    options: ParseOptions,
) -> Result<ParsedCondition, ConditionError> {
    ConditionParser::with_options(&context(), options).parse(condition)
}

/// Node a bare definition name compiles to.
pub fn reference(field: &str, value: &str) -> ConditionNode {
    ConditionNode::subexpression(ConditionNode::field_match(
        field,
        SearchValue::String(value.to_string()),
    ))
}
