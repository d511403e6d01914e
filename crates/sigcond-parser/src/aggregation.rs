//! Finite-state parser for the aggregation clause after the pipe.
//!
//! Two shapes are accepted:
//! - `FUNC([field]) [by group] CMP value` for `count`, `min`, `max`, `avg`, `sum`
//! - `near id [and id ...] [and not id ...]`
//!
//! The machine has states 0–10; input must end in state −1 (numeric
//! functions) or 9 (`near`). Each transition names the attribute it fills,
//! the transform applied to the token text, and the next state.

use crate::ast::{AggregationDescriptor, AggregationFunction, ComparisonOperator};
use crate::error::{ConditionError, Result};
use crate::token::{Token, TokenKind};

type State = i8;

const INITIAL_STATE: State = 0;
const FINAL_STATES: [State; 2] = [-1, 9];

/// Parse the tokens following the pipe into an [`AggregationDescriptor`].
pub fn parse_aggregation(tokens: &[Token]) -> Result<AggregationDescriptor> {
    let mut parser = AggregationParser::new();
    for token in tokens {
        parser.step(token)?;
    }
    parser.finish()
}

// =============================================================================
// Transition table
// =============================================================================

/// Slot filled by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attribute {
    AggFunc,
    AggField,
    GroupField,
    CondOp,
    Condition,
}

/// Processing applied to a token before its value is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transform {
    AggFunc,
    FieldName,
    InitNear,
    StoreSearchId,
    SetInclude,
    SetExclude,
}

#[derive(Debug, Clone, Copy)]
struct Transition {
    attribute: Option<Attribute>,
    transform: Option<Transform>,
    next: State,
}

const fn to(attribute: Option<Attribute>, transform: Option<Transform>, next: State) -> Transition {
    Transition {
        attribute,
        transform,
        next,
    }
}

fn is_comparison(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Eq | TokenKind::Lt | TokenKind::Lte | TokenKind::Gt | TokenKind::Gte
    )
}

fn transition(state: State, kind: TokenKind) -> Option<Transition> {
    use Attribute as A;
    use TokenKind as K;
    use Transform as T;

    let t = match (state, kind) {
        (0, K::AggFunc) => to(Some(A::AggFunc), Some(T::AggFunc), 1),
        (0, K::Near) => to(Some(A::AggFunc), Some(T::InitNear), 8),
        (1, K::LParen) => to(None, None, 2),
        (2, K::RParen) => to(None, None, 4),
        (2, K::Identifier) => to(Some(A::AggField), Some(T::FieldName), 3),
        (3, K::RParen) => to(None, None, 4),
        (4, K::By) => to(None, None, 5),
        (4 | 6, k) if is_comparison(k) => to(Some(A::CondOp), None, 7),
        (5, K::Identifier) => to(Some(A::GroupField), Some(T::FieldName), 6),
        (7, K::Identifier) => to(Some(A::Condition), None, -1),
        (8, K::Identifier) => to(None, Some(T::StoreSearchId), 9),
        (9, K::And) => to(None, Some(T::SetInclude), 10),
        (9 | 10, K::Not) => to(None, Some(T::SetExclude), 8),
        (10, K::Identifier) => to(None, Some(T::StoreSearchId), 9),
        _ => return None,
    };
    Some(t)
}

// =============================================================================
// Machine
// =============================================================================

/// List that `near` identifiers are currently appended to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NearList {
    Include,
    Exclude,
}

enum Value {
    Text(String),
    Function(AggregationFunction),
}

struct AggregationParser {
    state: State,
    function: Option<AggregationFunction>,
    field: Option<String>,
    group_by: Option<String>,
    comparator: Option<ComparisonOperator>,
    threshold: Option<String>,
    include: Vec<String>,
    exclude: Vec<String>,
    current: NearList,
}

impl AggregationParser {
    fn new() -> Self {
        AggregationParser {
            state: INITIAL_STATE,
            function: None,
            field: None,
            group_by: None,
            comparator: None,
            threshold: None,
            include: Vec::new(),
            exclude: Vec::new(),
            current: NearList::Include,
        }
    }

    fn step(&mut self, token: &Token) -> Result<()> {
        let t = transition(self.state, token.kind).ok_or_else(|| {
            ConditionError::UnexpectedAggregationToken {
                text: token.text.clone(),
                position: token.position,
            }
        })?;

        let value = match t.transform {
            Some(transform) => self.apply(transform, token)?,
            None => Some(Value::Text(token.text.clone())),
        };
        if let (Some(attribute), Some(value)) = (t.attribute, value) {
            self.store(attribute, value, token)?;
        }

        self.state = t.next;
        Ok(())
    }

    fn apply(&mut self, transform: Transform, token: &Token) -> Result<Option<Value>> {
        match transform {
            Transform::AggFunc => lookup_function(token).map(|f| Some(Value::Function(f))),
            Transform::InitNear => {
                self.include.clear();
                self.exclude.clear();
                self.current = NearList::Include;
                lookup_function(token).map(|f| Some(Value::Function(f)))
            }
            Transform::FieldName => Ok(Some(Value::Text(token.text.clone()))),
            Transform::StoreSearchId => {
                let list = match self.current {
                    NearList::Include => &mut self.include,
                    NearList::Exclude => &mut self.exclude,
                };
                list.push(token.text.clone());
                Ok(Some(Value::Text(token.text.clone())))
            }
            Transform::SetInclude => {
                self.current = NearList::Include;
                Ok(None)
            }
            Transform::SetExclude => {
                self.current = NearList::Exclude;
                Ok(None)
            }
        }
    }

    fn store(&mut self, attribute: Attribute, value: Value, token: &Token) -> Result<()> {
        match attribute {
            Attribute::AggFunc => {
                self.function = Some(match value {
                    Value::Function(f) => f,
                    Value::Text(_) => lookup_function(token)?,
                });
            }
            Attribute::CondOp => {
                self.comparator = ComparisonOperator::from_kind(token.kind);
            }
            Attribute::AggField => self.field = Some(text(value)),
            Attribute::GroupField => self.group_by = Some(text(value)),
            Attribute::Condition => self.threshold = Some(text(value)),
        }
        Ok(())
    }

    fn finish(self) -> Result<AggregationDescriptor> {
        let function = match self.function {
            Some(f) if FINAL_STATES.contains(&self.state) => f,
            _ => {
                return Err(ConditionError::IncompleteAggregation { state: self.state });
            }
        };

        Ok(AggregationDescriptor {
            function,
            field: self.field,
            group_by: self.group_by,
            comparator: self.comparator,
            threshold: self.threshold,
            include: self.include,
            exclude: self.exclude,
        })
    }
}

fn lookup_function(token: &Token) -> Result<AggregationFunction> {
    AggregationFunction::from_name(&token.text).ok_or_else(|| ConditionError::UnknownFunction {
        name: token.text.clone(),
        position: token.position,
    })
}

fn text(value: Value) -> String {
    match value {
        Value::Text(s) => s,
        Value::Function(f) => f.as_str().to_string(),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::tokenize;

    fn parse(input: &str) -> Result<AggregationDescriptor> {
        parse_aggregation(&tokenize(input).unwrap())
    }

    #[test]
    fn test_count_by_group() {
        let desc = parse("count() by host > 5").unwrap();
        assert_eq!(
            desc,
            AggregationDescriptor {
                function: AggregationFunction::Count,
                field: None,
                group_by: Some("host".to_string()),
                comparator: Some(ComparisonOperator::Gt),
                threshold: Some("5".to_string()),
                include: Vec::new(),
                exclude: Vec::new(),
            }
        );
    }

    #[test]
    fn test_field_without_group() {
        let desc = parse("max(duration) <= 300").unwrap();
        assert_eq!(desc.function, AggregationFunction::Max);
        assert_eq!(desc.field.as_deref(), Some("duration"));
        assert_eq!(desc.group_by, None);
        assert_eq!(desc.comparator, Some(ComparisonOperator::Lte));
        assert_eq!(desc.threshold.as_deref(), Some("300"));
    }

    #[test]
    fn test_field_and_group() {
        let desc = parse("sum(bytes) by SourceIp >= 1000").unwrap();
        assert_eq!(desc.function, AggregationFunction::Sum);
        assert_eq!(desc.field.as_deref(), Some("bytes"));
        assert_eq!(desc.group_by.as_deref(), Some("SourceIp"));
        assert_eq!(desc.comparator, Some(ComparisonOperator::Gte));
    }

    #[test]
    fn test_all_comparators() {
        for (op, expected) in [
            ("=", ComparisonOperator::Eq),
            ("==", ComparisonOperator::Eq),
            ("<", ComparisonOperator::Lt),
            ("<=", ComparisonOperator::Lte),
            (">", ComparisonOperator::Gt),
            (">=", ComparisonOperator::Gte),
        ] {
            let desc = parse(&format!("avg(x) {op} 1")).unwrap();
            assert_eq!(desc.comparator, Some(expected), "{op}");
        }
    }

    #[test]
    fn test_uppercase_function_name() {
        let desc = parse("COUNT() > 1").unwrap();
        assert_eq!(desc.function, AggregationFunction::Count);
    }

    #[test]
    fn test_near_include_and_exclude() {
        let desc = parse("near selectionA and selectionB not selectionC").unwrap();
        assert_eq!(desc.function, AggregationFunction::Near);
        assert_eq!(desc.include, ["selectionA", "selectionB"]);
        assert_eq!(desc.exclude, ["selectionC"]);
        assert_eq!(desc.field, None);
        assert_eq!(desc.comparator, None);
        assert_eq!(desc.threshold, None);
    }

    #[test]
    fn test_near_and_not_switches_lists() {
        let desc = parse("near a and not b and c and not d").unwrap();
        assert_eq!(desc.include, ["a", "c"]);
        assert_eq!(desc.exclude, ["b", "d"]);
    }

    #[test]
    fn test_near_single_identifier() {
        let desc = parse("near a").unwrap();
        assert_eq!(desc.include, ["a"]);
        assert!(desc.exclude.is_empty());
    }

    #[test]
    fn test_near_requires_identifier() {
        let err = parse("near").unwrap_err();
        assert!(matches!(err, ConditionError::IncompleteAggregation { state: 8 }));
    }

    #[test]
    fn test_unknown_function() {
        let tokens = [
            Token::new(TokenKind::AggFunc, "median", 1),
            Token::new(TokenKind::LParen, "(", 7),
            Token::new(TokenKind::RParen, ")", 8),
        ];
        let err = parse_aggregation(&tokens).unwrap_err();
        assert!(
            matches!(err, ConditionError::UnknownFunction { ref name, position: 1 } if name == "median"),
            "got {err}"
        );
    }

    #[test]
    fn test_unexpected_token() {
        let err = parse("count() by > 5").unwrap_err();
        match err {
            ConditionError::UnexpectedAggregationToken { text, position } => {
                assert_eq!(text, ">");
                assert_eq!(position, 12);
            }
            other => panic!("expected unexpected token error, got {other}"),
        }
    }

    #[test]
    fn test_identifier_as_function_is_rejected() {
        let err = parse("median(x) > 5").unwrap_err();
        assert!(matches!(err, ConditionError::UnexpectedAggregationToken { .. }));
    }

    #[test]
    fn test_missing_threshold_is_incomplete() {
        for input in ["count()", "count() by host", "count() >", "count("] {
            let err = parse(input).unwrap_err();
            assert!(
                matches!(err, ConditionError::IncompleteAggregation { .. }),
                "{input}: {err}"
            );
        }
    }

    #[test]
    fn test_empty_clause_is_incomplete() {
        let err = parse_aggregation(&[]).unwrap_err();
        assert!(matches!(err, ConditionError::IncompleteAggregation { state: 0 }));
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        let err = parse("count() > 5 by host").unwrap_err();
        assert!(matches!(err, ConditionError::UnexpectedAggregationToken { .. }));
    }
}
