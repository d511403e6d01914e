//! [`RuleContext`] backed by a Sigma `detection:` section.
//!
//! Every key other than `condition` and `timeframe` is a named definition.
//! Definitions resolve with the usual Sigma defaults:
//! - a mapping is the AND of its `field: value` entries
//! - a list of values under a field is the OR of the single matches
//! - a `null` value checks that the field is absent or empty
//! - `field|exists: true` / `false` checks that the field is present and
//!   non-empty, or absent
//! - a list definition joins its entries with the default combinator
//!   (OR, or the quantifier's combinator for `1 of` / `all of`)
//! - plain scalars are keywords matched anywhere in the event

use serde_yaml::Value;

use crate::ast::{Combinator, ConditionNode, ParsedCondition, SearchValue};
use crate::condition::{ConditionParser, ParseOptions};
use crate::context::RuleContext;
use crate::error::{ConditionError, Result};

/// A named definition of a detection section.
#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    pub name: String,
    pub body: Value,
}

/// Definitions, condition strings and timeframe of one detection section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionContext {
    definitions: Vec<Definition>,
    conditions: Vec<String>,
    timeframe: Option<String>,
}

impl DetectionContext {
    /// Build a context from the YAML text of a detection mapping.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(yaml)?;
        Self::from_value(&value)
    }

    /// Build a context from an already decoded detection mapping.
    pub fn from_value(value: &Value) -> Result<Self> {
        let m = value.as_mapping().ok_or_else(|| {
            ConditionError::InvalidDocument("detection section must be a mapping".into())
        })?;

        let mut context = DetectionContext::default();
        for (key, val) in m {
            let Some(key) = key.as_str() else {
                return Err(ConditionError::InvalidDocument(format!(
                    "detection key must be a string, got {key:?}"
                )));
            };
            match key {
                "condition" => context.conditions = condition_strings(val)?,
                "timeframe" => context.timeframe = val.as_str().map(str::to_string),
                _ => context.definitions.push(Definition {
                    name: key.to_string(),
                    body: val.clone(),
                }),
            }
        }
        Ok(context)
    }

    /// Condition strings in declaration order (a `condition` list yields several).
    pub fn conditions(&self) -> &[String] {
        &self.conditions
    }

    pub fn timeframe(&self) -> Option<&str> {
        self.timeframe.as_deref()
    }

    pub fn definition(&self, name: &str) -> Option<&Definition> {
        self.definitions.iter().find(|d| d.name == name)
    }

    /// Compile every condition independently.
    ///
    /// The results line up with [`conditions`](Self::conditions); a failing
    /// condition does not stop the others from being compiled.
    pub fn compile_conditions(&self, options: ParseOptions) -> Vec<Result<ParsedCondition>> {
        let parser = ConditionParser::with_options(self, options);
        self.conditions.iter().map(|c| parser.parse(c)).collect()
    }
}

impl RuleContext for DetectionContext {
    type Definition = Definition;

    fn definitions(&self) -> Vec<(&str, &Definition)> {
        self.definitions
            .iter()
            .map(|d| (d.name.as_str(), d))
            .collect()
    }

    fn parse_definition_by_name(&self, name: &str, default: Combinator) -> Result<ConditionNode> {
        let definition = self.definition(name).ok_or_else(|| {
            ConditionError::UnresolvedReference(format!("unknown definition '{name}'"))
        })?;
        definition_node(&definition.name, &definition.body, default)
    }

    fn parse_definition(&self, definition: &Definition) -> Result<ConditionNode> {
        definition_node(&definition.name, &definition.body, Combinator::Or)
    }
}

// =============================================================================
// Definition bodies
// =============================================================================

fn condition_strings(value: &Value) -> Result<Vec<String>> {
    match value {
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Sequence(seq) => seq
            .iter()
            .map(|v| {
                v.as_str().map(str::to_string).ok_or_else(|| {
                    ConditionError::InvalidDocument("condition list must contain strings".into())
                })
            })
            .collect(),
        _ => Err(ConditionError::InvalidDocument(
            "condition must be a string or list of strings".into(),
        )),
    }
}

fn definition_node(name: &str, body: &Value, default: Combinator) -> Result<ConditionNode> {
    match body {
        Value::Mapping(m) => {
            let mut entries = Vec::with_capacity(m.len());
            for (key, value) in m {
                let field = key
                    .as_str()
                    .ok_or_else(|| invalid(name, "field names must be strings"))?;
                entries.push(field_node(name, field, value)?);
            }
            group(name, Combinator::And, entries)
        }
        Value::Sequence(seq) => {
            let items = seq
                .iter()
                .map(|item| match item {
                    Value::Mapping(_) | Value::Sequence(_) => definition_node(name, item, default),
                    _ => keyword_node(name, item),
                })
                .collect::<Result<Vec<_>>>()?;
            group(name, default, items)
        }
        Value::Tagged(tagged) => definition_node(name, &tagged.value, default),
        _ => keyword_node(name, body),
    }
}

const EXISTS_MODIFIER: &str = "|exists";

fn field_node(name: &str, field: &str, value: &Value) -> Result<ConditionNode> {
    if let Some(base) = field.strip_suffix(EXISTS_MODIFIER) {
        return match value {
            Value::Bool(true) => Ok(ConditionNode::not_null(base)),
            Value::Bool(false) => Ok(ConditionNode::null_check(base)),
            _ => Err(invalid(name, "'exists' expects true or false")),
        };
    }

    match value {
        Value::Null => Ok(ConditionNode::null_check(field)),
        Value::Sequence(values) => {
            let matches = values
                .iter()
                .map(|v| match v {
                    Value::Null => Ok(ConditionNode::null_check(field)),
                    _ => scalar(name, v).map(|value| ConditionNode::field_match(field, value)),
                })
                .collect::<Result<Vec<_>>>()?;
            group(name, Combinator::Or, matches)
        }
        _ => Ok(ConditionNode::field_match(field, scalar(name, value)?)),
    }
}

fn keyword_node(name: &str, value: &Value) -> Result<ConditionNode> {
    Ok(ConditionNode::keyword(scalar(name, value)?))
}

fn scalar(name: &str, value: &Value) -> Result<SearchValue> {
    match value {
        Value::String(s) => Ok(SearchValue::String(s.clone())),
        Value::Bool(b) => Ok(SearchValue::Bool(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(SearchValue::Integer(i)),
            None => n
                .as_f64()
                .map(SearchValue::Float)
                .ok_or_else(|| invalid(name, "number out of range")),
        },
        Value::Tagged(tagged) => scalar(name, &tagged.value),
        Value::Null => Err(invalid(name, "empty value")),
        Value::Sequence(_) | Value::Mapping(_) => Err(invalid(name, "expected a scalar value")),
    }
}

/// Join `nodes` with `combinator`, collapsing a single node to itself.
fn group(
    name: &str,
    combinator: Combinator,
    mut nodes: Vec<ConditionNode>,
) -> Result<ConditionNode> {
    match nodes.len() {
        0 => Err(invalid(name, "definition is empty")),
        1 => Ok(nodes.remove(0)),
        _ => Ok(combinator.with_operands(nodes)),
    }
}

fn invalid(name: &str, reason: &str) -> ConditionError {
    ConditionError::InvalidDefinition {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

// =============================================================================
// Tests
// =============================================================================
