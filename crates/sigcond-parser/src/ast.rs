//! Parse-tree types for condition expressions and aggregation clauses.
//!
//! A compiled condition is a [`ParsedCondition`]: one [`ConditionNode`] root
//! for the search expression plus an optional [`AggregationDescriptor`] for
//! the clause after the pipe.

use std::fmt;

use serde::Serialize;

use crate::error::{ConditionError, Result};
use crate::token::TokenKind;

// =============================================================================
// Combinators
// =============================================================================

/// Connective used to join operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    And,
    Or,
}

impl Combinator {
    /// Binary node over two already-built operands.
    pub fn combine(self, lhs: ConditionNode, rhs: ConditionNode) -> ConditionNode {
        self.with_operands(vec![lhs, rhs])
    }

    /// Empty node of this kind, to be grown with [`ConditionNode::push`].
    pub fn empty(self) -> ConditionNode {
        self.with_operands(Vec::new())
    }

    pub fn with_operands(self, operands: Vec<ConditionNode>) -> ConditionNode {
        match self {
            Combinator::And => ConditionNode::And(operands),
            Combinator::Or => ConditionNode::Or(operands),
        }
    }
}

impl fmt::Display for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Combinator::And => write!(f, "and"),
            Combinator::Or => write!(f, "or"),
        }
    }
}

// =============================================================================
// Search leaves
// =============================================================================

/// Scalar value taken from a definition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SearchValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for SearchValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchValue::String(s) => write!(f, "{s:?}"),
            SearchValue::Integer(n) => write!(f, "{n}"),
            SearchValue::Float(n) => write!(f, "{n}"),
            SearchValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Elementary predicate produced by a rule context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SearchLeaf {
    /// `field` equals `value`. The field string is passed through as written,
    /// modifiers included.
    FieldMatch { field: String, value: SearchValue },
    /// Value searched anywhere in the event.
    Keyword(SearchValue),
}

impl fmt::Display for SearchLeaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchLeaf::FieldMatch { field, value } => write!(f, "{field}={value}"),
            SearchLeaf::Keyword(value) => write!(f, "{value}"),
        }
    }
}

// =============================================================================
// Condition tree
// =============================================================================

/// Node of a compiled search expression.
///
/// `And`/`Or` created by binary reduction hold exactly two operands; those
/// created by quantifier expansion are grown with [`ConditionNode::push`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ConditionNode {
    And(Vec<ConditionNode>),
    Or(Vec<ConditionNode>),
    Not(Box<ConditionNode>),
    /// Field is absent or empty (`negated == false`), or present and
    /// non-empty (`negated == true`). Both are leaves.
    NullCheck { field: String, negated: bool },
    /// Already-resolved unit that later reduction steps treat atomically.
    Subexpression(Box<ConditionNode>),
    Leaf(SearchLeaf),
}

impl ConditionNode {
    pub fn not(operand: ConditionNode) -> Self {
        ConditionNode::Not(Box::new(operand))
    }

    pub fn subexpression(inner: ConditionNode) -> Self {
        ConditionNode::Subexpression(Box::new(inner))
    }

    /// Field is absent or empty.
    pub fn null_check(field: impl Into<String>) -> Self {
        ConditionNode::NullCheck {
            field: field.into(),
            negated: false,
        }
    }

    /// Field is present and non-empty.
    pub fn not_null(field: impl Into<String>) -> Self {
        ConditionNode::NullCheck {
            field: field.into(),
            negated: true,
        }
    }

    pub fn field_match(field: impl Into<String>, value: SearchValue) -> Self {
        ConditionNode::Leaf(SearchLeaf::FieldMatch {
            field: field.into(),
            value,
        })
    }

    pub fn keyword(value: SearchValue) -> Self {
        ConditionNode::Leaf(SearchLeaf::Keyword(value))
    }

    /// Append an operand.
    ///
    /// Only `And`/`Or` grow; a `Not` already holds its single operand and
    /// every other variant takes none.
    pub fn push(&mut self, operand: ConditionNode) -> Result<()> {
        match self {
            ConditionNode::And(operands) | ConditionNode::Or(operands) => {
                operands.push(operand);
                Ok(())
            }
            ConditionNode::Not(_) => Err(ConditionError::SingleElement("NOT")),
            ConditionNode::NullCheck { .. } => Err(ConditionError::NoOperands("null-check")),
            ConditionNode::Subexpression(_) => Err(ConditionError::NoOperands("subexpression")),
            ConditionNode::Leaf(_) => Err(ConditionError::NoOperands("leaf")),
        }
    }

    /// Direct children, in order.
    pub fn operands(&self) -> &[ConditionNode] {
        match self {
            ConditionNode::And(operands) | ConditionNode::Or(operands) => operands,
            ConditionNode::Not(inner) | ConditionNode::Subexpression(inner) => {
                std::slice::from_ref(&**inner)
            }
            ConditionNode::NullCheck { .. } | ConditionNode::Leaf(_) => &[],
        }
    }
}

impl fmt::Display for ConditionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionNode::And(args) => {
                let parts: Vec<String> = args.iter().map(|a| format!("{a}")).collect();
                write!(f, "({})", parts.join(" and "))
            }
            ConditionNode::Or(args) => {
                let parts: Vec<String> = args.iter().map(|a| format!("{a}")).collect();
                write!(f, "({})", parts.join(" or "))
            }
            ConditionNode::Not(arg) => write!(f, "not {arg}"),
            ConditionNode::NullCheck {
                field,
                negated: false,
            } => write!(f, "{field} is null"),
            ConditionNode::NullCheck {
                field,
                negated: true,
            } => write!(f, "{field} is not null"),
            ConditionNode::Subexpression(inner) => write!(f, "{inner}"),
            ConditionNode::Leaf(leaf) => write!(f, "{leaf}"),
        }
    }
}

// =============================================================================
// Aggregation clause
// =============================================================================

/// Function named at the start of an aggregation clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationFunction {
    Count,
    Min,
    Max,
    Avg,
    Sum,
    Near,
}

impl AggregationFunction {
    /// Case-insensitive lookup of a function name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "count" => Some(AggregationFunction::Count),
            "min" => Some(AggregationFunction::Min),
            "max" => Some(AggregationFunction::Max),
            "avg" => Some(AggregationFunction::Avg),
            "sum" => Some(AggregationFunction::Sum),
            "near" => Some(AggregationFunction::Near),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationFunction::Count => "count",
            AggregationFunction::Min => "min",
            AggregationFunction::Max => "max",
            AggregationFunction::Avg => "avg",
            AggregationFunction::Sum => "sum",
            AggregationFunction::Near => "near",
        }
    }
}

impl fmt::Display for AggregationFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Threshold comparison of a numeric aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ComparisonOperator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
}

impl ComparisonOperator {
    pub fn from_kind(kind: TokenKind) -> Option<Self> {
        match kind {
            TokenKind::Eq => Some(ComparisonOperator::Eq),
            TokenKind::Lt => Some(ComparisonOperator::Lt),
            TokenKind::Lte => Some(ComparisonOperator::Lte),
            TokenKind::Gt => Some(ComparisonOperator::Gt),
            TokenKind::Gte => Some(ComparisonOperator::Gte),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOperator::Eq => "=",
            ComparisonOperator::Lt => "<",
            ComparisonOperator::Lte => "<=",
            ComparisonOperator::Gt => ">",
            ComparisonOperator::Gte => ">=",
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed aggregation clause.
///
/// `field`, `group_by`, `comparator` and `threshold` are only set for the
/// numeric functions; `include`/`exclude` only for `near`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregationDescriptor {
    pub function: AggregationFunction,
    pub field: Option<String>,
    pub group_by: Option<String>,
    pub comparator: Option<ComparisonOperator>,
    pub threshold: Option<String>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl fmt::Display for AggregationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.function == AggregationFunction::Near {
            write!(f, "near {}", self.include.join(" and "))?;
            for id in &self.exclude {
                write!(f, " and not {id}")?;
            }
            return Ok(());
        }

        write!(f, "{}({})", self.function, self.field.as_deref().unwrap_or(""))?;
        if let Some(group) = &self.group_by {
            write!(f, " by {group}")?;
        }
        if let (Some(op), Some(threshold)) = (&self.comparator, &self.threshold) {
            write!(f, " {op} {threshold}")?;
        }
        Ok(())
    }
}

/// Result of compiling one condition string.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedCondition {
    pub search: ConditionNode,
    pub aggregation: Option<AggregationDescriptor>,
}

impl fmt::Display for ParsedCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.search)?;
        if let Some(agg) = &self.aggregation {
            write!(f, " | {agg}")?;
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
