use serde::Serialize;
use thiserror::Error;

/// Category of a [`ConditionError`].
///
/// Callers that compile many rules use this to decide how to report a failed
/// condition without matching on every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No lexical rule matched the remaining input.
    Lexical,
    /// Unmatched opening/closing parenthesis or an empty `()` group.
    Parenthesis,
    /// Reduction did not converge to exactly one node.
    AmbiguousRoot,
    /// Aggregation function name outside `count|min|max|avg|sum|near`.
    UnknownFunction,
    /// No aggregation transition for a token, or input ended outside a final state.
    AggregationSyntax,
    /// A definition name or wildcard pattern matched nothing.
    UnresolvedReference,
    /// A definition body has a shape that cannot be turned into a node.
    Definition,
    /// Nesting exceeded the configured depth.
    ResourceLimit,
    /// A node was built in a way its variant does not allow.
    Invariant,
    /// Reading or decoding a rule document failed.
    Document,
}

/// Errors that can occur while compiling a condition.
#[derive(Debug, Error)]
pub enum ConditionError {
    #[error("unexpected token in condition at position {position}: '{remainder}'")]
    Lexical { position: usize, remainder: String },

    #[error("missing matching closing parenthesis for '(' at position {position}")]
    MissingClosingParen { position: usize },

    #[error("closing parenthesis at position {close} precedes opening at position {open}")]
    ClosingBeforeOpening { open: usize, close: usize },

    #[error("unmatched closing parenthesis at position {position}")]
    UnmatchedClosingParen { position: usize },

    #[error("empty subexpression at position {position}")]
    EmptySubexpression { position: usize },

    #[error("parse tree must have exactly one root, found {count} elements")]
    AmbiguousRoot {
        count: usize,
        position: Option<usize>,
    },

    #[error("operator '{operator}' at position {position} is missing an operand")]
    MissingOperand { operator: String, position: usize },

    #[error("unknown aggregation function '{name}' at position {position}")]
    UnknownFunction { name: String, position: usize },

    #[error("unexpected token '{text}' in aggregation expression at position {position}")]
    UnexpectedAggregationToken { text: String, position: usize },

    #[error("incomplete aggregation expression (stopped in state {state})")]
    IncompleteAggregation { state: i8 },

    #[error("unresolved reference: {0}")]
    UnresolvedReference(String),

    #[error("invalid definition '{name}': {reason}")]
    InvalidDefinition { name: String, reason: String },

    #[error("invalid wildcard pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("condition nesting exceeds the maximum depth of {limit}")]
    NestingTooDeep { limit: usize },

    #[error("only one element allowed in {0} node")]
    SingleElement(&'static str),

    #[error("{0} node does not accept operands")]
    NoOperands(&'static str),

    #[error("invalid rule document: {0}")]
    InvalidDocument(String),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConditionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConditionError::Lexical { .. } => ErrorKind::Lexical,
            ConditionError::MissingClosingParen { .. }
            | ConditionError::ClosingBeforeOpening { .. }
            | ConditionError::UnmatchedClosingParen { .. }
            | ConditionError::EmptySubexpression { .. } => ErrorKind::Parenthesis,
            ConditionError::AmbiguousRoot { .. } | ConditionError::MissingOperand { .. } => {
                ErrorKind::AmbiguousRoot
            }
            ConditionError::UnknownFunction { .. } => ErrorKind::UnknownFunction,
            ConditionError::UnexpectedAggregationToken { .. }
            | ConditionError::IncompleteAggregation { .. } => ErrorKind::AggregationSyntax,
            ConditionError::UnresolvedReference(_) | ConditionError::InvalidPattern { .. } => {
                ErrorKind::UnresolvedReference
            }
            ConditionError::InvalidDefinition { .. } => ErrorKind::Definition,
            ConditionError::NestingTooDeep { .. } => ErrorKind::ResourceLimit,
            ConditionError::SingleElement(_) | ConditionError::NoOperands(_) => {
                ErrorKind::Invariant
            }
            ConditionError::InvalidDocument(_)
            | ConditionError::Yaml(_)
            | ConditionError::Io(_) => ErrorKind::Document,
        }
    }

    /// 1-based character position of the offending token, when known.
    pub fn position(&self) -> Option<usize> {
        match self {
            ConditionError::Lexical { position, .. }
            | ConditionError::MissingClosingParen { position }
            | ConditionError::UnmatchedClosingParen { position }
            | ConditionError::EmptySubexpression { position }
            | ConditionError::MissingOperand { position, .. }
            | ConditionError::UnknownFunction { position, .. }
            | ConditionError::UnexpectedAggregationToken { position, .. } => Some(*position),
            ConditionError::ClosingBeforeOpening { close, .. } => Some(*close),
            ConditionError::AmbiguousRoot { position, .. } => *position,
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConditionError>;
