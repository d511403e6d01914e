//! Interface to the rule that owns a condition.
//!
//! The condition compiler never interprets definition bodies itself. It asks
//! a [`RuleContext`] for the named definitions and for the node each one
//! resolves to. [`DetectionContext`](crate::detection::DetectionContext) is
//! the implementation backed by a Sigma `detection:` section.

use crate::ast::{Combinator, ConditionNode};
use crate::error::Result;

pub trait RuleContext {
    /// Definition body as stored by the context.
    type Definition;

    /// All named definitions, in the order the rule declares them.
    fn definitions(&self) -> Vec<(&str, &Self::Definition)>;

    /// Resolve the definition called `name`.
    ///
    /// `default` connects the entries of a multi-valued definition when the
    /// definition does not fix a connective itself. Unknown names fail with
    /// [`ConditionError::UnresolvedReference`](crate::ConditionError::UnresolvedReference).
    fn parse_definition_by_name(&self, name: &str, default: Combinator) -> Result<ConditionNode>;

    /// Resolve an already located definition body.
    fn parse_definition(&self, definition: &Self::Definition) -> Result<ConditionNode>;
}
