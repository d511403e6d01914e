//! Expansion of `1 of` / `all of` selectors.
//!
//! The target after the quantifier keyword is one of:
//! - `them`: every definition of the rule
//! - a pattern containing `*`: every definition whose name matches it
//! - a plain name: the entries of that single definition

use regex::Regex;

use crate::ast::{Combinator, ConditionNode};
use crate::context::RuleContext;
use crate::error::{ConditionError, Result};
use crate::token::Token;

const THEM: &str = "them";

/// Expand a quantifier over `target` into a single opaque node.
///
/// `combinator` is [`Combinator::And`] for `all of` and [`Combinator::Or`]
/// for `1 of`. The result is always a [`ConditionNode::Subexpression`].
pub fn expand<C>(context: &C, combinator: Combinator, target: &Token) -> Result<ConditionNode>
where
    C: RuleContext + ?Sized,
{
    let node = if target.has_text(THEM) {
        let definitions = context.definitions();
        if definitions.is_empty() {
            return Err(ConditionError::UnresolvedReference(
                "'them' used in a rule without definitions".to_string(),
            ));
        }
        combine_definitions(context, combinator, definitions.into_iter().map(|(_, d)| d))?
    } else if target.text.contains('*') {
        let pattern = glob_to_regex(&target.text)?;
        let matching: Vec<_> = context
            .definitions()
            .into_iter()
            .filter(|(name, _)| pattern.is_match(name))
            .map(|(_, d)| d)
            .collect();
        if matching.is_empty() {
            return Err(ConditionError::UnresolvedReference(format!(
                "pattern '{}' matches no definition",
                target.text
            )));
        }
        combine_definitions(context, combinator, matching.into_iter())?
    } else {
        context.parse_definition_by_name(&target.text, combinator)?
    };

    log::trace!("expanded {combinator} of {} at {}", target.text, target.position);
    Ok(ConditionNode::subexpression(node))
}

fn combine_definitions<'d, C>(
    context: &C,
    combinator: Combinator,
    definitions: impl Iterator<Item = &'d C::Definition>,
) -> Result<ConditionNode>
where
    C: RuleContext + ?Sized,
    C::Definition: 'd,
{
    let mut node = combinator.empty();
    for definition in definitions {
        node.push(ConditionNode::subexpression(
            context.parse_definition(definition)?,
        ))?;
    }
    Ok(node)
}

/// Translate a `*` wildcard into an anchored regex over definition names.
fn glob_to_regex(glob: &str) -> Result<Regex> {
    let body: Vec<String> = glob.split('*').map(regex::escape).collect();
    let pattern = format!("^{}$", body.join(".*"));
    Regex::new(&pattern).map_err(|source| ConditionError::InvalidPattern {
        pattern: glob.to_string(),
        source,
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::stub::{StubContext, kw};
    use crate::token::TokenKind;

    fn target(text: &str) -> Token {
        Token::new(TokenKind::Identifier, text, 6)
    }

    fn sub(node: ConditionNode) -> ConditionNode {
        ConditionNode::subexpression(node)
    }

    #[test]
    fn test_one_of_them_in_definition_order() {
        let ctx = StubContext::new().with("d1", &["a"]).with("d2", &["b"]);
        let node = expand(&ctx, Combinator::Or, &target("them")).unwrap();
        assert_eq!(
            node,
            sub(ConditionNode::Or(vec![sub(kw("a")), sub(kw("b"))]))
        );
    }

    #[test]
    fn test_all_of_them() {
        let ctx = StubContext::new()
            .with("z", &["a"])
            .with("y", &["b"])
            .with("x", &["c"]);
        let node = expand(&ctx, Combinator::And, &target("them")).unwrap();
        assert_eq!(
            node,
            sub(ConditionNode::And(vec![sub(kw("a")), sub(kw("b")), sub(kw("c"))]))
        );
    }

    #[test]
    fn test_wildcard_selects_matching_names() {
        let ctx = StubContext::new()
            .with("selection_a", &["a"])
            .with("filter", &["f"])
            .with("selection_b", &["b"])
            .with("xselection_c", &["c"]);
        let node = expand(&ctx, Combinator::Or, &target("selection_*")).unwrap();
        assert_eq!(
            node,
            sub(ConditionNode::Or(vec![sub(kw("a")), sub(kw("b"))]))
        );
    }

    #[test]
    fn test_leading_wildcard() {
        let ctx = StubContext::new()
            .with("sel_main", &["a"])
            .with("filter_main", &["b"])
            .with("x", &["c"]);
        let node = expand(&ctx, Combinator::And, &target("*_main")).unwrap();
        assert_eq!(
            node,
            sub(ConditionNode::And(vec![sub(kw("a")), sub(kw("b"))]))
        );
    }

    #[test]
    fn test_single_wildcard_match_keeps_combinator() {
        let ctx = StubContext::new()
            .with("selection", &["a"])
            .with("filter", &["f"]);
        let node = expand(&ctx, Combinator::Or, &target("sel*")).unwrap();
        assert_eq!(node, sub(ConditionNode::Or(vec![sub(kw("a"))])));
    }

    #[test]
    fn test_named_definition_uses_quantifier_combinator() {
        let ctx = StubContext::new().with("keywords", &["a", "b"]);
        let all = expand(&ctx, Combinator::And, &target("keywords")).unwrap();
        assert_eq!(all, sub(ConditionNode::And(vec![kw("a"), kw("b")])));
        let one = expand(&ctx, Combinator::Or, &target("keywords")).unwrap();
        assert_eq!(one, sub(ConditionNode::Or(vec![kw("a"), kw("b")])));
    }

    #[test]
    fn test_wildcard_without_match_is_unresolved() {
        let ctx = StubContext::new().with("selection", &["a"]);
        let err = expand(&ctx, Combinator::Or, &target("filter_*")).unwrap_err();
        assert!(matches!(err, ConditionError::UnresolvedReference(_)));
    }

    #[test]
    fn test_them_without_definitions_is_unresolved() {
        let ctx = StubContext::new();
        let err = expand(&ctx, Combinator::Or, &target("them")).unwrap_err();
        assert!(matches!(err, ConditionError::UnresolvedReference(_)));
    }

    #[test]
    fn test_unknown_name_propagates_context_error() {
        let ctx = StubContext::new().with("selection", &["a"]);
        let err = expand(&ctx, Combinator::Or, &target("missing")).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }
}
