//! Condition expression parser.
//!
//! Parses Sigma condition strings like:
//! - `"selection and not filter"`
//! - `"1 of selection_* and not 1 of filter_*"`
//! - `"all of them"`
//! - `"selection1 and not (filter1 or filter2) | count() by host > 5"`
//!
//! The token sequence is split at the first pipe. The left side is reduced
//! to a single [`ConditionNode`]: parenthesized groups are parsed first, then
//! operators are reduced in fixed precedence order (`all of`, `1 of`,
//! identifiers, `not`, `and`, `or`). The right side goes to the aggregation
//! state machine.

use crate::aggregation::parse_aggregation;
use crate::ast::{Combinator, ConditionNode, ParsedCondition};
use crate::context::RuleContext;
use crate::error::{ConditionError, Result};
use crate::quantifier::expand;
use crate::token::{Token, TokenKind, tokenize};

/// Default limit on parenthesis nesting.
pub const DEFAULT_MAX_DEPTH: usize = 64;

// =============================================================================
// Options
// =============================================================================

/// Tunables for [`ConditionParser`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Deepest parenthesis nesting accepted before failing with
    /// [`ConditionError::NestingTooDeep`].
    pub max_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ParseOptions {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

// =============================================================================
// Public API
// =============================================================================

/// Compile a condition string against `context` with default options.
///
/// # Examples
///
/// ```
/// use sigcond_parser::{ConditionNode, DetectionContext, parse_condition};
///
/// let context = DetectionContext::from_yaml_str(
///     "selection:\n    Image: cmd.exe\nfilter:\n    User: SYSTEM\ncondition: selection and not filter\n",
/// )
/// .unwrap();
/// let parsed = parse_condition("selection and not filter", &context).unwrap();
/// assert!(matches!(parsed.search, ConditionNode::And(_)));
/// assert!(parsed.aggregation.is_none());
/// ```
pub fn parse_condition<C>(input: &str, context: &C) -> Result<ParsedCondition>
where
    C: RuleContext + ?Sized,
{
    ConditionParser::new(context).parse(input)
}

/// Condition compiler bound to one rule context.
pub struct ConditionParser<'c, C: ?Sized> {
    context: &'c C,
    options: ParseOptions,
}

impl<'c, C> ConditionParser<'c, C>
where
    C: RuleContext + ?Sized,
{
    pub fn new(context: &'c C) -> Self {
        Self::with_options(context, ParseOptions::default())
    }

    pub fn with_options(context: &'c C, options: ParseOptions) -> Self {
        ConditionParser { context, options }
    }

    /// Tokenize and compile a full condition, including an aggregation clause.
    pub fn parse(&self, input: &str) -> Result<ParsedCondition> {
        log::debug!("compiling condition: {input}");
        let parsed = self.parse_tokens(tokenize(input)?)?;
        log::debug!("compiled condition: {parsed}");
        Ok(parsed)
    }

    /// Compile an already tokenized condition.
    pub fn parse_tokens(&self, mut tokens: Vec<Token>) -> Result<ParsedCondition> {
        let aggregation = match tokens.iter().position(|t| t.is_kind(TokenKind::Pipe)) {
            Some(pipe) => {
                let clause = tokens.split_off(pipe + 1);
                tokens.truncate(pipe);
                Some(parse_aggregation(&clause)?)
            }
            None => None,
        };

        Ok(ParsedCondition {
            search: self.parse_search(tokens)?,
            aggregation,
        })
    }

    /// Reduce a search expression (no pipe) to its root node.
    pub fn parse_search(&self, tokens: Vec<Token>) -> Result<ConditionNode> {
        self.reduce(tokens.into_iter().map(Element::Token).collect(), 0)
    }

    fn reduce(&self, mut elements: Vec<Element>, depth: usize) -> Result<ConditionNode> {
        if depth > self.options.max_depth {
            return Err(ConditionError::NestingTooDeep {
                limit: self.options.max_depth,
            });
        }

        self.resolve_groups(&mut elements, depth)?;

        for &(kind, operator) in SEARCH_OPERATORS {
            while let Some(pos) = operator.locate(&elements, kind) {
                self.apply(&mut elements, pos, operator)?;
            }
        }

        into_root(elements)
    }

    /// Replace every parenthesized group with its parsed subexpression.
    fn resolve_groups(&self, elements: &mut Vec<Element>, depth: usize) -> Result<()> {
        while let Some(open) = find_token(elements, TokenKind::LParen) {
            let open_pos = token_position(&elements[open]);

            if let Some(close) = find_token(elements, TokenKind::RParen)
                && close < open
            {
                return Err(ConditionError::ClosingBeforeOpening {
                    open: open_pos,
                    close: token_position(&elements[close]),
                });
            }

            let close = matching_paren(elements, open)
                .ok_or(ConditionError::MissingClosingParen { position: open_pos })?;
            if close == open + 1 {
                return Err(ConditionError::EmptySubexpression { position: open_pos });
            }

            let mut group: Vec<Element> = elements.drain(open..=close).collect();
            group.pop();
            group.remove(0);
            log::trace!("parsing group at position {open_pos} ({} elements)", group.len());

            let inner = self.reduce(group, depth + 1)?;
            elements.insert(open, Element::Node(ConditionNode::subexpression(inner)));
        }

        if let Some(stray) = find_token(elements, TokenKind::RParen) {
            return Err(ConditionError::UnmatchedClosingParen {
                position: token_position(&elements[stray]),
            });
        }
        Ok(())
    }

    fn apply(&self, elements: &mut Vec<Element>, pos: usize, operator: Operator) -> Result<()> {
        match operator {
            Operator::AllOf | Operator::OneOf => {
                let combinator = if operator == Operator::AllOf {
                    Combinator::And
                } else {
                    Combinator::Or
                };
                let Some(Element::Token(target)) = elements.get(pos + 1) else {
                    return Err(missing_operand(&elements[pos]));
                };
                if !target.is_kind(TokenKind::Identifier) {
                    return Err(missing_operand(&elements[pos]));
                }
                let node = expand(self.context, combinator, target)?;
                elements.remove(pos + 1);
                elements[pos] = Element::Node(node);
            }
            Operator::Identifier => {
                let Element::Token(token) = &elements[pos] else {
                    unreachable!("locate only returns token positions");
                };
                let node = self
                    .context
                    .parse_definition_by_name(&token.text, Combinator::Or)?;
                elements[pos] = Element::Node(ConditionNode::subexpression(node));
            }
            Operator::Not => {
                if !elements.get(pos + 1).is_some_and(Element::is_node) {
                    return Err(missing_operand(&elements[pos]));
                }
                let Element::Node(operand) = elements.remove(pos + 1) else {
                    unreachable!("operand checked above");
                };
                elements[pos] = Element::Node(ConditionNode::not(operand));
            }
            Operator::And | Operator::Or => {
                let combinator = if operator == Operator::And {
                    Combinator::And
                } else {
                    Combinator::Or
                };
                let has_operands = pos > 0
                    && elements[pos - 1].is_node()
                    && elements.get(pos + 1).is_some_and(Element::is_node);
                if !has_operands {
                    return Err(missing_operand(&elements[pos]));
                }
                let Element::Node(rhs) = elements.remove(pos + 1) else {
                    unreachable!("operands checked above");
                };
                elements.remove(pos);
                let Element::Node(lhs) = elements.remove(pos - 1) else {
                    unreachable!("operands checked above");
                };
                elements.insert(pos - 1, Element::Node(combinator.combine(lhs, rhs)));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Reduction internals
// =============================================================================

/// Item of the working sequence: a raw token or an already reduced node.
#[derive(Debug)]
enum Element {
    Token(Token),
    Node(ConditionNode),
}

impl Element {
    fn is_node(&self) -> bool {
        matches!(self, Element::Node(_))
    }

    fn is_token(&self, kind: TokenKind) -> bool {
        matches!(self, Element::Token(t) if t.is_kind(kind))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    AllOf,
    OneOf,
    Identifier,
    Not,
    And,
    Or,
}

/// Operators in precedence order, tightest first.
const SEARCH_OPERATORS: &[(TokenKind, Operator)] = &[
    (TokenKind::All, Operator::AllOf),
    (TokenKind::One, Operator::OneOf),
    (TokenKind::Identifier, Operator::Identifier),
    (TokenKind::Not, Operator::Not),
    (TokenKind::And, Operator::And),
    (TokenKind::Or, Operator::Or),
];

impl Operator {
    /// Leftmost occurrence to reduce next.
    ///
    /// A `not` whose operand is already a node is preferred, so chains like
    /// `not not x` reduce from the inside out.
    fn locate(self, elements: &[Element], kind: TokenKind) -> Option<usize> {
        if self == Operator::Not {
            let ready = (0..elements.len()).find(|&i| {
                elements[i].is_token(kind) && elements.get(i + 1).is_some_and(Element::is_node)
            });
            if ready.is_some() {
                return ready;
            }
        }
        find_token(elements, kind)
    }
}

fn find_token(elements: &[Element], kind: TokenKind) -> Option<usize> {
    elements.iter().position(|e| e.is_token(kind))
}

/// Index of the parenthesis closing the one at `open`.
fn matching_paren(elements: &[Element], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, element) in elements.iter().enumerate().skip(open) {
        if element.is_token(TokenKind::LParen) {
            depth += 1;
        } else if element.is_token(TokenKind::RParen) {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

fn token_position(element: &Element) -> usize {
    match element {
        Element::Token(t) => t.position,
        Element::Node(_) => 0,
    }
}

fn missing_operand(element: &Element) -> ConditionError {
    match element {
        Element::Token(t) => ConditionError::MissingOperand {
            operator: t.text.clone(),
            position: t.position,
        },
        Element::Node(_) => ConditionError::AmbiguousRoot {
            count: 0,
            position: None,
        },
    }
}

fn into_root(mut elements: Vec<Element>) -> Result<ConditionNode> {
    if matches!(elements.as_slice(), [Element::Node(_)])
        && let Some(Element::Node(root)) = elements.pop()
    {
        return Ok(root);
    }

    let position = elements.iter().find_map(|e| match e {
        Element::Token(t) => Some(t.position),
        Element::Node(_) => None,
    });
    Err(ConditionError::AmbiguousRoot {
        count: elements.len(),
        position,
    })
}

// =============================================================================
// Tests
// =============================================================================
