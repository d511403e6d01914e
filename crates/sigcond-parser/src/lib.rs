//! # sigcond-parser
//!
//! A compiler for Sigma rule `condition` expressions.
//!
//! A condition string such as
//! `selection and not 1 of filter_* | count(user) by host > 5` is turned into
//! a [`ParsedCondition`]: a boolean search tree over the rule's named
//! definitions plus an optional aggregation clause.
//!
//! - **Tokenizer**: ordered lexical rules, case-insensitive keywords,
//!   1-based character positions on every token
//! - **Search expressions**: `and`, `or`, `not`, `1 of`, `all of`,
//!   parenthesized groups, with precedence `not` > `and` > `or`
//! - **Quantifiers**: `them`, wildcard patterns (`filter_*`) and single names
//! - **Aggregations**: `count`, `min`, `max`, `avg`, `sum` with `by` and a
//!   comparison, and `near` with `and` / `and not` search ids
//! - **Rule documents**: multi-document YAML files and directories, resolved
//!   through [`DetectionContext`]
//!
//! Definitions are resolved through the [`RuleContext`] trait, so the parser
//! can be driven by any rule representation.
//!
//! ## Quick Start
//!
//! ```rust
//! use sigcond_parser::parse_rules_yaml;
//!
//! let yaml = r#"
//! title: Detect Whoami
//! detection:
//!     selection:
//!         Image: '\whoami.exe'
//!     filter:
//!         User: SYSTEM
//!     condition: selection and not filter | count() by host > 5
//! "#;
//!
//! let set = parse_rules_yaml(yaml).unwrap();
//! let rule = &set.rules[0];
//! let compiled = rule.detection.compile_conditions(Default::default());
//! let parsed = compiled[0].as_ref().unwrap();
//! assert!(parsed.aggregation.is_some());
//! println!("{parsed}");
//! ```
//!
//! ## Tokens only
//!
//! ```rust
//! use sigcond_parser::{TokenKind, tokenize};
//!
//! let tokens = tokenize("1 of selection_*").unwrap();
//! assert_eq!(tokens[0].kind, TokenKind::One);
//! assert_eq!(tokens[1].position, 6);
//! ```

pub mod aggregation;
pub mod ast;
pub mod condition;
pub mod context;
pub mod detection;
pub mod error;
pub mod quantifier;
pub mod rule;
pub mod token;

// Re-export the most commonly used types and functions at crate root
pub use aggregation::parse_aggregation;
pub use ast::{
    AggregationDescriptor, AggregationFunction, Combinator, ComparisonOperator, ConditionNode,
    ParsedCondition, SearchLeaf, SearchValue,
};
pub use condition::{ConditionParser, DEFAULT_MAX_DEPTH, ParseOptions, parse_condition};
pub use context::RuleContext;
pub use detection::{Definition, DetectionContext};
pub use error::{ConditionError, ErrorKind, Result};
pub use quantifier::expand;
pub use rule::{
    RuleDetection, RuleSet, parse_rules_directory, parse_rules_file, parse_rules_path,
    parse_rules_yaml,
};
pub use token::{Token, TokenKind, tokenize};
