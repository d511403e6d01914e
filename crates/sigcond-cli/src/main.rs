use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use serde::Serialize;
use sigcond_parser::{
    ConditionError, ConditionParser, DEFAULT_MAX_DEPTH, ErrorKind, ParseOptions, ParsedCondition,
    RuleSet, parse_rules_path, parse_rules_yaml, tokenize,
};

#[derive(Parser)]
#[command(name = "sigcond")]
#[command(about = "Compile Sigma rule conditions into parse trees")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Deepest parenthesis nesting accepted in a condition
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// Pretty-print JSON output
    #[arg(short, long, global = true)]
    pretty: bool,

    /// Log more detail to stderr (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Tokenize a condition expression and print the tokens as JSON
    Tokens {
        /// The condition expression
        expr: String,
    },

    /// Compile a condition expression against the definitions of a rule
    Condition {
        /// The condition expression
        expr: String,

        /// Sigma rule file providing the definitions (the first rule is used)
        #[arg(short, long)]
        rule: PathBuf,
    },

    /// Compile every condition of a rule file or directory (`-` reads stdin)
    ///
    /// Prints one JSON record per condition. All conditions are reported
    /// before the exit status is decided.
    Rule {
        /// Path to a Sigma rule file, a directory of rules, or `-`
        path: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let options = ParseOptions::default().with_max_depth(cli.max_depth);
    match cli.command {
        Commands::Tokens { expr } => cmd_tokens(&expr, cli.pretty),
        Commands::Condition { expr, rule } => cmd_condition(&expr, &rule, options, cli.pretty),
        Commands::Rule { path } => cmd_rule(&path, options, cli.pretty),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_tokens(expr: &str, pretty: bool) {
    match tokenize(expr) {
        Ok(tokens) => print_json(&tokens, pretty),
        Err(e) => {
            print_json(&ErrorReport::from(&e), pretty);
            process::exit(1);
        }
    }
}

fn cmd_condition(expr: &str, rule_path: &Path, options: ParseOptions, pretty: bool) {
    let set = load_rules(rule_path);
    let Some(rule) = set.rules.first() else {
        eprintln!("No rule with a detection section in {}", rule_path.display());
        process::exit(1);
    };

    match ConditionParser::with_options(&rule.detection, options).parse(expr) {
        Ok(parsed) => print_json(&parsed, pretty),
        Err(e) => {
            print_json(&ErrorReport::from(&e), pretty);
            process::exit(1);
        }
    }
}

fn cmd_rule(path: &Path, options: ParseOptions, pretty: bool) {
    let set = load_rules(path);
    let mut failed = 0usize;
    let mut total = 0usize;

    for (index, rule) in set.rules.iter().enumerate() {
        let label = rule.label(index);
        let results = rule.detection.compile_conditions(options);
        for (condition, result) in rule.detection.conditions().iter().zip(&results) {
            total += 1;
            let report = match result {
                Ok(parsed) => ConditionReport {
                    rule: &label,
                    condition,
                    compiled: Some(parsed),
                    error: None,
                },
                Err(e) => {
                    failed += 1;
                    log::warn!("{label}: '{condition}': {e}");
                    ConditionReport {
                        rule: &label,
                        condition,
                        compiled: None,
                        error: Some(ErrorReport::from(e)),
                    }
                }
            };
            print_json(&report, pretty);
        }
    }

    eprintln!(
        "Compiled {total} condition(s) from {} rule(s): {failed} failed, {} document error(s)",
        set.rules.len(),
        set.errors.len()
    );
    if failed > 0 || !set.errors.is_empty() {
        process::exit(1);
    }
}

// ---------------------------------------------------------------------------
// Output records
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ErrorReport {
    kind: ErrorKind,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    position: Option<usize>,
}

impl From<&ConditionError> for ErrorReport {
    fn from(e: &ConditionError) -> Self {
        ErrorReport {
            kind: e.kind(),
            message: e.to_string(),
            position: e.position(),
        }
    }
}

#[derive(Serialize)]
struct ConditionReport<'a> {
    rule: &'a str,
    condition: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    compiled: Option<&'a ParsedCondition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorReport>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn load_rules(path: &Path) -> RuleSet {
    let loaded = if path.as_os_str() == "-" {
        let mut input = String::new();
        if let Err(e) = io::stdin().read_to_string(&mut input) {
            eprintln!("Error reading stdin: {e}");
            process::exit(1);
        }
        parse_rules_yaml(&input)
    } else {
        parse_rules_path(path)
    };

    let set = match loaded {
        Ok(set) => set,
        Err(e) => {
            eprintln!("Error loading rules from {}: {e}", path.display());
            process::exit(1);
        }
    };
    print_warnings(&set.errors);
    set
}

fn print_warnings(errors: &[String]) {
    if !errors.is_empty() {
        eprintln!("Warnings:");
        for err in errors {
            eprintln!("  - {err}");
        }
    }
}

fn print_json(value: &impl Serialize, pretty: bool) {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    match json {
        Ok(j) => println!("{j}"),
        Err(e) => {
            eprintln!("JSON serialization error: {e}");
            process::exit(1);
        }
    }
}
