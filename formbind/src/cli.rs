//! CLI argument parsing using clap

use std::path::PathBuf;

use clap::Parser;

use crate::version::LONG_VERSION;

/// Bind declarative UI form trees against form state and a host policy
#[derive(Parser, Debug)]
#[command(name = "formbind")]
#[command(author, version = LONG_VERSION, about, long_about = None)]
#[command(after_help = r#"EXAMPLES:
    # Bind a form and show the result as markup
    formbind forms/signup.json --policy policy.toml

    # Bind every form in a directory, emitting JSON
    formbind "forms/**/*.json" -p policy.yaml -o json

    # Start from saved state, mark the form as submitting
    formbind signup.json --state state.json --processing

    # Simulate user input and print the resulting state
    formbind signup.json --set email=a@b.c --set age=42 -o state

    # Read the tree from stdin
    cat signup.json | formbind -p policy.toml
"#)]
pub struct Args {
    /// Tree files to bind (JSON; supports glob patterns like "forms/**/*.json")
    #[arg()]
    pub files: Vec<String>,

    /// Host policy file (.toml, .yaml, .yml or .json)
    #[arg(short = 'p', long = "policy")]
    pub policy: Option<PathBuf>,

    /// Initial form state (JSON: {"fields": {...}, "isFormProcessing": false})
    #[arg(short = 's', long = "state")]
    pub state: Option<PathBuf>,

    /// Mark the form as processing (disables submit controls)
    #[arg(long = "processing")]
    pub processing: bool,

    /// Change a field after binding: field=value (value parsed as JSON, else text)
    #[arg(long = "set", value_name = "FIELD=VALUE")]
    pub set: Vec<String>,

    /// Output format: markup (default), json, state
    #[arg(short = 'o', long = "output", default_value = "markup")]
    pub output: String,

    /// Maximum markup depth to render
    #[arg(short = 'd', long = "depth")]
    pub depth: Option<usize>,

    /// Compact output (no indentation)
    #[arg(long = "compact")]
    pub compact: bool,

    /// Color output: auto (default), always, never
    #[arg(long = "color", default_value = "auto")]
    pub color: String,

    /// Disable color output
    #[arg(long = "no-color")]
    pub no_color: bool,

    /// Number of parallel workers
    #[arg(short = 'c', long = "concurrency")]
    pub concurrency: Option<usize>,

    /// Show verbose output (debug logging unless RUST_LOG is set)
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_command_line() {
        let args = Args::try_parse_from([
            "formbind",
            "a.json",
            "forms/*.json",
            "-p",
            "policy.toml",
            "--set",
            "email=x",
            "--set",
            "age=3",
            "-o",
            "state",
            "--processing",
            "-c",
            "2",
        ])
        .unwrap();

        assert_eq!(args.files, vec!["a.json", "forms/*.json"]);
        assert_eq!(args.policy, Some(PathBuf::from("policy.toml")));
        assert_eq!(args.set, vec!["email=x", "age=3"]);
        assert_eq!(args.output, "state");
        assert!(args.processing);
        assert_eq!(args.concurrency, Some(2));
    }

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["formbind"]).unwrap();
        assert!(args.files.is_empty());
        assert_eq!(args.output, "markup");
        assert_eq!(args.color, "auto");
        assert!(!args.compact);
        assert!(args.depth.is_none());
    }
}
