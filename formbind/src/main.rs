//! formbind - bind declarative UI form trees
//!
//! This is the main CLI entry point: it loads the policy and the starting
//! state, binds every input tree and prints the result.

mod batch;
mod cli;
mod version;

use std::io::{self, Read, Write};
use std::path::Path;
use std::process::ExitCode;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context};
use clap::Parser;
use strum::IntoEnumIterator;
use tracing_subscriber::EnvFilter;

use formbind_core::{ConfiguredPolicy, FormState, OutputFormat, PolicyConfig, RenderOptions};

use batch::{bind_files_parallel, expand_globs, parse_change, BindJob};
use cli::Args;

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(e) = run(args) {
        eprintln!("error: {:#}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Log to stderr; RUST_LOG wins over --verbose
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Determine if color should be used based on mode and environment
fn should_use_color(mode: &str) -> bool {
    match mode {
        "always" => true,
        "never" => false,
        _ => atty::is(atty::Stream::Stdout) && std::env::var("NO_COLOR").is_err(),
    }
}

fn load_policy(path: Option<&Path>) -> anyhow::Result<ConfiguredPolicy> {
    let config = match path {
        Some(path) => PolicyConfig::load(path)?,
        None => PolicyConfig::default(),
    };
    Ok(config.into_policy()?)
}

fn load_state(path: Option<&Path>, processing: bool) -> anyhow::Result<FormState> {
    let mut state = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read state {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("invalid state {}", path.display()))?
        }
        None => FormState::new(),
    };
    if processing {
        state.is_form_processing = true;
    }
    Ok(state)
}

fn run(args: Args) -> anyhow::Result<()> {
    tracing::debug!(
        version = version::VERSION,
        commit = version::GIT_HASH,
        date = version::GIT_DATE,
        "starting formbind"
    );

    // Validate output format
    let format = OutputFormat::from_str(&args.output).map_err(|_| {
        let valid: Vec<String> = OutputFormat::iter().map(|f| f.to_string()).collect();
        anyhow!("invalid format '{}'. Valid formats: {}", args.output, valid.join(", "))
    })?;

    // Determine color mode
    let use_color = !args.no_color && format == OutputFormat::Markup && should_use_color(&args.color);

    let changes = args
        .set
        .iter()
        .map(|change| parse_change(change))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let job = BindJob {
        policy: load_policy(args.policy.as_deref())?,
        state: load_state(args.state.as_deref(), args.processing)?,
        changes,
        format,
        render: RenderOptions::new()
            .with_color(use_color)
            .with_max_depth(args.depth)
            .with_pretty_print(!args.compact),
    };

    let files = expand_globs(&args.files);

    if files.is_empty() {
        if atty::is(atty::Stream::Stdin) {
            eprintln!("Usage: formbind <files...> [OPTIONS]");
            eprintln!("   or: cat form.json | formbind [OPTIONS]");
            eprintln!("\nUse --help for more information.");
            bail!("no input files");
        }

        let mut source = String::new();
        io::stdin().read_to_string(&mut source)?;
        let output = job.run(&source, "<stdin>")?;
        emit(&mut io::stdout().lock(), &output).context("cannot write output")?;
        return Ok(());
    }

    // Configure thread pool
    let concurrency = args.concurrency.unwrap_or_else(num_cpus::get);
    rayon::ThreadPoolBuilder::new()
        .num_threads(concurrency)
        .build_global()
        .ok();

    let results = bind_files_parallel(&files, &job);
    let show_headers = results.len() > 1;
    let mut failures = 0usize;
    let mut stdout = io::stdout().lock();

    for (file, result) in results {
        match result {
            Ok(output) => {
                if show_headers {
                    writeln!(stdout, "==> {} <==", file).context("cannot write output")?;
                }
                emit(&mut stdout, &output).context("cannot write output")?;
            }
            Err(e) => {
                failures += 1;
                eprintln!("error: {}: {:#}", file, e);
            }
        }
    }

    if failures > 0 {
        bail!("{} of {} files failed", failures, files.len());
    }
    Ok(())
}

/// Write rendered output, making sure it ends with a newline
fn emit(out: &mut impl Write, output: &str) -> io::Result<()> {
    out.write_all(output.as_bytes())?;
    if !output.ends_with('\n') {
        out.write_all(b"\n")?;
    }
    out.flush()
}
