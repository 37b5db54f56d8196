//! Parallel binding of tree files using Rayon
//!
//! Trees hold single-threaded handlers, so nothing bound crosses a thread:
//! every worker parses, binds and renders its own file and hands back text.

use std::path::Path;

use anyhow::{bail, Context};
use rayon::prelude::*;
use serde_json::Value;

use formbind_core::{
    apply_recorded_disabled, bind_form, dispatch_change, render_json, render_markup, render_state, ConfiguredPolicy,
    FormState, Node, OutputFormat, RenderOptions,
};

/// Everything needed to bind one tree, shared read-only by all workers
#[derive(Debug, Clone)]
pub struct BindJob {
    pub policy: ConfiguredPolicy,
    /// Starting state, cloned for every tree
    pub state: FormState,
    /// Changes dispatched after binding, in order
    pub changes: Vec<(String, Value)>,
    pub format: OutputFormat,
    pub render: RenderOptions,
}

impl BindJob {
    /// Bind one JSON tree and render it in the requested format
    pub fn run(&self, source: &str, origin: &str) -> anyhow::Result<String> {
        let tree: Node = serde_json::from_str(source).context("invalid tree")?;
        let state = self.state.clone().shared();

        let mut bound = bind_form(&tree, &state, &self.policy)?;

        if !self.changes.is_empty() {
            for (field, value) in &self.changes {
                if !dispatch_change(&bound, field, value.clone()) {
                    tracing::warn!(file = origin, field = %field, "no bound field to change");
                }
            }
            bound = apply_recorded_disabled(&bound);
        }

        let pretty = self.render.pretty_print;
        let output = match self.format {
            OutputFormat::Json => render_json(&bound, pretty)?,
            OutputFormat::Markup => render_markup(&bound, &self.render),
            OutputFormat::State => render_state(&state.borrow(), pretty)?,
        };
        Ok(output)
    }

    /// Read and bind one file
    pub fn run_file(&self, path: &Path) -> anyhow::Result<String> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        self.run(&source, &path.to_string_lossy())
    }
}

/// Bind files in parallel, keeping input order in the results
pub fn bind_files_parallel(files: &[String], job: &BindJob) -> Vec<(String, anyhow::Result<String>)> {
    files
        .par_iter()
        .map(|file| (file.clone(), job.run_file(Path::new(file))))
        .collect()
}

/// Expand glob patterns to file paths
pub fn expand_globs(patterns: &[String]) -> Vec<String> {
    let mut files = Vec::new();

    for pattern in patterns {
        if pattern.contains('*') || pattern.contains('?') {
            match glob::glob(pattern) {
                Ok(paths) => {
                    for entry in paths.flatten() {
                        if entry.is_file() {
                            if let Some(path) = entry.to_str() {
                                files.push(path.to_string());
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(pattern = %pattern, "invalid glob pattern: {}", e);
                }
            }
        } else {
            // Not a glob, use as-is
            files.push(pattern.clone());
        }
    }

    files
}

/// Parse a `field=value` change; the value is JSON when it parses, else text
pub fn parse_change(change: &str) -> anyhow::Result<(String, Value)> {
    let (field, raw) = match change.split_once('=') {
        Some(parts) => parts,
        None => bail!("invalid change '{}': expected FIELD=VALUE", change),
    };
    if field.is_empty() {
        bail!("invalid change '{}': empty field name", change);
    }

    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((field.to_string(), value))
}
