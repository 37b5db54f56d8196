//! Error types

use std::path::PathBuf;

/// Errors raised while binding a form
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    /// Error raised by a host policy, passed through unchanged
    #[error(transparent)]
    Policy(#[from] anyhow::Error),
}

/// Errors raised while loading a policy file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported policy format for {}: expected .toml, .yaml, .yml or .json", path.display())]
    UnknownFormat { path: PathBuf },

    #[error("invalid TOML policy: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid YAML policy: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid JSON policy: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid field kind pattern `{pattern}`: {source}")]
    KindPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("binding `{key}` carries a handler on <{kind}>; bindings hold plain data only")]
    BindingHandler { key: String, kind: String },

    #[error("binding `{key}` is not a valid node: {source}")]
    Binding {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}
