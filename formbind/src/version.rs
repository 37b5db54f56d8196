//! Version information display

/// Release version (set by build.rs, defaults to the package version)
pub const VERSION: &str = env!("FORMBIND_VERSION");

/// Git commit hash (set by build.rs)
pub const GIT_HASH: &str = env!("FORMBIND_GIT_HASH");

/// Git commit date (set by build.rs)
pub const GIT_DATE: &str = env!("FORMBIND_GIT_DATE");

/// Version line shown by `--version`
pub const LONG_VERSION: &str = concat!(
    env!("FORMBIND_VERSION"),
    " (",
    env!("FORMBIND_GIT_HASH"),
    " ",
    env!("FORMBIND_GIT_DATE"),
    ")"
);
