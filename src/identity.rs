//! Acting-user resolution for maint commands.
//!
//! Every command that changes an activity records who acted. Rather than
//! requiring `--as` on every invocation, identity is resolved through a chain:
//!
//! 1. `--as <identity>`: explicit per-command override
//! 2. `MAINT_IDENTITY` env var: process/session level
//! 3. `identity` in `~/.maint/config.toml`: default for a single-user install
//!
//! The result is an opaque, non-empty user id. No authentication happens here.

use std::env;

use crate::config::Config;

/// Error message shown when identity cannot be resolved.
pub const IDENTITY_REQUIRED: &str = "identity required: pass --as <identity>, \
    set MAINT_IDENTITY, or add `identity = \"...\"` to ~/.maint/config.toml";

/// Resolve the acting identity from the tiered resolution chain.
///
/// Checks in order: explicit `--as` value, `MAINT_IDENTITY` env var,
/// the config's `identity`. Blank values are skipped.
///
/// # Errors
///
/// Returns [`IDENTITY_REQUIRED`] when none of the sources yield a value.
pub fn resolve_identity(explicit: Option<&str>, config: &Config) -> Result<String, String> {
    resolve_from(explicit, env::var("MAINT_IDENTITY").ok(), config)
}

fn resolve_from(
    explicit: Option<&str>,
    from_env: Option<String>,
    config: &Config,
) -> Result<String, String> {
    // 1. Explicit --as flag.
    if let Some(id) = explicit.map(str::trim)
        && !id.is_empty()
    {
        return Ok(id.to_string());
    }

    // 2. MAINT_IDENTITY environment variable.
    if let Some(id) = from_env
        && !id.trim().is_empty()
    {
        return Ok(id.trim().to_string());
    }

    // 3. Config file.
    if let Some(id) = config.identity.as_deref().map(str::trim)
        && !id.is_empty()
    {
        return Ok(id.to_string());
    }

    Err(IDENTITY_REQUIRED.to_string())
}
