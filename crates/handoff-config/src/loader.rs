// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./handoff.toml` > `~/.config/handoff/handoff.toml` > `/etc/handoff/handoff.toml`
//! with environment variable overrides via `HANDOFF_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::HandoffConfig;

/// System-wide configuration file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/handoff/handoff.toml";

/// Configuration file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "handoff.toml";

/// Sections whose keys may be overridden from the environment.
const ENV_SECTIONS: &[&str] = &[
    "service",
    "rate_limit",
    "queue",
    "session",
    "providers",
    "sla",
    "handoff",
    "agents",
];

/// Path of the per-user configuration file, if a config dir exists.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("handoff").join(LOCAL_CONFIG_FILE))
}

/// Build the layered Figment without extracting it.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/handoff/handoff.toml` (system-wide)
/// 3. `~/.config/handoff/handoff.toml` (user XDG config)
/// 4. `./handoff.toml` (local directory)
/// 5. `HANDOFF_*` environment variables
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(HandoffConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_FILE))
        .merge(env_provider())
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
pub fn load_config() -> Result<HandoffConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no file lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<HandoffConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(HandoffConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<HandoffConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(HandoffConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Environment provider mapping `HANDOFF_<SECTION>_<KEY>` to `<section>.<key>`.
///
/// Section names themselves contain underscores (`rate_limit`), so the
/// mapping matches known section prefixes instead of splitting on `_`.
/// `HANDOFF_RATE_LIMIT_SHORT_WINDOW_REQUESTS` becomes
/// `rate_limit.short_window_requests`.
fn env_provider() -> Env {
    Env::prefixed("HANDOFF_").map(|key| map_env_key(&key.as_str().to_ascii_lowercase()).into())
}

/// Maps a lowercased, prefix-stripped env var name to a dotted config path.
pub(crate) fn map_env_key(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            if !rest.is_empty() {
                return format!("{section}.{rest}");
            }
        }
    }
    key.to_string()
}
