// SPDX-FileCopyrightText: 2026 SimpleMem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./simplemem.toml` > `~/.config/simplemem/simplemem.toml`
//! > `/etc/simplemem/simplemem.toml` with environment variable overrides via the
//! `SIMPLEMEM_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::SimpleMemConfig;

/// System-wide config file.
pub const SYSTEM_CONFIG: &str = "/etc/simplemem/simplemem.toml";

/// Config file in the working directory.
pub const LOCAL_CONFIG: &str = "simplemem.toml";

/// Config file in the user's XDG config directory, if one exists.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("simplemem/simplemem.toml"))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/simplemem/simplemem.toml`
/// 3. `~/.config/simplemem/simplemem.toml`
/// 4. `./simplemem.toml`
/// 5. `SIMPLEMEM_*` environment variables
pub fn load_config() -> Result<SimpleMemConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<SimpleMemConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SimpleMemConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<SimpleMemConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SimpleMemConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(SimpleMemConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG))
        .merge(env_provider())
}

/// Create the environment variable provider with explicit section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")`: key names contain underscores,
/// so `SIMPLEMEM_RETRIEVAL_K_BASE` must become `retrieval.k_base`, not `retrieval.k.base`.
pub(crate) fn env_provider() -> Env {
    Env::prefixed("SIMPLEMEM_").map(|key| map_env_key(key.as_str()).into())
}

const SECTIONS: [&str; 8] = [
    "system",
    "storage",
    "buffer",
    "compression",
    "index",
    "retrieval",
    "capabilities",
    "openai",
];

/// Map a lowercased, prefix-stripped env var name to a dotted config key.
fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_sections() {
        assert_eq!(map_env_key("retrieval_k_base"), "retrieval.k_base");
        assert_eq!(map_env_key("openai_api_key"), "openai.api_key");
        assert_eq!(
            map_env_key("compression_quality_threshold"),
            "compression.quality_threshold"
        );
        assert_eq!(map_env_key("unrelated"), "unrelated");
    }

    #[test]
    fn env_overrides_file_values() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("custom.toml", "[retrieval]\nk_base = 3\n")?;
            jail.set_env("SIMPLEMEM_RETRIEVAL_K_BASE", "9");
            jail.set_env("SIMPLEMEM_BUFFER_WINDOW_SIZE", "12");
            let config = load_config_from_path(Path::new("custom.toml"))?;
            assert_eq!(config.retrieval.k_base, 9);
            assert_eq!(config.buffer.window_size, 12);
            Ok(())
        });
    }
}
