//! Trace log configuration, loaded from TOML.
//!
//! ```toml
//! compression = "zlib"      # "none" | "zlib"
//! include_traces = true
//! read_cache_entries = 0    # decoded-entry LRU size, 0 = off
//! sync_writes = true        # sync_data after every append / prune
//! ```
//!
//! Every key is optional; missing keys take the defaults above.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use shtrace_core::CompressionType;
use std::path::Path;

/// Settings for a [`crate::TraceLog`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TraceLogConfig {
    /// Codec applied to newly stored entries. Existing entries keep theirs.
    pub compression: CompressionType,
    /// When false, entries are stored with an empty trace sequence.
    pub include_traces: bool,
    /// Capacity of the decoded-entry read cache; `0` disables it.
    pub read_cache_entries: usize,
    /// Call `sync_data` after every append and prune.
    pub sync_writes: bool,
}

impl Default for TraceLogConfig {
    fn default() -> Self {
        Self {
            compression: CompressionType::Zlib,
            include_traces: true,
            read_cache_entries: 0,
            sync_writes: true,
        }
    }
}

impl TraceLogConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parse trace log config")
    }

    /// Read and parse a TOML file.
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Render as TOML (used by `shtrace-cli stat`).
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).context("serialize trace log config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(TraceLogConfig::from_toml_str("").unwrap(), TraceLogConfig::default());
    }

    #[test]
    fn keys_override_defaults() {
        let cfg = TraceLogConfig::from_toml_str(
            "compression = \"none\"\nread_cache_entries = 16\nsync_writes = false\n",
        )
        .unwrap();
        assert_eq!(cfg.compression, CompressionType::None);
        assert_eq!(cfg.read_cache_entries, 16);
        assert!(cfg.include_traces);
        assert!(!cfg.sync_writes);
    }

    #[test]
    fn unknown_keys_and_codecs_rejected() {
        assert!(TraceLogConfig::from_toml_str("compresion = \"zlib\"").is_err());
        assert!(TraceLogConfig::from_toml_str("compression = \"lz4\"").is_err());
    }

    #[test]
    fn toml_roundtrip() {
        let cfg = TraceLogConfig {
            read_cache_entries: 4,
            ..TraceLogConfig::default()
        };
        let text = cfg.to_toml_string().unwrap();
        assert_eq!(TraceLogConfig::from_toml_str(&text).unwrap(), cfg);
    }
}
