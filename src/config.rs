//! Style and behavior configuration.
//!
//! All styling is injected into the renderer and exporters through this
//! struct rather than read from process-wide state, so tests can run with
//! whatever decoration they need.

use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize, Clone)]
pub struct DocConfig {
    /// Decoration wrapped around list-item keys (default: bold).
    #[serde(default = "default_key_style")]
    pub key_style: String,
    /// Decoration wrapped around list-item values (default: none).
    #[serde(default)]
    pub value_style: String,
    /// List prefixes per nesting level.
    #[serde(default = "default_level1")]
    pub level1: String,
    #[serde(default = "default_level2")]
    pub level2: String,
    #[serde(default = "default_level3")]
    pub level3: String,
    /// Sort rules alphabetically by display name before rendering.
    #[serde(default = "default_true")]
    pub sort_rules: bool,
    /// Emit the table-of-contents section.
    #[serde(default = "default_true")]
    pub toc: bool,
    /// Directory the diagram images are written to, created if absent.
    #[serde(default = "default_image_dir")]
    pub image_dir: PathBuf,
    /// Upper bound on one external renderer invocation.
    #[serde(default = "default_dot_timeout")]
    pub dot_timeout_secs: u64,
}

fn default_key_style() -> String {
    "**".to_string()
}

fn default_level1() -> String {
    "*   ".to_string()
}

fn default_level2() -> String {
    "    * ".to_string()
}

fn default_level3() -> String {
    "        * ".to_string()
}

fn default_true() -> bool {
    true
}

fn default_image_dir() -> PathBuf {
    PathBuf::from("images")
}

fn default_dot_timeout() -> u64 {
    30
}

impl Default for DocConfig {
    fn default() -> Self {
        Self {
            key_style: default_key_style(),
            value_style: String::new(),
            level1: default_level1(),
            level2: default_level2(),
            level3: default_level3(),
            sort_rules: true,
            toc: true,
            image_dir: default_image_dir(),
            dot_timeout_secs: default_dot_timeout(),
        }
    }
}

impl DocConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .build()?;

        let config: DocConfig = settings.try_deserialize()?;
        Ok(config)
    }

    /// Loads the file when it exists, otherwise the documented defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            debug!(
                "no configuration file at {}; using defaults",
                path.as_ref().display()
            );
            Ok(Self::default())
        }
    }

    pub(crate) fn level_prefix(&self, level: usize) -> &str {
        match level {
            1 => &self.level1,
            2 => &self.level2,
            3 => &self.level3,
            _ => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let config = DocConfig::default();
        assert_eq!(config.key_style, "**");
        assert_eq!(config.value_style, "");
        assert!(config.sort_rules);
        assert!(config.toc);
        assert_eq!(config.image_dir, PathBuf::from("images"));
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(file, "sort_rules = false\nkey_style = \"__\"").unwrap();
        let config = DocConfig::from_file(file.path()).unwrap();
        assert!(!config.sort_rules);
        assert_eq!(config.key_style, "__");
        assert!(config.toc);
        assert_eq!(config.level1, "*   ");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = DocConfig::load_or_default("definitely/not/here.toml").unwrap();
        assert!(config.sort_rules);
    }
}
