// src/config.rs
//! Service configuration, read from TOML with a few env overrides.
//!
//! ```toml
//! [dialogue]
//! map_path = "data/dialogue_map.json"   # optional, bundled map otherwise
//!
//! [resolver]
//! kind = "rest"                         # "rest" | "static" | "disabled"
//! base_url = "https://backend.example.com"
//! api_key = "ENV"                       # read from PRACTITIONER_API_KEY
//! timeout_secs = 10
//! static_path = "data/practitioners.json"
//! ```

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::dialogue_map::DialogueMap;

// --- env defaults & names ---
pub const DEFAULT_CONFIG_PATH: &str = "config/triage.toml";
pub const DEFAULT_RESOLVER_TIMEOUT_SECS: u64 = 10;

pub const ENV_CONFIG_PATH: &str = "TRIAGE_CONFIG_PATH";
pub const ENV_DIALOGUE_MAP_PATH: &str = "TRIAGE_DIALOGUE_MAP_PATH";
pub const ENV_PRACTITIONER_API_URL: &str = "PRACTITIONER_API_URL";
pub const ENV_PRACTITIONER_API_KEY: &str = "PRACTITIONER_API_KEY";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub dialogue: DialogueConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DialogueConfig {
    #[serde(default)]
    pub map_path: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolverKind {
    Rest,
    Static,
    #[default]
    Disabled,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    #[serde(default)]
    pub kind: ResolverKind,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Literal key, or "ENV" to read it from `PRACTITIONER_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub static_path: Option<String>,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_RESOLVER_TIMEOUT_SECS
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            kind: ResolverKind::default(),
            base_url: None,
            api_key: None,
            timeout_secs: DEFAULT_RESOLVER_TIMEOUT_SECS,
            static_path: None,
        }
    }
}

impl AppConfig {
    /// Load from `TRIAGE_CONFIG_PATH` or `config/triage.toml`, then apply env overrides.
    /// A missing file is not an error: defaults are used.
    pub fn load() -> Result<Self> {
        let path = std::env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut cfg = if path.exists() {
            Self::load_from_file(&path)?
        } else {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        cfg.apply_env_overrides();
        cfg.resolve_api_key()?;
        Ok(cfg)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let mut cfg: AppConfig = toml::from_str(toml_str)?;
        if cfg.resolver.timeout_secs == 0 {
            cfg.resolver.timeout_secs = DEFAULT_RESOLVER_TIMEOUT_SECS;
        }
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(p) = non_empty_env(ENV_DIALOGUE_MAP_PATH) {
            self.dialogue.map_path = Some(p);
        }
        if let Some(url) = non_empty_env(ENV_PRACTITIONER_API_URL) {
            self.resolver.base_url = Some(url);
        }
    }

    fn resolve_api_key(&mut self) -> Result<()> {
        let wants_env = self
            .resolver
            .api_key
            .as_deref()
            .is_some_and(|k| k.trim().eq_ignore_ascii_case("env"));
        if wants_env {
            let key = non_empty_env(ENV_PRACTITIONER_API_KEY)
                .ok_or_else(|| anyhow!("Missing {ENV_PRACTITIONER_API_KEY} env var"))?;
            self.resolver.api_key = Some(key);
        }
        Ok(())
    }

    /// The configured dialogue map, or the bundled one when no path is set.
    pub fn load_dialogue_map(&self) -> Result<DialogueMap> {
        match self.dialogue.map_path.as_deref() {
            Some(path) => DialogueMap::load_from_file(path),
            None => Ok(DialogueMap::bundled()),
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
