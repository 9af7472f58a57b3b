//! Agent configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (APPSHELL_*)
//! 2. TOML config file (if APPSHELL_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! The loaded [`AppConfig`] is immutable; the agent takes it by value at
//! construction time.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

mod validation;

pub use validation::ConfigError;

/// How a manifest subset is written during install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstallPolicy {
    /// Every asset must be fetched before any is stored; one failure aborts install.
    Atomic,
    /// Each asset is stored on its own; failures are logged and skipped.
    BestEffort,
}

/// Agent configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (APPSHELL_*)
/// 2. TOML config file (if APPSHELL_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Release label; bumped on every deploy that changes cached content.
    ///
    /// Set via APPSHELL_VERSION environment variable.
    #[serde(default = "default_version")]
    pub version: String,

    /// Optional prefix joined to the version to name the cache generation.
    #[serde(default)]
    pub cache_prefix: Option<String>,

    /// Application origin; relative manifest entries resolve against it.
    ///
    /// Set via APPSHELL_BASE_URL environment variable.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// App-shell assets the application cannot boot without.
    #[serde(default = "default_critical_assets")]
    pub critical_assets: Vec<String>,

    /// Third-party bundles worth caching but not worth failing install over.
    #[serde(default = "default_supplementary_assets")]
    pub supplementary_assets: Vec<String>,

    #[serde(default = "default_critical_policy")]
    pub critical_policy: InstallPolicy,

    #[serde(default = "default_supplementary_policy")]
    pub supplementary_policy: InstallPolicy,

    /// Host substrings whose traffic always goes straight to the network.
    ///
    /// Set via APPSHELL_BYPASS_DOMAINS environment variable (`[a,b]` list).
    #[serde(default = "default_bypass_domains")]
    pub bypass_domains: Vec<String>,

    /// Ask the host to activate a freshly installed version immediately.
    #[serde(default = "default_true")]
    pub skip_waiting: bool,

    /// Take control of already-open clients once activated.
    #[serde(default = "default_true")]
    pub claim_clients: bool,

    /// Document served to failed navigations when it is cached. Off by default.
    #[serde(default)]
    pub offline_document: Option<String>,

    /// Path to SQLite cache database.
    ///
    /// Set via APPSHELL_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for network requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Network request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Largest response body the agent will store, in bytes.
    ///
    /// Larger responses are still served; they are just never cached.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

fn default_version() -> String {
    "v1".into()
}

fn default_base_url() -> String {
    "http://localhost:8080/".into()
}

fn default_critical_assets() -> Vec<String> {
    vec![".".into(), "manifest.json".into(), "icon-192.png".into(), "icon-512.png".into()]
}

fn default_supplementary_assets() -> Vec<String> {
    vec![
        "https://cdnjs.cloudflare.com/ajax/libs/jspdf/2.5.1/jspdf.umd.min.js".into(),
        "https://cdn.jsdelivr.net/npm/@zxing/browser@latest/umd/zxing-browser.min.js".into(),
    ]
}

fn default_critical_policy() -> InstallPolicy {
    InstallPolicy::Atomic
}

fn default_supplementary_policy() -> InstallPolicy {
    InstallPolicy::BestEffort
}

fn default_bypass_domains() -> Vec<String> {
    vec![
        "api.hacienda.go.cr".into(),
        "vpic.nhtsa.dot.gov".into(),
        "firestore.googleapis.com".into(),
        "identitytoolkit.googleapis.com".into(),
        "securetoken.googleapis.com".into(),
        "firebaseio.com".into(),
    ]
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./appshell-cache.sqlite")
}

fn default_user_agent() -> String {
    "appshell/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    10_485_760 // 10MB
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            cache_prefix: None,
            base_url: default_base_url(),
            critical_assets: default_critical_assets(),
            supplementary_assets: default_supplementary_assets(),
            critical_policy: default_critical_policy(),
            supplementary_policy: default_supplementary_policy(),
            bypass_domains: default_bypass_domains(),
            skip_waiting: true,
            claim_clients: true,
            offline_document: None,
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Name of the cache generation this version owns.
    pub fn generation_name(&self) -> String {
        match self.cache_prefix.as_deref().map(str::trim) {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}-{}", self.version),
            _ => self.version.clone(),
        }
    }

    /// Parsed application base URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `base_url` does not parse.
    pub fn base(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.base_url)
            .map_err(|e| ConfigError::Invalid { field: "base_url".into(), reason: e.to_string() })
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `APPSHELL_`
    /// 2. TOML file from `APPSHELL_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("APPSHELL_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("APPSHELL_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
