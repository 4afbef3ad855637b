//! Configuration loading.
//!
//! Sources, lowest to highest precedence: built-in defaults,
//! `~/.cleanbites/config.toml`, environment variables, CLI flags (applied by
//! the binary). Credentials are never compiled in; the Gemini key comes from
//! the config file or `GEMINI_API_KEY` / `GOOGLE_API_KEY`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CleanBitesError, Result};
use crate::providers::gemini::{DEFAULT_GEMINI_MODEL, DEFAULT_MAX_OUTPUT_TOKENS, GEMINI_API_BASE};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub gemini: GeminiConfig,
    pub cache: CacheConfig,
    pub prompts: PromptConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub bind: String,
    pub port: u16,
    /// Origins allowed by CORS.
    pub allowed_origins: Vec<String>,
    /// Request body limit, sized for label photos.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8000,
            allowed_origins: vec![
                "https://cleanbitesai.vercel.app".to_string(),
                "http://localhost:3000".to_string(),
            ],
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Where records live on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: Config::dir().join("data"),
        }
    }
}

impl StorageConfig {
    pub fn users_dir(&self) -> PathBuf {
        self.data_dir.join("users")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }

    pub fn food_dir(&self) -> PathBuf {
        self.data_dir.join("food")
    }
}

/// Gemini API settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    /// OAuth bearer token, used only when no API key is available.
    pub access_token: Option<String>,
    pub model: String,
    pub api_base: String,
    /// HTTP request timeout.
    pub request_timeout_secs: u64,
    pub max_output_tokens: u32,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            access_token: None,
            model: DEFAULT_GEMINI_MODEL.to_string(),
            api_base: GEMINI_API_BASE.to_string(),
            request_timeout_secs: 120,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("GeminiConfig")
            .field("api_key", &redact(&self.api_key))
            .field("access_token", &redact(&self.access_token))
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_output_tokens", &self.max_output_tokens)
            .finish()
    }
}

/// Response cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Upper bound for one completion call.
    pub compute_timeout_secs: u64,
    /// Serialize concurrent misses for the same key.
    pub per_key_locking: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            compute_timeout_secs: 90,
            per_key_locking: true,
        }
    }
}

/// Optional prompt template files; built-in templates are used otherwise.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub analysis_path: Option<PathBuf>,
    pub extraction_path: Option<PathBuf>,
}

impl Config {
    /// `~/.cleanbites`, or `./.cleanbites` when there is no home directory.
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".cleanbites")
    }

    /// Default config file location.
    pub fn path() -> PathBuf {
        Self::dir().join("config.toml")
    }

    /// Load from `path` (defaults if absent) and apply process environment
    /// overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let default_path = Self::path();
        let path = path.unwrap_or(&default_path);
        let mut config = Self::load_file(path)?;
        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Parse a TOML config file. A missing file yields the defaults.
    pub fn load_file(path: &Path) -> Result<Self> {
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(CleanBitesError::Config(format!(
                    "Failed to read config at {}: {e}",
                    path.display()
                )))
            }
        };
        toml::from_str(&data).map_err(|e| {
            CleanBitesError::Config(format!("Failed to parse config at {}: {e}", path.display()))
        })
    }

    /// Apply `CLEANBITES_*` overrides read through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(bind) = get("CLEANBITES_BIND") {
            self.server.bind = bind;
        }
        if let Some(port) = get("CLEANBITES_PORT") {
            self.server.port = port.trim().parse().map_err(|_| {
                CleanBitesError::Config(format!("CLEANBITES_PORT is not a valid port: {port}"))
            })?;
        }
        if let Some(origins) = get("CLEANBITES_ALLOWED_ORIGINS") {
            self.server.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(dir) = get("CLEANBITES_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(model) = get("CLEANBITES_MODEL") {
            self.gemini.model = model;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.server.bind, "127.0.0.1");
        assert_eq!(cfg.server.port, 8000);
        assert_eq!(cfg.server.allowed_origins.len(), 2);
        assert_eq!(cfg.gemini.model, "gemini-1.5-flash");
        assert!(cfg.gemini.api_key.is_none());
        assert_eq!(cfg.cache.compute_timeout_secs, 90);
        assert!(cfg.cache.per_key_locking);
        assert!(cfg.storage.data_dir.ends_with(".cleanbites/data"));
    }

    #[test]
    fn test_storage_subdirs() {
        let storage = StorageConfig {
            data_dir: PathBuf::from("/srv/cb"),
        };
        assert_eq!(storage.users_dir(), PathBuf::from("/srv/cb/users"));
        assert_eq!(storage.cache_dir(), PathBuf::from("/srv/cb/cache"));
        assert_eq!(storage.food_dir(), PathBuf::from("/srv/cb/food"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [server]
            port = 9100

            [cache]
            per_key_locking = false
            "#,
        )
        .unwrap();
        assert_eq!(cfg.server.port, 9100);
        assert_eq!(cfg.server.bind, "127.0.0.1");
        assert!(!cfg.cache.per_key_locking);
        assert_eq!(cfg.cache.compute_timeout_secs, 90);
    }

    #[test]
    fn test_load_file_missing_is_default() {
        let tmp = tempfile::TempDir::new().unwrap();
        let cfg = Config::load_file(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.server.port, 8000);
    }

    #[test]
    fn test_load_file_invalid_is_config_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("bad.toml");
        std::fs::write(&path, "server = [").unwrap();
        let err = Config::load_file(&path).unwrap_err();
        assert!(matches!(err, CleanBitesError::Config(_)));
    }

    #[test]
    fn test_env_overrides() {
        let mut cfg = Config::default();
        cfg.apply_env_overrides(env(&[
            ("CLEANBITES_BIND", "0.0.0.0"),
            ("CLEANBITES_PORT", "8080"),
            ("CLEANBITES_DATA_DIR", "/var/lib/cleanbites"),
            ("CLEANBITES_MODEL", "gemini-2.0-flash"),
            ("CLEANBITES_ALLOWED_ORIGINS", "https://a.example, https://b.example"),
        ]))
        .unwrap();
        assert_eq!(cfg.server.bind, "0.0.0.0");
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.storage.data_dir, PathBuf::from("/var/lib/cleanbites"));
        assert_eq!(cfg.gemini.model, "gemini-2.0-flash");
        assert_eq!(
            cfg.server.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
    }

    #[test]
    fn test_env_bad_port_rejected() {
        let mut cfg = Config::default();
        let err = cfg
            .apply_env_overrides(env(&[("CLEANBITES_PORT", "eighty")]))
            .unwrap_err();
        assert!(err.to_string().contains("CLEANBITES_PORT"));
    }

    #[test]
    fn test_empty_env_values_ignored() {
        let mut cfg = Config::default();
        cfg.apply_env_overrides(env(&[("CLEANBITES_BIND", "  ")]))
            .unwrap();
        assert_eq!(cfg.server.bind, "127.0.0.1");
    }

    #[test]
    fn test_gemini_debug_redacts_key() {
        let cfg = GeminiConfig {
            api_key: Some("secret-key".into()),
            ..GeminiConfig::default()
        };
        let dbg = format!("{cfg:?}");
        assert!(!dbg.contains("secret-key"));
        assert!(dbg.contains("[REDACTED]"));
    }
}
