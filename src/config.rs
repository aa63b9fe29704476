use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Error;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gallery: GalleryConfig,

    #[serde(default)]
    pub collection: CollectionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GalleryConfig {
    /// Base URL of the Piwigo installation, e.g. `https://photos.example.com`
    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub username: String,

    /// Falls back to `PIWIGO_PASSWORD` when empty
    #[serde(default)]
    pub password: String,

    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Per-request timeout. No timeout when unset.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_page_size() -> u32 {
    100
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            username: String::new(),
            password: String::new(),
            page_size: default_page_size(),
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    #[serde(default)]
    pub output_dir: PathBuf,

    #[serde(default = "default_database_name")]
    pub database_name: String,

    /// Label of the album root row created in a fresh catalog
    #[serde(default = "default_root_label")]
    pub root_label: String,
}

fn default_database_name() -> String {
    "digikam4.db".to_string()
}

fn default_root_label() -> String {
    "Piwigo Import".to_string()
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::new(),
            database_name: default_database_name(),
            root_label: default_root_label(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive; `PIWIGO_DIGIKAM_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for the rolling log file. Defaults to `<config dir>/logs`.
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Send logs to the systemd journal when it is reachable (Linux only)
    #[serde(default = "default_journald")]
    pub journald: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_journald() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
            journald: default_journald(),
        }
    }
}

impl LoggingConfig {
    pub fn directory(&self) -> PathBuf {
        self.dir
            .clone()
            .unwrap_or_else(|| Config::config_dir().join("logs"))
    }
}

impl Config {
    /// Load from `PIWIGO_DIGIKAM_CONFIG` or the default location.
    /// A missing file yields defaults.
    pub fn load() -> Result<Self> {
        let path = std::env::var("PIWIGO_DIGIKAM_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::config_path());

        if path.exists() {
            Self::load_from(&path)
        } else {
            tracing::debug!("No config file at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        Ok(config)
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("piwigo-digikam")
    }

    fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Take the password from `PIWIGO_PASSWORD` if none was configured.
    pub fn apply_env(&mut self) {
        if self.gallery.password.is_empty() {
            if let Ok(password) = std::env::var("PIWIGO_PASSWORD") {
                self.gallery.password = password;
            }
        }
    }

    /// Catalog file inside the output directory.
    pub fn database_path(&self) -> PathBuf {
        self.collection
            .output_dir
            .join(&self.collection.database_name)
    }

    /// Check everything a transfer needs before it starts.
    pub fn validate(&self) -> std::result::Result<(), Error> {
        let url = self.gallery.url.trim();
        if url.is_empty() {
            return Err(Error::InvalidConfig("Piwigo URL is required".to_string()));
        }
        match url::Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            _ => {
                return Err(Error::InvalidConfig(format!(
                    "'{}' is not a valid URL (e.g. https://your-site.com)",
                    url
                )))
            }
        }

        if self.gallery.username.trim().is_empty() {
            return Err(Error::InvalidConfig("username is required".to_string()));
        }
        if self.gallery.password.is_empty() {
            return Err(Error::InvalidConfig("password is required".to_string()));
        }
        if self.gallery.page_size == 0 {
            return Err(Error::InvalidConfig("page_size must be positive".to_string()));
        }
        if self.collection.database_name.trim().is_empty() {
            return Err(Error::InvalidConfig("database_name is required".to_string()));
        }

        let output_dir = &self.collection.output_dir;
        if output_dir.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("output directory is required".to_string()));
        }
        check_writable(output_dir)
    }
}

/// Create the directory if needed and prove it accepts writes.
fn check_writable(dir: &Path) -> std::result::Result<(), Error> {
    std::fs::create_dir_all(dir).map_err(|e| Error::filesystem(dir, e))?;
    let probe = dir.join(".piwigo-digikam-write-test");
    std::fs::write(&probe, b"test").map_err(|e| Error::filesystem(&probe, e))?;
    std::fs::remove_file(&probe).map_err(|e| Error::filesystem(&probe, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn valid_config(dir: &Path) -> Config {
        let mut config = Config::default();
        config.gallery.url = "https://photos.example.com".to_string();
        config.gallery.username = "alice".to_string();
        config.gallery.password = "secret".to_string();
        config.collection.output_dir = dir.join("collection");
        config
    }

    #[test]
    fn test_parse_with_defaults() {
        let config: Config = toml::from_str(
            r#"
            [gallery]
            url = "https://photos.example.com"
            username = "alice"

            [collection]
            output_dir = "/srv/pictures"
            "#,
        )
        .unwrap();

        assert_eq!(config.gallery.page_size, 100);
        assert_eq!(config.gallery.timeout_secs, None);
        assert_eq!(config.collection.database_name, "digikam4.db");
        assert_eq!(config.collection.root_label, "Piwigo Import");
        assert_eq!(
            config.database_path(),
            PathBuf::from("/srv/pictures/digikam4.db")
        );
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.journald);
        assert_eq!(config.logging.directory(), Config::config_dir().join("logs"));
    }

    #[test]
    fn test_parse_logging_section() {
        let config: Config = toml::from_str(
            r#"
            [logging]
            level = "piwigo_digikam=debug"
            dir = "/var/log/piwigo-digikam"
            journald = false
            "#,
        )
        .unwrap();

        assert_eq!(config.logging.level, "piwigo_digikam=debug");
        assert!(!config.logging.journald);
        assert_eq!(
            config.logging.directory(),
            PathBuf::from("/var/log/piwigo-digikam")
        );
    }

    #[test]
    fn test_validate_accepts_complete_config() {
        let dir = TempDir::new().unwrap();
        let config = valid_config(dir.path());
        config.validate().unwrap();
        assert!(dir.path().join("collection").is_dir());
        assert!(!dir
            .path()
            .join("collection/.piwigo-digikam-write-test")
            .exists());
    }

    #[test]
    fn test_validate_rejects_missing_fields() {
        let dir = TempDir::new().unwrap();

        let mut config = valid_config(dir.path());
        config.gallery.url = "  ".to_string();
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let mut config = valid_config(dir.path());
        config.gallery.url = "ftp://photos.example.com".to_string();
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let mut config = valid_config(dir.path());
        config.gallery.username.clear();
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let mut config = valid_config(dir.path());
        config.gallery.password.clear();
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let mut config = valid_config(dir.path());
        config.collection.output_dir = PathBuf::new();
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }
}
