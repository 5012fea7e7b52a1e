//! Configuration management
//!
//! This module handles loading and parsing configuration for Atrium.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// CMS behaviour: templates, mount prefix, site
    #[serde(default)]
    pub cms: CmsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/atrium.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// A template a page may be rendered with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Template file name, stored on pages
    pub name: String,
    /// Human readable label
    pub label: String,
}

impl TemplateConfig {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
        }
    }
}

/// CMS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CmsConfig {
    /// Configured templates, the first one is the default
    #[serde(default = "default_templates")]
    pub templates: Vec<TemplateConfig>,
    /// URL prefix the page tree is mounted under
    #[serde(default = "default_pages_root")]
    pub pages_root: String,
    /// Site used when the Host header matches no known domain
    #[serde(default = "default_site_id")]
    pub site_id: i64,
    /// Longest username stored on `created_by` / `changed_by`
    #[serde(default = "default_username_max_length")]
    pub username_max_length: usize,
}

impl Default for CmsConfig {
    fn default() -> Self {
        Self {
            templates: default_templates(),
            pages_root: default_pages_root(),
            site_id: default_site_id(),
            username_max_length: default_username_max_length(),
        }
    }
}

/// Template name used when nothing else is configured
pub const DEFAULT_TEMPLATE: &str = "page.html";

fn default_templates() -> Vec<TemplateConfig> {
    vec![TemplateConfig::new(DEFAULT_TEMPLATE, "Default page")]
}

fn default_pages_root() -> String {
    "/".to_string()
}

fn default_site_id() -> i64 {
    1
}

fn default_username_max_length() -> usize {
    255
}

/// Shortest accepted username limit; the truncation marker alone takes 15 characters
const MIN_USERNAME_MAX_LENGTH: usize = 16;

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - ATRIUM_SERVER_HOST
    /// - ATRIUM_SERVER_PORT
    /// - ATRIUM_DATABASE_DRIVER
    /// - ATRIUM_DATABASE_URL
    /// - ATRIUM_CMS_PAGES_ROOT
    /// - ATRIUM_CMS_SITE_ID
    /// - ATRIUM_CMS_USERNAME_MAX_LENGTH
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cms.templates.is_empty() {
            return Err(ConfigError::ValidationError(
                "cms.templates must list at least one template".to_string(),
            ));
        }
        if !self.cms.pages_root.starts_with('/') || !self.cms.pages_root.ends_with('/') {
            return Err(ConfigError::ValidationError(format!(
                "cms.pages_root must start and end with '/', got '{}'",
                self.cms.pages_root
            )));
        }
        if self.cms.username_max_length < MIN_USERNAME_MAX_LENGTH {
            return Err(ConfigError::ValidationError(format!(
                "cms.username_max_length must be at least {}",
                MIN_USERNAME_MAX_LENGTH
            )));
        }
        Ok(())
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("ATRIUM_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("ATRIUM_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }

        if let Ok(driver) = std::env::var("ATRIUM_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("ATRIUM_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(root) = std::env::var("ATRIUM_CMS_PAGES_ROOT") {
            self.cms.pages_root = root;
        }
        if let Ok(site_id) = std::env::var("ATRIUM_CMS_SITE_ID") {
            if let Ok(site_id) = site_id.parse::<i64>() {
                self.cms.site_id = site_id;
            }
        }
        if let Ok(max) = std::env::var("ATRIUM_CMS_USERNAME_MAX_LENGTH") {
            if let Ok(max) = max.parse::<usize>() {
                self.cms.username_max_length = max;
            }
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("Failed to write config");
        file
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let config = Config::load(std::path::Path::new("/nonexistent/config.yml")).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.driver, DatabaseDriver::Sqlite);
        assert_eq!(config.cms.pages_root, "/");
        assert_eq!(config.cms.site_id, 1);
        assert_eq!(config.cms.username_max_length, 255);
        assert_eq!(config.cms.templates.len(), 1);
        assert_eq!(config.cms.templates[0].name, DEFAULT_TEMPLATE);
    }

    #[test]
    fn test_load_empty_file_returns_defaults() {
        let file = write_config("   \n");
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn test_load_partial_config_fills_defaults() {
        let file = write_config("server:\n  port: 9000\n");
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.database.url, "data/atrium.db");
    }

    #[test]
    fn test_load_full_cms_config() {
        let yaml = r#"
cms:
  pages_root: /en/
  site_id: 3
  username_max_length: 40
  templates:
    - name: home.html
      label: Home
    - name: sidebar.html
      label: With sidebar
"#;
        let file = write_config(yaml);
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.cms.pages_root, "/en/");
        assert_eq!(config.cms.site_id, 3);
        assert_eq!(config.cms.username_max_length, 40);
        assert_eq!(
            config.cms.templates,
            vec![
                TemplateConfig::new("home.html", "Home"),
                TemplateConfig::new("sidebar.html", "With sidebar"),
            ]
        );
    }

    #[test]
    fn test_load_invalid_yaml_returns_error() {
        let file = write_config("server:\n  port: [not a port\n");
        let err = Config::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_empty_template_list_rejected() {
        let file = write_config("cms:\n  templates: []\n");
        let err = Config::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("at least one template"));
    }

    #[test]
    fn test_pages_root_without_slashes_rejected() {
        let file = write_config("cms:\n  pages_root: pages\n");
        let err = Config::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("pages_root"));
    }

    #[test]
    fn test_tiny_username_limit_rejected() {
        let file = write_config("cms:\n  username_max_length: 10\n");
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_env_override_cms_config() {
        let _guard = lock_env();
        std::env::set_var("ATRIUM_CMS_PAGES_ROOT", "/cms/");
        std::env::set_var("ATRIUM_CMS_SITE_ID", "7");
        std::env::set_var("ATRIUM_CMS_USERNAME_MAX_LENGTH", "not-a-number");

        let config = Config::load_with_env(std::path::Path::new("/nonexistent/config.yml"));

        std::env::remove_var("ATRIUM_CMS_PAGES_ROOT");
        std::env::remove_var("ATRIUM_CMS_SITE_ID");
        std::env::remove_var("ATRIUM_CMS_USERNAME_MAX_LENGTH");

        let config = config.unwrap();
        assert_eq!(config.cms.pages_root, "/cms/");
        assert_eq!(config.cms.site_id, 7);
        assert_eq!(config.cms.username_max_length, 255);
    }

    #[test]
    fn test_env_override_database_config() {
        let _guard = lock_env();
        std::env::set_var("ATRIUM_DATABASE_DRIVER", "MySQL");
        std::env::set_var("ATRIUM_DATABASE_URL", "mysql://localhost/atrium");
        std::env::set_var("ATRIUM_SERVER_PORT", "99999");

        let config = Config::load_with_env(std::path::Path::new("/nonexistent/config.yml"));

        std::env::remove_var("ATRIUM_DATABASE_DRIVER");
        std::env::remove_var("ATRIUM_DATABASE_URL");
        std::env::remove_var("ATRIUM_SERVER_PORT");

        let config = config.unwrap();
        assert_eq!(config.database.driver, DatabaseDriver::Mysql);
        assert_eq!(config.database.url, "mysql://localhost/atrium");
        // Out of range port is ignored
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_config_roundtrip_through_yaml() {
        let mut config = Config::default();
        config.cms.templates.push(TemplateConfig::new("wide.html", "Wide"));
        config.cms.pages_root = "/site/".to_string();

        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.cms.templates, config.cms.templates);
        assert_eq!(parsed.cms.pages_root, "/site/");
    }
}
