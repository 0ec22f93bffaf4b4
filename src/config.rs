use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

use crate::error::{ReportError, Result};

/// Environment variable overriding `identity.client_id`
pub const CLIENT_ID_ENV: &str = "GROUPS_REPORT_CLIENT_ID";
/// Environment variable overriding `identity.tenant_id`
pub const TENANT_ID_ENV: &str = "GROUPS_REPORT_TENANT_ID";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

/// App registration of the public client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default = "default_tenant_id")]
    pub tenant_id: String,
    #[serde(default = "default_authority_host")]
    pub authority_host: String,
    /// Loopback port the sign-in redirect lands on
    #[serde(default = "default_redirect_port")]
    pub redirect_port: u16,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            tenant_id: default_tenant_id(),
            authority_host: default_authority_host(),
            redirect_port: default_redirect_port(),
        }
    }
}

impl IdentityConfig {
    /// `{authority_host}/{tenant_id}`
    pub fn authority(&self) -> String {
        format!(
            "{}/{}",
            self.authority_host.trim_end_matches('/'),
            self.tenant_id
        )
    }

    pub fn authorize_url(&self) -> String {
        format!("{}/oauth2/v2.0/authorize", self.authority())
    }

    pub fn token_url(&self) -> String {
        format!("{}/oauth2/v2.0/token", self.authority())
    }

    pub fn logout_url(&self) -> String {
        format!("{}/oauth2/v2.0/logout", self.authority())
    }

    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}", self.redirect_port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_graph_base_url")]
    pub base_url: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            base_url: default_graph_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_csv_filename")]
    pub csv_filename: String,
    #[serde(default = "default_mail_subject")]
    pub mail_subject: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            csv_filename: default_csv_filename(),
            mail_subject: default_mail_subject(),
        }
    }
}

fn default_tenant_id() -> String {
    "organizations".to_string()
}

fn default_authority_host() -> String {
    "https://login.microsoftonline.com".to_string()
}

fn default_redirect_port() -> u16 {
    8000
}

fn default_graph_base_url() -> String {
    "https://graph.microsoft.com/v1.0".to_string()
}

fn default_csv_filename() -> String {
    "Tenant_Groups_Report.csv".to_string()
}

fn default_mail_subject() -> String {
    "Tenant Groups Report".to_string()
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        // If file doesn't exist, return default config with warning
        if !path.exists() {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            let mut config = Self::default();
            config.apply_env_overrides();
            return Ok(config);
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ReportError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let mut config: Self = toml::from_str(&content)
            .map_err(|e| ReportError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        config.apply_env_overrides();
        config.validate()?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    ReportError::ConfigError(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ReportError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        tokio::fs::write(path, content)
            .await
            .map_err(|e| ReportError::ConfigError(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Apply `GROUPS_REPORT_CLIENT_ID` / `GROUPS_REPORT_TENANT_ID` when set
    pub fn apply_env_overrides(&mut self) {
        if let Ok(client_id) = env::var(CLIENT_ID_ENV) {
            if !client_id.is_empty() {
                self.identity.client_id = client_id;
            }
        }
        if let Ok(tenant_id) = env::var(TENANT_ID_ENV) {
            if !tenant_id.is_empty() {
                self.identity.tenant_id = tenant_id;
            }
        }
    }

    /// Validate configuration values
    ///
    /// An empty client id is allowed here so `init-config` output loads;
    /// [`Config::validate_for_login`] rejects it before sign-in.
    pub fn validate(&self) -> Result<()> {
        if self.identity.tenant_id.trim().is_empty() {
            return Err(ReportError::ConfigError(
                "identity.tenant_id cannot be empty".to_string(),
            ));
        }
        if !is_http_url(&self.identity.authority_host) {
            return Err(ReportError::ConfigError(format!(
                "identity.authority_host must be an http(s) URL, got '{}'",
                self.identity.authority_host
            )));
        }
        if self.identity.redirect_port == 0 {
            return Err(ReportError::ConfigError(
                "identity.redirect_port must be greater than 0".to_string(),
            ));
        }
        if !is_http_url(&self.graph.base_url) {
            return Err(ReportError::ConfigError(format!(
                "graph.base_url must be an http(s) URL, got '{}'",
                self.graph.base_url
            )));
        }
        if self.report.csv_filename.trim().is_empty() {
            return Err(ReportError::ConfigError(
                "report.csv_filename cannot be empty".to_string(),
            ));
        }
        if self.report.mail_subject.trim().is_empty() {
            return Err(ReportError::ConfigError(
                "report.mail_subject cannot be empty".to_string(),
            ));
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Checks that an app registration is configured
    pub fn validate_for_login(&self) -> Result<()> {
        self.validate()?;
        if self.identity.client_id.trim().is_empty() {
            return Err(ReportError::ConfigError(format!(
                "identity.client_id is not set (config file, {} or --client-id)",
                CLIENT_ID_ENV
            )));
        }
        Ok(())
    }

    /// Create an example configuration file
    pub async fn create_example(path: &Path) -> Result<()> {
        let config = Self::default();
        config.save(path).await
    }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("https://") || value.starts_with("http://")
}
