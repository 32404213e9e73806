use anyhow::{Context, Result};
use chrono::FixedOffset;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::notifications::{
    AttributeDefaults, DirectoryTemplateResolver, EmbeddedTemplateResolver, NotificationLinks,
    TemplateResolver,
};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub links: LinksConfig,
    #[serde(default)]
    pub branding: BrandingConfig,
    #[serde(default)]
    pub templates: TemplatesConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinksConfig {
    /// Where users view their submission (target of the action button)
    #[serde(default = "default_submission_url")]
    pub submission_url: String,
    #[serde(default = "default_docs_url")]
    pub docs_url: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            submission_url: default_submission_url(),
            docs_url: default_docs_url(),
            base_url: default_base_url(),
        }
    }
}

fn default_submission_url() -> String {
    "https://submit.sivacor.org".to_string()
}

fn default_docs_url() -> String {
    "https://docs.sivacor.org".to_string()
}

fn default_base_url() -> String {
    "https://sivacor.org".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrandingConfig {
    #[serde(default = "default_product_name")]
    pub product_name: String,
    #[serde(default = "default_support_email")]
    pub support_email: String,
    /// Logo shown in the email header; omitted entirely when unset
    pub logo_url: Option<String>,
}

impl Default for BrandingConfig {
    fn default() -> Self {
        Self {
            product_name: default_product_name(),
            support_email: default_support_email(),
            logo_url: None,
        }
    }
}

fn default_product_name() -> String {
    "SIVACOR".to_string()
}

fn default_support_email() -> String {
    "support@sivacor.org".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplatesConfig {
    /// Directory holding `notification.html` and `notification.txt`.
    /// The built-in layouts are used when unset.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    /// Offset from UTC used to display timestamps, in minutes (default: -300)
    #[serde(default = "default_timezone_offset_minutes")]
    pub timezone_offset_minutes: i32,
    /// Label appended to displayed timestamps (default: EST)
    #[serde(default = "default_timezone_label")]
    pub timezone_label: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            timezone_offset_minutes: default_timezone_offset_minutes(),
            timezone_label: default_timezone_label(),
        }
    }
}

fn default_timezone_offset_minutes() -> i32 {
    -300
}

fn default_timezone_label() -> String {
    "EST".to_string()
}

/// SMTP settings for delivering notifications
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    /// Use an implicit-TLS relay connection (default: true)
    #[serde(default = "default_smtp_tls")]
    pub smtp_tls: bool,
    pub from_address: Option<String>,
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: default_smtp_port(),
            smtp_username: None,
            smtp_password: None,
            smtp_tls: default_smtp_tls(),
            from_address: None,
            from_name: default_from_name(),
        }
    }
}

impl EmailConfig {
    /// Both an SMTP host and a from address are needed to send anything
    pub fn is_configured(&self) -> bool {
        self.smtp_host.is_some() && self.from_address.is_some()
    }
}

fn default_smtp_port() -> u16 {
    465
}

fn default_smtp_tls() -> bool {
    true
}

fn default_from_name() -> String {
    "SIVACOR".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_toml(&content)
        } else {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse configuration file")
    }

    /// Template resolver selected by `[templates]`
    pub fn template_resolver(&self) -> Box<dyn TemplateResolver> {
        match &self.templates.dir {
            Some(dir) => Box::new(DirectoryTemplateResolver::new(
                dir,
                &self.branding.product_name,
                &self.branding.support_email,
            )),
            None => Box::new(EmbeddedTemplateResolver::new(
                &self.branding.product_name,
                &self.branding.support_email,
            )),
        }
    }

    /// Values the job adapter merges into every notification
    pub fn attribute_defaults(&self) -> Result<AttributeDefaults> {
        let display_offset = FixedOffset::east_opt(self.display.timezone_offset_minutes * 60)
            .with_context(|| {
                format!(
                    "display.timezone_offset_minutes out of range: {}",
                    self.display.timezone_offset_minutes
                )
            })?;

        Ok(AttributeDefaults {
            links: NotificationLinks {
                submission_url: self.links.submission_url.clone(),
                docs_url: self.links.docs_url.clone(),
                base_url: self.links.base_url.clone(),
            },
            logo_url: self.branding.logo_url.clone(),
            display_offset,
            timezone_label: self.display.timezone_label.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.links.docs_url, "https://docs.sivacor.org");
        assert_eq!(config.branding.product_name, "SIVACOR");
        assert_eq!(config.display.timezone_offset_minutes, -300);
        assert_eq!(config.email.smtp_port, 465);
        assert!(!config.email.is_configured());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let config = Config::from_toml(
            r#"
            [links]
            submission_url = "https://staging.submit.sivacor.org"

            [branding]
            logo_url = "https://sivacor.org/logo.png"

            [email]
            smtp_host = "smtp.example.com"
            from_address = "noreply@sivacor.org"
            smtp_tls = false
            smtp_port = 1025
            "#,
        )
        .unwrap();

        assert_eq!(config.links.submission_url, "https://staging.submit.sivacor.org");
        assert_eq!(config.links.base_url, "https://sivacor.org");
        assert_eq!(config.branding.logo_url.as_deref(), Some("https://sivacor.org/logo.png"));
        assert_eq!(config.branding.support_email, "support@sivacor.org");
        assert!(config.email.is_configured());
        assert_eq!(config.email.smtp_port, 1025);
    }

    #[test]
    fn test_example_config_parses() {
        let config = Config::from_toml(include_str!("../../sivacor-notify.example.toml")).unwrap();
        assert_eq!(config.display.timezone_label, "EST");
        assert!(config.attribute_defaults().is_ok());
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(Config::from_toml("[links\nsubmission_url = 1").is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert!(config.templates.dir.is_none());
    }

    #[test]
    fn test_attribute_defaults_offset() {
        let mut config = Config::default();
        let defaults = config.attribute_defaults().unwrap();
        assert_eq!(defaults.display_offset.local_minus_utc(), -5 * 3600);
        assert_eq!(defaults.timezone_label, "EST");

        config.display.timezone_offset_minutes = 24 * 60;
        assert!(config.attribute_defaults().is_err());
    }

    #[test]
    fn test_embedded_resolver_by_default() {
        let config = Config::default();
        let template = config.template_resolver().resolve().unwrap();
        assert_eq!(template.support_email, "support@sivacor.org");
    }
}
