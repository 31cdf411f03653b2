use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use cardauth_api::mail::SmtpSettings;

pub const CONFIG_ENV: &str = "CARDAUTH_CONFIG";
pub const JWT_SECRET_ENV: &str = "CARDAUTH_JWT_SECRET";
const DEFAULT_CONFIG_PATH: &str = "./config.yaml";
const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365;

/// Secrets that are only acceptable on a developer machine.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me", "dev-secret-change-me", "secret"];

#[derive(Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    pub http_port: u16,
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
    #[serde(default)]
    pub app_url: Option<String>,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub email: Option<EmailConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_log_prefix")]
    pub file_prefix: String,
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            file_prefix: default_log_prefix(),
            max_files: default_max_files(),
            level: default_log_level(),
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub auth_email: String,
    #[serde(default)]
    pub auth_password: String,
    /// Upgrade a plain connection instead of connecting over TLS.
    #[serde(default)]
    pub starttls: bool,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_database_path() -> PathBuf {
    "card_authorization.db".into()
}
fn default_jwt_secret() -> String {
    "change-me".into()
}
fn default_token_ttl_hours() -> i64 {
    24
}
fn default_sweep_interval_secs() -> u64 {
    60
}
fn default_static_dir() -> PathBuf {
    "./static".into()
}
fn default_log_dir() -> PathBuf {
    "./log".into()
}
fn default_log_prefix() -> String {
    "cardauth".into()
}
fn default_max_files() -> usize {
    14
}
fn default_log_level() -> String {
    "info".into()
}
fn default_smtp_port() -> u16 {
    465
}

impl Config {
    /// Load from `$CARDAUTH_CONFIG` (or `./config.yaml`), then apply env overrides.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        let mut config = Self::from_file(Path::new(&path))?;
        if let Ok(secret) = std::env::var(JWT_SECRET_ENV) {
            config.jwt_secret = secret;
        }
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_yaml(&raw).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(raw)?;
        if config.sweep_interval_secs == 0 {
            anyhow::bail!("sweep_interval_secs must be greater than zero");
        }
        if !(1..=MAX_TOKEN_TTL_HOURS).contains(&config.token_ttl_hours) {
            anyhow::bail!("token_ttl_hours must be between 1 and {MAX_TOKEN_TTL_HOURS}");
        }
        Ok(config)
    }

    /// Falls back to the server's own address when no public URL is set.
    pub fn app_url(&self) -> String {
        match &self.app_url {
            Some(url) if !url.trim().is_empty() => url.trim().to_string(),
            _ => format!("http://localhost:{}/", self.http_port),
        }
    }

    /// SMTP settings, or `None` when mail is not configured.
    pub fn smtp(&self) -> Option<SmtpSettings> {
        let email = self.email.as_ref()?;
        if email.smtp_host.trim().is_empty() {
            return None;
        }
        Some(SmtpSettings {
            host: email.smtp_host.trim().to_string(),
            port: email.smtp_port,
            username: email.auth_email.clone(),
            password: email.auth_password.clone(),
            starttls: email.starttls,
        })
    }

    pub fn has_placeholder_secret(&self) -> bool {
        self.jwt_secret.len() < 16 || PLACEHOLDER_SECRETS.contains(&self.jwt_secret.as_str())
    }
}

// Hand-written so secrets never reach the log.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("http_port", &self.http_port)
            .field("database_path", &self.database_path)
            .field("jwt_secret", &"****")
            .field("token_ttl_hours", &self.token_ttl_hours)
            .field("sweep_interval_secs", &self.sweep_interval_secs)
            .field("static_dir", &self.static_dir)
            .field("app_url", &self.app_url())
            .field("log", &self.log)
            .field("email", &self.email)
            .finish()
    }
}

impl fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("auth_email", &self.auth_email)
            .field("auth_password", &"****")
            .field("starttls", &self.starttls)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let config = Config::from_yaml("http_port: 18080\n").unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.token_ttl_hours, 24);
        assert_eq!(config.sweep_interval_secs, 60);
        assert_eq!(config.log.max_files, 14);
        assert_eq!(config.app_url(), "http://localhost:18080/");
        assert!(config.smtp().is_none());
        assert!(config.has_placeholder_secret());
    }

    #[test]
    fn full_config_parses() {
        let raw = r#"
host: 127.0.0.1
http_port: 8080
database_path: /var/lib/cardauth/cards.db
jwt_secret: a-much-longer-random-secret
token_ttl_hours: 12
sweep_interval_secs: 30
static_dir: /srv/static
app_url: https://cards.example.com/
log:
  dir: /var/log/cardauth
  level: debug
email:
  smtp_host: smtp.example.com
  auth_email: bot@example.com
  auth_password: hunter2
"#;
        let config = Config::from_yaml(raw).unwrap();
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.log.file_prefix, "cardauth");
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.app_url(), "https://cards.example.com/");
        assert!(!config.has_placeholder_secret());

        let smtp = config.smtp().unwrap();
        assert_eq!(smtp.port, 465);
        assert_eq!(smtp.username, "bot@example.com");
        assert!(!smtp.starttls);
    }

    #[test]
    fn blank_smtp_host_disables_mail() {
        let config = Config::from_yaml("http_port: 1\nemail:\n  smtp_host: ''\n").unwrap();
        assert!(config.smtp().is_none());
    }

    #[test]
    fn debug_output_masks_secrets() {
        let raw = "http_port: 1\njwt_secret: topsecretvalue123\nemail:\n  smtp_host: h\n  auth_password: hunter2\n";
        let printed = format!("{:?}", Config::from_yaml(raw).unwrap());
        assert!(!printed.contains("hunter2"));
        assert!(!printed.contains("topsecretvalue123"));
    }

    #[test]
    fn token_ttl_must_stay_within_a_year() {
        assert!(Config::from_yaml("http_port: 1\ntoken_ttl_hours: 8760\n").is_ok());
        for ttl in ["0", "-1", "8761", "9223372036854775807"] {
            let raw = format!("http_port: 1\ntoken_ttl_hours: {ttl}\n");
            assert!(Config::from_yaml(&raw).is_err(), "ttl {ttl} accepted");
        }
    }

    #[test]
    fn missing_port_and_zero_interval_are_errors() {
        assert!(Config::from_yaml("host: 0.0.0.0\n").is_err());
        assert!(Config::from_yaml("http_port: 1\nsweep_interval_secs: 0\n").is_err());
    }
}
