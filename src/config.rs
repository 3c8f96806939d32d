use crate::activity::filter::FilterField;
use anyhow::{Context, Result, anyhow, bail};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use url::Url;

const APP_DIR: &str = ".Daybook";
const CONFIG_FILE: &str = "config.json";
pub const DEFAULT_API_PORT: u16 = 7891;
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_TICKET_TTL_SECONDS: u64 = 3600;
const MIN_TICKET_TTL_SECONDS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub db_path: PathBuf,
    pub blob_dir: PathBuf,
    pub api_port: u16,
    pub public_base_url: Option<String>,
    pub max_upload_bytes: u64,
    pub upload_ticket_ttl_seconds: u64,
    pub activity_filter_field: FilterField,
}

impl Default for Config {
    fn default() -> Self {
        let root = default_root_dir();

        Self {
            db_path: root.join("db").join("daybook.db"),
            blob_dir: root.join("blobs"),
            api_port: DEFAULT_API_PORT,
            public_base_url: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            upload_ticket_ttl_seconds: DEFAULT_TICKET_TTL_SECONDS,
            activity_filter_field: FilterField::default(),
        }
    }
}

impl Config {
    pub fn root_dir() -> Result<PathBuf> {
        Ok(default_root_dir())
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(default_root_dir().join(CONFIG_FILE))
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;
        set_mode_600(&config_path)?;

        Ok(())
    }

    pub fn ensure_bootstrap_files(&self) -> Result<()> {
        let root = Self::root_dir()?;
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create root directory: {}", root.display()))?;

        if let Some(parent) = self.db_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        fs::create_dir_all(&self.blob_dir).with_context(|| {
            format!("Failed to create blob directory: {}", self.blob_dir.display())
        })?;

        Ok(())
    }

    /// URL clients use to reach this service; upload and download URLs hang off it.
    pub fn base_url(&self) -> String {
        self.public_base_url
            .clone()
            .unwrap_or_else(|| format!("http://127.0.0.1:{}", self.api_port))
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match normalize_config_key(key) {
            "db_path" => {
                self.db_path = expand_home(value.trim());
            }
            "blob_dir" => {
                self.blob_dir = expand_home(value.trim());
            }
            "api_port" => {
                self.api_port = value
                    .trim()
                    .parse::<u16>()
                    .map_err(|_| anyhow!("api_port must be a number"))?;
            }
            "public_base_url" => {
                let trimmed = value.trim().trim_end_matches('/');
                self.public_base_url = if trimmed.is_empty() {
                    None
                } else {
                    Url::parse(trimmed)
                        .with_context(|| format!("public_base_url is not a valid URL: {value}"))?;
                    Some(trimmed.to_string())
                };
            }
            "max_upload_bytes" => {
                let parsed = value
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| anyhow!("max_upload_bytes must be a number"))?;
                if parsed == 0 {
                    bail!("max_upload_bytes must be greater than zero");
                }
                self.max_upload_bytes = parsed;
            }
            "upload_ticket_ttl_seconds" => {
                self.upload_ticket_ttl_seconds = value
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| anyhow!("upload_ticket_ttl_seconds must be a number"))?
                    .max(MIN_TICKET_TTL_SECONDS);
            }
            "activity_filter_field" => {
                self.activity_filter_field = FilterField::parse(value)
                    .ok_or_else(|| anyhow!("activity_filter_field must be date or created_at"))?;
            }
            _ => {
                bail!(
                    "Unsupported config key: {key}. Supported keys: db_path|db.path, blob_dir|blob.dir, api_port|api.port, public_base_url|public.base_url, max_upload_bytes|upload.max_bytes, upload_ticket_ttl_seconds|upload.ticket_ttl_seconds, activity_filter_field|activities.filter_field"
                );
            }
        }

        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Option<String> {
        match normalize_config_key(key) {
            "db_path" => Some(self.db_path.display().to_string()),
            "blob_dir" => Some(self.blob_dir.display().to_string()),
            "api_port" => Some(self.api_port.to_string()),
            "public_base_url" => Some(self.base_url()),
            "max_upload_bytes" => Some(self.max_upload_bytes.to_string()),
            "upload_ticket_ttl_seconds" => Some(self.upload_ticket_ttl_seconds.to_string()),
            "activity_filter_field" => Some(self.activity_filter_field.as_str().to_string()),
            _ => None,
        }
    }
}

fn normalize_config_key(key: &str) -> &str {
    match key {
        "db_path" | "db.path" => "db_path",
        "blob_dir" | "blob.dir" => "blob_dir",
        "api_port" | "api.port" => "api_port",
        "public_base_url" | "public.base_url" => "public_base_url",
        "max_upload_bytes" | "upload.max_bytes" => "max_upload_bytes",
        "upload_ticket_ttl_seconds" | "upload.ticket_ttl_seconds" => "upload_ticket_ttl_seconds",
        "activity_filter_field" | "activities.filter_field" => "activity_filter_field",
        _ => key,
    }
}

pub fn expand_home(raw: &str) -> PathBuf {
    raw.strip_prefix("~/")
        .and_then(|stripped| home_dir().map(|home| home.join(stripped)))
        .unwrap_or_else(|| PathBuf::from(raw))
}

fn default_root_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn set_mode_600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to set file permissions: {}", path.display()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Config, DEFAULT_MAX_UPLOAD_BYTES};
    use crate::activity::filter::FilterField;

    #[test]
    fn defaults_cap_uploads_at_ten_mebibytes() {
        let config = Config::default();

        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert_eq!(config.activity_filter_field, FilterField::Date);
        assert_eq!(config.base_url(), "http://127.0.0.1:7891");
    }

    #[test]
    fn dotted_aliases_resolve_to_fields() {
        let mut config = Config::default();

        config.set_value("api.port", "8080").expect("port");
        config
            .set_value("activities.filter_field", "created_at")
            .expect("filter field");
        config
            .set_value("public.base_url", "https://daybook.example.com/")
            .expect("base url");

        assert_eq!(config.get_value("api_port").as_deref(), Some("8080"));
        assert_eq!(config.activity_filter_field, FilterField::CreatedAt);
        assert_eq!(config.base_url(), "https://daybook.example.com");
    }

    #[test]
    fn rejects_invalid_values() {
        let mut config = Config::default();

        assert!(config.set_value("upload.max_bytes", "0").is_err());
        assert!(config.set_value("activities.filter_field", "updated").is_err());
        assert!(config.set_value("public.base_url", "not a url").is_err());
        assert!(config.set_value("unknown.key", "1").is_err());
    }

    #[test]
    fn config_without_optional_fields_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{ "api_port": 9000 }"#).expect("parse");

        assert_eq!(config.api_port, 9000);
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert_eq!(config.base_url(), "http://127.0.0.1:9000");
    }
}
