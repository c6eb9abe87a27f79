use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use leikki_shared::api::Project;
use serde::{Deserialize, Serialize};

use crate::AppError;

pub const ENV_CONFIG: &str = "LEIKKI_CONFIG";
pub const ENV_URL: &str = "LEIKKI_SUPABASE_URL";
pub const ENV_ANON_KEY: &str = "LEIKKI_SUPABASE_ANON_KEY";

pub const MISSING_ENV_MESSAGE: &str = "missing backend configuration: set LEIKKI_SUPABASE_URL and \
     LEIKKI_SUPABASE_ANON_KEY, or supabase_url and supabase_anon_key in the config file";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub supabase_url: Option<String>,
    #[serde(default)]
    pub supabase_anon_key: Option<String>,
}

impl ClientConfig {
    /// Loads the resolved config file (absent file means defaults) and applies env overrides.
    pub fn find_and_load(cli_value: Option<PathBuf>) -> Result<(PathBuf, Self), AppError> {
        let path = resolve_config_path(cli_value)?;
        let mut cfg = if path.exists() {
            load_config(&path)?
        } else {
            ClientConfig::default()
        };
        cfg.apply_env(|name| std::env::var(name).ok());
        Ok((path, cfg))
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_URL).filter(|v| !v.trim().is_empty()) {
            self.supabase_url = Some(url);
        }
        if let Some(key) = lookup(ENV_ANON_KEY).filter(|v| !v.trim().is_empty()) {
            self.supabase_anon_key = Some(key);
        }
    }

    /// `None` when either credential is missing or the URL does not parse.
    pub fn project(&self) -> Option<Project> {
        let url = self.supabase_url.as_deref()?.trim();
        let anon_key = self.supabase_anon_key.as_deref()?.trim();
        if url.is_empty() || anon_key.is_empty() {
            return None;
        }
        let url = normalize_project_url(url)?;
        Some(Project {
            url,
            anon_key: anon_key.to_string(),
        })
    }
}

pub fn resolve_config_path(cli_value: Option<PathBuf>) -> Result<PathBuf, AppError> {
    if let Some(p) = cli_value {
        return Ok(p);
    }
    if let Ok(p) = std::env::var(ENV_CONFIG) {
        return Ok(PathBuf::from(p));
    }
    default_config_path().ok_or_else(|| AppError::Config("could not determine config dir".into()))
}

pub fn default_config_path() -> Option<PathBuf> {
    let pd = ProjectDirs::from("fi", "leikkitsemppari", "leikkitsemppari")?;
    Some(pd.config_dir().join("config.yaml"))
}

pub fn load_config(path: &Path) -> Result<ClientConfig, AppError> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("read {} failed: {e}", path.display())))?;
    let cfg: ClientConfig = serde_yaml::from_str(&data)
        .map_err(|e| AppError::Config(format!("parse {} failed: {e}", path.display())))?;
    Ok(cfg)
}

/// Adds `https://` when no scheme is given and drops trailing slashes.
pub fn normalize_project_url(input: &str) -> Option<String> {
    let trimmed = input.trim().trim_end_matches('/');
    let candidate = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };
    url::Url::parse(&candidate).ok()?;
    Some(candidate)
}
