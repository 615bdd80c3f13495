//! User configuration, stored as JSON in `~/.config/vidkit/config.json`.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

use crate::{
    metadata::ProviderKind,
    template::{
        DEFAULT_MOVIE_DIRECTORY, DEFAULT_MOVIE_FORMAT, DEFAULT_TV_DIRECTORY, DEFAULT_TV_FORMAT,
    },
    video::DEFAULT_EXTENSIONS,
};

const APP_NAME: &str = "vidkit";
const CONFIG_FILENAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tmdb_api_key: String,
    pub omdb_api_key: String,
    pub tvdb_api_key: String,

    /// Never prompt; rename everything that resolves.
    pub batch_mode: bool,
    pub recursive: bool,
    pub lowercase: bool,
    /// Dots between words; implies separator "." unless one is set.
    pub scene_style: bool,
    pub separator: String,
    pub file_extensions: Vec<String>,
    /// ISO 639-1 code passed to providers that localize.
    pub language: String,
    pub no_overwrite: bool,
    pub no_metadata: bool,
    pub preview_mode: bool,
    pub enable_metadata: bool,

    pub movie_provider: ProviderKind,
    pub tv_provider: ProviderKind,

    pub movie_format: String,
    pub tv_format: String,
    pub movie_directory: String,
    pub tv_directory: String,
    /// Move files into the rendered directory templates.
    pub organize_files: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tmdb_api_key: String::new(),
            omdb_api_key: String::new(),
            tvdb_api_key: String::new(),
            batch_mode: false,
            recursive: false,
            lowercase: false,
            scene_style: false,
            separator: " ".to_string(),
            file_extensions: DEFAULT_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            language: "en".to_string(),
            no_overwrite: true,
            no_metadata: false,
            preview_mode: false,
            enable_metadata: true,
            movie_provider: ProviderKind::Tmdb,
            tv_provider: ProviderKind::Tvmaze,
            movie_format: DEFAULT_MOVIE_FORMAT.to_string(),
            tv_format: DEFAULT_TV_FORMAT.to_string(),
            movie_directory: DEFAULT_MOVIE_DIRECTORY.to_string(),
            tv_directory: DEFAULT_TV_DIRECTORY.to_string(),
            organize_files: false,
        }
    }
}

impl Config {
    /// `$XDG_CONFIG_HOME/vidkit/config.json`, or `~/.config/vidkit/config.json`.
    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .context("Failed to determine config directory")?;
        Ok(dir.join(APP_NAME).join(CONFIG_FILENAME))
    }

    /// Read the config at `path`. A missing file is created with defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            info!("Created default config at {}", path.display());
            return Ok(config);
        }

        debug!(path = %path.display(), "loading config");
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)
            .with_context(|| format!("Failed to write config {}", path.display()))
    }

    /// Fill empty API keys from `TMDB_API_TOKEN`, `OMDB_API_KEY` and `TVDB_API_KEY`.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for (key, var) in [
            (&mut self.tmdb_api_key, "TMDB_API_TOKEN"),
            (&mut self.omdb_api_key, "OMDB_API_KEY"),
            (&mut self.tvdb_api_key, "TVDB_API_KEY"),
        ] {
            if !key.is_empty() {
                continue;
            }
            if let Some(value) = lookup(var).filter(|value| !value.is_empty()) {
                *key = value;
            }
        }
    }

    pub fn metadata_enabled(&self) -> bool {
        self.enable_metadata && !self.no_metadata
    }

    /// Fill blank templates, check provider keys and apply scene style.
    pub fn validate(&mut self) -> Result<()> {
        for (template, default) in [
            (&mut self.movie_format, DEFAULT_MOVIE_FORMAT),
            (&mut self.tv_format, DEFAULT_TV_FORMAT),
            (&mut self.movie_directory, DEFAULT_MOVIE_DIRECTORY),
            (&mut self.tv_directory, DEFAULT_TV_DIRECTORY),
        ] {
            if template.trim().is_empty() {
                *template = default.to_string();
            }
        }

        if self.metadata_enabled() {
            for provider in [self.movie_provider, self.tv_provider] {
                self.check_api_key(provider)?;
            }
        }

        if self.scene_style && self.separator == " " {
            self.separator = ".".to_string();
        }

        Ok(())
    }

    fn check_api_key(&self, provider: ProviderKind) -> Result<()> {
        let (name, key) = match provider {
            ProviderKind::Tmdb => ("TMDb", &self.tmdb_api_key),
            ProviderKind::Omdb => ("OMDb", &self.omdb_api_key),
            ProviderKind::Tvdb => ("TVDb", &self.tvdb_api_key),
            ProviderKind::Tvmaze => return Ok(()),
        };
        if key.is_empty() {
            bail!(
                "{} API key is required for metadata lookup (set {}_api_key in config.json)",
                name, provider
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.separator, " ");
        assert_eq!(config.language, "en");
        assert_eq!(config.movie_provider, ProviderKind::Tmdb);
        assert_eq!(config.tv_provider, ProviderKind::Tvmaze);
        assert!(config.no_overwrite);
        assert!(config.enable_metadata);
        assert!(!config.organize_files);
        assert_eq!(
            config.movie_format,
            "{title} ({year}) [{resolution} {codec}]"
        );
        assert_eq!(config.tv_directory, "{genre}/{title}/Season {season}");
        assert_eq!(config.file_extensions.len(), 14);
        assert!(config.file_extensions.contains(&".mkv".to_string()));
    }

    #[test]
    fn test_load_creates_default_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("vidkit").join("config.json");

        let config = Config::load_from(&path).unwrap();

        assert!(path.exists(), "Default config should be written");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");

        let config = Config {
            tmdb_api_key: "token".to_string(),
            movie_provider: ProviderKind::Omdb,
            tv_provider: ProviderKind::Tvdb,
            scene_style: true,
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        let json = r#"{"tmdb_api_key": "abc", "tv_provider": "tmdb"}"#;
        fs::write(&path, json).unwrap();

        let config = Config::load_from(&path).unwrap();

        assert_eq!(config.tmdb_api_key, "abc");
        assert_eq!(config.tv_provider, ProviderKind::Tmdb);
        assert_eq!(config.language, "en");
        assert_eq!(config.movie_format, DEFAULT_MOVIE_FORMAT);
    }

    #[test]
    fn test_invalid_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();

        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_apply_env_fills_empty_keys_only() {
        let mut config = Config {
            omdb_api_key: "from-file".to_string(),
            ..Config::default()
        };
        config.apply_env_from(|name| match name {
            "TMDB_API_TOKEN" => Some("env-token".to_string()),
            "OMDB_API_KEY" => Some("env-omdb".to_string()),
            "TVDB_API_KEY" => Some(String::new()),
            _ => None,
        });

        assert_eq!(config.tmdb_api_key, "env-token");
        assert_eq!(config.omdb_api_key, "from-file");
        assert_eq!(config.tvdb_api_key, "");
    }

    #[test]
    fn test_validate_requires_provider_keys() {
        let mut config = Config::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().starts_with("TMDb API key is required"));

        let mut config = Config {
            tmdb_api_key: "token".to_string(),
            tv_provider: ProviderKind::Tvdb,
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("tvdb_api_key"));

        let mut config = Config {
            tmdb_api_key: "token".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_skips_keys_without_metadata() {
        let mut config = Config {
            no_metadata: true,
            ..Config::default()
        };
        assert!(config.validate().is_ok());

        let mut config = Config {
            enable_metadata: false,
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_fills_templates_and_scene_separator() {
        let mut config = Config {
            no_metadata: true,
            scene_style: true,
            movie_format: String::new(),
            tv_directory: "  ".to_string(),
            ..Config::default()
        };
        config.validate().unwrap();

        assert_eq!(config.separator, ".");
        assert_eq!(config.movie_format, DEFAULT_MOVIE_FORMAT);
        assert_eq!(config.tv_directory, DEFAULT_TV_DIRECTORY);

        let mut config = Config {
            no_metadata: true,
            scene_style: true,
            separator: "_".to_string(),
            ..Config::default()
        };
        config.validate().unwrap();
        assert_eq!(config.separator, "_");
    }
}
