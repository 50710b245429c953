use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;
use crate::errors::ConfigError;

// ========== Tagger Configuration ==========

/// ID3v2 revision used when a file has no ID3v2 tag yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum TagVersion {
    #[serde(rename = "2.3")]
    V23,
    #[serde(rename = "2.4")]
    V24,
}

impl TagVersion {
    pub fn id3_version(&self) -> id3::Version {
        match self {
            TagVersion::V23 => id3::Version::Id3v23,
            TagVersion::V24 => id3::Version::Id3v24,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TaggerConfig {
    /// Use null byte separator (\0) for multi-value frames, as ID3v2.4 does
    #[serde(default = "default_use_null_separator")]
    pub use_null_separator: bool,

    /// Custom separator to use when use_null_separator is false
    #[serde(default = "default_custom_separator")]
    pub custom_separator: String,

    /// Mirror mapped values into the ID3v1 block as well
    #[serde(default)]
    pub sync_legacy_tag: bool,

    /// Allow adding an ID3v1 block to files that do not have one
    #[serde(default)]
    pub create_legacy_tag: bool,

    /// Version of newly created ID3v2 tags
    #[serde(default = "default_new_tag_version")]
    pub new_tag_version: TagVersion,
}

fn default_use_null_separator() -> bool {
    true
}

fn default_custom_separator() -> String {
    "; ".to_string()
}

fn default_new_tag_version() -> TagVersion {
    TagVersion::V24
}

impl Default for TaggerConfig {
    fn default() -> Self {
        Self {
            use_null_separator: default_use_null_separator(),
            custom_separator: default_custom_separator(),
            sync_legacy_tag: false,
            create_legacy_tag: false,
            new_tag_version: default_new_tag_version(),
        }
    }
}

impl TaggerConfig {
    /// Get the separator to use for joining multi-value frames
    pub fn get_separator(&self) -> String {
        if self.use_null_separator {
            "\0".to_string()
        } else {
            self.custom_separator.clone()
        }
    }

    /// Separators recognised when splitting multi-value frames.
    /// The null byte is always accepted, whatever the write setting is.
    pub fn read_separators(&self) -> Vec<String> {
        let mut separators = vec!["\0".to_string()];
        if !self.use_null_separator && !self.custom_separator.is_empty() {
            separators.push(self.custom_separator.clone());
        }
        separators
    }
}

// ========== Root Configuration ==========

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub tagger: TaggerConfig,
}

impl Config {
    /// Load configuration from ~/.tagsync/config.toml
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path, falling back to defaults when it is missing
    pub fn load_from(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            // No config file, return default
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
            path: config_path.to_path_buf(),
            source,
        })?;

        let config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: config_path.to_path_buf(),
            source,
        })?;

        Ok(config)
    }

    /// Get the path to the configuration file
    pub fn get_config_path() -> Result<PathBuf, ConfigError> {
        let home = std::env::var("HOME").map_err(|_| ConfigError::NoHome)?;

        Ok(PathBuf::from(home).join(".tagsync").join("config.toml"))
    }

    /// Create a sample configuration file
    pub fn create_sample(config_path: &Path) -> Result<(), ConfigError> {
        if config_path.exists() {
            return Err(ConfigError::Write {
                path: config_path.to_path_buf(),
                reason: "config file already exists".to_string(),
            });
        }

        if let Some(config_dir) = config_path.parent() {
            std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::Write {
                path: config_path.to_path_buf(),
                reason: format!("failed to create config directory: {}", e),
            })?;
        }

        let sample = r#"# tagsync Configuration File

[tagger]
# Use null byte separator (\0) for multi-value frames such as genre.
# This is what ID3v2.4 expects; turn it off for players that only read ID3v2.3
use_null_separator = true

# Custom separator to use when use_null_separator is false
# Common separators: "; " (default), " / ", ", ", " | "
custom_separator = "; "

# Also update the ID3v1 block when writing. Values that do not fit its
# fixed layout (long titles, genres outside the ID3v1 list) are left as they are
sync_legacy_tag = false

# With sync_legacy_tag, add an ID3v1 block to files that do not have one yet
create_legacy_tag = false

# ID3v2 revision for files without an ID3v2 tag: "2.3" or "2.4"
new_tag_version = "2.4"
"#;

        std::fs::write(config_path, sample).map_err(|e| ConfigError::Write {
            path: config_path.to_path_buf(),
            reason: e.to_string(),
        })?;

        info!("Sample config created at: {}", config_path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TaggerConfig::default();
        assert_eq!(config.get_separator(), "\0");
        assert_eq!(config.read_separators(), vec!["\0".to_string()]);
        assert_eq!(config.new_tag_version, TagVersion::V24);
        assert!(!config.create_legacy_tag);
        assert!(!config.sync_legacy_tag);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str("[tagger]\nuse_null_separator = false\n").unwrap();
        assert_eq!(config.tagger.get_separator(), "; ");
        assert_eq!(config.tagger.read_separators(), vec!["\0".to_string(), "; ".to_string()]);
        assert_eq!(config.tagger.new_tag_version, TagVersion::V24);
    }

    #[test]
    fn test_empty_file_is_default() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_sample_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        Config::create_sample(&path).unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config, Config::default());

        assert!(matches!(Config::create_sample(&path), Err(ConfigError::Write { .. })));
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_bad_version_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[tagger]\nnew_tag_version = \"2.2\"\n").unwrap();

        assert!(matches!(Config::load_from(&path), Err(ConfigError::Parse { .. })));
    }
}
