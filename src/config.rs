//! Settings file at ~/.config/filmlog/config.toml.
//!
//! The file is optional. A missing file yields `Settings::default()`.
//! Unknown keys are silently ignored by serde (with `deny_unknown_fields` off),
//! though we log a warning when the file contains potential typos.
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::feed::DEFAULT_BASE_URL;
use crate::render::{is_valid_pattern, DisplayStyle, RenderOptions, StarStyle};
use crate::util::atomic_write;
use crate::vault::{note_path, SortDirection};

/// Env var that takes precedence over the `username` key.
pub const USERNAME_ENV: &str = "FILMLOG_USERNAME";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("No username configured; run `filmlog config set username <name>`")]
    MissingUsername,

    #[error("Invalid username '{0}': use letters, digits and underscores only")]
    InvalidUsername(String),

    #[error("No vault configured; run `filmlog config set vault_path <dir>`")]
    MissingVault,

    #[error("Unknown setting '{0}'")]
    UnknownKey(String),

    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error("HOME environment variable not set")]
    NoHome,
}

// ============================================================================
// Settings
// ============================================================================

/// Everything a sync run needs to know.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Member whose diary feed is fetched.
    pub username: String,

    /// Root directory of the vault.
    pub vault_path: String,

    /// Folder inside the vault holding the note. Empty = vault root.
    pub folder: String,

    /// Note filename. `.md` is added when there is no extension.
    pub filename: String,

    /// Whether the note keeps the oldest or the newest entry first.
    pub sort: SortDirection,

    pub style: DisplayStyle,

    pub stars: StarStyle,

    /// strftime pattern for dates. Empty = the feed's own `YYYY-MM-DD`.
    pub date_format: String,

    /// Wrap dates in `[[...]]`.
    pub link_dates: bool,

    /// Append `^letterboxd<id>` block references.
    pub reference_tags: bool,

    /// Embed poster images.
    pub poster: bool,

    /// Where member feeds are served from.
    pub feed_base_url: String,

    /// Sort direction used by the last successful sync. Written by the sync
    /// itself; a mismatch with `sort` means the note mixes both orders.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sort: Option<SortDirection>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            username: String::new(),
            vault_path: String::new(),
            folder: String::new(),
            filename: "Letterboxd Diary.md".to_string(),
            sort: SortDirection::Ascending,
            style: DisplayStyle::List,
            stars: StarStyle::Filled,
            date_format: String::new(),
            link_dates: true,
            reference_tags: false,
            poster: false,
            feed_base_url: DEFAULT_BASE_URL.to_string(),
            last_sort: None,
        }
    }
}

impl Settings {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Keys accepted in the file and by `config set`.
    pub const KNOWN_KEYS: [&'static str; 13] = [
        "username",
        "vault_path",
        "folder",
        "filename",
        "sort",
        "style",
        "stars",
        "date_format",
        "link_dates",
        "reference_tags",
        "poster",
        "feed_base_url",
        "last_sort",
    ];

    /// Load settings from a TOML file.
    ///
    /// - Missing file → `Ok(Settings::default())`
    /// - Empty file → `Ok(Settings::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // SEC-014: Check file size before reading to prevent memory exhaustion
        // from a maliciously large or corrupted config file.
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let settings: Settings = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            username = %settings.username,
            sort = %settings.sort,
            style = %settings.style,
            "Loaded settings"
        );
        Ok(settings)
    }

    /// Write settings to `path` atomically, creating the directory if needed.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                std::fs::create_dir_all(dir)?;
                restrict_permissions(dir);
            }
        }
        let content = toml::to_string_pretty(self)?;
        atomic_write(path, content.as_bytes())?;
        tracing::debug!(path = %path.display(), "Saved settings");
        Ok(())
    }

    /// Env var overrides. Env takes precedence over the config file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(username) = std::env::var(USERNAME_ENV) {
            if !username.trim().is_empty() {
                self.username = username.trim().to_string();
            }
        }
    }

    /// Check that a feed can be fetched. Runs before any network access.
    pub fn validate_username(&self) -> Result<&str, ConfigError> {
        let username = self.username.trim();
        if username.is_empty() {
            return Err(ConfigError::MissingUsername);
        }
        if !is_valid_username(username) {
            return Err(ConfigError::InvalidUsername(username.to_string()));
        }
        Ok(username)
    }

    /// Vault root directory, with a leading `~/` expanded.
    pub fn vault_root(&self) -> Result<PathBuf, ConfigError> {
        let raw = self.vault_path.trim();
        if raw.is_empty() {
            return Err(ConfigError::MissingVault);
        }
        if let Some(rest) = raw.strip_prefix("~/") {
            return Ok(home_dir()?.join(rest));
        }
        Ok(PathBuf::from(raw))
    }

    /// Vault-relative path of the diary note.
    pub fn note_path(&self) -> PathBuf {
        note_path(&self.folder, &self.filename)
    }

    pub fn render_options(&self) -> RenderOptions {
        let date_format = self.date_format.trim();
        RenderOptions {
            style: self.style,
            stars: self.stars,
            poster: self.poster,
            reference_tag: self.reference_tags,
            date_format: (!date_format.is_empty()).then(|| date_format.to_string()),
            link_dates: self.link_dates,
        }
    }

    /// Set one key from its string form, validating the value.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        match key {
            "username" => {
                let value = value.trim();
                if !value.is_empty() && !is_valid_username(value) {
                    return Err(ConfigError::InvalidUsername(value.to_string()));
                }
                self.username = value.to_string();
            }
            "vault_path" => self.vault_path = value.trim().to_string(),
            "folder" => self.folder = value.trim().to_string(),
            "filename" => {
                let value = value.trim();
                if value.is_empty() || value.contains(['/', '\\']) {
                    return Err(invalid("must be a plain file name".to_string()));
                }
                self.filename = value.to_string();
            }
            "sort" => self.sort = value.parse().map_err(invalid)?,
            "style" => self.style = value.parse().map_err(invalid)?,
            "stars" => self.stars = value.parse().map_err(invalid)?,
            "date_format" => {
                if !value.trim().is_empty() && !is_valid_pattern(value) {
                    return Err(invalid(format!("'{value}' is not a usable date pattern")));
                }
                self.date_format = value.to_string();
            }
            "link_dates" => self.link_dates = parse_bool(value).map_err(invalid)?,
            "reference_tags" => self.reference_tags = parse_bool(value).map_err(invalid)?,
            "poster" => self.poster = parse_bool(value).map_err(invalid)?,
            "feed_base_url" => {
                url::Url::parse(value.trim()).map_err(|e| invalid(e.to_string()))?;
                self.feed_base_url = value.trim().to_string();
            }
            "last_sort" => {
                return Err(invalid("recorded by sync, not set by hand".to_string()));
            }
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        }
        Ok(())
    }
}

/// Usernames are URL path segments: ASCII letters, digits and underscores.
pub fn is_valid_username(username: &str) -> bool {
    !username.is_empty()
        && username.len() <= 32
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        other => Err(format!("'{other}' is not a boolean")),
    }
}

fn home_dir() -> Result<PathBuf, ConfigError> {
    std::env::var("HOME")
        .map(PathBuf::from)
        .map_err(|_| ConfigError::NoHome)
}

/// Default settings file location (~/.config/filmlog/config.toml).
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    Ok(home_dir()?
        .join(".config")
        .join("filmlog")
        .join("config.toml"))
}

/// SEC-007: Set directory permissions on Unix (user-only access)
fn restrict_permissions(dir: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(dir) {
            Ok(metadata) => {
                let mut perms = metadata.permissions();
                perms.set_mode(0o700);
                if let Err(e) = std::fs::set_permissions(dir, perms) {
                    tracing::warn!(
                        path = %dir.display(),
                        error = %e,
                        "Failed to set config directory permissions to 0700"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    path = %dir.display(),
                    error = %e,
                    "Failed to read config directory metadata"
                );
            }
        }
    }
    #[cfg(not(unix))]
    let _ = dir;
}

// ============================================================================
// Settings Store
// ============================================================================

/// Host capability for persisting [`Settings`].
pub trait SettingsStore {
    fn load(&self) -> Result<Settings, ConfigError>;
    fn save(&self, settings: &Settings) -> Result<(), ConfigError>;
}

/// Settings kept in a TOML file.
#[derive(Debug, Clone)]
pub struct TomlSettingsStore {
    path: PathBuf,
}

impl TomlSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for TomlSettingsStore {
    fn load(&self) -> Result<Settings, ConfigError> {
        Settings::load(&self.path)
    }

    fn save(&self, settings: &Settings) -> Result<(), ConfigError> {
        settings.save(&self.path)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("filmlog_config_test_{name}"));
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert!(settings.username.is_empty());
        assert_eq!(settings.filename, "Letterboxd Diary.md");
        assert_eq!(settings.sort, SortDirection::Ascending);
        assert_eq!(settings.style, DisplayStyle::List);
        assert_eq!(settings.stars, StarStyle::Filled);
        assert!(settings.link_dates);
        assert!(!settings.reference_tags);
        assert!(!settings.poster);
        assert_eq!(settings.feed_base_url, "https://letterboxd.com");
        assert!(settings.last_sort.is_none());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/filmlog_test_nonexistent_config.toml");
        let settings = Settings::load(path).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let dir = test_dir("whitespace");
        let path = dir.join("config.toml");
        std::fs::write(&path, "   \n  \n  ").unwrap();

        assert_eq!(Settings::load(&path).unwrap(), Settings::default());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let dir = test_dir("partial");
        let path = dir.join("config.toml");
        std::fs::write(&path, "username = \"someone\"\nsort = \"descending\"\n").unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.username, "someone");
        assert_eq!(settings.sort, SortDirection::Descending);
        assert_eq!(settings.style, DisplayStyle::List); // default
        assert!(settings.link_dates); // default

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_config() {
        let dir = test_dir("full");
        let path = dir.join("config.toml");
        let content = r#"
username = "someone"
vault_path = "/home/someone/Notes"
folder = "Films"
filename = "Diary"
sort = "descending"
style = "callout"
stars = "emoji"
date_format = "%B %-d, %Y"
link_dates = false
reference_tags = true
poster = true
feed_base_url = "https://mirror.example"
last_sort = "ascending"
"#;
        std::fs::write(&path, content).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.vault_path, "/home/someone/Notes");
        assert_eq!(settings.note_path(), PathBuf::from("Films/Diary.md"));
        assert_eq!(settings.style, DisplayStyle::Callout);
        assert_eq!(settings.stars, StarStyle::Emoji);
        assert_eq!(settings.last_sort, Some(SortDirection::Ascending));

        let options = settings.render_options();
        assert_eq!(options.date_format.as_deref(), Some("%B %-d, %Y"));
        assert!(!options.link_dates);
        assert!(options.reference_tag);
        assert!(options.poster);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let dir = test_dir("invalid");
        let path = dir.join("config.toml");
        std::fs::write(&path, "this is not [valid toml").unwrap();

        let err = Settings::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_enum_value_returns_error() {
        let dir = test_dir("badenum");
        let path = dir.join("config.toml");
        std::fs::write(&path, "sort = \"sideways\"\n").unwrap();

        assert!(matches!(
            Settings::load(&path),
            Err(ConfigError::Parse(_))
        ));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let dir = test_dir("unknown");
        let path = dir.join("config.toml");
        std::fs::write(&path, "username = \"someone\"\ntotally_fake_key = 42\n").unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.username, "someone");

        std::fs::remove_dir_all(&dir).ok();
    }

    // SEC-014: File size limit
    #[test]
    fn test_too_large_file_rejected() {
        let dir = test_dir("too_large");
        let path = dir.join("config.toml");
        std::fs::write(&path, "a".repeat(1_048_577)).unwrap();

        let err = Settings::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_save_then_load() {
        let dir = test_dir("save");
        let path = dir.join("nested").join("config.toml");

        let mut settings = Settings::default();
        settings.set("username", "someone").unwrap();
        settings.set("sort", "desc").unwrap();
        settings.set("poster", "yes").unwrap();
        settings.last_sort = Some(SortDirection::Descending);
        settings.save(&path).unwrap();

        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded, settings);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_store_roundtrip_through_trait() {
        let dir = test_dir("store");
        let store = TomlSettingsStore::new(dir.join("config.toml"));

        assert_eq!(store.load().unwrap(), Settings::default());
        let mut settings = Settings::default();
        settings.username = "someone".to_string();
        store.save(&settings).unwrap();
        assert_eq!(store.load().unwrap().username, "someone");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_set_validates_values() {
        let mut settings = Settings::default();
        assert!(matches!(
            settings.set("username", "bad/name"),
            Err(ConfigError::InvalidUsername(_))
        ));
        assert!(matches!(
            settings.set("sort", "sideways"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            settings.set("date_format", "%Q"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            settings.set("poster", "maybe"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            settings.set("filename", "a/b.md"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            settings.set("last_sort", "ascending"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            settings.set("colour", "red"),
            Err(ConfigError::UnknownKey(_))
        ));
        // Nothing changed
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_set_accepts_values() {
        let mut settings = Settings::default();
        settings.set("style", "Callout").unwrap();
        settings.set("stars", "count").unwrap();
        settings.set("date_format", "%d %b").unwrap();
        settings.set("link_dates", "off").unwrap();
        settings.set("folder", " Films/Diary ").unwrap();
        assert_eq!(settings.style, DisplayStyle::Callout);
        assert_eq!(settings.stars, StarStyle::Count);
        assert_eq!(settings.date_format, "%d %b");
        assert!(!settings.link_dates);
        assert_eq!(settings.folder, "Films/Diary");
    }

    #[test]
    fn test_validate_username() {
        let mut settings = Settings::default();
        assert!(matches!(
            settings.validate_username(),
            Err(ConfigError::MissingUsername)
        ));
        settings.username = "  some_one1 ".to_string();
        assert_eq!(settings.validate_username().unwrap(), "some_one1");
        settings.username = "../etc".to_string();
        assert!(matches!(
            settings.validate_username(),
            Err(ConfigError::InvalidUsername(_))
        ));
    }

    #[test]
    fn test_env_username_overrides_file() {
        let dir = test_dir("env_username");
        let path = dir.join("config.toml");
        std::fs::write(&path, "username = \"from_file\"\nsort = \"descending\"\n").unwrap();

        std::env::set_var(USERNAME_ENV, "  from_env ");
        let mut settings = Settings::load(&path).unwrap();
        settings.apply_env_overrides();
        std::env::remove_var(USERNAME_ENV);

        assert_eq!(settings.username, "from_env");
        assert_eq!(settings.sort, SortDirection::Descending);

        // Blank env value leaves the file's username alone
        std::env::set_var(USERNAME_ENV, "   ");
        let mut settings = Settings::load(&path).unwrap();
        settings.apply_env_overrides();
        std::env::remove_var(USERNAME_ENV);
        assert_eq!(settings.username, "from_file");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_vault_root() {
        let mut settings = Settings::default();
        assert!(matches!(settings.vault_root(), Err(ConfigError::MissingVault)));
        settings.vault_path = "/srv/notes".to_string();
        assert_eq!(settings.vault_root().unwrap(), PathBuf::from("/srv/notes"));
    }

    #[test]
    fn test_known_keys_cover_serialized_fields() {
        let mut settings = Settings::default();
        settings.last_sort = Some(SortDirection::Ascending);
        let raw: toml::Table = toml::to_string(&settings).unwrap().parse().unwrap();
        for key in raw.keys() {
            assert!(Settings::KNOWN_KEYS.contains(&key.as_str()), "{key}");
        }
        assert_eq!(raw.len(), Settings::KNOWN_KEYS.len());
    }
}
