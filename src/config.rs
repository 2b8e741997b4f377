//! maint configuration.
//!
//! Loaded from `~/.maint/config.toml`. A missing file means defaults.
//!
//! ```toml
//! identity = "jdoe"
//! catalog = "/srv/plant/catalog.json"
//! database = "/srv/plant/maint.sqlite"
//! ```

use std::{fs, io, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::storage::Storage;

/// maint configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Default acting user, used when `--as` and `MAINT_IDENTITY` are unset.
    pub identity: Option<String>,

    /// Equipment catalog JSON. Defaults to `~/.maint/catalog.json`.
    pub catalog: Option<PathBuf>,

    /// Activity database. Defaults to `~/.maint/maint.sqlite`.
    pub database: Option<PathBuf>,
}

impl Config {
    /// Load config from `~/.maint/config.toml`, or defaults if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns a message if the file exists but can't be read or parsed.
    pub fn load() -> Result<Self, String> {
        let Some(path) = Self::path() else {
            return Ok(Self::default());
        };

        let contents = match fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(format!("failed to read {}: {e}", path.display())),
        };

        Self::parse(&contents).map_err(|e| format!("invalid config at {}: {e}", path.display()))
    }

    /// Parse config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns the TOML error if the text is malformed.
    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// The config file path: `~/.maint/config.toml`.
    #[must_use]
    pub fn path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".maint").join("config.toml"))
    }

    /// The catalog path: configured, or `~/.maint/catalog.json`.
    ///
    /// # Errors
    ///
    /// Returns a message if no path is configured and the home directory is unknown.
    pub fn catalog_path(&self) -> Result<PathBuf, String> {
        self.catalog
            .clone()
            .or_else(|| dirs::home_dir().map(|h| h.join(".maint").join("catalog.json")))
            .ok_or_else(|| "could not determine home directory".to_string())
    }

    /// The database path: configured, or the storage default.
    ///
    /// # Errors
    ///
    /// Returns a message if no path is configured and the home directory is unknown.
    pub fn database_path(&self) -> Result<PathBuf, String> {
        self.database
            .clone()
            .or_else(Storage::default_path)
            .ok_or_else(|| "could not determine home directory".to_string())
    }
}
