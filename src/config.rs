//! Configuration System
//!
//! One configuration file describes one data source: where its data files
//! live, which of them to index, how to read them and where the index is
//! kept. JSON files (legacy `PascalCase` keys or `snake_case`) and TOML files
//! are both accepted:
//!
//! ```toml
//! type = "log"
//! index_dir = "/var/lib/timefind/web"
//! paths = ["/var/log/web"]
//! include = ["*.log", "*.log.[0-9]"]
//! exclude = ["debug*"]
//! alias = ["www"]
//! ```

use globset::{GlobBuilder, GlobMatcher};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Configuration for one indexed data source
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Configuration {
    /// Name of the data source; also the index file name (defaults to the config file stem)
    #[serde(default, alias = "name")]
    pub name: String,

    /// Processor type used to read data files
    #[serde(rename = "Type", alias = "type")]
    pub data_type: String,

    /// Directory holding one index file per data directory
    #[serde(default, rename = "IndexDir", alias = "index_dir")]
    pub index_dir: Option<PathBuf>,

    /// Single database file holding the whole index
    #[serde(default, rename = "IndexDb", alias = "index_db")]
    pub index_db: Option<PathBuf>,

    /// Data roots to scan
    #[serde(default, alias = "paths")]
    pub paths: Vec<PathBuf>,

    /// File name patterns to index
    #[serde(default, alias = "include")]
    pub include: Vec<String>,

    /// File name patterns to skip; checked before `include`
    #[serde(default, alias = "exclude")]
    pub exclude: Vec<String>,

    /// Other names this data source can be queried by
    #[serde(default, alias = "alias")]
    pub alias: Vec<String>,

    #[serde(skip)]
    matcher: FileMatcher,
}

/// Where the index for a data source is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind<'a> {
    /// One flat file per directory under this root
    FlatFile(&'a Path),
    /// One database file
    Database(&'a Path),
}

/// Compiled include/exclude patterns
#[derive(Debug, Clone, Default)]
pub struct FileMatcher {
    include: Vec<GlobMatcher>,
    exclude: Vec<GlobMatcher>,
}

impl FileMatcher {
    /// Compile patterns; invalid ones are logged and dropped
    pub fn new(include: &[String], exclude: &[String]) -> Self {
        Self {
            include: compile_patterns(include, "include"),
            exclude: compile_patterns(exclude, "exclude"),
        }
    }

    /// Check if a file name should be indexed
    ///
    /// Any exclude match rejects the name. Otherwise the name must match at
    /// least one include pattern.
    pub fn matches(&self, file_name: &str) -> bool {
        if self.exclude.iter().any(|glob| glob.is_match(file_name)) {
            return false;
        }
        self.include.iter().any(|glob| glob.is_match(file_name))
    }
}

fn compile_patterns(patterns: &[String], kind: &str) -> Vec<GlobMatcher> {
    patterns
        .iter()
        .filter_map(|pattern| {
            match GlobBuilder::new(pattern).literal_separator(true).build() {
                Ok(glob) => Some(glob.compile_matcher()),
                Err(e) => {
                    tracing::warn!("Bad {} pattern {:?}: {}", kind, pattern, e);
                    None
                }
            }
        })
        .collect()
}

impl Configuration {
    /// Create a configuration in code
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            ..Self::default()
        }
    }

    /// Builder: keep the index as flat files under `dir`
    pub fn index_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.index_dir = Some(dir.into());
        self
    }

    /// Builder: keep the index in the database at `path`
    pub fn index_db(mut self, path: impl Into<PathBuf>) -> Self {
        self.index_db = Some(path.into());
        self
    }

    /// Builder: add a data root
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.push(path.into());
        self
    }

    /// Builder: add an include pattern
    pub fn include(mut self, pattern: impl Into<String>) -> Self {
        self.include.push(pattern.into());
        self.matcher = FileMatcher::new(&self.include, &self.exclude);
        self
    }

    /// Builder: add an exclude pattern
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude.push(pattern.into());
        self.matcher = FileMatcher::new(&self.include, &self.exclude);
        self
    }

    /// Builder: add an alias
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias.push(alias.into());
        self
    }

    /// Load configuration from a file
    ///
    /// `.json` files are read as JSON, everything else as TOML. The result
    /// is validated and all paths are made absolute.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let parse_error = |error: String| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        };

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let mut config: Configuration = if is_json {
            serde_json::from_str(&content).map_err(|e| parse_error(e.to_string()))?
        } else {
            toml::from_str(&content).map_err(|e| parse_error(e.to_string()))?
        };

        if config.name.is_empty() {
            config.name = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().split('.').next().unwrap_or_default().to_string())
                .unwrap_or_default();
        }

        config.finalize()
    }

    /// Validate, normalize paths and compile patterns
    pub fn finalize(mut self) -> Result<Self, ConfigError> {
        self.validate()?;

        let absolute = |path: &Path| {
            std::path::absolute(path).map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                error: e.to_string(),
            })
        };

        self.index_dir = self.index_dir.as_deref().map(absolute).transpose()?;
        self.index_db = self.index_db.as_deref().map(absolute).transpose()?;
        self.paths = self
            .paths
            .iter()
            .map(|path| absolute(path))
            .collect::<Result<_, _>>()?;

        self.matcher = FileMatcher::new(&self.include, &self.exclude);
        Ok(self)
    }

    /// Check the configuration for contradictions
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::Invalid("data source has no name".to_string()));
        }
        if self.data_type.is_empty() {
            return Err(ConfigError::Invalid(format!("{}: no data type", self.name)));
        }
        match (&self.index_dir, &self.index_db) {
            (Some(_), Some(_)) => Err(ConfigError::ConflictingStorage(self.name.clone())),
            (None, None) => Err(ConfigError::MissingStorage(self.name.clone())),
            _ if self.paths.is_empty() => Err(ConfigError::NoDataPaths(self.name.clone())),
            _ => Ok(()),
        }
    }

    /// Where the index is stored
    pub fn storage(&self) -> Result<StorageKind<'_>, ConfigError> {
        match (&self.index_dir, &self.index_db) {
            (Some(dir), None) => Ok(StorageKind::FlatFile(dir)),
            (None, Some(db)) => Ok(StorageKind::Database(db)),
            (Some(_), Some(_)) => Err(ConfigError::ConflictingStorage(self.name.clone())),
            (None, None) => Err(ConfigError::MissingStorage(self.name.clone())),
        }
    }

    /// Check if a file name should be indexed
    pub fn matches(&self, file_name: &str) -> bool {
        self.matcher.matches(file_name)
    }

    /// Check if this data source is known by `name`, directly or by alias
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.alias.iter().any(|alias| alias == name)
    }

    /// Configuration directories searched when none is given explicitly
    ///
    /// `TIMEFIND_CONFIG_DIR` overrides the defaults.
    pub fn default_dirs() -> Vec<PathBuf> {
        if let Ok(dir) = std::env::var("TIMEFIND_CONFIG_DIR") {
            return vec![PathBuf::from(dir)];
        }

        let mut dirs = Vec::new();
        if let Some(dir) = dirs::config_dir() {
            dirs.push(dir.join("timefind"));
        }
        dirs.push(PathBuf::from("/etc/timefind"));
        dirs
    }

    /// List configuration files (`.json`, `.toml`) in the given directories
    pub fn discover(dirs: &[PathBuf]) -> Vec<PathBuf> {
        let mut found = Vec::new();

        for dir in dirs {
            let entries = match std::fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(_) => continue,
            };

            let mut files: Vec<PathBuf> = entries
                .filter_map(Result::ok)
                .map(|entry| entry.path())
                .filter(|path| {
                    path.is_file()
                        && path
                            .extension()
                            .and_then(|ext| ext.to_str())
                            .is_some_and(|ext| matches!(ext, "json" | "toml"))
                })
                .collect();
            files.sort();

            tracing::debug!("Found {} configuration files in {:?}", files.len(), dir);
            found.extend(files);
        }

        found
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("{0}: configuration must specify either IndexDb or IndexDir, but not both")]
    ConflictingStorage(String),

    #[error("{0}: configuration does not have an index directory or database path")]
    MissingStorage(String),

    #[error("{0}: configuration has no data paths")]
    NoDataPaths(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn matcher(include: &[&str], exclude: &[&str]) -> FileMatcher {
        let include: Vec<String> = include.iter().map(|s| s.to_string()).collect();
        let exclude: Vec<String> = exclude.iter().map(|s| s.to_string()).collect();
        FileMatcher::new(&include, &exclude)
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let m = matcher(&["*.log"], &["debug*"]);
        assert!(m.matches("app.log"));
        assert!(!m.matches("debug.log"));
        assert!(!m.matches("app.txt"));
    }

    #[test]
    fn test_no_include_rejects_everything() {
        let m = matcher(&[], &[]);
        assert!(!m.matches("app.log"));
    }

    #[test]
    fn test_invalid_patterns_fail_closed() {
        // A bad exclude contributes no exclusion
        let m = matcher(&["*.log"], &["[unclosed"]);
        assert!(m.matches("app.log"));

        // A bad include contributes no inclusion
        let m = matcher(&["[unclosed", "*.csv"], &[]);
        assert!(!m.matches("app.log"));
        assert!(m.matches("data.csv"));
    }

    #[test]
    fn test_star_does_not_cross_separator() {
        let m = matcher(&["*.log"], &[]);
        assert!(!m.matches("sub/app.log"));
    }

    #[test]
    fn test_load_legacy_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("web.json");
        std::fs::write(
            &path,
            r#"{
                "IndexDir": "/var/lib/timefind",
                "Paths": ["/var/log/web"],
                "Include": ["*.log"],
                "Exclude": ["*.gz"],
                "Type": "log",
                "Alias": ["www"]
            }"#,
        )
        .unwrap();

        let config = Configuration::load(&path).unwrap();
        assert_eq!(config.name, "web");
        assert_eq!(config.data_type, "log");
        assert_eq!(config.storage().unwrap(), StorageKind::FlatFile(Path::new("/var/lib/timefind")));
        assert_eq!(config.paths, vec![PathBuf::from("/var/log/web")]);
        assert!(config.matches("access.log"));
        assert!(!config.matches("access.log.gz"));
        assert!(config.answers_to("www"));
        assert!(config.answers_to("web"));
        assert!(!config.answers_to("db"));
    }

    #[test]
    fn test_load_toml_relative_paths_become_absolute() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flows.toml");
        std::fs::write(
            &path,
            r#"
type = "csv"
index_db = "flows.db"
paths = ["data"]
include = ["*.csv"]
"#,
        )
        .unwrap();

        let config = Configuration::load(&path).unwrap();
        assert_eq!(config.name, "flows");
        assert!(config.index_db.as_ref().unwrap().is_absolute());
        assert!(config.paths.iter().all(|p| p.is_absolute()));
        assert!(matches!(config.storage().unwrap(), StorageKind::Database(_)));
    }

    #[test]
    fn test_both_storage_modes_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("both.json");
        std::fs::write(
            &path,
            r#"{"IndexDir": "/a", "IndexDb": "/b.db", "Paths": ["/data"], "Type": "log"}"#,
        )
        .unwrap();

        assert!(matches!(
            Configuration::load(&path),
            Err(ConfigError::ConflictingStorage(_))
        ));
    }

    #[test]
    fn test_missing_storage_and_paths() {
        let err = Configuration::new("x", "log").path("/data").finalize().unwrap_err();
        assert!(matches!(err, ConfigError::MissingStorage(_)));

        let err = Configuration::new("x", "log").index_dir("/idx").finalize().unwrap_err();
        assert!(matches!(err, ConfigError::NoDataPaths(_)));
    }

    #[test]
    fn test_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(Configuration::load(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_discover() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("b.toml"), "").unwrap();
        std::fs::write(dir.path().join("a.json"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();

        let found = Configuration::discover(&[dir.path().to_path_buf(), dir.path().join("absent")]);
        assert_eq!(found, vec![dir.path().join("a.json"), dir.path().join("b.toml")]);
    }
}
