//! Configuration for docstash paths and classifier tuning.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (DOCSTASH_ROOT, DOCSTASH_DATABASE)
//! 2. Config file (.docstash/config.yaml)
//! 3. Defaults (<data dir>/docstash)
//!
//! Config file discovery:
//! - Searches current directory and parents for .docstash/config.yaml
//! - `root` is relative to the directory containing .docstash/
//! - `temp_dir`, `files_dir` and `database` are relative to the root
//! - `converted_dir` is relative to the temp dir

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::ingest::ClassifierSettings;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

pub const ROOT_ENV: &str = "DOCSTASH_ROOT";
pub const DATABASE_ENV: &str = "DOCSTASH_DATABASE";

const DEFAULT_TEMP_DIR: &str = "temp_uploads";
const DEFAULT_CONVERTED_DIR: &str = "converted";
const DEFAULT_FILES_DIR: &str = "files";
const DEFAULT_DATABASE: &str = "documents.amo";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub classifier: Option<ClassifierConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    pub root: Option<String>,
    pub temp_dir: Option<String>,
    pub converted_dir: Option<String>,
    pub files_dir: Option<String>,
    pub database: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    pub prefix_bytes: Option<usize>,
    pub binary_threshold: Option<f64>,
}

/// Where everything lives on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    pub root: PathBuf,
    /// Staging directory for uploads
    pub temp_dir: PathBuf,
    /// Staging directory for normalized images
    pub converted_dir: PathBuf,
    /// Content-addressed permanent store
    pub files_dir: PathBuf,
    /// Metadata database file
    pub database: PathBuf,
}

impl StorageLayout {
    /// Default layout below `root`
    pub fn under(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let temp_dir = root.join(DEFAULT_TEMP_DIR);
        Self {
            converted_dir: temp_dir.join(DEFAULT_CONVERTED_DIR),
            files_dir: root.join(DEFAULT_FILES_DIR),
            database: root.join(DEFAULT_DATABASE),
            temp_dir,
            root,
        }
    }

    /// Create every directory of the layout
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [&self.root, &self.temp_dir, &self.converted_dir, &self.files_dir] {
            std::fs::create_dir_all(dir)?;
        }
        if let Some(parent) = self.database.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub layout: StorageLayout,
    pub classifier: ClassifierSettings,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

/// Values taken from the environment
#[derive(Debug, Clone, Default)]
struct Overrides {
    root: Option<PathBuf>,
    database: Option<PathBuf>,
}

impl Overrides {
    fn from_env() -> Self {
        Self {
            root: std::env::var_os(ROOT_ENV).map(PathBuf::from),
            database: std::env::var_os(DATABASE_ENV).map(PathBuf::from),
        }
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".docstash").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to `base`
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

fn default_root() -> Result<PathBuf> {
    Ok(dirs::data_dir()
        .context("Failed to determine data directory")?
        .join("docstash"))
}

/// Combine a parsed config file with environment overrides
fn resolve(
    config_path: Option<&Path>,
    file: Option<&ConfigFile>,
    overrides: Overrides,
    default_root: PathBuf,
) -> Result<ResolvedConfig> {
    let paths = file.map(|f| f.paths.clone()).unwrap_or_default();

    // Directory containing .docstash/
    let base_dir = config_path
        .and_then(|p| p.parent())
        .and_then(|p| p.parent())
        .unwrap_or(Path::new("."));

    let root = match (overrides.root, paths.root.as_deref()) {
        (Some(root), _) => root,
        (None, Some(root)) => resolve_path(base_dir, root),
        (None, None) => default_root,
    };

    let temp_dir = resolve_path(&root, paths.temp_dir.as_deref().unwrap_or(DEFAULT_TEMP_DIR));
    let converted_dir = resolve_path(
        &temp_dir,
        paths.converted_dir.as_deref().unwrap_or(DEFAULT_CONVERTED_DIR),
    );
    let files_dir = resolve_path(&root, paths.files_dir.as_deref().unwrap_or(DEFAULT_FILES_DIR));
    let database = match overrides.database {
        Some(db) => db,
        None => resolve_path(&root, paths.database.as_deref().unwrap_or(DEFAULT_DATABASE)),
    };

    let defaults = ClassifierSettings::default();
    let tuning = file.and_then(|f| f.classifier.as_ref());
    let classifier = ClassifierSettings {
        prefix_bytes: tuning
            .and_then(|c| c.prefix_bytes)
            .unwrap_or(defaults.prefix_bytes),
        binary_threshold: tuning
            .and_then(|c| c.binary_threshold)
            .unwrap_or(defaults.binary_threshold),
    };

    if classifier.prefix_bytes == 0 {
        anyhow::bail!("classifier.prefix_bytes must be greater than zero");
    }
    if !(0.0..=1.0).contains(&classifier.binary_threshold) {
        anyhow::bail!(
            "classifier.binary_threshold must be between 0 and 1, got {}",
            classifier.binary_threshold
        );
    }

    Ok(ResolvedConfig {
        layout: StorageLayout {
            root,
            temp_dir,
            converted_dir,
            files_dir,
            database,
        },
        classifier,
        config_file: config_path.map(Path::to_path_buf),
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let config_path = find_config_file();
    let file = config_path.as_deref().map(load_config_file).transpose()?;

    resolve(
        config_path.as_deref(),
        file.as_ref(),
        Overrides::from_env(),
        default_root()?,
    )
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration, bypassing the cache
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_config(dir: &Path, body: &str) -> PathBuf {
        let docstash_dir = dir.join(".docstash");
        std::fs::create_dir_all(&docstash_dir).unwrap();
        let config_path = docstash_dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "{}", body).unwrap();
        config_path
    }

    #[test]
    fn test_defaults_without_file() {
        let config = resolve(None, None, Overrides::default(), PathBuf::from("/data/docstash")).unwrap();

        assert_eq!(config.layout, StorageLayout::under("/data/docstash"));
        assert_eq!(
            config.layout.converted_dir,
            PathBuf::from("/data/docstash/temp_uploads/converted")
        );
        assert_eq!(config.layout.database, PathBuf::from("/data/docstash/documents.amo"));
        assert_eq!(config.classifier.prefix_bytes, 4100);
        assert!(config.config_file.is_none());
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let config_path = write_config(
            temp.path(),
            r#"
version: "1.0"
paths:
  root: ./store
  temp_dir: incoming
  database: meta/index.amo
classifier:
  binary_threshold: 0.25
"#,
        );

        let file = load_config_file(&config_path).unwrap();
        assert_eq!(file.version, "1.0");
        assert_eq!(file.paths.root.as_deref(), Some("./store"));
        assert!(file.paths.files_dir.is_none());

        let config = resolve(
            Some(&config_path),
            Some(&file),
            Overrides::default(),
            PathBuf::from("/unused"),
        )
        .unwrap();

        let root = temp.path().join("./store");
        assert_eq!(config.layout.root, root);
        assert_eq!(config.layout.temp_dir, root.join("incoming"));
        assert_eq!(config.layout.converted_dir, root.join("incoming").join("converted"));
        assert_eq!(config.layout.files_dir, root.join("files"));
        assert_eq!(config.layout.database, root.join("meta/index.amo"));
        assert_eq!(config.classifier.binary_threshold, 0.25);
        assert_eq!(config.classifier.prefix_bytes, 4100);
        assert_eq!(config.config_file, Some(config_path));
    }

    #[test]
    fn test_env_overrides_win() {
        let temp = TempDir::new().unwrap();
        let config_path = write_config(
            temp.path(),
            "version: \"1.0\"\npaths:\n  root: ./ignored\n  database: ignored.amo",
        );
        let file = load_config_file(&config_path).unwrap();

        let config = resolve(
            Some(&config_path),
            Some(&file),
            Overrides {
                root: Some(PathBuf::from("/srv/docs")),
                database: Some(PathBuf::from("/var/db/docs.amo")),
            },
            PathBuf::from("/unused"),
        )
        .unwrap();

        assert_eq!(config.layout.root, PathBuf::from("/srv/docs"));
        assert_eq!(config.layout.files_dir, PathBuf::from("/srv/docs/files"));
        assert_eq!(config.layout.database, PathBuf::from("/var/db/docs.amo"));
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        let file: ConfigFile =
            serde_yaml::from_str("version: \"1.0\"\nclassifier:\n  binary_threshold: 1.5").unwrap();
        let err = resolve(None, Some(&file), Overrides::default(), PathBuf::from("/r")).unwrap_err();
        assert!(err.to_string().contains("binary_threshold"));
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "./subdir"),
            PathBuf::from("/home/user/project/./subdir")
        );
        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
    }

    #[test]
    fn test_ensure_dirs_creates_layout() {
        let temp = TempDir::new().unwrap();
        let layout = StorageLayout::under(temp.path().join("root"));
        layout.ensure_dirs().unwrap();

        assert!(layout.temp_dir.is_dir());
        assert!(layout.converted_dir.is_dir());
        assert!(layout.files_dir.is_dir());
    }
}
