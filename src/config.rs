//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce `Settings` (parametri di encoding per singolo task) e `RunConfig` (un run completo)
//! - Definisce `SearchPolicy`: limite iterazioni e epsilon della ricerca binaria sulla qualità
//! - Risolve configurazioni nominate da file JSON o dai preset built-in
//! - Applica i default documentati campo per campo (merge con i default)
//! - Fornisce validazione dei parametri di input
//!
//! ## Parametri di configurazione:
//! - `quality`: Qualità iniziale (0-100, default: 80)
//! - `min_quality`: Qualità minima (0-100, default: uguale a `quality`)
//! - `target_size_kb`: Dimensione target in KB (default: 200, `null` = nessun vincolo)
//! - `resize`: Resize opzionale "shrink only" (default: disabilitato, 1200x630)
//! - `extensions`: Estensioni sorgente accettate
//! - `concurrency`: Numero di worker paralleli (default: CPU - 1)
//! - `max_iterations` / `epsilon_kb`: Politica di convergenza (default: 5 / 1.0 KB)
//!
//! ## Esempio file `configs/thumbnail.json`:
//! ```json
//! {
//!   "name": "thumbnail",
//!   "sourceDir": "./assets",
//!   "outputDir": "./assets_thumbs",
//!   "quality": 70,
//!   "minQuality": 60,
//!   "targetSize": 50,
//!   "resize": { "enabled": true, "width": 300, "height": 300 }
//! }
//! ```

use crate::error::{ConvertError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Estensioni sorgente di default (senza punto, lowercase)
pub const DEFAULT_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "tiff", "webp"];

/// Nomi dei preset disponibili senza file di configurazione
pub const PRESET_NAMES: &[&str] = &[
    "high-quality",
    "thumbnail",
    "thumbnail-small",
    "thumbnail-large",
    "ogp",
    "thumbnail-1024",
    "original-2048",
];

const DEFAULT_QUALITY: u8 = 80;
const DEFAULT_TARGET_SIZE_KB: f64 = 200.0;
const DEFAULT_SOURCE_DIR: &str = "./assets";
const DEFAULT_OUTPUT_DIR: &str = "./assets_converted";

/// Shrink-only resize box. Aspect ratio is always preserved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeSettings {
    pub enabled: bool,
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for ResizeSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            max_width: 1200,
            max_height: 630,
        }
    }
}

/// Encoding settings snapshot handed to every task by value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    /// Desired (and initial) quality, 0-100
    pub quality: u8,
    /// Quality floor, never crossed by the search
    pub min_quality: u8,
    /// Target size in KB; `None` disables the search
    pub target_size_kb: Option<f64>,
    pub resize: ResizeSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            min_quality: DEFAULT_QUALITY,
            target_size_kb: Some(DEFAULT_TARGET_SIZE_KB),
            resize: ResizeSettings::default(),
        }
    }
}

impl Settings {
    /// Validate encoding parameters
    pub fn validate(&self) -> Result<()> {
        if self.quality > 100 {
            return Err(invalid("quality must be between 0 and 100"));
        }
        if self.min_quality > 100 {
            return Err(invalid("min quality must be between 0 and 100"));
        }
        if self.min_quality > self.quality {
            return Err(invalid(format!(
                "min quality ({}) must not exceed quality ({})",
                self.min_quality, self.quality
            )));
        }
        if let Some(target) = self.target_size_kb {
            if !target.is_finite() || target <= 0.0 {
                return Err(invalid("target size must be a positive number of KB"));
            }
        }
        if self.resize.enabled && (self.resize.max_width == 0 || self.resize.max_height == 0) {
            return Err(invalid("resize bounds must be greater than 0"));
        }
        Ok(())
    }
}

/// Convergence policy for the quality search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchPolicy {
    /// Upper bound on binary search iterations (encodes after the ceiling attempt)
    pub max_iterations: u32,
    /// Stop once a candidate that fits is closer than this to the target (KB)
    pub epsilon_kb: f64,
}

impl Default for SearchPolicy {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            epsilon_kb: 1.0,
        }
    }
}

impl SearchPolicy {
    pub fn validate(&self) -> Result<()> {
        if !self.epsilon_kb.is_finite() || self.epsilon_kb < 0.0 {
            return Err(invalid("epsilon must be a non-negative number of KB"));
        }
        Ok(())
    }
}

/// Configuration for a single conversion run
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub name: String,
    pub description: Option<String>,
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub settings: Settings,
    pub policy: SearchPolicy,
    /// Accepted source extensions, lowercase without the leading dot
    pub extensions: Vec<String>,
    /// Number of parallel workers
    pub concurrency: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            description: None,
            source_dir: PathBuf::from(DEFAULT_SOURCE_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            settings: Settings::default(),
            policy: SearchPolicy::default(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            concurrency: default_concurrency(),
        }
    }
}

impl RunConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        self.settings.validate()?;
        self.policy.validate()?;

        if self.concurrency == 0 {
            return Err(invalid("concurrency must be greater than 0"));
        }
        if self.extensions.is_empty() {
            return Err(invalid("at least one source extension is required"));
        }

        Ok(())
    }

    /// Serialize back to the on-disk JSON shape
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&ConfigFile::from(self))
            .map_err(|e| ConvertError::ConfigParse(e.to_string()))
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = self.to_json()?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Built-in presets, mirroring the web front-end
    pub fn preset(name: &str) -> Option<Self> {
        // (quality, min_quality, target KB, resize enabled, width, height)
        let (quality, min_quality, target, enabled, width, height) = match name {
            "high-quality" => (80, 80, Some(200.0), false, 1200, 630),
            "thumbnail" => (70, 60, Some(50.0), true, 300, 300),
            "thumbnail-small" => (65, 55, Some(30.0), true, 200, 200),
            "thumbnail-large" => (75, 65, Some(100.0), true, 512, 512),
            "ogp" => (85, 75, Some(300.0), true, 1200, 630),
            "thumbnail-1024" => (25, 25, None, true, 1024, 1024),
            "original-2048" => (90, 90, None, true, 2048, 2048),
            _ => return None,
        };

        Some(Self {
            name: name.to_string(),
            description: Some(format!("Built-in preset '{}'", name)),
            output_dir: Path::new(DEFAULT_OUTPUT_DIR).join(name),
            settings: Settings {
                quality,
                min_quality,
                target_size_kb: target,
                resize: ResizeSettings {
                    enabled,
                    max_width: width,
                    max_height: height,
                },
            },
            ..Self::default()
        })
    }
}

/// Default worker count: one less than the available parallelism, at least 1
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
        .saturating_sub(1)
        .max(1)
}

fn invalid(message: impl Into<String>) -> ConvertError {
    ConvertError::InvalidSettings(message.into())
}

/// Normalizza un'estensione: lowercase, senza punto iniziale
fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

/// Distinguishes an explicit `null` from a missing key.
fn explicit<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Shape of a resize block in a config file. Missing fields keep their defaults.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResizeFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// Shape of a JSON config file. Every field is optional and merged over the defaults.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigFile {
    pub name: Option<String>,
    pub description: Option<String>,
    pub source_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub quality: Option<u8>,
    pub min_quality: Option<u8>,
    /// Outer `None`: key missing (use default). `Some(None)`: explicit `null` (no target).
    #[serde(alias = "targetSizeKb", deserialize_with = "explicit")]
    pub target_size: Option<Option<f64>>,
    pub resize: Option<ResizeFile>,
    pub extensions: Option<Vec<String>>,
    pub concurrency: Option<usize>,
    pub max_iterations: Option<u32>,
    pub epsilon_kb: Option<f64>,
}

impl ConfigFile {
    /// Merge over the defaults, producing a complete `RunConfig`
    pub fn into_run_config(self, fallback_name: &str) -> RunConfig {
        let defaults = RunConfig::default();

        let quality = self.quality.unwrap_or(defaults.settings.quality);
        // A missing floor means "no search below the configured quality"
        let min_quality = self.min_quality.unwrap_or(quality);
        let target_size_kb = match self.target_size {
            None => defaults.settings.target_size_kb,
            Some(explicit) => explicit,
        };

        let resize_file = self.resize.unwrap_or_default();
        let resize = ResizeSettings {
            enabled: resize_file.enabled.unwrap_or(defaults.settings.resize.enabled),
            max_width: resize_file.width.unwrap_or(defaults.settings.resize.max_width),
            max_height: resize_file.height.unwrap_or(defaults.settings.resize.max_height),
        };

        let extensions = match self.extensions {
            Some(list) if !list.is_empty() => list.iter().map(|e| normalize_extension(e)).collect(),
            _ => defaults.extensions,
        };

        let concurrency = match self.concurrency {
            Some(n) if n > 0 => n,
            _ => defaults.concurrency,
        };

        RunConfig {
            name: self.name.unwrap_or_else(|| fallback_name.to_string()),
            description: self.description,
            source_dir: self.source_dir.unwrap_or(defaults.source_dir),
            output_dir: self.output_dir.unwrap_or(defaults.output_dir),
            settings: Settings {
                quality,
                min_quality,
                target_size_kb,
                resize,
            },
            policy: SearchPolicy {
                max_iterations: self.max_iterations.unwrap_or(defaults.policy.max_iterations),
                epsilon_kb: self.epsilon_kb.unwrap_or(defaults.policy.epsilon_kb),
            },
            extensions,
            concurrency,
        }
    }
}

impl From<&RunConfig> for ConfigFile {
    fn from(config: &RunConfig) -> Self {
        Self {
            name: Some(config.name.clone()),
            description: config.description.clone(),
            source_dir: Some(config.source_dir.clone()),
            output_dir: Some(config.output_dir.clone()),
            quality: Some(config.settings.quality),
            min_quality: Some(config.settings.min_quality),
            target_size: Some(config.settings.target_size_kb),
            resize: Some(ResizeFile {
                enabled: Some(config.settings.resize.enabled),
                width: Some(config.settings.resize.max_width),
                height: Some(config.settings.resize.max_height),
            }),
            extensions: Some(config.extensions.clone()),
            concurrency: Some(config.concurrency),
            max_iterations: Some(config.policy.max_iterations),
            epsilon_kb: Some(config.policy.epsilon_kb),
        }
    }
}

/// Risolve nomi di configurazione in `RunConfig` completi
#[derive(Debug, Clone)]
pub struct ConfigStore {
    configs_dir: PathBuf,
}

impl ConfigStore {
    pub fn new(configs_dir: impl Into<PathBuf>) -> Self {
        Self {
            configs_dir: configs_dir.into(),
        }
    }

    /// `./configs` when present, otherwise the per-user config directory
    pub fn default_dir() -> PathBuf {
        let local = PathBuf::from("configs");
        if local.is_dir() {
            return local;
        }
        dirs::config_dir()
            .map(|dir| dir.join("batch-image-converter").join("configs"))
            .unwrap_or(local)
    }

    pub fn configs_dir(&self) -> &Path {
        &self.configs_dir
    }

    /// Split a `--config a,b,c` argument into trimmed, non-empty names
    pub fn parse_names(arg: &str) -> Vec<String> {
        arg.split(',')
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .map(|name| name.to_string())
            .collect()
    }

    /// Load a named configuration: file first, then built-in preset
    pub async fn load(&self, name: &str) -> Result<RunConfig> {
        let path = self.configs_dir.join(format!("{}.json", name));

        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            debug!("Loading config file: {}", path.display());
            let content = tokio::fs::read_to_string(&path).await?;
            let file: ConfigFile = serde_json::from_str(&content)
                .map_err(|e| ConvertError::ConfigParse(format!("{}: {}", path.display(), e)))?;
            let config = file.into_run_config(name);
            config.validate()?;
            return Ok(config);
        }

        if let Some(preset) = RunConfig::preset(name) {
            debug!("Using built-in preset: {}", name);
            return Ok(preset);
        }

        Err(ConvertError::ConfigNotFound(format!(
            "{} (available: {})",
            name,
            self.available().join(", ")
        )))
    }

    /// Load every requested configuration; no names means the defaults
    pub async fn load_many(&self, names: &[String]) -> Result<Vec<RunConfig>> {
        if names.is_empty() {
            return Ok(vec![RunConfig::default()]);
        }

        let mut configs = Vec::with_capacity(names.len());
        for name in names {
            configs.push(self.load(name).await?);
        }
        Ok(configs)
    }

    /// Names of config files in the configs directory plus built-in presets
    pub fn available(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&self.configs_dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.path())
                    .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
                    .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
                    .collect()
            })
            .unwrap_or_default();

        names.extend(PRESET_NAMES.iter().map(|n| n.to_string()));
        names.sort();
        names.dedup();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_validation() {
        let mut config = RunConfig::default();
        assert!(config.validate().is_ok());

        config.settings.quality = 101;
        assert!(config.validate().is_err());

        config.settings.quality = 60;
        config.settings.min_quality = 70;
        assert!(config.validate().is_err());

        config.settings.min_quality = 40;
        config.settings.target_size_kb = Some(0.0);
        assert!(config.validate().is_err());

        config.settings.target_size_kb = None;
        config.concurrency = 0;
        assert!(config.validate().is_err());

        config.concurrency = 2;
        config.policy.epsilon_kb = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_default() {
        let config = RunConfig::default();
        assert_eq!(config.settings.quality, 80);
        assert_eq!(config.settings.min_quality, 80);
        assert_eq!(config.settings.target_size_kb, Some(200.0));
        assert!(!config.settings.resize.enabled);
        assert_eq!(config.settings.resize.max_width, 1200);
        assert_eq!(config.settings.resize.max_height, 630);
        assert_eq!(config.policy.max_iterations, 5);
        assert!(config.concurrency >= 1);
        assert!(config.extensions.contains(&"png".to_string()));
    }

    #[test]
    fn test_file_merge_defaults() {
        let file: ConfigFile = serde_json::from_str(r#"{ "quality": 70 }"#).unwrap();
        let config = file.into_run_config("custom");

        assert_eq!(config.name, "custom");
        assert_eq!(config.settings.quality, 70);
        // Missing floor follows quality
        assert_eq!(config.settings.min_quality, 70);
        assert_eq!(config.settings.target_size_kb, Some(200.0));
        assert_eq!(config.source_dir, PathBuf::from("./assets"));
    }

    #[test]
    fn test_explicit_null_target_disables_search() {
        let file: ConfigFile =
            serde_json::from_str(r#"{ "targetSize": null, "resize": { "enabled": true } }"#).unwrap();
        let config = file.into_run_config("x");

        assert_eq!(config.settings.target_size_kb, None);
        assert!(config.settings.resize.enabled);
        assert_eq!(config.settings.resize.max_width, 1200);
    }

    #[test]
    fn test_extensions_and_concurrency_normalized() {
        let file: ConfigFile =
            serde_json::from_str(r#"{ "extensions": [".JPG", "png"], "concurrency": 0 }"#).unwrap();
        let config = file.into_run_config("x");

        assert_eq!(config.extensions, vec!["jpg".to_string(), "png".to_string()]);
        assert_eq!(config.concurrency, default_concurrency());
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(
            ConfigStore::parse_names(" thumbnail, ogp ,,"),
            vec!["thumbnail".to_string(), "ogp".to_string()]
        );
        assert!(ConfigStore::parse_names(",").is_empty());
    }

    #[test]
    fn test_presets_are_valid() {
        for name in PRESET_NAMES {
            let preset = RunConfig::preset(name).unwrap();
            assert!(preset.validate().is_ok(), "preset {} should be valid", name);
        }
        assert!(RunConfig::preset("nope").is_none());
        assert_eq!(RunConfig::preset("thumbnail-1024").unwrap().settings.target_size_kb, None);
    }

    #[tokio::test]
    async fn test_config_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let store = ConfigStore::new(temp_dir.path());

        let original = RunConfig {
            name: "web".to_string(),
            concurrency: 3,
            settings: Settings {
                quality: 75,
                min_quality: 50,
                target_size_kb: Some(64.0),
                resize: ResizeSettings {
                    enabled: true,
                    max_width: 800,
                    max_height: 600,
                },
            },
            policy: SearchPolicy {
                max_iterations: 7,
                epsilon_kb: 0.5,
            },
            ..RunConfig::default()
        };

        original
            .save_to_file(&temp_dir.path().join("web.json"))
            .await
            .unwrap();

        let loaded = store.load("web").await.unwrap();
        assert_eq!(loaded, original);
        assert!(store.available().contains(&"web".to_string()));
    }

    #[tokio::test]
    async fn test_unknown_config_lists_available() {
        let temp_dir = TempDir::new().unwrap();
        let store = ConfigStore::new(temp_dir.path());

        let err = store.load("missing").await.unwrap_err();
        assert!(matches!(err, ConvertError::ConfigNotFound(_)));
        assert!(err.to_string().contains("thumbnail"));

        let preset = store.load("ogp").await.unwrap();
        assert_eq!(preset.settings.quality, 85);
    }

    #[tokio::test]
    async fn test_invalid_file_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        tokio::fs::write(temp_dir.path().join("bad.json"), r#"{ "quality": 50, "minQuality": 90 }"#)
            .await
            .unwrap();
        tokio::fs::write(temp_dir.path().join("broken.json"), "{ nope").await.unwrap();

        let store = ConfigStore::new(temp_dir.path());
        assert!(matches!(
            store.load("bad").await,
            Err(ConvertError::InvalidSettings(_))
        ));
        assert!(matches!(
            store.load("broken").await,
            Err(ConvertError::ConfigParse(_))
        ));
    }
}
