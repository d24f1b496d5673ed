//! Compressor configuration module.
//!
//! Handles loading, validating, and layering `snug.toml`. Stock defaults are
//! overridden by the user file, named presets are overlaid on top of the
//! `[compression]` table, and per-request options are applied last by the
//! worker.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [compression]
//! max_bytes = 204800        # Byte budget for the encoded output
//! max_width = 1200          # Bounding box for the initial downscale
//! max_height = 1200
//! start_quality = 0.85      # Quality ladder, 0.0 - 1.0
//! min_quality = 0.35
//! quality_step = 0.05
//! min_dimension = 200       # Neither edge shrinks below this
//!
//! [encoder]
//! lossy_format = "jpeg"     # "jpeg" or "avif" for non-PNG sources
//! resample = "lanczos3"     # "nearest", "triangle", "catmull_rom", "lanczos3"
//!
//! [worker]
//! queue_depth = 8           # Requests buffered before submit blocks
//!
//! [presets.profile]         # Sparse overlay on [compression]
//! max_bytes = 102400
//! max_width = 512
//! max_height = 512
//! ```
//!
//! Unknown keys are rejected to catch typos early, including inside presets.

use crate::imaging::{LossyFormat, Resample};
use crate::types::RequestOptions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Smallest accepted quality step. Keeps the quality ladder short.
pub const MIN_QUALITY_STEP: f32 = 0.001;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Unknown preset: {0}")]
    UnknownPreset(String),
}

/// Full configuration loaded from `snug.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SnugConfig {
    /// Default search parameters.
    pub compression: CompressOptions,
    /// Output container and resampling.
    pub encoder: EncoderConfig,
    /// Worker queue settings.
    pub worker: WorkerConfig,
    /// Named sparse overlays on `compression`, e.g. `profile` or `animal`.
    pub presets: BTreeMap<String, toml::Value>,
}

impl SnugConfig {
    /// Validate config values, including every preset.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.compression.validate()?;
        self.worker.validate()?;
        for name in self.presets.keys() {
            self.preset(name)?;
        }
        Ok(())
    }

    /// Resolve a named preset against `[compression]`.
    pub fn preset(&self, name: &str) -> Result<CompressOptions, ConfigError> {
        let overlay = self
            .presets
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownPreset(name.to_string()))?;
        let base = toml::Value::try_from(self.compression)?;
        let options: CompressOptions = merge_toml(base, overlay).try_into().map_err(|e| {
            ConfigError::Validation(format!("presets.{name}: {e}"))
        })?;
        options.validate().map_err(|e| match e {
            ConfigError::Validation(msg) => ConfigError::Validation(format!("presets.{name}: {msg}")),
            other => other,
        })?;
        Ok(options)
    }

    /// `[compression]`, or the named preset when one is given.
    pub fn options(&self, preset: Option<&str>) -> Result<CompressOptions, ConfigError> {
        match preset {
            Some(name) => self.preset(name),
            None => Ok(self.compression),
        }
    }
}

/// Fully-resolved search parameters for one request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompressOptions {
    /// Byte budget for the encoded output.
    pub max_bytes: u64,
    /// Bounding box for the initial downscale.
    pub max_width: u32,
    pub max_height: u32,
    /// Quality ladder, all on the `0.0..=1.0` scale.
    pub start_quality: f32,
    pub min_quality: f32,
    pub quality_step: f32,
    /// Floor neither edge may shrink below.
    pub min_dimension: u32,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            max_bytes: 204_800,
            max_width: 1200,
            max_height: 1200,
            start_quality: 0.85,
            min_quality: 0.35,
            quality_step: 0.05,
            min_dimension: 200,
        }
    }
}

impl CompressOptions {
    /// Layer a request's budget and option overrides on top of these defaults.
    pub fn with_overrides(self, max_bytes: Option<u64>, opts: Option<&RequestOptions>) -> Self {
        let opts = opts.copied().unwrap_or_default();
        Self {
            max_bytes: max_bytes.unwrap_or(self.max_bytes),
            max_width: opts.max_width.unwrap_or(self.max_width),
            max_height: opts.max_height.unwrap_or(self.max_height),
            start_quality: opts.start_quality.unwrap_or(self.start_quality),
            min_quality: opts.min_quality.unwrap_or(self.min_quality),
            quality_step: opts.quality_step.unwrap_or(self.quality_step),
            min_dimension: opts.min_dimension.unwrap_or(self.min_dimension),
        }
    }

    pub fn bounds(&self) -> (u32, u32) {
        (self.max_width, self.max_height)
    }

    /// Validate values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit = 0.0..=1.0;
        if self.max_bytes == 0 {
            return Err(ConfigError::Validation("max_bytes must be positive".into()));
        }
        if self.max_width == 0 || self.max_height == 0 {
            return Err(ConfigError::Validation(
                "max_width and max_height must be non-zero".into(),
            ));
        }
        if self.min_dimension == 0 {
            return Err(ConfigError::Validation(
                "min_dimension must be non-zero".into(),
            ));
        }
        if !unit.contains(&self.start_quality) || !unit.contains(&self.min_quality) {
            return Err(ConfigError::Validation(
                "start_quality and min_quality must be within 0.0-1.0".into(),
            ));
        }
        if self.min_quality > self.start_quality {
            return Err(ConfigError::Validation(
                "min_quality must not exceed start_quality".into(),
            ));
        }
        if !(self.quality_step >= MIN_QUALITY_STEP && self.quality_step <= 1.0) {
            return Err(ConfigError::Validation(format!(
                "quality_step must be within {MIN_QUALITY_STEP}-1.0"
            )));
        }
        Ok(())
    }
}

/// Output encoding settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncoderConfig {
    /// Container for non-PNG sources.
    pub lossy_format: LossyFormat,
    /// Filter used to scale the source onto each surface.
    pub resample: Resample,
}

/// Worker queue settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerConfig {
    /// Requests buffered before `submit` blocks.
    pub queue_depth: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { queue_depth: 8 }
    }
}

impl WorkerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_depth == 0 {
            return Err(ConfigError::Validation(
                "worker.queue_depth must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged on top of.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(SnugConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SnugConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SnugConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, falling back to stock defaults when it is absent.
pub fn load_config(path: &Path) -> Result<SnugConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `snug.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# snug Configuration
# ==================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Search defaults
# ---------------------------------------------------------------------------
[compression]
# Byte budget for the encoded output (200 KiB).
max_bytes = 204800

# Images larger than this box are downscaled before the search starts.
# Smaller images are never upscaled.
max_width = 1200
max_height = 1200

# Quality ladder tried at each dimension level, from start down to min.
start_quality = 0.85
min_quality = 0.35
quality_step = 0.05

# Neither edge shrinks below this many pixels. If the budget still cannot
# be met here, the image is encoded at this size and min_quality anyway.
min_dimension = 200

# ---------------------------------------------------------------------------
# Encoder
# ---------------------------------------------------------------------------
[encoder]
# Container for every source that is not a PNG: "jpeg" or "avif".
# PNG sources always stay PNG.
lossy_format = "jpeg"

# Resampling filter: "nearest", "triangle", "catmull_rom", "lanczos3".
resample = "lanczos3"

# ---------------------------------------------------------------------------
# Worker
# ---------------------------------------------------------------------------
[worker]
# Requests buffered before submitting blocks.
queue_depth = 8

# ---------------------------------------------------------------------------
# Presets
# ---------------------------------------------------------------------------
# Named overlays on [compression], selected with `--preset NAME`.
# Each preset only needs the keys it changes.
#
# [presets.profile]
# max_bytes = 102400
# max_width = 512
# max_height = 512
#
# [presets.animal]
# max_bytes = 307200
# max_width = 1600
# max_height = 1600
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(tmp: &TempDir, content: &str) -> std::path::PathBuf {
        let path = tmp.path().join("snug.toml");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn default_compression_options() {
        let opts = CompressOptions::default();
        assert_eq!(opts.max_bytes, 204_800);
        assert_eq!(opts.bounds(), (1200, 1200));
        assert_eq!(opts.start_quality, 0.85);
        assert_eq!(opts.min_quality, 0.35);
        assert_eq!(opts.quality_step, 0.05);
        assert_eq!(opts.min_dimension, 200);
    }

    #[test]
    fn default_encoder_and_worker() {
        let config = SnugConfig::default();
        assert_eq!(config.encoder.lossy_format, LossyFormat::Jpeg);
        assert_eq!(config.encoder.resample, Resample::Lanczos3);
        assert_eq!(config.worker.queue_depth, 8);
        assert!(config.presets.is_empty());
    }

    #[test]
    fn overrides_replace_only_set_fields() {
        let opts = RequestOptions {
            max_width: Some(640),
            min_quality: Some(0.5),
            ..RequestOptions::default()
        };
        let resolved = CompressOptions::default().with_overrides(Some(1000), Some(&opts));
        assert_eq!(resolved.max_bytes, 1000);
        assert_eq!(resolved.max_width, 640);
        assert_eq!(resolved.max_height, 1200);
        assert_eq!(resolved.min_quality, 0.5);
        assert_eq!(resolved.start_quality, 0.85);
    }

    #[test]
    fn no_overrides_is_identity() {
        let defaults = CompressOptions::default();
        assert_eq!(defaults.with_overrides(None, None), defaults);
    }

    #[test]
    fn validate_default_config_passes() {
        assert!(SnugConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_zero_budget() {
        let opts = CompressOptions {
            max_bytes: 0,
            ..CompressOptions::default()
        };
        assert!(matches!(opts.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_zero_dimension() {
        let opts = CompressOptions {
            min_dimension: 0,
            ..CompressOptions::default()
        };
        assert!(opts.validate().is_err());
        let opts = CompressOptions {
            max_height: 0,
            ..CompressOptions::default()
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn validate_quality_out_of_range() {
        let opts = CompressOptions {
            start_quality: 1.5,
            ..CompressOptions::default()
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn validate_min_above_start() {
        let opts = CompressOptions {
            start_quality: 0.3,
            min_quality: 0.6,
            ..CompressOptions::default()
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn validate_quality_step() {
        for step in [0.0, -0.05, 0.0001, f32::NAN, 2.0] {
            let opts = CompressOptions {
                quality_step: step,
                ..CompressOptions::default()
            };
            assert!(opts.validate().is_err(), "step {step} accepted");
        }
    }

    #[test]
    fn validate_queue_depth() {
        assert!(WorkerConfig { queue_depth: 0 }.validate().is_err());
        assert!(WorkerConfig { queue_depth: 1 }.validate().is_ok());
    }

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("snug.toml")).unwrap();
        assert_eq!(config.compression, CompressOptions::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            r#"
[compression]
max_bytes = 50000

[encoder]
resample = "triangle"
"#,
        );

        let config = load_config(&path).unwrap();
        assert_eq!(config.compression.max_bytes, 50_000);
        // Unspecified values keep their defaults
        assert_eq!(config.compression.max_width, 1200);
        assert_eq!(config.encoder.resample, Resample::Triangle);
        assert_eq!(config.encoder.lossy_format, LossyFormat::Jpeg);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, "[compression\nmax_bytes = ");
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, "[compression]\nmin_quality = 0.9\n");
        assert!(matches!(
            load_config(&path),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn unknown_key_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, "[compression]\nmax_byte = 10\n");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn unknown_section_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, "[storage]\nbucket = \"x\"\n");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn preset_overlays_compression() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            r#"
[compression]
max_bytes = 300000

[presets.profile]
max_bytes = 100000
max_width = 512
"#,
        );

        let config = load_config(&path).unwrap();
        let profile = config.preset("profile").unwrap();
        assert_eq!(profile.max_bytes, 100_000);
        assert_eq!(profile.max_width, 512);
        // Inherited from [compression], not from stock defaults only
        assert_eq!(profile.max_height, 1200);
        assert_eq!(config.options(None).unwrap().max_bytes, 300_000);
        assert_eq!(config.options(Some("profile")).unwrap().max_bytes, 100_000);
    }

    #[test]
    fn unknown_preset_is_error() {
        let config = SnugConfig::default();
        assert!(matches!(
            config.preset("missing"),
            Err(ConfigError::UnknownPreset(name)) if name == "missing"
        ));
    }

    #[test]
    fn preset_unknown_key_rejected_at_load() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, "[presets.profile]\nmax_widht = 512\n");
        assert!(matches!(
            load_config(&path),
            Err(ConfigError::Validation(msg)) if msg.contains("presets.profile")
        ));
    }

    #[test]
    fn preset_invalid_value_rejected_at_load() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, "[presets.tiny]\nmax_bytes = 0\n");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str("a = 1\nb = 2").unwrap();
        let overlay: toml::Value = toml::from_str("b = 3").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["a"].as_integer(), Some(1));
        assert_eq!(merged["b"].as_integer(), Some(3));
    }

    #[test]
    fn merge_toml_deep_nested() {
        let base: toml::Value =
            toml::from_str("[compression]\nmax_bytes = 1\nmax_width = 2").unwrap();
        let overlay: toml::Value = toml::from_str("[compression]\nmax_width = 5").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["compression"]["max_bytes"].as_integer(), Some(1));
        assert_eq!(merged["compression"]["max_width"].as_integer(), Some(5));
    }

    #[test]
    fn stock_config_toml_is_valid_toml() {
        let _: toml::Value = toml::from_str(stock_config_toml()).unwrap();
    }

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let value: toml::Value = toml::from_str(stock_config_toml()).unwrap();
        let config: SnugConfig = value.try_into().unwrap();
        assert_eq!(config.compression, CompressOptions::default());
        assert_eq!(config.encoder, EncoderConfig::default());
        assert_eq!(config.worker, WorkerConfig::default());
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let value = stock_defaults_value().unwrap();
        for section in ["compression", "encoder", "worker"] {
            assert!(value.get(section).is_some(), "missing [{section}]");
        }
    }
}
