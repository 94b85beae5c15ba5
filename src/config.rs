use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const DEFAULT_PATTERNS_PATH: &str = "configs/plate_patterns.yaml";
const DEFAULT_SEND_INTERVAL: u32 = 20;
const DEFAULT_FPS: f64 = 25.0;
const DEFAULT_MAX_TRACKS: usize = 256;
const DEFAULT_MAX_DECODE_ERRORS: u32 = 100;
const DEFAULT_DETECTOR_BACKEND: &str = "stub";
const DEFAULT_DETECTOR_INPUT_SIZE: u32 = 640;
const DEFAULT_DETECTOR_CONFIDENCE: f32 = 0.25;
const DEFAULT_DETECTOR_IOU: f32 = 0.45;
const DEFAULT_OCR_BACKEND: &str = "stub";
const DEFAULT_OCR_LANGUAGE: &str = "eng";

/// Upper bound on concurrently processed sources.
pub const MAX_VIDEO_PATHS: usize = 10;

#[derive(Debug, Deserialize, Default)]
struct StreamConfigFile {
    plate_image_send_interval: Option<i64>,
    video_paths: Option<Vec<String>>,
    plate_classes: Option<Vec<String>>,
    labels: Option<Vec<String>>,
    default_fps: Option<f64>,
    realtime: Option<bool>,
    max_tracks: Option<usize>,
    max_decode_errors: Option<u32>,
    debug_dir: Option<PathBuf>,
    font_path: Option<PathBuf>,
    detector: Option<DetectorConfigFile>,
    ocr: Option<OcrConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    input_size: Option<u32>,
    confidence: Option<f32>,
    iou: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct OcrConfigFile {
    backend: Option<String>,
    data_path: Option<String>,
    language: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct PatternConfigFile {
    plate_patterns: Option<Vec<PlatePattern>>,
}

/// Pipeline configuration shared by every stream worker.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Frame-count throttle for auxiliary plate snapshots.
    pub plate_image_send_interval: u32,
    /// Ordered source locators (files, `rtsp://` URLs, `stub://` synthetic sources).
    pub video_paths: Vec<String>,
    /// Detector class names that identify license plates.
    pub plate_classes: Vec<String>,
    /// Detector label set, indexed by class id.
    pub labels: Vec<String>,
    /// Frame rate assumed when a source does not report one.
    pub default_fps: f64,
    /// Pace output to the source's nominal frame rate.
    pub realtime: bool,
    pub max_tracks: usize,
    pub max_decode_errors: u32,
    pub debug_dir: Option<PathBuf>,
    pub font_path: Option<PathBuf>,
    pub detector: DetectorSettings,
    pub ocr: OcrSettings,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: String,
    pub model_path: Option<PathBuf>,
    pub input_size: u32,
    pub confidence: f32,
    pub iou: f32,
}

#[derive(Debug, Clone)]
pub struct OcrSettings {
    pub backend: String,
    pub data_path: Option<String>,
    pub language: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::from_file(StreamConfigFile::default())
    }
}

impl StreamConfig {
    /// Load from `PLATE_CONFIG` (or `config.yaml`) and apply environment overrides.
    ///
    /// Missing or malformed files fall back to defaults. Only a malformed
    /// environment override is reported as an error.
    pub fn load() -> Result<Self> {
        let path = std::env::var("PLATE_CONFIG")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
        Self::load_with_env(Path::new(&path))
    }

    /// Load `path` and apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self> {
        let mut cfg = Self::load_from(path);
        cfg.apply_env()?;
        cfg.validate();
        Ok(cfg)
    }

    /// Load a config file, substituting defaults when it is missing or unreadable.
    pub fn load_from(path: &Path) -> Self {
        let file = match read_yaml::<StreamConfigFile>(path) {
            Ok(Some(file)) => file,
            Ok(None) => {
                log::warn!("config {} not found, using defaults", path.display());
                StreamConfigFile::default()
            }
            Err(e) => {
                log::warn!("{}; using defaults", e);
                StreamConfigFile::default()
            }
        };
        let mut cfg = Self::from_file(file);
        cfg.validate();
        cfg
    }

    /// Parse a YAML document. Unlike `load_from`, parse failures are returned.
    pub fn from_yaml_str(raw: &str) -> Result<Self, PipelineError> {
        let file: StreamConfigFile = serde_yaml::from_str(raw)
            .map_err(|e| PipelineError::Config(format!("invalid config: {}", e)))?;
        let mut cfg = Self::from_file(file);
        cfg.validate();
        Ok(cfg)
    }

    fn from_file(file: StreamConfigFile) -> Self {
        let plate_image_send_interval = match file.plate_image_send_interval {
            Some(v) if v > 0 && v <= u32::MAX as i64 => v as u32,
            Some(v) => {
                log::warn!(
                    "plate_image_send_interval must be a positive integer (got {}), using {}",
                    v,
                    DEFAULT_SEND_INTERVAL
                );
                DEFAULT_SEND_INTERVAL
            }
            None => DEFAULT_SEND_INTERVAL,
        };
        let detector = file.detector.unwrap_or_default();
        let ocr = file.ocr.unwrap_or_default();
        Self {
            plate_image_send_interval,
            video_paths: file.video_paths.unwrap_or_default(),
            plate_classes: file
                .plate_classes
                .unwrap_or_else(|| vec!["plate".to_string(), "licence".to_string()]),
            labels: file
                .labels
                .unwrap_or_else(|| vec!["vehicle".to_string(), "plate".to_string()]),
            default_fps: file.default_fps.unwrap_or(DEFAULT_FPS),
            realtime: file.realtime.unwrap_or(true),
            max_tracks: file.max_tracks.unwrap_or(DEFAULT_MAX_TRACKS),
            max_decode_errors: file.max_decode_errors.unwrap_or(DEFAULT_MAX_DECODE_ERRORS),
            debug_dir: file.debug_dir,
            font_path: file.font_path,
            detector: DetectorSettings {
                backend: detector
                    .backend
                    .unwrap_or_else(|| DEFAULT_DETECTOR_BACKEND.to_string()),
                model_path: detector.model_path,
                input_size: detector.input_size.unwrap_or(DEFAULT_DETECTOR_INPUT_SIZE),
                confidence: detector.confidence.unwrap_or(DEFAULT_DETECTOR_CONFIDENCE),
                iou: detector.iou.unwrap_or(DEFAULT_DETECTOR_IOU),
            },
            ocr: OcrSettings {
                backend: ocr.backend.unwrap_or_else(|| DEFAULT_OCR_BACKEND.to_string()),
                data_path: ocr.data_path,
                language: ocr
                    .language
                    .unwrap_or_else(|| DEFAULT_OCR_LANGUAGE.to_string()),
            },
        }
    }

    fn apply_env(&mut self) -> Result<(), PipelineError> {
        if let Ok(paths) = std::env::var("PLATE_VIDEO_PATHS") {
            let parsed = split_csv(&paths);
            if !parsed.is_empty() {
                self.video_paths = parsed;
            }
        }
        if let Ok(dir) = std::env::var("PLATE_DEBUG_DIR") {
            if !dir.trim().is_empty() {
                self.debug_dir = Some(PathBuf::from(dir));
            }
        }
        if let Ok(interval) = std::env::var("PLATE_SEND_INTERVAL") {
            let value: u32 = interval.trim().parse().map_err(|_| {
                PipelineError::Config(
                    "PLATE_SEND_INTERVAL must be a positive integer frame count".to_string(),
                )
            })?;
            if value == 0 {
                return Err(PipelineError::Config(
                    "PLATE_SEND_INTERVAL must be greater than zero".to_string(),
                ));
            }
            self.plate_image_send_interval = value;
        }
        Ok(())
    }

    fn validate(&mut self) {
        if self.video_paths.len() > MAX_VIDEO_PATHS {
            log::warn!(
                "{} video paths configured, only the first {} are used",
                self.video_paths.len(),
                MAX_VIDEO_PATHS
            );
            self.video_paths.truncate(MAX_VIDEO_PATHS);
        }
        if !(self.default_fps.is_finite() && self.default_fps > 0.0) {
            log::warn!("default_fps must be positive, using {}", DEFAULT_FPS);
            self.default_fps = DEFAULT_FPS;
        }
        if self.max_tracks == 0 {
            log::warn!("max_tracks must be positive, using {}", DEFAULT_MAX_TRACKS);
            self.max_tracks = DEFAULT_MAX_TRACKS;
        }
        if self.detector.input_size == 0 {
            self.detector.input_size = DEFAULT_DETECTOR_INPUT_SIZE;
        }
    }
}

// ----------------------------------------------------------------------------
// Plate patterns
// ----------------------------------------------------------------------------

/// One regional plate format. Order in the file encodes match priority.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PlatePattern {
    pub pattern: String,
    pub region: String,
}

#[derive(Debug, Clone, Default)]
pub struct PatternConfig {
    pub patterns: Vec<PlatePattern>,
}

impl PatternConfig {
    /// Load from `PLATE_PATTERNS` (or `configs/plate_patterns.yaml`).
    pub fn load() -> Self {
        let path = std::env::var("PLATE_PATTERNS")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PATTERNS_PATH.to_string());
        Self::load_from(Path::new(&path))
    }

    /// Load a pattern file. A missing or malformed file yields an empty set.
    pub fn load_from(path: &Path) -> Self {
        match read_yaml::<PatternConfigFile>(path) {
            Ok(Some(file)) => Self {
                patterns: file.plate_patterns.unwrap_or_default(),
            },
            Ok(None) => {
                log::warn!(
                    "pattern file {} not found, no plate text will normalize",
                    path.display()
                );
                Self::default()
            }
            Err(e) => {
                log::warn!("{}; no plate text will normalize", e);
                Self::default()
            }
        }
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, PipelineError> {
        let file: PatternConfigFile = serde_yaml::from_str(raw)
            .map_err(|e| PipelineError::Config(format!("invalid pattern file: {}", e)))?;
        Ok(Self {
            patterns: file.plate_patterns.unwrap_or_default(),
        })
    }
}

/// Read and parse a YAML file. `Ok(None)` when the file does not exist.
fn read_yaml<T: serde::de::DeserializeOwned + Default>(
    path: &Path,
) -> Result<Option<T>, PipelineError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(PipelineError::Config(format!(
                "failed to read {}: {}",
                path.display(),
                e
            )))
        }
    };
    if raw.trim().is_empty() {
        return Ok(Some(T::default()));
    }
    serde_yaml::from_str(&raw)
        .map(Some)
        .map_err(|e| PipelineError::Config(format!("invalid {}: {}", path.display(), e)))
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = StreamConfig::default();
        assert_eq!(cfg.plate_image_send_interval, 20);
        assert!(cfg.video_paths.is_empty());
        assert_eq!(cfg.plate_classes, vec!["plate", "licence"]);
        assert!(cfg.realtime);
        assert_eq!(cfg.detector.backend, "stub");
        assert_eq!(cfg.ocr.language, "eng");
    }

    #[test]
    fn non_positive_send_interval_falls_back() {
        let cfg = StreamConfig::from_yaml_str("plate_image_send_interval: 0\n").unwrap();
        assert_eq!(cfg.plate_image_send_interval, 20);
        let cfg = StreamConfig::from_yaml_str("plate_image_send_interval: -4\n").unwrap();
        assert_eq!(cfg.plate_image_send_interval, 20);
    }

    #[test]
    fn video_paths_are_capped() {
        let paths: Vec<String> = (0..12).map(|i| format!("  - cam{}.mp4", i)).collect();
        let yaml = format!("video_paths:\n{}\n", paths.join("\n"));
        let cfg = StreamConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(cfg.video_paths.len(), MAX_VIDEO_PATHS);
        assert_eq!(cfg.video_paths[0], "cam0.mp4");
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let cfg = StreamConfig::from_yaml_str("window_title: Plates\nrealtime: false\n").unwrap();
        assert!(!cfg.realtime);
    }

    #[test]
    fn pattern_order_is_preserved() {
        let yaml = r#"
plate_patterns:
  - pattern: '^[A-Z]\d{3}[A-Z]{2}\d{2,3}$'
    region: RU
  - pattern: '^\d{4}[A-Z]{2}\d$'
    region: BY
"#;
        let cfg = PatternConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(cfg.patterns.len(), 2);
        assert_eq!(cfg.patterns[0].region, "RU");
        assert_eq!(cfg.patterns[1].region, "BY");
    }

    #[test]
    fn malformed_pattern_yaml_is_config_error() {
        let err = PatternConfig::from_yaml_str("plate_patterns: [unclosed").unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }
}
