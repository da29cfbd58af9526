use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::pipeline::DEFAULT_ALPHA;

const DEFAULT_SOURCE: &str = "stub://front_camera";
const DEFAULT_OUTPUT_PATH: &str = "output.mjpeg";
const DEFAULT_MODEL_PATH: &str = "yolov8n.onnx";
const DEFAULT_DETECTOR: &str = "motion";
const DEFAULT_TARGET_FPS: f64 = 15.0;
const DEFAULT_CONF: f32 = 0.5;
const DEFAULT_QUEUE_SIZE: usize = 2;
const DEFAULT_FRAME_SIZE: (u32, u32) = (640, 480);
const DEFAULT_MODEL_INPUT_SIZE: (u32, u32) = (640, 640);

/// Source rate assumed when the source reports none (or a bogus one).
pub const FALLBACK_SOURCE_FPS: f64 = 25.0;
/// Output cadence never drops below this.
pub const MIN_OUTPUT_FPS: f64 = 2.0;

/// Pipeline construction parameters. Validated by `Pipeline` constructors.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Output file; its extension selects the sink.
    pub output_path: PathBuf,
    /// Output frame size (width, height).
    pub frame_size: (u32, u32),
    pub model_path: PathBuf,
    pub device: Option<String>,
    pub conf: f32,
    /// Target output cadence. Zero or less disables the output gate.
    pub writer_fps: f64,
    pub queue_size: usize,
    pub overlay: bool,
    /// Detector backend name, resolved through `DetectorRegistry`.
    pub detector: String,
    /// Throughput estimator smoothing factor.
    pub smoothing: f64,
    pub model_input_size: (u32, u32),
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            frame_size: DEFAULT_FRAME_SIZE,
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            device: None,
            conf: DEFAULT_CONF,
            writer_fps: DEFAULT_TARGET_FPS,
            queue_size: DEFAULT_QUEUE_SIZE,
            overlay: true,
            detector: DEFAULT_DETECTOR.to_string(),
            smoothing: DEFAULT_ALPHA,
            model_input_size: DEFAULT_MODEL_INPUT_SIZE,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        let (width, height) = self.frame_size;
        if width == 0 || height == 0 {
            return Err(anyhow!(
                "frame size must be non-zero, got {}x{}",
                width,
                height
            ));
        }
        let (in_w, in_h) = self.model_input_size;
        if in_w == 0 || in_h == 0 {
            return Err(anyhow!("model input size must be non-zero"));
        }
        validate_conf(self.conf)?;
        if self.queue_size == 0 {
            return Err(anyhow!("queue size must be at least 1"));
        }
        if self.writer_fps.is_nan() {
            return Err(anyhow!("writer fps must be a number"));
        }
        if !(self.smoothing > 0.0 && self.smoothing < 1.0) {
            return Err(anyhow!(
                "smoothing must be in (0, 1), got {}",
                self.smoothing
            ));
        }
        if self.detector.trim().is_empty() {
            return Err(anyhow!("detector name must not be empty"));
        }
        Ok(())
    }
}

/// Output cadence for a source: the target rate, capped by the source rate
/// (falling back to `FALLBACK_SOURCE_FPS` when unknown or not above 1), and
/// never below `MIN_OUTPUT_FPS`.
pub fn resolve_writer_fps(target_fps: f64, source_fps: Option<f64>) -> f64 {
    let source_fps = source_fps
        .filter(|fps| fps.is_finite() && *fps > 1.0)
        .unwrap_or(FALLBACK_SOURCE_FPS);
    target_fps.min(source_fps).max(MIN_OUTPUT_FPS)
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct VigildConfigFile {
    source: Option<String>,
    output: Option<PathBuf>,
    detector: Option<DetectorConfigFile>,
    pipeline: Option<PipelineConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DetectorConfigFile {
    backend: Option<String>,
    model: Option<PathBuf>,
    device: Option<String>,
    conf: Option<f32>,
    input_width: Option<u32>,
    input_height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PipelineConfigFile {
    target_fps: Option<f64>,
    queue_size: Option<usize>,
    overlay: Option<bool>,
    smoothing: Option<f64>,
}

/// Daemon configuration: defaults, then the JSON file named by `VIGIL_CONFIG`,
/// then `VIGIL_*` environment overrides.
#[derive(Debug, Clone)]
pub struct VigildConfig {
    /// `stub://name?...`, a file path, an RTSP URL or a device index.
    pub source: String,
    pub output_path: PathBuf,
    pub detector: DetectorSettings,
    /// Requested output cadence before capping by the source rate.
    pub target_fps: f64,
    pub queue_size: usize,
    pub overlay: bool,
    pub smoothing: f64,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: String,
    pub model_path: PathBuf,
    pub device: Option<String>,
    pub conf: f32,
    pub input_size: (u32, u32),
}

impl VigildConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("VIGIL_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: VigildConfigFile) -> Self {
        let detector = file.detector.unwrap_or_default();
        let pipeline = file.pipeline.unwrap_or_default();
        Self {
            source: file.source.unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
            output_path: file
                .output
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_PATH)),
            detector: DetectorSettings {
                backend: detector
                    .backend
                    .unwrap_or_else(|| DEFAULT_DETECTOR.to_string()),
                model_path: detector
                    .model
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
                device: detector.device,
                conf: detector.conf.unwrap_or(DEFAULT_CONF),
                input_size: (
                    detector.input_width.unwrap_or(DEFAULT_MODEL_INPUT_SIZE.0),
                    detector.input_height.unwrap_or(DEFAULT_MODEL_INPUT_SIZE.1),
                ),
            },
            target_fps: pipeline.target_fps.unwrap_or(DEFAULT_TARGET_FPS),
            queue_size: pipeline.queue_size.unwrap_or(DEFAULT_QUEUE_SIZE),
            overlay: pipeline.overlay.unwrap_or(true),
            smoothing: pipeline.smoothing.unwrap_or(DEFAULT_ALPHA),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(source) = env_nonempty("VIGIL_SOURCE") {
            self.source = source;
        }
        if let Some(output) = env_nonempty("VIGIL_OUTPUT") {
            self.output_path = PathBuf::from(output);
        }
        if let Some(model) = env_nonempty("VIGIL_MODEL") {
            self.detector.model_path = PathBuf::from(model);
        }
        if let Some(device) = env_nonempty("VIGIL_DEVICE") {
            self.detector.device = Some(device);
        }
        if let Some(backend) = env_nonempty("VIGIL_DETECTOR") {
            self.detector.backend = backend;
        }
        if let Some(fps) = env_nonempty("VIGIL_TARGET_FPS") {
            self.target_fps = fps
                .parse()
                .map_err(|_| anyhow!("VIGIL_TARGET_FPS must be a number"))?;
        }
        if let Some(conf) = env_nonempty("VIGIL_CONF") {
            self.detector.conf = conf
                .parse()
                .map_err(|_| anyhow!("VIGIL_CONF must be a number in [0, 1]"))?;
        }
        if let Some(size) = env_nonempty("VIGIL_QUEUE_SIZE") {
            self.queue_size = size
                .parse()
                .map_err(|_| anyhow!("VIGIL_QUEUE_SIZE must be a positive integer"))?;
        }
        if let Some(overlay) = env_nonempty("VIGIL_OVERLAY") {
            self.overlay = parse_bool(&overlay)
                .ok_or_else(|| anyhow!("VIGIL_OVERLAY must be true/false, 1/0 or on/off"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.trim().is_empty() {
            return Err(anyhow!("source must not be empty"));
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(anyhow!("output path must not be empty"));
        }
        if !self.target_fps.is_finite() {
            return Err(anyhow!("target fps must be finite"));
        }
        validate_conf(self.detector.conf)?;
        if self.queue_size == 0 {
            return Err(anyhow!("queue size must be at least 1"));
        }
        Ok(())
    }

    /// Pipeline parameters once the first frame and the source rate are known.
    pub fn pipeline_config(&self, frame_size: (u32, u32), source_fps: Option<f64>) -> PipelineConfig {
        PipelineConfig {
            output_path: self.output_path.clone(),
            frame_size,
            model_path: self.detector.model_path.clone(),
            device: self.detector.device.clone(),
            conf: self.detector.conf,
            writer_fps: resolve_writer_fps(self.target_fps, source_fps),
            queue_size: self.queue_size,
            overlay: self.overlay,
            detector: self.detector.backend.clone(),
            smoothing: self.smoothing,
            model_input_size: self.detector.input_size,
        }
    }
}

fn validate_conf(conf: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&conf) {
        return Err(anyhow!("confidence threshold must be in [0, 1], got {}", conf));
    }
    Ok(())
}

fn read_config_file(path: &Path) -> Result<VigildConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_fps_is_capped_by_source_and_floored() {
        assert_eq!(resolve_writer_fps(15.0, Some(30.0)), 15.0);
        assert_eq!(resolve_writer_fps(15.0, Some(10.0)), 10.0);
        assert_eq!(resolve_writer_fps(1.0, Some(30.0)), MIN_OUTPUT_FPS);
    }

    #[test]
    fn bogus_source_rate_falls_back() {
        assert_eq!(resolve_writer_fps(60.0, None), FALLBACK_SOURCE_FPS);
        assert_eq!(resolve_writer_fps(60.0, Some(1.0)), FALLBACK_SOURCE_FPS);
        assert_eq!(resolve_writer_fps(60.0, Some(f64::NAN)), FALLBACK_SOURCE_FPS);
    }

    #[test]
    fn default_pipeline_config_is_valid() {
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn pipeline_config_rejects_bad_values() {
        let bad = [
            PipelineConfig {
                frame_size: (0, 480),
                ..PipelineConfig::default()
            },
            PipelineConfig {
                conf: 1.5,
                ..PipelineConfig::default()
            },
            PipelineConfig {
                queue_size: 0,
                ..PipelineConfig::default()
            },
            PipelineConfig {
                smoothing: 1.0,
                ..PipelineConfig::default()
            },
            PipelineConfig {
                writer_fps: f64::NAN,
                ..PipelineConfig::default()
            },
        ];
        for cfg in bad {
            assert!(cfg.validate().is_err(), "{:?} should be rejected", cfg);
        }
    }

    #[test]
    fn negative_writer_fps_is_allowed() {
        let cfg = PipelineConfig {
            writer_fps: -1.0,
            ..PipelineConfig::default()
        };
        cfg.validate().unwrap();
    }

    #[test]
    fn parses_boolean_spellings() {
        assert_eq!(parse_bool("ON"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
