use anyhow::{anyhow, Result};
use std::thread;
use std::time::{Duration, Instant};

use super::{FrameSource, SourceStats};
use crate::frame::{Frame, CHANNELS};

const SQUARE_SIZE: u32 = 48;
/// Horizontal travel per frame, in pixels.
const SQUARE_STEP: u32 = 8;

/// Parameters of a `stub://` source.
#[derive(Clone, Debug, PartialEq)]
pub struct SyntheticConfig {
    pub name: String,
    /// Frames before end of stream; `None` runs forever.
    pub frames: Option<u64>,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    /// Sleep between frames to emulate a live camera.
    pub pace: bool,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            name: "front_camera".to_string(),
            frames: None,
            fps: 10.0,
            width: 640,
            height: 480,
            pace: true,
        }
    }
}

impl SyntheticConfig {
    /// Parse `stub://name?key=value&...`.
    pub fn parse(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix("stub://")
            .ok_or_else(|| anyhow!("not a stub:// source: {}", url))?;
        let (name, query) = rest.split_once('?').unwrap_or((rest, ""));
        let mut cfg = Self::default();
        if !name.is_empty() {
            cfg.name = name.to_string();
        }
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("stub source parameter '{}' needs a value", pair))?;
            let invalid = || anyhow!("invalid stub source parameter {}={}", key, value);
            match key {
                "frames" => cfg.frames = Some(value.parse().map_err(|_| invalid())?),
                "fps" => cfg.fps = value.parse().map_err(|_| invalid())?,
                "width" => cfg.width = value.parse().map_err(|_| invalid())?,
                "height" => cfg.height = value.parse().map_err(|_| invalid())?,
                "pace" => cfg.pace = value != "0" && value != "false",
                _ => return Err(anyhow!("unknown stub source parameter '{}'", key)),
            }
        }
        if cfg.width == 0 || cfg.height == 0 {
            return Err(anyhow!("stub source size must be non-zero"));
        }
        if !(cfg.fps.is_finite() && cfg.fps >= 0.0) {
            return Err(anyhow!("stub source fps must be a non-negative number"));
        }
        if cfg.fps > 0.0 && Duration::try_from_secs_f64(1.0 / cfg.fps).is_err() {
            return Err(anyhow!("stub source fps {} is too small to pace", cfg.fps));
        }
        Ok(cfg)
    }
}

/// Synthetic camera: a gradient background with a square sweeping across it.
pub struct SyntheticSource {
    config: SyntheticConfig,
    frame_count: u64,
    next_due: Option<Instant>,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            frame_count: 0,
            next_due: None,
        }
    }

    fn generate_pixels(&self) -> Vec<u8> {
        let (width, height) = (self.config.width, self.config.height);
        let mut pixels = vec![0u8; width as usize * height as usize * CHANNELS];
        let travel = width.saturating_sub(SQUARE_SIZE).max(1);
        let square_x = (self.frame_count as u32).wrapping_mul(SQUARE_STEP) % travel;
        let square_y = height.saturating_sub(SQUARE_SIZE) / 2;

        for (i, px) in pixels.chunks_exact_mut(CHANNELS).enumerate() {
            let x = (i as u32) % width;
            let y = (i as u32) / width;
            let inside = x >= square_x
                && x < square_x + SQUARE_SIZE
                && y >= square_y
                && y < square_y + SQUARE_SIZE;
            if inside {
                px.copy_from_slice(&[230, 230, 230]);
            } else {
                let shade = ((x * 64 / width) + (y * 64 / height)) as u8;
                px.copy_from_slice(&[shade, shade / 2, 40]);
            }
        }
        pixels
    }

    fn pace(&mut self) {
        if !self.config.pace || self.config.fps <= 0.0 {
            return;
        }
        let Ok(period) = Duration::try_from_secs_f64(1.0 / self.config.fps) else {
            return;
        };
        let now = Instant::now();
        let due = self.next_due.unwrap_or(now);
        if due > now {
            thread::sleep(due - now);
        }
        // Do not accumulate debt when the consumer of frames falls behind.
        self.next_due = due.max(now).checked_add(period);
    }
}

impl FrameSource for SyntheticSource {
    fn connect(&mut self) -> Result<()> {
        log::info!(
            "synthetic source '{}' connected ({}x{} @ {} fps)",
            self.config.name,
            self.config.width,
            self.config.height,
            self.config.fps
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if let Some(limit) = self.config.frames {
            if self.frame_count >= limit {
                return Ok(None);
            }
        }
        self.pace();
        let pixels = self.generate_pixels();
        self.frame_count += 1;
        Ok(Some(
            Frame::new(pixels, self.config.width, self.config.height)
                .with_sequence(self.frame_count),
        ))
    }

    fn nominal_fps(&self) -> Option<f64> {
        (self.config.fps > 0.0).then_some(self.config.fps)
    }

    fn is_healthy(&self) -> bool {
        true
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: format!("stub://{}", self.config.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_query_parameters() {
        let cfg = SyntheticConfig::parse("stub://gate?frames=5&fps=30&width=64&height=32&pace=0")
            .unwrap();
        assert_eq!(cfg.name, "gate");
        assert_eq!(cfg.frames, Some(5));
        assert_eq!(cfg.fps, 30.0);
        assert_eq!((cfg.width, cfg.height), (64, 32));
        assert!(!cfg.pace);
    }

    #[test]
    fn bare_stub_uses_defaults() {
        let cfg = SyntheticConfig::parse("stub://front_camera").unwrap();
        assert_eq!(cfg, SyntheticConfig::default());
    }

    #[test]
    fn rejects_unknown_or_malformed_parameters() {
        assert!(SyntheticConfig::parse("stub://x?color=red").is_err());
        assert!(SyntheticConfig::parse("stub://x?frames=many").is_err());
        assert!(SyntheticConfig::parse("stub://x?width=0").is_err());
        assert!(SyntheticConfig::parse("stub://x?frames").is_err());
    }

    #[test]
    fn frames_are_sequenced_and_move() {
        let cfg = SyntheticConfig::parse("stub://x?frames=3&width=96&height=64&pace=0").unwrap();
        let mut source = SyntheticSource::new(cfg);
        let first = source.next_frame().unwrap().unwrap();
        let second = source.next_frame().unwrap().unwrap();
        assert_eq!(first.sequence(), 1);
        assert_eq!(second.sequence(), 2);
        assert_eq!(first.dimensions(), (96, 64));
        assert!(!first.is_empty());
        assert_ne!(first.pixels(), second.pixels());
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_none());
        assert_eq!(source.stats().frames_captured, 3);
    }

    #[test]
    fn zero_fps_has_no_nominal_rate() {
        let cfg = SyntheticConfig::parse("stub://x?fps=0").unwrap();
        assert_eq!(SyntheticSource::new(cfg).nominal_fps(), None);
    }

    #[test]
    fn fps_without_a_representable_period_is_rejected() {
        assert!(SyntheticConfig::parse("stub://x?fps=1e-300").is_err());
        assert!(SyntheticConfig::parse("stub://x?fps=0.5").is_ok());
    }
}
