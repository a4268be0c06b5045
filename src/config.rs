use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub motion: MotionConfig,
    pub timing: TimingConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionConfig {
    /// Base motion threshold both derived thresholds scale from
    pub base_threshold: f64,
    /// Multiplier applied to the base threshold when gating a capture
    pub block_multiplier: f64,
    /// Multiplier applied to the base threshold for the stability indicator
    pub visual_multiplier: f64,
    pub history_capacity: usize,
    pub min_history_for_gate: usize,
    pub raster_width: u32,
    pub raster_height: u32,
    /// Distance in bytes between sampled positions (4 bytes per RGBA pixel)
    pub sample_stride: usize,
    /// Summed RGB difference a sample must exceed to count as motion
    pub noise_floor: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    pub tick_interval_ms: u64,
    pub not_ready_backoff_ms: u64,
    pub settle_delay_ms: u64,
    pub warmup_ms: u64,
    pub stream_check_ms: u64,
    pub capture_debounce_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub photo_dir: PathBuf,
    pub jpeg_quality: u8,
    pub config_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            motion: MotionConfig::default(),
            timing: TimingConfig::default(),
            output: OutputConfig {
                photo_dir: PathBuf::from("captures"),
                jpeg_quality: 95,
                config_file: PathBuf::from("steadyshot_config.toml"),
            },
        }
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            base_threshold: 80.0,
            block_multiplier: 2.0,
            visual_multiplier: 1.1,
            history_capacity: 6,
            min_history_for_gate: 4,
            raster_width: 100,
            raster_height: 75,
            sample_stride: 12,
            noise_floor: 20,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 200,
            not_ready_backoff_ms: 150,
            settle_delay_ms: 200,
            warmup_ms: 1000,
            stream_check_ms: 5000,
            capture_debounce_ms: 200,
        }
    }
}

impl MotionConfig {
    pub fn block_threshold(&self) -> f64 {
        self.base_threshold * self.block_multiplier
    }

    pub fn visual_threshold(&self) -> f64 {
        self.base_threshold * self.visual_multiplier
    }
}

impl TimingConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn not_ready_backoff(&self) -> Duration {
        Duration::from_millis(self.not_ready_backoff_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_millis(self.warmup_ms)
    }

    pub fn stream_check(&self) -> Duration {
        Duration::from_millis(self.stream_check_ms)
    }

    pub fn capture_debounce(&self) -> Duration {
        Duration::from_millis(self.capture_debounce_ms)
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::default().output.config_file;

        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            log::info!("Config file not found, creating default configuration");
            let default_config = Self::default();
            default_config.save()?;
            Ok(default_config)
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = toml::from_str(&contents)
            .with_context(|| "Failed to parse configuration file")?;
        config.validate()?;

        log::info!("Configuration loaded from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to_file(&self.output.config_file)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize configuration")?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        std::fs::write(path.as_ref(), contents)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        log::info!("Configuration saved to {}", path.as_ref().display());
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let motion = &self.motion;

        if !(motion.base_threshold > 0.0) {
            return Err(anyhow::anyhow!("Invalid base motion threshold: {}", motion.base_threshold));
        }

        if !(motion.block_multiplier > 0.0) || !(motion.visual_multiplier > 0.0) {
            return Err(anyhow::anyhow!("Threshold multipliers must be positive"));
        }

        if motion.history_capacity == 0 {
            return Err(anyhow::anyhow!("Motion history capacity must be at least 1"));
        }

        // A gate that needs more entries than the history can hold never engages
        if motion.min_history_for_gate > motion.history_capacity {
            return Err(anyhow::anyhow!(
                "Minimum history for gating ({}) exceeds history capacity ({})",
                motion.min_history_for_gate,
                motion.history_capacity
            ));
        }

        if motion.raster_width == 0 || motion.raster_height == 0 {
            return Err(anyhow::anyhow!(
                "Invalid raster dimensions: {}x{}",
                motion.raster_width,
                motion.raster_height
            ));
        }

        if motion.sample_stride == 0 || motion.sample_stride % 4 != 0 {
            return Err(anyhow::anyhow!(
                "Sample stride must be a non-zero multiple of 4 bytes, got {}",
                motion.sample_stride
            ));
        }

        if motion.noise_floor >= 3 * 255 {
            return Err(anyhow::anyhow!("Noise floor {} rejects every difference", motion.noise_floor));
        }

        if self.timing.tick_interval_ms == 0 || self.timing.not_ready_backoff_ms == 0 {
            return Err(anyhow::anyhow!("Sampling intervals must be non-zero"));
        }

        if self.output.jpeg_quality == 0 || self.output.jpeg_quality > 100 {
            return Err(anyhow::anyhow!("Invalid JPEG quality: {}", self.output.jpeg_quality));
        }

        Ok(())
    }

    pub fn create_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.output.photo_dir)
            .with_context(|| format!("Failed to create photo directory: {}",
                self.output.photo_dir.display()))?;

        log::info!("Created photo directory {}", self.output.photo_dir.display());
        Ok(())
    }
}

// Configuration builder for easier setup
pub struct ConfigBuilder {
    config: Config,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn base_threshold(mut self, threshold: f64) -> Self {
        self.config.motion.base_threshold = threshold;
        self
    }

    pub fn multipliers(mut self, block: f64, visual: f64) -> Self {
        self.config.motion.block_multiplier = block;
        self.config.motion.visual_multiplier = visual;
        self
    }

    pub fn history(mut self, capacity: usize, min_for_gate: usize) -> Self {
        self.config.motion.history_capacity = capacity;
        self.config.motion.min_history_for_gate = min_for_gate;
        self
    }

    pub fn raster_size(mut self, width: u32, height: u32) -> Self {
        self.config.motion.raster_width = width;
        self.config.motion.raster_height = height;
        self
    }

    pub fn sampling(mut self, stride: usize, noise_floor: u32) -> Self {
        self.config.motion.sample_stride = stride;
        self.config.motion.noise_floor = noise_floor;
        self
    }

    pub fn tick_interval_ms(mut self, ms: u64) -> Self {
        self.config.timing.tick_interval_ms = ms;
        self
    }

    pub fn settle_delay_ms(mut self, ms: u64) -> Self {
        self.config.timing.settle_delay_ms = ms;
        self
    }

    pub fn warmup_ms(mut self, ms: u64) -> Self {
        self.config.timing.warmup_ms = ms;
        self
    }

    pub fn photo_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.output.photo_dir = dir.into();
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.output.jpeg_quality = quality;
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
