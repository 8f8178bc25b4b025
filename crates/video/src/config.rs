use {
    crate::*,
    base::Vec2,
    inference::TensorCodecConfig,
    serde::{Deserialize, Serialize},
    std::{path::Path, time::Duration},
};

pub const DEFAULT_FRAME_RATE: f64 = 30.0;
pub const DEFAULT_BITRATE: u32 = 2_000_000;
pub const DEFAULT_KEY_FRAME_INTERVAL_SECS: u32 = 1;
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;
pub const DEFAULT_SLOT_TIMEOUT: Duration = Duration::from_millis(10);
/// Smallest slot timeout `EncoderConfig::validate` accepts.
pub const MIN_SLOT_TIMEOUT: Duration = Duration::from_millis(1);
pub const DEFAULT_NETWORK_SIZE: usize = 256;
pub const AVC_MIME: &str = "video/avc";

/// What `StreamingEncoder::enqueue` does when the frame queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackpressurePolicy {
    /// Block the producer until the worker takes a frame.
    #[default]
    Block,
    /// Return `false` so the caller can retry later.
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    Baseline,
    #[default]
    Main,
    High,
}

/// Configuration for one `StreamingEncoder` session.
#[derive(Clone, Debug, PartialEq)]
pub struct EncoderConfig {
    size: Vec2<usize>,
    frame_rate: f64,
    mime: String,
    bitrate: u32,
    key_frame_interval_secs: u32,
    profile: Profile,
    level: u32,
    queue_capacity: usize,
    slot_timeout: Duration,
    backpressure: BackpressurePolicy,
}

impl EncoderConfig {
    pub fn new(size: Vec2<usize>, frame_rate: f64) -> Self {
        Self {
            size,
            frame_rate,
            mime: AVC_MIME.to_string(),
            bitrate: DEFAULT_BITRATE,
            key_frame_interval_secs: DEFAULT_KEY_FRAME_INTERVAL_SECS,
            profile: Profile::Main,
            level: 31,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            slot_timeout: DEFAULT_SLOT_TIMEOUT,
            backpressure: BackpressurePolicy::Block,
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = mime.into();
        self
    }

    /// Target bitrate in bits per second.
    pub fn with_bitrate(mut self, bitrate: u32) -> Self {
        self.bitrate = bitrate;
        self
    }

    pub fn with_key_frame_interval_secs(mut self, secs: u32) -> Self {
        self.key_frame_interval_secs = secs;
        self
    }

    /// Codec profile and level; level is `major * 10 + minor` (31 = 3.1).
    pub fn with_profile(mut self, profile: Profile, level: u32) -> Self {
        self.profile = profile;
        self.level = level;
        self
    }

    /// Number of frames that may wait for the worker. The frame the worker is
    /// encoding is not counted.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Wait used when polling codec input and output slots.
    pub fn with_slot_timeout(mut self, timeout: Duration) -> Self {
        self.slot_timeout = timeout;
        self
    }

    pub fn with_backpressure(mut self, policy: BackpressurePolicy) -> Self {
        self.backpressure = policy;
        self
    }

    // Getters
    pub fn size(&self) -> Vec2<usize> {
        self.size
    }

    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn bitrate(&self) -> u32 {
        self.bitrate
    }

    pub fn key_frame_interval_secs(&self) -> u32 {
        self.key_frame_interval_secs
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    pub fn slot_timeout(&self) -> Duration {
        self.slot_timeout
    }

    pub fn backpressure(&self) -> BackpressurePolicy {
        self.backpressure
    }

    /// Presentation timestamp of frame `index` in microseconds.
    ///
    /// Derived from the index rather than accumulated, so rounding never drifts.
    pub fn pts_for(&self, index: u64) -> i64 {
        (index as f64 * 1_000_000.0 / self.frame_rate).round() as i64
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.size.is_empty() {
            return Err(PipelineError::ConfigurationFailure(format!(
                "encoder size must be non-zero, got {}",
                self.size
            )));
        }
        if !self.frame_rate.is_finite() || self.frame_rate <= 0.0 {
            return Err(PipelineError::ConfigurationFailure(format!(
                "invalid frame rate {}",
                self.frame_rate
            )));
        }
        if self.queue_capacity == 0 {
            return Err(PipelineError::ConfigurationFailure(
                "queue capacity must be at least 1".to_string(),
            ));
        }
        if self.bitrate == 0 {
            return Err(PipelineError::ConfigurationFailure(
                "bitrate must be non-zero".to_string(),
            ));
        }
        // the worker and the reject retry loop poll with this timeout
        if self.slot_timeout < MIN_SLOT_TIMEOUT {
            return Err(PipelineError::ConfigurationFailure(format!(
                "slot timeout must be at least {}ms",
                MIN_SLOT_TIMEOUT.as_millis()
            )));
        }
        Ok(())
    }
}

/// Session-level settings, loadable from JSON.
///
/// Frame size and frame rate come from the source, everything else from here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    network_size: usize,
    codec: TensorCodecConfig,
    bitrate: u32,
    key_frame_interval_secs: u32,
    profile: Profile,
    level: u32,
    queue_capacity: usize,
    slot_timeout_ms: u64,
    backpressure: BackpressurePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            network_size: DEFAULT_NETWORK_SIZE,
            codec: TensorCodecConfig::default(),
            bitrate: DEFAULT_BITRATE,
            key_frame_interval_secs: DEFAULT_KEY_FRAME_INTERVAL_SECS,
            profile: Profile::Main,
            level: 31,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            slot_timeout_ms: DEFAULT_SLOT_TIMEOUT.as_millis() as u64,
            backpressure: BackpressurePolicy::Block,
        }
    }
}

impl PipelineConfig {
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        serde_json::from_str(json)
            .map_err(|e| PipelineError::ConfigurationFailure(format!("invalid config: {e}")))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::ConfigurationFailure(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    /// Side of the square image the network consumes.
    pub fn with_network_size(mut self, size: usize) -> Self {
        self.network_size = size;
        self
    }

    pub fn with_codec(mut self, codec: TensorCodecConfig) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_bitrate(mut self, bitrate: u32) -> Self {
        self.bitrate = bitrate;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_slot_timeout(mut self, timeout: Duration) -> Self {
        self.slot_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_backpressure(mut self, policy: BackpressurePolicy) -> Self {
        self.backpressure = policy;
        self
    }

    pub fn network_size(&self) -> usize {
        self.network_size
    }

    pub fn codec(&self) -> TensorCodecConfig {
        self.codec
    }

    pub fn slot_timeout(&self) -> Duration {
        Duration::from_millis(self.slot_timeout_ms)
    }

    /// Encoder settings for an output of `size` at `frame_rate`.
    pub fn encoder_config(&self, size: Vec2<usize>, frame_rate: f64) -> EncoderConfig {
        EncoderConfig::new(size, frame_rate)
            .with_bitrate(self.bitrate)
            .with_key_frame_interval_secs(self.key_frame_interval_secs)
            .with_profile(self.profile, self.level)
            .with_queue_capacity(self.queue_capacity)
            .with_slot_timeout(self.slot_timeout())
            .with_backpressure(self.backpressure)
    }
}
