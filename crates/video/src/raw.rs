use {
    crate::*,
    image::PixelFormat,
    std::{collections::VecDeque, path::Path, time::Duration},
};

pub const RAW_NV12_MIME: &str = "video/x-raw-nv12";

// input buffers the codec hands out at once
const INPUT_SLOTS: usize = 4;

/// Software codec that emits every NV12 input frame unchanged as a key frame.
///
/// Follows the hardware contract: a format change first, then a codec config
/// sample, then one sample per input, and an empty sample flagged
/// `end_of_stream` after `signal_end_of_stream`.
pub struct RawVideoCodec {
    config: Option<EncoderConfig>,
    started: bool,
    free_slots: Vec<usize>,
    in_flight: VecDeque<usize>,
    pending: VecDeque<OutputEvent>,
    last_pts_us: i64,
}

impl Default for RawVideoCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl RawVideoCodec {
    pub fn new() -> Self {
        Self {
            config: None,
            started: false,
            free_slots: (0..INPUT_SLOTS).rev().collect(),
            in_flight: VecDeque::new(),
            pending: VecDeque::new(),
            last_pts_us: 0,
        }
    }

    fn started_config(&self) -> Result<&EncoderConfig, PipelineError> {
        match (&self.config, self.started) {
            (Some(config), true) => Ok(config),
            _ => Err(PipelineError::EncodingFailure(
                "raw codec used before start".to_string(),
            )),
        }
    }
}

impl VideoCodec for RawVideoCodec {
    fn configure(&mut self, config: &EncoderConfig) -> Result<(), PipelineError> {
        config.validate()?;
        self.config = Some(config.clone());
        Ok(())
    }

    fn start(&mut self) -> Result<(), PipelineError> {
        let config = self.config.as_ref().ok_or_else(|| {
            PipelineError::ConfigurationFailure("raw codec started before configure".to_string())
        })?;
        self.pending.push_back(OutputEvent::FormatChanged(VideoFormat {
            mime: RAW_NV12_MIME.to_string(),
            size: config.size(),
            frame_rate: config.frame_rate(),
        }));
        self.pending.push_back(OutputEvent::Sample(EncodedSample {
            data: b"NV12".to_vec(),
            pts_us: 0,
            flags: SampleFlags {
                codec_config: true,
                ..SampleFlags::default()
            },
        }));
        self.started = true;
        Ok(())
    }

    fn acquire_input(&mut self, _timeout: Duration) -> Result<Option<InputSlot>, PipelineError> {
        self.started_config()?;
        Ok(self.free_slots.pop().map(|index| {
            self.in_flight.push_back(index);
            InputSlot(index)
        }))
    }

    fn queue_input(
        &mut self,
        slot: InputSlot,
        data: &[u8],
        pts_us: i64,
    ) -> Result<(), PipelineError> {
        let size = self.started_config()?.size();
        if !self.in_flight.contains(&slot.0) {
            return Err(PipelineError::EncodingFailure(format!(
                "input slot {} was not acquired",
                slot.0
            )));
        }
        PixelFormat::Nv12
            .ensure_len(size, data.len())
            .map_err(|e| PipelineError::EncodingFailure(e.to_string()))?;
        self.last_pts_us = pts_us;
        self.pending.push_back(OutputEvent::Sample(EncodedSample {
            data: data.to_vec(),
            pts_us,
            flags: SampleFlags {
                key_frame: true,
                ..SampleFlags::default()
            },
        }));
        Ok(())
    }

    fn signal_end_of_stream(&mut self) -> Result<(), PipelineError> {
        self.started_config()?;
        self.pending.push_back(OutputEvent::Sample(EncodedSample {
            data: Vec::new(),
            pts_us: self.last_pts_us,
            flags: SampleFlags {
                end_of_stream: true,
                ..SampleFlags::default()
            },
        }));
        Ok(())
    }

    fn dequeue_output(&mut self, _timeout: Duration) -> Result<OutputEvent, PipelineError> {
        self.started_config()?;
        let event = self.pending.pop_front().unwrap_or(OutputEvent::TryAgainLater);
        if let OutputEvent::Sample(sample) = &event {
            if !sample.flags.codec_config && !sample.flags.end_of_stream {
                // the input buffer behind this sample is free again
                if let Some(index) = self.in_flight.pop_front() {
                    self.free_slots.push(index);
                }
            }
        }
        Ok(event)
    }

    fn release(&mut self) {
        self.started = false;
        self.pending.clear();
        self.free_slots.extend(self.in_flight.drain(..));
    }
}

/// Raw NV12 codec writing into a YUV4MPEG2 file.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawVideoBackend;

impl EncoderBackend for RawVideoBackend {
    fn create_codec(&self, _config: &EncoderConfig) -> Result<Box<dyn VideoCodec>, PipelineError> {
        Ok(Box::new(RawVideoCodec::new()))
    }

    fn create_muxer(
        &self,
        path: &Path,
        _config: &EncoderConfig,
    ) -> Result<Box<dyn Muxer>, PipelineError> {
        Ok(Box::new(Y4mMuxer::create(path)?))
    }
}
