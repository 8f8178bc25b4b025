use {
    crate::*,
    image::Frame,
    inference::{Enhancer, InferenceEngine},
    std::{path::PathBuf, sync::Arc},
};

/// Outcome of a successful session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub output_path: PathBuf,
    pub frames: u64,
    /// Playback length implied by the frame count and frame rate.
    pub duration_us: i64,
}

/// Enhances whole videos: source -> enhancer -> streaming encoder.
///
/// Each `run` is an independent session; nothing is shared between runs except
/// the configuration and the encoder backend.
#[derive(Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    backend: Arc<dyn EncoderBackend>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, backend: impl EncoderBackend + 'static) -> Self {
        Self {
            config,
            backend: Arc::new(backend),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run one session on the current thread. Blocks until the output file is
    /// complete or the session failed; must not be called from async code.
    pub fn run_blocking(
        &self,
        source: &mut dyn FrameSource,
        engine: Box<dyn InferenceEngine>,
        output_path: impl Into<PathBuf>,
    ) -> Result<SessionReport, PipelineError> {
        let info = source.info();
        if info.size.is_empty() {
            return Err(PipelineError::InvalidFrame(format!(
                "source reports {} frames",
                info.size
            )));
        }
        if engine.input_size() != self.config.network_size() {
            return Err(PipelineError::ConfigurationFailure(format!(
                "engine takes {}px input, config expects {}px",
                engine.input_size(),
                self.config.network_size()
            )));
        }
        let mut enhancer = Enhancer::new(engine, self.config.codec())
            .map_err(|e| PipelineError::ConfigurationFailure(e.to_string()))?;

        let output_size = Enhancer::output_size_for(info.size, info.rotation);
        let encoder_config = self.config.encoder_config(output_size, info.frame_rate);
        let (mut encoder, completion) = StreamingEncoder::new(encoder_config, output_path);
        encoder.start(self.backend.as_ref())?;
        log::info!(
            "pipeline: {} @ {}fps (rotation {}) -> {}",
            info.size,
            info.frame_rate,
            info.rotation.degrees(),
            encoder.output_path().display()
        );

        match pump(source, &mut enhancer, &mut encoder) {
            Ok(0) => encoder.abort(PipelineError::SourceExhaustedWithNoFrames),
            Ok(_) => encoder.stop(),
            Err(error) => encoder.abort(error),
        }
        let frames = encoder.frames_enqueued();
        let duration_us = encoder.config().pts_for(frames);
        let output_path = completion.blocking_wait()?;
        log::info!(
            "pipeline: {} frames ({:.2}s) written to {}",
            frames,
            duration_us as f64 / 1_000_000.0,
            output_path.display()
        );
        Ok(SessionReport {
            output_path,
            frames,
            duration_us,
        })
    }

    /// Async wrapper running the session on tokio's blocking pool.
    pub async fn run(
        &self,
        mut source: Box<dyn FrameSource>,
        engine: Box<dyn InferenceEngine>,
        output_path: impl Into<PathBuf>,
    ) -> Result<SessionReport, PipelineError> {
        let pipeline = self.clone();
        let output_path = output_path.into();
        tokio::task::spawn_blocking(move || {
            pipeline.run_blocking(source.as_mut(), engine, output_path)
        })
        .await
        .map_err(|e| PipelineError::EncodingFailure(format!("pipeline task failed: {e}")))?
    }
}

// Feed every source frame through the enhancer into the encoder. Returns the
// number of frames enqueued.
fn pump(
    source: &mut dyn FrameSource,
    enhancer: &mut Enhancer,
    encoder: &mut StreamingEncoder,
) -> Result<u64, PipelineError> {
    let info = source.info();
    let retry_delay = encoder.config().slot_timeout();
    let mut frames = 0u64;
    while let Some(frame) = source.next_frame()? {
        if frame.size != info.size {
            return Err(PipelineError::InvalidFrame(format!(
                "frame {} is {}, source reported {}",
                frames, frame.size, info.size
            )));
        }
        let frame = Frame {
            rotation: info.rotation,
            ..frame
        };
        let enhanced = enhancer.process(&frame)?;
        while !encoder.enqueue(enhanced)? {
            std::thread::sleep(retry_delay);
        }
        frames += 1;
        log::debug!("pipeline: frame {} enqueued", frames);
    }
    Ok(frames)
}
