use {
    crate::*,
    image::Frame,
    std::{
        path::{Path, PathBuf},
        sync::{
            Arc, Mutex, PoisonError,
            mpsc::{Receiver, SyncSender, TrySendError, sync_channel},
        },
        thread::JoinHandle,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderState {
    Idle,
    Configuring,
    Running,
    Draining,
    Stopped,
    Failed,
}

impl EncoderState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EncoderState::Stopped | EncoderState::Failed)
    }
}

// element of the frame queue
enum EncoderInput {
    Frame(Vec<u8>),
    EndOfStream,
}

// state shared between the encoder handle and its worker thread
struct Shared {
    state: Mutex<EncoderState>,
    // set by `abort`, polled by the worker between blocking waits
    abort: Mutex<Option<PipelineError>>,
    // why the worker stopped, for producers blocked in `enqueue`
    failure: Mutex<Option<PipelineError>>,
    completion: CompletionSender,
}

impl Shared {
    fn state(&self) -> EncoderState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: EncoderState) {
        let mut current = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *current != state {
            log::info!("encoder: {:?} -> {:?}", *current, state);
            *current = state;
        }
    }

    fn abort_reason(&self) -> Option<PipelineError> {
        self.abort
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn request_abort(&self, error: PipelineError) {
        self.abort
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_or_insert(error);
    }

    fn failure(&self) -> Option<PipelineError> {
        self.failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // terminal transition; the first outcome wins
    fn finish(&self, result: CompletionResult) {
        match &result {
            Ok(path) => {
                self.set_state(EncoderState::Stopped);
                log::info!("encoder: finished {}", path.display());
            }
            Err(error) => {
                self.failure
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get_or_insert_with(|| error.clone());
                self.set_state(EncoderState::Failed);
                log::error!("encoder: {}", error);
            }
        }
        self.completion.resolve(result);
    }
}

// Codec and muxer of one session. Released exactly once, codec before muxer,
// on every exit path.
struct Resources {
    codec: Option<Box<dyn VideoCodec>>,
    muxer: Option<Box<dyn Muxer>>,
}

impl Resources {
    fn codec(&mut self) -> Result<&mut Box<dyn VideoCodec>, PipelineError> {
        self.codec
            .as_mut()
            .ok_or_else(|| PipelineError::EncodingFailure("codec already released".to_string()))
    }

    fn muxer(&mut self) -> Result<&mut Box<dyn Muxer>, PipelineError> {
        self.muxer
            .as_mut()
            .ok_or_else(|| PipelineError::EncodingFailure("muxer already closed".to_string()))
    }

    fn release(&mut self) -> Result<(), PipelineError> {
        if let Some(mut codec) = self.codec.take() {
            codec.release();
            log::debug!("encoder: codec released");
        }
        if let Some(mut muxer) = self.muxer.take() {
            muxer.stop()?;
            log::debug!("encoder: muxer closed");
        }
        Ok(())
    }
}

impl Drop for Resources {
    fn drop(&mut self) {
        if let Err(error) = self.release() {
            log::error!("encoder: release failed: {}", error);
        }
    }
}

// background half of the encoder
struct Worker {
    receiver: Receiver<EncoderInput>,
    resources: Resources,
    config: EncoderConfig,
    shared: Arc<Shared>,
    track: Option<usize>,
    frame_index: u64,
    samples_written: u64,
}

impl Worker {
    fn run(mut self, output_path: PathBuf) {
        let result = self.encode_all();
        let released = self.resources.release();
        let result = result.and(released).map(|()| output_path);
        if result.is_ok() {
            log::info!(
                "encoder: {} frames in, {} samples written",
                self.frame_index,
                self.samples_written
            );
        }
        self.shared.finish(result);
        // dropping the receiver here wakes any producer blocked in `enqueue`
    }

    fn check_abort(&self) -> Result<(), PipelineError> {
        match self.shared.abort_reason() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn encode_all(&mut self) -> Result<(), PipelineError> {
        loop {
            self.check_abort()?;
            match self.receiver.recv() {
                Ok(EncoderInput::Frame(data)) => self.encode_frame(&data)?,
                Ok(EncoderInput::EndOfStream) => break,
                Err(_) => {
                    return Err(self.shared.abort_reason().unwrap_or_else(|| {
                        PipelineError::EncodingFailure("frame queue closed".to_string())
                    }));
                }
            }
        }
        self.shared.set_state(EncoderState::Draining);
        self.resources.codec()?.signal_end_of_stream()?;
        self.drain(true)
    }

    fn encode_frame(&mut self, data: &[u8]) -> Result<(), PipelineError> {
        let timeout = self.config.slot_timeout();
        let slot = loop {
            self.check_abort()?;
            if let Some(slot) = self.resources.codec()?.acquire_input(timeout)? {
                break slot;
            }
            // free input slots by consuming whatever output is ready
            self.drain(false)?;
        };
        let pts_us = self.config.pts_for(self.frame_index);
        self.resources.codec()?.queue_input(slot, data, pts_us)?;
        log::debug!("encoder: frame {} queued at {}us", self.frame_index, pts_us);
        self.frame_index += 1;
        self.drain(false)
    }

    // Write all available output to the muxer. With `end_of_stream` set, keep
    // polling until the codec flags the last sample.
    fn drain(&mut self, end_of_stream: bool) -> Result<(), PipelineError> {
        let timeout = self.config.slot_timeout();
        loop {
            match self.resources.codec()?.dequeue_output(timeout)? {
                OutputEvent::TryAgainLater => {
                    if !end_of_stream {
                        break;
                    }
                    self.check_abort()?;
                }
                OutputEvent::FormatChanged(format) => {
                    if self.track.is_some() {
                        return Err(PipelineError::EncodingFailure(
                            "output format changed after the muxer started".to_string(),
                        ));
                    }
                    let muxer = self.resources.muxer()?;
                    let track = muxer.add_track(&format)?;
                    muxer.start()?;
                    log::info!(
                        "encoder: muxer started ({} {} @ {}fps)",
                        format.mime,
                        format.size,
                        format.frame_rate
                    );
                    self.track = Some(track);
                }
                OutputEvent::Sample(sample) => {
                    if sample.flags.codec_config {
                        log::debug!("encoder: skipping {} byte codec config", sample.data.len());
                    } else if !sample.data.is_empty() {
                        let track = self.track.ok_or_else(|| {
                            PipelineError::EncodingFailure(
                                "sample produced before the muxer started".to_string(),
                            )
                        })?;
                        self.resources.muxer()?.write_sample(track, &sample)?;
                        self.samples_written += 1;
                    }
                    if sample.flags.end_of_stream {
                        log::debug!("encoder: end of stream reached");
                        break;
                    }
                }
                OutputEvent::Unexpected(status) => {
                    log::warn!("encoder: unexpected dequeue status {}", status);
                }
            }
        }
        Ok(())
    }
}

/// Producer/consumer front end of a codec and muxer.
///
/// Frames are converted to NV12 on `enqueue` and pushed into a bounded queue;
/// a background thread feeds them to the codec with timestamps derived from the
/// frame index and writes the codec output to the muxer. The outcome of the
/// session is delivered through the `Completion` returned by `new`.
pub struct StreamingEncoder {
    config: EncoderConfig,
    output_path: PathBuf,
    shared: Arc<Shared>,
    sender: Option<SyncSender<EncoderInput>>,
    worker: Option<JoinHandle<()>>,
    frames_enqueued: u64,
}

impl StreamingEncoder {
    pub fn new(config: EncoderConfig, output_path: impl Into<PathBuf>) -> (Self, Completion) {
        let (completion_sender, completion) = completion_channel();
        let encoder = Self {
            config,
            output_path: output_path.into(),
            shared: Arc::new(Shared {
                state: Mutex::new(EncoderState::Idle),
                abort: Mutex::new(None),
                failure: Mutex::new(None),
                completion: completion_sender,
            }),
            sender: None,
            worker: None,
            frames_enqueued: 0,
        };
        (encoder, completion)
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn state(&self) -> EncoderState {
        self.shared.state()
    }

    pub fn frames_enqueued(&self) -> u64 {
        self.frames_enqueued
    }

    /// Configure the codec, open the muxer and spawn the worker.
    ///
    /// On failure the session is over: the state becomes `Failed` and the
    /// completion resolves with the same error.
    pub fn start(&mut self, backend: &dyn EncoderBackend) -> Result<(), PipelineError> {
        let state = self.shared.state();
        if state != EncoderState::Idle {
            return Err(PipelineError::ConfigurationFailure(format!(
                "encoder cannot start from {state:?}"
            )));
        }
        self.shared.set_state(EncoderState::Configuring);
        match self.spawn_worker(backend) {
            Ok(()) => {
                self.shared.set_state(EncoderState::Running);
                Ok(())
            }
            Err(error) => {
                let error = match error {
                    PipelineError::ConfigurationFailure(_) => error,
                    other => PipelineError::ConfigurationFailure(other.to_string()),
                };
                self.shared.finish(Err(error.clone()));
                Err(error)
            }
        }
    }

    fn spawn_worker(&mut self, backend: &dyn EncoderBackend) -> Result<(), PipelineError> {
        self.config.validate()?;
        let mut resources = Resources {
            codec: None,
            muxer: None,
        };
        resources.codec = Some(backend.create_codec(&self.config)?);
        resources.codec()?.configure(&self.config)?;
        resources.muxer = Some(backend.create_muxer(&self.output_path, &self.config)?);
        resources.codec()?.start()?;
        log::info!(
            "encoder: {} {} @ {}fps, {} bps, queue {}",
            self.config.mime(),
            self.config.size(),
            self.config.frame_rate(),
            self.config.bitrate(),
            self.config.queue_capacity()
        );

        // the frame the worker holds counts against the capacity, so the
        // channel buffers one less (a rendezvous channel at capacity 1)
        let (sender, receiver) = sync_channel(self.config.queue_capacity() - 1);
        let worker = Worker {
            receiver,
            resources,
            config: self.config.clone(),
            shared: Arc::clone(&self.shared),
            track: None,
            frame_index: 0,
            samples_written: 0,
        };
        let output_path = self.output_path.clone();
        // on spawn failure the closure, and with it the resources, is dropped
        let handle = std::thread::Builder::new()
            .name("video-encoder".to_string())
            .spawn(move || worker.run(output_path))
            .map_err(|e| {
                PipelineError::ConfigurationFailure(format!("cannot spawn encoder worker: {e}"))
            })?;
        self.sender = Some(sender);
        self.worker = Some(handle);
        Ok(())
    }

    fn worker_gone(&self) -> PipelineError {
        self.shared.failure().unwrap_or_else(|| {
            PipelineError::EncodingFailure("encoder worker is not running".to_string())
        })
    }

    /// Queue a copy of `frame` for encoding.
    ///
    /// At most `queue_capacity` frames are pending at once, counting the one
    /// the worker is feeding to the codec.
    ///
    /// With `BackpressurePolicy::Block` this waits for room in the queue and
    /// always returns `true`. With `Reject` a full queue returns `false` and the
    /// frame is not queued. Errors mean the session has failed.
    pub fn enqueue(&mut self, frame: &Frame) -> Result<bool, PipelineError> {
        let state = self.shared.state();
        if state != EncoderState::Running {
            return Err(match state {
                EncoderState::Failed => self.worker_gone(),
                _ => PipelineError::EncodingFailure(format!("cannot enqueue while {state:?}")),
            });
        }
        if frame.size != self.config.size() {
            return Err(PipelineError::InvalidFrame(format!(
                "encoder expects {} frames, got {}",
                self.config.size(),
                frame.size
            )));
        }
        let data = image::rgba_to_nv12(frame)?;
        let sender = self.sender.as_ref().ok_or_else(|| self.worker_gone())?;
        let accepted = match self.config.backpressure() {
            BackpressurePolicy::Block => {
                sender
                    .send(EncoderInput::Frame(data))
                    .map_err(|_| self.worker_gone())?;
                true
            }
            BackpressurePolicy::Reject => match sender.try_send(EncoderInput::Frame(data)) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => false,
                Err(TrySendError::Disconnected(_)) => return Err(self.worker_gone()),
            },
        };
        if accepted {
            self.frames_enqueued += 1;
        }
        Ok(accepted)
    }

    /// Signal end of input, wait for the worker to drain the codec and release
    /// everything. Calling it again, or after a failure, does nothing.
    pub fn stop(&mut self) {
        match self.shared.state() {
            EncoderState::Idle => {
                self.shared.finish(Err(PipelineError::EncodingFailure(
                    "encoder stopped before it was started".to_string(),
                )));
            }
            EncoderState::Configuring | EncoderState::Running | EncoderState::Draining => {
                if let Some(sender) = self.sender.take() {
                    // fails only if the worker already ended
                    let _ = sender.send(EncoderInput::EndOfStream);
                }
                self.join();
            }
            EncoderState::Stopped | EncoderState::Failed => {
                log::debug!("encoder: stop ignored, already {:?}", self.shared.state());
                self.join();
            }
        }
    }

    /// End the session with `error` without draining. Queued frames are
    /// discarded; codec and muxer are still released.
    pub fn abort(&mut self, error: PipelineError) {
        if self.worker.is_none() {
            if !self.shared.state().is_terminal() {
                self.shared.finish(Err(error));
            }
            return;
        }
        log::warn!("encoder: aborting: {}", error);
        self.shared.request_abort(error);
        self.sender.take();
        self.join();
    }

    fn join(&mut self) {
        self.sender.take();
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                self.shared.finish(Err(PipelineError::EncodingFailure(
                    "encoder worker panicked".to_string(),
                )));
            }
        }
    }
}

impl Drop for StreamingEncoder {
    fn drop(&mut self) {
        if !self.shared.state().is_terminal() || self.worker.is_some() {
            self.abort(PipelineError::EncodingFailure(
                "encoder dropped while running".to_string(),
            ));
        }
    }
}
