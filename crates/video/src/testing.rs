//! In-memory collaborators for exercising the encoder and pipeline without
//! files or platform codecs.

use {
    crate::*,
    base::{Tensor, Vec2},
    image::{Frame, Rotation},
    inference::{InferError, InferenceEngine, PassthroughEngine},
    std::{
        path::{Path, PathBuf},
        sync::{
            Arc, Condvar, Mutex, PoisonError,
            atomic::{AtomicBool, AtomicUsize, Ordering},
        },
        time::Duration,
    },
};

/// What the backend's codecs and muxers did, shared with the test.
#[derive(Debug, Clone, Default)]
pub struct BackendRecord {
    pub path: Option<PathBuf>,
    pub tracks: Vec<VideoFormat>,
    pub muxer_started: bool,
    pub muxer_stops: usize,
    pub codec_releases: usize,
    pub samples: Vec<EncodedSample>,
}

impl BackendRecord {
    pub fn timestamps(&self) -> Vec<i64> {
        self.samples.iter().map(|sample| sample.pts_us).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct BackendLog(Arc<Mutex<BackendRecord>>);

impl BackendLog {
    pub fn snapshot(&self) -> BackendRecord {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn update(&self, f: impl FnOnce(&mut BackendRecord)) {
        f(&mut self.0.lock().unwrap_or_else(PoisonError::into_inner));
    }
}

/// Holds codec input slots back while closed, stalling the encoder worker.
#[derive(Debug, Clone)]
pub struct Gate {
    open: Arc<(Mutex<bool>, Condvar)>,
    waiting: Arc<AtomicBool>,
}

impl Default for Gate {
    fn default() -> Self {
        Self::opened()
    }
}

impl Gate {
    pub fn opened() -> Self {
        Self::with_state(true)
    }

    pub fn closed() -> Self {
        Self::with_state(false)
    }

    fn with_state(open: bool) -> Self {
        Self {
            open: Arc::new((Mutex::new(open), Condvar::new())),
            waiting: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn release(&self) {
        let (open, condvar) = &*self.open;
        *open.lock().unwrap_or_else(PoisonError::into_inner) = true;
        condvar.notify_all();
    }

    /// True once the worker has been held back at least once.
    pub fn has_stalled(&self) -> bool {
        self.waiting.load(Ordering::SeqCst)
    }

    // Wait up to `timeout` for the gate to open.
    fn pass(&self, timeout: Duration) -> bool {
        let (open, condvar) = &*self.open;
        let guard = open.lock().unwrap_or_else(PoisonError::into_inner);
        if *guard {
            return true;
        }
        self.waiting.store(true, Ordering::SeqCst);
        let (guard, _) = condvar
            .wait_timeout_while(guard, timeout, |open| !*open)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

/// Failures a `MemoryBackend` can inject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fault {
    #[default]
    None,
    /// `configure` fails.
    Configure,
    /// A second format change replaces the second sample.
    RepeatedFormatChange,
    /// Samples arrive before any format change.
    MissingFormatChange,
    /// An unknown status precedes every sample.
    UnexpectedStatus,
}

/// `RawVideoCodec` behind a gate, with fault injection and logging.
pub struct MemoryCodec {
    inner: RawVideoCodec,
    gate: Gate,
    fault: Fault,
    log: BackendLog,
    samples_seen: usize,
    status_sent: bool,
}

impl VideoCodec for MemoryCodec {
    fn configure(&mut self, config: &EncoderConfig) -> Result<(), PipelineError> {
        if self.fault == Fault::Configure {
            return Err(PipelineError::ConfigurationFailure(
                "codec rejected configuration".to_string(),
            ));
        }
        self.inner.configure(config)
    }

    fn start(&mut self) -> Result<(), PipelineError> {
        self.inner.start()
    }

    fn acquire_input(&mut self, timeout: Duration) -> Result<Option<InputSlot>, PipelineError> {
        if !self.gate.pass(timeout) {
            return Ok(None);
        }
        self.inner.acquire_input(timeout)
    }

    fn queue_input(
        &mut self,
        slot: InputSlot,
        data: &[u8],
        pts_us: i64,
    ) -> Result<(), PipelineError> {
        self.inner.queue_input(slot, data, pts_us)
    }

    fn signal_end_of_stream(&mut self) -> Result<(), PipelineError> {
        self.inner.signal_end_of_stream()
    }

    fn dequeue_output(&mut self, timeout: Duration) -> Result<OutputEvent, PipelineError> {
        if self.fault == Fault::UnexpectedStatus && !self.status_sent {
            self.status_sent = true;
            return Ok(OutputEvent::Unexpected(-1000));
        }
        let event = self.inner.dequeue_output(timeout)?;
        match (self.fault, event) {
            (Fault::MissingFormatChange, OutputEvent::FormatChanged(_)) => {
                self.inner.dequeue_output(timeout)
            }
            (Fault::RepeatedFormatChange, OutputEvent::Sample(sample))
                if !sample.flags.codec_config =>
            {
                self.samples_seen += 1;
                if self.samples_seen == 2 {
                    return Ok(OutputEvent::FormatChanged(VideoFormat {
                        mime: RAW_NV12_MIME.to_string(),
                        size: Vec2::new(1, 1),
                        frame_rate: 1.0,
                    }));
                }
                Ok(OutputEvent::Sample(sample))
            }
            (Fault::UnexpectedStatus, OutputEvent::Sample(sample)) => {
                self.status_sent = false;
                Ok(OutputEvent::Sample(sample))
            }
            (_, event) => Ok(event),
        }
    }

    fn release(&mut self) {
        self.inner.release();
        self.log.update(|record| record.codec_releases += 1);
    }
}

/// Records every sample in memory instead of writing a file.
pub struct MemoryMuxer {
    log: BackendLog,
    started: bool,
    stopped: bool,
}

impl Muxer for MemoryMuxer {
    fn add_track(&mut self, format: &VideoFormat) -> Result<usize, PipelineError> {
        if self.started {
            return Err(PipelineError::EncodingFailure(
                "track added after start".to_string(),
            ));
        }
        let mut index = 0;
        self.log.update(|record| {
            record.tracks.push(format.clone());
            index = record.tracks.len() - 1;
        });
        Ok(index)
    }

    fn start(&mut self) -> Result<(), PipelineError> {
        self.started = true;
        self.log.update(|record| record.muxer_started = true);
        Ok(())
    }

    fn write_sample(&mut self, _track: usize, sample: &EncodedSample) -> Result<(), PipelineError> {
        if !self.started || self.stopped {
            return Err(PipelineError::EncodingFailure(
                "memory muxer is not running".to_string(),
            ));
        }
        self.log.update(|record| record.samples.push(sample.clone()));
        Ok(())
    }

    fn stop(&mut self) -> Result<(), PipelineError> {
        self.stopped = true;
        self.log.update(|record| record.muxer_stops += 1);
        Ok(())
    }
}

/// Backend handing out `MemoryCodec`/`MemoryMuxer` pairs that share one log.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    log: BackendLog,
    gate: Gate,
    fault: Fault,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gate(mut self, gate: Gate) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.fault = fault;
        self
    }

    pub fn log(&self) -> BackendLog {
        self.log.clone()
    }
}

impl EncoderBackend for MemoryBackend {
    fn create_codec(&self, _config: &EncoderConfig) -> Result<Box<dyn VideoCodec>, PipelineError> {
        Ok(Box::new(MemoryCodec {
            inner: RawVideoCodec::new(),
            gate: self.gate.clone(),
            fault: self.fault,
            log: self.log.clone(),
            samples_seen: 0,
            status_sent: false,
        }))
    }

    fn create_muxer(
        &self,
        path: &Path,
        _config: &EncoderConfig,
    ) -> Result<Box<dyn Muxer>, PipelineError> {
        let path = path.to_path_buf();
        self.log.update(|record| record.path = Some(path));
        Ok(Box::new(MemoryMuxer {
            log: self.log.clone(),
            started: false,
            stopped: false,
        }))
    }
}

/// Gradient frames whose color encodes the frame index.
pub struct SyntheticSource {
    info: SourceInfo,
    count: usize,
    next: usize,
    fail_at: Option<usize>,
}

impl SyntheticSource {
    pub fn new(size: Vec2<usize>, frame_rate: f64, count: usize) -> Self {
        Self {
            info: SourceInfo {
                size,
                frame_rate,
                rotation: Rotation::Deg0,
            },
            count,
            next: 0,
            fail_at: None,
        }
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.info.rotation = rotation;
        self
    }

    /// Return a source error instead of frame `index` (0-based).
    pub fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    pub fn frame(size: Vec2<usize>, index: usize) -> Frame {
        let mut frame = Frame::black(size);
        let shade = (index * 40 % 256) as u8;
        for y in 0..size.y {
            for x in 0..size.x {
                let r = (x * 255 / size.x.saturating_sub(1).max(1)) as u8;
                let g = (y * 255 / size.y.saturating_sub(1).max(1)) as u8;
                frame.set_pixel(x, y, [r, g, shade, 255]);
            }
        }
        frame
    }
}

impl FrameSource for SyntheticSource {
    fn info(&self) -> SourceInfo {
        self.info
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, PipelineError> {
        if self.next >= self.count {
            return Ok(None);
        }
        if self.fail_at == Some(self.next) {
            return Err(PipelineError::Source(format!(
                "synthetic failure at frame {}",
                self.next
            )));
        }
        let frame = Self::frame(self.info.size, self.next).with_rotation(self.info.rotation);
        self.next += 1;
        Ok(Some(frame))
    }
}

/// Passthrough network that fails on its `fail_on`-th run (1-based).
pub struct FailingEngine {
    inner: PassthroughEngine,
    size: usize,
    fail_on: usize,
    runs: Arc<AtomicUsize>,
}

impl FailingEngine {
    pub fn new(size: usize, fail_on: usize) -> Self {
        Self {
            inner: PassthroughEngine::new(size),
            size,
            fail_on,
            runs: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Counter of `run` calls, readable after the engine moved into a pipeline.
    pub fn runs(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.runs)
    }
}

impl InferenceEngine for FailingEngine {
    fn input_size(&self) -> usize {
        self.size
    }

    fn output_size(&self) -> usize {
        self.size
    }

    fn run(&mut self, input: &Tensor<f32>, output: &mut Tensor<f32>) -> Result<(), InferError> {
        let run = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        if run == self.fail_on {
            return Err(InferError::Engine(format!("injected failure on run {run}")));
        }
        self.inner.run(input, output)
    }
}
