//! YUV4MPEG2 (`.y4m`) reading and writing.
//!
//! Only the 4:2:0 colorspaces are supported. Frames are stored as I420 planes.

use {
    crate::*,
    base::Vec2,
    image::{Frame, PixelFormat, Rotation, yuv},
    std::{
        fs::File,
        io::{BufRead, BufReader, BufWriter, ErrorKind, Read, Write},
        path::{Path, PathBuf},
    },
};

const SIGNATURE: &str = "YUV4MPEG2";
const FRAME_MARKER: &[u8] = b"FRAME";

// 8-bit 4:2:0 variants; they differ only in chroma siting
const EIGHT_BIT_420: [&str; 4] = ["420", "420jpeg", "420paldv", "420mpeg2"];

/// Largest width or height accepted from a stream header.
pub const MAX_DIMENSION: u64 = 16384;

/// Stream header fields the pipeline cares about.
#[derive(Debug, Clone, PartialEq)]
pub struct Y4mHeader {
    pub size: Vec2<usize>,
    pub frame_rate: (u64, u64),
    pub colorspace: String,
}

impl Y4mHeader {
    pub fn parse(line: &str) -> Result<Self, PipelineError> {
        let mut tokens = line.trim_end().split(' ');
        if tokens.next() != Some(SIGNATURE) {
            return Err(PipelineError::Source("not a YUV4MPEG2 stream".to_string()));
        }
        let mut width = None;
        let mut height = None;
        let mut frame_rate = None;
        let mut colorspace = "420jpeg".to_string();
        for token in tokens.filter(|token| !token.is_empty()) {
            let mut chars = token.chars();
            let tag = chars.next();
            let value = chars.as_str();
            match tag {
                Some('W') => width = Some(parse_number(value, "width")?),
                Some('H') => height = Some(parse_number(value, "height")?),
                Some('F') => {
                    let (num, den) = value.split_once(':').ok_or_else(|| {
                        PipelineError::Source(format!("bad frame rate {value}"))
                    })?;
                    frame_rate = Some((parse_number(num, "rate")?, parse_number(den, "rate")?));
                }
                Some('C') => colorspace = value.to_string(),
                // interlacing, aspect ratio and extensions do not matter here
                _ => {}
            }
        }
        let (Some(width), Some(height)) = (width, height) else {
            return Err(PipelineError::Source("header lacks W or H".to_string()));
        };
        for (what, value) in [("width", width), ("height", height)] {
            if value == 0 || value > MAX_DIMENSION {
                return Err(PipelineError::Source(format!(
                    "{what} {value} outside 1..={MAX_DIMENSION}"
                )));
            }
        }
        let frame_rate = frame_rate.unwrap_or((30, 1));
        if frame_rate.0 == 0 || frame_rate.1 == 0 {
            return Err(PipelineError::Source(format!(
                "bad frame rate {}:{}",
                frame_rate.0, frame_rate.1
            )));
        }
        if !EIGHT_BIT_420.contains(&colorspace.as_str()) {
            return Err(PipelineError::Source(format!(
                "unsupported colorspace C{colorspace}"
            )));
        }
        Ok(Self {
            size: Vec2::new(width as usize, height as usize),
            frame_rate,
            colorspace,
        })
    }

    pub fn frame_rate_f64(&self) -> f64 {
        self.frame_rate.0 as f64 / self.frame_rate.1 as f64
    }

    pub fn to_line(&self) -> String {
        format!(
            "{} W{} H{} F{}:{} Ip A1:1 C{} XCOLORRANGE=LIMITED\n",
            SIGNATURE,
            self.size.x,
            self.size.y,
            self.frame_rate.0,
            self.frame_rate.1,
            self.colorspace
        )
    }
}

fn parse_number(value: &str, what: &str) -> Result<u64, PipelineError> {
    value
        .parse()
        .map_err(|_| PipelineError::Source(format!("bad {what} '{value}'")))
}

/// Rational frame rate for a header: integral rates as `n:1`, others in
/// thousandths.
pub fn frame_rate_ratio(frame_rate: f64) -> (u64, u64) {
    if (frame_rate - frame_rate.round()).abs() < 1e-6 {
        (frame_rate.round() as u64, 1)
    } else {
        ((frame_rate * 1000.0).round() as u64, 1000)
    }
}

/// Reads a YUV4MPEG2 stream as RGBA frames.
pub struct Y4mSource {
    reader: Box<dyn BufRead + Send>,
    header: Y4mHeader,
    rotation: Rotation,
    line: Vec<u8>,
    planes: Vec<u8>,
    frames_read: u64,
}

impl Y4mSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| PipelineError::Source(format!("cannot open {}: {e}", path.display())))?;
        let source = Self::new(BufReader::new(file))?;
        log::info!(
            "opened {}: {} @ {}fps",
            path.display(),
            source.header.size,
            source.header.frame_rate_f64()
        );
        Ok(source)
    }

    pub fn new(mut reader: impl BufRead + Send + 'static) -> Result<Self, PipelineError> {
        let mut line = Vec::new();
        reader.read_until(b'\n', &mut line).map_err(source_error)?;
        let header = Y4mHeader::parse(&String::from_utf8_lossy(&line))?;
        let frame_len = PixelFormat::I420
            .checked_buffer_len(header.size)
            .ok_or_else(|| PipelineError::Source(format!("{} frames are too large", header.size)))?;
        Ok(Self {
            reader: Box::new(reader),
            planes: vec![0; frame_len],
            header,
            rotation: Rotation::Deg0,
            line,
            frames_read: 0,
        })
    }

    /// Rotation hint attached to every frame (Y4M carries none).
    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn header(&self) -> &Y4mHeader {
        &self.header
    }
}

fn source_error(err: std::io::Error) -> PipelineError {
    PipelineError::Source(err.to_string())
}

impl FrameSource for Y4mSource {
    fn info(&self) -> SourceInfo {
        SourceInfo {
            size: self.header.size,
            frame_rate: self.header.frame_rate_f64(),
            rotation: self.rotation,
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, PipelineError> {
        self.line.clear();
        if self.reader.read_until(b'\n', &mut self.line).map_err(source_error)? == 0 {
            return Ok(None);
        }
        if !self.line.starts_with(FRAME_MARKER) {
            return Err(PipelineError::Source(format!(
                "expected FRAME header before frame {}",
                self.frames_read
            )));
        }
        self.reader.read_exact(&mut self.planes).map_err(|e| {
            if e.kind() == ErrorKind::UnexpectedEof {
                PipelineError::Source(format!("frame {} is truncated", self.frames_read))
            } else {
                source_error(e)
            }
        })?;
        let nv12 = yuv::i420_to_nv12(self.header.size, &self.planes)?;
        let frame = image::nv12_to_rgba(self.header.size, &nv12)?.with_rotation(self.rotation);
        self.frames_read += 1;
        Ok(Some(frame))
    }
}

/// Single-track muxer writing raw NV12 samples as a YUV4MPEG2 file.
pub struct Y4mMuxer {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    header: Option<Y4mHeader>,
    started: bool,
    frames: u64,
}

fn mux_error(err: std::io::Error) -> PipelineError {
    PipelineError::EncodingFailure(err.to_string())
}

impl Y4mMuxer {
    /// Create (or truncate) the output file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|e| {
            PipelineError::ConfigurationFailure(format!("cannot create {}: {e}", path.display()))
        })?;
        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
            header: None,
            started: false,
            frames: 0,
        })
    }

    fn writer(&mut self) -> Result<&mut BufWriter<File>, PipelineError> {
        self.writer
            .as_mut()
            .ok_or_else(|| PipelineError::EncodingFailure("y4m muxer is closed".to_string()))
    }
}

impl Muxer for Y4mMuxer {
    fn add_track(&mut self, format: &VideoFormat) -> Result<usize, PipelineError> {
        if self.started || self.header.is_some() {
            return Err(PipelineError::EncodingFailure(
                "y4m holds a single track, added before start".to_string(),
            ));
        }
        if format.mime != RAW_NV12_MIME {
            return Err(PipelineError::EncodingFailure(format!(
                "y4m cannot carry {}",
                format.mime
            )));
        }
        self.header = Some(Y4mHeader {
            size: format.size,
            frame_rate: frame_rate_ratio(format.frame_rate),
            colorspace: "420jpeg".to_string(),
        });
        Ok(0)
    }

    fn start(&mut self) -> Result<(), PipelineError> {
        let line = self
            .header
            .as_ref()
            .map(Y4mHeader::to_line)
            .ok_or_else(|| {
                PipelineError::EncodingFailure("y4m started without a track".to_string())
            })?;
        self.writer()?.write_all(line.as_bytes()).map_err(mux_error)?;
        self.started = true;
        Ok(())
    }

    fn write_sample(&mut self, track: usize, sample: &EncodedSample) -> Result<(), PipelineError> {
        let size = match (&self.header, self.started) {
            (Some(header), true) => header.size,
            _ => {
                return Err(PipelineError::EncodingFailure(
                    "y4m sample written before start".to_string(),
                ));
            }
        };
        if track != 0 {
            return Err(PipelineError::EncodingFailure(format!("no track {track}")));
        }
        let planes = yuv::nv12_to_i420(size, &sample.data)
            .map_err(|e| PipelineError::EncodingFailure(e.to_string()))?;
        let writer = self.writer()?;
        writer.write_all(FRAME_MARKER).map_err(mux_error)?;
        writer.write_all(b"\n").map_err(mux_error)?;
        writer.write_all(&planes).map_err(mux_error)?;
        self.frames += 1;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), PipelineError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(mux_error)?;
            log::info!("wrote {} frames to {}", self.frames, self.path.display());
        }
        Ok(())
    }
}
