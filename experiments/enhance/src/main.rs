use {
    anyhow::{Context, Result, bail},
    image::Rotation,
    inference::{Enhancer, InferenceEngine, PassthroughEngine},
    std::{
        path::{Path, PathBuf},
        time::Instant,
    },
    video::{Pipeline, PipelineConfig, RawVideoBackend, Y4mSource},
};

struct Options {
    input: PathBuf,
    output: PathBuf,
    model: Option<PathBuf>,
    config: Option<PathBuf>,
    log_dir: Option<PathBuf>,
    rotation: Rotation,
}

const USAGE: &str = concat!(
    "<input.y4m|image> <output> [model.onnx] ",
    "[--config config.json] [--rotate degrees] [--log-dir dir]"
);

// argv may be empty when the process is spawned without a program name
fn split_program(args: &[String]) -> (&str, &[String]) {
    match args.split_first() {
        Some((program, rest)) => (program.as_str(), rest),
        None => ("enhance", args),
    }
}

fn parse_args(args: &[String]) -> Result<Options> {
    let mut positional = Vec::new();
    let mut config = None;
    let mut log_dir = None;
    let mut rotation = Rotation::Deg0;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                config = Some(PathBuf::from(iter.next().context("--config needs a path")?));
            }
            "--log-dir" => {
                log_dir = Some(PathBuf::from(iter.next().context("--log-dir needs a path")?));
            }
            "--rotate" => {
                let degrees: i32 = iter
                    .next()
                    .context("--rotate needs degrees")?
                    .parse()
                    .context("--rotate needs an integer")?;
                rotation = Rotation::from_degrees(degrees)
                    .with_context(|| format!("{degrees} is not a multiple of 90"))?;
            }
            _ => positional.push(PathBuf::from(arg)),
        }
    }
    let mut positional = positional.into_iter();
    let (Some(input), Some(output)) = (positional.next(), positional.next()) else {
        bail!("input and output paths are required");
    };
    Ok(Options {
        input,
        output,
        model: positional.next(),
        config,
        log_dir,
        rotation,
    })
}

fn create_engine(model: Option<&Path>, size: usize) -> Result<Box<dyn InferenceEngine>> {
    match model {
        None => {
            log::warn!("no model given, frames pass through unchanged");
            Ok(Box::new(PassthroughEngine::new(size)))
        }
        #[cfg(feature = "onnx")]
        Some(path) => Ok(Box::new(inference::OnnxEngine::load(path, size, size)?)),
        #[cfg(not(feature = "onnx"))]
        Some(path) => bail!("{} needs a build with the onnx feature", path.display()),
    }
}

fn is_y4m(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("y4m"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let (program, args) = split_program(&args);
    let options = match parse_args(args) {
        Ok(options) => options,
        Err(error) => {
            eprintln!("{error}");
            eprintln!("Usage: {program} {USAGE}");
            std::process::exit(1);
        }
    };
    match &options.log_dir {
        Some(dir) => base::init_file_logger(dir.clone())
            .with_context(|| format!("cannot log to {}", dir.display()))?,
        None => base::init_stdout_logger(),
    }

    let config = match &options.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    let engine = create_engine(options.model.as_deref(), config.network_size())?;
    let started = Instant::now();

    if is_y4m(&options.input) {
        // video mode: the output is a YUV4MPEG2 file
        let source = Y4mSource::open(&options.input)?.with_rotation(options.rotation);
        let pipeline = Pipeline::new(config, RawVideoBackend);
        let report = pipeline
            .run(Box::new(source), engine, options.output.clone())
            .await?;
        log::info!(
            "enhanced {} frames ({:.2}s of video) in {:.2}s",
            report.frames,
            report.duration_us as f64 / 1_000_000.0,
            started.elapsed().as_secs_f64()
        );
    } else {
        // photo mode: any still format in, PNG out
        let data = std::fs::read(&options.input)
            .with_context(|| format!("cannot read {}", options.input.display()))?;
        let frame = image::decode_frame(&data).await?.with_rotation(options.rotation);
        let mut enhancer = Enhancer::new(engine, config.codec())?;
        let enhanced = tokio::task::spawn_blocking(move || enhancer.enhance(&frame)).await??;
        image::save_png(&options.output, &enhanced)?;
        log::info!(
            "enhanced {} photo in {:.2}s",
            enhanced.size,
            started.elapsed().as_secs_f64()
        );
    }
    log::info!("wrote {}", options.output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn test_empty_argv_needs_paths() {
        let (program, rest) = split_program(&[]);
        assert_eq!(program, "enhance");
        assert!(rest.is_empty());
        assert!(parse_args(rest).is_err());
    }

    #[test]
    fn test_parse_args() {
        let args = strings(&[
            "enhance", "in.y4m", "out.y4m", "model.onnx", "--rotate", "90", "--config", "c.json",
        ]);
        let (program, rest) = split_program(&args);
        assert_eq!(program, "enhance");
        let options = parse_args(rest).unwrap();
        assert_eq!(options.input, PathBuf::from("in.y4m"));
        assert_eq!(options.output, PathBuf::from("out.y4m"));
        assert_eq!(options.model, Some(PathBuf::from("model.onnx")));
        assert_eq!(options.config, Some(PathBuf::from("c.json")));
        assert_eq!(options.rotation, Rotation::Deg90);
        assert!(options.log_dir.is_none());

        assert!(parse_args(&strings(&["in.y4m", "out.y4m", "--rotate", "45"])).is_err());
        assert!(parse_args(&strings(&["in.y4m", "out.y4m", "--config"])).is_err());
    }
}
