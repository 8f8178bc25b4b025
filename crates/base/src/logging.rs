use {
    log::{LevelFilter, Log, Metadata, Record},
    std::{
        fs::{self, File, OpenOptions},
        io::{self, Write},
        path::PathBuf,
        sync::Mutex,
        time::{SystemTime, UNIX_EPOCH},
    },
};

/// Environment variable that overrides the default log level (`error` .. `trace`).
pub const LOG_LEVEL_ENV: &str = "NIGHTLENS_LOG";

/// Log level used when `NIGHTLENS_LOG` is unset or unparsable.
pub fn default_level() -> LevelFilter {
    std::env::var(LOG_LEVEL_ENV)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(if cfg!(debug_assertions) {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
}

fn format_record(record: &Record) -> String {
    let (date, time) = utc_now();
    format!(
        "{}T{} [{}] [{:?}] {}:{} - {}\n",
        date,
        time,
        record.level(),
        std::thread::current().id(),
        record.file().unwrap_or("unknown"),
        record.line().unwrap_or(0),
        record.args()
    )
}

/// Writes every record to stdout.
pub struct StdoutLogger {
    level: LevelFilter,
}

impl StdoutLogger {
    pub fn new(level: LevelFilter) -> Self {
        Self { level }
    }
}

impl Log for StdoutLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            print!("{}", format_record(record));
        }
    }

    fn flush(&self) {
        io::stdout().flush().ok();
    }
}

struct FileLoggerState {
    dir: PathBuf,
    date: String,
    file: File,
}

/// Appends records to `<dir>/<YYYY-MM-DD>.log`, switching files at UTC midnight.
pub struct FileLogger {
    level: LevelFilter,
    state: Mutex<FileLoggerState>,
}

fn open_day_file(dir: &PathBuf, date: &str) -> io::Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(format!("{date}.log")))
}

impl FileLogger {
    pub fn new(dir: impl Into<PathBuf>, level: LevelFilter) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let (date, _) = utc_now();
        let file = open_day_file(&dir, &date)?;
        Ok(Self {
            level,
            state: Mutex::new(FileLoggerState { dir, date, file }),
        })
    }
}

impl Log for FileLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_record(record);
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let (today, _) = utc_now();
        if today != state.date {
            match open_day_file(&state.dir, &today) {
                Ok(file) => {
                    state.file = file;
                    state.date = today;
                }
                // keep writing to yesterday's file rather than losing records
                Err(error) => eprintln!("failed to roll log file: {error}"),
            }
        }
        if let Err(error) = state.file.write_all(line.as_bytes()) {
            eprintln!("failed to write log file: {error}");
            eprint!("{line}");
        }
    }

    fn flush(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.file.flush().ok();
    }
}

/// Install a `StdoutLogger` as the global logger. Later calls are ignored.
pub fn init_stdout_logger() {
    let level = default_level();
    let logger: &'static StdoutLogger = Box::leak(Box::new(StdoutLogger::new(level)));
    if log::set_logger(logger).is_ok() {
        log::set_max_level(level);
    }
}

/// Install a `FileLogger` writing into `dir` as the global logger.
pub fn init_file_logger(dir: impl Into<PathBuf>) -> io::Result<()> {
    let level = default_level();
    let logger = FileLogger::new(dir, level)?;
    // the leaked logger lives for the rest of the process, even if another
    // logger was installed first
    if log::set_logger(Box::leak(Box::new(logger))).is_ok() {
        log::set_max_level(level);
    }
    Ok(())
}

// (YYYY-MM-DD, HH:MM:SS) in UTC
fn utc_now() -> (String, String) {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let (year, month, day) = civil_from_days((secs / 86400) as i64);
    let seconds = secs % 86400;
    (
        format!("{year:04}-{month:02}-{day:02}"),
        format!(
            "{:02}:{:02}:{:02}",
            seconds / 3600,
            (seconds % 3600) / 60,
            seconds % 60
        ),
    )
}

// days since 1970-01-01 to a proleptic Gregorian date
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719468;
    let era = z.div_euclid(146097);
    let doe = z.rem_euclid(146097) as u32;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe as i64 + era * 400 + if month <= 2 { 1 } else { 0 };
    (year, month, day)
}
