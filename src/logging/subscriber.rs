//! Tracing subscriber setup: console formatter, file layer, and initialisation.
use std::fs;
use std::io::Write as _;
use std::sync::Mutex;

use super::utils::{DATETIME, TIME, log_file_path, strip_ansi, utc_now};

/// Extracts the `message` field from a [`tracing::Event`].
#[derive(Default)]
struct MessageExtractor {
    message: String,
}

impl tracing::field::Visit for MessageExtractor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }
}

/// How an event is presented, from its level and target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Stage,
    Exec,
    Error,
    Warn,
    Info,
    Debug,
}

impl Kind {
    fn of(level: tracing::Level, target: &str) -> Self {
        match (level, target) {
            (tracing::Level::ERROR, _) => Self::Error,
            (tracing::Level::WARN, _) => Self::Warn,
            (tracing::Level::INFO, "dotsync::stage") => Self::Stage,
            (tracing::Level::INFO, "dotsync::exec") => Self::Exec,
            (tracing::Level::INFO, _) => Self::Info,
            _ => Self::Debug,
        }
    }

    const fn tag(self) -> &'static str {
        match self {
            Self::Stage => "[stage]",
            Self::Exec => "[exec]",
            Self::Error => "[error]",
            Self::Warn => "[warn]",
            Self::Info => "[info]",
            Self::Debug => "[debug]",
        }
    }

    /// Terminal rendering of `msg`.  Stages and diagnostics sit at the left
    /// margin; everything else is indented under the current stage.
    fn console(self, msg: &str) -> String {
        match self {
            Self::Stage => format!("\x1b[1;36m::\x1b[0m \x1b[1m{msg}\x1b[0m"),
            Self::Exec => format!("   \x1b[2m> {msg}\x1b[0m"),
            Self::Error => format!("\x1b[1;31merror:\x1b[0m {msg}"),
            Self::Warn => format!("\x1b[1;33mwarning:\x1b[0m {msg}"),
            Self::Info => format!("   {msg}"),
            Self::Debug => format!("   \x1b[2m{msg}\x1b[0m"),
        }
    }

    /// Log file rendering: timestamp, fixed-width tag, plain text.
    fn file(self, ts: &str, msg: &str) -> String {
        format!("{ts} {:<7} {}", self.tag(), strip_ansi(msg))
    }
}

/// Appends every event to `$XDG_CACHE_HOME/dotsync/<command>.log`.
///
/// Installed by [`init_subscriber`] with a `DEBUG` filter, so the file keeps
/// detail the console hides without `--verbose`.
#[derive(Debug)]
pub(super) struct FileLayer {
    file: Mutex<fs::File>,
}

impl FileLayer {
    /// Truncate the log file for `command` and write the run header.
    ///
    /// `None` if the cache directory or the file is unusable; the run then
    /// goes on with console output only.
    pub(super) fn new(command: &str) -> Option<Self> {
        let path = log_file_path(command)?;
        let version =
            option_env!("DOTSYNC_VERSION").unwrap_or(concat!("dev-", env!("CARGO_PKG_VERSION")));
        let header = format!(
            "# dotsync {version} {command}, started {} UTC\n",
            utc_now(DATETIME)
        );
        fs::write(&path, header).ok()?;
        let file = fs::OpenOptions::new().append(true).open(&path).ok()?;
        Some(Self {
            file: Mutex::new(file),
        })
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for FileLayer {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let metadata = event.metadata();
        let mut extractor = MessageExtractor::default();
        event.record(&mut extractor);

        let line = Kind::of(*metadata.level(), metadata.target())
            .file(&utc_now(TIME), &extractor.message);
        if let Ok(mut f) = self.file.lock() {
            writeln!(f, "{line}").ok();
        }
    }
}

/// Console [`FormatEvent`](tracing_subscriber::fmt::FormatEvent) for dotsync.
struct ConsoleFormatter;

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for ConsoleFormatter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();
        let mut extractor = MessageExtractor::default();
        event.record(&mut extractor);
        writeln!(
            writer,
            "{}",
            Kind::of(*metadata.level(), metadata.target()).console(&extractor.message)
        )
    }
}

/// Initialise the global [`tracing`] subscriber.
///
/// Warnings and errors go to stderr, the rest to stdout; `verbose` lets
/// debug lines through on the console.  The [`FileLayer`] always records
/// debug.  Call once, before anything logs.
pub fn init_subscriber(verbose: bool, command: &str) {
    use tracing_subscriber::fmt::writer::MakeWriterExt as _;
    use tracing_subscriber::{
        Layer as _, filter::LevelFilter, fmt, layer::SubscriberExt as _,
        util::SubscriberInitExt as _,
    };

    let console_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    let make_writer = std::io::stderr
        .with_max_level(tracing::Level::WARN)
        .and(std::io::stdout.with_min_level(tracing::Level::INFO));

    let console_layer = fmt::layer()
        .event_format(ConsoleFormatter)
        .with_writer(make_writer)
        .with_filter(console_level);

    let file_layer = FileLayer::new(command).map(|l| l.with_filter(LevelFilter::DEBUG));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();
}
