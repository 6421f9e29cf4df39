//! Logging setup for the command-line tool and examples.
//!
//! Without the `tracing` feature the crates only emit `log` records and
//! [`init_with_level`] installs a small stderr sink that prints lines like
//! `[  0.412s  INFO detector] message` (seconds since installation, level,
//! last path segment of the target).

use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

struct StderrSink {
    max_level: LevelFilter,
    epoch: Instant,
}

fn short_target(target: &str) -> &str {
    let last = target.rsplit("::").next().unwrap_or(target);
    last.strip_prefix("checkerboard_calib_").unwrap_or(last)
}

impl Log for StderrSink {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let secs = self.epoch.elapsed().as_secs_f64();
            let line = format!(
                "[{secs:7.3}s {:>5} {}] {}\n",
                record.level(),
                short_target(record.target()),
                record.args()
            );
            let _ = std::io::stderr().lock().write_all(line.as_bytes());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static SINK: OnceLock<StderrSink> = OnceLock::new();

/// Route `log` records at or above `level` to stderr.
///
/// Only the first call installs the sink; later calls are ignored.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    let mut fresh = false;
    let sink = SINK.get_or_init(|| {
        fresh = true;
        StderrSink {
            max_level: level,
            epoch: Instant::now(),
        }
    });
    if fresh {
        log::set_logger(sink)?;
        log::set_max_level(level);
    }
    Ok(())
}

/// Level for a `-v` count: info by default, then debug, then trace.
pub fn verbosity_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

#[cfg(feature = "tracing")]
fn tracing_level(level: LevelFilter) -> tracing_subscriber::filter::LevelFilter {
    use tracing_subscriber::filter::LevelFilter as Tracing;
    match level {
        LevelFilter::Off => Tracing::OFF,
        LevelFilter::Error => Tracing::ERROR,
        LevelFilter::Warn => Tracing::WARN,
        LevelFilter::Info => Tracing::INFO,
        LevelFilter::Debug => Tracing::DEBUG,
        LevelFilter::Trace => Tracing::TRACE,
    }
}

/// Install a `tracing` subscriber filtered by `RUST_LOG`, falling back to
/// `default_level` when it is unset.
///
/// Span close events are reported so the instrumented detector and solver
/// stages show their timings. `json` switches to one flattened JSON object
/// per event.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool, default_level: LevelFilter) {
    use tracing_subscriber::fmt::{format::FmtSpan, time::Uptime};
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::builder()
        .with_default_directive(tracing_level(default_level).into())
        .from_env_lossy();
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_timer(Uptime::default());
    let installed = if json {
        builder.json().flatten_event(true).finish().try_init()
    } else {
        builder.finish().try_init()
    };
    if installed.is_err() {
        log::debug!("a global tracing subscriber is already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_target_strips_crate_prefix() {
        assert_eq!(short_target("checkerboard_calib_chessboard::detector"), "detector");
        assert_eq!(short_target("checkerboard_calib_solver"), "solver");
        assert_eq!(short_target("other"), "other");
    }

    #[test]
    fn verbose_flags_raise_the_level() {
        assert_eq!(verbosity_level(0), LevelFilter::Info);
        assert_eq!(verbosity_level(1), LevelFilter::Debug);
        assert_eq!(verbosity_level(2), LevelFilter::Trace);
        assert_eq!(verbosity_level(9), LevelFilter::Trace);
    }

    #[cfg(feature = "tracing")]
    #[test]
    fn tracing_default_follows_verbosity() {
        use tracing_subscriber::filter::LevelFilter as Tracing;
        assert_eq!(tracing_level(verbosity_level(0)), Tracing::INFO);
        assert_eq!(tracing_level(verbosity_level(1)), Tracing::DEBUG);
        assert_eq!(tracing_level(verbosity_level(3)), Tracing::TRACE);
        assert_eq!(tracing_level(LevelFilter::Off), Tracing::OFF);
    }
}
