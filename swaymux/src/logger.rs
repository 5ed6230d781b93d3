use chrono::Local;
use log::{LevelFilter, Log, Metadata, Record};

/// Plain stderr logger. Events arrive from several tasks at once, so each
/// line carries the thread name next to the source module.
pub struct Logger {
    level: LevelFilter,
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level().to_level_filter() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let timestamp =
            Local::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);

        let source = if record.target().is_empty() {
            record.module_path().unwrap_or_default()
        } else {
            record.target()
        };

        let current = std::thread::current();
        let thread = current.name().unwrap_or("?");

        eprintln!(
            "{} {:<5} t={} {}: {}",
            timestamp,
            record.level(),
            thread,
            source,
            record.args()
        );
    }

    fn flush(&self) {}
}

pub fn init(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    log::set_boxed_logger(Box::new(Logger { level }))?;
    log::set_max_level(level);

    Ok(())
}
