
struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        eprintln!("{:>5} [{}] {}", record.level(), record.target(), record.args());
    }

    fn flush(&self) {
    }
}

static LOGGER: StderrLogger = StderrLogger;

/// Initialise the global logger.
pub fn init() -> Result<(), log::SetLoggerError> {
    log::set_max_level(log::LevelFilter::Info);
    log::set_logger(&LOGGER)
}
