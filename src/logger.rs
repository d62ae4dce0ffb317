// Diagnostic log backend: routes `log` records to the serial console as
// component-tagged lines, e.g. `[MEMORY] double free at 0x00200200`.
use log::{LevelFilter, Metadata, Record};

struct KernelLogger;

impl log::Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            crate::kprintln!("[{}] {}", record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: KernelLogger = KernelLogger;

/// Install the kernel logger. Safe to call more than once; later calls keep
/// the already-installed instance.
pub fn init() {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Info);
    }
}

/// Raise or lower log verbosity at runtime. `Debug` surfaces the
/// scheduler's per-decision tracing.
pub fn set_level(level: LevelFilter) {
    log::set_max_level(level);
}
