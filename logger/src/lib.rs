//! A process-wide logger that tests and binaries can set up any number of
//! times. Later setups replace the filter of earlier ones.

use {
    lazy_static::lazy_static,
    std::sync::{Arc, RwLock},
};

lazy_static! {
    static ref LOGGER: Arc<RwLock<env_logger::Logger>> =
        Arc::new(RwLock::new(env_logger::Logger::from_default_env()));
}

struct LoggerShim {}

impl log::Log for LoggerShim {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        LOGGER.read().unwrap().enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        LOGGER.read().unwrap().log(record);
    }

    fn flush(&self) {}
}

fn replace_logger(logger: env_logger::Logger) {
    log::set_max_level(logger.filter());
    *LOGGER.write().unwrap() = logger;
    let _ = log::set_boxed_logger(Box::new(LoggerShim {}));
}

/// Configures logging with a filter such as `strata=debug,info`, ignoring
/// `RUST_LOG`.
pub fn setup_with(filter: &str) {
    let logger = env_logger::Builder::new()
        .parse_filters(filter)
        .format_timestamp_nanos()
        .build();
    replace_logger(logger);
}

/// Configures logging from `RUST_LOG`, falling back to `filter` when it is
/// unset.
pub fn setup_with_default(filter: &str) {
    let logger =
        env_logger::Builder::from_env(env_logger::Env::new().default_filter_or(filter))
            .format_timestamp_nanos()
            .build();
    replace_logger(logger);
}

/// Configures logging with `error` as the default level.
pub fn setup() {
    setup_with_default("error");
}
