pub mod errors;
pub mod format;
pub mod interrupt;
pub mod logging;

pub use format::format_usd;
pub use logging::init_logging;
