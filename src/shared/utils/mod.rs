pub mod logger;
pub mod pacer;
pub mod text;

pub use logger::{init_logger, LogContext, TimedOperation};
pub use pacer::{DelayRange, Pacer, PacingPolicy, RecordingPacer, TokioPacer};
pub use text::normalize_name;
