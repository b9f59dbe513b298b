pub mod format;
pub mod parser;

pub use format::{strip_ansi, MessageFormat};
pub use parser::{parse, parse_with_format, LogEntry, ParseError};
