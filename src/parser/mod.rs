pub mod decode;
pub mod record;

pub use decode::*;
pub use record::{Row, SqlValue};
