//! Channel output handling: prompt detection over an ANSI-stripped buffer.

mod buffer;

pub use buffer::{Matched, PatternBuffer};
