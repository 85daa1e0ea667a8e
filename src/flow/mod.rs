//! Flow metrics - day counting, statistics and rolling windows

mod dates;
mod distribution;
mod moving;
mod stats;

pub use dates::*;
pub use distribution::*;
pub use moving::*;
pub use stats::*;
