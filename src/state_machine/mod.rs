//! Card tracking - state transition detection and history logging

mod history;
mod locks;
mod tracker;
mod transitions;

pub use history::*;
pub use locks::*;
pub use tracker::*;
pub use transitions::*;
