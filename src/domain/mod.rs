//! Domain models for Kardboard

mod card;
mod error;
mod service_class;
mod statelog;
mod states;
mod ticket;

pub use card::*;
pub use error::*;
pub use service_class::*;
pub use statelog::*;
pub use states::*;
pub use ticket::*;
