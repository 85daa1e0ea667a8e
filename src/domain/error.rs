//! Domain errors

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Unknown card state: {0}")]
    StateNotFound(String),

    #[error("No state matches slug: {0}")]
    SlugNotFound(String),

    #[error("Invalid state configuration: {0}")]
    InvalidStates(String),
}
