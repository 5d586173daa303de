//! Notification records and the enums they carry.

pub mod enums;
mod notification;

pub use enums::*;
pub use notification::*;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },
}
