//! Data models and DTOs (Data Transfer Objects)
//!
//! Entity records of the curation workflow plus the generic response wrappers.

pub mod contract;
pub mod harvest;
pub mod qa;
pub mod source;
pub mod user;
pub mod voting;

// Re-export commonly used types
pub use contract::*;
pub use harvest::*;
pub use qa::*;
pub use source::*;
pub use user::*;
pub use voting::*;

use serde::Serialize;

/// Generic success response
#[derive(Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub data: Option<T>,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn with_data(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}
