//! Types and constants shared by every EduReach offline crate.

pub mod constants;
pub mod error;
pub mod token;
pub mod types;

pub use error::DecodeFault;
pub use types::{NetworkStatus, QualityLevel, QualityPreset};
