//! Cross-cutting utilities: the error taxonomy and logging bootstrap.

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{GatewayError, Result};
