//! Router error types.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouterError {
    /// Every worker has died or none were ever registered
    #[error("no live workers available for routing")]
    NoWorkers,
}
