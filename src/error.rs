//! Crate-wide error types.
//!
//! Runtime (per-packet) failures are represented as small `thiserror` enums
//! so callers can match on the distinct kinds spec.md calls out (decrypt tag
//! mismatch vs. bad padding, duplicate route vs. route not found, ...).
//! Everything else funnels through the boxed [`Error`]/[`Result`] pair, the
//! same shape the teacher crate uses throughout its `crate::Result<T>`.

use thiserror::Error as ThisError;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that make the datapath structurally unable to run. Per spec.md
/// §7, these are reported and terminate the process (non-zero exit code).
#[derive(Debug, ThisError)]
pub enum StartupError {
    #[error("could not resolve local node identity: {0}")]
    Identity(String),
    #[error("failed to open tunnel device: {0}")]
    Tunnel(String),
    #[error("failed to bind UDP socket: {0}")]
    SocketBind(String),
    #[error("failed to initialize crypto engine: {0}")]
    Crypto(String),
    #[error("failed to load configuration: {0}")]
    Config(String),
}
