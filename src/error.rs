//! Provides the error type shared by every part of the crate.
//!
//! Shape mismatches and malformed data are configuration bugs on the caller's
//! side, so they are reported immediately and never retried.
use thiserror::Error;

/// Result type used throughout sapling.
pub type Result<T> = ::std::result::Result<T, Error>;

#[derive(Debug, Error)]
/// Errors raised while building, running or training a [Pipeline][1].
/// [1]: ../pipeline/struct.Pipeline.html
pub enum Error {
    /// A stage's input or output shape does not line up with its neighbour,
    /// or a tensor's buffer does not match its shape.
    #[error("shape error: {0}")]
    Shape(String),
    /// A dataset or batch is empty, inconsistent or too small.
    #[error("data error: {0}")]
    Data(String),
    /// Reading a dataset or configuration file failed.
    #[error("i/o error: {0}")]
    Io(#[from] ::std::io::Error),
    /// A configuration or dataset document could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Returns `true` for [Error::Shape](#variant.Shape).
    pub fn is_shape(&self) -> bool {
        matches!(*self, Error::Shape(_))
    }

    /// Prefix a shape error with the name of the stage it was raised in.
    pub fn in_stage(self, stage: &str) -> Error {
        match self {
            Error::Shape(msg) => Error::Shape(format!("stage '{}': {}", stage, msg)),
            other => other,
        }
    }

    /// Returns `true` for [Error::Data](#variant.Data).
    pub fn is_data(&self) -> bool {
        matches!(*self, Error::Data(_))
    }
}

/// Return early with an [Error::Shape](enum.Error.html#variant.Shape).
macro_rules! shape_err {
    ($($arg:tt)*) => {
        return Err($crate::error::Error::Shape(format!($($arg)*)))
    };
}

/// Return early with an [Error::Data](enum.Error.html#variant.Data).
macro_rules! data_err {
    ($($arg:tt)*) => {
        return Err($crate::error::Error::Data(format!($($arg)*)))
    };
}
