//! Error taxonomy
//!
//! Every failure in skewbench is fatal: the run aborts, the operator sees a
//! diagnostic and the process exits with a nonzero status. These kinds exist so
//! callers (and tests) can tell what went wrong without parsing messages.
//! Modules return `crate::Result` and wrap these with `anyhow` context.

use std::io;
use thiserror::Error;

/// Fatal benchmark error kinds
#[derive(Debug, Error)]
pub enum BenchError {
    /// Bad arguments or parameters, detected before any worker starts
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An OS resource could not be acquired or released
    #[error("{what}: {source}")]
    Resource {
        what: String,
        #[source]
        source: io::Error,
    },

    /// An operation log that cannot be interpreted
    #[error("invalid operation log: {0}")]
    LogFormat(String),
}

impl BenchError {
    pub fn config(msg: impl Into<String>) -> Self {
        BenchError::Configuration(msg.into())
    }

    /// Capture `errno` for a failed libc call
    pub fn last_os(what: impl Into<String>) -> Self {
        BenchError::Resource {
            what: what.into(),
            source: io::Error::last_os_error(),
        }
    }

    pub fn resource(what: impl Into<String>, source: io::Error) -> Self {
        BenchError::Resource {
            what: what.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_error_display() {
        let err = BenchError::resource(
            "mmap /tmp/x",
            io::Error::from_raw_os_error(libc::ENOMEM),
        );
        let msg = err.to_string();
        assert!(msg.starts_with("mmap /tmp/x: "));
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = BenchError::config("skew must be positive").into();
        let err = err.context("building sampler");
        assert!(matches!(
            err.downcast_ref::<BenchError>(),
            Some(BenchError::Configuration(_))
        ));
    }
}
