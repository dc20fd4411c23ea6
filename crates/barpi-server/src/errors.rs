//! Server errors.

use std::io;

/// Errors raised while starting or running the HTTP server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listener could not bind its address.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying error.
        source: io::Error,
    },

    /// Any other socket error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The Prometheus recorder could not be installed.
    #[error("failed to install metrics recorder: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_display_includes_addr() {
        let err = ServerError::Bind {
            addr: "0.0.0.0:80".into(),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.to_string(), "failed to bind 0.0.0.0:80: denied");
    }

    #[test]
    fn io_converts() {
        let err: ServerError = io::Error::other("boom").into();
        assert!(matches!(err, ServerError::Io(_)));
    }
}
