use isbridge_transport::StreamError;

/// Errors raised while building a stream from a connection string.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The connection string does not match any supported form.
    #[error("invalid connection string {spec:?}: {reason}")]
    InvalidConnectionString { spec: String, reason: String },

    /// The stream was recognised but could not be opened.
    #[error("failed to open {spec:?}: {source}")]
    Open {
        spec: String,
        #[source]
        source: StreamError,
    },
}

pub type Result<T> = std::result::Result<T, ClientError>;
