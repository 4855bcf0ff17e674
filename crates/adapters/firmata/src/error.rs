use chotu_app::ports::LinkError;

/// Errors raised by the Firmata adapter.
#[derive(Debug, thiserror::Error)]
pub enum FirmataError {
    #[error("failed to open serial port {address}")]
    Open {
        address: String,
        #[source]
        source: tokio_serial::Error,
    },

    #[error("serial I/O failed")]
    Io(#[from] std::io::Error),

    #[error("serial port closed by the board")]
    Eof,
}

impl From<FirmataError> for LinkError {
    fn from(err: FirmataError) -> Self {
        match err {
            FirmataError::Eof => LinkError::Closed,
            other => LinkError::transport(other),
        }
    }
}
