//! ABR error types

use std::io;
use thiserror::Error;

/// Errors that can occur while decoding or encoding ABR data
#[derive(Error, Debug)]
pub enum AbrError {
    #[error("IO error: {0}")]
    Io(io::Error),

    #[error("Unsupported ABR version: {0}")]
    UnsupportedFormatVersion(i16),

    #[error("Unsupported ABR sub-version: {major}.{minor}")]
    UnsupportedFormatSubVersion { major: i16, minor: i16 },

    #[error("The file contains no sampled brushes")]
    NoBrushesFound,

    #[error("Unexpected end of data")]
    UnexpectedEndOfData,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Arithmetic overflow in size computation")]
    ArithmeticOverflow,

    #[error("Unsupported document size: {0}")]
    UnsupportedDocumentSize(String),

    #[error("Invalid brush descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("String decoding error: {0}")]
    StringDecode(String),
}

impl From<io::Error> for AbrError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            AbrError::UnexpectedEndOfData
        } else {
            AbrError::Io(err)
        }
    }
}

impl From<AbrError> for String {
    fn from(err: AbrError) -> Self {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eof_maps_to_unexpected_end() {
        let err: AbrError = io::Error::new(io::ErrorKind::UnexpectedEof, "short").into();
        assert!(matches!(err, AbrError::UnexpectedEndOfData));

        let err: AbrError = io::Error::new(io::ErrorKind::PermissionDenied, "no").into();
        assert!(matches!(err, AbrError::Io(_)));
    }

    #[test]
    fn test_display_for_host() {
        let msg: String = AbrError::UnsupportedFormatSubVersion { major: 6, minor: 3 }.into();
        assert_eq!(msg, "Unsupported ABR sub-version: 6.3");
    }
}
