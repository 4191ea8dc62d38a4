//! The error type shared by every reader, writer and dispatch operation.
use std::io;

use thiserror::Error;

/// Everything that can go wrong while locating, reading or writing a peak list.
///
/// [`PeakListError::MalformedRecord`] is never returned from a read call. Readers
/// absorb malformed lines into an end-of-peak-list signal and keep the most recent
/// one around for inspection through [`PeakListReader::last_anomaly`](crate::io::PeakListReader::last_anomaly).
#[derive(Debug, Error)]
pub enum PeakListError {
    #[error("Could not determine the peak list format of {0:?}")]
    UnknownFormat(String),
    #[error("The {format} format cannot express this peak list: {reason}")]
    IncompatibleFormat { format: String, reason: String },
    #[error("The {0} format can only contain one spectrum")]
    CanOnlyContainOneSpectrum(String),
    #[error("Malformed record {line:?}: {reason}")]
    MalformedRecord { line: String, reason: String },
    #[error("Cannot normalize a peak list whose total intensity is {0}")]
    ZeroTotalIntensity(f64),
    #[error("The peak list stream has already been closed")]
    Closed,
    #[error("Invalid file name or content pattern: {0}")]
    InvalidPattern(
        #[from]
        #[source]
        regex::Error,
    ),
    #[error("External converter {program} failed: {status}")]
    TranscoderFailed { program: String, status: String },
    #[error("Encountered an IO error: {0}")]
    IOError(
        #[from]
        #[source]
        io::Error,
    ),
    #[cfg(feature = "zip")]
    #[error("Encountered a zip archive error: {0}")]
    ZipError(
        #[from]
        #[source]
        zip::result::ZipError,
    ),
}

impl PeakListError {
    pub(crate) fn incompatible(format: &str, reason: impl Into<String>) -> Self {
        Self::IncompatibleFormat {
            format: format.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(line: &str, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            line: line.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<PeakListError> for io::Error {
    fn from(value: PeakListError) -> Self {
        match value {
            PeakListError::IOError(e) => e,
            PeakListError::UnknownFormat(_)
            | PeakListError::IncompatibleFormat { .. }
            | PeakListError::CanOnlyContainOneSpectrum(_) => {
                io::Error::new(io::ErrorKind::Unsupported, value)
            }
            PeakListError::Closed => io::Error::new(io::ErrorKind::BrokenPipe, value),
            _ => io::Error::new(io::ErrorKind::InvalidData, value),
        }
    }
}

pub type Result<T> = std::result::Result<T, PeakListError>;
