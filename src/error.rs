//! Error types for stream and processor operations.
//!
//! A single crate-level error enum covers I/O failures, short reads, bad
//! arguments, unsupported processor modes, and the validation/consistency
//! kinds raised by generated parsers and serializers. Library operations
//! never retry or swallow errors; everything propagates to the caller.

use std::io;
use thiserror::Error;

/// The main error type for OxiBin runtime operations.
#[derive(Debug, Error)]
pub enum OxiBinError {
    /// I/O error from the underlying byte backend.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A read was short: fewer bytes were available than requested.
    #[error("Unexpected end of stream: requested {requested} bytes, only {available} available")]
    UnexpectedEof {
        /// Number of bytes requested.
        requested: usize,
        /// Number of bytes actually available.
        available: usize,
    },

    /// A byte count exceeded the allowed maximum.
    #[error("Requested byte count {value} exceeds maximum {max}")]
    OutOfRange {
        /// The offending count.
        value: u64,
        /// The largest allowed count.
        max: u64,
    },

    /// An argument was outside its documented domain.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the violation.
        message: String,
    },

    /// A processor mode that has no implementation.
    #[error("Not implemented: {feature}")]
    NotImplemented {
        /// The unimplemented mode.
        feature: String,
    },

    /// A format feature the runtime does not handle.
    #[error("Not supported: {feature}")]
    NotSupported {
        /// The unsupported feature.
        feature: String,
    },

    /// An endianness-switch expression in generated code yielded no match.
    #[error("Unable to decide endianness at {src_path}")]
    UndecidedEndianness {
        /// Schema source path of the switch.
        src_path: String,
    },

    /// A parsed value did not equal the expected constant.
    #[error("Validation failed at {src_path}, position {pos}: expected {expected}, got {actual}")]
    ValidationNotEqual {
        /// Summary of the expected value.
        expected: String,
        /// Summary of the actual value.
        actual: String,
        /// Stream position at the point of failure.
        pos: u64,
        /// Schema source path of the failing field.
        src_path: String,
    },

    /// A parsed value fell below its declared minimum.
    #[error("Validation failed at {src_path}, position {pos}: {actual} is less than minimum {min}")]
    ValidationLessThan {
        /// Summary of the minimum.
        min: String,
        /// Summary of the actual value.
        actual: String,
        /// Stream position at the point of failure.
        pos: u64,
        /// Schema source path of the failing field.
        src_path: String,
    },

    /// A parsed value exceeded its declared maximum.
    #[error("Validation failed at {src_path}, position {pos}: {actual} is greater than maximum {max}")]
    ValidationGreaterThan {
        /// Summary of the maximum.
        max: String,
        /// Summary of the actual value.
        actual: String,
        /// Stream position at the point of failure.
        pos: u64,
        /// Schema source path of the failing field.
        src_path: String,
    },

    /// A parsed value matched none of the allowed alternatives.
    #[error("Validation failed at {src_path}, position {pos}: {actual} matches none of the allowed values")]
    ValidationNotAnyOf {
        /// Summary of the actual value.
        actual: String,
        /// Stream position at the point of failure.
        pos: u64,
        /// Schema source path of the failing field.
        src_path: String,
    },

    /// A validation expression evaluated to false.
    #[error("Validation expression failed at {src_path}, position {pos}: got {actual}")]
    ValidationExprFailed {
        /// Summary of the actual value.
        actual: String,
        /// Stream position at the point of failure.
        pos: u64,
        /// Schema source path of the failing field.
        src_path: String,
    },

    /// A write-phase internal check found a value mismatch.
    #[error("Consistency check failed for {field}: expected {expected}, got {actual}")]
    ConsistencyMismatch {
        /// Name of the inconsistent field.
        field: String,
        /// Summary of the expected value.
        expected: String,
        /// Summary of the actual value.
        actual: String,
    },

    /// A write-phase internal check found a size mismatch.
    #[error("Size consistency check failed for {field}: expected {expected} bytes, got {actual}")]
    ConsistencySizeMismatch {
        /// Name of the inconsistent field.
        field: String,
        /// Expected size in bytes.
        expected: u64,
        /// Actual size in bytes.
        actual: u64,
    },
}

/// Result type alias for OxiBin runtime operations.
pub type Result<T> = std::result::Result<T, OxiBinError>;

impl OxiBinError {
    /// Create an unexpected EOF error.
    pub fn unexpected_eof(requested: usize, available: usize) -> Self {
        Self::UnexpectedEof {
            requested,
            available,
        }
    }

    /// Create an out-of-range error.
    pub fn out_of_range(value: u64, max: u64) -> Self {
        Self::OutOfRange { value, max }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a not-implemented error.
    pub fn not_implemented(feature: impl Into<String>) -> Self {
        Self::NotImplemented {
            feature: feature.into(),
        }
    }

    /// Create a not-supported error.
    pub fn not_supported(feature: impl Into<String>) -> Self {
        Self::NotSupported {
            feature: feature.into(),
        }
    }

    /// Create an undecided endianness error.
    pub fn undecided_endianness(src_path: impl Into<String>) -> Self {
        Self::UndecidedEndianness {
            src_path: src_path.into(),
        }
    }

    /// Create an equality validation error.
    pub fn validation_not_equal(
        expected: impl Into<String>,
        actual: impl Into<String>,
        pos: u64,
        src_path: impl Into<String>,
    ) -> Self {
        Self::ValidationNotEqual {
            expected: expected.into(),
            actual: actual.into(),
            pos,
            src_path: src_path.into(),
        }
    }

    /// Create a lower-bound validation error.
    pub fn validation_less_than(
        min: impl Into<String>,
        actual: impl Into<String>,
        pos: u64,
        src_path: impl Into<String>,
    ) -> Self {
        Self::ValidationLessThan {
            min: min.into(),
            actual: actual.into(),
            pos,
            src_path: src_path.into(),
        }
    }

    /// Create an upper-bound validation error.
    pub fn validation_greater_than(
        max: impl Into<String>,
        actual: impl Into<String>,
        pos: u64,
        src_path: impl Into<String>,
    ) -> Self {
        Self::ValidationGreaterThan {
            max: max.into(),
            actual: actual.into(),
            pos,
            src_path: src_path.into(),
        }
    }

    /// Create a not-any-of validation error.
    pub fn validation_not_any_of(
        actual: impl Into<String>,
        pos: u64,
        src_path: impl Into<String>,
    ) -> Self {
        Self::ValidationNotAnyOf {
            actual: actual.into(),
            pos,
            src_path: src_path.into(),
        }
    }

    /// Create a failed-expression validation error.
    pub fn validation_expr_failed(
        actual: impl Into<String>,
        pos: u64,
        src_path: impl Into<String>,
    ) -> Self {
        Self::ValidationExprFailed {
            actual: actual.into(),
            pos,
            src_path: src_path.into(),
        }
    }

    /// Create a write-phase consistency error.
    pub fn consistency_mismatch(
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::ConsistencyMismatch {
            field: field.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a write-phase size consistency error.
    pub fn consistency_size_mismatch(field: impl Into<String>, expected: u64, actual: u64) -> Self {
        Self::ConsistencySizeMismatch {
            field: field.into(),
            expected,
            actual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OxiBinError::unexpected_eof(8, 3);
        assert!(err.to_string().contains("requested 8 bytes"));

        let err = OxiBinError::validation_not_equal("0x7f", "0x7e", 4, "/types/header/magic");
        assert!(err.to_string().contains("/types/header/magic"));
        assert!(err.to_string().contains("position 4"));

        let err = OxiBinError::consistency_size_mismatch("body", 16, 12);
        assert!(err.to_string().contains("16"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: OxiBinError = io_err.into();
        assert!(matches!(err, OxiBinError::Io(_)));
    }
}
