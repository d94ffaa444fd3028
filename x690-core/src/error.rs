use thiserror::Error;

/// Main error type for X.690 encode/decode operations
///
/// Every variant is caused by untrusted input or a failing byte source/sink
/// and is recoverable by the caller. Codec-internal invariant violations are
/// not reported through this type; they are bugs and use debug assertions.
#[derive(Error, Debug)]
pub enum Asn1Error {
    #[error("Malformed tag: {0}")]
    MalformedTag(String),

    #[error("Malformed length: {0}")]
    MalformedLength(String),

    #[error("Truncated input: {0}")]
    TruncatedInput(String),

    #[error("Unknown construction: {0}")]
    UnknownConstruction(String),

    #[error("Unexpected tag: {0}")]
    UnexpectedTag(String),

    #[error("Nesting too deep: exceeds {0} levels")]
    NestingTooDeep(usize),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for X.690 encode/decode operations
pub type Asn1Result<T> = Result<T, Asn1Error>;
