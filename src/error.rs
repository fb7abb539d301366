use thiserror::Error;

/// Errors returned by coze operations.
///
/// Structural and policy violations surface here. Whether a signature is
/// cryptographically valid is reported as a `bool`, never as an error.
#[derive(Debug, Error)]
pub enum Error {
    /// The identifier is not in the registry, is not applicable to the
    /// requested operation, or its primitive is not compiled in.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// A canon names the same field more than once.
    #[error("duplicate field in canon: {0}")]
    DuplicateCanonField(String),

    /// Signing was attempted with a revoked key.
    #[error("key is revoked")]
    RevokedKey,

    /// The payload's `alg` or `tmb` disagrees with the key.
    #[error("key mismatch on '{field}': key has {key}, pay has {pay}")]
    KeyMismatch {
        field: &'static str,
        key: String,
        pay: String,
    },

    /// Base64 input that decodes, but is not the unique minimal encoding of
    /// its bytes.
    #[error("non-canonical base64 encoding: {0}")]
    NonCanonicalEncoding(String),

    /// Input that is not base64 at all.
    #[error("invalid base64: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),

    /// A key is missing a required field or has a field of the wrong size.
    #[error("malformed key: {0}")]
    MalformedKey(String),

    /// A coze or pay is missing a required field.
    #[error("malformed coze: {0}")]
    MalformedEnvelope(String),

    /// The underlying cryptographic library rejected an operation.
    #[error("cryptographic primitive failure: {0}")]
    PrimitiveFailure(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub(crate) fn unsupported(alg: impl std::fmt::Display, what: &str) -> Self {
        Error::UnsupportedAlgorithm(format!("{alg} has no {what}"))
    }
}
