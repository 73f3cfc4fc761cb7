use thiserror::Error;

/// Failures at the message-store boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// The backend could not be reached (history fetch, subscription, or
    /// identity lookup). Callers degrade to partial data.
    #[error("message store unavailable: {0}")]
    Unavailable(String),
    /// A send was attempted without a resolved user identity. No write is
    /// issued in this case.
    #[error("no authenticated user")]
    Unauthenticated,
    /// The backend rejected a write.
    #[error("send rejected: {0}")]
    SendRejected(String),
    /// A row or realtime payload did not match the expected shape.
    #[error("malformed payload: {0}")]
    Decode(String),
}
