use thiserror::Error;

/// Wire code the provider returns when a share's content was already
/// received into the destination account.
pub const ERRNO_DUPLICATE_RECEIVE: i64 = 4_200_045;

/// Wire code the provider returns when a delete targets items that no
/// longer exist on its side.
pub const ERRNO_ALREADY_DELETED: i64 = 231_011;

/// Errors surfaced by a [`CloudClient`](crate::client::CloudClient)
/// implementation.
///
/// `Throttled` and `ReceiveLimitExceeded` are explicit variants because the
/// engine branches on them; a concrete client maps whatever its provider's
/// wire codes are onto these. Everything else carries the raw errno so
/// callers can use the classification predicates below.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// API call rejected with a provider error code
    #[error("provider api error {errno}: {message}")]
    Api { errno: i64, message: String },

    /// The provider signalled a rate-limit violation
    #[error("provider rate limit hit")]
    Throttled,

    /// Receive rejected because the flat item count exceeds the per-call ceiling
    #[error("receive rejected: {count} items exceeds the per-call ceiling")]
    ReceiveLimitExceeded { count: usize },

    /// Transport-level failure
    #[error("network error: {0}")]
    Network(String),

    /// Response could not be interpreted
    #[error("unexpected response: {0}")]
    Parse(String),
}

impl ProviderError {
    /// True when a receive failed because the items were already received.
    pub fn is_duplicate_receive(&self) -> bool {
        matches!(self, ProviderError::Api { errno, .. } if *errno == ERRNO_DUPLICATE_RECEIVE)
    }

    /// True when a delete targeted items already gone on the provider side.
    pub fn is_already_deleted(&self) -> bool {
        matches!(self, ProviderError::Api { errno, .. } if *errno == ERRNO_ALREADY_DELETED)
    }

    /// True when the provider asked us to back off.
    pub fn is_throttled(&self) -> bool {
        matches!(self, ProviderError::Throttled)
    }

    /// True when the flat item count exceeded the per-call receive ceiling.
    pub fn is_receive_limit(&self) -> bool {
        matches!(self, ProviderError::ReceiveLimitExceeded { .. })
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;
