//! Response and error types exchanged with the HTTP collaborator.
//!
//! The GitHub client itself lives outside this crate. It only has to hand
//! back an [`ApiResponse`] on success or an [`ApiError`] carrying an explicit
//! [`ErrorKind`]; the scheduler never inspects error text to decide whether
//! to retry.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::serde::ResourceClass;

/// Header carrying the window size.
pub const HEADER_LIMIT: &str = "x-ratelimit-limit";
/// Header carrying the requests left in the window.
pub const HEADER_REMAINING: &str = "x-ratelimit-remaining";
/// Header carrying the window reset as epoch seconds.
pub const HEADER_RESET: &str = "x-ratelimit-reset";
/// Header naming the resource class the other values belong to.
pub const HEADER_RESOURCE: &str = "x-ratelimit-resource";

/// Classification of a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Throttled by the server (primary or secondary/abuse limit).
    RateLimited,
    /// Network-level or server-side failure expected to clear on its own.
    TransientOther,
    /// Anything else. Never retried.
    Permanent,
}

impl ErrorKind {
    /// Classify an HTTP status code.
    ///
    /// GitHub answers both exhausted quotas and abuse detection with 403, and
    /// newer endpoints with 429.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            403 | 429 => Self::RateLimited,
            408 | 500..=599 => Self::TransientOther,
            _ => Self::Permanent,
        }
    }

    /// Whether the retry policy applies.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::RateLimited | Self::TransientOther)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RateLimited => "rate limited",
            Self::TransientOther => "transient",
            Self::Permanent => "permanent",
        })
    }
}

/// Rate-limit metadata observed on a response.
///
/// Any field may be missing; the tracker keeps its previous value for
/// fields the server did not send.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitInfo {
    /// Requests allowed per window.
    pub limit: Option<u64>,
    /// Requests left in the current window.
    pub remaining: Option<u64>,
    /// Window reset, epoch seconds.
    pub reset_at: Option<u64>,
    /// Class the server charged, when it said so.
    pub resource: Option<ResourceClass>,
}

impl RateLimitInfo {
    /// Fully populated metadata.
    #[must_use]
    pub const fn new(limit: u64, remaining: u64, reset_at: Option<u64>) -> Self {
        Self {
            limit: Some(limit),
            remaining: Some(remaining),
            reset_at,
            resource: None,
        }
    }

    /// Name the class these values belong to.
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<ResourceClass>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Parse `x-ratelimit-*` headers from `(name, value)` pairs.
    ///
    /// Names match case-insensitively. Unparseable values are ignored and a
    /// reset of `0` counts as unknown. Returns `None` when no quota value was
    /// found; a lone `x-ratelimit-resource` is not enough.
    pub fn from_headers<I, K, V>(headers: I) -> Option<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut info = Self::default();
        for (name, value) in headers {
            let name = name.as_ref();
            let value = value.as_ref().trim();
            if name.eq_ignore_ascii_case(HEADER_RESOURCE) {
                if !value.is_empty() {
                    info.resource = Some(ResourceClass::new(value.to_ascii_lowercase()));
                }
                continue;
            }
            let Ok(parsed) = value.parse::<u64>() else {
                continue;
            };
            if name.eq_ignore_ascii_case(HEADER_LIMIT) {
                info.limit = Some(parsed);
            } else if name.eq_ignore_ascii_case(HEADER_REMAINING) {
                info.remaining = Some(parsed);
            } else if name.eq_ignore_ascii_case(HEADER_RESET) && parsed > 0 {
                info.reset_at = Some(parsed);
            }
        }
        (!info.is_empty()).then_some(info)
    }

    /// True when no quota value is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.limit.is_none() && self.remaining.is_none() && self.reset_at.is_none()
    }
}

/// Successful collaborator response.
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    /// HTTP status code.
    pub status: u16,
    /// Decoded body.
    pub value: T,
    /// Rate-limit metadata, if the response carried any.
    pub rate_limit: Option<RateLimitInfo>,
}

impl<T> ApiResponse<T> {
    /// A `200 OK` response without rate-limit metadata.
    pub fn ok(value: T) -> Self {
        Self {
            status: 200,
            value,
            rate_limit: None,
        }
    }

    /// Attach rate-limit metadata.
    #[must_use]
    pub fn with_rate_limit(mut self, info: RateLimitInfo) -> Self {
        self.rate_limit = Some(info);
        self
    }

    /// Override the status code.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }
}

/// Failed collaborator call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} error: {message}")]
pub struct ApiError {
    /// Retry classification.
    pub kind: ErrorKind,
    /// HTTP status, when the failure came from a response.
    pub status: Option<u16>,
    /// Human-readable description.
    pub message: String,
    /// Rate-limit metadata carried by the failing response.
    pub rate_limit: Option<RateLimitInfo>,
}

impl ApiError {
    /// Build an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
            rate_limit: None,
        }
    }

    /// A rate-limit rejection.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimited, message)
    }

    /// A retryable network or server failure.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TransientOther, message)
    }

    /// A failure that must not be retried.
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permanent, message)
    }

    /// Build from an HTTP status, classified with [`ErrorKind::from_status`].
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::from_status(status), message).with_status(status)
    }

    /// Record the HTTP status.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Attach rate-limit metadata from the failing response.
    #[must_use]
    pub fn with_rate_limit(mut self, info: RateLimitInfo) -> Self {
        self.rate_limit = Some(info);
        self
    }

    /// Whether the retry policy applies.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}
