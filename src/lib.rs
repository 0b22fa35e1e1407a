//! # GitHub Throttle
//!
//! Quota-aware request scheduling for rate-limited GitHub API access.
//!
//! GitHub meters each API surface (`core`, `search`, `graphql`) separately and
//! reports the remaining budget in `x-ratelimit-*` headers on every response.
//! This library keeps the last reported budget per surface, queues calls so
//! they start in submission order, sleeps until the window resets when a
//! budget is spent, and retries rate-limit and transient failures with
//! exponential backoff.
//!
//! ## Key Features
//!
//! - **Quota Tracking**: Per-class limit, remaining, and reset instant, fed from
//!   response and error metadata
//! - **Per-Class Lanes**: One FIFO consumer per resource class, so an exhausted
//!   `search` budget never stalls `core` calls
//! - **Backoff**: `min(base * 2^n, max)` plus proportional jitter, shared by the
//!   queued and blocking call shapes
//! - **Response Cache**: Short-lived memo with lazy expiry and a force-refresh
//!   bypass
//!
//! ## Usage
//!
//! ```rust,ignore
//! use github_throttle::builders::build_scheduler;
//! use github_throttle::config::ThrottleConfig;
//! use github_throttle::runtime::TokioSpawner;
//! use github_throttle::util::system_clock;
//!
//! let scheduler = build_scheduler(
//!     &ThrottleConfig::default(),
//!     system_clock(),
//!     TokioSpawner::current(),
//!     None,
//! )?;
//!
//! // `client.get_repo` returns `Result<ApiResponse<Repo>, ApiError>`, with the
//! // response headers parsed through `RateLimitInfo::from_headers`.
//! let handle = scheduler.submit("core", move || {
//!     let client = client.clone();
//!     async move { client.get_repo("octo", "app").await }
//! })?;
//! let repo: Repo = handle.wait().await?;
//! println!("{}", scheduler.format_status());
//! ```
//!
//! For complete examples, see `tests/scheduler_test.rs`.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Quota tracking, backoff, caching, and the request scheduler.
pub mod core;
/// Configuration models for retries, quotas, caching, and queueing.
pub mod config;
/// Builders to construct scheduler components from configuration.
pub mod builders;
/// Infrastructure adapters for operation queues.
pub mod infra;
/// Runtime adapters and status API surface.
pub mod runtime;
/// Shared utilities.
pub mod util;
