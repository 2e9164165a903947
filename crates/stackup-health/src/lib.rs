//! stackup-health — readiness gates for the bootstrap sequence.
//!
//! Provides a minimal HTTP/1 client, the `Probe` abstraction, and the
//! `ReadinessPoller` that blocks a phase until a dependency answers.
//!
//! # Architecture
//!
//! ```text
//! ReadinessPoller (RetryPolicy)
//!   ├── PollTracker (attempt count, last result, next delay)
//!   └── Probe::check() → ProbeResult
//!         ├── HttpProbe: GET <path>, 2xx = ready
//!         └── callers' own probes (admin no-op, config-store write)
//! ```
//!
//! Every non-ready result (connection refused, 5xx, timeout) is retried.
//! When the policy's attempt budget runs out the poller returns
//! `ReadinessError::NeverReady` rather than hanging.

pub mod checker;
pub mod client;
pub mod error;
pub mod poller;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use checker::{HttpProbe, PollTracker, Probe, ProbeResult};
pub use client::{HttpRequest, HttpResponse, send};
pub use error::{HttpError, ReadinessError};
pub use poller::ReadinessPoller;
