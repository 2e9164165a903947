//! stackup-bootstrap — drives a cold stack to a queryable, reachable state.
//!
//! # Phases
//!
//! ```text
//! Sequencer
//!   1. pull images                       (ContainerRuntime)
//!   2. start discovery + database
//!   3. show dashboard endpoints          (EndpointResolver, best effort)
//!   4. DatabaseBootstrapper              (HTTP gate → admin gate → buckets → indexes)
//!   5. ConfigPublisher(app)   → start app
//!   6. ConfigPublisher(proxy) → start proxy → HTTP gate
//!   7. start metrics          → HTTP gate
//! ```
//!
//! Phases run strictly in order on one task. Each gate retries under the
//! configured `RetryPolicy`; the first unrecovered error aborts the run.

pub mod admin;
pub mod database;
pub mod error;
pub mod publisher;
pub mod sequencer;
pub mod store;
pub mod tasks;

pub use admin::{CouchbaseAdmin, DatabaseAdmin, IndexOutcome};
pub use database::{DatabaseBootstrapper, DatabaseReport};
pub use error::{BootstrapError, BootstrapResult};
pub use publisher::ConfigPublisher;
pub use sequencer::{Phase, RunReport, Sequencer, Stack};
pub use store::{ConfigStore, ConsulKv};
