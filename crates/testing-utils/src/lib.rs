//! # Task Cache Testing Utils
//!
//! Shared test doubles for the task cache workspace.
//!
//! - **MockTaskRepository**: in-memory backing store with call counters and
//!   failure switches
//! - **FaultInjectingCacheStore**: wraps any hash cache store and fails the
//!   commands a test selects
//! - **Test containers**: PostgreSQL and Redis containers for ignored
//!   integration tests
//!
//! ```toml
//! [dev-dependencies]
//! taskcache-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod containers;
pub mod mocks;

pub use builders::*;
pub use containers::*;
pub use mocks::*;
