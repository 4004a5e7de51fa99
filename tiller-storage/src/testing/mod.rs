//! Testing utilities for tiller-storage
//!
//! - [`InMemoryDatabase`] - a shared in-memory backend implementing
//!   `SessionProvider`, `StateStore` and `RoleManager`, recording every
//!   statement and identity switch for later inspection
//! - [`StubRestore`] - a restore service with a fixed outcome
//! - mockall mocks of the interface traits
//!
//! ```toml
//! [dev-dependencies]
//! tiller-storage = { path = "../tiller-storage", features = ["testing"] }
//! ```

pub mod memory;
pub mod mocks;

pub use memory::{ExecutedStatement, IdentityEvent, InMemoryDatabase, StubRestore};
pub use mocks::{MockDbSession, MockRestore};
