//! Testing utilities and helpers
//!
//! - **[`mocks`]**: in-memory doubles for the token endpoint, presenter and
//!   observer
//!
//! Pair them with [`MockClock`](crate::time::MockClock) and
//! [`MemoryTokenStore`](crate::auth::MemoryTokenStore) to drive a
//! [`PkceFlowController`](crate::auth::PkceFlowController) without a network.

pub mod mocks;

pub use mocks::{MockPresenter, MockTokenEndpoint, RecordingObserver};
