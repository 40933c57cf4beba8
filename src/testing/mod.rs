//! Testing utilities
//!
//! Mock cloud client and connector usable from unit and integration tests.

pub mod mocks;

pub use mocks::{MockCloud, MockConnector, SearchCall};
