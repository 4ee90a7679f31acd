//! Remote store abstraction.
//!
//! The habit store talks to persistence only through [`RemoteStore`]:
//! - REST backend over the hosted project API
//! - In-memory mock for tests and offline runs

pub mod mock;
pub mod rest;
pub mod traits;

pub use mock::{MockRemote, RemoteOp};
pub use rest::RestRemote;
pub use traits::RemoteStore;
