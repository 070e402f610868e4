//! FFI bindings for native UI integration
//!
//! This module provides the interface exposed via uniffi to Swift/Kotlin.
//! Native code owns the actual video players and reaches them through
//! [`PlayerBridge`]; everything else goes through [`Session`].

mod bridge;
mod session;
mod types;

pub use session::*;
pub use types::*;
