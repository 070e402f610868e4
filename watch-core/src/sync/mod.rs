//! Room State
//!
//! Wire protocol, the room state store and the pure rules evaluated over it.

mod matcher;
mod protocol;
mod readiness;
mod state;
mod video_url;

pub use matcher::*;
pub use protocol::*;
pub use readiness::*;
pub use state::*;
pub use video_url::*;
