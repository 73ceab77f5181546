//! Shared types for the Dormant page suspension engine.

mod page;
mod protocol;
mod record;
mod settings;

pub use page::*;
pub use protocol::*;
pub use record::*;
pub use settings::*;
