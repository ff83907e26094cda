//! Data carried between the stores and their remote collaborators.

pub mod api;
pub mod project;
pub mod session;

pub use api::*;
pub use project::*;
pub use session::*;
