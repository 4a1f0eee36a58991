mod feedback_store;
mod session_directory;
mod session_service;

pub use feedback_store::*;
pub use session_directory::*;
pub use session_service::*;
