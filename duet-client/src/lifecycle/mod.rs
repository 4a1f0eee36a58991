mod join_window;
mod lifecycle_controller;
mod session_api;
mod session_clock;

pub use join_window::*;
pub use lifecycle_controller::*;
pub use session_api::*;
pub use session_clock::*;
