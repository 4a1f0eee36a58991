pub mod error;
pub mod model;
pub mod utils;

pub use error::{DenyReason, DuetError};
pub use model::*;
