pub mod journal;
pub mod mock_api;
pub mod mock_transport;

pub use fixtures::*;
pub use journal::*;
pub use mock_api::*;
pub use mock_media::*;
pub use mock_transport::*;
pub use recording_sink::*;
