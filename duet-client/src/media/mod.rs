mod local_media;
mod media_source;
mod media_track;

pub use local_media::*;
pub use media_source::*;
pub use media_track::*;
