mod chat_channel;
mod code_sync_channel;

pub use chat_channel::*;
pub use code_sync_channel::*;
