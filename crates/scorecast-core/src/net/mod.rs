pub mod codec;
pub mod events;
pub mod packets;
