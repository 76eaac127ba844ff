//! Push channel: transport, frame decoding and delivery to the stores.

mod adapter;
pub mod memory;
pub mod messages;
mod transport;

pub use adapter::{DeliveryGate, PushChannel};
pub use memory::MemoryConnector;
pub use messages::{decode_frame, msg_types, InboundFrame, PushFrame};
pub use transport::{ChannelError, FrameSource, PushConnector, WebSocketConnector};
