pub mod channel;
pub mod error;
pub mod registry;
pub mod types;

pub use channel::ChannelPlugin;
pub use error::ChannelError;
pub use registry::ChannelRegistry;
pub use types::{
    CanonicalTarget, Capability, ChannelStatus, ChatType, GroupInfo, InboundAck, MsgContext,
    PeerInfo, ReplyPayload, SendOpts, SendResult,
};
