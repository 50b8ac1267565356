pub mod frames;
pub mod handshake;
pub mod methods;

pub use frames::{
    ErrorShape, EventFrame, InboundFrame, PingFrame, PongFrame, RequestFrame, ResponseFrame,
    StateVersion,
};
pub use handshake::{ClientPolicy, HelloOk, HelloParams, PairRequestAck, ServerFeatures, ServerInfo};
pub use methods::{is_authorized, is_known_method, required_scope, Scope};
