pub mod broadcast;
pub mod connection;
pub mod dispatch;
pub mod handshake;
