//! Wire protocol and server: frame codec, readiness handshake, request
//! dispatch and the TCP accept loop.

pub mod codec;
pub mod dispatch;
pub mod handlers;
pub mod handshake;
pub mod server;
