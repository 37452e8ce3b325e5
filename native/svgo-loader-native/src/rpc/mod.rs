//! Devtools RPC over a dynamic group of observer channels.
//!
//! Observers (inspection panels) connect one transport channel each. The
//! server calls into them, answers their queries through a capability table
//! and pushes `refresh` events when the asset registry changes.

mod channel;
mod functions;
mod group;
mod protocol;
mod server;

pub use channel::{local_pair, Channel, ChannelId, LocalChannel, ObserverEnd};
pub use functions::{FunctionTable, Resolution, RpcNamespace};
pub use group::ChannelGroup;
pub use protocol::{Envelope, ErrorCode, Frame, FrameCodec, RemoteError};
pub use server::{DevtoolsServer, ServerFunctions};
