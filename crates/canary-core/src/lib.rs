pub mod bridge;
pub mod connection;
mod connector;
pub mod log;
pub mod running_log;
pub mod types;

pub use bridge::{BridgeError, Completion, SyncBridge};
pub use connection::{BoxedConnection, BoxedStream, Connection, StreamConnection};
pub use connector::*;
pub use running_log::{BatchGuard, BatchInProgress, RunningLog};
use tokio::io::{AsyncRead, AsyncWrite};
pub use tokio_util::bytes::Bytes;

pub trait AbstractTcpStream: AsyncRead + AsyncWrite + Send + Sync + Unpin {}

impl<T> AbstractTcpStream for T where T: AsyncRead + AsyncWrite + Send + Sync + Unpin {}

#[doc(hidden)]
pub mod __private {
	pub use const_str;
	pub use tracing;
}
