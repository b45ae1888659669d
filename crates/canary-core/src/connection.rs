use std::{io, sync::Arc};

use tokio::{
	io::{AsyncReadExt, AsyncWriteExt},
	sync::Mutex,
};
use tokio_util::{bytes::Bytes, sync::CancellationToken};

use crate::{AbstractTcpStream, Completion};

/// A bidirectional byte stream whose operations report back through a
/// completion handler instead of returning a future.
///
/// Each handler must be completed at most once; dropping it signals the
/// operation was abandoned.
pub trait Connection: Send + Sync {
	/// Send `content` as one complete message.
	fn send(&self, content: Bytes, done: Completion<io::Result<()>>);

	/// Receive between 1 and `max_len` bytes. `Ok(None)` means the peer closed
	/// the stream.
	fn receive(&self, max_len: usize, done: Completion<io::Result<Option<Bytes>>>);
}

pub type BoxedStream = Box<dyn AbstractTcpStream>;
pub type BoxedConnection = StreamConnection<BoxedStream>;

/// Exposes a tokio stream through the [`Connection`] interface.
///
/// Every operation runs on its own task, so this must be used from within a
/// tokio runtime. Operations still pending when the connection is dropped are
/// cancelled.
pub struct StreamConnection<S> {
	stream: Arc<Mutex<S>>,
	cancel: CancellationToken,
}

impl<S: AbstractTcpStream + 'static> StreamConnection<S> {
	pub fn new(stream: S) -> Self {
		Self {
			stream: Arc::new(Mutex::new(stream)),
			cancel: CancellationToken::new(),
		}
	}
}

impl StreamConnection<BoxedStream> {
	pub fn boxed(stream: impl AbstractTcpStream + 'static) -> Self {
		Self::new(Box::new(stream))
	}
}

impl<S: AbstractTcpStream + 'static> Connection for StreamConnection<S> {
	fn send(&self, content: Bytes, done: Completion<io::Result<()>>) {
		let stream = self.stream.clone();
		let cancel = self.cancel.clone();
		tokio::spawn(async move {
			let res = tokio::select! {
				_ = cancel.cancelled() => Err(io::Error::from(io::ErrorKind::ConnectionAborted)),
				res = write_message(&stream, &content) => res,
			};
			done.complete(res);
		});
	}

	fn receive(&self, max_len: usize, done: Completion<io::Result<Option<Bytes>>>) {
		let stream = self.stream.clone();
		let cancel = self.cancel.clone();
		tokio::spawn(async move {
			let res = tokio::select! {
				_ = cancel.cancelled() => Err(io::Error::from(io::ErrorKind::ConnectionAborted)),
				res = read_chunk(&stream, max_len) => res,
			};
			done.complete(res);
		});
	}
}

async fn write_message<S: AbstractTcpStream>(stream: &Mutex<S>, content: &[u8]) -> io::Result<()> {
	let mut stream = stream.lock().await;
	stream.write_all(content).await?;
	stream.flush().await
}

async fn read_chunk<S: AbstractTcpStream>(stream: &Mutex<S>, max_len: usize) -> io::Result<Option<Bytes>> {
	let mut buf = vec![0u8; max_len];
	let n = stream.lock().await.read(&mut buf).await?;
	if n == 0 {
		return Ok(None);
	}
	buf.truncate(n);
	Ok(Some(Bytes::from(buf)))
}

impl<S> Drop for StreamConnection<S> {
	fn drop(&mut self) {
		self.cancel.cancel();
	}
}
