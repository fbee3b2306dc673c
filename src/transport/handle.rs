use crate::errors::ShutdownError;

pub(super) struct TransportHandleInner {
	pub(super) thread: std::thread::JoinHandle<Result<(), std::io::Error>>,
	pub(super) shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

pub(super) struct TransportHandleDrop(pub(super) Option<TransportHandleInner>);
impl TransportHandleDrop {
	fn shutdown(&mut self) -> Result<(), ShutdownError> {
		let TransportHandleInner { thread, shutdown_tx } = match self.0.take() {
			Some(inner) => inner,
			None => return Ok(()),
		};

		if !thread.is_finished() {
			shutdown_tx.send(()).ok();
		}

		match thread.join() {
			Ok(Ok(_)) => Ok(()),
			Ok(Err(err)) => Err(ShutdownError::IoError(err)),
			Err(err) => Err(ShutdownError::ThreadJoinError(err)),
		}
	}
}
impl Drop for TransportHandleDrop {
	fn drop(&mut self) {
		if let Err(err) = self.shutdown() {
			log::error!("SSDP transport did not shut down cleanly: {err}");
		}
	}
}

/// Keeps the transport's receive thread alive. Dropping the handle shuts it down.
pub struct TransportHandle(pub(super) TransportHandleDrop);
impl TransportHandle {
	/// Stops receiving and waits for the receive thread to exit.
	pub fn shutdown(mut self) -> Result<(), ShutdownError> {
		self.0.shutdown()
	}
}
