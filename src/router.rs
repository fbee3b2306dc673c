//! Dispatch of inbound SSDP messages to subscribers

use crate::message::SsdpMessage;
use std::{
	collections::HashMap,
	net::{IpAddr, SocketAddr},
	ops::Deref,
	panic::AssertUnwindSafe,
	sync::{
		atomic::{AtomicU64, Ordering},
		Arc, Mutex, PoisonError,
	},
};

/// A subscriber to inbound messages.
pub type Handler = Arc<dyn Fn(&SsdpEventMessage) + Send + Sync + 'static>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// Identifies a handler registered with an [`EventRouter`], for later removal.
pub struct HandlerId(u64);

#[derive(Clone, Debug)]
/// An inbound message, along with where it came from and which local interface received it.
pub struct SsdpEventMessage {
	pub message: SsdpMessage,

	/// The sender of the datagram.
	pub from: SocketAddr,

	/// The local address of the interface the datagram arrived on.
	///
	/// This is unspecified for datagrams received by a listener bound to every interface.
	pub local_addr: IpAddr,
}
impl Deref for SsdpEventMessage {
	type Target = SsdpMessage;

	#[inline(always)]
	fn deref(&self) -> &Self::Target {
		&self.message
	}
}

#[derive(Default)]
/// Maps message start lines (see [`SsdpMessage::route_key`]) to the handlers subscribed to them.
///
/// Dispatch runs over a snapshot of the handler list taken under the lock, so handlers are free to
/// add or remove handlers, including themselves, while being invoked.
pub struct EventRouter {
	handlers: Mutex<HashMap<String, Vec<(HandlerId, Handler)>>>,
	next_id: AtomicU64,
}
impl EventRouter {
	pub fn new() -> Self {
		Self::default()
	}

	fn handlers(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<(HandlerId, Handler)>>> {
		// Handlers never run under this lock, so poisoning can't leave the map half-updated
		self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Subscribes `handler` to messages whose route key equals `key`, e.g. `"HTTP/1.1 200 OK"` or `"NOTIFY"`.
	pub fn add_handler<F>(&self, key: impl Into<String>, handler: F) -> HandlerId
	where
		F: Fn(&SsdpEventMessage) + Send + Sync + 'static,
	{
		let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
		self.handlers().entry(key.into()).or_default().push((id, Arc::new(handler)));
		id
	}

	/// Unsubscribes a handler. Returns `false` if it was not subscribed to `key`.
	pub fn remove_handler(&self, key: &str, id: HandlerId) -> bool {
		let mut handlers = self.handlers();

		let Some(subscribed) = handlers.get_mut(key) else {
			return false;
		};

		let len = subscribed.len();
		subscribed.retain(|(handler_id, _)| *handler_id != id);
		let removed = subscribed.len() != len;

		if subscribed.is_empty() {
			handlers.remove(key);
		}

		removed
	}

	pub fn handler_count(&self, key: &str) -> usize {
		self.handlers().get(key).map(Vec::len).unwrap_or(0)
	}

	/// Invokes every handler subscribed to the message's route key, returning how many were invoked.
	///
	/// A panicking handler is logged and does not prevent delivery to the others.
	pub fn dispatch(&self, event: &SsdpEventMessage) -> usize {
		let snapshot: Vec<Handler> = match self.handlers().get(event.route_key()) {
			Some(subscribed) => subscribed.iter().map(|(_, handler)| handler.clone()).collect(),
			None => return 0,
		};

		for handler in snapshot.iter() {
			if let Err(panic) = std::panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
				let reason = panic
					.downcast_ref::<&str>()
					.copied()
					.or_else(|| panic.downcast_ref::<String>().map(String::as_str))
					.unwrap_or("unknown panic");

				log::error!("SSDP handler for {:?} from {} panicked: {reason}", event.route_key(), event.from);
			}
		}

		snapshot.len()
	}
}
