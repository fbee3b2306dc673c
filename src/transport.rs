//! Sending and receiving SSDP datagrams

use crate::{
	errors::TransportError,
	message::SsdpMessage,
	net::NetworkInfo,
	router::{EventRouter, SsdpEventMessage},
	SSDP_PORT, SSDP_V4_IP, SSDP_V6_IP,
};
use std::{
	net::{IpAddr, SocketAddr, SocketAddrV4, SocketAddrV6, UdpSocket},
	sync::Arc,
	time::Duration,
};
use tokio::net::UdpSocket as AsyncUdpSocket;

mod builder;
pub use builder::TransportBuilder;

mod handle;
pub use handle::TransportHandle;
use handle::*;

/// Something that can put SSDP messages on the network and deliver inbound ones to an [`EventRouter`].
///
/// Sends never block on the network: a datagram that cannot be sent right away is dropped and the
/// failure logged, as SSDP peers retransmit.
pub trait SsdpTransport: Send + Sync + 'static {
	/// Sends the message to the SSDP multicast group on every bound interface.
	///
	/// Returns the number of interfaces the message was sent on. Failures on individual interfaces
	/// are logged and skipped; an error is only returned if no interface could send.
	fn send_multicast(&self, message: &SsdpMessage) -> Result<usize, TransportError>;

	/// Sends the message directly to `destination`.
	fn send_unicast(&self, message: &SsdpMessage, destination: SocketAddr) -> Result<(), TransportError>;

	/// The router inbound messages are dispatched through.
	fn router(&self) -> &EventRouter;

	/// Whether alive/byebye traffic received on `local_addr` should be traced in the logs.
	fn is_tracing(&self, _local_addr: &IpAddr) -> bool {
		false
	}
}

pub(crate) struct BoundSocket {
	pub(crate) local_ip: IpAddr,
	pub(crate) socket: UdpSocket,
}

/// An [`SsdpTransport`] over real UDP sockets, one per local interface.
///
/// Built with a [`TransportBuilder`]. Nothing is received until [`run_in_background`](MulticastTransport::run_in_background)
/// is called; sending works regardless.
pub struct MulticastTransport {
	senders: Vec<BoundSocket>,
	listeners: Vec<BoundSocket>,
	router: EventRouter,
	network: Arc<dyn NetworkInfo>,
	tracing: Option<Option<IpAddr>>,
}
impl MulticastTransport {
	/// Local addresses of the interfaces this transport sends on.
	pub fn local_addresses(&self) -> Vec<IpAddr> {
		self.senders.iter().map(|sender| sender.local_ip).collect()
	}

	/// The network capability this transport was built with.
	pub fn network(&self) -> &Arc<dyn NetworkInfo> {
		&self.network
	}

	fn parse(datagram: &[u8], from: SocketAddr, local_addr: IpAddr) -> Option<SsdpEventMessage> {
		match SsdpMessage::parse(datagram) {
			Ok(message) => Some(SsdpEventMessage { message, from, local_addr }),
			Err(err) => {
				log::trace!("Dropping datagram from {from}: {err}");
				None
			}
		}
	}

	/// Parses a datagram and dispatches it through the router.
	///
	/// Returns the number of handlers invoked. Unparseable datagrams are dropped.
	pub fn receive(&self, datagram: &[u8], from: SocketAddr, local_addr: IpAddr) -> usize {
		match Self::parse(datagram, from, local_addr) {
			Some(event) => self.router.dispatch(&event),
			None => 0,
		}
	}

	/// Starts receiving on every bound socket in a background thread.
	///
	/// Handlers are invoked one message at a time, in order of arrival, on a blocking worker thread,
	/// so a slow handler delays later messages but never stops the sockets from being read.
	pub fn run_in_background(self: &Arc<Self>) -> Result<TransportHandle, std::io::Error> {
		let sockets = self
			.senders
			.iter()
			.chain(self.listeners.iter())
			.map(|bound| Ok((bound.socket.try_clone()?, bound.local_ip)))
			.collect::<Result<Vec<_>, std::io::Error>>()?;

		let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

		let transport = self.clone();
		let thread = std::thread::Builder::new().name("ssdplight Transport".to_owned()).spawn(move || {
			tokio::runtime::Builder::new_current_thread()
				.thread_name("ssdplight Transport (Tokio)")
				.enable_all()
				.build()?
				.block_on(transport.impl_run(sockets, shutdown_rx))
		})?;

		Ok(TransportHandle(TransportHandleDrop(Some(TransportHandleInner { thread, shutdown_tx }))))
	}

	async fn impl_run(self: Arc<Self>, sockets: Vec<(UdpSocket, IpAddr)>, shutdown_rx: tokio::sync::oneshot::Receiver<()>) -> Result<(), std::io::Error> {
		let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel::<SsdpEventMessage>();

		let mut tasks = tokio::task::JoinSet::new();
		for (socket, local_ip) in sockets {
			tasks.spawn(recv_loop(AsyncUdpSocket::from_std(socket)?, local_ip, event_tx.clone()));
		}
		drop(event_tx);

		let transport = self;
		let dispatcher = tokio::task::spawn_blocking(move || {
			while let Some(event) = event_rx.blocking_recv() {
				transport.router.dispatch(&event);
			}
		});

		shutdown_rx.await.ok();
		tasks.shutdown().await;

		// Every sender is gone with the receive loops, so the dispatcher drains and exits
		if dispatcher.await.is_err() {
			log::error!("SSDP dispatcher thread panicked");
		}

		Ok(())
	}
}

async fn recv_loop(socket: AsyncUdpSocket, local_ip: IpAddr, event_tx: tokio::sync::mpsc::UnboundedSender<SsdpEventMessage>) {
	let mut buf = vec![0; 8192];
	loop {
		match socket.recv_from(&mut buf).await {
			Ok((0, _)) => continue,
			Ok((count, from)) => {
				if let Some(event) = MulticastTransport::parse(&buf[..count], from, local_ip) {
					if event_tx.send(event).is_err() {
						break;
					}
				}
			}
			Err(err) => {
				log::debug!("SSDP receive error on {local_ip}: {err}");
				tokio::time::sleep(Duration::from_millis(100)).await;
			}
		}
	}
}
impl SsdpTransport for MulticastTransport {
	fn send_multicast(&self, message: &SsdpMessage) -> Result<usize, TransportError> {
		let mut packet_v4 = None;
		let mut packet_v6 = None;

		let mut sent = 0;
		for sender in self.senders.iter() {
			let (group, packet) = match sender.local_ip {
				IpAddr::V4(_) => (
					SocketAddr::V4(SocketAddrV4::new(SSDP_V4_IP, SSDP_PORT)),
					packet_v4.get_or_insert_with(|| with_host(message, &format!("{SSDP_V4_IP}:{SSDP_PORT}"))),
				),
				IpAddr::V6(_) => (
					SocketAddr::V6(SocketAddrV6::new(SSDP_V6_IP, SSDP_PORT, 0, 0)),
					packet_v6.get_or_insert_with(|| with_host(message, &format!("[{SSDP_V6_IP}]:{SSDP_PORT}"))),
				),
			};

			match sender.socket.send_to(packet, group) {
				Ok(_) => sent += 1,
				Err(err) => log::warn!("Failed to send {:?} to {group} on {}: {err}", message.start_line(), sender.local_ip),
			}
		}

		if sent == 0 {
			Err(TransportError::NoInterfaceSent)
		} else {
			Ok(sent)
		}
	}

	fn send_unicast(&self, message: &SsdpMessage, destination: SocketAddr) -> Result<(), TransportError> {
		let sender = self
			.senders
			.iter()
			.find(|sender| sender.local_ip.is_ipv4() == destination.is_ipv4())
			.ok_or(TransportError::NoSocketForFamily(destination))?;

		sender.socket.send_to(&message.to_bytes(), destination)?;
		Ok(())
	}

	#[inline]
	fn router(&self) -> &EventRouter {
		&self.router
	}

	fn is_tracing(&self, local_addr: &IpAddr) -> bool {
		match self.tracing {
			None => false,
			Some(None) => true,
			Some(Some(filter)) => filter == *local_addr,
		}
	}
}

/// Encodes the message with a `HOST` header for the group it is being sent to, unless it already has one.
fn with_host(message: &SsdpMessage, host: &str) -> Vec<u8> {
	if message.headers().contains("HOST") {
		return message.to_bytes();
	}

	let mut hosted = SsdpMessage::new(message.start_line()).with_header("HOST", host);
	for (name, value) in message.headers().iter() {
		hosted.headers_mut().insert(name, value);
	}
	hosted.to_bytes()
}
