use super::{BoundSocket, MulticastTransport};
use crate::{
	errors::TransportBuilderError,
	net::{IpVersion, Ipv6Interface, NetworkInfo, SystemNetwork, TargetInterfaceV4, TargetInterfaceV6},
	router::EventRouter,
	socket,
};
use std::{
	net::{IpAddr, Ipv4Addr, Ipv6Addr},
	sync::Arc,
};

pub struct TransportBuilder {
	interface_v4: TargetInterfaceV4,
	interface_v6: TargetInterfaceV6,
	loopback: bool,
	network: Arc<dyn NetworkInfo>,
	tracing: Option<Option<IpAddr>>,
}
impl TransportBuilder {
	pub fn new() -> Self {
		Self {
			interface_v4: TargetInterfaceV4::All,
			interface_v6: TargetInterfaceV6::All,
			loopback: false,
			network: Arc::new(SystemNetwork),
			tracing: None,
		}
	}

	/// Receive our own multicast traffic.
	pub fn loopback(mut self) -> Self {
		self.loopback = true;
		self
	}

	pub fn interface_v4(mut self, interface: TargetInterfaceV4) -> Self {
		self.interface_v4 = interface;
		self
	}

	pub fn interface_v6(mut self, interface: TargetInterfaceV6) -> Self {
		self.interface_v6 = interface;
		self
	}

	/// Where the local interface addresses come from. Defaults to [`SystemNetwork`].
	pub fn network(mut self, network: Arc<dyn NetworkInfo>) -> Self {
		self.network = network;
		self
	}

	/// Log alive/byebye announcements at debug level, optionally only those received on one local address.
	pub fn tracing(mut self, filter: Option<IpAddr>) -> Self {
		self.tracing = Some(filter);
		self
	}

	pub fn build(self, ip_version: IpVersion) -> Result<MulticastTransport, TransportBuilderError> {
		let TransportBuilder {
			interface_v4,
			interface_v6,
			loopback,
			network,
			tracing,
		} = self;

		let bind_addresses = network.bind_addresses();

		let mut senders = Vec::new();
		let mut listeners = Vec::new();

		if ip_version.includes(&IpAddr::V4(Ipv4Addr::UNSPECIFIED)) {
			let ifaces = Self::select_v4(&interface_v4, &bind_addresses);

			for iface in ifaces.iter().copied() {
				match socket::new_sender_v4(iface, loopback) {
					Ok(socket) => senders.push(BoundSocket {
						local_ip: IpAddr::V4(iface),
						socket,
					}),
					Err(err) => log::warn!("Failed to bind SSDP socket on {iface}: {err}"),
				}
			}

			match socket::new_listener_v4(&ifaces, loopback) {
				Ok(socket) => listeners.push(BoundSocket {
					local_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
					socket,
				}),
				Err(err) => log::warn!("Failed to listen for IPv4 SSDP announcements, only search responses will be received: {err}"),
			}
		}

		if ip_version.includes(&IpAddr::V6(Ipv6Addr::UNSPECIFIED)) {
			let ifaces = Self::select_v6(&interface_v6, &bind_addresses);

			for (iface, index) in ifaces.iter().copied() {
				match socket::new_sender_v6(iface, index, loopback) {
					Ok(socket) => senders.push(BoundSocket {
						local_ip: IpAddr::V6(iface),
						socket,
					}),
					Err(err) => log::warn!("Failed to bind SSDP socket on {iface}: {err}"),
				}
			}

			let indexes = ifaces.iter().map(|(_, index)| *index).collect::<Vec<_>>();
			match socket::new_listener_v6(&indexes, loopback) {
				Ok(socket) => listeners.push(BoundSocket {
					local_ip: IpAddr::V6(Ipv6Addr::UNSPECIFIED),
					socket,
				}),
				Err(err) => log::warn!("Failed to listen for IPv6 SSDP announcements, only search responses will be received: {err}"),
			}
		}

		if senders.is_empty() && listeners.is_empty() {
			return Err(TransportBuilderError::NoBindableInterface);
		}

		log::debug!(
			"SSDP transport bound on {:?}",
			senders.iter().map(|sender| sender.local_ip).collect::<Vec<_>>()
		);

		Ok(MulticastTransport {
			senders,
			listeners,
			router: EventRouter::new(),
			network,
			tracing,
		})
	}

	fn select_v4(interface: &TargetInterfaceV4, bind_addresses: &[IpAddr]) -> Vec<Ipv4Addr> {
		let ifaces = match interface {
			TargetInterfaceV4::Default => Vec::new(),
			TargetInterfaceV4::Specific(iface) => vec![*iface],
			TargetInterfaceV4::Multi(ifaces) => ifaces.iter().copied().collect(),
			TargetInterfaceV4::All => bind_addresses
				.iter()
				.filter_map(|addr| match addr {
					IpAddr::V4(addr) => Some(*addr),
					IpAddr::V6(_) => None,
				})
				.collect(),
		};

		if ifaces.is_empty() {
			// Fallback to default
			vec![Ipv4Addr::UNSPECIFIED]
		} else {
			ifaces
		}
	}

	fn select_v6(interface: &TargetInterfaceV6, bind_addresses: &[IpAddr]) -> Vec<(Ipv6Addr, u32)> {
		let ifaces = match interface {
			TargetInterfaceV6::Default => Vec::new(),
			_ => bind_addresses
				.iter()
				.filter_map(|addr| match addr {
					IpAddr::V6(addr) => Some((*addr, Ipv6Interface::from_addr(addr).ok()?)),
					IpAddr::V4(_) => None,
				})
				.filter(|(_, iface)| interface.selects(iface))
				.map(|(addr, iface)| (addr, iface.as_u32()))
				.collect(),
		};

		if ifaces.is_empty() {
			// Fallback to default
			vec![(Ipv6Addr::UNSPECIFIED, 0)]
		} else {
			ifaces
		}
	}
}
impl Default for TransportBuilder {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn v4_interface_selection() {
		let bind_addresses = vec![
			IpAddr::V4(Ipv4Addr::new(192, 168, 1, 2)),
			IpAddr::V6(Ipv6Addr::LOCALHOST),
			IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
		];

		assert_eq!(
			TransportBuilder::select_v4(&TargetInterfaceV4::All, &bind_addresses),
			vec![Ipv4Addr::new(192, 168, 1, 2), Ipv4Addr::new(10, 0, 0, 2)]
		);
		assert_eq!(
			TransportBuilder::select_v4(&TargetInterfaceV4::Specific(Ipv4Addr::new(10, 0, 0, 2)), &bind_addresses),
			vec![Ipv4Addr::new(10, 0, 0, 2)]
		);
		assert_eq!(TransportBuilder::select_v4(&TargetInterfaceV4::Default, &bind_addresses), vec![Ipv4Addr::UNSPECIFIED]);
		assert_eq!(TransportBuilder::select_v4(&TargetInterfaceV4::All, &[]), vec![Ipv4Addr::UNSPECIFIED]);
	}

	#[test]
	fn v6_default_interface() {
		assert_eq!(TransportBuilder::select_v6(&TargetInterfaceV6::Default, &[]), vec![(Ipv6Addr::UNSPECIFIED, 0)]);
	}
}
