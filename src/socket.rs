use crate::{SSDP_PORT, SSDP_V4_IP, SSDP_V6_IP};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV6, UdpSocket};

/// Socket used to send to the SSDP group on one interface and receive unicast search responses.
///
/// Bound to an ephemeral port: responders reply to the port the M-SEARCH came from, and a socket on
/// 1900 would have the kernel share those replies with any other SSDP listener on the machine.
pub(crate) fn new_sender_v4(iface: Ipv4Addr, loopback: bool) -> Result<UdpSocket, std::io::Error> {
	let socket = socket2::Socket::new(socket2::Domain::IPV4, socket2::Type::DGRAM, Some(socket2::Protocol::UDP))?;
	socket.set_reuse_address(true)?;
	socket.set_multicast_loop_v4(loopback)?;

	if !iface.is_unspecified() {
		socket.set_multicast_if_v4(&iface)?;
	}

	socket.bind(&socket2::SockAddr::from(SocketAddr::new(IpAddr::V4(iface), 0)))?;
	socket.set_nonblocking(true)?;

	Ok(socket.into())
}

pub(crate) fn new_sender_v6(iface: Ipv6Addr, index: u32, loopback: bool) -> Result<UdpSocket, std::io::Error> {
	let socket = socket2::Socket::new(socket2::Domain::IPV6, socket2::Type::DGRAM, Some(socket2::Protocol::UDP))?;
	socket.set_reuse_address(true)?;
	socket.set_only_v6(true)?;
	socket.set_multicast_loop_v6(loopback)?;
	socket.set_multicast_if_v6(index)?;

	// Link-local addresses can only be bound with their scope
	let scope_id = if crate::util::is_unicast_link_local_v6(&iface) { index } else { 0 };
	socket.bind(&socket2::SockAddr::from(SocketAddrV6::new(iface, 0, 0, scope_id)))?;
	socket.set_nonblocking(true)?;

	Ok(socket.into())
}

/// Socket bound to the SSDP port and joined to the group, receiving NOTIFY announcements.
///
/// Joins the group on every interface in `ifaces`, or on the OS default interface if that is empty
/// or every join fails.
pub(crate) fn new_listener_v4(ifaces: &[Ipv4Addr], loopback: bool) -> Result<UdpSocket, std::io::Error> {
	let socket = socket2::Socket::new(socket2::Domain::IPV4, socket2::Type::DGRAM, Some(socket2::Protocol::UDP))?;
	socket.set_reuse_address(true)?;
	socket.set_multicast_loop_v4(loopback)?;

	#[cfg(unix)]
	{
		socket.set_reuse_port(true)?;
	}

	let mut did_join = false;
	for iface in ifaces.iter().filter(|iface| !iface.is_unspecified()) {
		match socket.join_multicast_v4(&SSDP_V4_IP, iface) {
			Ok(()) => did_join = true,
			Err(err) => log::warn!("Failed to join {SSDP_V4_IP} on {iface}: {err}"),
		}
	}
	if !did_join {
		// Fallback to default
		socket.join_multicast_v4(&SSDP_V4_IP, &Ipv4Addr::UNSPECIFIED)?;
	}

	socket.bind(&socket2::SockAddr::from(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), SSDP_PORT)))?;
	socket.set_nonblocking(true)?;

	Ok(socket.into())
}

pub(crate) fn new_listener_v6(ifaces: &[u32], loopback: bool) -> Result<UdpSocket, std::io::Error> {
	let socket = socket2::Socket::new(socket2::Domain::IPV6, socket2::Type::DGRAM, Some(socket2::Protocol::UDP))?;
	socket.set_reuse_address(true)?;
	socket.set_only_v6(true)?;
	socket.set_multicast_loop_v6(loopback)?;

	#[cfg(unix)]
	{
		socket.set_reuse_port(true)?;
	}

	let mut did_join = false;
	for iface in ifaces.iter().copied().filter(|iface| *iface != 0) {
		match socket.join_multicast_v6(&SSDP_V6_IP, iface) {
			Ok(()) => did_join = true,
			Err(err) => log::warn!("Failed to join {SSDP_V6_IP} on interface #{iface}: {err}"),
		}
	}
	if !did_join {
		// Fallback to default
		socket.join_multicast_v6(&SSDP_V6_IP, 0)?;
	}

	socket.bind(&socket2::SockAddr::from(SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), SSDP_PORT)))?;
	socket.set_nonblocking(true)?;

	Ok(socket.into())
}
