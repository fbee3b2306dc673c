//! Networking utilities and abstractions

use crate::util::{is_unicast_link_local_v6, is_unique_local_v6};
use std::{
	collections::BTreeSet,
	net::{IpAddr, Ipv4Addr, Ipv6Addr},
	num::NonZeroU32,
};

/// The [`if_addrs`](https://crates.io/crates/if_addrs) crate is used to discover network interfaces on the system.
///
/// Here is a re-export for your convenience.
pub use if_addrs;

#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// A wrapper around a raw IPv6 interface index.
///
/// With IPv6, interfaces are identified by their index, which is a number that is
/// guaranteed to be unique for the lifetime of the system.
pub struct Ipv6Interface(pub NonZeroU32);
impl Ipv6Interface {
	/// Attempts to resolve the interface index from the given interface name.
	pub fn from_name(name: &str) -> Result<Self, std::io::Error> {
		Ok(Self(crate::util::iface_v6_name_to_index(name)?))
	}

	/// Attempts to resolve the interface index from the given interface address.
	pub fn from_addr(addr: &Ipv6Addr) -> Result<Self, std::io::Error> {
		if_addrs::get_if_addrs()?
			.into_iter()
			.find_map(|iface| match iface.ip() {
				IpAddr::V6(iface_addr) if iface_addr == *addr => Self::from_name(&iface.name).ok(),
				_ => None,
			})
			.ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "Interface not found"))
	}

	#[inline(always)]
	/// Creates a new `Ipv6Interface` from the given raw interface index.
	pub fn from_raw(raw: NonZeroU32) -> Self {
		Self(raw)
	}

	#[inline(always)]
	/// Returns the raw interface index.
	///
	/// This will always be a non-zero value.
	pub fn as_u32(&self) -> u32 {
		self.0.get()
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// The version of IP to use.
pub enum IpVersion {
	/// Use IPv4.
	V4,

	/// Use IPv6.
	V6,

	/// Use both IPv4 and IPv6.
	Both,
}
impl IpVersion {
	#[inline]
	pub fn includes(&self, addr: &IpAddr) -> bool {
		matches!((self, addr), (Self::Both, _) | (Self::V4, IpAddr::V4(_)) | (Self::V6, IpAddr::V6(_)))
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// The interface to use for multicast.
pub enum TargetInterface<Addr> {
	/// Let the OS decide which interface to use.
	Default,

	/// Use as many interfaces as possible, falling back to `Default` if none are available.
	All,

	/// Use the given interface.
	Specific(Addr),

	/// Use the given interfaces.
	Multi(BTreeSet<Addr>),
}
impl<Addr: Ord> TargetInterface<Addr> {
	/// Whether an interface is selected by this target.
	///
	/// `Default` selects nothing explicitly; the OS picks the interface.
	pub fn selects(&self, addr: &Addr) -> bool {
		match self {
			Self::Default => false,
			Self::All => true,
			Self::Specific(specific) => specific == addr,
			Self::Multi(addrs) => addrs.contains(addr),
		}
	}
}

/// A `TargetInterface` for IPv4.
pub type TargetInterfaceV4 = TargetInterface<Ipv4Addr>;

/// A `TargetInterface` for IPv6.
pub type TargetInterfaceV6 = TargetInterface<Ipv6Interface>;

/// The network layer as seen by the SSDP transport and its owners.
pub trait NetworkInfo: Send + Sync + 'static {
	/// Local unicast addresses that SSDP sockets should be bound to.
	fn bind_addresses(&self) -> Vec<IpAddr>;

	/// Whether the address belongs to the local network.
	fn is_in_local_network(&self, addr: &IpAddr) -> bool;
}

#[derive(Clone, Copy, Debug, Default)]
/// [`NetworkInfo`] backed by the interfaces of this machine, enumerated with [`if_addrs`].
pub struct SystemNetwork;
impl SystemNetwork {
	fn interfaces() -> Vec<if_addrs::Interface> {
		match if_addrs::get_if_addrs() {
			Ok(ifaces) => ifaces,
			Err(err) => {
				log::warn!("Failed to enumerate network interfaces: {err}");
				Vec::new()
			}
		}
	}
}
impl NetworkInfo for SystemNetwork {
	fn bind_addresses(&self) -> Vec<IpAddr> {
		Self::interfaces()
			.into_iter()
			.filter(|iface| !iface.is_loopback())
			.map(|iface| iface.ip())
			.collect::<BTreeSet<_>>()
			.into_iter()
			.collect()
	}

	fn is_in_local_network(&self, addr: &IpAddr) -> bool {
		is_private_address(addr)
			|| Self::interfaces()
				.iter()
				.any(|iface| in_subnet(addr, &iface.addr))
	}
}

/// Loopback, RFC 1918, RFC 3927 link-local, RFC 4193 unique-local and `fe80::/10` addresses.
pub fn is_private_address(addr: &IpAddr) -> bool {
	match addr {
		IpAddr::V4(addr) => addr.is_loopback() || addr.is_private() || addr.is_link_local(),
		IpAddr::V6(addr) => match addr.to_ipv4_mapped() {
			Some(mapped) => is_private_address(&IpAddr::V4(mapped)),
			None => addr.is_loopback() || is_unique_local_v6(addr) || is_unicast_link_local_v6(addr),
		},
	}
}

fn in_subnet(addr: &IpAddr, iface: &if_addrs::IfAddr) -> bool {
	match (addr, iface) {
		(IpAddr::V4(addr), if_addrs::IfAddr::V4(iface)) => {
			let mask = u32::from(iface.netmask);
			mask != 0 && u32::from(*addr) & mask == u32::from(iface.ip) & mask
		}
		(IpAddr::V6(addr), if_addrs::IfAddr::V6(iface)) => {
			let mask = u128::from(iface.netmask);
			mask != 0 && u128::from(*addr) & mask == u128::from(iface.ip) & mask
		}
		_ => false,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn private_addresses() {
		for local in ["127.0.0.1", "10.0.0.5", "172.16.3.4", "192.168.1.69", "169.254.10.1", "::1", "fd00::1", "fe80::18e4:b943:8756:d855", "::ffff:192.168.0.10"] {
			assert!(is_private_address(&local.parse().unwrap()), "{local}");
		}

		for public in ["8.8.8.8", "172.32.0.1", "2001:4860:4860::8888", "::ffff:1.1.1.1"] {
			assert!(!is_private_address(&public.parse().unwrap()), "{public}");
		}
	}

	#[test]
	fn subnet_membership() {
		let iface = if_addrs::IfAddr::V4(if_addrs::Ifv4Addr {
			ip: Ipv4Addr::new(100, 64, 3, 7),
			netmask: Ipv4Addr::new(255, 255, 255, 0),
			broadcast: None,
		});

		assert!(in_subnet(&IpAddr::V4(Ipv4Addr::new(100, 64, 3, 200)), &iface));
		assert!(!in_subnet(&IpAddr::V4(Ipv4Addr::new(100, 64, 4, 1)), &iface));
		assert!(!in_subnet(&IpAddr::V6(Ipv6Addr::LOCALHOST), &iface));
	}

	#[test]
	fn target_interface_selection() {
		let a = Ipv4Addr::new(192, 168, 1, 2);
		let b = Ipv4Addr::new(10, 0, 0, 2);

		assert!(!TargetInterfaceV4::Default.selects(&a));
		assert!(TargetInterfaceV4::All.selects(&a));
		assert!(TargetInterfaceV4::Specific(a).selects(&a));
		assert!(!TargetInterfaceV4::Specific(a).selects(&b));
		assert!(TargetInterfaceV4::Multi([a, b].into_iter().collect()).selects(&b));
	}

	#[test]
	fn ip_version() {
		let v4 = IpAddr::V4(Ipv4Addr::LOCALHOST);
		let v6 = IpAddr::V6(Ipv6Addr::LOCALHOST);

		assert!(IpVersion::V4.includes(&v4));
		assert!(!IpVersion::V4.includes(&v6));
		assert!(IpVersion::V6.includes(&v6));
		assert!(IpVersion::Both.includes(&v4) && IpVersion::Both.includes(&v6));
	}
}
