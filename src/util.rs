use std::{net::Ipv6Addr, num::NonZeroU32};

pub fn iface_v6_name_to_index(name: &str) -> Result<NonZeroU32, std::io::Error> {
	use std::ffi::CString;

	#[cfg(windows)]
	use winapi::shared::netioapi::if_nametoindex;

	#[cfg(not(windows))]
	use libc::if_nametoindex;

	let name = CString::new(name).map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "Invalid interface name"))?;
	let index = unsafe { if_nametoindex(name.as_ptr()) };
	NonZeroU32::new(index).ok_or_else(std::io::Error::last_os_error)
}

/// Whether the address is in `fe80::/10`.
#[inline]
pub fn is_unicast_link_local_v6(addr: &Ipv6Addr) -> bool {
	(addr.segments()[0] & 0xffc0) == 0xfe80
}

/// Whether the address is in `fc00::/7`.
#[inline]
pub fn is_unique_local_v6(addr: &Ipv6Addr) -> bool {
	(addr.segments()[0] & 0xfe00) == 0xfc00
}
