use crate::{
	message::{parse_max_age, Headers},
	router::SsdpEventMessage,
};
use std::{
	net::{IpAddr, SocketAddr},
	time::{Duration, Instant},
};
use url::Url;

#[derive(Debug, Clone)]
/// A device or service that announced itself, or answered a search.
pub struct DiscoveredDevice {
	notification_type: String,
	usn: String,
	location: Url,
	headers: Headers,
	discovered_at: Instant,
	cache_max_age: Duration,
	sender: SocketAddr,
	local_addr: IpAddr,
}
impl DiscoveredDevice {
	#[cfg(test)]
	pub(crate) fn new(notification_type: impl Into<String>, usn: impl Into<String>, location: Url, cache_max_age: Duration) -> Self {
		Self {
			notification_type: notification_type.into(),
			usn: usn.into(),
			location,
			headers: Headers::new(),
			discovered_at: Instant::now(),
			cache_max_age,
			sender: SocketAddr::new(IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED), 0),
			local_addr: IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED),
		}
	}

	/// Builds a device from a search response (`type_header` = `ST`) or an announcement (`NT`).
	///
	/// Returns `None` if the type, `USN` or `LOCATION` header is missing, or the location is not a valid
	/// absolute URL.
	pub(crate) fn from_message(event: &SsdpEventMessage, type_header: &str, default_max_age: Duration) -> Option<Self> {
		let headers = event.headers();

		let location = headers.get_non_empty("LOCATION")?;
		let location = match Url::parse(location.trim()) {
			Ok(location) => location,
			Err(err) => {
				log::trace!("Ignoring SSDP device from {} with bad LOCATION {location:?}: {err}", event.from);
				return None;
			}
		};

		let (Some(notification_type), Some(usn)) = (headers.get_non_empty(type_header), headers.get_non_empty("USN")) else {
			log::trace!("Ignoring SSDP device from {} without {type_header} or USN", event.from);
			return None;
		};

		let cache_max_age = headers
			.get("CACHE-CONTROL")
			.and_then(parse_max_age)
			.unwrap_or(default_max_age);

		Some(Self {
			notification_type: notification_type.trim().to_owned(),
			usn: usn.trim().to_owned(),
			location,
			headers: headers.clone(),
			discovered_at: Instant::now(),
			cache_max_age,
			sender: event.from,
			local_addr: event.local_addr,
		})
	}

	#[inline(always)]
	/// The `NT` or `ST` of the announcement: the device or service type.
	pub fn notification_type(&self) -> &str {
		&self.notification_type
	}

	#[inline(always)]
	/// The unique service name.
	pub fn usn(&self) -> &str {
		&self.usn
	}

	#[inline(always)]
	/// Where the device's description document can be fetched from.
	pub fn location(&self) -> &Url {
		&self.location
	}

	#[inline(always)]
	/// Every header of the message the device was discovered with.
	pub fn headers(&self) -> &Headers {
		&self.headers
	}

	#[inline(always)]
	pub fn discovered_at(&self) -> Instant {
		self.discovered_at
	}

	#[inline(always)]
	/// How long the device is cached for without being heard from again.
	pub fn cache_max_age(&self) -> Duration {
		self.cache_max_age
	}

	#[inline(always)]
	/// The address the announcement or response was sent from.
	pub fn sender(&self) -> SocketAddr {
		self.sender
	}

	#[inline(always)]
	/// The local interface address the announcement or response was received on.
	pub fn local_addr(&self) -> IpAddr {
		self.local_addr
	}

	/// When the cache entry expires, or `None` if the advertised max-age is too far out to represent.
	#[inline]
	pub fn expires_at(&self) -> Option<Instant> {
		self.discovered_at.checked_add(self.cache_max_age)
	}

	#[inline]
	pub fn is_expired_at(&self, now: Instant) -> bool {
		self.expires_at().is_some_and(|expires_at| now > expires_at)
	}

	#[inline]
	pub fn is_expired(&self) -> bool {
		self.is_expired_at(Instant::now())
	}
}
