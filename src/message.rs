//! SSDP message codec
//!
//! SSDP messages are HTTP-like text datagrams: a start line followed by `Name: Value` header lines
//! and a terminating blank line. There is never a body.

use crate::errors::{InvalidHeaderError, MessageParseError, UnknownNotificationSubType};
use std::{fmt, str::FromStr, time::Duration};

/// Start line of an outbound discovery request.
pub const M_SEARCH_START_LINE: &str = "M-SEARCH * HTTP/1.1";

/// Start line of a unicast reply to an M-SEARCH, and the router key it is dispatched under.
pub const SEARCH_RESPONSE_START_LINE: &str = "HTTP/1.1 200 OK";

/// Router key of NOTIFY announcements.
pub const NOTIFY_START_LINE: &str = "NOTIFY";

/// Full request line of a NOTIFY announcement as it appears on the wire.
pub const NOTIFY_REQUEST_LINE: &str = "NOTIFY * HTTP/1.1";

#[derive(Clone, Debug, Default)]
/// An ordered header map with ASCII case-insensitive names.
///
/// Headers keep their insertion order so that encoded messages are deterministic. Replacing an
/// existing header keeps its original position.
pub struct Headers(Vec<(String, String)>);
impl Headers {
	#[inline]
	pub fn new() -> Self {
		Self(Vec::new())
	}

	fn position(&self, name: &str) -> Option<usize> {
		self.0.iter().position(|(key, _)| key.eq_ignore_ascii_case(name))
	}

	/// Returns the value of the header with the given name, if present.
	pub fn get(&self, name: &str) -> Option<&str> {
		self.position(name).map(|index| self.0[index].1.as_str())
	}

	/// Returns the value of the header with the given name if it is present and not blank.
	pub fn get_non_empty(&self, name: &str) -> Option<&str> {
		self.get(name).filter(|value| !value.trim().is_empty())
	}

	#[inline]
	pub fn contains(&self, name: &str) -> bool {
		self.position(name).is_some()
	}

	/// Inserts a header, replacing any existing header with the same (case-insensitive) name.
	///
	/// Returns the previous value.
	pub fn try_insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<Option<String>, InvalidHeaderError> {
		let name = name.into();
		let value = value.into();

		if name.is_empty() {
			return Err(InvalidHeaderError::EmptyName);
		}
		if name.contains([':', '\r', '\n']) {
			return Err(InvalidHeaderError::BadName(name));
		}
		if value.contains(['\r', '\n']) {
			return Err(InvalidHeaderError::BadValue(name));
		}

		Ok(match self.position(&name) {
			Some(index) => {
				let (_, old) = std::mem::replace(&mut self.0[index], (name, value));
				Some(old)
			}
			None => {
				self.0.push((name, value));
				None
			}
		})
	}

	/// Inserts a header, replacing any existing header with the same (case-insensitive) name.
	///
	/// # Panics
	///
	/// Panics if the name is empty or contains a colon or line break, or if the value contains a
	/// line break. Use [`try_insert`](Headers::try_insert) for values that are not known to be valid.
	pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
		match self.try_insert(name, value) {
			Ok(old) => old,
			Err(err) => panic!("{err}"),
		}
	}

	pub fn remove(&mut self, name: &str) -> Option<String> {
		self.position(name).map(|index| self.0.remove(index).1)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
		self.0.iter().map(|(name, value)| (name.as_str(), value.as_str()))
	}

	#[inline]
	pub fn len(&self) -> usize {
		self.0.len()
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}
/// Two header maps are equal if they hold the same values under the same case-insensitive names,
/// regardless of order.
impl PartialEq for Headers {
	fn eq(&self, other: &Self) -> bool {
		self.len() == other.len() && self.iter().all(|(name, value)| other.get(name) == Some(value))
	}
}
impl Eq for Headers {}

#[derive(Clone, Debug, PartialEq, Eq)]
/// A parsed or outbound SSDP message.
pub struct SsdpMessage {
	start_line: String,
	headers: Headers,
}
impl SsdpMessage {
	pub fn new(start_line: impl Into<String>) -> Self {
		Self {
			start_line: start_line.into(),
			headers: Headers::new(),
		}
	}

	/// Builder-style [`Headers::insert`].
	///
	/// # Panics
	///
	/// Panics under the same conditions as [`Headers::insert`].
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.insert(name, value);
		self
	}

	/// Parses a raw datagram.
	///
	/// Header lines without a colon, or with an empty name, are skipped. Parsing stops at the first
	/// blank line.
	pub fn parse(datagram: &[u8]) -> Result<Self, MessageParseError> {
		let text = std::str::from_utf8(datagram).map_err(|_| MessageParseError::NotUtf8)?;

		let mut lines = text.lines();

		let start_line = lines
			.next()
			.map(str::trim)
			.filter(|line| !line.is_empty())
			.ok_or(MessageParseError::MissingStartLine)?;

		let mut headers = Headers::new();
		for line in lines {
			if line.trim().is_empty() {
				break;
			}

			let Some((name, value)) = line.split_once(':') else {
				log::trace!("Skipping SSDP header line without a colon: {line:?}");
				continue;
			};

			if let Err(err) = headers.try_insert(name.trim(), value.trim()) {
				log::trace!("Skipping malformed SSDP header line {line:?}: {err}");
			}
		}

		Ok(Self {
			start_line: start_line.to_owned(),
			headers,
		})
	}

	/// Encodes the message for the wire.
	#[inline]
	pub fn to_bytes(&self) -> Vec<u8> {
		self.to_string().into_bytes()
	}

	#[inline]
	pub fn start_line(&self) -> &str {
		&self.start_line
	}

	#[inline]
	pub fn headers(&self) -> &Headers {
		&self.headers
	}

	#[inline]
	pub fn headers_mut(&mut self) -> &mut Headers {
		&mut self.headers
	}

	#[inline]
	pub fn into_parts(self) -> (String, Headers) {
		(self.start_line, self.headers)
	}

	/// The key this message is dispatched under by the [`EventRouter`](crate::router::EventRouter).
	///
	/// Responses are keyed by their whole status line (`HTTP/1.1 200 OK`), requests by their method
	/// (`NOTIFY`, `M-SEARCH`).
	pub fn route_key(&self) -> &str {
		route_key(&self.start_line)
	}
}
impl fmt::Display for SsdpMessage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}\r\n", self.start_line)?;
		for (name, value) in self.headers.iter() {
			write!(f, "{name}: {value}\r\n")?;
		}
		f.write_str("\r\n")
	}
}

pub(crate) fn route_key(start_line: &str) -> &str {
	if start_line.starts_with("HTTP/") {
		start_line
	} else {
		start_line.split_ascii_whitespace().next().unwrap_or(start_line)
	}
}

/// Extracts the `max-age` directive from a `CACHE-CONTROL` header value.
///
/// Returns `None` if the directive is missing or has no numeric value.
pub fn parse_max_age(cache_control: &str) -> Option<Duration> {
	let lower = cache_control.to_ascii_lowercase();
	let after_key = &lower[lower.find("max-age")? + "max-age".len()..];
	let after_eq = after_key.trim_start().strip_prefix('=')?.trim_start();

	let digits = after_eq.find(|c: char| !c.is_ascii_digit()).map(|end| &after_eq[..end]).unwrap_or(after_eq);

	digits.parse::<u64>().ok().map(Duration::from_secs)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// The `NTS` header of a NOTIFY announcement.
pub enum NotificationSubType {
	/// `ssdp:alive`
	Alive,

	/// `ssdp:byebye`
	ByeBye,

	/// `ssdp:update`
	Update,
}
impl NotificationSubType {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Alive => "ssdp:alive",
			Self::ByeBye => "ssdp:byebye",
			Self::Update => "ssdp:update",
		}
	}
}
impl FromStr for NotificationSubType {
	type Err = UnknownNotificationSubType;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let s = s.trim();
		[Self::Alive, Self::ByeBye, Self::Update]
			.into_iter()
			.find(|nts| nts.as_str().eq_ignore_ascii_case(s))
			.ok_or_else(|| UnknownNotificationSubType(s.to_owned()))
	}
}
impl fmt::Display for NotificationSubType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parse_search_response() {
		let message = SsdpMessage::parse(
			b"HTTP/1.1 200 OK\r\n\
			CACHE-CONTROL: max-age=1800\r\n\
			Location: http://192.168.1.20:49152/description.xml\r\n\
			ST: urn:schemas-upnp-org:device:MediaRenderer:1\r\n\
			USN: uuid:4d696e69-444c-164e-9d41-b827eb1b3e7a::urn:schemas-upnp-org:device:MediaRenderer:1\r\n\
			\r\n",
		)
		.unwrap();

		assert_eq!(message.start_line(), SEARCH_RESPONSE_START_LINE);
		assert_eq!(message.route_key(), SEARCH_RESPONSE_START_LINE);
		assert_eq!(message.headers().len(), 4);
		assert_eq!(message.headers().get("location"), Some("http://192.168.1.20:49152/description.xml"));
		assert_eq!(message.headers().get("LOCATION"), message.headers().get("Location"));
	}

	#[test]
	fn malformed_lines_are_skipped() {
		let message = SsdpMessage::parse(b"NOTIFY * HTTP/1.1\nHOST: 239.255.255.250:1900\ngarbage line\n: no name\nNT: upnp:rootdevice\n\nIGNORED: after blank").unwrap();

		assert_eq!(message.route_key(), NOTIFY_START_LINE);
		assert_eq!(message.headers().len(), 2);
		assert_eq!(message.headers().get("nt"), Some("upnp:rootdevice"));
		assert!(!message.headers().contains("IGNORED"));
	}

	#[test]
	fn header_values_may_contain_colons() {
		let message = SsdpMessage::parse(b"HTTP/1.1 200 OK\r\nUSN: uuid:abc::urn:my:service:1\r\n\r\n").unwrap();
		assert_eq!(message.headers().get("usn"), Some("uuid:abc::urn:my:service:1"));
	}

	#[test]
	fn unparseable_datagrams() {
		assert!(matches!(SsdpMessage::parse(b""), Err(MessageParseError::MissingStartLine)));
		assert!(matches!(SsdpMessage::parse(b"\r\nST: ssdp:all\r\n"), Err(MessageParseError::MissingStartLine)));
		assert!(matches!(SsdpMessage::parse(&[0xff, 0xfe, 0x00]), Err(MessageParseError::NotUtf8)));
	}

	#[test]
	fn build_then_parse_m_search() {
		let message = SsdpMessage::new(M_SEARCH_START_LINE)
			.with_header("HOST", "239.255.255.250:1900")
			.with_header("ST", "ssdp:all")
			.with_header("MAN", "\"ssdp:discover\"")
			.with_header("MX", "3");

		let bytes = message.to_bytes();
		assert_eq!(
			std::str::from_utf8(&bytes).unwrap(),
			"M-SEARCH * HTTP/1.1\r\nHOST: 239.255.255.250:1900\r\nST: ssdp:all\r\nMAN: \"ssdp:discover\"\r\nMX: 3\r\n\r\n"
		);

		let parsed = SsdpMessage::parse(&bytes).unwrap();
		assert_eq!(parsed, message);
		assert_eq!(parsed.route_key(), "M-SEARCH");
	}

	#[test]
	fn headers_compare_case_insensitively() {
		let mut lower = Headers::new();
		lower.insert("st", "ssdp:all");
		lower.insert("mx", "3");

		let mut upper = Headers::new();
		upper.insert("MX", "3");
		upper.insert("ST", "ssdp:all");

		assert_eq!(lower, upper);

		upper.insert("Mx", "4");
		assert_ne!(lower, upper);
		assert_eq!(upper.len(), 2);
	}

	#[test]
	fn insert_replaces_in_place() {
		let mut headers = Headers::new();
		headers.insert("HOST", "a");
		headers.insert("ST", "b");
		assert_eq!(headers.insert("host", "c"), Some("a".to_owned()));

		assert_eq!(headers.iter().collect::<Vec<_>>(), vec![("host", "c"), ("ST", "b")]);
		assert_eq!(headers.remove("St"), Some("b".to_owned()));
		assert_eq!(headers.len(), 1);
	}

	#[test]
	fn invalid_headers_are_rejected() {
		let mut headers = Headers::new();
		assert_eq!(headers.try_insert("", "x"), Err(InvalidHeaderError::EmptyName));
		assert_eq!(headers.try_insert("A:B", "x"), Err(InvalidHeaderError::BadName("A:B".to_owned())));
		assert_eq!(headers.try_insert("ST", "a\r\nMX: 1"), Err(InvalidHeaderError::BadValue("ST".to_owned())));
		assert!(headers.is_empty());
	}

	#[test]
	fn max_age() {
		assert_eq!(parse_max_age("max-age=60"), Some(Duration::from_secs(60)));
		assert_eq!(parse_max_age("MAX-AGE = 1800"), Some(Duration::from_secs(1800)));
		assert_eq!(parse_max_age("no-cache=\"Ext\", max-age=120, private"), Some(Duration::from_secs(120)));
		assert_eq!(parse_max_age("max-age=abc"), None);
		assert_eq!(parse_max_age("max-age"), None);
		assert_eq!(parse_max_age("no-cache"), None);
	}

	#[test]
	fn notification_sub_types() {
		assert_eq!("ssdp:alive".parse::<NotificationSubType>(), Ok(NotificationSubType::Alive));
		assert_eq!("SSDP:BYEBYE".parse::<NotificationSubType>(), Ok(NotificationSubType::ByeBye));
		assert_eq!(" ssdp:update ".parse::<NotificationSubType>(), Ok(NotificationSubType::Update));
		assert_eq!(
			"ssdp:propchange".parse::<NotificationSubType>(),
			Err(UnknownNotificationSubType("ssdp:propchange".to_owned()))
		);
	}
}
