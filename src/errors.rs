//! Error types

#[derive(Debug, Error)]
/// A datagram could not be interpreted as an SSDP message
pub enum MessageParseError {
	#[error("SSDP message is not valid UTF-8")]
	/// The datagram is not valid UTF-8
	NotUtf8,

	#[error("SSDP message has no start line")]
	/// The datagram is empty or starts with a blank line
	MissingStartLine,
}

#[derive(Debug, Error, PartialEq, Eq)]
/// A header name or value that cannot be written to the wire
pub enum InvalidHeaderError {
	#[error("Header name must not be empty")]
	EmptyName,

	#[error("Header name {0:?} contains a colon or line break")]
	BadName(String),

	#[error("Value of header {0:?} contains a line break")]
	BadValue(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown NTS value {0:?}")]
/// The NTS header did not hold a recognised notification sub-type
pub struct UnknownNotificationSubType(pub String);

#[derive(Debug, Error)]
/// An error occurred while sending an SSDP message
pub enum TransportError {
	#[error("The message could not be sent on any interface")]
	/// Every bound interface failed to send (each failure has already been logged)
	NoInterfaceSent,

	#[error("No socket is bound for the address family of {0}")]
	/// There is no socket of the destination's address family
	NoSocketForFamily(std::net::SocketAddr),

	#[error("I/O error: {0}")]
	IoError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
/// An error occurred while building a [`MulticastTransport`](crate::transport::MulticastTransport)
pub enum TransportBuilderError {
	#[error("No local interface address could be bound")]
	/// None of the selected interfaces yielded a usable socket
	NoBindableInterface,

	#[error("I/O error: {0}")]
	IoError(#[from] std::io::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
/// An invalid option was passed to a [`LocatorBuilder`](crate::locator::LocatorBuilder)
pub enum LocatorBuilderError {
	#[error("The search interval must be greater than zero")]
	ZeroInterval,

	#[error("The default cache max-age must be greater than zero")]
	ZeroMaxAge,
}

#[derive(Debug, Error)]
/// An error occurred while shutting down a background thread
pub enum ShutdownError {
	#[error("Thread panicked")]
	ThreadJoinError(Box<dyn std::any::Any + Send + 'static>),

	#[error("I/O error: {0}")]
	IoError(#[from] std::io::Error),
}
