use super::{Locator, LocatorConfig, LocatorEvent};
use crate::{errors::LocatorBuilderError, transport::SsdpTransport};
use std::{sync::Arc, time::Duration};

pub struct LocatorBuilder {
	filters: Vec<String>,
	active_search: bool,
	interval: Duration,
	initial_delay: Duration,
	search_wait_time: Duration,
	default_max_age: Duration,
}
impl LocatorBuilder {
	pub fn new() -> Self {
		Self {
			filters: Vec::new(),
			active_search: true,
			interval: Duration::from_secs(30),
			initial_delay: Duration::from_secs(5),
			search_wait_time: Duration::from_secs(4),
			default_max_age: Duration::from_secs(5 * 60),
		}
	}

	/// Adds a notification type prefix the locator is interested in, e.g. `urn:schemas-upnp-org:device:MediaRenderer:`.
	///
	/// Matching is case-insensitive. A locator without any filter ignores every device.
	pub fn filter(mut self, prefix: impl Into<String>) -> Self {
		self.filters.push(prefix.into());
		self
	}

	pub fn filters<I>(mut self, prefixes: I) -> Self
	where
		I: IntoIterator,
		I::Item: Into<String>,
	{
		self.filters.extend(prefixes.into_iter().map(Into::into));
		self
	}

	/// Whether to periodically send M-SEARCH requests once started.
	///
	/// If disabled, [`Locator::start`] does nothing and the locator only learns of devices through
	/// their announcements.
	pub fn active_search(mut self, enabled: bool) -> Self {
		self.active_search = enabled;
		self
	}

	/// The time between two searches.
	pub fn interval(mut self, interval: Duration) -> Self {
		self.interval = interval;
		self
	}

	/// The time between starting the locator and the first search.
	pub fn initial_delay(mut self, delay: Duration) -> Self {
		self.initial_delay = delay;
		self
	}

	/// How long devices are given to respond to a search. The MX sent is one second less, and at least one.
	pub fn search_wait_time(mut self, wait: Duration) -> Self {
		self.search_wait_time = wait;
		self
	}

	/// How long to cache devices that don't send a usable `CACHE-CONTROL: max-age`.
	pub fn default_max_age(mut self, max_age: Duration) -> Self {
		self.default_max_age = max_age;
		self
	}

	/// Builds the locator and subscribes it to search responses and announcements on the transport.
	///
	/// Announcements are handled straight away; search responses only once the locator is started.
	///
	/// `handler` is called from the transport's dispatch thread and the locator's timer thread. A
	/// [`MulticastTransport`](crate::transport::MulticastTransport) keeps reading its sockets while it
	/// runs, but later messages wait until it returns.
	pub fn build<T, F>(self, transport: Arc<T>, handler: F) -> Result<Locator<T>, LocatorBuilderError>
	where
		T: SsdpTransport,
		F: Fn(LocatorEvent) + Send + Sync + 'static,
	{
		let LocatorBuilder {
			filters,
			active_search,
			interval,
			initial_delay,
			search_wait_time,
			default_max_age,
		} = self;

		if interval.is_zero() {
			return Err(LocatorBuilderError::ZeroInterval);
		}

		if default_max_age.is_zero() {
			return Err(LocatorBuilderError::ZeroMaxAge);
		}

		Ok(Locator::new(
			transport,
			LocatorConfig {
				filters,
				active_search,
				interval,
				initial_delay,
				search_wait_time,
				default_max_age,
			},
			Arc::new(handler),
		))
	}
}
impl Default for LocatorBuilder {
	fn default() -> Self {
		Self::new()
	}
}
