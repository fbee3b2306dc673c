//! Discovery of SSDP devices
//!
//! A [`Locator`] subscribes to search responses and `NOTIFY` announcements on an [`SsdpTransport`],
//! keeps the devices it is interested in in a [`DiscoveryCache`], and tells its owner when devices
//! are found, refreshed and lost.
//!
//! Once [started](Locator::start), it periodically evicts expired devices and multicasts an M-SEARCH
//! so that devices answer without waiting for their next announcement.

use crate::{
	message::{NotificationSubType, SsdpMessage, M_SEARCH_START_LINE, NOTIFY_START_LINE, SEARCH_RESPONSE_START_LINE},
	router::{HandlerId, SsdpEventMessage},
	transport::{MulticastTransport, SsdpTransport},
};
use std::{
	panic::AssertUnwindSafe,
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc, Mutex, MutexGuard, PoisonError,
	},
	time::Duration,
};

mod builder;
pub use builder::LocatorBuilder;

mod cache;
pub use cache::DiscoveryCache;

mod device;
pub use device::DiscoveredDevice;

mod event;
pub use event::LocatorEvent;
use event::*;

mod timer;
use timer::TimerHandle;

const ONE_SECOND: Duration = Duration::from_secs(1);

/// The MX of a search: one second less than the time we are prepared to wait for responses, and at
/// least one second.
pub fn search_time_to_mx(search_wait_time: Duration) -> Duration {
	if search_wait_time < ONE_SECOND * 2 {
		ONE_SECOND
	} else {
		search_wait_time - ONE_SECOND
	}
}

/// Whether `notification_type` starts with any of the prefixes, ignoring ASCII case.
///
/// No prefixes match nothing.
pub fn matches_filter(filters: &[String], notification_type: &str) -> bool {
	filters.iter().any(|prefix| {
		notification_type
			.as_bytes()
			.get(..prefix.len())
			.is_some_and(|start| start.eq_ignore_ascii_case(prefix.as_bytes()))
	})
}

pub(crate) struct LocatorConfig {
	pub(crate) filters: Vec<String>,
	pub(crate) active_search: bool,
	pub(crate) interval: Duration,
	pub(crate) initial_delay: Duration,
	pub(crate) search_wait_time: Duration,
	pub(crate) default_max_age: Duration,
}

pub(crate) struct LocatorInner<T> {
	transport: Arc<T>,
	cache: DiscoveryCache,
	config: LocatorConfig,
	handler: EventHandler,
	listening: AtomicBool,
	disposed: AtomicBool,
}
impl<T: SsdpTransport> LocatorInner<T> {
	#[inline]
	fn is_disposed(&self) -> bool {
		self.disposed.load(Ordering::SeqCst)
	}

	fn emit(&self, event: LocatorEvent) {
		if self.is_disposed() {
			return;
		}

		if std::panic::catch_unwind(AssertUnwindSafe(|| (self.handler)(event))).is_err() {
			log::error!("SSDP locator event handler panicked");
		}
	}

	pub(crate) fn tick(&self) {
		if self.is_disposed() || !self.listening.load(Ordering::SeqCst) {
			return;
		}

		self.search();
	}

	fn search(&self) {
		self.remove_expired_devices();
		self.broadcast_discover_message();
	}

	fn broadcast_discover_message(&self) {
		let mx = search_time_to_mx(self.config.search_wait_time);

		let message = SsdpMessage::new(M_SEARCH_START_LINE)
			.with_header("ST", "ssdp:all")
			.with_header("MAN", "\"ssdp:discover\"")
			.with_header("MX", mx.as_secs().to_string());

		match self.transport.send_multicast(&message) {
			Ok(interfaces) => log::trace!("Sent M-SEARCH on {interfaces} interface(s)"),
			Err(err) => log::warn!("Failed to send M-SEARCH: {err}"),
		}
	}

	fn remove_expired_devices(&self) {
		// Events are emitted once the cache lock has been released
		for device in self.cache.sweep_expired() {
			log::debug!("SSDP device {} ({}) expired", device.usn(), device.notification_type());
			self.emit(LocatorEvent::DeviceLost(device));
		}
	}

	fn add_or_update(&self, device: DiscoveredDevice) {
		if self.is_disposed() {
			return;
		}

		let device = Arc::new(device);
		let event = match self.cache.replace(device.clone()) {
			None => {
				log::debug!("Found SSDP device {} at {}", device.usn(), device.location());
				LocatorEvent::DeviceFound(device)
			}
			Some(old) => LocatorEvent::DeviceUpdated { old, new: device },
		};

		self.emit(event);
	}

	fn device_died(&self, usn: &str) {
		if self.is_disposed() {
			return;
		}

		for device in self.cache.remove(usn) {
			log::debug!("SSDP device {} ({}) left", device.usn(), device.notification_type());
			self.emit(LocatorEvent::DeviceLost(device));
		}
	}

	fn on_search_response(&self, event: &SsdpEventMessage) {
		if !self.listening.load(Ordering::SeqCst) || self.is_disposed() {
			return;
		}

		let Some(device) = DiscoveredDevice::from_message(event, "ST", self.config.default_max_age) else {
			return;
		};

		if !matches_filter(&self.config.filters, device.notification_type()) {
			return;
		}

		self.add_or_update(device);
	}

	fn on_notification(&self, event: &SsdpEventMessage) {
		if self.is_disposed() {
			return;
		}

		let nts = match event.headers().get("NTS").map(str::parse::<NotificationSubType>) {
			Some(Ok(nts)) => nts,
			Some(Err(err)) => {
				log::trace!("Ignoring NOTIFY from {}: {err}", event.from);
				return;
			}
			None => return,
		};

		let tracing = self.transport.is_tracing(&event.local_addr);

		match nts {
			NotificationSubType::Alive | NotificationSubType::Update => {
				let Some(device) = DiscoveredDevice::from_message(event, "NT", self.config.default_max_age) else {
					return;
				};

				if !matches_filter(&self.config.filters, device.notification_type()) {
					return;
				}

				if tracing {
					log::debug!("<- {nts} {} from {} on {}", device.location(), event.from, event.local_addr);
				}

				self.add_or_update(device);
			}

			NotificationSubType::ByeBye => {
				let headers = event.headers();
				let (Some(notification_type), Some(usn)) = (headers.get_non_empty("NT"), headers.get_non_empty("USN")) else {
					return;
				};

				if !matches_filter(&self.config.filters, notification_type.trim()) {
					return;
				}

				if tracing {
					log::debug!("<- {nts} {usn} from {} on {}", event.from, event.local_addr);
				}

				self.device_died(usn.trim());
			}
		}
	}
}

struct Lifecycle {
	timer: Option<TimerHandle>,
	subscriptions: Vec<(&'static str, HandlerId)>,
}

/// Finds SSDP devices and keeps track of them until they leave or expire.
///
/// Built with a [`LocatorBuilder`]. Dropping the locator [disposes](Locator::dispose) it.
pub struct Locator<T: SsdpTransport = MulticastTransport> {
	inner: Arc<LocatorInner<T>>,
	lifecycle: Mutex<Lifecycle>,
}
impl<T: SsdpTransport> Locator<T> {
	fn new(transport: Arc<T>, config: LocatorConfig, handler: EventHandler) -> Self {
		let inner = Arc::new(LocatorInner {
			transport,
			cache: DiscoveryCache::new(),
			config,
			handler,
			listening: AtomicBool::new(false),
			disposed: AtomicBool::new(false),
		});

		// The router only holds weak references, so it never keeps a dropped locator alive
		let router = inner.transport.router();
		let subscriptions = vec![
			(SEARCH_RESPONSE_START_LINE, {
				let inner = Arc::downgrade(&inner);
				router.add_handler(SEARCH_RESPONSE_START_LINE, move |event| {
					if let Some(inner) = inner.upgrade() {
						inner.on_search_response(event);
					}
				})
			}),
			(NOTIFY_START_LINE, {
				let inner = Arc::downgrade(&inner);
				router.add_handler(NOTIFY_START_LINE, move |event| {
					if let Some(inner) = inner.upgrade() {
						inner.on_notification(event);
					}
				})
			}),
		];

		Self {
			inner,
			lifecycle: Mutex::new(Lifecycle { timer: None, subscriptions }),
		}
	}

	fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
		self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Starts listening for search responses and searching periodically.
	///
	/// Does nothing if active search is disabled, the locator is disposed, or it is already started.
	pub fn start(&self) -> Result<(), std::io::Error> {
		if !self.inner.config.active_search {
			return Ok(());
		}

		let mut lifecycle = self.lifecycle();
		if self.inner.is_disposed() {
			return Ok(());
		}

		self.inner.listening.store(true, Ordering::SeqCst);

		if lifecycle.timer.is_none() {
			let config = &self.inner.config;
			lifecycle.timer = Some(TimerHandle::spawn(self.inner.clone(), config.initial_delay, config.interval)?);
			log::debug!("SSDP locator started, searching every {:?}", config.interval);
		}

		Ok(())
	}

	/// Stops searching and ignoring search responses. Announcements are still processed.
	///
	/// No search is running or will run once this returns, unless called from an event handler
	/// during a search, in which case that search finishes first.
	pub fn stop(&self) {
		let timer = {
			let mut lifecycle = self.lifecycle();
			self.inner.listening.store(false, Ordering::SeqCst);
			lifecycle.timer.take()
		};

		if let Some(timer) = timer {
			timer.stop();
		}
	}

	/// Unsubscribes from the transport and stops searching. The locator ignores everything from then on.
	///
	/// Safe to call more than once, and from any thread.
	pub fn dispose(&self) {
		let timer = {
			let mut lifecycle = self.lifecycle();
			self.inner.disposed.store(true, Ordering::SeqCst);
			self.inner.listening.store(false, Ordering::SeqCst);

			let router = self.inner.transport.router();
			for (key, id) in lifecycle.subscriptions.drain(..) {
				router.remove_handler(key, id);
			}

			lifecycle.timer.take()
		};

		if let Some(timer) = timer {
			log::debug!("Disposing SSDP locator");
			timer.stop();
		}
	}

	/// Evicts expired devices and sends an M-SEARCH right now, without waiting for the next tick.
	pub fn search_now(&self) {
		if !self.inner.is_disposed() {
			self.inner.search();
		}
	}

	/// Handles a search response (`HTTP/1.1 200 OK`). This is what the transport subscription calls.
	pub fn on_search_response(&self, event: &SsdpEventMessage) {
		self.inner.on_search_response(event);
	}

	/// Handles a `NOTIFY` announcement. This is what the transport subscription calls.
	pub fn on_notification(&self, event: &SsdpEventMessage) {
		self.inner.on_notification(event);
	}

	#[inline]
	pub fn is_listening(&self) -> bool {
		self.inner.listening.load(Ordering::SeqCst)
	}

	#[inline]
	pub fn is_disposed(&self) -> bool {
		self.inner.is_disposed()
	}

	/// The devices currently cached.
	pub fn devices(&self) -> Vec<Arc<DiscoveredDevice>> {
		self.inner.cache.devices()
	}

	#[inline]
	pub fn cache(&self) -> &DiscoveryCache {
		&self.inner.cache
	}

	#[inline]
	pub fn transport(&self) -> &Arc<T> {
		&self.inner.transport
	}

	#[inline]
	pub fn filters(&self) -> &[String] {
		&self.inner.config.filters
	}
}
impl<T: SsdpTransport> Drop for Locator<T> {
	fn drop(&mut self) {
		self.dispose();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::tests::{alive, byebye, search_response, RecordingHandler, TestTransport};

	fn locator(filters: &[&str], events: &RecordingHandler) -> Locator<TestTransport> {
		LocatorBuilder::new()
			.filters(filters.iter().copied())
			.interval(Duration::from_millis(50))
			.initial_delay(Duration::from_millis(10))
			.build(Arc::new(TestTransport::default()), events.handler())
			.unwrap()
	}

	#[test]
	fn mx_values() {
		assert_eq!(search_time_to_mx(Duration::ZERO), ONE_SECOND);
		assert_eq!(search_time_to_mx(Duration::from_millis(1500)), ONE_SECOND);
		assert_eq!(search_time_to_mx(Duration::from_secs(2)), ONE_SECOND);
		assert_eq!(search_time_to_mx(Duration::from_secs(4)), Duration::from_secs(3));
	}

	#[test]
	fn filter_matching() {
		let filters = vec!["urn:schemas-upnp-org:device:MediaRenderer:".to_owned(), "urn:my:".to_owned()];

		assert!(matches_filter(&filters, "urn:schemas-upnp-org:device:MediaRenderer:1"));
		assert!(matches_filter(&filters, "URN:SCHEMAS-UPNP-ORG:DEVICE:MEDIARENDERER:1"));
		assert!(matches_filter(&filters, "urn:my:service:1"));
		assert!(!matches_filter(&filters, "urn:schemas-upnp-org:device:MediaServer:1"));
		assert!(!matches_filter(&filters, "urn:m"));
		assert!(!matches_filter(&[], "urn:my:service:1"));
		assert!(matches_filter(&["".to_owned()], "anything"));
	}

	#[test]
	fn builder_rejects_zero_durations() {
		let transport = Arc::new(TestTransport::default());

		assert_eq!(
			LocatorBuilder::new().interval(Duration::ZERO).build(transport.clone(), |_| {}).err(),
			Some(crate::errors::LocatorBuilderError::ZeroInterval)
		);
		assert_eq!(
			LocatorBuilder::new().default_max_age(Duration::ZERO).build(transport.clone(), |_| {}).err(),
			Some(crate::errors::LocatorBuilderError::ZeroMaxAge)
		);
		assert_eq!(transport.router().handler_count(NOTIFY_START_LINE), 0);
	}

	#[test]
	fn search_responses_need_a_started_locator() {
		let events = RecordingHandler::default();
		let locator = locator(&["urn:my:"], &events);

		locator.on_search_response(&search_response("urn:my:service:1", "uuid:abc::urn:my:service:1", Some("max-age=60")));
		assert!(locator.devices().is_empty());

		locator.start().unwrap();
		locator.on_search_response(&search_response("urn:my:service:1", "uuid:abc::urn:my:service:1", Some("max-age=60")));
		assert_eq!(locator.devices().len(), 1);
		assert_eq!(events.found(), 1);
	}

	#[test]
	fn empty_filter_ignores_everything() {
		let events = RecordingHandler::default();
		let locator = locator(&[], &events);
		locator.start().unwrap();

		for notification_type in ["urn:my:service:1", "upnp:rootdevice", "ssdp:all", ""] {
			locator.on_search_response(&search_response(notification_type, "uuid:abc", None));
			locator.on_notification(&alive(notification_type, "uuid:abc", None));
		}

		assert!(locator.cache().is_empty());
		assert!(events.events().is_empty());
	}

	#[test]
	fn refresh_emits_update() {
		let events = RecordingHandler::default();
		let locator = locator(&["urn:my:"], &events);

		locator.on_notification(&alive("urn:my:service:1", "uuid:abc", Some("max-age=60")));
		locator.on_notification(&alive("urn:my:service:1", "uuid:abc", Some("max-age=120")));

		let events = events.events();
		assert_eq!(events.len(), 2);
		assert!(events[0].is_new());
		assert!(matches!(&events[1], LocatorEvent::DeviceUpdated { old, new } if old.cache_max_age() == Duration::from_secs(60) && new.cache_max_age() == Duration::from_secs(120)));
		assert_eq!(locator.devices().len(), 1);
	}

	#[test]
	fn byebye_without_location_removes_every_type() {
		let events = RecordingHandler::default();
		let locator = locator(&["urn:my:", "upnp:rootdevice"], &events);

		locator.on_notification(&alive("upnp:rootdevice", "uuid:abc", None));
		locator.on_notification(&alive("urn:my:service:1", "uuid:abc", None));
		locator.on_notification(&alive("urn:my:service:1", "uuid:def", None));
		assert_eq!(locator.devices().len(), 3);

		locator.on_notification(&byebye("urn:my:service:1", "uuid:abc"));

		assert_eq!(events.lost(), 2);
		assert!(locator.cache().find_all_by_usn("uuid:abc").is_empty());
		assert_eq!(locator.devices().len(), 1);

		// Nothing left to remove
		locator.on_notification(&byebye("urn:my:service:1", "uuid:abc"));
		assert_eq!(events.lost(), 2);
	}

	#[test]
	fn byebye_of_uninteresting_type_is_ignored() {
		let events = RecordingHandler::default();
		let locator = locator(&["urn:my:"], &events);

		locator.on_notification(&alive("urn:my:service:1", "uuid:abc", None));
		locator.on_notification(&byebye("urn:other:service:1", "uuid:abc"));

		assert_eq!(events.lost(), 0);
		assert_eq!(locator.devices().len(), 1);
	}

	#[test]
	fn unknown_nts_is_ignored() {
		let events = RecordingHandler::default();
		let locator = locator(&["urn:my:"], &events);

		let mut notify = alive("urn:my:service:1", "uuid:abc", None);
		notify.message.headers_mut().insert("NTS", "ssdp:propchange");
		locator.on_notification(&notify);

		notify.message.headers_mut().remove("NTS");
		locator.on_notification(&notify);

		assert!(locator.cache().is_empty());
	}

	#[test]
	fn timer_sweeps_and_searches() {
		let events = RecordingHandler::default();
		let locator = locator(&["urn:my:"], &events);
		locator.start().unwrap();

		std::thread::sleep(Duration::from_millis(200));
		locator.stop();

		let sent = locator.transport().sent();
		assert!(!sent.is_empty());
		for message in sent.iter() {
			assert_eq!(message.start_line(), M_SEARCH_START_LINE);
			assert_eq!(message.headers().get("ST"), Some("ssdp:all"));
			assert_eq!(message.headers().get("MAN"), Some("\"ssdp:discover\""));
			assert_eq!(message.headers().get("MX"), Some("3"));
		}

		// No more ticks once stopped
		std::thread::sleep(Duration::from_millis(150));
		assert_eq!(locator.transport().sent().len(), sent.len());
		assert!(!locator.is_listening());
	}

	#[test]
	fn active_search_disabled() {
		let events = RecordingHandler::default();
		let locator = LocatorBuilder::new()
			.filter("urn:my:")
			.active_search(false)
			.initial_delay(Duration::ZERO)
			.build(Arc::new(TestTransport::default()), events.handler())
			.unwrap();

		locator.start().unwrap();
		assert!(!locator.is_listening());

		std::thread::sleep(Duration::from_millis(50));
		assert!(locator.transport().sent().is_empty());

		// Passive discovery still works
		locator.on_notification(&alive("urn:my:service:1", "uuid:abc", None));
		assert_eq!(events.found(), 1);
	}

	#[test]
	fn dispose_unsubscribes_and_ignores_late_messages() {
		let events = RecordingHandler::default();
		let locator = locator(&["urn:my:"], &events);
		locator.start().unwrap();

		let transport = locator.transport().clone();
		assert_eq!(transport.router().handler_count(NOTIFY_START_LINE), 1);
		assert_eq!(transport.router().handler_count(SEARCH_RESPONSE_START_LINE), 1);

		locator.dispose();
		locator.dispose();

		assert!(locator.is_disposed());
		assert_eq!(transport.router().handler_count(NOTIFY_START_LINE), 0);
		assert_eq!(transport.router().handler_count(SEARCH_RESPONSE_START_LINE), 0);

		// A handler that was mid-dispatch when dispose began
		locator.on_notification(&alive("urn:my:service:1", "uuid:abc", None));
		locator.on_search_response(&search_response("urn:my:service:1", "uuid:abc", None));
		assert!(locator.cache().is_empty());
		assert!(events.events().is_empty());

		// Restarting a disposed locator does nothing
		locator.start().unwrap();
		assert!(!locator.is_listening());
	}

	#[test]
	fn dropping_unsubscribes() {
		let transport = Arc::new(TestTransport::default());
		let locator = LocatorBuilder::new().filter("urn:my:").build(transport.clone(), |_| {}).unwrap();
		locator.start().unwrap();

		drop(locator);
		assert_eq!(transport.router().handler_count(NOTIFY_START_LINE), 0);
		assert_eq!(transport.router().handler_count(SEARCH_RESPONSE_START_LINE), 0);
	}

	#[test]
	fn panicking_owner_does_not_stop_the_locator() {
		let locator = LocatorBuilder::new()
			.filter("urn:my:")
			.build(Arc::new(TestTransport::default()), |_| panic!("owner exploded"))
			.unwrap();

		locator.on_notification(&alive("urn:my:service:1", "uuid:abc", None));
		locator.on_notification(&alive("urn:my:service:1", "uuid:def", None));
		assert_eq!(locator.devices().len(), 2);
	}
}
