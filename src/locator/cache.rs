use super::DiscoveredDevice;
use std::{
	collections::HashMap,
	sync::{Arc, Mutex, MutexGuard, PoisonError},
	time::Instant,
};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct DeviceKey {
	notification_type: String,
	usn: String,
}
impl DeviceKey {
	fn of(device: &DiscoveredDevice) -> Self {
		Self {
			notification_type: device.notification_type().to_owned(),
			usn: device.usn().to_owned(),
		}
	}
}

#[derive(Default)]
/// Registry of discovered devices, keyed by notification type and USN.
///
/// Every accessor returns shared, immutable devices; the registry itself is only changed through its
/// own methods. Key comparisons are case-sensitive.
pub struct DiscoveryCache {
	devices: Mutex<HashMap<DeviceKey, Arc<DiscoveredDevice>>>,
}
impl DiscoveryCache {
	pub fn new() -> Self {
		Self::default()
	}

	fn devices_mut(&self) -> MutexGuard<'_, HashMap<DeviceKey, Arc<DiscoveredDevice>>> {
		self.devices.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Inserts the device, or replaces the entry with the same notification type and USN.
	///
	/// Returns the replaced entry.
	pub fn replace(&self, device: Arc<DiscoveredDevice>) -> Option<Arc<DiscoveredDevice>> {
		self.devices_mut().insert(DeviceKey::of(&device), device)
	}

	/// Inserts or refreshes the device. Returns `true` if it was not already cached.
	#[inline]
	pub fn add_or_update(&self, device: Arc<DiscoveredDevice>) -> bool {
		self.replace(device).is_none()
	}

	/// Removes every entry with this USN, whatever its notification type.
	pub fn remove(&self, usn: &str) -> Vec<Arc<DiscoveredDevice>> {
		let mut removed = Vec::new();
		self.devices_mut().retain(|key, device| {
			if key.usn == usn {
				removed.push(device.clone());
				false
			} else {
				true
			}
		});
		removed
	}

	/// Removes and returns every entry that has expired by `now`.
	pub fn sweep_expired_at(&self, now: Instant) -> Vec<Arc<DiscoveredDevice>> {
		let mut expired = Vec::new();
		self.devices_mut().retain(|_, device| {
			if device.is_expired_at(now) {
				expired.push(device.clone());
				false
			} else {
				true
			}
		});
		expired
	}

	#[inline]
	pub fn sweep_expired(&self) -> Vec<Arc<DiscoveredDevice>> {
		self.sweep_expired_at(Instant::now())
	}

	pub fn find(&self, notification_type: &str, usn: &str) -> Option<Arc<DiscoveredDevice>> {
		self.devices_mut()
			.values()
			.find(|device| device.notification_type() == notification_type && device.usn() == usn)
			.cloned()
	}

	pub fn find_all_by_usn(&self, usn: &str) -> Vec<Arc<DiscoveredDevice>> {
		self.devices_mut().values().filter(|device| device.usn() == usn).cloned().collect()
	}

	pub fn devices(&self) -> Vec<Arc<DiscoveredDevice>> {
		self.devices_mut().values().cloned().collect()
	}

	pub fn len(&self) -> usize {
		self.devices_mut().len()
	}

	pub fn is_empty(&self) -> bool {
		self.devices_mut().is_empty()
	}
}
