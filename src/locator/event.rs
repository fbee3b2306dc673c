use super::DiscoveredDevice;
use std::sync::Arc;

pub type EventHandler = Arc<dyn Fn(LocatorEvent) + Send + Sync + 'static>;

#[derive(Debug, Clone)]
pub enum LocatorEvent {
	/// A device that was not cached has been discovered.
	DeviceFound(Arc<DiscoveredDevice>),

	/// A cached device announced itself or answered a search again.
	DeviceUpdated {
		old: Arc<DiscoveredDevice>,
		new: Arc<DiscoveredDevice>,
	},

	/// A device said goodbye, or its cache entry expired.
	DeviceLost(Arc<DiscoveredDevice>),
}
impl LocatorEvent {
	/// The device this event is about, as it is (or was last) cached.
	pub fn device(&self) -> &Arc<DiscoveredDevice> {
		match self {
			Self::DeviceFound(device) | Self::DeviceLost(device) => device,
			Self::DeviceUpdated { new, .. } => new,
		}
	}

	/// Whether this is a discovery of a device that was not cached.
	#[inline]
	pub fn is_new(&self) -> bool {
		matches!(self, Self::DeviceFound(_))
	}
}
