use ssdplight::{
	locator::{LocatorBuilder, LocatorEvent},
	net::IpVersion,
	transport::TransportBuilder,
};
use std::{sync::Arc, time::Duration};

fn main() {
	simple_logger::SimpleLogger::new().with_level(log::LevelFilter::Debug).init().unwrap();

	let transport = Arc::new(TransportBuilder::new().build(IpVersion::V4).unwrap());
	let receiver = transport.run_in_background().unwrap();

	let locator = LocatorBuilder::new()
		.filter("upnp:rootdevice")
		.filter("urn:schemas-upnp-org:device:MediaRenderer:")
		.initial_delay(Duration::ZERO)
		.interval(Duration::from_secs(10))
		.build(transport.clone(), |event| match event {
			LocatorEvent::DeviceFound(device) => {
				println!("Found {} ({}) at {}", device.usn(), device.notification_type(), device.location());
			}
			LocatorEvent::DeviceUpdated { new, .. } => {
				match new.expires_at() {
					Some(expires_at) => println!("{} is still alive, expires in {:?}", new.usn(), expires_at.saturating_duration_since(std::time::Instant::now())),
					None => println!("{} is still alive", new.usn()),
				}
			}
			LocatorEvent::DeviceLost(device) => {
				println!("Lost {} ({})", device.usn(), device.notification_type());
			}
		})
		.unwrap();

	locator.start().unwrap();

	println!("Searching for 60 seconds...");
	std::thread::sleep(Duration::from_secs(60));

	println!("Shutting down...");

	locator.dispose();
	receiver.shutdown().unwrap();

	println!("Done!");
}
