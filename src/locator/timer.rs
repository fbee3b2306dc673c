use super::LocatorInner;
use crate::transport::SsdpTransport;
use std::{sync::Arc, time::Duration};

/// The locator's periodic sweep-and-search, running on its own thread.
///
/// Ticks run one after another on a single task, so a slow tick delays the next one rather than
/// overlapping it.
pub(super) struct TimerHandle {
	thread: std::thread::JoinHandle<Result<(), std::io::Error>>,
	shutdown_tx: tokio::sync::oneshot::Sender<()>,
}
impl TimerHandle {
	pub(super) fn spawn<T: SsdpTransport>(inner: Arc<LocatorInner<T>>, initial_delay: Duration, period: Duration) -> Result<Self, std::io::Error> {
		let (shutdown_tx, mut shutdown_rx) = tokio::sync::oneshot::channel();

		let thread = std::thread::Builder::new().name("ssdplight Locator".to_owned()).spawn(move || {
			tokio::runtime::Builder::new_current_thread()
				.thread_name("ssdplight Locator (Tokio)")
				.enable_all()
				.build()?
				.block_on(async move {
					let mut ticks = tokio::time::interval_at(tokio::time::Instant::now() + initial_delay, period);
					ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

					loop {
						tokio::select! {
							biased;
							_ = &mut shutdown_rx => break,
							_ = ticks.tick() => inner.tick(),
						}
					}
				});

			Ok(())
		})?;

		Ok(Self { thread, shutdown_tx })
	}

	/// Stops the timer. Unless called from a tick, waits for the timer thread to exit, so no tick is
	/// running or will run once this returns.
	pub(super) fn stop(self) {
		let TimerHandle { thread, shutdown_tx } = self;

		shutdown_tx.send(()).ok();

		if thread.thread().id() == std::thread::current().id() {
			// Stopped from within a tick: the loop exits as soon as the tick returns
			return;
		}

		match thread.join() {
			Ok(Ok(())) => {}
			Ok(Err(err)) => log::error!("SSDP locator timer failed: {err}"),
			Err(_) => log::error!("SSDP locator timer thread panicked"),
		}
	}
}
