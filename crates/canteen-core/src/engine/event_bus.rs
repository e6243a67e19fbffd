//! Broadcast event bus for tracker events.
//!
//! Every subscriber gets every event published after it subscribed. Slow
//! subscribers lose the oldest events rather than blocking publishers.

use canteen_types::TrackerEvent;
use tokio::sync::broadcast;

/// Cloneable handle onto one broadcast channel.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<TrackerEvent>,
}

impl EventBus {
	/// Creates a bus buffering up to `capacity` events per subscriber.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event, returning the number of subscribers reached.
	///
	/// Fails only when nobody is subscribed, which callers usually ignore.
	pub fn publish(
		&self,
		event: TrackerEvent,
	) -> Result<usize, broadcast::error::SendError<TrackerEvent>> {
		self.sender.send(event)
	}
}
