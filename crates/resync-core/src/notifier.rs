//! Change notification.
//!
//! After each committed repository mutation the source pushes one
//! [`ChangeRecord`] through the notifier. Delivery is synchronous and in
//! registration order. A failing or panicking subscriber is logged and
//! skipped; it never stops delivery to the others or undoes the mutation.

use crate::error::DeliveryError;
use crate::resource::ChangeRecord;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use tracing::{debug, warn};

/// Anything that can take a change record.
pub trait ChangeSubscriber: Send + Sync {
    fn accept(&self, record: &ChangeRecord) -> Result<(), DeliveryError>;

    /// Name used in log lines.
    fn name(&self) -> &str {
        "subscriber"
    }
}

impl<F> ChangeSubscriber for F
where
    F: Fn(&ChangeRecord) -> Result<(), DeliveryError> + Send + Sync,
{
    fn accept(&self, record: &ChangeRecord) -> Result<(), DeliveryError> {
        self(record)
    }
}

/// Forwards records into an mpsc channel.
///
/// Once the receiver is dropped every delivery fails, which the notifier
/// just logs.
pub struct ChannelSubscriber {
    name: String,
    sender: Mutex<Sender<ChangeRecord>>,
}

impl ChannelSubscriber {
    pub fn new(name: impl Into<String>, sender: Sender<ChangeRecord>) -> Self {
        Self {
            name: name.into(),
            sender: Mutex::new(sender),
        }
    }
}

impl ChangeSubscriber for ChannelSubscriber {
    fn accept(&self, record: &ChangeRecord) -> Result<(), DeliveryError> {
        self.sender
            .lock()
            .send(record.clone())
            .map_err(|_| DeliveryError::new(format!("{} channel closed", self.name)))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Registry of subscribers.
#[derive(Default)]
pub struct ChangeNotifier {
    subscribers: RwLock<Vec<Arc<dyn ChangeSubscriber>>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, subscriber: Arc<dyn ChangeSubscriber>) {
        debug!("Registered change subscriber '{}'", subscriber.name());
        self.subscribers.write().push(subscriber);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Delivers `record` to every current subscriber.
    ///
    /// Returns how many subscribers accepted it.
    pub fn notify(&self, record: &ChangeRecord) -> usize {
        // Deliver outside the lock so a subscriber may subscribe others.
        let subscribers = self.subscribers.read().clone();

        let mut delivered = 0;
        for subscriber in &subscribers {
            let outcome = catch_unwind(AssertUnwindSafe(|| subscriber.accept(record)))
                .unwrap_or_else(|panic| Err(DeliveryError::new(panic_message(panic))));
            match outcome {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    "Subscriber '{}' dropped {} record for {}: {}",
                    subscriber.name(),
                    record.change,
                    record.uri,
                    e
                ),
            }
        }
        delivered
    }

    /// Drops every subscriber. Channel consumers then see end-of-stream.
    pub fn close(&self) {
        let dropped = std::mem::take(&mut *self.subscribers.write());
        debug!("Closed notifier, released {} subscribers", dropped.len());
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    let detail = match panic.downcast::<String>() {
        Ok(message) => *message,
        Err(panic) => panic
            .downcast_ref::<&str>()
            .map(|message| message.to_string())
            .unwrap_or_else(|| "unknown cause".to_string()),
    };
    format!("panicked: {}", detail)
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
