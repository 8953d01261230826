use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::error::EventError;
use crate::models::events::{available_kinds, AudioEvent, EventKind};

/// Callback registered for one event kind.
pub type Listener = Arc<dyn Fn(&AudioEvent) + Send + Sync + 'static>;

/// Handle identifying a single registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: HashMap<EventKind, Vec<(ListenerId, Listener)>>,
}

impl Registry {
    fn insert(&mut self, kind: EventKind, listener: Listener) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.listeners.entry(kind).or_default().push((id, listener));
        id
    }

    fn snapshot(&self, kind: EventKind) -> Vec<Listener> {
        self.listeners
            .get(&kind)
            .map(|entries| entries.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default()
    }
}

#[derive(Default)]
struct Delivery {
    queue: VecDeque<AudioEvent>,
    draining: bool,
}

/// Typed publish/subscribe channel, one independent channel per [`EventKind`].
///
/// Delivery is synchronous on the emitting thread. Events emitted while a
/// delivery is already running (from a listener, or from another thread)
/// are queued and delivered afterwards by the thread that is draining, so
/// per-kind order is preserved and no listener is re-entered. Listeners
/// registered during a delivery first see the next event.
///
/// A panicking listener is isolated: the remaining listeners still run, and
/// the panic is reported as an [`AudioEvent::Error`].
pub struct EventBus {
    supported: Vec<EventKind>,
    registry: Mutex<Registry>,
    delivery: Mutex<Delivery>,
}

impl EventBus {
    /// A bus for a backend without background-service lifecycle.
    pub fn new() -> Self {
        Self::with_kinds(
            EventKind::ALL
                .into_iter()
                .filter(|kind| !kind.requires_background_service())
                .collect(),
        )
    }

    /// A bus that also carries `serviceState` events.
    pub fn with_service_state() -> Self {
        Self::with_kinds(EventKind::ALL.to_vec())
    }

    fn with_kinds(supported: Vec<EventKind>) -> Self {
        Self {
            supported,
            registry: Mutex::new(Registry::default()),
            delivery: Mutex::new(Delivery::default()),
        }
    }

    pub fn supports(&self, kind: EventKind) -> bool {
        self.supported.contains(&kind)
    }

    pub fn supported_kinds(&self) -> &[EventKind] {
        &self.supported
    }

    /// Replace every listener of `kind` with `callback`.
    pub fn subscribe<F>(&self, kind: EventKind, callback: F) -> Result<ListenerId, EventError>
    where
        F: Fn(&AudioEvent) + Send + Sync + 'static,
    {
        self.check(kind)?;
        let mut registry = self.registry.lock();
        registry.listeners.remove(&kind);
        Ok(registry.insert(kind, Arc::new(callback)))
    }

    /// Add `callback` next to the existing listeners of `kind`.
    pub fn add_listener<F>(&self, kind: EventKind, callback: F) -> Result<ListenerId, EventError>
    where
        F: Fn(&AudioEvent) + Send + Sync + 'static,
    {
        self.check(kind)?;
        Ok(self.registry.lock().insert(kind, Arc::new(callback)))
    }

    /// Remove every listener of `kind`.
    pub fn unsubscribe(&self, kind: EventKind) -> Result<(), EventError> {
        self.check(kind)?;
        self.registry.lock().listeners.remove(&kind);
        Ok(())
    }

    /// Remove every listener of every kind.
    pub fn unsubscribe_all(&self) {
        self.registry.lock().listeners.clear();
    }

    /// Remove a single listener. Returns false if it was already gone.
    pub fn remove_subscription(&self, id: ListenerId) -> bool {
        let mut registry = self.registry.lock();
        for entries in registry.listeners.values_mut() {
            if let Some(pos) = entries.iter().position(|(entry_id, _)| *entry_id == id) {
                entries.remove(pos);
                return true;
            }
        }
        false
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.registry
            .lock()
            .listeners
            .get(&kind)
            .map_or(0, Vec::len)
    }

    /// Deliver `event` to the listeners of its kind.
    pub fn emit(&self, event: AudioEvent) {
        let kind = event.kind();
        if !self.supports(kind) {
            log::debug!("dropping `{}` event: not supported by this backend", kind);
            return;
        }

        {
            let mut delivery = self.delivery.lock();
            delivery.queue.push_back(event);
            if delivery.draining {
                return;
            }
            delivery.draining = true;
        }

        loop {
            let next = {
                let mut delivery = self.delivery.lock();
                match delivery.queue.pop_front() {
                    Some(event) => event,
                    None => {
                        delivery.draining = false;
                        break;
                    }
                }
            };
            self.deliver(&next);
        }
    }

    fn deliver(&self, event: &AudioEvent) {
        let kind = event.kind();
        let listeners = self.registry.lock().snapshot(kind);

        for listener in listeners {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| listener(event)));
            if let Err(payload) = outcome {
                let message = format!("`{}` listener panicked: {}", kind, panic_message(&*payload));
                log::error!("{}", message);
                if kind != EventKind::Error {
                    self.delivery.lock().queue.push_back(AudioEvent::error(message));
                }
            }
        }
    }

    fn check(&self, kind: EventKind) -> Result<(), EventError> {
        if self.supports(kind) {
            Ok(())
        } else {
            Err(EventError::InvalidEventKind {
                kind: kind.as_str().to_string(),
                available: available_kinds(&self.supported),
            })
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}
