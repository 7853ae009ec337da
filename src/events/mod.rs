//! The process-wide event bus of spec section 4.7. Subscribers register a
//! non-blocking callback; each publish takes the subscriber-list lock only
//! long enough to clone the list, then invokes every callback outside the
//! lock, on the publisher's thread, in subscription order.

use std::sync::{Arc, Mutex};

use datatype::Event;

type Listener = Arc<Fn(&Event) + Send + Sync>;

#[derive(Default)]
pub struct Bus {
    listeners: Mutex<Vec<Listener>>,
}

impl Bus {
    pub fn new() -> Bus {
        Bus { listeners: Mutex::new(Vec::new()) }
    }

    /// Register a callback. No event published before this call is
    /// replayed to it (spec section 4.7 "late subscribers miss prior
    /// events").
    pub fn subscribe<F: Fn(&Event) + Send + Sync + 'static>(&self, listener: F) {
        let mut listeners = self.listeners.lock().expect("events bus lock");
        listeners.push(Arc::new(listener));
    }

    /// Publish one event to every current subscriber, in publish order.
    pub fn publish(&self, event: Event) {
        let snapshot: Vec<Listener> = self.listeners.lock().expect("events bus lock").clone();
        for listener in &snapshot {
            listener(&event);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use datatype::UpdateCheck;
    use std::sync::{Arc, Mutex as StdMutex};

    #[test]
    fn subscribers_see_events_in_publish_order() {
        let bus = Bus::new();
        let seen = Arc::new(StdMutex::new(Vec::new()));

        let seen1 = seen.clone();
        bus.subscribe(move |event| seen1.lock().unwrap().push(format!("{:?}", event)));

        bus.publish(Event::UpdateCheckComplete(UpdateCheck::NoUpdatesAvailable));
        bus.publish(Event::PutManifestComplete(true));

        let log = seen.lock().unwrap();
        assert_eq!(log.len(), 2);
        assert!(log[0].contains("NoUpdatesAvailable"));
        assert!(log[1].contains("PutManifestComplete"));
    }

    #[test]
    fn late_subscriber_misses_prior_events() {
        let bus = Bus::new();
        bus.publish(Event::PutManifestComplete(true));

        let seen = Arc::new(StdMutex::new(0));
        let seen1 = seen.clone();
        bus.subscribe(move |_| *seen1.lock().unwrap() += 1);

        assert_eq!(*seen.lock().unwrap(), 0);
    }
}
