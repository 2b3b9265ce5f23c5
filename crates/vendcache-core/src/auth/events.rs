use std::sync::RwLock;

use super::session::Session;

/// Broadcast on every session transition. Exactly two shapes: a commit
/// carrying the new session, or a clear.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Committed(Session),
    Cleared,
}

type Listener = Box<dyn Fn(&SessionEvent) + Send + Sync>;

/// Registered transition listeners, dispatched synchronously in
/// registration order.
///
/// Listeners run inside the transition's critical section and must not
/// call back into the session store.
#[derive(Default)]
pub struct ListenerSet {
    listeners: RwLock<Vec<Listener>>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: impl Fn(&SessionEvent) + Send + Sync + 'static) {
        self.listeners.write().unwrap().push(Box::new(listener));
    }

    pub fn emit(&self, event: &SessionEvent) {
        for listener in self.listeners.read().unwrap().iter() {
            listener(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chrono::Utc;

    use crate::auth::session::SessionId;

    use super::*;

    fn sample_session() -> Session {
        Session {
            user_id: 12,
            display_name: "Test".to_string(),
            token: "tok".to_string(),
            selected_entity: None,
            session_id: SessionId::fresh(),
            issued_at: Utc::now(),
        }
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let set = ListenerSet::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let seen = Arc::clone(&seen);
            set.subscribe(move |_| seen.lock().unwrap().push(tag));
        }

        set.emit(&SessionEvent::Cleared);
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_commit_event_carries_the_session() {
        let set = ListenerSet::new();
        let seen_user = Arc::new(Mutex::new(None));
        {
            let seen_user = Arc::clone(&seen_user);
            set.subscribe(move |event| {
                if let SessionEvent::Committed(session) = event {
                    *seen_user.lock().unwrap() = Some(session.user_id);
                }
            });
        }

        set.emit(&SessionEvent::Committed(sample_session()));
        assert_eq!(*seen_user.lock().unwrap(), Some(12));
    }

    #[test]
    fn test_late_subscriber_misses_earlier_events() {
        let set = ListenerSet::new();
        set.emit(&SessionEvent::Cleared);

        let count = Arc::new(Mutex::new(0));
        {
            let count = Arc::clone(&count);
            set.subscribe(move |_| *count.lock().unwrap() += 1);
        }
        set.emit(&SessionEvent::Cleared);

        assert_eq!(*count.lock().unwrap(), 1);
    }
}
