use log::{debug, error};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
use std::thread;

use crate::preferences::PreferenceStore;
use crate::resolver::ChapterResolver;
use crate::session::{FetchTicket, SessionEvent};

/// Runs hydration and chapter resolution off the UI thread.
///
/// Every session shares the same channel; results are tagged with the ticket
/// they were requested for and the receiving session filters them.
pub struct SessionLoader {
    resolver: ChapterResolver,
    preferences: Arc<PreferenceStore>,
    sender: Sender<SessionEvent>,
    receiver: Receiver<SessionEvent>,
}

impl SessionLoader {
    pub fn new(resolver: ChapterResolver, preferences: Arc<PreferenceStore>) -> Self {
        let (sender, receiver) = channel();
        Self {
            resolver,
            preferences,
            sender,
            receiver,
        }
    }

    pub fn preferences(&self) -> Arc<PreferenceStore> {
        self.preferences.clone()
    }

    /// Starts hydration and chapter loading for `ticket` in parallel.
    pub fn spawn(&self, ticket: FetchTicket) {
        let preferences = self.preferences.clone();
        let sender = self.sender.clone();
        run_in_background("novera-hydrate", move || {
            let stored = preferences.hydrate();
            let _ = sender.send(SessionEvent::PreferencesHydrated { ticket, stored });
        });

        let resolver = self.resolver.clone();
        let sender = self.sender.clone();
        run_in_background("novera-chapter", move || {
            let result = resolver.resolve(ticket.route);
            let _ = sender.send(SessionEvent::ChapterLoaded { ticket, result });
        });
    }

    /// Events that arrived since the last call, oldest first.
    pub fn drain(&self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        events
    }

    /// Blocks for the next event, used by tests and the headless runner.
    pub fn recv_timeout(&self, timeout: std::time::Duration) -> Option<SessionEvent> {
        self.receiver.recv_timeout(timeout).ok()
    }
}

fn run_in_background<F>(name: &str, job: F)
where
    F: FnOnce() + Send + 'static,
{
    // The job is shared so it can still run inline if the thread cannot start.
    let job = Arc::new(std::sync::Mutex::new(Some(job)));
    let thread_job = job.clone();
    let spawned = thread::Builder::new().name(name.to_string()).spawn(move || {
        if let Some(job) = thread_job.lock().ok().and_then(|mut slot| slot.take()) {
            job();
        }
    });

    match spawned {
        Ok(_) => debug!("Started {name}"),
        Err(e) => {
            error!("Failed to start {name} thread, running inline: {e}");
            if let Some(job) = job.lock().ok().and_then(|mut slot| slot.take()) {
                job();
            }
        }
    }
}
