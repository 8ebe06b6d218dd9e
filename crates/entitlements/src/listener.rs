//! Background transaction listener.
//!
//! One dedicated thread owns the update feed for the lifetime of the store:
//! it verifies each signed update, applies it and acknowledges it. Shutdown
//! is observed between updates only, so an update is either fully processed
//! or not touched.

use std::io;
use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use entitlekit_events::{EventBus, Subscription};
use entitlekit_verification::SignedTransaction;

use crate::store::EntitlementStore;

/// Counters of a running listener.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerStats {
    pub received: u64,
    pub applied: u64,
    pub rejected: u64,
}

/// Handle to stop and join the listener thread.
///
/// Dropping the handle also stops the listener and waits for it.
#[derive(Debug)]
pub struct ListenerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
    stats: Arc<Mutex<ListenerStats>>,
}

impl ListenerHandle {
    /// Request shutdown and wait for the listener to stop.
    pub fn shutdown(mut self) {
        self.stop();
    }

    pub fn stats(&self) -> ListenerStats {
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_running(&self) -> bool {
        self.join.as_ref().is_some_and(|j| !j.is_finished())
    }

    fn stop(&mut self) {
        let _ = self.shutdown.send(());
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Debug)]
pub struct TransactionListener;

impl TransactionListener {
    /// Subscribe to `feed` and start processing updates on a named thread.
    ///
    /// The subscription is taken before this returns, so every update
    /// published afterwards is seen by the listener.
    pub fn spawn<B>(store: Arc<EntitlementStore>, feed: &B) -> io::Result<ListenerHandle>
    where
        B: EventBus<SignedTransaction> + ?Sized,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let updates = feed.subscribe();
        let stats = Arc::new(Mutex::new(ListenerStats::default()));
        let tick = store.config().listener_tick();

        let worker_stats = stats.clone();
        let join = thread::Builder::new()
            .name("entitlements-listener".to_string())
            .spawn(move || listen(store, updates, shutdown_rx, tick, worker_stats))?;

        Ok(ListenerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
            stats,
        })
    }
}

fn listen(
    store: Arc<EntitlementStore>,
    updates: Subscription<SignedTransaction>,
    shutdown_rx: mpsc::Receiver<()>,
    tick: Duration,
    stats: Arc<Mutex<ListenerStats>>,
) {
    info!("transaction listener started");

    loop {
        match shutdown_rx.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => break,
            Err(TryRecvError::Empty) => {}
        }

        match updates.recv_timeout(tick) {
            Ok(signed) => {
                let applied = store.handle_update(&signed).is_some();
                let mut stats = stats.lock().unwrap_or_else(PoisonError::into_inner);
                stats.received += 1;
                if applied {
                    stats.applied += 1;
                } else {
                    stats.rejected += 1;
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                debug!("transaction feed closed");
                break;
            }
        }
    }

    info!("transaction listener stopped");
}
