//! Turn Timers
//!
//! One cancellable deadline per session. Arming a session's timer aborts
//! the previous task and bumps a generation counter; a firing task must
//! claim its generation before acting, so a timer that lost a race with
//! cancellation or re-arming can never touch a later round.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::game::state::SessionId;

/// Run `task` after `delay` on the runtime.
pub(crate) fn spawn_after<F>(delay: Duration, task: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        task.await;
    })
}

struct ArmedTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Per-session turn deadlines.
pub(crate) struct TurnTimers {
    armed: Mutex<BTreeMap<SessionId, ArmedTimer>>,
    next_generation: AtomicU64,
}

impl TurnTimers {
    pub(crate) fn new() -> Self {
        Self {
            armed: Mutex::new(BTreeMap::new()),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Arm the timer for a session, replacing any armed one.
    ///
    /// `on_fire` receives the generation it must claim.
    pub(crate) async fn arm<F, Fut>(&self, session_id: SessionId, delay: Duration, on_fire: F) -> u64
    where
        F: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut armed = self.armed.lock().await;
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let handle = spawn_after(delay, on_fire(generation));

        if let Some(previous) = armed.insert(session_id, ArmedTimer { generation, handle }) {
            previous.handle.abort();
            debug!(%session_id, stale = previous.generation, generation, "turn timer re-armed");
        }

        generation
    }

    /// Cancel a session's timer. Returns true if one was armed.
    pub(crate) async fn cancel(&self, session_id: SessionId) -> bool {
        match self.armed.lock().await.remove(&session_id) {
            Some(timer) => {
                timer.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Claim the right to act for a firing timer.
    ///
    /// Succeeds only if `generation` is still the armed one; the entry is
    /// removed so nothing can abort the claiming task afterwards.
    pub(crate) async fn claim(&self, session_id: SessionId, generation: u64) -> bool {
        let mut armed = self.armed.lock().await;
        match armed.get(&session_id) {
            Some(timer) if timer.generation == generation => {
                armed.remove(&session_id);
                true
            }
            _ => false,
        }
    }

    #[cfg(test)]
    pub(crate) async fn is_armed(&self, session_id: SessionId) -> bool {
        self.armed.lock().await.contains_key(&session_id)
    }

    /// Generation of the armed timer, if any.
    #[cfg(test)]
    pub(crate) async fn armed_generation(&self, session_id: SessionId) -> Option<u64> {
        self.armed.lock().await.get(&session_id).map(|timer| timer.generation)
    }

    #[cfg(test)]
    pub(crate) async fn armed_count(&self) -> usize {
        self.armed.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_with_its_generation() {
        let timers = Arc::new(TurnTimers::new());
        let (tx, mut rx) = mpsc::channel(4);

        let generation = timers
            .arm(SessionId(1), Duration::from_secs(120), move |generation| async move {
                let _ = tx.send(generation).await;
            })
            .await;

        let fired = rx.recv().await.unwrap();
        assert_eq!(fired, generation);
        assert!(timers.claim(SessionId(1), fired).await);
        assert!(!timers.is_armed(SessionId(1)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_previous_timer() {
        let timers = TurnTimers::new();
        let (tx, mut rx) = mpsc::channel(4);

        let tx_first = tx.clone();
        let first = timers
            .arm(SessionId(1), Duration::from_secs(60), move |g| async move {
                let _ = tx_first.send(g).await;
            })
            .await;
        let second = timers
            .arm(SessionId(1), Duration::from_secs(120), move |g| async move {
                let _ = tx.send(g).await;
            })
            .await;

        assert_ne!(first, second);
        assert_eq!(timers.armed_count().await, 1);
        // The aborted first task never reports.
        assert_eq!(rx.recv().await, Some(second));
        assert!(!timers.claim(SessionId(1), first).await);
        assert!(timers.claim(SessionId(1), second).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_firing() {
        let timers = TurnTimers::new();
        let (tx, mut rx) = mpsc::channel::<u64>(4);

        timers
            .arm(SessionId(7), Duration::from_secs(10), move |g| async move {
                let _ = tx.send(g).await;
            })
            .await;

        assert!(timers.cancel(SessionId(7)).await);
        assert!(!timers.cancel(SessionId(7)).await);
        // Sender dropped with the aborted task, so the channel closes empty.
        assert_eq!(rx.recv().await, None);
    }
}
