//! Coalescing, debounced session writer.
//!
//! Each open session gets one [`SaveQueue`], backed by a tokio task that owns the pending state.
//! Scheduled saves replace each other and restart the quiet-period timer, so a burst of edits
//! produces one write. Writes are performed one at a time in the order they are requested.

use crate::model::SessionState;
use crate::session_store::{BlobStore, LocalCache, SaveOutcome, SessionStore};
use crate::workspace::SaveHint;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

enum Command {
    Schedule(SessionState),
    SaveNow(SessionState, oneshot::Sender<SaveOutcome>),
    Close(oneshot::Sender<()>),
}

/// Cloneable sending side of a [`SaveQueue`].
///
/// Handles let callers await a write without holding whatever lock guards the workspace.
#[derive(Clone)]
pub struct SaveHandle {
    commands: mpsc::UnboundedSender<Command>,
    last_outcome: watch::Receiver<Option<SaveOutcome>>,
}

impl SaveHandle {
    /// Replaces any pending state with `state` and restarts the quiet period.
    pub fn schedule(&self, state: SessionState) {
        if self.commands.send(Command::Schedule(state)).is_err() {
            tracing::warn!("save queue has stopped; scheduled save dropped");
        }
    }

    /// Drops any pending state and writes `state` right away.
    pub async fn save_now(&self, state: SessionState) -> SaveOutcome {
        let (reply, outcome) = oneshot::channel();
        if self.commands.send(Command::SaveNow(state, reply)).is_err() {
            return stopped();
        }
        outcome.await.unwrap_or_else(|_| stopped())
    }

    /// Routes a workspace change to the right kind of save.
    ///
    /// Returns the outcome only for immediate saves.
    pub async fn apply(&self, hint: SaveHint, state: &SessionState) -> Option<SaveOutcome> {
        match hint {
            SaveHint::None => None,
            SaveHint::Debounced => {
                self.schedule(state.clone());
                None
            }
            SaveHint::Immediate => Some(self.save_now(state.clone()).await),
        }
    }

    /// Outcome of the most recent write, if any has completed.
    pub fn last_outcome(&self) -> Option<SaveOutcome> {
        self.last_outcome.borrow().clone()
    }

    /// Flushes any pending state and stops the writer task. Later requests through any handle
    /// are dropped with a warning.
    pub async fn close(&self) {
        let (done, closed) = oneshot::channel();
        if self.commands.send(Command::Close(done)).is_ok() {
            let _ = closed.await;
        }
    }
}

pub struct SaveQueue {
    handle: SaveHandle,
    worker: JoinHandle<()>,
}

impl SaveQueue {
    /// Starts the writer task for `user_id`. Must be called from within a tokio runtime.
    pub fn spawn<R, L>(
        store: Arc<SessionStore<R, L>>,
        user_id: impl Into<String>,
        quiet_period: Duration,
    ) -> Self
    where
        R: BlobStore + 'static,
        L: LocalCache + 'static,
    {
        let (commands, receiver) = mpsc::unbounded_channel();
        let (outcome_tx, last_outcome) = watch::channel(None);
        let worker = tokio::spawn(run(
            store,
            user_id.into(),
            quiet_period,
            receiver,
            outcome_tx,
        ));

        Self {
            handle: SaveHandle {
                commands,
                last_outcome,
            },
            worker,
        }
    }

    /// A handle that keeps working after this queue is dropped; the task stops on
    /// [`SaveHandle::close`] or once every handle is gone.
    pub fn handle(&self) -> SaveHandle {
        self.handle.clone()
    }

    /// Flushes any pending state and waits for the writer task to finish.
    pub async fn close(self) {
        self.handle.close().await;
        if let Err(e) = self.worker.await {
            tracing::error!("save queue task failed: {}", e);
        }
    }
}

impl Deref for SaveQueue {
    type Target = SaveHandle;

    fn deref(&self) -> &SaveHandle {
        &self.handle
    }
}

fn stopped() -> SaveOutcome {
    SaveOutcome::Failed {
        warning: "save queue has stopped".into(),
    }
}

async fn run<R, L>(
    store: Arc<SessionStore<R, L>>,
    user_id: String,
    quiet_period: Duration,
    mut commands: mpsc::UnboundedReceiver<Command>,
    outcomes: watch::Sender<Option<SaveOutcome>>,
) where
    R: BlobStore,
    L: LocalCache,
{
    let mut pending: Option<SessionState> = None;
    let mut deadline = Instant::now();

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Schedule(state)) => {
                    pending = Some(state);
                    deadline = Instant::now() + quiet_period;
                }
                Some(Command::SaveNow(state, reply)) => {
                    pending = None;
                    let outcome = write(&store, &user_id, &state, &outcomes).await;
                    let _ = reply.send(outcome);
                }
                Some(Command::Close(done)) => {
                    flush(&store, &user_id, pending.take(), &outcomes).await;
                    let _ = done.send(());
                    return;
                }
                None => break,
            },
            _ = sleep_until(deadline), if pending.is_some() => {
                if let Some(state) = pending.take() {
                    write(&store, &user_id, &state, &outcomes).await;
                }
            }
        }
    }

    flush(&store, &user_id, pending.take(), &outcomes).await;
}

async fn flush<R, L>(
    store: &SessionStore<R, L>,
    user_id: &str,
    pending: Option<SessionState>,
    outcomes: &watch::Sender<Option<SaveOutcome>>,
) where
    R: BlobStore,
    L: LocalCache,
{
    if let Some(state) = pending {
        tracing::debug!("flushing pending save for {} on close", user_id);
        write(store, user_id, &state, outcomes).await;
    }
}

async fn write<R, L>(
    store: &SessionStore<R, L>,
    user_id: &str,
    state: &SessionState,
    outcomes: &watch::Sender<Option<SaveOutcome>>,
) -> SaveOutcome
where
    R: BlobStore,
    L: LocalCache,
{
    let outcome = store.save(user_id, state).await;
    if let Some(warning) = outcome.warning() {
        tracing::warn!("save for {}: {}", user_id, warning);
    }
    outcomes.send_replace(Some(outcome.clone()));
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Diagnosis;
    use crate::session_store::MemoryCache;
    use crate::{StoreError, StoreResult};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::Notify;

    #[derive(Clone, Default)]
    struct RecordingRemote {
        uploads: Arc<Mutex<Vec<String>>>,
        offline: bool,
    }

    impl BlobStore for RecordingRemote {
        async fn fetch(&self, _filename: &str) -> StoreResult<String> {
            Err(StoreError::NotFound)
        }

        async fn upload(&self, _filename: &str, body: String) -> StoreResult<()> {
            if self.offline {
                return Err(StoreError::Network("offline".into()));
            }
            self.uploads.lock().unwrap().push(body);
            Ok(())
        }
    }

    fn state(tag: &str) -> SessionState {
        SessionState {
            confirmed_groups: Vec::new(),
            unsorted_diagnoses: vec![Diagnosis::new(tag, tag)],
        }
    }

    fn queue(remote: &RecordingRemote) -> SaveQueue {
        let store = Arc::new(SessionStore::new(Some(remote.clone()), MemoryCache::new()));
        SaveQueue::spawn(store, "u1", Duration::from_millis(1_000))
    }

    fn uploaded(remote: &RecordingRemote) -> Vec<SessionState> {
        remote
            .uploads
            .lock()
            .unwrap()
            .iter()
            .map(|raw| SessionState::from_json(raw).unwrap())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_schedules_is_written_once() {
        let remote = RecordingRemote::default();
        let queue = queue(&remote);

        queue.schedule(state("a"));
        tokio::time::sleep(Duration::from_millis(600)).await;
        queue.schedule(state("b"));
        tokio::time::sleep(Duration::from_millis(600)).await;
        queue.schedule(state("c"));
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(uploaded(&remote).is_empty());

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(uploaded(&remote), vec![state("c")]);
        assert!(queue.last_outcome().unwrap().is_remote());
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_now_bypasses_and_cancels_pending() {
        let remote = RecordingRemote::default();
        let queue = queue(&remote);

        queue.schedule(state("pending"));
        let outcome = queue.save_now(state("now")).await;
        assert!(outcome.is_remote());
        assert_eq!(uploaded(&remote), vec![state("now")]);

        tokio::time::sleep(Duration::from_millis(5_000)).await;
        assert_eq!(uploaded(&remote), vec![state("now")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_flushes_pending_state() {
        let remote = RecordingRemote::default();
        let queue = queue(&remote);

        queue.schedule(state("last"));
        queue.close().await;
        assert_eq!(uploaded(&remote), vec![state("last")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_routes_hints() {
        let remote = RecordingRemote::default();
        let queue = queue(&remote);

        assert!(queue.apply(SaveHint::None, &state("x")).await.is_none());
        assert!(queue.apply(SaveHint::Debounced, &state("y")).await.is_none());
        let immediate = queue.apply(SaveHint::Immediate, &state("z")).await;
        assert!(immediate.unwrap().is_remote());

        tokio::time::sleep(Duration::from_millis(2_000)).await;
        assert_eq!(uploaded(&remote), vec![state("z")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_close_flushes_and_stops() {
        let remote = RecordingRemote::default();
        let queue = queue(&remote);
        let handle = queue.handle();
        drop(queue);

        handle.schedule(state("pending"));
        handle.close().await;
        assert_eq!(uploaded(&remote), vec![state("pending")]);

        let outcome = handle.save_now(state("late")).await;
        assert!(matches!(outcome, SaveOutcome::Failed { .. }));
        assert_eq!(uploaded(&remote), vec![state("pending")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_save_reports_fallback() {
        let remote = RecordingRemote {
            offline: true,
            ..Default::default()
        };
        let queue = queue(&remote);

        let outcome = queue.save_now(state("a")).await;
        assert!(matches!(outcome, SaveOutcome::FallbackCache { .. }));
        assert_eq!(queue.last_outcome(), Some(outcome));
    }

    /// Uploads block until released, so a write can be held in flight.
    #[derive(Clone, Default)]
    struct GatedRemote {
        started: Arc<Notify>,
        release: Arc<Notify>,
        uploads: Arc<Mutex<Vec<String>>>,
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
    }

    impl BlobStore for GatedRemote {
        async fn fetch(&self, _filename: &str) -> StoreResult<String> {
            Err(StoreError::NotFound)
        }

        async fn upload(&self, _filename: &str, body: String) -> StoreResult<()> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.started.notify_one();
            self.release.notified().await;
            self.uploads.lock().unwrap().push(body);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_during_write_waits_for_it() {
        let remote = GatedRemote::default();
        let store = Arc::new(SessionStore::new(Some(remote.clone()), MemoryCache::new()));
        let queue = SaveQueue::spawn(store, "u1", Duration::from_millis(1_000));

        queue.schedule(state("first"));
        remote.started.notified().await;

        queue.schedule(state("second"));
        tokio::time::sleep(Duration::from_millis(5_000)).await;
        assert!(remote.uploads.lock().unwrap().is_empty());
        assert_eq!(remote.in_flight.load(Ordering::SeqCst), 1);

        remote.release.notify_one();
        remote.started.notified().await;
        remote.release.notify_one();
        queue.close().await;

        let written: Vec<SessionState> = remote
            .uploads
            .lock()
            .unwrap()
            .iter()
            .map(|raw| SessionState::from_json(raw).unwrap())
            .collect();
        assert_eq!(written, vec![state("first"), state("second")]);
        assert_eq!(remote.max_in_flight.load(Ordering::SeqCst), 1);
    }
}
