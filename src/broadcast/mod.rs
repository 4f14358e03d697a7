// src/broadcast/mod.rs — Mood fan-out to meeting observers
//
// Per-meeting pub/sub over tokio broadcast channels. Channels live behind an
// Arc in the registry map, so the hot path (publish, subscribe, snapshot
// reads) takes only a read lock on the map; the map's write lock is reserved
// for creating and removing meetings. Publishing never blocks: each
// subscriber owns a bounded ring buffer and a slow subscriber loses its
// oldest buffered updates (broadcast lag), never the publisher's progress.
// Late joiners hydrate from the snapshot; there is no replay log.
//
// Lifecycle: the executor retires a meeting at run end. If observers are
// still attached, the channel is only marked finished; the last observer's
// disconnect removes it. Subscribing to an unknown meeting id yields an
// empty, immediately-ended subscription and creates nothing.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::RwLock;

use crate::core::types::MoodState;

type MeetingMap = HashMap<String, Arc<MeetingChannel>>;

struct MeetingChannel {
    tx: broadcast::Sender<MoodState>,
    /// Latest mood per agent; at most one entry per agent, never a history.
    current: RwLock<HashMap<String, MoodState>>,
    /// Set at run end when observers are still attached; the last observer's
    /// disconnect then removes the meeting.
    finished: AtomicBool,
}

impl MeetingChannel {
    fn new(capacity: usize, current: HashMap<String, MoodState>) -> Arc<Self> {
        Arc::new(Self {
            tx: broadcast::channel(capacity).0,
            current: RwLock::new(current),
            finished: AtomicBool::new(false),
        })
    }
}

pub struct MoodBroadcaster {
    meetings: Arc<RwLock<MeetingMap>>,
    capacity: usize,
    heartbeat: Duration,
}

impl MoodBroadcaster {
    pub fn new(capacity: usize, heartbeat: Duration) -> Self {
        Self {
            meetings: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
            heartbeat,
        }
    }

    /// Seed one neutral mood per agent at run start.
    pub async fn init_meeting(&self, meeting_id: &str, agent_ids: &[String]) {
        let current = agent_ids
            .iter()
            .map(|id| (id.clone(), MoodState::neutral(id.clone())))
            .collect();
        self.meetings
            .write()
            .await
            .insert(meeting_id.to_string(), MeetingChannel::new(self.capacity, current));
    }

    /// Deliver an update to current observers and fold it into the snapshot.
    pub async fn publish(&self, meeting_id: &str, update: MoodState) {
        let channel = match self.meetings.read().await.get(meeting_id) {
            Some(channel) => Arc::clone(channel),
            None => self.create_channel(meeting_id).await,
        };
        channel
            .current
            .write()
            .await
            .insert(update.agent_id.clone(), update.clone());
        // Err means no subscribers right now; the snapshot already has it.
        let _ = channel.tx.send(update);
    }

    /// Latest snapshot, used to hydrate late joiners.
    pub async fn current(&self, meeting_id: &str) -> HashMap<String, MoodState> {
        let channel = self.meetings.read().await.get(meeting_id).cloned();
        match channel {
            Some(channel) => channel.current.read().await.clone(),
            None => HashMap::new(),
        }
    }

    /// Subscribe to a meeting. The returned handle yields the snapshot first,
    /// then live updates; dropping it unsubscribes. An unknown meeting id
    /// yields an empty subscription that ends immediately and leaves no trace
    /// in the registry.
    pub async fn subscribe(&self, meeting_id: &str) -> MoodSubscription {
        let channel = self.meetings.read().await.get(meeting_id).cloned();
        let (snapshot, rx) = match channel {
            Some(channel) => {
                let mut snapshot: Vec<MoodState> =
                    channel.current.read().await.values().cloned().collect();
                snapshot.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
                (snapshot, channel.tx.subscribe())
            }
            None => {
                let (tx, rx) = broadcast::channel(1);
                drop(tx);
                (Vec::new(), rx)
            }
        };
        MoodSubscription {
            snapshot: snapshot.into(),
            rx,
            heartbeat: self.heartbeat,
            dropped: 0,
            guard: SubscriptionGuard {
                meeting_id: meeting_id.to_string(),
                meetings: Arc::downgrade(&self.meetings),
            },
        }
    }

    /// End-of-run cleanup. Removes the meeting outright when nobody is
    /// watching; otherwise marks it finished so the last observer's
    /// disconnect removes it.
    pub async fn retire(&self, meeting_id: &str) {
        let mut meetings = self.meetings.write().await;
        if let Some(channel) = meetings.get(meeting_id) {
            if channel.tx.receiver_count() == 0 {
                meetings.remove(meeting_id);
            } else {
                channel.finished.store(true, Ordering::SeqCst);
            }
        }
    }

    pub async fn meeting_count(&self) -> usize {
        self.meetings.read().await.len()
    }

    async fn create_channel(&self, meeting_id: &str) -> Arc<MeetingChannel> {
        let mut meetings = self.meetings.write().await;
        Arc::clone(
            meetings
                .entry(meeting_id.to_string())
                .or_insert_with(|| MeetingChannel::new(self.capacity, HashMap::new())),
        )
    }
}

/// Removes a finished meeting once its last observer disconnects. The sweep
/// runs as a spawned task so a synchronous drop never contends for the
/// registry lock.
pub struct SubscriptionGuard {
    meeting_id: String,
    meetings: Weak<RwLock<MeetingMap>>,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        let Some(meetings) = self.meetings.upgrade() else {
            return;
        };
        let meeting_id = std::mem::take(&mut self.meeting_id);
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        handle.spawn(async move {
            let mut meetings = meetings.write().await;
            if let Some(channel) = meetings.get(&meeting_id) {
                if channel.finished.load(Ordering::SeqCst) && channel.tx.receiver_count() == 0 {
                    meetings.remove(&meeting_id);
                }
            }
        });
    }
}

/// Subscription handle: snapshot first, then live updates, with a
/// transport-agnostic heartbeat interval for keep-alives.
pub struct MoodSubscription {
    snapshot: VecDeque<MoodState>,
    rx: broadcast::Receiver<MoodState>,
    heartbeat: Duration,
    dropped: u64,
    guard: SubscriptionGuard,
}

impl MoodSubscription {
    /// Next update. Snapshot entries drain first; afterwards this waits on
    /// live publishes. Returns `None` when the meeting is retired.
    pub async fn next(&mut self) -> Option<MoodState> {
        if let Some(state) = self.snapshot.pop_front() {
            return Some(state);
        }
        loop {
            match self.rx.recv().await {
                Ok(state) => return Some(state),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // Oldest buffered updates were dropped; keep reading.
                    self.dropped += n;
                    tracing::debug!(dropped = self.dropped, "slow mood subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Updates lost to this subscriber's bounded queue so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn heartbeat(&self) -> Duration {
        self.heartbeat
    }

    /// Decompose for transports that drive the receiver themselves (SSE).
    /// The guard must be kept alive alongside the receiver so disconnecting
    /// still cleans up the meeting.
    pub fn into_parts(
        self,
    ) -> (
        Vec<MoodState>,
        broadcast::Receiver<MoodState>,
        Duration,
        SubscriptionGuard,
    ) {
        (self.snapshot.into(), self.rx, self.heartbeat, self.guard)
    }
}
