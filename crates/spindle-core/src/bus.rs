//! EventBus: fan-out publish/subscribe over bounded per-subscriber channels.
//!
//! # 学習ポイント
//! - publish と close が同じ Mutex を使うので、close 済みのチャネルへ送ることはない
//! - 満杯の subscriber はブロックせず drop してカウントする（遅い購読者に全体を止めさせない）

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::config::BusConfig;
use crate::domain::SubscriberId;
use crate::error::BusError;

struct SubscriberEntry<E> {
    id: SubscriberId,
    tx: mpsc::Sender<E>,
    dropped: u64,
}

struct BusState<E> {
    subscribers: Vec<SubscriberEntry<E>>,
    closed: bool,
    published: u64,
    /// Bus-wide drop count; outlives the entries `close()` clears.
    dropped: u64,
}

/// Receiving end handed out by `EventBus::subscribe`.
///
/// After the bus closes, `recv()` still yields whatever was buffered and then
/// returns `None`.
pub struct Subscription<E> {
    id: SubscriberId,
    rx: mpsc::Receiver<E>,
}

impl<E> Subscription<E> {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub async fn recv(&mut self) -> Option<E> {
        self.rx.recv().await
    }

    /// Non-blocking receive; `None` when nothing is buffered right now.
    pub fn try_recv(&mut self) -> Option<E> {
        self.rx.try_recv().ok()
    }
}

/// What happened to one published event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReport {
    pub delivered: usize,
    /// Subscribers whose buffer was full.
    pub dropped: usize,
    /// Subscribers that dropped their `Subscription`.
    pub detached: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusStats {
    pub subscribers: usize,
    pub published: u64,
    pub dropped: u64,
    pub closed: bool,
}

pub struct EventBus<E> {
    state: Mutex<BusState<E>>,
    capacity: usize,
}

impl<E: Clone + Send> EventBus<E> {
    /// `capacity` is the buffer size of each subscriber channel.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(BusState {
                subscribers: Vec::new(),
                closed: false,
                published: 0,
                dropped: 0,
            }),
            capacity: capacity.max(1),
        }
    }

    pub fn from_config(config: &BusConfig) -> Self {
        Self::new(config.capacity)
    }

    pub async fn subscribe(&self) -> Result<Subscription<E>, BusError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(BusError::Closed);
        }

        let (tx, rx) = mpsc::channel(self.capacity);
        let id = SubscriberId::generate();
        state.subscribers.push(SubscriberEntry { id, tx, dropped: 0 });

        tracing::debug!(subscriber = %id, total = state.subscribers.len(), "subscribed");
        Ok(Subscription { id, rx })
    }

    /// Send `event` to every registered subscriber, in subscription order.
    ///
    /// Never waits on a subscriber: a full buffer drops the event for that
    /// subscriber only.
    pub async fn publish(&self, event: E) -> Result<PublishReport, BusError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(BusError::Closed);
        }
        state.published += 1;

        let mut report = PublishReport::default();
        for entry in state.subscribers.iter_mut() {
            match entry.tx.try_send(event.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    entry.dropped += 1;
                    report.dropped += 1;
                    tracing::warn!(subscriber = %entry.id, dropped = entry.dropped, "subscriber buffer full, event dropped");
                }
                Err(TrySendError::Closed(_)) => report.detached += 1,
            }
        }
        state.dropped += report.dropped as u64;

        Ok(report)
    }

    /// Close every subscriber channel and refuse further use.
    ///
    /// Returns `false` if the bus was already closed.
    pub async fn close(&self) -> bool {
        let mut state = self.state.lock().await;
        if state.closed {
            return false;
        }
        state.closed = true;

        // dropping the senders closes the channels
        let closed = state.subscribers.len();
        state.subscribers.clear();

        tracing::info!(subscribers = closed, published = state.published, "event bus closed");
        true
    }

    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    pub async fn stats(&self) -> BusStats {
        let state = self.state.lock().await;
        BusStats {
            subscribers: state.subscribers.len(),
            published: state.published,
            dropped: state.dropped,
            closed: state.closed,
        }
    }
}

impl<E: Clone + Send> Default for EventBus<E> {
    fn default() -> Self {
        Self::from_config(&BusConfig::default())
    }
}
