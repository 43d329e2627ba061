//! Tickers and guards driving the pending-transaction watch loop.

use alloy_primitives::Address;
use async_trait::async_trait;
use tokio::sync::mpsc::{error::TrySendError, Receiver, Sender};
use tracing::{error, trace, warn};

use std::{collections::HashSet, fmt::Debug, future::Future, pin::Pin, sync::Mutex, time::Duration};

pub type TickerFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Trait implemented for exposing a ticking mechanism.
///
/// Used in a looped [tokio::select!], so implementations must be cancellation
/// safe: dropping an unfinished `tick()` future and calling it again is a no-op.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait Ticker<Item>: Send + Sync + 'static
where
    Item: Send + Sync + 'static,
{
    /// Waits for the tick to trigger and returns [Some(Item)].
    ///
    /// Returns [None] if the ticker is stopped.
    async fn tick(&mut self) -> Option<Item>;
}

/// Poll round ticker that wraps around [Receiver] to ensure cancellation safety.
///
/// Built from a bare channel it ticks only when something is sent, which makes
/// polling deterministic in tests.
pub struct PollTicker(Receiver<u64>);

impl From<Receiver<u64>> for PollTicker {
    fn from(value: Receiver<u64>) -> Self {
        Self(value)
    }
}

#[async_trait]
impl Ticker<u64> for PollTicker {
    async fn tick(&mut self) -> Option<u64> {
        self.0.recv().await
    }
}

/// A ticker firing immediately and then every `interval`, numbering the rounds.
///
/// The returned future drives the ticker and must be spawned.
pub fn interval_ticker(interval: Duration) -> (PollTicker, TickerFuture) {
    let (tx, rx) = tokio::sync::mpsc::channel(1);

    let future = Box::pin(async move {
        let mut round = 0u64;
        let mut delay = None;
        loop {
            let item = round;
            if let Err(e) = tick_fn(delay, &tx, || Some(item)).await {
                error!(error = ?e, "Poll ticker channel is closed, stopping");
                return;
            }
            round += 1;
            delay = Some(interval);
        }
    });

    (rx.into(), future)
}

/// Function used for sending one tick on the provided [Sender], after an optional delay.
///
/// If the channel is full, the tick [Item] is dropped. Errors out if the channel is closed.
async fn tick_fn<Item, F>(
    sleep_duration: Option<Duration>,
    tx: &Sender<Item>,
    item_fn: F,
) -> Result<(), String>
where
    Item: Debug + Copy,
    F: Fn() -> Option<Item>,
{
    if let Some(duration) = sleep_duration {
        tokio::time::sleep(duration).await;
    }

    match item_fn() {
        Some(item) => match tx.try_send(item) {
            Ok(_) => trace!(item = ?item, "Poll tick"),
            Err(e) => match e {
                // the previous round is still running
                TrySendError::Full(_) => warn!(item = ?item, "Poll channel full, skipping round"),
                TrySendError::Closed(_) => return Err("poll channel is closed".to_string()),
            },
        },
        None => {
            warn!("Poll round not available");
        }
    }

    Ok(())
}

/// Safes with a poll currently in flight.
#[derive(Debug, Default)]
pub struct InFlight(Mutex<HashSet<Address>>);

impl InFlight {
    /// Marks `safe` busy, or returns `None` if it already is.
    pub fn try_begin(&self, safe: Address) -> Option<InFlightGuard<'_>> {
        let mut busy = self.0.lock().ok()?;
        busy.insert(safe).then(|| InFlightGuard { in_flight: self, safe })
    }
}

/// Releases the Safe when dropped.
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    in_flight: &'a InFlight,
    safe: Address,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut busy) = self.in_flight.0.lock() {
            busy.remove(&self.safe);
        }
    }
}
