//! Feed consumption task.
//!
//! Drains decoded stream events: market changes are merged into the
//! price cache, order changes are forwarded to whoever reconciles bet
//! settlement. Runs until the stream channel closes or shutdown is
//! signalled.

use crate::price_cache::PriceCache;
use greenbook_stream::{OrderChangeMessage, StreamEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct FeedTask {
    cache: Arc<PriceCache>,
    events: mpsc::Receiver<StreamEvent>,
    /// Order change messages are handed off rather than applied here;
    /// settlement needs the bet store, which this crate does not know.
    order_tx: Option<mpsc::Sender<OrderChangeMessage>>,
    shutdown_token: CancellationToken,
}

impl FeedTask {
    pub fn new(
        cache: Arc<PriceCache>,
        events: mpsc::Receiver<StreamEvent>,
        order_tx: Option<mpsc::Sender<OrderChangeMessage>>,
        shutdown_token: CancellationToken,
    ) -> Self {
        Self {
            cache,
            events,
            order_tx,
            shutdown_token,
        }
    }

    /// Consume events until shutdown or the stream side hangs up.
    pub async fn run(mut self) {
        info!("Feed task started");
        loop {
            tokio::select! {
                () = self.shutdown_token.cancelled() => {
                    info!("Feed task shutting down");
                    return;
                }
                event = self.events.recv() => {
                    match event {
                        Some(StreamEvent::MarketChange(mcm)) => {
                            debug!(markets = mcm.mc.len(), "Applying market change message");
                            for change in &mcm.mc {
                                self.cache.apply_market_change(change);
                            }
                        }
                        Some(StreamEvent::OrderChange(ocm)) => {
                            if let Some(tx) = &self.order_tx {
                                if tx.send(ocm).await.is_err() {
                                    warn!("Order change receiver dropped");
                                }
                            }
                        }
                        None => {
                            info!("Stream event channel closed, feed task exiting");
                            return;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use greenbook_core::{MarketId, SelectionId};
    use greenbook_stream::{MarketChange, MarketChangeMessage, RunnerChange};
    use rust_decimal_macros::dec;

    fn mcm(market: &str) -> StreamEvent {
        StreamEvent::MarketChange(MarketChangeMessage {
            id: None,
            pt: None,
            ct: None,
            initial_clk: None,
            clk: None,
            mc: vec![MarketChange {
                id: MarketId::new(market),
                market_definition: None,
                rc: vec![RunnerChange {
                    id: SelectionId(9),
                    atb: vec![],
                    atl: vec![(dec!(3.2), dec!(14))],
                    ltp: None,
                    tv: None,
                }],
                img: false,
                tv: None,
            }],
        })
    }

    #[tokio::test]
    async fn test_market_changes_reach_cache() {
        let cache = Arc::new(PriceCache::new());
        let (tx, rx) = mpsc::channel(8);
        let token = CancellationToken::new();
        let task = FeedTask::new(cache.clone(), rx, None, token.clone());

        tx.send(mcm("1.42")).await.unwrap();
        drop(tx); // channel close ends the task

        task.run().await;

        let snap = cache.snapshot(&MarketId::new("1.42")).expect("cached");
        assert!(snap.runners.contains_key(&SelectionId(9)));
    }

    #[tokio::test]
    async fn test_shutdown_stops_task() {
        let cache = Arc::new(PriceCache::new());
        let (_tx, rx) = mpsc::channel::<StreamEvent>(8);
        let token = CancellationToken::new();
        let task = FeedTask::new(cache, rx, None, token.clone());

        token.cancel();
        // Returns promptly instead of blocking on the open channel.
        task.run().await;
    }
}
