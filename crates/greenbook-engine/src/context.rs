//! Joining price snapshots with catalogue metadata.

use greenbook_core::{CatalogueEntry, MarketContext, MarketSnapshot, RunnerContext};

/// Build the full market context the plugin pipeline evaluates.
///
/// The snapshot's start time (from the feed's market definition) wins
/// over the catalogue's when both are present; runner names come from
/// the catalogue. Runners the catalogue does not know keep a synthetic
/// name rather than dropping live prices.
pub fn build_market_context(snapshot: &MarketSnapshot, entry: &CatalogueEntry) -> MarketContext {
    let runners = snapshot
        .runners
        .iter()
        .map(|(selection_id, ladder)| RunnerContext {
            selection_id: *selection_id,
            runner_name: entry
                .runner_names
                .get(selection_id)
                .cloned()
                .unwrap_or_else(|| format!("Runner {selection_id}")),
            ladder: ladder.clone(),
        })
        .collect();

    MarketContext {
        market_id: snapshot.market_id.clone(),
        market_name: entry.market_name.clone(),
        venue: entry.venue.clone(),
        status: snapshot.status,
        in_play: snapshot.in_play,
        start_time: snapshot.start_time.unwrap_or(entry.start_time),
        runners,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use greenbook_core::{MarketId, RunnerLadder, SelectionId};
    use std::collections::BTreeMap;

    #[test]
    fn test_join_names_and_start_time() {
        let mut snapshot = MarketSnapshot::new(MarketId::new("1.1"));
        snapshot.runners.insert(SelectionId(5), RunnerLadder::default());
        snapshot.runners.insert(SelectionId(6), RunnerLadder::default());
        let feed_start = Utc::now() + Duration::minutes(20);
        snapshot.start_time = Some(feed_start);

        let mut runner_names = BTreeMap::new();
        runner_names.insert(SelectionId(5), "Dancer".to_string());
        let entry = CatalogueEntry {
            market_id: MarketId::new("1.1"),
            market_name: "2m Hcap".into(),
            venue: "Kempton".into(),
            country_code: "GB".into(),
            start_time: Utc::now() + Duration::minutes(45),
            runner_names,
        };

        let ctx = build_market_context(&snapshot, &entry);
        assert_eq!(ctx.start_time, feed_start);
        assert_eq!(ctx.venue, "Kempton");
        assert_eq!(ctx.runners[0].runner_name, "Dancer");
        assert_eq!(ctx.runners[1].runner_name, "Runner 6");
    }
}
