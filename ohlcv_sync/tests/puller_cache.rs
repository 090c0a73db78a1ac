mod common;

use std::sync::Arc;

use common::*;
use ohlcv_ingestor::retrievers::{PartialReason, RetrievalStatus};
use ohlcv_sync::{
    puller::{DataPuller, GapBoundary, GapSide, PullError},
    store::{OhlcvStore, RangeFilter},
};

#[tokio::test]
async fn empty_store_fetches_once_then_serves_from_cache() {
    let db = setup_db();
    let online = ScriptedRetriever::serving(dec(1, 31));
    let puller = puller(&db, online.clone());

    let first = puller
        .fetch(SYMBOL, "1d", "2020-12-01", Some("2020-12-03"))
        .await
        .unwrap();
    assert_eq!(first.candles.len(), 3);
    assert_eq!(online.calls(), vec![dec(1, 3)]);
    assert!(first.is_complete());

    let second = puller
        .fetch(SYMBOL, "1d", "2020-12-01", Some("2020-12-03"))
        .await
        .unwrap();
    assert_eq!(second.candles, first.candles);
    assert!(second.fills.is_empty());
    assert_eq!(online.calls().len(), 1, "second request must not go online");
}

#[tokio::test]
async fn only_prefix_and_suffix_are_fetched() {
    let db = setup_db();
    let stored = seed(&db, dec(5, 10), tf("1d"));
    let online = ScriptedRetriever::serving(dec(1, 31));
    let puller = puller(&db, online.clone());

    let pull = puller.fetch_range(SYMBOL, tf("1d"), dec(1, 20)).await.unwrap();

    assert_eq!(online.calls(), vec![dec(1, 4), dec(11, 20)]);
    assert_eq!(pull.fills.len(), 2);
    assert_eq!(pull.fills[0].side, GapSide::Prior);
    assert_eq!(pull.fills[0].fetched, 4);
    assert_eq!(pull.fills[1].side, GapSide::Post);
    assert_eq!(pull.fills[1].fetched, 10);

    assert_eq!(pull.candles.len(), 20);
    for pair in pull.candles.windows(2) {
        assert!(pair[0].timestamp < pair[1].timestamp);
    }
    // stored rows are returned as stored
    assert_eq!(&pull.candles[4..10], &stored[..]);

    // everything is persisted now
    let cached = db
        .store
        .query(&RangeFilter::for_range(SYMBOL, &dec(1, 20)), tf("1d"))
        .unwrap();
    assert_eq!(cached, pull.candles);
}

#[tokio::test]
async fn fully_cached_range_makes_no_calls() {
    let db = setup_db();
    seed(&db, dec(1, 10), tf("1d"));
    let online = ScriptedRetriever::serving(dec(1, 31));

    let pull = puller(&db, online.clone())
        .fetch_range(SYMBOL, tf("1d"), dec(3, 7))
        .await
        .unwrap();

    assert_eq!(pull.candles.len(), 5);
    assert!(online.calls().is_empty());
}

#[tokio::test]
async fn overlapping_refetch_is_clipped_before_persisting() {
    // 4h bars stored from 12-01 04:00; the prior gap re-reads all of 12-01
    let db = setup_db();
    let mut stored = bars(dec(1, 2), tf("4h"));
    stored.remove(0);
    db.store.store(&stored, tf("4h")).unwrap();
    let online = ScriptedRetriever::serving(dec(1, 31));

    let pull = puller(&db, online.clone())
        .fetch_range(SYMBOL, tf("4h"), dec(1, 2))
        .await
        .unwrap();

    assert_eq!(online.calls(), vec![dec(1, 1)]);
    assert_eq!(pull.fills[0].fetched, 1);
    assert!(pull.fills[0].persisted, "clipped batch must not hit the duplicate check");
    assert_eq!(pull.candles, bars(dec(1, 2), tf("4h")));
}

#[tokio::test]
async fn store_rejects_overlap_but_pull_still_returns_rows() {
    let db = setup_db();
    seed(&db, dec(5, 10), tf("1d"));

    // the store rejects a batch that touches stored rows
    let overlap = bars(dec(9, 12), tf("1d"));
    assert!(db.store.store(&overlap, tf("1d")).is_err());

    // a disjoint batch is accepted
    let disjoint = bars(dec(11, 12), tf("1d"));
    assert_eq!(db.store.store(&disjoint, tf("1d")).unwrap(), 2);

    let online = ScriptedRetriever::serving(dec(1, 31));
    let pull = puller(&db, online.clone())
        .fetch_range(SYMBOL, tf("1d"), dec(5, 14))
        .await
        .unwrap();
    assert_eq!(online.calls(), vec![dec(13, 14)]);
    assert_eq!(pull.candles.len(), 10);
}

#[tokio::test]
async fn provider_failure_keeps_partial_rows() {
    let db = setup_db();
    let online = ScriptedRetriever::new(Script::Partial {
        available: dec(1, 31),
        limit: 4,
    });

    let pull = puller(&db, online.clone())
        .fetch_range(SYMBOL, tf("1d"), dec(1, 10))
        .await
        .unwrap();

    // prefix came back partial; the suffix after it is requested again
    assert_eq!(online.calls(), vec![dec(1, 10), dec(5, 10)]);
    assert_eq!(pull.candles.len(), 8);
    assert!(!pull.is_complete());
    assert!(matches!(
        pull.fills[0].status,
        Some(RetrievalStatus::Partial(PartialReason::ProviderFailed { .. }))
    ));

    // what was fetched is kept
    let cached = db
        .store
        .query(&RangeFilter::for_range(SYMBOL, &dec(1, 10)), tf("1d"))
        .unwrap();
    assert_eq!(cached.len(), 8);
}

#[tokio::test]
async fn retrieval_error_aborts_the_pull() {
    let db = setup_db();
    let online = ScriptedRetriever::new(Script::Fail);

    let err = puller(&db, online)
        .fetch_range(SYMBOL, tf("1d"), dec(1, 3))
        .await
        .unwrap_err();
    assert!(matches!(err, PullError::Retrieve(_)));
}

#[tokio::test]
async fn no_data_anywhere_is_an_empty_complete_pull() {
    let db = setup_db();
    let online = ScriptedRetriever::serving(dec(20, 31));

    let pull = puller(&db, online.clone())
        .fetch_range(SYMBOL, tf("1d"), dec(1, 3))
        .await
        .unwrap();

    assert!(pull.candles.is_empty());
    assert_eq!(pull.fills.len(), 1);
    assert_eq!(pull.fills[0].status, Some(RetrievalStatus::Complete));
    assert!(pull.is_complete());
}

#[tokio::test]
async fn timeframe_boundary_fills_partially_stored_last_day() {
    let db = setup_db();
    // 12-01 and 12-02 complete, 12-03 only up to 08:00
    let mut stored = bars(dec(1, 3), tf("4h"));
    stored.truncate(6 + 6 + 3);
    db.store.store(&stored, tf("4h")).unwrap();

    let online = ScriptedRetriever::serving(dec(1, 31));
    let day_pull = puller(&db, online.clone())
        .with_boundary(GapBoundary::Day)
        .fetch_range(SYMBOL, tf("4h"), dec(1, 3))
        .await
        .unwrap();
    assert!(online.calls().is_empty());
    assert_eq!(day_pull.candles.len(), 15);

    let bar_pull = puller(&db, online.clone())
        .with_boundary(GapBoundary::Timeframe)
        .fetch_range(SYMBOL, tf("4h"), dec(1, 3))
        .await
        .unwrap();
    assert_eq!(online.calls(), vec![dec(3, 3)]);
    assert_eq!(bar_pull.fills[0].fetched, 3);
    assert_eq!(bar_pull.candles, bars(dec(1, 3), tf("4h")));
}

#[tokio::test]
async fn store_write_failure_is_recorded_not_raised() {
    let online = ScriptedRetriever::serving(dec(1, 31));
    // store pointed at a directory cannot be opened
    let dir = tempfile::tempdir().unwrap();
    let broken: Arc<dyn OhlcvStore> =
        Arc::new(ohlcv_sync::store::SqliteStore::new(dir.path().to_string_lossy().to_string()));

    let pull = DataPuller::new()
        .with_store(broken)
        .with_online(online)
        .fetch_range(SYMBOL, tf("1d"), dec(1, 3))
        .await
        .unwrap();

    assert_eq!(pull.candles.len(), 3);
    assert!(!pull.fills[0].persisted);
    assert!(!pull.is_complete());
}

#[tokio::test]
async fn symbols_are_cached_independently() {
    let db = setup_db();
    seed(&db, dec(1, 3), tf("1d"));
    let online = ScriptedRetriever::serving(dec(1, 31));

    let pull = puller(&db, online.clone())
        .fetch_range("BTC/USDT", tf("1d"), dec(1, 3))
        .await
        .unwrap();

    // the scripted source tags rows with its own symbol, so nothing matches
    assert_eq!(online.calls(), vec![dec(1, 3)]);
    assert!(pull.candles.is_empty());
}
