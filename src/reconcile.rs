//! Orchestration core: decides whether a freshly fetched round is new and
//! folds it into history, and applies operator-supplied merge batches.
//!
//! All read-modify-write passes over the history file go through one
//! mutex, so the store only ever has a single writer. The scheduled sync
//! additionally uses `try_lock` as a busy guard: a slow run is skipped by
//! the next tick instead of being re-entered.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::fetch::DrawSource;
use crate::history::HistoryStore;
use crate::stats::FrequencyCache;
use crate::types::{DrawFragment, DrawRecord, MergeSummary};

pub struct Reconciler {
    store: HistoryStore,
    source: Arc<dyn DrawSource>,
    stats: FrequencyCache,
    write_lock: Mutex<()>,
}

impl Reconciler {
    pub fn new(store: HistoryStore, source: Arc<dyn DrawSource>) -> Self {
        Self {
            store,
            source,
            stats: FrequencyCache::new(),
            write_lock: Mutex::new(()),
        }
    }

    /// One sync pass: read history, fetch the latest round, append it if
    /// and only if it is strictly newer than everything we have.
    ///
    /// Fire-and-forget: every failure is logged and ends the pass; the
    /// next scheduled trigger retries. Nothing here is fatal to the host.
    pub async fn run(&self) {
        let _guard = match self.write_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                info!("previous sync still in progress, skipping this trigger");
                return;
            }
        };

        info!("sync: checking for a new draw");
        let history = match self.store.read_all() {
            Ok(history) => history,
            Err(e) => {
                error!("sync: could not read history: {e:#}");
                return;
            }
        };
        if history.is_empty() {
            // A cold store has no trustworthy high-water mark; seeding it
            // from the remote would record a single round of unknown
            // provenance as "all of history". Bootstrap via the merge API.
            info!("sync: history is empty, skipping (seed it via /api/merge-lotto)");
            return;
        }
        let max_known = history.iter().map(|r| r.round).max().unwrap_or(0);

        let Some(latest) = self.source.fetch_latest().await else {
            warn!("sync: could not fetch the latest draw, will retry next trigger");
            return;
        };

        if latest.round <= max_known {
            info!(
                "sync: up to date (remote round {}, local max {})",
                latest.round, max_known
            );
            return;
        }

        info!("sync: new round {} (local max {})", latest.round, max_known);
        let round = latest.round;
        let mut updated = Vec::with_capacity(history.len() + 1);
        updated.push(latest);
        updated.extend(history);
        // write_all dedupes by round as a safety net; with the strict
        // greater-than check above it should never trigger here.
        match self.store.write_all(&updated) {
            Ok(()) => {
                self.stats.invalidate();
                info!("sync: history updated through round {round}");
            }
            Err(e) => error!("sync: history write failed: {e:#}"),
        }
    }

    /// Upserts a batch of fragments: update the matching round field-by-
    /// field, or insert a new record. The whole batch is validated before
    /// anything is read or written, and persisted with a single write.
    pub async fn merge(&self, fragments: Vec<DrawFragment>) -> Result<MergeSummary> {
        for fragment in &fragments {
            fragment.validate()?;
        }

        let _guard = self.write_lock.lock().await;
        let mut history = self.store.read_all()?;
        let mut summary = MergeSummary::default();
        for fragment in fragments {
            if let Some(pos) = history.iter().position(|r| r.round == fragment.round) {
                fragment.apply_to(&mut history[pos]);
                summary.updated += 1;
            } else {
                history.push(fragment.into_record());
                summary.inserted += 1;
            }
        }
        self.store.write_all(&history)?;
        self.stats.invalidate();
        info!(
            "merge: {} inserted, {} updated",
            summary.inserted, summary.updated
        );
        Ok(summary)
    }

    /// Read-only snapshot for downstream consumers, newest first.
    pub async fn history(&self) -> Result<Vec<DrawRecord>> {
        let _guard = self.write_lock.lock().await;
        let mut history = self.store.read_all()?;
        history.sort_by(|a, b| b.round.cmp(&a.round));
        Ok(history)
    }

    /// Per-ball draw frequencies, memoized until the next history change.
    pub async fn frequencies(&self) -> Result<Vec<u32>> {
        let _guard = self.write_lock.lock().await;
        let history = self.store.read_all()?;
        Ok(self.stats.get_or_compute(&history))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrizeTier;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct StubSource {
        latest: Option<DrawRecord>,
    }

    #[async_trait]
    impl DrawSource for StubSource {
        async fn fetch_latest(&self) -> Option<DrawRecord> {
            self.latest.clone()
        }
    }

    fn reconciler_with(dir: &TempDir, latest: Option<DrawRecord>) -> Reconciler {
        let store = HistoryStore::new(dir.path().join("lotto.csv"));
        Reconciler::new(store, Arc::new(StubSource { latest }))
    }

    fn seeded(dir: &TempDir, rounds: &[u32], latest: Option<DrawRecord>) -> Reconciler {
        let reconciler = reconciler_with(dir, latest);
        let records: Vec<DrawRecord> = rounds.iter().map(|&r| DrawRecord::dummy(r)).collect();
        reconciler.store.write_all(&records).unwrap();
        reconciler
    }

    #[tokio::test]
    async fn appends_strictly_newer_round() {
        let dir = TempDir::new().unwrap();
        let mut remote = DrawRecord::dummy(1204);
        remote.numbers = vec![5, 8, 19, 21, 30, 44];
        remote.numbers_sum = 0; // the store must recompute this, not trust it
        let reconciler = seeded(&dir, &[1203, 1202], Some(remote.clone()));

        reconciler.run().await;

        let history = reconciler.history().await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].round, 1204);
        assert_eq!(history[0].numbers, remote.numbers);
        assert_eq!(history[0].numbers_sum, 127);
    }

    #[tokio::test]
    async fn same_round_is_a_noop() {
        let dir = TempDir::new().unwrap();
        let reconciler = seeded(&dir, &[1203, 1202], Some(DrawRecord::dummy(1203)));

        reconciler.run().await;

        let history = reconciler.history().await.unwrap();
        assert_eq!(
            history.iter().map(|r| r.round).collect::<Vec<_>>(),
            vec![1203, 1202]
        );
    }

    #[tokio::test]
    async fn older_round_never_regresses_history() {
        let dir = TempDir::new().unwrap();
        let mut stale = DrawRecord::dummy(1200);
        stale.total_sales = 1;
        let reconciler = seeded(&dir, &[1203], Some(stale));

        reconciler.run().await;

        let history = reconciler.history().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].round, 1203);
    }

    #[tokio::test]
    async fn run_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let reconciler = seeded(&dir, &[1203], Some(DrawRecord::dummy(1204)));

        reconciler.run().await;
        let after_first = reconciler.history().await.unwrap();
        reconciler.run().await;
        let after_second = reconciler.history().await.unwrap();

        assert_eq!(after_first, after_second);
        assert_eq!(
            after_second
                .iter()
                .filter(|r| r.round == 1204)
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn empty_history_is_never_seeded_from_remote() {
        let dir = TempDir::new().unwrap();
        let reconciler = reconciler_with(&dir, Some(DrawRecord::dummy(1204)));

        reconciler.run().await;

        assert!(reconciler.history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_fetch_leaves_history_unchanged() {
        let dir = TempDir::new().unwrap();
        let reconciler = seeded(&dir, &[1203], None);

        reconciler.run().await;

        let history = reconciler.history().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].round, 1203);
    }

    #[tokio::test]
    async fn merge_updates_and_inserts_in_one_batch() {
        let dir = TempDir::new().unwrap();
        let reconciler = seeded(&dir, &[1200], None);
        let before = reconciler.history().await.unwrap()[0].clone();

        let update = DrawFragment {
            round: 1200,
            total_sales: Some(999),
            ..Default::default()
        };
        let insert = DrawFragment {
            round: 1205,
            draw_date: Some("2026-02-07".to_string()),
            numbers: Some(vec![2, 9, 16, 25, 33, 41]),
            bonus: Some(12),
            tiers: Some([PrizeTier::default(); 5]),
            ..Default::default()
        };

        let summary = reconciler.merge(vec![update, insert]).await.unwrap();
        assert_eq!(summary, MergeSummary { inserted: 1, updated: 1 });

        let history = reconciler.history().await.unwrap();
        assert_eq!(
            history.iter().map(|r| r.round).collect::<Vec<_>>(),
            vec![1205, 1200]
        );
        let merged = history.iter().find(|r| r.round == 1200).unwrap();
        assert_eq!(merged.total_sales, 999);
        assert_eq!(merged.numbers, before.numbers);
        assert_eq!(merged.tiers, before.tiers);
        assert_eq!(history[0].numbers_sum, 126);
    }

    #[tokio::test]
    async fn invalid_batch_leaves_store_untouched() {
        let dir = TempDir::new().unwrap();
        let reconciler = seeded(&dir, &[1200], None);

        let good = DrawFragment {
            round: 1200,
            total_sales: Some(999),
            ..Default::default()
        };
        let bad = DrawFragment {
            round: 1206,
            numbers: Some(vec![1, 2, 3]),
            ..Default::default()
        };

        assert!(reconciler.merge(vec![good, bad]).await.is_err());

        let history = reconciler.history().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_ne!(history[0].total_sales, 999);
    }

    #[tokio::test]
    async fn rounds_stay_unique_across_mixed_operations() {
        let dir = TempDir::new().unwrap();
        let reconciler = seeded(&dir, &[1202, 1203], Some(DrawRecord::dummy(1204)));

        reconciler.run().await;
        reconciler
            .merge(vec![
                DrawFragment {
                    round: 1204,
                    total_sales: Some(5),
                    ..Default::default()
                },
                DrawFragment {
                    round: 1201,
                    draw_date: Some("2026-01-10".to_string()),
                    numbers: Some(vec![4, 13, 18, 26, 31, 42]),
                    bonus: Some(9),
                    ..Default::default()
                },
            ])
            .await
            .unwrap();
        reconciler.run().await;

        let history = reconciler.history().await.unwrap();
        let mut rounds: Vec<u32> = history.iter().map(|r| r.round).collect();
        let total = rounds.len();
        rounds.dedup();
        assert_eq!(rounds.len(), total);
        assert_eq!(rounds, vec![1204, 1203, 1202, 1201]);
    }
}
