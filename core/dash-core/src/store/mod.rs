//! Domain store: the dashboard's analysis data.
//!
//! Every remote operation follows the same shape: call the API, then commit
//! locally only on success. A failed call changes nothing and comes back as a
//! [`StoreError`].
//!
//! ## Racing Fetches
//!
//! Fetches that replace a whole [`Slot`] are stamped with a per-slot generation
//! when issued:
//!
//! ```text
//! fetch A issued (gen 1) ─────────────────────► response: gen 1 < 2, discarded
//! fetch B issued (gen 2) ──────► response: gen 2 current, committed
//! ```
//!
//! Targeted mutations (comment, hide, unhide) are not stamped and apply to
//! whatever collection is current when their response arrives.
//!
//! State sits behind a mutex that is never held across an await, so several
//! operations on one store can be in flight at once.

mod views;

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};
use trailblazer_dash_protocol::{
    AnalysesQuery, Analysis, AnalysisStatus, AnalysisUpdate, JobStat, DEFAULT_PAGE_SIZE,
};

use crate::api::ApiClient;
use crate::error::{ApiError, StoreError};

pub use views::{filter_by_status, parse_timestamp, rank_job_stats, time_since};

/// A piece of store state replaced wholesale by a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    Analyses,
    SelectedAnalysis,
    JobStats,
    LastUpdate,
}

impl Slot {
    pub const ALL: [Slot; 4] = [
        Slot::Analyses,
        Slot::SelectedAnalysis,
        Slot::JobStats,
        Slot::LastUpdate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::Analyses => "analyses",
            Slot::SelectedAnalysis => "selected_analysis",
            Slot::JobStats => "job_stats",
            Slot::LastUpdate => "last_update",
        }
    }

    fn index(self) -> usize {
        match self {
            Slot::Analyses => 0,
            Slot::SelectedAnalysis => 1,
            Slot::JobStats => 2,
            Slot::LastUpdate => 3,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time copy of everything the store holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreSnapshot {
    pub analyses: Vec<Analysis>,
    pub selected_analysis: Option<Analysis>,
    pub job_stats: Vec<JobStat>,
    pub last_update: Option<String>,
}

#[derive(Debug, Default)]
struct StoreState {
    analyses: Vec<Analysis>,
    selected: Option<Analysis>,
    job_stats: Vec<JobStat>,
    last_update: Option<String>,
    generations: [u64; Slot::ALL.len()],
}

/// Proof that a fetch was issued at a given generation.
#[derive(Debug, Clone, Copy)]
struct Ticket {
    slot: Slot,
    generation: u64,
}

pub struct DomainStore<A> {
    api: A,
    page_size: u32,
    state: Mutex<StoreState>,
}

impl<A: ApiClient> DomainStore<A> {
    pub fn new(api: A) -> Self {
        Self::with_page_size(api, DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(api: A, page_size: u32) -> Self {
        Self {
            api,
            page_size,
            state: Mutex::new(StoreState::default()),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn issue(&self, slot: Slot) -> Ticket {
        let mut state = self.lock();
        let generation = &mut state.generations[slot.index()];
        *generation += 1;
        Ticket {
            slot,
            generation: *generation,
        }
    }

    fn commit(
        &self,
        ticket: Ticket,
        apply: impl FnOnce(&mut StoreState),
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        let current = state.generations[ticket.slot.index()];
        if current != ticket.generation {
            debug!(
                slot = %ticket.slot,
                issued = ticket.generation,
                current,
                "Discarding superseded response"
            );
            return Err(StoreError::Superseded { slot: ticket.slot });
        }
        apply(&mut state);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Remote operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Replaces the collection with one page of analyses.
    ///
    /// Returns how many records the page held.
    pub async fn fetch_analyses(
        &self,
        query: Option<&str>,
        is_visible: Option<bool>,
    ) -> Result<usize, StoreError> {
        let query = AnalysesQuery::new(query, is_visible, self.page_size);
        self.fetch_analyses_with(&query).await
    }

    pub async fn fetch_analyses_with(&self, query: &AnalysesQuery) -> Result<usize, StoreError> {
        let ticket = self.issue(Slot::Analyses);
        let response = self
            .api
            .analyses(query)
            .await
            .map_err(|err| remote_failure("fetch_analyses", err))?;

        let count = response.analyses.len();
        self.commit(ticket, |state| state.analyses = response.analyses)?;
        debug!(count, query = ?query.query, "Analyses replaced");
        Ok(count)
    }

    /// Loads one analysis into the selected slot.
    pub async fn fetch_analysis(&self, id: u64) -> Result<Analysis, StoreError> {
        let ticket = self.issue(Slot::SelectedAnalysis);
        let analysis = self
            .api
            .analysis(id)
            .await
            .map_err(|err| remote_failure("fetch_analysis", err))?;

        let selected = analysis.clone();
        self.commit(ticket, |state| state.selected = Some(selected))?;
        Ok(analysis)
    }

    /// Saves a comment, then copies the returned comment onto the matching
    /// record. Nothing else in the collection changes.
    pub async fn update_comment(&self, id: u64, text: &str) -> Result<Analysis, StoreError> {
        let updated = self
            .api
            .update_analysis(id, &AnalysisUpdate::comment(text))
            .await
            .map_err(|err| remote_failure("update_comment", err))?;

        let mut state = self.lock();
        if let Some(analysis) = state.analyses.iter_mut().find(|a| a.id == updated.id) {
            analysis.comment = updated.comment.clone();
        }
        Ok(updated)
    }

    /// Hides an analysis and drops it from the collection.
    pub async fn hide_analysis(&self, id: u64) -> Result<Analysis, StoreError> {
        let updated = self
            .api
            .update_analysis(id, &AnalysisUpdate::visibility(false))
            .await
            .map_err(|err| remote_failure("hide_analysis", err))?;

        self.lock().analyses.retain(|analysis| analysis.id != id);
        debug!(id, "Analysis hidden");
        Ok(updated)
    }

    /// Unhides an analysis, flagging it visible in place.
    pub async fn unhide_analysis(&self, id: u64) -> Result<Analysis, StoreError> {
        let updated = self
            .api
            .update_analysis(id, &AnalysisUpdate::visibility(true))
            .await
            .map_err(|err| remote_failure("unhide_analysis", err))?;

        let mut state = self.lock();
        if let Some(analysis) = state.analyses.iter_mut().find(|a| a.id == id) {
            analysis.is_visible = true;
        }
        debug!(id, "Analysis unhidden");
        Ok(updated)
    }

    pub async fn fetch_job_stats(&self) -> Result<usize, StoreError> {
        let ticket = self.issue(Slot::JobStats);
        let response = self
            .api
            .aggregate_jobs()
            .await
            .map_err(|err| remote_failure("fetch_job_stats", err))?;

        let count = response.jobs.len();
        self.commit(ticket, |state| state.job_stats = response.jobs)?;
        Ok(count)
    }

    /// Records when the backend last refreshed its data.
    pub async fn fetch_last_update(&self) -> Result<Option<String>, StoreError> {
        let ticket = self.issue(Slot::LastUpdate);
        let info = self
            .api
            .info()
            .await
            .map_err(|err| remote_failure("fetch_last_update", err))?;

        let updated_at = info.updated_at.clone();
        self.commit(ticket, |state| state.last_update = info.updated_at)?;
        Ok(updated_at)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Views
    // ─────────────────────────────────────────────────────────────────────────

    pub fn analyses(&self) -> Vec<Analysis> {
        self.lock().analyses.clone()
    }

    pub fn analyses_with_status(&self, status: AnalysisStatus) -> Vec<Analysis> {
        filter_by_status(&self.lock().analyses, status)
    }

    pub fn failed_analyses(&self) -> Vec<Analysis> {
        self.analyses_with_status(AnalysisStatus::Failed)
    }

    pub fn running_analyses(&self) -> Vec<Analysis> {
        self.analyses_with_status(AnalysisStatus::Running)
    }

    pub fn completed_analyses(&self) -> Vec<Analysis> {
        self.analyses_with_status(AnalysisStatus::Completed)
    }

    pub fn selected_analysis(&self) -> Option<Analysis> {
        self.lock().selected.clone()
    }

    pub fn job_stats(&self) -> Vec<JobStat> {
        self.lock().job_stats.clone()
    }

    /// Job stats, most frequent first.
    pub fn ranked_job_stats(&self) -> Vec<JobStat> {
        rank_job_stats(&self.lock().job_stats)
    }

    pub fn last_update(&self) -> Option<String> {
        self.lock().last_update.clone()
    }

    /// `"3 hours"`-style age of the last update. `None` when no update is
    /// recorded or the timestamp is unreadable.
    pub fn time_since_last_update(&self, now: DateTime<Utc>) -> Option<String> {
        let raw = self.last_update()?;
        match parse_timestamp(&raw) {
            Some(then) => Some(time_since(then, now)),
            None => {
                warn!(value = %raw, "Unreadable last-update timestamp");
                None
            }
        }
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.lock();
        StoreSnapshot {
            analyses: state.analyses.clone(),
            selected_analysis: state.selected.clone(),
            job_stats: state.job_stats.clone(),
            last_update: state.last_update.clone(),
        }
    }
}

fn remote_failure(operation: &'static str, err: ApiError) -> StoreError {
    warn!(operation, error = %err, "Remote call failed; store unchanged");
    StoreError::Remote(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{analysis, MockApi};
    use chrono::TimeZone;
    use std::time::Duration;

    fn seeded() -> MockApi {
        MockApi::new().with_analyses(vec![
            analysis(1, AnalysisStatus::Failed, "crazyeel"),
            analysis(2, AnalysisStatus::Running, "bluefox"),
            analysis(3, AnalysisStatus::Failed, "crazyeel"),
            analysis(4, AnalysisStatus::Completed, "redowl"),
        ])
    }

    async fn loaded_store() -> DomainStore<MockApi> {
        let store = DomainStore::new(seeded());
        store.fetch_analyses(None, None).await.unwrap();
        store
    }

    fn ids(analyses: &[Analysis]) -> Vec<u64> {
        analyses.iter().map(|a| a.id).collect()
    }

    #[tokio::test]
    async fn fetch_analyses_replaces_collection() {
        let store = loaded_store().await;
        assert_eq!(ids(&store.analyses()), vec![1, 2, 3, 4]);

        let count = store.fetch_analyses(Some("crazyeel"), None).await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(ids(&store.analyses()), vec![1, 3]);
    }

    #[tokio::test]
    async fn fetch_analyses_sends_page_size() {
        let store = DomainStore::with_page_size(seeded(), 25);
        store.fetch_analyses(Some("  "), Some(true)).await.unwrap();

        let query = store.api().last_query().unwrap();
        assert_eq!(query.query, None);
        assert_eq!(query.is_visible, Some(true));
        assert_eq!(query.per_page, 25);
    }

    #[tokio::test]
    async fn status_views_filter_collection() {
        let store = loaded_store().await;
        assert_eq!(ids(&store.failed_analyses()), vec![1, 3]);
        assert_eq!(ids(&store.running_analyses()), vec![2]);
        assert_eq!(ids(&store.completed_analyses()), vec![4]);
        assert!(store
            .analyses_with_status(AnalysisStatus::Pending)
            .is_empty());
    }

    #[tokio::test]
    async fn fetch_analysis_sets_selected_slot() {
        let store = DomainStore::new(seeded());
        let analysis = store.fetch_analysis(2).await.unwrap();
        assert_eq!(analysis.id, 2);
        assert_eq!(store.selected_analysis().map(|a| a.id), Some(2));
    }

    #[tokio::test]
    async fn missing_analysis_keeps_previous_selection() {
        let store = DomainStore::new(seeded());
        store.fetch_analysis(2).await.unwrap();

        let err = store.fetch_analysis(99).await.unwrap_err();

        assert!(matches!(
            err,
            StoreError::Remote(ApiError::Status { status: 404, .. })
        ));
        assert_eq!(store.selected_analysis().map(|a| a.id), Some(2));
    }

    #[tokio::test]
    async fn update_comment_changes_only_that_comment() {
        let store = loaded_store().await;
        let before = store.analyses();

        store.update_comment(3, "rerun with more memory").await.unwrap();

        let after = store.analyses();
        assert_eq!(after.len(), before.len());
        for (old, new) in before.iter().zip(&after) {
            if old.id == 3 {
                assert_eq!(new.comment.as_deref(), Some("rerun with more memory"));
                assert_eq!(
                    Analysis {
                        comment: None,
                        ..new.clone()
                    },
                    *old
                );
            } else {
                assert_eq!(old, new);
            }
        }
    }

    #[tokio::test]
    async fn hide_removes_exactly_that_record() {
        let store = loaded_store().await;
        let before = store.analyses();

        let hidden = store.hide_analysis(2).await.unwrap();

        assert!(!hidden.is_visible);
        let expected: Vec<Analysis> = before.into_iter().filter(|a| a.id != 2).collect();
        assert_eq!(store.analyses(), expected);
    }

    #[tokio::test]
    async fn unhide_flags_in_place() {
        let api = MockApi::new().with_analyses(vec![
            analysis(1, AnalysisStatus::Failed, "crazyeel"),
            Analysis {
                is_visible: false,
                ..analysis(2, AnalysisStatus::Completed, "bluefox")
            },
        ]);
        let store = DomainStore::new(api);
        store.fetch_analyses(None, None).await.unwrap();
        let before = store.analyses();

        store.unhide_analysis(2).await.unwrap();

        let after = store.analyses();
        assert_eq!(after.len(), before.len());
        assert_eq!(after[0], before[0]);
        assert!(after[1].is_visible);
        assert_eq!(
            Analysis {
                is_visible: false,
                ..after[1].clone()
            },
            before[1]
        );
    }

    #[tokio::test]
    async fn failures_leave_every_slot_unchanged() {
        let api = seeded()
            .with_jobs(vec![JobStat {
                name: "build".to_string(),
                count: 2,
            }])
            .with_updated_at("2024-03-01T12:00:00Z");
        let store = DomainStore::new(api);
        store.fetch_analyses(None, None).await.unwrap();
        store.fetch_analysis(1).await.unwrap();
        store.fetch_job_stats().await.unwrap();
        store.fetch_last_update().await.unwrap();
        let before = store.snapshot();

        store.api().set_failing(true);

        let results = [
            store.fetch_analyses(Some("crazyeel"), None).await.err(),
            store.fetch_analysis(2).await.err(),
            store.update_comment(1, "x").await.err(),
            store.hide_analysis(1).await.err(),
            store.unhide_analysis(1).await.err(),
            store.fetch_job_stats().await.err(),
            store.fetch_last_update().await.err(),
        ];
        for result in results {
            assert!(matches!(
                result,
                Some(StoreError::Remote(ApiError::Status { status: 503, .. }))
            ));
        }
        assert_eq!(store.snapshot(), before);
    }

    #[tokio::test]
    async fn job_stats_are_ranked_on_read() {
        let api = MockApi::new().with_jobs(vec![
            JobStat {
                name: "build".to_string(),
                count: 2,
            },
            JobStat {
                name: "lint".to_string(),
                count: 5,
            },
        ]);
        let store = DomainStore::new(api);
        assert_eq!(store.fetch_job_stats().await.unwrap(), 2);

        let names: Vec<String> = store.ranked_job_stats().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["lint", "build"]);
        assert_eq!(store.job_stats()[0].name, "build");
    }

    #[tokio::test]
    async fn last_update_is_recorded_and_aged() {
        let store = DomainStore::new(MockApi::new().with_updated_at("2024-03-01T09:00:00Z"));
        assert!(store.time_since_last_update(Utc::now()).is_none());

        store.fetch_last_update().await.unwrap();

        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(store.last_update().as_deref(), Some("2024-03-01T09:00:00Z"));
        assert_eq!(store.time_since_last_update(now).as_deref(), Some("3 hours"));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_analyses_response_is_discarded() {
        let api = MockApi::new().with_analyses(vec![
            analysis(1, AnalysisStatus::Failed, "slowcase"),
            analysis(2, AnalysisStatus::Running, "fastcase"),
        ]);
        api.delay_query("slowcase", Duration::from_secs(5));
        api.delay_query("fastcase", Duration::from_secs(1));
        let store = DomainStore::new(api);

        let (slow, fast) = tokio::join!(
            store.fetch_analyses(Some("slowcase"), None),
            store.fetch_analyses(Some("fastcase"), None),
        );

        assert!(matches!(
            slow,
            Err(StoreError::Superseded {
                slot: Slot::Analyses
            })
        ));
        assert_eq!(fast.unwrap(), 1);
        assert_eq!(ids(&store.analyses()), vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn stamping_is_per_slot() {
        let api = seeded().with_jobs(vec![JobStat {
            name: "build".to_string(),
            count: 1,
        }]);
        api.delay_query("crazyeel", Duration::from_secs(5));
        let store = DomainStore::new(api);

        let (analyses, jobs) = tokio::join!(
            store.fetch_analyses(Some("crazyeel"), None),
            store.fetch_job_stats(),
        );

        assert_eq!(analyses.unwrap(), 2);
        assert_eq!(jobs.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn mutations_apply_to_current_collection() {
        let store = DomainStore::new(seeded());
        store.api().delay_updates(Duration::from_secs(3));

        let (hidden, fetched) = tokio::join!(store.hide_analysis(1), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            store.fetch_analyses(None, None).await
        });

        hidden.unwrap();
        assert_eq!(fetched.unwrap(), 4);
        assert_eq!(ids(&store.analyses()), vec![2, 3, 4]);
    }

    #[test]
    fn slot_names() {
        let names: Vec<String> = Slot::ALL.iter().map(ToString::to_string).collect();
        assert_eq!(
            names,
            vec!["analyses", "selected_analysis", "job_stats", "last_update"]
        );
    }
}
