//! In-memory analysis API for tests.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use trailblazer_dash_protocol::{
    routes, AnalysesQuery, AnalysesResponse, Analysis, AnalysisStatus, AnalysisUpdate,
    InfoResponse, JobStat, JobsResponse,
};

use crate::api::ApiClient;
use crate::credential::Credential;
use crate::error::ApiError;

/// Analysis with a `case_id`, which is what the mock's search matches on.
pub fn analysis(id: u64, status: AnalysisStatus, case_id: &str) -> Analysis {
    let mut analysis = Analysis::new(id, status);
    analysis
        .extra
        .insert("case_id".to_string(), Value::String(case_id.to_string()));
    analysis
}

#[derive(Default)]
struct MockState {
    analyses: Vec<Analysis>,
    jobs: Vec<JobStat>,
    updated_at: Option<String>,
    failing: bool,
    query_delays: HashMap<String, Duration>,
    update_delay: Option<Duration>,
    last_query: Option<AnalysesQuery>,
    calls: Vec<(String, Option<String>)>,
}

/// Backend double holding the server-side records.
///
/// Updates change the server copy, so a later fetch sees them. Delays are
/// served with `tokio::time::sleep`, which lets paused-time tests order
/// responses.
#[derive(Default)]
pub struct MockApi {
    state: Mutex<MockState>,
    credential: Credential,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the `Authorization` value `credential` yields on each call.
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = credential;
        self
    }

    pub fn with_analyses(self, analyses: Vec<Analysis>) -> Self {
        self.lock().analyses = analyses;
        self
    }

    pub fn with_jobs(self, jobs: Vec<JobStat>) -> Self {
        self.lock().jobs = jobs;
        self
    }

    pub fn with_updated_at(self, updated_at: &str) -> Self {
        self.lock().updated_at = Some(updated_at.to_string());
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    pub fn delay_query(&self, query: &str, delay: Duration) {
        self.lock().query_delays.insert(query.to_string(), delay);
    }

    pub fn delay_updates(&self, delay: Duration) {
        self.lock().update_delay = Some(delay);
    }

    pub fn last_query(&self) -> Option<AnalysesQuery> {
        self.lock().last_query.clone()
    }

    /// `(path, authorization)` for every call, in order.
    pub fn calls(&self) -> Vec<(String, Option<String>)> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, path: &str) -> Result<(), ApiError> {
        let mut state = self.lock();
        state
            .calls
            .push((path.to_string(), self.credential.authorization()));
        if state.failing {
            return Err(ApiError::Status {
                status: 503,
                path: path.to_string(),
            });
        }
        Ok(())
    }
}

fn not_found(path: String) -> ApiError {
    ApiError::Status { status: 404, path }
}

fn matches(analysis: &Analysis, query: &AnalysesQuery) -> bool {
    let text_ok = match &query.query {
        Some(text) => analysis
            .extra_str("case_id")
            .is_some_and(|case_id| case_id.contains(text.as_str())),
        None => true,
    };
    let visibility_ok = query
        .is_visible
        .map_or(true, |visible| analysis.is_visible == visible);
    text_ok && visibility_ok
}

impl ApiClient for MockApi {
    async fn info(&self) -> Result<InfoResponse, ApiError> {
        self.record(routes::INFO)?;
        Ok(InfoResponse {
            updated_at: self.lock().updated_at.clone(),
        })
    }

    async fn analyses(&self, query: &AnalysesQuery) -> Result<AnalysesResponse, ApiError> {
        let delay = {
            let mut state = self.lock();
            state.last_query = Some(query.clone());
            query
                .query
                .as_ref()
                .and_then(|text| state.query_delays.get(text).copied())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.record(routes::ANALYSES)?;

        let state = self.lock();
        let analyses = state
            .analyses
            .iter()
            .filter(|analysis| matches(analysis, query))
            .take(query.per_page as usize)
            .cloned()
            .collect();
        Ok(AnalysesResponse { analyses })
    }

    async fn analysis(&self, id: u64) -> Result<Analysis, ApiError> {
        let path = routes::analysis(id);
        self.record(&path)?;
        let found = self.lock().analyses.iter().find(|a| a.id == id).cloned();
        found.ok_or_else(|| not_found(path))
    }

    async fn update_analysis(
        &self,
        id: u64,
        update: &AnalysisUpdate,
    ) -> Result<Analysis, ApiError> {
        let delay = self.lock().update_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let path = routes::analysis(id);
        self.record(&path)?;

        let mut state = self.lock();
        let analysis = state
            .analyses
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| not_found(path))?;
        if let Some(comment) = &update.comment {
            analysis.comment = Some(comment.clone());
        }
        if let Some(is_visible) = update.is_visible {
            analysis.is_visible = is_visible;
        }
        Ok(analysis.clone())
    }

    async fn aggregate_jobs(&self) -> Result<JobsResponse, ApiError> {
        self.record(routes::AGGREGATE_JOBS)?;
        Ok(JobsResponse {
            jobs: self.lock().jobs.clone(),
        })
    }
}
