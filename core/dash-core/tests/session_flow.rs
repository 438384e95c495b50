//! End-to-end flow through the public API: log in, load the dashboard, edit,
//! log out.

use std::sync::Mutex;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use dash_core::protocol::{
    AnalysesQuery, AnalysesResponse, Analysis, AnalysisStatus, AnalysisUpdate, InfoResponse,
    JobStat, JobsResponse,
};
use dash_core::{
    ApiClient, ApiError, Credential, DomainStore, FileStore, SessionMachine, SessionState,
    StorageConfig, StoreError, TokenSource,
};
use serde_json::json;

fn unsigned_token(claims: serde_json::Value) -> String {
    format!(
        "{}.{}.sig",
        URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#),
        URL_SAFE_NO_PAD.encode(claims.to_string())
    )
}

/// Backend that only answers authenticated requests.
struct GuardedApi {
    credential: Credential,
    analyses: Mutex<Vec<Analysis>>,
}

impl GuardedApi {
    fn new(credential: Credential) -> Self {
        let analyses = vec![
            Analysis::new(10, AnalysisStatus::Failed),
            Analysis::new(11, AnalysisStatus::Completed),
            Analysis::new(12, AnalysisStatus::Running),
        ];
        Self {
            credential,
            analyses: Mutex::new(analyses),
        }
    }

    fn check(&self, path: &str) -> Result<(), ApiError> {
        match self.credential.authorization() {
            Some(header) if header.starts_with("Bearer ") => Ok(()),
            _ => Err(ApiError::Status {
                status: 401,
                path: path.to_string(),
            }),
        }
    }
}

impl ApiClient for GuardedApi {
    async fn info(&self) -> Result<InfoResponse, ApiError> {
        self.check("info")?;
        Ok(InfoResponse {
            updated_at: Some("2024-03-01T09:00:00Z".to_string()),
        })
    }

    async fn analyses(&self, _query: &AnalysesQuery) -> Result<AnalysesResponse, ApiError> {
        self.check("analyses")?;
        Ok(AnalysesResponse {
            analyses: self.analyses.lock().unwrap().clone(),
        })
    }

    async fn analysis(&self, id: u64) -> Result<Analysis, ApiError> {
        self.check("analyses/:id")?;
        Ok(Analysis::new(id, AnalysisStatus::Failed))
    }

    async fn update_analysis(
        &self,
        id: u64,
        update: &AnalysisUpdate,
    ) -> Result<Analysis, ApiError> {
        self.check("analyses/:id")?;
        let mut analyses = self.analyses.lock().unwrap();
        let analysis = analyses.iter_mut().find(|a| a.id == id).unwrap();
        if let Some(comment) = &update.comment {
            analysis.comment = Some(comment.clone());
        }
        if let Some(visible) = update.is_visible {
            analysis.is_visible = visible;
        }
        Ok(analysis.clone())
    }

    async fn aggregate_jobs(&self) -> Result<JobsResponse, ApiError> {
        self.check("aggregate/jobs")?;
        Ok(JobsResponse {
            jobs: vec![
                JobStat {
                    name: "gatk".to_string(),
                    count: 3,
                },
                JobStat {
                    name: "bwa".to_string(),
                    count: 8,
                },
            ],
        })
    }
}

struct StaticSource(String);

impl TokenSource for StaticSource {
    async fn fetch_token(&self) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.0.clone())
    }
}

#[tokio::test]
async fn dashboard_session_lifecycle() {
    let temp = tempfile::tempdir().unwrap();
    let storage = StorageConfig::with_root(temp.path().to_path_buf());
    let credential = Credential::new();
    let mut session = SessionMachine::for_client(
        FileStore::new(storage.client_storage_file()),
        credential.clone(),
    );
    let store = DomainStore::new(GuardedApi::new(credential.clone()));

    let denied = store.fetch_analyses(None, None).await.unwrap_err();
    assert!(matches!(
        denied,
        StoreError::Remote(ApiError::Status { status: 401, .. })
    ));
    assert!(store.analyses().is_empty());

    session
        .login(&unsigned_token(json!({"sub": "u1", "name": "Kenny"})))
        .unwrap();
    assert_eq!(session.state(), SessionState::Authenticated);

    assert_eq!(store.fetch_analyses(None, Some(true)).await.unwrap(), 3);
    assert_eq!(store.fetch_job_stats().await.unwrap(), 2);
    assert_eq!(store.ranked_job_stats()[0].name, "bwa");
    assert_eq!(store.failed_analyses().len(), 1);

    store.update_comment(10, "looking into it").await.unwrap();
    store.hide_analysis(11).await.unwrap();
    let ids: Vec<u64> = store.analyses().iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![10, 12]);
    assert_eq!(store.analyses()[0].comment.as_deref(), Some("looking into it"));

    session
        .refresh_from(&StaticSource(unsigned_token(
            json!({"sub": "u1", "name": "Kenny", "exp": 2_000_000_000}),
        )))
        .await
        .unwrap();
    assert!(session.user().unwrap().expires_at().is_some());

    session.logout();
    assert!(!credential.is_set());
    assert!(store.fetch_last_update().await.is_err());
    assert!(store.last_update().is_none());

    let mut restarted = SessionMachine::for_client(
        FileStore::new(storage.client_storage_file()),
        Credential::new(),
    );
    assert_eq!(
        restarted.bootstrap_from_client_storage(),
        SessionState::Anonymous
    );
}

#[test]
fn request_bootstrap_reads_only_the_jwt_cookie() {
    use dash_core::read_token_from_cookie;
    use reqwest::header::{HeaderMap, HeaderValue, COOKIE};

    let token = unsigned_token(json!({"sub": "u2"}));
    let mut headers = HeaderMap::new();
    headers.insert(
        COOKIE,
        HeaderValue::from_str(&format!("session=abc; jwt={}", token)).unwrap(),
    );
    assert_eq!(read_token_from_cookie(&headers), Some(token.clone()));

    let mut machine = SessionMachine::for_server(Credential::new());
    machine.bootstrap_from_request(&headers);
    assert_eq!(machine.user().unwrap().subject(), Some("u2"));
    assert_eq!(machine.credential().authorization(), Some(format!("Bearer {}", token)));
}
