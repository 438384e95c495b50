//! Client for the analysis API.
//!
//! [`ApiClient`] is the seam the domain store calls through; [`HttpApi`] is the
//! production implementation. Every request carries the session's bearer token
//! when one is set on the shared [`Credential`].

use std::future::Future;
use std::time::Duration;

use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use trailblazer_dash_protocol::{
    routes, AnalysesQuery, AnalysesResponse, Analysis, AnalysisUpdate, InfoResponse, JobsResponse,
};
use url::Url;

use crate::credential::Credential;
use crate::error::ApiError;

/// Remote operations the dashboard performs.
pub trait ApiClient {
    /// `GET info`: data freshness.
    fn info(&self) -> impl Future<Output = Result<InfoResponse, ApiError>> + Send;

    /// `GET analyses?...`: one page of analyses.
    fn analyses(
        &self,
        query: &AnalysesQuery,
    ) -> impl Future<Output = Result<AnalysesResponse, ApiError>> + Send;

    /// `GET analyses/{id}`.
    fn analysis(&self, id: u64) -> impl Future<Output = Result<Analysis, ApiError>> + Send;

    /// `PUT analyses/{id}`: returns the updated record.
    fn update_analysis(
        &self,
        id: u64,
        update: &AnalysisUpdate,
    ) -> impl Future<Output = Result<Analysis, ApiError>> + Send;

    /// `GET aggregate/jobs`.
    fn aggregate_jobs(&self) -> impl Future<Output = Result<JobsResponse, ApiError>> + Send;
}

/// [`ApiClient`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpApi {
    http: reqwest::Client,
    base_url: Url,
    credential: Credential,
}

impl HttpApi {
    pub fn new(base_url: Url, credential: Credential) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            credential,
        }
    }

    /// Client whose requests give up after `timeout`.
    pub fn with_timeout(
        base_url: Url,
        credential: Credential,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url,
            credential,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|source| ApiError::InvalidUrl {
                path: path.to_string(),
                source,
            })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.credential.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        path: &str,
    ) -> Result<T, ApiError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                path: path.to_string(),
            });
        }
        Ok(response.json::<T>().await?)
    }
}

impl ApiClient for HttpApi {
    async fn info(&self) -> Result<InfoResponse, ApiError> {
        let url = self.endpoint(routes::INFO)?;
        self.send(self.http.get(url), routes::INFO).await
    }

    async fn analyses(&self, query: &AnalysesQuery) -> Result<AnalysesResponse, ApiError> {
        let url = self.endpoint(routes::ANALYSES)?;
        let request = self.http.get(url).query(&query.to_pairs());
        self.send(request, routes::ANALYSES).await
    }

    async fn analysis(&self, id: u64) -> Result<Analysis, ApiError> {
        let path = routes::analysis(id);
        let url = self.endpoint(&path)?;
        self.send(self.http.get(url), &path).await
    }

    async fn update_analysis(
        &self,
        id: u64,
        update: &AnalysisUpdate,
    ) -> Result<Analysis, ApiError> {
        let path = routes::analysis(id);
        let url = self.endpoint(&path)?;
        self.send(self.http.put(url).json(update), &path).await
    }

    async fn aggregate_jobs(&self) -> Result<JobsResponse, ApiError> {
        let url = self.endpoint(routes::AGGREGATE_JOBS)?;
        self.send(self.http.get(url), routes::AGGREGATE_JOBS).await
    }
}
