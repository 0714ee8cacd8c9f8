use std::{fmt, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::{ExperimentId, TagFilter, TagScope, WorkspaceId},
    error::{ApiErrorBody, ApiException},
    protocol::{CreateTagRequest, Experiment, ExperimentEdit, Page, Tag, UserSummary, Workspace},
};
use tracing::{debug, info, warn};
use url::Url;
use zeroize::Zeroize;

pub mod credentials;
pub mod error;
pub mod overview;

pub use credentials::{Credentials, CredentialsError};
pub use error::ClientError;
pub use overview::{novel_tag_names, save_overview, OverviewDraft};

pub const DEFAULT_API_URL: &str = "https://api.labstep.com";
/// Upper bound used for every list request.
pub const DEFAULT_LIST_COUNT: u32 = 1000;
const API_KEY_HEADER: &str = "apikey";
const EXPERIMENT_TAG_TYPE: &str = "experiment_workflow";

pub type Result<T> = std::result::Result<T, ClientError>;

/// Authenticated principal handle. Cloned into every request that needs it.
#[derive(Clone)]
pub struct Session {
    user: UserSummary,
    api_key: String,
}

impl Session {
    pub fn new(user: UserSummary, api_key: impl Into<String>) -> Self {
        Self {
            user,
            api_key: api_key.into(),
        }
    }

    pub fn user(&self) -> &UserSummary {
        &self.user
    }

    fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.api_key.zeroize();
    }
}

#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Session>;
    async fn list_workspaces(&self, session: &Session) -> Result<Vec<Workspace>>;
    async fn list_experiments(
        &self,
        session: &Session,
        workspace_id: WorkspaceId,
        filter: TagFilter,
        count: u32,
    ) -> Result<Vec<Experiment>>;
    async fn get_experiment(
        &self,
        session: &Session,
        experiment_id: ExperimentId,
    ) -> Result<Experiment>;
    async fn list_tags(&self, session: &Session, scope: TagScope) -> Result<Vec<Tag>>;
    async fn edit_experiment(
        &self,
        session: &Session,
        experiment_id: ExperimentId,
        edit: &ExperimentEdit,
    ) -> Result<()>;
    /// Attaches the tag called `name`, creating it first when the user has
    /// no tag by that name.
    async fn add_tag(
        &self,
        session: &Session,
        experiment_id: ExperimentId,
        name: &str,
    ) -> Result<Tag>;
}

/// `RemoteClient` over the Labstep REST API.
#[derive(Clone)]
pub struct LabstepClient {
    http: Client,
    base_url: Url,
}

impl LabstepClient {
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ClientError::HttpSetup)?;
        Self::with_http(base_url, http)
    }

    fn with_http(base_url: &str, http: Client) -> Result<Self> {
        let trimmed = base_url.trim();
        let base_url = Url::parse(trimmed).map_err(|err| ClientError::InvalidBaseUrl {
            url: trimmed.to_string(),
            reason: err.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidBaseUrl {
                url: trimmed.to_string(),
                reason: "url cannot carry a path".to_string(),
            });
        }
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // cannot_be_a_base was rejected in the constructor
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url, api_key: &str) -> RequestBuilder {
        self.http.request(method, url).header(API_KEY_HEADER, api_key)
    }

    async fn execute(request: RequestBuilder, endpoint: &str) -> Result<String> {
        let response = request.send().await.map_err(|source| ClientError::Transport {
            endpoint: endpoint.to_string(),
            source,
        })?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| ClientError::Transport {
                endpoint: endpoint.to_string(),
                source,
            })?;

        if status.is_success() {
            return Ok(body);
        }

        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .ok()
            .and_then(ApiErrorBody::into_message)
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
        warn!(endpoint, status = status.as_u16(), "labstep request failed: {message}");
        if status == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized(message));
        }
        Err(ApiException::new(status.as_u16(), message).into())
    }

    fn decode<T: DeserializeOwned>(body: &str, endpoint: &str) -> Result<T> {
        serde_json::from_str(body).map_err(|source| ClientError::Decode {
            endpoint: endpoint.to_string(),
            source,
        })
    }

    async fn get_json<T, Q>(&self, session_key: &str, segments: &[&str], query: &Q) -> Result<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let url = self.endpoint(segments);
        let endpoint = url.path().to_string();
        debug!(endpoint = %endpoint, "GET");
        let body = Self::execute(
            self.request(Method::GET, url, session_key).query(query),
            &endpoint,
        )
        .await?;
        Self::decode(&body, &endpoint)
    }

    async fn send_json<B>(
        &self,
        method: Method,
        session_key: &str,
        segments: &[&str],
        payload: Option<&B>,
    ) -> Result<String>
    where
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(segments);
        let endpoint = url.path().to_string();
        debug!(endpoint = %endpoint, %method, "send");
        let mut request = self.request(method, url, session_key);
        if let Some(payload) = payload {
            request = request.json(payload);
        }
        Self::execute(request, &endpoint).await
    }

    async fn find_tag_by_name(&self, session: &Session, name: &str) -> Result<Option<Tag>> {
        let count = DEFAULT_LIST_COUNT.to_string();
        let page: Page<Tag> = self
            .get_json(
                session.api_key(),
                &["api", "generic", "tag"],
                &[
                    ("search_query", name),
                    ("type", EXPERIMENT_TAG_TYPE),
                    ("count", count.as_str()),
                ],
            )
            .await?;
        Ok(page.items.into_iter().find(|tag| tag.name == name))
    }
}

#[async_trait]
impl RemoteClient for LabstepClient {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Session> {
        let user: UserSummary = self
            .get_json(
                credentials.api_key(),
                &["api", "generic", "user", credentials.username()],
                &[] as &[(&str, &str)],
            )
            .await?;
        info!(user_id = user.id.0, "authenticated with labstep");
        Ok(Session::new(user, credentials.api_key()))
    }

    async fn list_workspaces(&self, session: &Session) -> Result<Vec<Workspace>> {
        let page: Page<Workspace> = self
            .get_json(
                session.api_key(),
                &["api", "generic", "group"],
                &[
                    ("user_id", session.user().id.0.to_string()),
                    ("count", DEFAULT_LIST_COUNT.to_string()),
                ],
            )
            .await?;
        Ok(page.items)
    }

    async fn list_experiments(
        &self,
        session: &Session,
        workspace_id: WorkspaceId,
        filter: TagFilter,
        count: u32,
    ) -> Result<Vec<Experiment>> {
        let mut query = vec![
            ("group_id", workspace_id.0.to_string()),
            ("count", count.to_string()),
        ];
        if let Some(tag_id) = filter.tag_id() {
            query.push(("tag_id", tag_id.0.to_string()));
        }
        let page: Page<Experiment> = self
            .get_json(
                session.api_key(),
                &["api", "generic", "experiment-workflow"],
                &query,
            )
            .await?;
        Ok(page.items)
    }

    async fn get_experiment(
        &self,
        session: &Session,
        experiment_id: ExperimentId,
    ) -> Result<Experiment> {
        let id = experiment_id.0.to_string();
        self.get_json(
            session.api_key(),
            &["api", "generic", "experiment-workflow", id.as_str()],
            &[] as &[(&str, &str)],
        )
        .await
    }

    async fn list_tags(&self, session: &Session, scope: TagScope) -> Result<Vec<Tag>> {
        let scope_param = match scope {
            TagScope::Experiment(experiment_id) => {
                ("experiment_workflow_id", experiment_id.0.to_string())
            }
            TagScope::User => ("user_id", session.user().id.0.to_string()),
        };
        let page: Page<Tag> = self
            .get_json(
                session.api_key(),
                &["api", "generic", "tag"],
                &[scope_param, ("count", DEFAULT_LIST_COUNT.to_string())],
            )
            .await?;
        Ok(page.items)
    }

    async fn edit_experiment(
        &self,
        session: &Session,
        experiment_id: ExperimentId,
        edit: &ExperimentEdit,
    ) -> Result<()> {
        let id = experiment_id.0.to_string();
        self.send_json(
            Method::PUT,
            session.api_key(),
            &["api", "generic", "experiment-workflow", id.as_str()],
            Some(edit),
        )
        .await?;
        info!(experiment_id = experiment_id.0, "experiment overview updated");
        Ok(())
    }

    async fn add_tag(
        &self,
        session: &Session,
        experiment_id: ExperimentId,
        name: &str,
    ) -> Result<Tag> {
        let tag = match self.find_tag_by_name(session, name).await? {
            Some(tag) => tag,
            None => {
                let body = self
                    .send_json(
                        Method::POST,
                        session.api_key(),
                        &["api", "generic", "tag"],
                        Some(&CreateTagRequest {
                            name: name.to_string(),
                            kind: EXPERIMENT_TAG_TYPE.to_string(),
                        }),
                    )
                    .await?;
                Self::decode::<Tag>(&body, "/api/generic/tag")?
            }
        };

        let experiment = experiment_id.0.to_string();
        let tag_id = tag.id.0.to_string();
        self.send_json::<()>(
            Method::PUT,
            session.api_key(),
            &[
                "api",
                "generic",
                "experiment-workflow",
                experiment.as_str(),
                "tag",
                tag_id.as_str(),
            ],
            None,
        )
        .await?;
        info!(
            experiment_id = experiment_id.0,
            tag_id = tag.id.0,
            "tag attached to experiment"
        );
        Ok(tag)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
