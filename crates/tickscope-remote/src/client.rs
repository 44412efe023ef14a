use chrono_tz::Tz;
use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, COOKIE, HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use uuid::Uuid;

use tickscope_core::model::{CanonicalTask, TaskRef};
use tickscope_core::normalize::{NormalizeContext, normalize_tasks};
use tickscope_core::snapshot::{Credentials, SyncSnapshot};

use crate::error::{RemoteError, Result};

const BROWSER_USER_AGENT: &str = "Mozilla/5.0";
const ERROR_BODY_CHARS: usize = 300;

// ─── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatus {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub inbox_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteItem {
    pub task_id: String,
    pub project_id: String,
}

/// Body of `POST /batch/task`; unused sections are sent as empty arrays.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub add: Vec<Value>,
    pub add_attachments: Vec<Value>,
    pub delete: Vec<DeleteItem>,
    pub delete_attachments: Vec<Value>,
    pub update_attachments: Vec<Value>,
    pub update: Vec<Value>,
}

impl BatchRequest {
    pub fn deletes(refs: &[TaskRef]) -> Self {
        Self {
            delete: refs
                .iter()
                .map(|r| DeleteItem {
                    task_id: r.id.clone(),
                    project_id: r.project_id.clone(),
                })
                .collect(),
            ..Self::default()
        }
    }

    pub fn updates(records: &[Value]) -> Self {
        Self {
            update: records.to_vec(),
            ..Self::default()
        }
    }
}

/// Everything one live run needs, read in a single round.
#[derive(Debug, Clone)]
pub struct LiveSnapshot {
    pub username: String,
    pub base_url: String,
    pub inbox_id: Option<String>,
    pub check_point: Option<i64>,
    pub tasks: Vec<CanonicalTask>,
}

// ─── TickTickClient ───────────────────────────────────────────────────────────

/// Client for the private v2 web API used by the TickTick/Dida web app.
pub struct TickTickClient {
    client: reqwest::Client,
    api_root: String,
    headers: HeaderMap,
}

/// Descriptor the web app sends in `x-device`; the id is random per client.
fn device_descriptor() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    json!({
        "platform": "web",
        "os": "Windows 10",
        "device": "Firefox 117.0",
        "name": "",
        "version": 6070,
        "id": format!("66{}", &hex[..22]),
        "channel": "website",
        "campaign": "",
        "websocket": "",
    })
    .to_string()
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| RemoteError::MissingCredentials("token is not a valid header value".to_string()))
}

impl TickTickClient {
    pub fn new(credentials: &Credentials) -> Result<Self> {
        Self::with_api_root(
            &format!("https://api.{}/api/v2", credentials.base_url),
            &credentials.token,
        )
    }

    pub fn with_api_root(api_root: &str, token: &str) -> Result<Self> {
        if token.is_empty() {
            return Err(RemoteError::MissingCredentials("empty token".to_string()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert("x-device", header_value(&device_descriptor())?);
        headers.insert(COOKIE, header_value(&format!("t={token};"))?);
        headers.insert("t", header_value(token)?);

        let client = reqwest::Client::builder().gzip(true).build()?;
        Ok(Self {
            client,
            api_root: api_root.trim_end_matches('/').to_string(),
            headers,
        })
    }

    async fn request(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&BatchRequest>,
    ) -> Result<Value> {
        debug!(%method, endpoint, "ticktick request");
        let url = format!("{}{}", self.api_root, endpoint);
        let mut builder = self
            .client
            .request(method.clone(), &url)
            .headers(self.headers.clone());
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(RemoteError::Api {
                status: status.as_u16(),
                method: method.to_string(),
                endpoint: endpoint.to_string(),
                body: text.chars().take(ERROR_BODY_CHARS).collect(),
            });
        }

        // Some endpoints answer with an empty body.
        Ok(serde_json::from_str(&text).unwrap_or(Value::Null))
    }

    pub async fn fetch_status(&self) -> Result<UserStatus> {
        let body = self.request(Method::GET, "/user/status", None).await?;
        if body.is_null() {
            return Ok(UserStatus::default());
        }
        serde_json::from_value(body).map_err(|e| RemoteError::Parse(e.to_string()))
    }

    pub async fn fetch_projects(&self) -> Result<Vec<Value>> {
        let body = self.request(Method::GET, "/projects", None).await?;
        match body {
            Value::Array(projects) => Ok(projects),
            other => {
                warn!(body = %other, "projects response is not a list");
                Err(RemoteError::Parse("expected a JSON array from /projects".to_string()))
            }
        }
    }

    pub async fn fetch_sync(&self, check_point: i64) -> Result<SyncSnapshot> {
        let endpoint = format!("/batch/check/{check_point}");
        let body = self.request(Method::GET, &endpoint, None).await?;
        Ok(SyncSnapshot::from_value(&body)?)
    }

    pub async fn batch_task(&self, batch: &BatchRequest) -> Result<Value> {
        self.request(Method::POST, "/batch/task", Some(batch)).await
    }

    /// Status, projects and the full sync are read concurrently; tasks are
    /// normalized only once all three succeeded.
    pub async fn fetch_snapshot(
        &self,
        credentials: &Credentials,
        timezone: Tz,
    ) -> Result<LiveSnapshot> {
        let (status, projects, sync) = tokio::try_join!(
            self.fetch_status(),
            self.fetch_projects(),
            self.fetch_sync(0)
        )?;

        let inbox_id = status.inbox_id.or_else(|| credentials.inbox_id.clone());
        let ctx = NormalizeContext::new(&credentials.base_url, inbox_id.clone(), timezone)
            .with_projects(&projects);
        let tasks = normalize_tasks(&sync.tasks, &ctx)?;
        info!(
            tasks = tasks.len(),
            projects = projects.len(),
            check_point = ?sync.check_point,
            "fetched snapshot"
        );

        Ok(LiveSnapshot {
            username: status.username.unwrap_or_else(|| "unknown".to_string()),
            base_url: credentials.base_url.clone(),
            inbox_id,
            check_point: sync.check_point,
            tasks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn creds(base_url: &str) -> Credentials {
        Credentials {
            base_url: base_url.to_string(),
            token: "tok".to_string(),
            inbox_id: Some("inbox-from-file".to_string()),
        }
    }

    #[tokio::test]
    async fn test_fetch_status_sends_session_headers() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/user/status")
            .match_header("t", "tok")
            .match_header("cookie", "t=tok;")
            .match_header("user-agent", "Mozilla/5.0")
            .match_header("x-device", Matcher::Regex(r#""id":"66[0-9a-f]{22}""#.to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"username": "ada", "inboxId": "inbox42"}"#)
            .create_async()
            .await;

        let client = TickTickClient::with_api_root(&server.url(), "tok").unwrap();
        let status = client.fetch_status().await.unwrap();
        assert_eq!(status.username.as_deref(), Some("ada"));
        assert_eq!(status.inbox_id.as_deref(), Some("inbox42"));
    }

    #[tokio::test]
    async fn test_non_success_maps_to_api_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/projects")
            .with_status(401)
            .with_body("x".repeat(400))
            .create_async()
            .await;

        let client = TickTickClient::with_api_root(&server.url(), "tok").unwrap();
        let err = client.fetch_projects().await.unwrap_err();
        match &err {
            RemoteError::Api {
                status,
                method,
                endpoint,
                body,
            } => {
                assert_eq!(*status, 401);
                assert_eq!(method, "GET");
                assert_eq!(endpoint, "/projects");
                assert_eq!(body.len(), 300);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().starts_with("HTTP 401 GET /projects xxx"));
    }

    #[tokio::test]
    async fn test_projects_must_be_a_list() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/projects")
            .with_status(200)
            .with_body(r#"{"projects": []}"#)
            .create_async()
            .await;

        let client = TickTickClient::with_api_root(&server.url(), "tok").unwrap();
        let err = client.fetch_projects().await.unwrap_err();
        assert!(matches!(err, RemoteError::Parse(_)));
    }

    #[tokio::test]
    async fn test_sync_without_task_list_is_rejected() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/batch/check/0")
            .with_status(200)
            .with_body(r#"{"checkPoint": 5}"#)
            .create_async()
            .await;

        let client = TickTickClient::with_api_root(&server.url(), "tok").unwrap();
        let err = client.fetch_sync(0).await.unwrap_err();
        assert!(matches!(err, RemoteError::Core(_)));
    }

    #[tokio::test]
    async fn test_batch_delete_payload() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/batch/task")
            .match_body(Matcher::Json(json!({
                "add": [],
                "addAttachments": [],
                "delete": [{"taskId": "a", "projectId": "p"}],
                "deleteAttachments": [],
                "updateAttachments": [],
                "update": [],
            })))
            .with_status(200)
            .with_body("{}")
            .expect(1)
            .create_async()
            .await;

        let client = TickTickClient::with_api_root(&server.url(), "tok").unwrap();
        let refs = vec![TaskRef {
            id: "a".to_string(),
            project_id: "p".to_string(),
        }];
        client.batch_task(&BatchRequest::deletes(&refs)).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_snapshot_normalizes_tasks() {
        let mut server = Server::new_async().await;
        let _status = server
            .mock("GET", "/user/status")
            .with_status(200)
            .with_body(r#"{"username": "ada", "inboxId": "inbox42"}"#)
            .create_async()
            .await;
        let _projects = server
            .mock("GET", "/projects")
            .with_status(200)
            .with_body(r#"[{"id": "p1", "name": "Work"}]"#)
            .create_async()
            .await;
        let _sync = server
            .mock("GET", "/batch/check/0")
            .with_status(200)
            .with_body(
                r#"{"checkPoint": 99, "syncTaskBean": {"update": [
                    {"id": "t1", "title": "Inbox item", "status": 0, "projectId": "inbox42"},
                    {"id": "t2", "title": "Work item", "status": 0, "projectId": "p1"}
                ]}}"#,
            )
            .create_async()
            .await;

        let client = TickTickClient::with_api_root(&server.url(), "tok").unwrap();
        let snapshot = client
            .fetch_snapshot(&creds("dida365.com"), chrono_tz::Asia::Shanghai)
            .await
            .unwrap();

        assert_eq!(snapshot.username, "ada");
        assert_eq!(snapshot.check_point, Some(99));
        assert_eq!(snapshot.inbox_id.as_deref(), Some("inbox42"));
        assert_eq!(snapshot.tasks.len(), 2);
        assert!(snapshot.tasks[0].is_inbox);
        assert_eq!(snapshot.tasks[1].project_name, "Work");
    }

    #[tokio::test]
    async fn test_fetch_snapshot_fails_when_any_read_fails() {
        let mut server = Server::new_async().await;
        let _status = server
            .mock("GET", "/user/status")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;
        let _projects = server
            .mock("GET", "/projects")
            .with_status(503)
            .with_body("down")
            .create_async()
            .await;
        let _sync = server
            .mock("GET", "/batch/check/0")
            .with_status(200)
            .with_body(r#"{"syncTaskBean": {"update": []}}"#)
            .create_async()
            .await;

        let client = TickTickClient::with_api_root(&server.url(), "tok").unwrap();
        let err = client
            .fetch_snapshot(&creds("dida365.com"), chrono_tz::UTC)
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Api { status: 503, .. }));
    }

    #[test]
    fn test_empty_token_is_rejected() {
        assert!(matches!(
            TickTickClient::with_api_root("http://localhost", ""),
            Err(RemoteError::MissingCredentials(_))
        ));
    }
}
