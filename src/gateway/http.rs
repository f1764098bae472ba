use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::{AuthApi, EntityGateway};
use crate::error::GatewayError;
use crate::filter::SessionQuery;
use crate::models::{
    AuthToken, CreateUserRequest, LoginRequest, MeResponse, ProjectDetail, SessionListResult,
};

const API_PREFIX: &str = "/api/v1";

/// `reqwest` client for the Kogase REST API
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
    token: Arc<RwLock<Option<String>>>,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(3))
            .build()?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        tracing::info!("API gateway configured: {}", base_url);

        Ok(Self {
            client,
            base_url,
            token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, path)
    }

    /// `path` followed by `segment`, percent-encoded as a single segment
    fn url_with_segment(&self, path: &str, segment: &str) -> Result<Url, GatewayError> {
        let mut url = Url::parse(&self.url(path))
            .map_err(|e| GatewayError::InvalidUrl(format!("{}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| GatewayError::InvalidUrl(self.base_url.clone()))?
            .push(segment);
        Ok(url)
    }

    async fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.token.read().await.as_deref() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response, GatewayError> {
        let response = self.authorized(builder).await.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            return Err(GatewayError::Unauthorized);
        }
        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, GatewayError> {
        let response = self.send(builder).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

#[async_trait]
impl EntityGateway for HttpGateway {
    async fn get_sessions(&self, query: &SessionQuery) -> Result<SessionListResult, GatewayError> {
        let builder = self
            .client
            .get(self.url("/sessions"))
            .query(&query.to_params());
        self.send_json(builder).await
    }

    async fn get_project(&self, id: &str) -> Result<ProjectDetail, GatewayError> {
        let builder = self.client.get(self.url_with_segment("/projects", id)?);
        self.send_json(builder).await
    }
}

#[async_trait]
impl AuthApi for HttpGateway {
    async fn login(&self, request: &LoginRequest) -> Result<AuthToken, GatewayError> {
        let builder = self.client.post(self.url("/auth/login")).json(request);
        self.send_json(builder).await
    }

    async fn register(&self, request: &CreateUserRequest) -> Result<AuthToken, GatewayError> {
        let builder = self.client.post(self.url("/auth/register")).json(request);
        self.send_json(builder).await
    }

    async fn me(&self) -> Result<MeResponse, GatewayError> {
        let builder = self.client.get(self.url("/auth/me"));
        self.send_json(builder).await
    }

    async fn logout(&self) -> Result<(), GatewayError> {
        let builder = self.client.post(self.url("/auth/logout"));
        self.send(builder).await?;
        Ok(())
    }

    async fn use_token(&self, token: Option<String>) {
        *self.token.write().await = token;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Path, Query, State},
        http::{HeaderMap, StatusCode as AxumStatus},
        routing::{get, post},
        Json, Router,
    };
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::Mutex;

    type Seen = Arc<Mutex<Vec<HashMap<String, String>>>>;

    async fn sessions_handler(
        State(seen): State<Seen>,
        Query(params): Query<HashMap<String, String>>,
    ) -> Json<Value> {
        seen.lock().unwrap().push(params);
        Json(json!({
            "sessions": [
                {"session_id": "s-1", "begin_at": "2024-03-01T10:00:00Z"}
            ],
            "total": 1
        }))
    }

    async fn project_handler(Path(id): Path<String>) -> Result<Json<Value>, AxumStatus> {
        if id == "p1" {
            Ok(Json(json!({"project_id": "p1", "name": "Kogase"})))
        } else {
            Err(AxumStatus::NOT_FOUND)
        }
    }

    async fn me_handler(headers: HeaderMap) -> Result<Json<Value>, AxumStatus> {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if auth == "Bearer tok-1" {
            Ok(Json(json!({"id": "u1", "username": "ayu"})))
        } else {
            Err(AxumStatus::UNAUTHORIZED)
        }
    }

    async fn login_handler(Json(body): Json<Value>) -> Result<Json<Value>, AxumStatus> {
        if body["password"] == "secret" {
            Ok(Json(json!({"token": "tok-1"})))
        } else {
            Err(AxumStatus::BAD_REQUEST)
        }
    }

    async fn serve() -> (HttpGateway, Seen) {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/api/v1/sessions", get(sessions_handler))
            .route("/api/v1/projects/:id", get(project_handler))
            .route("/api/v1/auth/me", get(me_handler))
            .route("/api/v1/auth/login", post(login_handler))
            .with_state(seen.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let gateway =
            HttpGateway::new(format!("http://{}/", addr), Duration::from_secs(5)).unwrap();
        (gateway, seen)
    }

    #[tokio::test]
    async fn test_get_sessions_sends_filters() {
        let (gateway, seen) = serve().await;
        let query = SessionQuery {
            limit: 20,
            offset: 40,
            project_id: Some("p1".to_string()),
            from_date: Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()),
            to_date: None,
        };

        let result = gateway.get_sessions(&query).await.unwrap();
        assert_eq!(result.total, 1);
        assert_eq!(result.items[0].id, "s-1");

        let seen = seen.lock().unwrap();
        let params = &seen[0];
        assert_eq!(params["limit"], "20");
        assert_eq!(params["offset"], "40");
        assert_eq!(params["project_id"], "p1");
        assert_eq!(params["from_date"], "2024-03-01T00:00:00.000Z");
        assert!(!params.contains_key("to_date"));
    }

    #[tokio::test]
    async fn test_get_project() {
        let (gateway, _) = serve().await;

        let project = gateway.get_project("p1").await.unwrap();
        assert_eq!(project.name, "Kogase");

        let err = gateway.get_project("nope").await.unwrap_err();
        assert!(matches!(err, GatewayError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_project_id_is_a_single_path_segment() {
        let (gateway, _) = serve().await;

        for id in ["p1?x=1", "p1#top", "p1/../p1", "p1%3F"] {
            let err = gateway.get_project(id).await.unwrap_err();
            assert!(
                matches!(err, GatewayError::Status { status: 404, .. }),
                "{} resolved to another resource: {:?}",
                id,
                err
            );
        }

        let url = gateway.url_with_segment("/projects", "a b/c?d").unwrap();
        assert!(url.as_str().ends_with("/api/v1/projects/a%20b%2Fc%3Fd"));
    }

    #[tokio::test]
    async fn test_token_is_sent_after_login() {
        let (gateway, _) = serve().await;

        assert_eq!(gateway.me().await.unwrap_err(), GatewayError::Unauthorized);

        let token = gateway
            .login(&LoginRequest::new("ayu", "secret"))
            .await
            .unwrap();
        gateway.use_token(Some(token.token)).await;

        let me = gateway.me().await.unwrap();
        assert_eq!(me.username, "ayu");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        let gateway = HttpGateway::new("http://127.0.0.1:1", Duration::from_secs(2)).unwrap();
        let err = gateway.get_project("p1").await.unwrap_err();
        assert!(matches!(err, GatewayError::Network(_)));
    }
}
