pub mod http;

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::filter::SessionQuery;
use crate::models::{
    AuthToken, CreateUserRequest, LoginRequest, MeResponse, ProjectDetail, SessionListResult,
};

pub use http::HttpGateway;

/// Remote source of sessions and projects
#[async_trait]
pub trait EntityGateway: Send + Sync {
    /// One page of sessions matching the query; no partial results
    async fn get_sessions(&self, query: &SessionQuery) -> Result<SessionListResult, GatewayError>;

    async fn get_project(&self, id: &str) -> Result<ProjectDetail, GatewayError>;
}

/// Remote authentication endpoints
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> Result<AuthToken, GatewayError>;

    async fn register(&self, request: &CreateUserRequest) -> Result<AuthToken, GatewayError>;

    /// Profile of the user owning the current token
    async fn me(&self) -> Result<MeResponse, GatewayError>;

    async fn logout(&self) -> Result<(), GatewayError>;

    /// Set the bearer token sent with later requests, `None` to send none
    async fn use_token(&self, token: Option<String>);
}
