pub mod project;
pub mod session;
pub mod user;

pub use project::ProjectDetail;
pub use session::{Session, SessionListResult};
pub use user::{AuthToken, CreateUserRequest, LoginRequest, MeResponse};
