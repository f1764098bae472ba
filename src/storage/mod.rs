pub mod database;

pub use database::{Database, AUTH_TOKEN_KEY, SELECTED_PROJECT_KEY};
