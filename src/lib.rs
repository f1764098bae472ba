pub mod auth;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod filter;
pub mod gateway;
pub mod models;
pub mod pagination;
pub mod render;
pub mod selection;
pub mod shell;
pub mod storage;
