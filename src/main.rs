use std::sync::Arc;

use anyhow::Context;
use kogase_dashboard::auth::{AuthContext, TokenStore};
use kogase_dashboard::config::AppConfig;
use kogase_dashboard::dashboard::SessionsDashboard;
use kogase_dashboard::filter::Filter;
use kogase_dashboard::gateway::HttpGateway;
use kogase_dashboard::models::{CreateUserRequest, LoginRequest};
use kogase_dashboard::render::{render_auth, render_view};
use kogase_dashboard::selection::SelectionStore;
use kogase_dashboard::shell::{self, Command, HELP};
use kogase_dashboard::storage::Database;
use tokio::io::{AsyncBufReadExt, BufReader};

const LOG_FILE: &str = "kogase-dashboard.log";

struct App {
    auth: AuthContext,
    selection: SelectionStore,
    dashboard: SessionsDashboard,
}

impl App {
    /// Returns false when the shell should exit
    async fn dispatch(&self, command: Command) -> anyhow::Result<bool> {
        match command {
            Command::Page(page) => self.dashboard.set_page(page).await,
            Command::Next => self.dashboard.next_page().await,
            Command::Prev => self.dashboard.previous_page().await,
            Command::Limit(limit) => self.dashboard.set_filter(Filter::PageSize(limit)).await,
            Command::Project(scope) => {
                self.selection
                    .write(scope.clone())
                    .await
                    .context("Failed to save selected project")?;
                // The broadcast listener applies it too; applying here lets
                // the page below reflect it without racing the listener
                self.dashboard.on_selection_changed(scope).await;
            }
            Command::From(at) => self.dashboard.pick_from_date(at).await,
            Command::To(at) => self.dashboard.pick_to_date(at).await,
            Command::Apply => self.dashboard.apply_date_range().await,
            Command::Clear => self.dashboard.clear_filters().await,
            Command::Refresh => self.dashboard.refresh().await,
            Command::Login { username, password } => {
                if let Err(e) = self.auth.login(&LoginRequest::new(username, password)).await {
                    println!("Login failed: {}", e);
                }
                println!("{}", render_auth(&self.auth.state().await));
                self.dashboard.refresh().await;
            }
            Command::Register {
                username,
                email,
                password,
            } => {
                let request = CreateUserRequest {
                    username,
                    email,
                    password,
                };
                if let Err(e) = self.auth.register(&request).await {
                    println!("Registration failed: {}", e);
                }
                println!("{}", render_auth(&self.auth.state().await));
                self.dashboard.refresh().await;
            }
            Command::Logout => {
                self.auth.logout().await;
                println!("{}", render_auth(&self.auth.state().await));
                return Ok(true);
            }
            Command::WhoAmI => {
                println!("{}", render_auth(&self.auth.state().await));
                return Ok(true);
            }
            Command::Help => {
                println!("{}", HELP);
                return Ok(true);
            }
            Command::Quit => return Ok(false),
        }

        let view = self.dashboard.wait_idle().await;
        println!("{}", render_view(&view));
        Ok(true)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Console on stderr so it does not interleave with the rendered page
    let log_dir = AppConfig::log_dir();
    let _ = std::fs::create_dir_all(&log_dir);

    let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE);
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(true)
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(non_blocking),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Kogase dashboard starting... Log file: {:?}", log_dir.join(LOG_FILE));

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    let data_dir = config
        .data_dir()
        .context("No data directory available, set KOGASE_DATA_DIR")?;
    let db = match Database::init(&data_dir).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            eprintln!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    let gateway = Arc::new(
        HttpGateway::new(config.api.base_url.clone(), config.request_timeout())
            .context("Failed to build HTTP client")?,
    );

    let auth = AuthContext::new(gateway.clone(), TokenStore::new(db.clone()));
    auth.init().await;

    let selection = SelectionStore::new(db.clone());
    let dashboard = SessionsDashboard::new(gateway, selection.clone());
    dashboard.mount().await;

    let app = App {
        auth,
        selection,
        dashboard,
    };

    println!("{}", render_auth(&app.auth.state().await));
    println!("{}", render_view(&app.dashboard.wait_idle().await));
    println!("Type 'help' for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let command = match shell::parse(&line) {
            Ok(command) => command,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };
        match app.dispatch(command).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                tracing::error!("{:#}", e);
                println!("{:#}", e);
            }
        }
    }

    app.dashboard.unmount().await;
    db.close().await;
    tracing::info!("Kogase dashboard stopped");
    Ok(())
}
