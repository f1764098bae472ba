//! Session list coordinator.
//!
//! Owns the filter form, the shared project selection as seen by this
//! dashboard, and the last good session page. Decides when the session list
//! and the project detail are fetched again and publishes every state change
//! on a `watch` channel for renderers.
//!
//! At most one sessions fetch and one project fetch are in flight at a time.
//! A trigger that arrives while a fetch of the same kind is outstanding is
//! dropped; the outstanding fetch's completion is the only update for that
//! cycle. The in-flight check and the transition to `InFlight` happen under
//! the same write lock. Each fetch carries the mount epoch it was issued in;
//! `unmount()` bumps the epoch and frees both request slots, so completions
//! from an earlier mount are ignored and never hold the slots.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::GatewayError;
use crate::filter::{Filter, FilterForm, FilterKey};
use crate::gateway::EntityGateway;
use crate::models::{ProjectDetail, Session, SessionListResult};
use crate::pagination::{compute_window, PageWindow};
use crate::selection::{ProjectScope, SelectionStore};

/// Lifecycle of one kind of remote request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequestState {
    #[default]
    Idle,
    InFlight,
    Succeeded,
    Failed(String),
}

impl RequestState {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, RequestState::InFlight)
    }
}

/// Everything a renderer needs to draw the sessions page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardView {
    pub sessions: Vec<Session>,
    pub total: u64,
    pub current_project: Option<ProjectDetail>,
    pub selection: ProjectScope,
    pub filters: FilterForm,
    pub sessions_request: RequestState,
    pub project_request: RequestState,
    pub last_error: Option<String>,
    pub mounted: bool,
}

impl DashboardView {
    pub fn is_loading(&self) -> bool {
        self.sessions_request.is_in_flight() || self.project_request.is_in_flight()
    }

    /// A finished fetch that returned no rows
    pub fn is_empty(&self) -> bool {
        !self.is_loading() && self.sessions.is_empty()
    }

    pub fn current_page(&self) -> u32 {
        self.filters.current_page()
    }

    pub fn page_window(&self) -> PageWindow {
        compute_window(self.total, self.filters.page_size(), self.filters.current_page())
    }

    pub fn title(&self) -> String {
        match (&self.selection, &self.current_project) {
            (ProjectScope::Project(id), Some(project)) if project.id == *id => {
                format!("{} - Sessions", project.name)
            }
            _ => "Sessions".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct SessionsDashboard {
    gateway: Arc<dyn EntityGateway>,
    selection: SelectionStore,
    state: Arc<RwLock<DashboardView>>,
    view_tx: Arc<watch::Sender<DashboardView>>,
    listener: Arc<Mutex<Option<JoinHandle<()>>>>,
    epoch: Arc<AtomicU64>,
}

impl SessionsDashboard {
    pub fn new(gateway: Arc<dyn EntityGateway>, selection: SelectionStore) -> Self {
        let (view_tx, _) = watch::channel(DashboardView::default());
        Self {
            gateway,
            selection,
            state: Arc::new(RwLock::new(DashboardView::default())),
            view_tx: Arc::new(view_tx),
            listener: Arc::new(Mutex::new(None)),
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Receive a snapshot after every state change
    pub fn watch(&self) -> watch::Receiver<DashboardView> {
        self.view_tx.subscribe()
    }

    pub async fn view(&self) -> DashboardView {
        self.state.read().await.clone()
    }

    /// Wait until neither fetch is outstanding
    pub async fn wait_idle(&self) -> DashboardView {
        let mut rx = self.watch();
        let idle = match rx.wait_for(|view| !view.is_loading()).await {
            Ok(view) => Some(view.clone()),
            Err(_) => None,
        };
        match idle {
            Some(view) => view,
            None => self.view().await,
        }
    }

    /// Apply the persisted selection, issue the initial fetches and start
    /// following selection broadcasts
    pub async fn mount(&self) {
        if self.state.read().await.mounted {
            return;
        }

        // Subscribe before reading the slot so no write falls in between
        let rx = self.selection.subscribe();
        let scope = match self.selection.read().await {
            Ok(scope) => scope,
            Err(e) => {
                tracing::warn!("Failed to read selected project, showing all: {}", e);
                ProjectScope::All
            }
        };

        {
            let mut state = self.state.write().await;
            state.mounted = true;
            tracing::info!("Sessions dashboard mounted (project: {})", scope);

            self.apply_selection(&mut state, scope);
            self.begin_sessions_fetch(&mut state, "mount");
            self.publish(&state);
        }

        let handle = tokio::spawn(self.clone().follow_selection(rx));
        if let Some(previous) = self.listener.lock().await.replace(handle) {
            previous.abort();
        }
    }

    /// Stop following the selection; responses still in flight are discarded
    pub async fn unmount(&self) {
        if let Some(handle) = self.listener.lock().await.take() {
            handle.abort();
        }

        let mut state = self.state.write().await;
        state.mounted = false;
        self.epoch.fetch_add(1, Ordering::SeqCst);
        if state.sessions_request.is_in_flight() {
            state.sessions_request = RequestState::Idle;
        }
        if state.project_request.is_in_flight() {
            state.project_request = RequestState::Idle;
        }
        self.publish(&state);
        tracing::info!("Sessions dashboard unmounted");
    }

    async fn follow_selection(self, mut rx: broadcast::Receiver<ProjectScope>) {
        loop {
            match rx.recv().await {
                Ok(scope) => self.on_selection_changed(scope).await,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Missed {} selection updates, re-reading slot", skipped);
                    self.resync_selection().await;
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    pub async fn on_selection_changed(&self, scope: ProjectScope) {
        let mut state = self.state.write().await;
        if !state.mounted {
            return;
        }
        self.apply_selection(&mut state, scope);
        self.publish(&state);
    }

    /// Poll the persisted slot and adopt a selection written elsewhere
    pub async fn resync_selection(&self) {
        let scope = match self.selection.read().await {
            Ok(scope) => scope,
            Err(e) => {
                tracing::warn!("Failed to re-read selected project: {}", e);
                return;
            }
        };

        let mut state = self.state.write().await;
        if !state.mounted || state.selection == scope {
            return;
        }
        tracing::info!("Selected project changed externally: {}", scope);
        self.apply_selection(&mut state, scope);
        self.publish(&state);
    }

    pub async fn set_filter(&self, filter: Filter) {
        self.update_filters("filter", |filters| filters.set_filter(filter))
            .await;
    }

    pub async fn remove_filter(&self, key: FilterKey) {
        self.update_filters("filter", |filters| filters.remove_filter(key))
            .await;
    }

    pub async fn set_page(&self, page: u32) {
        self.update_filters("page", |filters| filters.set_page(page))
            .await;
    }

    /// Inert on the last page
    pub async fn next_page(&self) {
        let target = self.state.read().await.page_window().next();
        if let Some(page) = target {
            self.set_page(page).await;
        }
    }

    /// Inert on the first page
    pub async fn previous_page(&self) {
        let target = self.state.read().await.page_window().previous();
        if let Some(page) = target {
            self.set_page(page).await;
        }
    }

    pub async fn pick_from_date(&self, at: Option<DateTime<Utc>>) {
        self.update_filters("pick", |filters| {
            filters.pick_from_date(at);
            false
        })
        .await;
    }

    pub async fn pick_to_date(&self, at: Option<DateTime<Utc>>) {
        self.update_filters("pick", |filters| {
            filters.pick_to_date(at);
            false
        })
        .await;
    }

    pub async fn apply_date_range(&self) {
        self.update_filters("date range", |filters| filters.apply_date_range())
            .await;
    }

    /// Reset the filter controls; the persisted project selection stays applied
    pub async fn clear_filters(&self) {
        let persisted = match self.selection.read().await {
            Ok(scope) => Some(scope),
            Err(e) => {
                tracing::warn!("Failed to read selected project while clearing: {}", e);
                None
            }
        };

        let mut state = self.state.write().await;
        if let Some(scope) = persisted {
            if scope != state.selection {
                self.apply_selection(&mut state, scope);
            }
        }

        let scope = state.selection.clone();
        if state.filters.clear(&scope) {
            self.begin_sessions_fetch(&mut state, "clear");
        }
        self.publish(&state);
    }

    /// Fetch the current page again even though nothing changed
    pub async fn refresh(&self) {
        let mut state = self.state.write().await;
        if self.begin_sessions_fetch(&mut state, "refresh") {
            self.publish(&state);
        }
    }

    async fn update_filters(&self, reason: &'static str, edit: impl FnOnce(&mut FilterForm) -> bool) {
        let mut state = self.state.write().await;
        if edit(&mut state.filters) {
            self.begin_sessions_fetch(&mut state, reason);
        }
        self.publish(&state);
    }

    fn apply_selection(&self, state: &mut DashboardView, scope: ProjectScope) {
        let filters_changed = state.filters.set_project_scope(&scope);

        match scope.project_id() {
            Some(id) => {
                let loaded = state.current_project.as_ref().map(|p| p.id.as_str());
                if loaded != Some(id) {
                    self.begin_project_fetch(state, id.to_string());
                }
            }
            None => {
                if state.current_project.take().is_some() {
                    tracing::debug!("Cleared current project");
                }
            }
        }

        state.selection = scope;
        if filters_changed {
            self.begin_sessions_fetch(state, "selection");
        }
    }

    fn begin_sessions_fetch(&self, state: &mut DashboardView, reason: &'static str) -> bool {
        if !state.mounted {
            return false;
        }
        if state.sessions_request.is_in_flight() {
            tracing::debug!("Sessions fetch in flight, dropping {} trigger", reason);
            return false;
        }

        state.sessions_request = RequestState::InFlight;
        let query = state.filters.query().clone();
        let request_id = Uuid::new_v4();
        let epoch = self.epoch.load(Ordering::SeqCst);
        tracing::debug!(
            "Fetching sessions [{}] reason={} limit={} offset={} project={:?}",
            request_id,
            reason,
            query.limit,
            query.offset,
            query.project_id
        );

        let this = self.clone();
        tokio::spawn(async move {
            let result = this.gateway.get_sessions(&query).await;
            this.finish_sessions_fetch(epoch, request_id, result).await;
        });
        true
    }

    async fn finish_sessions_fetch(
        &self,
        epoch: u64,
        request_id: Uuid,
        result: Result<SessionListResult, GatewayError>,
    ) {
        let mut state = self.state.write().await;
        if !state.mounted || epoch != self.epoch.load(Ordering::SeqCst) {
            tracing::debug!("Discarding sessions response [{}] after unmount", request_id);
            return;
        }

        match result {
            Ok(list) => {
                tracing::debug!(
                    "Sessions fetched [{}]: {} rows of {}",
                    request_id,
                    list.items.len(),
                    list.total
                );
                // rows and total always come from the same response
                state.sessions = list.items;
                state.total = list.total;
                state.sessions_request = RequestState::Succeeded;
            }
            Err(e) => {
                tracing::error!("Failed to fetch sessions [{}]: {}", request_id, e);
                state.sessions_request = RequestState::Failed(e.to_string());
                state.last_error = Some(format!("Failed to fetch sessions: {}", e));
            }
        }
        self.publish(&state);
    }

    fn begin_project_fetch(&self, state: &mut DashboardView, id: String) -> bool {
        if !state.mounted {
            return false;
        }
        if state.project_request.is_in_flight() {
            tracing::debug!("Project fetch in flight, dropping trigger for {}", id);
            return false;
        }

        state.project_request = RequestState::InFlight;
        let epoch = self.epoch.load(Ordering::SeqCst);
        tracing::debug!("Fetching project {}", id);

        let this = self.clone();
        tokio::spawn(async move {
            let result = this.gateway.get_project(&id).await;
            this.finish_project_fetch(epoch, id, result).await;
        });
        true
    }

    async fn finish_project_fetch(
        &self,
        epoch: u64,
        id: String,
        result: Result<ProjectDetail, GatewayError>,
    ) {
        let mut state = self.state.write().await;
        if !state.mounted || epoch != self.epoch.load(Ordering::SeqCst) {
            tracing::debug!("Discarding project {} response after unmount", id);
            return;
        }

        if state.selection.project_id() != Some(id.as_str()) {
            tracing::debug!("Selection moved away from {}, discarding project", id);
            state.project_request = RequestState::Idle;
            // the trigger for the new project was dropped while this one ran
            if let Some(current) = state.selection.project_id().map(str::to_string) {
                self.begin_project_fetch(&mut state, current);
            }
            self.publish(&state);
            return;
        }

        match result {
            Ok(project) => {
                state.current_project = Some(project);
                state.project_request = RequestState::Succeeded;
            }
            Err(e) => {
                tracing::error!("Error fetching project details for {}: {}", id, e);
                state.current_project = None;
                state.project_request = RequestState::Failed(e.to_string());
                state.last_error = Some(format!("Failed to fetch project: {}", e));
            }
        }
        self.publish(&state);
    }

    fn publish(&self, state: &DashboardView) {
        self.view_tx.send_replace(state.clone());
    }
}
