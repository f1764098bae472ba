//! Shared project selection.
//!
//! The selected project lives in a persisted slot so it survives restarts, and
//! every write is broadcast so dashboards that are already mounted pick it up
//! without polling. Writers never lock: a write is a single slot replacement
//! followed by a broadcast, and the last write wins.

use std::fmt;
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::error::StoreError;
use crate::storage::{Database, SELECTED_PROJECT_KEY};

/// Slot value meaning "no project filter"
pub const ALL_PROJECTS: &str = "all";

const CHANNEL_CAPACITY: usize = 16;

/// Which project the dashboard is narrowed to
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum ProjectScope {
    #[default]
    All,
    Project(String),
}

impl ProjectScope {
    /// The one place where `"all"`, empty and absent collapse to [`ProjectScope::All`]
    pub fn normalize(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") | Some(ALL_PROJECTS) => ProjectScope::All,
            Some(id) => ProjectScope::Project(id.to_string()),
        }
    }

    pub fn project_id(&self) -> Option<&str> {
        match self {
            ProjectScope::All => None,
            ProjectScope::Project(id) => Some(id),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, ProjectScope::All)
    }

    fn slot_value(&self) -> &str {
        self.project_id().unwrap_or(ALL_PROJECTS)
    }
}

impl fmt::Display for ProjectScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slot_value())
    }
}

/// Persisted, broadcast project selection shared by every dashboard
#[derive(Clone)]
pub struct SelectionStore {
    db: Arc<Database>,
    tx: broadcast::Sender<ProjectScope>,
}

impl SelectionStore {
    pub fn new(db: Arc<Database>) -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { db, tx }
    }

    /// Raw slot contents, `None` if never written
    pub async fn read_raw(&self) -> Result<Option<String>, StoreError> {
        self.db.get_config(SELECTED_PROJECT_KEY).await
    }

    pub async fn read(&self) -> Result<ProjectScope, StoreError> {
        let raw = self.read_raw().await?;
        Ok(ProjectScope::normalize(raw.as_deref()))
    }

    /// Persist the selection, then notify every live subscriber
    pub async fn write(&self, scope: ProjectScope) -> Result<(), StoreError> {
        self.db
            .set_config(SELECTED_PROJECT_KEY, scope.slot_value())
            .await?;

        tracing::info!("Selected project: {}", scope);

        // No receivers is fine, the slot already holds the value
        let _ = self.tx.send(scope);
        Ok(())
    }

    /// Receive every selection written after this call.
    ///
    /// Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<ProjectScope> {
        self.tx.subscribe()
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    async fn store() -> SelectionStore {
        SelectionStore::new(Arc::new(Database::in_memory().await.unwrap()))
    }

    #[test]
    fn test_normalize() {
        assert_eq!(ProjectScope::normalize(None), ProjectScope::All);
        assert_eq!(ProjectScope::normalize(Some("all")), ProjectScope::All);
        assert_eq!(ProjectScope::normalize(Some("  ")), ProjectScope::All);
        assert_eq!(
            ProjectScope::normalize(Some("p1")),
            ProjectScope::Project("p1".to_string())
        );
    }

    #[tokio::test]
    async fn test_read_unset_is_all() {
        let store = store().await;
        assert_eq!(store.read_raw().await.unwrap(), None);
        assert_eq!(store.read().await.unwrap(), ProjectScope::All);
    }

    #[tokio::test]
    async fn test_write_persists_and_broadcasts() {
        let store = store().await;
        let mut first = store.subscribe();
        let mut second = store.subscribe();

        store
            .write(ProjectScope::Project("p1".to_string()))
            .await
            .unwrap();

        assert_eq!(store.read_raw().await.unwrap().as_deref(), Some("p1"));
        assert_eq!(
            first.recv().await.unwrap(),
            ProjectScope::Project("p1".to_string())
        );
        assert_eq!(
            second.recv().await.unwrap(),
            ProjectScope::Project("p1".to_string())
        );

        store.write(ProjectScope::All).await.unwrap();
        assert_eq!(store.read_raw().await.unwrap().as_deref(), Some("all"));
        assert_eq!(first.recv().await.unwrap(), ProjectScope::All);
    }

    #[tokio::test]
    async fn test_dropped_subscriber_stops_receiving() {
        let store = store().await;
        let kept = store.subscribe();
        let dropped = store.subscribe();
        assert_eq!(store.subscriber_count(), 2);

        drop(dropped);
        assert_eq!(store.subscriber_count(), 1);

        store
            .write(ProjectScope::Project("p9".to_string()))
            .await
            .unwrap();

        let mut kept = kept;
        assert!(kept.recv().await.is_ok());
        assert!(matches!(kept.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_clones_share_the_channel() {
        let store = store().await;
        let other = store.clone();
        let mut rx = other.subscribe();

        store
            .write(ProjectScope::Project("p2".to_string()))
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap().project_id(), Some("p2"));
        assert_eq!(other.read().await.unwrap().project_id(), Some("p2"));
    }
}
