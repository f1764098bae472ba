//! Query parameters for the session list and the form state that edits them.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::selection::ProjectScope;

pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Choices offered by the page-size selector
pub const PAGE_SIZE_OPTIONS: [u32; 4] = [5, 10, 20, 50];

/// Parameters sent with every session list request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionQuery {
    pub limit: u32,
    pub offset: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_date: Option<DateTime<Utc>>,
}

impl Default for SessionQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
            project_id: None,
            from_date: None,
            to_date: None,
        }
    }
}

impl SessionQuery {
    /// Query-string pairs; absent filters are left out entirely
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("limit", self.limit.to_string()),
            ("offset", self.offset.to_string()),
        ];
        if let Some(ref project_id) = self.project_id {
            params.push(("project_id", project_id.clone()));
        }
        if let Some(from) = self.from_date {
            params.push(("from_date", iso_timestamp(&from)));
        }
        if let Some(to) = self.to_date {
            params.push(("to_date", iso_timestamp(&to)));
        }
        params
    }
}

/// `2024-03-01T10:00:00.000Z`
pub fn iso_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKey {
    PageSize,
    ProjectId,
    FromDate,
    ToDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    PageSize(u32),
    ProjectId(String),
    FromDate(DateTime<Utc>),
    ToDate(DateTime<Utc>),
}

impl Filter {
    pub fn key(&self) -> FilterKey {
        match self {
            Filter::PageSize(_) => FilterKey::PageSize,
            Filter::ProjectId(_) => FilterKey::ProjectId,
            Filter::FromDate(_) => FilterKey::FromDate,
            Filter::ToDate(_) => FilterKey::ToDate,
        }
    }
}

/// Filter controls, current page and uncommitted date picks.
///
/// Every mutator returns `true` when the request it would produce changed,
/// which is what decides whether the list is fetched again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterForm {
    query: SessionQuery,
    current_page: u32,
    pending_from: Option<DateTime<Utc>>,
    pending_to: Option<DateTime<Utc>>,
}

impl Default for FilterForm {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterForm {
    pub fn new() -> Self {
        Self {
            query: SessionQuery::default(),
            current_page: 1,
            pending_from: None,
            pending_to: None,
        }
    }

    /// The request for the current page, offset already applied
    pub fn query(&self) -> &SessionQuery {
        &self.query
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn page_size(&self) -> u32 {
        self.query.limit
    }

    pub fn pending_from(&self) -> Option<DateTime<Utc>> {
        self.pending_from
    }

    pub fn pending_to(&self) -> Option<DateTime<Utc>> {
        self.pending_to
    }

    /// Set or overwrite one filter and go back to page 1
    pub fn set_filter(&mut self, filter: Filter) -> bool {
        self.edit(|query| match filter {
            // zero would make every page empty
            Filter::PageSize(0) => query.limit = DEFAULT_PAGE_SIZE,
            Filter::PageSize(size) => query.limit = size,
            Filter::ProjectId(id) => query.project_id = Some(id),
            Filter::FromDate(at) => query.from_date = Some(at),
            Filter::ToDate(at) => query.to_date = Some(at),
        })
    }

    /// Drop one filter entirely and go back to page 1
    pub fn remove_filter(&mut self, key: FilterKey) -> bool {
        self.edit(|query| match key {
            FilterKey::PageSize => query.limit = DEFAULT_PAGE_SIZE,
            FilterKey::ProjectId => query.project_id = None,
            FilterKey::FromDate => query.from_date = None,
            FilterKey::ToDate => query.to_date = None,
        })
    }

    /// Follow the shared project selection
    pub fn set_project_scope(&mut self, scope: &ProjectScope) -> bool {
        match scope.project_id() {
            Some(id) => self.set_filter(Filter::ProjectId(id.to_string())),
            None => self.remove_filter(FilterKey::ProjectId),
        }
    }

    pub fn set_page(&mut self, page: u32) -> bool {
        let page = page.max(1);
        if page == self.current_page {
            return false;
        }
        self.current_page = page;
        self.sync_offset();
        true
    }

    pub fn pick_from_date(&mut self, at: Option<DateTime<Utc>>) {
        self.pending_from = at;
    }

    pub fn pick_to_date(&mut self, at: Option<DateTime<Utc>>) {
        self.pending_to = at;
    }

    /// Commit pending date picks; a missing pick leaves its bound untouched
    pub fn apply_date_range(&mut self) -> bool {
        let (from, to) = (self.pending_from, self.pending_to);
        if from.is_none() && to.is_none() {
            return false;
        }
        self.edit(|query| {
            if let Some(from) = from {
                query.from_date = Some(from);
            }
            if let Some(to) = to {
                query.to_date = Some(to);
            }
        })
    }

    /// Back to the defaults, keeping the shared project selection applied
    pub fn clear(&mut self, scope: &ProjectScope) -> bool {
        let before = self.query.clone();
        let page_before = self.current_page;

        self.query = SessionQuery {
            project_id: scope.project_id().map(str::to_string),
            ..SessionQuery::default()
        };
        self.pending_from = None;
        self.pending_to = None;
        self.current_page = 1;
        self.sync_offset();

        self.query != before || self.current_page != page_before
    }

    fn edit(&mut self, f: impl FnOnce(&mut SessionQuery)) -> bool {
        let before = self.query.clone();
        let page_before = self.current_page;

        f(&mut self.query);
        self.current_page = 1;
        self.sync_offset();

        self.query != before || self.current_page != page_before
    }

    fn sync_offset(&mut self) {
        self.query.offset = u64::from(self.current_page - 1) * u64::from(self.query.limit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 12, 30, 0).unwrap()
    }

    #[test]
    fn test_default_query() {
        let form = FilterForm::new();
        assert_eq!(form.query().limit, 10);
        assert_eq!(form.query().offset, 0);
        assert_eq!(form.current_page(), 1);
        assert_eq!(
            form.query().to_params(),
            vec![("limit", "10".to_string()), ("offset", "0".to_string())]
        );
    }

    #[test]
    fn test_offset_follows_page() {
        let mut form = FilterForm::new();
        assert!(form.set_page(3));
        assert_eq!(form.query().offset, 20);

        assert!(form.set_filter(Filter::PageSize(20)));
        assert_eq!(form.current_page(), 1);
        assert_eq!(form.query().offset, 0);

        assert!(form.set_page(4));
        assert_eq!(form.query().offset, 60);
        assert!(!form.set_page(4));
    }

    #[test]
    fn test_set_filter_resets_page() {
        let mut form = FilterForm::new();
        form.set_page(5);
        assert!(form.set_filter(Filter::ProjectId("p1".to_string())));
        assert_eq!(form.current_page(), 1);
        assert_eq!(form.query().project_id.as_deref(), Some("p1"));
    }

    #[test]
    fn test_remove_filter_drops_key() {
        let mut form = FilterForm::new();
        form.set_filter(Filter::FromDate(date(1)));
        form.set_filter(Filter::ProjectId("p1".to_string()));

        assert!(form.remove_filter(FilterKey::FromDate));
        assert!(form.remove_filter(FilterKey::ProjectId));

        let keys: Vec<&str> = form.query().to_params().iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["limit", "offset"]);
        assert!(!form.remove_filter(FilterKey::ProjectId));
    }

    #[test]
    fn test_from_date_round_trip() {
        let mut form = FilterForm::new();
        let from = date(2);
        form.set_filter(Filter::FromDate(from));

        let params = form.query().to_params();
        let from_param = params.iter().find(|(k, _)| *k == "from_date").unwrap();
        assert_eq!(from_param.1, "2024-03-02T12:30:00.000Z");
        assert!(!params.iter().any(|(k, _)| *k == "to_date"));
    }

    #[test]
    fn test_date_pick_without_apply_has_no_effect() {
        let mut form = FilterForm::new();
        form.pick_from_date(Some(date(1)));
        assert_eq!(form.query().from_date, None);

        form.pick_to_date(Some(date(9)));
        assert!(form.apply_date_range());
        assert_eq!(form.query().from_date, Some(date(1)));
        assert_eq!(form.query().to_date, Some(date(9)));

        // applying the same picks again changes nothing
        assert!(!form.apply_date_range());
    }

    #[test]
    fn test_apply_without_picks_is_noop() {
        let mut form = FilterForm::new();
        form.set_page(2);
        assert!(!form.apply_date_range());
        assert_eq!(form.current_page(), 2);
    }

    #[test]
    fn test_clear_keeps_project_scope() {
        let mut form = FilterForm::new();
        form.set_filter(Filter::PageSize(50));
        form.set_filter(Filter::FromDate(date(1)));
        form.pick_to_date(Some(date(4)));
        form.set_page(3);

        let scope = ProjectScope::Project("p1".to_string());
        assert!(form.clear(&scope));
        assert_eq!(form.query().limit, DEFAULT_PAGE_SIZE);
        assert_eq!(form.query().from_date, None);
        assert_eq!(form.pending_to(), None);
        assert_eq!(form.current_page(), 1);
        assert_eq!(form.query().project_id.as_deref(), Some("p1"));

        let mut all = FilterForm::new();
        all.set_filter(Filter::ProjectId("stale".to_string()));
        all.clear(&ProjectScope::All);
        assert_eq!(all.query().project_id, None);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let scope = ProjectScope::Project("p1".to_string());
        let mut form = FilterForm::new();
        form.set_filter(Filter::ToDate(date(7)));

        form.clear(&scope);
        let once = form.clone();
        assert!(!form.clear(&scope));
        assert_eq!(form, once);
    }

    #[test]
    fn test_zero_page_size_falls_back() {
        let mut form = FilterForm::new();
        form.set_filter(Filter::PageSize(50));
        form.set_filter(Filter::PageSize(0));
        assert_eq!(form.page_size(), DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_project_scope_sync() {
        let mut form = FilterForm::new();
        form.set_page(2);
        assert!(form.set_project_scope(&ProjectScope::Project("p1".to_string())));
        assert_eq!(form.current_page(), 1);
        assert!(!form.set_project_scope(&ProjectScope::Project("p1".to_string())));
        assert!(form.set_project_scope(&ProjectScope::All));
        assert_eq!(form.query().project_id, None);
    }
}
