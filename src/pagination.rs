//! Page count and the window of page links shown under the session table.

/// Maximum number of page links shown at once
pub const MAX_VISIBLE_PAGES: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageWindow {
    pub total_pages: u32,
    /// Ascending, contiguous, at most [`MAX_VISIBLE_PAGES`] entries
    pub visible_pages: Vec<u32>,
    pub current_page: u32,
}

impl PageWindow {
    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }

    /// Target of the "previous" control, `None` when it is inert
    pub fn previous(&self) -> Option<u32> {
        self.has_previous().then(|| self.current_page - 1)
    }

    /// Target of the "next" control, `None` when it is inert
    pub fn next(&self) -> Option<u32> {
        self.has_next().then(|| self.current_page + 1)
    }

    pub fn is_current(&self, page: u32) -> bool {
        page == self.current_page
    }
}

pub fn total_pages(total_items: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    let pages = total_items.div_ceil(u64::from(page_size));
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Derive the page window.
///
/// `current_page` is not clamped: a page outside `1..=total_pages` yields an
/// empty window rather than an error.
pub fn compute_window(total_items: u64, page_size: u32, current_page: u32) -> PageWindow {
    let total = total_pages(total_items, page_size);

    let range = if current_page == 0 || current_page > total {
        1..=0
    } else if total <= MAX_VISIBLE_PAGES {
        1..=total
    } else if current_page <= 3 {
        1..=MAX_VISIBLE_PAGES
    } else if current_page >= total - 2 {
        total - (MAX_VISIBLE_PAGES - 1)..=total
    } else {
        current_page - 2..=current_page + 2
    };

    PageWindow {
        total_pages: total,
        visible_pages: range.collect(),
        current_page,
    }
}
