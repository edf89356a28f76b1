//! Automatic page-view tracking for in-app navigation.

use crate::batcher::ActivityBatcher;

/// Session history that reports every navigation as a page view.
///
/// Mirrors a browser history stack: `push` drops any forward entries,
/// `replace` rewrites the current entry, and `back`/`forward`/`go` move the
/// cursor. Each call that lands on an entry tracks exactly one page view;
/// moves past either end of the history track nothing.
pub struct NavigationTracker {
    batcher: ActivityBatcher,
    origin: Option<String>,
    entries: Vec<String>,
    cursor: usize,
}

impl NavigationTracker {
    /// Start a history at `initial_path`. The landing page is not tracked.
    pub fn new(batcher: ActivityBatcher, initial_path: impl Into<String>) -> Self {
        let tracker = Self {
            batcher,
            origin: None,
            entries: vec![initial_path.into()],
            cursor: 0,
        };
        let url = tracker.url_for(tracker.current());
        tracker.batcher.update_page_context(|page| page.url = Some(url));
        tracker
    }

    /// Prefix paths with an origin such as `https://bakery.example`.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into().trim_end_matches('/').to_string());
        let url = self.url_for(self.current());
        self.batcher.update_page_context(|page| page.url = Some(url));
        self
    }

    /// Path of the current entry.
    pub fn current(&self) -> &str {
        &self.entries[self.cursor]
    }

    /// Number of entries in the history.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false; a history holds at least its landing page.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Navigate to a new entry.
    pub fn push(&mut self, path: impl Into<String>) {
        let previous = self.url_for(self.current());
        self.entries.truncate(self.cursor + 1);
        self.entries.push(path.into());
        self.cursor += 1;
        self.navigated(previous);
    }

    /// Replace the current entry.
    pub fn replace(&mut self, path: impl Into<String>) {
        let previous = self.url_for(self.current());
        self.entries[self.cursor] = path.into();
        self.navigated(previous);
    }

    /// Go back one entry. Returns false at the start of the history.
    pub fn back(&mut self) -> bool {
        self.go(-1)
    }

    /// Go forward one entry. Returns false at the end of the history.
    pub fn forward(&mut self) -> bool {
        self.go(1)
    }

    /// Move `delta` entries through the history.
    pub fn go(&mut self, delta: isize) -> bool {
        if delta == 0 {
            return false;
        }

        let target = match self.cursor.checked_add_signed(delta) {
            Some(target) if target < self.entries.len() => target,
            _ => return false,
        };

        let previous = self.url_for(self.current());
        self.cursor = target;
        self.navigated(previous);
        true
    }

    fn url_for(&self, path: &str) -> String {
        match &self.origin {
            Some(origin) => format!("{origin}{path}"),
            None => path.to_string(),
        }
    }

    fn navigated(&self, previous: String) {
        let path = self.current().to_string();
        let url = self.url_for(&path);
        self.batcher.update_page_context(|page| {
            page.referrer = Some(previous);
            page.url = Some(url);
        });
        self.batcher.track_page_view(path);
    }
}
