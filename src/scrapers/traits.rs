use crate::error::SessionError;
use async_trait::async_trait;

/// Read-only query surface over a loaded page.
///
/// Lookups never fail: a selector that does not parse or does not match
/// simply yields nothing, so callers can move on to their next strategy.
pub trait DocumentView {
    /// Trimmed text of the first element matching `selector`, if non-empty.
    fn text(&self, selector: &str) -> Option<String>;

    /// Trimmed value of attribute `name` on the first match, if non-empty.
    fn attr(&self, selector: &str, name: &str) -> Option<String>;

    /// Number of elements matching `selector`.
    fn count(&self, selector: &str) -> usize;

    /// Document title.
    fn title(&self) -> Option<String>;

    /// Address of the page the view was taken from.
    fn url(&self) -> &str;
}

/// Raw DOM captured from a live session.
#[derive(Debug, Clone, Default)]
pub struct PageSnapshot {
    pub html: String,
    pub url: String,
    pub title: Option<String>,
}

/// One browser automation session (a single logical browser context).
///
/// A session is owned by exactly one worker at a time.
#[async_trait]
pub trait Session: Send + Sync {
    /// Load `url` and wait for the navigation to settle.
    async fn navigate(&self, url: &str) -> Result<(), SessionError>;

    /// Number of elements currently matching `selector`.
    async fn count(&self, selector: &str) -> Result<usize, SessionError>;

    /// Bring the `index`-th match of `selector` into view and click it.
    async fn click(&self, selector: &str, index: usize) -> Result<(), SessionError>;

    /// Scroll the first match of `selector` to its end.
    /// Returns `false` when nothing matches.
    async fn scroll_to_end(&self, selector: &str) -> Result<bool, SessionError>;

    /// Capture the current document.
    async fn snapshot(&self) -> Result<PageSnapshot, SessionError>;

    /// Release the underlying browser resources.
    async fn close(self: Box<Self>);
}

/// Creates fresh sessions, both at start-up and after a crash.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create(&self) -> Result<Box<dyn Session>, SessionError>;

    fn name(&self) -> &'static str;
}
