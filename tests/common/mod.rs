//! Scripted stand-ins for a browser session.
//!
//! A [`Script`] maps search text ("{query} in {area}") to a listing of
//! places. Sessions serve the listing as `li.result` entries inside
//! `ul.results` and render a detail view for the clicked place.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

use places_scout::dedup::ResultCollection;
use places_scout::error::SessionError;
use places_scout::extract::FieldExtractor;
use places_scout::scrapers::{
    MapsLayout, PageSnapshot, SearchOrchestrator, SearchParams, Session, SessionFactory,
};

pub const ENTRY: &str = "li.result";
pub const FEED: &str = "ul.results";

#[derive(Debug, Clone)]
pub struct Place {
    pub name: String,
    pub address: String,
    pub phone: String,
    /// Clicking this entry always fails.
    pub broken: bool,
}

impl Place {
    pub fn new(name: &str, address: &str) -> Self {
        Self {
            name: name.to_string(),
            address: address.to_string(),
            phone: "(202) 555-0100".to_string(),
            broken: false,
        }
    }

    pub fn broken(name: &str) -> Self {
        Self {
            broken: true,
            ..Self::new(name, "nowhere")
        }
    }

    fn detail_html(&self) -> String {
        format!(
            r#"<html><head><title>{name} - Google Maps</title></head><body>
                <div role="main">
                  <h1><span>{name}</span></h1>
                  <div class="F7nice"><span>4.6</span><span class="fontBodySmall">(1,024)</span></div>
                  <button data-item-id="address"><div class="fontBodyMedium">{address}</div></button>
                  <button data-item-id="phone:tel:{phone}"><div class="fontBodyMedium">{phone}</div></button>
                  <a data-item-id="authority" href="https://{slug}.example">site</a>
                  <button data-photo-index="0"></button><button data-photo-index="1"></button>
                </div></body></html>"#,
            name = self.name,
            address = self.address,
            phone = self.phone,
            slug = self.name.to_lowercase().replace(' ', "-"),
        )
    }
}

#[derive(Debug, Clone)]
pub struct Listing {
    pub places: Vec<Place>,
    /// Entries shown before any scrolling
    pub initially_visible: usize,
    /// Entries added by each scroll of the feed
    pub per_scroll: usize,
}

impl Listing {
    pub fn all_visible(places: Vec<Place>) -> Self {
        let n = places.len();
        Self {
            places,
            initially_visible: n,
            per_scroll: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Script {
    listings: HashMap<String, Listing>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listing(mut self, query: &str, area: &str, listing: Listing) -> Self {
        self.listings.insert(format!("{} in {}", query, area), listing);
        self
    }
}

/// Counters shared by a factory and every session it made.
#[derive(Debug, Default)]
pub struct Stats {
    pub created: AtomicUsize,
    pub closed: AtomicUsize,
    pub navigations: AtomicUsize,
    pub clicks: AtomicUsize,
}

impl Stats {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn navigations(&self) -> usize {
        self.navigations.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crash {
    Never,
    /// The n-th navigation across all sessions (1-based) kills its session
    OnNavigation(usize),
    Always,
}

pub struct FakeSessionFactory {
    script: Arc<Script>,
    pub stats: Arc<Stats>,
    crash: Crash,
    fail_launch: bool,
    interrupt: Option<Interrupt>,
}

/// Cancels `token` when the n-th navigation across all sessions (1-based)
/// starts, then keeps that navigation pending for a moment, like a user
/// pressing Ctrl-C while a page loads.
#[derive(Debug, Clone)]
struct Interrupt {
    at: usize,
    token: CancellationToken,
}

impl FakeSessionFactory {
    pub fn new(script: Script) -> Self {
        Self {
            script: Arc::new(script),
            stats: Arc::new(Stats::default()),
            crash: Crash::Never,
            fail_launch: false,
            interrupt: None,
        }
    }

    pub fn cancelling_on_navigation(mut self, at: usize, token: CancellationToken) -> Self {
        self.interrupt = Some(Interrupt { at, token });
        self
    }

    pub fn crashing(mut self, crash: Crash) -> Self {
        self.crash = crash;
        self
    }

    pub fn failing_launch(mut self) -> Self {
        self.fail_launch = true;
        self
    }
}

#[async_trait]
impl SessionFactory for FakeSessionFactory {
    async fn create(&self) -> Result<Box<dyn Session>, SessionError> {
        if self.fail_launch {
            return Err(SessionError::Launch("no browser installed".to_string()));
        }
        self.stats.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            script: Arc::clone(&self.script),
            stats: Arc::clone(&self.stats),
            crash: self.crash,
            interrupt: self.interrupt.clone(),
            state: Mutex::new(PageState::default()),
        }))
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

#[derive(Debug, Default)]
struct PageState {
    listing: Option<Listing>,
    visible: usize,
    detail: Option<usize>,
    url: String,
    dead: bool,
}

pub struct FakeSession {
    script: Arc<Script>,
    stats: Arc<Stats>,
    crash: Crash,
    interrupt: Option<Interrupt>,
    state: Mutex<PageState>,
}

impl FakeSession {
    fn page(&self) -> Result<std::sync::MutexGuard<'_, PageState>, SessionError> {
        let page = self
            .state
            .lock()
            .map_err(|_| SessionError::Protocol("poisoned".to_string()))?;
        if page.dead {
            return Err(SessionError::Disconnected("browser is gone".to_string()));
        }
        Ok(page)
    }

    /// Load the listing for `url`. Returns the global navigation number.
    fn load(&self, url: &str) -> Result<usize, SessionError> {
        let mut page = self.page()?;
        let n = self.stats.navigations.fetch_add(1, Ordering::SeqCst) + 1;
        let crashed = match self.crash {
            Crash::Never => false,
            Crash::OnNavigation(at) => n == at,
            Crash::Always => true,
        };
        if crashed {
            page.dead = true;
            return Err(SessionError::Disconnected("browser crashed".to_string()));
        }

        let parsed = Url::parse(url).map_err(|e| SessionError::Protocol(e.to_string()))?;
        let text = parsed
            .query_pairs()
            .find(|(k, _)| k == "query")
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default();

        let listing = self.script.listings.get(&text).cloned();
        page.visible = listing
            .as_ref()
            .map(|l| l.initially_visible.min(l.places.len()))
            .unwrap_or(0);
        page.listing = listing;
        page.detail = None;
        page.url = url.to_string();
        Ok(n)
    }
}

#[async_trait]
impl Session for FakeSession {
    async fn navigate(&self, url: &str) -> Result<(), SessionError> {
        let n = self.load(url)?;
        if let Some(interrupt) = self.interrupt.as_ref().filter(|i| i.at == n) {
            interrupt.token.cancel();
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        Ok(())
    }

    async fn count(&self, selector: &str) -> Result<usize, SessionError> {
        let page = self.page()?;
        Ok(match selector {
            ENTRY => page.visible,
            "h1" => usize::from(page.detail.is_some()),
            _ => 0,
        })
    }

    async fn click(&self, selector: &str, index: usize) -> Result<(), SessionError> {
        let mut page = self.page()?;
        self.stats.clicks.fetch_add(1, Ordering::SeqCst);
        if selector != ENTRY || index >= page.visible {
            return Err(SessionError::StaleElement(format!("{}[{}]", selector, index)));
        }
        let broken = page
            .listing
            .as_ref()
            .map(|l| l.places[index].broken)
            .unwrap_or(true);
        if broken {
            return Err(SessionError::ClickIntercepted(format!("{}[{}]", selector, index)));
        }
        page.detail = Some(index);
        Ok(())
    }

    async fn scroll_to_end(&self, selector: &str) -> Result<bool, SessionError> {
        let mut page = self.page()?;
        if selector != FEED {
            return Ok(false);
        }
        let Some((total, step)) = page.listing.as_ref().map(|l| (l.places.len(), l.per_scroll)) else {
            return Ok(false);
        };
        page.visible = (page.visible + step).min(total);
        Ok(true)
    }

    async fn snapshot(&self) -> Result<PageSnapshot, SessionError> {
        let page = self.page()?;
        let place = match (page.listing.as_ref(), page.detail) {
            (Some(listing), Some(i)) => listing.places[i].clone(),
            _ => return Ok(PageSnapshot { html: "<html></html>".to_string(), url: page.url.clone(), title: None }),
        };
        Ok(PageSnapshot {
            html: place.detail_html(),
            url: format!("https://maps.test/place/{}", place.name.replace(' ', "+")),
            title: Some(format!("{} - Google Maps", place.name)),
        })
    }

    async fn close(self: Box<Self>) {
        self.stats.closed.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn test_layout() -> MapsLayout {
    MapsLayout {
        search_endpoint: "https://maps.test/search".to_string(),
        entry_selectors: vec!["div.missing".to_string(), ENTRY.to_string()],
        feed_selectors: vec!["div.missing-feed".to_string(), FEED.to_string(), "body".to_string()],
        detail_ready: "h1".to_string(),
    }
}

pub fn orchestrator(params: SearchParams) -> (Arc<SearchOrchestrator>, ResultCollection) {
    let results = ResultCollection::new();
    let orchestrator = SearchOrchestrator::new(
        test_layout(),
        FieldExtractor::default(),
        params,
        results.clone(),
    );
    (orchestrator, results)
}

/// `n` distinct places named "{prefix} 1".."{prefix} n".
pub fn places(prefix: &str, n: usize) -> Vec<Place> {
    (1..=n)
        .map(|i| Place::new(&format!("{} {}", prefix, i), &format!("{} Main St, Fairfax, VA 22030", i)))
        .collect()
}
