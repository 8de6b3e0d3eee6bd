use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::traits::{PageSnapshot, Session, SessionFactory};
use crate::error::SessionError;

/// Preferred click target inside a result entry.
const PLACE_LINK: &str = r#"a[href*="/maps/place/"]"#;

const CONSENT_SCRIPT: &str = r#"
    (() => {
        const button = document.querySelector('button[aria-label*="Accept"], button[aria-label*="I agree"], form[action*="consent"] button');
        if (button) { button.click(); return true; }
        return false;
    })()
"#;

/// Launch settings for headless Chrome sessions.
#[derive(Debug, Clone)]
pub struct ChromeOptions {
    pub headless: bool,
    pub window_size: (u32, u32),
    pub page_load_timeout: Duration,
}

impl Default for ChromeOptions {
    fn default() -> Self {
        Self {
            headless: true,
            window_size: (1366, 768),
            page_load_timeout: Duration::from_secs(60),
        }
    }
}

/// Starts one Chrome process per session.
pub struct ChromeSessionFactory {
    options: ChromeOptions,
}

impl ChromeSessionFactory {
    pub fn new(options: ChromeOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl SessionFactory for ChromeSessionFactory {
    async fn create(&self) -> Result<Box<dyn Session>, SessionError> {
        let options = self.options.clone();
        let session = tokio::task::spawn_blocking(move || ChromeSession::launch(&options))
            .await
            .map_err(|e| SessionError::Launch(e.to_string()))?
            .map_err(|e| SessionError::Launch(format!("{:#}", e)))?;
        Ok(Box::new(session))
    }

    fn name(&self) -> &'static str {
        "headless-chrome"
    }
}

/// A Chrome process with a single tab.
pub struct ChromeSession {
    // Dropping the browser kills the Chrome process.
    _browser: Browser,
    tab: Arc<Tab>,
}

impl ChromeSession {
    fn launch(options: &ChromeOptions) -> Result<Self> {
        info!("Launching Chrome (headless: {})...", options.headless);

        // Containers have no usable sandbox.
        let is_container = std::env::var("PLACES_SCOUT_CONTAINER").is_ok()
            || Path::new("/.dockerenv").exists();
        let chrome_path = std::env::var("CHROME_PATH").ok().map(PathBuf::from);

        let launch_options = LaunchOptions::default_builder()
            .headless(options.headless)
            .sandbox(!is_container)
            .window_size(Some(options.window_size))
            .path(chrome_path)
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(launch_options).context("Failed to launch Chrome browser")?;
        let tab = browser.new_tab().context("Failed to open browser tab")?;
        tab.set_default_timeout(options.page_load_timeout);

        Ok(Self {
            _browser: browser,
            tab,
        })
    }

    /// Run a blocking tab operation off the async workers.
    async fn blocking<T, F>(&self, what: &'static str, op: F) -> Result<T, SessionError>
    where
        F: FnOnce(&Tab) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || op(&tab))
            .await
            .map_err(|e| SessionError::Protocol(format!("{}: {}", what, e)))?
            .map_err(|e| classify(what, e))
    }
}

/// Map a headless_chrome error onto the session error taxonomy.
fn classify(what: &str, err: anyhow::Error) -> SessionError {
    let message = format!("{:#}", err);
    let lower = message.to_lowercase();
    let detail = format!("{}: {}", what, message);

    if lower.contains("connection is closed")
        || lower.contains("channel closed")
        || lower.contains("disconnected")
        || lower.contains("browser process")
    {
        SessionError::Disconnected(detail)
    } else if lower.contains("could not find node") || lower.contains("stale") {
        SessionError::StaleElement(detail)
    } else if lower.contains("no element found") {
        SessionError::ElementNotFound(detail)
    } else if lower.contains("intercept") || lower.contains("not clickable") {
        SessionError::ClickIntercepted(detail)
    } else if lower.contains("timed out") || lower.contains("timeout") {
        SessionError::Timeout(detail)
    } else {
        SessionError::Protocol(detail)
    }
}

fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

#[async_trait]
impl Session for ChromeSession {
    async fn navigate(&self, url: &str) -> Result<(), SessionError> {
        let target = url.to_string();
        self.blocking("navigate", move |tab| {
            tab.navigate_to(&target)?;
            tab.wait_until_navigated()?;
            Ok(())
        })
        .await?;

        // Consent banners block the results list; one attempt, failures ignored.
        let dismissed = self
            .blocking("consent", |tab| {
                let result = tab.evaluate(CONSENT_SCRIPT, false)?;
                Ok(result.value.and_then(|v| v.as_bool()).unwrap_or(false))
            })
            .await;
        if let Ok(true) = dismissed {
            debug!("Dismissed consent banner");
        }
        Ok(())
    }

    async fn count(&self, selector: &str) -> Result<usize, SessionError> {
        let script = format!("document.querySelectorAll({}).length", js_string(selector));
        self.blocking("count", move |tab| {
            let result = tab.evaluate(&script, false)?;
            Ok(result.value.and_then(|v| v.as_u64()).unwrap_or(0) as usize)
        })
        .await
    }

    async fn click(&self, selector: &str, index: usize) -> Result<(), SessionError> {
        let selector = selector.to_string();
        self.blocking("click", move |tab| {
            let elements = tab.find_elements(&selector)?;
            let element = elements
                .get(index)
                .ok_or_else(|| anyhow!("could not find node: entry {} of '{}' is gone", index, selector))?;
            element.scroll_into_view()?;

            let inner = element.find_element(PLACE_LINK).ok();
            let target = inner.as_ref().unwrap_or(element);
            if let Err(e) = target.click() {
                debug!("Native click failed ({}), falling back to script click", e);
                target.call_js_fn("function() { this.click(); }", vec![], false)?;
            }
            Ok(())
        })
        .await
    }

    async fn scroll_to_end(&self, selector: &str) -> Result<bool, SessionError> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({});
                if (!el) return false;
                el.scrollTop = el.scrollHeight;
                if (el === document.body) window.scrollTo(0, document.body.scrollHeight);
                return true;
            }})()"#,
            js_string(selector)
        );
        self.blocking("scroll", move |tab| {
            let result = tab.evaluate(&script, false)?;
            Ok(result.value.and_then(|v| v.as_bool()).unwrap_or(false))
        })
        .await
    }

    async fn snapshot(&self) -> Result<PageSnapshot, SessionError> {
        self.blocking("snapshot", |tab| {
            let html = tab.get_content()?;
            let title = tab
                .evaluate("document.title", false)
                .ok()
                .and_then(|r| r.value)
                .and_then(|v| v.as_str().map(str::to_string));
            Ok(PageSnapshot {
                html,
                url: tab.get_url(),
                title,
            })
        })
        .await
    }

    async fn close(self: Box<Self>) {
        // Killing Chrome waits on the child process.
        let _ = tokio::task::spawn_blocking(move || drop(self)).await;
        info!("Chrome session closed");
    }
}
