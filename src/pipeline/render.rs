//! Render session: one headless Chrome process and one tab, reused for every file.
//!
//! ## Why spawn_blocking?
//!
//! `headless_chrome` speaks the DevTools protocol over a synchronous
//! WebSocket and blocks the calling thread while it waits for replies.
//! Every browser call is moved onto tokio's blocking pool so the driver's
//! task never stalls a runtime worker.
//!
//! ## Network idle
//!
//! Chrome emits the `networkIdle` lifecycle event once a document has had no
//! in-flight requests for 500 ms. The session listens for it after each
//! navigation so client-side rendering (KaTeX, fonts, images) has settled
//! before the page is printed.

use crate::config::{ExportConfig, PdfOptions};
use crate::error::{ExportError, FileError};
use async_trait::async_trait;
use headless_chrome::protocol::cdp::types::Event;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions, Tab};
use reqwest::Url;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const NETWORK_IDLE: &str = "networkIdle";
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Chrome exits when the DevTools connection is silent this long.
const BROWSER_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

/// A browser page that can be pointed at a URL and printed.
///
/// The driver owns exactly one session per run and calls these strictly in
/// sequence: `open`, `capture_pdf`, `open`, `capture_pdf`, …, `close`.
#[async_trait]
pub trait RenderSession: Send {
    /// Navigate to `url` and wait until the network is idle.
    async fn open(&mut self, url: &Url) -> Result<(), FileError>;

    /// Print the currently loaded page.
    async fn capture_pdf(&mut self, options: &PdfOptions) -> Result<Vec<u8>, FileError>;

    /// Shut the browser down. Calling it again is a no-op.
    async fn close(&mut self) -> Result<(), ExportError>;
}

/// [`RenderSession`] backed by a headless Chrome launched by `headless_chrome`.
///
/// Dropping the session kills the browser process, so Chrome never outlives
/// an error that skips [`RenderSession::close`].
pub struct ChromeSession {
    browser: Option<Browser>,
    tab: Option<Arc<Tab>>,
    navigation_timeout: Duration,
    current_url: String,
}

impl ChromeSession {
    /// Launch Chrome and open the single tab used for the whole run.
    pub async fn launch(config: &ExportConfig) -> Result<Self, ExportError> {
        let headless = config.headless;
        let sandbox = config.sandbox;
        let chrome_path = config.chrome_path.clone();
        let navigation_timeout = Duration::from_secs(config.navigation_timeout_secs);

        let (browser, tab) = tokio::task::spawn_blocking(move || {
            let options = launch_options(headless, sandbox, chrome_path)?;
            let browser = Browser::new(options)
                .map_err(|e| ExportError::BrowserLaunchFailed(format!("{e:#}")))?;
            let tab = browser
                .new_tab()
                .map_err(|e| ExportError::BrowserLaunchFailed(format!("new tab: {e:#}")))?;
            tab.set_default_timeout(navigation_timeout);
            tab.call_method(Page::SetLifecycleEventsEnabled { enabled: true })
                .map_err(|e| ExportError::BrowserLaunchFailed(format!("lifecycle events: {e:#}")))?;
            Ok::<_, ExportError>((browser, tab))
        })
        .await
        .map_err(|e| ExportError::Internal(format!("Browser launch task panicked: {}", e)))??;

        info!(
            "Chrome started (headless={}, sandbox={})",
            headless, sandbox
        );

        Ok(Self {
            browser: Some(browser),
            tab: Some(tab),
            navigation_timeout,
            current_url: String::new(),
        })
    }

    fn tab(&self, url: &str) -> Result<Arc<Tab>, FileError> {
        self.tab.clone().ok_or_else(|| FileError::Navigation {
            url: url.to_string(),
            detail: "render session is closed".into(),
        })
    }
}

#[async_trait]
impl RenderSession for ChromeSession {
    async fn open(&mut self, url: &Url) -> Result<(), FileError> {
        let url = url.to_string();
        let tab = self.tab(&url)?;
        self.current_url = url.clone();
        let timeout = self.navigation_timeout;

        let task_url = url.clone();
        tokio::task::spawn_blocking(move || navigate_and_wait_idle(&tab, &task_url, timeout))
            .await
            .map_err(|e| FileError::Navigation {
                url,
                detail: format!("navigation task panicked: {}", e),
            })?
    }

    async fn capture_pdf(&mut self, options: &PdfOptions) -> Result<Vec<u8>, FileError> {
        let url = self.current_url.clone();
        let tab = self.tab(&url)?;
        let print = print_options(options);

        let task_url = url.clone();
        let bytes = tokio::task::spawn_blocking(move || {
            tab.print_to_pdf(Some(print)).map_err(|e| FileError::Capture {
                url: task_url,
                detail: format!("{e:#}"),
            })
        })
        .await
        .map_err(|e| FileError::Capture {
            url: url.clone(),
            detail: format!("print task panicked: {}", e),
        })??;

        debug!("Printed {} → {} bytes", url, bytes.len());
        Ok(bytes)
    }

    async fn close(&mut self) -> Result<(), ExportError> {
        let Some(browser) = self.browser.take() else {
            return Ok(());
        };
        let tab = self.tab.take();

        tokio::task::spawn_blocking(move || {
            if let Some(tab) = tab {
                if let Err(e) = tab.close(false) {
                    debug!("Closing tab failed: {e:#}");
                }
            }
            drop(browser);
        })
        .await
        .map_err(|e| ExportError::Internal(format!("Browser shutdown task panicked: {}", e)))?;

        info!("Chrome stopped");
        Ok(())
    }
}

/// Build Chrome launch options.
fn launch_options(
    headless: bool,
    sandbox: bool,
    chrome_path: Option<PathBuf>,
) -> Result<LaunchOptions<'static>, ExportError> {
    LaunchOptions::default_builder()
        .headless(headless)
        .sandbox(sandbox)
        .path(chrome_path)
        .idle_browser_timeout(BROWSER_IDLE_TIMEOUT)
        .build()
        .map_err(|e| ExportError::BrowserLaunchFailed(e.to_string()))
}

/// Map our print options onto the DevTools `Page.printToPDF` parameters.
fn print_options(options: &PdfOptions) -> PrintToPdfOptions {
    PrintToPdfOptions {
        landscape: Some(options.landscape),
        print_background: Some(options.print_background),
        scale: options.scale,
        paper_width: options.paper_width,
        paper_height: options.paper_height,
        margin_top: options.margins.top,
        margin_bottom: options.margins.bottom,
        margin_left: options.margins.left,
        margin_right: options.margins.right,
        prefer_css_page_size: Some(options.prefer_css_page_size),
        ..Default::default()
    }
}

/// Network-idle state of one frame, fed from `Page.lifecycleEvent`.
///
/// Events from other frames (iframes) are ignored: a child frame going idle
/// says nothing about the document being printed.
struct IdleTracker {
    frame_id: String,
    idle: AtomicBool,
}

impl IdleTracker {
    fn new(frame_id: impl Into<String>) -> Self {
        Self {
            frame_id: frame_id.into(),
            idle: AtomicBool::new(false),
        }
    }

    /// "init" marks a new document; any idle seen before it belongs to the previous page.
    fn observe(&self, frame_id: &str, name: &str) {
        if frame_id != self.frame_id {
            return;
        }
        match name {
            "init" => self.idle.store(false, Ordering::SeqCst),
            NETWORK_IDLE => self.idle.store(true, Ordering::SeqCst),
            _ => {}
        }
    }

    fn is_idle(&self) -> bool {
        self.idle.load(Ordering::SeqCst)
    }
}

/// Blocking navigation followed by the network-idle wait.
///
/// The main frame of a page target shares the target's id.
fn navigate_and_wait_idle(tab: &Tab, url: &str, timeout: Duration) -> Result<(), FileError> {
    let tracker = Arc::new(IdleTracker::new(tab.get_target_id().clone()));
    let observer = Arc::clone(&tracker);

    let listener = tab
        .add_event_listener(Arc::new(move |event: &Event| {
            if let Event::PageLifecycleEvent(lifecycle) = event {
                observer.observe(&lifecycle.params.frame_id, &lifecycle.params.name);
            }
        }))
        .map_err(|e| FileError::Navigation {
            url: url.to_string(),
            detail: format!("event listener: {e:#}"),
        })?;

    let result = wait_for_idle(tab, url, timeout, &tracker);

    if let Err(e) = tab.remove_event_listener(&listener) {
        debug!("Removing lifecycle listener failed: {e:#}");
    }
    result
}

fn wait_for_idle(
    tab: &Tab,
    url: &str,
    timeout: Duration,
    tracker: &IdleTracker,
) -> Result<(), FileError> {
    let started = Instant::now();
    let deadline = started + timeout;
    let timed_out = || FileError::NavigationTimeout {
        url: url.to_string(),
        secs: timeout.as_secs(),
    };

    tab.navigate_to(url).map_err(|e| FileError::Navigation {
        url: url.to_string(),
        detail: format!("{e:#}"),
    })?;

    if let Err(e) = tab.wait_until_navigated() {
        if Instant::now() >= deadline {
            return Err(timed_out());
        }
        return Err(FileError::Navigation {
            url: url.to_string(),
            detail: format!("{e:#}"),
        });
    }

    while !tracker.is_idle() {
        if Instant::now() >= deadline {
            return Err(timed_out());
        }
        std::thread::sleep(IDLE_POLL_INTERVAL);
    }

    debug!("{} idle after {}ms", url, started.elapsed().as_millis());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Margins;

    #[test]
    fn print_options_carry_margins() {
        let options = PdfOptions {
            margins: Margins {
                top: Some(0.4),
                bottom: Some(0.6),
                ..Margins::default()
            },
            print_background: true,
            ..PdfOptions::default()
        };
        let print = print_options(&options);
        assert_eq!(print.margin_top, Some(0.4));
        assert_eq!(print.margin_bottom, Some(0.6));
        assert_eq!(print.margin_left, None);
        assert_eq!(print.margin_right, None);
        assert_eq!(print.print_background, Some(true));
        assert_eq!(print.landscape, Some(false));
    }

    #[test]
    fn default_print_options_leave_margins_unset() {
        let print = print_options(&PdfOptions::default());
        assert_eq!(print.margin_top, None);
        assert_eq!(print.margin_bottom, None);
        assert_eq!(print.scale, None);
    }

    #[test]
    fn idle_tracks_only_the_main_frame() {
        let tracker = IdleTracker::new("MAIN");
        tracker.observe("MAIN", "init");
        tracker.observe("CHILD", "networkIdle");
        assert!(!tracker.is_idle(), "child frame idle must not count");

        tracker.observe("MAIN", "load");
        tracker.observe("MAIN", "networkIdle");
        assert!(tracker.is_idle());

        tracker.observe("CHILD", "init");
        assert!(tracker.is_idle(), "child frame init must not reset the main frame");
    }

    #[test]
    fn idle_resets_on_new_document() {
        let tracker = IdleTracker::new("MAIN");
        tracker.observe("MAIN", "networkIdle");
        assert!(tracker.is_idle());
        tracker.observe("MAIN", "init");
        assert!(!tracker.is_idle());
    }

    #[test]
    fn launch_options_follow_flags() {
        let opts = launch_options(false, false, Some(PathBuf::from("/opt/chrome/chrome"))).unwrap();
        assert!(!opts.headless);
        assert!(!opts.sandbox);
        assert_eq!(opts.path, Some(PathBuf::from("/opt/chrome/chrome")));
        assert_eq!(opts.idle_browser_timeout, BROWSER_IDLE_TIMEOUT);
    }
}
