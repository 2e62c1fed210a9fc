//! Wiring for a complete headless run: one background, one tab showing a
//! `MemoryPage`, files written by `FsDownloader`.

use crate::background::{Background, BackgroundEvent, FlowEvent, Reporter, Trigger};
use crate::capture::TabCapture;
use crate::config::OutputConfig;
use crate::download::{FsDownloader, ObjectUrls};
use crate::host::{MemoryPage, MemoryTabs, TabInfo};
use crate::locator::geometry::Point;
use crate::page_agent::{PageAgent, PageEvent, RuntimePort};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

pub const DEFAULT_TAB: TabInfo = TabInfo { id: 1, window_id: 1 };

/// The driver's side of a running session.
pub struct SessionHandle {
    inbox: UnboundedSender<BackgroundEvent>,
    page_events: UnboundedSender<PageEvent>,
    pub reports: UnboundedReceiver<FlowEvent>,
    pub urls: ObjectUrls,
}

impl SessionHandle {
    pub fn trigger(&self, trigger: Trigger) {
        let _ = self.inbox.send(BackgroundEvent::Trigger(trigger));
    }

    pub fn move_pointer(&self, position: Point) {
        let _ = self.page_events.send(PageEvent::PointerMove(position));
    }

    pub fn shutdown(&self) {
        let _ = self.inbox.send(BackgroundEvent::Shutdown);
    }
}

/// Builds a session whose screenshots come from `make_capture`.
///
/// Returns the handle and the future that runs both contexts; it resolves
/// once the background stops (`SessionHandle::shutdown`).
pub fn start_session<C, F>(
    page: Arc<MemoryPage>,
    config: OutputConfig,
    download_dir: impl Into<PathBuf>,
    make_capture: F,
) -> (SessionHandle, impl Future<Output = ()>)
where
    C: TabCapture,
    F: FnOnce(&MemoryTabs) -> C,
{
    let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
    let (page_tx, page_rx) = mpsc::unbounded_channel();
    let (delta_tx, delta_rx) = mpsc::unbounded_channel();
    let (report_tx, report_rx) = mpsc::unbounded_channel();
    let reporter = Reporter::new(report_tx);
    let urls = ObjectUrls::new();

    let tabs = MemoryTabs::new(DEFAULT_TAB, page.clone(), page_tx.clone());
    let capture = make_capture(&tabs);
    let downloader = FsDownloader::new(download_dir, urls.clone(), delta_tx);

    let background = Background::new(tabs, capture, downloader, urls.clone(), config)
        .with_reporter(reporter.clone());
    let agent = PageAgent::new(page, RuntimePort::new(DEFAULT_TAB, inbox_tx.clone()))
        .with_reporter(reporter);

    let handle = SessionHandle {
        inbox: inbox_tx,
        page_events: page_tx,
        reports: report_rx,
        urls,
    };

    let running = async move {
        let page_side = agent.run(page_rx);
        tokio::pin!(page_side);
        tokio::select! {
            _ = background.run(inbox_rx, delta_rx) => {}
            _ = &mut page_side => {}
        }
    };

    (handle, running)
}

/// A session that screenshots the rendered page itself.
pub fn start_memory_session(
    page: Arc<MemoryPage>,
    config: OutputConfig,
    download_dir: impl Into<PathBuf>,
) -> (SessionHandle, impl Future<Output = ()>) {
    start_session(page, config, download_dir, |tabs| tabs.clone())
}
