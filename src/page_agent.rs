//! Page agent: the content-context event loop.
//!
//! Tracks the pointer, answers background commands by locating a canvas
//! (or exporting all of them) and posts the result back. Locator failures
//! end as an alert on the page; they are never sent to the background.

use crate::background::{BackgroundEvent, FlowEvent, Reporter};
use crate::host::{MessagingError, TabInfo};
use crate::locator::geometry::Point;
use crate::locator::page::Page;
use crate::locator::{export_all, locate, PointerTracker};
use crate::protocol::{BackgroundCommand, ContentCommand, SelectionMode};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Everything the page context reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    PointerMove(Point),
    Command(BackgroundCommand),
}

/// The page's end of the runtime channel. Stamps every message with the
/// tab it came from, so the background knows which window to capture.
#[derive(Clone)]
pub struct RuntimePort {
    tab: TabInfo,
    background: UnboundedSender<BackgroundEvent>,
}

impl RuntimePort {
    pub fn new(tab: TabInfo, background: UnboundedSender<BackgroundEvent>) -> Self {
        Self { tab, background }
    }

    pub fn send(&self, message: ContentCommand) -> Result<(), MessagingError> {
        self.background
            .send(BackgroundEvent::Message {
                sender: self.tab,
                message,
            })
            .map_err(|_| MessagingError::BackgroundClosed)
    }
}

pub struct PageAgent<P> {
    page: P,
    port: RuntimePort,
    pointer: PointerTracker,
    reporter: Reporter,
}

impl<P: Page> PageAgent<P> {
    pub fn new(page: P, port: RuntimePort) -> Self {
        Self {
            page,
            port,
            pointer: PointerTracker::new(),
            reporter: Reporter::default(),
        }
    }

    pub fn with_reporter(mut self, reporter: Reporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// Runs until every sender of `events` is dropped.
    pub async fn run(mut self, mut events: UnboundedReceiver<PageEvent>) {
        while let Some(event) = events.recv().await {
            self.handle(event);
        }
        log::debug!("[PAGE] Event channel closed, page agent stopping");
    }

    pub fn handle(&mut self, event: PageEvent) {
        match event {
            PageEvent::PointerMove(position) => self.pointer.on_pointer_move(position),
            PageEvent::Command(BackgroundCommand::GetCanvas { mode }) => self.save_canvas(mode),
            PageEvent::Command(BackgroundCommand::ExportCanvases) => self.export_canvases(),
        }
    }

    fn save_canvas(&self, mode: SelectionMode) {
        match locate(&self.page, mode, self.pointer.position()) {
            Ok(canvas_rect) => {
                if let Err(e) = self.port.send(ContentCommand::SaveCanvas { canvas_rect }) {
                    log::error!("[PAGE] Could not request capture: {}", e);
                }
            }
            Err(e) => {
                log::info!("[PAGE] {:?} selection failed: {}", mode, e);
                self.page.alert(&e.to_string());
                self.reporter.report(FlowEvent::Alerted(e.to_string()));
            }
        }
    }

    fn export_canvases(&self) {
        let exported = export_all(&self.page);
        if exported.is_empty() {
            self.reporter
                .report(FlowEvent::Alerted("No canvas could be exported".into()));
            return;
        }
        let mut sent = 0;
        for canvas in exported {
            let message = ContentCommand::DownloadBlob {
                blob: canvas.blob,
                filename: canvas.filename,
            };
            if let Err(e) = self.port.send(message) {
                log::error!("[PAGE] Could not send exported canvas: {}", e);
                break;
            }
            sent += 1;
        }
        self.reporter.report(FlowEvent::Exported(sent));
    }
}
