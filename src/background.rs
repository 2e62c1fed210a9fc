//! Background: the privileged event loop.
//!
//! Owns the capture coordinator and the download manager. One inbox
//! carries triggers and page messages; host download events arrive on a
//! second channel. Each event is handled to completion before the next,
//! so capture flows never overlap.

use crate::capture::{CaptureCoordinator, TabCapture};
use crate::config::OutputConfig;
use crate::download::{DownloadDelta, DownloadId, DownloadManager, Downloader, ObjectUrls};
use crate::host::{TabInfo, Tabs};
use crate::protocol::{BackgroundCommand, Blob, ContentCommand, SelectionMode};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Name of the keyboard command bound to cursor-mode capture.
pub const SHORTCUT_COMMAND: &str = "save-canvas-shortcut";

/// User actions that start a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Keyboard shortcut: capture the canvas under the pointer.
    Shortcut,
    /// Toolbar icon: capture the canvas nearest the viewport center.
    ToolbarClick,
    /// Read every canvas directly and save each one.
    ExportAll,
}

impl Trigger {
    /// Maps a keyboard command name to its trigger.
    pub fn from_command(name: &str) -> Option<Self> {
        (name == SHORTCUT_COMMAND).then_some(Trigger::Shortcut)
    }

    fn command(self) -> BackgroundCommand {
        match self {
            Trigger::Shortcut => BackgroundCommand::GetCanvas {
                mode: SelectionMode::Cursor,
            },
            Trigger::ToolbarClick => BackgroundCommand::GetCanvas {
                mode: SelectionMode::Auto,
            },
            Trigger::ExportAll => BackgroundCommand::ExportCanvases,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BackgroundEvent {
    Trigger(Trigger),
    Message { sender: TabInfo, message: ContentCommand },
    /// Stop the loop and release whatever is still pending.
    Shutdown,
}

/// What happened to a flow, for whoever drives the contexts.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowEvent {
    /// The page showed an alert and gave up.
    Alerted(String),
    /// Capture or save failed in the background.
    Aborted(String),
    /// The page handed this many exported canvases to the background.
    Exported(usize),
    Started { id: DownloadId, filename: String },
    Download(DownloadDelta),
    /// The download finished and its object URL was released.
    Released(DownloadId),
}

/// Optional sink for `FlowEvent`s. Reports go nowhere by default.
#[derive(Debug, Clone, Default)]
pub struct Reporter(Option<UnboundedSender<FlowEvent>>);

impl Reporter {
    pub fn new(sink: UnboundedSender<FlowEvent>) -> Self {
        Self(Some(sink))
    }

    pub fn report(&self, event: FlowEvent) {
        if let Some(sink) = &self.0 {
            let _ = sink.send(event);
        }
    }
}

pub struct Background<T, C, D> {
    tabs: T,
    coordinator: CaptureCoordinator<C>,
    downloads: DownloadManager<D>,
    reporter: Reporter,
}

impl<T, C, D> Background<T, C, D>
where
    T: Tabs,
    C: TabCapture,
    D: Downloader,
{
    pub fn new(tabs: T, capture: C, downloader: D, urls: ObjectUrls, config: OutputConfig) -> Self {
        Self {
            tabs,
            coordinator: CaptureCoordinator::new(capture, config),
            downloads: DownloadManager::new(downloader, urls),
            reporter: Reporter::default(),
        }
    }

    pub fn with_reporter(mut self, reporter: Reporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// Runs until `Shutdown` or until every inbox sender is dropped, then
    /// releases any object URL still waiting on its download.
    pub async fn run(
        mut self,
        mut inbox: UnboundedReceiver<BackgroundEvent>,
        mut download_events: UnboundedReceiver<DownloadDelta>,
    ) {
        log::info!("[BACKGROUND] Ready (saving as {})", self.coordinator.config().filename());

        loop {
            tokio::select! {
                biased;
                Some(delta) = download_events.recv() => self.on_download_changed(delta),
                event = inbox.recv() => match event {
                    Some(BackgroundEvent::Shutdown) | None => break,
                    Some(event) => self.handle(event).await,
                },
            }
        }

        // Deliver what the host already reported before tearing down.
        while let Ok(delta) = download_events.try_recv() {
            self.on_download_changed(delta);
        }
        self.downloads.release_all();
        log::info!("[BACKGROUND] Stopped");
    }

    pub async fn handle(&mut self, event: BackgroundEvent) {
        match event {
            BackgroundEvent::Trigger(trigger) => self.on_trigger(trigger).await,
            BackgroundEvent::Message { sender, message } => self.on_message(sender, message).await,
            BackgroundEvent::Shutdown => {}
        }
    }

    async fn on_trigger(&self, trigger: Trigger) {
        let Some(tab) = self.tabs.active_tab().await else {
            log::debug!("[BACKGROUND] {:?} ignored, no active tab", trigger);
            return;
        };

        log::info!("[BACKGROUND] {:?} → asking tab {} for a canvas", trigger, tab.id);
        if let Err(e) = self.tabs.send_to_tab(tab.id, trigger.command()) {
            log::warn!("[BACKGROUND] {}", e);
            self.reporter.report(FlowEvent::Aborted(e.to_string()));
        }
    }

    async fn on_message(&mut self, sender: TabInfo, message: ContentCommand) {
        match message {
            ContentCommand::SaveCanvas { canvas_rect } => {
                let cropped = match self
                    .coordinator
                    .capture_and_crop(sender.window_id, &canvas_rect)
                    .await
                {
                    Ok(cropped) => cropped,
                    Err(e) => {
                        log::warn!("[CAPTURE] Tab {}: {}", sender.id, e);
                        self.reporter.report(FlowEvent::Aborted(e.to_string()));
                        return;
                    }
                };
                self.save(cropped.blob, &cropped.filename).await;
            }
            ContentCommand::DownloadBlob { blob, filename } => {
                self.save(blob, &filename).await;
            }
        }
    }

    async fn save(&mut self, blob: Blob, filename: &str) {
        match self.downloads.save_blob(blob, filename).await {
            Ok(id) => self.reporter.report(FlowEvent::Started {
                id,
                filename: filename.to_string(),
            }),
            Err(e) => {
                log::warn!("[DOWNLOAD] Could not save {}: {}", filename, e);
                self.reporter.report(FlowEvent::Aborted(e.to_string()));
            }
        }
    }

    fn on_download_changed(&mut self, delta: DownloadDelta) {
        self.reporter.report(FlowEvent::Download(delta));
        if self.downloads.on_download_changed(delta) {
            self.reporter.report(FlowEvent::Released(delta.id));
        }
    }

    pub fn pending_downloads(&self) -> usize {
        self.downloads.pending_count()
    }
}
