//! Host capabilities: tabs and cross-context messaging.
//!
//! The background never talks to a page directly; it asks the host for the
//! active tab and posts commands to it. `memory` provides a host backed by
//! a described page, used by the binary and by tests.

mod memory;

pub use memory::{MemoryPage, MemoryTabs, PageElement};

use crate::protocol::BackgroundCommand;
use serde::{Deserialize, Serialize};
use std::future::Future;

pub type TabId = u32;
pub type WindowId = u32;

/// The tab a message came from, or is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
    pub id: TabId,
    pub window_id: WindowId,
}

pub trait Tabs {
    /// The active tab of the current window, if there is one.
    fn active_tab(&self) -> impl Future<Output = Option<TabInfo>>;

    /// Fire-and-forget delivery to the tab's page context.
    fn send_to_tab(&self, tab: TabId, command: BackgroundCommand) -> Result<(), MessagingError>;
}

#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    #[error("No page context is listening in tab {0}")]
    NoReceiver(TabId),

    #[error("Background context is gone")]
    BackgroundClosed,
}
