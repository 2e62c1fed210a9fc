//! canvas-saver: save an on-page canvas as an image file.
//!
//! Reading a canvas' pixels fails once cross-origin content has tainted it,
//! so the canvas is saved by screenshotting the visible tab and cropping
//! to where the canvas sits on screen. The pieces:
//! - Canvas locator, page side (`locator/`, `page_agent`)
//! - Capture coordinator, background side (`capture/`)
//! - Download manager with object URL cleanup (`download/`)
//! - The background event loop tying them together (`background`)
//! - Host capabilities and an in-memory host (`host/`, `session`)

pub mod background;
pub mod capture;
pub mod config;
pub mod download;
pub mod host;
pub mod locator;
pub mod page_agent;
pub mod protocol;
pub mod session;

pub use background::{Background, BackgroundEvent, FlowEvent, Reporter, Trigger};
pub use config::{ImageEncoding, OutputConfig};
pub use protocol::{BackgroundCommand, Blob, ContentCommand, SelectionMode};
