//! Headless canvas-saver run.
//!
//! Usage:
//!   canvas-saver <page.json>                      Toolbar click (nearest canvas)
//!   canvas-saver <page.json> --mode cursor --pointer 120,80
//!   canvas-saver <page.json> --mode all           Export every readable canvas
//!   canvas-saver <page.json> --out ./shots        Save somewhere other than Downloads
//!   canvas-saver <page.json> --desktop            Crop a real screenshot (desktop-capture feature)

use canvas_saver::download::{DownloadState, FsDownloader};
use canvas_saver::host::MemoryPage;
use canvas_saver::locator::geometry::Point;
use canvas_saver::session::start_memory_session;
use canvas_saver::{FlowEvent, OutputConfig, Trigger};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

/// How long the driver waits for the next report before giving up.
const IDLE_TIMEOUT: Duration = Duration::from_secs(5);

struct Args {
    page: PathBuf,
    trigger: Trigger,
    pointer: Option<Point>,
    out: PathBuf,
    desktop: bool,
}

fn parse_args() -> Result<Args, String> {
    let mut args = std::env::args().skip(1);
    let page = args.next().ok_or("missing <page.json>")?;

    let mut parsed = Args {
        page: PathBuf::from(page),
        trigger: Trigger::ToolbarClick,
        pointer: None,
        out: FsDownloader::default_dir(),
        desktop: false,
    };

    while let Some(flag) = args.next() {
        match flag.as_str() {
            "--mode" => {
                parsed.trigger = match args.next().as_deref() {
                    Some("auto") => Trigger::ToolbarClick,
                    Some("cursor") => Trigger::Shortcut,
                    Some("all") => Trigger::ExportAll,
                    other => return Err(format!("unknown mode {:?}", other)),
                }
            }
            "--pointer" => {
                let value = args.next().ok_or("--pointer requires X,Y")?;
                let (x, y) = value.split_once(',').ok_or("--pointer requires X,Y")?;
                let x = x.trim().parse().map_err(|e| format!("bad pointer x: {}", e))?;
                let y = y.trim().parse().map_err(|e| format!("bad pointer y: {}", e))?;
                parsed.pointer = Some(Point::new(x, y));
            }
            "--out" => parsed.out = PathBuf::from(args.next().ok_or("--out requires a directory")?),
            "--desktop" => parsed.desktop = true,
            other => return Err(format!("unknown argument {}", other)),
        }
    }

    Ok(parsed)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    env_logger::init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!(
                "usage: canvas-saver <page.json> [--mode auto|cursor|all] \
                 [--pointer X,Y] [--out DIR] [--desktop]"
            );
            return ExitCode::FAILURE;
        }
    };

    let config = match OutputConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let page = match std::fs::read_to_string(&args.page)
        .map_err(|e| e.to_string())
        .and_then(|json| MemoryPage::from_json(&json).map_err(|e| e.to_string()))
    {
        Ok(page) => Arc::new(page),
        Err(e) => {
            eprintln!("error: cannot load {}: {}", args.page.display(), e);
            return ExitCode::FAILURE;
        }
    };

    if args.desktop {
        #[cfg(feature = "desktop-capture")]
        {
            let (handle, running) = canvas_saver::session::start_session(
                page,
                config,
                args.out,
                |_| canvas_saver::capture::DesktopCapture,
            );
            return drive(handle, running, args.trigger, args.pointer).await;
        }
        #[cfg(not(feature = "desktop-capture"))]
        {
            eprintln!("error: built without the desktop-capture feature");
            return ExitCode::FAILURE;
        }
    }

    let (handle, running) = start_memory_session(page, config, args.out);
    drive(handle, running, args.trigger, args.pointer).await
}

/// Fires one trigger and waits for the flow to settle.
async fn drive(
    mut handle: canvas_saver::session::SessionHandle,
    running: impl std::future::Future<Output = ()>,
    trigger: Trigger,
    pointer: Option<Point>,
) -> ExitCode {
    if let Some(position) = pointer {
        handle.move_pointer(position);
    }
    handle.trigger(trigger);

    let watch = async {
        let mut saved = 0usize;
        let mut expected: Option<usize> = None;
        let mut failed = false;
        loop {
            let event = match tokio::time::timeout(IDLE_TIMEOUT, handle.reports.recv()).await {
                Ok(Some(event)) => event,
                Ok(None) | Err(_) => break,
            };
            match event {
                FlowEvent::Alerted(message) => {
                    eprintln!("page: {}", message);
                    failed = true;
                    break;
                }
                FlowEvent::Aborted(reason) => {
                    eprintln!("failed: {}", reason);
                    failed = true;
                    break;
                }
                FlowEvent::Exported(count) => {
                    log::info!("page exported {} canvas(es)", count);
                    expected = Some(count);
                    if saved >= count {
                        break;
                    }
                }
                FlowEvent::Started { id, filename } => {
                    log::info!("download #{} started: {}", id, filename);
                }
                FlowEvent::Download(delta)
                    if matches!(
                        delta.state,
                        DownloadState::Interrupted | DownloadState::Cancelled
                    ) =>
                {
                    eprintln!("download #{} {:?}", delta.id, delta.state);
                    failed = true;
                    break;
                }
                FlowEvent::Download(_) => {}
                FlowEvent::Released(_) => {
                    saved += 1;
                    // A capture saves exactly one file; an export saves as
                    // many as the page reported sending.
                    if trigger != Trigger::ExportAll || expected.is_some_and(|n| saved >= n) {
                        break;
                    }
                }
            }
        }
        handle.shutdown();
        (saved, failed)
    };

    let ((saved, failed), ()) = tokio::join!(watch, running);
    println!("saved {} file(s)", saved);

    if failed || saved == 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
