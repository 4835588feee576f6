// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::process;
use std::rc::Rc;
#[cfg(feature = "visualize")]
use std::time::Duration;

use pose_overlay::sim::{FrameClock, SimulatedPage, SyntheticEstimator};
#[cfg(feature = "visualize")]
use pose_overlay::visualizer::Viewer;
use pose_overlay::{
    ControlAction, ControlCommand, FrameRequest, OverlayConfig, OverlayController, OverlayStatus,
    Rect, Size, VERSION,
};

use crate::cli::args::SimulateArgs;
use crate::{error, info, section, success, verbose, warn};

/// Run a scripted overlay session on a simulated page.
#[allow(clippy::too_many_lines)]
pub fn run_simulation(args: &SimulateArgs) {
    let config = match &args.config {
        Some(path) => match OverlayConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load config '{}': {e}", path.display());
                process::exit(1);
            }
        },
        None => OverlayConfig::default(),
    };

    let [left, top, width, height] = args.rect;
    let rect = Rect::new(left, top, width, height);
    let page = SimulatedPage::new();
    let mut video = page.insert_video(Size::new(args.width, args.height), rect);
    let mut controller = OverlayController::new(
        Rc::new(page.clone()),
        Rc::new(SyntheticEstimator::new(args.fail_first)),
        config,
    );

    println!("Pose Overlay {VERSION} 🚀 simulated page");
    verbose!(
        "video {}x{} at ({left}, {top}) {width}x{height}, {} frames",
        args.width,
        args.height,
        args.frames
    );

    #[cfg(feature = "visualize")]
    let mut viewer = if args.show {
        match Viewer::new("Pose Overlay", args.width as usize, args.height as usize) {
            Ok(v) => Some(v),
            Err(e) => {
                error!("Failed to create viewer: {e}");
                None
            }
        }
    } else {
        None
    };
    #[cfg(not(feature = "visualize"))]
    if args.show {
        warn!(
            "--show requires the 'visualize' feature. Compile with --features visualize to enable the window."
        );
    }

    section!("Frames");
    let mut seen = 0;
    let mut request = controller.handle(ControlCommand {
        action: ControlAction::Start,
    });
    report_statuses(&page, &mut seen, 0);

    let mut clock = FrameClock::default();
    let mut frames_run = 0;
    for frame in 1..=args.frames {
        if request == FrameRequest::Stop {
            break;
        }
        if args.swap_at == Some(frame) {
            let (w, h) = args.swap_size;
            video = page.replace_video(&video, Size::new(w, h), rect);
            verbose!("frame {frame}: video element replaced ({w}x{h})");
        }

        request = controller.on_frame(clock.tick());
        frames_run = frame;
        report_statuses(&page, &mut seen, frame);

        #[cfg(feature = "visualize")]
        {
            let closed = match (viewer.as_mut(), page.canvas(0)) {
                (Some(v), Some(canvas)) => !matches!(v.update(&canvas.image), Ok(true)),
                _ => false,
            };
            if closed {
                viewer = None;
            }
        }
    }

    let session = controller.session();
    let stats = session.loop_stats();
    let surface = session.surface_state();
    section!("Summary");
    info!(
        "{frames_run} frames, {} estimates, {} rendered, {} failed, {} skipped",
        stats.estimates, stats.rendered, stats.failures, stats.skipped
    );
    if surface.attached {
        let r = surface.display_rect;
        info!(
            "surface {}x{} at ({}, {}) {}x{}, {} video swap(s)",
            surface.drawing_size.width,
            surface.drawing_size.height,
            r.left,
            r.top,
            r.width,
            r.height,
            session.swaps()
        );
    } else {
        warn!("No overlay surface attached at the end of the run");
    }

    if let Some(path) = &args.save {
        save_snapshot(&page, path);
    }

    #[cfg(feature = "visualize")]
    if let Some(v) = viewer.as_mut() {
        v.wait(Duration::from_secs(2));
    }

    controller.handle(ControlCommand {
        action: ControlAction::Stop,
    });
    report_statuses(&page, &mut seen, frames_run);
    drop(video);
}

fn report_statuses(page: &SimulatedPage, seen: &mut usize, frame: u64) {
    let statuses = page.statuses();
    for status in statuses.iter().skip(*seen) {
        print_status(status, frame);
    }
    *seen = statuses.len();
}

fn print_status(status: &OverlayStatus, frame: u64) {
    if status.is_active {
        success!("frame {frame}: {}", status.message);
    } else {
        info!("frame {frame}: {}", status.message);
    }
}

#[cfg(feature = "annotate")]
fn save_snapshot(page: &SimulatedPage, path: &std::path::Path) {
    let Some(canvas) = page.canvas(0) else {
        warn!("No overlay canvas to save");
        return;
    };
    match canvas.image.save(path) {
        Ok(()) => {
            success!("Saved overlay to {}", path.display());
        }
        Err(e) => {
            error!("Failed to save overlay: {e}");
        }
    }
}

#[cfg(not(feature = "annotate"))]
fn save_snapshot(_page: &SimulatedPage, _path: &std::path::Path) {
    warn!(
        "--save requires the 'annotate' feature. Compile with --features annotate to enable saving."
    );
}
