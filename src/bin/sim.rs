//! Scenario harness for the capture pipeline.
//!
//! Responsibilities here are intentionally minimal:
//! - Load pipeline configuration from `conf/config.toml`.
//! - Build a library snapshot from the embedded JSON fixture.
//! - Drive the capture controller against a scripted renderer on a
//!   simulated clock, and log what the pipeline does.
//!
//! The scripted renderer completes most spines after a couple of progress
//! heartbeats, but never answers for one spine, so the run shows target
//! selection, stall escalation, exponential backoff, orientation fallback,
//! suspension, and pruning after removal-from-device.

use anyhow::{Context, Result};
use pagesnap::capture::{CaptureController, CaptureEvent, Effect};
use pagesnap::config::{CaptureConfig, load_config};
use pagesnap::layout::{self, DisplaySettings, Viewport};
use pagesnap::library::{BookId, DownloadStatus, Library, Spine};
use pagesnap::timer::{TimerId, TimerQueue};
use std::path::Path;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

/// Simulated-time horizon for the run.
const SIM_HORIZON: Duration = Duration::from_secs(45 * 60);

/// Spines the scripted renderer never answers for.
const WEDGED_SPINES: &[&str] = &["b204-ch2"];

/// Delays of the scripted renderer for a healthy spine.
const PROGRESS_DELAYS: &[Duration] = &[Duration::from_secs(2), Duration::from_secs(4)];
const COMPLETION_DELAY: Duration = Duration::from_secs(5);

/// Book registry snapshot, as the host application would hydrate it from
/// its backend.
const LIBRARY_FIXTURE: &str = r#"{
  "books": {
    "101": {
      "id": 101,
      "title": "A Field Guide to Moths",
      "download_status": "downloaded",
      "spines": [
        { "idref": "b101-cover" },
        { "idref": "b101-ch1", "label": "Silk Moths" },
        { "idref": "b101-ch2", "label": "Hawk Moths" }
      ]
    },
    "204": {
      "id": 204,
      "title": "Practical Celestial Navigation",
      "download_status": "downloading"
    }
  }
}"#;

fn main() {
    let reload_handle = init_tracing();
    if let Err(err) = run(&reload_handle) {
        error!("{err:?}");
        std::process::exit(1);
    }
}

fn run(reload_handle: &ReloadHandle) -> Result<()> {
    let config = load_config(Path::new("conf/config.toml"));
    set_log_level(reload_handle, config.log_level.as_filter_str());

    let library: Library =
        serde_json::from_str(LIBRARY_FIXTURE).context("invalid library fixture")?;
    let viewport = Viewport::new(800, 1200);
    let settings = DisplaySettings::default();

    let thumbs = layout::page_dimensions(viewport);
    info!(
        books = library.len(),
        viewport = %viewport,
        thumb_width = thumbs.width as f64,
        thumb_height = thumbs.height as f64,
        initial_stall_timeout_ms = config.initial_stall_timeout_ms,
        max_stall_timeout_ms = config.max_stall_timeout_ms,
        "Starting capture simulation"
    );

    Harness::new(config, library, viewport, settings).run();
    Ok(())
}

enum SimEvent {
    Pipeline(CaptureEvent),
    Script(Script),
}

enum Script {
    FinishDownload(BookId),
    RemoveBook(BookId),
    Suspend(bool),
}

struct Harness {
    controller: CaptureController,
    library: Library,
    timers: TimerQueue<SimEvent>,
    stall_timer: Option<TimerId>,
    captures_begun: usize,
    viewport: Viewport,
    settings: DisplaySettings,
}

impl Harness {
    fn new(
        config: CaptureConfig,
        library: Library,
        viewport: Viewport,
        settings: DisplaySettings,
    ) -> Self {
        Self {
            controller: CaptureController::new(config, viewport, settings.clone()),
            library,
            timers: TimerQueue::new(),
            stall_timer: None,
            captures_begun: 0,
            viewport,
            settings,
        }
    }

    fn run(mut self) {
        // Scripted interventions, in simulated time.
        self.timers.schedule(
            Duration::from_secs(40),
            SimEvent::Script(Script::FinishDownload(204)),
        );
        self.timers
            .schedule(Duration::from_secs(180), SimEvent::Script(Script::Suspend(true)));
        self.timers
            .schedule(Duration::from_secs(240), SimEvent::Script(Script::Suspend(false)));
        self.timers.schedule(
            Duration::from_secs(10 * 60),
            SimEvent::Script(Script::RemoveBook(204)),
        );

        // Mount: the first library snapshot kicks off selection.
        self.dispatch(CaptureEvent::LibraryChanged);

        while self.timers.now() < SIM_HORIZON {
            let events = self.timers.advance_to_next();
            if events.is_empty() {
                info!(elapsed = ?self.timers.now(), "No pending work or timers; simulation drained");
                break;
            }
            for event in events {
                match event {
                    SimEvent::Pipeline(event) => self.dispatch(event),
                    SimEvent::Script(script) => self.run_script(script),
                }
            }
        }

        self.report();
    }

    fn dispatch(&mut self, event: CaptureEvent) {
        let effects = self.controller.reduce(&mut self.library, event);
        for effect in effects {
            self.apply(effect);
        }
    }

    fn run_script(&mut self, script: Script) {
        match script {
            Script::FinishDownload(book_id) => {
                info!(book_id, elapsed = ?self.timers.now(), "Script: download finished");
                // Spine metadata arrives with the finished download.
                let spines = vec![
                    Spine {
                        label: Some("The Sextant".to_string()),
                        ..Spine::new("b204-ch1")
                    },
                    Spine {
                        label: Some("Sight Reduction".to_string()),
                        ..Spine::new("b204-ch2")
                    },
                ];
                self.library.set_spines(book_id, spines);
                self.library
                    .set_download_status(book_id, DownloadStatus::Downloaded);
                self.dispatch(CaptureEvent::LibraryChanged);
            }
            Script::RemoveBook(book_id) => {
                info!(book_id, elapsed = ?self.timers.now(), "Script: book removed from device");
                self.library.remove_book(book_id);
                self.dispatch(CaptureEvent::LibraryChanged);
            }
            Script::Suspend(suspended) => {
                info!(suspended, elapsed = ?self.timers.now(), "Script: reader readiness change");
                self.dispatch(CaptureEvent::SuspendChanged(suspended));
            }
        }
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::BeginCapture(target) => {
                self.captures_begun += 1;
                if WEDGED_SPINES.contains(&target.spine_idref.as_str()) {
                    warn!(
                        key = %target.capture_key(),
                        "Scripted renderer wedges on this spine; expecting a stall"
                    );
                    return;
                }
                for delay in PROGRESS_DELAYS {
                    self.timers.schedule(
                        *delay,
                        SimEvent::Pipeline(CaptureEvent::RendererProgress {
                            target: target.clone(),
                        }),
                    );
                }
                let page_cfis = (0..4).map(|page| format!("/6/{}", 4 + page * 2)).collect();
                self.timers.schedule(
                    COMPLETION_DELAY,
                    SimEvent::Pipeline(CaptureEvent::RendererFinished { target, page_cfis }),
                );
            }
            Effect::ArmStallTimer { key, epoch, delay } => {
                if let Some(id) = self.stall_timer.take() {
                    self.timers.cancel(id);
                }
                self.stall_timer = Some(self.timers.schedule(
                    delay,
                    SimEvent::Pipeline(CaptureEvent::StallElapsed { key, epoch }),
                ));
            }
            Effect::CancelStallTimer => {
                if let Some(id) = self.stall_timer.take() {
                    self.timers.cancel(id);
                }
            }
            Effect::ScheduleRetry { key, delay } => {
                self.timers.schedule(
                    delay,
                    SimEvent::Pipeline(CaptureEvent::RetryElapsed { key }),
                );
            }
        }
    }

    fn report(self) {
        let (portrait_done, portrait_total) =
            self.library.capture_progress(self.viewport, &self.settings);
        let (landscape_done, landscape_total) = self
            .library
            .capture_progress(self.viewport.flipped(), &self.settings);
        info!(
            elapsed = ?self.timers.now(),
            captures_begun = self.captures_begun,
            portrait = %format!("{portrait_done}/{portrait_total}"),
            landscape = %format!("{landscape_done}/{landscape_total}"),
            skip_list = self.controller.skip_list().len(),
            "Simulation finished"
        );
    }
}

fn init_tracing() -> ReloadHandle {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let (filter_layer, handle) = reload::Layer::new(env_filter);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_filter(filter_layer),
        )
        .init();
    handle
}

fn set_log_level(handle: &ReloadHandle, level: &str) {
    let parsed = EnvFilter::builder()
        .parse(level)
        .unwrap_or_else(|_| EnvFilter::new("debug"));
    if let Err(err) = handle.modify(|filter| *filter = parsed.clone()) {
        warn!(%level, "Failed to update log level from config: {err}");
    } else {
        info!(%level, "Applied log level from config");
    }
}
