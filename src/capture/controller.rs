//! Capture session controller.
//!
//! An explicit state machine owning the "currently capturing" lifecycle:
//! it adopts a target from the selector, arms a stall timeout, reacts to
//! renderer progress and completion, and escalates stalls into the skip
//! list. Events come in through [`CaptureController::reduce`]; everything
//! the host must do in response (start the renderer, arm or cancel timers)
//! comes back out as [`Effect`] values. The controller never reads a clock
//! and never spawns anything, so every transition is reproducible in tests.
//!
//! At most one target is in flight at any time: selection only happens when
//! no capture is active or the active one has just ended, so the invariant
//! holds structurally rather than via locking.

use super::messages::CaptureEvent;
use super::select::select_next;
use super::skip::SkipList;
use super::{CaptureKey, CaptureTarget};
use crate::config::CaptureConfig;
use crate::layout::{self, DisplaySettings, Viewport};
use crate::library::Library;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Work the host must perform outside the reducer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Hand the target to the external renderer.
    BeginCapture(CaptureTarget),
    /// (Re)arm the stall-detection timer. There is only ever one; arming
    /// replaces whatever was pending. Deliver
    /// [`CaptureEvent::StallElapsed`] with these fields after `delay`.
    ArmStallTimer {
        key: CaptureKey,
        epoch: u64,
        delay: Duration,
    },
    /// Drop the pending stall timer, if any.
    CancelStallTimer,
    /// Deliver [`CaptureEvent::RetryElapsed`] for `key` after `delay`.
    ScheduleRetry { key: CaptureKey, delay: Duration },
}

/// Session lifecycle. There is no give-up state: a stalled spine is set
/// aside for a bounded time and everything stays eventually retriable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Awaiting {
        target: CaptureTarget,
        key: CaptureKey,
    },
}

pub struct CaptureController {
    phase: Phase,
    skip_list: SkipList,
    viewport: Viewport,
    settings: DisplaySettings,
    suspended: bool,
    /// Bumped whenever the stall timer is re-armed or neutralized; a
    /// [`CaptureEvent::StallElapsed`] carrying an older epoch is stale and
    /// ignored. This is what makes orphaned timer callbacks no-ops.
    stall_epoch: u64,
    /// Stall allowance of the in-flight target, re-used when progress
    /// signals re-arm the timer from zero.
    allowance: Duration,
    config: CaptureConfig,
    defunct: bool,
}

impl CaptureController {
    /// A fresh controller is idle and unsuspended. Dispatch
    /// [`CaptureEvent::LibraryChanged`] once the library snapshot is in
    /// place to kick off the first selection.
    pub fn new(config: CaptureConfig, viewport: Viewport, settings: DisplaySettings) -> Self {
        let allowance = config.initial_stall_timeout();
        Self {
            phase: Phase::Idle,
            skip_list: SkipList::new(),
            viewport,
            settings,
            suspended: false,
            stall_epoch: 0,
            allowance,
            config,
            defunct: false,
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn skip_list(&self) -> &SkipList {
        &self.skip_list
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn is_defunct(&self) -> bool {
        self.defunct
    }

    /// Tear the controller down: cancel the stall timer and ignore every
    /// event from here on, so timer callbacks still in flight cannot act on
    /// a dead instance.
    pub fn dismantle(&mut self) -> Vec<Effect> {
        self.defunct = true;
        self.phase = Phase::Idle;
        self.stall_epoch += 1;
        vec![Effect::CancelStallTimer]
    }

    /// Advance the state machine by one event. The library is the shared
    /// registry snapshot; completion writes page breaks into it, and they
    /// are visible to the very next selection pass.
    pub fn reduce(&mut self, library: &mut Library, event: CaptureEvent) -> Vec<Effect> {
        if self.defunct {
            return Vec::new();
        }
        match event {
            CaptureEvent::LibraryChanged => self.handle_library_changed(library),
            CaptureEvent::ViewportChanged(viewport) => {
                self.handle_viewport_changed(library, viewport)
            }
            CaptureEvent::SettingsChanged(settings) => {
                self.handle_settings_changed(library, settings)
            }
            CaptureEvent::SuspendChanged(suspended) => {
                self.handle_suspend_changed(library, suspended)
            }
            CaptureEvent::RendererProgress { target } => self.handle_progress(target),
            CaptureEvent::RendererFinished { target, page_cfis } => {
                self.handle_finished(library, target, page_cfis)
            }
            CaptureEvent::StallElapsed { key, epoch } => self.handle_stall(library, key, epoch),
            CaptureEvent::RetryElapsed { key } => self.handle_retry(library, key),
        }
    }

    fn handle_library_changed(&mut self, library: &mut Library) -> Vec<Effect> {
        let pruned = self
            .skip_list
            .prune(|book_id| library.is_downloaded(book_id));
        if pruned > 0 {
            debug!(pruned, "Dropped skip-list entries for removed books");
        }
        // A valid in-flight capture keeps running; new work waits.
        let inflight_valid = matches!(
            &self.phase,
            Phase::Awaiting { target, .. } if library.is_downloaded(target.book_id)
        );
        if inflight_valid {
            return Vec::new();
        }
        self.reselect(library)
    }

    fn handle_viewport_changed(&mut self, library: &Library, viewport: Viewport) -> Vec<Effect> {
        self.viewport = viewport;
        match self.phase {
            Phase::Idle => self.reselect(library),
            Phase::Awaiting { .. } => Vec::new(),
        }
    }

    fn handle_settings_changed(
        &mut self,
        library: &Library,
        settings: DisplaySettings,
    ) -> Vec<Effect> {
        self.settings = settings;
        match self.phase {
            Phase::Idle => self.reselect(library),
            Phase::Awaiting { .. } => Vec::new(),
        }
    }

    fn handle_suspend_changed(&mut self, library: &Library, suspended: bool) -> Vec<Effect> {
        self.suspended = suspended;
        if suspended {
            // Advisory: in-progress renderer work may continue, but no new
            // target is launched.
            info!("Capture pipeline suspended");
            return Vec::new();
        }
        debug!("Capture pipeline resumed");
        match self.phase {
            Phase::Idle => self.reselect(library),
            Phase::Awaiting { .. } => Vec::new(),
        }
    }

    fn handle_progress(&mut self, target: CaptureTarget) -> Vec<Effect> {
        let Phase::Awaiting { key, .. } = &self.phase else {
            return Vec::new();
        };
        let reported = target.capture_key();
        if reported != *key {
            debug!(key = %reported, "Ignoring progress from a superseded capture");
            return Vec::new();
        }
        // Liveness proven: restart the stall countdown with the same
        // allowance.
        self.stall_epoch += 1;
        debug!(key = %reported, "Renderer progress; stall timer re-armed");
        vec![Effect::ArmStallTimer {
            key: reported,
            epoch: self.stall_epoch,
            delay: self.allowance,
        }]
    }

    fn handle_finished(
        &mut self,
        library: &mut Library,
        target: CaptureTarget,
        page_cfis: Vec<crate::library::PageCfi>,
    ) -> Vec<Effect> {
        let finished_key = target.capture_key();
        let size_key = layout::size_key(target.viewport, &target.display_settings);
        library.record_page_breaks(target.book_id, &target.spine_idref, &size_key, page_cfis);
        self.skip_list.clear(&finished_key);

        let matches_current = matches!(
            &self.phase,
            Phase::Awaiting { key, .. } if *key == finished_key
        );
        if !matches_current {
            // The work is still worth keeping, but it must not disturb
            // whatever is in flight now.
            debug!(key = %finished_key, "Recorded page breaks from a superseded capture");
            return Vec::new();
        }

        info!(key = %finished_key, "Spine capture finished");
        self.stall_epoch += 1;
        let mut effects = vec![Effect::CancelStallTimer];
        effects.extend(self.reselect(library));
        effects
    }

    fn handle_stall(&mut self, library: &Library, key: CaptureKey, epoch: u64) -> Vec<Effect> {
        let (is_current, book_id) = match &self.phase {
            Phase::Awaiting {
                target,
                key: current,
            } => (
                epoch == self.stall_epoch && *current == key,
                target.book_id,
            ),
            Phase::Idle => return Vec::new(),
        };
        if !is_current {
            debug!(key = %key, "Ignoring stale stall timer");
            return Vec::new();
        }
        if !library.is_downloaded(book_id) {
            // The book went away mid-capture; nothing to back off from.
            return self.reselect(library);
        }
        let timeout = self.skip_list.register_stall(
            &key,
            self.config.initial_stall_timeout(),
            self.config.max_stall_timeout(),
        );
        warn!(
            key = %key,
            timeout_ms = timeout.as_millis() as u64,
            "Spine capture stalled; backing off"
        );
        let mut effects = self.reselect(library);
        effects.push(Effect::ScheduleRetry {
            key,
            delay: timeout,
        });
        effects
    }

    fn handle_retry(&mut self, library: &Library, key: CaptureKey) -> Vec<Effect> {
        if !self.skip_list.resume(&key) {
            // Cleared by a success or pruned with its book in the meantime.
            return Vec::new();
        }
        debug!(key = %key, "Backoff elapsed; spine eligible again");
        match self.phase {
            Phase::Idle => self.reselect(library),
            // An un-skip never disturbs in-flight work.
            Phase::Awaiting { .. } => Vec::new(),
        }
    }

    /// Run selection and adopt the result. Arms the stall timer with the
    /// target's current backoff allowance (or the initial default).
    fn reselect(&mut self, library: &Library) -> Vec<Effect> {
        if self.suspended {
            self.phase = Phase::Idle;
            self.stall_epoch += 1;
            debug!("Selection suspended; pipeline at rest");
            return vec![Effect::CancelStallTimer];
        }
        match select_next(library, self.viewport, &self.settings, &self.skip_list) {
            Some(target) => {
                let key = target.capture_key();
                self.allowance = self
                    .skip_list
                    .allowance(&key, self.config.initial_stall_timeout());
                self.stall_epoch += 1;
                info!(
                    key = %key,
                    allowance_ms = self.allowance.as_millis() as u64,
                    "Selected spine for capture"
                );
                let effects = vec![
                    Effect::ArmStallTimer {
                        key: key.clone(),
                        epoch: self.stall_epoch,
                        delay: self.allowance,
                    },
                    Effect::BeginCapture(target.clone()),
                ];
                self.phase = Phase::Awaiting { target, key };
                effects
            }
            None => {
                self.phase = Phase::Idle;
                self.stall_epoch += 1;
                debug!(
                    skip_list = self.skip_list.len(),
                    "Capture pipeline at rest"
                );
                vec![Effect::CancelStallTimer]
            }
        }
    }
}
