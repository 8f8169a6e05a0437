// src/frame/mod.rs

//! The frame-boundary state machine.
//!
//! The application calls [`FrameBoundary::cross_frame_boundary`] once per
//! candidate frame, passing its draw routine only when it intends to present.
//! One crossing runs, in order:
//!
//! 1. wait for asynchronously drained event queues and sync barriers;
//! 2. advance the deterministic clock and mix audio;
//! 3. on shutdown, draw and return without talking to the controller;
//! 4. count the frame and measure the frame rate;
//! 5. announce the frame to the controller;
//! 6. serve display requests until the controller starts the boundary;
//! 7. capture, encode, draw the overlay and the frame;
//! 8. serve control requests until the controller ends the boundary;
//! 9. relay native events the host needs to stay responsive;
//! 10. merge the supplied input into what the application observes;
//! 11. wait for event queues configured to sync before the next frame begins;
//! 12. decide whether the next frame is drawn and leave the clock.
//!
//! The channel lock is held from step 5 to the end of step 8.

pub mod control;
pub mod fps;
pub mod skip;


use crate::channel::{ChannelGuard, MessageChannel};
use crate::collab::{Collaborators, DumpTarget, Encoder, EventQueue, TimeBase};
use crate::config::{AsyncEvents, DebugState, EngineSettings, GameSync, SharedConfig};
use crate::error::{ChannelError, FrameError};
use crate::input::merger::InputMerger;
use crate::input::InputSnapshot;
use crate::protocol::{ControllerMessage, EngineMessage, TimeSpec};
use crate::state::SharedState;
use fps::FpsMonitor;
use log::*;
use skip::RenderSkip;
use std::sync::Arc;
use std::time::Instant;

/// Frames after which the draw-frame barrier starts being used.
const WARM_UP_FRAMES: u64 = 11;

/// Counters reported to the controller and the overlay.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameCounters {
    pub framecount: u64,
    pub nondraw_framecount: u64,
    /// At least one state was saved during this run.
    pub did_savestate: bool,
    pub fps: f32,
    pub lfps: f32,
}

pub struct FrameBoundary {
    channel: Arc<MessageChannel>,
    state: Arc<SharedState>,
    collab: Collaborators,
    settings: EngineSettings,
    inputs: InputMerger,
    counters: FrameCounters,
    skip: RenderSkip,
    fps_monitor: FpsMonitor,
    encoder: Option<Box<dyn Encoder>>,
    dump_target: DumpTarget,
    savestate_slot: i32,
}

/// Event queues locked against the application while generated input events
/// are pushed into them. Unlocked on drop.
struct QueueRelayLocks<'a> {
    queues: Vec<&'a dyn EventQueue>,
}

impl<'a> QueueRelayLocks<'a> {
    fn acquire(queues: Vec<&'a dyn EventQueue>) -> Self {
        for queue in &queues {
            queue.lock_and_reset_empty();
        }
        Self { queues }
    }
}

impl Drop for QueueRelayLocks<'_> {
    fn drop(&mut self) {
        for queue in &self.queues {
            queue.unlock();
        }
    }
}

impl FrameBoundary {
    pub fn new(
        channel: Arc<MessageChannel>,
        state: Arc<SharedState>,
        collab: Collaborators,
        settings: EngineSettings,
    ) -> Self {
        FrameBoundary {
            channel,
            state,
            collab,
            settings,
            inputs: InputMerger::new(),
            counters: FrameCounters::default(),
            skip: RenderSkip::new(),
            fps_monitor: FpsMonitor::new(),
            encoder: None,
            dump_target: DumpTarget::default(),
            savestate_slot: 0,
        }
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    pub fn counters(&self) -> FrameCounters {
        self.counters
    }

    pub fn frame_count(&self) -> u64 {
        self.counters.framecount
    }

    pub fn inputs(&self) -> &InputMerger {
        &self.inputs
    }

    /// Mutable access for pointer confinement.
    pub fn inputs_mut(&mut self) -> &mut InputMerger {
        &mut self.inputs
    }

    /// Input the application observes during the current frame.
    pub fn delivered_inputs(&self) -> &InputSnapshot {
        self.inputs.delivered()
    }

    pub fn dump_target(&self) -> &DumpTarget {
        &self.dump_target
    }

    pub fn is_encoding(&self) -> bool {
        self.encoder.is_some()
    }

    /// Hook entry point: crosses the boundary and terminates the process if
    /// the controller can no longer be reached.
    pub fn cross_or_exit(&mut self, draw: Option<&mut dyn FnMut()>) {
        if let Err(e) = self.cross_frame_boundary(draw) {
            error!("FrameBoundary: {}; terminating", e);
            std::process::exit(1);
        }
    }

    /// Runs one frame boundary. `draw` is present only for frames the
    /// application wants presented.
    ///
    /// The only error is a controller that cannot be reached at the start of
    /// the frame. Everything else is logged and the frame completes.
    pub fn cross_frame_boundary(
        &mut self,
        mut draw: Option<&mut dyn FnMut()>,
    ) -> Result<(), FrameError> {
        let is_draw = draw.is_some();

        self.collab.threads.mark_main_thread();
        self.collab.capture.init();

        let config = self.state.config();
        self.wait_for_queues(
            config.async_events,
            AsyncEvents::WINDOW_END,
            AsyncEvents::MEDIA_END,
        );
        self.sync_barriers(&config, is_draw);

        let increment = self.collab.clock.enter_frame_boundary();
        if !self.collab.audio.is_loopback() {
            self.collab.audio.mix_all_sources(increment);
        }

        if self.state.is_exiting() {
            trace!("FrameBoundary: exiting, frame not reported");
            self.collab.clock.flush_delay();
            if let Some(draw) = draw.as_deref_mut() {
                draw();
            }
            self.relay_native_events(&config);
            self.collab.clock.exit_frame_boundary();
            return Ok(());
        }

        self.counters.framecount += 1;
        if is_draw {
            let (fps, lfps) = self
                .fps_monitor
                .tick(self.counters.framecount, Instant::now());
            self.counters.fps = fps;
            self.counters.lfps = lfps;
        }

        let channel = Arc::clone(&self.channel);
        let mut link = channel.lock();

        self.send_frame_count_time(&mut link)
            .map_err(|source| FrameError::HandshakeFailed {
                frame: self.counters.framecount,
                source,
            })?;

        match self.announce_frame(&mut link, is_draw) {
            Ok(()) => {
                if let Err(e) = self.receive_display_requests(&mut link) {
                    error!("FrameBoundary: display phase abandoned: {}", e);
                }
            }
            Err(e) => error!("FrameBoundary: could not announce frame: {}", e),
        }

        self.render(&mut draw, increment);

        if let Err(e) = self.receive_control_messages(&mut link, &mut draw) {
            error!("FrameBoundary: control phase abandoned: {}", e);
        }
        drop(link);

        let skipping = self.state.is_skipping_draw();
        if !skipping && is_draw {
            self.collab.capture.restore_screen_state();
        }

        let config = self.state.config();
        self.relay_native_events(&config);
        self.propagate_inputs(&config);
        self.wait_for_queues(
            config.async_events,
            AsyncEvents::WINDOW_BEGIN,
            AsyncEvents::MEDIA_BEGIN,
        );

        let skip_next = self.skip.should_skip(self.counters.fps, &config);
        self.state.set_skipping_draw(skip_next);
        self.collab.clock.exit_frame_boundary();
        if !skip_next {
            self.collab.overlay.new_frame();
        }

        trace!(
            "FrameBoundary: frame {} done (draw: {}, skip next: {})",
            self.counters.framecount,
            is_draw,
            skip_next
        );
        Ok(())
    }

    fn wait_for_queues(&self, events: AsyncEvents, window: AsyncEvents, media: AsyncEvents) {
        if events.contains(window) {
            if let Some(queue) = &self.collab.window_queue {
                queue.wait_for_empty();
            }
        }
        if events.contains(media) {
            if let Some(queue) = &self.collab.media_queue {
                queue.wait_for_empty();
            }
        }
    }

    fn sync_barriers(&mut self, config: &SharedConfig, is_draw: bool) {
        let sync = config.game_specific_sync;
        if sync.contains(GameSync::WITNESS) && self.counters.framecount > WARM_UP_FRAMES && is_draw
        {
            self.collab.sync.det_wait();
        }
        if sync.contains(GameSync::CELESTE) {
            self.collab.sync.det_wait();
        }
        if self.collab.sync.is_unity() {
            self.collab.sync.unity_wait_all();
        }
    }

    /// Frame number and clock readings. Also resent after state loads.
    fn send_frame_count_time(&self, link: &mut ChannelGuard<'_>) -> Result<(), ChannelError> {
        link.send(&EngineMessage::FrameCountTime {
            frame: self.counters.framecount,
            monotonic: self.collab.clock.ticks(TimeBase::UntrackedMonotonic),
            realtime: self.collab.clock.ticks(TimeBase::UntrackedRealtime),
        })
    }

    fn announce_frame(&mut self, link: &mut ChannelGuard<'_>, is_draw: bool) -> Result<(), ChannelError> {
        if let Some(info) = self.state.take_unsent_game_info() {
            debug!("FrameBoundary: sending game info {:?}", info);
            link.send(&EngineMessage::GameInfo(info))?;
        }

        link.send(&EngineMessage::Fps {
            fps: self.counters.fps,
            lfps: self.counters.lfps,
        })?;

        if self.collab.threads.has_changed() {
            link.send(&EngineMessage::InvalidateSavestates)?;
            self.collab.threads.reset_changed();
        }

        if !is_draw {
            link.send(&EngineMessage::NondrawFrame)?;
        }

        link.send(&EngineMessage::StartFrameBoundary)?;

        self.collab.annotations.reset_watches();
        self.collab.annotations.reset_shapes();
        Ok(())
    }

    /// Blocks until the controller starts the boundary.
    fn receive_display_requests(&mut self, link: &mut ChannelGuard<'_>) -> Result<(), ChannelError> {
        loop {
            match link.receive()? {
                ControllerMessage::StartFrameBoundary => return Ok(()),
                ControllerMessage::RamWatch(watch) => self.collab.annotations.insert_watch(watch),
                ControllerMessage::ResolutionRequest => {
                    let (width, height) = self.collab.capture.dimensions();
                    link.send(&EngineMessage::Resolution { width, height })?;
                }
                ControllerMessage::Draw(shape) => self.collab.annotations.insert_shape(shape),
                ControllerMessage::Config(config) => self.apply_config(config),
                ControllerMessage::Unknown(tag) => {
                    warn!("FrameBoundary: unknown message tag {} before frame start", tag)
                }
                other => warn!(
                    "FrameBoundary: ignoring {} before frame start",
                    other.name()
                ),
            }
        }
    }

    pub(crate) fn apply_config(&mut self, config: SharedConfig) {
        debug!("FrameBoundary: new config {:?}", config);
        self.state.replace_config(config);
        self.skip.reset();
    }

    fn render(&mut self, draw: &mut Option<&mut dyn FnMut()>, increment: TimeSpec) {
        let is_draw = draw.is_some();
        let skipping = self.state.is_skipping_draw();
        let config = self.state.config();

        if !is_draw {
            self.counters.nondraw_framecount += 1;
        }

        if !skipping {
            self.collab
                .native
                .update_title(Some((self.counters.fps, self.counters.lfps)));
        }

        // With osd_encode the overlay is drawn before capture so it is encoded.
        if !skipping && config.osd_encode {
            self.draw_overlay(is_draw);
        }

        if !skipping && is_draw {
            self.collab.capture.copy_screen_to_surface();
        }

        self.encode(&config, is_draw, increment);

        if !skipping && !config.osd_encode {
            self.draw_overlay(is_draw);
        }

        if !skipping {
            if let Some(draw) = draw.as_deref_mut() {
                draw();
            }
        }
    }

    fn draw_overlay(&mut self, is_draw: bool) {
        if is_draw {
            let preview = InputSnapshot::default();
            self.collab.overlay.draw_all(
                self.counters.framecount,
                self.counters.nondraw_framecount,
                self.inputs.supplied(),
                &preview,
            );
            self.collab.overlay.render();
        } else {
            self.collab.overlay.end_frame();
        }
    }

    fn encode(&mut self, config: &SharedConfig, is_draw: bool, increment: TimeSpec) {
        if !config.av_dumping {
            if self.encoder.take().is_some() {
                info!("FrameBoundary: stop AV dumping");
            }
            return;
        }

        if self.encoder.is_none() {
            info!(
                "FrameBoundary: start AV dumping on file {}",
                self.dump_target.path
            );
            match self.collab.encoders.create(&self.dump_target) {
                Ok(encoder) => self.encoder = Some(encoder),
                Err(e) => error!("FrameBoundary: could not start encoder: {:#}", e),
            }
        }

        if let Some(encoder) = self.encoder.as_mut() {
            encoder.encode_one_frame(is_draw, increment);
        }
    }

    fn relay_native_events(&mut self, config: &SharedConfig) {
        if self.state.game_info().uses_media_framework() {
            self.collab.native.push_media_events();
        }
        if !config.debug_state.contains(DebugState::NATIVE_EVENTS) {
            self.collab.native.push_window_events();
        }
    }

    fn propagate_inputs(&mut self, config: &SharedConfig) {
        self.inputs.merge_frame(config.nb_controllers as usize);

        let events = config.async_events;
        let mut relay: Vec<&dyn EventQueue> = Vec::new();
        if events.intersects(AsyncEvents::WINDOW_BEGIN | AsyncEvents::WINDOW_END) {
            relay.extend(self.collab.window_queue.as_deref());
        }
        if events.intersects(AsyncEvents::MEDIA_BEGIN | AsyncEvents::MEDIA_END) {
            relay.extend(self.collab.media_queue.as_deref());
        }

        let locks = QueueRelayLocks::acquire(relay);
        if !config.debug_state.contains(DebugState::NATIVE_EVENTS) {
            self.collab
                .native
                .generate_input_events(self.inputs.delivered(), self.inputs.previous_delivered());
        }
        drop(locks);

        self.collab.native.sync_controller_events();
    }
}
