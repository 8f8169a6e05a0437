// src/frame/control.rs

//! Control phase of the frame boundary: everything the controller may ask
//! for between the draw and the end of the boundary.

use super::FrameBoundary;
use crate::channel::ChannelGuard;
use crate::collab::DumpTarget;
use crate::config::SavestateSettings;
use crate::error::ChannelError;
use crate::input::InputSnapshot;
use crate::protocol::{ControllerMessage, EngineMessage};
use log::*;
use std::thread;

impl FrameBoundary {
    /// Polls the controller until it ends the boundary or the process starts
    /// exiting. An unrecognized message abandons the phase; whatever the
    /// controller queued after it is read by the next frame.
    pub(super) fn receive_control_messages(
        &mut self,
        link: &mut ChannelGuard<'_>,
        draw: &mut Option<&mut dyn FnMut()>,
    ) -> Result<(), ChannelError> {
        let mut preview = InputSnapshot::default();

        self.reap_finished_saves();

        loop {
            let msg = match link.try_receive()? {
                Some(msg) => msg,
                None => {
                    // Keep answering window-manager pings while idle.
                    self.collab.native.push_window_events();

                    if self.state.is_exiting() {
                        return Ok(());
                    }

                    if !self.state.config().fastforward {
                        thread::sleep(self.settings.idle_backoff());
                    }

                    self.reap_finished_saves();
                    continue;
                }
            };

            match msg {
                ControllerMessage::EndFrameBoundary => return Ok(()),
                ControllerMessage::UserQuit => {
                    info!("FrameBoundary: quit requested by the controller");
                    self.collab.native.push_quit_event();
                    self.state.set_exiting();
                }
                ControllerMessage::Config(config) => self.apply_config(config),
                ControllerMessage::DumpFile { path, options } => {
                    debug!("FrameBoundary: dump file {} ({})", path, options);
                    self.dump_target = DumpTarget { path, options };
                }
                ControllerMessage::Screenshot(path) => {
                    if let Err(e) = self.collab.capture.save_screenshot(&path, draw.is_some()) {
                        warn!("FrameBoundary: screenshot to {} failed: {:#}", path, e);
                    }
                }
                ControllerMessage::AllInputs(inputs) => self.receive_inputs(inputs),
                ControllerMessage::Expose => self.screen_redraw(draw, &preview),
                ControllerMessage::PreviewInputs(inputs) => preview = inputs,
                ControllerMessage::SavestatePath(path) => self.collab.checkpoint.set_path(&path),
                ControllerMessage::SavestateIndex(slot) => {
                    self.savestate_slot = slot;
                    self.collab.checkpoint.set_index(slot);
                }
                ControllerMessage::Savestate => self.save_state(link, draw, &preview)?,
                ControllerMessage::Loadstate => self.load_state(link)?,
                ControllerMessage::StopEncode => {
                    if self.encoder.take().is_some() {
                        info!("FrameBoundary: stop AV dumping");
                        self.state.update_config(|c| c.av_dumping = false);
                        self.collab.native.update_title(None);
                    }
                }
                ControllerMessage::OsdMessage(text) => self.collab.annotations.insert_message(text),
                ControllerMessage::Marker(text) => self.collab.annotations.set_marker_text(text),
                ControllerMessage::Unknown(tag) => {
                    error!("FrameBoundary: unknown message tag {} received", tag);
                    return Ok(());
                }
                other => {
                    error!("FrameBoundary: unexpected {} in control phase", other.name());
                    return Ok(());
                }
            }
        }
    }

    fn receive_inputs(&mut self, inputs: InputSnapshot) {
        let misc = inputs.misc;
        if self.state.config().variable_framerate {
            self.state.update_config(|c| {
                c.framerate_num = misc.framerate_num;
                c.framerate_den = misc.framerate_den;
            });
        }
        if misc.realtime_sec != 0 {
            self.collab
                .clock
                .set_real_time(misc.realtime_sec, misc.realtime_nsec);
        }
        self.inputs.set_supplied(inputs);
    }

    /// Redraws the last presented frame with a fresh overlay.
    fn screen_redraw(&mut self, draw: &mut Option<&mut dyn FnMut()>, preview: &InputSnapshot) {
        if self.state.is_skipping_draw() {
            return;
        }
        let Some(draw) = draw.as_deref_mut() else {
            return;
        };
        if !self.collab.overlay.do_render() {
            return;
        }

        self.collab.overlay.new_frame();
        self.collab.capture.copy_surface_to_screen();
        self.collab.overlay.draw_all(
            self.counters.framecount,
            self.counters.nondraw_framecount,
            self.inputs.supplied(),
            preview,
        );
        self.collab.overlay.render();
        draw();
    }

    fn save_state(
        &mut self,
        link: &mut ChannelGuard<'_>,
        draw: &mut Option<&mut dyn FnMut()>,
        preview: &InputSnapshot,
    ) -> Result<(), ChannelError> {
        let slot = self.savestate_slot;
        let status = self.collab.checkpoint.checkpoint(slot);

        if status.is_ok() {
            self.collab.checkpoint.set_current_to_parent();
            self.counters.did_savestate = true;
        }

        // A restored process resumes here rather than in `restore`.
        if self.collab.checkpoint.is_loading() {
            info!("FrameBoundary: state {} loaded", slot);
            link.send(&EngineMessage::LoadingSucceeded)?;

            match link.receive()? {
                ControllerMessage::Config(config) => self.apply_config(config),
                other => {
                    return Err(ChannelError::Unexpected {
                        expected: "CONFIG after loading a state",
                        found: other.name().to_string(),
                    })
                }
            }

            self.send_frame_count_time(link)?;
            self.screen_redraw(draw, preview);
            return Ok(());
        }

        match status {
            Ok(()) => {
                info!("FrameBoundary: state {} saved", slot);
                link.send(&EngineMessage::SavingSucceeded)?;
                let forked = self
                    .state
                    .config()
                    .savestate_settings
                    .contains(SavestateSettings::FORK);
                if !forked {
                    self.collab
                        .annotations
                        .insert_message(format!("State {} saved", slot));
                }
            }
            Err(e) => {
                warn!("FrameBoundary: saving state {} failed: {}", slot, e);
                link.send(&EngineMessage::Alert(e.to_string()))?;
                link.send(&EngineMessage::CheckpointFailed)?;
            }
        }
        Ok(())
    }

    /// Only returns when restoring failed; the controller still expects the
    /// frame count either way.
    fn load_state(&mut self, link: &mut ChannelGuard<'_>) -> Result<(), ChannelError> {
        let slot = self.savestate_slot;
        if let Err(e) = self.collab.checkpoint.restore(slot) {
            warn!("FrameBoundary: loading state {} failed: {}", slot, e);
            link.send(&EngineMessage::Alert(e.to_string()))?;
        }
        self.send_frame_count_time(link)
    }

    fn reap_finished_saves(&mut self) {
        while let Some(slot) = self.collab.checkpoint.reap_finished_save() {
            debug!("FrameBoundary: forked save of state {} finished", slot);
            self.collab
                .annotations
                .insert_message(format!("State {} saved", slot));
        }
    }
}
