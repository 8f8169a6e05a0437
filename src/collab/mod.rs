// src/collab/mod.rs

//! Interfaces of the subsystems the frame-boundary engine coordinates but does
//! not own.
//!
//! Each trait is the narrow slice of a subsystem the engine actually calls.
//! Real implementations forward to the un-intercepted native functions of
//! the host; tests substitute the recording fakes from `mock`.

#[cfg(test)]
pub mod mock;

use crate::input::InputSnapshot;
use crate::protocol::{OverlayShape, TimeSpec};
use anyhow::Result;
use thiserror::Error;

/// Time bases the clock can report without perturbing its own accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeBase {
    UntrackedMonotonic,
    UntrackedRealtime,
}

/// Deterministic time source.
pub trait DeterministicClock {
    /// Advances virtual time for the new frame and returns the increment.
    fn enter_frame_boundary(&mut self) -> TimeSpec;
    fn exit_frame_boundary(&mut self);
    fn ticks(&self, base: TimeBase) -> TimeSpec;
    /// Re-anchors the wall clock.
    fn set_real_time(&mut self, sec: i64, nsec: i64);
    /// Applies any accumulated sleep immediately.
    fn flush_delay(&mut self);
}

pub trait AudioMixer {
    /// The application mixes on its own loopback context; the engine must not.
    fn is_loopback(&self) -> bool;
    fn mix_all_sources(&mut self, increment: TimeSpec);
}

/// Why a checkpoint operation did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckpointError {
    #[error("Savestate failed")]
    Unknown,
    #[error("Not enough memory to make a savestate")]
    OutOfMemory,
    #[error("There is no savestate in this slot")]
    NoState,
    #[error("The thread list changed since the savestate was made")]
    ThreadsChanged,
    #[error("No savestate path was set")]
    NoPath,
}

/// Memory snapshot/restore subsystem.
pub trait CheckpointManager {
    fn set_path(&mut self, path: &str);
    fn set_index(&mut self, slot: i32);
    fn checkpoint(&mut self, slot: i32) -> Result<(), CheckpointError>;
    /// Returns only if restoring failed.
    fn restore(&mut self, slot: i32) -> Result<(), CheckpointError>;
    /// True when execution resumed inside `checkpoint` after a restore.
    fn is_loading(&self) -> bool;
    /// The state just saved becomes the parent of the next one.
    fn set_current_to_parent(&mut self);
    /// Slot of a forked save that has finished, if any.
    fn reap_finished_save(&mut self) -> Option<i32>;
}

pub trait ThreadRoster {
    fn mark_main_thread(&mut self);
    fn has_changed(&self) -> bool;
    fn reset_changed(&mut self);
}

/// Screen capture of the application's presented surface.
pub trait ScreenCapture {
    /// Lazily set up on the first frame; must be idempotent.
    fn init(&mut self);
    fn dimensions(&self) -> (i32, i32);
    fn copy_screen_to_surface(&mut self);
    fn copy_surface_to_screen(&mut self);
    fn restore_screen_state(&mut self);
    fn save_screenshot(&mut self, path: &str, is_draw: bool) -> Result<()>;
}

/// Where an audio/video dump goes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DumpTarget {
    pub path: String,
    pub options: String,
}

pub trait Encoder {
    fn encode_one_frame(&mut self, is_draw: bool, increment: TimeSpec);
}

pub trait EncoderFactory {
    fn create(&mut self, target: &DumpTarget) -> Result<Box<dyn Encoder>>;
}

/// Frame lifecycle of the on-screen overlay.
pub trait OverlayRenderer {
    fn draw_all(
        &mut self,
        frame: u64,
        nondraw_frames: u64,
        inputs: &InputSnapshot,
        preview: &InputSnapshot,
    );
    fn render(&mut self);
    /// Closes an overlay frame that will not be drawn.
    fn end_frame(&mut self);
    fn new_frame(&mut self);
    /// Whether a forced redraw is worth doing right now.
    fn do_render(&self) -> bool;
}

/// Queued annotations displayed by the overlay.
pub trait Annotations {
    fn insert_watch(&mut self, watch: String);
    fn reset_watches(&mut self);
    fn insert_shape(&mut self, shape: OverlayShape);
    fn reset_shapes(&mut self);
    fn insert_message(&mut self, message: String);
    fn set_marker_text(&mut self, text: String);
}

/// Asynchronously drained event queue of a window system or media framework.
pub trait EventQueue {
    /// Blocks until the application has consumed every queued event.
    fn wait_for_empty(&self);
    /// Locks the queue against the application and clears its "emptied" mark.
    fn lock_and_reset_empty(&self);
    fn unlock(&self);
}

/// Native events the host must still see to stay responsive.
pub trait NativeEvents {
    fn push_media_events(&mut self);
    /// Window-manager housekeeping, including liveness pings.
    fn push_window_events(&mut self);
    fn push_quit_event(&mut self);
    /// Turns the change between two delivered snapshots into application events.
    fn generate_input_events(&mut self, current: &InputSnapshot, previous: &InputSnapshot);
    /// Waits for device-file (evdev/jsdev) events to be read.
    fn sync_controller_events(&mut self);
    /// `None` clears the frame-rate part of the title.
    fn update_title(&mut self, fps: Option<(f32, f32)>);
}

/// Barriers used to line the boundary up with known engine patterns.
pub trait SyncBarriers {
    fn det_wait(&mut self);
    fn is_unity(&self) -> bool;
    fn unity_wait_all(&mut self);
}

/// Everything the engine coordinates, supplied at construction.
pub struct Collaborators {
    pub clock: Box<dyn DeterministicClock>,
    pub audio: Box<dyn AudioMixer>,
    pub checkpoint: Box<dyn CheckpointManager>,
    pub threads: Box<dyn ThreadRoster>,
    pub capture: Box<dyn ScreenCapture>,
    pub encoders: Box<dyn EncoderFactory>,
    pub overlay: Box<dyn OverlayRenderer>,
    pub annotations: Box<dyn Annotations>,
    pub native: Box<dyn NativeEvents>,
    pub window_queue: Option<Box<dyn EventQueue>>,
    pub media_queue: Option<Box<dyn EventQueue>>,
    pub sync: Box<dyn SyncBarriers>,
}
