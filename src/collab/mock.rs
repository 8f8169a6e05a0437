// src/collab/mock.rs

//! Recording fakes for every collaborator.
//!
//! All fakes of one [`MockWorld`] append to the same journal, so tests can
//! check the order in which the engine touched different subsystems.

use super::*;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ClockEnter,
    ClockExit,
    SetRealTime(i64, i64),
    FlushDelay,
    MixAudio,
    SetPath(String),
    SetIndex(i32),
    Checkpoint(i32),
    Restore(i32),
    SetCurrentToParent,
    MarkMainThread,
    ResetThreadsChanged,
    CaptureInit,
    CopyScreenToSurface,
    CopySurfaceToScreen,
    RestoreScreenState,
    Screenshot(String, bool),
    EncoderCreated(DumpTarget),
    EncodeFrame(bool),
    EncoderDropped,
    DrawAll { frame: u64, nondraw: u64, preview_x: i32 },
    Render,
    EndFrame,
    NewFrame,
    Watch(String),
    ResetWatches,
    Shape(OverlayShape),
    ResetShapes,
    Message(String),
    Marker(String),
    QueueWait(&'static str),
    QueueLock(&'static str),
    QueueUnlock(&'static str),
    PushMediaEvents,
    PushWindowEvents,
    PushQuit,
    GenerateInputs { x: i32, y: i32 },
    SyncControllers,
    Title(Option<(f32, f32)>),
    DetWait,
    UnityWait,
    /// Pushed by test draw callbacks.
    Draw,
}

/// Behaviour knobs read by the fakes.
#[derive(Debug)]
pub struct Script {
    pub checkpoint_results: VecDeque<Result<(), CheckpointError>>,
    pub restore_results: VecDeque<Result<(), CheckpointError>>,
    pub is_loading: bool,
    pub reaped_saves: VecDeque<i32>,
    pub threads_changed: bool,
    pub do_render: bool,
    pub is_unity: bool,
    pub loopback_audio: bool,
    pub capture_size: (i32, i32),
    pub screenshot_fails: bool,
    clock_frames: i64,
}

impl Default for Script {
    fn default() -> Self {
        Script {
            checkpoint_results: VecDeque::new(),
            restore_results: VecDeque::new(),
            is_loading: false,
            reaped_saves: VecDeque::new(),
            threads_changed: false,
            do_render: true,
            is_unity: false,
            loopback_audio: false,
            capture_size: (640, 480),
            screenshot_fails: false,
            clock_frames: 0,
        }
    }
}

pub type Journal = Rc<RefCell<Vec<Call>>>;

#[derive(Clone, Default)]
pub struct MockWorld {
    pub journal: Journal,
    pub script: Rc<RefCell<Script>>,
}

impl MockWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collaborators backed by this world. Event queues are only attached
    /// when `with_queues` is set.
    pub fn collaborators(&self, with_queues: bool) -> Collaborators {
        let fake = || Box::new(Fake(self.clone()));
        let queue = |name: &'static str| -> Option<Box<dyn EventQueue>> {
            with_queues.then(|| {
                Box::new(FakeQueue {
                    name,
                    journal: Rc::clone(&self.journal),
                }) as Box<dyn EventQueue>
            })
        };
        Collaborators {
            clock: fake(),
            audio: fake(),
            checkpoint: fake(),
            threads: fake(),
            capture: fake(),
            encoders: fake(),
            overlay: fake(),
            annotations: fake(),
            native: fake(),
            window_queue: queue("window"),
            media_queue: queue("media"),
            sync: fake(),
        }
    }

    fn record(&self, call: Call) {
        self.journal.borrow_mut().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.journal.borrow().clone()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.journal.borrow().iter().filter(|c| *c == call).count()
    }

    pub fn position(&self, call: &Call) -> Option<usize> {
        self.journal.borrow().iter().position(|c| c == call)
    }

    pub fn clear(&self) {
        self.journal.borrow_mut().clear();
    }

    /// A draw callback that records `Call::Draw`.
    pub fn draw_callback(&self) -> impl FnMut() {
        let journal = Rc::clone(&self.journal);
        move || journal.borrow_mut().push(Call::Draw)
    }
}

struct Fake(MockWorld);

impl DeterministicClock for Fake {
    fn enter_frame_boundary(&mut self) -> TimeSpec {
        self.0.script.borrow_mut().clock_frames += 1;
        self.0.record(Call::ClockEnter);
        TimeSpec::new(0, 16_666_667)
    }

    fn exit_frame_boundary(&mut self) {
        self.0.record(Call::ClockExit);
    }

    fn ticks(&self, base: TimeBase) -> TimeSpec {
        let frames = self.0.script.borrow().clock_frames;
        match base {
            TimeBase::UntrackedMonotonic => TimeSpec::new(frames, 0),
            TimeBase::UntrackedRealtime => TimeSpec::new(1_000_000 + frames, 500),
        }
    }

    fn set_real_time(&mut self, sec: i64, nsec: i64) {
        self.0.record(Call::SetRealTime(sec, nsec));
    }

    fn flush_delay(&mut self) {
        self.0.record(Call::FlushDelay);
    }
}

impl AudioMixer for Fake {
    fn is_loopback(&self) -> bool {
        self.0.script.borrow().loopback_audio
    }

    fn mix_all_sources(&mut self, _increment: TimeSpec) {
        self.0.record(Call::MixAudio);
    }
}

impl CheckpointManager for Fake {
    fn set_path(&mut self, path: &str) {
        self.0.record(Call::SetPath(path.to_string()));
    }

    fn set_index(&mut self, slot: i32) {
        self.0.record(Call::SetIndex(slot));
    }

    fn checkpoint(&mut self, slot: i32) -> Result<(), CheckpointError> {
        self.0.record(Call::Checkpoint(slot));
        self.0
            .script
            .borrow_mut()
            .checkpoint_results
            .pop_front()
            .unwrap_or(Ok(()))
    }

    fn restore(&mut self, slot: i32) -> Result<(), CheckpointError> {
        self.0.record(Call::Restore(slot));
        self.0
            .script
            .borrow_mut()
            .restore_results
            .pop_front()
            .unwrap_or(Err(CheckpointError::NoState))
    }

    fn is_loading(&self) -> bool {
        self.0.script.borrow().is_loading
    }

    fn set_current_to_parent(&mut self) {
        self.0.record(Call::SetCurrentToParent);
    }

    fn reap_finished_save(&mut self) -> Option<i32> {
        self.0.script.borrow_mut().reaped_saves.pop_front()
    }
}

impl ThreadRoster for Fake {
    fn mark_main_thread(&mut self) {
        self.0.record(Call::MarkMainThread);
    }

    fn has_changed(&self) -> bool {
        self.0.script.borrow().threads_changed
    }

    fn reset_changed(&mut self) {
        self.0.script.borrow_mut().threads_changed = false;
        self.0.record(Call::ResetThreadsChanged);
    }
}

impl ScreenCapture for Fake {
    fn init(&mut self) {
        self.0.record(Call::CaptureInit);
    }

    fn dimensions(&self) -> (i32, i32) {
        self.0.script.borrow().capture_size
    }

    fn copy_screen_to_surface(&mut self) {
        self.0.record(Call::CopyScreenToSurface);
    }

    fn copy_surface_to_screen(&mut self) {
        self.0.record(Call::CopySurfaceToScreen);
    }

    fn restore_screen_state(&mut self) {
        self.0.record(Call::RestoreScreenState);
    }

    fn save_screenshot(&mut self, path: &str, is_draw: bool) -> Result<()> {
        self.0.record(Call::Screenshot(path.to_string(), is_draw));
        if self.0.script.borrow().screenshot_fails {
            anyhow::bail!("no surface to capture");
        }
        Ok(())
    }
}

struct FakeEncoder(MockWorld);

impl Encoder for FakeEncoder {
    fn encode_one_frame(&mut self, is_draw: bool, _increment: TimeSpec) {
        self.0.record(Call::EncodeFrame(is_draw));
    }
}

impl Drop for FakeEncoder {
    fn drop(&mut self) {
        self.0.record(Call::EncoderDropped);
    }
}

impl EncoderFactory for Fake {
    fn create(&mut self, target: &DumpTarget) -> Result<Box<dyn Encoder>> {
        self.0.record(Call::EncoderCreated(target.clone()));
        Ok(Box::new(FakeEncoder(self.0.clone())))
    }
}

impl OverlayRenderer for Fake {
    fn draw_all(
        &mut self,
        frame: u64,
        nondraw_frames: u64,
        _inputs: &InputSnapshot,
        preview: &InputSnapshot,
    ) {
        self.0.record(Call::DrawAll {
            frame,
            nondraw: nondraw_frames,
            preview_x: preview.pointer.x,
        });
    }

    fn render(&mut self) {
        self.0.record(Call::Render);
    }

    fn end_frame(&mut self) {
        self.0.record(Call::EndFrame);
    }

    fn new_frame(&mut self) {
        self.0.record(Call::NewFrame);
    }

    fn do_render(&self) -> bool {
        self.0.script.borrow().do_render
    }
}

impl Annotations for Fake {
    fn insert_watch(&mut self, watch: String) {
        self.0.record(Call::Watch(watch));
    }

    fn reset_watches(&mut self) {
        self.0.record(Call::ResetWatches);
    }

    fn insert_shape(&mut self, shape: OverlayShape) {
        self.0.record(Call::Shape(shape));
    }

    fn reset_shapes(&mut self) {
        self.0.record(Call::ResetShapes);
    }

    fn insert_message(&mut self, message: String) {
        self.0.record(Call::Message(message));
    }

    fn set_marker_text(&mut self, text: String) {
        self.0.record(Call::Marker(text));
    }
}

impl NativeEvents for Fake {
    fn push_media_events(&mut self) {
        self.0.record(Call::PushMediaEvents);
    }

    fn push_window_events(&mut self) {
        self.0.record(Call::PushWindowEvents);
    }

    fn push_quit_event(&mut self) {
        self.0.record(Call::PushQuit);
    }

    fn generate_input_events(&mut self, current: &InputSnapshot, _previous: &InputSnapshot) {
        self.0.record(Call::GenerateInputs {
            x: current.pointer.x,
            y: current.pointer.y,
        });
    }

    fn sync_controller_events(&mut self) {
        self.0.record(Call::SyncControllers);
    }

    fn update_title(&mut self, fps: Option<(f32, f32)>) {
        self.0.record(Call::Title(fps));
    }
}

impl SyncBarriers for Fake {
    fn det_wait(&mut self) {
        self.0.record(Call::DetWait);
    }

    fn is_unity(&self) -> bool {
        self.0.script.borrow().is_unity
    }

    fn unity_wait_all(&mut self) {
        self.0.record(Call::UnityWait);
    }
}

struct FakeQueue {
    name: &'static str,
    journal: Journal,
}

impl EventQueue for FakeQueue {
    fn wait_for_empty(&self) {
        self.journal.borrow_mut().push(Call::QueueWait(self.name));
    }

    fn lock_and_reset_empty(&self) {
        self.journal.borrow_mut().push(Call::QueueLock(self.name));
    }

    fn unlock(&self) {
        self.journal.borrow_mut().push(Call::QueueUnlock(self.name));
    }
}
