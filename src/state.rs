// src/state.rs

//! Process-wide state shared between the frame-boundary thread and the hooks
//! running on application threads.
//!
//! Nothing here is a global: the host creates one [`SharedState`] and hands
//! clones of the `Arc` to the engine and to whatever needs to observe it.

use crate::config::SharedConfig;
use crate::error::ChannelError;
use crate::protocol::wire::{WireFormat, WireReader, WireWriter};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

bitflags! {
    /// Libraries the application was seen using.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct VideoLibs: u32 {
        const SDL1 = 1 << 0;
        const SDL2 = 1 << 1;
        const OPENGL = 1 << 2;
        const VULKAN = 1 << 3;
        const XLIB = 1 << 4;
        const XCB = 1 << 5;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct AudioLibs: u32 {
        const ALSA = 1 << 0;
        const PULSE = 1 << 1;
        const OPENAL = 1 << 2;
        const SDL = 1 << 3;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct InputLibs: u32 {
        const XLIB_KEYBOARD = 1 << 0;
        const XINPUT = 1 << 1;
        const EVDEV = 1 << 2;
        const JSDEV = 1 << 3;
        const SDL_JOYSTICK = 1 << 4;
    }
}

/// Metadata about the application, reported to the controller on change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GameInfo {
    pub video: VideoLibs,
    pub audio: AudioLibs,
    pub input: InputLibs,
}

impl GameInfo {
    /// Whether the application drives a media framework with its own event queue.
    pub fn uses_media_framework(&self) -> bool {
        self.video.intersects(VideoLibs::SDL1 | VideoLibs::SDL2)
    }
}

impl WireFormat for GameInfo {
    fn encode(&self, w: &mut WireWriter) {
        w.put_u32(self.video.bits());
        w.put_u32(self.audio.bits());
        w.put_u32(self.input.bits());
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, ChannelError> {
        Ok(GameInfo {
            video: VideoLibs::from_bits_truncate(r.u32()?),
            audio: AudioLibs::from_bits_truncate(r.u32()?),
            input: InputLibs::from_bits_truncate(r.u32()?),
        })
    }
}

#[derive(Debug)]
struct PendingGameInfo {
    info: GameInfo,
    to_send: bool,
}

#[derive(Debug)]
pub struct SharedState {
    exiting: AtomicBool,
    skipping_draw: AtomicBool,
    config: RwLock<SharedConfig>,
    game_info: Mutex<PendingGameInfo>,
}

impl Default for SharedState {
    fn default() -> Self {
        SharedState {
            exiting: AtomicBool::new(false),
            skipping_draw: AtomicBool::new(false),
            config: RwLock::new(SharedConfig::default()),
            game_info: Mutex::new(PendingGameInfo {
                info: GameInfo::default(),
                to_send: true,
            }),
        }
    }
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_exiting(&self) -> bool {
        self.exiting.load(Ordering::Acquire)
    }

    /// Marks the process as shutting down. Subsequent frame boundaries skip
    /// all controller communication.
    pub fn set_exiting(&self) {
        self.exiting.store(true, Ordering::Release);
    }

    /// Whether draw calls of the current frame are suppressed.
    pub fn is_skipping_draw(&self) -> bool {
        self.skipping_draw.load(Ordering::Acquire)
    }

    pub(crate) fn set_skipping_draw(&self, skipping: bool) {
        self.skipping_draw.store(skipping, Ordering::Release);
    }

    /// Snapshot of the current controller configuration.
    pub fn config(&self) -> SharedConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn replace_config(&self, config: SharedConfig) {
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
    }

    pub fn update_config(&self, f: impl FnOnce(&mut SharedConfig)) {
        f(&mut self.config.write().unwrap_or_else(PoisonError::into_inner));
    }

    pub fn game_info(&self) -> GameInfo {
        self.game_info
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .info
    }

    /// Applies `f` and schedules the record to be sent at the next boundary.
    pub fn update_game_info(&self, f: impl FnOnce(&mut GameInfo)) {
        let mut pending = self.game_info.lock().unwrap_or_else(PoisonError::into_inner);
        let before = pending.info;
        f(&mut pending.info);
        if pending.info != before {
            pending.to_send = true;
        }
    }

    /// Returns the record if it still has to be sent, clearing the request.
    pub(crate) fn take_unsent_game_info(&self) -> Option<GameInfo> {
        let mut pending = self.game_info.lock().unwrap_or_else(PoisonError::into_inner);
        if pending.to_send {
            pending.to_send = false;
            Some(pending.info)
        } else {
            None
        }
    }
}
