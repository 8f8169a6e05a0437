// src/input/mod.rs

//! Input snapshots exchanged with the controller and exposed to the application.
//!
//! An [`InputSnapshot`] is one frame's complete input state: a boolean per
//! logical key, the pointer, every controller and a word of miscellaneous
//! flags. The controller sends whole snapshots; [`merger::InputMerger`]
//! derives what the application actually observes.

pub mod merger;


use crate::error::ChannelError;
use crate::protocol::wire::{WireFormat, WireReader, WireWriter};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Number of logical keys tracked per snapshot.
pub const MAX_KEYS: usize = 256;
/// Number of controller slots carried by every snapshot.
pub const MAX_CONTROLLERS: usize = 4;
/// Number of analog axes per controller.
pub const CONTROLLER_AXES: usize = 6;

const KEY_BITMAP_BYTES: usize = MAX_KEYS / 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum PointerMode {
    /// Coordinates are positions inside the window.
    #[default]
    Absolute = 0,
    /// Coordinates are motion deltas since the previous frame.
    Relative = 1,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct PointerButtons: u32 {
        const LEFT = 1 << 0;
        const MIDDLE = 1 << 1;
        const RIGHT = 1 << 2;
        const BACK = 1 << 3;
        const FORWARD = 1 << 4;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct MiscFlags: u32 {
        /// The window lost focus this frame.
        const FOCUS_UNFOCUS = 1 << 0;
        /// The window gained focus this frame.
        const FOCUS_FOCUS = 1 << 1;
        /// Application audio is muted.
        const MUTE = 1 << 2;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PointerState {
    pub mode: PointerMode,
    pub x: i32,
    pub y: i32,
    pub buttons: PointerButtons,
}

impl PointerState {
    /// Moves the pointer, wrapping on 32-bit overflow.
    pub fn offset(&mut self, dx: i32, dy: i32) {
        self.x = self.x.wrapping_add(dx);
        self.y = self.y.wrapping_add(dy);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControllerState {
    pub axes: [i16; CONTROLLER_AXES],
    pub buttons: u16,
}

/// Flags plus the per-frame timing hints carried with a full input frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MiscInput {
    pub flags: MiscFlags,
    pub framerate_num: u32,
    pub framerate_den: u32,
    /// Wall-clock re-anchor; zero seconds means "leave the clock alone".
    pub realtime_sec: i64,
    pub realtime_nsec: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSnapshot {
    pub keys: [bool; MAX_KEYS],
    pub pointer: PointerState,
    pub controllers: [ControllerState; MAX_CONTROLLERS],
    pub misc: MiscInput,
}

impl Default for InputSnapshot {
    fn default() -> Self {
        InputSnapshot {
            keys: [false; MAX_KEYS],
            pointer: PointerState::default(),
            controllers: [ControllerState::default(); MAX_CONTROLLERS],
            misc: MiscInput::default(),
        }
    }
}

impl InputSnapshot {
    pub fn key(&self, index: usize) -> bool {
        self.keys.get(index).copied().unwrap_or(false)
    }

    pub fn set_key(&mut self, index: usize, pressed: bool) {
        if let Some(slot) = self.keys.get_mut(index) {
            *slot = pressed;
        }
    }

    pub fn pressed_keys(&self) -> impl Iterator<Item = usize> + '_ {
        self.keys
            .iter()
            .enumerate()
            .filter_map(|(i, &down)| down.then_some(i))
    }
}

impl WireFormat for InputSnapshot {
    fn encode(&self, w: &mut WireWriter) {
        let mut bitmap = [0u8; KEY_BITMAP_BYTES];
        for key in self.pressed_keys() {
            bitmap[key / 8] |= 1 << (key % 8);
        }
        w.put_bytes(&bitmap);

        w.put_u8(self.pointer.mode as u8);
        w.put_i32(self.pointer.x);
        w.put_i32(self.pointer.y);
        w.put_u32(self.pointer.buttons.bits());

        for controller in &self.controllers {
            for axis in controller.axes {
                w.put_i16(axis);
            }
            w.put_u16(controller.buttons);
        }

        w.put_u32(self.misc.flags.bits());
        w.put_u32(self.misc.framerate_num);
        w.put_u32(self.misc.framerate_den);
        w.put_i64(self.misc.realtime_sec);
        w.put_i64(self.misc.realtime_nsec);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, ChannelError> {
        let mut snapshot = InputSnapshot::default();

        let bitmap: [u8; KEY_BITMAP_BYTES] = r.bytes()?;
        for (i, key) in snapshot.keys.iter_mut().enumerate() {
            *key = bitmap[i / 8] & (1 << (i % 8)) != 0;
        }

        snapshot.pointer.mode = match r.u8()? {
            1 => PointerMode::Relative,
            _ => PointerMode::Absolute,
        };
        snapshot.pointer.x = r.i32()?;
        snapshot.pointer.y = r.i32()?;
        snapshot.pointer.buttons = PointerButtons::from_bits_truncate(r.u32()?);

        for controller in snapshot.controllers.iter_mut() {
            for axis in controller.axes.iter_mut() {
                *axis = r.i16()?;
            }
            controller.buttons = r.u16()?;
        }

        snapshot.misc.flags = MiscFlags::from_bits_truncate(r.u32()?);
        snapshot.misc.framerate_num = r.u32()?;
        snapshot.misc.framerate_den = r.u32()?;
        snapshot.misc.realtime_sec = r.i64()?;
        snapshot.misc.realtime_nsec = r.i64()?;
        Ok(snapshot)
    }
}
