// src/input/merger.rs

//! Derives the input the application observes from the input the controller
//! supplied.
//!
//! The merger keeps six snapshots: supplied/previous-supplied, delivered/
//! previous-delivered and an unclipped variant of delivered with its previous
//! value. `merge_frame` runs once per frame boundary, after rendering, so new
//! input only becomes visible to the application on the following frame.

use super::{InputSnapshot, PointerMode};
use log::trace;

/// Rectangle the delivered pointer is confined to while a grab is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipRegion {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl ClipRegion {
    /// Clamps one axis into `[origin, origin + size)`.
    fn clamp_axis(value: i32, origin: i32, size: i32) -> i32 {
        let end = i64::from(origin) + i64::from(size);
        if value < origin {
            origin
        } else if i64::from(value) >= end {
            (end - 1).clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
        } else {
            value
        }
    }

    pub fn clamp(&self, x: i32, y: i32) -> (i32, i32) {
        (
            Self::clamp_axis(x, self.x, self.width),
            Self::clamp_axis(y, self.y, self.height),
        )
    }
}

#[derive(Debug, Default)]
pub struct InputMerger {
    supplied: InputSnapshot,
    previous_supplied: InputSnapshot,
    delivered: InputSnapshot,
    previous_delivered: InputSnapshot,
    unclipped: InputSnapshot,
    previous_unclipped: InputSnapshot,
    clip: Option<ClipRegion>,
}

impl InputMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the controller-supplied snapshot for the next merge.
    pub fn set_supplied(&mut self, snapshot: InputSnapshot) {
        self.supplied = snapshot;
    }

    pub fn supplied(&self) -> &InputSnapshot {
        &self.supplied
    }

    pub fn previous_supplied(&self) -> &InputSnapshot {
        &self.previous_supplied
    }

    pub fn delivered(&self) -> &InputSnapshot {
        &self.delivered
    }

    pub fn previous_delivered(&self) -> &InputSnapshot {
        &self.previous_delivered
    }

    pub fn unclipped(&self) -> &InputSnapshot {
        &self.unclipped
    }

    pub fn previous_unclipped(&self) -> &InputSnapshot {
        &self.previous_unclipped
    }

    pub fn clip_region(&self) -> Option<ClipRegion> {
        self.clip
    }

    /// Activates or clears pointer confinement.
    pub fn set_clip_region(&mut self, clip: Option<ClipRegion>) {
        self.clip = clip;
    }

    /// Computes this frame's delivered input. `controller_count` is the number
    /// of controllers currently configured; extra slots are left untouched.
    pub fn merge_frame(&mut self, controller_count: usize) {
        self.previous_delivered = self.delivered.clone();
        self.previous_unclipped = self.unclipped.clone();

        self.delivered.keys = self.supplied.keys;

        let supplied = self.supplied.pointer;
        self.delivered.pointer.mode = supplied.mode;
        match supplied.mode {
            PointerMode::Relative => {
                self.delivered.pointer.offset(supplied.x, supplied.y);
                self.unclipped.pointer.offset(supplied.x, supplied.y);
            }
            PointerMode::Absolute
                if self.previous_delivered.pointer.mode == PointerMode::Relative =>
            {
                // Hold the position for the frame where the mode flips. The
                // unclipped position is deliberately left as it was.
                self.delivered.pointer.x = self.previous_delivered.pointer.x;
                self.delivered.pointer.y = self.previous_delivered.pointer.y;
            }
            PointerMode::Absolute => {
                // Coordinates wrap like the controller's 32-bit integers.
                let dx = supplied.x.wrapping_sub(self.previous_supplied.pointer.x);
                let dy = supplied.y.wrapping_sub(self.previous_supplied.pointer.y);
                self.delivered.pointer.offset(dx, dy);
                self.unclipped.pointer.offset(dx, dy);
            }
        }

        self.delivered.pointer.buttons = supplied.buttons;

        let count = controller_count.min(self.delivered.controllers.len());
        self.delivered.controllers[..count].copy_from_slice(&self.supplied.controllers[..count]);

        if let Some(clip) = self.clip {
            let (x, y) = clip.clamp(self.delivered.pointer.x, self.delivered.pointer.y);
            self.delivered.pointer.x = x;
            self.delivered.pointer.y = y;
        }

        self.delivered.misc.flags = self.supplied.misc.flags;

        // Everything but the pointer position mirrors the delivered snapshot.
        self.unclipped.keys = self.delivered.keys;
        self.unclipped.pointer.mode = self.delivered.pointer.mode;
        self.unclipped.pointer.buttons = self.delivered.pointer.buttons;
        self.unclipped.controllers = self.delivered.controllers;
        self.unclipped.misc.flags = self.delivered.misc.flags;

        self.previous_supplied = self.supplied.clone();

        trace!(
            "InputMerger: delivered pointer at ({}, {}) [{:?}]",
            self.delivered.pointer.x,
            self.delivered.pointer.y,
            self.delivered.pointer.mode
        );
    }
}
