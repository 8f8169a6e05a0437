// src/window.rs

//! Top-level windows of the application, as reported to the controller.
//!
//! The first window in the roster is the one the controller gathers input
//! from. Window hooks run on arbitrary application threads, so every change
//! that moves the primary window sends `WINDOW_ID` under a short channel lock.

use crate::channel::MessageChannel;
use crate::error::ChannelError;
use crate::protocol::EngineMessage;
use crate::state::SharedState;
use log::debug;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

/// Window id sent when the application has no window left.
pub const NO_WINDOW: u32 = 0;

pub struct WindowRoster {
    channel: Arc<MessageChannel>,
    state: Arc<SharedState>,
    windows: Mutex<VecDeque<u32>>,
}

impl WindowRoster {
    pub fn new(channel: Arc<MessageChannel>, state: Arc<SharedState>) -> Self {
        WindowRoster {
            channel,
            state,
            windows: Mutex::new(VecDeque::new()),
        }
    }

    fn windows(&self) -> std::sync::MutexGuard<'_, VecDeque<u32>> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn primary(&self) -> Option<u32> {
        self.windows().front().copied()
    }

    pub fn len(&self) -> usize {
        self.windows().len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows().is_empty()
    }

    /// Records a newly created top-level window. Nothing is sent until it is
    /// mapped.
    pub fn register(&self, window: u32) {
        let mut windows = self.windows();
        if windows.is_empty() {
            debug!("WindowRoster: game window is {}", window);
        }
        windows.push_back(window);
    }

    /// A known window became visible: it becomes the primary window.
    pub fn map(&self, window: u32) -> Result<(), ChannelError> {
        {
            let mut windows = self.windows();
            let Some(index) = windows.iter().position(|&w| w == window) else {
                return Ok(());
            };
            windows.remove(index);
            windows.push_front(window);
        }
        self.send(window)
    }

    /// Forgets a destroyed window. Destroying the primary window promotes the
    /// next one, which is not announced once the process is exiting.
    pub fn destroy(&self, window: u32) -> Result<(), ChannelError> {
        let promoted = {
            let mut windows = self.windows();
            if windows.front() != Some(&window) {
                windows.retain(|&w| w != window);
                return Ok(());
            }
            windows.pop_front();
            windows.front().copied()
        };

        match promoted {
            None => self.send(NO_WINDOW),
            Some(next) if !self.state.is_exiting() => {
                debug!("WindowRoster: game window is now {}", next);
                self.send(next)
            }
            Some(_) => Ok(()),
        }
    }

    fn send(&self, window: u32) -> Result<(), ChannelError> {
        self.channel.send(&EngineMessage::WindowId(window))?;
        debug!("WindowRoster: sent window id {}", window);
        Ok(())
    }
}
