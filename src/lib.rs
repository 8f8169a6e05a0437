// src/lib.rs

//! Frame-boundary synchronization for an intercepted application.
//!
//! The host creates one [`SharedState`], connects a [`MessageChannel`] to the
//! controller, bundles its subsystems into [`collab::Collaborators`] and then
//! calls [`FrameBoundary::cross_or_exit`] from its frame hook.

pub mod channel;
pub mod collab;
pub mod config;
pub mod error;
pub mod frame;
pub mod input;
pub mod logging;
pub mod protocol;
pub mod state;
pub mod window;

pub use channel::{ChannelGuard, MessageChannel, Transport};
pub use config::{EngineSettings, SharedConfig};
pub use error::{ChannelError, FrameError};
pub use frame::FrameBoundary;
pub use input::merger::{ClipRegion, InputMerger};
pub use input::InputSnapshot;
pub use protocol::{ControllerMessage, EngineMessage};
pub use state::{GameInfo, SharedState};
pub use window::WindowRoster;
