// src/config.rs

//! Configuration consumed by the frame-boundary engine.
//!
//! Two kinds of settings live here:
//!
//! - [`SharedConfig`] is owned by the controller process. It arrives as a
//!   fixed-size `CONFIG` record and replaces the previous one wholesale.
//! - [`EngineSettings`] are local knobs read once at start-up from an optional
//!   JSON file (see [`EngineSettings::from_env`]). Every field has a default.

use crate::protocol::wire::{WireFormat, WireReader, WireWriter, DEFAULT_MAX_STRING_LEN};
use crate::error::ChannelError;
use anyhow::{Context, Result};
use bitflags::bitflags;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the JSON settings file.
pub const SETTINGS_ENV_VAR: &str = "FRAME_SYNC_SETTINGS";

bitflags! {
    /// Which event queues are drained asynchronously, and at which end of the
    /// frame boundary the engine waits for them to be empty.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct AsyncEvents: u32 {
        /// Window-system events must be consumed before the next frame begins.
        const WINDOW_BEGIN = 1 << 0;
        /// Window-system events must be consumed before the boundary starts.
        const WINDOW_END = 1 << 1;
        /// Media-framework events must be consumed before the next frame begins.
        const MEDIA_BEGIN = 1 << 2;
        /// Media-framework events must be consumed before the boundary starts.
        const MEDIA_END = 1 << 3;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct DebugState: u32 {
        /// Let the application see native events; disables all injection.
        const NATIVE_EVENTS = 1 << 0;
        /// Allow network sockets.
        const NATIVE_INET = 1 << 1;
    }
}

bitflags! {
    /// Barriers aligning the frame boundary with known engine threading patterns.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct GameSync: u32 {
        /// Wait on the barrier for draw frames once past the start-up frames.
        const WITNESS = 1 << 0;
        /// Wait on the barrier every frame.
        const CELESTE = 1 << 1;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct SavestateSettings: u32 {
        /// States are written by a forked child.
        const FORK = 1 << 0;
    }
}

/// How draw calls are treated while fast-forwarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum FastForwardRender {
    /// Render every candidate frame.
    All = 0,
    /// Skip every candidate frame.
    None = 1,
    /// Render a handful of frames per second.
    #[default]
    Auto = 2,
}

impl FastForwardRender {
    fn from_wire(v: u8) -> Self {
        match v {
            0 => FastForwardRender::All,
            1 => FastForwardRender::None,
            _ => FastForwardRender::Auto,
        }
    }
}

/// Controller-owned configuration record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Execution is running rather than frame-advancing.
    pub running: bool,
    pub fastforward: bool,
    pub fastforward_render: FastForwardRender,
    /// Audio/video dumping is active.
    pub av_dumping: bool,
    /// Draw the overlay before the frame is captured, so it ends up in encodes.
    pub osd_encode: bool,
    /// Frame rate may be changed by each input frame.
    pub variable_framerate: bool,
    pub framerate_num: u32,
    pub framerate_den: u32,
    /// Number of game controllers exposed to the application.
    pub nb_controllers: u32,
    pub async_events: AsyncEvents,
    pub debug_state: DebugState,
    pub game_specific_sync: GameSync,
    pub savestate_settings: SavestateSettings,
}

impl Default for SharedConfig {
    fn default() -> Self {
        SharedConfig {
            running: false,
            fastforward: false,
            fastforward_render: FastForwardRender::default(),
            av_dumping: false,
            osd_encode: false,
            variable_framerate: false,
            framerate_num: 60,
            framerate_den: 1,
            nb_controllers: 0,
            async_events: AsyncEvents::empty(),
            debug_state: DebugState::empty(),
            game_specific_sync: GameSync::empty(),
            savestate_settings: SavestateSettings::empty(),
        }
    }
}

impl SharedConfig {
    /// Encoded size of the record on the wire.
    pub const WIRE_SIZE: usize = 6 + 1 + 4 * 7;
}

impl WireFormat for SharedConfig {
    fn encode(&self, w: &mut WireWriter) {
        w.put_bool(self.running);
        w.put_bool(self.fastforward);
        w.put_u8(self.fastforward_render as u8);
        w.put_bool(self.av_dumping);
        w.put_bool(self.osd_encode);
        w.put_bool(self.variable_framerate);
        w.put_u8(0); // padding
        w.put_u32(self.framerate_num);
        w.put_u32(self.framerate_den);
        w.put_u32(self.nb_controllers);
        w.put_u32(self.async_events.bits());
        w.put_u32(self.debug_state.bits());
        w.put_u32(self.game_specific_sync.bits());
        w.put_u32(self.savestate_settings.bits());
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, ChannelError> {
        let running = r.bool()?;
        let fastforward = r.bool()?;
        let fastforward_render = FastForwardRender::from_wire(r.u8()?);
        let av_dumping = r.bool()?;
        let osd_encode = r.bool()?;
        let variable_framerate = r.bool()?;
        let _padding = r.u8()?;
        Ok(SharedConfig {
            running,
            fastforward,
            fastforward_render,
            av_dumping,
            osd_encode,
            variable_framerate,
            framerate_num: r.u32()?,
            framerate_den: r.u32()?,
            nb_controllers: r.u32()?,
            async_events: AsyncEvents::from_bits_truncate(r.u32()?),
            debug_state: DebugState::from_bits_truncate(r.u32()?),
            game_specific_sync: GameSync::from_bits_truncate(r.u32()?),
            savestate_settings: SavestateSettings::from_bits_truncate(r.u32()?),
        })
    }
}

/// Local engine settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineSettings {
    /// Unix socket of the controller process.
    pub socket_path: PathBuf,
    /// Sleep between polls of the control phase when not fast-forwarding.
    pub idle_backoff_us: u64,
    /// Largest string payload accepted from the controller.
    pub max_string_len: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            socket_path: std::env::temp_dir().join("frame-sync.sock"),
            idle_backoff_us: 100,
            max_string_len: DEFAULT_MAX_STRING_LEN,
        }
    }
}

impl EngineSettings {
    pub fn idle_backoff(&self) -> Duration {
        Duration::from_micros(self.idle_backoff_us)
    }

    /// Loads settings from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        let settings: EngineSettings = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))?;
        debug!("EngineSettings: loaded {:?} from {}", settings, path.display());
        Ok(settings)
    }

    /// Loads the file named by [`SETTINGS_ENV_VAR`], falling back to defaults.
    pub fn from_env() -> Self {
        match std::env::var_os(SETTINGS_ENV_VAR) {
            Some(path) => Self::load(Path::new(&path)).unwrap_or_else(|e| {
                warn!("EngineSettings: {:#}; using defaults", e);
                Self::default()
            }),
            None => Self::default(),
        }
    }
}
