// src/protocol/mod.rs

//! Messages exchanged with the controller process.
//!
//! Each message is an `i32` tag followed by a payload whose layout is fixed by
//! the tag. The two directions use separate tag spaces. Payloads are decoded
//! once, here, into [`ControllerMessage`] and [`EngineMessage`]; the rest of
//! the crate never touches raw bytes.

pub mod wire;


use crate::config::SharedConfig;
use crate::error::ChannelError;
use crate::input::InputSnapshot;
use crate::state::GameInfo;
use wire::{WireFormat, WireReader, WireWriter};

/// Tags of messages sent by the engine.
pub mod engine_tag {
    pub const CHECKPOINT_FAILED: i32 = -1;
    pub const FRAMECOUNT_TIME: i32 = 0;
    pub const GAMEINFO: i32 = 1;
    pub const FPS: i32 = 2;
    pub const INVALIDATE_SAVESTATES: i32 = 3;
    pub const NONDRAW_FRAME: i32 = 4;
    pub const START_FRAMEBOUNDARY: i32 = 5;
    pub const LOADING_SUCCEEDED: i32 = 6;
    pub const SAVING_SUCCEEDED: i32 = 7;
    pub const WINDOW_ID: i32 = 8;
    pub const LUA_RESOLUTION: i32 = 9;
    pub const ALERT_MSG: i32 = 10;
}

/// Tags of messages sent by the controller.
pub mod controller_tag {
    pub const START_FRAMEBOUNDARY: i32 = 0;
    pub const END_FRAMEBOUNDARY: i32 = 1;
    pub const RAMWATCH: i32 = 2;
    pub const LUA_RESOLUTION: i32 = 3;
    pub const LUA_TEXT: i32 = 4;
    pub const LUA_PIXEL: i32 = 5;
    pub const LUA_RECT: i32 = 6;
    pub const LUA_LINE: i32 = 7;
    pub const LUA_ELLIPSE: i32 = 8;
    pub const CONFIG: i32 = 9;
    pub const ALL_INPUTS: i32 = 10;
    pub const PREVIEW_INPUTS: i32 = 11;
    pub const SAVESTATE_PATH: i32 = 12;
    pub const SAVESTATE_INDEX: i32 = 13;
    pub const SAVESTATE: i32 = 14;
    pub const LOADSTATE: i32 = 15;
    pub const STOP_ENCODE: i32 = 16;
    pub const OSD_MSG: i32 = 17;
    pub const MARKER: i32 = 18;
    pub const USERQUIT: i32 = 19;
    pub const DUMP_FILE: i32 = 20;
    pub const SCREENSHOT: i32 = 21;
    pub const EXPOSE: i32 = 22;
}

/// Seconds/nanoseconds pair, as reported by the deterministic clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeSpec {
    pub sec: i64,
    pub nsec: i64,
}

impl TimeSpec {
    pub const ZERO: TimeSpec = TimeSpec { sec: 0, nsec: 0 };

    pub fn new(sec: i64, nsec: i64) -> Self {
        Self { sec, nsec }
    }
}

impl WireFormat for TimeSpec {
    fn encode(&self, w: &mut WireWriter) {
        w.put_i64(self.sec);
        w.put_i64(self.nsec);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, ChannelError> {
        Ok(TimeSpec {
            sec: r.i64()?,
            nsec: r.i64()?,
        })
    }
}

/// Overlay primitive queued by the controller's scripting layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayShape {
    Text {
        x: i32,
        y: i32,
        text: String,
        color: u32,
    },
    Pixel {
        x: i32,
        y: i32,
        color: u32,
    },
    Rect {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        thickness: i32,
        color: u32,
        filled: bool,
    },
    Line {
        x0: i32,
        y0: i32,
        x1: i32,
        y1: i32,
        color: u32,
    },
    Ellipse {
        center_x: i32,
        center_y: i32,
        radius_x: i32,
        radius_y: i32,
        color: u32,
    },
}

impl OverlayShape {
    fn tag(&self) -> i32 {
        match self {
            OverlayShape::Text { .. } => controller_tag::LUA_TEXT,
            OverlayShape::Pixel { .. } => controller_tag::LUA_PIXEL,
            OverlayShape::Rect { .. } => controller_tag::LUA_RECT,
            OverlayShape::Line { .. } => controller_tag::LUA_LINE,
            OverlayShape::Ellipse { .. } => controller_tag::LUA_ELLIPSE,
        }
    }

    fn encode_payload(&self, w: &mut WireWriter) {
        match self {
            OverlayShape::Text { x, y, text, color } => {
                w.put_i32(*x);
                w.put_i32(*y);
                w.put_str(text);
                w.put_u32(*color);
            }
            OverlayShape::Pixel { x, y, color } => {
                w.put_i32(*x);
                w.put_i32(*y);
                w.put_u32(*color);
            }
            OverlayShape::Rect {
                x,
                y,
                width,
                height,
                thickness,
                color,
                filled,
            } => {
                w.put_i32(*x);
                w.put_i32(*y);
                w.put_i32(*width);
                w.put_i32(*height);
                w.put_i32(*thickness);
                w.put_u32(*color);
                w.put_i32(*filled as i32);
            }
            OverlayShape::Line {
                x0,
                y0,
                x1,
                y1,
                color,
            } => {
                w.put_i32(*x0);
                w.put_i32(*y0);
                w.put_i32(*x1);
                w.put_i32(*y1);
                w.put_u32(*color);
            }
            OverlayShape::Ellipse {
                center_x,
                center_y,
                radius_x,
                radius_y,
                color,
            } => {
                w.put_i32(*center_x);
                w.put_i32(*center_y);
                w.put_i32(*radius_x);
                w.put_i32(*radius_y);
                w.put_u32(*color);
            }
        }
    }

    fn decode_payload(tag: i32, r: &mut WireReader<'_>) -> Result<Self, ChannelError> {
        use controller_tag::*;
        let shape = match tag {
            LUA_TEXT => OverlayShape::Text {
                x: r.i32()?,
                y: r.i32()?,
                text: r.string()?,
                color: r.u32()?,
            },
            LUA_PIXEL => OverlayShape::Pixel {
                x: r.i32()?,
                y: r.i32()?,
                color: r.u32()?,
            },
            LUA_RECT => OverlayShape::Rect {
                x: r.i32()?,
                y: r.i32()?,
                width: r.i32()?,
                height: r.i32()?,
                thickness: r.i32()?,
                color: r.u32()?,
                filled: r.i32()? != 0,
            },
            LUA_LINE => OverlayShape::Line {
                x0: r.i32()?,
                y0: r.i32()?,
                x1: r.i32()?,
                y1: r.i32()?,
                color: r.u32()?,
            },
            LUA_ELLIPSE => OverlayShape::Ellipse {
                center_x: r.i32()?,
                center_y: r.i32()?,
                radius_x: r.i32()?,
                radius_y: r.i32()?,
                color: r.u32()?,
            },
            other => {
                return Err(ChannelError::Unexpected {
                    expected: "an overlay primitive",
                    found: format!("tag {}", other),
                })
            }
        };
        Ok(shape)
    }
}

/// Engine → controller.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineMessage {
    FrameCountTime {
        frame: u64,
        monotonic: TimeSpec,
        realtime: TimeSpec,
    },
    GameInfo(GameInfo),
    Fps {
        fps: f32,
        lfps: f32,
    },
    InvalidateSavestates,
    NondrawFrame,
    StartFrameBoundary,
    LoadingSucceeded,
    SavingSucceeded,
    /// Sentinel sent in place of `SavingSucceeded` when a save failed.
    CheckpointFailed,
    /// Primary window handle, 0 when the application has none.
    WindowId(u32),
    /// Capture dimensions, in reply to a resolution request.
    Resolution {
        width: i32,
        height: i32,
    },
    /// Human-readable text for the controller's UI.
    Alert(String),
}

impl EngineMessage {
    pub fn tag(&self) -> i32 {
        use engine_tag::*;
        match self {
            EngineMessage::FrameCountTime { .. } => FRAMECOUNT_TIME,
            EngineMessage::GameInfo(_) => GAMEINFO,
            EngineMessage::Fps { .. } => FPS,
            EngineMessage::InvalidateSavestates => INVALIDATE_SAVESTATES,
            EngineMessage::NondrawFrame => NONDRAW_FRAME,
            EngineMessage::StartFrameBoundary => START_FRAMEBOUNDARY,
            EngineMessage::LoadingSucceeded => LOADING_SUCCEEDED,
            EngineMessage::SavingSucceeded => SAVING_SUCCEEDED,
            EngineMessage::CheckpointFailed => CHECKPOINT_FAILED,
            EngineMessage::WindowId(_) => WINDOW_ID,
            EngineMessage::Resolution { .. } => LUA_RESOLUTION,
            EngineMessage::Alert(_) => ALERT_MSG,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = WireWriter::new();
        w.put_i32(self.tag());
        match self {
            EngineMessage::FrameCountTime {
                frame,
                monotonic,
                realtime,
            } => {
                w.put_u64(*frame);
                w.put(monotonic);
                w.put(realtime);
            }
            EngineMessage::GameInfo(info) => w.put(info),
            EngineMessage::Fps { fps, lfps } => {
                w.put_f32(*fps);
                w.put_f32(*lfps);
            }
            EngineMessage::WindowId(id) => w.put_u32(*id),
            EngineMessage::Resolution { width, height } => {
                w.put_i32(*width);
                w.put_i32(*height);
            }
            EngineMessage::Alert(text) => w.put_str(text),
            EngineMessage::InvalidateSavestates
            | EngineMessage::NondrawFrame
            | EngineMessage::StartFrameBoundary
            | EngineMessage::LoadingSucceeded
            | EngineMessage::SavingSucceeded
            | EngineMessage::CheckpointFailed => {}
        }
        w.into_bytes()
    }

    /// Decodes one message; this is the controller side of the connection.
    pub fn read_from(r: &mut WireReader<'_>) -> Result<Self, ChannelError> {
        use engine_tag::*;
        let tag = r.i32()?;
        let msg = match tag {
            FRAMECOUNT_TIME => EngineMessage::FrameCountTime {
                frame: r.u64()?,
                monotonic: r.get()?,
                realtime: r.get()?,
            },
            GAMEINFO => EngineMessage::GameInfo(r.get()?),
            FPS => EngineMessage::Fps {
                fps: r.f32()?,
                lfps: r.f32()?,
            },
            INVALIDATE_SAVESTATES => EngineMessage::InvalidateSavestates,
            NONDRAW_FRAME => EngineMessage::NondrawFrame,
            START_FRAMEBOUNDARY => EngineMessage::StartFrameBoundary,
            LOADING_SUCCEEDED => EngineMessage::LoadingSucceeded,
            SAVING_SUCCEEDED => EngineMessage::SavingSucceeded,
            CHECKPOINT_FAILED => EngineMessage::CheckpointFailed,
            WINDOW_ID => EngineMessage::WindowId(r.u32()?),
            LUA_RESOLUTION => EngineMessage::Resolution {
                width: r.i32()?,
                height: r.i32()?,
            },
            ALERT_MSG => EngineMessage::Alert(r.string()?),
            other => {
                return Err(ChannelError::Unexpected {
                    expected: "an engine message",
                    found: format!("tag {}", other),
                })
            }
        };
        Ok(msg)
    }
}

/// Controller → engine.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerMessage {
    /// Ends the blocking phase of the boundary.
    StartFrameBoundary,
    /// Ends the control phase of the boundary.
    EndFrameBoundary,
    RamWatch(String),
    ResolutionRequest,
    Draw(OverlayShape),
    Config(SharedConfig),
    AllInputs(InputSnapshot),
    PreviewInputs(InputSnapshot),
    SavestatePath(String),
    SavestateIndex(i32),
    Savestate,
    Loadstate,
    StopEncode,
    OsdMessage(String),
    Marker(String),
    UserQuit,
    DumpFile {
        path: String,
        options: String,
    },
    Screenshot(String),
    Expose,
    /// A tag this engine does not know. No payload was consumed.
    Unknown(i32),
}

impl ControllerMessage {
    pub fn tag(&self) -> i32 {
        use controller_tag::*;
        match self {
            ControllerMessage::StartFrameBoundary => START_FRAMEBOUNDARY,
            ControllerMessage::EndFrameBoundary => END_FRAMEBOUNDARY,
            ControllerMessage::RamWatch(_) => RAMWATCH,
            ControllerMessage::ResolutionRequest => LUA_RESOLUTION,
            ControllerMessage::Draw(shape) => shape.tag(),
            ControllerMessage::Config(_) => CONFIG,
            ControllerMessage::AllInputs(_) => ALL_INPUTS,
            ControllerMessage::PreviewInputs(_) => PREVIEW_INPUTS,
            ControllerMessage::SavestatePath(_) => SAVESTATE_PATH,
            ControllerMessage::SavestateIndex(_) => SAVESTATE_INDEX,
            ControllerMessage::Savestate => SAVESTATE,
            ControllerMessage::Loadstate => LOADSTATE,
            ControllerMessage::StopEncode => STOP_ENCODE,
            ControllerMessage::OsdMessage(_) => OSD_MSG,
            ControllerMessage::Marker(_) => MARKER,
            ControllerMessage::UserQuit => USERQUIT,
            ControllerMessage::DumpFile { .. } => DUMP_FILE,
            ControllerMessage::Screenshot(_) => SCREENSHOT,
            ControllerMessage::Expose => EXPOSE,
            ControllerMessage::Unknown(tag) => *tag,
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            ControllerMessage::StartFrameBoundary => "START_FRAMEBOUNDARY",
            ControllerMessage::EndFrameBoundary => "END_FRAMEBOUNDARY",
            ControllerMessage::RamWatch(_) => "RAMWATCH",
            ControllerMessage::ResolutionRequest => "LUA_RESOLUTION",
            ControllerMessage::Draw(_) => "LUA_DRAW",
            ControllerMessage::Config(_) => "CONFIG",
            ControllerMessage::AllInputs(_) => "ALL_INPUTS",
            ControllerMessage::PreviewInputs(_) => "PREVIEW_INPUTS",
            ControllerMessage::SavestatePath(_) => "SAVESTATE_PATH",
            ControllerMessage::SavestateIndex(_) => "SAVESTATE_INDEX",
            ControllerMessage::Savestate => "SAVESTATE",
            ControllerMessage::Loadstate => "LOADSTATE",
            ControllerMessage::StopEncode => "STOP_ENCODE",
            ControllerMessage::OsdMessage(_) => "OSD_MSG",
            ControllerMessage::Marker(_) => "MARKER",
            ControllerMessage::UserQuit => "USERQUIT",
            ControllerMessage::DumpFile { .. } => "DUMP_FILE",
            ControllerMessage::Screenshot(_) => "SCREENSHOT",
            ControllerMessage::Expose => "EXPOSE",
            ControllerMessage::Unknown(_) => "UNKNOWN",
        }
    }

    /// Encodes the message; this is the controller side of the connection.
    pub fn encode(&self) -> Vec<u8> {
        let mut w = WireWriter::new();
        w.put_i32(self.tag());
        match self {
            ControllerMessage::RamWatch(s)
            | ControllerMessage::SavestatePath(s)
            | ControllerMessage::OsdMessage(s)
            | ControllerMessage::Marker(s)
            | ControllerMessage::Screenshot(s) => w.put_str(s),
            ControllerMessage::Draw(shape) => shape.encode_payload(&mut w),
            ControllerMessage::Config(config) => w.put(config),
            ControllerMessage::AllInputs(inputs) | ControllerMessage::PreviewInputs(inputs) => {
                w.put(inputs)
            }
            ControllerMessage::SavestateIndex(slot) => w.put_i32(*slot),
            ControllerMessage::DumpFile { path, options } => {
                w.put_str(path);
                w.put_str(options);
            }
            ControllerMessage::StartFrameBoundary
            | ControllerMessage::EndFrameBoundary
            | ControllerMessage::ResolutionRequest
            | ControllerMessage::Savestate
            | ControllerMessage::Loadstate
            | ControllerMessage::StopEncode
            | ControllerMessage::UserQuit
            | ControllerMessage::Expose
            | ControllerMessage::Unknown(_) => {}
        }
        w.into_bytes()
    }

    /// Decodes the payload following an already-read `tag`.
    pub fn decode(tag: i32, r: &mut WireReader<'_>) -> Result<Self, ChannelError> {
        use controller_tag::*;
        let msg = match tag {
            START_FRAMEBOUNDARY => ControllerMessage::StartFrameBoundary,
            END_FRAMEBOUNDARY => ControllerMessage::EndFrameBoundary,
            RAMWATCH => ControllerMessage::RamWatch(r.string()?),
            LUA_RESOLUTION => ControllerMessage::ResolutionRequest,
            LUA_TEXT | LUA_PIXEL | LUA_RECT | LUA_LINE | LUA_ELLIPSE => {
                ControllerMessage::Draw(OverlayShape::decode_payload(tag, r)?)
            }
            CONFIG => ControllerMessage::Config(r.get()?),
            ALL_INPUTS => ControllerMessage::AllInputs(r.get()?),
            PREVIEW_INPUTS => ControllerMessage::PreviewInputs(r.get()?),
            SAVESTATE_PATH => ControllerMessage::SavestatePath(r.string()?),
            SAVESTATE_INDEX => ControllerMessage::SavestateIndex(r.i32()?),
            SAVESTATE => ControllerMessage::Savestate,
            LOADSTATE => ControllerMessage::Loadstate,
            STOP_ENCODE => ControllerMessage::StopEncode,
            OSD_MSG => ControllerMessage::OsdMessage(r.string()?),
            MARKER => ControllerMessage::Marker(r.string()?),
            USERQUIT => ControllerMessage::UserQuit,
            DUMP_FILE => ControllerMessage::DumpFile {
                path: r.string()?,
                options: r.string()?,
            },
            SCREENSHOT => ControllerMessage::Screenshot(r.string()?),
            EXPOSE => ControllerMessage::Expose,
            other => ControllerMessage::Unknown(other),
        };
        Ok(msg)
    }

    pub fn read_from(r: &mut WireReader<'_>) -> Result<Self, ChannelError> {
        let tag = r.i32()?;
        Self::decode(tag, r)
    }
}
