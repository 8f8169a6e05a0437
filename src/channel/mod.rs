// src/channel/mod.rs

//! The single persistent connection to the controller process.
//!
//! Any thread may talk to the controller, so the connection sits behind a
//! mutex. [`MessageChannel::lock`] hands out a [`ChannelGuard`] that keeps the
//! connection for as long as it lives; the frame-boundary engine holds one for
//! the whole exchange of a frame, other threads take it just long enough to
//! send one message.

#[cfg(test)]
mod tests;

use crate::error::ChannelError;
use crate::protocol::wire::{WireReader, DEFAULT_MAX_STRING_LEN};
use crate::protocol::{ControllerMessage, EngineMessage};
use anyhow::Context;
use log::{debug, trace};
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use std::io::{self, Read, Write};
use std::os::fd::AsFd;
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Byte stream to the controller.
pub trait Transport: Read + Write + Send {
    /// Returns `true` if at least one byte can be read without blocking,
    /// or if the peer has hung up (the next read then reports it).
    fn poll_readable(&self) -> io::Result<bool>;
}

impl Transport for UnixStream {
    fn poll_readable(&self) -> io::Result<bool> {
        let mut fds = [PollFd::new(self.as_fd(), PollFlags::POLLIN)];
        let ready = poll(&mut fds, PollTimeout::ZERO).map_err(io::Error::from)?;
        if ready == 0 {
            return Ok(false);
        }
        let readable = PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR;
        Ok(fds[0].revents().is_some_and(|r| r.intersects(readable)))
    }
}

struct Connection {
    transport: Box<dyn Transport>,
    max_string_len: usize,
}

pub struct MessageChannel {
    conn: Mutex<Connection>,
}

impl MessageChannel {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self::with_string_limit(transport, DEFAULT_MAX_STRING_LEN)
    }

    pub fn with_string_limit(transport: Box<dyn Transport>, max_string_len: usize) -> Self {
        MessageChannel {
            conn: Mutex::new(Connection {
                transport,
                max_string_len,
            }),
        }
    }

    /// Connects to the controller's Unix socket.
    pub fn connect(path: &Path, max_string_len: usize) -> anyhow::Result<Self> {
        let stream = UnixStream::connect(path)
            .with_context(|| format!("Failed to connect to controller at {}", path.display()))?;
        debug!("MessageChannel: connected to {}", path.display());
        Ok(Self::with_string_limit(Box::new(stream), max_string_len))
    }

    /// Takes exclusive use of the connection. Blocks while another thread
    /// holds it.
    pub fn lock(&self) -> ChannelGuard<'_> {
        ChannelGuard {
            conn: self.conn.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Sends one message under a short-lived lock.
    pub fn send(&self, msg: &EngineMessage) -> Result<(), ChannelError> {
        self.lock().send(msg)
    }
}

pub struct ChannelGuard<'a> {
    conn: MutexGuard<'a, Connection>,
}

impl ChannelGuard<'_> {
    pub fn send(&mut self, msg: &EngineMessage) -> Result<(), ChannelError> {
        trace!("MessageChannel: -> {:?}", msg);
        let bytes = msg.encode();
        let transport = &mut self.conn.transport;
        transport.write_all(&bytes).map_err(ChannelError::from_io)?;
        transport.flush().map_err(ChannelError::from_io)
    }

    /// Waits for the next controller message.
    pub fn receive(&mut self) -> Result<ControllerMessage, ChannelError> {
        let conn = &mut *self.conn;
        let mut reader = WireReader::with_limit(&mut conn.transport, conn.max_string_len);
        let msg = ControllerMessage::read_from(&mut reader)?;
        trace!("MessageChannel: <- {}", msg.name());
        Ok(msg)
    }

    /// Returns `None` if no message has started arriving. Once the first byte
    /// is there, the rest of the message is read blocking.
    pub fn try_receive(&mut self) -> Result<Option<ControllerMessage>, ChannelError> {
        if !self.conn.transport.poll_readable()? {
            return Ok(None);
        }
        self.receive().map(Some)
    }
}
