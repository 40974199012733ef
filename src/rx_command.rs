//! Queue of pending receive commands
//!
//! Each call to activate an RX stream appends one command. Reads always
//! serve the command at the head: a finite command is consumed by the samples
//! it receives and popped once exhausted, a continuous one (zero elements)
//! stays at the head until the stream is deactivated.

use std::collections::VecDeque;

use crate::StreamFlags;

/// A pending receive request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxCommand {
    /// Only [`StreamFlags::HAS_TIME`] is meaningful
    pub flags: StreamFlags,
    /// Start time when `HAS_TIME` is set
    pub time_ns: i64,
    /// Samples still to receive, 0 for continuous
    pub num_elems: usize,
}

impl RxCommand {
    pub fn is_continuous(&self) -> bool {
        self.num_elems == 0
    }
}

/// What the next device receive should do for the head command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxRequest {
    /// Absolute start time, `None` to receive now
    pub time_ns: Option<i64>,
    /// Samples per channel to ask for
    pub num_elems: usize,
}

#[derive(Debug, Default)]
pub struct RxCommandQueue {
    cmds: VecDeque<RxCommand>,
}

impl RxCommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cmds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cmds.is_empty()
    }

    pub fn front(&self) -> Option<&RxCommand> {
        self.cmds.front()
    }

    /// Append a command. Returns `false` if a continuous command is already
    /// queued, since nothing behind it could ever be served.
    pub fn push(&mut self, cmd: RxCommand) -> bool {
        if self.cmds.iter().any(RxCommand::is_continuous) {
            tracing::warn!(
                "ignoring RX command {:?} queued behind a continuous command",
                cmd
            );
            return false;
        }
        self.cmds.push_back(cmd);
        true
    }

    /// Drop every pending command, including a partially served one
    pub fn clear(&mut self) {
        self.cmds.clear();
    }

    /// Plan the next receive against the head command.
    ///
    /// The head's time flag is cleared, so only the first receive of a
    /// command is timed. Returns `None` when the queue is empty.
    pub fn begin(&mut self, requested: usize) -> Option<RxRequest> {
        let cmd = self.cmds.front_mut()?;
        let time_ns = cmd
            .flags
            .contains(StreamFlags::HAS_TIME)
            .then_some(cmd.time_ns);
        let num_elems = if cmd.is_continuous() {
            requested
        } else {
            requested.min(cmd.num_elems)
        };
        cmd.flags = StreamFlags::empty();
        Some(RxRequest { time_ns, num_elems })
    }

    /// Account for `received` samples delivered against the head command
    pub fn complete(&mut self, received: usize) {
        let Some(cmd) = self.cmds.front_mut() else {
            return;
        };
        if cmd.is_continuous() {
            return;
        }
        cmd.num_elems = cmd.num_elems.saturating_sub(received);
        if cmd.num_elems == 0 {
            self.cmds.pop_front();
        }
    }

    /// Abandon the head command after a device failure.
    ///
    /// Finite commands are dropped; a continuous command survives so the
    /// stream keeps running. Returns `true` if a command was dropped.
    pub fn abort(&mut self) -> bool {
        match self.cmds.front() {
            Some(cmd) if !cmd.is_continuous() => {
                self.cmds.pop_front();
                true
            }
            _ => false,
        }
    }
}
