//! Messages emitted by the generator

use serde::Serialize;

use crate::lifeline::LifelineId;
use crate::thread::ThreadId;

/// Index of a message in generation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MessageId(pub usize);

/// Place of a broadcast sub-message among its siblings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BroadcastPosition {
    First,
    Other,
    Last,
}

impl BroadcastPosition {
    pub fn of(index: usize, count: usize) -> Self {
        if index == 0 {
            BroadcastPosition::First
        } else if index + 1 == count {
            BroadcastPosition::Last
        } else {
            BroadcastPosition::Other
        }
    }
}

/// Message kind with its kind-specific payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MessageKind {
    /// Ordinary call
    Forward,
    /// Call that brings the callee to life
    Constructor,
    /// Call of a participant to itself
    SelfCall,
    /// Action without callee
    Primitive,
    /// Call without caller that starts a thread
    Spawn,
    /// One branch of a fan-out
    Broadcast {
        position: BroadcastPosition,
        /// Root lifelines of all receivers of the broadcast
        receivers: Vec<LifelineId>,
    },
    /// Return arrow of a call
    Answer {
        call: MessageId,
        /// Closed because a later line addressed an older activation
        implicit: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub id: MessageId,
    pub kind: MessageKind,
    /// Sending activation (`None` for spawns from `$`)
    pub caller: Option<LifelineId>,
    /// Receiving activation (`None` for primitives)
    pub callee: Option<LifelineId>,
    pub thread: ThreadId,
    pub text: String,
    /// Vertical position of the arrow
    pub y: f64,
    pub spawns: bool,
    pub destroys: bool,
    pub returns_instantly: bool,
    /// Source position of the originating record
    pub position: Option<usize>,
}

impl Message {
    pub fn is_answer(&self) -> bool {
        matches!(self.kind, MessageKind::Answer { .. })
    }

    pub fn is_implicit_answer(&self) -> bool {
        matches!(self.kind, MessageKind::Answer { implicit: true, .. })
    }

    /// The call answered by this message
    pub fn answered_call(&self) -> Option<MessageId> {
        match self.kind {
            MessageKind::Answer { call, .. } => Some(call),
            _ => None,
        }
    }
}
