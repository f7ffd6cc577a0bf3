//! Modeled threads: independent call stacks of pending answers

use std::fmt;

use serde::Serialize;

use crate::error::StructuralError;
use crate::lifeline::LifelineId;
use crate::message::MessageId;

/// Thread number. Not an OS thread, just the name of a call stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ThreadId(pub i32);

impl ThreadId {
    /// The implicit thread of single-threaded diagrams
    pub const MAIN: ThreadId = ThreadId(0);
    /// Reserved thread of always active callers; it never has a stack
    pub const ACTOR: ThreadId = ThreadId(-1);

    fn index(self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }

    /// Thread numbered `index`, if it fits the thread number range
    pub fn from_index(index: usize) -> Option<ThreadId> {
        i32::try_from(index).ok().map(ThreadId)
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A call waiting for its return
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    /// The call this answer belongs to
    pub call: MessageId,
    /// Activation that made the call and receives the answer
    pub caller: LifelineId,
    /// Activation that was called and sends the answer
    pub callee: LifelineId,
    pub thread: ThreadId,
    /// Label of the return arrow
    pub label: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ThreadStatus {
    New,
    Running,
    Dead,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Thread {
    pub id: ThreadId,
    stack: Vec<Answer>,
    /// Activation that started the thread
    pub first_caller: Option<LifelineId>,
    pub status: ThreadStatus,
}

impl Thread {
    fn new(id: ThreadId) -> Self {
        Self {
            id,
            stack: Vec::new(),
            first_caller: None,
            status: ThreadStatus::New,
        }
    }

    pub fn push(&mut self, answer: Answer) {
        self.stack.push(answer);
    }

    pub fn pop(&mut self) -> Option<Answer> {
        self.stack.pop()
    }

    pub fn top(&self) -> Option<&Answer> {
        self.stack.last()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    /// Pending answers, most recent first
    pub fn pending(&self) -> impl Iterator<Item = &Answer> + '_ {
        self.stack.iter().rev()
    }

    /// Mark the thread as started by `activation`
    pub fn start(&mut self, activation: LifelineId) {
        self.first_caller = Some(activation);
        self.status = ThreadStatus::Running;
    }

    pub fn is_dead(&self) -> bool {
        self.status == ThreadStatus::Dead
    }
}

/// All threads of a diagram; thread 0 always exists
#[derive(Debug, Clone, PartialEq)]
pub struct Threads {
    threads: Vec<Thread>,
}

impl Default for Threads {
    fn default() -> Self {
        Self {
            threads: vec![Thread::new(ThreadId::MAIN)],
        }
    }
}

impl Threads {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh thread
    pub fn spawn(&mut self) -> Result<ThreadId, StructuralError> {
        let id = ThreadId::from_index(self.threads.len())
            .ok_or(StructuralError::TooManyThreads(self.threads.len()))?;
        self.threads.push(Thread::new(id));
        tracing::trace!(thread = %id, "spawned thread");
        Ok(id)
    }

    pub fn get(&self, id: ThreadId) -> Option<&Thread> {
        id.index().and_then(|i| self.threads.get(i))
    }

    pub fn get_mut(&mut self, id: ThreadId) -> Option<&mut Thread> {
        id.index().and_then(move |i| self.threads.get_mut(i))
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Thread> + '_ {
        self.threads.iter()
    }

    pub fn ids(&self) -> Vec<ThreadId> {
        self.threads.iter().map(|t| t.id).collect()
    }
}
