//! Diagram orchestration
//!
//! A [`Diagram`] owns everything one generation attempt touches: the
//! lifeline registry, the thread stacks, the emitted messages, the vertical
//! cursor and the source map. Generation runs in two phases: object records
//! create root lifelines, then message records are handed to the resolver in
//! order. Structural markers (notes, fragments) only reserve vertical space
//! through a [`StructureHook`].

use std::collections::HashMap;
use std::fmt;

use crate::axis::{self, Layout};
use crate::config::Config;
use crate::error::{GenerateError, SemanticRule, StructuralError};
use crate::lifeline::{Lifeline, LifelineId, Lifelines};
use crate::message::{Message, MessageId};
use crate::processor::MessageProcessor;
use crate::record::{Marker, MessageRecord, ObjectRecord, Record};
use crate::source_map::{Drawable, SourceMap};
use crate::thread::{ThreadId, Threads};

/// Generation phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Reading object declarations
    Declaring,
    /// Reading messages
    Processing,
    /// All answers sent, all lifelines closed
    Finished,
}

/// Structural marker with the vertical space it was given
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedMarker {
    pub marker: Marker,
    pub y: f64,
    pub height: f64,
    pub position: usize,
}

/// Bookkeeping of notes and fragments, owned by an outside collaborator
pub trait StructureHook {
    /// Called for every structural marker; returns the vertical space it takes
    fn place(&mut self, marker: &Marker, y: f64, config: &Config) -> f64 {
        let _ = (marker, y);
        config.marker_height
    }
}

/// Hook that only reserves `marker_height` per marker
#[derive(Debug, Clone, Copy, Default)]
pub struct ReserveSpace;

impl StructureHook for ReserveSpace {}

/// Result of processing one message record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    /// Messages produced for the record, in order
    pub messages: Vec<MessageId>,
    /// Answers sent because the record addressed an older activation
    pub implicit_returns: Vec<MessageId>,
}

/// Generation state and, once finished, the generated model
#[derive(Debug, Clone)]
pub struct Diagram {
    pub(crate) config: Config,
    pub(crate) lifelines: Lifelines,
    pub(crate) threads: Threads,
    pub(crate) messages: Vec<Message>,
    pub(crate) mnemonics: HashMap<String, LifelineId>,
    pub(crate) markers: Vec<PlacedMarker>,
    pub(crate) source_map: SourceMap,
    pub(crate) cursor: f64,
    pub(crate) current_thread: ThreadId,
    pub(crate) phase: Phase,
}

impl Diagram {
    pub fn new(config: Config) -> Self {
        let cursor = config.head_height;
        Self {
            config,
            lifelines: Lifelines::new(),
            threads: Threads::new(),
            messages: Vec::new(),
            mnemonics: HashMap::new(),
            markers: Vec::new(),
            source_map: SourceMap::new(),
            cursor,
            current_thread: ThreadId::MAIN,
            phase: Phase::Declaring,
        }
    }

    /// Create the root lifeline of a declared object
    pub fn declare(&mut self, record: &ObjectRecord) -> Result<LifelineId, GenerateError> {
        let position = record.position;
        if self.phase != Phase::Declaring {
            return Err(GenerateError::semantic(
                SemanticRule::ObjectAfterMessages,
                position,
            ));
        }
        if self.lifelines.contains(&record.name) {
            return Err(GenerateError::semantic(
                SemanticRule::DuplicateObject(record.name.clone()),
                position,
            ));
        }
        if !self.config.multi_thread {
            if record.flags.has_thread {
                return Err(GenerateError::semantic(
                    SemanticRule::MultiThreadOnly("objects with their own thread"),
                    position,
                ));
            }
            if record.flags.active_object {
                return Err(GenerateError::semantic(
                    SemanticRule::MultiThreadOnly("active objects"),
                    position,
                ));
            }
        }

        let id = self.lifelines.create(record);
        self.source_map.insert(position, Drawable::Lifeline(id));

        let lifeline = self.lifelines.get(id);
        if lifeline.has_thread && lifeline.alive && !lifeline.always_active {
            let thread = self.threads.spawn()?;
            self.lifelines.get_mut(id).thread = thread;
            self.lifelines.set_active(id, true, 0.0);
            if let Some(t) = self.threads.get_mut(thread) {
                t.start(id);
            }
        }
        tracing::debug!(name = %record.name, type_name = %record.type_name, "declared object");
        Ok(id)
    }

    /// Leave the declaration phase
    pub fn end_declarations(&mut self) {
        if self.phase == Phase::Declaring {
            self.phase = Phase::Processing;
        }
    }

    /// Resolve and execute one message record
    pub fn process(&mut self, record: &MessageRecord) -> Result<Outcome, GenerateError> {
        if self.phase == Phase::Finished {
            return Err(StructuralError::AlreadyFinished.into());
        }
        self.end_declarations();
        MessageProcessor::new(self, record).process()
    }

    /// Hand a structural marker to `hook` and reserve the space it asks for
    pub fn place_marker(&mut self, marker: &Marker, position: usize, hook: &mut dyn StructureHook) {
        let height = hook.place(marker, self.cursor, &self.config).max(0.0);
        let index = self.markers.len();
        self.markers.push(PlacedMarker {
            marker: marker.clone(),
            y: self.cursor,
            height,
            position,
        });
        self.cursor += height;
        self.source_map.insert(position, Drawable::Marker(index));
    }

    /// Answer everything still pending and close all lifelines
    pub fn finish(&mut self) -> Result<(), GenerateError> {
        if self.phase == Phase::Finished {
            return Ok(());
        }
        self.end_declarations();
        self.close_all()?;
        self.phase = Phase::Finished;
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn lifelines(&self) -> &Lifelines {
        &self.lifelines
    }

    pub fn lifeline(&self, id: LifelineId) -> &Lifeline {
        self.lifelines.get(id)
    }

    /// Root lifeline of the participant called `name`
    pub fn lifeline_by_name(&self, name: &str) -> Option<&Lifeline> {
        self.lifelines.root(name).map(|id| self.lifelines.get(id))
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message(&self, id: MessageId) -> &Message {
        &self.messages[id.0]
    }

    pub fn threads(&self) -> &Threads {
        &self.threads
    }

    pub fn current_thread(&self) -> ThreadId {
        self.current_thread
    }

    pub fn markers(&self) -> &[PlacedMarker] {
        &self.markers
    }

    pub fn source_map(&self) -> &SourceMap {
        &self.source_map
    }

    /// Current vertical position
    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    /// Horizontal placement of everything; only available once finished
    pub fn layout(&self) -> Result<Layout, StructuralError> {
        if !self.is_finished() {
            return Err(StructuralError::NotFinished);
        }
        Ok(axis::compute(self))
    }

    /// Human-readable state, used when an internal invariant breaks
    pub fn dump(&self) -> String {
        DiagramDump(self).to_string()
    }

    /// Move the cursor down by one row and return the new position
    pub(crate) fn advance(&mut self) -> f64 {
        self.extend(self.config.row_height)
    }

    pub(crate) fn extend(&mut self, amount: f64) -> f64 {
        self.cursor += amount;
        self.cursor
    }

    pub(crate) fn push_message(&mut self, mut message: Message) -> MessageId {
        let id = MessageId(self.messages.len());
        message.id = id;
        if let Some(position) = message.position {
            self.source_map.insert(position, Drawable::Message(id));
        }
        self.messages.push(message);
        id
    }

    fn run(&mut self, records: &[Record], hook: &mut dyn StructureHook) -> Result<(), GenerateError> {
        for record in records {
            match record {
                Record::Object(object) => {
                    self.declare(object)?;
                }
                Record::EndOfObjects => self.end_declarations(),
                Record::Message(message) => {
                    self.process(message)?;
                }
                Record::Marker { marker, position } => self.place_marker(marker, *position, hook),
            }
        }
        self.finish()
    }
}

/// A failed generation attempt with everything built before the failure
#[derive(Debug, Clone, thiserror::Error)]
#[error("{error}")]
pub struct GenerationFailure {
    pub error: GenerateError,
    /// Partial model, useful for best-effort rendering
    pub partial: Box<Diagram>,
}

/// Generate a diagram from `records`
pub fn generate(records: &[Record], config: &Config) -> Result<Diagram, GenerationFailure> {
    generate_with(records, config, &mut ReserveSpace)
}

/// Generate a diagram, handing structural markers to `hook`
pub fn generate_with(
    records: &[Record],
    config: &Config,
    hook: &mut dyn StructureHook,
) -> Result<Diagram, GenerationFailure> {
    let mut diagram = Diagram::new(config.clone());
    match diagram.run(records, hook) {
        Ok(()) => {
            tracing::debug!(
                lifelines = diagram.lifelines.len(),
                messages = diagram.messages.len(),
                "generation finished"
            );
            Ok(diagram)
        }
        Err(error) => {
            if error.is_structural() {
                tracing::error!(%error, dump = %diagram.dump(), "internal generation error");
            } else {
                tracing::debug!(%error, "generation failed");
            }
            Err(GenerationFailure {
                error,
                partial: Box::new(diagram),
            })
        }
    }
}

struct DiagramDump<'a>(&'a Diagram);

impl fmt::Display for DiagramDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let diagram = self.0;
        writeln!(
            f,
            "phase {:?}, cursor {}, current thread {}",
            diagram.phase, diagram.cursor, diagram.current_thread
        )?;
        writeln!(f, "lifelines:")?;
        for node in diagram.lifelines.iter() {
            writeln!(
                f,
                "  #{} {} root=#{} parent={:?} left={:?} right={:?} {:?}/{} thread={} alive={} active={} waiting={} disposed={}",
                node.id.0,
                node.name,
                node.root.0,
                node.parent.map(|p| p.0),
                node.left_child.map(|c| c.0),
                node.right_child.map(|c| c.0),
                node.direction,
                node.depth,
                node.thread,
                node.alive,
                node.active,
                node.waiting,
                node.disposed,
            )?;
        }
        writeln!(f, "threads:")?;
        for thread in diagram.threads.iter() {
            writeln!(
                f,
                "  {} {:?} first={:?}",
                thread.id,
                thread.status,
                thread.first_caller.map(|c| c.0)
            )?;
            for answer in thread.pending() {
                writeln!(
                    f,
                    "    answer to call {}: #{} -> #{}",
                    answer.call.0, answer.callee.0, answer.caller.0
                )?;
            }
        }
        Ok(())
    }
}
