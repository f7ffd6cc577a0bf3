//! Input records consumed by the generator
//!
//! Records are produced by an external parser (or by [`crate::notation`]) and
//! are never mutated by the engine.

/// Caller name that stands for "no caller" in spawning messages
pub const NO_CALLER: &str = "$";

/// Primitive message text that terminates the current thread
pub const STOP: &str = "stop";

/// Flags attached to an object declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectFlags {
    /// The object exists from the top of the diagram (otherwise it must be constructed)
    pub alive_from_start: bool,
    /// Rendered without a name
    pub anonymous: bool,
    /// Rendered as a role
    pub role: bool,
    /// Every incoming call runs on a thread of its own
    pub active_object: bool,
    /// Actor or passive process: never nests, never waits
    pub always_active: bool,
    /// Starts a thread of its own once alive
    pub has_thread: bool,
    /// Marked with a destruction cross when the diagram ends
    pub autodestroy: bool,
    /// Lives outside the modeled system
    pub external: bool,
}

impl Default for ObjectFlags {
    fn default() -> Self {
        Self {
            alive_from_start: true,
            anonymous: false,
            role: false,
            active_object: false,
            always_active: false,
            has_thread: false,
            autodestroy: false,
            external: false,
        }
    }
}

/// Object declaration
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRecord {
    /// Unique name, used by message records
    pub name: String,
    /// Declared type
    pub type_name: String,
    /// Display label (falls back to the name)
    pub label: Option<String>,
    pub flags: ObjectFlags,
    /// Source position sampled when the record was read
    pub position: usize,
}

impl ObjectRecord {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            label: None,
            flags: ObjectFlags::default(),
            position: 0,
        }
    }

    pub fn with_flags(mut self, flags: ObjectFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn at(mut self, position: usize) -> Self {
        self.position = position;
        self
    }

    /// Actors are always active, whatever their flags say
    pub fn is_always_active(&self) -> bool {
        self.flags.always_active || self.type_name == "Actor"
    }
}

/// Message line
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MessageRecord {
    /// Caller name, or [`NO_CALLER`]
    pub caller: String,
    /// Callee names: none for a primitive, several for a broadcast
    pub callees: Vec<String>,
    /// Message text
    pub text: String,
    /// Explicit thread number
    pub thread: Option<u32>,
    /// Mnemonic naming the caller's activation
    pub caller_mnemonic: Option<String>,
    /// Mnemonic to attach to the callee's activation
    pub callee_mnemonic: Option<String>,
    /// Nesting level of the caller (0 = the most recent activation)
    pub level: usize,
    /// Label for the return arrow
    pub answer: Option<String>,
    /// Constructor call
    pub is_new: bool,
    /// Starts a new thread for the callee
    pub spawns: bool,
    /// Destroys the callee
    pub destroys: bool,
    /// The callee answers immediately
    pub returns_instantly: bool,
    /// Explicit return from the caller to the callee
    pub returning: bool,
    /// Fan-out to several callees
    pub broadcast: bool,
    pub position: usize,
}

impl MessageRecord {
    /// Ordinary call `caller:callee.text`
    pub fn call(caller: &str, callee: &str, text: &str) -> Self {
        Self {
            caller: caller.to_string(),
            callees: vec![callee.to_string()],
            text: text.to_string(),
            ..Self::default()
        }
    }

    /// Action without callee
    pub fn primitive(caller: &str, text: &str) -> Self {
        Self {
            caller: caller.to_string(),
            text: text.to_string(),
            ..Self::default()
        }
    }

    /// Fan-out `caller:a,b.text`
    pub fn broadcast(caller: &str, callees: &[&str], text: &str) -> Self {
        Self {
            caller: caller.to_string(),
            callees: callees.iter().map(|c| c.to_string()).collect(),
            text: text.to_string(),
            broadcast: true,
            ..Self::default()
        }
    }

    pub fn at(mut self, position: usize) -> Self {
        self.position = position;
        self
    }

    pub fn has_no_caller(&self) -> bool {
        self.caller == NO_CALLER
    }

    pub fn callee(&self) -> Option<&str> {
        self.callees.first().map(String::as_str)
    }

    pub fn is_primitive(&self) -> bool {
        self.callees.is_empty()
    }

    pub fn is_stop(&self) -> bool {
        self.is_primitive() && self.text.trim() == STOP
    }
}

/// Structural marker owned by the fragment/note collaborators
#[derive(Debug, Clone, PartialEq)]
pub enum Marker {
    /// Fragment start (`[c label]`)
    FragmentStart { label: String },
    /// Section separator inside a fragment (`--`)
    Section { label: String },
    /// Fragment end (`[/c]`)
    FragmentEnd,
    /// Note text
    Note { text: String },
}

/// One input record
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Object(ObjectRecord),
    /// Terminates the object section
    EndOfObjects,
    Message(MessageRecord),
    Marker { marker: Marker, position: usize },
}

impl Record {
    pub fn position(&self) -> Option<usize> {
        match self {
            Record::Object(o) => Some(o.position),
            Record::Message(m) => Some(m.position),
            Record::Marker { position, .. } => Some(*position),
            Record::EndOfObjects => None,
        }
    }
}
