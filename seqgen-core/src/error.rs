//! Error taxonomy of a generation attempt

/// A generation error, tagged with the kind and the offending source position
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerateError {
    #[error("Error at position {position}: object not found: {name}")]
    NotFound { name: String, position: usize },

    #[error("Error at position {position}: {rule}")]
    Semantic { rule: SemanticRule, position: usize },

    #[error("Internal error: {0}")]
    Structural(#[from] StructuralError),
}

impl GenerateError {
    pub fn semantic(rule: SemanticRule, position: usize) -> Self {
        GenerateError::Semantic { rule, position }
    }

    /// Source position to underline; structural errors have none
    pub fn position(&self) -> Option<usize> {
        match self {
            GenerateError::NotFound { position, .. } | GenerateError::Semantic { position, .. } => {
                Some(*position)
            }
            GenerateError::Structural(_) => None,
        }
    }

    pub fn is_structural(&self) -> bool {
        matches!(self, GenerateError::Structural(_))
    }
}

/// User-facing semantic rule violations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SemanticRule {
    #[error("{0} is always active and cannot send messages to itself")]
    ActorSelfMessage(String),
    #[error("an answer cannot be given to the always active object {0}")]
    AnswerToAlwaysActive(String),
    #[error("the always active object {0} cannot give an answer")]
    AnswerFromAlwaysActive(String),
    #[error("a message that spawns a thread cannot have an answer")]
    AnswerOnSpawn,
    #[error("{0} has already been created")]
    AlreadyCreated(String),
    #[error("{0} has not been created yet")]
    NotAlive(String),
    #[error("{0} is active and cannot be destroyed")]
    DestroyActive(String),
    #[error("a broadcast needs at least two receivers")]
    BroadcastTooFewCallees,
    #[error("{0} cannot be a receiver of its own broadcast")]
    BroadcastToCaller(String),
    #[error("{0} appears more than once among the receivers")]
    BroadcastRepeatedCallee(String),
    #[error("a broadcast cannot have an answer")]
    AnswerOnBroadcast,
    #[error("{0} is only legal when multi-threading is enabled")]
    MultiThreadOnly(&'static str),
    #[error("\"$\" can only be used as the caller of a spawning message")]
    NoCallerWithoutSpawn,
    #[error("{0} is active on several threads; a thread number is required")]
    ThreadAmbiguous(String),
    #[error("thread {0} does not exist")]
    NoSuchThread(u32),
    #[error("thread {0} has been stopped")]
    ThreadDead(i32),
    #[error("{0} is not active")]
    NotActive(String),
    #[error("mnemonic {0} is not defined")]
    UnknownMnemonic(String),
    #[error("mnemonic {0} is already in use")]
    MnemonicInUse(String),
    #[error("mnemonic {mnemonic} does not belong to {name}")]
    MnemonicMismatch { mnemonic: String, name: String },
    #[error("an explicit answer to {0} is required first")]
    ExplicitAnswerRequired(String),
    #[error("nothing to return: no call to {callee} from {caller} is pending")]
    ReturnMismatch { caller: String, callee: String },
    #[error("a return needs exactly one receiver")]
    ReturnWithoutCallee,
    #[error("object {0} is declared twice")]
    DuplicateObject(String),
    #[error("objects must be declared before the first message")]
    ObjectAfterMessages,
}

/// Violations of internal invariants: defects, not user errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructuralError {
    #[error("cannot dispose root lifeline {name} (#{id})")]
    DisposeRoot { name: String, id: usize },
    #[error("cannot dispose active lifeline {name} (#{id}) on thread {thread}")]
    DisposeActive { name: String, id: usize, thread: i32 },
    #[error("lifeline {name} (#{id}) has no activation chain on its side")]
    BrokenChain { name: String, id: usize },
    #[error("thread {0} has no stack")]
    MissingThread(i32),
    #[error("layout requested before generation finished")]
    NotFinished,
    #[error("generation has already finished")]
    AlreadyFinished,
    #[error("cannot number thread {0}: too many threads")]
    TooManyThreads(usize),
}
