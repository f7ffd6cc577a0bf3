//! seqgen-core: sequence diagram generation engine
//!
//! Turns an ordered stream of object declarations and message lines into the
//! model of a UML sequence diagram: lifelines with nested activations, typed
//! call and return messages, and the horizontal axis of everything.
//!
//! # Example
//!
//! ```
//! use seqgen_core::{generate, read, Config};
//!
//! let input = "user:Actor\nshop:Shop\n\nuser:shop.buy()\nshop:shop.check()\n";
//!
//! let records = read(input).unwrap();
//! let diagram = generate(&records, &Config::default()).unwrap();
//! assert_eq!(diagram.messages().len(), 3);
//!
//! let layout = diagram.layout().unwrap();
//! assert!(layout.lifeline("shop").unwrap().axis > layout.lifeline("user").unwrap().axis);
//! ```
//!
//! # Multi-threading
//!
//! ```
//! use seqgen_core::{generate, read, Config};
//!
//! let input = "a:A\nb:B[v]\n\na:b.run()\n";
//! let config = Config::default().with_multi_thread(true);
//! let diagram = generate(&read(input).unwrap(), &config).unwrap();
//! assert!(diagram.messages()[0].spawns);
//! ```

pub mod axis;
pub mod config;
pub mod diagram;
pub mod error;
pub mod lifeline;
pub mod message;
pub mod notation;
mod processor;
pub mod record;
pub mod source_map;
pub mod thread;
pub mod worker;

pub use axis::{ActivationBox, Arrow, Layout, LifelineAxis};
pub use config::Config;
pub use diagram::{
    generate, generate_with, Diagram, GenerationFailure, Outcome, Phase, PlacedMarker,
    ReserveSpace, StructureHook,
};
pub use error::{GenerateError, SemanticRule, StructuralError};
pub use lifeline::{Direction, Lifeline, LifelineId, Lifelines, Segment};
pub use message::{BroadcastPosition, Message, MessageId, MessageKind};
pub use notation::{read, NotationError};
pub use record::{Marker, MessageRecord, ObjectFlags, ObjectRecord, Record};
pub use source_map::{Drawable, SourceMap};
pub use thread::{Answer, Thread, ThreadId, ThreadStatus, Threads};
pub use worker::GenerationWorker;
