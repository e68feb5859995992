//! Strongly-typed register-VM scripting engine for data-driven game
//! behavior.
//!
//! The host declares script kinds (typed output/input tuples), registers
//! types, operations and tags against a shared [`global::ScriptGlobal`]
//! context, then compiles text scripts into immutable
//! [`container::Container`]s and executes them with short-lived workers
//! against live host data.

pub mod catalog;
pub mod compiler;
pub mod consts;
pub mod container;
pub mod error;
pub mod events;
pub mod global;
pub mod ops;
pub mod parser;
pub mod symbols;
pub mod tags;
pub mod types;
pub mod vm;

pub mod prelude {
    //! Re-exports of the host-facing surface.

    pub use crate::catalog::{Catalog, Overload, OverloadSpec, ProcDesc};
    pub use crate::compiler::{Operand, ParserWriter};
    pub use crate::consts::DEFAULT_INSTRUCTION_BUDGET;
    pub use crate::container::{Container, ContainerEvents};
    pub use crate::error::{CompileError, CompileErrorKind, ConfigError, RuntimeError};
    pub use crate::events::EventsParser;
    pub use crate::global::ScriptGlobal;
    pub use crate::ops;
    pub use crate::parser::{Mut, Parser, ParserCore, Ref, ScriptValue, TypedWorker};
    pub use crate::tags::{ScriptValues, Tag, Tagged};
    pub use crate::types::{compat, ArgFlags, ArgKind, TypeId};
    pub use crate::vm::{BlitWorker, Cursor, Flow, RegValue, Surface, Worker};
}
