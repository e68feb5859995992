//! Compiled script artifacts

use std::sync::Arc;

/// An immutable compiled bytecode artifact.
///
/// Owns its bytecode and records the id of the parser it was compiled
/// against; workers borrow both. A container is truthy iff it holds code,
/// and an empty container is the host's signal to skip execution.
/// Move-only.
#[derive(Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Container {
    code: Vec<u8>,
    parser_id: u32,
}

impl Container {
    pub(crate) fn new(code: Vec<u8>, parser_id: u32) -> Self {
        Self { code, parser_id }
    }

    /// An empty container for `parser_id`; executing it is a no-op.
    pub(crate) fn empty(parser_id: u32) -> Self {
        Self {
            code: Vec::new(),
            parser_id,
        }
    }

    /// Whether the container holds no code.
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// The compiled bytecode.
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// Id of the parser this container was compiled against.
    pub const fn parser_id(&self) -> u32 {
        self.parser_id
    }
}

/// The frozen before/after chains of an events parser, shared by every
/// events container produced against it.
#[derive(Debug, Default)]
pub struct EventGroup {
    pub(crate) before: Vec<Container>,
    pub(crate) after: Vec<Container>,
}

/// A main container coupled with its event chains.
#[derive(Debug)]
pub struct ContainerEvents {
    main: Container,
    group: Arc<EventGroup>,
}

impl ContainerEvents {
    pub(crate) fn new(main: Container, group: Arc<EventGroup>) -> Self {
        Self { main, group }
    }

    /// The main script container.
    pub fn main(&self) -> &Container {
        &self.main
    }

    /// Whether the main container holds no code.
    pub fn is_empty(&self) -> bool {
        self.main.is_empty()
    }

    pub(crate) fn before(&self) -> &[Container] {
        &self.group.before
    }

    pub(crate) fn after(&self) -> &[Container] {
        &self.group.after
    }
}
