//! Per-parser symbol table
//!
//! Holds everything a script kind exposes to the compiler: type-name
//! bindings, the declared output and input registers with their fixed
//! offsets, and named constants. The table is frozen before any parse;
//! block-scoped locals live in the writer, not here.

use std::collections::HashMap;

use crate::consts::*;
use crate::error::ConfigError;
use crate::types::{ArgKind, TypeId};

/// A declared register with its allocated offset.
#[derive(Debug, Clone)]
pub struct RegisterDecl {
    /// Script-visible name.
    pub name: String,
    /// Shape of the value stored at the offset.
    pub kind: ArgKind,
    /// Byte offset into the register file.
    pub offset: u16,
    /// Size of the stored value, in bytes.
    pub size: u16,
}

/// Whether `name` fits the script identifier grammar (dots allowed for
/// namespaced constants).
fn valid_name(name: &str) -> bool {
    let mut chars = name.chars();

    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Frozen symbol table of one parser instance.
#[derive(Debug, Default)]
pub struct SymbolTable {
    types: HashMap<String, TypeId>,
    consts: HashMap<String, i64>,
    outputs: Vec<RegisterDecl>,
    inputs: Vec<RegisterDecl>,
    reg_top: u16,
}

impl SymbolTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Bind a registered type's engine identity to a script-visible name.
    pub(crate) fn bind_type(&mut self, name: &str, id: TypeId) -> Result<(), ConfigError> {
        if !valid_name(name) {
            return Err(ConfigError::InvalidName(name.to_string()));
        }

        if self.types.contains_key(name) {
            return Err(ConfigError::DuplicateDeclaration(name.to_string()));
        }

        self.types.insert(name.to_string(), id);

        Ok(())
    }

    /// Add a named integer constant.
    pub(crate) fn add_const(&mut self, name: &str, value: i64) -> Result<(), ConfigError> {
        if !valid_name(name) {
            return Err(ConfigError::InvalidName(name.to_string()));
        }

        if self.consts.contains_key(name) {
            return Err(ConfigError::DuplicateDeclaration(name.to_string()));
        }

        self.consts.insert(name.to_string(), value);

        Ok(())
    }

    /// Declare the next output register. Outputs occupy the bottom of the
    /// register file, in declaration order.
    pub(crate) fn declare_output(
        &mut self,
        name: &str,
        kind: ArgKind,
        size: usize,
    ) -> Result<u16, ConfigError> {
        if !self.inputs.is_empty() {
            // Layout is outputs-then-inputs; mixed declaration is a host bug.
            return Err(ConfigError::DuplicateDeclaration(name.to_string()));
        }

        if self.outputs.len() == VM_OUTPUT_REGISTERS_MAX {
            return Err(ConfigError::TooManyOutputs(self.outputs.len() + 1));
        }

        let offset = self.alloc(name, size)?;
        self.outputs.push(RegisterDecl {
            name: name.to_string(),
            kind,
            offset,
            size: size as u16,
        });

        Ok(offset)
    }

    /// Declare the next input register, after all outputs.
    pub(crate) fn declare_input(
        &mut self,
        name: &str,
        kind: ArgKind,
        size: usize,
    ) -> Result<u16, ConfigError> {
        let offset = self.alloc(name, size)?;
        self.inputs.push(RegisterDecl {
            name: name.to_string(),
            kind,
            offset,
            size: size as u16,
        });

        Ok(offset)
    }

    fn alloc(&mut self, name: &str, size: usize) -> Result<u16, ConfigError> {
        if !valid_name(name) {
            return Err(ConfigError::InvalidName(name.to_string()));
        }

        if self.find_register(name).is_some() {
            return Err(ConfigError::DuplicateDeclaration(name.to_string()));
        }

        let offset = self.reg_top;
        let top = offset as usize + size;

        if top > VM_REGISTER_FILE_SIZE {
            return Err(ConfigError::RegisterFileOverflow(name.to_string()));
        }

        self.reg_top = top as u16;

        Ok(offset)
    }

    /// Find a declared register by name, outputs first.
    pub fn find_register(&self, name: &str) -> Option<&RegisterDecl> {
        self.outputs
            .iter()
            .chain(self.inputs.iter())
            .find(|decl| decl.name == name)
    }

    /// Value of a named constant, if declared.
    pub fn const_value(&self, name: &str) -> Option<i64> {
        self.consts.get(name).copied()
    }

    /// Engine identity bound to a script-visible type name.
    pub fn type_by_name(&self, name: &str) -> Option<TypeId> {
        self.types.get(name).copied()
    }

    /// Declared output registers, in order.
    pub fn outputs(&self) -> &[RegisterDecl] {
        &self.outputs
    }

    /// Declared input registers, in order.
    pub fn inputs(&self) -> &[RegisterDecl] {
        &self.inputs
    }

    /// First free byte after the declared registers; locals allocate from
    /// here.
    pub const fn reg_top(&self) -> u16 {
        self.reg_top
    }

    /// Byte span of the input region, for the event-chain input reset.
    pub fn input_span(&self) -> (u16, u16) {
        let start = self
            .inputs
            .first()
            .map(|decl| decl.offset)
            .unwrap_or(self.reg_top);

        (start, self.reg_top)
    }
}
