//! Host type registry and the argument-kind lattice
//!
//! Every value a script can touch is described by an [`ArgKind`]: an opaque
//! base-type identity plus independent shape flags. Overload resolution is
//! driven entirely by the pairwise [`compat`] score between a declared kind
//! and a supplied kind.

use std::any;
use std::collections::HashMap;

use bitflags::bitflags;

use crate::consts::*;
use crate::error::ConfigError;

/// Opaque identity of a host type inside the engine.
pub type TypeId = u16;

/// Sentinel base for the absent value.
pub const TYPE_NULL: TypeId = 0;

/// Sentinel base for script integers.
pub const TYPE_INT: TypeId = 1;

/// Sentinel base for jump labels.
pub const TYPE_LABEL: TypeId = 2;

/// Sentinel base for string-literal name arguments.
pub const TYPE_TEXT: TypeId = 3;

const TYPE_FIRST_HOST: TypeId = 4;

bitflags! {
    /// Shape flags over a base type.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ArgFlags: u8 {
        /// The value lives in the register file.
        const REGISTER = 0x01;
        /// The value is a declared script-output register.
        const VAR = 0x02;
        /// The value is a pointer to host data.
        const PTR = 0x04;
        /// The pointer permits mutation of its target.
        const PTR_EDITABLE = 0x08;
    }
}

/// The (base type, flags) pair describing a script value's shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArgKind {
    /// Base type identity.
    pub base: TypeId,
    /// Shape flags.
    pub flags: ArgFlags,
}

impl ArgKind {
    /// Plain script integer.
    pub const INT: Self = Self::new(TYPE_INT);

    /// Jump label.
    pub const LABEL: Self = Self::new(TYPE_LABEL);

    /// Absent value.
    pub const NULL: Self = Self::new(TYPE_NULL);

    /// String-literal name.
    pub const TEXT: Self = Self::new(TYPE_TEXT);

    /// A plain, flagless kind over `base`.
    pub const fn new(base: TypeId) -> Self {
        Self {
            base,
            flags: ArgFlags::empty(),
        }
    }

    /// Add flags, normalizing the implied ones: `VAR` implies `REGISTER`,
    /// `PTR_EDITABLE` implies `PTR`.
    pub fn decorate(self, flags: ArgFlags) -> Self {
        let mut flags = self.flags | flags;

        if flags.contains(ArgFlags::VAR) {
            flags |= ArgFlags::REGISTER;
        }

        if flags.contains(ArgFlags::PTR_EDITABLE) {
            flags |= ArgFlags::PTR;
        }

        Self {
            base: self.base,
            flags,
        }
    }

    /// Whether the value lives in the register file.
    pub const fn is_register(&self) -> bool {
        self.flags.contains(ArgFlags::REGISTER)
    }

    /// Whether the value is a declared script output.
    pub const fn is_var(&self) -> bool {
        self.flags.contains(ArgFlags::VAR)
    }

    /// Whether the value is a pointer into host data.
    pub const fn is_ptr(&self) -> bool {
        self.flags.contains(ArgFlags::PTR)
    }

    /// Whether the pointer permits mutation.
    pub const fn is_editable_ptr(&self) -> bool {
        self.flags.contains(ArgFlags::PTR_EDITABLE)
    }
}

/// Compatibility score between a declared operation argument and a supplied
/// value, `0` meaning incompatible.
///
/// The non-zero scores order candidates as: exact match, then mutability
/// relaxation (editable pointer supplied where read-only declared), then
/// writable-to-readonly register downgrade, with the overload's declaration
/// ordinal as final tiebreaker.
pub fn compat(declared: ArgKind, supplied: ArgKind, ordinal: usize) -> u8 {
    if declared.is_var() && declared != supplied {
        return 0;
    }

    if declared.base != supplied.base {
        return 0;
    }

    if declared.is_register() != supplied.is_register() {
        return 0;
    }

    if declared.is_ptr() != supplied.is_ptr() {
        return 0;
    }

    if declared.is_editable_ptr() && !supplied.is_editable_ptr() {
        return 0;
    }

    let mut score = 255u8;

    if supplied.is_editable_ptr() && !declared.is_editable_ptr() {
        score -= 128;
    }

    if supplied.is_var() && !declared.is_var() {
        score -= 64;
    }

    score - ordinal.min(8) as u8
}

#[derive(Debug, Clone)]
struct TypeInfo {
    name: String,
    size: usize,
}

/// Registry of host types, keyed both by name and by Rust type identity.
///
/// Built during host init, frozen before any parse. The sentinel types are
/// pre-registered.
#[derive(Debug)]
pub struct TypeRegistry {
    infos: Vec<TypeInfo>,
    by_rust: HashMap<any::TypeId, TypeId>,
    by_name: HashMap<String, TypeId>,
}

impl TypeRegistry {
    pub(crate) fn new() -> Self {
        let mut registry = Self {
            infos: Vec::new(),
            by_rust: HashMap::new(),
            by_name: HashMap::new(),
        };

        registry.seed("null", 0);
        registry.seed("int", WORD_SIZE);
        registry.seed("label", 0);
        registry.seed("text", 0);

        registry
    }

    fn seed(&mut self, name: &str, size: usize) {
        let id = self.infos.len() as TypeId;
        self.infos.push(TypeInfo {
            name: name.to_string(),
            size,
        });
        self.by_name.insert(name.to_string(), id);
    }

    /// Register the host type `T` under `name`. In-register values of `T`
    /// occupy `size_of::<T>()` bytes; pointer values are always word-sized.
    pub fn register<T: 'static>(&mut self, name: &str) -> Result<TypeId, ConfigError> {
        if self.by_name.contains_key(name) {
            return Err(ConfigError::DuplicateDeclaration(name.to_string()));
        }

        let rust = any::TypeId::of::<T>();
        if self.by_rust.contains_key(&rust) {
            return Err(ConfigError::DuplicateDeclaration(name.to_string()));
        }

        let id = self.infos.len() as TypeId;
        debug_assert!(id >= TYPE_FIRST_HOST);

        self.infos.push(TypeInfo {
            name: name.to_string(),
            size: std::mem::size_of::<T>(),
        });
        self.by_rust.insert(rust, id);
        self.by_name.insert(name.to_string(), id);

        Ok(id)
    }

    /// The engine identity of the host type `T`, if registered.
    pub fn id_of<T: 'static>(&self) -> Option<TypeId> {
        if any::TypeId::of::<T>() == any::TypeId::of::<i64>() {
            return Some(TYPE_INT);
        }

        self.by_rust.get(&any::TypeId::of::<T>()).copied()
    }

    /// Look a type up by its registered name.
    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    /// Registered name of `id`.
    pub fn name(&self, id: TypeId) -> &str {
        &self.infos[id as usize].name
    }

    /// In-register size of `id`, in bytes.
    pub fn size(&self, id: TypeId) -> usize {
        self.infos[id as usize].size
    }
}
