//! Host-wide shared registry
//!
//! [`ScriptGlobal`] is the explicit context handle threaded through parser
//! construction: host types, tag kinds, tag-value adapters and shared
//! constants. It is built mutably during init, then frozen behind an `Arc`
//! before any parser is created; after that point it is only read.

use std::any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::ConfigError;
use crate::tags::{Tag, TagEntry, TagKind, TagRegistry};
use crate::types::{TypeId, TypeRegistry};

/// A named pair of persistence adapters for tag values.
///
/// `load` decodes the persisted payload into the slot integer, returning
/// `None` on a malformed payload; `save` renders the slot back out.
pub struct ValueType {
    /// Payload decoder.
    pub load: fn(&str) -> Option<i64>,
    /// Payload encoder.
    pub save: fn(i64) -> String,
}

/// Host-wide registry of types, tag kinds, value types and shared
/// constants.
pub struct ScriptGlobal {
    types: TypeRegistry,
    consts: HashMap<String, i64>,
    tags: TagRegistry,
    value_types: HashMap<String, ValueType>,
    parser_ids: AtomicU32,
}

impl ScriptGlobal {
    /// A fresh registry with only the sentinel types.
    pub fn new() -> Self {
        Self {
            types: TypeRegistry::new(),
            consts: HashMap::new(),
            tags: TagRegistry::default(),
            value_types: HashMap::new(),
            parser_ids: AtomicU32::new(0),
        }
    }

    /// Register the host type `T` under a script-visible name.
    pub fn register_type<T: 'static>(&mut self, name: &str) -> Result<TypeId, ConfigError> {
        self.types.register::<T>(name)
    }

    /// The type registry.
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Add a shared constant visible to every parser.
    pub fn add_const(&mut self, name: &str, value: i64) -> Result<(), ConfigError> {
        if self.consts.contains_key(name) {
            return Err(ConfigError::DuplicateDeclaration(name.to_string()));
        }

        self.consts.insert(name.to_string(), value);

        Ok(())
    }

    /// Value of a shared constant.
    pub fn const_value(&self, name: &str) -> Option<i64> {
        self.consts.get(name).copied()
    }

    /// Register a named pair of tag-value persistence adapters.
    pub fn register_value_type(
        &mut self,
        name: &str,
        load: fn(&str) -> Option<i64>,
        save: fn(i64) -> String,
    ) -> Result<(), ConfigError> {
        if self.value_types.contains_key(name) {
            return Err(ConfigError::DuplicateDeclaration(name.to_string()));
        }

        self.value_types
            .insert(name.to_string(), ValueType { load, save });

        Ok(())
    }

    /// The adapters registered under `name`.
    pub fn value_type(&self, name: &str) -> Option<&ValueType> {
        self.value_types.get(name)
    }

    /// Declare the host object type `T` as a tag kind. `max_index` bounds
    /// how many tags the kind accepts, matching the integer width the host
    /// persists indices with.
    pub fn add_tag_kind<T: 'static>(
        &mut self,
        display_name: &str,
        max_index: u32,
    ) -> Result<(), ConfigError> {
        self.tags
            .declare(any::TypeId::of::<T>(), display_name, max_index)
    }

    /// Register a tag name of kind `T` bound to a value type, returning its
    /// handle.
    pub fn add_tag<T: 'static>(
        &mut self,
        name: &str,
        value_type: &str,
    ) -> Result<Tag<T>, ConfigError> {
        if !self.value_types.contains_key(value_type) {
            return Err(ConfigError::UnknownTagValueType(value_type.to_string()));
        }

        let kind = self
            .tags
            .kind_mut(any::TypeId::of::<T>())
            .ok_or_else(|| ConfigError::UnknownTagKind(any::type_name::<T>().to_string()))?;

        if kind.entries.iter().any(|entry| entry.name == name) {
            return Err(ConfigError::DuplicateTagName(name.to_string()));
        }

        if kind.len() == kind.max_index {
            return Err(ConfigError::TagCapacity {
                kind: kind.display_name.clone(),
                limit: kind.max_index,
            });
        }

        kind.entries.push(TagEntry {
            name: name.to_string(),
            value_type: value_type.to_string(),
        });

        Ok(Tag::new(kind.len()).expect("tag indices are 1-based"))
    }

    /// Look a tag of kind `T` up by name.
    pub fn tag<T: 'static>(&self, name: &str) -> Option<Tag<T>> {
        self.tag_kind::<T>()?.find(name).and_then(Tag::new)
    }

    /// Registration data of the tag kind `T`.
    pub fn tag_kind<T: 'static>(&self) -> Option<&TagKind> {
        self.tags.kind(any::TypeId::of::<T>())
    }

    pub(crate) fn next_parser_id(&self) -> u32 {
        self.parser_ids.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for ScriptGlobal {
    fn default() -> Self {
        Self::new()
    }
}
