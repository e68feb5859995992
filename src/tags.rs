//! Tags and per-object script values
//!
//! A tag is a small non-zero integer naming one scripted slot of a host
//! object kind. The host declares tag kinds and tag names during init;
//! every tagged object carries a dense [`ScriptValues`] vector indexed by
//! tag. Persistence goes through the value-type adapters registered on the
//! global context.

use std::any;
use std::any::Any;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::num::NonZeroU32;

use crate::error::ConfigError;
use crate::global::ScriptGlobal;

/// A host object type carrying script-visible tag slots.
///
/// Implementing this lets the tag operations reach the object's
/// [`ScriptValues`] through a script pointer.
pub trait Tagged: Any + Sized {
    /// The object's slot vector.
    fn script_values(&self) -> &ScriptValues<Self>;

    /// The object's slot vector, for writes.
    fn script_values_mut(&mut self) -> &mut ScriptValues<Self>;
}

/// A non-zero handle identifying one named slot of the tag kind `T`.
pub struct Tag<T> {
    index: NonZeroU32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Tag<T> {
    pub(crate) fn new(index: u32) -> Option<Self> {
        NonZeroU32::new(index).map(|index| Self {
            index,
            _marker: PhantomData,
        })
    }

    /// Rebuild a tag from a script integer. `None` when the value can't be
    /// a tag handle.
    pub fn from_raw(raw: i64) -> Option<Self> {
        u32::try_from(raw).ok().and_then(Self::new)
    }

    /// The 1-based slot index.
    pub const fn index(&self) -> u32 {
        self.index.get()
    }
}

impl<T> Clone for Tag<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Tag<T> {}

impl<T> PartialEq for Tag<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Tag<T> {}

impl<T> std::fmt::Debug for Tag<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Tag({})", self.index)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct TagEntry {
    pub(crate) name: String,
    pub(crate) value_type: String,
}

/// Registration data of one tag kind.
#[derive(Debug)]
pub struct TagKind {
    pub(crate) display_name: String,
    pub(crate) max_index: u32,
    pub(crate) entries: Vec<TagEntry>,
}

impl TagKind {
    /// Host-facing display name of the kind.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Number of registered tags.
    pub fn len(&self) -> u32 {
        self.entries.len() as u32
    }

    /// Whether no tags were registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn find(&self, name: &str) -> Option<u32> {
        self.entries
            .iter()
            .position(|entry| entry.name == name)
            .map(|i| i as u32 + 1)
    }

    /// Name of the tag at `index`, when registered.
    pub fn name(&self, index: u32) -> Option<&str> {
        self.entries
            .get(index.checked_sub(1)? as usize)
            .map(|entry| entry.name.as_str())
    }
}

/// Tag kinds keyed by host object type.
#[derive(Debug, Default)]
pub(crate) struct TagRegistry {
    kinds: HashMap<any::TypeId, TagKind>,
}

impl TagRegistry {
    pub(crate) fn declare(
        &mut self,
        rust: any::TypeId,
        display_name: &str,
        max_index: u32,
    ) -> Result<(), ConfigError> {
        if self.kinds.contains_key(&rust) {
            return Err(ConfigError::DuplicateDeclaration(display_name.to_string()));
        }

        self.kinds.insert(
            rust,
            TagKind {
                display_name: display_name.to_string(),
                max_index,
                entries: Vec::new(),
            },
        );

        Ok(())
    }

    pub(crate) fn kind(&self, rust: any::TypeId) -> Option<&TagKind> {
        self.kinds.get(&rust)
    }

    pub(crate) fn kind_mut(&mut self, rust: any::TypeId) -> Option<&mut TagKind> {
        self.kinds.get_mut(&rust)
    }
}

/// The named integer slots of one tagged host object.
///
/// Dense, tag-indexed; absent slots read as zero and writes grow the
/// vector as needed.
#[derive(Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(bound = ""))]
pub struct ScriptValues<T> {
    values: Vec<i64>,
    #[cfg_attr(feature = "serde", serde(skip))]
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static> ScriptValues<T> {
    /// An empty slot vector; every tag reads as zero.
    pub fn new() -> Self {
        Self {
            values: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Value stored under `tag`, zero when never set.
    pub fn get(&self, tag: Tag<T>) -> i64 {
        self.values
            .get(tag.index() as usize - 1)
            .copied()
            .unwrap_or(0)
    }

    /// Store `value` under `tag`, growing the vector as needed.
    pub fn set(&mut self, tag: Tag<T>, value: i64) {
        let slot = tag.index() as usize - 1;

        if slot >= self.values.len() {
            self.values.resize(slot + 1, 0);
        }

        self.values[slot] = value;
    }

    /// Load persisted values from a key-to-payload mapping.
    ///
    /// Unknown tag names are skipped with a warning; a payload its
    /// value-type adapter rejects is an error.
    pub fn load<'a>(
        &mut self,
        global: &ScriptGlobal,
        entries: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<(), ConfigError> {
        let kind = global
            .tag_kind::<T>()
            .ok_or_else(|| ConfigError::UnknownTagKind(any::type_name::<T>().to_string()))?;

        for (name, payload) in entries {
            let Some(index) = kind.find(name) else {
                tracing::warn!(kind = %kind.display_name, tag = name, "unknown tag name; skipping");
                continue;
            };

            let entry = &kind.entries[index as usize - 1];
            let adapter = global
                .value_type(&entry.value_type)
                .ok_or_else(|| ConfigError::UnknownTagValueType(entry.value_type.clone()))?;

            let value = (adapter.load)(payload).ok_or_else(|| ConfigError::InvalidTagValue {
                name: name.to_string(),
                value: payload.to_string(),
            })?;

            let tag = Tag::new(index).expect("tag indices are 1-based");
            self.set(tag, value);
        }

        Ok(())
    }

    /// Serialize the non-zero slots, in index order, through the value-type
    /// adapters.
    pub fn save(&self, global: &ScriptGlobal) -> Vec<(String, String)> {
        let Some(kind) = global.tag_kind::<T>() else {
            return Vec::new();
        };

        self.values
            .iter()
            .enumerate()
            .filter(|(_, value)| **value != 0)
            .filter_map(|(slot, value)| {
                let entry = kind.entries.get(slot)?;
                let adapter = global.value_type(&entry.value_type)?;

                Some((entry.name.clone(), (adapter.save)(*value)))
            })
            .collect()
    }
}

impl<T: 'static> Default for ScriptValues<T> {
    fn default() -> Self {
        Self::new()
    }
}
