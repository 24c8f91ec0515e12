//! Callback registry: persistent references to script callables
//!
//! Native code never holds a script function directly. It holds a
//! [`CallbackHandle`], a generation-indexed slot in this registry, and
//! asks the registry for the callable when it is time to call it.
//!
//! All mutation happens on the engine thread; the registry is not `Send`.

use crate::error::{BridgeError, Result};
use crate::value::Value;
use serde::Serialize;
use std::fmt;

/// Whether a handle owns its registry reference.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum HandleKind {
    /// Returned by `new_ref`; must be released exactly once.
    Owned,
    /// Non-owning copy from `alias`; can dispatch, cannot release.
    WeakAlias,
}

/// Handle to a registered callable (generation-indexed for safety)
///
/// Format of [`CallbackHandle::id`]: [32-bit generation | 32-bit index]
/// - Index: slot in the registry
/// - Generation: incremented when the slot is released, so an old handle
///   can never reach whatever is registered in the slot next
#[derive(Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CallbackHandle {
    index: u32,
    generation: u32,
    kind: HandleKind,
}

impl CallbackHandle {
    pub(crate) const fn new(index: u32, generation: u32, kind: HandleKind) -> Self {
        Self {
            index,
            generation,
            kind,
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn kind(&self) -> HandleKind {
        self.kind
    }

    pub fn is_alias(&self) -> bool {
        self.kind == HandleKind::WeakAlias
    }

    /// Unique for the lifetime of the registry that issued it.
    pub fn id(&self) -> u64 {
        ((self.generation as u64) << 32) | (self.index as u64)
    }

    /// Rebuild an owned handle from [`CallbackHandle::id`] (e.g. an integer
    /// reference a script held on to).
    pub fn from_id(id: u64) -> Self {
        Self::new(id as u32, (id >> 32) as u32, HandleKind::Owned)
    }
}

impl fmt::Debug for CallbackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CallbackHandle({}v{}", self.index, self.generation)?;
        if self.is_alias() {
            f.write_str(", alias")?;
        }
        f.write_str(")")
    }
}

impl fmt::Display for CallbackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

struct Entry {
    value: Value,
    tag: Option<String>,
}

struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

/// Arena of persistent script references.
pub struct CallbackRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    /// Keep `value` alive past the current call and return an owned handle.
    pub fn new_ref(&mut self, value: Value) -> CallbackHandle {
        self.new_tagged_ref(value, None)
    }

    /// Like [`CallbackRegistry::new_ref`], remembering the event name a
    /// listener was declared with.
    pub fn new_tagged_ref(&mut self, value: Value, tag: Option<String>) -> CallbackHandle {
        let entry = Some(Entry { value, tag });
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index as usize].entry = entry;
                index
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    entry,
                });
                (self.slots.len() - 1) as u32
            }
        };
        self.live += 1;

        let handle = CallbackHandle::new(
            index,
            self.slots[index as usize].generation,
            HandleKind::Owned,
        );
        tracing::debug!(%handle, "registered callback reference");
        handle
    }

    /// Non-owning copy of a live handle.
    pub fn alias(&self, handle: CallbackHandle) -> Result<CallbackHandle> {
        self.entry(handle)?;
        Ok(CallbackHandle::new(
            handle.index,
            handle.generation,
            HandleKind::WeakAlias,
        ))
    }

    fn entry(&self, handle: CallbackHandle) -> Result<&Entry> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.entry.as_ref())
            .ok_or(BridgeError::StaleHandle { handle })
    }

    /// The value captured by `new_ref`, or `StaleHandle` once released.
    pub fn get(&self, handle: CallbackHandle) -> Result<&Value> {
        self.entry(handle).map(|entry| &entry.value)
    }

    /// Event name the handle's listener was declared with.
    pub fn tag(&self, handle: CallbackHandle) -> Result<Option<&str>> {
        self.entry(handle).map(|entry| entry.tag.as_deref())
    }

    pub fn contains(&self, handle: CallbackHandle) -> bool {
        self.entry(handle).is_ok()
    }

    /// Release an owned handle.
    ///
    /// Releasing twice is a [`BridgeError::DoubleRelease`]; releasing
    /// through an alias is a [`BridgeError::NotOwner`]. Neither touches
    /// the slot.
    pub fn delete_ref(&mut self, handle: CallbackHandle) -> Result<()> {
        if handle.is_alias() {
            return Err(BridgeError::NotOwner { handle });
        }

        let slot = self
            .slots
            .get_mut(handle.index as usize)
            .ok_or(BridgeError::StaleHandle { handle })?;
        if slot.generation != handle.generation || slot.entry.is_none() {
            tracing::error!(%handle, "callback reference released twice");
            return Err(BridgeError::DoubleRelease { handle });
        }

        slot.entry = None;
        slot.generation = slot.generation.wrapping_add(1);
        // A slot whose generation wrapped would hand out ids already seen
        if slot.generation != 0 {
            self.free.push(handle.index);
        }
        self.live -= 1;
        tracing::debug!(%handle, "released callback reference");
        Ok(())
    }

    /// Release `handle` unless it is nil.
    pub fn delete_ref_if_not_nil(&mut self, handle: Option<CallbackHandle>) -> Result<()> {
        match handle {
            Some(handle) => self.delete_ref(handle),
            None => Ok(()),
        }
    }

    /// Number of live references.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}
