//! Name- and id-indexed registries of shared definitions
//!
//! A registry owns one `Arc` handle per definition. Every other live handle
//! (held by a signal, or by the caller) counts as a reference, and a
//! definition cannot be removed while it is referenced.

use crate::entity::{Entity, EntityId};
use crate::error::{Cause, LayoutError, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Anything a [`Registry`] can hold
pub trait Registered {
    fn entity(&self) -> &Entity;
}

/// Shared definitions keyed by entity id and by name
#[derive(Debug)]
pub struct Registry<T> {
    items: BTreeMap<EntityId, Arc<T>>,
    names: HashMap<String, EntityId>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            items: BTreeMap::new(),
            names: HashMap::new(),
        }
    }
}

impl<T: Registered> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition and return a handle to it
    pub fn add(&mut self, item: T) -> Result<Arc<T>> {
        let name = item.entity().name().to_string();
        if self.names.contains_key(&name) {
            return Err(LayoutError::name(&name, Cause::IsDuplicated));
        }

        let id = item.entity().id();
        let handle = Arc::new(item);
        self.names.insert(name, id);
        self.items.insert(id, handle.clone());
        log::debug!("Registered {}", handle.entity());
        Ok(handle)
    }

    pub fn get(&self, id: EntityId) -> Option<Arc<T>> {
        self.items.get(&id).cloned()
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<T>> {
        self.names.get(name).and_then(|id| self.get(*id))
    }

    /// Live handles held outside the registry
    pub fn references(&self, id: EntityId) -> Result<usize> {
        let item = self.items.get(&id).ok_or(LayoutError::not_found(id))?;
        Ok(Arc::strong_count(item) - 1)
    }

    /// Remove a definition that nothing references any more
    pub fn remove(&mut self, id: EntityId) -> Result<Arc<T>> {
        let references = self.references(id)?;
        if references > 0 {
            let name = self.items[&id].entity().name().to_string();
            return Err(LayoutError::Reference { name, references });
        }

        let item = self.items.remove(&id).ok_or(LayoutError::not_found(id))?;
        self.names.remove(item.entity().name());
        Ok(item)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<T>> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
