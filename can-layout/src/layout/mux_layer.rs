//! Multiplexed layers
//!
//! A layer groups `layout_count` alternative sub-layouts selected at runtime
//! by its muxor. The muxor lives in the layout the layer is attached to; the
//! layer's id is the muxor's entity id.
//!
//! A member signal occupies one or more sub-layouts at the same start
//! position. A signal present in every sub-layout is a fixed signal.

use super::signal_layout::{LayoutParent, SignalLayoutMut, SignalLayoutRef};
use super::{LayoutKey, LayoutTree, NameScope};
use crate::attribute::{Attribute, AttributeAssignment, AttributeAssignments, AttributeValue};
use crate::entity::EntityId;
use crate::error::{Cause, LayoutError, Result};
use crate::signal::{muxor_size, Signal, SignalLocation};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug)]
pub(crate) struct MultiplexedLayer {
    pub(crate) muxor: EntityId,
    pub(crate) attached_layout: LayoutKey,
    pub(crate) layouts: Vec<LayoutKey>,
    /// Sorted layout ids occupied by each member signal
    pub(crate) signal_layout_ids: HashMap<EntityId, Vec<usize>>,
    /// Names of member signals and of the muxor
    pub(crate) signal_names: HashMap<String, EntityId>,
    pub(crate) attributes: AttributeAssignments,
}

impl LayoutTree {
    /// Sorted, de-duplicated layout ids, all of them when `ids` is empty
    fn resolve_layout_ids(&self, layer_id: EntityId, ids: &[usize], occupied: &[usize]) -> Result<Vec<usize>> {
        let count = self.layer(layer_id).layouts.len();
        if ids.is_empty() {
            return Ok((0..count).filter(|i| !occupied.contains(i)).collect());
        }

        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        for &layout_id in &ids {
            if layout_id >= count {
                return Err(LayoutError::LayoutId {
                    layout_id,
                    cause: Cause::OutOfBounds,
                });
            }
            if occupied.contains(&layout_id) {
                return Err(LayoutError::LayoutId {
                    layout_id,
                    cause: Cause::IsDuplicated,
                });
            }
        }
        Ok(ids)
    }

    fn verify_layout_id(&self, layer_id: EntityId, layout_id: usize) -> Result<LayoutKey> {
        self.layer(layer_id)
            .layouts
            .get(layout_id)
            .copied()
            .ok_or(LayoutError::LayoutId {
                layout_id,
                cause: Cause::OutOfBounds,
            })
    }

    pub(crate) fn insert_layer_signal(
        &mut self,
        layer_id: EntityId,
        mut signal: Signal,
        start_pos: usize,
        layout_ids: &[usize],
    ) -> Result<EntityId> {
        self.try_layer(layer_id)?;
        self.verify_new_signal(&signal, NameScope::Layer(layer_id))?;
        let ids = self.resolve_layout_ids(layer_id, layout_ids, &[])?;
        let keys: Vec<LayoutKey> = ids.iter().map(|&i| self.layer(layer_id).layouts[i]).collect();
        for &key in &keys {
            self.verify_placement(key, start_pos, signal.size(), None)?;
        }

        let id = signal.entity_id();
        signal.set_start_pos(start_pos);
        signal.location = Some(SignalLocation::Layer(layer_id));
        let interval = signal.interval();

        for &key in &keys {
            self.layout_mut(key).ibst.insert(interval, id);
        }
        let layer = self.layer_mut(layer_id);
        layer.signal_names.insert(signal.name().to_string(), id);
        layer.signal_layout_ids.insert(id, ids);
        log::debug!("Inserted {} into {} layouts", signal, keys.len());
        self.signals.insert(id, signal);

        for key in keys {
            self.regenerate_filters(key);
        }
        Ok(id)
    }

    /// Add a member signal to more sub-layouts at its current position
    pub(crate) fn add_signal_to_layouts(
        &mut self,
        layer_id: EntityId,
        id: EntityId,
        layout_ids: &[usize],
    ) -> Result<()> {
        let occupied = self
            .layer(layer_id)
            .signal_layout_ids
            .get(&id)
            .cloned()
            .ok_or(LayoutError::not_found(id))?;
        let ids = self.resolve_layout_ids(layer_id, layout_ids, &occupied)?;

        let signal = self.signal(id);
        let (start_pos, size, interval) = (signal.start_pos(), signal.size(), signal.interval());
        let keys: Vec<LayoutKey> = ids.iter().map(|&i| self.layer(layer_id).layouts[i]).collect();
        for &key in &keys {
            self.verify_placement(key, start_pos, size, None)?;
        }

        for &key in &keys {
            self.layout_mut(key).ibst.insert(interval, id);
        }
        if let Some(current) = self.layer_mut(layer_id).signal_layout_ids.get_mut(&id) {
            current.extend(ids);
            current.sort_unstable();
        }
        for key in keys {
            self.regenerate_filters(key);
        }
        Ok(())
    }

    pub(crate) fn delete_layer_signal(&mut self, layer_id: EntityId, id: EntityId) -> Result<Signal> {
        let layer = self.try_layer(layer_id)?;
        if id == layer.muxor {
            return Err(LayoutError::Muxor {
                name: self.signal(id).name().to_string(),
            });
        }

        let keys: Vec<LayoutKey> = layer
            .signal_layout_ids
            .get(&id)
            .ok_or(LayoutError::not_found(id))?
            .iter()
            .map(|&i| layer.layouts[i])
            .collect();

        let mut signal = self.signals.remove(&id).ok_or(LayoutError::not_found(id))?;
        for &key in &keys {
            self.layout_mut(key).ibst.delete(signal.start_pos(), &id);
        }
        let layer = self.layer_mut(layer_id);
        layer.signal_layout_ids.remove(&id);
        layer.signal_names.remove(signal.name());
        signal.location = None;

        for key in keys {
            self.regenerate_filters(key);
        }
        log::debug!("Deleted {}", signal);
        Ok(signal)
    }

    /// Empty one sub-layout
    ///
    /// Members keep their other sub-layouts; members left with none are
    /// removed. Layers nested in the sub-layout are dropped.
    pub(crate) fn clear_layer_layout(&mut self, layer_id: EntityId, layout_id: usize) -> Result<()> {
        let key = self.verify_layout_id(layer_id, layout_id)?;

        let nested = std::mem::take(&mut self.layout_mut(key).layers);
        for nested_id in nested {
            self.drop_layer(nested_id);
        }
        self.layout_mut(key).ibst.clear();

        let mut orphans = Vec::new();
        for (id, ids) in self.layer_mut(layer_id).signal_layout_ids.iter_mut() {
            ids.retain(|i| *i != layout_id);
            if ids.is_empty() {
                orphans.push(*id);
            }
        }
        for id in orphans {
            let layer = self.layer_mut(layer_id);
            layer.signal_layout_ids.remove(&id);
            if let Some(signal) = self.signals.remove(&id) {
                self.layer_mut(layer_id).signal_names.remove(signal.name());
            }
        }

        self.regenerate_filters(key);
        log::debug!("Cleared layout {} of layer {}", layout_id, layer_id);
        Ok(())
    }

    /// Empty every sub-layout; the muxor stays
    pub(crate) fn clear_layer(&mut self, layer_id: EntityId) -> Result<()> {
        let count = self.try_layer(layer_id)?.layouts.len();
        for layout_id in 0..count {
            self.clear_layer_layout(layer_id, layout_id)?;
        }
        Ok(())
    }

    /// Grow or shrink the number of sub-layouts, resizing the muxor
    pub(crate) fn update_layout_count(&mut self, layer_id: EntityId, layout_count: usize) -> Result<()> {
        if layout_count == 0 {
            return Err(LayoutError::arg("layout_count", Cause::IsZero));
        }

        let layer = self.try_layer(layer_id)?;
        let muxor_id = layer.muxor;
        let old_count = layer.layouts.len();
        if layout_count == old_count {
            return Ok(());
        }

        for (layout_id, key) in layer.layouts.iter().enumerate().skip(layout_count) {
            if self.subtree_has_plain_signals(*key) {
                return Err(LayoutError::LayoutId {
                    layout_id,
                    cause: Cause::NotClear,
                });
            }
        }

        let new_size = muxor_size(layout_count);
        let muxor = self.signal(muxor_id);
        let old_low = muxor.start_pos();
        if new_size != muxor.size() {
            self.verify_signal_resize(muxor_id, new_size)?;
        }

        if layout_count < old_count {
            let dropped = self.layer_mut(layer_id).layouts.split_off(layout_count);
            for key in dropped {
                self.drop_layout(key);
            }
        } else {
            let size_byte = self.layout(self.layer(layer_id).attached_layout).size_byte;
            for _ in old_count..layout_count {
                let key = self.alloc_layout(size_byte, LayoutParent::Layer(layer_id));
                self.layer_mut(layer_id).layouts.push(key);
            }
        }

        self.signal_mut(muxor_id).set_layout_count(layout_count);
        self.refresh_signal_interval(muxor_id, old_low);
        log::debug!(
            "Layer {} now has {} layouts",
            self.signal(muxor_id).name(),
            layout_count
        );
        Ok(())
    }
}

/// Read-only view of one multiplexed layer
#[derive(Debug, Clone, Copy)]
pub struct MultiplexedLayerRef<'a> {
    tree: &'a LayoutTree,
    id: EntityId,
}

impl<'a> MultiplexedLayerRef<'a> {
    pub(crate) fn new(tree: &'a LayoutTree, id: EntityId) -> Self {
        Self { tree, id }
    }

    fn layer(&self) -> &'a MultiplexedLayer {
        self.tree.layer(self.id)
    }

    /// Layer id, equal to the muxor's entity id
    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn muxor(&self) -> &'a Signal {
        self.tree.signal(self.layer().muxor)
    }

    pub fn layout_count(&self) -> usize {
        self.layer().layouts.len()
    }

    /// Layout the muxor is placed in
    pub fn attached_layout(&self) -> SignalLayoutRef<'a> {
        SignalLayoutRef::new(self.tree, self.layer().attached_layout)
    }

    pub fn get_layout(&self, layout_id: usize) -> Option<SignalLayoutRef<'a>> {
        self.layer()
            .layouts
            .get(layout_id)
            .map(|key| SignalLayoutRef::new(self.tree, *key))
    }

    pub fn layouts(&self) -> Vec<SignalLayoutRef<'a>> {
        self.layer()
            .layouts
            .iter()
            .map(|key| SignalLayoutRef::new(self.tree, *key))
            .collect()
    }

    /// Signals of one sub-layout, in start position order
    pub fn get_signals(&self, layout_id: usize) -> Option<Vec<&'a Signal>> {
        self.get_layout(layout_id).map(|layout| layout.signals())
    }

    /// Member signal (or the muxor) with the given name
    pub fn get_signal_by_name(&self, name: &str) -> Result<&'a Signal> {
        self.layer()
            .signal_names
            .get(name)
            .map(|id| self.tree.signal(*id))
            .ok_or(LayoutError::name(name, Cause::NotFound))
    }

    /// Sub-layouts occupied by a member signal
    pub fn signal_layout_ids(&self, signal_id: EntityId) -> Option<&'a [usize]> {
        self.layer().signal_layout_ids.get(&signal_id).map(Vec::as_slice)
    }

    /// Member signals, excluding the muxor
    pub fn signals(&self) -> Vec<&'a Signal> {
        let mut signals: Vec<&'a Signal> = self
            .layer()
            .signal_layout_ids
            .keys()
            .map(|id| self.tree.signal(*id))
            .collect();
        signals.sort_by_key(|s| s.start_pos());
        signals
    }

    pub fn attribute_assignments(&self) -> &'a AttributeAssignments {
        &self.layer().attributes
    }
}

/// Mutable handle on one multiplexed layer
#[derive(Debug)]
pub struct MultiplexedLayerMut<'a> {
    tree: &'a mut LayoutTree,
    id: EntityId,
}

impl<'a> MultiplexedLayerMut<'a> {
    pub(crate) fn new(tree: &'a mut LayoutTree, id: EntityId) -> Self {
        Self { tree, id }
    }

    pub fn view(&self) -> MultiplexedLayerRef<'_> {
        MultiplexedLayerRef::new(self.tree, self.id)
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Insert `signal` at `start_pos` into the given sub-layouts
    ///
    /// An empty `layout_ids` makes the signal fixed: it is placed in every
    /// sub-layout. Returns the signal's entity id.
    pub fn insert_signal(&mut self, signal: Signal, start_pos: usize, layout_ids: &[usize]) -> Result<EntityId> {
        self.tree.insert_layer_signal(self.id, signal, start_pos, layout_ids)
    }

    /// Place an existing member in more sub-layouts
    ///
    /// An empty `layout_ids` adds it to every sub-layout it is not in yet.
    pub fn add_signal_to_layouts(&mut self, signal_id: EntityId, layout_ids: &[usize]) -> Result<()> {
        self.tree.add_signal_to_layouts(self.id, signal_id, layout_ids)
    }

    pub fn delete_signal(&mut self, signal_id: EntityId) -> Result<Signal> {
        self.tree.delete_layer_signal(self.id, signal_id)
    }

    pub fn clear_layout(&mut self, layout_id: usize) -> Result<()> {
        self.tree.clear_layer_layout(self.id, layout_id)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.tree.clear_layer(self.id)
    }

    pub fn update_layout_count(&mut self, layout_count: usize) -> Result<()> {
        self.tree.update_layout_count(self.id, layout_count)
    }

    /// Mutable handle on one sub-layout, e.g. to nest another layer
    pub fn layout_mut(self, layout_id: usize) -> Result<SignalLayoutMut<'a>> {
        let key = self.tree.verify_layout_id(self.id, layout_id)?;
        Ok(SignalLayoutMut::new(self.tree, key))
    }

    pub fn assign_attribute(&mut self, attribute: Arc<Attribute>, value: AttributeValue) -> Result<()> {
        self.tree.layer_mut(self.id).attributes.assign(attribute, value)
    }

    pub fn remove_attribute_assignment(&mut self, attribute_id: EntityId) -> Result<AttributeAssignment> {
        self.tree.layer_mut(self.id).attributes.remove(attribute_id)
    }
}
