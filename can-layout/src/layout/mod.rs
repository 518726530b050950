//! Signal layouts and multiplexed layers
//!
//! # Architecture
//!
//! A message owns one [`LayoutTree`], an arena holding every layout, every
//! multiplexed layer and every signal of that message:
//! - layouts are addressed by [`LayoutKey`]; the root layout belongs to the message
//! - a multiplexed layer is addressed by the entity id of its muxor
//! - signals are addressed by their entity id
//!
//! Parent links (signal to layout, sub-layout to layer, layer to attached
//! layout) are plain keys, so the ownership graph has no cycles. Callers
//! never hold keys into the arena for mutation: they go through the
//! borrowed handles [`SignalLayoutMut`], [`MultiplexedLayerMut`] and
//! [`SignalMut`], which validate first and only then commit.
//!
//! Every placement is checked against the whole multiplex tree: the
//! candidate layout and everything nested below it, then each ancestor
//! layout together with the branches of that ancestor that the candidate
//! does not belong to. Sibling sub-layouts of the same layer are
//! alternatives and never conflict with each other.

mod codec;
mod filter;
mod mux_layer;
mod signal_layout;
mod signal_mut;

pub use codec::{SignalDecoding, SignalValue, SignalValueType};
pub use filter::SignalLayoutFilter;
pub use mux_layer::{MultiplexedLayerMut, MultiplexedLayerRef};
pub use signal_layout::{SignalLayoutMut, SignalLayoutRef};
pub use signal_mut::SignalMut;

use crate::config::LayoutConfig;
use crate::entity::EntityId;
use crate::error::{Cause, LayoutError, Result};
use crate::ibst::Interval;
use crate::signal::{Signal, SignalLocation};
use mux_layer::MultiplexedLayer;
use signal_layout::{LayoutParent, SignalLayout};
use std::collections::{HashMap, HashSet, VecDeque};

/// Key of a layout inside its message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayoutKey(usize);

/// Name scope a signal name is registered in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NameScope {
    Message,
    Layer(EntityId),
}

/// Arena of layouts, layers and signals of one message
#[derive(Debug)]
pub(crate) struct LayoutTree {
    config: LayoutConfig,
    root: LayoutKey,
    next_key: usize,
    layouts: HashMap<LayoutKey, SignalLayout>,
    layers: HashMap<EntityId, MultiplexedLayer>,
    signals: HashMap<EntityId, Signal>,
    /// Names of the signals placed directly in the root layout
    root_names: HashMap<String, EntityId>,
}

impl LayoutTree {
    pub(crate) fn new(size_byte: usize, config: LayoutConfig) -> Result<Self> {
        if size_byte > config.max_size_byte {
            return Err(LayoutError::Size {
                size: size_byte,
                cause: Cause::TooBig,
            });
        }

        let mut tree = Self {
            config,
            root: LayoutKey(0),
            next_key: 0,
            layouts: HashMap::new(),
            layers: HashMap::new(),
            signals: HashMap::new(),
            root_names: HashMap::new(),
        };
        tree.root = tree.alloc_layout(size_byte, LayoutParent::Message);
        Ok(tree)
    }

    pub(crate) fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub(crate) fn root(&self) -> LayoutKey {
        self.root
    }

    fn alloc_layout(&mut self, size_byte: usize, parent: LayoutParent) -> LayoutKey {
        let key = LayoutKey(self.next_key);
        self.next_key += 1;
        self.layouts.insert(key, SignalLayout::new(size_byte, parent));
        key
    }

    // Keys handed around inside the arena are always live; a miss is a bug.

    fn layout(&self, key: LayoutKey) -> &SignalLayout {
        self.layouts.get(&key).expect("dangling layout key")
    }

    fn layout_mut(&mut self, key: LayoutKey) -> &mut SignalLayout {
        self.layouts.get_mut(&key).expect("dangling layout key")
    }

    fn layer(&self, id: EntityId) -> &MultiplexedLayer {
        self.layers.get(&id).expect("dangling layer id")
    }

    fn layer_mut(&mut self, id: EntityId) -> &mut MultiplexedLayer {
        self.layers.get_mut(&id).expect("dangling layer id")
    }

    fn signal(&self, id: EntityId) -> &Signal {
        self.signals.get(&id).expect("dangling signal id")
    }

    fn signal_mut(&mut self, id: EntityId) -> &mut Signal {
        self.signals.get_mut(&id).expect("dangling signal id")
    }

    pub(crate) fn has_layout(&self, key: LayoutKey) -> bool {
        self.layouts.contains_key(&key)
    }

    pub(crate) fn try_layer(&self, id: EntityId) -> Result<&MultiplexedLayer> {
        self.layers.get(&id).ok_or(LayoutError::not_found(id))
    }

    pub(crate) fn get_signal(&self, id: EntityId) -> Option<&Signal> {
        self.signals.get(&id)
    }

    pub(crate) fn signal_by_name(&self, name: &str) -> Option<&Signal> {
        self.signals.values().find(|s| s.name() == name)
    }

    pub(crate) fn root_names(&self) -> impl Iterator<Item = &str> {
        self.root_names.keys().map(String::as_str)
    }

    /// Every signal of the tree, depth first in start position order
    pub(crate) fn all_signals(&self) -> Vec<&Signal> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for key in self.subtree_layouts(self.root) {
            for (_, id) in self.layout(key).ibst.in_order() {
                if seen.insert(*id) {
                    out.push(self.signal(*id));
                }
            }
        }
        out
    }

    /// Sub-layouts of every layer attached to `key`
    fn child_layouts(&self, key: LayoutKey) -> impl Iterator<Item = LayoutKey> + '_ {
        self.layout(key)
            .layers
            .iter()
            .flat_map(move |id| self.layer(*id).layouts.iter().copied())
    }

    /// `key` followed by every layout nested below it, depth first
    pub(crate) fn subtree_layouts(&self, key: LayoutKey) -> Vec<LayoutKey> {
        let mut out = Vec::new();
        let mut stack = vec![key];
        while let Some(k) = stack.pop() {
            out.push(k);
            let children: Vec<LayoutKey> = self.child_layouts(k).collect();
            stack.extend(children.into_iter().rev());
        }
        out
    }

    /// Layouts whose interval tree holds signal `id`
    fn signal_layouts(&self, id: EntityId) -> Vec<LayoutKey> {
        match self.signal(id).location {
            Some(SignalLocation::Layout(key)) => vec![key],
            Some(SignalLocation::Layer(layer_id)) => {
                let layer = self.layer(layer_id);
                layer
                    .signal_layout_ids
                    .get(&id)
                    .map(|ids| ids.iter().map(|&i| layer.layouts[i]).collect())
                    .unwrap_or_default()
            }
            None => Vec::new(),
        }
    }

    /// Check `interval` against one layout and everything nested below it,
    /// leaving out the branch through `skip_layer` at the top
    fn verify_subtree(
        &self,
        key: LayoutKey,
        skip_layer: Option<EntityId>,
        interval: Interval,
        skip: Option<EntityId>,
    ) -> Result<()> {
        let mut stack = vec![key];
        while let Some(k) = stack.pop() {
            let layout = self.layout(k);
            let hit = match &skip {
                Some(id) => layout.ibst.intersects_except(interval, id),
                None => layout.ibst.intersects(interval),
            };
            if let Some(id) = hit {
                return Err(LayoutError::Intersect {
                    with: self.signal(*id).name().to_string(),
                });
            }

            for layer_id in &layout.layers {
                if k == key && Some(*layer_id) == skip_layer {
                    continue;
                }
                stack.extend(self.layer(*layer_id).layouts.iter().copied());
            }
        }
        Ok(())
    }

    /// Check `interval` in layout `key` against every layout it shares bits with
    pub(crate) fn verify_intersection(
        &self,
        key: LayoutKey,
        interval: Interval,
        skip: Option<EntityId>,
    ) -> Result<()> {
        self.verify_subtree(key, None, interval, skip)?;

        let mut current = key;
        while let LayoutParent::Layer(layer_id) = self.layout(current).parent {
            let parent = self.layer(layer_id).attached_layout;
            self.verify_subtree(parent, Some(layer_id), interval, skip)?;
            current = parent;
        }
        Ok(())
    }

    fn verify_bounds(&self, key: LayoutKey, start_pos: usize, size: usize) -> Result<()> {
        let fits = start_pos
            .checked_add(size)
            .is_some_and(|end| end <= self.layout(key).size_byte * 8);
        if !fits {
            return Err(LayoutError::StartPos {
                start_pos,
                cause: Cause::OutOfBounds,
            });
        }
        Ok(())
    }

    /// Bounds and intersection checks for `size` bits at `start_pos`
    fn verify_placement(
        &self,
        key: LayoutKey,
        start_pos: usize,
        size: usize,
        skip: Option<EntityId>,
    ) -> Result<()> {
        self.verify_bounds(key, start_pos, size)?;
        self.verify_intersection(key, Interval::from_start_size(start_pos, size), skip)
    }

    /// Verify `name` is free in every scope reachable from `scope`
    pub(crate) fn verify_signal_name(&self, scope: NameScope, name: &str) -> Result<()> {
        let duplicated = || Err(LayoutError::name(name, Cause::IsDuplicated));

        let mut queue = VecDeque::new();
        let mut visited = HashSet::new();
        let mut message_checked = false;

        match scope {
            NameScope::Message => {
                if self.root_names.contains_key(name) {
                    return duplicated();
                }
                message_checked = true;
                queue.extend(self.layout(self.root).layers.iter().copied());
            }
            NameScope::Layer(id) => queue.push_back(id),
        }

        while let Some(layer_id) = queue.pop_front() {
            if !visited.insert(layer_id) {
                continue;
            }

            let layer = self.layer(layer_id);
            if layer.signal_names.contains_key(name) {
                return duplicated();
            }

            for key in &layer.layouts {
                queue.extend(self.layout(*key).layers.iter().copied());
            }

            let attached = self.layout(layer.attached_layout);
            queue.extend(attached.layers.iter().copied());
            match attached.parent {
                LayoutParent::Message => {
                    if !message_checked {
                        message_checked = true;
                        if self.root_names.contains_key(name) {
                            return duplicated();
                        }
                    }
                }
                LayoutParent::Layer(parent) => queue.push_back(parent),
            }
        }
        Ok(())
    }

    /// Scope holding the name of signal `id`
    fn name_scope(&self, id: EntityId) -> NameScope {
        let signal = self.signal(id);
        if signal.is_muxor() {
            return NameScope::Layer(id);
        }
        match signal.location {
            Some(SignalLocation::Layer(layer_id)) => NameScope::Layer(layer_id),
            _ => NameScope::Message,
        }
    }

    fn names_mut(&mut self, scope: NameScope) -> &mut HashMap<String, EntityId> {
        match scope {
            NameScope::Message => &mut self.root_names,
            NameScope::Layer(id) => &mut self.layer_mut(id).signal_names,
        }
    }

    /// Scope for new signals placed in layout `key`
    fn layout_scope(&self, key: LayoutKey) -> NameScope {
        match self.layout(key).parent {
            LayoutParent::Message => NameScope::Message,
            LayoutParent::Layer(id) => NameScope::Layer(id),
        }
    }

    fn verify_new_signal(&self, signal: &Signal, scope: NameScope) -> Result<()> {
        let id = signal.entity_id();
        if self.signals.contains_key(&id) {
            return Err(LayoutError::EntityId {
                id,
                cause: Cause::IsDuplicated,
            });
        }
        self.verify_signal_name(scope, signal.name())
    }

    /// Remove a layer with everything it owns
    fn drop_layer(&mut self, layer_id: EntityId) {
        let Some(layer) = self.layers.remove(&layer_id) else {
            return;
        };

        for key in layer.layouts {
            self.drop_layout(key);
        }
        for id in layer.signal_layout_ids.keys() {
            self.signals.remove(id);
        }

        if let Some(muxor) = self.signals.remove(&layer.muxor) {
            if let Some(attached) = self.layouts.get_mut(&layer.attached_layout) {
                attached.ibst.delete(muxor.start_pos(), &layer.muxor);
                attached.layers.retain(|id| *id != layer_id);
            }
        }
        log::debug!("Dropped multiplexed layer {}", layer_id);
    }

    fn drop_layout(&mut self, key: LayoutKey) {
        if let Some(layout) = self.layouts.remove(&key) {
            for layer_id in layout.layers {
                self.drop_layer(layer_id);
            }
        }
    }

    /// Whether `key` or anything below it holds a signal other than a muxor
    fn subtree_has_plain_signals(&self, key: LayoutKey) -> bool {
        self.subtree_layouts(key).into_iter().any(|k| {
            self.layout(k)
                .ibst
                .in_order()
                .any(|(_, id)| !self.signal(*id).is_muxor())
        })
    }

    /// Re-read the interval of signal `id` into every layout holding it
    fn refresh_signal_interval(&mut self, id: EntityId, old_low: usize) {
        let interval = self.signal(id).interval();
        for key in self.signal_layouts(id) {
            self.layout_mut(key).ibst.update(old_low, &id, interval);
            self.regenerate_filters(key);
        }
    }

    /// Check that signal `id` can grow or shrink to `new_size` bits in place
    fn verify_signal_resize(&self, id: EntityId, new_size: usize) -> Result<()> {
        let start = self.signal(id).start_pos();
        for key in self.signal_layouts(id) {
            let fits = start
                .checked_add(new_size)
                .is_some_and(|end| end <= self.layout(key).size_byte * 8);
            if !fits {
                return Err(LayoutError::Size {
                    size: new_size,
                    cause: Cause::OutOfBounds,
                });
            }
            self.verify_intersection(key, Interval::from_start_size(start, new_size), Some(id))?;
        }
        Ok(())
    }
}
