//! Per-entity slot state and its persisted form.

use crate::item::Item;
use crate::slot::{SlotGroup, SlotRole};
use crate::PeerId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value stored under a persisted key. Untagged so the JSON save file reads
/// as plain booleans and item objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PersistedValue {
    Flag(bool),
    Item(Item),
}

/// Keyed save layout, one entry per role plus one visibility flag per group.
pub type PersistedState = BTreeMap<String, PersistedValue>;

/// Slot groups owned by one entity.
///
/// The number of groups is fixed at construction and never changes for the
/// lifetime of the value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityState {
    owner_id: PeerId,
    groups: Vec<SlotGroup>,
}

impl EntityState {
    /// Allocates `capacity` empty groups.
    pub fn new(owner_id: PeerId, capacity: usize) -> Self {
        Self {
            owner_id,
            groups: vec![SlotGroup::default(); capacity],
        }
    }

    pub fn owner_id(&self) -> PeerId {
        self.owner_id
    }

    pub fn capacity(&self) -> usize {
        self.groups.len()
    }

    pub fn groups(&self) -> &[SlotGroup] {
        &self.groups
    }

    pub fn group(&self, index: usize) -> Option<&SlotGroup> {
        self.groups.get(index)
    }

    pub fn item(&self, index: usize, role: SlotRole) -> Option<&Item> {
        self.groups.get(index).map(|group| &group.slot(role).item)
    }

    /// Puts `item` into one slot. Returns false if `index` is out of range.
    pub fn set_item(&mut self, index: usize, role: SlotRole, item: Item) -> bool {
        match self.groups.get_mut(index) {
            Some(group) => {
                group.slot_mut(role).item = item;
                true
            }
            None => false,
        }
    }

    /// Sets the primary slot's visibility flag. Returns false if `index` is
    /// out of range.
    pub fn set_visible(&mut self, index: usize, visible: bool) -> bool {
        match self.groups.get_mut(index) {
            Some(group) => {
                group.primary.visible = visible;
                true
            }
            None => false,
        }
    }

    /// Current item of `role` in every group, in group order.
    pub fn role_items(&self, role: SlotRole) -> Vec<Item> {
        self.groups.iter().map(|g| g.slot(role).item).collect()
    }

    /// Overwrites `role` across groups in order. Extra items are ignored and
    /// groups past the end of `items` are left as they are.
    pub fn set_role_items(&mut self, role: SlotRole, items: &[Item]) {
        for (group, item) in self.groups.iter_mut().zip(items) {
            group.slot_mut(role).item = *item;
        }
    }

    /// True when both states hold the same items in every slot. Visibility
    /// and owner are not compared.
    pub fn same_items(&self, other: &EntityState) -> bool {
        self.groups.len() == other.groups.len()
            && self
                .groups
                .iter()
                .zip(&other.groups)
                .all(|(a, b)| a.same_items(b))
    }

    /// Builds the keyed save layout under `prefix`. Group keys are 1-based.
    pub fn to_persisted(&self, prefix: &str) -> PersistedState {
        let mut out = PersistedState::new();

        for (index, group) in self.groups.iter().enumerate() {
            let base = format!("{}{}", prefix, index + 1);
            out.insert(
                format!("{}_VISIBLE", base),
                PersistedValue::Flag(group.primary.visible),
            );
            for role in SlotRole::ALL {
                out.insert(
                    format!("{}_{}", base, role.key()),
                    PersistedValue::Item(group.slot(role).item),
                );
            }
        }

        out
    }

    /// Restores a state from the keyed save layout.
    ///
    /// Missing keys, and keys holding the wrong kind of value, fall back to
    /// an empty item or a hidden slot. Keys for groups beyond `capacity` are
    /// ignored.
    pub fn from_persisted(
        owner_id: PeerId,
        capacity: usize,
        persisted: &PersistedState,
        prefix: &str,
    ) -> Self {
        let mut state = Self::new(owner_id, capacity);

        for (index, group) in state.groups.iter_mut().enumerate() {
            let base = format!("{}{}", prefix, index + 1);

            for role in SlotRole::ALL {
                let key = format!("{}_{}", base, role.key());
                group.slot_mut(role).item = match persisted.get(&key) {
                    Some(PersistedValue::Item(item)) => *item,
                    _ => Item::empty(),
                };
            }

            group.primary.visible = matches!(
                persisted.get(&format!("{}_VISIBLE", base)),
                Some(PersistedValue::Flag(true))
            );
        }

        state
    }
}
