use crate::item::Item;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the three parallel slots inside a [`SlotGroup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SlotRole {
    Primary,
    Secondary,
    Tertiary,
}

impl SlotRole {
    /// Fixed role order used for diffing, framing and persistence.
    pub const ALL: [SlotRole; 3] = [SlotRole::Primary, SlotRole::Secondary, SlotRole::Tertiary];

    /// Key suffix used in the persisted layout.
    pub fn key(&self) -> &'static str {
        match self {
            SlotRole::Primary => "PRIMARY",
            SlotRole::Secondary => "SECONDARY",
            SlotRole::Tertiary => "TERTIARY",
        }
    }
}

impl fmt::Display for SlotRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A single item cell.
///
/// `visible` only means something on the primary role. It is persisted but
/// never replicated or compared for change detection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub item: Item,
    pub visible: bool,
}

impl Slot {
    pub fn new(item: Item) -> Self {
        Self {
            item,
            visible: false,
        }
    }
}

/// Primary, secondary and tertiary slots that always travel together on a
/// full sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotGroup {
    pub primary: Slot,
    pub secondary: Slot,
    pub tertiary: Slot,
}

impl SlotGroup {
    pub fn slot(&self, role: SlotRole) -> &Slot {
        match role {
            SlotRole::Primary => &self.primary,
            SlotRole::Secondary => &self.secondary,
            SlotRole::Tertiary => &self.tertiary,
        }
    }

    pub fn slot_mut(&mut self, role: SlotRole) -> &mut Slot {
        match role {
            SlotRole::Primary => &mut self.primary,
            SlotRole::Secondary => &mut self.secondary,
            SlotRole::Tertiary => &mut self.tertiary,
        }
    }

    /// Items in [`SlotRole::ALL`] order.
    pub fn items(&self) -> [Item; 3] {
        [self.primary.item, self.secondary.item, self.tertiary.item]
    }

    /// True when every role holds the same item content as `other`.
    /// Visibility is ignored.
    pub fn same_items(&self, other: &SlotGroup) -> bool {
        self.items() == other.items()
    }
}
