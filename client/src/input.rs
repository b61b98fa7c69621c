//! Simulated slot input.
//!
//! Stands in for an inventory UI: every input tick it may place an item into a
//! random slot, clear one, or flip a primary slot's visibility.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{EntityState, Item, SlotRole};

/// Highest item id the simulator hands out.
const MAX_ITEM_ID: u32 = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotEdit {
    Place {
        group: usize,
        role: SlotRole,
        item: Item,
    },
    Clear {
        group: usize,
        role: SlotRole,
    },
    ToggleVisible {
        group: usize,
        visible: bool,
    },
}

pub struct InputSimulator {
    rng: StdRng,
    /// Chance per tick that any edit happens at all.
    churn: f64,
}

impl InputSimulator {
    pub fn new(churn: f64) -> Self {
        Self {
            rng: StdRng::from_entropy(),
            churn: probability(churn),
        }
    }

    pub fn with_seed(seed: u64, churn: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            churn: probability(churn),
        }
    }

    /// Possibly edits one slot of `state` and returns what changed.
    pub fn update(&mut self, state: &mut EntityState) -> Option<SlotEdit> {
        if state.capacity() == 0 || !self.rng.gen_bool(self.churn) {
            return None;
        }

        let group = self.rng.gen_range(0..state.capacity());
        let role = SlotRole::ALL[self.rng.gen_range(0..SlotRole::ALL.len())];

        let edit = match self.rng.gen_range(0..10) {
            0..=5 => SlotEdit::Place {
                group,
                role,
                item: Item::new(
                    self.rng.gen_range(1..=MAX_ITEM_ID),
                    self.rng.gen_range(1..=3),
                    self.rng.gen_range(0..=80),
                ),
            },
            6..=8 => SlotEdit::Clear { group, role },
            _ => SlotEdit::ToggleVisible {
                group,
                visible: !state.group(group).map_or(false, |g| g.primary.visible),
            },
        };

        match edit {
            SlotEdit::Place { group, role, item } => state.set_item(group, role, item),
            SlotEdit::Clear { group, role } => state.set_item(group, role, Item::empty()),
            SlotEdit::ToggleVisible { group, visible } => state.set_visible(group, visible),
        };

        Some(edit)
    }
}

fn probability(p: f64) -> f64 {
    if p.is_nan() {
        0.0
    } else {
        p.clamp(0.0, 1.0)
    }
}
