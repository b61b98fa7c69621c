//! Change detection between two snapshots of the same entity.

use crate::item::Item;
use crate::slot::SlotRole;
use crate::state::EntityState;

/// One slot whose item differs from the previous snapshot. Holds the current
/// item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotDelta {
    pub group_index: usize,
    pub role: SlotRole,
    pub item: Item,
}

/// Returns every slot whose item content changed from `previous` to
/// `current`.
///
/// Deltas come out by group index, then in [`SlotRole::ALL`] order.
/// Visibility is not compared. If the capacities differ only the shared
/// prefix of groups is compared.
pub fn diff(current: &EntityState, previous: &EntityState) -> Vec<SlotDelta> {
    let mut deltas = Vec::new();

    for (group_index, (now, before)) in current.groups().iter().zip(previous.groups()).enumerate() {
        for role in SlotRole::ALL {
            let item = now.slot(role).item;
            if item != before.slot(role).item {
                deltas.push(SlotDelta {
                    group_index,
                    role,
                    item,
                });
            }
        }
    }

    deltas
}

/// Writes each delta's item into `state`. Deltas past the state's capacity
/// are skipped.
pub fn apply_deltas(state: &mut EntityState, deltas: &[SlotDelta]) {
    for delta in deltas {
        state.set_item(delta.group_index, delta.role, delta.item);
    }
}

/// Distinct roles touched by `deltas`, in [`SlotRole::ALL`] order.
pub fn changed_roles(deltas: &[SlotDelta]) -> Vec<SlotRole> {
    SlotRole::ALL
        .into_iter()
        .filter(|role| deltas.iter().any(|d| d.role == *role))
        .collect()
}

/// Keeps the previous tick's snapshot of a locally owned state.
///
/// Call [`ChangeDetector::poll`] once per tick, after local mutation for the
/// tick is finished.
#[derive(Debug, Clone, Default)]
pub struct ChangeDetector {
    snapshot: Option<EntityState>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the snapshot without reporting changes.
    pub fn reset(&mut self, state: &EntityState) {
        self.snapshot = Some(state.clone());
    }

    pub fn snapshot(&self) -> Option<&EntityState> {
        self.snapshot.as_ref()
    }

    /// Diffs `current` against the snapshot, then takes a new snapshot.
    /// The first poll only takes the snapshot.
    pub fn poll(&mut self, current: &EntityState) -> Vec<SlotDelta> {
        let deltas = match &self.snapshot {
            Some(previous) => diff(current, previous),
            None => Vec::new(),
        };
        self.snapshot = Some(current.clone());
        deltas
    }
}
