//! Read-only views of slot state.
//!
//! Rendering never mutates state. The client hands each view a snapshot and
//! keeps going.

use log::info;
use shared::{EntityState, Item, PeerId};

/// Something that can display an entity's slots.
pub trait SlotView {
    fn draw(&mut self, owner: PeerId, state: &EntityState);
}

/// Writes a one-line summary per entity to the log.
#[derive(Debug, Default)]
pub struct LogRenderer {
    frames: u64,
}

impl LogRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl SlotView for LogRenderer {
    fn draw(&mut self, owner: PeerId, state: &EntityState) {
        self.frames += 1;
        info!("entity {}: {}", owner, render_text(state));
    }
}

fn cell(item: &Item) -> String {
    if item.is_empty() {
        "-".to_string()
    } else {
        format!("{}x{}", item.id, item.stack)
    }
}

/// Renders every group as `[primary|secondary|tertiary]`, with a trailing
/// `*` when the primary slot is visible.
pub fn render_text(state: &EntityState) -> String {
    if state.capacity() == 0 {
        return "(no slots)".to_string();
    }

    state
        .groups()
        .iter()
        .map(|group| {
            let [primary, secondary, tertiary] = group.items();
            format!(
                "[{}|{}|{}]{}",
                cell(&primary),
                cell(&secondary),
                cell(&tertiary),
                if group.primary.visible { "*" } else { "" }
            )
        })
        .collect::<Vec<_>>()
        .join(" ")
}
