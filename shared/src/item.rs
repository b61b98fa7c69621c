use serde::{Deserialize, Serialize};

/// Opaque item held by a slot.
///
/// Items compare by content. Every empty item equals every other empty item,
/// whatever leftover fields it carries, so a cleared slot never shows up as a
/// change against another cleared slot.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Item {
    pub id: u32,
    pub stack: u16,
    pub prefix: u8,
}

impl Item {
    pub fn new(id: u32, stack: u16, prefix: u8) -> Self {
        Self { id, stack, prefix }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.id == 0 || self.stack == 0
    }
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        match (self.is_empty(), other.is_empty()) {
            (true, true) => true,
            (false, false) => {
                self.id == other.id && self.stack == other.stack && self.prefix == other.prefix
            }
            _ => false,
        }
    }
}

impl Eq for Item {}
