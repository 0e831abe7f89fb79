//! Identity of a pin on a sheet instance for diagnostic deduplication.

use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::schema::{InstanceId, ItemId, Schematic, SheetList};

/// A pin on one sheet instance.
///
/// Equality, hashing and ordering use only the precomputed hash of the pin
/// UUID and the instance's screen content, so every placement of the same
/// sub-sheet yields the same context while placements of differing content
/// do not.
#[derive(Debug, Clone, Copy)]
pub struct ErcPinContext {
    pub item: ItemId,
    pub instance: InstanceId,
    hash: u64,
}

impl ErcPinContext {
    pub fn new(schematic: &Schematic, sheets: &SheetList, item: ItemId, instance: InstanceId) -> Option<Self> {
        let uuid = schematic.item(item)?.uuid;
        let screen = schematic.screen(sheets.get(instance)?.screen)?;

        let mut hasher = DefaultHasher::new();
        uuid.hash(&mut hasher);
        screen.content_hash().hash(&mut hasher);
        Some(Self {
            item,
            instance,
            hash: hasher.finish(),
        })
    }

    pub fn hash_value(&self) -> u64 {
        self.hash
    }
}

impl PartialEq for ErcPinContext {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for ErcPinContext {}

impl Hash for ErcPinContext {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

impl PartialOrd for ErcPinContext {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ErcPinContext {
    fn cmp(&self, other: &Self) -> Ordering {
        self.hash.cmp(&other.hash)
    }
}
