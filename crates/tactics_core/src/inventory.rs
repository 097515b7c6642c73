//! Team inventories and the consumable item catalog.
//!
//! Item use always consumes exactly one unit of the item. A failed use must
//! put it back, so quantities are plain integers with no reservation step.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::InventoryError;
use crate::ids::ItemId;
use crate::status::StatusType;

/// Storage for consumable items.
pub trait InventoryProvider {
    /// Held quantity of an item (0 if absent).
    fn quantity(&self, item: &ItemId) -> u32;

    /// Remove `quantity` of an item. Fails without change if too few are held.
    fn consume(&mut self, item: &ItemId, quantity: u32) -> Result<(), InventoryError>;

    /// Add `quantity` of an item.
    fn add(&mut self, item: &ItemId, quantity: u32);

    /// Returns true if at least one of the item is held.
    fn has_item(&self, item: &ItemId) -> bool {
        self.quantity(item) > 0
    }
}

/// A simple item bag keyed by item id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bag {
    items: BTreeMap<ItemId, u32>,
}

impl Bag {
    /// Create an empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add items, builder style.
    #[must_use]
    pub fn with(mut self, item: impl Into<ItemId>, quantity: u32) -> Self {
        self.add(&item.into(), quantity);
        self
    }

    /// Held items with non-zero quantity, in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&ItemId, u32)> {
        self.items.iter().map(|(id, &qty)| (id, qty))
    }

    /// Returns true if the bag holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl InventoryProvider for Bag {
    fn quantity(&self, item: &ItemId) -> u32 {
        self.items.get(item).copied().unwrap_or(0)
    }

    fn consume(&mut self, item: &ItemId, quantity: u32) -> Result<(), InventoryError> {
        let available = self.quantity(item);
        if available < quantity {
            return Err(InventoryError::NotEnough {
                item: item.clone(),
                required: quantity,
                available,
            });
        }
        let left = available - quantity;
        if left == 0 {
            self.items.remove(item);
        } else {
            self.items.insert(item.clone(), left);
        }
        Ok(())
    }

    fn add(&mut self, item: &ItemId, quantity: u32) {
        if quantity == 0 {
            return;
        }
        let entry = self.items.entry(item.clone()).or_insert(0);
        *entry = entry.saturating_add(quantity);
    }
}

/// What an item does to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemEffect {
    /// Restore a flat amount of HP.
    RestoreHp(u32),
    /// Restore a flat amount of MP.
    RestoreMp(u32),
    /// Revive an eliminated ally with this percentage of max HP.
    Revive(u32),
    /// Deal flat damage to an enemy.
    Bomb(u32),
    /// Remove one status type.
    Cure(StatusType),
}

/// Which units an item may be used on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemTarget {
    /// Living members of the user's team, the user included.
    LivingAlly,
    /// Eliminated members of the user's team.
    EliminatedAlly,
    /// Living members of other teams.
    LivingEnemy,
}

impl ItemEffect {
    /// Target class this effect accepts.
    #[must_use]
    pub const fn target(self) -> ItemTarget {
        match self {
            Self::Revive(_) => ItemTarget::EliminatedAlly,
            Self::Bomb(_) => ItemTarget::LivingEnemy,
            Self::RestoreHp(_) | Self::RestoreMp(_) | Self::Cure(_) => ItemTarget::LivingAlly,
        }
    }
}

/// Catalog entry for a consumable item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemDef {
    /// Item id.
    pub id: ItemId,
    /// Display name.
    pub name: String,
    /// Effect on use.
    pub effect: ItemEffect,
    /// Maximum Manhattan distance to the target.
    #[serde(default = "default_item_range")]
    pub range: u32,
}

const fn default_item_range() -> u32 {
    1
}

impl ItemDef {
    /// Create an item definition with range 1.
    #[must_use]
    pub fn new(id: impl Into<ItemId>, name: impl Into<String>, effect: ItemEffect) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            effect,
            range: default_item_range(),
        }
    }

    /// Set the use range.
    #[must_use]
    pub fn with_range(mut self, range: u32) -> Self {
        self.range = range;
        self
    }
}

/// Known item definitions, keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemCatalog {
    items: BTreeMap<ItemId, ItemDef>,
}

impl ItemCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A small catalog of common consumables.
    #[must_use]
    pub fn standard() -> Self {
        let mut catalog = Self::new();
        catalog.insert(ItemDef::new("potion", "Potion", ItemEffect::RestoreHp(50)));
        catalog.insert(ItemDef::new("ether", "Ether", ItemEffect::RestoreMp(30)));
        catalog.insert(ItemDef::new("phoenix-down", "Phoenix Down", ItemEffect::Revive(25)));
        catalog.insert(ItemDef::new("bomb", "Bomb", ItemEffect::Bomb(40)).with_range(3));
        catalog.insert(ItemDef::new("antidote", "Antidote", ItemEffect::Cure(StatusType::Poison)));
        catalog
    }

    /// Register or replace a definition.
    pub fn insert(&mut self, def: ItemDef) {
        self.items.insert(def.id.clone(), def);
    }

    /// Look up a definition.
    #[must_use]
    pub fn get(&self, id: &ItemId) -> Option<&ItemDef> {
        self.items.get(id)
    }

    /// All definitions in id order.
    pub fn iter(&self) -> impl Iterator<Item = &ItemDef> {
        self.items.values()
    }

    /// Number of definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl FromIterator<ItemDef> for ItemCatalog {
    fn from_iter<I: IntoIterator<Item = ItemDef>>(iter: I) -> Self {
        let mut catalog = Self::new();
        for def in iter {
            catalog.insert(def);
        }
        catalog
    }
}
