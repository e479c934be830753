use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type PartId = String;

/// Inventario completo indexado por id de repuesto.
/// BTreeMap para que el orden de las filas sea siempre el mismo.
pub type Inventory = BTreeMap<PartId, InventoryItem>;

pub const DEFAULT_UNIT: &str = "pieces";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub name: String,
    pub quantity: i64,
    pub min_stock: i64,
    #[serde(default)]
    pub unit: Option<String>,
}

impl InventoryItem {
    /// Se calcula al renderizar, nunca se guarda.
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.min_stock
    }

    pub fn unit(&self) -> &str {
        self.unit.as_deref().unwrap_or(DEFAULT_UNIT)
    }
}
