use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub(crate) type MenuItemId = String;

/// A dish as the menu catalog knows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MenuItem {
    pub id: MenuItemId,
    pub name: String,
    pub unit_price: Decimal,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "available_by_default")]
    pub available: bool,
}

fn available_by_default() -> bool {
    true
}

/// A priced line of an order, copied from the catalog at creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Item {
    pub menu_item_id: MenuItemId,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    #[serde(default)]
    pub notes: String,
}

impl Item {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// A line as submitted by the customer; priced against the catalog.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ItemInput {
    pub menu_item_id: MenuItemId,
    pub quantity: i64,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct GetMenuResponse {
    pub items: Vec<MenuItem>,
}
