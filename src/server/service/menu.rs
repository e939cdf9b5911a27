use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use rust_decimal::Decimal;

use crate::server::model::item::{MenuItem, MenuItemId};

/// Read side of the menu catalog, used to price incoming orders.
pub(crate) trait MenuCatalog: Send + Sync {
    fn lookup(&self, id: &str) -> Option<MenuItem>;

    fn list(&self) -> Vec<MenuItem>;
}

/// Catalog loaded once at start-up.
#[derive(Debug)]
pub(crate) struct StaticMenuCatalog {
    items: HashMap<MenuItemId, MenuItem>,
}

impl StaticMenuCatalog {
    pub fn from_items(items: impl IntoIterator<Item = MenuItem>) -> Self {
        Self {
            items: items.into_iter().map(|item| (item.id.clone(), item)).collect(),
        }
    }

    /// load a JSON array of menu items
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read menu seed {}", path.display()))?;
        let items: Vec<MenuItem> = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse menu seed {}", path.display()))?;
        Ok(Self::from_items(items))
    }

    /// the house menu used when no seed file is configured
    pub fn seeded() -> Self {
        let dish = |id: &str, name: &str, price: i64, category: &str| MenuItem {
            id: id.to_string(),
            name: name.to_string(),
            unit_price: Decimal::from(price),
            category: Some(category.to_string()),
            available: true,
        };
        Self::from_items([
            dish("murgh-malai-tikka", "Murgh Malai Tikka", 450, "Starters"),
            dish("paneer-makhani", "Paneer Makhani", 380, "Main Course"),
            dish("dal-nivedyam", "Dal Nivedyam", 290, "Main Course"),
            dish("garlic-naan", "Garlic Naan", 90, "Breads"),
        ])
    }
}

impl MenuCatalog for StaticMenuCatalog {
    fn lookup(&self, id: &str) -> Option<MenuItem> {
        self.items.get(id).cloned()
    }

    fn list(&self) -> Vec<MenuItem> {
        let mut items: Vec<_> = self.items.values().cloned().collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        items
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_menu_prices() {
        let menu = StaticMenuCatalog::seeded();
        assert_eq!(menu.lookup("garlic-naan").map(|i| i.unit_price), Some(Decimal::from(90)));
        assert!(menu.lookup("sushi").is_none());
        assert_eq!(menu.list().len(), 4);
    }

    #[test]
    fn load_reads_json_seed() {
        let path = std::env::temp_dir().join(format!("menu-seed-{}.json", uuid::Uuid::new_v4()));
        fs::write(&path, r#"[{"id": "chai", "name": "Masala Chai", "unitPrice": 40}]"#).unwrap();
        let menu = StaticMenuCatalog::load(&path).unwrap();
        fs::remove_file(&path).ok();
        let chai = menu.lookup("chai").unwrap();
        assert!(chai.available);
        assert_eq!(chai.unit_price, Decimal::from(40));
    }
}
