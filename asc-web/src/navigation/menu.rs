//! Navigation menu model
//!
//! Field names follow the PascalCase layout of `Navigation.json`.

use super::{NavigationError, NavigationResult};
use serde::{Deserialize, Serialize};

const DEFAULT_MENU: &str = include_str!("../../navigation/Navigation.json");

/// Root of the menu definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NavigationMenu {
    pub menu_items: Vec<NavigationMenuItem>,
}

/// One entry of the side menu
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NavigationMenuItem {
    pub display_name: String,
    #[serde(default)]
    pub material_icon: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub is_nested: bool,
    #[serde(default)]
    pub sequence: i32,
    /// Roles allowed to see the item; empty means everyone
    #[serde(default)]
    pub user_roles: Vec<String>,
    #[serde(default)]
    pub nested_items: Vec<NavigationMenuItem>,
}

impl NavigationMenu {
    /// The menu shipped with the application
    pub fn builtin() -> NavigationResult<Self> {
        Self::from_json(DEFAULT_MENU)
    }

    /// Parse and validate a menu definition
    pub fn from_json(json: &str) -> NavigationResult<Self> {
        let menu: Self = serde_json::from_str(json)?;
        menu.validate()?;
        Ok(menu)
    }

    pub fn validate(&self) -> NavigationResult<()> {
        self.menu_items.iter().try_for_each(|item| item.validate())
    }

    /// Items the given roles may see, ordered by sequence. Nested parents
    /// left without visible children are dropped.
    pub fn visible_for(&self, roles: &[String]) -> Self {
        Self {
            menu_items: filter_items(&self.menu_items, roles),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.menu_items.is_empty()
    }
}

impl NavigationMenuItem {
    pub fn is_visible_to(&self, roles: &[String]) -> bool {
        self.user_roles.is_empty()
            || self
                .user_roles
                .iter()
                .any(|allowed| roles.iter().any(|r| r.eq_ignore_ascii_case(allowed)))
    }

    fn validate(&self) -> NavigationResult<()> {
        if self.display_name.trim().is_empty() {
            return Err(NavigationError::InvalidMenu(
                "menu item without a display name".to_string(),
            ));
        }

        if self.is_nested {
            if self.nested_items.is_empty() {
                return Err(NavigationError::InvalidMenu(format!(
                    "'{}' is nested but has no items",
                    self.display_name
                )));
            }
            self.nested_items.iter().try_for_each(|item| item.validate())
        } else if self.link.trim().is_empty() {
            Err(NavigationError::InvalidMenu(format!(
                "'{}' has no link",
                self.display_name
            )))
        } else {
            Ok(())
        }
    }
}

fn filter_items(items: &[NavigationMenuItem], roles: &[String]) -> Vec<NavigationMenuItem> {
    let mut visible: Vec<NavigationMenuItem> = items
        .iter()
        .filter(|item| item.is_visible_to(roles))
        .filter_map(|item| {
            let mut item = item.clone();
            if item.is_nested {
                item.nested_items = filter_items(&item.nested_items, roles);
                if item.nested_items.is_empty() {
                    return None;
                }
            }
            Some(item)
        })
        .collect();

    visible.sort_by_key(|item| item.sequence);
    visible
}
