//! Item entity - Templates and their variants share one table.
//!
//! A template has `has_variants = true` and carries the `group_number` used to build
//! Saturn Codes. A variant points at its template through `variant_of` and holds the
//! assigned `saturn_code`, which is unique across the whole table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Variants are distinguished by item attributes.
pub const BASED_ON_ITEM_ATTRIBUTE: &str = "Item Attribute";
/// Variants are distinguished by manufacturer.
pub const BASED_ON_MANUFACTURER: &str = "Manufacturer";

/// Item database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "items")]
pub struct Model {
    /// Item identifier (e.g., "TSHIRT", "TSHIRT-RED-L")
    #[sea_orm(primary_key, auto_increment = false)]
    pub name: String,
    /// Display name, used to derive the code abbreviation
    pub item_name: String,
    /// Group number as entered; must parse as an integer before variants are created
    pub group_number: Option<String>,
    /// True for templates
    pub has_variants: bool,
    /// Template this item is a variant of, None for templates and plain items
    pub variant_of: Option<String>,
    /// What distinguishes variants of this template
    pub variant_based_on: String,
    /// Assigned Saturn Code, set once at creation
    #[sea_orm(unique)]
    pub saturn_code: Option<String>,
    /// When the item was created
    pub created_at: DateTime,
}

impl Model {
    /// Whether this item is a variant of some template.
    #[must_use]
    pub const fn is_variant(&self) -> bool {
        self.variant_of.is_some()
    }
}

/// Defines relationships between Item and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One variant has many attribute rows
    #[sea_orm(has_many = "super::item_variant_attribute::Entity")]
    Attributes,
}

impl Related<super::item_variant_attribute::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Attributes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
