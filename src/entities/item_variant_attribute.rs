//! Variant attribute entity - The options that distinguish one variant from its siblings.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Variant attribute database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "item_variant_attributes")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Name of the variant item this row belongs to
    pub parent: String,
    /// Attribute name (e.g., "Colour")
    pub attribute: String,
    /// Attribute value (e.g., "Red")
    pub attribute_value: String,
}

/// Defines relationships between attribute rows and items
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each attribute row belongs to one variant item
    #[sea_orm(
        belongs_to = "super::item::Entity",
        from = "Column::Parent",
        to = "super::item::Column::Name"
    )]
    Item,
}

impl Related<super::item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Item.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
