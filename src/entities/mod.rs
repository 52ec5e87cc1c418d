//! Entity module - Contains all SeaORM entity definitions for the database.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod item;
pub mod item_variant_attribute;

// Re-export specific types to avoid conflicts
pub use item::{Column as ItemColumn, Entity as Item, Model as ItemModel};
pub use item_variant_attribute::{
    Column as ItemVariantAttributeColumn, Entity as ItemVariantAttribute,
    Model as ItemVariantAttributeModel,
};
