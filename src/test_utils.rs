//! Shared test utilities.
//!
//! Helpers for setting up an in-memory database and inserting items directly,
//! bypassing validation so tests can build states the workflow would refuse.

use crate::{entities::item, errors::Result};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Inserts a template item as-is. The group number is stored without validation.
pub async fn create_test_template(
    db: &DatabaseConnection,
    name: &str,
    item_name: &str,
    group_number: Option<&str>,
) -> Result<item::Model> {
    item::ActiveModel {
        name: Set(name.to_string()),
        item_name: Set(item_name.to_string()),
        group_number: Set(group_number.map(ToString::to_string)),
        has_variants: Set(true),
        variant_of: Set(None),
        variant_based_on: Set(item::BASED_ON_ITEM_ATTRIBUTE.to_string()),
        saturn_code: Set(None),
        created_at: Set(chrono::Utc::now().naive_utc()),
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Inserts a variant of `template` holding `code`, without generating anything.
pub async fn insert_test_variant(
    db: &DatabaseConnection,
    template: &str,
    name: &str,
    code: Option<&str>,
) -> Result<item::Model> {
    item::ActiveModel {
        name: Set(name.to_string()),
        item_name: Set(name.to_string()),
        group_number: Set(None),
        has_variants: Set(false),
        variant_of: Set(Some(template.to_string())),
        variant_based_on: Set(item::BASED_ON_ITEM_ATTRIBUTE.to_string()),
        saturn_code: Set(code.map(ToString::to_string)),
        created_at: Set(chrono::Utc::now().naive_utc()),
    }
    .insert(db)
    .await
    .map_err(Into::into)
}
