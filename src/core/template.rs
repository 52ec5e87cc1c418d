//! Template business logic - creating templates and guarding their fields.
//!
//! A template carries the group number and display name that every variant code is
//! built from. The group number must be a positive integer before variants exist,
//! and the basis for variants cannot change once the first variant is created.

use crate::{
    core::code::parse_group_number,
    entities::{Item, item},
    errors::{Error, Result},
};
use sea_orm::{ConnectionTrait, PaginatorTrait, Set, prelude::*};
use tracing::info;

/// Parses and checks a group number entered for a template.
fn validate_group_number(template: &str, value: &str) -> Result<String> {
    let group_number = parse_group_number(template, Some(value))?;
    if !group_number.parse::<i64>().is_ok_and(|n| n > 0) {
        return Err(Error::validation(format!(
            "Group Number for parent item '{template}' must be a positive integer"
        )));
    }
    Ok(group_number.to_string())
}

/// Loads a template by name.
///
/// # Errors
/// Returns [`Error::TemplateNotFound`] if no item with that name exists.
pub async fn get_template<C: ConnectionTrait>(conn: &C, name: &str) -> Result<item::Model> {
    Item::find_by_id(name)
        .one(conn)
        .await?
        .ok_or_else(|| Error::TemplateNotFound {
            name: name.to_string(),
        })
}

/// Creates a new template item.
///
/// # Errors
/// Returns an error if:
/// - The name or display name is empty or whitespace-only
/// - An item with the same name already exists
/// - The group number is given but is not a positive integer
/// - The database insert fails
pub async fn create_template(
    db: &DatabaseConnection,
    name: &str,
    item_name: &str,
    group_number: Option<&str>,
) -> Result<item::Model> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("Template name cannot be empty"));
    }
    if item_name.trim().is_empty() {
        return Err(Error::validation(format!(
            "Item name for template '{name}' cannot be empty"
        )));
    }

    let group_number = group_number
        .map(|value| validate_group_number(name, value))
        .transpose()?;

    if Item::find_by_id(name).one(db).await?.is_some() {
        return Err(Error::validation(format!("Item '{name}' already exists")));
    }

    let template = item::ActiveModel {
        name: Set(name.to_string()),
        item_name: Set(item_name.trim().to_string()),
        group_number: Set(group_number),
        has_variants: Set(true),
        variant_of: Set(None),
        variant_based_on: Set(item::BASED_ON_ITEM_ATTRIBUTE.to_string()),
        saturn_code: Set(None),
        created_at: Set(chrono::Utc::now().naive_utc()),
    };
    let template = template.insert(db).await?;
    info!("Created template {}", template.name);
    Ok(template)
}

/// Sets the group number of a template.
///
/// # Errors
/// Returns an error if the template does not exist or `value` is not a positive integer.
pub async fn set_group_number(
    db: &DatabaseConnection,
    template_name: &str,
    value: &str,
) -> Result<item::Model> {
    let group_number = validate_group_number(template_name, value)?;
    let mut template: item::ActiveModel = get_template(db, template_name).await?.into();

    template.group_number = Set(Some(group_number));
    let template = template.update(db).await?;
    info!(
        "Set group number of {} to {:?}",
        template.name, template.group_number
    );
    Ok(template)
}

/// Number of variants linked to a template.
pub async fn count_variants<C: ConnectionTrait>(conn: &C, template_name: &str) -> Result<u64> {
    Item::find()
        .filter(item::Column::VariantOf.eq(template_name))
        .count(conn)
        .await
        .map_err(Into::into)
}

/// Changes what a template's variants are based on.
///
/// # Errors
/// Returns an error if the value is not a known basis, the template does not exist,
/// or the basis changes after variants have been created.
pub async fn update_variant_based_on(
    db: &DatabaseConnection,
    template_name: &str,
    value: &str,
) -> Result<item::Model> {
    if value != item::BASED_ON_ITEM_ATTRIBUTE && value != item::BASED_ON_MANUFACTURER {
        return Err(Error::validation(format!(
            "Variant Based On must be '{}' or '{}'",
            item::BASED_ON_ITEM_ATTRIBUTE,
            item::BASED_ON_MANUFACTURER
        )));
    }

    let template = get_template(db, template_name).await?;
    if template.variant_based_on == value {
        return Ok(template);
    }
    if template.has_variants && count_variants(db, template_name).await? > 0 {
        return Err(Error::validation(
            "Variant Based On cannot be changed once variants are created",
        ));
    }

    let mut template: item::ActiveModel = template.into();
    template.variant_based_on = Set(value.to_string());
    template.update(db).await.map_err(Into::into)
}

/// Save-time checks for any item.
///
/// A variant's template must have a group number, and a group number, when present,
/// must be an integer.
pub async fn validate_item<C: ConnectionTrait>(conn: &C, item: &item::Model) -> Result<()> {
    if let Some(template_name) = &item.variant_of {
        let template = get_template(conn, template_name).await?;
        parse_group_number(&template.name, template.group_number.as_deref())?;
    }

    if item.group_number.is_some() {
        parse_group_number(&item.name, item.group_number.as_deref())?;
    }

    Ok(())
}
