//! Variant business logic - creating variants of a template and giving each its code.
//!
//! Every path that creates or completes a variant goes through the same steps: check
//! the template's group number, derive the code inside a database transaction, and
//! write the code with the row. If another writer takes the code first, the unique
//! index rejects the insert and the whole assignment starts over.

use crate::{
    config::settings::CodeSettings,
    core::{
        code::{generate_code, parse_group_number},
        template::{get_template, validate_item},
    },
    entities::{Item, ItemVariantAttribute, item, item_variant_attribute},
    errors::{Error, Result},
};
use sea_orm::{
    ConnectionTrait, DbErr, QueryOrder, Set, SqlErr, TransactionTrait, prelude::*,
};
use std::collections::BTreeMap;
use std::future::Future;
use tracing::{debug, info, instrument, warn};

/// Attribute name to value, ordered by attribute name.
pub type Attributes = BTreeMap<String, String>;

/// Attribute name to the values to combine when creating variants in bulk.
pub type AttributeOptions = BTreeMap<String, Vec<String>>;

/// Outcome of [`backfill_missing_codes`].
#[derive(Debug, Default)]
pub struct BackfillReport {
    /// Variants that received a code, with the code
    pub assigned: Vec<(String, String)>,
    /// Variants that could not be coded, with the reason
    pub failed: Vec<(String, Error)>,
}

impl BackfillReport {
    /// Checks that every variant received a code.
    ///
    /// # Errors
    /// Returns [`Error::BackfillIncomplete`] when any variant was left without one.
    pub fn ensure_complete(&self) -> Result<()> {
        if self.failed.is_empty() {
            Ok(())
        } else {
            Err(Error::BackfillIncomplete {
                failed: self.failed.len(),
            })
        }
    }
}

/// Loads the template and checks that variants may be created for it.
///
/// # Errors
/// - [`Error::TemplateNotFound`] if the template does not exist
/// - [`Error::Validation`] if its group number is missing or not an integer
pub async fn validate_group_number_for_variant_creation<C: ConnectionTrait>(
    conn: &C,
    template_name: &str,
) -> Result<item::Model> {
    let template = get_template(conn, template_name).await?;
    parse_group_number(&template.name, template.group_number.as_deref())?;
    Ok(template)
}

/// Builds a variant's item name from its template and attribute values.
#[must_use]
pub fn make_variant_name(template_name: &str, attributes: &Attributes) -> String {
    let mut name = template_name.to_string();
    for value in attributes.values() {
        name.push('-');
        name.push_str(value);
    }
    name
}

/// Every combination of the given attribute values.
#[must_use]
pub fn attribute_combinations(options: &AttributeOptions) -> Vec<Attributes> {
    let mut combinations = vec![Attributes::new()];
    for (attribute, values) in options {
        combinations = combinations
            .into_iter()
            .flat_map(|combination| {
                values.iter().map(move |value| {
                    let mut next = combination.clone();
                    next.insert(attribute.clone(), value.clone());
                    next
                })
            })
            .collect();
    }
    combinations
}

/// Checks the attribute set and returns it with names and values trimmed.
fn normalize_attributes(attributes: &Attributes) -> Result<Attributes> {
    if attributes.is_empty() {
        return Err(Error::validation(
            "A variant needs at least one attribute value",
        ));
    }

    let mut normalized = Attributes::new();
    for (attribute, value) in attributes {
        let (attribute, value) = (attribute.trim(), value.trim());
        if attribute.is_empty() || value.is_empty() {
            return Err(Error::validation(format!(
                "Attribute '{attribute}' must have a non-empty name and value"
            )));
        }
        normalized.insert(attribute.to_string(), value.to_string());
    }
    Ok(normalized)
}

/// True when `err` is a unique-constraint failure on `items.saturn_code`.
#[must_use]
pub fn is_code_conflict(err: &DbErr) -> bool {
    matches!(
        err.sql_err(),
        Some(SqlErr::UniqueConstraintViolation(message)) if message.contains("saturn_code")
    )
}

/// Runs `op` until it succeeds, fails for another reason, or has lost the race for a
/// code `max_attempts` times.
async fn retry_on_code_conflict<T, F, Fut>(
    template_name: &str,
    max_attempts: u32,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    for attempt in 1..=max_attempts {
        match op().await {
            Err(Error::Database(err)) if is_code_conflict(&err) => {
                warn!(
                    "Code for a variant of {template_name} was taken concurrently (attempt {attempt}/{max_attempts})"
                );
            }
            result => return result,
        }
    }

    Err(Error::GenerationFailure {
        template: template_name.to_string(),
        attempts: max_attempts,
    })
}

/// Retrieves a variant by name.
pub async fn get_variant<C: ConnectionTrait>(conn: &C, name: &str) -> Result<item::Model> {
    Item::find_by_id(name)
        .one(conn)
        .await?
        .filter(item::Model::is_variant)
        .ok_or_else(|| Error::VariantNotFound {
            name: name.to_string(),
        })
}

/// Attribute values recorded for a variant.
pub async fn get_variant_attributes<C: ConnectionTrait>(
    conn: &C,
    variant_name: &str,
) -> Result<Attributes> {
    Ok(ItemVariantAttribute::find()
        .filter(item_variant_attribute::Column::Parent.eq(variant_name))
        .all(conn)
        .await?
        .into_iter()
        .map(|row| (row.attribute, row.attribute_value))
        .collect())
}

/// All variants of a template, ordered by code.
pub async fn list_variants<C: ConnectionTrait>(
    conn: &C,
    template_name: &str,
) -> Result<Vec<item::Model>> {
    Item::find()
        .filter(item::Column::VariantOf.eq(template_name))
        .order_by_asc(item::Column::SaturnCode)
        .order_by_asc(item::Column::Name)
        .all(conn)
        .await
        .map_err(Into::into)
}

/// Finds the variant of `template_name` with exactly `attributes`, if one exists.
pub async fn find_variant<C: ConnectionTrait>(
    conn: &C,
    template_name: &str,
    attributes: &Attributes,
) -> Result<Option<item::Model>> {
    let variants = Item::find()
        .filter(item::Column::VariantOf.eq(template_name))
        .order_by_asc(item::Column::Name)
        .find_with_related(ItemVariantAttribute)
        .all(conn)
        .await?;

    Ok(variants.into_iter().find_map(|(variant, rows)| {
        let existing: Attributes = rows
            .into_iter()
            .map(|row| (row.attribute, row.attribute_value))
            .collect();
        (&existing == attributes).then_some(variant)
    }))
}

/// Inserts the variant and its attributes with a freshly generated code, atomically.
async fn insert_variant(
    db: &DatabaseConnection,
    template: &item::Model,
    name: &str,
    attributes: &Attributes,
    settings: &CodeSettings,
) -> Result<item::Model> {
    let txn = db.begin().await?;

    let code = generate_code(&txn, template, Some(name), settings.max_collision_attempts).await?;

    let variant = item::ActiveModel {
        name: Set(name.to_string()),
        item_name: Set(name.to_string()),
        group_number: Set(None),
        has_variants: Set(false),
        variant_of: Set(Some(template.name.clone())),
        variant_based_on: Set(template.variant_based_on.clone()),
        saturn_code: Set(Some(code)),
        created_at: Set(chrono::Utc::now().naive_utc()),
    }
    .insert(&txn)
    .await?;
    validate_item(&txn, &variant).await?;

    for (attribute, value) in attributes {
        item_variant_attribute::ActiveModel {
            parent: Set(name.to_string()),
            attribute: Set(attribute.clone()),
            attribute_value: Set(value.clone()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
    }

    txn.commit().await?;
    Ok(variant)
}

/// Creates one variant of a template with its Saturn Code.
///
/// # Errors
/// Returns an error if:
/// - The attributes are empty or contain a blank name or value
/// - The template does not exist, is not a template, or lacks a valid group number
/// - A variant with the same attributes or name already exists
/// - No unique code could be produced within the configured ceilings
/// - A database operation fails
///
/// Nothing is written when an error is returned.
#[instrument(skip(db, settings))]
pub async fn create_variant(
    db: &DatabaseConnection,
    template_name: &str,
    attributes: &Attributes,
    settings: &CodeSettings,
) -> Result<item::Model> {
    let attributes = &normalize_attributes(attributes)?;
    let template = validate_group_number_for_variant_creation(db, template_name).await?;
    if !template.has_variants || template.is_variant() {
        return Err(Error::validation(format!(
            "Item '{template_name}' is not a template and cannot have variants"
        )));
    }

    if let Some(existing) = find_variant(db, template_name, attributes).await? {
        return Err(Error::VariantExists {
            name: existing.name,
        });
    }

    let name = make_variant_name(template_name, attributes);
    if Item::find_by_id(name.as_str()).one(db).await?.is_some() {
        return Err(Error::VariantExists { name });
    }

    let template = &template;
    let name = name.as_str();
    let variant = retry_on_code_conflict(template_name, settings.max_insert_attempts, move || {
        insert_variant(db, template, name, attributes, settings)
    })
    .await?;

    info!(
        "Created variant {} with code {}",
        variant.name,
        variant.saturn_code.as_deref().unwrap_or_default()
    );
    Ok(variant)
}

/// Creates a variant for every combination of `options` that does not exist yet.
///
/// Returns the variants created, in combination order. Combinations that already
/// exist are skipped.
#[instrument(skip(db, settings))]
pub async fn create_multiple_variants(
    db: &DatabaseConnection,
    template_name: &str,
    options: &AttributeOptions,
    settings: &CodeSettings,
) -> Result<Vec<item::Model>> {
    if options.is_empty() {
        return Err(Error::validation(
            "At least one attribute with values is required",
        ));
    }
    if let Some((attribute, _)) = options.iter().find(|(_, values)| values.is_empty()) {
        return Err(Error::validation(format!(
            "Attribute '{attribute}' has no values to combine"
        )));
    }
    validate_group_number_for_variant_creation(db, template_name).await?;

    let mut created = Vec::new();
    for attributes in attribute_combinations(options) {
        let attributes = normalize_attributes(&attributes)?;
        if let Some(existing) = find_variant(db, template_name, &attributes).await? {
            debug!("Skipping {}, already exists", existing.name);
            continue;
        }
        created.push(create_variant(db, template_name, &attributes, settings).await?);
    }

    info!(
        "Created {} variant(s) of {template_name}",
        created.len()
    );
    Ok(created)
}

/// Gives a code to a stored variant that has none.
async fn assign_missing_code(
    db: &DatabaseConnection,
    variant: &item::Model,
    settings: &CodeSettings,
) -> Result<String> {
    let Some(template_name) = variant.variant_of.as_deref() else {
        return Err(Error::VariantNotFound {
            name: variant.name.clone(),
        });
    };
    let template = validate_group_number_for_variant_creation(db, template_name).await?;

    let template = &template;
    retry_on_code_conflict(template_name, settings.max_insert_attempts, move || async move {
        let txn = db.begin().await?;
        let code = generate_code(
            &txn,
            template,
            Some(variant.name.as_str()),
            settings.max_collision_attempts,
        )
        .await?;

        let mut active: item::ActiveModel = variant.clone().into();
        active.saturn_code = Set(Some(code.clone()));
        let updated = active.update(&txn).await?;
        validate_item(&txn, &updated).await?;

        txn.commit().await?;
        Ok(code)
    })
    .await
}

/// Assigns codes to every variant stored without one.
///
/// Each variant is handled in its own transaction. Failures are collected in the
/// report rather than aborting the run.
pub async fn backfill_missing_codes(
    db: &DatabaseConnection,
    settings: &CodeSettings,
) -> Result<BackfillReport> {
    let variants = Item::find()
        .filter(item::Column::VariantOf.is_not_null())
        .filter(item::Column::SaturnCode.is_null())
        .order_by_asc(item::Column::CreatedAt)
        .order_by_asc(item::Column::Name)
        .all(db)
        .await?;

    let mut report = BackfillReport::default();
    for variant in variants {
        match assign_missing_code(db, &variant, settings).await {
            Ok(code) => {
                info!("Assigned {code} to {}", variant.name);
                report.assigned.push((variant.name, code));
            }
            Err(err) => {
                warn!("Could not assign a code to {}: {err}", variant.name);
                report.failed.push((variant.name, err));
            }
        }
    }

    Ok(report)
}
