//! Saturn Code assignment.
//!
//! A code has the shape `<group_number><abbreviation>-<sequence>` with the sequence
//! zero-padded to three digits, e.g. `42WID-003`. Sequences are counted per
//! (template, abbreviation) but codes are unique across every item, so a candidate
//! that is already taken elsewhere is skipped until a free one is found or the
//! collision ceiling is hit.
//!
//! Assignment only reads. The caller persists the code together with the variant,
//! and the unique index on `saturn_code` rejects a writer that lost a race.

use crate::{
    config::settings::CodeSettings,
    core::{abbreviation::derive_abbreviation, sequence::CodeRegistry},
    entities::{Item, item},
    errors::{Error, Result},
};
use sea_orm::{ConnectionTrait, EntityTrait};
use std::fmt::Display;
use tracing::{debug, warn};

/// Formats a Saturn Code from its parts.
#[must_use]
pub fn format_code(group_number: impl Display, abbreviation: &str, sequence: u64) -> String {
    format!("{group_number}{abbreviation}-{sequence:03}")
}

/// The shared prefix of every code in one (group number, abbreviation) scope.
#[must_use]
pub fn code_prefix(group_number: impl Display, abbreviation: &str) -> String {
    format!("{group_number}{abbreviation}-")
}

/// Checks a template's group number and returns it trimmed, as it goes into codes.
///
/// The stored text is kept as entered (`"042"` stays `"042"`) so prefixes match
/// codes assigned before.
///
/// # Errors
/// Returns [`Error::Validation`] naming `template` when the value is missing, blank
/// or not an integer.
pub fn parse_group_number<'a>(template: &str, group_number: Option<&'a str>) -> Result<&'a str> {
    let raw = group_number.map(str::trim).filter(|value| !value.is_empty());
    let Some(raw) = raw else {
        return Err(Error::validation(format!(
            "You must enter Group Number for parent item '{template}' before creating variants"
        )));
    };

    raw.parse::<i64>().map_err(|_| {
        Error::validation(format!(
            "Group Number for parent item '{template}' must be an integer, got '{raw}'"
        ))
    })?;
    Ok(raw)
}

fn sequence_overflow(template: &item::Model, attempts: u32) -> Error {
    warn!(
        "Sequence space exhausted for template {}, a sibling code holds the largest sequence",
        template.name
    );
    Error::GenerationFailure {
        template: template.name.clone(),
        attempts,
    }
}

/// Assigns a code for a new variant of `template_name` using the default ceilings.
///
/// `variant_name` identifies the variant being coded, when it already exists; if it
/// already holds the candidate code, that code is returned unchanged.
pub async fn assign_code<C: ConnectionTrait>(
    conn: &C,
    template_name: &str,
    variant_name: Option<&str>,
) -> Result<String> {
    assign_code_with(conn, template_name, variant_name, &CodeSettings::default()).await
}

/// Same as [`assign_code`] with explicit retry ceilings.
pub async fn assign_code_with<C: ConnectionTrait>(
    conn: &C,
    template_name: &str,
    variant_name: Option<&str>,
    settings: &CodeSettings,
) -> Result<String> {
    let template = Item::find_by_id(template_name)
        .one(conn)
        .await?
        .ok_or_else(|| Error::TemplateNotFound {
            name: template_name.to_string(),
        })?;

    generate_code(conn, &template, variant_name, settings.max_collision_attempts).await
}

/// Derives a code for a variant of `template`, consulting `registry` for the last
/// sequence and for collisions.
///
/// # Errors
/// - [`Error::Validation`] if the template's group number is missing or not an
///   integer. Nothing is scanned in that case.
/// - [`Error::GenerationFailure`] once the collision counter exceeds `max_attempts`.
pub async fn generate_code<R: CodeRegistry>(
    registry: &R,
    template: &item::Model,
    variant_name: Option<&str>,
    max_attempts: u32,
) -> Result<String> {
    let group_number = parse_group_number(&template.name, template.group_number.as_deref())?;
    let abbreviation = derive_abbreviation(&template.item_name);
    let prefix = code_prefix(group_number, &abbreviation);

    let last_sequence = registry.last_sequence(&template.name, &prefix).await?;
    let first = last_sequence
        .checked_add(1)
        .ok_or_else(|| sequence_overflow(template, 0))?;
    let mut code = format_code(group_number, &abbreviation, first);

    let mut counter: u32 = 1;
    while let Some(owner) = registry.code_owner(&code).await? {
        if variant_name == Some(owner.as_str()) {
            debug!("Variant {owner} already holds {code}");
            break;
        }
        if counter > max_attempts {
            warn!(
                "Gave up assigning a code for template {} after {max_attempts} collisions",
                template.name
            );
            return Err(Error::GenerationFailure {
                template: template.name.clone(),
                attempts: max_attempts,
            });
        }

        debug!("Code {code} is held by {owner}, retrying");
        let sequence = last_sequence
            .checked_add(u64::from(counter))
            .ok_or_else(|| sequence_overflow(template, counter))?;
        code = format_code(group_number, &abbreviation, sequence);
        counter += 1;
    }

    Ok(code)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory registry: code -> (owner, template).
    #[derive(Default)]
    struct MemoryRegistry {
        codes: HashMap<String, (String, String)>,
        scans: AtomicUsize,
    }

    impl MemoryRegistry {
        fn with(mut self, code: &str, owner: &str, template: &str) -> Self {
            self.codes
                .insert(code.to_string(), (owner.to_string(), template.to_string()));
            self
        }
    }

    impl CodeRegistry for MemoryRegistry {
        async fn last_sequence(&self, template: &str, prefix: &str) -> Result<u64> {
            self.scans.fetch_add(1, Ordering::SeqCst);
            Ok(crate::core::sequence::max_sequence(
                self.codes
                    .iter()
                    .filter(|(code, (_, t))| t == template && code.starts_with(prefix))
                    .map(|(code, _)| code.as_str()),
            ))
        }

        async fn code_owner(&self, code: &str) -> Result<Option<String>> {
            Ok(self.codes.get(code).map(|(owner, _)| owner.clone()))
        }
    }

    fn template(group_number: Option<&str>, item_name: &str) -> item::Model {
        item::Model {
            name: "WIDGET".to_string(),
            item_name: item_name.to_string(),
            group_number: group_number.map(ToString::to_string),
            has_variants: true,
            variant_of: None,
            variant_based_on: item::BASED_ON_ITEM_ATTRIBUTE.to_string(),
            saturn_code: None,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    #[test]
    fn test_format_code_pads_to_three_digits() {
        assert_eq!(format_code(42, "WID", 3), "42WID-003");
        assert_eq!(format_code(7, "RG", 42), "7RG-042");
        assert_eq!(format_code(42, "WID", 1000), "42WID-1000");
    }

    #[test]
    fn test_parse_group_number() {
        assert_eq!(parse_group_number("T", Some("42")).unwrap(), "42");
        assert_eq!(parse_group_number("T", Some(" 042 ")).unwrap(), "042");

        let missing = parse_group_number("T", None).unwrap_err();
        assert!(missing.to_string().contains("'T'"));
        assert!(matches!(
            parse_group_number("T", Some("  ")),
            Err(Error::Validation { message: _ })
        ));

        let invalid = parse_group_number("T", Some("4x")).unwrap_err();
        assert!(matches!(invalid, Error::Validation { message: _ }));
        assert!(invalid.to_string().contains("'T'"));
    }

    #[tokio::test]
    async fn test_next_code_follows_existing_siblings() -> Result<()> {
        let registry = MemoryRegistry::default()
            .with("42WID-001", "WIDGET-A", "WIDGET")
            .with("42WID-002", "WIDGET-B", "WIDGET");

        let code = generate_code(&registry, &template(Some("42"), "Widget"), None, 1000).await?;
        assert_eq!(code, "42WID-003");
        Ok(())
    }

    #[tokio::test]
    async fn test_generation_is_deterministic() -> Result<()> {
        let registry = MemoryRegistry::default().with("42WID-001", "WIDGET-A", "WIDGET");
        let template = template(Some("42"), "Widget");

        let first = generate_code(&registry, &template, None, 1000).await?;
        let second = generate_code(&registry, &template, None, 1000).await?;
        assert_eq!(first, second);
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_sibling_codes_are_ignored() -> Result<()> {
        let registry = MemoryRegistry::default()
            .with("42WID-001", "WIDGET-A", "WIDGET")
            .with("42WID-abc", "WIDGET-B", "WIDGET");

        let code = generate_code(&registry, &template(Some("42"), "Widget"), None, 1000).await?;
        assert_eq!(code, "42WID-002");
        Ok(())
    }

    #[tokio::test]
    async fn test_code_taken_by_other_template_is_skipped() -> Result<()> {
        let registry = MemoryRegistry::default()
            .with("42WID-001", "WIDGET-A", "WIDGET")
            .with("42WID-002", "WIDGET-B", "WIDGET")
            .with("42WID-003", "GADGET-A", "GADGET");

        let code = generate_code(&registry, &template(Some("42"), "Widget"), None, 1000).await?;
        assert_eq!(code, "42WID-004");
        Ok(())
    }

    #[tokio::test]
    async fn test_variant_already_holding_code_keeps_it() -> Result<()> {
        // WIDGET-C holds 003 but is not linked to the template yet, so the scan misses it
        let registry = MemoryRegistry::default()
            .with("42WID-001", "WIDGET-A", "WIDGET")
            .with("42WID-002", "WIDGET-B", "WIDGET")
            .with("42WID-003", "WIDGET-C", "");

        let code = generate_code(
            &registry,
            &template(Some("42"), "Widget"),
            Some("WIDGET-C"),
            1000,
        )
        .await?;
        assert_eq!(code, "42WID-003");

        let code = generate_code(
            &registry,
            &template(Some("42"), "Widget"),
            Some("WIDGET-D"),
            1000,
        )
        .await?;
        assert_eq!(code, "42WID-004");
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_group_number_fails_before_scanning() {
        let registry = MemoryRegistry::default();

        let result = generate_code(&registry, &template(None, "Widget"), None, 1000).await;
        assert!(matches!(result, Err(Error::Validation { message: _ })));

        let result = generate_code(&registry, &template(Some("forty"), "Widget"), None, 1000).await;
        assert!(matches!(result, Err(Error::Validation { message: _ })));

        assert_eq!(registry.scans.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_exhausted_collisions_fail() {
        let mut registry = MemoryRegistry::default();
        for sequence in 1..=1000 {
            registry = registry.with(&format_code(42, "WID", sequence), "ELSEWHERE", "GADGET");
        }

        let result = generate_code(&registry, &template(Some("42"), "Widget"), None, 1000).await;
        assert!(matches!(
            result,
            Err(Error::GenerationFailure {
                attempts: 1000,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_last_free_slot_within_ceiling_is_found() -> Result<()> {
        let mut registry = MemoryRegistry::default();
        for sequence in 1..=999 {
            registry = registry.with(&format_code(42, "WID", sequence), "ELSEWHERE", "GADGET");
        }

        let code = generate_code(&registry, &template(Some("42"), "Widget"), None, 1000).await?;
        assert_eq!(code, "42WID-1000");
        Ok(())
    }

    #[tokio::test]
    async fn test_leading_zeros_in_group_number_are_kept() -> Result<()> {
        let registry = MemoryRegistry::default().with("042WID-001", "WIDGET-A", "WIDGET");

        let code = generate_code(&registry, &template(Some(" 042 "), "Widget"), None, 1000).await?;
        assert_eq!(code, "042WID-002");
        Ok(())
    }

    #[tokio::test]
    async fn test_largest_sibling_sequence_fails_instead_of_wrapping() {
        let registry = MemoryRegistry::default().with(
            &format_code(42, "WID", u64::MAX),
            "WIDGET-A",
            "WIDGET",
        );

        let result = generate_code(&registry, &template(Some("42"), "Widget"), None, 1000).await;
        assert!(matches!(
            result,
            Err(Error::GenerationFailure { template, .. }) if template == "WIDGET"
        ));
    }

    #[tokio::test]
    async fn test_largest_sibling_sequence_in_database() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_template(&db, "WIDGET", "Widget", Some("42")).await?;
        insert_test_variant(&db, "WIDGET", "WIDGET-A", Some("42WID-18446744073709551615")).await?;

        let result = assign_code(&db, "WIDGET", None).await;
        assert!(matches!(result, Err(Error::GenerationFailure { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_assign_code_unknown_template() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_results([Vec::<item::Model>::new()])
            .into_connection();

        let result = assign_code(&db, "MISSING", None).await;
        assert!(matches!(result, Err(Error::TemplateNotFound { name: _ })));
    }

    #[tokio::test]
    async fn test_assign_code_against_database() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_template(&db, "WIDGET", "Widget", Some("42")).await?;
        insert_test_variant(&db, "WIDGET", "WIDGET-A", Some("42WID-001")).await?;
        insert_test_variant(&db, "WIDGET", "WIDGET-B", Some("42WID-002")).await?;

        assert_eq!(assign_code(&db, "WIDGET", None).await?, "42WID-003");
        Ok(())
    }

    #[tokio::test]
    async fn test_assign_code_with_small_ceiling() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_template(&db, "WIDGET", "Widget", Some("42")).await?;
        create_test_template(&db, "GADGET", "Gadget", Some("1")).await?;
        insert_test_variant(&db, "GADGET", "GADGET-A", Some("42WID-001")).await?;
        insert_test_variant(&db, "GADGET", "GADGET-B", Some("42WID-002")).await?;

        let settings = CodeSettings {
            max_collision_attempts: 2,
            ..CodeSettings::default()
        };
        let result = assign_code_with(&db, "WIDGET", None, &settings).await;
        assert!(matches!(
            result,
            Err(Error::GenerationFailure { template, attempts: 2 }) if template == "WIDGET"
        ));

        // One more retry reaches the free slot
        let settings = CodeSettings {
            max_collision_attempts: 3,
            ..CodeSettings::default()
        };
        assert_eq!(
            assign_code_with(&db, "WIDGET", None, &settings).await?,
            "42WID-003"
        );
        Ok(())
    }
}
