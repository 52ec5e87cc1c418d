//! Sequence scanning for Saturn Codes.
//!
//! The last used sequence number is not stored anywhere. It is rebuilt on every call
//! by scanning the codes already assigned to a template's variants. [`CodeRegistry`]
//! is the seam the assigner talks to, so the scan can be replaced by a counter table
//! without touching the assignment logic.

use crate::{
    entities::{Item, item},
    errors::Result,
};
use sea_orm::{ConnectionTrait, prelude::*};
use std::future::Future;

/// Read access to the variant-code namespace.
pub trait CodeRegistry {
    /// Highest sequence number among the template's variant codes starting with `prefix`,
    /// or 0 when there are none.
    fn last_sequence(&self, template: &str, prefix: &str)
    -> impl Future<Output = Result<u64>> + Send;

    /// Name of the item currently holding `code`, anywhere in the system.
    fn code_owner(&self, code: &str) -> impl Future<Output = Result<Option<String>>> + Send;
}

impl<C: ConnectionTrait> CodeRegistry for C {
    async fn last_sequence(&self, template: &str, prefix: &str) -> Result<u64> {
        scan_max_sequence(self, template, prefix).await
    }

    async fn code_owner(&self, code: &str) -> Result<Option<String>> {
        find_code_owner(self, code).await
    }
}

/// Extracts the sequence number from a code: the part after the last `-`.
///
/// Returns None when that part is not an integer.
#[must_use]
pub fn parse_sequence(code: &str) -> Option<u64> {
    code.rsplit('-').next()?.parse().ok()
}

/// Highest parsable sequence among `codes`, 0 if none parse.
pub fn max_sequence<'a, I>(codes: I) -> u64
where
    I: IntoIterator<Item = &'a str>,
{
    codes
        .into_iter()
        .filter_map(parse_sequence)
        .max()
        .unwrap_or(0)
}

/// Scans the variants of `template` whose code starts with `prefix` and returns the
/// highest sequence in use.
///
/// Malformed codes are skipped. `LIKE` is case-insensitive and treats `_` as a
/// wildcard in `SQLite`, so matches are re-checked against the exact prefix.
pub async fn scan_max_sequence<C: ConnectionTrait>(
    conn: &C,
    template: &str,
    prefix: &str,
) -> Result<u64> {
    let variants = Item::find()
        .filter(item::Column::VariantOf.eq(template))
        .filter(item::Column::SaturnCode.starts_with(prefix))
        .all(conn)
        .await?;

    Ok(max_sequence(
        variants
            .iter()
            .filter_map(|variant| variant.saturn_code.as_deref())
            .filter(|code| code.starts_with(prefix)),
    ))
}

/// Finds the item holding `code`.
pub async fn find_code_owner<C: ConnectionTrait>(conn: &C, code: &str) -> Result<Option<String>> {
    Ok(Item::find()
        .filter(item::Column::SaturnCode.eq(code))
        .one(conn)
        .await?
        .map(|owner| owner.name))
}
