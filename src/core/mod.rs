//! Core business logic - framework-agnostic template, variant and code operations.

/// Abbreviation derived from a template's display name
pub mod abbreviation;
/// Saturn Code assignment with collision retry
pub mod code;
/// Sequence scanning and the code registry seam
pub mod sequence;
/// Template item management and save-time validation
pub mod template;
/// Variant creation workflow
pub mod variant;
