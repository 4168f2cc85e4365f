//! Multilingual movement annotations.
//!
//! Provides input validation for per-language title/notes and the language
//! fallback used by every read path.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use validator::Validate;

use crate::error::CoreError;
use crate::movement::MovementAnnotation;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum length of an annotation title in characters.
pub const MAX_TITLE_LENGTH: u64 = 255;

/// Maximum length of annotation notes in characters.
pub const MAX_NOTES_LENGTH: u64 = 10_000;

/// Language used when none is configured.
pub const FALLBACK_LANGUAGE: &str = "en";

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Title and notes for one language, as supplied on create or amend.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AnnotationInput {
    #[validate(length(min = 2, max = 10))]
    pub language: String,
    #[validate(length(max = 255))]
    pub title: Option<String>,
    #[validate(length(max = 10000))]
    pub notes: Option<String>,
}

fn language_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z]{2,3}(-[A-Z0-9]{2,3})?$").expect("language pattern is valid")
    })
}

/// Validate a language code such as `en`, `pt-BR` or `es-419`.
pub fn validate_language_code(code: &str) -> Result<(), String> {
    if language_pattern().is_match(code) {
        Ok(())
    } else {
        Err(format!(
            "Invalid language code '{code}'. Expected e.g. 'en' or 'pt-BR'"
        ))
    }
}

/// Validate a batch of annotation inputs.
///
/// Each input must pass its field rules and carry a well-formed language
/// code; a language may appear at most once per batch.
pub fn validate_annotations(inputs: &[AnnotationInput]) -> Result<(), CoreError> {
    let mut seen = HashSet::with_capacity(inputs.len());
    for input in inputs {
        input
            .validate()
            .map_err(|e| CoreError::Validation(e.to_string()))?;
        validate_language_code(&input.language).map_err(CoreError::Validation)?;
        if !seen.insert(input.language.as_str()) {
            return Err(CoreError::Conflict(format!(
                "Duplicate annotation language '{}'",
                input.language
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Language selection
// ---------------------------------------------------------------------------

/// Pick the annotation to show for a request.
///
/// Order of preference: the requested language, then the default language,
/// then the first stored annotation.
pub fn select_annotation<'a>(
    annotations: &'a [MovementAnnotation],
    requested: Option<&str>,
    default_language: &str,
) -> Option<&'a MovementAnnotation> {
    requested
        .and_then(|lang| annotations.iter().find(|a| a.language == lang))
        .or_else(|| annotations.iter().find(|a| a.language == default_language))
        .or_else(|| annotations.first())
}

/// Language codes present on a movement, in stored order.
pub fn available_languages(annotations: &[MovementAnnotation]) -> Vec<String> {
    annotations.iter().map(|a| a.language.clone()).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
