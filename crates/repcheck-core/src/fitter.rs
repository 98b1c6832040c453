//! Fitting manuscript text into a model's input budget.
//!
//! Two explicit truncation policies exist:
//! - [`TakeFrom::Tail`] keeps the end of the text. Methods and results
//!   sections, which carry most reproducibility detail, sit later in a
//!   manuscript than title pages and front matter.
//! - [`TakeFrom::Head`] keeps the beginning, for metadata extraction where
//!   title, authors and abstract come first.
//!
//! Callers always name the policy; there is no implicit default per call site.

use serde::{Deserialize, Serialize};

/// Which end of the text survives truncation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TakeFrom {
    Head,
    Tail,
}

/// Estimates how many budget units (tokens) a piece of text costs.
pub trait UnitEstimator {
    /// Units consumed by `text`.
    fn estimate(&self, text: &str) -> usize;

    /// Fixed characters-per-unit ratio used to turn a unit budget back
    /// into a character count.
    fn chars_per_unit(&self) -> usize;
}

/// Ratio-based estimator: one unit per `chars_per_unit` characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharRatioEstimator {
    chars_per_unit: usize,
}

impl CharRatioEstimator {
    pub fn new(chars_per_unit: usize) -> Self {
        Self {
            chars_per_unit: chars_per_unit.max(1),
        }
    }
}

impl Default for CharRatioEstimator {
    fn default() -> Self {
        Self::new(4)
    }
}

impl UnitEstimator for CharRatioEstimator {
    fn estimate(&self, text: &str) -> usize {
        text.chars().count() / self.chars_per_unit
    }

    fn chars_per_unit(&self) -> usize {
        self.chars_per_unit
    }
}

/// Truncate `text` so it fits in `max_units`.
///
/// Text that already fits is returned unchanged. Otherwise exactly
/// `max_units * chars_per_unit` characters are kept from the chosen end.
/// A zero budget always yields an empty string.
pub fn fit(text: &str, max_units: usize, estimator: &dyn UnitEstimator, take_from: TakeFrom) -> String {
    if max_units == 0 {
        return String::new();
    }
    if estimator.estimate(text) <= max_units {
        return text.to_string();
    }

    let max_chars = max_units.saturating_mul(estimator.chars_per_unit());
    let total_chars = text.chars().count();
    if max_chars >= total_chars {
        return text.to_string();
    }

    let kept = match take_from {
        TakeFrom::Head => text.chars().take(max_chars).collect::<String>(),
        TakeFrom::Tail => {
            // Slice on a char boundary so multi-byte text is never split.
            let start = text
                .char_indices()
                .nth(total_chars - max_chars)
                .map(|(idx, _)| idx)
                .unwrap_or(text.len());
            text[start..].to_string()
        }
    };

    tracing::debug!(
        original_chars = total_chars,
        kept_chars = max_chars,
        policy = ?take_from,
        "Truncated text to fit unit budget"
    );

    kept
}

/// A fitter bound to one estimator, so call sites only pick budget and policy.
#[derive(Debug, Clone, Default)]
pub struct TextBudgetFitter<E: UnitEstimator = CharRatioEstimator> {
    estimator: E,
}

impl<E: UnitEstimator> TextBudgetFitter<E> {
    pub fn new(estimator: E) -> Self {
        Self { estimator }
    }

    pub fn estimator(&self) -> &E {
        &self.estimator
    }

    pub fn estimate(&self, text: &str) -> usize {
        self.estimator.estimate(text)
    }

    pub fn fit(&self, text: &str, max_units: usize, take_from: TakeFrom) -> String {
        fit(text, max_units, &self.estimator, take_from)
    }
}
