//! Variant selections identifying a specific SKU of a configurable product.

use serde::{Deserialize, Serialize};

use super::id::{OptionId, VariantId};

/// One (option group, chosen option) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VariantChoice {
    /// The variant (option group) being configured, e.g. "Size".
    pub variant_id: VariantId,
    /// The chosen option within that group, e.g. "Large".
    pub option_id: OptionId,
}

impl VariantChoice {
    /// Create a new choice.
    #[must_use]
    pub const fn new(variant_id: VariantId, option_id: OptionId) -> Self {
        Self {
            variant_id,
            option_id,
        }
    }
}

/// The set of choices that pin down a purchasable SKU.
///
/// Stored in the order the shopper picked them, but compared as a set:
/// `[(size, L), (color, red)]` equals `[(color, red), (size, L)]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantSelection(Vec<VariantChoice>);

impl VariantSelection {
    /// A selection for a product without configurable variants.
    #[must_use]
    pub const fn none() -> Self {
        Self(Vec::new())
    }

    /// Build a selection from its choices, keeping their order.
    #[must_use]
    pub const fn new(choices: Vec<VariantChoice>) -> Self {
        Self(choices)
    }

    /// Choices in insertion order.
    #[must_use]
    pub fn choices(&self) -> &[VariantChoice] {
        &self.0
    }

    /// Whether no variant was chosen.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn canonical(&self) -> Vec<VariantChoice> {
        let mut choices = self.0.clone();
        choices.sort_unstable();
        choices.dedup();
        choices
    }
}

impl PartialEq for VariantSelection {
    fn eq(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }
}

impl Eq for VariantSelection {}

impl FromIterator<VariantChoice> for VariantSelection {
    fn from_iter<I: IntoIterator<Item = VariantChoice>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Vec<VariantChoice>> for VariantSelection {
    fn from(choices: Vec<VariantChoice>) -> Self {
        Self(choices)
    }
}
