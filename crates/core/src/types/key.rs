//! Composite line keys.
//!
//! A cart or wishlist line is identified by `(productId, variantId, size)`.
//! The remote store merges adds for an existing key; the types here only make
//! the key explicit and hashable.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::id::{ProductId, VariantId};

/// Errors that can occur when parsing a [`Size`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SizeError {
    /// The input string is empty (after trimming).
    #[error("size cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("size must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
}

/// A garment size label, e.g. `"M"`, `"Free Size"`, `"42"`.
///
/// ## Constraints
///
/// - Surrounding whitespace is trimmed
/// - Length: 1-32 characters
///
/// ## Examples
///
/// ```
/// use basket_sync_core::Size;
///
/// assert_eq!(Size::parse(" M ").map(|s| s.to_string()), Ok("M".to_string()));
/// assert!(Size::parse("   ").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct Size(String);

impl Size {
    /// Maximum length of a size label.
    pub const MAX_LENGTH: usize = 32;

    /// Parse a `Size` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is empty or longer than 32
    /// characters.
    pub fn parse(s: &str) -> Result<Self, SizeError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(SizeError::Empty);
        }

        if trimmed.chars().count() > Self::MAX_LENGTH {
            return Err(SizeError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// The one-size label used for unstitched garments and lines whose size
    /// the remote store did not report.
    #[must_use]
    pub fn free() -> Self {
        Self("Free Size".to_owned())
    }

    /// Returns the size label as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Size {
    type Err = SizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Size {
    type Error = SizeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Size> for String {
    fn from(size: Size) -> Self {
        size.0
    }
}

/// Composite key of a cart or wishlist line.
///
/// Serialized in the remote store's request shape
/// (`{"productId": .., "variantId": .., "size": ..}`), so it can be flattened
/// straight into mutation bodies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineKey {
    pub product_id: ProductId,
    pub variant_id: VariantId,
    pub size: Size,
}

impl LineKey {
    /// Create a new line key.
    #[must_use]
    pub const fn new(product_id: ProductId, variant_id: VariantId, size: Size) -> Self {
        Self {
            product_id,
            variant_id,
            size,
        }
    }
}

impl fmt::Display for LineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.product_id, self.variant_id, self.size)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_size_trims_whitespace() {
        assert_eq!(Size::parse("  XL\t").unwrap().as_str(), "XL");
    }

    #[test]
    fn test_size_rejects_empty() {
        assert_eq!(Size::parse(""), Err(SizeError::Empty));
        assert_eq!(Size::parse("   "), Err(SizeError::Empty));
    }

    #[test]
    fn test_size_rejects_too_long() {
        let long = "x".repeat(Size::MAX_LENGTH + 1);
        assert_eq!(
            Size::parse(&long),
            Err(SizeError::TooLong {
                max: Size::MAX_LENGTH
            })
        );
    }

    #[test]
    fn test_line_key_wire_shape() {
        let key = LineKey::new(
            ProductId::new("p1"),
            VariantId::new("v1"),
            Size::parse("M").unwrap(),
        );
        let json = serde_json::to_value(&key).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"productId": "p1", "variantId": "v1", "size": "M"})
        );
    }

    #[test]
    fn test_deserialized_size_is_validated() {
        let size: Size = serde_json::from_str(r#"" M ""#).unwrap();
        assert_eq!(size.as_str(), "M");
        assert!(serde_json::from_str::<Size>(r#""   ""#).is_err());

        let key = serde_json::json!({"productId": "p1", "variantId": "v1", "size": ""});
        assert!(serde_json::from_value::<LineKey>(key).is_err());
    }

    #[test]
    fn test_line_keys_with_different_sizes_are_distinct() {
        let small = LineKey::new(
            ProductId::new("p1"),
            VariantId::new("v1"),
            Size::parse("S").unwrap(),
        );
        let large = LineKey {
            size: Size::parse("L").unwrap(),
            ..small.clone()
        };
        assert_ne!(small, large);
        assert_eq!(small.to_string(), "p1/v1/S");
    }
}
