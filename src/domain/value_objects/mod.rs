//! Value Objects for the storefront

use serde::{Deserialize, Serialize};
use std::fmt;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use crate::ShopError;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self { Self(Uuid::now_v7()) }
            pub fn from_uuid(id: Uuid) -> Self { Self(id) }
            pub fn as_uuid(&self) -> Uuid { self.0 }
        }

        impl Default for $name {
            fn default() -> Self { Self::new() }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self { Self(id) }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
        }
    };
}

entity_id!(CategoryId);
entity_id!(ProductId);
entity_id!(LineItemId);
entity_id!(CartId);
entity_id!(OrderId);
entity_id!(CommentId);
entity_id!(UserId);
entity_id!(AccountId);
entity_id!(ConversationId);
entity_id!(MessageId);

/// Line item quantity. Never below [`Quantity::MINIMUM`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u32", from = "u32")]
pub struct Quantity(u32);

impl Quantity {
    /// Minimum order quantity of a single line.
    pub const MINIMUM: u32 = 1000;

    /// Builds a quantity, raising anything below the minimum up to it.
    pub fn new(value: u32) -> Self { Self(value.max(Self::MINIMUM)) }
    pub fn value(&self) -> u32 { self.0 }
    pub fn add(&self, other: u32) -> Self { Self::new(self.0.saturating_add(other)) }
    pub fn meets_minimum(value: u32) -> bool { value >= Self::MINIMUM }
}

impl Default for Quantity { fn default() -> Self { Self(Self::MINIMUM) } }

impl From<u32> for Quantity { fn from(value: u32) -> Self { Self::new(value) } }
impl From<Quantity> for u32 { fn from(q: Quantity) -> Self { q.0 } }

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// URL-safe handle derived from a name or a reference number.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    pub fn from_text(text: &str) -> Result<Self, ShopError> {
        let slug = slugify(text);
        if slug.is_empty() {
            return Err(ShopError::Validation(format!("cannot derive a slug from {text:?}")));
        }
        Ok(Self(slug))
    }

    /// Wraps a value read back from storage.
    pub fn from_stored(value: String) -> Self { Self(value) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Transliterates accented letters to ASCII (NFKD, combining marks dropped), lowercases,
/// keeps ASCII alphanumerics and underscores, and joins words with single hyphens.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.trim().nfkd().filter(|c| !is_combining_mark(*c)) {
        if c.is_ascii_alphanumeric() || c == '_' {
            if pending_dash && !slug.is_empty() { slug.push('-'); }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else if c.is_whitespace() || c == '-' {
            pending_dash = true;
        }
    }
    slug
}

/// Public reference of an order.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefNumber(String);

impl RefNumber {
    pub fn new(value: impl Into<String>) -> Self { Self(value.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
    pub fn slug(&self) -> Result<Slug, ShopError> { Slug::from_text(&self.0) }
}

impl fmt::Display for RefNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Employee registration number, the key customer accounts are assigned by.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegNumber(String);

impl RegNumber {
    pub fn new(value: impl Into<String>) -> Self { Self(value.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for RegNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_floor() {
        assert_eq!(Quantity::new(123).value(), 1000);
        assert_eq!(Quantity::new(0).value(), 1000);
        assert_eq!(Quantity::new(1234).value(), 1234);
        assert_eq!(Quantity::new(1234).add(123).value(), 1357);
    }

    #[test]
    fn test_quantity_deserializes_through_floor() {
        let q: Quantity = serde_json::from_str("12").unwrap();
        assert_eq!(q.value(), 1000);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Office Chairs"), "office-chairs");
        assert_eq!(slugify("  Tables -- & Desks "), "tables-desks");
        assert_eq!(slugify("x7k2q9"), "x7k2q9");
        assert!(Slug::from_text("&&&").is_err());
    }

    #[test]
    fn test_slugify_transliterates_accents() {
        assert_eq!(slugify("Chaise élégante"), "chaise-elegante");
        assert_eq!(slugify("Été"), "ete");
        assert_eq!(slugify("Crème brûlée à l'ancienne"), "creme-brulee-a-lancienne");
        assert_eq!(slugify("ＡＢＣ Ｎº１"), "abc-no1");
        assert_ne!(slugify("Table élégante"), slugify("Table légante"));
    }

    #[test]
    fn test_ids_are_distinct() {
        assert_ne!(OrderId::new(), OrderId::new());
    }
}
