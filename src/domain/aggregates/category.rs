//! Category Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{CategoryId, Slug};
use crate::{Result, ShopError};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: Slug,
    pub created_at: DateTime<Utc>,
}

impl Category {
    /// Creates a category; the slug is derived from the name unless given.
    pub fn create(name: impl Into<String>, slug: Option<Slug>) -> Result<Self> {
        let name = name.into().trim().to_string();
        if name.is_empty() { return Err(ShopError::Validation("category name is empty".into())); }
        let slug = match slug {
            Some(slug) => slug,
            None => Slug::from_text(&name)?,
        };
        Ok(Self { id: CategoryId::new(), name, slug, created_at: Utc::now() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_derived_from_name() {
        let c = Category::create("Garden Furniture", None).unwrap();
        assert_eq!(c.slug.as_str(), "garden-furniture");
    }

    #[test]
    fn test_explicit_slug_kept() {
        let c = Category::create("Garden Furniture", Some(Slug::from_text("outdoor").unwrap())).unwrap();
        assert_eq!(c.slug.as_str(), "outdoor");
    }

    #[test]
    fn test_blank_name_rejected() {
        assert!(matches!(Category::create("  ", None), Err(ShopError::Validation(_))));
    }
}
