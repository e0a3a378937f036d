//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::pricing::check_price;
use crate::domain::value_objects::{CategoryId, ProductId, Slug};
use crate::{Result, ShopError};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub slug: Slug,
    pub description: String,
    pub price: Decimal,
    pub category_id: Option<CategoryId>,
    pub created_at: DateTime<Utc>,
}

impl Product {
    pub fn create(
        name: impl Into<String>,
        description: impl Into<String>,
        price: Decimal,
        category_id: Option<CategoryId>,
    ) -> Result<Self> {
        let name = name.into().trim().to_string();
        if name.is_empty() { return Err(ShopError::Validation("product name is empty".into())); }
        check_price(price)?;
        let slug = Slug::from_text(&name)?;
        Ok(Self {
            id: ProductId::new(), name, slug, description: description.into(),
            price, category_id, created_at: Utc::now(),
        })
    }

    /// Line items keep their cached price until they are saved again.
    pub fn update_price(&mut self, new_price: Decimal) -> Result<()> {
        check_price(new_price)?;
        self.price = new_price;
        Ok(())
    }
}
