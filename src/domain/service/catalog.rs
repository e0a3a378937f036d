use rust_decimal::Decimal;
use tracing::info;

use super::ShopService;
use crate::domain::aggregates::{Category, Product};
use crate::domain::value_objects::{CategoryId, ProductId, Slug};
use crate::{Result, ShopError};

/// Input for product creation.
#[derive(Clone, Debug)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub category_id: Option<CategoryId>,
}

impl ShopService {
    pub async fn create_category(&self, name: &str, slug: Option<&str>) -> Result<Category> {
        let slug = slug.map(Slug::from_text).transpose()?;
        let category = Category::create(name, slug)?;
        self.repo.insert_category(&category).await?;
        info!(category_id = %category.id, slug = %category.slug, "category created");
        Ok(category)
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        self.repo.list_categories().await
    }

    pub async fn delete_category(&self, id: CategoryId) -> Result<()> {
        self.repo.delete_category(id).await?;
        info!(category_id = %id, "category deleted");
        Ok(())
    }

    pub async fn create_product(&self, input: NewProduct) -> Result<Product> {
        if let Some(category_id) = input.category_id {
            self.repo.find_category(category_id).await?.ok_or(ShopError::CategoryNotFound)?;
        }
        let product = Product::create(input.name, input.description, input.price, input.category_id)?;
        self.repo.insert_product(&product).await?;
        info!(product_id = %product.id, price = %product.price, "product created");
        Ok(product)
    }

    pub async fn product(&self, id: ProductId) -> Result<Product> {
        self.repo.find_product(id).await?.ok_or(ShopError::ProductNotFound)
    }

    pub async fn list_products(&self, category: Option<CategoryId>) -> Result<Vec<Product>> {
        self.repo.list_products(category).await
    }

    pub async fn update_product_price(&self, id: ProductId, price: Decimal) -> Result<Product> {
        let mut product = self.product(id).await?;
        product.update_price(price)?;
        self.repo.update_product(&product).await?;
        info!(product_id = %id, price = %price, "product price updated");
        Ok(product)
    }

    pub async fn delete_product(&self, id: ProductId) -> Result<()> {
        self.repo.delete_product(id).await?;
        info!(product_id = %id, "product deleted");
        Ok(())
    }
}
