//! Postgres repository
//!
//! Multi-row writes run in one transaction. Cart writes lock the cart row with
//! `SELECT ... FOR UPDATE` and compare its `version` before touching anything.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, Transaction};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use crate::domain::aggregates::{
    Cart, Category, Comment, Conversation, CustomerAccount, EmployeeLoad, LineItem, Message, Order, OrderStatus,
    Owner, Product, User,
};
use crate::domain::repository::{
    AccountRepository, CartRepository, CatalogRepository, MessagingRepository, OrderRepository, OrderScope,
    Provisioning,
};
use crate::domain::value_objects::{
    AccountId, CartId, CategoryId, ConversationId, LineItemId, MessageId, OrderId, ProductId, Quantity, RefNumber,
    RegNumber, Slug, UserId,
};
use crate::{Result, ShopError};

type Tx = Transaction<'static, Postgres>;

// =============================================================================
// Rows
// =============================================================================

#[derive(FromRow)]
struct CategoryRow { id: Uuid, name: String, slug: String, created_at: DateTime<Utc> }

impl From<CategoryRow> for Category {
    fn from(r: CategoryRow) -> Self {
        Self { id: r.id.into(), name: r.name, slug: Slug::from_stored(r.slug), created_at: r.created_at }
    }
}

#[derive(FromRow)]
struct ProductRow {
    id: Uuid, name: String, slug: String, description: String, price: Decimal,
    category_id: Option<Uuid>, created_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(r: ProductRow) -> Self {
        Self {
            id: r.id.into(), name: r.name, slug: Slug::from_stored(r.slug), description: r.description,
            price: r.price, category_id: r.category_id.map(Into::into), created_at: r.created_at,
        }
    }
}

#[derive(FromRow)]
struct CartRow {
    id: Uuid, account_id: Option<Uuid>, total_price: Decimal, version: i64,
    created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct LineItemRow {
    id: Uuid, product_id: Uuid, quantity: i64, price: Decimal,
    cart_id: Option<Uuid>, order_id: Option<Uuid>,
}

impl TryFrom<LineItemRow> for LineItem {
    type Error = ShopError;

    fn try_from(r: LineItemRow) -> Result<Self> {
        let owner = match (r.cart_id, r.order_id) {
            (Some(cart_id), None) => Owner::Cart(cart_id.into()),
            (None, Some(order_id)) => Owner::Order(order_id.into()),
            _ => return Err(ShopError::StorageError(format!("line item {} has no single owner", r.id))),
        };
        let quantity = u32::try_from(r.quantity)
            .map_err(|_| ShopError::StorageError(format!("line item {} quantity out of range", r.id)))?;
        Ok(Self { id: r.id.into(), product_id: r.product_id.into(), quantity: Quantity::new(quantity), price: r.price, owner })
    }
}

#[derive(FromRow)]
struct OrderRow {
    id: Uuid, ref_number: String, slug: String, status: String, account_id: Option<Uuid>,
    total_price: Decimal, vat_amount: Decimal, incl_vat_price: Decimal, created_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<LineItem>) -> Result<Order> {
        Ok(Order::restore(
            self.id.into(), RefNumber::new(self.ref_number), Slug::from_stored(self.slug),
            OrderStatus::from_code(&self.status)?, self.account_id.map(Into::into),
            items, self.total_price, self.vat_amount, self.incl_vat_price, self.created_at,
        ))
    }
}

#[derive(FromRow)]
struct CommentRow { id: Uuid, order_id: Uuid, content: String, created_at: DateTime<Utc> }

impl From<CommentRow> for Comment {
    fn from(r: CommentRow) -> Self {
        Self { id: r.id.into(), order_id: r.order_id.into(), content: r.content, created_at: r.created_at }
    }
}

#[derive(FromRow)]
struct UserRow {
    id: Uuid, email: String, first_name: String, last_name: String, company: Option<String>,
    role: String, reg_number: Option<String>, joined_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = ShopError;

    fn try_from(r: UserRow) -> Result<Self> {
        Ok(Self {
            id: r.id.into(), email: r.email, first_name: r.first_name, last_name: r.last_name,
            company: r.company, role: r.role.parse()?, reg_number: r.reg_number.map(RegNumber::new),
            joined_at: r.joined_at,
        })
    }
}

#[derive(FromRow)]
struct AccountRow {
    id: Uuid, customer_id: Uuid, cart_id: Option<Uuid>, conversation_id: Option<Uuid>,
    employee_reg: String, created_at: DateTime<Utc>,
}

impl From<AccountRow> for CustomerAccount {
    fn from(r: AccountRow) -> Self {
        Self {
            id: r.id.into(), customer_id: r.customer_id.into(), cart_id: r.cart_id.map(Into::into),
            conversation_id: r.conversation_id.map(Into::into), employee_reg: RegNumber::new(r.employee_reg),
            created_at: r.created_at,
        }
    }
}

#[derive(FromRow)]
struct ConversationRow {
    id: Uuid, subject: String, participants: Vec<Uuid>,
    created_at: DateTime<Utc>, modified_at: DateTime<Utc>,
}

impl From<ConversationRow> for Conversation {
    fn from(r: ConversationRow) -> Self {
        Self {
            id: r.id.into(), subject: r.subject, participants: r.participants.into_iter().map(Into::into).collect(),
            created_at: r.created_at, modified_at: r.modified_at,
        }
    }
}

#[derive(FromRow)]
struct MessageRow {
    id: Uuid, conversation_id: Uuid, author_id: Uuid, content: String, is_read: bool, created_at: DateTime<Utc>,
}

impl From<MessageRow> for Message {
    fn from(r: MessageRow) -> Self {
        Self {
            id: r.id.into(), conversation_id: r.conversation_id.into(), author_id: r.author_id.into(),
            content: r.content, is_read: r.is_read, created_at: r.created_at,
        }
    }
}

#[derive(FromRow)]
struct EmployeeLoadRow { user_id: Uuid, reg_number: Option<String>, accounts: i64 }

const CONVERSATION_SELECT: &str = r#"
    SELECT c.id, c.subject, c.created_at, c.modified_at,
           ARRAY(SELECT p.user_id FROM conversation_participants p
                 WHERE p.conversation_id = c.id ORDER BY p.position) AS participants
    FROM conversations c"#;

const ORDER_COLUMNS: &str =
    "id, ref_number, slug, status, account_id, total_price, vat_amount, incl_vat_price, created_at";

// =============================================================================
// Errors
// =============================================================================

/// Maps constraint violations to domain errors; anything else is a storage error.
fn db_error(e: sqlx::Error) -> ShopError {
    if let sqlx::Error::Database(db) = &e {
        let detail = db.message().to_string();
        match db.constraint() {
            Some("categories_name_key" | "categories_slug_key" | "products_name_key" | "products_slug_key") => {
                return ShopError::DuplicateName(detail)
            }
            Some("users_email_key") => return ShopError::DuplicateEmail(detail),
            Some("users_reg_number_key" | "orders_ref_number_key" | "orders_slug_key") => {
                return ShopError::CodeCollision(detail)
            }
            Some("customer_accounts_customer_id_key") => return ShopError::AccountExists,
            Some("line_items_product_id_fkey") => return ShopError::ProductNotFound,
            Some("comments_order_id_fkey") => return ShopError::OrderNotFound,
            _ => {}
        }
    }
    ShopError::StorageError(e.to_string())
}

/// Like `db_error`, naming the offending value instead of the constraint.
fn duplicate(e: sqlx::Error, value: &str) -> ShopError {
    match db_error(e) {
        ShopError::DuplicateName(_) => ShopError::DuplicateName(value.to_string()),
        ShopError::DuplicateEmail(_) => ShopError::DuplicateEmail(value.to_string()),
        ShopError::CodeCollision(_) => ShopError::CodeCollision(value.to_string()),
        other => other,
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository backed by a Postgres pool.
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new().max_connections(max_connections).connect(url).await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self { Self { pool } }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("database migrations applied");
        Ok(())
    }

    async fn begin(&self) -> Result<Tx> {
        self.pool.begin().await.map_err(db_error)
    }

    async fn load_cart(&self, id: Uuid) -> Result<Option<Cart>> {
        let Some(row) = sqlx::query_as::<_, CartRow>(
            "SELECT id, account_id, total_price, version, created_at, updated_at FROM carts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, LineItemRow>(
            "SELECT id, product_id, quantity, price, cart_id, order_id FROM line_items WHERE cart_id = $1 ORDER BY position",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?
        .into_iter()
        .map(LineItem::try_from)
        .collect::<Result<Vec<_>>>()?;

        Ok(Some(Cart::restore(
            row.id.into(), row.account_id.map(Into::into), items, row.total_price, row.version,
            row.created_at, row.updated_at,
        )))
    }

    async fn load_orders(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut items: HashMap<Uuid, Vec<LineItem>> = HashMap::new();
        let item_rows = sqlx::query_as::<_, LineItemRow>(
            "SELECT id, product_id, quantity, price, cart_id, order_id FROM line_items WHERE order_id = ANY($1) ORDER BY position",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        for row in item_rows {
            let item = LineItem::try_from(row)?;
            if let Some(order_id) = item.order_id() {
                items.entry(order_id.as_uuid()).or_default().push(item);
            }
        }
        rows.into_iter()
            .map(|row| {
                let lines = items.remove(&row.id).unwrap_or_default();
                row.into_order(lines)
            })
            .collect()
    }

    /// Locks the cart row and checks the caller read the current version.
    /// Returns the version the write will store.
    async fn lock_cart(tx: &mut Tx, cart: &Cart) -> Result<i64> {
        let stored: Option<i64> = sqlx::query_scalar("SELECT version FROM carts WHERE id = $1 FOR UPDATE")
            .bind(cart.id().as_uuid())
            .fetch_optional(&mut **tx)
            .await
            .map_err(db_error)?;
        match stored {
            None => Err(ShopError::CartNotFound),
            Some(version) if version != cart.version() => Err(ShopError::Conflict),
            Some(version) => Ok(version + 1),
        }
    }

    async fn write_cart_row(tx: &mut Tx, cart: &Cart, version: i64) -> Result<()> {
        sqlx::query("UPDATE carts SET total_price = $2, version = $3, updated_at = $4 WHERE id = $1")
            .bind(cart.id().as_uuid())
            .bind(cart.total_price())
            .bind(version)
            .bind(cart.updated_at())
            .execute(&mut **tx)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn insert_line_items(tx: &mut Tx, items: &[LineItem]) -> Result<()> {
        for item in items {
            sqlx::query(
                "INSERT INTO line_items (id, product_id, quantity, price, cart_id, order_id) VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(item.id.as_uuid())
            .bind(item.product_id.as_uuid())
            .bind(i64::from(item.quantity.value()))
            .bind(item.price)
            .bind(item.cart_id().map(|id| id.as_uuid()))
            .bind(item.order_id().map(|id| id.as_uuid()))
            .execute(&mut **tx)
            .await
            .map_err(db_error)?;
        }
        Ok(())
    }

    async fn insert_cart(tx: &mut Tx, cart: &Cart) -> Result<()> {
        sqlx::query(
            "INSERT INTO carts (id, account_id, total_price, version, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(cart.id().as_uuid())
        .bind(cart.account_id().map(|id| id.as_uuid()))
        .bind(cart.total_price())
        .bind(cart.version())
        .bind(cart.created_at())
        .bind(cart.updated_at())
        .execute(&mut **tx)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn insert_user_in(tx: &mut Tx, user: &User) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO users (id, email, first_name, last_name, company, role, reg_number, joined_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.company)
        .bind(user.role.as_str())
        .bind(user.reg_number.as_ref().map(|r| r.as_str()))
        .bind(user.joined_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| duplicate(e, &user.email))?;
        Ok(())
    }
}

#[async_trait]
impl CatalogRepository for PgRepository {
    async fn insert_category(&self, category: &Category) -> Result<()> {
        sqlx::query("INSERT INTO categories (id, name, slug, created_at) VALUES ($1, $2, $3, $4)")
            .bind(category.id.as_uuid())
            .bind(&category.name)
            .bind(category.slug.as_str())
            .bind(category.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| duplicate(e, &category.name))?;
        Ok(())
    }

    async fn find_category(&self, id: CategoryId) -> Result<Option<Category>> {
        let row = sqlx::query_as::<_, CategoryRow>("SELECT id, name, slug, created_at FROM categories WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(row.map(Into::into))
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let rows = sqlx::query_as::<_, CategoryRow>("SELECT id, name, slug, created_at FROM categories ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete_category(&self, id: CategoryId) -> Result<()> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(ShopError::CategoryNotFound);
        }
        Ok(())
    }

    async fn insert_product(&self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO products (id, name, slug, description, price, category_id, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(product.slug.as_str())
        .bind(&product.description)
        .bind(product.price)
        .bind(product.category_id.map(|id| id.as_uuid()))
        .bind(product.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate(e, &product.name))?;
        Ok(())
    }

    async fn update_product(&self, product: &Product) -> Result<()> {
        let result = sqlx::query(
            "UPDATE products SET name = $2, slug = $3, description = $4, price = $5, category_id = $6 WHERE id = $1",
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(product.slug.as_str())
        .bind(&product.description)
        .bind(product.price)
        .bind(product.category_id.map(|id| id.as_uuid()))
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate(e, &product.name))?;
        if result.rows_affected() == 0 {
            return Err(ShopError::ProductNotFound);
        }
        Ok(())
    }

    async fn find_product(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(
            "SELECT id, name, slug, description, price, category_id, created_at FROM products WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(row.map(Into::into))
    }

    async fn find_products(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let ids: Vec<Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
        let rows = sqlx::query_as::<_, ProductRow>(
            "SELECT id, name, slug, description, price, category_id, created_at FROM products WHERE id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_products(&self, category: Option<CategoryId>) -> Result<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r#"SELECT id, name, slug, description, price, category_id, created_at FROM products
               WHERE $1::uuid IS NULL OR category_id = $1
               ORDER BY created_at DESC, id DESC"#,
        )
        .bind(category.map(|id| id.as_uuid()))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete_product(&self, id: ProductId) -> Result<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| match db_error(e) {
                ShopError::ProductNotFound => ShopError::ProductInUse,
                other => other,
            })?;
        if result.rows_affected() == 0 {
            return Err(ShopError::ProductNotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl CartRepository for PgRepository {
    async fn find_cart(&self, id: CartId) -> Result<Option<Cart>> {
        self.load_cart(id.as_uuid()).await
    }

    async fn find_cart_by_line_item(&self, id: LineItemId) -> Result<Option<Cart>> {
        let cart_id: Option<Option<Uuid>> = sqlx::query_scalar("SELECT cart_id FROM line_items WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        match cart_id.flatten() {
            Some(cart_id) => self.load_cart(cart_id).await,
            None => Ok(None),
        }
    }

    async fn save_cart(&self, cart: &Cart) -> Result<i64> {
        let mut tx = self.begin().await?;
        let version = Self::lock_cart(&mut tx, cart).await?;
        sqlx::query("DELETE FROM line_items WHERE cart_id = $1")
            .bind(cart.id().as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        Self::insert_line_items(&mut tx, cart.items()).await?;
        Self::write_cart_row(&mut tx, cart, version).await?;
        tx.commit().await.map_err(db_error)?;
        Ok(version)
    }
}

#[async_trait]
impl OrderRepository for PgRepository {
    async fn ref_number_exists(&self, ref_number: &str) -> Result<bool> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM orders WHERE ref_number = $1)")
            .bind(ref_number)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)
    }

    async fn place_order(&self, cart: &Cart, order: &Order, comment: &Comment) -> Result<i64> {
        let mut tx = self.begin().await?;
        let version = Self::lock_cart(&mut tx, cart).await?;

        sqlx::query(
            r#"INSERT INTO orders (id, ref_number, slug, status, account_id, total_price, vat_amount, incl_vat_price, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"#,
        )
        .bind(order.id().as_uuid())
        .bind(order.ref_number().as_str())
        .bind(order.slug().as_str())
        .bind(order.status().code())
        .bind(order.account_id().map(|id| id.as_uuid()))
        .bind(order.total_price())
        .bind(order.vat_amount())
        .bind(order.incl_vat_price())
        .bind(order.created_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| duplicate(e, order.ref_number().as_str()))?;

        sqlx::query("DELETE FROM line_items WHERE cart_id = $1")
            .bind(cart.id().as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        Self::insert_line_items(&mut tx, order.items()).await?;
        Self::write_cart_row(&mut tx, cart, version).await?;

        sqlx::query("INSERT INTO comments (id, order_id, content, created_at) VALUES ($1, $2, $3, $4)")
            .bind(comment.id.as_uuid())
            .bind(comment.order_id.as_uuid())
            .bind(&comment.content)
            .bind(comment.created_at)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Ok(version)
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(self.load_orders(rows).await?.pop())
    }

    async fn find_order_by_slug(&self, slug: &str) -> Result<Option<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE slug = $1"))
            .bind(slug)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(self.load_orders(rows).await?.pop())
    }

    async fn update_order_status(&self, id: OrderId, status: OrderStatus) -> Result<()> {
        let result = sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(status.code())
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(ShopError::OrderNotFound);
        }
        Ok(())
    }

    async fn insert_comment(&self, comment: &Comment) -> Result<()> {
        sqlx::query("INSERT INTO comments (id, order_id, content, created_at) VALUES ($1, $2, $3, $4)")
            .bind(comment.id.as_uuid())
            .bind(comment.order_id.as_uuid())
            .bind(&comment.content)
            .bind(comment.created_at)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn list_comments(&self, order_id: OrderId) -> Result<Vec<Comment>> {
        let rows = sqlx::query_as::<_, CommentRow>(
            "SELECT id, order_id, content, created_at FROM comments WHERE order_id = $1 ORDER BY position DESC",
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_orders(&self, scope: OrderScope) -> Result<Vec<Order>> {
        let order_by = "ORDER BY created_at DESC, id DESC";
        let rows = match scope {
            OrderScope::All => {
                sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders {order_by}"))
                    .fetch_all(&self.pool)
                    .await
            }
            OrderScope::Customer(user_id) => {
                sqlx::query_as::<_, OrderRow>(&format!(
                    "SELECT {ORDER_COLUMNS} FROM orders WHERE account_id IN \
                     (SELECT id FROM customer_accounts WHERE customer_id = $1) {order_by}"
                ))
                .bind(user_id.as_uuid())
                .fetch_all(&self.pool)
                .await
            }
            OrderScope::Employee(reg) => {
                sqlx::query_as::<_, OrderRow>(&format!(
                    "SELECT {ORDER_COLUMNS} FROM orders WHERE account_id IN \
                     (SELECT id FROM customer_accounts WHERE employee_reg = $1) {order_by}"
                ))
                .bind(reg.as_str())
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(db_error)?;
        self.load_orders(rows).await
    }
}

#[async_trait]
impl AccountRepository for PgRepository {
    async fn insert_user(&self, user: &User) -> Result<()> {
        let mut tx = self.begin().await?;
        Self::insert_user_in(&mut tx, user).await?;
        tx.commit().await.map_err(db_error)
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>> {
        sqlx::query_as::<_, UserRow>(
            "SELECT id, email, first_name, last_name, company, role, reg_number, joined_at FROM users WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .map(User::try_from)
        .transpose()
    }

    async fn find_user_by_reg_number(&self, reg_number: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, UserRow>(
            "SELECT id, email, first_name, last_name, company, role, reg_number, joined_at FROM users WHERE reg_number = $1",
        )
        .bind(reg_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .map(User::try_from)
        .transpose()
    }

    async fn reg_number_exists(&self, reg_number: &str) -> Result<bool> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE reg_number = $1)")
            .bind(reg_number)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)
    }

    async fn employee_loads(&self) -> Result<Vec<EmployeeLoad>> {
        let rows = sqlx::query_as::<_, EmployeeLoadRow>(
            r#"SELECT u.id AS user_id, u.reg_number, COUNT(a.id) AS accounts
               FROM users u
               LEFT JOIN customer_accounts a ON a.employee_reg = u.reg_number
               WHERE u.role = 'EMPLOYEE'
               GROUP BY u.id, u.reg_number, u.joined_at
               ORDER BY u.joined_at, u.id"#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(rows
            .into_iter()
            .map(|r| EmployeeLoad {
                user_id: r.user_id.into(),
                reg_number: r.reg_number.map(RegNumber::new),
                accounts: r.accounts.max(0) as u64,
            })
            .collect())
    }

    async fn provision_account(&self, provisioning: &Provisioning) -> Result<()> {
        let Provisioning { new_customer, account, cart, conversation, reg_number_backfill } = provisioning;
        let mut tx = self.begin().await?;

        if let Some(customer) = new_customer {
            Self::insert_user_in(&mut tx, customer).await?;
        }
        if let Some((user_id, reg)) = reg_number_backfill {
            sqlx::query("UPDATE users SET reg_number = $2 WHERE id = $1 AND reg_number IS NULL")
                .bind(user_id.as_uuid())
                .bind(reg.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| duplicate(e, reg.as_str()))?;
        }

        sqlx::query("INSERT INTO conversations (id, subject, created_at, modified_at) VALUES ($1, $2, $3, $4)")
            .bind(conversation.id.as_uuid())
            .bind(&conversation.subject)
            .bind(conversation.created_at)
            .bind(conversation.modified_at)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        for (position, user_id) in conversation.participants.iter().enumerate() {
            sqlx::query("INSERT INTO conversation_participants (conversation_id, user_id, position) VALUES ($1, $2, $3)")
                .bind(conversation.id.as_uuid())
                .bind(user_id.as_uuid())
                .bind(position as i32)
                .execute(&mut *tx)
                .await
                .map_err(db_error)?;
        }

        // cart_id is checked at commit, once the cart row exists
        sqlx::query(
            r#"INSERT INTO customer_accounts (id, customer_id, cart_id, conversation_id, employee_reg, created_at)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(account.id.as_uuid())
        .bind(account.customer_id.as_uuid())
        .bind(account.cart_id.map(|id| id.as_uuid()))
        .bind(account.conversation_id.map(|id| id.as_uuid()))
        .bind(account.employee_reg.as_str())
        .bind(account.created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
        Self::insert_cart(&mut tx, cart).await?;

        tx.commit().await.map_err(db_error)
    }

    async fn find_account(&self, id: AccountId) -> Result<Option<CustomerAccount>> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT id, customer_id, cart_id, conversation_id, employee_reg, created_at FROM customer_accounts WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(row.map(Into::into))
    }

    async fn find_account_by_customer(&self, customer_id: UserId) -> Result<Option<CustomerAccount>> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"SELECT id, customer_id, cart_id, conversation_id, employee_reg, created_at
               FROM customer_accounts WHERE customer_id = $1"#,
        )
        .bind(customer_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(row.map(Into::into))
    }

    async fn attach_cart(&self, account_id: AccountId, cart: &Cart) -> Result<CartId> {
        let mut tx = self.begin().await?;
        let existing: Option<Option<Uuid>> =
            sqlx::query_scalar("SELECT cart_id FROM customer_accounts WHERE id = $1 FOR UPDATE")
                .bind(account_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_error)?;
        match existing {
            None => Err(ShopError::AccountNotFound),
            Some(Some(cart_id)) => Ok(cart_id.into()),
            Some(None) => {
                Self::insert_cart(&mut tx, cart).await?;
                sqlx::query("UPDATE customer_accounts SET cart_id = $2 WHERE id = $1")
                    .bind(account_id.as_uuid())
                    .bind(cart.id().as_uuid())
                    .execute(&mut *tx)
                    .await
                    .map_err(db_error)?;
                tx.commit().await.map_err(db_error)?;
                Ok(cart.id())
            }
        }
    }
}

#[async_trait]
impl MessagingRepository for PgRepository {
    async fn find_conversation(&self, id: ConversationId) -> Result<Option<Conversation>> {
        let row = sqlx::query_as::<_, ConversationRow>(&format!("{CONVERSATION_SELECT} WHERE c.id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(row.map(Into::into))
    }

    async fn list_conversations(&self, user_id: UserId) -> Result<Vec<Conversation>> {
        let rows = sqlx::query_as::<_, ConversationRow>(&format!(
            "{CONVERSATION_SELECT} WHERE EXISTS (SELECT 1 FROM conversation_participants p \
             WHERE p.conversation_id = c.id AND p.user_id = $1) ORDER BY c.modified_at, c.id"
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn append_message(&self, conversation: &Conversation, message: &Message) -> Result<()> {
        let mut tx = self.begin().await?;
        let result = sqlx::query("UPDATE conversations SET modified_at = $2 WHERE id = $1")
            .bind(conversation.id.as_uuid())
            .bind(conversation.modified_at)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(ShopError::ConversationNotFound);
        }
        sqlx::query(
            r#"INSERT INTO messages (id, conversation_id, author_id, content, is_read, created_at)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(message.id.as_uuid())
        .bind(message.conversation_id.as_uuid())
        .bind(message.author_id.as_uuid())
        .bind(&message.content)
        .bind(message.is_read)
        .bind(message.created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
        tx.commit().await.map_err(db_error)
    }

    async fn list_messages(&self, conversation_id: ConversationId) -> Result<Vec<Message>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"SELECT id, conversation_id, author_id, content, is_read, created_at
               FROM messages WHERE conversation_id = $1 ORDER BY position"#,
        )
        .bind(conversation_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn mark_message_read(&self, id: MessageId) -> Result<()> {
        let result = sqlx::query("UPDATE messages SET is_read = TRUE WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(ShopError::MessageNotFound);
        }
        Ok(())
    }
}
