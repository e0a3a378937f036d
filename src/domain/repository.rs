//! Repository traits for data access
//!
//! These traits define the interface for data access operations.
//! Implementations are in `infra::memory` and `infra::postgres`.
//! Every method is one unit of work: it either applies completely or not at all.

use async_trait::async_trait;

use crate::domain::aggregates::{
    Cart, Category, Comment, Conversation, CustomerAccount, EmployeeLoad, Message, Order, OrderStatus, Product, User,
};
use crate::domain::value_objects::{
    AccountId, CartId, CategoryId, ConversationId, LineItemId, MessageId, OrderId, ProductId, RegNumber, UserId,
};
use crate::Result;

/// Repository for categories and products
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn insert_category(&self, category: &Category) -> Result<()>;

    async fn find_category(&self, id: CategoryId) -> Result<Option<Category>>;

    /// Ordered by name
    async fn list_categories(&self) -> Result<Vec<Category>>;

    /// Delete a category; its products lose their category
    async fn delete_category(&self, id: CategoryId) -> Result<()>;

    async fn insert_product(&self, product: &Product) -> Result<()>;

    async fn update_product(&self, product: &Product) -> Result<()>;

    async fn find_product(&self, id: ProductId) -> Result<Option<Product>>;

    async fn find_products(&self, ids: &[ProductId]) -> Result<Vec<Product>>;

    /// Newest first
    async fn list_products(&self, category: Option<CategoryId>) -> Result<Vec<Product>>;

    /// Fails with `ProductInUse` while any line item references the product
    async fn delete_product(&self, id: ProductId) -> Result<()>;
}

/// Repository for carts and their line items
#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn find_cart(&self, id: CartId) -> Result<Option<Cart>>;

    /// Cart holding the given line item, if the line item is in a cart
    async fn find_cart_by_line_item(&self, id: LineItemId) -> Result<Option<Cart>>;

    /// Write the cart and replace its line items.
    ///
    /// Fails with `Conflict` when the stored version differs from `cart.version()`.
    /// Returns the new version.
    async fn save_cart(&self, cart: &Cart) -> Result<i64>;
}

/// Repository for orders and comments
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn ref_number_exists(&self, ref_number: &str) -> Result<bool>;

    /// Store a new order, its initial comment, its re-parented line items and the
    /// emptied cart, all at once.
    ///
    /// Fails with `Conflict` on a stale cart and with `CodeCollision` when the
    /// reference number is taken. Returns the new cart version.
    async fn place_order(&self, cart: &Cart, order: &Order, comment: &Comment) -> Result<i64>;

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>>;

    async fn find_order_by_slug(&self, slug: &str) -> Result<Option<Order>>;

    async fn update_order_status(&self, id: OrderId, status: OrderStatus) -> Result<()>;

    async fn insert_comment(&self, comment: &Comment) -> Result<()>;

    /// Most recent first
    async fn list_comments(&self, order_id: OrderId) -> Result<Vec<Comment>>;

    /// Newest first
    async fn list_orders(&self, scope: OrderScope) -> Result<Vec<Order>>;
}

/// Which orders a listing covers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrderScope {
    All,
    /// Orders of the account owned by this customer
    Customer(UserId),
    /// Orders of every account assigned to this employee
    Employee(RegNumber),
}

/// Everything written when a customer account is opened.
#[derive(Clone, Debug)]
pub struct Provisioning {
    /// Set when the customer identity is created in the same unit of work
    pub new_customer: Option<User>,
    pub account: CustomerAccount,
    pub cart: Cart,
    pub conversation: Conversation,
    /// Registration number given on the fly to an employee that had none
    pub reg_number_backfill: Option<(UserId, RegNumber)>,
}

/// Repository for users and customer accounts
#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn insert_user(&self, user: &User) -> Result<()>;

    async fn find_user(&self, id: UserId) -> Result<Option<User>>;

    async fn find_user_by_reg_number(&self, reg_number: &str) -> Result<Option<User>>;

    async fn reg_number_exists(&self, reg_number: &str) -> Result<bool>;

    /// Employees in registration order, with the number of accounts assigned to each
    async fn employee_loads(&self) -> Result<Vec<EmployeeLoad>>;

    /// Fails with `AccountExists` if the customer already has an account
    async fn provision_account(&self, provisioning: &Provisioning) -> Result<()>;

    async fn find_account(&self, id: AccountId) -> Result<Option<CustomerAccount>>;

    async fn find_account_by_customer(&self, customer_id: UserId) -> Result<Option<CustomerAccount>>;

    /// Bind `cart` to the account unless it already has one.
    /// Returns the id of the account's cart afterwards.
    async fn attach_cart(&self, account_id: AccountId, cart: &Cart) -> Result<CartId>;
}

/// Repository for conversations and messages
#[async_trait]
pub trait MessagingRepository: Send + Sync {
    async fn find_conversation(&self, id: ConversationId) -> Result<Option<Conversation>>;

    /// Conversations the user takes part in, least recently modified first
    async fn list_conversations(&self, user_id: UserId) -> Result<Vec<Conversation>>;

    /// Store the message and the conversation's new modification time
    async fn append_message(&self, conversation: &Conversation, message: &Message) -> Result<()>;

    /// Chronological
    async fn list_messages(&self, conversation_id: ConversationId) -> Result<Vec<Message>>;

    async fn mark_message_read(&self, id: MessageId) -> Result<()>;
}

/// Full storage needed by the shop service.
pub trait ShopRepository:
    CatalogRepository + CartRepository + OrderRepository + AccountRepository + MessagingRepository
{
}

impl<T> ShopRepository for T where
    T: CatalogRepository + CartRepository + OrderRepository + AccountRepository + MessagingRepository
{
}
