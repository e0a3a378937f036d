//! Lost races on cart writes and taken reference numbers are retried.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use ventashop::domain::aggregates::{
    Cart, Category, Comment, Conversation, CustomerAccount, EmployeeLoad, Message, Order, OrderStatus, Product, User,
    UserProfile,
};
use ventashop::domain::repository::{
    AccountRepository, CartRepository, CatalogRepository, MessagingRepository, OrderRepository, OrderScope,
    Provisioning,
};
use ventashop::domain::service::NewProduct;
use ventashop::domain::value_objects::{
    AccountId, CartId, CategoryId, ConversationId, LineItemId, MessageId, OrderId, ProductId, UserId,
};
use ventashop::domain::{NoOpEventPublisher, ShopService};
use ventashop::infra::InMemoryRepository;
use ventashop::{Result, ShopError};

/// In-memory store that loses the next `conflicts` cart writes and reports the
/// next `collisions` order inserts as reference number collisions.
#[derive(Default)]
struct Contended {
    inner: InMemoryRepository,
    conflicts: AtomicU32,
    collisions: AtomicU32,
    cart_writes: AtomicU32,
    order_inserts: AtomicU32,
}

impl Contended {
    fn take(counter: &AtomicU32) -> bool {
        counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok()
    }
}

#[async_trait]
impl CatalogRepository for Contended {
    async fn insert_category(&self, category: &Category) -> Result<()> { self.inner.insert_category(category).await }
    async fn find_category(&self, id: CategoryId) -> Result<Option<Category>> { self.inner.find_category(id).await }
    async fn list_categories(&self) -> Result<Vec<Category>> { self.inner.list_categories().await }
    async fn delete_category(&self, id: CategoryId) -> Result<()> { self.inner.delete_category(id).await }
    async fn insert_product(&self, product: &Product) -> Result<()> { self.inner.insert_product(product).await }
    async fn update_product(&self, product: &Product) -> Result<()> { self.inner.update_product(product).await }
    async fn find_product(&self, id: ProductId) -> Result<Option<Product>> { self.inner.find_product(id).await }
    async fn find_products(&self, ids: &[ProductId]) -> Result<Vec<Product>> { self.inner.find_products(ids).await }
    async fn list_products(&self, category: Option<CategoryId>) -> Result<Vec<Product>> {
        self.inner.list_products(category).await
    }
    async fn delete_product(&self, id: ProductId) -> Result<()> { self.inner.delete_product(id).await }
}

#[async_trait]
impl CartRepository for Contended {
    async fn find_cart(&self, id: CartId) -> Result<Option<Cart>> { self.inner.find_cart(id).await }
    async fn find_cart_by_line_item(&self, id: LineItemId) -> Result<Option<Cart>> {
        self.inner.find_cart_by_line_item(id).await
    }
    async fn save_cart(&self, cart: &Cart) -> Result<i64> {
        self.cart_writes.fetch_add(1, Ordering::SeqCst);
        if Self::take(&self.conflicts) {
            return Err(ShopError::Conflict);
        }
        self.inner.save_cart(cart).await
    }
}

#[async_trait]
impl OrderRepository for Contended {
    async fn ref_number_exists(&self, ref_number: &str) -> Result<bool> { self.inner.ref_number_exists(ref_number).await }
    async fn place_order(&self, cart: &Cart, order: &Order, comment: &Comment) -> Result<i64> {
        self.order_inserts.fetch_add(1, Ordering::SeqCst);
        if Self::take(&self.collisions) {
            return Err(ShopError::CodeCollision(order.ref_number().to_string()));
        }
        self.inner.place_order(cart, order, comment).await
    }
    async fn find_order(&self, id: OrderId) -> Result<Option<Order>> { self.inner.find_order(id).await }
    async fn find_order_by_slug(&self, slug: &str) -> Result<Option<Order>> { self.inner.find_order_by_slug(slug).await }
    async fn update_order_status(&self, id: OrderId, status: OrderStatus) -> Result<()> {
        self.inner.update_order_status(id, status).await
    }
    async fn insert_comment(&self, comment: &Comment) -> Result<()> { self.inner.insert_comment(comment).await }
    async fn list_comments(&self, order_id: OrderId) -> Result<Vec<Comment>> { self.inner.list_comments(order_id).await }
    async fn list_orders(&self, scope: OrderScope) -> Result<Vec<Order>> { self.inner.list_orders(scope).await }
}

#[async_trait]
impl AccountRepository for Contended {
    async fn insert_user(&self, user: &User) -> Result<()> { self.inner.insert_user(user).await }
    async fn find_user(&self, id: UserId) -> Result<Option<User>> { self.inner.find_user(id).await }
    async fn find_user_by_reg_number(&self, reg_number: &str) -> Result<Option<User>> {
        self.inner.find_user_by_reg_number(reg_number).await
    }
    async fn reg_number_exists(&self, reg_number: &str) -> Result<bool> { self.inner.reg_number_exists(reg_number).await }
    async fn employee_loads(&self) -> Result<Vec<EmployeeLoad>> { self.inner.employee_loads().await }
    async fn provision_account(&self, provisioning: &Provisioning) -> Result<()> {
        self.inner.provision_account(provisioning).await
    }
    async fn find_account(&self, id: AccountId) -> Result<Option<CustomerAccount>> { self.inner.find_account(id).await }
    async fn find_account_by_customer(&self, customer_id: UserId) -> Result<Option<CustomerAccount>> {
        self.inner.find_account_by_customer(customer_id).await
    }
    async fn attach_cart(&self, account_id: AccountId, cart: &Cart) -> Result<CartId> {
        self.inner.attach_cart(account_id, cart).await
    }
}

#[async_trait]
impl MessagingRepository for Contended {
    async fn find_conversation(&self, id: ConversationId) -> Result<Option<Conversation>> {
        self.inner.find_conversation(id).await
    }
    async fn list_conversations(&self, user_id: UserId) -> Result<Vec<Conversation>> {
        self.inner.list_conversations(user_id).await
    }
    async fn append_message(&self, conversation: &Conversation, message: &Message) -> Result<()> {
        self.inner.append_message(conversation, message).await
    }
    async fn list_messages(&self, conversation_id: ConversationId) -> Result<Vec<Message>> {
        self.inner.list_messages(conversation_id).await
    }
    async fn mark_message_read(&self, id: MessageId) -> Result<()> { self.inner.mark_message_read(id).await }
}

async fn shop_with_cart(repo: Arc<Contended>) -> (ShopService, CartId, ProductId) {
    let service = ShopService::new(repo, Arc::new(NoOpEventPublisher));
    service.register_employee(UserProfile { email: "sales@ventalis.test".into(), ..Default::default() }).await.unwrap();
    let (_, account) = service
        .register_customer(UserProfile { email: "buyer@example.com".into(), ..Default::default() })
        .await
        .unwrap();
    let product = service
        .create_product(NewProduct {
            name: "Rivets".into(),
            description: String::new(),
            price: Decimal::ONE,
            category_id: None,
        })
        .await
        .unwrap();
    (service, account.cart_id.unwrap(), product.id)
}

#[tokio::test]
async fn test_lost_cart_write_is_retried() {
    let repo = Arc::new(Contended::default());
    let (service, cart_id, product_id) = shop_with_cart(repo.clone()).await;

    repo.cart_writes.store(0, Ordering::SeqCst);
    repo.conflicts.store(3, Ordering::SeqCst);
    let cart = service.add_line_item(cart_id, product_id, 1200).await.unwrap();

    assert_eq!(repo.cart_writes.load(Ordering::SeqCst), 4);
    assert_eq!(cart.items()[0].quantity.value(), 1200);
    let stored = service.cart(cart_id).await.unwrap();
    assert_eq!(stored.total_price(), Decimal::from(1200));
    assert_eq!(stored.version(), cart.version());
}

#[tokio::test]
async fn test_conflict_surfaces_once_retries_run_out() {
    let repo = Arc::new(Contended::default());
    let (service, cart_id, product_id) = shop_with_cart(repo.clone()).await;

    repo.cart_writes.store(0, Ordering::SeqCst);
    repo.conflicts.store(4, Ordering::SeqCst);
    let result = service.add_line_item(cart_id, product_id, 1200).await;

    assert!(matches!(result, Err(ShopError::Conflict)));
    assert_eq!(repo.cart_writes.load(Ordering::SeqCst), 4);
    assert!(service.cart(cart_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_ref_number_collision_is_retried() {
    let repo = Arc::new(Contended::default());
    let (service, cart_id, product_id) = shop_with_cart(repo.clone()).await;
    service.add_line_item(cart_id, product_id, 1000).await.unwrap();

    repo.collisions.store(1, Ordering::SeqCst);
    let order = service.make_order(cart_id).await.unwrap().unwrap();

    assert_eq!(repo.order_inserts.load(Ordering::SeqCst), 2);
    assert_eq!(service.order_by_slug(order.slug().as_str()).await.unwrap().id(), order.id());
    assert!(service.cart(cart_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_orders_in_sequence_get_distinct_references() {
    let repo = Arc::new(Contended::default());
    let (service, cart_id, product_id) = shop_with_cart(repo).await;

    let mut refs = HashSet::new();
    let mut slugs = HashSet::new();
    for _ in 0..25 {
        service.add_line_item(cart_id, product_id, 1000).await.unwrap();
        let order = service.make_order(cart_id).await.unwrap().unwrap();
        refs.insert(order.ref_number().clone());
        slugs.insert(order.slug().clone());
    }
    assert_eq!(refs.len(), 25);
    assert_eq!(slugs.len(), 25);

    for slug in &slugs {
        service.order_by_slug(slug.as_str()).await.unwrap();
    }
}
