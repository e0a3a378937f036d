//! In-memory repository
//!
//! All tables live behind one lock and every trait method is a single critical
//! section, so each call is all-or-nothing. Used when no database is configured
//! and by the tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::domain::aggregates::{
    Cart, Category, Comment, Conversation, CustomerAccount, EmployeeLoad, LineItem, Message, Order, OrderStatus,
    Owner, Product, Role, User,
};
use crate::domain::repository::{
    AccountRepository, CartRepository, CatalogRepository, MessagingRepository, OrderRepository, OrderScope,
    Provisioning,
};
use crate::domain::value_objects::{
    AccountId, CartId, CategoryId, ConversationId, LineItemId, MessageId, OrderId, ProductId, RefNumber, Slug, UserId,
};
use crate::{Result, ShopError};

struct CartRow {
    account_id: Option<AccountId>,
    total_price: Decimal,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

struct OrderRow {
    id: OrderId,
    ref_number: RefNumber,
    slug: Slug,
    status: OrderStatus,
    account_id: Option<AccountId>,
    total_price: Decimal,
    vat_amount: Decimal,
    incl_vat_price: Decimal,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
    categories: Vec<Category>,
    products: Vec<Product>,
    carts: HashMap<CartId, CartRow>,
    line_items: Vec<LineItem>,
    orders: Vec<OrderRow>,
    comments: Vec<Comment>,
    users: Vec<User>,
    accounts: Vec<CustomerAccount>,
    conversations: Vec<Conversation>,
    messages: Vec<Message>,
}

impl Tables {
    fn load_cart(&self, id: CartId) -> Option<Cart> {
        let row = self.carts.get(&id)?;
        let items = self.line_items.iter().filter(|i| i.owner == Owner::Cart(id)).cloned().collect();
        Some(Cart::restore(id, row.account_id, items, row.total_price, row.version, row.created_at, row.updated_at))
    }

    fn load_order(&self, row: &OrderRow) -> Order {
        let items = self.line_items.iter().filter(|i| i.owner == Owner::Order(row.id)).cloned().collect();
        Order::restore(
            row.id, row.ref_number.clone(), row.slug.clone(), row.status, row.account_id,
            items, row.total_price, row.vat_amount, row.incl_vat_price, row.created_at,
        )
    }

    /// Stored cart row, checked against the version the caller read.
    fn cart_row_for_write(&mut self, cart: &Cart) -> Result<&mut CartRow> {
        let row = self.carts.get_mut(&cart.id()).ok_or(ShopError::CartNotFound)?;
        if row.version != cart.version() {
            return Err(ShopError::Conflict);
        }
        Ok(row)
    }

    fn check_products(&self, items: &[LineItem]) -> Result<()> {
        match items.iter().all(|i| self.products.iter().any(|p| p.id == i.product_id)) {
            true => Ok(()),
            false => Err(ShopError::ProductNotFound),
        }
    }

    fn email_taken(&self, email: &str) -> bool { self.users.iter().any(|u| u.email == email) }

    fn reg_number_taken(&self, reg_number: &str) -> bool {
        self.users.iter().any(|u| u.reg_number.as_ref().is_some_and(|r| r.as_str() == reg_number))
    }
}

/// Repository keeping everything in process memory.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
}

impl InMemoryRepository {
    pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl CatalogRepository for InMemoryRepository {
    async fn insert_category(&self, category: &Category) -> Result<()> {
        let mut t = self.tables.write();
        if t.categories.iter().any(|c| c.name == category.name || c.slug == category.slug) {
            return Err(ShopError::DuplicateName(category.name.clone()));
        }
        t.categories.push(category.clone());
        Ok(())
    }

    async fn find_category(&self, id: CategoryId) -> Result<Option<Category>> {
        Ok(self.tables.read().categories.iter().find(|c| c.id == id).cloned())
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let mut categories = self.tables.read().categories.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn delete_category(&self, id: CategoryId) -> Result<()> {
        let mut t = self.tables.write();
        let pos = t.categories.iter().position(|c| c.id == id).ok_or(ShopError::CategoryNotFound)?;
        t.categories.remove(pos);
        t.products.iter_mut().filter(|p| p.category_id == Some(id)).for_each(|p| p.category_id = None);
        Ok(())
    }

    async fn insert_product(&self, product: &Product) -> Result<()> {
        let mut t = self.tables.write();
        if t.products.iter().any(|p| p.name == product.name || p.slug == product.slug) {
            return Err(ShopError::DuplicateName(product.name.clone()));
        }
        t.products.push(product.clone());
        Ok(())
    }

    async fn update_product(&self, product: &Product) -> Result<()> {
        let mut t = self.tables.write();
        if t.products.iter().any(|p| p.id != product.id && (p.name == product.name || p.slug == product.slug)) {
            return Err(ShopError::DuplicateName(product.name.clone()));
        }
        let stored = t.products.iter_mut().find(|p| p.id == product.id).ok_or(ShopError::ProductNotFound)?;
        *stored = product.clone();
        Ok(())
    }

    async fn find_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.tables.read().products.iter().find(|p| p.id == id).cloned())
    }

    async fn find_products(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        Ok(self.tables.read().products.iter().filter(|p| ids.contains(&p.id)).cloned().collect())
    }

    async fn list_products(&self, category: Option<CategoryId>) -> Result<Vec<Product>> {
        let t = self.tables.read();
        Ok(t.products
            .iter()
            .rev()
            .filter(|p| category.is_none() || p.category_id == category)
            .cloned()
            .collect())
    }

    async fn delete_product(&self, id: ProductId) -> Result<()> {
        let mut t = self.tables.write();
        let pos = t.products.iter().position(|p| p.id == id).ok_or(ShopError::ProductNotFound)?;
        if t.line_items.iter().any(|i| i.product_id == id) {
            return Err(ShopError::ProductInUse);
        }
        t.products.remove(pos);
        Ok(())
    }
}

#[async_trait]
impl CartRepository for InMemoryRepository {
    async fn find_cart(&self, id: CartId) -> Result<Option<Cart>> {
        Ok(self.tables.read().load_cart(id))
    }

    async fn find_cart_by_line_item(&self, id: LineItemId) -> Result<Option<Cart>> {
        let t = self.tables.read();
        Ok(t.line_items.iter().find(|i| i.id == id).and_then(|i| i.cart_id()).and_then(|cart_id| t.load_cart(cart_id)))
    }

    async fn save_cart(&self, cart: &Cart) -> Result<i64> {
        let mut t = self.tables.write();
        t.check_products(cart.items())?;
        let row = t.cart_row_for_write(cart)?;
        row.version += 1;
        row.total_price = cart.total_price();
        row.updated_at = cart.updated_at();
        let version = row.version;

        let cart_id = cart.id();
        t.line_items.retain(|i| i.owner != Owner::Cart(cart_id));
        t.line_items.extend(cart.items().iter().cloned());
        Ok(version)
    }
}

#[async_trait]
impl OrderRepository for InMemoryRepository {
    async fn ref_number_exists(&self, ref_number: &str) -> Result<bool> {
        Ok(self.tables.read().orders.iter().any(|o| o.ref_number.as_str() == ref_number))
    }

    async fn place_order(&self, cart: &Cart, order: &Order, comment: &Comment) -> Result<i64> {
        let mut t = self.tables.write();
        if t.orders.iter().any(|o| o.ref_number == *order.ref_number()) {
            return Err(ShopError::CodeCollision(order.ref_number().to_string()));
        }
        t.check_products(order.items())?;
        let row = t.cart_row_for_write(cart)?;
        row.version += 1;
        row.total_price = cart.total_price();
        row.updated_at = cart.updated_at();
        let version = row.version;

        let cart_id = cart.id();
        t.line_items.retain(|i| i.owner != Owner::Cart(cart_id));
        t.line_items.extend(order.items().iter().cloned());
        t.orders.push(OrderRow {
            id: order.id(),
            ref_number: order.ref_number().clone(),
            slug: order.slug().clone(),
            status: order.status(),
            account_id: order.account_id(),
            total_price: order.total_price(),
            vat_amount: order.vat_amount(),
            incl_vat_price: order.incl_vat_price(),
            created_at: order.created_at(),
        });
        t.comments.push(comment.clone());
        Ok(version)
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>> {
        let t = self.tables.read();
        Ok(t.orders.iter().find(|o| o.id == id).map(|row| t.load_order(row)))
    }

    async fn find_order_by_slug(&self, slug: &str) -> Result<Option<Order>> {
        let t = self.tables.read();
        Ok(t.orders.iter().find(|o| o.slug.as_str() == slug).map(|row| t.load_order(row)))
    }

    async fn update_order_status(&self, id: OrderId, status: OrderStatus) -> Result<()> {
        let mut t = self.tables.write();
        let row = t.orders.iter_mut().find(|o| o.id == id).ok_or(ShopError::OrderNotFound)?;
        row.status = status;
        Ok(())
    }

    async fn insert_comment(&self, comment: &Comment) -> Result<()> {
        let mut t = self.tables.write();
        if !t.orders.iter().any(|o| o.id == comment.order_id) {
            return Err(ShopError::OrderNotFound);
        }
        t.comments.push(comment.clone());
        Ok(())
    }

    async fn list_comments(&self, order_id: OrderId) -> Result<Vec<Comment>> {
        Ok(self.tables.read().comments.iter().rev().filter(|c| c.order_id == order_id).cloned().collect())
    }

    async fn list_orders(&self, scope: OrderScope) -> Result<Vec<Order>> {
        let t = self.tables.read();
        let accounts: Option<Vec<AccountId>> = match &scope {
            OrderScope::All => None,
            OrderScope::Customer(user_id) => {
                Some(t.accounts.iter().filter(|a| a.customer_id == *user_id).map(|a| a.id).collect())
            }
            OrderScope::Employee(reg) => {
                Some(t.accounts.iter().filter(|a| a.employee_reg == *reg).map(|a| a.id).collect())
            }
        };
        Ok(t.orders
            .iter()
            .rev()
            .filter(|o| match &accounts {
                None => true,
                Some(ids) => o.account_id.is_some_and(|id| ids.contains(&id)),
            })
            .map(|row| t.load_order(row))
            .collect())
    }
}

#[async_trait]
impl AccountRepository for InMemoryRepository {
    async fn insert_user(&self, user: &User) -> Result<()> {
        let mut t = self.tables.write();
        if t.email_taken(&user.email) {
            return Err(ShopError::DuplicateEmail(user.email.clone()));
        }
        if let Some(reg) = user.reg_number.as_ref().filter(|r| t.reg_number_taken(r.as_str())) {
            return Err(ShopError::CodeCollision(reg.to_string()));
        }
        t.users.push(user.clone());
        Ok(())
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.tables.read().users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_reg_number(&self, reg_number: &str) -> Result<Option<User>> {
        let t = self.tables.read();
        Ok(t.users.iter().find(|u| u.reg_number.as_ref().is_some_and(|r| r.as_str() == reg_number)).cloned())
    }

    async fn reg_number_exists(&self, reg_number: &str) -> Result<bool> {
        Ok(self.tables.read().reg_number_taken(reg_number))
    }

    async fn employee_loads(&self) -> Result<Vec<EmployeeLoad>> {
        let t = self.tables.read();
        Ok(t.users
            .iter()
            .filter(|u| u.role == Role::Employee)
            .map(|u| EmployeeLoad {
                user_id: u.id,
                reg_number: u.reg_number.clone(),
                accounts: match &u.reg_number {
                    Some(reg) => t.accounts.iter().filter(|a| a.employee_reg == *reg).count() as u64,
                    None => 0,
                },
            })
            .collect())
    }

    async fn provision_account(&self, provisioning: &Provisioning) -> Result<()> {
        let mut t = self.tables.write();
        let account = &provisioning.account;

        if let Some(customer) = &provisioning.new_customer {
            if t.email_taken(&customer.email) {
                return Err(ShopError::DuplicateEmail(customer.email.clone()));
            }
        } else if !t.users.iter().any(|u| u.id == account.customer_id) {
            return Err(ShopError::UserNotFound);
        }
        if t.accounts.iter().any(|a| a.customer_id == account.customer_id) {
            return Err(ShopError::AccountExists);
        }
        if let Some((user_id, reg)) = &provisioning.reg_number_backfill {
            if t.reg_number_taken(reg.as_str()) {
                return Err(ShopError::CodeCollision(reg.to_string()));
            }
            let employee = t.users.iter_mut().find(|u| u.id == *user_id).ok_or(ShopError::UserNotFound)?;
            employee.reg_number = Some(reg.clone());
        }

        if let Some(customer) = &provisioning.new_customer {
            t.users.push(customer.clone());
        }
        let cart = &provisioning.cart;
        t.carts.insert(
            cart.id(),
            CartRow {
                account_id: cart.account_id(),
                total_price: cart.total_price(),
                version: cart.version(),
                created_at: cart.created_at(),
                updated_at: cart.updated_at(),
            },
        );
        t.conversations.push(provisioning.conversation.clone());
        t.accounts.push(account.clone());
        Ok(())
    }

    async fn find_account(&self, id: AccountId) -> Result<Option<CustomerAccount>> {
        Ok(self.tables.read().accounts.iter().find(|a| a.id == id).cloned())
    }

    async fn find_account_by_customer(&self, customer_id: UserId) -> Result<Option<CustomerAccount>> {
        Ok(self.tables.read().accounts.iter().find(|a| a.customer_id == customer_id).cloned())
    }

    async fn attach_cart(&self, account_id: AccountId, cart: &Cart) -> Result<CartId> {
        let mut t = self.tables.write();
        let account = t.accounts.iter_mut().find(|a| a.id == account_id).ok_or(ShopError::AccountNotFound)?;
        if let Some(existing) = account.cart_id {
            return Ok(existing);
        }
        account.cart_id = Some(cart.id());
        t.carts.insert(
            cart.id(),
            CartRow {
                account_id: Some(account_id),
                total_price: cart.total_price(),
                version: cart.version(),
                created_at: cart.created_at(),
                updated_at: cart.updated_at(),
            },
        );
        Ok(cart.id())
    }
}

#[async_trait]
impl MessagingRepository for InMemoryRepository {
    async fn find_conversation(&self, id: ConversationId) -> Result<Option<Conversation>> {
        Ok(self.tables.read().conversations.iter().find(|c| c.id == id).cloned())
    }

    async fn list_conversations(&self, user_id: UserId) -> Result<Vec<Conversation>> {
        let mut conversations: Vec<_> =
            self.tables.read().conversations.iter().filter(|c| c.has_participant(user_id)).cloned().collect();
        conversations.sort_by_key(|c| c.modified_at);
        Ok(conversations)
    }

    async fn append_message(&self, conversation: &Conversation, message: &Message) -> Result<()> {
        let mut t = self.tables.write();
        let stored =
            t.conversations.iter_mut().find(|c| c.id == conversation.id).ok_or(ShopError::ConversationNotFound)?;
        stored.modified_at = conversation.modified_at;
        t.messages.push(message.clone());
        Ok(())
    }

    async fn list_messages(&self, conversation_id: ConversationId) -> Result<Vec<Message>> {
        Ok(self.tables.read().messages.iter().filter(|m| m.conversation_id == conversation_id).cloned().collect())
    }

    async fn mark_message_read(&self, id: MessageId) -> Result<()> {
        let mut t = self.tables.write();
        let message = t.messages.iter_mut().find(|m| m.id == id).ok_or(ShopError::MessageNotFound)?;
        message.is_read = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::UserProfile;
    use crate::domain::value_objects::RegNumber;

    fn product(name: &str) -> Product {
        Product::create(name, "", Decimal::from(2), None).unwrap()
    }

    async fn repo_with_cart() -> (InMemoryRepository, Cart) {
        let repo = InMemoryRepository::new();
        let customer = User::customer(UserProfile { email: "c@example.com".into(), ..Default::default() });
        let conversation = Conversation::open("s", vec![customer.id]);
        let (account, cart) = CustomerAccount::open(customer.id, RegNumber::new("r"), conversation.id);
        repo.provision_account(&Provisioning {
            new_customer: Some(customer),
            account,
            cart: cart.clone(),
            conversation,
            reg_number_backfill: None,
        })
        .await
        .unwrap();
        (repo, cart)
    }

    #[tokio::test]
    async fn test_stale_cart_save_conflicts() {
        let (repo, cart) = repo_with_cart().await;
        let p = product("P");
        repo.insert_product(&p).await.unwrap();

        let mut first = repo.find_cart(cart.id()).await.unwrap().unwrap();
        let mut second = first.clone();
        first.add_line_item(&p, 1000).unwrap();
        second.add_line_item(&p, 2000).unwrap();

        assert_eq!(repo.save_cart(&first).await.unwrap(), 1);
        assert!(matches!(repo.save_cart(&second).await, Err(ShopError::Conflict)));
        let stored = repo.find_cart(cart.id()).await.unwrap().unwrap();
        assert_eq!(stored.items()[0].quantity.value(), 1000);
    }

    #[tokio::test]
    async fn test_product_in_use_cannot_be_deleted() {
        let (repo, cart) = repo_with_cart().await;
        let p = product("P");
        repo.insert_product(&p).await.unwrap();
        let mut cart = repo.find_cart(cart.id()).await.unwrap().unwrap();
        cart.add_line_item(&p, 1000).unwrap();
        repo.save_cart(&cart).await.unwrap();

        assert!(matches!(repo.delete_product(p.id).await, Err(ShopError::ProductInUse)));
        assert!(repo.find_product(p.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_category_delete_keeps_products() {
        let repo = InMemoryRepository::new();
        let category = Category::create("Tools", None).unwrap();
        repo.insert_category(&category).await.unwrap();
        let p = Product::create("Hammer", "", Decimal::ONE, Some(category.id)).unwrap();
        repo.insert_product(&p).await.unwrap();

        repo.delete_category(category.id).await.unwrap();
        assert_eq!(repo.find_product(p.id).await.unwrap().unwrap().category_id, None);
        assert!(matches!(repo.delete_category(category.id).await, Err(ShopError::CategoryNotFound)));
    }

    #[tokio::test]
    async fn test_duplicate_names() {
        let repo = InMemoryRepository::new();
        repo.insert_product(&product("P")).await.unwrap();
        assert!(matches!(repo.insert_product(&product("P")).await, Err(ShopError::DuplicateName(_))));

        // Accented names transliterate to distinct slugs
        repo.insert_product(&product("Chaise élégante")).await.unwrap();
        repo.insert_product(&product("Chaise légante")).await.unwrap();
    }

    #[tokio::test]
    async fn test_provisioning_is_all_or_nothing() {
        let (repo, _) = repo_with_cart().await;
        let again = User::customer(UserProfile { email: "c@example.com".into(), ..Default::default() });
        let conversation = Conversation::open("s", vec![again.id]);
        let (account, cart) = CustomerAccount::open(again.id, RegNumber::new("r"), conversation.id);
        let result = repo
            .provision_account(&Provisioning {
                new_customer: Some(again),
                account: account.clone(),
                cart: cart.clone(),
                conversation,
                reg_number_backfill: None,
            })
            .await;

        assert!(matches!(result, Err(ShopError::DuplicateEmail(_))));
        assert!(repo.find_account(account.id).await.unwrap().is_none());
        assert!(repo.find_cart(cart.id()).await.unwrap().is_none());
    }
}
