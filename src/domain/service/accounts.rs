use tracing::{info, warn};

use super::ShopService;
use crate::domain::aggregates::{
    least_loaded_employee, Cart, Conversation, CustomerAccount, EmployeeChoice, Role, User, UserProfile,
};
use crate::domain::codes;
use crate::domain::events::{AccountEvent, DomainEvent};
use crate::domain::repository::Provisioning;
use crate::domain::value_objects::{AccountId, RegNumber, UserId};
use crate::{Result, ShopError};

impl ShopService {
    /// Registers an employee of Ventalis under a fresh registration number.
    pub async fn register_employee(&self, profile: UserProfile) -> Result<User> {
        check_email(&profile.email)?;
        let reg_number = self.fresh_reg_number().await?;
        let user = User::employee(profile, reg_number.clone());
        self.repo.insert_user(&user).await?;
        info!(user_id = %user.id, reg_number = %reg_number, "employee registered");
        self.publish(DomainEvent::Account(AccountEvent::EmployeeRegistered { user_id: user.id, reg_number }))
            .await;
        Ok(user)
    }

    pub async fn register_admin(&self, profile: UserProfile) -> Result<User> {
        check_email(&profile.email)?;
        let mut user = User::customer(profile);
        user.role = Role::Admin;
        self.repo.insert_user(&user).await?;
        info!(user_id = %user.id, "admin registered");
        Ok(user)
    }

    /// Registers a customer and opens its account in the same unit of work.
    pub async fn register_customer(&self, profile: UserProfile) -> Result<(User, CustomerAccount)> {
        check_email(&profile.email)?;
        let customer = User::customer(profile);
        let account = self.provision(customer.clone(), true).await?;
        Ok((customer, account))
    }

    /// Opens the account of an already registered customer.
    pub async fn create_customer_account(&self, customer_id: UserId) -> Result<CustomerAccount> {
        let customer = self.user(customer_id).await?;
        if customer.role != Role::Customer {
            return Err(ShopError::Validation(format!("user {customer_id} is not a customer")));
        }
        self.provision(customer, false).await
    }

    async fn provision(&self, customer: User, new_customer: bool) -> Result<CustomerAccount> {
        let _signup = self.signup.lock().await;

        if !new_customer && self.repo.find_account_by_customer(customer.id).await?.is_some() {
            return Err(ShopError::AccountExists);
        }

        let loads = self.repo.employee_loads().await?;
        let (employee_id, employee_reg, reg_number_backfill) = match least_loaded_employee(&loads)? {
            EmployeeChoice::Assigned { user_id, reg_number } => (user_id, reg_number, None),
            EmployeeChoice::NeedsRegNumber(user_id) => {
                let reg_number = self.fresh_reg_number().await?;
                warn!(%user_id, reg_number = %reg_number, "employee had no registration number, assigning one");
                (user_id, reg_number.clone(), Some((user_id, reg_number)))
            }
        };

        let subject = match customer.full_name() {
            name if name.is_empty() => format!("Conversation with {}", customer.email),
            name => format!("Conversation with {name}"),
        };
        let conversation = Conversation::open(subject, vec![customer.id, employee_id]);
        let (account, cart) = CustomerAccount::open(customer.id, employee_reg, conversation.id);

        self.repo
            .provision_account(&Provisioning {
                new_customer: new_customer.then(|| customer.clone()),
                account: account.clone(),
                cart,
                conversation,
                reg_number_backfill,
            })
            .await?;

        info!(
            account_id = %account.id, customer_id = %customer.id,
            employee_reg = %account.employee_reg, "customer account provisioned"
        );
        self.publish(DomainEvent::Account(AccountEvent::Provisioned {
            account_id: account.id,
            customer_id: customer.id,
            employee_reg: account.employee_reg.clone(),
        }))
        .await;
        Ok(account)
    }

    /// Returns the account's cart, creating it on first use.
    pub async fn create_cart(&self, account_id: AccountId) -> Result<Cart> {
        let mut account = self.account(account_id).await?;
        let cart_id = match account.create_cart() {
            Some(cart) => {
                let cart_id = self.repo.attach_cart(account_id, &cart).await?;
                if cart_id == cart.id() {
                    info!(%account_id, %cart_id, "cart created");
                }
                cart_id
            }
            None => account.cart_id.ok_or(ShopError::CartNotFound)?,
        };
        self.cart(cart_id).await
    }

    pub async fn account(&self, id: AccountId) -> Result<CustomerAccount> {
        self.repo.find_account(id).await?.ok_or(ShopError::AccountNotFound)
    }

    pub async fn account_for_customer(&self, customer_id: UserId) -> Result<CustomerAccount> {
        self.repo.find_account_by_customer(customer_id).await?.ok_or(ShopError::AccountNotFound)
    }

    pub async fn user(&self, id: UserId) -> Result<User> {
        self.repo.find_user(id).await?.ok_or(ShopError::UserNotFound)
    }

    pub async fn user_by_reg_number(&self, reg_number: &str) -> Result<User> {
        self.repo.find_user_by_reg_number(reg_number).await?.ok_or(ShopError::UserNotFound)
    }

    async fn fresh_reg_number(&self) -> Result<RegNumber> {
        let repo = &self.repo;
        let code = codes::unique_code(move |code| async move { repo.reg_number_exists(&code).await }).await?;
        Ok(RegNumber::new(code))
    }
}

/// Same rule as `#[validate(email)]` on the HTTP request bodies.
fn check_email(email: &str) -> Result<()> {
    let email = email.trim();
    if !validator::validate_email(email) {
        return Err(ShopError::Validation(format!("invalid email {email:?}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::*;
    use crate::domain::repository::AccountRepository;
    use crate::domain::NoOpEventPublisher;
    use crate::infra::memory::InMemoryRepository;

    fn profile(email: &str) -> UserProfile {
        UserProfile { email: email.into(), first_name: "First".into(), last_name: "Last".into(), company: None }
    }

    fn shop() -> (ShopService, Arc<InMemoryRepository>) {
        let repo = Arc::new(InMemoryRepository::new());
        (ShopService::new(repo.clone(), Arc::new(NoOpEventPublisher)), repo)
    }

    #[tokio::test]
    async fn test_accounts_balance_across_employees() {
        let (service, _) = shop();
        let e1 = service.register_employee(profile("e1@ventalis.test")).await.unwrap();
        let e2 = service.register_employee(profile("e2@ventalis.test")).await.unwrap();

        let mut per_employee: HashMap<RegNumber, usize> = HashMap::new();
        for i in 0..6 {
            let (_, account) = service.register_customer(profile(&format!("c{i}@example.com"))).await.unwrap();
            *per_employee.entry(account.employee_reg).or_default() += 1;
        }
        assert_eq!(per_employee[e1.reg_number.as_ref().unwrap()], 3);
        assert_eq!(per_employee[e2.reg_number.as_ref().unwrap()], 3);
    }

    #[tokio::test]
    async fn test_provisioning_opens_cart_and_conversation() {
        let (service, _) = shop();
        let employee = service.register_employee(profile("e@ventalis.test")).await.unwrap();
        let (customer, account) = service.register_customer(profile("c@example.com")).await.unwrap();

        let cart = service.cart(account.cart_id.unwrap()).await.unwrap();
        assert_eq!(cart.account_id(), Some(account.id));
        assert!(cart.is_empty());

        let conversations = service.conversations_for(customer.id).await.unwrap();
        assert_eq!(conversations.len(), 1);
        assert_eq!(Some(conversations[0].id), account.conversation_id);
        assert!(conversations[0].has_participant(employee.id));
        assert_eq!(service.account_for_customer(customer.id).await.unwrap(), account);
    }

    #[tokio::test]
    async fn test_no_employee_aborts_registration() {
        let (service, _) = shop();
        let result = service.register_customer(profile("c@example.com")).await;
        assert!(matches!(result, Err(ShopError::NoEligibleEmployee)));
    }

    #[tokio::test]
    async fn test_missing_reg_number_is_backfilled() {
        let (service, repo) = shop();
        let mut legacy = User::employee(profile("old@ventalis.test"), RegNumber::new("unused"));
        legacy.reg_number = None;
        repo.insert_user(&legacy).await.unwrap();

        let (_, account) = service.register_customer(profile("c@example.com")).await.unwrap();
        let employee = service.user(legacy.id).await.unwrap();
        assert_eq!(employee.reg_number.as_ref(), Some(&account.employee_reg));
        assert_eq!(service.user_by_reg_number(account.employee_reg.as_str()).await.unwrap().id, legacy.id);
    }

    #[tokio::test]
    async fn test_second_account_is_rejected() {
        let (service, repo) = shop();
        service.register_employee(profile("e@ventalis.test")).await.unwrap();
        let customer = User::customer(profile("c@example.com"));
        repo.insert_user(&customer).await.unwrap();

        service.create_customer_account(customer.id).await.unwrap();
        let again = service.create_customer_account(customer.id).await;
        assert!(matches!(again, Err(ShopError::AccountExists)));
    }

    #[tokio::test]
    async fn test_create_cart_is_idempotent() {
        let (service, _) = shop();
        service.register_employee(profile("e@ventalis.test")).await.unwrap();
        let (_, account) = service.register_customer(profile("c@example.com")).await.unwrap();

        let first = service.create_cart(account.id).await.unwrap();
        let second = service.create_cart(account.id).await.unwrap();
        assert_eq!(first.id(), second.id());
        assert_eq!(Some(first.id()), account.cart_id);
    }

    #[tokio::test]
    async fn test_duplicate_email() {
        let (service, _) = shop();
        service.register_employee(profile("e@ventalis.test")).await.unwrap();
        let again = service.register_employee(profile("E@Ventalis.test")).await;
        assert!(matches!(again, Err(ShopError::DuplicateEmail(_))));
        assert!(matches!(service.register_employee(profile("nope")).await, Err(ShopError::Validation(_))));
    }

    #[test]
    fn test_email_rule() {
        check_email("ann@example.com").unwrap();
        check_email(" ann@example.com ").unwrap();
        for bad in ["", "ann", "@example.com", "ann@", "ann@exa mple.com", "a@b@c.com", "ann@-example.com"] {
            assert!(matches!(check_email(bad), Err(ShopError::Validation(_))), "{bad} accepted");
        }
    }
}
