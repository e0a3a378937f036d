//! Users, customer accounts and the assignment of customers to employees.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::aggregates::Cart;
use crate::domain::value_objects::{AccountId, CartId, ConversationId, RegNumber, UserId};
use crate::{Result, ShopError};

/// Company every employee is registered under.
pub const EMPLOYER: &str = "Ventalis";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Employee,
    Customer,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Employee => "EMPLOYEE", Self::Customer => "CUSTOMER", Self::Admin => "ADMIN" }
    }
}

impl FromStr for Role {
    type Err = ShopError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "EMPLOYEE" => Ok(Self::Employee),
            "CUSTOMER" => Ok(Self::Customer),
            "ADMIN" => Ok(Self::Admin),
            other => Err(ShopError::StorageError(format!("unknown role {other}"))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Identity details supplied at registration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub company: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub company: Option<String>,
    pub role: Role,
    pub reg_number: Option<RegNumber>,
    pub joined_at: DateTime<Utc>,
}

impl User {
    pub fn employee(profile: UserProfile, reg_number: RegNumber) -> Self {
        let mut user = Self::from_profile(profile, Role::Employee);
        user.company = Some(EMPLOYER.to_string());
        user.reg_number = Some(reg_number);
        user
    }

    pub fn customer(profile: UserProfile) -> Self { Self::from_profile(profile, Role::Customer) }

    fn from_profile(profile: UserProfile, role: Role) -> Self {
        Self {
            id: UserId::new(), email: profile.email.trim().to_lowercase(),
            first_name: profile.first_name, last_name: profile.last_name,
            company: profile.company, role, reg_number: None, joined_at: Utc::now(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerAccount {
    pub id: AccountId,
    pub customer_id: UserId,
    pub cart_id: Option<CartId>,
    pub conversation_id: Option<ConversationId>,
    /// Registration number of the assigned employee. Set once, never reassigned.
    pub employee_reg: RegNumber,
    pub created_at: DateTime<Utc>,
}

impl CustomerAccount {
    pub fn new(customer_id: UserId, employee_reg: RegNumber) -> Self {
        Self {
            id: AccountId::new(), customer_id, cart_id: None, conversation_id: None,
            employee_reg, created_at: Utc::now(),
        }
    }

    /// Opens an account together with its cart and conversation.
    pub fn open(customer_id: UserId, employee_reg: RegNumber, conversation_id: ConversationId) -> (Self, Cart) {
        let mut account = Self::new(customer_id, employee_reg);
        account.conversation_id = Some(conversation_id);
        let cart = Cart::new(Some(account.id));
        account.cart_id = Some(cart.id());
        (account, cart)
    }

    /// Creates and binds a cart unless the account already has one.
    pub fn create_cart(&mut self) -> Option<Cart> {
        if self.cart_id.is_some() { return None; }
        let cart = Cart::new(Some(self.id));
        self.cart_id = Some(cart.id());
        Some(cart)
    }
}

/// An employee and the number of customer accounts referencing its registration number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmployeeLoad {
    pub user_id: UserId,
    pub reg_number: Option<RegNumber>,
    pub accounts: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EmployeeChoice {
    /// Least loaded employee.
    Assigned { user_id: UserId, reg_number: RegNumber },
    /// Employee without a registration number; it gets one and takes the account.
    NeedsRegNumber(UserId),
}

/// Picks the employee with the fewest accounts; ties go to the first in `loads`.
/// An employee missing its registration number wins immediately.
pub fn least_loaded_employee(loads: &[EmployeeLoad]) -> Result<EmployeeChoice> {
    let mut best: Option<(&EmployeeLoad, &RegNumber)> = None;
    for load in loads {
        let Some(reg) = &load.reg_number else {
            return Ok(EmployeeChoice::NeedsRegNumber(load.user_id));
        };
        match best {
            Some((current, _)) if load.accounts >= current.accounts => {}
            _ => best = Some((load, reg)),
        }
    }
    best.map(|(load, reg)| EmployeeChoice::Assigned { user_id: load.user_id, reg_number: reg.clone() })
        .ok_or(ShopError::NoEligibleEmployee)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(reg: Option<&str>, accounts: u64) -> EmployeeLoad {
        EmployeeLoad { user_id: UserId::new(), reg_number: reg.map(RegNumber::new), accounts }
    }

    #[test]
    fn test_no_employee() {
        assert!(matches!(least_loaded_employee(&[]), Err(ShopError::NoEligibleEmployee)));
    }

    #[test]
    fn test_least_loaded_wins() {
        let loads = [load(Some("a"), 3), load(Some("b"), 1), load(Some("c"), 2)];
        let expected = EmployeeChoice::Assigned { user_id: loads[1].user_id, reg_number: RegNumber::new("b") };
        assert_eq!(least_loaded_employee(&loads).unwrap(), expected);
    }

    #[test]
    fn test_tie_goes_to_first() {
        let loads = [load(Some("a"), 1), load(Some("b"), 1)];
        let expected = EmployeeChoice::Assigned { user_id: loads[0].user_id, reg_number: RegNumber::new("a") };
        assert_eq!(least_loaded_employee(&loads).unwrap(), expected);
    }

    #[test]
    fn test_missing_reg_number_short_circuits() {
        let loads = [load(Some("a"), 0), load(None, 9), load(Some("c"), 0)];
        let expected = loads[1].user_id;
        assert_eq!(least_loaded_employee(&loads).unwrap(), EmployeeChoice::NeedsRegNumber(expected));
    }

    #[test]
    fn test_sequential_assignment_balances() {
        let mut loads = vec![load(Some("a"), 0), load(Some("b"), 0)];
        let mut previous = None;
        for _ in 0..6 {
            let EmployeeChoice::Assigned { reg_number: reg, .. } = least_loaded_employee(&loads).unwrap() else {
                panic!("unexpected backfill")
            };
            assert_ne!(previous.as_ref(), Some(&reg));
            loads.iter_mut().filter(|l| l.reg_number.as_ref() == Some(&reg)).for_each(|l| l.accounts += 1);
            previous = Some(reg);
        }
        assert!(loads.iter().all(|l| l.accounts == 3));
    }

    #[test]
    fn test_create_cart_is_idempotent() {
        let mut account = CustomerAccount::new(UserId::new(), RegNumber::new("a"));
        let cart = account.create_cart().unwrap();
        assert_eq!(account.cart_id, Some(cart.id()));
        assert_eq!(cart.account_id(), Some(account.id));
        assert!(account.create_cart().is_none());
        assert_eq!(account.cart_id, Some(cart.id()));
    }

    #[test]
    fn test_open_binds_cart_and_conversation() {
        let conversation_id = ConversationId::new();
        let (account, cart) = CustomerAccount::open(UserId::new(), RegNumber::new("a"), conversation_id);
        assert_eq!(account.cart_id, Some(cart.id()));
        assert_eq!(account.conversation_id, Some(conversation_id));
        assert_eq!(cart.account_id(), Some(account.id));
    }

    #[test]
    fn test_employee_profile() {
        let user = User::employee(
            UserProfile { email: " Ann@Example.com ".into(), first_name: "Ann".into(), last_name: "Lee".into(), company: None },
            RegNumber::new("r1"),
        );
        assert_eq!(user.email, "ann@example.com");
        assert_eq!(user.company.as_deref(), Some(EMPLOYER));
        assert_eq!(user.role, Role::Employee);
        assert_eq!(user.full_name(), "Ann Lee");
    }
}
