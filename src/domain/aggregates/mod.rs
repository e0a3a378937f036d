//! Aggregates module
pub mod account;
pub mod cart;
pub mod category;
pub mod conversation;
pub mod line_item;
pub mod order;
pub mod product;

pub use account::{least_loaded_employee, CustomerAccount, EmployeeChoice, EmployeeLoad, Role, User, UserProfile};
pub use cart::{Cart, CartUpdate};
pub use category::Category;
pub use conversation::{Conversation, Message};
pub use line_item::{LineItem, Owner};
pub use order::{Comment, Order, OrderStatus};
pub use product::Product;
