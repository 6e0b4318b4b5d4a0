pub use super::categories::Entity as Categories;
pub use super::payments::Entity as Payments;
pub use super::services::Entity as Services;
pub use super::users::Entity as Users;
