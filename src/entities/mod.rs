pub mod prelude;

pub mod categories;
pub mod payments;
pub mod services;
pub mod users;
