pub mod category;
pub mod payment;
pub mod service;
pub mod user;
