pub mod account;
pub mod category;
pub mod search;
pub mod service;
