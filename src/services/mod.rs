pub mod account_service;
pub mod account_service_impl;
pub use account_service::{AccountError, AccountService};
pub use account_service_impl::SeaOrmAccountService;

pub mod catalog_service;
pub mod catalog_service_impl;
pub use catalog_service::{CatalogError, CatalogService};
pub use catalog_service_impl::SeaOrmCatalogService;

pub mod redaction;

pub mod search;
pub use search::{SearchError, SearchService};
