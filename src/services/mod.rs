pub mod accounts;
pub mod admin;
pub mod catalog;
pub mod orders;
pub mod promos;

pub use accounts::AccountService;
pub use admin::AdminQueryService;
pub use catalog::GameCatalogService;
pub use orders::OrderService;
pub use promos::PromoCodeService;
