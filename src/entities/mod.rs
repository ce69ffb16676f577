//! Database entities for the storefront domain.

pub mod game;
pub mod game_key;
pub mod order;
pub mod order_item;
pub mod promo_code;
pub mod transaction;
pub mod user;

pub use game::Entity as Game;
pub use game_key::Entity as GameKey;
pub use order::Entity as Order;
pub use order_item::Entity as OrderItem;
pub use promo_code::Entity as PromoCode;
pub use transaction::Entity as Transaction;
pub use user::Entity as User;
