//! Application services: validation and orchestration between the API
//! surface and the vault store.

pub mod auth;
pub mod items;

pub use auth::{AuthService, Tokens};
pub use items::ItemService;
