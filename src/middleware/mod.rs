pub mod auth;
pub mod geolocation;

pub use auth::{AuthUser, AdminUser, NewToken};
pub use geolocation::{GeoDb, GeoLocation};
