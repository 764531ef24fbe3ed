pub mod auth;
pub mod error_handling;
pub mod roles;

pub use auth::*;
pub use error_handling::*;
pub use roles::*;
