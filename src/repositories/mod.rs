pub mod email_thread_repo;
pub mod maintenance_repo;
#[cfg(test)]
pub mod memory_store;
pub mod order_repo;
pub mod part_repo;
pub mod quote_request_repo;
pub mod store;
pub mod supplier_repo;
pub mod user_repo;
pub mod vehicle_repo;

pub use email_thread_repo::*;
pub use maintenance_repo::*;
pub use order_repo::*;
pub use part_repo::*;
pub use quote_request_repo::*;
pub use store::*;
pub use supplier_repo::*;
pub use user_repo::*;
pub use vehicle_repo::*;
