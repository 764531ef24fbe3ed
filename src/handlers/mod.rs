pub mod auth;
pub mod email_threads;
pub mod maintenance;
pub mod orders;
pub mod parts;
pub mod quote_requests;
pub mod suppliers;
pub mod vehicles;
pub mod webhooks;
