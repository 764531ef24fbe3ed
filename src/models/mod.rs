pub mod activity;
pub mod email_thread;
pub mod maintenance;
pub mod order;
pub mod part;
pub mod quote_request;
pub mod supplier;
pub mod supplier_ids;
pub mod user;
pub mod vehicle;
pub mod webhook;
