pub mod activity_log;
pub mod conversion;
pub mod email_gateway;
pub mod numbering;
pub mod quote_lifecycle;
pub mod thread_reconciliation;

pub use activity_log::*;
pub use conversion::*;
pub use email_gateway::*;
pub use quote_lifecycle::*;
pub use thread_reconciliation::*;
