pub mod aggregator;
pub mod cache;
pub mod error;
pub mod escalation;
pub mod models;
pub mod rate_limit;
pub mod router;
pub mod scanner;
pub mod store;

// Re-export commonly used items
pub use aggregator::*;
pub use cache::*;
pub use error::*;
pub use escalation::*;
pub use models::*;
pub use rate_limit::*;
pub use router::*;
pub use scanner::*;
pub use store::*;
