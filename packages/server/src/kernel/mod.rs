//! Kernel module - server infrastructure and dependencies.

pub mod ai;
pub mod deps;
pub mod newsletter_store;
pub mod test_dependencies;
pub mod traits;

pub use ai::{GeminiNewsletterAnalyzer, GEMINI_2_5_FLASH};
pub use deps::ServerDeps;
pub use newsletter_store::PostgresNewsletterStore;
pub use test_dependencies::{InMemoryNewsletterStore, MockNewsletterAnalyzer, TestDependencies};
pub use traits::*;
