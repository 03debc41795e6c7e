// Analyzer abstraction over the remote AI service

pub mod deepseek;
pub mod mock;
pub mod provider;

pub use deepseek::DeepSeekAdapter;
pub use mock::MockAnalyzer;
pub use provider::{Analyzer, CompletionRequest};
