// Degraded-mode analyzer, selected at startup when no API key is configured.
// Jobs still run end to end; the worker marks their output as mock.

use async_trait::async_trait;

use crate::llm::provider::{Analyzer, CompletionRequest};
use crate::types::AppResult;

pub struct MockAnalyzer;

#[async_trait]
impl Analyzer for MockAnalyzer {
    async fn complete(&self, _request: &CompletionRequest) -> AppResult<String> {
        Ok("TECHNICAL ANALYSIS (API Key Required)

KEY FINDINGS:
- Code structure appears complex - consider modularization
- Dependencies need version audit
- Error handling could be improved
- Documentation gaps identified

RECOMMENDATIONS:
1. Add a DeepSeek API key to the .env file
2. Get a key from platform.deepseek.com
3. Restart for full AI-powered analysis

This is a placeholder. Real AI analysis requires an API key."
            .to_string())
    }

    fn is_live(&self) -> bool {
        false
    }
}
