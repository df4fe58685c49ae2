//! FAQ module
//!
//! No transactional API: the answer is the classifier's own free-text reply.

use async_trait::async_trait;

use super::{ModuleExecutor, ModuleFailure, ModuleInput, ModuleOutcome};
use crate::models::{CommunicationMethod, ModuleType};

pub const FAQ_FALLBACK: &str =
    "I'm not sure about that one. Could you rephrase your question, or ask about an order?";

pub struct FaqModule;

#[async_trait]
impl ModuleExecutor for FaqModule {
    fn module_type(&self) -> ModuleType {
        ModuleType::Faq
    }

    async fn execute(&self, input: ModuleInput<'_>) -> Result<ModuleOutcome, ModuleFailure> {
        let answer = input
            .classification
            .reply
            .clone()
            .or_else(|| {
                Some(input.classification.raw_response.trim().to_string())
                    .filter(|raw| !raw.is_empty() && !raw.starts_with('{'))
            })
            .or_else(|| input.config.fallback_text(FAQ_FALLBACK))
            .unwrap_or_else(|| FAQ_FALLBACK.to_string());

        Ok(ModuleOutcome::reply(answer).with_method(CommunicationMethod::GenAIToFrontend))
    }
}
