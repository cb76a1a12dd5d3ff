use crate::advisor::{
    errors::AdvisorError,
    types::{AdvisorRequestId, ConsequenceRequest, ConsequenceResponse, ConsequenceSuggestion},
};

use super::{validate_request, AdvisorConnectionState, AdvisorProviderKind, ConsequenceAdvisor};

const FALLBACK_CONSEQUENCE: &str = "Take a short calm-down break, then talk together about what happened and agree on one way to make it right.";
const FALLBACK_REASONING_PREFIX: &str = "No live advisor is configured, so this is a general restorative step that suits a";
const FALLBACK_REASONING_SUFFIX: &str = "and leaves the point balance untouched.";

/// Offline advisor used when no provider can be configured.
///
/// Always answers with a generic restorative step and a zero deduction.
#[derive(Debug, Default, Clone, Copy)]
pub struct FallbackConsequenceAdvisor;

impl FallbackConsequenceAdvisor {
    fn fabricate(&self, request: &ConsequenceRequest) -> ConsequenceSuggestion {
        let name = request.child_name.trim();
        ConsequenceSuggestion {
            consequence: FALLBACK_CONSEQUENCE.to_string(),
            reasoning: format!(
                "{} {}-year-old {}",
                FALLBACK_REASONING_PREFIX, request.child_age, FALLBACK_REASONING_SUFFIX
            ),
            conversation_starter: format!(
                "{}, can you tell me what was going on for you when \"{}\" happened?",
                name,
                request.behavior.trim()
            ),
            points_deduction: 0,
        }
    }
}

impl ConsequenceAdvisor for FallbackConsequenceAdvisor {
    fn provider_kind(&self) -> AdvisorProviderKind {
        AdvisorProviderKind::Local
    }

    fn connection_state(&self) -> AdvisorConnectionState {
        AdvisorConnectionState::Fallback
    }

    fn suggest(
        &self,
        request_id: AdvisorRequestId,
        request: &ConsequenceRequest,
    ) -> Result<ConsequenceResponse, AdvisorError> {
        validate_request(request)
            .map_err(|kind| AdvisorError::new(request_id, self.provider_kind(), kind))?;

        Ok(ConsequenceResponse::new(
            request_id,
            self.provider_kind(),
            self.fabricate(request),
        ))
    }
}
