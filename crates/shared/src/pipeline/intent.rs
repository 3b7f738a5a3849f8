use tracing::warn;

use crate::llm::{IntentContract, IntentKind, LlmGateway, prompts};
use crate::models::Priority;

const COMPLAINT_KEYWORDS: [&str; 4] = ["por qué", "qué pasó", "error", "no pudiste"];

#[derive(Debug, Clone)]
pub struct IntentDecision {
    pub kind: IntentKind,
    pub subtipo: Option<String>,
    pub urgency: Priority,
    pub from_fallback: bool,
}

/// Single LLM call routing each utterance. Infallible: a gateway failure or
/// an unparseable verdict degrades to the rule-based gate.
pub async fn classify_intent(gateway: &dyn LlmGateway, message: &str) -> IntentDecision {
    match gateway.generate_json(prompts::intent_request(message)).await {
        Ok(payload) => match serde_json::from_value::<IntentContract>(payload) {
            Ok(contract) => {
                if let Some(kind) = contract.kind() {
                    return IntentDecision {
                        kind,
                        subtipo: contract.subtipo.clone(),
                        urgency: contract.urgency(),
                        from_fallback: false,
                    };
                }
                warn!("intent gate returned unknown tipo {:?}", contract.tipo);
                fallback_classification(message)
            }
            Err(err) => {
                warn!("intent gate contract parse failed: {err}");
                fallback_classification(message)
            }
        },
        Err(err) => {
            warn!("intent gate llm call failed: {err}");
            fallback_classification(message)
        }
    }
}

/// Rule gate: anything substantive or complaint-shaped is worth keeping.
pub fn fallback_classification(message: &str) -> IntentDecision {
    let lower = message.to_lowercase();
    let is_value = message.chars().count() > 20
        || COMPLAINT_KEYWORDS
            .iter()
            .any(|keyword| lower.contains(keyword));

    IntentDecision {
        kind: if is_value {
            IntentKind::Value
        } else {
            IntentKind::Noise
        },
        subtipo: None,
        urgency: Priority::Medium,
        from_fallback: true,
    }
}

#[cfg(test)]
mod tests {
    use super::fallback_classification;
    use crate::llm::IntentKind;

    #[test]
    fn long_messages_fall_back_to_value() {
        let decision =
            fallback_classification("ayer me confirmaron la segunda entrevista del proceso");
        assert_eq!(decision.kind, IntentKind::Value);
        assert!(decision.from_fallback);
    }

    #[test]
    fn complaints_are_value_even_when_short() {
        let decision = fallback_classification("¿por qué fallo?");
        assert_eq!(decision.kind, IntentKind::Value);
    }

    #[test]
    fn short_greetings_fall_back_to_noise() {
        let decision = fallback_classification("Hola");
        assert_eq!(decision.kind, IntentKind::Noise);
    }
}
