use serde_json::{Value, json};
use shared::llm::{
    IntentKind, LlmGateway, LlmGatewayError, LlmGatewayRequest, LlmJsonFuture, LlmTextFuture,
};
use shared::models::Priority;
use shared::pipeline::classify_intent;

/// Canned gateway: either answers with a fixed JSON payload or fails.
struct FakeGateway {
    json: Option<Value>,
}

impl LlmGateway for FakeGateway {
    fn generate_json<'a>(&'a self, _request: LlmGatewayRequest) -> LlmJsonFuture<'a> {
        Box::pin(async move {
            self.json
                .clone()
                .ok_or_else(|| LlmGatewayError::ProviderFailure("offline".to_string()))
        })
    }

    fn generate_text<'a>(
        &'a self,
        _request: LlmGatewayRequest,
        _web_search: bool,
    ) -> LlmTextFuture<'a> {
        Box::pin(async move { Err(LlmGatewayError::ProviderFailure("offline".to_string())) })
    }
}

#[tokio::test]
async fn gate_routes_task_verdicts() {
    let gateway = FakeGateway {
        json: Some(json!({
            "tipo": "TAREA",
            "subtipo": "recordatorio",
            "urgencia": "ALTA"
        })),
    };

    let decision = classify_intent(&gateway, "recuérdame la reunión de mañana").await;
    assert_eq!(decision.kind, IntentKind::Task);
    assert_eq!(decision.urgency, Priority::High);
    assert!(!decision.from_fallback);
}

#[tokio::test]
async fn gateway_outage_degrades_to_rule_gate() {
    let gateway = FakeGateway { json: None };

    let noise = classify_intent(&gateway, "Hola").await;
    assert_eq!(noise.kind, IntentKind::Noise);
    assert!(noise.from_fallback);

    let value = classify_intent(&gateway, "ayer firmé el contrato con el nuevo cliente").await;
    assert_eq!(value.kind, IntentKind::Value);
    assert!(value.from_fallback);
}

#[tokio::test]
async fn unknown_verdict_also_falls_back() {
    let gateway = FakeGateway {
        json: Some(json!({ "tipo": "COSA_RARA" })),
    };

    let decision = classify_intent(&gateway, "¿por qué no guardaste el dato?").await;
    assert_eq!(decision.kind, IntentKind::Value);
    assert!(decision.from_fallback);
}
