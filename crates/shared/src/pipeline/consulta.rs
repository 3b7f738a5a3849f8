use tracing::warn;
use uuid::Uuid;

use crate::llm::{Embedder, LlmGateway, prompts};
use crate::repos::{AlertRecord, ConversationRecord, Store, StoreError};

const DEEP_CONVERSATIONS: i64 = 100;
const DEEP_ALERTS: i64 = 30;
const NORMAL_CONVERSATIONS: i64 = 15;

const UNAVAILABLE_REPLY: &str =
    "No puedo responder tu consulta en este momento. Inténtalo de nuevo en unos minutos.";

/// Read-only question answering over profile, recent context, and semantic
/// recall. Never writes; every external failure degrades, none propagate.
pub async fn answer_query(
    store: &Store,
    gateway: &dyn LlmGateway,
    embedder: Option<&dyn Embedder>,
    user_id: Uuid,
    question: &str,
    deep_mode: bool,
) -> Result<String, StoreError> {
    let facts = store.list_profile_facts(user_id).await?;
    let profile_facts = if facts.is_empty() {
        "(sin datos de perfil)".to_string()
    } else {
        facts
            .iter()
            .map(|fact| format!("- {}", fact.fact_text))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let recent_context = if deep_mode {
        let conversations = store
            .recent_conversations(user_id, DEEP_CONVERSATIONS)
            .await?;
        let alerts = store.recent_alerts(user_id, DEEP_ALERTS).await?;
        render_context(&conversations, &alerts)
    } else {
        let conversations = store
            .recent_conversations(user_id, NORMAL_CONVERSATIONS)
            .await?;
        let alerts = store
            .list_alerts(user_id, crate::repos::AlertListFilter::Pending)
            .await?;
        render_context(&conversations, &alerts)
    };

    let semantic_matches = match embedder {
        Some(embedder) => super::semantic::recall(store, embedder, user_id, question).await,
        None => String::new(),
    };
    let semantic_matches = if semantic_matches.is_empty() {
        "(sin recuerdos relacionados)".to_string()
    } else {
        semantic_matches
    };

    let request = prompts::consulta_request(&prompts::ConsultaContext {
        question,
        profile_facts: &profile_facts,
        recent_context: &recent_context,
        semantic_matches: &semantic_matches,
        deep_mode,
    });

    // The model decides whether to reach for web search.
    match gateway.generate_text(request, true).await {
        Ok(answer) => Ok(answer),
        Err(err) => {
            warn!("consulta llm call failed: {err}");
            Ok(UNAVAILABLE_REPLY.to_string())
        }
    }
}

/// Rows are fetched newest-first; the model reads them oldest-first.
fn render_context(conversations: &[ConversationRecord], alerts: &[AlertRecord]) -> String {
    let mut lines = Vec::new();

    for conversation in conversations.iter().rev() {
        lines.push(format!(
            "[{}] {}",
            conversation.created_at.format("%Y-%m-%d"),
            conversation.resumen
        ));
    }

    if !alerts.is_empty() {
        lines.push("PENDIENTES / ALERTAS:".to_string());
        for alert in alerts.iter().rev() {
            let due = alert
                .due_at
                .map(|due| due.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "sin fecha".to_string());
            lines.push(format!(
                "- [{}] {} ({})",
                alert.priority.as_str(),
                alert.titulo,
                due
            ));
        }
    }

    if lines.is_empty() {
        "(sin contexto reciente)".to_string()
    } else {
        lines.join("\n")
    }
}
