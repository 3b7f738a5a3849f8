use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::llm::{BrainContract, LlmGateway, prompts};
use crate::models::{AlertKind, AlertLabel};
use crate::repos::{NewAlert, Store, StoreError, WhatsAppMessageRecord};

const NOISE_MAX_CHARS: usize = 10;
const NO_HISTORY_SENTINEL: &str = "(sin historial previo)";

#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub chat: String,
    pub mensajes: usize,
    pub tareas_creadas: usize,
}

/// Background distillation over everything still unprocessed: group by chat,
/// roll each chat's running summary forward, emit task alerts, then flip the
/// processed flag in one statement. A failing chat never stops the others.
pub async fn run_brain_pass(
    store: &Store,
    gateway: &dyn LlmGateway,
    user_id: Uuid,
) -> Result<Vec<ChatOutcome>, StoreError> {
    let messages = store.unprocessed_whatsapp_messages(user_id).await?;
    if messages.is_empty() {
        return Ok(Vec::new());
    }

    let mut outcomes = Vec::new();
    for (chat_name, chat_messages) in group_by_chat(messages) {
        let message_ids: Vec<String> = chat_messages
            .iter()
            .map(|message| message.id.clone())
            .collect();

        let outcome = process_chat(store, gateway, user_id, &chat_name, &chat_messages).await;

        // Mark processed regardless of outcome so a poisoned chat cannot
        // wedge the queue.
        if let Err(err) = store.mark_whatsapp_processed(user_id, &message_ids).await {
            warn!("mark processed failed for chat {chat_name}: {err}");
        }

        match outcome {
            Ok(Some(result)) => outcomes.push(result),
            Ok(None) => {}
            Err(err) => warn!("brain pass failed for chat {chat_name}: {err}"),
        }
    }

    info!("brain pass finished: {} chats distilled", outcomes.len());
    Ok(outcomes)
}

async fn process_chat(
    store: &Store,
    gateway: &dyn LlmGateway,
    user_id: Uuid,
    chat_name: &str,
    messages: &[WhatsAppMessageRecord],
) -> Result<Option<ChatOutcome>, StoreError> {
    if is_noise_chat(messages) {
        return Ok(None);
    }

    let previous_summary = store
        .get_chat_memory(user_id, chat_name)
        .await?
        .map(|memory| memory.current_summary)
        .unwrap_or_else(|| NO_HISTORY_SENTINEL.to_string());

    let transcript = render_transcript(messages);

    let payload = match gateway
        .generate_json(prompts::brain_request(chat_name, &previous_summary, &transcript))
        .await
    {
        Ok(payload) => payload,
        Err(err) => {
            warn!("brain llm call failed for chat {chat_name}: {err}");
            return Ok(None);
        }
    };

    let contract: BrainContract = match serde_json::from_value(payload) {
        Ok(contract) => contract,
        Err(err) => {
            warn!("brain contract parse failed for chat {chat_name}: {err}");
            return Ok(None);
        }
    };

    store
        .upsert_chat_memory(
            user_id,
            chat_name,
            &contract.nuevo_resumen,
            contract.intencion.as_deref(),
        )
        .await?;

    let last_ts = messages.last().map(|message| message.ts);
    let mut created = 0;
    for tarea in &contract.tareas {
        let titulo = format!("⚡ {}", tarea.titulo);
        let metadata = json!({
            "origen": "whatsapp_cerebro",
            "chat": chat_name,
            "ultimo_mensaje": last_ts,
        });

        let inserted = store
            .insert_alert(&NewAlert {
                user_id,
                conversation_id: None,
                titulo: &titulo,
                descripcion: &tarea.descripcion,
                priority: tarea.priority(),
                kind: AlertKind::WhatsappTask,
                label: AlertLabel::Others,
                due_at: None,
                metadata,
            })
            .await;

        match inserted {
            Ok(_) => created += 1,
            Err(err) => warn!("brain alert insert failed for chat {chat_name}: {err}"),
        }
    }

    Ok(Some(ChatOutcome {
        chat: chat_name.to_string(),
        mensajes: messages.len(),
        tareas_creadas: created,
    }))
}

/// A single sub-10-character message is noise; it still gets marked
/// processed, it just never reaches the model.
fn is_noise_chat(messages: &[WhatsAppMessageRecord]) -> bool {
    messages.len() == 1
        && messages
            .first()
            .is_some_and(|message| message.content.chars().count() < NOISE_MAX_CHARS)
}

/// Messages arrive sorted by (chat_nombre, ts), so grouping is one pass.
fn group_by_chat(
    messages: Vec<WhatsAppMessageRecord>,
) -> Vec<(String, Vec<WhatsAppMessageRecord>)> {
    let mut groups: Vec<(String, Vec<WhatsAppMessageRecord>)> = Vec::new();
    for message in messages {
        match groups.last_mut() {
            Some((chat, members)) if *chat == message.chat_name => members.push(message),
            _ => groups.push((message.chat_name.clone(), vec![message])),
        }
    }
    groups
}

fn render_transcript(messages: &[WhatsAppMessageRecord]) -> String {
    messages
        .iter()
        .map(|message| {
            let speaker = if message.is_mine { "YO" } else { &message.chat_name };
            format!(
                "[{}] {speaker}: {}",
                message.ts.format("%Y-%m-%d %H:%M"),
                message.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    use super::{group_by_chat, is_noise_chat, render_transcript};
    use crate::repos::WhatsAppMessageRecord;

    fn message(chat: &str, content: &str, minute: u32, mine: bool) -> WhatsAppMessageRecord {
        WhatsAppMessageRecord {
            id: format!("{chat}-{minute}"),
            user_id: Uuid::nil(),
            chat_id: chat.to_string(),
            chat_name: chat.to_string(),
            content: content.to_string(),
            ts: Utc.with_ymd_and_hms(2026, 2, 4, 10, minute, 0).single().expect("valid ts"),
            is_mine: mine,
            kind: "texto".to_string(),
            device_id: None,
            processed_by_ai: false,
        }
    }

    #[test]
    fn sorted_messages_group_by_chat_in_one_pass() {
        let groups = group_by_chat(vec![
            message("Ana", "hola", 1, false),
            message("Ana", "¿almuerzo el sábado?", 2, false),
            message("Trabajo", "manda el informe", 3, true),
        ]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "Ana");
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].0, "Trabajo");
    }

    #[test]
    fn single_short_message_is_noise() {
        assert!(is_noise_chat(&[message("Ana", "ok", 1, false)]));
        assert!(!is_noise_chat(&[message("Ana", "nos vemos mañana en la oficina", 1, false)]));
        assert!(!is_noise_chat(&[
            message("Ana", "ok", 1, false),
            message("Ana", "va", 2, false),
        ]));
    }

    #[test]
    fn transcript_marks_own_messages_as_yo() {
        let transcript = render_transcript(&[
            message("Ana", "¿vienes?", 1, false),
            message("Ana", "sí, a las 8", 2, true),
        ]);
        assert!(transcript.contains("Ana: ¿vienes?"));
        assert!(transcript.contains("YO: sí, a las 8"));
    }
}
