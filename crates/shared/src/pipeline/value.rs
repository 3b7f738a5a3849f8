use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::extract::extract_envelope;
use crate::llm::{Embedder, LlmGateway, ValueContract, prompts};
use crate::models::{AlertKind, ConversationType, Origin, Priority};
use crate::push::{FcmSender, PushMessage};
use crate::repos::{NewAlert, NewConversation, Store, StoreError};
use crate::timezone;

const RAW_TEXT_LIMIT: usize = 1000;
const AUTO_FACT_CATEGORY: &str = "AUTO_IA";
const CONFIRMATION_KEYWORDS: [&str; 5] =
    ["confirma", "avisa", "notifica", "recuérdame", "recuerdame"];

#[derive(Debug, Default)]
pub struct ValueOutcome {
    pub respuesta: String,
    pub conversation_id: Option<Uuid>,
    pub alertas_generadas: Vec<String>,
    pub nuevos_aprendizajes: Vec<String>,
}

/// Persists one conversation summary, its atemporal profile facts, and any
/// derived tasks. LLM failure degrades to a raw-text conversation row.
pub async fn process_value(
    store: &Store,
    gateway: &dyn LlmGateway,
    embedder: Option<&dyn Embedder>,
    push: Option<&FcmSender>,
    user_id: Uuid,
    message: &str,
    urgency: Priority,
    origin: Origin,
) -> Result<ValueOutcome, StoreError> {
    let contract = match gateway
        .generate_json(prompts::value_request(message, urgency.as_str()))
        .await
    {
        Ok(payload) => match serde_json::from_value::<ValueContract>(payload) {
            Ok(contract) => Some(contract),
            Err(err) => {
                warn!("value processor contract parse failed: {err}");
                None
            }
        },
        Err(err) => {
            warn!("value processor llm call failed: {err}");
            None
        }
    };

    let Some(contract) = contract else {
        return store_raw_fallback(store, user_id, message, urgency, origin).await;
    };

    let truncated_raw: String = message.chars().take(RAW_TEXT_LIMIT).collect();
    let metadata = json!({
        "texto_original": truncated_raw,
        "aprendizajes": contract.aprendizajes_usuario,
    });

    let tipo = contract
        .tipo_evento
        .as_deref()
        .and_then(ConversationType::parse_lenient)
        .unwrap_or(ConversationType::Other);

    let conversation_id = store
        .insert_conversation(&NewConversation {
            user_id,
            resumen: &contract.resumen_guardar,
            tipo,
            urgencia: urgency,
            origen: origin,
            metadata,
        })
        .await?;

    if let Some(embedder) = embedder {
        super::semantic::embed_and_attach(
            store,
            embedder,
            conversation_id,
            user_id,
            &contract.resumen_guardar,
        )
        .await;
    }

    let origin_ref = format!("conv_{conversation_id}");
    let mut aprendizajes = Vec::new();
    for fact in &contract.aprendizajes_usuario {
        let trimmed = fact.trim();
        if trimmed.is_empty() {
            continue;
        }
        match store
            .upsert_profile_fact(user_id, trimmed, AUTO_FACT_CATEGORY, Some(&origin_ref))
            .await
        {
            Ok(true) => aprendizajes.push(trimmed.to_string()),
            Ok(false) => debug!("profile fact already known: {trimmed}"),
            Err(err) => warn!("profile fact upsert failed: {err}"),
        }
    }

    let now = timezone::now_local();
    let mut alertas = Vec::new();
    let mut any_high = false;
    for tarea in &contract.tareas {
        let combined = format!("{}. {}", tarea.titulo, tarea.descripcion);
        let envelope = extract_envelope(&combined, now);
        let due_at = envelope.fecha_hora.as_ref().and_then(|fecha_hora| {
            chrono::DateTime::parse_from_rfc3339(&fecha_hora.timestamp)
                .ok()
                .map(|stamped| stamped.with_timezone(&chrono::Utc))
        });
        let priority = tarea.priority();
        any_high = any_high || priority == Priority::High;

        let metadata = serde_json::to_value(&envelope)
            .map_err(|err| StoreError::InvalidData(format!("envelope encode failed: {err}")))?;

        let inserted = store
            .insert_alert(&NewAlert {
                user_id,
                conversation_id: Some(conversation_id),
                titulo: &tarea.titulo,
                descripcion: &tarea.descripcion,
                priority,
                kind: AlertKind::AutoDetected,
                label: tarea.label(),
                due_at,
                metadata,
            })
            .await;

        match inserted {
            Ok(_) => alertas.push(tarea.titulo.clone()),
            Err(err) => warn!("derived alert insert failed: {err}"),
        }
    }

    if let Some(sender) = push
        && should_notify(message, any_high)
        && !alertas.is_empty()
    {
        emit_value_push(store, sender, user_id, &alertas).await;
    }

    Ok(ValueOutcome {
        respuesta: value_reply(&contract, &alertas),
        conversation_id: Some(conversation_id),
        alertas_generadas: alertas,
        nuevos_aprendizajes: aprendizajes,
    })
}

/// Push policy for the value path: a confirmation keyword or any HIGH task.
fn should_notify(message: &str, any_high: bool) -> bool {
    if any_high {
        return true;
    }
    let lower = message.to_lowercase();
    CONFIRMATION_KEYWORDS
        .iter()
        .any(|keyword| lower.contains(keyword))
}

async fn store_raw_fallback(
    store: &Store,
    user_id: Uuid,
    message: &str,
    urgency: Priority,
    origin: Origin,
) -> Result<ValueOutcome, StoreError> {
    let truncated: String = message.chars().take(RAW_TEXT_LIMIT).collect();
    let conversation_id = store
        .insert_conversation(&NewConversation {
            user_id,
            resumen: &truncated,
            tipo: ConversationType::Other,
            urgencia: urgency,
            origen: origin,
            metadata: json!({ "texto_original": truncated, "fallback": true }),
        })
        .await?;

    Ok(ValueOutcome {
        respuesta: "Anotado. Lo guardé en tu historial.".to_string(),
        conversation_id: Some(conversation_id),
        ..ValueOutcome::default()
    })
}

fn value_reply(contract: &ValueContract, alertas: &[String]) -> String {
    let mut parts = vec!["Entendido, lo tengo presente.".to_string()];
    if !contract.aprendizajes_usuario.is_empty() {
        parts.push(format!(
            "Aprendí {} dato(s) nuevo(s) sobre ti.",
            contract.aprendizajes_usuario.len()
        ));
    }
    if !alertas.is_empty() {
        parts.push(format!("Creé {} tarea(s): {}.", alertas.len(), alertas.join(", ")));
    }
    parts.join(" ")
}

async fn emit_value_push(store: &Store, sender: &FcmSender, user_id: Uuid, alertas: &[String]) {
    let Ok(Some(user)) = store.get_user(user_id).await else {
        return;
    };
    let Some(token) = user.push_token.filter(|token| !token.is_empty()) else {
        return;
    };

    // One task gets full detail; several get a grouped summary.
    let (title, body) = if alertas.len() == 1 {
        ("Nueva tarea detectada".to_string(), alertas[0].clone())
    } else {
        let visible: Vec<&str> = alertas.iter().take(3).map(String::as_str).collect();
        let remaining = alertas.len().saturating_sub(3);
        let mut body = visible.join(" · ");
        if remaining > 0 {
            body.push_str(&format!(" …y {remaining} más"));
        }
        (format!("{} tareas detectadas", alertas.len()), body)
    };

    let mut message = PushMessage {
        title,
        body,
        data: Default::default(),
    };
    message
        .data
        .insert("tipo".to_string(), "tareas_detectadas".to_string());
    message.data.insert("ir_a".to_string(), "alertas".to_string());
    message.data.insert(
        "click_action".to_string(),
        "FLUTTER_NOTIFICATION_CLICK".to_string(),
    );

    sender.send_silently(&token, &message).await;
}

#[cfg(test)]
mod tests {
    use super::should_notify;

    #[test]
    fn confirmation_keyword_triggers_push() {
        assert!(should_notify("avísa me cuando esté, confirma por favor", false));
        assert!(should_notify("Recuérdame el pago del lunes", false));
    }

    #[test]
    fn high_priority_triggers_push_without_keyword() {
        assert!(should_notify("el cliente quiere la entrega ya", true));
    }

    #[test]
    fn plain_value_stays_silent() {
        assert!(!should_notify("soy alérgico a las nueces", false));
    }
}
