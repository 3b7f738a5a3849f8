use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::extract::{
    AccionProgramada, ActionType, ContextEnvelope, extract_envelope, fragment_text,
};
use crate::llm::{LlmGateway, SubActionContract, contracts, prompts};
use crate::models::{AlertKind, AlertLabel, Priority};
use crate::push::{FcmSender, PushMessage};
use crate::repos::{AlertRecord, NewAlert, Store, StoreError};
use crate::timezone;

const MEET_PLACEHOLDER: &str = "https://meet.google.com/new";
const FALLBACK_TITLE: &str = "Recordatorio Rápido";

#[derive(Debug)]
pub struct TaskOutcome {
    pub alert: AlertRecord,
    pub acciones: Vec<AccionProgramada>,
    pub respuesta: String,
}

/// Turns one utterance into one stored alert (possibly a multi-action
/// bundle) plus its push notification.
pub async fn process_task(
    store: &Store,
    gateway: &dyn LlmGateway,
    push: Option<&FcmSender>,
    user_id: Uuid,
    user_email: Option<&str>,
    message: &str,
    conversation_id: Option<Uuid>,
) -> Result<TaskOutcome, StoreError> {
    let now = timezone::now_local();
    let mut envelope = extract_envelope(message, now);

    let fecha_referencia = envelope
        .fecha_hora
        .as_ref()
        .map(|fecha_hora| fecha_hora.fecha.to_string())
        .unwrap_or_else(|| now.date_naive().to_string());

    let envelope_json =
        serde_json::to_string(&envelope).unwrap_or_else(|_| "{}".to_string());

    // The fragmenter pre-pass anchors multi-action utterances: one detected
    // fragment per expected array element.
    let fragments = fragment_text(message);
    let fragment_hints = if fragments.len() > 1 {
        fragments
            .iter()
            .map(|fragment| {
                format!(
                    "{}. [{}] {}",
                    fragment.posicion,
                    fragment.tipo_accion.as_str(),
                    fragment.texto_original
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        String::new()
    };

    let request = prompts::task_request(
        message,
        &now.format("%Y-%m-%dT%H:%M:%S").to_string(),
        &fecha_referencia,
        &envelope_json,
        &fragment_hints,
    );

    let sub_actions = match gateway.generate_json(request).await {
        Ok(payload) => match contracts::parse_sub_actions(payload) {
            Ok(actions) if !actions.is_empty() => Some(actions),
            Ok(_) => {
                warn!("task extractor returned an empty action list");
                None
            }
            Err(err) => {
                warn!("task extractor contract parse failed: {err}");
                None
            }
        },
        Err(err) => {
            warn!("task extractor llm call failed: {err}");
            None
        }
    };

    let outcome = match sub_actions {
        Some(actions) => {
            store_structured_alert(
                store,
                user_id,
                user_email,
                conversation_id,
                &mut envelope,
                actions,
            )
            .await?
        }
        None => {
            store_fallback_alert(
                store,
                user_id,
                user_email,
                message,
                conversation_id,
                &envelope,
            )
            .await?
        }
    };

    if let Some(sender) = push {
        emit_task_push(store, sender, user_id, &outcome).await;
    }

    Ok(outcome)
}

async fn store_structured_alert(
    store: &Store,
    user_id: Uuid,
    user_email: Option<&str>,
    conversation_id: Option<Uuid>,
    envelope: &mut ContextEnvelope,
    actions: Vec<SubActionContract>,
) -> Result<TaskOutcome, StoreError> {
    // The calendar entry anchors the bundle; otherwise list order decides.
    let primary_index = actions
        .iter()
        .position(|action| action.tipo_accion == "agendar_calendario")
        .unwrap_or(0);

    let acciones: Vec<AccionProgramada> = actions
        .iter()
        .map(|action| AccionProgramada {
            tipo: action.tipo_accion.clone(),
            titulo: action.titulo.clone(),
            fecha_hora_especifica: Some(action.fecha_iso.clone()),
            dato_extra: action
                .dato_extra
                .clone()
                .or_else(|| match action.tipo_accion.as_str() {
                    "crear_meet" => Some(MEET_PLACEHOLDER.to_string()),
                    _ => None,
                }),
        })
        .collect();

    let primary = &actions[primary_index];
    let due_at = parse_local_iso(&primary.fecha_iso).or_else(|| {
        envelope
            .fecha_hora
            .as_ref()
            .and_then(|fecha_hora| parse_local_iso(&fecha_hora.timestamp))
    });

    envelope.acciones_programadas = acciones.clone();
    if acciones.len() > 1 {
        envelope.tipo_accion = ActionType::Multiple;
    }
    if acciones.iter().any(|action| action.tipo == "crear_meet") {
        envelope.link_meet = Some(MEET_PLACEHOLDER.to_string());
    }

    let metadata = serde_json::to_value(&*envelope)
        .map_err(|err| StoreError::InvalidData(format!("envelope encode failed: {err}")))?;

    let new_alert = NewAlert {
        user_id,
        conversation_id,
        titulo: &primary.titulo,
        descripcion: &primary.descripcion,
        priority: primary.priority(),
        kind: AlertKind::Manual,
        label: primary.label(),
        due_at,
        metadata,
    };

    let alert = insert_with_provision_retry(store, user_id, user_email, &new_alert).await?;

    let mut acciones = acciones;
    refresh_meet_link(store, &alert, &mut acciones, envelope).await;

    let respuesta = structured_reply(&acciones, &primary.titulo);
    Ok(TaskOutcome {
        alert,
        acciones,
        respuesta,
    })
}

async fn store_fallback_alert(
    store: &Store,
    user_id: Uuid,
    user_email: Option<&str>,
    message: &str,
    conversation_id: Option<Uuid>,
    envelope: &ContextEnvelope,
) -> Result<TaskOutcome, StoreError> {
    let metadata = serde_json::to_value(envelope).unwrap_or(Value::Null);

    let new_alert = NewAlert {
        user_id,
        conversation_id,
        titulo: FALLBACK_TITLE,
        descripcion: message,
        priority: Priority::Medium,
        kind: AlertKind::Manual,
        label: AlertLabel::Others,
        due_at: None,
        metadata,
    };

    let alert = insert_with_provision_retry(store, user_id, user_email, &new_alert).await?;
    Ok(TaskOutcome {
        alert,
        acciones: Vec::new(),
        respuesta: format!("Guardé tu recordatorio: \"{FALLBACK_TITLE}\"."),
    })
}

/// Exactly one retry: a foreign-key violation means the user row is missing,
/// so auto-provision it from the authenticated token and try again.
async fn insert_with_provision_retry(
    store: &Store,
    user_id: Uuid,
    user_email: Option<&str>,
    alert: &NewAlert<'_>,
) -> Result<AlertRecord, StoreError> {
    match store.insert_alert(alert).await {
        Ok(record) => Ok(record),
        Err(err) if err.is_foreign_key_violation() => {
            info!("alert insert hit missing user {user_id}, auto-provisioning");
            store.ensure_user(user_id, user_email).await?;
            store.insert_alert(alert).await
        }
        Err(err) => Err(err),
    }
}

/// A DB trigger may rewrite the placeholder meet link after insert; re-read
/// the row and refresh the in-memory action list if it did.
async fn refresh_meet_link(
    store: &Store,
    alert: &AlertRecord,
    acciones: &mut [AccionProgramada],
    envelope: &mut ContextEnvelope,
) {
    if !acciones.iter().any(|action| action.tipo == "crear_meet") {
        return;
    }

    let stored = match store.alert_metadata(alert.id, alert.user_id).await {
        Ok(Some(metadata)) => metadata,
        _ => return,
    };

    let Some(stored_link) = stored
        .get("link_meet")
        .and_then(Value::as_str)
        .filter(|link| !link.is_empty() && *link != MEET_PLACEHOLDER)
    else {
        return;
    };

    envelope.link_meet = Some(stored_link.to_string());
    for accion in acciones.iter_mut() {
        if accion.tipo == "crear_meet" {
            accion.dato_extra = Some(stored_link.to_string());
        }
    }
}

fn structured_reply(acciones: &[AccionProgramada], primary_title: &str) -> String {
    if acciones.len() <= 1 {
        format!("Listo, agendé: {primary_title}.")
    } else {
        let lines: Vec<String> = acciones
            .iter()
            .map(|accion| {
                format!(
                    "• {} ({})",
                    accion.titulo,
                    accion.fecha_hora_especifica.as_deref().unwrap_or("sin hora")
                )
            })
            .collect();
        format!(
            "Listo, armé tu paquete de {} acciones:\n{}",
            acciones.len(),
            lines.join("\n")
        )
    }
}

async fn emit_task_push(store: &Store, sender: &FcmSender, user_id: Uuid, outcome: &TaskOutcome) {
    let Ok(Some(user)) = store.get_user(user_id).await else {
        return;
    };
    let Some(token) = user.push_token.filter(|token| !token.is_empty()) else {
        return;
    };

    let message = build_task_push(outcome);
    sender.send_silently(&token, &message).await;
}

/// Data map holds only strings; complex values ship JSON-stringified.
fn build_task_push(outcome: &TaskOutcome) -> PushMessage {
    let body = if outcome.acciones.is_empty() {
        outcome.alert.descripcion.chars().take(120).collect()
    } else {
        outcome
            .acciones
            .iter()
            .map(|accion| accion.titulo.as_str())
            .collect::<Vec<_>>()
            .join(" · ")
    };

    let mut message = PushMessage {
        title: outcome.alert.titulo.clone(),
        body,
        data: Default::default(),
    };
    message
        .data
        .insert("tipo".to_string(), "nueva_alerta".to_string());
    message
        .data
        .insert("alerta_id".to_string(), outcome.alert.id.to_string());
    message.data.insert(
        "acciones_json".to_string(),
        serde_json::to_string(&outcome.acciones).unwrap_or_else(|_| "[]".to_string()),
    );
    message.data.insert(
        "metadata".to_string(),
        outcome.alert.metadata.to_string(),
    );
    message
        .data
        .insert("ejecutar_automatico".to_string(), "true".to_string());
    message.data.insert("ir_a".to_string(), "alertas".to_string());
    message.data.insert(
        "click_action".to_string(),
        "FLUTTER_NOTIFICATION_CLICK".to_string(),
    );
    message
}

/// `fecha_iso` arrives as local wall-clock (`YYYY-MM-DDTHH:MM:SS`), with or
/// without the Lima offset suffix.
fn parse_local_iso(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(stamped) = DateTime::parse_from_rfc3339(raw) {
        return Some(stamped.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").ok()?;
    timezone::combine_local(naive.date(), naive.time())
}

#[cfg(test)]
mod tests {
    use super::parse_local_iso;

    #[test]
    fn local_iso_parses_with_and_without_offset() {
        let bare = parse_local_iso("2026-02-05T14:00:00").expect("bare local parses");
        assert_eq!(bare.to_rfc3339(), "2026-02-05T19:00:00+00:00");

        let offset = parse_local_iso("2026-02-05T14:00:00-05:00").expect("offset parses");
        assert_eq!(offset, bare);
    }

    #[test]
    fn garbage_dates_yield_none() {
        assert!(parse_local_iso("mañana a las 2").is_none());
    }
}
