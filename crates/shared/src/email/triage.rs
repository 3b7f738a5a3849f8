use std::time::Duration;

use serde_json::json;
use tokio::time::sleep;
use tracing::{info, warn};
use uuid::Uuid;

use crate::llm::{EmailClassifyContract, EmailDeepContract, LlmGateway, prompts};
use crate::push::{FcmSender, PushMessage};
use crate::repos::{NewAnalyzedEmail, Store, StoreError};

use super::gmail::FetchedEmail;

const MIN_BODY_CHARS: usize = 50;
const MAX_HTTP_OCCURRENCES: usize = 5;
const MIN_SCORE: i32 = 30;
const DEEP_SCORE: i32 = 70;
const SENDER_HISTORY_LIMIT: i64 = 5;

#[derive(Debug, Default, Clone)]
pub struct TriageStats {
    pub procesados: usize,
    pub spam_descartado: usize,
    pub accion_baja: usize,
    pub accion_media: usize,
    pub accion_alta: usize,
    pub duplicados: usize,
}

#[derive(Debug, Clone)]
pub struct CriticalEmail {
    pub sender: String,
    pub subject: String,
    pub short_summary: String,
}

#[derive(Debug, Default)]
pub struct TriageReport {
    pub stats: TriageStats,
    pub criticos: Vec<CriticalEmail>,
}

/// Three-layer cascade: closed-lexicon heuristics, cheap classification, deep
/// analysis. Rejection at any layer skips all downstream work.
pub struct TriageEngine {
    spam_senders: &'static [&'static str],
    spam_subjects: &'static [&'static str],
    action_trigger_groups: &'static [&'static [&'static str]],
    pacing: Duration,
}

const SPAM_SENDERS: &[&str] = &[
    "noreply",
    "no-reply",
    "newsletter",
    "marketing",
    "notifications",
    "promo",
    "deals",
    "offers",
];

const SPAM_SUBJECTS: &[&str] = &[
    "unsubscribe",
    "suscripción",
    "descuento",
    "oferta",
    "% off",
    "compra ahora",
    "click here",
    "gratis",
    "winner",
    "ganador",
    "premio",
    "sorteo",
];

const ACTION_TRIGGERS: &[&[&str]] = &[
    // urgente
    &["urgente", "prioridad", "inmediato", "cuanto antes", "hoy", "deadline"],
    // laboral
    &[
        "entrevista",
        "oferta",
        "vacante",
        "postulación",
        "proceso de selección",
        "segunda etapa",
    ],
    // académico
    &["tarea", "examen", "proyecto", "entrega", "plazo", "calificación"],
    // legal
    &["contrato", "firma", "documento", "trámite", "constancia", "certificado"],
    // financiero
    &["factura", "pago", "vencimiento", "cobro", "transferencia", "deuda"],
];

const CORPORATE_TLDS: &[&str] = &[".edu", ".gob", ".com.pe"];

impl TriageEngine {
    pub fn new(pacing_seconds: u64) -> Self {
        Self {
            spam_senders: SPAM_SENDERS,
            spam_subjects: SPAM_SUBJECTS,
            action_trigger_groups: ACTION_TRIGGERS,
            pacing: Duration::from_secs(pacing_seconds),
        }
    }

    // --- Layer 1: heuristics, no LLM ---------------------------------------

    pub fn is_obvious_spam(&self, email: &FetchedEmail) -> bool {
        let sender = email.sender.to_lowercase();
        let subject = email.subject.to_lowercase();
        let body_excerpt: String = email.body.chars().take(500).collect::<String>().to_lowercase();

        if self.spam_senders.iter().any(|word| sender.contains(word)) {
            return true;
        }
        if self.spam_subjects.iter().any(|word| subject.contains(word)) {
            return true;
        }
        if email.body.chars().count() < MIN_BODY_CHARS {
            // Automated notification.
            return true;
        }
        if body_excerpt.matches("http").count() > MAX_HTTP_OCCURRENCES {
            // Marketing.
            return true;
        }
        false
    }

    pub fn initial_score(&self, email: &FetchedEmail, user_name: &str) -> i32 {
        let subject = email.subject.to_lowercase();
        let body = email.body.to_lowercase();
        let mut score = 0;

        if self
            .action_trigger_groups
            .iter()
            .any(|group| group.iter().any(|word| subject.contains(word) || body.contains(word)))
        {
            score += 30;
        }

        if self.mentions_user(&body, user_name) {
            score += 20;
        }

        if CORPORATE_TLDS.iter().any(|tld| email.sender.contains(tld)) {
            score += 15;
        }

        let subject_words = email.subject.split_whitespace().count();
        if subject_words > 5 && subject_words < 10 {
            score += 10;
        }

        if !body.contains("<img") && body.chars().count() < 2000 {
            score += 10;
        }

        if body.contains("unsubscribe") || body.contains("darse de baja") {
            score -= 20;
        }

        score.clamp(0, 100)
    }

    fn mentions_user(&self, body_lower: &str, user_name: &str) -> bool {
        if !user_name.is_empty() && body_lower.contains(&user_name.to_lowercase()) {
            return true;
        }
        body_lower.contains('@') && body_lower.contains("favor")
            || body_lower.contains("necesito que")
            || body_lower.contains("solicito")
    }

    // --- orchestrator -------------------------------------------------------

    /// Runs a deduped batch through the cascade. Per-email failures are
    /// counted, never raised.
    #[allow(clippy::too_many_arguments)]
    pub async fn process_batch(
        &self,
        store: &Store,
        gateway: &dyn LlmGateway,
        push: Option<&FcmSender>,
        user_id: Uuid,
        email_account_id: Option<Uuid>,
        emails: Vec<FetchedEmail>,
        user_name: &str,
    ) -> Result<TriageReport, StoreError> {
        let mut report = TriageReport::default();

        let ids: Vec<String> = emails.iter().map(|email| email.id.clone()).collect();
        let seen = store.existing_gmail_ids(user_id, &ids).await?;

        let mut first = true;
        for email in emails {
            if seen.contains(&email.id) {
                report.stats.duplicados += 1;
                continue;
            }
            report.stats.procesados += 1;

            // Layer 1.
            if self.is_obvious_spam(&email) {
                report.stats.spam_descartado += 1;
                continue;
            }
            let score = self.initial_score(&email, user_name);
            if score < MIN_SCORE {
                report.stats.spam_descartado += 1;
                continue;
            }

            // Inter-message pacing keeps the provider from throttling us.
            if !first {
                sleep(self.pacing).await;
            }
            first = false;

            // Layer 2.
            let classification = self.classify(gateway, &email).await;
            let Some(classification) = classification else {
                report.stats.accion_baja += 1;
                continue;
            };
            if classification.categoria == "spam" || !classification.requiere_accion {
                report.stats.accion_baja += 1;
                continue;
            }

            // Layer 3.
            if classification.urgencia == "alta" || score > DEEP_SCORE {
                match self
                    .deep_analyze_and_store(
                        store,
                        gateway,
                        user_id,
                        email_account_id,
                        &email,
                        score,
                        &classification,
                    )
                    .await
                {
                    Ok(()) => {
                        report.stats.accion_alta += 1;
                        report.criticos.push(CriticalEmail {
                            sender: email.sender.clone(),
                            subject: email.subject.clone(),
                            short_summary: classification.resumen_corto.clone(),
                        });
                    }
                    Err(err) => {
                        warn!("deep analysis of {} failed: {err}", email.id);
                        report.stats.accion_media += 1;
                    }
                }
            } else {
                report.stats.accion_media += 1;
            }
        }

        if let Some(sender) = push
            && let Some(top) = report.criticos.first()
        {
            emit_critical_push(store, sender, user_id, top).await;
        }

        info!(
            "email triage done: {} processed, {} spam, {} critical",
            report.stats.procesados, report.stats.spam_descartado, report.stats.accion_alta
        );
        Ok(report)
    }

    async fn classify(
        &self,
        gateway: &dyn LlmGateway,
        email: &FetchedEmail,
    ) -> Option<EmailClassifyContract> {
        let request = prompts::email_classify_request(&email.sender, &email.subject, &email.body);
        match gateway.generate_json(request).await {
            Ok(payload) => match serde_json::from_value::<EmailClassifyContract>(payload) {
                Ok(contract) => Some(contract),
                Err(err) => {
                    warn!("email classification parse failed: {err}");
                    None
                }
            },
            Err(err) => {
                warn!("email classification llm call failed: {err}");
                None
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn deep_analyze_and_store(
        &self,
        store: &Store,
        gateway: &dyn LlmGateway,
        user_id: Uuid,
        email_account_id: Option<Uuid>,
        email: &FetchedEmail,
        score: i32,
        classification: &EmailClassifyContract,
    ) -> Result<(), StoreError> {
        let history = store
            .sender_history(user_id, &email.sender, SENDER_HISTORY_LIMIT)
            .await?;
        let sender_context = render_sender_context(&history);

        let request = prompts::email_deep_request(&prompts::EmailDeepInput {
            sender: &email.sender,
            subject: &email.subject,
            date: &email
                .date
                .map(|date| date.to_rfc3339())
                .unwrap_or_else(|| "N/A".to_string()),
            body: &email.body,
            sender_context: &sender_context,
        });

        let deep: EmailDeepContract = match gateway.generate_json(request).await {
            Ok(payload) => serde_json::from_value(payload).unwrap_or_else(|err| {
                warn!("deep analysis parse failed, storing defaults: {err}");
                EmailDeepContract {
                    respuesta_sugerida: String::new(),
                    tono_detectado: "neutro".to_string(),
                    acciones_pendientes: Vec::new(),
                    fecha_limite: None,
                    prioridad_final: None,
                    contexto_adicional: None,
                    cambio_tono: false,
                }
            }),
            Err(err) => {
                warn!("deep analysis llm call failed, storing classification only: {err}");
                EmailDeepContract {
                    respuesta_sugerida: String::new(),
                    tono_detectado: "neutro".to_string(),
                    acciones_pendientes: Vec::new(),
                    fecha_limite: None,
                    prioridad_final: None,
                    contexto_adicional: None,
                    cambio_tono: false,
                }
            }
        };

        let metadata = json!({
            "correo_id_gmail": email.id,
            "contexto": deep.contexto_adicional,
            "historial_previo": history.len(),
            "cambio_tono": deep.cambio_tono,
            "resumen_corto": classification.resumen_corto,
        });

        store
            .insert_analyzed_email(&NewAnalyzedEmail {
                user_id,
                email_account_id,
                gmail_message_id: &email.id,
                sender: &email.sender,
                subject: &email.subject,
                date: email.date,
                importance_score: deep.prioridad_final.map(|p| p as i32).unwrap_or(score),
                category: &classification.categoria,
                urgency: &classification.urgencia,
                requires_action: true,
                suggested_reply: Some(&deep.respuesta_sugerida),
                detected_tone: Some(&deep.tono_detectado),
                pending_actions: &deep.acciones_pendientes,
                due_date: deep.fecha_limite,
                metadata,
            })
            .await?;
        Ok(())
    }
}

/// Aggregated snapshot of prior exchanges with this sender, for the deep
/// prompt.
fn render_sender_context(history: &[crate::repos::AnalyzedEmailRecord]) -> String {
    if history.is_empty() {
        return "PRIMER CORREO de este remitente. Usar tono neutro-profesional.".to_string();
    }

    let modal_tone = most_common(history.iter().filter_map(|entry| entry.detected_tone.as_deref()));
    let modal_category = most_common(history.iter().map(|entry| entry.category.as_str()));
    let last_contact = history
        .first()
        .and_then(|entry| entry.date)
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "N/A".to_string());

    let mut context = format!(
        "HISTORIAL CON ESTE REMITENTE:\n\
- Total de correos previos: {}\n\
- Último contacto: {last_contact}\n\
- Tono habitual: {}\n\
- Tema principal: {}\n",
        history.len(),
        modal_tone.unwrap_or("desconocido"),
        modal_category.unwrap_or("general"),
    );

    let prior_replies: Vec<&str> = history
        .iter()
        .filter(|entry| entry.answered)
        .filter_map(|entry| entry.metadata.get("respuesta_enviada").and_then(|v| v.as_str()))
        .take(2)
        .collect();

    context.push_str("\nRESPUESTAS ANTERIORES (para mantener consistencia):\n");
    if prior_replies.is_empty() {
        context.push_str("(No hay respuestas previas registradas)\n");
    } else {
        for (index, reply) in prior_replies.iter().enumerate() {
            let excerpt: String = reply.chars().take(200).collect();
            context.push_str(&format!("{}. {excerpt}...\n", index + 1));
        }
    }

    context.push_str("\nÚLTIMOS CORREOS:\n");
    for entry in history.iter().take(3) {
        let date = entry
            .date
            .map(|date| date.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "N/A".to_string());
        context.push_str(&format!("- [{date}] {}\n", entry.subject));
    }

    context
}

fn most_common<'a>(values: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for value in values {
        match counts.iter_mut().find(|(existing, _)| *existing == value) {
            Some((_, count)) => *count += 1,
            None => counts.push((value, 1)),
        }
    }
    counts.into_iter().max_by_key(|(_, count)| *count).map(|(value, _)| value)
}

async fn emit_critical_push(
    store: &Store,
    sender: &FcmSender,
    user_id: Uuid,
    top: &CriticalEmail,
) {
    let Ok(Some(user)) = store.get_user(user_id).await else {
        return;
    };
    let Some(token) = user.push_token.filter(|token| !token.is_empty()) else {
        return;
    };

    let mut message = PushMessage {
        title: format!("Correo urgente: {}", top.subject),
        body: format!("{} — {}", top.sender, top.short_summary),
        data: Default::default(),
    };
    message
        .data
        .insert("tipo".to_string(), "correo_critico".to_string());
    message
        .data
        .insert("ir_a".to_string(), "correos".to_string());
    message.data.insert(
        "click_action".to_string(),
        "FLUTTER_NOTIFICATION_CLICK".to_string(),
    );

    sender.send_silently(&token, &message).await;
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{TriageEngine, most_common};
    use crate::email::gmail::FetchedEmail;

    fn email(sender: &str, subject: &str, body: &str) -> FetchedEmail {
        FetchedEmail {
            id: "m1".to_string(),
            thread_id: None,
            sender: sender.to_string(),
            sender_full: sender.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            date: Some(Utc::now()),
            labels: Vec::new(),
        }
    }

    #[test]
    fn newsletter_sender_is_obvious_spam() {
        let engine = TriageEngine::new(0);
        let spam = email(
            "newsletter@deals.example",
            "50% off",
            &"compra ahora http://a http://b http://c http://d http://e http://f".repeat(2),
        );
        assert!(engine.is_obvious_spam(&spam));
    }

    #[test]
    fn short_bodies_are_dropped_as_notifications() {
        let engine = TriageEngine::new(0);
        assert!(engine.is_obvious_spam(&email("amigo@example.com", "hola", "ok")));
    }

    #[test]
    fn interview_email_scores_above_threshold() {
        let engine = TriageEngine::new(0);
        let interview = email(
            "rrhh@acme.com.pe",
            "Segunda etapa del proceso de selección",
            "Hola, queremos coordinar la segunda etapa de tu entrevista este jueves. \
             Por favor confirma tu disponibilidad para agendar la reunión con el equipo.",
        );
        assert!(!engine.is_obvious_spam(&interview));
        assert!(engine.initial_score(&interview, "") >= 30);
    }

    #[test]
    fn unsubscribe_penalty_applies() {
        let engine = TriageEngine::new(0);
        let promo = email(
            "ventas@tienda.example",
            "novedades de la semana para ti hoy",
            &format!(
                "{} unsubscribe aquí",
                "contenido largo sin valor accionable ".repeat(4)
            ),
        );
        let plain = email(
            "ventas@tienda.example",
            "novedades de la semana para ti hoy",
            &"contenido largo sin valor accionable ".repeat(4),
        );
        assert!(engine.initial_score(&promo, "") < engine.initial_score(&plain, ""));
    }

    #[test]
    fn most_common_picks_the_mode() {
        let values = ["formal", "informal", "formal"];
        assert_eq!(most_common(values.into_iter()), Some("formal"));
    }
}
