use crate::models::{AlertLabel, Priority};
use crate::push::PushMessage;
use crate::repos::AlertRecord;

const MAX_BULLETS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BriefingEdition {
    Matutino,
    Nocturno,
}

/// Label weight plus priority weight; ties keep due-date order.
pub fn importance_score(alert: &AlertRecord) -> i32 {
    let label_score = match alert.label {
        AlertLabel::Health | AlertLabel::Business | AlertLabel::Partner => 10,
        AlertLabel::Study => 5,
        _ => 0,
    };
    let priority_score = match alert.priority {
        Priority::High => 5,
        Priority::Medium => 2,
        Priority::Low => 0,
    };
    label_score + priority_score
}

pub fn sort_by_importance(alerts: &mut [AlertRecord]) {
    alerts.sort_by(|a, b| importance_score(b).cmp(&importance_score(a)));
}

/// Digest composition. Morning with nothing due still says so; the evening
/// edition goes silent instead.
pub fn compose_digest(edition: BriefingEdition, alerts: &[AlertRecord]) -> Option<PushMessage> {
    if alerts.is_empty() {
        return match edition {
            BriefingEdition::Matutino => Some(PushMessage {
                title: "Buenos días ☀️".to_string(),
                body: "No tienes pendientes urgentes para hoy.".to_string(),
                data: digest_data(edition),
            }),
            BriefingEdition::Nocturno => None,
        };
    }

    let mut sorted: Vec<&AlertRecord> = alerts.iter().collect();
    sorted.sort_by(|a, b| importance_score(b).cmp(&importance_score(a)));

    let bullets: Vec<String> = sorted
        .iter()
        .take(MAX_BULLETS)
        .map(|alert| {
            let hour = alert
                .due_at
                .map(|due| {
                    format!(
                        " ({})",
                        due.with_timezone(&crate::timezone::USER_TIME_ZONE)
                            .format("%H:%M")
                    )
                })
                .unwrap_or_default();
            format!("• {}{hour}", alert.titulo)
        })
        .collect();

    let mut body = bullets.join("\n");
    if sorted.len() > MAX_BULLETS {
        body.push_str(&format!("\n…y {} más", sorted.len() - MAX_BULLETS));
    }

    let title = match edition {
        BriefingEdition::Matutino => format!("Tu día: {} pendiente(s)", sorted.len()),
        BriefingEdition::Nocturno => format!("Mañana: {} pendiente(s)", sorted.len()),
    };

    Some(PushMessage {
        title,
        body,
        data: digest_data(edition),
    })
}

fn digest_data(edition: BriefingEdition) -> std::collections::HashMap<String, String> {
    let mut data = std::collections::HashMap::new();
    data.insert(
        "tipo".to_string(),
        match edition {
            BriefingEdition::Matutino => "resumen_matutino".to_string(),
            BriefingEdition::Nocturno => "resumen_nocturno".to_string(),
        },
    );
    data.insert("ir_a".to_string(), "alertas".to_string());
    data.insert(
        "click_action".to_string(),
        "FLUTTER_NOTIFICATION_CLICK".to_string(),
    );
    data
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::Value;
    use uuid::Uuid;

    use super::{BriefingEdition, compose_digest, importance_score, sort_by_importance};
    use crate::models::{AlertKind, AlertLabel, AlertState, Priority};
    use crate::repos::AlertRecord;

    fn alert(titulo: &str, label: AlertLabel, priority: Priority) -> AlertRecord {
        AlertRecord {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            conversation_id: None,
            titulo: titulo.to_string(),
            descripcion: String::new(),
            priority,
            kind: AlertKind::Manual,
            state: AlertState::Pending,
            label,
            due_at: None,
            metadata: Value::Null,
            archived_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn ordering_puts_health_high_first() {
        let mut alerts = vec![
            alert("otros", AlertLabel::Others, Priority::High),
            alert("salud", AlertLabel::Health, Priority::High),
            alert("estudio", AlertLabel::Study, Priority::High),
            alert("negocio", AlertLabel::Business, Priority::Medium),
        ];
        sort_by_importance(&mut alerts);

        let titles: Vec<&str> = alerts.iter().map(|a| a.titulo.as_str()).collect();
        assert_eq!(titles, vec!["salud", "negocio", "estudio", "otros"]);
        assert_eq!(importance_score(&alerts[0]), 15);
        assert_eq!(importance_score(&alerts[1]), 12);
        assert_eq!(importance_score(&alerts[2]), 10);
        assert_eq!(importance_score(&alerts[3]), 5);
    }

    #[test]
    fn morning_with_no_matches_sends_short_note() {
        let digest = compose_digest(BriefingEdition::Matutino, &[]).expect("morning always sends");
        assert!(digest.body.contains("No tienes pendientes"));
    }

    #[test]
    fn evening_with_no_matches_sends_nothing() {
        assert!(compose_digest(BriefingEdition::Nocturno, &[]).is_none());
    }

    #[test]
    fn digest_caps_bullets_and_counts_the_rest() {
        let alerts: Vec<AlertRecord> = (0..7)
            .map(|index| {
                alert(
                    &format!("tarea {index}"),
                    AlertLabel::Personal,
                    Priority::Medium,
                )
            })
            .collect();
        let digest =
            compose_digest(BriefingEdition::Matutino, &alerts).expect("digest composes");
        assert_eq!(digest.body.matches('•').count(), 5);
        assert!(digest.body.contains("…y 2 más"));
    }
}
