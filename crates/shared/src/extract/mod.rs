use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveTime};
use chrono_tz::Tz;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub mod dates;
pub mod fragment;
pub mod location;
pub mod persons;

pub use fragment::{Fragment, fragment_text};
pub use location::Ubicacion;
pub use persons::Persona;

use crate::timezone::local_iso;

/// Action vocabulary of the deterministic detector. The task extractor
/// rewrites it to `multiple` when a bundle carries several scheduled actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Alarma,
    ReunionPresencial,
    Videollamada,
    Llamada,
    Whatsapp,
    Email,
    Pago,
    TareaGeneral,
    Multiple,
}

impl Default for ActionType {
    fn default() -> Self {
        Self::TareaGeneral
    }
}

impl ActionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Alarma => "alarma",
            Self::ReunionPresencial => "reunion_presencial",
            Self::Videollamada => "videollamada",
            Self::Llamada => "llamada",
            Self::Whatsapp => "whatsapp",
            Self::Email => "email",
            Self::Pago => "pago",
            Self::TareaGeneral => "tarea_general",
            Self::Multiple => "multiple",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FechaHora {
    pub fecha: NaiveDate,
    pub hora: Option<NaiveTime>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Detalles {
    pub tema: Option<String>,
    pub duracion_minutos: Option<u32>,
    pub notas: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccionProgramada {
    pub tipo: String,
    pub titulo: String,
    pub fecha_hora_especifica: Option<String>,
    #[serde(default)]
    pub dato_extra: Option<String>,
}

/// The context envelope stored in `Alert.metadata`. C1 fills the detector
/// fields; the task extractor adds `acciones_programadas` and `link_meet`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextEnvelope {
    pub fecha_hora: Option<FechaHora>,
    pub hora_alarma: Option<String>,
    pub timestamp_alarma: Option<String>,
    pub ubicacion: Option<Ubicacion>,
    pub personas: Vec<Persona>,
    pub tipo_accion: ActionType,
    pub detalles: Detalles,
    pub acciones_sugeridas: Vec<String>,
    #[serde(default)]
    pub acciones_programadas: Vec<AccionProgramada>,
    pub completitud: u8,
    #[serde(default)]
    pub link_meet: Option<String>,
}

const DEFAULT_HOUR: (u32, u32) = (9, 0);
const NOISE_PREFIXES: [&str; 3] = ["[Mensaje]", "[Instrucción]", "Procesando..."];

// First match wins; alarm intent outranks everything else.
const ACTION_KEYWORDS: [(ActionType, &[&str]); 7] = [
    (
        ActionType::Alarma,
        &[
            "despiértame",
            "alarma",
            "despertador",
            "despertar",
            "avísame a las",
            "pon una alarma",
        ],
    ),
    (
        ActionType::ReunionPresencial,
        &[
            "reunión",
            "cita",
            "entrevista",
            "junta",
            "encuentro",
            "visita",
            "ir a",
        ],
    ),
    (
        ActionType::Videollamada,
        &[
            "zoom",
            "meet",
            "teams",
            "videollamada",
            "video llamada",
            "google meet",
            "reunión virtual",
            "entrevista virtual",
        ],
    ),
    (
        ActionType::Llamada,
        &["llamar", "telefonear", "contactar por teléfono"],
    ),
    (
        ActionType::Whatsapp,
        &["whatsapp", "escribir por wsp", "mensaje wsp", "mandar wsp"],
    ),
    (
        ActionType::Email,
        &["email", "correo", "enviar mail", "mandar correo"],
    ),
    (
        ActionType::Pago,
        &["pagar", "yapear", "transferir", "plin", "depositar"],
    ),
];

static RE_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)\s*(horas?|hrs?|minutos?|min)\b").expect("valid duration regex")
});

/// Runs the whole deterministic pass. Never fails: any sub-parse that does
/// not apply simply leaves its field empty.
pub fn extract_envelope(raw_text: &str, reference: DateTime<Tz>) -> ContextEnvelope {
    let text = strip_noise_prefixes(raw_text);
    let text_lower = text.to_lowercase();

    let fecha_hora = resolve_fecha_hora(&text_lower, reference.date_naive());
    let ubicacion = location::extract_location(text);
    let personas = persons::extract_persons(text);
    let tipo_accion = detect_action_type(&text_lower);
    let detalles = extract_detalles(text, &text_lower);

    let mut envelope = ContextEnvelope {
        fecha_hora,
        ubicacion,
        personas,
        tipo_accion,
        detalles,
        ..ContextEnvelope::default()
    };

    if envelope.tipo_accion == ActionType::Alarma {
        if let Some(fecha_hora) = &envelope.fecha_hora {
            envelope.hora_alarma = fecha_hora
                .hora
                .map(|hora| hora.format("%H:%M:%S").to_string());
            envelope.timestamp_alarma = Some(fecha_hora.timestamp.clone());
        }
    }

    envelope.acciones_sugeridas = suggested_actions(&envelope);
    envelope.completitud = completeness(&envelope);
    envelope
}

pub fn strip_noise_prefixes(text: &str) -> &str {
    let mut rest = text.trim_start();
    loop {
        let mut stripped = false;
        for prefix in NOISE_PREFIXES {
            if let Some(tail) = rest.strip_prefix(prefix) {
                rest = tail.trim_start();
                stripped = true;
            }
        }
        if !stripped {
            return rest.trim();
        }
    }
}

fn resolve_fecha_hora(text_lower: &str, reference: NaiveDate) -> Option<FechaHora> {
    let fecha = dates::resolve_date(text_lower, reference)?;
    let hora = dates::resolve_time(text_lower);
    let effective = hora.unwrap_or_else(|| {
        NaiveTime::from_hms_opt(DEFAULT_HOUR.0, DEFAULT_HOUR.1, 0).expect("default hour is valid")
    });
    Some(FechaHora {
        fecha,
        hora,
        timestamp: local_iso(fecha.and_time(effective)),
    })
}

pub fn detect_action_type(text_lower: &str) -> ActionType {
    for (action, keywords) in ACTION_KEYWORDS {
        if keywords.iter().any(|keyword| text_lower.contains(keyword)) {
            return action;
        }
    }
    ActionType::TareaGeneral
}

fn extract_detalles(text: &str, text_lower: &str) -> Detalles {
    let duracion_minutos = RE_DURATION.captures(text_lower).and_then(|caps| {
        let amount: u32 = caps[1].parse().ok()?;
        if caps[2].starts_with("hora") || caps[2].starts_with("hr") {
            amount.checked_mul(60)
        } else {
            Some(amount)
        }
    });

    Detalles {
        tema: None,
        duracion_minutos,
        notas: Some(text.chars().take(200).collect()),
    }
}

/// Rule table for the client-side quick actions; order-preserving dedupe,
/// capped at four.
fn suggested_actions(envelope: &ContextEnvelope) -> Vec<String> {
    let mut actions: Vec<&str> = Vec::new();

    if envelope.fecha_hora.is_some() {
        match envelope.tipo_accion {
            ActionType::Alarma => actions.push("poner_alarma"),
            ActionType::Videollamada => {
                actions.push("crear_meet");
                actions.push("agendar_calendario");
            }
            _ => actions.push("agendar_calendario"),
        }
    }

    if envelope.ubicacion.is_some() {
        actions.push("ver_ubicacion");
    }

    for persona in &envelope.personas {
        if persona.telefono.is_some() {
            actions.push("llamar");
            if envelope.tipo_accion == ActionType::Whatsapp {
                actions.push("whatsapp");
            }
            break;
        }
        if persona.email.is_some() {
            actions.push("email");
            break;
        }
    }

    if envelope.tipo_accion == ActionType::Pago {
        actions.push("abrir_yape");
    }

    let mut deduped: Vec<String> = Vec::new();
    for action in actions {
        if !deduped.iter().any(|existing| existing == action) {
            deduped.push(action.to_string());
        }
        if deduped.len() == 4 {
            break;
        }
    }
    deduped
}

/// 0..10: +3 date, +2 location, +2 person, +2 specific action, +1 duration.
fn completeness(envelope: &ContextEnvelope) -> u8 {
    let mut points = 0u8;
    if envelope.fecha_hora.is_some() {
        points += 3;
    }
    if envelope.ubicacion.is_some() {
        points += 2;
    }
    if !envelope.personas.is_empty() {
        points += 2;
    }
    if envelope.tipo_accion != ActionType::TareaGeneral {
        points += 2;
    }
    if envelope.detalles.duracion_minutos.is_some() {
        points += 1;
    }
    points.min(10)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono_tz::America::Lima;

    use super::{ActionType, extract_envelope, strip_noise_prefixes};

    fn reference() -> chrono::DateTime<chrono_tz::Tz> {
        Lima
            .with_ymd_and_hms(2026, 2, 4, 10, 0, 0)
            .single()
            .expect("valid lima datetime")
    }

    #[test]
    fn interview_utterance_extracts_full_envelope() {
        let envelope = extract_envelope(
            "Recuérdame la entrevista mañana a las 5 de la tarde en Av. Larco 1234, Miraflores",
            reference(),
        );

        let fecha_hora = envelope.fecha_hora.expect("date and time");
        assert_eq!(fecha_hora.timestamp, "2026-02-05T17:00:00-05:00");
        assert_eq!(envelope.tipo_accion, ActionType::ReunionPresencial);
        assert!(
            envelope
                .acciones_sugeridas
                .iter()
                .any(|a| a == "agendar_calendario")
        );
        assert!(envelope.acciones_sugeridas.iter().any(|a| a == "ver_ubicacion"));
        assert!(envelope.completitud >= 7);
    }

    #[test]
    fn date_without_time_defaults_to_nine() {
        let envelope = extract_envelope("cita el viernes", reference());
        let fecha_hora = envelope.fecha_hora.expect("date");
        assert!(fecha_hora.hora.is_none());
        assert_eq!(fecha_hora.timestamp, "2026-02-06T09:00:00-05:00");
    }

    #[test]
    fn alarm_intent_sets_alarm_fields_and_suggestion() {
        let envelope = extract_envelope("pon una alarma mañana a las 6 de la mañana", reference());
        assert_eq!(envelope.tipo_accion, ActionType::Alarma);
        assert_eq!(envelope.hora_alarma.as_deref(), Some("06:00:00"));
        assert_eq!(
            envelope.timestamp_alarma.as_deref(),
            Some("2026-02-05T06:00:00-05:00")
        );
        assert_eq!(envelope.acciones_sugeridas, vec!["poner_alarma".to_string()]);
    }

    #[test]
    fn payment_suggests_yape() {
        let envelope = extract_envelope("tengo que pagar el recibo de luz", reference());
        assert_eq!(envelope.tipo_accion, ActionType::Pago);
        assert!(envelope.acciones_sugeridas.iter().any(|a| a == "abrir_yape"));
    }

    #[test]
    fn suggested_actions_cap_at_four() {
        let envelope = extract_envelope(
            "videollamada mañana a las 3pm con Carlos Mendoza 987654321 para pagar, en Av. Larco 1234",
            reference(),
        );
        assert!(envelope.acciones_sugeridas.len() <= 4);
    }

    #[test]
    fn noise_prefixes_are_stripped() {
        assert_eq!(
            strip_noise_prefixes("[Mensaje] Procesando... hola"),
            "hola"
        );
        assert_eq!(strip_noise_prefixes("  [Instrucción] ver esto"), "ver esto");
        assert_eq!(strip_noise_prefixes("sin prefijo"), "sin prefijo");
    }

    #[test]
    fn extraction_never_fails_on_garbage() {
        let envelope = extract_envelope("@@@@ ???? 🙂🙂", reference());
        assert!(envelope.fecha_hora.is_none());
        assert!(envelope.personas.is_empty());
        assert_eq!(envelope.tipo_accion, ActionType::TareaGeneral);
        assert_eq!(envelope.completitud, 0);
    }

    #[test]
    fn duration_contributes_minutes() {
        let envelope = extract_envelope("reunión de 2 horas mañana", reference());
        assert_eq!(envelope.detalles.duracion_minutos, Some(120));
    }
}
