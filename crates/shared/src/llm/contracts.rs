use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::models::{AlertLabel, Priority};

/// Intent gate verdict. The LLM answers in Spanish; unknown strings fall
/// back to noise so a confused model can never invent work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentKind {
    Noise,
    Task,
    Value,
}

impl IntentKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "RUIDO" | "NOISE" => Some(Self::Noise),
            "TAREA" | "TASK" => Some(Self::Task),
            "VALIOSO" | "VALOR" | "VALUE" => Some(Self::Value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IntentContract {
    pub tipo: String,
    #[serde(default)]
    pub subtipo: Option<String>,
    #[serde(default)]
    pub urgencia: Option<String>,
}

impl IntentContract {
    pub fn kind(&self) -> Option<IntentKind> {
        IntentKind::parse(&self.tipo)
    }

    pub fn urgency(&self) -> Priority {
        self.urgencia
            .as_deref()
            .and_then(Priority::parse_lenient)
            .unwrap_or(Priority::Medium)
    }
}

/// One element of the task extractor's mandatory JSON array.
#[derive(Debug, Clone, Deserialize)]
pub struct SubActionContract {
    pub titulo: String,
    #[serde(default)]
    pub descripcion: String,
    pub tipo_accion: String,
    #[serde(default)]
    pub prioridad: Option<String>,
    #[serde(default)]
    pub etiqueta: Option<String>,
    pub fecha_iso: String,
    #[serde(default)]
    pub dato_extra: Option<String>,
}

impl SubActionContract {
    pub fn priority(&self) -> Priority {
        self.prioridad
            .as_deref()
            .and_then(Priority::parse_lenient)
            .unwrap_or(Priority::Medium)
    }

    pub fn label(&self) -> AlertLabel {
        self.etiqueta
            .as_deref()
            .and_then(AlertLabel::parse_lenient)
            .unwrap_or(AlertLabel::Others)
    }
}

pub fn parse_sub_actions(payload: Value) -> Result<Vec<SubActionContract>, serde_json::Error> {
    // Some models wrap the array in an object; accept both shapes.
    match payload {
        Value::Array(_) => serde_json::from_value(payload),
        Value::Object(ref object) => {
            if let Some(inner) = object
                .get("acciones")
                .or_else(|| object.get("tareas"))
                .cloned()
            {
                serde_json::from_value(inner)
            } else {
                serde_json::from_value(payload)
            }
        }
        other => serde_json::from_value(other),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValueTaskContract {
    pub titulo: String,
    #[serde(default)]
    pub prioridad: Option<String>,
    #[serde(default)]
    pub descripcion: String,
    #[serde(default)]
    pub etiqueta: Option<String>,
}

impl ValueTaskContract {
    pub fn priority(&self) -> Priority {
        self.prioridad
            .as_deref()
            .and_then(Priority::parse_lenient)
            .unwrap_or(Priority::Medium)
    }

    pub fn label(&self) -> AlertLabel {
        self.etiqueta
            .as_deref()
            .and_then(AlertLabel::parse_lenient)
            .unwrap_or(AlertLabel::Others)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValueContract {
    pub resumen_guardar: String,
    #[serde(default)]
    pub tipo_evento: Option<String>,
    #[serde(default)]
    pub aprendizajes_usuario: Vec<String>,
    #[serde(default)]
    pub tareas: Vec<ValueTaskContract>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailClassifyContract {
    pub requiere_accion: bool,
    #[serde(default = "default_category")]
    pub categoria: String,
    #[serde(default = "default_urgency")]
    pub urgencia: String,
    #[serde(default)]
    pub resumen_corto: String,
}

fn default_category() -> String {
    "personal".to_string()
}

fn default_urgency() -> String {
    "baja".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailDeepContract {
    #[serde(default)]
    pub respuesta_sugerida: String,
    #[serde(default)]
    pub tono_detectado: String,
    #[serde(default)]
    pub acciones_pendientes: Vec<String>,
    #[serde(default, deserialize_with = "lenient_naive_date")]
    pub fecha_limite: Option<NaiveDate>,
    #[serde(default)]
    pub prioridad_final: Option<i64>,
    #[serde(default)]
    pub contexto_adicional: Option<String>,
    #[serde(default)]
    pub cambio_tono: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SenderProfileContract {
    #[serde(default)]
    pub tono_habitual: Option<String>,
    #[serde(default)]
    pub tema_principal: Option<String>,
    #[serde(default)]
    pub nivel_importancia: Option<i64>,
    #[serde(default)]
    pub patron_comunicacion: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrainTaskContract {
    pub titulo: String,
    #[serde(default)]
    pub descripcion: String,
    #[serde(default)]
    pub prioridad: Option<String>,
}

impl BrainTaskContract {
    pub fn priority(&self) -> Priority {
        self.prioridad
            .as_deref()
            .and_then(Priority::parse_lenient)
            .unwrap_or(Priority::Medium)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrainContract {
    pub nuevo_resumen: String,
    #[serde(default)]
    pub tareas: Vec<BrainTaskContract>,
    #[serde(default)]
    pub intencion: Option<String>,
}

/// Accepts `"2026-01-20"`, null, or any non-date noise (mapped to None).
fn lenient_naive_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .as_deref()
        .and_then(|value| NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        BrainContract, EmailDeepContract, IntentContract, IntentKind, ValueContract,
        parse_sub_actions,
    };
    use crate::models::{AlertLabel, Priority};

    #[test]
    fn intent_contract_parses_spanish_labels() {
        let contract: IntentContract = serde_json::from_value(json!({
            "tipo": "TAREA",
            "subtipo": "recordatorio",
            "urgencia": "ALTA"
        }))
        .expect("valid intent payload");
        assert_eq!(contract.kind(), Some(IntentKind::Task));
        assert_eq!(contract.urgency(), Priority::High);
    }

    #[test]
    fn sub_actions_accept_bare_array_and_wrapped_object() {
        let bare = json!([{
            "titulo": "Alarma entrevista",
            "descripcion": "Despertar temprano",
            "tipo_accion": "poner_alarma",
            "prioridad": "ALTA",
            "etiqueta": "NEGOCIOS",
            "fecha_iso": "2026-02-05T14:00:00"
        }]);
        let actions = parse_sub_actions(bare).expect("bare array parses");
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].priority(), Priority::High);
        assert_eq!(actions[0].label(), AlertLabel::Business);

        let wrapped = json!({"acciones": [{
            "titulo": "Meet con Carlos",
            "tipo_accion": "crear_meet",
            "fecha_iso": "2026-02-05T17:00:00"
        }]});
        let actions = parse_sub_actions(wrapped).expect("wrapped array parses");
        assert_eq!(actions[0].tipo_accion, "crear_meet");
        assert_eq!(actions[0].priority(), Priority::Medium);
    }

    #[test]
    fn value_contract_defaults_empty_collections() {
        let contract: ValueContract = serde_json::from_value(json!({
            "resumen_guardar": "El usuario es alérgico a las nueces",
            "tipo_evento": "personal"
        }))
        .expect("valid value payload");
        assert!(contract.aprendizajes_usuario.is_empty());
        assert!(contract.tareas.is_empty());
    }

    #[test]
    fn deep_contract_tolerates_bad_deadline() {
        let contract: EmailDeepContract = serde_json::from_value(json!({
            "respuesta_sugerida": "Estimado Juan...",
            "tono_detectado": "formal",
            "acciones_pendientes": ["Confirmar asistencia"],
            "fecha_limite": "próxima semana",
            "prioridad_final": 85
        }))
        .expect("valid deep payload");
        assert!(contract.fecha_limite.is_none());
        assert_eq!(contract.prioridad_final, Some(85));
    }

    #[test]
    fn brain_contract_parses_tasks() {
        let contract: BrainContract = serde_json::from_value(json!({
            "nuevo_resumen": "Coordinando almuerzo del sábado",
            "tareas": [{"titulo": "Reservar mesa", "prioridad": "media"}],
            "intencion": "coordinación social"
        }))
        .expect("valid brain payload");
        assert_eq!(contract.tareas.len(), 1);
        assert_eq!(contract.tareas[0].priority(), Priority::Medium);
    }
}
