use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "HIGH" => Some(Self::High),
            "MEDIUM" => Some(Self::Medium),
            "LOW" => Some(Self::Low),
            _ => None,
        }
    }

    /// The LLM contracts speak Spanish; the store speaks English. Both parse.
    pub fn parse_lenient(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "ALTA" | "HIGH" => Some(Self::High),
            "MEDIA" | "MEDIUM" => Some(Self::Medium),
            "BAJA" | "LOW" => Some(Self::Low),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertState {
    Pending,
    Completed,
    Discarded,
}

impl AlertState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pendiente",
            Self::Completed => "completada",
            Self::Discarded => "descartada",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "pendiente" => Some(Self::Pending),
            "completada" => Some(Self::Completed),
            "descartada" => Some(Self::Discarded),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Manual,
    AutoDetected,
    WhatsappTask,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::AutoDetected => "auto_detectada",
            Self::WhatsappTask => "tarea_ia",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "manual" => Some(Self::Manual),
            "auto_detectada" => Some(Self::AutoDetected),
            "tarea_ia" => Some(Self::WhatsappTask),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLabel {
    Business,
    Study,
    Partner,
    Health,
    Personal,
    Others,
}

impl AlertLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Business => "BUSINESS",
            Self::Study => "STUDY",
            Self::Partner => "PARTNER",
            Self::Health => "HEALTH",
            Self::Personal => "PERSONAL",
            Self::Others => "OTHERS",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        Self::parse_lenient(value)
    }

    pub fn parse_lenient(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "BUSINESS" | "NEGOCIOS" | "TRABAJO" | "LABORAL" => Some(Self::Business),
            "STUDY" | "ESTUDIOS" | "ACADEMICO" | "ACADÉMICO" => Some(Self::Study),
            "PARTNER" | "PAREJA" | "FAMILIA" => Some(Self::Partner),
            "HEALTH" | "SALUD" => Some(Self::Health),
            "PERSONAL" => Some(Self::Personal),
            "OTHERS" | "OTROS" | "OTRO" => Some(Self::Others),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationType {
    Meeting,
    Agreement,
    ClientData,
    Personal,
    Health,
    Other,
}

impl ConversationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Meeting => "reunion",
            Self::Agreement => "acuerdo",
            Self::ClientData => "dato_cliente",
            Self::Personal => "personal",
            Self::Health => "salud",
            Self::Other => "otro",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        Self::parse_lenient(value)
    }

    pub fn parse_lenient(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "reunion" | "reunión" | "meeting" => Some(Self::Meeting),
            "acuerdo" | "agreement" => Some(Self::Agreement),
            "dato_cliente" | "cliente" | "client_data" => Some(Self::ClientData),
            "personal" => Some(Self::Personal),
            "salud" | "health" => Some(Self::Health),
            "otro" | "other" => Some(Self::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    AppManual,
    AppFile,
    WhatsappWebhook,
    WhatsappBrain,
    AppChat,
    EmailTriage,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AppManual => "app_manual",
            Self::AppFile => "app_file",
            Self::WhatsappWebhook => "whatsapp_webhook",
            Self::WhatsappBrain => "whatsapp_cerebro",
            Self::AppChat => "app_chat",
            Self::EmailTriage => "email_triage",
        }
    }
}

// --- HTTP DTOs -------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub mensaje: String,
    #[serde(default)]
    pub modo_profundo: bool,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub respuesta: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alertas_generadas: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nuevos_aprendizajes: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct AlertDto {
    pub id: Uuid,
    pub titulo: String,
    pub descripcion: String,
    pub prioridad: String,
    pub tipo: String,
    pub estado: String,
    pub etiqueta: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fecha_alerta: Option<DateTime<Utc>>,
    pub metadata: Value,
    pub creado_en: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ListAlertsResponse {
    pub alertas: Vec<AlertDto>,
}

#[derive(Debug, Serialize)]
pub struct PriorityAlertsResponse {
    pub alertas: Vec<AlertDto>,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct PatchAlertRequest {
    #[serde(default)]
    pub estado: Option<String>,
    #[serde(default)]
    pub etiqueta: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusDataResponse {
    pub status: String,
    pub data: Value,
}

#[derive(Debug, Deserialize)]
pub struct SyncEmailsRequest {
    pub gmail_access_token: String,
    pub email_gmail: String,
    #[serde(default)]
    pub server_auth_code: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendEmailRequest {
    pub gmail_access_token: String,
    pub destinatario: String,
    pub asunto: String,
    pub cuerpo: String,
    #[serde(default)]
    pub thread_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzedEmailDto {
    pub id: Uuid,
    pub remitente: String,
    pub asunto: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fecha: Option<DateTime<Utc>>,
    pub score_importancia: i32,
    pub categoria: String,
    pub urgencia: String,
    pub requiere_accion: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub respuesta_sugerida: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tono_detectado: Option<String>,
    pub acciones_pendientes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fecha_limite: Option<chrono::NaiveDate>,
    pub leido: bool,
    pub respondido: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub respondido_en: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct PendingEmailsResponse {
    pub correos: Vec<AnalyzedEmailDto>,
}

#[derive(Debug, Serialize)]
pub struct AnsweredEmailsResponse {
    pub correos: Vec<AnalyzedEmailDto>,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct MarkAnsweredRequest {
    pub fecha_respuesta: DateTime<Utc>,
    pub respuesta_enviada: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WhatsAppMessageUpload {
    pub id: String,
    pub chat_id: String,
    pub chat_nombre: String,
    pub contenido: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub es_mio: bool,
    #[serde(default = "default_message_kind")]
    pub tipo: String,
    #[serde(default)]
    pub metadata: Option<Value>,
}

fn default_message_kind() -> String {
    "texto".to_string()
}

#[derive(Debug, Serialize)]
pub struct BatchSyncResponse {
    pub status: String,
    pub mensajes_guardados: usize,
}

#[derive(Debug, Serialize)]
pub struct BrainChatSummary {
    pub chat: String,
    pub mensajes: usize,
    pub tareas_creadas: usize,
}

#[derive(Debug, Serialize)]
pub struct BrainResponse {
    pub status: String,
    pub resumen_operacion: Vec<BrainChatSummary>,
}

#[derive(Debug, Serialize)]
pub struct WhatsAppStatsResponse {
    pub total_mensajes: i64,
    pub sin_procesar: i64,
    pub chats: i64,
    pub alertas_activas: i64,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::{AlertLabel, AlertState, Priority};

    #[test]
    fn priority_accepts_spanish_and_english() {
        assert_eq!(Priority::parse_lenient("ALTA"), Some(Priority::High));
        assert_eq!(Priority::parse_lenient("media"), Some(Priority::Medium));
        assert_eq!(Priority::parse_lenient("LOW"), Some(Priority::Low));
        assert_eq!(Priority::parse_lenient("urgente"), None);
    }

    #[test]
    fn label_accepts_spanish_synonyms() {
        assert_eq!(
            AlertLabel::parse_lenient("NEGOCIOS"),
            Some(AlertLabel::Business)
        );
        assert_eq!(
            AlertLabel::parse_lenient("pareja"),
            Some(AlertLabel::Partner)
        );
        assert_eq!(AlertLabel::parse_lenient("SALUD"), Some(AlertLabel::Health));
    }

    #[test]
    fn alert_state_round_trips_through_db_strings() {
        for state in [
            AlertState::Pending,
            AlertState::Completed,
            AlertState::Discarded,
        ] {
            assert_eq!(AlertState::from_db(state.as_str()), Some(state));
        }
    }
}
