use super::gateway::{LlmCapability, LlmGatewayRequest};

const INTENT_SYSTEM: &str = "Eres el clasificador de intenciones de un asistente personal peruano. \
Clasificas cada mensaje del usuario y respondes SOLO JSON, sin texto adicional.";

const TASK_SYSTEM: &str = "Eres el extractor de tareas de un asistente personal. Conviertes una \
instrucción en lenguaje natural en acciones programadas con fechas absolutas. Respondes SOLO un \
arreglo JSON, sin texto adicional.";

const VALUE_SYSTEM: &str = "Eres la memoria de un asistente personal. Destilas conversaciones en \
resúmenes, datos atemporales del usuario y tareas derivadas. Respondes SOLO JSON.";

const CONSULTA_SYSTEM: &str = "Eres un asistente personal peruano, cercano y directo. Respondes \
en español usando el perfil y el historial del usuario. Si la pregunta requiere información \
actual del mundo, puedes usar la búsqueda web.";

const EMAIL_CLASSIFY_SYSTEM: &str = "Eres un clasificador de correos. Analizas RÁPIDAMENTE un \
correo y respondes SOLO JSON.";

const EMAIL_DEEP_SYSTEM: &str = "Actúas como asistente personal experto analizando un correo \
crítico. Mantienes consistencia con el historial del remitente. Respondes SOLO JSON.";

const SENDER_PROFILE_SYSTEM: &str = "Analizas la relación del usuario con un remitente de correo \
a partir de una pequeña muestra. Respondes SOLO JSON.";

const BRAIN_SYSTEM: &str = "Eres el cerebro de memoria de WhatsApp de un asistente personal. \
Avanzas el resumen de cada chat y detectas tareas accionables. Respondes SOLO JSON.";

pub fn intent_request(message: &str) -> LlmGatewayRequest {
    let user_prompt = format!(
        "Clasifica este mensaje del usuario:\n\n\"{message}\"\n\n\
Responde SOLO con este JSON:\n\
{{\n\
  \"tipo\": \"RUIDO\" | \"TAREA\" | \"VALIOSO\",\n\
  \"subtipo\": \"saludo\" | \"recordatorio\" | \"consulta\" | \"dato_personal\" | \"conversacion\",\n\
  \"urgencia\": \"ALTA\" | \"MEDIA\" | \"BAJA\"\n\
}}\n\n\
CRITERIOS:\n\
- RUIDO: saludos, monosílabos, mensajes sin contenido accionable ni información.\n\
- TAREA: el usuario pide recordar, agendar, avisar o ejecutar algo.\n\
- VALIOSO: información que vale la pena recordar (datos personales, acuerdos, \
contexto) o una consulta que requiere respuesta elaborada (subtipo \"consulta\")."
    );
    LlmGatewayRequest {
        capability: LlmCapability::IntentGate,
        system_prompt: INTENT_SYSTEM.to_string(),
        user_prompt,
    }
}

pub fn task_request(
    message: &str,
    now_iso: &str,
    fecha_referencia: &str,
    envelope_json: &str,
    fragment_hints: &str,
) -> LlmGatewayRequest {
    let fragments_section = if fragment_hints.is_empty() {
        String::new()
    } else {
        format!("FRAGMENTOS DETECTADOS (pre-análisis, un elemento del arreglo por fragmento):\n{fragment_hints}\n\n")
    };
    let user_prompt = format!(
        "AHORA es {now_iso} (zona America/Lima). Fecha de referencia si el usuario no indica \
otra: {fecha_referencia}.\n\n\
INSTRUCCIÓN DEL USUARIO:\n\"{message}\"\n\n\
CONTEXTO DETECTADO (extracción determinista, úsalo para completar datos):\n{envelope_json}\n\n\
{fragments_section}\
Divide la instrucción en sus acciones y responde SOLO con un ARREGLO JSON. Cada elemento:\n\
{{\n\
  \"titulo\": \"corto y accionable\",\n\
  \"descripcion\": \"detalle con fecha y hora absolutas y contexto\",\n\
  \"tipo_accion\": \"poner_alarma\" | \"agendar_calendario\" | \"crear_meet\" | \"ver_ubicacion\",\n\
  \"prioridad\": \"ALTA\" | \"MEDIA\",\n\
  \"etiqueta\": \"NEGOCIOS\" | \"ESTUDIOS\" | \"PAREJA\" | \"SALUD\" | \"PERSONAL\" | \"OTROS\",\n\
  \"fecha_iso\": \"YYYY-MM-DDTHH:MM:SS\"  (OBLIGATORIO, hora local),\n\
  \"dato_extra\": \"enlace, dirección o teléfono\" | null\n\
}}\n\n\
REGLAS:\n\
- \"mañana a las 2pm\" es {fecha_referencia} desplazado según corresponda, nunca una fecha pasada.\n\
- Una alarma y una reunión del mismo mensaje son DOS elementos distintos.\n\
- Si la acción es una videollamada, usa tipo_accion \"crear_meet\"."
    );
    LlmGatewayRequest {
        capability: LlmCapability::TaskExtraction,
        system_prompt: TASK_SYSTEM.to_string(),
        user_prompt,
    }
}

pub fn value_request(message: &str, urgencia: &str) -> LlmGatewayRequest {
    let user_prompt = format!(
        "El usuario compartió esto (urgencia estimada {urgencia}):\n\n\"{message}\"\n\n\
Responde SOLO con este JSON:\n\
{{\n\
  \"resumen_guardar\": \"resumen de 1-2 frases para la memoria de largo plazo\",\n\
  \"tipo_evento\": \"reunion\" | \"acuerdo\" | \"dato_cliente\" | \"personal\" | \"salud\" | \"otro\",\n\
  \"aprendizajes_usuario\": [\"solo datos ATEMPORALES del usuario; lista vacía si no hay\"],\n\
  \"tareas\": [{{\"titulo\": \"...\", \"prioridad\": \"ALTA\"|\"MEDIA\"|\"BAJA\", \
\"descripcion\": \"...\", \"etiqueta\": \"NEGOCIOS\"|\"ESTUDIOS\"|\"PAREJA\"|\"SALUD\"|\"PERSONAL\"|\"OTROS\"}}]\n\
}}\n\n\
Un aprendizaje es algo que seguirá siendo cierto en un año (alergias, gustos, \
relaciones, datos de clientes). Las tareas solo si el texto implica acción futura."
    );
    LlmGatewayRequest {
        capability: LlmCapability::ValueExtraction,
        system_prompt: VALUE_SYSTEM.to_string(),
        user_prompt,
    }
}

pub struct ConsultaContext<'a> {
    pub question: &'a str,
    pub profile_facts: &'a str,
    pub recent_context: &'a str,
    pub semantic_matches: &'a str,
    pub deep_mode: bool,
}

pub fn consulta_request(context: &ConsultaContext<'_>) -> LlmGatewayRequest {
    let depth_note = if context.deep_mode {
        "Tienes el historial extendido del usuario; responde con todo el detalle relevante."
    } else {
        "Responde de forma breve y útil."
    };
    let user_prompt = format!(
        "PERFIL DEL USUARIO:\n{profile}\n\n\
CONTEXTO RECIENTE:\n{recent}\n\n\
RECUERDOS RELACIONADOS:\n{semantic}\n\n\
PREGUNTA:\n\"{question}\"\n\n{depth_note}",
        profile = context.profile_facts,
        recent = context.recent_context,
        semantic = context.semantic_matches,
        question = context.question,
    );
    LlmGatewayRequest {
        capability: LlmCapability::Consulta,
        system_prompt: CONSULTA_SYSTEM.to_string(),
        user_prompt,
    }
}

pub fn email_classify_request(sender: &str, subject: &str, body: &str) -> LlmGatewayRequest {
    let excerpt: String = body.chars().take(800).collect();
    let user_prompt = format!(
        "REMITENTE: {sender}\nASUNTO: {subject}\nCUERPO (primeros 800 caracteres): {excerpt}\n\n\
Responde SOLO con este JSON:\n\
{{\n\
  \"requiere_accion\": true | false,\n\
  \"categoria\": \"laboral\" | \"academico\" | \"financiero\" | \"personal\" | \"spam\",\n\
  \"urgencia\": \"alta\" | \"media\" | \"baja\",\n\
  \"resumen_corto\": \"una línea de máximo 60 caracteres\"\n\
}}\n\n\
CRITERIOS:\n\
- requiere_accion = true solo si solicitan respuesta, entrega, pago o acción concreta.\n\
- urgencia = alta si mencionan plazos, fechas cercanas o \"urgente\".\n\
- spam si es newsletter, marketing o notificación automática."
    );
    LlmGatewayRequest {
        capability: LlmCapability::EmailClassify,
        system_prompt: EMAIL_CLASSIFY_SYSTEM.to_string(),
        user_prompt,
    }
}

pub struct EmailDeepInput<'a> {
    pub sender: &'a str,
    pub subject: &'a str,
    pub date: &'a str,
    pub body: &'a str,
    pub sender_context: &'a str,
}

pub fn email_deep_request(input: &EmailDeepInput<'_>) -> LlmGatewayRequest {
    let user_prompt = format!(
        "{sender_context}\n\n\
CORREO ACTUAL:\nDe: {sender}\nAsunto: {subject}\nFecha: {date}\nCuerpo:\n{body}\n\n\
ANÁLISIS REQUERIDO:\n\
1. RESPUESTA SUGERIDA: borrador profesional, consistente con el tono histórico, máximo 200 palabras.\n\
2. ACCIONES PENDIENTES: lista específica de lo que el usuario debe hacer.\n\
3. FECHA LÍMITE: si hay deadline, en formato ISO (YYYY-MM-DD).\n\
4. TONO DETECTADO: formal, informal, urgente, amigable, etc.\n\n\
Responde SOLO con este JSON:\n\
{{\n\
  \"respuesta_sugerida\": \"Estimado/a...\",\n\
  \"tono_detectado\": \"formal\" | \"informal\" | \"urgente\",\n\
  \"acciones_pendientes\": [\"Acción 1\", \"Acción 2\"],\n\
  \"fecha_limite\": \"YYYY-MM-DD\" | null,\n\
  \"prioridad_final\": 80,\n\
  \"contexto_adicional\": \"notas relevantes del historial\",\n\
  \"cambio_tono\": false\n\
}}",
        sender_context = input.sender_context,
        sender = input.sender,
        subject = input.subject,
        date = input.date,
        body = input.body,
    );
    LlmGatewayRequest {
        capability: LlmCapability::EmailDeepAnalysis,
        system_prompt: EMAIL_DEEP_SYSTEM.to_string(),
        user_prompt,
    }
}

pub fn sender_profile_request(sender: &str, samples: &str, sample_count: usize) -> LlmGatewayRequest {
    let user_prompt = format!(
        "Analiza estos {sample_count} correos del remitente {sender}:\n\n{samples}\n\n\
Responde SOLO con este JSON:\n\
{{\n\
  \"tono_habitual\": \"formal\" | \"informal\" | \"urgente\" | \"amigable\",\n\
  \"tema_principal\": \"laboral\" | \"academico\" | \"personal\" | \"comercial\",\n\
  \"nivel_importancia\": 5,\n\
  \"patron_comunicacion\": \"descripción breve de una línea\"\n\
}}"
    );
    LlmGatewayRequest {
        capability: LlmCapability::SenderProfile,
        system_prompt: SENDER_PROFILE_SYSTEM.to_string(),
        user_prompt,
    }
}

pub fn brain_request(chat_name: &str, previous_summary: &str, transcript: &str) -> LlmGatewayRequest {
    let user_prompt = format!(
        "CHAT: {chat_name}\n\nRESUMEN PREVIO DEL CHAT:\n{previous_summary}\n\n\
MENSAJES NUEVOS (YO = el usuario):\n{transcript}\n\n\
Responde SOLO con este JSON:\n\
{{\n\
  \"nuevo_resumen\": \"resumen actualizado del chat, máximo 4 frases, integrando lo previo\",\n\
  \"tareas\": [{{\"titulo\": \"...\", \"descripcion\": \"...\", \"prioridad\": \"ALTA\"|\"MEDIA\"|\"BAJA\"}}],\n\
  \"intencion\": \"intención dominante de la conversación en pocas palabras\"\n\
}}\n\n\
Solo crea tareas cuando hay un compromiso o pedido concreto hacia el usuario."
    );
    LlmGatewayRequest {
        capability: LlmCapability::ChatBrain,
        system_prompt: BRAIN_SYSTEM.to_string(),
        user_prompt,
    }
}
