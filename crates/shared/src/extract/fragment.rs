use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::ActionType;

#[derive(Debug, Clone, Serialize)]
pub struct Fragment {
    pub texto: String,
    pub texto_original: String,
    pub tipo_accion: ActionType,
    pub posicion: usize,
    pub es_principal: bool,
}

const MAX_PREAMBLE_CHARS: usize = 100;
const MIN_FRAGMENT_CHARS: usize = 10;

static RE_ENUMERATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:^|\s)\d+[.)\-:]\s*|(?:primero|segundo|tercero|cuarto|quinto|sexto)[,\s]|(?:primera|segunda|tercera|cuarta|quinta)[,\s]|(?:1ro|2do|3ro|4to|5to)[,\s]",
    )
    .expect("valid enumeration regex")
});
static RE_SEQUENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:luego|después|entonces|posteriormente)[,\s]|(?:también|además|aparte)[,\s]|(?:por último|finalmente|para terminar)[,\s]|(?:y\s+(?:también|además|luego|después))[,\s]",
    )
    .expect("valid sequence regex")
});
static RE_ACTION_VERB: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:recuérda|avísa|agend|program|cre|pon)[a-záéíóú]*me\s|(?:quiero|necesito|tengo que)\s|(?:dame|dime|muestra|busca|abre)\s")
        .expect("valid action verb regex")
});
static RE_CUT_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:^|\s)\d+[.)\-:]\s*|(?:primero|segundo|tercero|cuarto|quinto|sexto)[,\s]|(?:primera|segunda|tercera|cuarta|quinta)[,\s]|(?:1ro|2do|3ro|4to|5to)[,\s]|(?:luego|después|entonces|posteriormente)[,\s]|(?:también|además|aparte)[,\s]|(?:por último|finalmente|para terminar)[,\s]|(?:y\s+(?:también|además|luego|después))[,\s]",
    )
    .expect("valid cut marker regex")
});

/// Splits a multi-action utterance at its enumeration/sequence markers.
/// Multiple actions are declared when enumerations >= 2, or sequence
/// markers >= 2, or action verbs >= 3; otherwise the whole text is one
/// primary fragment.
pub fn fragment_text(text: &str) -> Vec<Fragment> {
    let enumerations = RE_ENUMERATION.find_iter(text).count();
    let sequences = RE_SEQUENCE.find_iter(text).count();
    let action_verbs = RE_ACTION_VERB.find_iter(text).count();

    let is_multiple = enumerations >= 2 || sequences >= 2 || action_verbs >= 3;
    if !is_multiple {
        return vec![whole_as_primary(text)];
    }

    let markers: Vec<(usize, usize)> = RE_CUT_MARKER
        .find_iter(text)
        .map(|found| (found.start(), found.end()))
        .collect();
    if markers.is_empty() {
        return vec![whole_as_primary(text)];
    }

    let preamble = preamble_before(text, markers[0].0);

    let mut fragments = Vec::new();
    let mut position = 1;
    for (index, (_, end)) in markers.iter().enumerate() {
        let until = markers
            .get(index + 1)
            .map(|(next_start, _)| *next_start)
            .unwrap_or(text.len());
        let piece = text[*end..until].trim();
        if piece.chars().count() < MIN_FRAGMENT_CHARS {
            continue;
        }

        // Only the first fragment carries the shared date/place preamble.
        let texto = if position == 1 && !preamble.is_empty() {
            format!("{preamble}. {piece}")
        } else {
            piece.to_string()
        };

        fragments.push(Fragment {
            texto,
            texto_original: piece.to_string(),
            tipo_accion: super::detect_action_type(&piece.to_lowercase()),
            posicion: position,
            es_principal: position == 1,
        });
        position += 1;
    }

    if fragments.is_empty() {
        return vec![whole_as_primary(text)];
    }
    fragments
}

fn whole_as_primary(text: &str) -> Fragment {
    Fragment {
        texto: text.to_string(),
        texto_original: text.to_string(),
        tipo_accion: super::detect_action_type(&text.to_lowercase()),
        posicion: 1,
        es_principal: true,
    }
}

fn preamble_before(text: &str, first_marker: usize) -> String {
    let before = text[..first_marker].trim_matches([' ', ',', ';']);
    if before.is_empty() {
        return String::new();
    }
    let first_sentence = before
        .split('.')
        .next()
        .unwrap_or(before)
        .trim_matches([' ', ',', ';']);
    if first_sentence.chars().count() <= MAX_PREAMBLE_CHARS {
        return first_sentence.to_string();
    }
    // Too long: keep only the leading comma-separated parts.
    let parts: Vec<&str> = first_sentence.splitn(3, ',').collect();
    parts
        .iter()
        .take(2)
        .copied()
        .collect::<Vec<_>>()
        .join(",")
        .chars()
        .take(MAX_PREAMBLE_CHARS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::fragment_text;

    #[test]
    fn single_action_is_one_primary_fragment() {
        let fragments = fragment_text("recuérdame llamar al doctor mañana");
        assert_eq!(fragments.len(), 1);
        assert!(fragments[0].es_principal);
        assert_eq!(fragments[0].posicion, 1);
    }

    #[test]
    fn numbered_list_cuts_at_each_marker() {
        let fragments = fragment_text(
            "Para mañana: 1. comprar los pasajes a Cusco 2. reservar el hotel del centro 3. avisar al equipo del viaje",
        );
        assert_eq!(fragments.len(), 3);
        assert!(fragments[0].es_principal);
        assert!(!fragments[1].es_principal);
        assert_eq!(fragments[2].posicion, 3);
    }

    #[test]
    fn only_first_fragment_carries_preamble() {
        let fragments = fragment_text(
            "Mañana en la oficina, primero, revisar el contrato con el abogado, segundo, enviar el presupuesto al cliente",
        );
        assert!(fragments.len() >= 2);
        assert!(fragments[0].texto.starts_with("Mañana en la oficina"));
        assert!(!fragments[1].texto.contains("Mañana en la oficina"));
    }

    #[test]
    fn preamble_is_truncated_to_one_hundred_chars() {
        let long_preamble = "x".repeat(160);
        let input = format!(
            "{long_preamble} primero, revisar el informe completo del mes, segundo, mandar las observaciones al equipo"
        );
        let fragments = fragment_text(&input);
        assert!(fragments.len() >= 2);
        let preamble_len = fragments[0]
            .texto
            .split(". ")
            .next()
            .map(|p| p.chars().count())
            .unwrap_or(0);
        assert!(preamble_len <= 100);
    }

    #[test]
    fn short_pieces_are_dropped() {
        let fragments =
            fragment_text("hacer esto: 1. ok 2. preparar la presentación de ventas 3. llamar a Pedro del banco");
        assert!(fragments.iter().all(|f| f.texto_original.chars().count() >= 10));
    }

    #[test]
    fn action_verbs_without_cut_markers_fall_back_to_one_fragment() {
        // Three action verbs flag the utterance as multiple, but with no
        // enumeration or sequence markers there is nowhere to cut.
        let fragments = fragment_text(
            "quiero revisar las fotos del viaje y necesito imprimir los contratos y tengo que cancelar la suscripción",
        );
        assert_eq!(fragments.len(), 1);
        assert!(fragments[0].es_principal);
    }
}
