use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::location::{DISTRICTS, KNOWN_VENUES};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub nombre: String,
    pub telefono: Option<String>,
    pub email: Option<String>,
}

static RE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-ZÁÉÍÓÚÑ][a-záéíóúñ]+(?:\s+[A-ZÁÉÍÓÚÑ][a-záéíóúñ]+)+\b")
        .expect("valid name regex")
});
static RE_EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("valid email regex")
});
static RE_PHONE_INTL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\+?51\s?9\d{8}").expect("valid intl phone regex"));
static RE_PHONE_LOCAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b9\d{8}\b").expect("valid local phone regex"));
static RE_PHONE_SPACED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{3}[-.\s]\d{3}[-.\s]\d{3}\b").expect("valid spaced phone regex")
});

/// Names are runs of two or more capitalised tokens; phones normalise to
/// E.164 with the Peru default; emails use a relaxed RFC shape. When contact
/// data appears without a name, a generic entry carries it.
pub fn extract_persons(text: &str) -> Vec<Persona> {
    let names: Vec<String> = RE_NAME
        .find_iter(text)
        .map(|found| found.as_str().to_string())
        .filter(|candidate| !is_place_name(candidate))
        .collect();

    let mut phones: Vec<String> = Vec::new();
    for pattern in [&RE_PHONE_INTL, &RE_PHONE_LOCAL, &RE_PHONE_SPACED] {
        for found in pattern.find_iter(text) {
            if let Some(normalized) = normalize_peru_phone(found.as_str()) {
                if !phones.contains(&normalized) {
                    phones.push(normalized);
                }
            }
        }
    }

    let emails: Vec<String> = RE_EMAIL
        .find_iter(text)
        .map(|found| found.as_str().to_string())
        .collect();

    let mut personas: Vec<Persona> = names
        .into_iter()
        .enumerate()
        .map(|(index, nombre)| Persona {
            nombre,
            telefono: phones.get(index).cloned(),
            email: emails.get(index).cloned(),
        })
        .collect();

    if personas.is_empty() && (!phones.is_empty() || !emails.is_empty()) {
        personas.push(Persona {
            nombre: "Contacto".to_string(),
            telefono: phones.first().cloned(),
            email: emails.first().cloned(),
        });
    }

    personas
}

/// E.164 with the Peru default: the last nine digits must form a mobile
/// number (leading 9) and come out as `+51XXXXXXXXX`.
pub fn normalize_peru_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < 9 {
        return None;
    }
    let last_nine = &digits[digits.len() - 9..];
    if !last_nine.starts_with('9') {
        return None;
    }
    Some(format!("+51{last_nine}"))
}

fn is_place_name(candidate: &str) -> bool {
    DISTRICTS.contains(&candidate) || KNOWN_VENUES.contains(&candidate)
}

#[cfg(test)]
mod tests {
    use super::{extract_persons, normalize_peru_phone};

    #[test]
    fn name_with_phone_and_email_pairs_up() {
        let personas =
            extract_persons("llama a Carlos Mendoza al 987654321, su correo es cm@acme.pe");
        assert_eq!(personas.len(), 1);
        assert_eq!(personas[0].nombre, "Carlos Mendoza");
        assert_eq!(personas[0].telefono.as_deref(), Some("+51987654321"));
        assert_eq!(personas[0].email.as_deref(), Some("cm@acme.pe"));
    }

    #[test]
    fn phone_without_name_becomes_generic_contact() {
        let personas = extract_persons("marca al +51 987654321 apenas puedas");
        assert_eq!(personas.len(), 1);
        assert_eq!(personas[0].nombre, "Contacto");
        assert_eq!(personas[0].telefono.as_deref(), Some("+51987654321"));
    }

    #[test]
    fn e164_normalisation_is_canonical() {
        for raw in ["987654321", "+51987654321", "+51 987654321", "51 987654321"] {
            assert_eq!(
                normalize_peru_phone(raw).as_deref(),
                Some("+51987654321"),
                "raw form {raw}"
            );
        }
        assert_eq!(normalize_peru_phone("123456"), None);
        // Landline-shaped numbers are not Peruvian mobiles.
        assert_eq!(normalize_peru_phone("712345678"), None);
    }

    #[test]
    fn districts_are_not_people() {
        let personas = extract_persons("reunión con Ana Torres en San Isidro");
        assert_eq!(personas.len(), 1);
        assert_eq!(personas[0].nombre, "Ana Torres");
    }

    #[test]
    fn no_contacts_means_empty_list() {
        assert!(extract_persons("recuérdame comprar pan").is_empty());
    }
}
