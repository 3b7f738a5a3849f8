use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ubicacion {
    pub direccion: Option<String>,
    pub lugar_nombre: Option<String>,
}

pub const DISTRICTS: [&str; 12] = [
    "Miraflores",
    "San Isidro",
    "Santiago de Surco",
    "Surco",
    "La Molina",
    "Barranco",
    "Jesús María",
    "Lince",
    "San Miguel",
    "Pueblo Libre",
    "Magdalena",
    "San Borja",
];

pub const KNOWN_VENUES: [&str; 11] = [
    "Larcomar",
    "Jockey Plaza",
    "Real Plaza",
    "Open Plaza",
    "Plaza San Miguel",
    "Parque Kennedy",
    "Óvalo Gutiérrez",
    "Estadio Nacional",
    "Clínica Ricardo Palma",
    "Hospital Loayza",
    "Hospital Rebagliati",
];

static RE_STREET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(Av\.|Avenida|Jr\.|Jirón|Jiron|Calle|Ca\.|Psje\.|Pasaje)\s+([A-Za-zÁÉÍÓÚÑáéíóúñ]+(?:\s+[A-Za-zÁÉÍÓÚÑáéíóúñ]+)*?)\s+(\d{1,5})",
    )
    .expect("valid street regex")
});

/// Extracts an address or a known venue. Bare generic words ("hospital") with
/// no specifier emit nothing.
pub fn extract_location(text: &str) -> Option<Ubicacion> {
    let mut ubicacion = Ubicacion::default();

    if let Some(caps) = RE_STREET.captures(text) {
        let mut direccion = format!("{} {} {}", &caps[1], &caps[2], &caps[3]);
        if let Some(district) = district_after(text, caps.get(0).map_or(0, |m| m.end())) {
            direccion.push_str(", ");
            direccion.push_str(district);
        }
        ubicacion.direccion = Some(direccion);
    }

    if ubicacion.direccion.is_none() {
        if let Some(district) = mentioned_district(text) {
            ubicacion.direccion = Some(clause_around(text, district));
        }
    }

    for venue in KNOWN_VENUES {
        if text.to_lowercase().contains(&venue.to_lowercase()) {
            ubicacion.lugar_nombre = Some(venue.to_string());
            if ubicacion.direccion.is_none() {
                ubicacion.direccion = Some(venue.to_string());
            }
            break;
        }
    }

    if ubicacion.direccion.is_none() && ubicacion.lugar_nombre.is_none() {
        None
    } else {
        Some(ubicacion)
    }
}

fn mentioned_district(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    DISTRICTS
        .into_iter()
        .find(|district| lower.contains(&district.to_lowercase()))
}

/// District name directly following an address, e.g. "Av. Larco 1234, Miraflores".
fn district_after(text: &str, from: usize) -> Option<&'static str> {
    let tail: String = text[from..].chars().take(40).collect::<String>().to_lowercase();
    let trimmed = tail.trim_start_matches([',', ' ']);
    DISTRICTS
        .into_iter()
        .find(|district| trimmed.starts_with(&district.to_lowercase()))
}

/// The sentence-level clause containing the district mention.
fn clause_around(text: &str, district: &str) -> String {
    let lower = text.to_lowercase();
    let needle = district.to_lowercase();
    let Some(position) = lower.find(&needle) else {
        return district.to_string();
    };

    let start = text[..position]
        .rfind(['.', '!', '?'])
        .map(|index| index + 1)
        .unwrap_or(0);
    let end = text[position..]
        .find(['.', '!', '?'])
        .map(|index| position + index)
        .unwrap_or(text.len());

    text[start..end].trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::extract_location;

    #[test]
    fn street_address_with_district_suffix() {
        let ubicacion =
            extract_location("la entrevista es en Av. Larco 1234, Miraflores").expect("location");
        assert_eq!(ubicacion.direccion.as_deref(), Some("Av. Larco 1234, Miraflores"));
    }

    #[test]
    fn street_address_without_district() {
        let ubicacion = extract_location("nos vemos en Jr. Lampa 545").expect("location");
        assert_eq!(ubicacion.direccion.as_deref(), Some("Jr. Lampa 545"));
    }

    #[test]
    fn bare_district_yields_surrounding_clause() {
        let ubicacion = extract_location("Almuerzo con Ana en Barranco. Luego cine").expect("location");
        assert_eq!(
            ubicacion.direccion.as_deref(),
            Some("Almuerzo con Ana en Barranco")
        );
    }

    #[test]
    fn known_venue_fills_both_fields() {
        let ubicacion = extract_location("te espero en Jockey Plaza").expect("location");
        assert_eq!(ubicacion.lugar_nombre.as_deref(), Some("Jockey Plaza"));
        assert_eq!(ubicacion.direccion.as_deref(), Some("Jockey Plaza"));
    }

    #[test]
    fn generic_word_alone_emits_nothing() {
        assert_eq!(extract_location("tengo que ir al hospital"), None);
        assert_eq!(extract_location("sin lugares aquí"), None);
    }
}
