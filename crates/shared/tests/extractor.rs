use chrono::{Datelike, NaiveDate, TimeZone};
use chrono_tz::America::Lima;
use chrono_tz::Tz;
use shared::extract::{ActionType, extract_envelope};

fn at(year: i32, month: u32, day: u32) -> chrono::DateTime<Tz> {
    Lima
        .with_ymd_and_hms(year, month, day, 10, 0, 0)
        .single()
        .expect("valid lima datetime")
}

#[test]
fn colloquial_afternoon_interview_resolves_to_five_pm() {
    let envelope = extract_envelope(
        "Recuérdame la entrevista mañana a las 5 de la tarde en Av. Larco 1234, Miraflores",
        at(2026, 2, 4),
    );

    let fecha_hora = envelope.fecha_hora.expect("date and time");
    assert_eq!(fecha_hora.timestamp, "2026-02-05T17:00:00-05:00");

    let ubicacion = envelope.ubicacion.expect("location");
    assert_eq!(
        ubicacion.direccion.as_deref(),
        Some("Av. Larco 1234, Miraflores")
    );

    assert!(
        envelope
            .acciones_sugeridas
            .iter()
            .any(|accion| accion == "agendar_calendario")
    );
    assert!(
        envelope
            .acciones_sugeridas
            .iter()
            .any(|accion| accion == "ver_ubicacion")
    );
}

#[test]
fn extraction_is_deterministic_and_whitespace_stable() {
    let reference = at(2026, 2, 4);
    let clean = extract_envelope("reunión el viernes a las 3pm con Carlos Mendoza", reference);
    let noisy = extract_envelope(
        "reunión   el viernes  a las   3pm con Carlos Mendoza",
        reference,
    );

    assert_eq!(clean.fecha_hora, noisy.fecha_hora);
    assert_eq!(clean.tipo_accion, noisy.tipo_accion);
    assert_eq!(clean.personas, noisy.personas);

    let again = extract_envelope("reunión el viernes a las 3pm con Carlos Mendoza", reference);
    assert_eq!(clean.fecha_hora, again.fecha_hora);
    assert_eq!(clean.acciones_sugeridas, again.acciones_sugeridas);
}

#[test]
fn weekday_resolution_lands_within_a_week_for_every_weekday() {
    let weekdays = [
        ("lunes", 0u32),
        ("martes", 1),
        ("miércoles", 2),
        ("jueves", 3),
        ("viernes", 4),
        ("sábado", 5),
        ("domingo", 6),
    ];

    // Try every reference weekday in one fixed week.
    for reference_day in 2..9 {
        let reference = at(2026, 2, reference_day);
        for (name, expected_index) in weekdays {
            let envelope = extract_envelope(&format!("cita el {name}"), reference);
            let resolved = envelope.fecha_hora.expect("weekday resolves").fecha;

            assert_eq!(
                resolved.weekday().num_days_from_monday(),
                expected_index,
                "weekday {name} from reference {reference}"
            );
            let delta = (resolved - reference.date_naive()).num_days();
            assert!(
                delta > 0 && delta <= 7,
                "weekday {name} resolved {delta} days out from {reference}"
            );
        }
    }
}

#[test]
fn peruvian_numbers_normalise_to_e164() {
    for raw in [
        "llama al 987654321",
        "llama al +51987654321",
        "llama al +51 987654321",
    ] {
        let envelope = extract_envelope(raw, at(2026, 2, 4));
        assert_eq!(
            envelope.personas[0].telefono.as_deref(),
            Some("+51987654321"),
            "input {raw}"
        );
    }
}

#[test]
fn explicit_date_beats_weekday_and_relative_words() {
    let envelope = extract_envelope("el viernes 20/03/2026 a las 10:00", at(2026, 2, 4));
    let fecha = envelope.fecha_hora.expect("date").fecha;
    assert_eq!(fecha, NaiveDate::from_ymd_opt(2026, 3, 20).expect("valid date"));
}

#[test]
fn payment_keyword_drives_action_type() {
    let envelope = extract_envelope("tengo que yapear a Pedro Gómez mañana", at(2026, 2, 4));
    assert_eq!(envelope.tipo_accion, ActionType::Pago);
    assert!(envelope.acciones_sugeridas.iter().any(|a| a == "abrir_yape"));
}
