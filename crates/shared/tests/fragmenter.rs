use shared::extract::fragment_text;

#[test]
fn marker_count_equals_fragment_count() {
    // Three numeric markers, three fragments.
    let fragments = fragment_text(
        "Lista de hoy: 1. llamar al contador por los impuestos 2. recoger la encomienda de Olva 3. comprar el regalo de Valeria",
    );
    assert_eq!(fragments.len(), 3);
    for (index, fragment) in fragments.iter().enumerate() {
        assert_eq!(fragment.posicion, index + 1);
        assert_eq!(fragment.es_principal, index == 0);
    }
}

#[test]
fn preamble_rides_only_on_the_first_fragment() {
    let fragments = fragment_text(
        "El lunes en la mañana: 1. confirmar la cita con el dentista 2. enviar el contrato firmado al estudio",
    );
    assert_eq!(fragments.len(), 2);
    assert!(fragments[0].texto.contains("El lunes en la mañana"));
    assert!(!fragments[1].texto.contains("El lunes en la mañana"));
    assert!(fragments[0].texto.chars().count() > fragments[0].texto_original.chars().count());
}

#[test]
fn preamble_never_exceeds_one_hundred_chars() {
    let preamble = "contexto ".repeat(20);
    let input = format!(
        "{preamble} 1. preparar la presentación para el directorio 2. coordinar la sala grande con recepción"
    );
    let fragments = fragment_text(&input);
    assert!(fragments.len() >= 2);

    let carried = fragments[0]
        .texto
        .chars()
        .count()
        .saturating_sub(fragments[0].texto_original.chars().count());
    // Carried preamble plus the joining ". ".
    assert!(carried <= 102, "carried {carried} chars of preamble");
}

#[test]
fn single_action_text_is_never_cut() {
    let fragments = fragment_text("recuérdame pagar el recibo de luz el viernes");
    assert_eq!(fragments.len(), 1);
    assert!(fragments[0].es_principal);
}

#[test]
fn sequence_markers_cut_like_numeric_ones() {
    let fragments = fragment_text(
        "Cosas de la tarde, luego, cuadrar la caja chica con Rosa, después, mandar el reporte final a gerencia",
    );
    assert_eq!(fragments.len(), 2);
}
