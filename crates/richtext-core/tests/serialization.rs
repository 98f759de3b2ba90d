use pretty_assertions::assert_eq;
use richtext_core::{
    Alignment, Counter, CounterStyle, CustomItem, Document, EngineConfig, EngineError, Format,
    FormatFlags, Position, RichText, TextRange,
};

fn styled_document() -> Document {
    let mut doc = Document::from_text("Title\nbody text here\nlast").unwrap();
    doc.set_alignment(0, Alignment::Center).unwrap();
    doc.set_counter(2, Some(Counter::list(CounterStyle::AlphaLower)))
        .unwrap();
    doc.set_format(
        TextRange::within(1, 5, 9),
        &Format::default().bold(),
        FormatFlags::WEIGHT,
    )
    .unwrap();
    doc.insert_custom_item(
        Position::new(2, 4),
        CustomItem::image("pic.png", 8, 8),
        &Format::default(),
    )
    .unwrap();
    doc
}

#[test]
fn test_rich_text_moves_between_documents() {
    let source = styled_document();
    let rich = source.rich_text(source.full_range()).unwrap();
    let json = rich.to_json().unwrap();

    let mut target = Document::new();
    let parsed = RichText::from_json(&json).unwrap();
    let end = target.insert_rich_text(Position::new(0, 0), &parsed).unwrap();
    assert_eq!(end, source.end_position());
    let copied = target.rich_text(target.full_range()).unwrap();
    // The first paragraph merges into the target's and keeps the target layout.
    assert_eq!(copied.paragraphs[0].spans, rich.paragraphs[0].spans);
    assert_eq!(copied.paragraphs[0].layout.alignment, Alignment::Auto);
    assert_eq!(&copied.paragraphs[1..], &rich.paragraphs[1..]);
    assert_eq!(target.counter_text(2).unwrap().as_deref(), Some("a."));
    assert!(target.format_at(Position::new(1, 6)).unwrap().is_bold());
}

#[test]
fn test_partial_rich_text_keeps_inner_layouts() {
    let source = styled_document();
    let range = TextRange::new(Position::new(0, 2), Position::new(1, 4));
    let rich = source.rich_text(range).unwrap();
    assert_eq!(rich.paragraphs.len(), 2);
    assert_eq!(rich.plain_text(), "tle\nbody");
    assert_eq!(rich.paragraphs[0].layout.alignment, Alignment::Center);

    let mut target = Document::from_text("xy").unwrap();
    target
        .insert_rich_text(Position::new(0, 1), &rich)
        .unwrap();
    assert_eq!(target.text(), "xtle\nbodyy");
    assert_eq!(target.paragraph(0).unwrap().layout().alignment, Alignment::Auto);
}

#[test]
fn test_config_json_round_trip() {
    let config = EngineConfig {
        document_width: 320,
        undo_depth: 12,
        allow_break_in_words: true,
        ..EngineConfig::default()
    };
    let parsed = EngineConfig::from_json(&config.to_json().unwrap()).unwrap();
    assert_eq!(parsed, config);

    let doc = Document::with_config(parsed).unwrap();
    assert_eq!(doc.config().document_width, 320);
}

#[test]
fn test_invalid_config_is_rejected() {
    assert!(matches!(
        EngineConfig::from_json(r#"{ "document_width": 0 }"#),
        Err(EngineError::Config(_))
    ));
    assert!(matches!(
        EngineConfig::from_json("not json"),
        Err(EngineError::Config(_))
    ));
    let config = EngineConfig {
        undo_depth: 0,
        ..EngineConfig::default()
    };
    assert!(Document::with_config(config).is_err());
}
