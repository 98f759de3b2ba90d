use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use richtext_core::{
    Alignment, CharacterRun, Counter, CounterStyle, CustomItem, Document, EngineError, Format,
    FormatCollection, FormatFlags, ParagraphLayout, Position, TextRange,
};

#[test]
fn test_run_insert_remove_matches_reference() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut formats = FormatCollection::new(Format::default());
    let plain = formats.intern(&Format::default());
    let bold = formats.intern(&Format::default().bold());

    let mut run = CharacterRun::new();
    let mut reference: Vec<char> = Vec::new();
    for _ in 0..500 {
        if reference.is_empty() || rng.gen_bool(0.6) {
            let index = rng.gen_range(0..=reference.len());
            let len = rng.gen_range(1..5);
            let text: String = (0..len)
                .map(|_| char::from(b'a' + rng.gen_range(0..26)))
                .collect();
            let format = if rng.gen_bool(0.5) { &plain } else { &bold };
            run.insert(index, &text, format).unwrap();
            for (offset, ch) in text.chars().enumerate() {
                reference.insert(index + offset, ch);
            }
        } else {
            let index = rng.gen_range(0..reference.len());
            let length = rng.gen_range(0..=(reference.len() - index).min(6));
            let removed = run.remove(index, length).unwrap();
            let expected: String = reference.drain(index..index + length).collect();
            assert_eq!(removed.to_plain_string(), expected);
        }
        assert_eq!(run.len(), reference.len());
    }
    assert_eq!(run.to_plain_string(), reference.iter().collect::<String>());
}

#[test]
fn test_hello_split_then_join_restores_document() {
    let mut doc = Document::from_text("Hello").unwrap();
    doc.set_alignment(0, Alignment::Center).unwrap();
    let before = doc.rich_text(doc.full_range()).unwrap();

    doc.split_paragraph(Position::new(0, 2)).unwrap();
    assert_eq!(doc.paragraph_count(), 2);
    assert_eq!(doc.paragraph(0).unwrap().text(), "He");
    assert_eq!(doc.paragraph(1).unwrap().text(), "llo");
    assert_eq!(doc.paragraph(1).unwrap().layout().alignment, Alignment::Center);

    doc.join_with_next(0).unwrap();
    assert_eq!(doc.paragraph_count(), 1);
    assert_eq!(doc.rich_text(doc.full_range()).unwrap(), before);
}

#[test]
fn test_join_last_paragraph_is_rejected() {
    let mut doc = Document::from_text("one\ntwo").unwrap();
    assert!(matches!(
        doc.join_with_next(1),
        Err(EngineError::CannotJoinLast)
    ));
}

#[test]
fn test_remove_and_reinsert_fragment_restores_layouts() {
    let mut doc = Document::from_text("first\nsecond\nthird").unwrap();
    doc.set_alignment(1, Alignment::Right).unwrap();
    doc.set_counter(2, Some(Counter::list(CounterStyle::Arabic)))
        .unwrap();
    doc.set_format(
        TextRange::within(1, 0, 3),
        &Format::default().bold(),
        FormatFlags::WEIGHT,
    )
    .unwrap();
    let before = doc.rich_text(doc.full_range()).unwrap();

    let range = TextRange::new(Position::new(0, 2), Position::new(2, 3));
    let fragment = doc.remove_range(range).unwrap();
    assert_eq!(doc.text(), "fird");
    assert_eq!(fragment.plain_text(), "rst\nsecond\nthi");
    assert_eq!(fragment.paragraph_count(), 3);

    let end = doc.insert_fragment(Position::new(0, 2), &fragment).unwrap();
    assert_eq!(end, Position::new(2, 3));
    assert_eq!(doc.rich_text(doc.full_range()).unwrap(), before);
}

#[test]
fn test_insert_text_uses_paragraph_breaks() {
    let mut doc = Document::new();
    let end = doc
        .insert_text(Position::new(0, 0), "a\nbc\n", &Format::default())
        .unwrap();
    assert_eq!(end, Position::new(2, 0));
    assert_eq!(doc.paragraph_count(), 3);
    assert_eq!(doc.text(), "a\nbc\n");
}

#[test]
fn test_custom_item_occupies_one_slot() {
    let mut doc = Document::from_text("ab").unwrap();
    let end = doc
        .insert_custom_item(
            Position::new(0, 1),
            CustomItem::image("logo.png", 20, 10),
            &Format::default(),
        )
        .unwrap();
    assert_eq!(end, Position::new(0, 2));
    assert_eq!(doc.paragraph(0).unwrap().len(), 3);
    assert!(doc.paragraph(0).unwrap().char_at(1).unwrap().is_custom());

    doc.format_all().unwrap();
    let paragraph = doc.paragraph(0).unwrap();
    assert_eq!(paragraph.char_layout()[1].width, 20);
}

#[test]
fn test_set_paragraph_layout_returns_previous() {
    let mut doc = Document::from_text("text").unwrap();
    let layout = ParagraphLayout::default().with_alignment(Alignment::Justify);
    let old = doc
        .set_paragraph_layout(0, &layout, richtext_core::LayoutFlags::ALIGNMENT)
        .unwrap();
    assert_eq!(old.alignment, Alignment::Auto);
    assert_eq!(doc.paragraph(0).unwrap().layout().alignment, Alignment::Justify);
}

#[test]
fn test_plain_text_of_partial_range() {
    let doc = Document::from_text("alpha\nbeta\ngamma").unwrap();
    let range = TextRange::new(Position::new(0, 3), Position::new(2, 2));
    assert_eq!(doc.plain_text(range).unwrap(), "ha\nbeta\nga");
    let reversed = TextRange::new(Position::new(2, 2), Position::new(0, 3));
    assert!(matches!(
        doc.plain_text(reversed),
        Err(EngineError::InvalidRange)
    ));
}

#[test]
fn test_format_garbage_collection_after_removal() {
    let mut doc = Document::from_text("abc").unwrap();
    let red = Format::default().with_color(richtext_core::Color::rgb(255, 0, 0));
    doc.set_format(TextRange::within(0, 0, 1), &red, FormatFlags::COLOR)
        .unwrap();
    let with_red = doc.formats().len();
    doc.remove_range(TextRange::within(0, 0, 1)).unwrap();
    doc.collect_garbage();
    assert!(doc.formats().len() < with_red);
    assert!(!doc.formats().contains_key(&red.key()));
}
