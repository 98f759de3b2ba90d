use pretty_assertions::assert_eq;
use richtext_core::{
    Command, CommandExecutor, Counter, CounterStyle, Document, EditCommand, Position, TextRange,
};

fn labels(doc: &Document) -> Vec<Option<String>> {
    (0..doc.paragraph_count())
        .map(|id| doc.counter_text(id).unwrap())
        .collect()
}

fn numbered(text: &str) -> Document {
    let mut doc = Document::from_text(text).unwrap();
    for id in 0..doc.paragraph_count() {
        doc.set_counter(id, Some(Counter::list(CounterStyle::Arabic)))
            .unwrap();
    }
    doc
}

#[test]
fn test_delete_middle_item_renumbers() {
    let doc = numbered("one\ntwo\nthree");
    assert_eq!(
        labels(&doc),
        vec![Some("1.".into()), Some("2.".into()), Some("3.".into())]
    );

    let mut executor = CommandExecutor::new(doc);
    executor
        .execute(Command::Edit(EditCommand::Delete {
            range: TextRange::new(Position::new(1, 0), Position::new(2, 0)),
        }))
        .unwrap();
    assert_eq!(executor.document().text(), "one\nthree");
    assert_eq!(
        labels(executor.document()),
        vec![Some("1.".into()), Some("2.".into())]
    );

    executor.undo().unwrap();
    assert_eq!(
        labels(executor.document()),
        vec![Some("1.".into()), Some("2.".into()), Some("3.".into())]
    );
}

#[test]
fn test_split_inserts_item_and_shifts_following() {
    let mut doc = numbered("a\nb\nc");
    assert_eq!(doc.counter_number(2).unwrap(), Some(3));
    doc.split_paragraph(Position::new(0, 1)).unwrap();
    let numbers: Vec<_> = (0..doc.paragraph_count())
        .map(|id| doc.counter_number(id).unwrap())
        .collect();
    assert_eq!(numbers, vec![Some(1), Some(2), Some(3), Some(4)]);
}

#[test]
fn test_numbers_increase_along_the_list() {
    let doc = numbered("a\nb\nc\nd\ne\nf\ng\nh\ni\nj\nk\nl");
    let mut last = 0;
    for id in 0..doc.paragraph_count() {
        let number = doc.counter_number(id).unwrap().unwrap();
        assert!(number > last);
        last = number;
    }
    assert_eq!(doc.counter_text(11).unwrap().as_deref(), Some("12."));
}

#[test]
fn test_removing_counter_renumbers_rest() {
    let mut doc = numbered("a\nb\nc");
    let old = doc.set_counter(0, None).unwrap();
    assert_eq!(old, Some(Counter::list(CounterStyle::Arabic)));
    assert_eq!(doc.counter_text(0).unwrap(), None);
    assert_eq!(doc.counter_text(1).unwrap().as_deref(), Some("1."));
    assert_eq!(doc.counter_text(2).unwrap().as_deref(), Some("2."));
}

#[test]
fn test_roman_and_bullet_labels() {
    let mut doc = Document::from_text("a\nb\nc\nd").unwrap();
    for id in 0..3 {
        doc.set_counter(id, Some(Counter::list(CounterStyle::RomanUpper)))
            .unwrap();
    }
    doc.set_counter(3, Some(Counter::bullet(CounterStyle::Disc)))
        .unwrap();
    assert_eq!(doc.counter_text(2).unwrap().as_deref(), Some("III."));
    assert_eq!(doc.counter_text(3).unwrap().as_deref(), Some("\u{2022}"));
}

#[test]
fn test_label_width_reserved_when_formatted() {
    let mut doc = numbered("item");
    doc.format_all().unwrap();
    let paragraph = doc.paragraph(0).unwrap();
    assert!(paragraph.label_width() > 0);
    assert!(paragraph.char_layout()[0].x >= paragraph.label_width());
}

#[test]
fn test_unnumbered_list_item_keeps_indent() {
    let mut doc = Document::from_text("plain").unwrap();
    doc.set_counter(0, Some(Counter::list(CounterStyle::None).with_suffix("")))
        .unwrap();
    assert_eq!(doc.counter_text(0).unwrap().as_deref(), Some(" "));
    doc.format_all().unwrap();
    assert!(doc.paragraph(0).unwrap().label_width() > 0);
}
