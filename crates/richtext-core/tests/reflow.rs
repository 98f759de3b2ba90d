use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use richtext_core::{Band, Document, Flow, Format, Position, ReflowStatus};

fn sample_text(paragraphs: usize) -> String {
    (0..paragraphs)
        .map(|i| format!("paragraph {i} with several words that wrap at narrow widths"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// (y, height, line starts, char x positions) per paragraph.
fn geometry(doc: &Document) -> Vec<(i32, i32, Vec<usize>, Vec<i32>)> {
    doc.paragraphs()
        .map(|paragraph| {
            (
                paragraph.y(),
                paragraph.height(),
                paragraph.lines().iter().map(|line| line.char_index).collect(),
                paragraph.char_layout().iter().map(|c| c.x).collect(),
            )
        })
        .collect()
}

#[test]
fn test_result_independent_of_budget() {
    let text = sample_text(12);
    let mut all_at_once = Document::from_text(&text).unwrap();
    all_at_once.set_width(200).unwrap();
    all_at_once.format_all().unwrap();

    let mut rng = StdRng::seed_from_u64(42);
    let mut sliced = Document::from_text(&text).unwrap();
    sliced.set_width(200).unwrap();
    loop {
        let budget = rng.gen_range(1..4);
        if sliced.format_more(budget).unwrap() == ReflowStatus::Done {
            break;
        }
    }
    assert_eq!(geometry(&sliced), geometry(&all_at_once));
}

#[test]
fn test_format_more_after_done_changes_nothing() {
    let mut doc = Document::from_text(&sample_text(5)).unwrap();
    doc.set_width(150).unwrap();
    doc.format_all().unwrap();
    let before = geometry(&doc);
    doc.take_changed();

    assert_eq!(doc.format_more(10).unwrap(), ReflowStatus::Done);
    assert_eq!(geometry(&doc), before);
    assert!(doc.take_changed().is_empty());
}

#[test]
fn test_edit_reflows_from_touched_paragraph() {
    let mut doc = Document::from_text(&sample_text(6)).unwrap();
    doc.set_width(200).unwrap();
    doc.format_all().unwrap();
    doc.take_changed();

    doc.insert_text(Position::new(3, 0), "x", &Format::default())
        .unwrap();
    assert!(!doc.is_formatted());
    doc.format_all().unwrap();
    let changed = doc.take_changed();
    assert!(changed.contains(&3));
    assert!(!changed.contains(&0));
}

#[test]
fn test_paragraphs_stack_without_gaps() {
    let mut doc = Document::from_text(&sample_text(8)).unwrap();
    doc.set_width(120).unwrap();
    doc.format_all().unwrap();
    let mut bottom = 0;
    for paragraph in doc.paragraphs() {
        assert_eq!(paragraph.y(), bottom);
        bottom = paragraph.bottom();
    }
    assert_eq!(doc.height(), bottom);
}

#[test]
fn test_width_change_rewraps() {
    let mut doc = Document::from_text("one two three four five six").unwrap();
    doc.set_width(600).unwrap();
    doc.format_all().unwrap();
    assert_eq!(doc.paragraph(0).unwrap().lines().len(), 1);

    doc.set_width(60).unwrap();
    doc.format_all().unwrap();
    let lines = doc.paragraph(0).unwrap().lines();
    assert!(lines.len() > 1);
    for line in lines {
        assert!(line.width <= 60);
    }
}

/// Narrows the text to 60px from the second line of the document on.
struct Narrowing;

impl Flow for Narrowing {
    fn available_width(&self, band: Band) -> i32 {
        if band.y >= 13 { 60 } else { 600 }
    }
}

#[test]
fn test_flow_narrows_lower_lines() {
    let mut doc = Document::from_text("short\none two three four five six seven").unwrap();
    doc.set_flow(Some(Box::new(Narrowing)));
    doc.format_all().unwrap();
    assert_eq!(doc.paragraph(0).unwrap().lines().len(), 1);
    let second = doc.paragraph(1).unwrap();
    assert_eq!(second.y(), 13);
    assert!(second.lines().len() > 2);
    for line in second.lines() {
        assert!(line.width <= 60);
    }
}

/// Keeps the top 20px free and narrows everything below it to 60px.
struct Obstacle;

impl Flow for Obstacle {
    fn available_width(&self, band: Band) -> i32 {
        if band.y >= 20 { 60 } else { 600 }
    }

    fn adjust_vertical_position(&self, y: i32, _height: i32) -> i32 {
        y.max(20)
    }
}

#[test]
fn test_line_pushed_down_takes_width_of_its_band() {
    let mut doc = Document::from_text("one two three four five six seven").unwrap();
    doc.set_flow(Some(Box::new(Obstacle)));
    doc.format_all().unwrap();
    let lines = doc.paragraph(0).unwrap().lines();
    assert_eq!(lines[0].y, 20);
    assert!(lines.len() > 2);
    for line in lines {
        assert!(line.width <= 60);
    }
}
