//! Drives reflow from a simulated idle loop and prints the resulting layout.
//!
//! ```sh
//! cargo run -p richtext-core --example idle_reflow
//! ```

use richtext_core::{
    Alignment, Command, CommandExecutor, Counter, CounterStyle, EditCommand, ParagraphCommand,
    Position, ReflowStatus,
};

fn main() -> richtext_core::Result<()> {
    let mut executor = CommandExecutor::from_text(
        "Shopping list\nbread\nmilk\neggs\nA closing remark that is long enough to wrap onto a second line.",
    )?;
    executor.document_mut().set_width(180)?;
    executor.execute(Command::Paragraph(ParagraphCommand::SetAlignment {
        paragraph: 0,
        alignment: Alignment::Center,
    }))?;
    for paragraph in 1..=3 {
        executor.execute(Command::Paragraph(ParagraphCommand::SetCounter {
            paragraph,
            counter: Some(Counter::list(CounterStyle::Arabic)),
        }))?;
    }
    executor.execute(Command::Edit(EditCommand::InsertText {
        position: Position::new(3, 4),
        text: " (a dozen)".to_string(),
        format: None,
    }))?;

    let mut idle_slices = 0;
    while executor.document_mut().format_more(2)? == ReflowStatus::MoreWork {
        idle_slices += 1;
    }
    println!("formatted in {} idle slices", idle_slices + 1);

    let doc = executor.document();
    for paragraph in doc.paragraphs() {
        let label = doc.counter_text(paragraph.id())?.unwrap_or_default();
        println!(
            "y={:>3} h={:>3} lines={} {:>3} {}",
            paragraph.y(),
            paragraph.height(),
            paragraph.lines().len(),
            label,
            paragraph.text()
        );
    }

    executor.undo()?;
    println!("after undo: {:?}", executor.document().paragraph(3)?.text());
    Ok(())
}
