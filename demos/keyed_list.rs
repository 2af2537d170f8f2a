//! Keyed list: render a few passes of a todo list and watch the edits.
//!
//! Run with `cargo run --example keyed_list`.

use crossterm::style::Stylize;
use framewheel::{ApplyError, BuildError, Edit, EditSink, Engine, FrameBuffer, LiveTree, RenderEvent};
use std::time::Duration;

/// Prints every edit before handing it to a live tree.
struct Printer {
    tree: LiveTree,
}

impl EditSink for Printer {
    fn begin(&mut self) -> Result<(), ApplyError> {
        println!("{}", "── batch ──".dark_grey());
        self.tree.begin()
    }

    fn apply(&mut self, edit: &Edit) -> Result<(), ApplyError> {
        let line = match edit {
            Edit::InsertSubtree { parent, index, frames, .. } => {
                format!("insert  {parent} @{index} ({} frames)", frames.len()).green()
            }
            Edit::RemoveSubtree { node } => format!("remove  {node}").red(),
            Edit::MoveSubtree { parent, from, to } => format!("move    {parent} {from} -> {to}").yellow(),
            Edit::SetText { node, text } => format!("text    {node} {text:?}").cyan(),
            Edit::SetAttribute { node, name, value, .. } => format!("attr    {node} {name}={value:?}").blue(),
            Edit::RemoveAttribute { node, name } => format!("unattr  {node} {name}").magenta(),
            Edit::UpdateMarkup { node, markup } => format!("markup  {node} {markup}").cyan(),
        };
        println!("  {line}");
        self.tree.apply(edit)
    }

    fn commit(&mut self) -> Result<(), ApplyError> {
        self.tree.commit()
    }

    fn rollback(&mut self) {
        self.tree.rollback();
    }
}

struct Todo {
    id: i64,
    label: &'static str,
    done: bool,
}

fn todo_list(b: &mut FrameBuffer, title: &str, todos: &[Todo]) -> Result<(), BuildError> {
    b.open_element(0, "section")?;
    b.open_element(1, "h1")?;
    b.add_text(2, title)?;
    b.close_element()?;
    b.open_element(3, "ul")?;
    for todo in todos {
        b.open_element(4, "li")?;
        b.set_key(todo.id)?;
        b.add_attribute(5, "done", todo.done)?;
        b.add_text(6, todo.label)?;
        b.close_element()?;
    }
    b.close_element()?;
    if todos.iter().all(|todo| todo.done) {
        b.add_markup(7, "<p>all done</p>")?;
    }
    b.close_element()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let todo = |id, label, done| Todo { id, label, done };
    let passes = [
        ("Groceries", vec![todo(1, "milk", false), todo(2, "eggs", false), todo(3, "tea", false)]),
        ("Groceries", vec![todo(3, "tea", false), todo(1, "milk", true), todo(2, "eggs", false)]),
        ("Groceries", vec![todo(3, "tea", true), todo(4, "jam", false), todo(1, "milk", true)]),
        ("Done", vec![todo(3, "tea", true), todo(1, "milk", true)]),
    ];

    let mut engine = Engine::new(Printer { tree: LiveTree::new() })?;
    for (title, todos) in &passes {
        let summary = engine.render(|b| todo_list(b, title, todos))?;
        println!(
            "{} {} edits, {} moves, {} keyed matches",
            "pass".bold(),
            summary.edits,
            summary.stats.moves,
            summary.stats.keyed_matches
        );
        if summary.edits == 0 {
            continue;
        }
        if let Some(RenderEvent::Failed { error, .. }) = engine.wait_event(Duration::from_secs(1)) {
            eprintln!("{}", format!("batch failed: {error}").red());
        }
    }

    if let Some(printer) = engine.shutdown() {
        println!("{}", "── live tree ──".dark_grey());
        print!("{}", printer.tree);
    }
    Ok(())
}
