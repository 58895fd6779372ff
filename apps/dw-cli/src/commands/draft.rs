// draft.rs — Draft subcommands: list, show, publish, revert, deps.

use clap::Subcommand;
use dw_draft::{ChangesetRead, Draft, DraftEvent, DraftId};
use dw_model::DraftEngine;

use super::{display_value, truncate};

#[derive(Subcommand)]
pub enum DraftCommands {
    /// List pending drafts.
    List {
        /// Only this draft class (defaults to every class).
        #[arg(long)]
        class: Option<String>,
        /// Only this event (create, update, destroy).
        #[arg(long)]
        event: Option<String>,
    },
    /// Show a draft: its changes, snapshot, and meta columns.
    Show {
        id: DraftId,
        /// Draft class (defaults to the configured draft class).
        #[arg(long)]
        class: Option<String>,
    },
    /// Publish a draft and every draft it depends on.
    Publish {
        id: DraftId,
        #[arg(long)]
        class: Option<String>,
    },
    /// Revert a draft and every draft it depends on.
    Revert {
        id: DraftId,
        #[arg(long)]
        class: Option<String>,
    },
    /// Show the drafts that would be resolved along with this one.
    Deps {
        id: DraftId,
        #[arg(long)]
        class: Option<String>,
        /// Show reversion dependencies instead of publication dependencies.
        #[arg(long)]
        revert: bool,
    },
}

pub fn execute(cmd: &DraftCommands, engine: &mut DraftEngine) -> anyhow::Result<()> {
    match cmd {
        DraftCommands::List { class, event } => list_drafts(engine, class.as_deref(), event.as_deref()),
        DraftCommands::Show { id, class } => {
            let draft = lookup(engine, class.as_deref(), *id)?;
            show_draft(engine, &draft)
        }
        DraftCommands::Publish { id, class } => {
            let draft = lookup(engine, class.as_deref(), *id)?;
            publish_draft(engine, &draft)
        }
        DraftCommands::Revert { id, class } => {
            let draft = lookup(engine, class.as_deref(), *id)?;
            revert_draft(engine, &draft)
        }
        DraftCommands::Deps { id, class, revert } => {
            let draft = lookup(engine, class.as_deref(), *id)?;
            show_dependencies(engine, &draft, *revert)
        }
    }
}

fn lookup(engine: &DraftEngine, class: Option<&str>, id: DraftId) -> anyhow::Result<Draft> {
    let class = class.unwrap_or(engine.settings().draft_class_name.as_str());
    Ok(engine.find_draft(class, id)?)
}

fn list_drafts(engine: &DraftEngine, class: Option<&str>, event: Option<&str>) -> anyhow::Result<()> {
    let event = event
        .map(|e| e.parse::<DraftEvent>())
        .transpose()
        .map_err(anyhow::Error::msg)?;
    let classes = match class {
        Some(class) => vec![class.to_string()],
        None => engine.draft_classes(),
    };

    let mut rows = Vec::new();
    for class in &classes {
        for draft in engine.drafts(class, event)? {
            rows.push((class.clone(), draft));
        }
    }

    if rows.is_empty() {
        println!("No drafts found.");
        return Ok(());
    }

    println!(
        "{:<12} {:<6} {:<8} {:<24} {:<16} {:<20}",
        "CLASS", "ID", "EVENT", "ITEM", "WHODUNNIT", "UPDATED"
    );
    println!("{}", "-".repeat(90));
    for (class, draft) in &rows {
        println!(
            "{:<12} {:<6} {:<8} {:<24} {:<16} {:<20}",
            truncate(class, 12),
            draft.id,
            draft.event.to_string(),
            truncate(&draft.item.to_string(), 24),
            truncate(draft.whodunnit.as_deref().unwrap_or("-"), 16),
            draft.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        );
    }
    println!("\n{} draft(s) total.", rows.len());
    Ok(())
}

fn show_draft(engine: &DraftEngine, draft: &Draft) -> anyhow::Result<()> {
    println!("Draft:     #{}", draft.id);
    println!("Item:      {}", draft.item);
    println!("Event:     {}", draft.event);
    println!("Whodunnit: {}", draft.whodunnit.as_deref().unwrap_or("-"));
    println!("Created:   {}", draft.created_at.to_rfc3339());
    println!("Updated:   {}", draft.updated_at.to_rfc3339());
    if draft.previous_draft.is_some() {
        println!("Supersedes an earlier unpublished draft.");
    }

    match engine.changeset(draft)? {
        ChangesetRead::Untracked => println!("\nChanges: not tracked by this draft class"),
        ChangesetRead::Degraded { reason } => println!("\nChanges: unreadable ({})", reason),
        ChangesetRead::Loaded(changes) if changes.is_empty() => println!("\nChanges: none"),
        ChangesetRead::Loaded(changes) => {
            println!("\nChanges:");
            for (name, change) in &changes {
                println!(
                    "  {:<20} {} -> {}",
                    name,
                    display_value(&change.old),
                    display_value(&change.new)
                );
            }
        }
    }

    if let Some(snapshot) = engine.snapshot(draft)? {
        println!("\nSnapshot:");
        for (name, value) in &snapshot {
            println!("  {:<20} {}", name, display_value(value));
        }
    }

    if !draft.meta.is_empty() {
        println!("\nMeta:");
        for (name, value) in &draft.meta {
            println!("  {:<20} {}", name, display_value(value));
        }
    }
    Ok(())
}

fn publish_draft(engine: &mut DraftEngine, draft: &Draft) -> anyhow::Result<()> {
    let dependencies = engine.publication_dependencies(draft)?;
    if !dependencies.is_empty() {
        println!("Publishing {} dependency draft(s) first:", dependencies.len());
        print_brief(&dependencies);
    }
    engine.publish(draft)?;
    println!("Published draft #{} ({} {})", draft.id, draft.event, draft.item);
    Ok(())
}

fn revert_draft(engine: &mut DraftEngine, draft: &Draft) -> anyhow::Result<()> {
    let dependencies = engine.reversion_dependencies(draft)?;
    if !dependencies.is_empty() {
        println!("Reverting {} dependency draft(s) first:", dependencies.len());
        print_brief(&dependencies);
    }
    engine.revert(draft)?;
    println!("Reverted draft #{} ({} {})", draft.id, draft.event, draft.item);
    Ok(())
}

fn show_dependencies(engine: &DraftEngine, draft: &Draft, revert: bool) -> anyhow::Result<()> {
    let (verb, dependencies) = if revert {
        ("reverted", engine.reversion_dependencies(draft)?)
    } else {
        ("published", engine.publication_dependencies(draft)?)
    };
    if dependencies.is_empty() {
        println!("Draft #{} has no dependencies to be {} with it.", draft.id, verb);
        return Ok(());
    }
    println!("Draft #{} needs these drafts {} first:", draft.id, verb);
    print_brief(&dependencies);
    Ok(())
}

fn print_brief(drafts: &[Draft]) {
    for draft in drafts {
        println!("  #{:<6} {:<8} {}", draft.id, draft.event.to_string(), draft.item);
    }
}
