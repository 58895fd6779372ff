// item.rs — Item subcommands: new, set, trash, show, list.

use clap::Subcommand;
use dw_changeset::Tracked;
use dw_draft::ItemId;
use dw_model::{DraftContext, DraftEngine, Record, Scope};

use super::{display_value, parse_assignments, truncate};

#[derive(Subcommand)]
pub enum ItemCommands {
    /// Create an item. Draftable types get a create draft.
    New {
        /// Item type (as named in the schema).
        item_type: String,
        /// Attribute assignment, repeatable (e.g., --set name=Bob).
        #[arg(long = "set", value_name = "ATTR=VALUE")]
        set: Vec<String>,
    },
    /// Change attributes of an item, recording or updating its draft.
    Set {
        item_type: String,
        id: ItemId,
        #[arg(long = "set", value_name = "ATTR=VALUE", required = true)]
        set: Vec<String>,
    },
    /// Move an item to the trash by recording a destroy draft.
    Trash { item_type: String, id: ItemId },
    /// Show an item, its pending draft, and its drafted state.
    Show { item_type: String, id: ItemId },
    /// List items of a type.
    List {
        item_type: String,
        /// One of: all, drafted, published, trashed, live.
        #[arg(long, default_value = "all")]
        scope: String,
    },
}

pub fn execute(cmd: &ItemCommands, engine: &mut DraftEngine, ctx: &DraftContext) -> anyhow::Result<()> {
    match cmd {
        ItemCommands::New { item_type, set } => new_item(engine, ctx, item_type, set),
        ItemCommands::Set { item_type, id, set } => set_item(engine, ctx, item_type, *id, set),
        ItemCommands::Trash { item_type, id } => trash_item(engine, ctx, item_type, *id),
        ItemCommands::Show { item_type, id } => show_item(engine, item_type, *id),
        ItemCommands::List { item_type, scope } => list_items(engine, item_type, scope),
    }
}

fn new_item(
    engine: &mut DraftEngine,
    ctx: &DraftContext,
    item_type: &str,
    assignments: &[String],
) -> anyhow::Result<()> {
    let mut record = engine.new_record(item_type)?;
    apply_assignments(&mut record, assignments)?;
    save(engine, ctx, &mut record)?;

    let id = record.id().unwrap_or_default();
    println!("Created {} #{}", item_type, id);
    print_draft_line(engine, &record)?;
    Ok(())
}

fn set_item(
    engine: &mut DraftEngine,
    ctx: &DraftContext,
    item_type: &str,
    id: ItemId,
    assignments: &[String],
) -> anyhow::Result<()> {
    let mut record = editable(engine, item_type, id)?;
    apply_assignments(&mut record, assignments)?;
    save(engine, ctx, &mut record)?;

    println!("Saved {} #{}", item_type, id);
    print_draft_line(engine, &record)?;
    Ok(())
}

fn trash_item(
    engine: &mut DraftEngine,
    ctx: &DraftContext,
    item_type: &str,
    id: ItemId,
) -> anyhow::Result<()> {
    let mut record = engine.find(item_type, id)?;
    if !engine.is_draftable(item_type)? {
        engine.destroy(&mut record)?;
        println!("Destroyed {} #{}", item_type, id);
        return Ok(());
    }
    if !engine.draft_destruction(&mut record, ctx)? {
        anyhow::bail!("{} #{} could not be trashed: validation failed", item_type, id);
    }
    if record.is_destroyed() {
        println!("Destroyed {} #{}", item_type, id);
    } else {
        println!("Trashed {} #{}", item_type, id);
        print_draft_line(engine, &record)?;
    }
    Ok(())
}

fn show_item(engine: &DraftEngine, item_type: &str, id: ItemId) -> anyhow::Result<()> {
    let record = engine.find(item_type, id)?;
    println!("Item: {} #{}", item_type, id);
    for (name, value) in record.attributes() {
        println!("  {:<20} {}", name, display_value(value));
    }

    if !engine.is_draftable(item_type)? {
        return Ok(());
    }
    println!();
    println!("Published: {}", yes_no(engine.is_published(&record)?));
    println!("Trashed:   {}", yes_no(engine.is_trashed(&record)?));

    let Some(draft) = engine.draft_of(&record)? else {
        println!("Draft:     none");
        return Ok(());
    };
    println!("Draft:     #{} ({})", draft.id, draft.event);
    if let Some(reified) = engine.reify(&draft)? {
        let drafted: Vec<_> = reified.changed();
        if !drafted.is_empty() {
            println!("Drafted values:");
            for name in drafted {
                println!(
                    "  {:<20} {} -> {}",
                    name,
                    display_value(&reified.attribute_was(&name)),
                    display_value(reified.get(&name)),
                );
            }
        }
    }
    Ok(())
}

fn list_items(engine: &DraftEngine, item_type: &str, scope: &str) -> anyhow::Result<()> {
    let scope: Scope = scope.parse().map_err(anyhow::Error::msg)?;
    let draftable = engine.is_draftable(item_type)?;
    let records = if draftable {
        engine.scope(item_type, scope)?
    } else {
        engine.all(item_type)?
    };

    if records.is_empty() {
        println!("No {} items found.", item_type);
        return Ok(());
    }

    println!("{:<8} {:<10} {:<10} {:<8} {:<40}", "ID", "DRAFT", "PUBLISHED", "TRASHED", "ATTRIBUTES");
    println!("{}", "-".repeat(80));
    for record in &records {
        let (draft, published, trashed) = if draftable {
            (
                engine
                    .draft_of(record)?
                    .map(|d| format!("#{} {}", d.id, d.event))
                    .unwrap_or_else(|| "-".into()),
                yes_no(engine.is_published(record)?),
                yes_no(engine.is_trashed(record)?),
            )
        } else {
            ("-".into(), "-", "-")
        };
        println!(
            "{:<8} {:<10} {:<10} {:<8} {:<40}",
            record.id().unwrap_or_default(),
            draft,
            published,
            trashed,
            truncate(&summary(record), 40),
        );
    }
    println!("\n{} item(s) total.", records.len());
    Ok(())
}

/// The record to edit: in stash mode a pending update lives only in its
/// draft, so edits start from the drafted state.
fn editable(engine: &DraftEngine, item_type: &str, id: ItemId) -> anyhow::Result<Record> {
    let record = engine.find(item_type, id)?;
    if !engine.is_draftable(item_type)? {
        return Ok(record);
    }
    match engine.draft_of(&record)? {
        Some(draft) if draft.is_update() => Ok(engine.reify(&draft)?.unwrap_or(record)),
        _ => Ok(record),
    }
}

/// Set each assigned attribute, leaving every other column as it is.
fn apply_assignments(record: &mut Record, assignments: &[String]) -> anyhow::Result<()> {
    for (name, value) in parse_assignments(assignments)? {
        record.set(name, value);
    }
    Ok(())
}

fn save(engine: &mut DraftEngine, ctx: &DraftContext, record: &mut Record) -> anyhow::Result<()> {
    let saved = if engine.is_draftable(record.type_name())? {
        engine.save_draft(record, ctx)?
    } else {
        engine.save(record)?
    };
    if !saved {
        anyhow::bail!("{} was not saved: validation failed", record.type_name());
    }
    Ok(())
}

fn print_draft_line(engine: &DraftEngine, record: &Record) -> anyhow::Result<()> {
    if !engine.is_draftable(record.type_name())? {
        return Ok(());
    }
    match engine.draft_of(record)? {
        Some(draft) => println!("  Draft: #{} ({})", draft.id, draft.event),
        None => println!("  Draft: none"),
    }
    Ok(())
}

/// Non-bookkeeping attributes as `name=value` pairs.
fn summary(record: &Record) -> String {
    record
        .attributes()
        .iter()
        .filter(|(name, value)| {
            !value.is_null()
                && !matches!(name.as_str(), "id" | "created_at" | "updated_at")
                && !name.ends_with("_at")
                && !name.ends_with("_id")
        })
        .map(|(name, value)| format!("{}={}", name, display_value(value)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}
