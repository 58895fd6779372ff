// multiple_drafts.rs — Integration tests for types that keep many drafts per
// item.

use dw_changeset::AttributeChange;
use dw_draft::{ChangesetRead, DraftEvent};
use dw_model::{DraftContext, DraftEngine, DraftableOptions, ItemType, Settings, TypeRegistry};
use serde_json::json;

fn engine() -> DraftEngine {
    let registry = TypeRegistry::new().register(
        ItemType::new("Talkative", ["name", "published_at", "trashed_at"])
            .draftable(DraftableOptions::new().multiple()),
    );
    DraftEngine::in_memory(registry, Settings::default()).unwrap()
}

fn ctx() -> DraftContext {
    DraftContext::new().with_whodunnit("bob")
}

#[test]
fn every_notable_change_adds_a_draft() {
    let mut engine = engine();
    let mut record = engine.new_record("Talkative").unwrap();
    assert!(!engine.registry().get("Talkative").unwrap().has_column("draft_id"));

    record.set("name", "Bob");
    assert!(engine.save_draft(&mut record, &ctx()).unwrap());
    record.set("name", "Sam");
    assert!(engine.save_draft(&mut record, &ctx()).unwrap());
    record.set("name", "Steve");
    assert!(engine.save_draft(&mut record, &ctx()).unwrap());

    let drafts = engine.drafts_of(&record).unwrap();
    let events: Vec<DraftEvent> = drafts.iter().map(|d| d.event).collect();
    assert_eq!(events, vec![DraftEvent::Create, DraftEvent::Update, DraftEvent::Update]);
    assert!(engine.has_drafts(&record).unwrap());
    assert!(engine.is_drafted(&record).unwrap());

    // Each update is measured against the live row.
    match engine.changeset(&drafts[2]).unwrap() {
        ChangesetRead::Loaded(changes) => {
            assert_eq!(changes["name"], AttributeChange::new(json!("Bob"), json!("Steve")))
        }
        other => panic!("unexpected changeset {:?}", other),
    }
    assert_eq!(engine.draft_of(&record).unwrap().unwrap().id, drafts[2].id);

    let live = engine.find("Talkative", record.id().unwrap()).unwrap();
    assert_eq!(live.get("name"), &json!("Bob"));
}

#[test]
fn unchanged_save_adds_nothing() {
    let mut engine = engine();
    let mut record = engine.new_record("Talkative").unwrap();
    record.set("name", "Bob");
    assert!(engine.save_draft(&mut record, &ctx()).unwrap());

    assert!(engine.save_draft(&mut record, &ctx()).unwrap());
    assert_eq!(engine.drafts_of(&record).unwrap().len(), 1);
}

#[test]
fn publishing_one_draft_keeps_the_others() {
    let mut engine = engine();
    let mut record = engine.new_record("Talkative").unwrap();
    record.set("name", "Bob");
    assert!(engine.save_draft(&mut record, &ctx()).unwrap());
    record.set("name", "Sam");
    assert!(engine.save_draft(&mut record, &ctx()).unwrap());
    record.set("name", "Steve");
    assert!(engine.save_draft(&mut record, &ctx()).unwrap());
    let drafts = engine.drafts_of(&record).unwrap();

    engine.publish(&drafts[0]).unwrap();
    let live = engine.find("Talkative", record.id().unwrap()).unwrap();
    assert!(engine.is_published(&live).unwrap());
    assert_eq!(live.get("name"), &json!("Bob"));
    assert_eq!(engine.drafts_of(&record).unwrap().len(), 2);

    engine.publish(&drafts[2]).unwrap();
    let live = engine.find("Talkative", record.id().unwrap()).unwrap();
    assert_eq!(live.get("name"), &json!("Steve"));
    assert_eq!(engine.drafts_of(&record).unwrap().len(), 1);
}

#[test]
fn destroy_adds_a_draft_and_revert_removes_it() {
    let mut engine = engine();
    let mut record = engine.new_record("Talkative").unwrap();
    record.set("name", "Bob");
    assert!(engine.save_draft(&mut record, &ctx()).unwrap());

    assert!(engine.draft_destruction(&mut record, &ctx()).unwrap());
    let drafts = engine.drafts_of(&record).unwrap();
    assert_eq!(drafts.len(), 2);
    let destroy = drafts[1].clone();
    assert!(destroy.is_destroy());
    assert!(destroy.previous_draft.is_none());
    assert!(engine.is_trashed(&record).unwrap());

    engine.revert(&destroy).unwrap();
    engine.reload(&mut record).unwrap();
    assert!(!engine.is_trashed(&record).unwrap());
    assert_eq!(engine.drafts_of(&record).unwrap().len(), 1);
}
