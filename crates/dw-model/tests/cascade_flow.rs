// cascade_flow.rs — Integration tests for dependency cascades across related
// items.
//
// Flow:
//   1. Register a parent/child pair (has-many with destroy, belongs-to back),
//      a polymorphic comment, and a self-referencing node
//   2. Draft creates, updates, and trashes across the relationship
//   3. Publish or revert one draft and check its dependencies came along
//   4. Fail a commit midway and check nothing changed

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dw_model::{
    Backend, Dependent, DraftContext, DraftEngine, DraftableOptions, ItemType, ModelError, Record,
    Relationship, Scope, Settings, Tables, TypeRegistry,
};
use serde_json::json;

fn registry() -> TypeRegistry {
    TypeRegistry::new()
        .register(
            ItemType::new("Parent", ["name", "published_at", "trashed_at"])
                .draftable(DraftableOptions::new())
                .with_relationship(
                    Relationship::has_many("children", "Child", "parent_id").dependent(Dependent::Destroy),
                ),
        )
        .register(
            ItemType::new("Child", ["name", "parent_id", "published_at", "trashed_at"])
                .draftable(DraftableOptions::new())
                .with_relationship(Relationship::belongs_to("parent", "Parent")),
        )
        .register(
            ItemType::new("Comment", ["body", "commentable_id", "commentable_type", "published_at"])
                .draftable(DraftableOptions::new())
                .with_relationship(Relationship::belongs_to_polymorphic("commentable")),
        )
        .register(
            ItemType::new("Node", ["name", "published_at"])
                .draftable(DraftableOptions::new())
                .with_relationship(Relationship::belongs_to("draft", "Node")),
        )
        .register(
            ItemType::new("Owner", ["name", "published_at", "trashed_at"])
                .draftable(DraftableOptions::new())
                .with_relationship(Relationship::has_many("pets", "Pet", "owner_id").dependent(Dependent::Destroy))
                .with_relationship(Relationship::has_many("toys", "Toy", "owner_id").dependent(Dependent::Nullify)),
        )
        .register(ItemType::new("Pet", ["name", "owner_id"]))
        .register(ItemType::new("Toy", ["name", "owner_id"]))
}

fn engine() -> DraftEngine {
    DraftEngine::in_memory(registry(), Settings::default()).unwrap()
}

fn ctx() -> DraftContext {
    DraftContext::new().with_whodunnit("alice")
}

fn drafted_parent(engine: &mut DraftEngine, name: &str) -> Record {
    let mut parent = engine.new_record("Parent").unwrap();
    parent.set("name", name);
    assert!(engine.save_draft(&mut parent, &ctx()).unwrap());
    parent
}

fn drafted_child(engine: &mut DraftEngine, parent: &Record, name: &str) -> Record {
    let mut child = engine.new_record("Child").unwrap();
    child.set("name", name).set("parent_id", parent.id().unwrap());
    assert!(engine.save_draft(&mut child, &ctx()).unwrap());
    child
}

/// Parent and child, both created through drafting and published.
fn published_family(engine: &mut DraftEngine) -> (Record, Record) {
    let mut parent = drafted_parent(engine, "Mum");
    let mut child = drafted_child(engine, &parent, "Kid");
    let draft = engine.draft_of(&child).unwrap().unwrap();
    engine.publish(&draft).unwrap();
    engine.reload(&mut parent).unwrap();
    engine.reload(&mut child).unwrap();
    (parent, child)
}

fn draft_ids(drafts: &[dw_draft::Draft]) -> Vec<u64> {
    drafts.iter().map(|d| d.id).collect()
}

#[test]
fn publishing_a_child_create_publishes_the_parent_first() {
    let mut engine = engine();
    let parent = drafted_parent(&mut engine, "Mum");
    let child = drafted_child(&mut engine, &parent, "Kid");
    let parent_draft = engine.draft_of(&parent).unwrap().unwrap();
    let child_draft = engine.draft_of(&child).unwrap().unwrap();

    let deps = engine.publication_dependencies(&child_draft).unwrap();
    assert_eq!(draft_ids(&deps), vec![parent_draft.id]);
    assert!(engine.publication_dependencies(&parent_draft).unwrap().is_empty());

    engine.publish(&child_draft).unwrap();

    assert!(engine.drafts("Draft", None).unwrap().is_empty());
    assert_eq!(engine.scope("Parent", Scope::Published).unwrap().len(), 1);
    assert_eq!(engine.scope("Child", Scope::Published).unwrap().len(), 1);
    assert!(engine.scope("Parent", Scope::Drafted).unwrap().is_empty());
}

#[test]
fn publishing_the_parent_alone_leaves_the_child_drafted() {
    let mut engine = engine();
    let parent = drafted_parent(&mut engine, "Mum");
    let child = drafted_child(&mut engine, &parent, "Kid");
    let parent_draft = engine.draft_of(&parent).unwrap().unwrap();

    engine.publish(&parent_draft).unwrap();

    let child = engine.find("Child", child.id().unwrap()).unwrap();
    assert!(engine.is_drafted(&child).unwrap());
    assert!(!engine.is_published(&child).unwrap());
    assert_eq!(engine.drafts("Draft", None).unwrap().len(), 1);
}

#[test]
fn child_update_depends_on_the_parent_create() {
    let mut engine = engine();
    let parent = drafted_parent(&mut engine, "Mum");

    let mut child = engine.new_record("Child").unwrap();
    child.set("name", "Kid").set("parent_id", parent.id().unwrap());
    assert!(engine.save_draft(&mut child, &DraftContext::disabled()).unwrap());

    child.set("name", "Kiddo");
    assert!(engine.save_draft(&mut child, &ctx()).unwrap());
    let child_draft = engine.draft_of(&child).unwrap().unwrap();
    assert!(child_draft.is_update());

    let parent_draft = engine.draft_of(&parent).unwrap().unwrap();
    let deps = engine.publication_dependencies(&child_draft).unwrap();
    assert_eq!(draft_ids(&deps), vec![parent_draft.id]);

    engine.publish(&child_draft).unwrap();
    let child = engine.find("Child", child.id().unwrap()).unwrap();
    assert_eq!(child.get("name"), &json!("Kiddo"));
    assert!(engine.drafts("Draft", None).unwrap().is_empty());
}

#[test]
fn trashing_a_parent_trashes_its_children() {
    let mut engine = engine();
    let (mut parent, child) = published_family(&mut engine);

    assert!(engine.draft_destruction(&mut parent, &ctx()).unwrap());

    assert!(engine.is_trashed(&parent).unwrap());
    let child = engine.find("Child", child.id().unwrap()).unwrap();
    assert!(engine.is_trashed(&child).unwrap());
    let child_draft = engine.draft_of(&child).unwrap().unwrap();
    assert!(child_draft.is_destroy());
    assert_eq!(child_draft.whodunnit.as_deref(), Some("alice"));
    assert!(engine.scope("Child", Scope::Live).unwrap().is_empty());
}

#[test]
fn trash_cascade_keeps_an_existing_destroy_draft() {
    let mut engine = engine();
    let (mut parent, mut child) = published_family(&mut engine);

    assert!(engine.draft_destruction(&mut child, &ctx()).unwrap());
    let first = engine.draft_of(&child).unwrap().unwrap();

    assert!(engine.draft_destruction(&mut parent, &ctx()).unwrap());

    let child = engine.find("Child", child.id().unwrap()).unwrap();
    let after = engine.draft_of(&child).unwrap().unwrap();
    assert_eq!(after, first);
    assert!(after.previous_draft.is_none());
}

#[test]
fn trash_cascade_supersedes_a_pending_child_update() {
    let mut engine = engine();
    let (mut parent, mut child) = published_family(&mut engine);

    child.set("name", "Kiddo");
    assert!(engine.save_draft(&mut child, &ctx()).unwrap());
    let update = engine.draft_of(&child).unwrap().unwrap();

    assert!(engine.draft_destruction(&mut parent, &ctx()).unwrap());

    let child = engine.find("Child", child.id().unwrap()).unwrap();
    let destroy = engine.draft_of(&child).unwrap().unwrap();
    assert_eq!(destroy.id, update.id);
    assert!(destroy.is_destroy());
    assert!(destroy.previous_draft.is_some());

    // Reifying the destroy draft gives the superseded update's state.
    let reified = engine.reify(&destroy).unwrap().unwrap();
    assert_eq!(reified.get("name"), &json!("Kiddo"));
}

#[test]
fn publishing_a_parent_destroy_publishes_drafted_children() {
    let mut engine = engine();
    let (mut parent, child) = published_family(&mut engine);
    assert!(engine.draft_destruction(&mut parent, &ctx()).unwrap());

    let parent_draft = engine.draft_of(&parent).unwrap().unwrap();
    let child_record = engine.find("Child", child.id().unwrap()).unwrap();
    let child_draft = engine.draft_of(&child_record).unwrap().unwrap();
    let deps = engine.publication_dependencies(&parent_draft).unwrap();
    assert_eq!(draft_ids(&deps), vec![child_draft.id]);

    engine.publish(&parent_draft).unwrap();

    assert!(engine.all("Parent").unwrap().is_empty());
    assert!(engine.all("Child").unwrap().is_empty());
    assert!(engine.drafts("Draft", None).unwrap().is_empty());
}

#[test]
fn reverting_a_child_destroy_brings_the_parent_back_first() {
    let mut engine = engine();
    let (mut parent, child) = published_family(&mut engine);
    assert!(engine.draft_destruction(&mut parent, &ctx()).unwrap());

    let child = engine.find("Child", child.id().unwrap()).unwrap();
    let child_draft = engine.draft_of(&child).unwrap().unwrap();
    let parent_draft = engine.draft_of(&parent).unwrap().unwrap();
    let deps = engine.reversion_dependencies(&child_draft).unwrap();
    assert_eq!(draft_ids(&deps), vec![parent_draft.id]);

    engine.revert(&child_draft).unwrap();

    engine.reload(&mut parent).unwrap();
    let child = engine.find("Child", child.id().unwrap()).unwrap();
    assert!(!engine.is_trashed(&parent).unwrap());
    assert!(!engine.is_trashed(&child).unwrap());
    assert!(parent.get("draft_id").is_null());
    assert!(child.get("draft_id").is_null());
    assert!(engine.drafts("Draft", None).unwrap().is_empty());
}

#[test]
fn reverting_a_parent_destroy_leaves_children_in_the_trash() {
    let mut engine = engine();
    let (mut parent, child) = published_family(&mut engine);
    assert!(engine.draft_destruction(&mut parent, &ctx()).unwrap());
    let parent_draft = engine.draft_of(&parent).unwrap().unwrap();
    assert!(engine.reversion_dependencies(&parent_draft).unwrap().is_empty());

    engine.revert(&parent_draft).unwrap();

    engine.reload(&mut parent).unwrap();
    assert!(!engine.is_trashed(&parent).unwrap());
    let child = engine.find("Child", child.id().unwrap()).unwrap();
    assert!(engine.is_trashed(&child).unwrap());
    assert_eq!(engine.drafts("Draft", None).unwrap().len(), 1);
}

#[test]
fn reverting_a_parent_create_reverts_drafted_children() {
    let mut engine = engine();
    let parent = drafted_parent(&mut engine, "Mum");
    let child = drafted_child(&mut engine, &parent, "Kid");
    let parent_draft = engine.draft_of(&parent).unwrap().unwrap();
    let child_draft = engine.draft_of(&child).unwrap().unwrap();

    let deps = engine.reversion_dependencies(&parent_draft).unwrap();
    assert_eq!(draft_ids(&deps), vec![child_draft.id]);

    engine.revert(&parent_draft).unwrap();

    assert!(engine.all("Parent").unwrap().is_empty());
    assert!(engine.all("Child").unwrap().is_empty());
    assert!(engine.drafts("Draft", None).unwrap().is_empty());
}

#[test]
fn polymorphic_target_is_resolved_from_the_type_column() {
    let mut engine = engine();
    let parent = drafted_parent(&mut engine, "Mum");
    let parent_draft = engine.draft_of(&parent).unwrap().unwrap();

    let mut comment = engine.new_record("Comment").unwrap();
    comment
        .set("body", "Lovely")
        .set("commentable_type", "Parent")
        .set("commentable_id", parent.id().unwrap());
    assert!(engine.save_draft(&mut comment, &ctx()).unwrap());
    let comment_draft = engine.draft_of(&comment).unwrap().unwrap();

    let deps = engine.publication_dependencies(&comment_draft).unwrap();
    assert_eq!(draft_ids(&deps), vec![parent_draft.id]);

    // Without a type the relationship leads nowhere.
    let mut orphan = engine.new_record("Comment").unwrap();
    orphan.set("body", "Hello").set("commentable_id", parent.id().unwrap());
    assert!(engine.save_draft(&mut orphan, &ctx()).unwrap());
    let orphan_draft = engine.draft_of(&orphan).unwrap().unwrap();
    assert!(engine.publication_dependencies(&orphan_draft).unwrap().is_empty());
}

#[test]
fn the_draft_association_is_never_a_dependency() {
    let mut engine = engine();
    let mut node = engine.new_record("Node").unwrap();
    node.set("name", "root");
    assert!(engine.save_draft(&mut node, &ctx()).unwrap());
    let draft = engine.draft_of(&node).unwrap().unwrap();
    assert_eq!(node.get("draft_id"), &json!(node.id().unwrap()));

    assert!(engine.publication_dependencies(&draft).unwrap().is_empty());
    engine.publish(&draft).unwrap();
    assert!(engine.drafts("Draft", None).unwrap().is_empty());
}

#[test]
fn permanent_destroy_applies_dependent_rules() {
    let mut engine = engine();
    let off = DraftContext::disabled();
    let mut owner = engine.new_record("Owner").unwrap();
    owner.set("name", "Ann");
    assert!(engine.save_draft(&mut owner, &off).unwrap());

    let mut pet = engine.new_record("Pet").unwrap();
    pet.set("name", "Rex").set("owner_id", owner.id().unwrap());
    assert!(engine.save(&mut pet).unwrap());
    let mut toy = engine.new_record("Toy").unwrap();
    toy.set("name", "Ball").set("owner_id", owner.id().unwrap());
    assert!(engine.save(&mut toy).unwrap());

    engine.destroy(&mut owner).unwrap();

    assert!(engine.all("Pet").unwrap().is_empty());
    let toy = engine.find("Toy", toy.id().unwrap()).unwrap();
    assert!(toy.get("owner_id").is_null());
}

#[test]
fn trash_does_not_cascade_to_non_draftable_dependents() {
    let mut engine = engine();
    let mut owner = engine.new_record("Owner").unwrap();
    owner.set("name", "Ann");
    assert!(engine.save_draft(&mut owner, &DraftContext::disabled()).unwrap());
    let mut pet = engine.new_record("Pet").unwrap();
    pet.set("name", "Rex").set("owner_id", owner.id().unwrap());
    assert!(engine.save(&mut pet).unwrap());

    assert!(engine.draft_destruction(&mut owner, &ctx()).unwrap());
    assert_eq!(engine.all("Pet").unwrap().len(), 1);

    let draft = engine.draft_of(&owner).unwrap().unwrap();
    assert!(engine.publication_dependencies(&draft).unwrap().is_empty());
    engine.publish(&draft).unwrap();

    assert!(engine.all("Owner").unwrap().is_empty());
    assert!(engine.all("Pet").unwrap().is_empty());
}

// ── Failing commits ──────────────────────────────────────────────

/// Backend whose commits fail while `fail` is set.
struct FlakyBackend {
    fail: Arc<AtomicBool>,
}

impl Backend for FlakyBackend {
    fn load(&self) -> Result<Option<Tables>, ModelError> {
        Ok(None)
    }

    fn commit(&mut self, _tables: &Tables) -> Result<(), ModelError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ModelError::IoError {
                path: "flaky".into(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            });
        }
        Ok(())
    }
}

#[test]
fn failed_commit_leaves_the_whole_cascade_unapplied() {
    let fail = Arc::new(AtomicBool::new(false));
    let backend = FlakyBackend { fail: fail.clone() };
    let mut engine = DraftEngine::new(registry(), Settings::default(), backend).unwrap();

    let parent = drafted_parent(&mut engine, "Mum");
    let child = drafted_child(&mut engine, &parent, "Kid");
    let child_draft = engine.draft_of(&child).unwrap().unwrap();

    fail.store(true, Ordering::SeqCst);
    let err = engine.publish(&child_draft).unwrap_err();
    assert!(err.to_string().contains("disk full"), "{}", err);

    assert_eq!(engine.drafts("Draft", None).unwrap().len(), 2);
    let parent = engine.find("Parent", parent.id().unwrap()).unwrap();
    assert!(!engine.is_published(&parent).unwrap());
    assert!(engine.is_drafted(&parent).unwrap());

    fail.store(false, Ordering::SeqCst);
    engine.publish(&child_draft).unwrap();
    assert!(engine.drafts("Draft", None).unwrap().is_empty());
}
