//! Integration tests for the `iteration_scope` module.
//!
//! Exercises the public API from outside the crate: materialize and
//! copy_into semantics, closure capture across iterations, parent-link
//! identity, operator duplication, config loading, and event rendering.

#![forbid(unsafe_code)]

use std::rc::Rc;
use std::sync::Arc;

use frankenengine_iteration_scope::{
    IterationScope, IterationScopeConfig, IterationScopeContext, IterationScopeError,
    ParentLinkCheck, ReadSlot, ScopeRecord, ScopeRef, ScopeSchema, ScopeValue, SlotAccessors,
    SlotDescriptor, SlotKind, ValueProfile, WriteSlot,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn ij_schema() -> Arc<ScopeSchema> {
    Arc::new(ScopeSchema::loop_header([("i", 1, SlotKind::Let), ("j", 2, SlotKind::Let)]).unwrap())
}

fn ctx() -> IterationScopeContext {
    IterationScopeContext::new("trace-loop", "decision-loop", "policy-default")
}

fn operator() -> IterationScope {
    IterationScope::for_schema(ij_schema(), IterationScopeConfig::default(), ctx()).unwrap()
}

fn checked_operator() -> IterationScope {
    let config = IterationScopeConfig {
        parent_link_check: ParentLinkCheck::Always,
        ..IterationScopeConfig::default()
    };
    IterationScope::for_schema(ij_schema(), config, ctx()).unwrap()
}

fn function_scope() -> ScopeRef {
    ScopeRef::root(Arc::new(
        ScopeSchema::new(vec![SlotDescriptor::parent_link()]).unwrap(),
    ))
}

fn record(op: &IterationScope, parent: &ScopeRef, i: i64, j: i64) -> ScopeRef {
    let record = ScopeRef::new(ScopeRecord::new(
        Arc::clone(op.schema()),
        ScopeValue::Scope(parent.clone()),
        Rc::from([]),
    ));
    record.set("i", ScopeValue::int(i)).unwrap();
    record.set("j", ScopeValue::int(j)).unwrap();
    record
}

/// A closure body that reads `i` from the environment it captured.
struct ReadsI {
    env: ScopeRef,
}

impl ReadsI {
    fn call(&self) -> ScopeValue {
        self.env.get("i").unwrap()
    }
}

// ---------------------------------------------------------------------------
// 1. Materialize
// ---------------------------------------------------------------------------

#[test]
fn materialize_produces_distinct_record_with_same_values() {
    let op = operator();
    let parent = function_scope();
    let source = record(&op, &parent, 0, 10);

    let next = op.materialize(&source).unwrap();
    assert_ne!(next, source);
    assert_eq!(next.parent().unwrap(), ScopeValue::Scope(parent.clone()));
    assert_eq!(next.get("i").unwrap(), ScopeValue::int(0));
    assert_eq!(next.get("j").unwrap(), ScopeValue::int(10));

    next.set("i", ScopeValue::int(1)).unwrap();
    assert_eq!(source.get("i").unwrap(), ScopeValue::int(0));
}

#[test]
fn materialize_parent_link_is_the_same_record() {
    let op = operator();
    let parent = function_scope();
    let source = record(&op, &parent, 5, 6);
    let next = op.materialize(&source).unwrap();

    let linked = next.parent().unwrap();
    let linked = linked.as_scope().unwrap();
    assert!(linked.ptr_eq(&parent));
}

#[test]
fn materialize_storage_independent_in_both_directions() {
    let op = operator();
    let source = record(&op, &function_scope(), 1, 2);
    let next = op.materialize(&source).unwrap();

    source.set("j", ScopeValue::int(99)).unwrap();
    assert_eq!(next.get("j").unwrap(), ScopeValue::int(2));
    next.set("j", ScopeValue::Null).unwrap();
    assert_eq!(source.get("j").unwrap(), ScopeValue::int(99));
}

#[test]
fn materialize_does_not_mutate_source() {
    let op = operator();
    let source = record(&op, &function_scope(), 3, 4);
    let before = source.snapshot().unwrap();
    op.materialize(&source).unwrap();
    assert_eq!(source.snapshot().unwrap(), before);
}

#[test]
fn materialize_preserves_tdz_bindings() {
    let op = operator();
    let source = ScopeRef::new(ScopeRecord::new(
        Arc::clone(op.schema()),
        ScopeValue::Scope(function_scope()),
        Rc::from([]),
    ));
    let next = op.materialize(&source).unwrap();
    assert_eq!(next.get("i").unwrap(), ScopeValue::Tdz);
}

#[test]
fn materialize_chain_keeps_one_parent() {
    let op = operator();
    let parent = function_scope();
    let mut current = record(&op, &parent, 0, 0);
    for _ in 0..5 {
        current = op.materialize(&current).unwrap();
    }
    assert_eq!(current.parent().unwrap(), ScopeValue::Scope(parent));
}

// ---------------------------------------------------------------------------
// 2. CopyInto
// ---------------------------------------------------------------------------

#[test]
fn copy_into_overwrites_bindings_only() {
    let op = checked_operator();
    let parent = function_scope();
    let dest = record(&op, &parent, -1, -1);
    let source = record(&op, &parent, 3, 7);

    op.copy_into(&dest, &source).unwrap();
    assert_eq!(dest.get("i").unwrap(), ScopeValue::int(3));
    assert_eq!(dest.get("j").unwrap(), ScopeValue::int(7));
    assert_eq!(dest.parent().unwrap(), ScopeValue::Scope(parent));
}

#[test]
fn copy_into_twice_equals_once() {
    let op = checked_operator();
    let parent = function_scope();
    let dest = record(&op, &parent, -1, -1);
    let source = record(&op, &parent, 8, 9);

    op.copy_into(&dest, &source).unwrap();
    let once = dest.snapshot().unwrap();
    op.copy_into(&dest, &source).unwrap();
    assert_eq!(dest.snapshot().unwrap(), once);
}

#[test]
fn copy_into_leaves_source_alone() {
    let op = checked_operator();
    let parent = function_scope();
    let dest = record(&op, &parent, -1, -1);
    let source = record(&op, &parent, 1, 1);
    op.copy_into(&dest, &source).unwrap();
    dest.set("i", ScopeValue::int(50)).unwrap();
    assert_eq!(source.get("i").unwrap(), ScopeValue::int(1));
}

#[test]
fn self_copy_then_refresh_after_source_mutation() {
    let op = checked_operator();
    let parent = function_scope();
    let source = record(&op, &parent, 1, 2);
    let next = op.materialize(&source).unwrap();

    op.copy_into(&next, &next).unwrap();
    assert_eq!(next.get("i").unwrap(), ScopeValue::int(1));

    source.set("i", ScopeValue::int(5)).unwrap();
    op.copy_into(&next, &source).unwrap();
    assert_eq!(next.get("i").unwrap(), ScopeValue::int(5));
    assert_eq!(next.parent().unwrap(), ScopeValue::Scope(parent));
}

#[test]
fn copy_into_rejects_diverged_parent_under_always() {
    let op = checked_operator();
    let dest = record(&op, &function_scope(), -1, -1);
    let source = record(&op, &function_scope(), 3, 7);
    let err = op.copy_into(&dest, &source).unwrap_err();
    assert_eq!(err.error_code(), "FE-ITER-0005");
    assert!(!err.is_construction_failure());
}

#[test]
fn copy_into_rejects_foreign_destination() {
    let op = operator();
    let other = Arc::new(ScopeSchema::loop_header([("k", 3, SlotKind::Let)]).unwrap());
    let dest = ScopeRef::new(ScopeRecord::new(other, ScopeValue::Null, Rc::from([])));
    let source = record(&op, &function_scope(), 0, 0);
    let err = op.copy_into(&dest, &source).unwrap_err();
    assert!(matches!(
        err,
        IterationScopeError::NonConformantRecord {
            role: frankenengine_iteration_scope::RecordRole::Destination,
            ..
        }
    ));
}

#[test]
fn records_from_equal_schema_instances_interoperate() {
    let op = operator();
    let parent = function_scope();
    let separate_schema = ij_schema();
    let dest = ScopeRef::new(ScopeRecord::new(
        separate_schema,
        ScopeValue::Scope(parent.clone()),
        Rc::from([]),
    ));
    let source = record(&op, &parent, 2, 3);
    op.copy_into(&dest, &source).unwrap();
    assert_eq!(dest.get("j").unwrap(), ScopeValue::int(3));
}

// ---------------------------------------------------------------------------
// 3. Scenarios
// ---------------------------------------------------------------------------

#[test]
fn scenario_materialize_parent_i_j() {
    let op = operator();
    let p = function_scope();
    let source = record(&op, &p, 0, 10);
    let new_scope = op.materialize(&source).unwrap();

    assert_eq!(new_scope.parent().unwrap(), ScopeValue::Scope(p));
    assert_eq!(new_scope.get("i").unwrap(), ScopeValue::int(0));
    assert_eq!(new_scope.get("j").unwrap(), ScopeValue::int(10));
    assert_ne!(new_scope, source);

    new_scope.set("i", ScopeValue::int(1)).unwrap();
    assert_eq!(source.get("i").unwrap(), ScopeValue::int(0));
}

#[test]
fn scenario_copy_into_preallocated() {
    let op = checked_operator();
    let p = function_scope();
    let dest = record(&op, &p, -1, -1);
    let source = record(&op, &p, 3, 7);
    op.copy_into(&dest, &source).unwrap();

    assert_eq!(dest.parent().unwrap(), ScopeValue::Scope(p));
    assert_eq!(dest.get("i").unwrap(), ScopeValue::int(3));
    assert_eq!(dest.get("j").unwrap(), ScopeValue::int(7));
}

#[test]
fn scenario_closures_capture_their_own_iteration() {
    // for (let i = 0; i < 3; i++) { closures.push(() => i) }
    let op = operator();
    let p = function_scope();
    let mut current = record(&op, &p, 0, 0);
    let mut closures = Vec::new();

    for _ in 0..3 {
        closures.push(ReadsI {
            env: current.clone(),
        });
        let next = op.materialize(&current).unwrap();
        let ScopeValue::Number(i) = next.get("i").unwrap() else {
            panic!("i is a number");
        };
        next.set("i", ScopeValue::Number(i + 1_000_000)).unwrap();
        current = next;
    }

    let seen: Vec<_> = closures.iter().map(ReadsI::call).collect();
    assert_eq!(
        seen,
        vec![ScopeValue::int(0), ScopeValue::int(1), ScopeValue::int(2)]
    );
}

#[test]
fn reusing_one_record_makes_closures_share_the_last_value() {
    // What a loop executor gets if it reuses a captured record.
    let op = checked_operator();
    let p = function_scope();
    let shared = record(&op, &p, 0, 0);
    let scratch = record(&op, &p, 0, 0);
    let mut closures = Vec::new();

    for i in 0..3 {
        closures.push(ReadsI {
            env: shared.clone(),
        });
        scratch.set("i", ScopeValue::int(i + 1)).unwrap();
        op.copy_into(&shared, &scratch).unwrap();
    }

    assert!(closures.iter().all(|c| c.call() == ScopeValue::int(3)));
}

#[test]
fn captured_records_outlive_the_loop() {
    let op = operator();
    let closures: Vec<ReadsI> = {
        let p = function_scope();
        let mut current = record(&op, &p, 10, 0);
        let mut out = Vec::new();
        for step in 0..2 {
            out.push(ReadsI {
                env: current.clone(),
            });
            current = op.materialize(&current).unwrap();
            current.set("i", ScopeValue::int(11 + step)).unwrap();
        }
        out
    };
    assert_eq!(closures[0].env.holder_count(), 1);
    assert_eq!(closures[1].call(), ScopeValue::int(11));
}

// ---------------------------------------------------------------------------
// 4. Construction contract
// ---------------------------------------------------------------------------

#[test]
fn construction_rejects_unequal_accessor_lists() {
    let reads = vec![ReadSlot::new(0), ReadSlot::new(1), ReadSlot::new(2)];
    let writes = vec![WriteSlot::new(0), WriteSlot::new(1)];
    let err = IterationScope::new(
        ij_schema(),
        reads,
        writes,
        IterationScopeConfig::default(),
        ctx(),
    )
    .unwrap_err();
    assert!(err.is_construction_failure());
    assert_eq!(err.error_code(), "FE-ITER-0001");
}

#[test]
fn construction_rejects_short_accessor_lists() {
    let reads = vec![ReadSlot::new(0)];
    let writes = vec![WriteSlot::new(0)];
    let err = IterationScope::new(
        ij_schema(),
        reads,
        writes,
        IterationScopeConfig::default(),
        ctx(),
    )
    .unwrap_err();
    assert_eq!(
        err,
        IterationScopeError::SchemaLengthMismatch {
            schema_slots: 3,
            accessors: 1
        }
    );
}

#[test]
fn construction_from_raw_slots_reports_layout_defects() {
    let err = IterationScope::from_slots(
        vec![
            SlotDescriptor::parent_link(),
            SlotDescriptor::binding("i", 1, SlotKind::Let),
            SlotDescriptor::binding("i", 2, SlotKind::Let),
        ],
        IterationScopeConfig::default(),
        ctx(),
    )
    .unwrap_err();
    assert!(err.is_construction_failure());
    assert_eq!(err.error_code(), "FE-ITER-0104");
}

#[test]
fn construction_accepts_analysis_accessors() {
    let schema = ij_schema();
    let (reads, writes) = SlotAccessors::for_schema(&schema).into_parts();
    let op = IterationScope::new(schema, reads, writes, IterationScopeConfig::default(), ctx())
        .unwrap();
    assert_eq!(op.slot_count(), 3);
    assert_eq!(op.context(), &ctx());
}

// ---------------------------------------------------------------------------
// 5. Duplication
// ---------------------------------------------------------------------------

#[test]
fn clone_uninitialized_shares_schema_only() {
    let op = operator();
    let source = record(&op, &function_scope(), 1, 2);
    op.materialize(&source).unwrap();

    let copy = op.clone_uninitialized();
    assert!(Arc::ptr_eq(copy.schema(), op.schema()));
    assert!(
        copy.accessors()
            .writes
            .iter()
            .all(|w| w.profile() == ValueProfile::Uninitialized)
    );

    copy.materialize(&source).unwrap();
    let copy_profile = copy.accessors().reads[1].profile();
    let orig_profile = op.accessors().reads[1].profile();
    assert_eq!(copy_profile, orig_profile);

    // driving the copy with other kinds does not touch the original
    source.set("i", ScopeValue::str("x")).unwrap();
    copy.materialize(&source).unwrap();
    assert_eq!(copy.accessors().reads[1].profile(), ValueProfile::Generic);
    assert_eq!(op.accessors().reads[1].profile(), orig_profile);
}

#[test]
fn clone_of_clone_behaves_like_original() {
    let op = operator();
    let copy = op.clone_uninitialized().clone_uninitialized();
    let parent = function_scope();
    let dest = record(&op, &parent, 0, 0);
    let source = record(&op, &parent, 4, 4);
    copy.copy_into(&dest, &source).unwrap();
    assert_eq!(dest.get("i").unwrap(), ScopeValue::int(4));
}

// ---------------------------------------------------------------------------
// 6. Config and events
// ---------------------------------------------------------------------------

#[test]
fn operator_from_toml_config_traces_copies() {
    let config = IterationScopeConfig::from_toml_str(
        r#"
        parent_link_check = "always"
        trace_copies = true
        "#,
    )
    .unwrap();
    let op = IterationScope::for_schema(ij_schema(), config, ctx()).unwrap();
    let source = record(&op, &function_scope(), 0, 0);
    let next = op.materialize(&source).unwrap();
    op.copy_into(&next, &source).unwrap();

    let events = op.drain_events();
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|e| e.trace_id == "trace-loop"));
    assert!(events.iter().all(|e| e.outcome == "pass"));
}

#[test]
fn failures_always_logged() {
    let op = checked_operator();
    let dest = record(&op, &function_scope(), 0, 0);
    let source = record(&op, &function_scope(), 0, 0);
    assert!(op.copy_into(&dest, &source).is_err());

    let jsonl = op.events_jsonl().unwrap();
    let last = jsonl.lines().last().unwrap();
    let value: serde_json::Value = serde_json::from_str(last).unwrap();
    assert_eq!(value["event"], "copy_into");
    assert_eq!(value["outcome"], "fail");
    assert_eq!(value["error_code"], "FE-ITER-0005");
}
