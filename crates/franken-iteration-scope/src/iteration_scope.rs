//! Per-iteration scope duplication for `for (let ...)` loops.
//!
//! Every iteration of a loop whose header declares block-scoped bindings
//! gets its own copy of those bindings, seeded from the previous
//! iteration's values. Closures created during an iteration capture that
//! iteration's record and must keep observing it after the loop moves on.
//!
//! [`IterationScope`] provides two ways to build the next iteration's
//! environment:
//! - [`IterationScope::materialize`] allocates a fresh record. Used when a
//!   closure may have captured the previous one.
//! - [`IterationScope::copy_into`] refreshes an existing record in place.
//!   Used when the caller knows nothing captured the destination.
//!
//! Choosing between them is the loop executor's decision.

use std::cell::RefCell;
use std::sync::Arc;

use crate::accessor::{ReadSlot, SlotAccessors, WriteSlot};
use crate::config::IterationScopeConfig;
use crate::error::{IterationScopeError, RecordRole};
use crate::events::{
    IterationScopeContext, IterationScopeEvent, failure_event, render_jsonl, success_event,
};
use crate::record::{ScopeRecord, ScopeRef};
use crate::schema::{PARENT_SLOT, ScopeSchema, SlotDescriptor};
use crate::value::ScopeValue;

/// Iteration-boundary operator for one loop-header scope.
#[derive(Debug)]
pub struct IterationScope {
    schema: Arc<ScopeSchema>,
    accessors: SlotAccessors,
    config: IterationScopeConfig,
    context: IterationScopeContext,
    events: RefCell<Vec<IterationScopeEvent>>,
}

impl IterationScope {
    /// Build an operator from the accessor lists emitted by scope analysis.
    ///
    /// `reads[i]` and `writes[i]` must both target slot `i` of `schema`; any
    /// length or alignment mismatch is rejected, never truncated.
    pub fn new(
        schema: Arc<ScopeSchema>,
        reads: Vec<ReadSlot>,
        writes: Vec<WriteSlot>,
        config: IterationScopeConfig,
        context: IterationScopeContext,
    ) -> Result<Self, IterationScopeError> {
        if reads.len() != writes.len() {
            return Err(IterationScopeError::ArityMismatch {
                reads: reads.len(),
                writes: writes.len(),
            });
        }
        if schema.len() > config.max_slots {
            return Err(IterationScopeError::SchemaTooLarge {
                slots: schema.len(),
                max_slots: config.max_slots,
            });
        }
        if reads.len() != schema.len() {
            return Err(IterationScopeError::SchemaLengthMismatch {
                schema_slots: schema.len(),
                accessors: reads.len(),
            });
        }
        for (position, (read, write)) in reads.iter().zip(&writes).enumerate() {
            if read.index() != position || write.index() != position {
                return Err(IterationScopeError::AccessorMisaligned {
                    position,
                    read_index: read.index(),
                    write_index: write.index(),
                });
            }
        }

        let created = success_event(
            &context,
            "iteration_scope_created",
            schema.content_hash(),
            schema.len(),
        );
        Ok(Self {
            schema,
            accessors: SlotAccessors { reads, writes },
            config,
            context,
            events: RefCell::new(vec![created]),
        })
    }

    /// Operator with the canonical accessor pair for every slot.
    pub fn for_schema(
        schema: Arc<ScopeSchema>,
        config: IterationScopeConfig,
        context: IterationScopeContext,
    ) -> Result<Self, IterationScopeError> {
        let (reads, writes) = SlotAccessors::for_schema(&schema).into_parts();
        Self::new(schema, reads, writes, config, context)
    }

    /// Operator over a raw slot list, validating the layout first.
    pub fn from_slots(
        slots: Vec<SlotDescriptor>,
        config: IterationScopeConfig,
        context: IterationScopeContext,
    ) -> Result<Self, IterationScopeError> {
        let schema = ScopeSchema::new(slots)?;
        Self::for_schema(Arc::new(schema), config, context)
    }

    /// Allocate the next iteration's record from `source`.
    ///
    /// Slot 0 of the result aliases the parent link of `source`; every other
    /// slot is independent storage holding a copy of the source value.
    /// `source` is not modified.
    pub fn materialize(&self, source: &ScopeRef) -> Result<ScopeRef, IterationScopeError> {
        let result = self.materialize_record(source);
        self.record_outcome("materialize", result.as_ref().map(|_| ()));
        result
    }

    /// Refresh `dest` with the bindings of `source`, leaving slot 0 alone.
    ///
    /// Both records must share one parent link. Whether that is verified
    /// depends on [`IterationScopeConfig::parent_link_check`].
    pub fn copy_into(&self, dest: &ScopeRef, source: &ScopeRef) -> Result<(), IterationScopeError> {
        let result = self.copy_record(dest, source);
        self.record_outcome("copy_into", result.as_ref().map(|_| ()));
        result
    }

    /// Duplicate for a separate compilation context: same schema, fresh
    /// accessors with reset profiles, empty event log.
    pub fn clone_uninitialized(&self) -> Self {
        self.events.borrow_mut().push(success_event(
            &self.context,
            "iteration_scope_cloned",
            self.schema.content_hash(),
            self.schema.len(),
        ));
        Self {
            schema: Arc::clone(&self.schema),
            accessors: self.accessors.clone_uninitialized(),
            config: self.config.clone(),
            context: self.context.clone(),
            events: RefCell::new(Vec::new()),
        }
    }

    pub fn schema(&self) -> &Arc<ScopeSchema> {
        &self.schema
    }

    pub fn slot_count(&self) -> usize {
        self.schema.len()
    }

    pub fn binding_names(&self) -> Vec<&str> {
        self.schema
            .bindings()
            .iter()
            .map(|slot| slot.name.as_str())
            .collect()
    }

    pub fn accessors(&self) -> &SlotAccessors {
        &self.accessors
    }

    pub fn config(&self) -> &IterationScopeConfig {
        &self.config
    }

    pub fn context(&self) -> &IterationScopeContext {
        &self.context
    }

    pub fn events(&self) -> Vec<IterationScopeEvent> {
        self.events.borrow().clone()
    }

    pub fn drain_events(&self) -> Vec<IterationScopeEvent> {
        self.events.take()
    }

    pub fn events_jsonl(&self) -> Result<String, serde_json::Error> {
        render_jsonl(&self.events.borrow())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn materialize_record(&self, source: &ScopeRef) -> Result<ScopeRef, IterationScopeError> {
        let source = source.borrow()?;
        self.check_conformance(&source, RecordRole::Source)?;

        let mut next = ScopeRecord::new(
            Arc::clone(&self.schema),
            ScopeValue::Tdz,
            source.arguments().clone(),
        );
        let parent = self.accessors.reads[PARENT_SLOT].execute(&source)?;
        self.accessors.writes[PARENT_SLOT].execute(&mut next, parent)?;
        self.copy_bindings(&mut next, &source)?;
        Ok(ScopeRef::new(next))
    }

    fn copy_record(&self, dest: &ScopeRef, source: &ScopeRef) -> Result<(), IterationScopeError> {
        if dest.ptr_eq(source) {
            // Copying a record onto itself leaves it unchanged.
            let record = source.borrow()?;
            return self.check_conformance(&record, RecordRole::Source);
        }
        let source = source.borrow()?;
        let mut dest = dest.borrow_mut()?;
        self.check_conformance(&source, RecordRole::Source)?;
        self.check_conformance(&dest, RecordRole::Destination)?;

        if self.config.parent_link_check.enabled() && dest.parent() != source.parent() {
            return Err(IterationScopeError::ParentLinkDiverged {
                destination_parent: render_parent(&dest),
                source_parent: render_parent(&source),
            });
        }
        self.copy_bindings(&mut dest, &source)
    }

    /// Slots `1..n`; the count is fixed per operator.
    fn copy_bindings(
        &self,
        dest: &mut ScopeRecord,
        source: &ScopeRecord,
    ) -> Result<(), IterationScopeError> {
        let pairs = self.accessors.reads.iter().zip(&self.accessors.writes);
        for (read, write) in pairs.skip(PARENT_SLOT + 1) {
            write.execute(dest, read.execute(source)?)?;
        }
        Ok(())
    }

    fn check_conformance(
        &self,
        record: &ScopeRecord,
        role: RecordRole,
    ) -> Result<(), IterationScopeError> {
        if record.conforms_to(&self.schema) {
            return Ok(());
        }
        Err(IterationScopeError::NonConformantRecord {
            role,
            expected_hash: self.schema.content_hash().to_string(),
            found_slots: record.len(),
        })
    }

    fn record_outcome(&self, event: &str, result: Result<(), &IterationScopeError>) {
        let entry = match result {
            Ok(()) if !self.config.trace_copies => return,
            Ok(()) => success_event(
                &self.context,
                event,
                self.schema.content_hash(),
                self.schema.len(),
            ),
            Err(error) => failure_event(
                &self.context,
                event,
                error.error_code(),
                self.schema.content_hash(),
                self.schema.len(),
            ),
        };
        self.events.borrow_mut().push(entry);
    }
}

fn render_parent(record: &ScopeRecord) -> String {
    record
        .parent()
        .map_or_else(|| "<missing>".to_string(), ToString::to_string)
}
