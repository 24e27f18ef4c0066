//! Temporary allocator (`spec.md` §4.4 "C4 Temporary allocator").
//!
//! The analyzer reserves `temporary_identifier` slots during analysis and
//! installs a [`ScopedIdentifier`] for each; this module only ever
//! materializes the *address* of an already-reserved slot, via C5's
//! object-lvalue path (see [`crate::lvalue`]).

use crate::context::{LocalContext, TranslatorContext};
use crate::error::{ErrorKind, TResult, TranslateError};
use crate::lvalue;
use crate::types::ast::TemporaryId;
use crate::types::scope::ScopedIdentifier;
use std::rc::Rc;

/// Why a temporary's address is being fetched — most cases are a plain
/// fetch, but a long-double conversion chained off an aggregate-returning
/// call needs the address-advance described below.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TemporaryUse {
  VaArg,
  CompoundLiteral,
  AggregateCallResult,
  AtomicAggregateLoad,
  /// A conversion *to* long-double chained off an aggregate/long-double
  /// returning call (`spec.md` §4.4: "the allocator also performs an
  /// address-advance by the size of one long-double slot").
  LongDoubleFromCall,
}

/// Tracks, within a single top-level expression, how many call-result
/// slots have already been consumed — each call within an expression
/// claims one long-double-sized slot out of a shared scratch region, so
/// later calls must not clobber an earlier one that is still live.
#[derive(Default)]
pub struct TemporaryAllocator {
  call_slot_cursor: u32,
}

impl TemporaryAllocator {
  #[must_use] pub fn new() -> Self { Self::default() }

  /// Resets the call-slot cursor; invoked by the statement translator at
  /// the start of every top-level full expression.
  pub fn reset_expression(&mut self) { self.call_slot_cursor = 0; }

  /// Emits the address of `temp`'s backing object, failing with
  /// `UNALLOCATED_TEMPORARY` if the analyzer never installed a scoped-id
  /// for it.
  pub fn emit_temporary_address(
    &mut self,
    ctx: &mut TranslatorContext,
    local: &mut LocalContext,
    temp: TemporaryId,
    scoped_id: Option<&Rc<ScopedIdentifier>>,
    usage: TemporaryUse,
  ) -> TResult<()> {
    let scoped_id = scoped_id.ok_or_else(|| TranslateError::new(
      ErrorKind::UnallocatedTemporary,
      format!("temporary {} referenced without an analyzer-reserved slot", temp.0),
    ))?;
    let obj = scoped_id.as_object().ok_or_else(|| TranslateError::new(
      ErrorKind::UnallocatedTemporary,
      format!("temporary {} does not resolve to an object identifier", temp.0),
    ))?;
    lvalue::translate_object_lvalue(ctx, local, obj)?;

    if usage == TemporaryUse::LongDoubleFromCall {
      self.advance_long_double_slot(ctx, local)?;
    }
    if matches!(usage, TemporaryUse::AggregateCallResult) {
      self.call_slot_cursor += 1;
    }
    Ok(())
  }

  /// Advances the address currently on the virtual stack forward by one
  /// long-double slot (`spec.md` §4.4).
  fn advance_long_double_slot(&mut self, ctx: &mut TranslatorContext, local: &mut LocalContext) -> TResult<()> {
    use crate::types::ir::Opcode;
    let slot_size = u64::from(ctx.target.long_double_size) * u64::from(self.call_slot_cursor);
    local.builder.append(Opcode::UintConst(slot_size))?;
    local.builder.append(Opcode::PointerAdd)?;
    Ok(())
  }
}
