//! Translator context (`spec.md` §4.3 "C3 Translator context").
//!
//! Holds the state threaded through an entire translation unit: the IR
//! module under construction, the target environment, the global scope
//! layout, and the debug-info hierarchy stack. A [`LocalContext`] is
//! pushed per function and carries the function's own scope layout and
//! instruction buffer; it borrows the rest from its parent.

use hashbrown::HashMap;
use std::rc::Rc;

use crate::block::IrBlockBuilder;
use crate::flow::FlowController;
use crate::symbol::Symbol;
use crate::types::ast::AstNode;
use crate::types::debug::{DebugEntryId, DebugTag};
use crate::types::ir::IrModule;
use crate::types::layout::TargetEnvironment;
use crate::types::scope::ScopedIdentifier;

/// A flat symbol table mapping names to the identifier they currently
/// resolve to (`spec.md` §3 "global/local scope layouts").
#[derive(Default)]
pub struct ScopeLayout {
  entries: HashMap<Symbol, Rc<ScopedIdentifier>>,
}

impl ScopeLayout {
  #[must_use] pub fn new() -> Self { Self::default() }

  pub fn insert(&mut self, name: Symbol, id: Rc<ScopedIdentifier>) { self.entries.insert(name, id); }

  #[must_use] pub fn lookup(&self, name: Symbol) -> Option<&Rc<ScopedIdentifier>> { self.entries.get(&name) }
}

/// Category a `before_translate`/`after_translate` extension hook fires
/// for (`spec.md` §4.3 "Extensions see before_translate/after_translate
/// for each node category").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeHookCategory { Expression, Statement, Declaration, TranslationUnit }

/// Extension callbacks a driver may register (`spec.md` §4.3, §2 "out of
/// scope ... the extension plugin loader" — the core only exposes the
/// hook points, not a loader).
pub trait TranslatorExtension {
  fn before_translate(&mut self, _category: NodeHookCategory, _node: &AstNode) {}
  fn after_translate(&mut self, _category: NodeHookCategory, _node: &AstNode) {}
  /// Handles `AstKind::ExtensionNode`; `None` means the extension declined
  /// and the core should treat it as `INTERNAL_ERROR`.
  fn translate_extension_node(&mut self, _tag: Symbol, _node: &AstNode) -> Option<()> { None }
}

/// One entry in the debug-hierarchy stack: the tag it was pushed with and
/// the tree id it received.
#[derive(Clone, Copy, Debug)]
struct DebugFrame { tag: DebugTag, id: DebugEntryId }

/// Process-wide-per-translation-unit state (`spec.md` §4.3).
pub struct TranslatorContext {
  pub target: Rc<TargetEnvironment>,
  pub module: IrModule,
  pub global_scope: ScopeLayout,
  debug_stack: Vec<DebugFrame>,
  current_function_debug: Option<DebugEntryId>,
  extensions: Vec<Box<dyn TranslatorExtension>>,
}

impl TranslatorContext {
  #[must_use] pub fn new(target: Rc<TargetEnvironment>) -> Self {
    Self {
      target,
      module: IrModule::new(),
      global_scope: ScopeLayout::new(),
      debug_stack: Vec::new(),
      current_function_debug: None,
      extensions: Vec::new(),
    }
  }

  pub fn register_extension(&mut self, ext: Box<dyn TranslatorExtension>) { self.extensions.push(ext); }

  pub fn extensions_mut(&mut self) -> &mut [Box<dyn TranslatorExtension>] { &mut self.extensions }

  /// Pushes a new debug-tree entry under the current top of the hierarchy
  /// stack (or as a root if the stack is empty) and tracks it for the
  /// matching `pop_debug_entry` (`spec.md` §4.3, invariant (vi)).
  pub fn push_debug_entry(&mut self, tag: DebugTag, attrs: crate::types::debug::DebugAttributes) -> DebugEntryId {
    let parent = self.debug_stack.last().map(|f| f.id);
    let id = self.module.debug.push(tag, parent, attrs);
    if tag == DebugTag::CompileUnit { self.module.debug.compile_unit = Some(id); }
    self.debug_stack.push(DebugFrame { tag, id });
    id
  }

  pub fn pop_debug_entry(&mut self) -> DebugEntryId {
    self.debug_stack.pop().expect("pop_debug_entry called with an empty debug-hierarchy stack").id
  }

  #[must_use] pub fn debug_depth(&self) -> usize { self.debug_stack.len() }

  pub fn set_current_function_debug(&mut self, id: Option<DebugEntryId>) { self.current_function_debug = id; }
  #[must_use] pub fn current_function_debug(&self) -> Option<DebugEntryId> { self.current_function_debug }

  /// `spec.md` §4.3 "init_local(parent) -> local_context".
  #[must_use] pub fn init_local(&self) -> LocalContext {
    LocalContext {
      scope: ScopeLayout::new(), builder: IrBlockBuilder::new(), vla_scopes: Vec::new(),
      flow: FlowController::new(), local_slot_cursor: 0,
    }
  }

  /// `spec.md` §4.3 "free(local_context)". Rust's ownership already frees
  /// the fields on drop; this exists to mirror the explicit lifecycle call
  /// and as the place a future extension hook on teardown would live.
  pub fn free(&mut self, _local: LocalContext) {}
}

/// Enough to re-derive a VLA record's `array_ptr` field address at scope
/// exit without holding a borrow of the declaring [`crate::types::scope::ObjectIdentifier`]
/// (`spec.md` §3 invariant (iv) "deallocated on scope exit").
#[derive(Clone, Copy, Debug)]
pub struct VlaAllocation {
  pub id: crate::types::scope::ObjectId,
  pub ir_type: crate::types::ir::IrTypeId,
  pub layout_value: u32,
  pub array_ptr_offset: u32,
}

/// A per-scope list of VLA-allocated objects awaiting dealloc on scope
/// exit (`spec.md` §3 invariant (iv)).
#[derive(Default)]
pub struct VlaScope {
  pub allocations: Vec<VlaAllocation>,
}

/// Per-function translator state (`spec.md` §4.3, §4.10).
pub struct LocalContext {
  pub scope: ScopeLayout,
  pub builder: IrBlockBuilder,
  pub vla_scopes: Vec<VlaScope>,
  pub flow: FlowController,
  /// Hands out the next free local-variable slot (`spec.md` §4.10 "local
  /// scope layout"), mirroring [`crate::temporaries::TemporaryAllocator`]'s
  /// own monotonic cursor.
  local_slot_cursor: u32,
}

impl LocalContext {
  pub fn push_vla_scope(&mut self) { self.vla_scopes.push(VlaScope::default()); }

  /// Pops the innermost VLA scope, returning the objects it collected for
  /// the statement translator to emit dealloc code for.
  #[must_use] pub fn pop_vla_scope(&mut self) -> VlaScope {
    self.vla_scopes.pop().expect("pop_vla_scope called with no open VLA scope")
  }

  pub fn register_vla(&mut self, allocation: VlaAllocation) {
    self.vla_scopes.last_mut().expect("VLA declared outside any scope").allocations.push(allocation);
  }

  /// Reserves the next local-variable slot, for a freshly-declared `auto`/
  /// `register` object's `GET_LOCAL` payload.
  pub fn next_local_slot(&mut self) -> u32 {
    let slot = self.local_slot_cursor;
    self.local_slot_cursor += 1;
    slot
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::debug::DebugAttributes;

  #[test]
  fn debug_stack_push_pop_balances() {
    let mut ctx = TranslatorContext::new(Rc::new(TargetEnvironment::default()));
    assert_eq!(ctx.debug_depth(), 0);
    let cu = ctx.push_debug_entry(DebugTag::CompileUnit, DebugAttributes::default());
    ctx.push_debug_entry(DebugTag::Subprogram, DebugAttributes::default());
    assert_eq!(ctx.debug_depth(), 2);
    ctx.pop_debug_entry();
    ctx.pop_debug_entry();
    assert_eq!(ctx.debug_depth(), 0);
    assert_eq!(ctx.module.debug.compile_unit, Some(cu));
  }
}
