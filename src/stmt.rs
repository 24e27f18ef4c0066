//! Statement/declaration translator (`spec.md` §4.9 "C9 Statement/
//! declaration translator").
//!
//! Every statement leaves the virtual stack at the depth it found it
//! (invariant (i) extended to statements): an expression statement's
//! result is popped unless it is `void`-typed, and a `switch`'s
//! controlling value is popped exactly once, after its dispatch chain.
//!
//! `if`/`while`/`do`/`for` all reuse the placeholder-`Branch`-then-
//! `patch_target` idiom the expression translator already uses for `?:`
//! and `&&`/`||` (`expr::translate_ternary`, `expr::translate_logical`);
//! `continue`/`break`/`switch` dispatch additionally go through
//! [`crate::flow::FlowController`], since their targets aren't known
//! until after the body they're inside has been walked.

use crate::context::{LocalContext, TranslatorContext, VlaAllocation};
use crate::error::{ErrorKind, TResult, TranslateError};
use crate::expr;
use crate::initializer;
use crate::layout_oracle;
use crate::lvalue;
use crate::temporaries::TemporaryAllocator;
use crate::types::ast::{AstKind, AstNode, CaseLabel, Expr};
use crate::types::ir::{CmpOp, CondWidth, InstIndex, Opcode, Sign};
use crate::types::layout::LayoutHome;
use crate::types::scope::{ObjectIdentifier, ObjectId, ScopedIdentifier, StorageClass};
use crate::types::ty::{classify, ArrayLen, DataModelClass, Type, TypeKind};

/// Translates a statement or declaration node.
pub fn translate_statement(ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator, item: &AstNode) -> TResult<()> {
  match &item.kind {
    AstKind::Labeled { stmt, .. } => {
      let point = item.properties.flow.expect("labeled statement without a resolved flow point");
      local.flow.define_label(point, local.builder.current_index());
      translate_statement(ctx, local, temps, stmt)
    }
    AstKind::Case { label, stmt } => {
      local.flow.record_case(label.clone(), local.builder.current_index());
      translate_statement(ctx, local, temps, stmt)
    }
    AstKind::Default { stmt } => {
      local.flow.record_default(local.builder.current_index());
      translate_statement(ctx, local, temps, stmt)
    }
    AstKind::ExpressionStatement(expr_node) => translate_expression_statement(ctx, local, temps, expr_node.as_deref()),
    AstKind::Compound { items } => translate_compound(ctx, local, temps, items),
    AstKind::If { cond, then_branch, else_branch } => translate_if(ctx, local, temps, cond, then_branch, else_branch.as_deref()),
    AstKind::Switch { controlling, body } => translate_switch(ctx, local, temps, controlling, body),
    AstKind::While { cond, body } => translate_while(ctx, local, temps, cond, body),
    AstKind::DoWhile { body, cond } => translate_do_while(ctx, local, temps, body, cond),
    AstKind::For { init, cond, step, body } => translate_for(ctx, local, temps, init.as_deref(), cond.as_deref(), step.as_deref(), body),
    AstKind::Goto(_) => {
      let point = item.properties.flow.expect("goto without a resolved flow point");
      local.flow.emit_goto(&mut local.builder, point)
    }
    AstKind::GotoComputed(target) => translate_goto_computed(ctx, local, temps, target),
    AstKind::Continue => local.flow.emit_continue(&mut local.builder),
    AstKind::Break => local.flow.emit_break(&mut local.builder),
    AstKind::Return(value) => translate_return(ctx, local, temps, value.as_deref()),
    AstKind::InlineAsmStatement(_) => Err(TranslateError::new(
      ErrorKind::NotImplemented, "inline assembly is translated by a backend-specific collaborator",
    )),
    AstKind::Declaration(decls) => translate_declaration(ctx, local, temps, decls),
    AstKind::StaticAssertion | AstKind::AttributeList | AstKind::AttributeDeclaration | AstKind::TypeName(_) => Ok(()),
    AstKind::ExtensionNode { tag, payload } => {
      for ext in ctx.extensions_mut() {
        if ext.translate_extension_node(*tag, payload).is_some() { return Ok(()); }
      }
      Err(TranslateError::new(ErrorKind::NotImplemented, "no registered extension handled this extension node"))
    }
    other => panic!("node {other:?} is not a statement-translatable node"),
  }
}

/// A bare expression statement (also used for a `for` loop's `step`):
/// translate, then discard the result unless it's `void` (mirroring
/// `expr::translate_expr`'s `Comma` handling).
fn translate_expression_statement(ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator, expr_node: Option<&AstNode>) -> TResult<()> {
  let Some(e) = expr_node else { return Ok(()) };
  temps.reset_expression();
  expr::translate_expr(ctx, local, temps, e)?;
  if !matches!(e.expr_ty().map(|t| &**t), Some(TypeKind::Void)) {
    local.builder.append(Opcode::VstackPop)?;
  }
  Ok(())
}

fn translate_compound(ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator, items: &[Expr]) -> TResult<()> {
  local.push_vla_scope();
  for item in items {
    translate_statement(ctx, local, temps, item)?;
  }
  let scope = local.pop_vla_scope();
  emit_vla_scope_dealloc(local, &scope)
}

fn translate_if(
  ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator,
  cond: &AstNode, then_branch: &AstNode, else_branch: Option<&AstNode>,
) -> TResult<()> {
  temps.reset_expression();
  expr::translate_expr(ctx, local, temps, cond)?;
  crate::typeconv::convert_to_bool(local, cond.expr_ty().expect("`if` condition without a resolved type"))?;
  let to_then = local.builder.append(Opcode::Branch { target: InstIndex(0), cond: CondWidth::W8 })?;
  if let Some(else_branch) = else_branch {
    translate_statement(ctx, local, temps, else_branch)?;
  }
  let to_end = local.builder.append(Opcode::Jump(InstIndex(0)))?;
  let then_target = local.builder.current_index();
  local.builder.patch_target(to_then, then_target);
  translate_statement(ctx, local, temps, then_branch)?;
  let end = local.builder.current_index();
  local.builder.patch_target(to_end, end);
  Ok(())
}

fn translate_while(ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator, cond: &AstNode, body: &AstNode) -> TResult<()> {
  let cond_check = local.builder.current_index();
  temps.reset_expression();
  expr::translate_expr(ctx, local, temps, cond)?;
  crate::typeconv::convert_to_bool(local, cond.expr_ty().expect("`while` condition without a resolved type"))?;
  let to_body = local.builder.append(Opcode::Branch { target: InstIndex(0), cond: CondWidth::W8 })?;
  let to_end = local.builder.append(Opcode::Jump(InstIndex(0)))?;
  let body_start = local.builder.current_index();
  local.builder.patch_target(to_body, body_start);
  local.flow.push_loop();
  translate_statement(ctx, local, temps, body)?;
  local.flow.patch_continues(&mut local.builder, cond_check);
  local.builder.append(Opcode::Jump(cond_check))?;
  let end = local.builder.current_index();
  local.builder.patch_target(to_end, end);
  local.flow.pop_loop(&mut local.builder);
  Ok(())
}

fn translate_do_while(ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator, body: &AstNode, cond: &AstNode) -> TResult<()> {
  let body_start = local.builder.current_index();
  local.flow.push_loop();
  translate_statement(ctx, local, temps, body)?;
  let cond_check = local.builder.current_index();
  local.flow.patch_continues(&mut local.builder, cond_check);
  temps.reset_expression();
  expr::translate_expr(ctx, local, temps, cond)?;
  crate::typeconv::convert_to_bool(local, cond.expr_ty().expect("`do`/`while` condition without a resolved type"))?;
  local.builder.append(Opcode::Branch { target: body_start, cond: CondWidth::W8 })?;
  local.flow.pop_loop(&mut local.builder);
  Ok(())
}

/// `for (init; cond; step) body`. `continue` targets `step`, not the
/// condition re-check, so the loop frame's continue-patch target is the
/// step's entry index rather than `cond_check`.
fn translate_for(
  ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator,
  init: Option<&AstNode>, cond: Option<&AstNode>, step: Option<&AstNode>, body: &AstNode,
) -> TResult<()> {
  local.push_vla_scope();
  if let Some(init) = init {
    translate_statement(ctx, local, temps, init)?;
  }

  let cond_check = local.builder.current_index();
  let mut to_end = None;
  if let Some(cond) = cond {
    temps.reset_expression();
    expr::translate_expr(ctx, local, temps, cond)?;
    crate::typeconv::convert_to_bool(local, cond.expr_ty().expect("`for` condition without a resolved type"))?;
    let to_body = local.builder.append(Opcode::Branch { target: InstIndex(0), cond: CondWidth::W8 })?;
    to_end = Some(local.builder.append(Opcode::Jump(InstIndex(0)))?);
    let body_start = local.builder.current_index();
    local.builder.patch_target(to_body, body_start);
  }

  local.flow.push_loop();
  translate_statement(ctx, local, temps, body)?;
  let step_start = local.builder.current_index();
  local.flow.patch_continues(&mut local.builder, step_start);
  if let Some(step) = step {
    translate_expression_statement(ctx, local, temps, Some(step))?;
  }
  local.builder.append(Opcode::Jump(cond_check))?;
  let end = local.builder.current_index();
  if let Some(to_end) = to_end {
    local.builder.patch_target(to_end, end);
  }
  local.flow.pop_loop(&mut local.builder);
  let scope = local.pop_vla_scope();
  emit_vla_scope_dealloc(local, &scope)
}

/// `switch (controlling) body` (`spec.md` §4.9). The controlling value
/// stays on the stack for the whole body — every `case`/`default` branch
/// in the dispatch chain tests it without consuming it, and it's popped
/// exactly once after the chain. The body is emitted before the chain
/// (it's reached first in program order, falling through case labels
/// exactly as written), so the chain is a second pass over it that jumps
/// *backward* into instructions already emitted.
fn translate_switch(ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator, controlling: &AstNode, body: &AstNode) -> TResult<()> {
  temps.reset_expression();
  expr::translate_expr(ctx, local, temps, controlling)?;
  let ctrl_ty = controlling.expr_ty().cloned().expect("switch controlling expression without a resolved type");

  let to_dispatch = local.builder.append(Opcode::Jump(InstIndex(0)))?;
  local.flow.push_switch();
  translate_statement(ctx, local, temps, body)?;
  let off_end = local.builder.append(Opcode::Jump(InstIndex(0)))?;

  let dispatch_start = local.builder.current_index();
  local.builder.patch_target(to_dispatch, dispatch_start);
  let (cases, default_target, break_patches) = local.flow.pop_switch();

  let mut exits = break_patches;
  exits.push(off_end);

  for (label, target) in cases {
    match label {
      CaseLabel::Single(v) => {
        emit_case_cmp(local, &ctrl_ty, v, CmpOp::Eq)?;
        local.builder.append(Opcode::Branch { target, cond: CondWidth::W8 })?;
      }
      CaseLabel::Range(lo, hi) => {
        emit_case_cmp(local, &ctrl_ty, lo, CmpOp::Lt)?;
        let skip_low = local.builder.append(Opcode::Branch { target: InstIndex(0), cond: CondWidth::W8 })?;
        emit_case_cmp(local, &ctrl_ty, hi, CmpOp::Gt)?;
        let skip_high = local.builder.append(Opcode::Branch { target: InstIndex(0), cond: CondWidth::W8 })?;
        local.builder.append(Opcode::Jump(target))?;
        let next_case = local.builder.current_index();
        local.builder.patch_target(skip_low, next_case);
        local.builder.patch_target(skip_high, next_case);
      }
    }
  }

  if let Some(default_target) = default_target {
    local.builder.append(Opcode::Jump(default_target))?;
  } else {
    let to_exit = local.builder.append(Opcode::Jump(InstIndex(0)))?;
    exits.push(to_exit);
  }

  let exit = local.builder.current_index();
  for at in exits {
    local.builder.patch_target(at, exit);
  }
  // Discard the controlling value, restoring the stack depth the switch
  // found on entry.
  local.builder.append(Opcode::VstackPop)?;
  Ok(())
}

/// Duplicates the controlling value and compares it against a case
/// constant, leaving an 8-bit 0/1 on top (mirrors `expr::emit_cmp`'s
/// classify-then-dispatch idiom, specialized to integral switch
/// controlling expressions — C requires the controlling expression and
/// every case label to have integer type after promotion).
fn emit_case_cmp(local: &mut LocalContext, ctrl_ty: &Type, value: i128, op: CmpOp) -> TResult<()> {
  local.builder.append(Opcode::VstackPick(0))?;
  match classify(ctrl_ty) {
    DataModelClass::Int8 | DataModelClass::Int16 | DataModelClass::Int32 | DataModelClass::Int64 => {
      let width = crate::expr::int_width_of(classify(ctrl_ty));
      let sign = if crate::expr::is_signed_ty(ctrl_ty) { Sign::Signed } else { Sign::Unsigned };
      local.builder.append(Opcode::IntConst(value as i64))?;
      local.builder.append(Opcode::IntCmp { width, sign, op })?;
    }
    DataModelClass::BitInt(bits) => {
      let sign = if crate::expr::is_signed_ty(ctrl_ty) { Sign::Signed } else { Sign::Unsigned };
      local.builder.append(Opcode::IntConst(value as i64))?;
      local.builder.append(Opcode::BitIntCmp { bits, sign, op })?;
    }
    other => panic!("switch controlling expression has non-integral class {other:?}"),
  }
  Ok(())
}

fn translate_goto_computed(ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator, target: &AstNode) -> TResult<()> {
  temps.reset_expression();
  expr::translate_expr(ctx, local, temps, target)?;
  local.builder.append(Opcode::JumpIndirect).map(drop)
}

/// `return expr;` / `return;`. The analyzer has already inserted any
/// implicit conversion to the function's return type as an explicit
/// `Cast` node (the AST is read-only and fully converted by the time the
/// translator sees it), so this leaves the value, if any, on the stack
/// right before `FUNCTION_EXIT` without any further normalization here.
fn translate_return(ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator, value: Option<&AstNode>) -> TResult<()> {
  temps.reset_expression();
  if let Some(value) = value {
    expr::translate_expr(ctx, local, temps, value)?;
  }
  local.builder.append(Opcode::FunctionExit).map(drop)
}

fn translate_declaration(ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator, decls: &[crate::types::ast::InitDeclarator]) -> TResult<()> {
  for decl in decls {
    translate_declarator(ctx, local, temps, decl)?;
  }
  Ok(())
}

fn translate_declarator(ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator, decl: &crate::types::ast::InitDeclarator) -> TResult<()> {
  let obj = match &*decl.scoped_id {
    ScopedIdentifier::TypeDefinition(_) | ScopedIdentifier::TypeTag(_) => return Ok(()),
    ScopedIdentifier::Object(obj) => obj,
    other => panic!("declaration's init-declarator resolved to {other:?}, not an object/typedef"),
  };

  // The VLA's own bound is evaluated once, specifically, by
  // `translate_vla_declaration` below; only nested variably-modified
  // dimensions (an inner dimension of a multi-dimensional VLA, or the
  // pointee of a pointer-to-VLA) are evaluated generically here.
  emit_variably_modified_subexpressions(ctx, local, temps, &decl.ty, decl.vla_object.is_some())?;

  match obj.storage {
    StorageClass::Typedef | StorageClass::Constexpr | StorageClass::Unknown => {}
    StorageClass::Static | StorageClass::Extern
    | StorageClass::ThreadLocal | StorageClass::ExternThreadLocal | StorageClass::StaticThreadLocal => {
      // Emitted during module-level layout by the global-scope
      // collaborator; nothing to do at the statement site.
    }
    StorageClass::Auto | StorageClass::Register => {
      if let Some(vla_id) = decl.vla_object {
        translate_vla_declaration(ctx, local, temps, obj, vla_id, &decl.ty)?;
      } else {
        ensure_local_payload(ctx, local, obj, &decl.ty)?;
        if let Some(init) = &decl.initializer {
          lvalue::translate_object_lvalue(ctx, local, obj)?;
          initializer::translate_initializer_at(ctx, local, temps, &decl.ty, init)?;
        }
      }
    }
  }
  Ok(())
}

/// Populates an `auto`/`register` object's `GET_LOCAL` payload the first
/// time it's declared: an independently resolved IR type plus a
/// monotonically increasing slot index (`spec.md` §4.10 "local scope
/// layout"), rather than one aggregate locals-frame type — the latter
/// would require knowing every local up front, but `GET_LOCAL`'s
/// `ir_type` must be known at the point it's emitted and nothing here can
/// retroactively patch it the way a branch target is patched.
pub(crate) fn ensure_local_payload(ctx: &mut TranslatorContext, local: &mut LocalContext, obj: &ObjectIdentifier, ty: &Type) -> TResult<()> {
  if obj.payload.ir_type.get().is_some() {
    return Ok(());
  }
  let target = ctx.target.clone();
  let layout = layout_oracle::resolve_layout(ty, &target, &mut ctx.module, LayoutHome::Local)?;
  let slot = local.next_local_slot();
  obj.payload.ir_type.set(Some(layout.layout.ir_type));
  obj.payload.root_layout_value.set(Some(slot));
  Ok(())
}

/// VLA declaration (`spec.md` §4.9 "VLA declaration"). `obj`'s own
/// storage is the synthetic two-field `{array_ptr, array_size}` record,
/// not the array itself — `lvalue::translate_object_lvalue` derefs
/// through `array_ptr` for *later* reads, but here the raw record address
/// is what needs writing, so this bypasses it and emits `GET_LOCAL`
/// directly.
fn translate_vla_declaration(
  ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator,
  obj: &ObjectIdentifier, vla_id: ObjectId, ty: &Type,
) -> TResult<()> {
  let (element, count_expr) = match &**ty {
    TypeKind::Array { element, len: ArrayLen::VariableLength(count) } => (element.clone(), count.clone()),
    other => panic!("VLA declarator's type isn't a variable-length array: {other:?}"),
  };

  ensure_local_payload(ctx, local, obj, ty)?;

  let target = ctx.target.clone();
  let record_layout = layout_oracle::resolve_layout(ty, &target, &mut ctx.module, LayoutHome::Local)?;
  let vla_fields = record_layout.layout.vla.expect("VLA declarator's type resolved without a VlaFields record");

  local.register_vla(VlaAllocation {
    id: vla_id,
    ir_type: obj.payload.ir_type.get().expect("VLA record payload not populated before register_vla"),
    layout_value: obj.payload.root_layout_value.get().unwrap_or(0),
    array_ptr_offset: vla_fields.array_ptr_offset,
  });
  let element_size = layout_oracle::size_of_complete(&element)?;
  let align = layout_oracle::align_of(&element)?;

  // [count]
  temps.reset_expression();
  expr::translate_expr(ctx, local, temps, &count_expr)?;
  // [size]
  local.builder.append(Opcode::UintConst(element_size))?;
  local.builder.append(Opcode::IntMul(crate::types::ty::IntWidth::W64, Sign::Unsigned))?;
  // [size, size]
  local.builder.append(Opcode::VstackPick(0))?;
  // [size, data_addr]
  local.builder.append(Opcode::Alloca { align })?;

  // store data_addr into array_ptr
  emit_vla_record_addr(local, obj, vla_fields.array_ptr_offset)?;
  local.builder.append(Opcode::VstackExchange(1))?;
  local.builder.append(Opcode::IntStore { width: crate::types::ty::IntWidth::W64, flags: Default::default() })?;

  // store size into array_size
  emit_vla_record_addr(local, obj, vla_fields.array_size_offset)?;
  local.builder.append(Opcode::VstackExchange(1))?;
  local.builder.append(Opcode::IntStore { width: crate::types::ty::IntWidth::W64, flags: Default::default() })?;

  Ok(())
}

/// Frees every VLA allocated directly in a scope, in reverse declaration
/// order, on the way out of that scope (`spec.md` §3 invariant (iv)
/// "deallocated on scope exit"). Each allocation's `array_ptr` field was
/// written once, at declaration time, and never reassigned, so reloading
/// it here recovers the exact address `Alloca` returned.
fn emit_vla_scope_dealloc(local: &mut LocalContext, scope: &crate::context::VlaScope) -> TResult<()> {
  for allocation in scope.allocations.iter().rev() {
    local.builder.append(Opcode::GetLocal { ir_type: allocation.ir_type, layout_value: allocation.layout_value })?;
    if allocation.array_ptr_offset != 0 {
      local.builder.append(Opcode::UintConst(u64::from(allocation.array_ptr_offset)))?;
      local.builder.append(Opcode::PointerAdd)?;
    }
    local.builder.append(Opcode::IntLoad { width: crate::types::ty::IntWidth::W64, flags: Default::default() })?;
    local.builder.append(Opcode::Dealloca)?;
  }
  Ok(())
}

fn emit_vla_record_addr(local: &mut LocalContext, obj: &ObjectIdentifier, offset: u32) -> TResult<()> {
  let ir_type = obj.payload.ir_type.get().expect("VLA record payload not populated before address emission");
  let layout_value = obj.payload.root_layout_value.get().unwrap_or(0);
  local.builder.append(Opcode::GetLocal { ir_type, layout_value })?;
  if offset != 0 {
    local.builder.append(Opcode::UintConst(u64::from(offset)))?;
    local.builder.append(Opcode::PointerAdd)?;
  }
  Ok(())
}

/// Evaluates every variably-modified dimension reachable from `ty`, in
/// order, popping each result (`spec.md` §4.9, last bullet). When `ty`
/// is itself the declarator's own top-level VLA type, its outer
/// dimension is skipped here — `translate_vla_declaration` evaluates it
/// once, specifically, for the size computation; evaluating it again
/// here would run a bound expression with side effects twice.
pub(crate) fn emit_variably_modified_subexpressions(ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator, ty: &Type, skip_top_vla: bool) -> TResult<()> {
  let mut exprs = Vec::new();
  collect_vm_exprs(ty, skip_top_vla, &mut exprs);
  for e in exprs {
    expr::translate_expr(ctx, local, temps, &e)?;
    if !matches!(e.expr_ty().map(|t| &**t), Some(TypeKind::Void)) {
      local.builder.append(Opcode::VstackPop)?;
    }
  }
  Ok(())
}

fn collect_vm_exprs(ty: &Type, skip_top_vla: bool, out: &mut Vec<Expr>) {
  match &**ty {
    TypeKind::Array { element, len } => {
      collect_vm_exprs(element, false, out);
      match len {
        ArrayLen::Expression(e) => out.push(e.clone()),
        ArrayLen::VariableLength(e) if !skip_top_vla => out.push(e.clone()),
        _ => {}
      }
    }
    TypeKind::Pointer { pointee, .. } => collect_vm_exprs(pointee, false, out),
    TypeKind::Qualified { base, .. } => collect_vm_exprs(base, false, out),
    _ => {}
  }
}
