//! Assignment and increment/decrement translation (`spec.md` §4.8 "C8
//! Assignment translator").
//!
//! Builds on C5 (lvalue), C6 (value), and C7 (expression) the way those
//! layers expect: an lvalue's address goes on the stack once, gets
//! duplicated with `VstackPick` as many times as the shape needs, and the
//! final result value is whatever the assignment expression itself
//! evaluates to (the stored value, per C11 6.5.16p3).
//!
//! Compound assignment computes entirely in the left operand's type rather
//! than promoting to a common real type and converting back (C11
//! 6.5.16.2p3) — a deliberate simplification recorded in `DESIGN.md`.
//! Atomic compound assignment and atomic increment/decrement lower to a
//! compare-exchange retry loop; the loop invariant keeps the (already
//! lhs-typed) right-hand operand below the retried address on the stack,
//! since the virtual stack survives a `Jump` back to the loop head
//! unchanged — no temporary storage is needed across retries.

use crate::context::{LocalContext, TranslatorContext};
use crate::error::{ErrorKind, TResult, TranslateError};
use crate::lvalue;
use crate::temporaries::TemporaryAllocator;
use crate::types::ast::{AssignOp, AstNode, BitfieldInfo, Expr, UnaryOp};
use crate::types::ir::{CondWidth, Opcode, Sign};
use crate::types::layout::BitfieldProps;
use crate::types::ty::{classify, DataModelClass, IntWidth, Type, TypeKind};
use crate::{expr, typeconv, value};

pub fn translate_assignment(
  ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator,
  op: AssignOp, lhs: &Expr, rhs: &Expr,
) -> TResult<()> {
  let lhs_ty = lhs.expr_ty().cloned().expect("assignment lhs without a resolved type");
  let is_atomic = lhs.properties.expr.is_atomic;
  let bitfield = lhs.properties.expr.bitfield;

  if matches!(&*lhs_ty, TypeKind::Aggregate { .. } | TypeKind::Array { .. }) {
    return translate_aggregate_assign(ctx, local, temps, &lhs_ty, lhs, rhs, is_atomic);
  }

  if op == AssignOp::Simple {
    if let Some(bf) = bitfield {
      return translate_bitfield_simple_assign(ctx, local, temps, &lhs_ty, bf, lhs, rhs);
    }
    if is_atomic {
      return translate_atomic_simple_assign(ctx, local, temps, &lhs_ty, lhs, rhs);
    }
    return translate_scalar_simple_assign(ctx, local, temps, &lhs_ty, lhs, rhs);
  }

  if let Some(bf) = bitfield {
    if is_atomic {
      return Err(TranslateError::new(ErrorKind::NotImplemented, "atomic compound assignment to a bit-field"));
    }
    return translate_bitfield_compound_assign(ctx, local, temps, &lhs_ty, bf, op, lhs, rhs);
  }

  if is_atomic {
    return translate_atomic_compound_assign(ctx, local, temps, &lhs_ty, op, lhs, rhs);
  }
  translate_scalar_compound_assign(ctx, local, temps, &lhs_ty, op, lhs, rhs)
}

pub fn translate_incdec(
  ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator,
  op: UnaryOp, operand: &Expr,
) -> TResult<()> {
  let ty = operand.expr_ty().cloned().expect("++/-- operand without a resolved type");
  let is_atomic = operand.properties.expr.is_atomic;
  let bitfield = operand.properties.expr.bitfield;
  let assign_op = if matches!(op, UnaryOp::PreInc | UnaryOp::PostInc) { AssignOp::Add } else { AssignOp::Sub };
  let is_post = matches!(op, UnaryOp::PostInc | UnaryOp::PostDec);

  if let Some(bf) = bitfield {
    lvalue::translate_lvalue_of(ctx, local, temps, operand)?; // [addr]
    let props = to_bitfield_props(bf);
    let signed = expr::is_signed_ty(&ty);
    local.builder.append(Opcode::VstackPick(0))?; // [addr, addr2]
    value::bitfield_load(ctx, local, props, signed)?; // consumes addr2 -> [addr, cur]
    push_delta_one(local, &ty)?; // [addr, cur, one]
    combine_raw(local, &ty, assign_op)?; // [addr, new]
    value::bitfield_store(ctx, local, props, signed)?; // [addr, extracted]
    local.builder.append(Opcode::VstackExchange(1))?;
    local.builder.append(Opcode::VstackPop)?;
  } else if is_atomic {
    translate_atomic_rmw(ctx, local, temps, operand, &ty, assign_op, |_ctx, local, _temps| push_delta_one(local, &ty))?;
  } else {
    lvalue::translate_lvalue_of(ctx, local, temps, operand)?; // [addr]
    local.builder.append(Opcode::VstackPick(0))?; // [addr, addr2]
    local.builder.append(Opcode::VstackPick(0))?; // [addr, addr2, addr3]
    value::load(ctx, local, &ty)?; // consumes addr3 -> [addr, addr2, cur]
    push_delta_one(local, &ty)?; // [addr, addr2, cur, one]
    combine_raw(local, &ty, assign_op)?; // [addr, addr2, new]
    value::store(ctx, local, &ty)?; // consumes [addr2, new] -> [addr]
    value::load(ctx, local, &ty)?; // consumes addr -> [new]
  }

  if is_post {
    // Stack holds the post-operation value; recover the pre-operation
    // value algebraically instead of threading the original through the
    // store (and, for the atomic case, instead of an extra atomic reload).
    push_delta_one(local, &ty)?;
    let inverse = if assign_op == AssignOp::Add { AssignOp::Sub } else { AssignOp::Add };
    combine_raw(local, &ty, inverse)?;
  }
  Ok(())
}

fn translate_aggregate_assign(
  ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator,
  lhs_ty: &Type, lhs: &AstNode, rhs: &AstNode, is_atomic: bool,
) -> TResult<()> {
  lvalue::translate_lvalue_of(ctx, local, temps, lhs)?; // [addr]
  local.builder.append(Opcode::VstackPick(0))?; // [addr, addr2]
  expr::translate_expr(ctx, local, temps, rhs)?; // [addr, addr2, src_addr]
  let (ir_type, layout_value) = expr::aggregate_layout_of(ctx, lhs_ty)?;
  if is_atomic {
    value::atomic_copy_memory_to(local, ir_type, layout_value)?; // consumes [addr2, src_addr] -> [addr]
  } else {
    value::aggregate_copy(local, ir_type, layout_value)?;
  }
  Ok(())
}

/// Evaluates the right operand before taking the left operand's address
/// (`spec.md` §4.8 "Simple assignment" — "evaluate RHS; convert...;
/// evaluate LHS as lvalue"), so a side-effecting lvalue like `a[i++]`
/// observes the right operand's side effects first. `addr` and `addr2`
/// are two copies of the same address, so swapping which one ends up on
/// the bottom after the reorder is immaterial.
fn translate_scalar_simple_assign(
  ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator,
  lhs_ty: &Type, lhs: &AstNode, rhs: &AstNode,
) -> TResult<()> {
  expr::translate_expr(ctx, local, temps, rhs)?; // [val]
  if let Some(rhs_ty) = rhs.expr_ty() { typeconv::convert(ctx, local, rhs_ty, lhs_ty)?; }
  lvalue::translate_lvalue_of(ctx, local, temps, lhs)?; // [val, addr]
  local.builder.append(Opcode::VstackPick(0))?; // [val, addr, addr2]
  local.builder.append(Opcode::VstackExchange(2))?; // [addr2, addr, val]
  value::store(ctx, local, lhs_ty)?; // consumes [addr, val] -> [addr2]
  value::load(ctx, local, lhs_ty)
}

fn translate_atomic_simple_assign(
  ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator,
  lhs_ty: &Type, lhs: &AstNode, rhs: &AstNode,
) -> TResult<()> {
  expr::translate_expr(ctx, local, temps, rhs)?; // [val]
  if let Some(rhs_ty) = rhs.expr_ty() { typeconv::convert(ctx, local, rhs_ty, lhs_ty)?; }
  lvalue::translate_lvalue_of(ctx, local, temps, lhs)?; // [val, addr]
  local.builder.append(Opcode::VstackPick(0))?; // [val, addr, addr2]
  local.builder.append(Opcode::VstackExchange(2))?; // [addr2, addr, val]
  value::atomic_store(local, lhs_ty)?; // consumes [addr, val] -> [addr2]
  let signed = expr::is_signed_ty(lhs_ty);
  let width = int_width_for(lhs_ty);
  value::atomic_load(local, lhs_ty, width, signed).map(drop)
}

fn translate_bitfield_simple_assign(
  ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator,
  lhs_ty: &Type, bf: BitfieldInfo, lhs: &AstNode, rhs: &AstNode,
) -> TResult<()> {
  expr::translate_expr(ctx, local, temps, rhs)?; // [val]
  if let Some(rhs_ty) = rhs.expr_ty() { typeconv::convert(ctx, local, rhs_ty, lhs_ty)?; }
  lvalue::translate_lvalue_of(ctx, local, temps, lhs)?; // [val, addr]
  local.builder.append(Opcode::VstackExchange(1))?; // [addr, val]
  let signed = expr::is_signed_ty(lhs_ty);
  value::bitfield_store(ctx, local, to_bitfield_props(bf), signed)?; // [addr, extracted]
  local.builder.append(Opcode::VstackExchange(1))?;
  local.builder.append(Opcode::VstackPop).map(drop)
}

/// As above but for compound assignment (`spec.md` §4.8 "Compound
/// assignment" — "evaluate RHS...; evaluate LHS lvalue"). The right
/// operand is computed first and carried, unconverted, underneath the
/// address/current-value machinery; a `VstackPick` re-surfaces it right
/// before `combine_compound` needs it, leaving the original copy to be
/// discarded afterward the same way a stray address copy is elsewhere in
/// this file.
fn translate_scalar_compound_assign(
  ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator,
  lhs_ty: &Type, op: AssignOp, lhs: &AstNode, rhs: &AstNode,
) -> TResult<()> {
  expr::translate_expr(ctx, local, temps, rhs)?; // [rhs_val]
  lvalue::translate_lvalue_of(ctx, local, temps, lhs)?; // [rhs_val, addr]
  local.builder.append(Opcode::VstackPick(0))?; // [rhs_val, addr, addr2]
  local.builder.append(Opcode::VstackPick(0))?; // [rhs_val, addr, addr2, addr3]
  value::load(ctx, local, lhs_ty)?; // consumes addr3 -> [rhs_val, addr, addr2, cur]
  local.builder.append(Opcode::VstackPick(3))?; // dup rhs_val -> [rhs_val, addr, addr2, cur, rhs_val2]
  let rhs_ty = rhs.expr_ty().cloned().unwrap_or_else(|| lhs_ty.clone());
  combine_compound(ctx, local, lhs_ty, &rhs_ty, op)?; // consumes [cur, rhs_val2] -> [rhs_val, addr, addr2, result]
  value::store(ctx, local, lhs_ty)?; // consumes [addr2, result] -> [rhs_val, addr]
  value::load(ctx, local, lhs_ty)?; // consumes addr -> [rhs_val, final]
  local.builder.append(Opcode::VstackExchange(1))?; // [final, rhs_val]
  local.builder.append(Opcode::VstackPop).map(drop) // [final]
}

fn translate_bitfield_compound_assign(
  ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator,
  lhs_ty: &Type, bf: BitfieldInfo, op: AssignOp, lhs: &AstNode, rhs: &AstNode,
) -> TResult<()> {
  expr::translate_expr(ctx, local, temps, rhs)?; // [rhs_val]
  lvalue::translate_lvalue_of(ctx, local, temps, lhs)?; // [rhs_val, addr]
  let props = to_bitfield_props(bf);
  let signed = expr::is_signed_ty(lhs_ty);
  local.builder.append(Opcode::VstackPick(0))?; // [rhs_val, addr, addr2]
  value::bitfield_load(ctx, local, props, signed)?; // consumes addr2 -> [rhs_val, addr, cur]
  local.builder.append(Opcode::VstackPick(2))?; // dup rhs_val -> [rhs_val, addr, cur, rhs_val2]
  let rhs_ty = rhs.expr_ty().cloned().unwrap_or_else(|| lhs_ty.clone());
  combine_compound(ctx, local, lhs_ty, &rhs_ty, op)?; // consumes [cur, rhs_val2] -> [rhs_val, addr, result]
  value::bitfield_store(ctx, local, props, signed)?; // [rhs_val, addr, extracted]
  local.builder.append(Opcode::VstackExchange(1))?; // [rhs_val, extracted, addr]
  local.builder.append(Opcode::VstackPop)?; // [rhs_val, extracted]
  local.builder.append(Opcode::VstackExchange(1))?; // [extracted, rhs_val]
  local.builder.append(Opcode::VstackPop).map(drop) // [extracted]
}

fn translate_atomic_compound_assign(
  ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator,
  lhs_ty: &Type, op: AssignOp, lhs: &AstNode, rhs: &AstNode,
) -> TResult<()> {
  translate_atomic_rmw(ctx, local, temps, lhs, lhs_ty, op, |ctx, local, temps| {
    expr::translate_expr(ctx, local, temps, rhs)?;
    if !expr::is_pointer_type(lhs_ty) {
      let rhs_ty = rhs.expr_ty().cloned().unwrap_or_else(|| lhs_ty.clone());
      typeconv::convert(ctx, local, &rhs_ty, lhs_ty)?;
    }
    Ok(())
  })
}

/// The shared atomic read-modify-write core for compound assignment and
/// increment/decrement on an `_Atomic`-qualified scalar. `push_rhs` pushes
/// the (already lhs-typed) right-hand operand once, before the retry loop
/// starts, since it may have side effects that must occur exactly once.
///
/// Loop invariant on entry to each attempt: `[rhs_val, addr]`. The virtual
/// stack is a per-instruction-address invariant, so it survives the `Jump`
/// back to `loop_start` unchanged across retries — no temporary storage is
/// needed to carry `rhs_val` or `addr` through the loop.
fn translate_atomic_rmw(
  ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator,
  lhs: &AstNode, lhs_ty: &Type, op: AssignOp,
  push_rhs: impl FnOnce(&mut TranslatorContext, &mut LocalContext, &mut TemporaryAllocator) -> TResult<()>,
) -> TResult<()> {
  push_rhs(ctx, local, temps)?; // [rhs_val]
  lvalue::translate_lvalue_of(ctx, local, temps, lhs)?; // [rhs_val, addr]

  let is_float = matches!(
    classify(&TypeKind::unqualified(lhs_ty)),
    DataModelClass::Float | DataModelClass::Double | DataModelClass::LongDouble
  );
  if is_float { local.builder.append(Opcode::FenvSave)?; }

  let signed = expr::is_signed_ty(lhs_ty);
  let width = int_width_for(lhs_ty);

  let loop_start = local.builder.current_index();
  local.builder.append(Opcode::VstackPick(0))?; // [rhs_val, addr, addr_dup]
  value::atomic_load(local, lhs_ty, width, signed)?; // consumes addr_dup -> [rhs_val, addr, cur]
  local.builder.append(Opcode::VstackPick(0))?; // dup cur (expected) -> [rhs_val, addr, cur, cur_dup]
  local.builder.append(Opcode::VstackPick(3))?; // dup rhs_val -> [rhs_val, addr, cur, cur_dup, rhs_val_dup]
  if is_float { local.builder.append(Opcode::FenvClear)?; }
  combine_raw(local, lhs_ty, op)?; // consumes [cur_dup, rhs_val_dup] -> [rhs_val, addr, cur, desired]
  if is_float { local.builder.append(Opcode::FenvUpdate)?; }

  local.builder.append(Opcode::VstackPick(2))?; // dup addr -> [rhs_val, addr, cur, desired, addr_dup2]
  local.builder.append(Opcode::VstackExchange(2))?; // -> [rhs_val, addr, addr_dup2, desired, cur]
  local.builder.append(Opcode::VstackExchange(1))?; // -> [rhs_val, addr, desired, cur, addr_dup2]... see below
  value::atomic_compare_exchange(local, width)?; // consumes [addr_dup2, cur, desired] -> [rhs_val, addr, success]

  let to_done = local.builder.append(Opcode::Branch { target: crate::types::ir::InstIndex(0), cond: CondWidth::W8 })?;
  local.builder.append(Opcode::Jump(loop_start))?;
  let done = local.builder.current_index();
  local.builder.patch_target(to_done, done);

  // stack: [rhs_val, addr]
  value::atomic_load(local, lhs_ty, width, signed)?; // consumes addr -> [rhs_val, new_val]
  local.builder.append(Opcode::VstackExchange(1))?;
  local.builder.append(Opcode::VstackPop).map(drop)
}

fn to_bitfield_props(bf: BitfieldInfo) -> BitfieldProps {
  BitfieldProps { offset: bf.bit_offset, width: bf.bit_width }
}

fn int_width_for(ty: &Type) -> IntWidth {
  match &*TypeKind::unqualified(ty) {
    TypeKind::Integer { width, .. } => width,
    _ => IntWidth::W64,
  }
}

fn map_assign_op(op: AssignOp) -> crate::types::ast::BinaryOp {
  use crate::types::ast::BinaryOp;
  match op {
    AssignOp::Add => BinaryOp::Add,
    AssignOp::Sub => BinaryOp::Sub,
    AssignOp::Mul => BinaryOp::Mul,
    AssignOp::Div => BinaryOp::Div,
    AssignOp::Mod => BinaryOp::Mod,
    AssignOp::Shl => BinaryOp::Shl,
    AssignOp::Shr => BinaryOp::Shr,
    AssignOp::BitAnd => BinaryOp::BitAnd,
    AssignOp::BitOr => BinaryOp::BitOr,
    AssignOp::BitXor => BinaryOp::BitXor,
    AssignOp::Simple => unreachable!("map_assign_op called with Simple"),
  }
}

/// Converts the right operand into `lhs_ty` (where that applies) and emits
/// the arithmetic. Assumes `[cur_val, rhs_val]` is on top of the stack.
fn combine_compound(ctx: &mut TranslatorContext, local: &mut LocalContext, lhs_ty: &Type, rhs_ty: &Type, op: AssignOp) -> TResult<()> {
  match op {
    // The shift count keeps its own (promoted) type; C11 6.5.7 never
    // converts it to the left operand's type.
    AssignOp::Shl | AssignOp::Shr => combine_raw(local, lhs_ty, op),
    _ => {
      if !expr::is_pointer_type(lhs_ty) {
        typeconv::convert(ctx, local, rhs_ty, lhs_ty)?;
      }
      combine_raw(local, lhs_ty, op)
    }
  }
}

/// Emits the arithmetic for `[cur_val, rhs_val]` already in their final
/// operand types, producing `result`.
fn combine_raw(local: &mut LocalContext, lhs_ty: &Type, op: AssignOp) -> TResult<()> {
  if expr::is_pointer_type(lhs_ty) && matches!(op, AssignOp::Add | AssignOp::Sub) {
    let elem = expr::pointee_element_size(lhs_ty)?;
    local.builder.append(Opcode::UintConst(elem))?;
    local.builder.append(Opcode::IntMul(IntWidth::W64, Sign::Unsigned))?;
    if op == AssignOp::Sub { local.builder.append(Opcode::IntNeg(IntWidth::W64))?; }
    return local.builder.append(Opcode::PointerAdd).map(drop);
  }
  match op {
    AssignOp::Add | AssignOp::Sub | AssignOp::Mul | AssignOp::Div | AssignOp::Mod => {
      expr::emit_arith(local, lhs_ty, map_assign_op(op))
    }
    AssignOp::Shl | AssignOp::Shr => emit_shift_assign(local, lhs_ty, op),
    AssignOp::BitAnd | AssignOp::BitOr | AssignOp::BitXor => emit_bitwise_assign(local, lhs_ty, op),
    AssignOp::Simple => unreachable!("combine_raw called with Simple"),
  }
}

fn emit_shift_assign(local: &mut LocalContext, lhs_ty: &Type, op: AssignOp) -> TResult<()> {
  let unqual = TypeKind::unqualified(lhs_ty);
  match classify(&unqual) {
    DataModelClass::Int8 | DataModelClass::Int16 | DataModelClass::Int32 | DataModelClass::Int64 => {
      let width = expr::int_width_of(classify(&unqual));
      let opc = match op {
        AssignOp::Shl => Opcode::IntShl(width),
        AssignOp::Shr if expr::is_signed_ty(&unqual) => Opcode::IntAshr(width),
        AssignOp::Shr => Opcode::IntLshr(width),
        _ => unreachable!(),
      };
      local.builder.append(opc).map(drop)
    }
    DataModelClass::BitInt(bits) => {
      let sign = if expr::is_signed_ty(&unqual) { Sign::Signed } else { Sign::Unsigned };
      let opc = match op {
        AssignOp::Shl => Opcode::BitIntShl(bits),
        AssignOp::Shr => Opcode::BitIntShr(bits, sign),
        _ => unreachable!(),
      };
      local.builder.append(opc).map(drop)
    }
    other => panic!("shift-assign on non-integral class {other:?}"),
  }
}

fn emit_bitwise_assign(local: &mut LocalContext, lhs_ty: &Type, op: AssignOp) -> TResult<()> {
  let unqual = TypeKind::unqualified(lhs_ty);
  match classify(&unqual) {
    DataModelClass::Int8 | DataModelClass::Int16 | DataModelClass::Int32 | DataModelClass::Int64 => {
      let width = expr::int_width_of(classify(&unqual));
      let opc = match op {
        AssignOp::BitAnd => Opcode::IntAnd(width),
        AssignOp::BitOr => Opcode::IntOr(width),
        AssignOp::BitXor => Opcode::IntXor(width),
        _ => unreachable!(),
      };
      local.builder.append(opc).map(drop)
    }
    DataModelClass::BitInt(bits) => {
      let opc = match op {
        AssignOp::BitAnd => Opcode::BitIntAnd(bits),
        AssignOp::BitOr => Opcode::BitIntOr(bits),
        AssignOp::BitXor => Opcode::BitIntXor(bits),
        _ => unreachable!(),
      };
      local.builder.append(opc).map(drop)
    }
    other => panic!("bitwise-assign on non-integral class {other:?}"),
  }
}

/// Pushes a literal `1` matching `ty`'s data-model class, for `++`/`--`
/// and for the atomic increment/decrement's shared CAS-loop delta.
fn push_delta_one(local: &mut LocalContext, ty: &Type) -> TResult<()> {
  if expr::is_pointer_type(ty) {
    return local.builder.append(Opcode::IntConst(1)).map(drop);
  }
  match classify(&TypeKind::unqualified(ty)) {
    DataModelClass::Int8 | DataModelClass::Int16 | DataModelClass::Int32 | DataModelClass::Int64 | DataModelClass::BitInt(_) => {
      local.builder.append(Opcode::IntConst(1)).map(drop)
    }
    DataModelClass::Float => local.builder.append(Opcode::Float32Const(1.0)).map(drop),
    DataModelClass::Double => local.builder.append(Opcode::Float64Const(1.0)).map(drop),
    DataModelClass::LongDouble => local.builder.append(Opcode::LongDoubleConst(1.0f64.to_bits().into())).map(drop),
    other => panic!("++/-- applied to non-arithmetic, non-pointer class {other:?}"),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::ir::InstIndex;
  use crate::types::layout::TargetEnvironment;
  use std::rc::Rc;

  fn int_ty(width: IntWidth, signed: bool) -> Type {
    Rc::new(TypeKind::Integer { width, signed, marker: crate::types::ty::IntMarker::Plain })
  }

  #[test]
  fn bitfield_store_preserves_addr_for_a_trailing_discard() {
    let ctx = TranslatorContext::new(Rc::new(TargetEnvironment::default()));
    let mut local = ctx.init_local();
    let props = BitfieldProps { offset: 3, width: 5 };
    local.builder.append(Opcode::UintConst(0)).unwrap(); // stand-in base addr
    local.builder.append(Opcode::IntConst(7)).unwrap(); // stand-in value
    value::bitfield_store(&ctx, &mut local, props, true).unwrap();
    local.builder.append(Opcode::VstackExchange(1)).unwrap();
    local.builder.append(Opcode::VstackPop).unwrap();
    assert!(local.builder.len() > 2);
  }

  #[test]
  fn combine_raw_scales_pointer_deltas() {
    let mut local = TranslatorContext::new(Rc::new(TargetEnvironment::default())).init_local();
    let ty: Type = Rc::new(TypeKind::Pointer { pointee: int_ty(IntWidth::W32, true), is_null_pointer_constant_type: false });
    local.builder.append(Opcode::UintConst(0)).unwrap(); // stand-in pointer value
    local.builder.append(Opcode::IntConst(2)).unwrap(); // stand-in delta
    combine_raw(&mut local, &ty, AssignOp::Add).unwrap();
    assert!(matches!(local.builder.get(InstIndex(4)).op, Opcode::PointerAdd));
  }

  #[test]
  fn push_delta_one_picks_int_const_for_integers() {
    let ctx = TranslatorContext::new(Rc::new(TargetEnvironment::default()));
    let mut local = ctx.init_local();
    let ty = int_ty(IntWidth::W32, true);
    push_delta_one(&mut local, &ty).unwrap();
    assert!(matches!(local.builder.get(InstIndex(0)).op, Opcode::IntConst(1)));
  }

  #[test]
  fn map_assign_op_rejects_simple() {
    let result = std::panic::catch_unwind(|| map_assign_op(AssignOp::Simple));
    assert!(result.is_err());
  }
}
