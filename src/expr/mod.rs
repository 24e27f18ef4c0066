//! Expression translator (`spec.md` §4.7 "C7 Expression translator").
//!
//! A visitor over [`AstKind`]'s expression arms. Every successful call
//! leaves exactly one operand on the virtual stack (invariant (i)),
//! except the handful of explicitly-void cases
//! (`*(void*)p`, a `void`-typed comma/cast).
//!
//! Conditional control flow (`&&`/`||`/`?:`) assumes [`Opcode::Branch`]
//! pops an N-bit condition and jumps to `target` when it is nonzero; the
//! opcode itself doesn't encode polarity, so this is recorded here once
//! rather than re-derived at each call site.

mod call;

use crate::context::{LocalContext, TranslatorContext};
use crate::error::{ErrorKind, TResult, TranslateError};
use crate::temporaries::TemporaryAllocator;
use crate::types::ast::{AstKind, AstNode, BinaryOp, Builtin, UnaryOp};
use crate::types::ir::{CmpOp, Opcode, Sign};
use crate::types::scope::ScopedIdentifier;
use crate::types::scope::StorageClass;
use crate::types::ty::{classify, types_compatible, DataModelClass, FloatKind, IntWidth, Type, TypeKind};
use crate::{layout_oracle, lvalue, typeconv, value};

pub use call::translate_call;

/// Translates an expression node, leaving its value (or address, for the
/// handful of lvalue-shaped exceptions below) on the stack.
pub fn translate_expr(ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator, node: &AstNode) -> TResult<()> {
  match &node.kind {
    AstKind::IntConstant(lit) => translate_int_constant(local, *lit),
    AstKind::FloatConstant(lit) => translate_float_constant(local, *lit),
    AstKind::ComplexConstant(re, im) => {
      translate_float_constant(local, *re)?;
      translate_float_constant(local, *im)?;
      let kind = complex_kind_of(node)?;
      local.builder.append(Opcode::ComplexFromParts(kind)).map(drop)
    }
    AstKind::BitPreciseConstant { bits, value: words, .. } => {
      local.builder.append(Opcode::UintConst(words.first().copied().unwrap_or(0))).map(drop)?;
      let _ = bits;
      Ok(())
    }
    AstKind::CharConstant(c) => local.builder.append(Opcode::IntConst(i64::from(*c))).map(drop),
    AstKind::BoolConstant(b) => local.builder.append(Opcode::UintConst(u64::from(*b))).map(drop),
    AstKind::StringLiteral { encoding, bytes } => translate_string_literal(ctx, local, *encoding, bytes),
    AstKind::Identifier(_) => translate_identifier(ctx, local, temps, node),
    AstKind::GenericSelection { resolved_arm } => translate_expr(ctx, local, temps, resolved_arm),
    AstKind::CompoundLiteral { .. } => lvalue::translate_lvalue_of(ctx, local, temps, node),
    AstKind::Cast { target, operand } => {
      translate_expr(ctx, local, temps, operand)?;
      if let Some(src) = operand.expr_ty() { typeconv::convert(ctx, local, src, target)?; }
      Ok(())
    }
    AstKind::ArraySubscript { .. } | AstKind::Member { .. } => {
      lvalue::translate_lvalue_of(ctx, local, temps, node)?;
      load_unless_address_only(ctx, local, node)
    }
    AstKind::Call { callee, args } => call::translate_call(ctx, local, temps, node, callee, args),
    AstKind::Unary { op, operand } => translate_unary(ctx, local, temps, node, *op, operand),
    AstKind::Binary { op, lhs, rhs } => translate_binary(ctx, local, temps, node, *op, lhs, rhs),
    AstKind::Ternary { cond, then_branch, else_branch } => translate_ternary(ctx, local, temps, cond, then_branch, else_branch),
    AstKind::Comma { lhs, rhs } => {
      translate_expr(ctx, local, temps, lhs)?;
      if !matches!(lhs.expr_ty().map(|t| &**t), Some(TypeKind::Void)) {
        local.builder.append(Opcode::VstackPop)?;
      }
      translate_expr(ctx, local, temps, rhs)
    }
    AstKind::Assignment { op, lhs, rhs } => crate::assignment::translate_assignment(ctx, local, temps, *op, lhs, rhs),
    AstKind::BuiltinCall(builtin) => translate_builtin(ctx, local, temps, builtin),
    AstKind::LabelAddress(_) => {
      let point = node.properties.flow.expect("&&label without a resolved flow point");
      reject_label_address_past_vla(node)?;
      local.flow.emit_label_address(&mut local.builder, point)
    }
    AstKind::StatementExpression { items } => translate_statement_expression(ctx, local, temps, items),
    other => panic!("node {other:?} is not an expression-translatable node"),
  }
}

fn translate_int_constant(local: &mut LocalContext, lit: crate::types::ast::IntLiteral) -> TResult<()> {
  use crate::types::ast::IntLiteral;
  let op = match lit {
    IntLiteral::I32(v) => Opcode::IntConst(i64::from(v)),
    IntLiteral::U32(v) => Opcode::UintConst(u64::from(v)),
    IntLiteral::I64(v) => Opcode::IntConst(v),
    IntLiteral::U64(v) => Opcode::UintConst(v),
    IntLiteral::Char(v) => Opcode::IntConst(i64::from(v)),
    IntLiteral::Bool(v) => Opcode::UintConst(u64::from(v)),
  };
  local.builder.append(op).map(drop)
}

fn translate_float_constant(local: &mut LocalContext, lit: crate::types::ast::FloatLiteral) -> TResult<()> {
  use crate::types::ast::FloatLiteral;
  let op = match lit {
    FloatLiteral::F32(v) => Opcode::Float32Const(v),
    FloatLiteral::F64(v) => Opcode::Float64Const(v),
    FloatLiteral::LongDouble(v) => Opcode::LongDoubleConst(u128::from(v.to_bits())),
  };
  local.builder.append(op).map(drop)
}

fn complex_kind_of(node: &AstNode) -> TResult<FloatKind> {
  match node.expr_ty().map(|t| &**t) {
    Some(TypeKind::Complex(kind)) => Ok(*kind),
    _ => Err(TranslateError::new(ErrorKind::TypeUnsupported, "complex constant without a resolved complex type")),
  }
}

fn translate_string_literal(ctx: &mut TranslatorContext, local: &mut LocalContext, encoding: u8, bytes: &[u8]) -> TResult<()> {
  let text = std::str::from_utf8(bytes).unwrap_or("");
  let id = ctx.module.intern_string(encoding, text);
  let sym = crate::symbol::intern(&format!("__string_literal_{}", id.0));
  local.builder.append(Opcode::GetGlobal(sym)).map(drop)
}

fn translate_identifier(ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator, node: &AstNode) -> TResult<()> {
  let scoped = node.properties.expr.scoped_id.clone()
    .expect("identifier translated without a resolved scoped-id (invariant v)");
  match &*scoped {
    ScopedIdentifier::Object(obj) => {
      lvalue::translate_object_lvalue(ctx, local, obj)?;
      if node.properties.expr.is_atomic {
        let signed = matches!(&*obj.ty, TypeKind::Integer { signed: true, .. });
        let aggregate = value::atomic_load(local, &obj.ty, IntWidth::W64, signed)?;
        if aggregate {
          let temp_id = node.properties.expr.reserved_temporary.ok_or_else(|| TranslateError::new(
            ErrorKind::UnallocatedTemporary, "atomic aggregate load without a reserved temporary",
          ))?;
          temps.emit_temporary_address(ctx, local, temp_id, Some(&scoped), crate::temporaries::TemporaryUse::AtomicAggregateLoad)?;
          let (ir_type, layout_value) = aggregate_layout_of(ctx, &obj.ty)?;
          value::load_atomic_aggregate(local, ir_type, layout_value)?;
        }
      } else {
        value::load(ctx, local, &obj.ty)?;
      }
      Ok(())
    }
    ScopedIdentifier::Function(func) => lvalue::translate_function_lvalue(ctx, local, func),
    ScopedIdentifier::EnumConstant(ec) => {
      let signed = matches!(&*ec.ty, TypeKind::Integer { signed: true, .. });
      if signed {
        local.builder.append(Opcode::IntConst(i64::try_from(ec.value).unwrap_or(0)))?;
      } else {
        local.builder.append(Opcode::UintConst(u64::try_from(ec.value).unwrap_or(0)))?;
      }
      Ok(())
    }
    other => panic!("identifier resolves to {other:?}, which is not a value-producing identifier kind"),
  }
}

/// `spec.md` §4.7 "Array subscript / member... then load the result
/// (unless the referenced type is void or an array/function type, which
/// stays as an address)".
fn load_unless_address_only(ctx: &mut TranslatorContext, local: &mut LocalContext, node: &AstNode) -> TResult<()> {
  match node.expr_ty().cloned() {
    None => Ok(()),
    Some(ty) => match &*ty {
      TypeKind::Void | TypeKind::Array { .. } | TypeKind::Function { .. } => Ok(()),
      _ => value::load(ctx, local, &ty),
    },
  }
}

fn translate_unary(
  ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator,
  node: &AstNode, op: UnaryOp, operand: &AstNode,
) -> TResult<()> {
  match op {
    UnaryOp::Plus => {
      translate_expr(ctx, local, temps, operand)?;
      if let (Some(src), Some(dst)) = (operand.expr_ty(), node.expr_ty()) { typeconv::convert(ctx, local, src, dst)?; }
      Ok(())
    }
    UnaryOp::Minus => {
      translate_expr(ctx, local, temps, operand)?;
      if let (Some(src), Some(dst)) = (operand.expr_ty(), node.expr_ty()) { typeconv::convert(ctx, local, src, dst)?; }
      let ty = node.expr_ty().expect("unary minus without a resolved result type").clone();
      emit_neg(local, &ty)
    }
    UnaryOp::BitNot => {
      translate_expr(ctx, local, temps, operand)?;
      let ty = node.expr_ty().expect("`~` without a resolved result type").clone();
      emit_not(local, &ty)
    }
    UnaryOp::LogicalNot => {
      translate_expr(ctx, local, temps, operand)?;
      let src = operand.expr_ty().expect("`!` operand without a resolved type");
      typeconv::convert_to_bool(local, src)?;
      local.builder.append(Opcode::Int8BoolNot).map(drop)
    }
    UnaryOp::PreInc | UnaryOp::PreDec | UnaryOp::PostInc | UnaryOp::PostDec => {
      crate::assignment::translate_incdec(ctx, local, temps, op, operand)
    }
    UnaryOp::AddressOf => lvalue::translate_lvalue_of(ctx, local, temps, operand),
    UnaryOp::Deref => {
      translate_expr(ctx, local, temps, operand)?;
      let pointee = match operand.expr_ty().map(|t| &**t) {
        Some(TypeKind::Pointer { pointee, .. }) => pointee.clone(),
        _ => panic!("`*` applied to a non-pointer operand"),
      };
      if matches!(&*pointee, TypeKind::Void) {
        local.builder.append(Opcode::VstackPop)?;
        Ok(())
      } else {
        value::load(ctx, local, &pointee)
      }
    }
    UnaryOp::SizeOf => translate_sizeof(ctx, local, temps, operand),
    UnaryOp::AlignOf => {
      let ty = operand.expr_ty().expect("alignof operand without a resolved type");
      let align = layout_oracle::align_of(ty)?;
      local.builder.append(Opcode::UintConst(u64::from(align))).map(drop)
    }
  }
}

fn emit_neg(local: &mut LocalContext, ty: &Type) -> TResult<()> {
  match classify(&TypeKind::unqualified(ty)) {
    DataModelClass::Int8 => local.builder.append(Opcode::IntNeg(IntWidth::W8)).map(drop),
    DataModelClass::Int16 => local.builder.append(Opcode::IntNeg(IntWidth::W16)).map(drop),
    DataModelClass::Int32 => local.builder.append(Opcode::IntNeg(IntWidth::W32)).map(drop),
    DataModelClass::Int64 => local.builder.append(Opcode::IntNeg(IntWidth::W64)).map(drop),
    DataModelClass::Float => local.builder.append(Opcode::FloatNeg(FloatKind::F32)).map(drop),
    DataModelClass::Double => local.builder.append(Opcode::FloatNeg(FloatKind::F64)).map(drop),
    DataModelClass::LongDouble => local.builder.append(Opcode::FloatNeg(FloatKind::LongDouble)).map(drop),
    DataModelClass::ComplexFloat => local.builder.append(Opcode::ComplexNeg(FloatKind::F32)).map(drop),
    DataModelClass::ComplexDouble => local.builder.append(Opcode::ComplexNeg(FloatKind::F64)).map(drop),
    DataModelClass::ComplexLongDouble => local.builder.append(Opcode::ComplexNeg(FloatKind::LongDouble)).map(drop),
    DataModelClass::BitInt(bits) => local.builder.append(Opcode::BitIntNegate(bits)).map(drop),
  }
}

fn emit_not(local: &mut LocalContext, ty: &Type) -> TResult<()> {
  match classify(&TypeKind::unqualified(ty)) {
    DataModelClass::Int8 => local.builder.append(Opcode::IntNot(IntWidth::W8)).map(drop),
    DataModelClass::Int16 => local.builder.append(Opcode::IntNot(IntWidth::W16)).map(drop),
    DataModelClass::Int32 => local.builder.append(Opcode::IntNot(IntWidth::W32)).map(drop),
    DataModelClass::Int64 => local.builder.append(Opcode::IntNot(IntWidth::W64)).map(drop),
    DataModelClass::BitInt(bits) => local.builder.append(Opcode::BitIntInvert(bits)).map(drop),
    other => panic!("`~` applied to non-integral class {other:?}"),
  }
}

fn translate_sizeof(ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator, operand: &AstNode) -> TResult<()> {
  let ty = operand.expr_ty().expect("sizeof operand without a resolved type").clone();
  if ty.is_vla() {
    let _ = temps;
    // `array_size` is the first word of the VLA's synthetic two-field
    // record (`spec.md` §4.1); re-fetch the object's base `GET_LOCAL`
    // directly rather than going through `lvalue::translate_object_lvalue`,
    // which already dereferences through to the runtime data pointer.
    let obj = match operand.properties.expr.scoped_id.as_deref() {
      Some(ScopedIdentifier::Object(obj)) => obj,
      _ => panic!("sizeof on a VLA expression without a resolved object"),
    };
    let payload = &obj.payload;
    let ir_type = payload.ir_type.expect("VLA object payload missing its ir_type");
    let layout_value = payload.root_layout_value.unwrap_or(0);
    local.builder.append(Opcode::GetLocal { ir_type, layout_value })?;
    local.builder.append(Opcode::IntLoad { width: IntWidth::W64, flags: Default::default() }).map(drop)
  } else {
    let size = layout_oracle::size_of_complete(&ty)?;
    local.builder.append(Opcode::UintConst(size)).map(drop)
  }
}

pub(crate) fn is_signed_ty(ty: &Type) -> bool {
  matches!(&**ty, TypeKind::Integer { signed: true, .. } | TypeKind::BitPrecise { signed: true, .. })
}

pub(crate) fn is_pointer_type(ty: &Type) -> bool {
  matches!(&*TypeKind::unqualified(ty), TypeKind::Pointer { .. })
}

pub(crate) fn pointee_element_size(ty: &Type) -> TResult<u64> {
  match &*TypeKind::unqualified(ty) {
    TypeKind::Pointer { pointee, .. } => layout_oracle::size_of_complete(pointee),
    other => panic!("pointee_element_size called on non-pointer type {other:?}"),
  }
}

pub(crate) fn int_width_of(class: DataModelClass) -> IntWidth {
  match class {
    DataModelClass::Int8 => IntWidth::W8,
    DataModelClass::Int16 => IntWidth::W16,
    DataModelClass::Int32 => IntWidth::W32,
    DataModelClass::Int64 => IntWidth::W64,
    other => unreachable!("int_width_of called on non-integer class {other:?}"),
  }
}

fn float_kind_of(class: DataModelClass) -> FloatKind {
  match class {
    DataModelClass::Float => FloatKind::F32,
    DataModelClass::Double => FloatKind::F64,
    DataModelClass::LongDouble => FloatKind::LongDouble,
    other => unreachable!("float_kind_of called on non-float class {other:?}"),
  }
}

fn complex_float_kind_of(class: DataModelClass) -> FloatKind {
  match class {
    DataModelClass::ComplexFloat => FloatKind::F32,
    DataModelClass::ComplexDouble => FloatKind::F64,
    DataModelClass::ComplexLongDouble => FloatKind::LongDouble,
    other => unreachable!("complex_float_kind_of called on non-complex class {other:?}"),
  }
}

fn translate_binary(
  ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator,
  node: &AstNode, op: BinaryOp, lhs: &AstNode, rhs: &AstNode,
) -> TResult<()> {
  match op {
    BinaryOp::Add | BinaryOp::Sub => translate_additive(ctx, local, temps, node, op, lhs, rhs),
    BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => translate_multiplicative(ctx, local, temps, node, op, lhs, rhs),
    BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
      translate_comparison(ctx, local, temps, op, lhs, rhs)
    }
    BinaryOp::Shl | BinaryOp::Shr => translate_shift(ctx, local, temps, node, op, lhs, rhs),
    BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => translate_bitwise(ctx, local, temps, node, op, lhs, rhs),
    BinaryOp::LogicalAnd | BinaryOp::LogicalOr => translate_logical(ctx, local, temps, op, lhs, rhs),
  }
}

/// `+`/`-`, including pointer arithmetic (`spec.md` §4.7.4): a pointer
/// operand scales its integer partner by the pointee's element size, and
/// pointer-minus-pointer divides the byte distance by that size.
fn translate_additive(
  ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator,
  node: &AstNode, op: BinaryOp, lhs: &AstNode, rhs: &AstNode,
) -> TResult<()> {
  let lhs_ty = lhs.expr_ty().cloned().expect("binary operand without a resolved type");
  let rhs_ty = rhs.expr_ty().cloned().expect("binary operand without a resolved type");
  let lhs_ptr = is_pointer_type(&lhs_ty);
  let rhs_ptr = is_pointer_type(&rhs_ty);

  if lhs_ptr && rhs_ptr {
    translate_expr(ctx, local, temps, lhs)?;
    translate_expr(ctx, local, temps, rhs)?;
    local.builder.append(Opcode::IntSub(IntWidth::W64))?;
    let elem = pointee_element_size(&lhs_ty)?;
    local.builder.append(Opcode::UintConst(elem))?;
    local.builder.append(Opcode::IntDiv(IntWidth::W64, Sign::Signed)).map(drop)
  } else if lhs_ptr {
    translate_expr(ctx, local, temps, lhs)?;
    translate_expr(ctx, local, temps, rhs)?;
    let elem = pointee_element_size(&lhs_ty)?;
    local.builder.append(Opcode::UintConst(elem))?;
    local.builder.append(Opcode::IntMul(IntWidth::W64, Sign::Unsigned))?;
    if op == BinaryOp::Sub { local.builder.append(Opcode::IntNeg(IntWidth::W64))?; }
    local.builder.append(Opcode::PointerAdd).map(drop)
  } else if rhs_ptr {
    translate_expr(ctx, local, temps, lhs)?;
    let elem = pointee_element_size(&rhs_ty)?;
    local.builder.append(Opcode::UintConst(elem))?;
    local.builder.append(Opcode::IntMul(IntWidth::W64, Sign::Unsigned))?;
    translate_expr(ctx, local, temps, rhs)?;
    local.builder.append(Opcode::VstackExchange(1))?;
    local.builder.append(Opcode::PointerAdd).map(drop)
  } else {
    let result_ty = node.expr_ty().expect("binary node without a resolved result type").clone();
    translate_expr(ctx, local, temps, lhs)?;
    typeconv::convert(ctx, local, &lhs_ty, &result_ty)?;
    translate_expr(ctx, local, temps, rhs)?;
    typeconv::convert(ctx, local, &rhs_ty, &result_ty)?;
    emit_arith(local, &result_ty, op)
  }
}

fn translate_multiplicative(
  ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator,
  node: &AstNode, op: BinaryOp, lhs: &AstNode, rhs: &AstNode,
) -> TResult<()> {
  let lhs_ty = lhs.expr_ty().cloned().expect("binary operand without a resolved type");
  let rhs_ty = rhs.expr_ty().cloned().expect("binary operand without a resolved type");
  let result_ty = node.expr_ty().expect("binary node without a resolved result type").clone();
  translate_expr(ctx, local, temps, lhs)?;
  typeconv::convert(ctx, local, &lhs_ty, &result_ty)?;
  translate_expr(ctx, local, temps, rhs)?;
  typeconv::convert(ctx, local, &rhs_ty, &result_ty)?;
  emit_arith(local, &result_ty, op)
}

pub(crate) fn emit_arith(local: &mut LocalContext, ty: &Type, op: BinaryOp) -> TResult<()> {
  let unqualified = TypeKind::unqualified(ty);
  let class = classify(&unqualified);
  let signed = is_signed_ty(&unqualified);
  match class {
    DataModelClass::Int8 | DataModelClass::Int16 | DataModelClass::Int32 | DataModelClass::Int64 => {
      let w = int_width_of(class);
      let sign = if signed { Sign::Signed } else { Sign::Unsigned };
      let opc = match op {
        BinaryOp::Add => Opcode::IntAdd(w),
        BinaryOp::Sub => Opcode::IntSub(w),
        BinaryOp::Mul => Opcode::IntMul(w, sign),
        BinaryOp::Div => Opcode::IntDiv(w, sign),
        BinaryOp::Mod => Opcode::IntMod(w, sign),
        other => unreachable!("emit_arith called with non-arithmetic op {other:?}"),
      };
      local.builder.append(opc).map(drop)
    }
    DataModelClass::Float | DataModelClass::Double | DataModelClass::LongDouble => {
      let k = float_kind_of(class);
      let opc = match op {
        BinaryOp::Add => Opcode::FloatAdd(k),
        BinaryOp::Sub => Opcode::FloatSub(k),
        BinaryOp::Mul => Opcode::FloatMul(k),
        BinaryOp::Div => Opcode::FloatDiv(k),
        BinaryOp::Mod => panic!("`%` applied to a floating operand"),
        other => unreachable!("emit_arith called with non-arithmetic op {other:?}"),
      };
      local.builder.append(opc).map(drop)
    }
    DataModelClass::ComplexFloat | DataModelClass::ComplexDouble | DataModelClass::ComplexLongDouble => {
      let k = complex_float_kind_of(class);
      let opc = match op {
        BinaryOp::Add => Opcode::ComplexAdd(k),
        BinaryOp::Sub => Opcode::ComplexSub(k),
        BinaryOp::Mul => Opcode::ComplexMul(k),
        BinaryOp::Div => Opcode::ComplexDiv(k),
        other => panic!("`{other:?}` applied to a complex operand"),
      };
      local.builder.append(opc).map(drop)
    }
    DataModelClass::BitInt(bits) => {
      let sign = if signed { Sign::Signed } else { Sign::Unsigned };
      let opc = match op {
        BinaryOp::Add => Opcode::BitIntAdd(bits),
        BinaryOp::Sub => Opcode::BitIntSub(bits),
        BinaryOp::Mul => Opcode::BitIntMul(bits, sign),
        BinaryOp::Div => Opcode::BitIntDiv(bits, sign),
        BinaryOp::Mod => Opcode::BitIntMod(bits, sign),
        other => unreachable!("emit_arith called with non-arithmetic op {other:?}"),
      };
      local.builder.append(opc).map(drop)
    }
  }
}

fn translate_comparison(ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator, op: BinaryOp, lhs: &AstNode, rhs: &AstNode) -> TResult<()> {
  translate_expr(ctx, local, temps, lhs)?;
  translate_expr(ctx, local, temps, rhs)?;
  let ty = lhs.expr_ty().or_else(|| rhs.expr_ty()).cloned().expect("comparison operand without a resolved type");
  let unqualified = TypeKind::unqualified(&ty);
  let (cmp, negate) = match op {
    BinaryOp::Eq => (CmpOp::Eq, false),
    BinaryOp::Ne => (CmpOp::Ne, false),
    BinaryOp::Lt => (CmpOp::Lt, false),
    BinaryOp::Gt => (CmpOp::Gt, false),
    BinaryOp::Le => (CmpOp::Gt, true),
    BinaryOp::Ge => (CmpOp::Lt, true),
    other => unreachable!("translate_comparison called with non-comparison op {other:?}"),
  };
  emit_cmp(local, &unqualified, cmp)?;
  if negate { local.builder.append(Opcode::Int8BoolNot).map(drop) } else { Ok(()) }
}

fn emit_cmp(local: &mut LocalContext, ty: &Type, cmp: CmpOp) -> TResult<()> {
  match classify(ty) {
    DataModelClass::Int8 | DataModelClass::Int16 | DataModelClass::Int32 | DataModelClass::Int64 => {
      let w = int_width_of(classify(ty));
      let sign = if is_signed_ty(ty) { Sign::Signed } else { Sign::Unsigned };
      local.builder.append(Opcode::IntCmp { width: w, sign, op: cmp }).map(drop)
    }
    DataModelClass::Float | DataModelClass::Double | DataModelClass::LongDouble => {
      let k = float_kind_of(classify(ty));
      local.builder.append(Opcode::FloatCmp { kind: k, op: cmp }).map(drop)
    }
    DataModelClass::BitInt(bits) => {
      let sign = if is_signed_ty(ty) { Sign::Signed } else { Sign::Unsigned };
      local.builder.append(Opcode::BitIntCmp { bits, sign, op: cmp }).map(drop)
    }
    other => panic!("comparison on non-comparable class {other:?}"),
  }
}

fn translate_shift(
  ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator,
  node: &AstNode, op: BinaryOp, lhs: &AstNode, rhs: &AstNode,
) -> TResult<()> {
  translate_expr(ctx, local, temps, lhs)?;
  translate_expr(ctx, local, temps, rhs)?;
  let ty = node.expr_ty().cloned().expect("shift node without a resolved result type");
  let unqualified = TypeKind::unqualified(&ty);
  match classify(&unqualified) {
    DataModelClass::Int8 | DataModelClass::Int16 | DataModelClass::Int32 | DataModelClass::Int64 => {
      let w = int_width_of(classify(&unqualified));
      let signed = is_signed_ty(&unqualified);
      let opc = match op {
        BinaryOp::Shl => Opcode::IntShl(w),
        BinaryOp::Shr if signed => Opcode::IntAshr(w),
        BinaryOp::Shr => Opcode::IntLshr(w),
        other => unreachable!("translate_shift called with {other:?}"),
      };
      local.builder.append(opc).map(drop)
    }
    DataModelClass::BitInt(bits) => {
      let sign = if is_signed_ty(&unqualified) { Sign::Signed } else { Sign::Unsigned };
      let opc = match op {
        BinaryOp::Shl => Opcode::BitIntShl(bits),
        BinaryOp::Shr => Opcode::BitIntShr(bits, sign),
        other => unreachable!("translate_shift called with {other:?}"),
      };
      local.builder.append(opc).map(drop)
    }
    other => panic!("shift applied to non-integral class {other:?}"),
  }
}

fn translate_bitwise(
  ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator,
  node: &AstNode, op: BinaryOp, lhs: &AstNode, rhs: &AstNode,
) -> TResult<()> {
  let result_ty = node.expr_ty().expect("bitwise node without a resolved result type").clone();
  translate_expr(ctx, local, temps, lhs)?;
  if let Some(src) = lhs.expr_ty() { typeconv::convert(ctx, local, src, &result_ty)?; }
  translate_expr(ctx, local, temps, rhs)?;
  if let Some(src) = rhs.expr_ty() { typeconv::convert(ctx, local, src, &result_ty)?; }
  let unqualified = TypeKind::unqualified(&result_ty);
  match classify(&unqualified) {
    DataModelClass::Int8 | DataModelClass::Int16 | DataModelClass::Int32 | DataModelClass::Int64 => {
      let w = int_width_of(classify(&unqualified));
      let opc = match op {
        BinaryOp::BitAnd => Opcode::IntAnd(w),
        BinaryOp::BitOr => Opcode::IntOr(w),
        BinaryOp::BitXor => Opcode::IntXor(w),
        other => unreachable!("translate_bitwise called with {other:?}"),
      };
      local.builder.append(opc).map(drop)
    }
    DataModelClass::BitInt(bits) => {
      let opc = match op {
        BinaryOp::BitAnd => Opcode::BitIntAnd(bits),
        BinaryOp::BitOr => Opcode::BitIntOr(bits),
        BinaryOp::BitXor => Opcode::BitIntXor(bits),
        other => unreachable!("translate_bitwise called with {other:?}"),
      };
      local.builder.append(opc).map(drop)
    }
    other => panic!("bitwise op applied to non-integral class {other:?}"),
  }
}

/// `spec.md` §4.7 "Logical AND/OR": short-circuit evaluation. Both arms
/// duplicate the left operand's boolean before branching so the
/// short-circuited path already has its result (0 for `&&`, 1 for `||`)
/// sitting on the stack with no extra work.
fn translate_logical(ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator, op: BinaryOp, lhs: &AstNode, rhs: &AstNode) -> TResult<()> {
  translate_expr(ctx, local, temps, lhs)?;
  let lhs_ty = lhs.expr_ty().expect("logical operand without a resolved type");
  typeconv::convert_to_bool(local, lhs_ty)?;
  local.builder.append(Opcode::VstackPick(0))?;
  if op == BinaryOp::LogicalAnd { local.builder.append(Opcode::Int8BoolNot)?; }
  let to_short_circuit = local.builder.append(Opcode::Branch { target: crate::types::ir::InstIndex(0), cond: crate::types::ir::CondWidth::W8 })?;
  local.builder.append(Opcode::VstackPop)?;
  translate_expr(ctx, local, temps, rhs)?;
  let rhs_ty = rhs.expr_ty().expect("logical operand without a resolved type");
  typeconv::convert_to_bool(local, rhs_ty)?;
  let to_end = local.builder.append(Opcode::Jump(crate::types::ir::InstIndex(0)))?;
  let short_circuit = local.builder.current_index();
  local.builder.patch_target(to_short_circuit, short_circuit);
  let end = local.builder.current_index();
  local.builder.patch_target(to_end, end);
  Ok(())
}

fn translate_ternary(
  ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator,
  cond: &AstNode, then_branch: &AstNode, else_branch: &AstNode,
) -> TResult<()> {
  translate_expr(ctx, local, temps, cond)?;
  let cond_ty = cond.expr_ty().expect("ternary condition without a resolved type");
  typeconv::convert_to_bool(local, cond_ty)?;
  let to_then = local.builder.append(Opcode::Branch { target: crate::types::ir::InstIndex(0), cond: crate::types::ir::CondWidth::W8 })?;
  translate_expr(ctx, local, temps, else_branch)?;
  let to_end = local.builder.append(Opcode::Jump(crate::types::ir::InstIndex(0)))?;
  let then_target = local.builder.current_index();
  local.builder.patch_target(to_then, then_target);
  translate_expr(ctx, local, temps, then_branch)?;
  let end = local.builder.current_index();
  local.builder.patch_target(to_end, end);
  Ok(())
}

fn translate_builtin(ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator, builtin: &Builtin) -> TResult<()> {
  match builtin {
    Builtin::VaStart(ap, _) => { translate_expr(ctx, local, temps, ap)?; local.builder.append(Opcode::VaStart).map(drop) }
    Builtin::VaEnd(ap) => { translate_expr(ctx, local, temps, ap)?; local.builder.append(Opcode::VaEnd).map(drop) }
    Builtin::VaCopy(dst, src) => {
      translate_expr(ctx, local, temps, dst)?;
      translate_expr(ctx, local, temps, src)?;
      local.builder.append(Opcode::VaCopy).map(drop)
    }
    Builtin::VaArg(ap, ty) => {
      translate_expr(ctx, local, temps, ap)?;
      let (ir_type, layout_value) = aggregate_layout_of(ctx, ty)?;
      local.builder.append(Opcode::VaArg { ir_type, layout_value }).map(drop)
    }
    Builtin::Alloca(size) => {
      translate_expr(ctx, local, temps, size)?;
      local.builder.append(Opcode::Alloca { align: 1 }).map(drop)
    }
    Builtin::AllocaWithAlign(size, align) => {
      translate_expr(ctx, local, temps, size)?;
      local.builder.append(Opcode::Alloca { align: constant_alignment(align)? }).map(drop)
    }
    Builtin::AllocaWithAlignAndMax(size, align, _max) => {
      translate_expr(ctx, local, temps, size)?;
      local.builder.append(Opcode::Alloca { align: constant_alignment(align)? }).map(drop)
    }
    Builtin::Offsetof(ty, field) => {
      let target = ctx.target.clone();
      let layout = layout_oracle::member_layout(ty, *field, &target, &mut ctx.module)?;
      local.builder.append(Opcode::UintConst(u64::from(layout.offset))).map(drop)
    }
    Builtin::TypesCompatibleP(a, b) => {
      local.builder.append(Opcode::UintConst(u64::from(types_compatible(a, b)))).map(drop)
    }
    Builtin::ChooseExpr(resolved) => translate_expr(ctx, local, temps, resolved),
    Builtin::ConstantP(arg) => {
      local.builder.append(Opcode::UintConst(u64::from(is_compile_time_constant(arg)))).map(drop)
    }
    Builtin::ClassifyType(arg) => {
      let ty = arg.expr_ty().expect("__builtin_classify_type argument without a resolved type");
      let code: u64 = match &**ty {
        TypeKind::Void => 0,
        TypeKind::Integer { .. } | TypeKind::BitPrecise { .. } | TypeKind::Enum { .. } => 1,
        TypeKind::Floating(_) | TypeKind::Complex(_) => 2,
        TypeKind::Pointer { .. } => 3,
        TypeKind::Array { .. } => 4,
        TypeKind::Aggregate { .. } => 5,
        TypeKind::Function { .. } => 6,
        TypeKind::Qualified { .. } => 7,
      };
      local.builder.append(Opcode::UintConst(code)).map(drop)
    }
    Builtin::Inf(kind) => emit_float_const(local, float_kind_literal(*kind), f64::INFINITY),
    Builtin::Nan(kind, _payload) => emit_float_const(local, float_kind_literal(*kind), f64::NAN),
    Builtin::AddOverflow(a, b, out) | Builtin::SubOverflow(a, b, out) | Builtin::MulOverflow(a, b, out) => {
      translate_expr(ctx, local, temps, a)?;
      translate_expr(ctx, local, temps, b)?;
      lvalue::translate_lvalue_of(ctx, local, temps, out)?;
      let width = a.expr_ty().and_then(|t| if let TypeKind::Integer { width, .. } = &**t { Some(*width) } else { None }).unwrap_or(IntWidth::W64);
      let sign_of = |operand: &AstNode| if operand.expr_ty().is_some_and(is_signed_ty) { Sign::Signed } else { Sign::Unsigned };
      let signs = [sign_of(a), sign_of(b)];
      let op = match builtin {
        Builtin::AddOverflow(..) => crate::types::ir::OverflowOp::Add,
        Builtin::SubOverflow(..) => crate::types::ir::OverflowOp::Sub,
        _ => crate::types::ir::OverflowOp::Mul,
      };
      local.builder.append(Opcode::OverflowArith { op, width, signs }).map(drop)
    }
  }
}

/// `__builtin_alloca_with_align[_and_max]`'s alignment operand is a
/// compile-time constant measured in bits (GCC requires a constant here);
/// [`Opcode::Alloca`] wants it as a byte alignment immediate.
fn constant_alignment(align: &AstNode) -> TResult<u32> {
  let bits = match &align.kind {
    AstKind::IntConstant(lit) => int_literal_u64(*lit),
    _ => return Err(TranslateError::new(ErrorKind::AnalysisError, "alloca alignment operand is not a constant expression")),
  };
  Ok(u32::try_from(bits / 8).unwrap_or(1).max(1))
}

fn int_literal_u64(lit: crate::types::ast::IntLiteral) -> u64 {
  use crate::types::ast::IntLiteral;
  match lit {
    IntLiteral::I32(v) => v as u64,
    IntLiteral::U32(v) => u64::from(v),
    IntLiteral::I64(v) => v as u64,
    IntLiteral::U64(v) => v,
    IntLiteral::Char(v) => v as u64,
    IntLiteral::Bool(v) => u64::from(v),
  }
}

/// `spec.md` §6 "`constant_p` (folded to 0/1 on whether the argument is a
/// compile-time constant of the allowed classes)". Literal and enum-constant
/// forms, and arithmetic/casts built up from them, are constants; anything
/// that reads storage (a load, a call, a volatile access) is not.
fn is_compile_time_constant(node: &AstNode) -> bool {
  match &node.kind {
    AstKind::IntConstant(_) | AstKind::FloatConstant(_) | AstKind::ComplexConstant(..)
    | AstKind::BitPreciseConstant { .. } | AstKind::CharConstant(_) | AstKind::BoolConstant(_) => true,
    AstKind::StringLiteral { .. } => true,
    AstKind::Identifier(_) => {
      matches!(node.properties.expr.scoped_id.as_deref(), Some(ScopedIdentifier::EnumConstant(_)))
    }
    AstKind::GenericSelection { resolved_arm } | AstKind::Cast { operand: resolved_arm, .. } => {
      is_compile_time_constant(resolved_arm)
    }
    AstKind::Unary { op: UnaryOp::Plus | UnaryOp::Minus | UnaryOp::BitNot | UnaryOp::LogicalNot, operand } => {
      is_compile_time_constant(operand)
    }
    AstKind::Unary { op: UnaryOp::SizeOf | UnaryOp::AlignOf, .. } => true,
    AstKind::Unary { op: UnaryOp::AddressOf, operand } => is_address_constant(operand),
    AstKind::Binary { lhs, rhs, .. } => is_compile_time_constant(lhs) && is_compile_time_constant(rhs),
    AstKind::Ternary { cond, then_branch, else_branch } => {
      is_compile_time_constant(cond) && is_compile_time_constant(then_branch) && is_compile_time_constant(else_branch)
    }
    AstKind::Comma { rhs, .. } => is_compile_time_constant(rhs),
    _ => false,
  }
}

/// An address constant: `&` of a `static`/`extern`-duration object or a
/// function, or a string literal's implicit decay (`spec.md` §9 open
/// question — accepted here, per the reference compiler's behavior for
/// string-literal arguments, unlike an identifier-typed pointer operand).
fn is_address_constant(node: &AstNode) -> bool {
  match &node.kind {
    AstKind::StringLiteral { .. } => true,
    AstKind::Identifier(_) => match node.properties.expr.scoped_id.as_deref() {
      Some(ScopedIdentifier::Function(_)) => true,
      Some(ScopedIdentifier::Object(obj)) => !matches!(obj.storage, StorageClass::Auto | StorageClass::Register),
      _ => false,
    },
    AstKind::Member { base, .. } => is_address_constant(base),
    AstKind::ArraySubscript { array, .. } => is_address_constant(array),
    _ => false,
  }
}

fn emit_float_const(local: &mut LocalContext, kind: FloatKind, value: f64) -> TResult<()> {
  let op = match kind {
    FloatKind::F32 => Opcode::Float32Const(value as f32),
    FloatKind::F64 => Opcode::Float64Const(value),
    FloatKind::LongDouble => Opcode::LongDoubleConst(u128::from(value.to_bits())),
  };
  local.builder.append(op).map(drop)
}

fn float_kind_literal(kind: crate::types::ast::FloatKindLiteral) -> FloatKind {
  use crate::types::ast::FloatKindLiteral as L;
  match kind {
    L::F32 => FloatKind::F32,
    L::F64 => FloatKind::F64,
    L::LongDouble => FloatKind::LongDouble,
  }
}

/// Statement-expression (`spec.md` §4.7 "Statement expression"): translate
/// every block item as a statement, then translate the trailing
/// expression-statement's expression and leave its value on the stack.
fn translate_statement_expression(ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator, items: &[crate::types::ast::Expr]) -> TResult<()> {
  let (last, init) = items.split_last().ok_or_else(|| TranslateError::new(ErrorKind::AnalysisError, "empty statement expression"))?;
  for item in init {
    crate::stmt::translate_statement(ctx, local, temps, item)?;
  }
  match &last.kind {
    AstKind::ExpressionStatement(Some(e)) => translate_expr(ctx, local, temps, e),
    _ => {
      crate::stmt::translate_statement(ctx, local, temps, last)?;
      Ok(())
    }
  }
}

/// `&&label` is ill-defined if any block enclosing the label's own
/// definition contains a VLA (`spec.md` §4.7 "Label address" — "the
/// address of a label past a VLA alloca would be ill-defined"), so this
/// reads the analyzer-computed flag on the label's identifier rather than
/// re-deriving it from this function's own live VLA-scope stack, which
/// tracks declaration order at the jump site, not the label's.
fn reject_label_address_past_vla(node: &AstNode) -> TResult<()> {
  let scoped = node.properties.expr.scoped_id.as_deref()
    .expect("label-address node without a resolved scoped-id");
  let ScopedIdentifier::Label(label) = scoped else {
    panic!("label-address node's scoped-id isn't a label: {scoped:?}");
  };
  if label.enclosing_blocks_have_vla {
    return Err(TranslateError::new(
      ErrorKind::AnalysisError, "none of the blocks enclosing the label can contain VLAs",
    ));
  }
  Ok(())
}

/// Resolves `ty`'s IR type id, for opcodes that carry both an IR type and
/// a layout value (`VA_ARG`, aggregate copy, atomic aggregate ops). The
/// layout value is always 0 here: these are root layouts, not a member
/// positioned inside some enclosing local-slot record.
pub(crate) fn aggregate_layout_of(ctx: &mut TranslatorContext, ty: &Type) -> TResult<(crate::types::ir::IrTypeId, u32)> {
  let target = ctx.target.clone();
  let layout = layout_oracle::resolve_layout(ty, &target, &mut ctx.module, crate::types::layout::LayoutHome::Module)?;
  Ok((layout.layout.ir_type, 0))
}
