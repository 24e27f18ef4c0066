//! Lvalue translator (`spec.md` §4.5 "C5 Lvalue translator").
//!
//! Every public function here leaves exactly one pointer-sized value on
//! the virtual stack: the address of the designated object, member, or
//! array element.

use crate::context::{LocalContext, TranslatorContext};
use crate::error::{ErrorKind, TResult, TranslateError};
use crate::expr;
use crate::naming;
use crate::temporaries::{TemporaryAllocator, TemporaryUse};
use crate::types::ast::AstNode;
use crate::types::ir::Opcode;
use crate::types::scope::{ObjectIdentifier, StorageClass};
use crate::types::ty::{Type, TypeKind};

/// The two well-known container symbols `static`-duration objects are
/// laid out into (SPEC_FULL.md §F.4): one for objects with a non-zero
/// initializer, one for zero-initialized (BSS) objects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StaticContainer { Data, Bss }

impl StaticContainer {
  #[must_use] pub fn symbol(self) -> crate::symbol::Symbol {
    crate::symbol::intern(match self {
      StaticContainer::Data => "__static_storage_data",
      StaticContainer::Bss => "__static_storage_bss",
    })
  }
}

/// Object lvalue (`spec.md` §4.5 "Object lvalue").
pub fn translate_object_lvalue(ctx: &mut TranslatorContext, local: &mut LocalContext, obj: &ObjectIdentifier) -> TResult<()> {
  if let Some(label) = obj.asm_label {
    local.builder.append(Opcode::GetGlobal(label))?;
    return Ok(());
  }

  match obj.storage {
    StorageClass::Extern => {
      local.builder.append(Opcode::GetGlobal(obj.name))?;
    }
    StorageClass::ThreadLocal | StorageClass::ExternThreadLocal | StorageClass::StaticThreadLocal => {
      local.builder.append(Opcode::GetThreadLocal(obj.name))?;
    }
    StorageClass::Static => {
      // `static`-duration objects resolve through one of the two
      // well-known containers plus this object's byte offset within it,
      // assigned by the global-scope collaborator at module-layout time
      // and recorded on the payload the same way a local's `GET_LOCAL`
      // offset is.
      let container = if obj.has_initializer { StaticContainer::Data } else { StaticContainer::Bss };
      let offset = obj.payload.root_layout_value.get().unwrap_or(0);
      local.builder.append(Opcode::GetGlobal(container.symbol()))?;
      local.builder.append(Opcode::UintConst(u64::from(offset)))?;
      local.builder.append(Opcode::PointerAdd)?;
    }
    StorageClass::Auto | StorageClass::Register => {
      let payload = &obj.payload;
      let ir_type = payload.ir_type.get().ok_or_else(|| TranslateError::new(
        ErrorKind::UnallocatedTemporary, "object lvalue translated before its payload was populated",
      ))?;
      let layout_value = payload.root_layout_value.get().unwrap_or(0);
      local.builder.append(Opcode::GetLocal { ir_type, layout_value })?;
      if obj.ty.is_vla() {
        // Dereference the `array_ptr` synthetic field to obtain the
        // runtime base address (`spec.md` §4.1 "VLA... synthetic
        // two-field record").
        local.builder.append(Opcode::IntLoad { width: crate::types::ty::IntWidth::W64, flags: Default::default() })?;
      }
    }
    StorageClass::Typedef | StorageClass::Constexpr | StorageClass::Unknown => {
      panic!("object lvalue requested for non-storage identifier (typedef/constexpr/unknown)");
    }
  }
  Ok(())
}

/// Function lvalue (`spec.md` §4.5 "Function lvalue").
pub fn translate_function_lvalue(
  ctx: &mut TranslatorContext, local: &mut LocalContext,
  func: &crate::types::scope::FunctionIdentifier,
) -> TResult<()> {
  let _ = ctx;
  let sym = naming::function_symbol(func);
  local.builder.append(Opcode::GetGlobal(sym))?;
  Ok(())
}

/// Array subscript (`spec.md` §4.5 "Array subscript").
///
/// `array_first` tells us whether the syntactic form was `a[b]` (the
/// array operand appears first) or `b[a]`, so side effects evaluate in
/// textual order even though the generated address math is identical.
pub fn translate_array_subscript(
  ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator,
  array: &AstNode, index: &AstNode, array_first: bool, element_size: u64,
) -> TResult<()> {
  if array_first {
    expr::translate_expr(ctx, local, temps, array)?;
    expr::translate_expr(ctx, local, temps, index)?;
  } else {
    expr::translate_expr(ctx, local, temps, index)?;
    local.builder.append(Opcode::VstackExchange(1))?;
  }
  local.builder.append(Opcode::UintConst(element_size))?;
  local.builder.append(Opcode::IntMul(crate::types::ty::IntWidth::W64, crate::types::ir::Sign::Unsigned))?;
  local.builder.append(Opcode::PointerAdd)?;
  Ok(())
}

/// Struct/union member access, direct (`.`) or indirect (`->`)
/// (`spec.md` §4.5 "Struct member").
pub fn translate_member(
  ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator,
  base: &AstNode, indirect: bool, member_offset: u64,
) -> TResult<()> {
  if indirect {
    expr::translate_expr(ctx, local, temps, base)?;
  } else {
    translate_lvalue_of(ctx, local, temps, base)?;
  }
  if member_offset != 0 {
    local.builder.append(Opcode::UintConst(member_offset))?;
    local.builder.append(Opcode::PointerAdd)?;
  }
  Ok(())
}

/// Compound literal (`spec.md` §4.5 "Compound literal").
pub fn translate_compound_literal(
  ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator,
  ty: &Type, initializer: &AstNode, scoped_id: Option<&std::rc::Rc<crate::types::scope::ScopedIdentifier>>,
  temp_id: crate::types::ast::TemporaryId,
) -> TResult<()> {
  temps.emit_temporary_address(ctx, local, temp_id, scoped_id, TemporaryUse::CompoundLiteral)?;
  local.builder.append(Opcode::VstackPick(0))?;
  crate::initializer::translate_initializer_at(ctx, local, temps, ty, initializer)?;
  Ok(())
}

/// Indirection `*p`, translated as an rvalue load of the pointer operand
/// (`spec.md` §4.5 "Indirection").
pub fn translate_indirection(ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator, pointee: &AstNode) -> TResult<()> {
  expr::translate_expr(ctx, local, temps, pointee)
}

/// Dispatches a node already known to be an lvalue-producing expression to
/// the right C5 entry point. Used where a caller (C6, C8) has an
/// arbitrary lvalue expression node and needs its address, not its value.
pub fn translate_lvalue_of(
  ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator, node: &AstNode,
) -> TResult<()> {
  use crate::types::ast::{AstKind, MemberAccess};
  match &node.kind {
    AstKind::Identifier(_) => {
      let scoped = node.properties.expr.scoped_id.as_deref()
        .expect("identifier lvalue translated without a resolved scoped-id (invariant v)");
      match scoped {
        crate::types::scope::ScopedIdentifier::Object(obj) => translate_object_lvalue(ctx, local, obj),
        crate::types::scope::ScopedIdentifier::Function(func) => translate_function_lvalue(ctx, local, func),
        other => panic!("identifier {other:?} used where an object/function lvalue was required"),
      }
    }
    AstKind::ArraySubscript { array, index, array_first } => {
      let element_size = element_size_of(node)?;
      translate_array_subscript(ctx, local, temps, array, index, *array_first, element_size)
    }
    AstKind::Member { base, field, access } => {
      let indirect = *access == MemberAccess::Indirect;
      let base_ty = if indirect {
        match base.expr_ty().map(|t| &**t) {
          Some(TypeKind::Pointer { pointee, .. }) => pointee.clone(),
          _ => panic!("`->` base expression has no pointer type"),
        }
      } else {
        base.expr_ty().cloned().expect("`.` base expression has no resolved type")
      };
      let target = ctx.target.clone();
      let layout = crate::layout_oracle::member_layout(&base_ty, *field, &target, &mut ctx.module)?;
      // Bit-field members defer their byte offset to C6 (`value::bitfield_byte_offset`
      // derives it from the absolute bit offset); ordinary members add theirs here.
      let offset = if layout.bitfield.is_some() { 0 } else { u64::from(layout.offset) };
      translate_member(ctx, local, temps, base, indirect, offset)
    }
    AstKind::CompoundLiteral { ty, initializer } => {
      let temp_id = node.properties.expr.reserved_temporary.ok_or_else(|| TranslateError::new(
        ErrorKind::UnallocatedTemporary, "compound literal without a reserved temporary",
      ))?;
      translate_compound_literal(ctx, local, temps, ty, initializer, node.properties.expr.scoped_id.as_ref(), temp_id)
    }
    AstKind::Unary { op: crate::types::ast::UnaryOp::Deref, operand } => translate_indirection(ctx, local, temps, operand),
    other => panic!("node {other:?} is not an lvalue-producing expression"),
  }
}

/// Resolves an array-subscript node's element size via the type-layout
/// oracle (`spec.md` §4.1). A thin seam so tests can stub layout lookup
/// without a full oracle.
fn element_size_of(node: &AstNode) -> TResult<u64> {
  let ty = node.expr_ty().ok_or_else(|| TranslateError::new(ErrorKind::TypeIncomplete, "array subscript node missing a resolved type"))?;
  match &**ty {
    TypeKind::Pointer { pointee, .. } | TypeKind::Array { element: pointee, .. } => {
      crate::layout_oracle::size_of_complete(pointee)
    }
    other => Err(TranslateError::new(ErrorKind::TypeUnsupported, format!("cannot subscript non-pointer/array type {other:?}"))),
  }
}

