//! Initializer translation, shared between the declaration translator
//! (C9, `spec.md` §4.9 "emit the object lvalue; translate the initializer
//! against that address") and the compound-literal lvalue (C5, `spec.md`
//! §4.5).
//!
//! Brace-enclosed initializer lists are pre-lowered by the analyzer into
//! an explicit sequence of per-member assignment expressions before this
//! translator ever sees them (`spec.md` §3 does not enumerate a
//! brace-initializer-list node kind among the expression arms, only a
//! `compound literal`'s already-resolved `initializer: Expr`) — so this
//! module only needs to handle "the initializer is an rvalue expression
//! assigned to an address", scalar or aggregate.

use crate::context::{LocalContext, TranslatorContext};
use crate::expr;
use crate::temporaries::TemporaryAllocator;
use crate::types::ast::AstNode;
use crate::types::ty::{Type, TypeKind};
use crate::{typeconv, value};

/// Stack on entry: `[dest_addr]`. Translates `initializer` and stores (or
/// aggregate-copies) its value into `dest_addr`, leaving nothing behind.
pub fn translate_initializer_at(
  ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator,
  ty: &Type, initializer: &AstNode,
) -> crate::error::TResult<()> {
  if matches!(&**ty, TypeKind::Aggregate { .. } | TypeKind::Array { .. }) {
    expr::translate_expr(ctx, local, temps, initializer)?;
    let (ir_type, layout_value) = expr::aggregate_layout_of(ctx, ty)?;
    value::aggregate_copy(local, ir_type, layout_value)?;
    return Ok(());
  }

  expr::translate_expr(ctx, local, temps, initializer)?;
  if let Some(src_ty) = initializer.expr_ty() {
    typeconv::convert(ctx, local, src_ty, ty)?;
  }
  // Stack is now `[dest_addr, value]`, exactly what `store` consumes.
  value::store(ctx, local, ty)?;
  Ok(())
}
