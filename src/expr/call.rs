//! Function call translation (`spec.md` §4.7.2 "Call").
//!
//! Two dispatch shapes reach the IR: a callee that resolves to a known
//! function identifier emits `INVOKE_DIRECT` against that function's
//! declaration (registering an extern declaration on first sight if the
//! definition lives in another translation unit); anything else —
//! a function pointer value, a cast callee, a computed expression —
//! evaluates the callee and emits `INVOKE_INDIRECT`. A GNU-inline alias
//! reduces to the first case: `naming::function_symbol` already picks the
//! mangled `__kefir_gnu_inline_*` symbol when one applies, so the callee
//! resolution here never needs to special-case it.

use crate::context::{LocalContext, TranslatorContext};
use crate::error::{ErrorKind, TResult, TranslateError};
use crate::function::default_argument_promoted_type;
use crate::symbol::Symbol;
use crate::temporaries::TemporaryUse;
use crate::temporaries::TemporaryAllocator;
use crate::types::ast::{AstKind, AstNode, Expr};
use crate::types::ir::{FuncId, Opcode};
use crate::types::scope::ScopedIdentifier;
use crate::types::ty::{ParamMode, Type, TypeKind};
use crate::{expr, naming, typeconv};

pub fn translate_call(
  ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator,
  node: &AstNode, callee: &Expr, args: &[Expr],
) -> TResult<()> {
  let result_ty = node.expr_ty().cloned();
  let is_aggregate_result = matches!(result_ty.as_deref(), Some(TypeKind::Aggregate { .. }));

  let result_temp = if is_aggregate_result {
    let temp_id = node.properties.expr.reserved_temporary.ok_or_else(|| TranslateError::new(
      ErrorKind::UnallocatedTemporary, "aggregate-returning call without a reserved temporary",
    ))?;
    temps.emit_temporary_address(ctx, local, temp_id, node.properties.expr.scoped_id.as_ref(), TemporaryUse::AggregateCallResult)?;
    Some((temp_id, node.properties.expr.scoped_id.clone()))
  } else {
    None
  };

  match &callee.kind {
    AstKind::Identifier(_) => {
      let scoped = callee.properties.expr.scoped_id.as_deref()
        .expect("call callee identifier without a resolved scoped-id");
      match scoped {
        ScopedIdentifier::Function(func) => {
          push_converted_arguments(ctx, local, temps, args, param_mode_of(&func.ty))?;
          let sym = naming::function_symbol(func);
          let func_id = resolve_func_id(ctx, sym);
          local.builder.append(Opcode::InvokeDirect(func_id))?;
        }
        _ => {
          // Computed callee (a function pointer held in a non-function
          // scoped-id): the callee's address is pushed before its
          // arguments, mirroring the fallthrough indirect-call path below.
          expr::translate_expr(ctx, local, temps, callee)?;
          let param_mode = callee.expr_ty().and_then(|ty| param_mode_of(ty));
          push_converted_arguments(ctx, local, temps, args, param_mode)?;
          local.builder.append(Opcode::InvokeIndirect)?;
        }
      }
    }
    _ => {
      expr::translate_expr(ctx, local, temps, callee)?;
      let param_mode = callee.expr_ty().and_then(|ty| param_mode_of(ty));
      push_converted_arguments(ctx, local, temps, args, param_mode)?;
      local.builder.append(Opcode::InvokeIndirect)?;
    }
  }

  if let Some((temp_id, scoped_id)) = result_temp {
    temps.emit_temporary_address(ctx, local, temp_id, scoped_id.as_ref(), TemporaryUse::AggregateCallResult)?;
  }
  Ok(())
}

/// Finds the callee's parameter-list shape: a direct call's
/// `FunctionIdentifier::ty`, or an indirect call's computed callee
/// expression type, unwrapping the pointer/qualifier layers a function
/// pointer value carries en route to its pointee's `Function` type.
fn param_mode_of(ty: &Type) -> Option<&ParamMode> {
  match &**ty {
    TypeKind::Function { params, .. } => Some(params),
    TypeKind::Pointer { pointee, .. } => param_mode_of(pointee),
    TypeKind::Qualified { base, .. } => param_mode_of(base),
    _ => None,
  }
}

/// Translates and pushes each argument, converting it first to the
/// callee's declared parameter type (a full prototype, positionally) or,
/// absent one — unprototyped/K&R, or a variadic call's trailing arguments
/// past the prototype's fixed parameters — to its default-argument-promoted
/// type (`spec.md` §4.7.2 rule 3), matching `function.rs`'s inverse
/// unwinding at the callee's prologue. Aggregate/array/function-typed
/// arguments aren't scalars and pass through unconverted.
fn push_converted_arguments(
  ctx: &mut TranslatorContext, local: &mut LocalContext, temps: &mut TemporaryAllocator,
  args: &[Expr], param_mode: Option<&ParamMode>,
) -> TResult<()> {
  let prototype: &[Type] = match param_mode {
    Some(ParamMode::Prototype(types)) => types,
    _ => &[],
  };
  for (i, arg) in args.iter().enumerate() {
    expr::translate_expr(ctx, local, temps, arg)?;
    let Some(src) = arg.expr_ty() else { continue };
    if matches!(&**src, TypeKind::Aggregate { .. } | TypeKind::Array { .. } | TypeKind::Function { .. }) {
      continue;
    }
    match prototype.get(i) {
      Some(dst) => typeconv::convert(ctx, local, src, dst)?,
      None => {
        let promoted = default_argument_promoted_type(src);
        typeconv::convert(ctx, local, src, &promoted)?;
      }
    }
  }
  Ok(())
}

/// Finds an existing declaration for `name` in the module, or registers a
/// fresh external one — mirrors how an unresolved callee is linked at the
/// object-file boundary rather than at translation time.
fn resolve_func_id(ctx: &mut TranslatorContext, name: Symbol) -> FuncId {
  if let Some(decl) = ctx.module.decls.iter().find(|d| d.name == Some(name)) {
    return decl.id;
  }
  ctx.module.new_func(Some(name), Box::new([]), None)
}
