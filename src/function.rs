//! Function-definition translator (`spec.md` §4.10 "C10 Function-
//! definition translator").
//!
//! The single entry point a driver calls per external function
//! definition. Builds a local translator context, materializes the IR
//! function, stores incoming parameters into their lvalues, translates
//! the body via [`crate::stmt::translate_statement`], and closes the
//! debug-info hierarchy it opened.

use std::rc::Rc;

use crate::context::TranslatorContext;
use crate::error::TResult;
use crate::layout_oracle;
use crate::lvalue;
use crate::naming;
use crate::stmt;
use crate::temporaries::TemporaryAllocator;
use crate::types::ast::AstNode;
use crate::types::debug::{DebugAttributes, DebugTag};
use crate::types::ir::{FuncId, IrTypeId, Opcode};
use crate::types::layout::LayoutHome;
use crate::types::scope::{ObjectIdentifier, ScopedIdentifier, StorageClass};
use crate::types::ty::{classify, DataModelClass, FloatKind, IntMarker, IntWidth, ParamMode, Type, TypeKind};
use crate::value;

/// Translates one `FunctionDefinition` AST node, registering the new IR
/// function in `ctx.module` and returning its id.
pub fn translate_function_definition(
  ctx: &mut TranslatorContext,
  scoped_id: &Rc<ScopedIdentifier>,
  ty: &Type,
  params: &[Rc<ScopedIdentifier>],
  body: &AstNode,
) -> TResult<FuncId> {
  let func = scoped_id.as_function().expect("function-definition node's scoped-id isn't a function identifier");
  let (ret, param_mode, _variadic) = match &**ty {
    TypeKind::Function { ret, params: mode, variadic } => (ret.clone(), mode.clone(), *variadic),
    other => panic!("function-definition node's type isn't a function type: {other:?}"),
  };
  let is_kr = matches!(param_mode, ParamMode::IdentifierList(_));

  let sym = naming::function_symbol(func);
  let target = ctx.target.clone();

  let mut param_ir_types = Vec::with_capacity(params.len());
  for p in params {
    let obj = param_object(p);
    let layout = layout_oracle::resolve_layout(&obj.ty, &target, &mut ctx.module, LayoutHome::Local)?;
    param_ir_types.push(layout.layout.ir_type);
  }
  let result_ir_type = result_ir_type(ctx, &ret)?;
  let func_id = ctx.module.new_func(Some(sym), param_ir_types.into_boxed_slice(), result_ir_type);

  let mut local = ctx.init_local();
  let mut temps = TemporaryAllocator::new();

  let subprogram = ctx.push_debug_entry(DebugTag::Subprogram, DebugAttributes {
    name: Some(sym),
    linkage_name: Some(sym),
    external: matches!(func.storage, StorageClass::Extern),
    language_c11: true,
    ..Default::default()
  });
  ctx.set_current_function_debug(Some(subprogram));
  func.payload.debug_entry.set(Some(subprogram));

  local.builder.append(Opcode::FunctionEntry)?;

  // Parameters arrive on the virtual stack in declaration order, so the
  // last-declared parameter is on top; walk in reverse to pop them off in
  // the order they were pushed (`spec.md` §4.10 "Walks the parameter list
  // in reverse").
  for p in params.iter().rev() {
    let obj = param_object(p);
    stmt::ensure_local_payload(ctx, &mut local, obj, &obj.ty)?;
    if is_kr {
      // K&R identifier-list functions have no prototype in scope at their
      // call sites, so the caller applied the default-argument-conversion
      // rules (integer promotions, `float` -> `double`) before pushing the
      // argument; undo that here before storing into the narrower
      // declared parameter type (`spec.md` §4.7.2 rule 3, applied in
      // reverse at the callee's prologue).
      let promoted = default_argument_promoted_type(&obj.ty);
      crate::typeconv::convert(ctx, &mut local, &promoted, &obj.ty)?;
    }
    lvalue::translate_object_lvalue(ctx, &mut local, obj)?;
    local.builder.append(Opcode::VstackExchange(1))?;
    value::store(ctx, &mut local, &obj.ty)?;
  }

  // Variably-modified parameter types (e.g. `int a[n]` where an earlier
  // parameter supplies `n`) re-walk forward, after every parameter's own
  // value has landed in its lvalue.
  for p in params {
    let obj = param_object(p);
    stmt::emit_variably_modified_subexpressions(ctx, &mut local, &mut temps, &obj.ty, false)?;
  }

  for p in params {
    let obj = param_object(p);
    local.scope.insert(obj.name, p.clone());
    push_formal_parameter_entry(ctx, obj);
  }

  let code_begin = local.builder.current_index();
  ctx.module.debug.get_mut(subprogram).attrs.low_pc = Some(code_begin);

  stmt::translate_statement(ctx, &mut local, &mut temps, body)?;

  // A function whose body doesn't end in an explicit `return` on every
  // path (implicit `return;` for `void`, or undefined-but-common
  // fall-off for non-`void`) still needs a terminator.
  local.builder.append(Opcode::FunctionExit)?;

  let code_end = local.builder.current_index();
  ctx.module.debug.get_mut(subprogram).attrs.high_pc = Some(code_end);

  local.flow.finalize(&mut local.builder)?;

  let instructions = std::mem::take(&mut local.builder).into_instructions();
  ctx.module.bodies.insert(func_id, crate::types::ir::FunctionBody { instructions, locals_type: None });

  ctx.pop_debug_entry();
  ctx.set_current_function_debug(None);
  ctx.free(local);

  Ok(func_id)
}

fn param_object(p: &Rc<ScopedIdentifier>) -> &ObjectIdentifier {
  p.as_object().expect("function parameter resolved to a non-object identifier")
}

fn result_ir_type(ctx: &mut TranslatorContext, ret: &Type) -> TResult<Option<IrTypeId>> {
  if ret.is_void() { return Ok(None) }
  let target = ctx.target.clone();
  let layout = layout_oracle::resolve_layout(ret, &target, &mut ctx.module, LayoutHome::Module)?;
  Ok(Some(layout.layout.ir_type))
}

/// The default-argument-promoted type a value of `ty` would have arrived
/// as, had it been passed through a K&R identifier-list call site
/// (`spec.md` §4.7.2 rule 3: integer promotions, `float` -> `double`).
pub(crate) fn default_argument_promoted_type(ty: &Type) -> Type {
  match classify(&TypeKind::unqualified(ty)) {
    DataModelClass::Int8 | DataModelClass::Int16 => {
      Rc::new(TypeKind::Integer { width: IntWidth::W32, signed: true, marker: IntMarker::Plain })
    }
    DataModelClass::Float => Rc::new(TypeKind::Floating(FloatKind::F64)),
    _ => ty.clone(),
  }
}

/// Registers a bare `formal-parameter` debug entry under the current
/// subprogram. Per-variable DWARF type subtrees (base/pointer/array/...
/// entries mirroring the parameter's own `Type`) are a separate subsystem
/// this crate's AST doesn't carry source spans for yet (`NodeProperties`
/// has no decl-location field) — out of scope here; `spec.md` §8's only
/// debug-related testable property is range monotonicity on low_pc/high_pc,
/// which doesn't depend on it.
fn push_formal_parameter_entry(ctx: &mut TranslatorContext, obj: &ObjectIdentifier) {
  ctx.push_debug_entry(DebugTag::FormalParameter, DebugAttributes {
    name: Some(obj.name),
    ..Default::default()
  });
  ctx.pop_debug_entry();
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::symbol;
  use crate::types::ast::{AstKind, NodeCategory, NodeProperties};
  use crate::types::layout::TargetEnvironment;
  use crate::types::scope::{FunctionIdentifier, FunctionSpecifiers, TranslatorPayload};

  fn void_stmt() -> AstNode {
    AstNode {
      kind: AstKind::Compound { items: Vec::new() },
      category: NodeCategory::Statement,
      properties: NodeProperties::default(),
    }
  }

  fn param(name: &str, ty: Type) -> Rc<ScopedIdentifier> {
    Rc::new(ScopedIdentifier::Object(ObjectIdentifier {
      name: symbol::intern(name),
      storage: StorageClass::Auto,
      ty,
      has_initializer: false,
      asm_label: None,
      vla_object: None,
      payload: TranslatorPayload::default(),
    }))
  }

  #[test]
  fn empty_void_function_gets_an_entry_and_exit() {
    let mut ctx = TranslatorContext::new(Rc::new(TargetEnvironment::default()));
    let scoped_id = Rc::new(ScopedIdentifier::Function(FunctionIdentifier {
      storage: StorageClass::Extern,
      specifiers: FunctionSpecifiers::default(),
      linkage_name: symbol::intern("f"),
      asm_label: None,
      ty: Rc::new(TypeKind::Function { ret: TypeKind::void(), params: ParamMode::Empty, variadic: false }),
      payload: TranslatorPayload::default(),
    }));
    let ty = scoped_id.as_function().unwrap().ty.clone();
    let body = void_stmt();
    let func_id = translate_function_definition(&mut ctx, &scoped_id, &ty, &[], &body).unwrap();
    let func_body = &ctx.module.bodies[&func_id];
    assert_eq!(func_body.instructions.first().unwrap().op, Opcode::FunctionEntry);
    assert_eq!(func_body.instructions.last().unwrap().op, Opcode::FunctionExit);
  }

  #[test]
  fn kr_style_narrow_parameter_gets_a_demotion_before_store() {
    let mut ctx = TranslatorContext::new(Rc::new(TargetEnvironment::default()));
    let short_ty = Rc::new(TypeKind::Integer { width: IntWidth::W16, signed: true, marker: IntMarker::Plain });
    let params = vec![param("a", short_ty)];
    let scoped_id = Rc::new(ScopedIdentifier::Function(FunctionIdentifier {
      storage: StorageClass::Extern,
      specifiers: FunctionSpecifiers::default(),
      linkage_name: symbol::intern("g"),
      asm_label: None,
      ty: Rc::new(TypeKind::Function {
        ret: TypeKind::void(),
        params: ParamMode::IdentifierList(Box::from([symbol::intern("a")])),
        variadic: false,
      }),
      payload: TranslatorPayload::default(),
    }));
    let ty = scoped_id.as_function().unwrap().ty.clone();
    let body = void_stmt();
    let func_id = translate_function_definition(&mut ctx, &scoped_id, &ty, &params, &body).unwrap();
    let ops: Vec<_> = ctx.module.bodies[&func_id].instructions.iter().map(|i| &i.op).collect();
    assert!(ops.iter().any(|op| matches!(op, Opcode::Truncate { to: IntWidth::W16 })));
  }

  #[test]
  fn low_pc_precedes_high_pc_on_the_subprogram_entry() {
    let mut ctx = TranslatorContext::new(Rc::new(TargetEnvironment::default()));
    let scoped_id = Rc::new(ScopedIdentifier::Function(FunctionIdentifier {
      storage: StorageClass::Extern,
      specifiers: FunctionSpecifiers::default(),
      linkage_name: symbol::intern("h"),
      asm_label: None,
      ty: Rc::new(TypeKind::Function { ret: TypeKind::void(), params: ParamMode::Empty, variadic: false }),
      payload: TranslatorPayload::default(),
    }));
    let ty = scoped_id.as_function().unwrap().ty.clone();
    let body = void_stmt();
    translate_function_definition(&mut ctx, &scoped_id, &ty, &[], &body).unwrap();
    assert!(ctx.module.debug.check_range_monotonicity());
  }
}
