//! AST-to-IR translator for a C11/C23-compatible compiler front-end
//! (`spec.md` §1 "PURPOSE & SCOPE").
//!
//! The translator is a pure function of an analyzer-built, read-only AST:
//! it performs no parsing, semantic analysis, or optimization of its own
//! (`spec.md` §2 "out of scope"). [`translate_translation_unit`] is the
//! single entry point a driver calls once per translation unit; it walks
//! the top-level item list and dispatches each external declaration to the
//! matching component (`spec.md` §4.10 for function definitions; ordinary
//! file-scope declarations are the global-scope collaborator's concern and
//! are only registered here, not translated).

pub mod assignment;
pub mod block;
pub mod context;
pub mod error;
pub mod expr;
pub mod flow;
pub mod function;
pub mod initializer;
pub mod layout_oracle;
pub mod lvalue;
pub mod naming;
pub mod stmt;
pub mod symbol;
pub mod temporaries;
pub mod typeconv;
pub mod types;
pub mod value;

pub use context::{LocalContext, NodeHookCategory, ScopeLayout, TranslatorContext, TranslatorExtension};
pub use error::{ErrorKind, SourceLocation, TResult, TranslateError};
pub use types::{FuncId, IrModule, Type, TypeKind};

use std::rc::Rc;

use crate::types::ast::{AstKind, AstNode};
use crate::types::scope::ScopedIdentifier;

/// Registers a top-level declaration's identifier in the global scope and,
/// for a function definition, translates its body (`spec.md` §4.3 "init_local
/// is called once per function definition"; §2 "global-scope layout
/// assignment" is the analyzer/driver's job, not this crate's — file-scope
/// `Declaration` nodes are recorded here only so later references resolve).
fn translate_top_level_item(ctx: &mut TranslatorContext, item: &AstNode) -> TResult<()> {
  match &item.kind {
    AstKind::FunctionDefinition { scoped_id, ty, params, body } => {
      function::translate_function_definition(ctx, scoped_id, ty, params, body)?;
    }
    AstKind::Declaration(declarators) => {
      for d in declarators {
        register_global(ctx, &d.scoped_id);
      }
    }
    AstKind::StaticAssertion | AstKind::AttributeList | AstKind::AttributeDeclaration => {}
    other => panic!("unexpected top-level item kind: {other:?}"),
  }
  Ok(())
}

fn register_global(ctx: &mut TranslatorContext, scoped_id: &Rc<ScopedIdentifier>) {
  let name = match &**scoped_id {
    ScopedIdentifier::Object(o) => o.name,
    ScopedIdentifier::Function(f) => f.linkage_name,
    _ => return,
  };
  ctx.global_scope.insert(name, scoped_id.clone());
}

/// `spec.md` §3 "TranslationUnit": translates every item in file order,
/// returning on the first error (`spec.md` §7 "fails fast").
pub fn translate_translation_unit(ctx: &mut TranslatorContext, unit: &AstNode) -> TResult<()> {
  let AstKind::TranslationUnit(items) = &unit.kind else {
    panic!("translate_translation_unit called on a non-TranslationUnit node");
  };
  for item in items {
    translate_top_level_item(ctx, item)?;
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::symbol;
  use crate::types::ast::NodeProperties;
  use crate::types::layout::TargetEnvironment;
  use crate::types::scope::{FunctionIdentifier, FunctionSpecifiers};

  fn leaf(kind: AstKind) -> AstNode {
    AstNode { kind, category: crate::types::ast::NodeCategory::TranslationUnit, properties: NodeProperties::default() }
  }

  #[test]
  fn empty_translation_unit_succeeds() {
    let mut ctx = TranslatorContext::new(Rc::new(TargetEnvironment::default()));
    let unit = leaf(AstKind::TranslationUnit(Vec::new()));
    assert!(translate_translation_unit(&mut ctx, &unit).is_ok());
  }

  #[test]
  fn function_definition_item_registers_a_body() {
    let mut ctx = TranslatorContext::new(Rc::new(TargetEnvironment::default()));
    let scoped_id = Rc::new(ScopedIdentifier::Function(FunctionIdentifier {
      storage: crate::types::scope::StorageClass::Extern,
      specifiers: FunctionSpecifiers::default(),
      linkage_name: symbol::intern("f"),
      asm_label: None,
      ty: Rc::new(TypeKind::Function {
        ret: TypeKind::void(),
        params: crate::types::ty::ParamMode::Empty,
        variadic: false,
      }),
      payload: Default::default(),
    }));
    let ty = scoped_id.as_function().unwrap().ty.clone();
    let body = AstNode {
      kind: AstKind::Compound { items: Vec::new() },
      category: crate::types::ast::NodeCategory::Statement,
      properties: NodeProperties::default(),
    };
    let unit = leaf(AstKind::TranslationUnit(vec![Rc::new(AstNode {
      kind: AstKind::FunctionDefinition { scoped_id, ty, params: Vec::new(), body: Rc::new(body) },
      category: crate::types::ast::NodeCategory::Declaration,
      properties: NodeProperties::default(),
    })]));
    translate_translation_unit(&mut ctx, &unit).unwrap();
    assert_eq!(ctx.module.bodies.len(), 1);
  }
}
