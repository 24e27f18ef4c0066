//! The AST node data model (`spec.md` §3 "ASTNode").
//!
//! The analyzer (out of scope) builds this tree and populates every node's
//! `properties` before the translator ever sees it; the translator only
//! reads it (`spec.md` §5 "The AST is read-only to the translator").

use std::rc::Rc;
use smallvec::SmallVec;
use crate::symbol::Symbol;
use crate::types::ty::Type;
use crate::types::scope::{ScopedIdentifier, StorageClass, ObjectId};

/// A reference-counted expression subtree — cheap to share when a node
/// (e.g. a generic-selection arm, or a desugared compound-assignment
/// operand) is referenced from more than one place.
pub type Expr = Rc<AstNode>;

/// The analyzer-assigned category of a node (`spec.md` §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeCategory {
  Expression,
  Type,
  Declaration,
  InitDeclarator,
  Statement,
  InlineAssembly,
  TranslationUnit,
}

/// Whether an expression designates an object/function (and is therefore
/// addressable) or is a pure value (`spec.md` §3 "value category").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueCategory {
  Lvalue,
  Rvalue,
  /// Names a function; neither an ordinary lvalue nor a loadable rvalue —
  /// only `&`, a call, or implicit decay apply.
  FunctionDesignator,
}

/// A reserved compiler temporary's identity, installed by the analyzer
/// (`spec.md` §4.4, §4.7.2 "reserved temporary").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TemporaryId(pub u32);

/// Bit-field placement info carried on an expression node that designates
/// a bit-field member, mirrored from the owning [`crate::types::layout::TypeLayout`]
/// so the translator need not re-resolve it (`spec.md` §6 "bitfield
/// width/storage-unit info").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BitfieldInfo {
  pub storage_unit_bits: u32,
  pub bit_offset: u32,
  pub bit_width: u32,
}

/// Properties populated by the analyzer on every expression node
/// (`spec.md` §3 "for expressions additionally").
#[derive(Clone, Debug, Default)]
pub struct ExpressionProps {
  pub ty: Option<Type>,
  pub value_category: Option<ValueCategory>,
  pub is_atomic: bool,
  pub bitfield: Option<BitfieldInfo>,
  /// A temporary reserved up front by the analyzer (compound literal,
  /// `va_arg` destination, aggregate call result, atomic aggregate load).
  pub reserved_temporary: Option<TemporaryId>,
  pub scoped_id: Option<Rc<ScopedIdentifier>>,
  /// Set when an address-taken subexpression's value must survive past
  /// normal evaluation order (`spec.md` §6 "preserved-after-eval temporary").
  pub preserved_temporary: Option<TemporaryId>,
}

/// Properties populated by the analyzer on every declaration node
/// (`spec.md` §3 "for declarations").
#[derive(Clone, Debug, Default)]
pub struct DeclarationProps {
  pub storage: Option<StorageClass>,
  /// The type as written, before array/function decay.
  pub pre_decay_type: Option<Type>,
  pub scoped_id: Option<Rc<ScopedIdentifier>>,
}

/// The flow-control point a label or `goto` resolves against (`spec.md`
/// §6 "for labels — a flow-control point"). Opaque to the translator core;
/// it forwards this to the flow-control collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlowPoint(pub u32);

/// The per-node property record every [`AstNode`] carries (`spec.md` §3
/// "every arm carries a `properties` record").
#[derive(Clone, Debug, Default)]
pub struct NodeProperties {
  pub expr: ExpressionProps,
  pub decl: DeclarationProps,
  pub flow: Option<FlowPoint>,
}

/// Integer constant literal, already classified by the analyzer.
#[derive(Clone, Copy, Debug)]
pub enum IntLiteral {
  I32(i32), U32(u32), I64(i64), U64(u64),
  Char(i8), Bool(bool),
}

#[derive(Clone, Copy, Debug)]
pub enum FloatLiteral { F32(f32), F64(f64), LongDouble(f64) }

/// A builtin call, pre-classified by name (`spec.md` §6 "Builtins").
#[derive(Clone, Debug)]
pub enum Builtin {
  VaStart(Expr, Expr),
  VaEnd(Expr),
  VaArg(Expr, Type),
  VaCopy(Expr, Expr),
  Alloca(Expr),
  AllocaWithAlign(Expr, Expr),
  AllocaWithAlignAndMax(Expr, Expr, Expr),
  Offsetof(Type, Symbol),
  TypesCompatibleP(Type, Type),
  ChooseExpr(Expr),
  ConstantP(Expr),
  ClassifyType(Expr),
  Inf(FloatKindLiteral),
  Nan(FloatKindLiteral, Box<str>),
  AddOverflow(Expr, Expr, Expr),
  SubOverflow(Expr, Expr, Expr),
  MulOverflow(Expr, Expr, Expr),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FloatKindLiteral { F32, F64, LongDouble }

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp { Plus, Minus, BitNot, LogicalNot, PreInc, PreDec, PostInc, PostDec, AddressOf, Deref, SizeOf, AlignOf }

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
  Add, Sub, Mul, Div, Mod,
  Eq, Ne, Lt, Le, Gt, Ge,
  Shl, Shr, BitAnd, BitOr, BitXor,
  LogicalAnd, LogicalOr,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignOp {
  Simple,
  Add, Sub, Mul, Div, Mod,
  Shl, Shr, BitAnd, BitOr, BitXor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemberAccess { Direct, Indirect }

/// A single `case` label: a constant, or an inclusive range (GNU extension).
#[derive(Clone, Debug)]
pub enum CaseLabel { Single(i128), Range(i128, i128) }

/// Inline-assembly operand (`spec.md` §6 "Inline assembly").
#[derive(Clone, Debug)]
pub struct AsmOperand {
  pub constraint: Box<str>,
  pub explicit_register: Option<Symbol>,
  pub expr: Expr,
}

bitflags::bitflags! {
  #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
  pub struct AsmQualifiers: u8 {
    const VOLATILE = 1 << 0;
    const INLINE   = 1 << 1;
    const GOTO     = 1 << 2;
  }
}

#[derive(Clone, Debug)]
pub struct InlineAsm {
  pub template: Box<str>,
  pub outputs: Vec<AsmOperand>,
  pub inputs: Vec<AsmOperand>,
  pub clobbers: Vec<Symbol>,
  pub jump_labels: Vec<Symbol>,
  pub qualifiers: AsmQualifiers,
}

/// A declarator sharing specifiers with siblings in the same `declaration`
/// (`spec.md` §3 "declaration (list of init-declarators sharing
/// specifiers)").
#[derive(Clone, Debug)]
pub struct InitDeclarator {
  pub scoped_id: Rc<ScopedIdentifier>,
  pub ty: Type,
  pub initializer: Option<Expr>,
  pub vla_object: Option<ObjectId>,
}

/// `spec.md` §3 "ASTNode": the tagged variant covering every node kind the
/// analyzer may hand the translator. Each arm implicitly carries a
/// [`NodeProperties`] record via the enclosing [`AstNode`] wrapper.
#[derive(Clone, Debug)]
pub enum AstKind {
  // -- expressions --
  IntConstant(IntLiteral),
  FloatConstant(FloatLiteral),
  ComplexConstant(FloatLiteral, FloatLiteral),
  BitPreciseConstant { bits: u32, signed: bool, value: SmallVec<[u64; 2]> },
  CharConstant(i8),
  BoolConstant(bool),
  StringLiteral { encoding: u8, bytes: Box<[u8]> },
  Identifier(Symbol),
  GenericSelection { resolved_arm: Expr },
  CompoundLiteral { ty: Type, initializer: Expr },
  Cast { target: Type, operand: Expr },
  /// `array_first` records whether the source wrote `a[b]` (the array
  /// operand first) or `b[a]`, so the translator can evaluate operands in
  /// textual order (`spec.md` §4.7).
  ArraySubscript { array: Expr, index: Expr, array_first: bool },
  Member { base: Expr, field: Symbol, access: MemberAccess },
  Call { callee: Expr, args: Vec<Expr> },
  Unary { op: UnaryOp, operand: Expr },
  Binary { op: BinaryOp, lhs: Expr, rhs: Expr },
  Ternary { cond: Expr, then_branch: Expr, else_branch: Expr },
  Comma { lhs: Expr, rhs: Expr },
  Assignment { op: AssignOp, lhs: Expr, rhs: Expr },
  BuiltinCall(Builtin),
  LabelAddress(Symbol),
  StatementExpression { items: Vec<Expr> },

  // -- statements --
  Labeled { label: Symbol, stmt: Expr },
  Case { label: CaseLabel, stmt: Expr },
  Default { stmt: Expr },
  ExpressionStatement(Option<Expr>),
  Compound { items: Vec<Expr> },
  If { cond: Expr, then_branch: Expr, else_branch: Option<Expr> },
  Switch { controlling: Expr, body: Expr },
  While { cond: Expr, body: Expr },
  DoWhile { body: Expr, cond: Expr },
  For { init: Option<Expr>, cond: Option<Expr>, step: Option<Expr>, body: Expr },
  Goto(Symbol),
  GotoComputed(Expr),
  Continue,
  Break,
  Return(Option<Expr>),
  InlineAsmStatement(InlineAsm),

  // -- top level --
  TranslationUnit(Vec<Expr>),
  FunctionDefinition { scoped_id: Rc<ScopedIdentifier>, ty: Type, params: Vec<Rc<ScopedIdentifier>>, body: Expr },
  Declaration(Vec<InitDeclarator>),
  TypeName(Type),
  StaticAssertion,
  AttributeList,
  AttributeDeclaration,
  /// Escape hatch for plugin-defined node kinds (`spec.md` §4.3
  /// "translate_extension_node").
  ExtensionNode { tag: Symbol, payload: Expr },
}

/// A node in the AST, with its analyzer-populated properties (`spec.md`
/// §3 "every arm carries a `properties` record").
#[derive(Clone, Debug)]
pub struct AstNode {
  pub kind: AstKind,
  pub category: NodeCategory,
  pub properties: NodeProperties,
}

impl AstNode {
  #[must_use] pub fn expr_ty(&self) -> Option<&Type> { self.properties.expr.ty.as_ref() }
  #[must_use] pub fn value_category(&self) -> Option<ValueCategory> { self.properties.expr.value_category }
  #[must_use] pub fn is_lvalue(&self) -> bool { self.value_category() == Some(ValueCategory::Lvalue) }
}
