//! The semantic [`Type`] data model (`spec.md` §3 "Type").
//!
//! Types are shared, immutable trees: the analyzer builds them once and
//! the translator only ever reads them, so `Rc` sharing avoids the deep
//! clones a by-value tree would require every time a type is threaded
//! through a call.

use std::rc::Rc;
use crate::symbol::Symbol;
use super::ast::Expr;

/// A semantic type. Cheap to clone (an `Rc` bump).
pub type Type = Rc<TypeKind>;

/// Integer width in bits, for the fixed-width integer family (not
/// bit-precise integers, which carry their own explicit width).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum IntWidth { W8, W16, W32, W64 }

impl IntWidth {
  #[must_use] pub fn bits(self) -> u32 {
    match self { IntWidth::W8 => 8, IntWidth::W16 => 16, IntWidth::W32 => 32, IntWidth::W64 => 64 }
  }
  #[must_use] pub fn bytes(self) -> u32 { self.bits() / 8 }
}

/// Floating-point kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FloatKind { F32, F64, LongDouble }

/// Marks whether an integer type carries the C `bool` or `char` spelling,
/// which affects overload-independent rules (e.g. character signedness is
/// configuration-dependent per `spec.md` §4.7.4).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntMarker { Plain, Bool, Char }

/// How an array's element count is known.
#[derive(Clone, Debug)]
pub enum ArrayLen {
  /// `T[]` — an incomplete array type.
  Unbounded,
  /// `T[4]` — a compile-time constant length.
  Constant(u64),
  /// `T[n]` where `n` is a non-constant but non-variable expression
  /// (already evaluated once by the analyzer; retained for
  /// documentation/debug-info purposes).
  Expression(Expr),
  /// `T[n]` where `n` is a genuinely variable-length dimension (VLA);
  /// the expression is re-evaluated at the declaration site.
  VariableLength(Expr),
}

/// A field of a structure or union.
#[derive(Clone, Debug)]
pub struct Field {
  pub name: Option<Symbol>,
  pub ty: Type,
  /// `Some(width)` if this field is a bit-field.
  pub bitfield_width: Option<u32>,
}

/// Whether a structure/union/enum type is complete (all members known).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completeness { Complete, Incomplete }

/// The aggregate kind distinguishing `struct` from `union`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AggregateKind { Struct, Union }

/// How a function type spells its parameter list.
#[derive(Clone, Debug)]
pub enum ParamMode {
  /// `f(int, long)` — a full prototype.
  Prototype(Box<[Type]>),
  /// `f(a, b)` K&R-style: only identifiers, types come from following
  /// declarations at the definition site.
  IdentifierList(Box<[Symbol]>),
  /// `f()` — nothing declared; call sites determine argument types.
  Empty,
}

/// Qualifier bits, usable as a bitflag set on a [`TypeKind::Qualified`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Qualifiers(u8);

bitflags::bitflags! {
  impl Qualifiers: u8 {
    const CONST    = 1 << 0;
    const VOLATILE = 1 << 1;
    const RESTRICT = 1 << 2;
    const ATOMIC   = 1 << 3;
  }
}

/// The type tag, `spec.md` §3 "Type".
#[derive(Clone, Debug)]
pub enum TypeKind {
  Void,
  Integer { width: IntWidth, signed: bool, marker: IntMarker },
  /// `_BitInt(N)`/`unsigned _BitInt(N)`.
  BitPrecise { bits: u32, signed: bool },
  Floating(FloatKind),
  Complex(FloatKind),
  Pointer { pointee: Type, is_null_pointer_constant_type: bool },
  Array { element: Type, len: ArrayLen },
  Aggregate { kind: AggregateKind, tag: Option<Symbol>, completeness: Completeness, fields: Box<[Field]> },
  Enum { tag: Option<Symbol>, underlying: Type, completeness: Completeness },
  Function { ret: Type, params: ParamMode, variadic: bool },
  Qualified { base: Type, quals: Qualifiers },
}

impl TypeKind {
  #[must_use] pub fn void() -> Type { Rc::new(TypeKind::Void) }

  #[must_use] pub fn is_void(&self) -> bool { matches!(self, TypeKind::Void) }

  /// Strip all qualifiers, returning the unqualified base type.
  #[must_use] pub fn unqualified(self_: &Type) -> Type {
    match &**self_ {
      TypeKind::Qualified { base, .. } => TypeKind::unqualified(base),
      _ => self_.clone(),
    }
  }

  /// The qualifier set on this type (empty if unqualified).
  #[must_use] pub fn qualifiers(self_: &Type) -> Qualifiers {
    match &**self_ {
      TypeKind::Qualified { quals, .. } => *quals,
      _ => Qualifiers::empty(),
    }
  }

  #[must_use] pub fn is_volatile(self_: &Type) -> bool {
    TypeKind::qualifiers(self_).contains(Qualifiers::VOLATILE)
  }

  #[must_use] pub fn is_atomic(self_: &Type) -> bool {
    TypeKind::qualifiers(self_).contains(Qualifiers::ATOMIC)
  }

  #[must_use] pub fn is_scalar(&self) -> bool {
    matches!(self,
      TypeKind::Integer { .. } | TypeKind::BitPrecise { .. } | TypeKind::Floating(_) |
      TypeKind::Complex(_) | TypeKind::Pointer { .. } | TypeKind::Enum { .. })
  }

  #[must_use] pub fn is_integral(&self) -> bool {
    matches!(self, TypeKind::Integer { .. } | TypeKind::BitPrecise { .. } | TypeKind::Enum { .. })
  }

  #[must_use] pub fn is_floating(&self) -> bool {
    matches!(self, TypeKind::Floating(_))
  }

  #[must_use] pub fn is_complex(&self) -> bool {
    matches!(self, TypeKind::Complex(_))
  }

  #[must_use] pub fn is_aggregate(&self) -> bool {
    matches!(self, TypeKind::Aggregate { .. })
  }

  #[must_use] pub fn is_function(&self) -> bool {
    matches!(self, TypeKind::Function { .. })
  }

  #[must_use] pub fn is_vla(&self) -> bool {
    matches!(self, TypeKind::Array { len: ArrayLen::VariableLength(_), .. })
  }
}

/// Queries the translator delegates to the (out-of-scope) type-traits
/// oracle: compatibility, signedness, and the ABI's designated
/// size/ptrdiff types (`spec.md` §6 "Consumed from the type-traits
/// oracle").
pub trait TypeTraits {
  fn is_compatible(&self, a: &Type, b: &Type) -> bool;
  fn is_signed(&self, ty: &Type) -> bool;
  /// `size_t` for this target.
  fn size_type(&self) -> Type;
  /// `ptrdiff_t` for this target.
  fn ptrdiff_type(&self) -> Type;
  /// Whether plain `char` is signed on this target/configuration.
  fn character_type_signedness(&self) -> bool;
  /// A type substituted for an incomplete/function referent under
  /// `ext_pointer_arithmetics` (`spec.md` §4.7.4).
  fn incomplete_type_substitute(&self) -> Type;
}

/// The per-type classification the translator's opcode selection is keyed
/// on (`spec.md` §4.7.4 "data-model classification").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataModelClass {
  Int8, Int16, Int32, Int64,
  Float, Double, LongDouble,
  ComplexFloat, ComplexDouble, ComplexLongDouble,
  BitInt(u32),
}

/// Structural type-compatibility comparison (`spec.md` §6
/// `types_compatible_p`), approximating C11 6.2.7. The two top-level
/// arguments have their own qualifiers stripped first, matching
/// `__builtin_types_compatible_p`'s documented "compares the unqualified
/// versions" behavior; qualifiers nested further in (a pointer's pointee,
/// an array's element) still participate.
#[must_use] pub fn types_compatible(a: &Type, b: &Type) -> bool {
  compatible(&TypeKind::unqualified(a), &TypeKind::unqualified(b))
}

fn compatible(a: &Type, b: &Type) -> bool {
  match (&**a, &**b) {
    (TypeKind::Void, TypeKind::Void) => true,
    (TypeKind::Integer { width: w1, signed: s1, .. }, TypeKind::Integer { width: w2, signed: s2, .. }) => w1 == w2 && s1 == s2,
    (TypeKind::BitPrecise { bits: b1, signed: s1 }, TypeKind::BitPrecise { bits: b2, signed: s2 }) => b1 == b2 && s1 == s2,
    (TypeKind::Floating(k1), TypeKind::Floating(k2)) => k1 == k2,
    (TypeKind::Complex(k1), TypeKind::Complex(k2)) => k1 == k2,
    (TypeKind::Pointer { pointee: p1, .. }, TypeKind::Pointer { pointee: p2, .. }) => qualified_compatible(p1, p2),
    (TypeKind::Array { element: e1, len: l1 }, TypeKind::Array { element: e2, len: l2 }) => {
      array_lens_compatible(l1, l2) && qualified_compatible(e1, e2)
    }
    (TypeKind::Aggregate { kind: k1, tag: t1, .. }, TypeKind::Aggregate { kind: k2, tag: t2, .. }) => {
      k1 == k2 && t1.is_some() && t1 == t2
    }
    (TypeKind::Enum { tag: t1, .. }, TypeKind::Enum { tag: t2, .. }) => t1.is_some() && t1 == t2,
    (TypeKind::Function { ret: r1, params: p1, variadic: v1 }, TypeKind::Function { ret: r2, params: p2, variadic: v2 }) => {
      v1 == v2 && qualified_compatible(r1, r2) && params_compatible(p1, p2)
    }
    _ => false,
  }
}

fn qualified_compatible(a: &Type, b: &Type) -> bool {
  TypeKind::qualifiers(a) == TypeKind::qualifiers(b) && compatible(&TypeKind::unqualified(a), &TypeKind::unqualified(b))
}

fn array_lens_compatible(a: &ArrayLen, b: &ArrayLen) -> bool {
  match (a, b) {
    (ArrayLen::Unbounded, _) | (_, ArrayLen::Unbounded) => true,
    (ArrayLen::Constant(n1), ArrayLen::Constant(n2)) => n1 == n2,
    _ => true,
  }
}

/// An unprototyped (`ParamMode::Empty`) side is compatible with anything,
/// matching a K&R-style declaration being compatible with any later
/// prototype (C11 6.7.6.3p15).
fn params_compatible(a: &ParamMode, b: &ParamMode) -> bool {
  match (a, b) {
    (ParamMode::Empty, _) | (_, ParamMode::Empty) => true,
    (ParamMode::Prototype(p1), ParamMode::Prototype(p2)) => {
      p1.len() == p2.len() && p1.iter().zip(p2.iter()).all(|(x, y)| qualified_compatible(x, y))
    }
    (ParamMode::IdentifierList(p1), ParamMode::IdentifierList(p2)) => p1.len() == p2.len(),
    _ => false,
  }
}

#[must_use] pub fn classify(ty: &Type) -> DataModelClass {
  match &**ty {
    TypeKind::Integer { width, .. } => match width {
      IntWidth::W8 => DataModelClass::Int8,
      IntWidth::W16 => DataModelClass::Int16,
      IntWidth::W32 => DataModelClass::Int32,
      IntWidth::W64 => DataModelClass::Int64,
    },
    TypeKind::Pointer { .. } | TypeKind::Enum { .. } => DataModelClass::Int64,
    TypeKind::BitPrecise { bits, .. } => DataModelClass::BitInt(*bits),
    TypeKind::Floating(FloatKind::F32) => DataModelClass::Float,
    TypeKind::Floating(FloatKind::F64) => DataModelClass::Double,
    TypeKind::Floating(FloatKind::LongDouble) => DataModelClass::LongDouble,
    TypeKind::Complex(FloatKind::F32) => DataModelClass::ComplexFloat,
    TypeKind::Complex(FloatKind::F64) => DataModelClass::ComplexDouble,
    TypeKind::Complex(FloatKind::LongDouble) => DataModelClass::ComplexLongDouble,
    TypeKind::Qualified { base, .. } => classify(base),
    other => unreachable!("classify called on non-arithmetic type {other:?}"),
  }
}
