//! The linear, opcoded intermediate representation this crate emits
//! (`spec.md` §3 "IRInstruction", "IR Module").
//!
//! Each opcode carries its own typed immediates instead of a raw
//! `[u32; 4]` — that describes a wire format for a downstream consumer, not
//! a requirement on this crate's in-memory representation, and a closed
//! `enum` is the idiomatic Rust rendition of the same information
//! (match-exhaustive, no out-of-range immediate reads).
//! [`IrBlockBuilder::patch_target`] rewrites a branch's target field in
//! place to resolve a forward reference once its destination is known.

use smallvec::SmallVec;
use hashbrown::HashMap;
use crate::symbol::Symbol;
use crate::types::ty::IntWidth;

/// Index of a named type within an [`IrModule`] or a function's locals type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IrTypeId(pub u32);

/// Index of a function declaration/body within an [`IrModule`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FuncId(pub u32);

/// Index of an interned string in the module's string pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StringId(pub u32);

/// Index of an instruction within a function's instruction buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstIndex(pub u32);

/// The memory-order immediate carried by every atomic opcode (`spec.md` §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemoryOrder { Relaxed, Acquire, Release, AcqRel, SeqCst }

/// The condition-width immediate on conditional branches (`spec.md` §6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CondWidth { W8, W32, W64 }

/// Memory-access flags (`spec.md` §4.6 "Volatile preservation").
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemFlags(u8);
bitflags::bitflags! {
  impl MemFlags: u8 {
    const VOLATILE = 1 << 0;
  }
}

/// Signedness of an arithmetic/comparison/load opcode, spelled out rather
/// than reusing [`crate::types::layout::Signedness`] so that opcode
/// pattern matches stay local to this module.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sign { Signed, Unsigned }

/// A scalar floating width, reusing the semantic [`FloatKind`](crate::types::ty::FloatKind) split.
pub use crate::types::ty::FloatKind;

/// Integer overflow-checked arithmetic kind, for `__builtin_{add,sub,mul}_overflow`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverflowOp { Add, Sub, Mul }

/// The opcode set (`spec.md` §3 "IRInstruction"), grouped by the kind of
/// operation: stack manipulation, constants, memory access, arithmetic,
/// control flow, and calls.
#[derive(Clone, Debug, PartialEq)]
pub enum Opcode {
  // -- addressing --
  UintConst(u64),
  IntConst(i64),
  Float32Const(f32),
  Float64Const(f64),
  LongDoubleConst(u128),
  GetLocal { ir_type: IrTypeId, layout_value: u32 },
  GetGlobal(Symbol),
  GetThreadLocal(Symbol),
  /// Forward reference to a label, back-patched once the label's index is known.
  PushLabel(InstIndex),
  PointerAdd,
  /// Multiply the top-of-stack integer by the size of the referenced type.
  PointerScale(u64),
  VlaElement { ir_type: IrTypeId, layout_value: u32 },

  // -- integer arithmetic (per width, signed/unsigned where it matters) --
  IntAdd(IntWidth), IntSub(IntWidth), IntNeg(IntWidth), IntNot(IntWidth),
  IntMul(IntWidth, Sign), IntDiv(IntWidth, Sign), IntMod(IntWidth, Sign),
  IntAnd(IntWidth), IntOr(IntWidth), IntXor(IntWidth),
  IntShl(IntWidth), IntLshr(IntWidth), IntAshr(IntWidth),
  Int8BoolNot, Int8BoolAnd, Int8BoolOr,
  ToBool(IntWidth),

  // -- bit-precise arithmetic, width-parametric --
  BitIntAdd(u32), BitIntSub(u32), BitIntMul(u32, Sign), BitIntDiv(u32, Sign), BitIntMod(u32, Sign),
  BitIntNegate(u32), BitIntInvert(u32),
  BitIntAnd(u32), BitIntOr(u32), BitIntXor(u32), BitIntShl(u32), BitIntShr(u32, Sign),
  BitIntToBool(u32),
  BitIntLoad { bits: u32, signed: bool, flags: MemFlags },
  BitIntStore { bits: u32, flags: MemFlags },

  // -- floating / complex arithmetic --
  FloatAdd(FloatKind), FloatSub(FloatKind), FloatMul(FloatKind), FloatDiv(FloatKind), FloatNeg(FloatKind),
  ComplexAdd(FloatKind), ComplexSub(FloatKind), ComplexMul(FloatKind), ComplexDiv(FloatKind), ComplexNeg(FloatKind),
  ComplexFromParts(FloatKind),
  ComplexRealNotZero(FloatKind), ComplexRealZero(FloatKind), ComplexToScalar(FloatKind), ScalarToComplex(FloatKind),

  // -- comparisons (push an 8-bit 0/1) --
  IntCmp { width: IntWidth, sign: Sign, op: CmpOp },
  FloatCmp { kind: FloatKind, op: CmpOp },
  BitIntCmp { bits: u32, sign: Sign, op: CmpOp },

  // -- type conversion --
  SignExtend { from: IntWidth, to: IntWidth },
  ZeroExtend { from: IntWidth, to: IntWidth },
  Truncate { to: IntWidth },
  IntToFloat { from: IntWidth, sign: Sign, to: FloatKind },
  FloatToInt { from: FloatKind, sign: Sign, to: IntWidth },
  FloatToFloat { from: FloatKind, to: FloatKind },

  // -- bit manipulation --
  BitsExtract { signed: bool, offset: u32, width: u32 },
  BitsInsert { offset: u32, width: u32 },

  // -- memory --
  IntLoad { width: IntWidth, flags: MemFlags },
  IntStore { width: IntWidth, flags: MemFlags },
  FloatLoad { kind: FloatKind, flags: MemFlags },
  FloatStore { kind: FloatKind, flags: MemFlags },
  ComplexLoad { kind: FloatKind, flags: MemFlags },
  ComplexStore { kind: FloatKind, flags: MemFlags },
  AggregateCopy { ir_type: IrTypeId, layout_value: u32 },

  AtomicIntLoad { width: IntWidth, sign: Sign, order: MemoryOrder },
  AtomicIntStore { width: IntWidth, order: MemoryOrder },
  AtomicFloatLoad { kind: FloatKind, order: MemoryOrder },
  AtomicFloatStore { kind: FloatKind, order: MemoryOrder },
  AtomicComplexLoad { kind: FloatKind, order: MemoryOrder },
  AtomicComplexStore { kind: FloatKind, order: MemoryOrder },
  AtomicCompareExchange { width: IntWidth, order: MemoryOrder },
  AtomicCopyMemoryFrom { order: MemoryOrder, ir_type: IrTypeId, layout_value: u32 },
  AtomicCopyMemoryTo { order: MemoryOrder, ir_type: IrTypeId, layout_value: u32 },

  OverflowArith { op: OverflowOp, width: IntWidth, signs: [Sign; 2] },

  // -- control --
  Jump(InstIndex),
  Branch { target: InstIndex, cond: CondWidth },
  /// Computed `goto`: pops an address (produced by `&&label` or pointer
  /// arithmetic on one) and transfers control there directly, unlike
  /// `InvokeIndirect` which pushes a return address first.
  JumpIndirect,
  InvokeDirect(FuncId),
  InvokeIndirect,
  VaStart, VaEnd, VaCopy,
  VaArg { ir_type: IrTypeId, layout_value: u32 },
  Alloca { align: u32 },
  /// Frees a single `Alloca` allocation, given its data address (`spec.md`
  /// §3 invariant (iv) "deallocated on scope exit").
  Dealloca,
  FenvSave, FenvClear, FenvUpdate,
  FunctionEntry, FunctionExit,

  // -- vstack manipulation --
  VstackPick(u32),
  VstackExchange(u32),
  VstackPop,
}

/// Comparison operators opcodes dispatch over (`spec.md` §4.7 "Comparison").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOp { Eq, Ne, Lt, Gt }

impl Opcode {
  /// `true` for opcodes whose only immediate is a forward-branch target
  /// (the only instructions [`patch_target`](super::ir::Opcode::patch_target) needs to touch).
  #[must_use] pub fn target_mut(&mut self) -> Option<&mut InstIndex> {
    match self {
      Opcode::Jump(t) | Opcode::Branch { target: t, .. } | Opcode::PushLabel(t) => Some(t),
      _ => None,
    }
  }
}

/// One instruction in a function's instruction buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct IrInstruction {
  pub op: Opcode,
}

impl IrInstruction {
  #[must_use] pub fn new(op: Opcode) -> Self { Self { op } }
}

/// A flat IR type entry (`spec.md` §3 "a flat sequence of type-entries").
#[derive(Clone, Debug)]
pub enum IrTypeEntry {
  Primitive { size: u32, align: u32 },
  Pointer,
  Array { element: IrTypeId, count: u64 },
  Struct { members: Box<[IrTypeId]> },
  Union { members: Box<[IrTypeId]> },
  BitField { storage: IrTypeId, offset: u32, width: u32 },
  LongDouble,
}

/// A named IR type, a flat list of entries describing its layout
/// (`spec.md` §3 "IR Module" — "a set of named IR types").
#[derive(Clone, Debug, Default)]
pub struct IrType {
  pub entries: Vec<IrTypeEntry>,
}

/// A function declaration (name optional, id mandatory, per `spec.md` §3).
#[derive(Clone, Debug)]
pub struct FunctionDecl {
  pub name: Option<Symbol>,
  pub id: FuncId,
  pub params: Box<[IrTypeId]>,
  pub result: Option<IrTypeId>,
}

/// A function body: its instruction buffer plus locals type id.
#[derive(Clone, Debug, Default)]
pub struct FunctionBody {
  pub instructions: Vec<IrInstruction>,
  pub locals_type: Option<IrTypeId>,
}

/// A static initializer for a symbol (`spec.md` §3 "a set of static
/// initializers keyed by symbol").
#[derive(Clone, Debug)]
pub enum StaticInitializer {
  Zeroed(u64),
  Bytes(Box<[u8]>),
  Pointer(Symbol),
}

/// The IR module: types, functions, string pool, static data, debug tree
/// (`spec.md` §3 "IR Module").
#[derive(Default)]
pub struct IrModule {
  pub types: Vec<IrType>,
  pub decls: Vec<FunctionDecl>,
  pub bodies: HashMap<FuncId, FunctionBody>,
  strings: HashMap<(Box<str>, u8), StringId>,
  pub string_pool: Vec<(Box<str>, u8)>,
  pub statics: HashMap<Symbol, StaticInitializer>,
  pub debug: crate::types::debug::DebugTree,
}

impl IrModule {
  #[must_use] pub fn new() -> Self { Self::default() }

  pub fn new_type(&mut self, ty: IrType) -> IrTypeId {
    let id = IrTypeId(u32::try_from(self.types.len()).expect("too many IR types"));
    self.types.push(ty);
    id
  }

  pub fn new_func(&mut self, name: Option<Symbol>, params: Box<[IrTypeId]>, result: Option<IrTypeId>) -> FuncId {
    let id = FuncId(u32::try_from(self.decls.len()).expect("too many functions"));
    self.decls.push(FunctionDecl { name, id, params, result });
    id
  }

  /// Register (or find) a string-pool entry, keyed by encoding + content
  /// (`spec.md` §4.7 "String literal").
  pub fn intern_string(&mut self, encoding: u8, bytes: &str) -> StringId {
    let key = (bytes.into(), encoding);
    if let Some(&id) = self.strings.get(&key) { return id }
    let id = StringId(u32::try_from(self.string_pool.len()).expect("too many strings"));
    self.string_pool.push(key.clone());
    self.strings.insert(key, id);
    id
  }
}

/// A span of IR indices attributable to one source-location, used by the
/// per-function source map (`spec.md` §3 "DebugInfo").
#[derive(Clone, Copy, Debug)]
pub struct SourceSpan {
  pub begin: InstIndex,
  pub end: InstIndex,
}

pub type SourceMap = SmallVec<[(crate::error::SourceLocation, SourceSpan); 16]>;
