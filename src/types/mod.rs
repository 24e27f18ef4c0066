//! The translator's data model (`spec.md` §3): types, layouts, scoped
//! identifiers, AST nodes, the IR, and debug information.

pub mod ty;
pub mod layout;
pub mod scope;
pub mod ast;
pub mod ir;
pub mod debug;

pub use ty::{Type, TypeKind, Qualifiers, IntWidth};
pub use layout::{TypeLayout, TargetEnvironment, TranslatorConfiguration, Signedness};
pub use scope::{ScopedIdentifier, StorageClass, ObjectId};
pub use ast::{AstNode, ExpressionProps, DeclarationProps, ValueCategory};
pub use ir::{IrModule, IrInstruction, Opcode, IrTypeId, FuncId, MemoryOrder};
pub use debug::{DebugTree, DebugEntryId, DebugTag};
