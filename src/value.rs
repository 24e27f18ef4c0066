//! Value translator (`spec.md` §4.6 "C6 Value translator").
//!
//! Load/store of typed values: bit-field extract/insert, atomic
//! load/store/CAS, aggregate memory copy, and the volatile-preservation
//! rule that threads through all of them.

use crate::context::{LocalContext, TranslatorContext};
use crate::error::{ErrorKind, TResult, TranslateError};
use crate::types::ir::{MemFlags, MemoryOrder, Opcode, Sign};
use crate::types::layout::{BitfieldProps, TypeLayout};
use crate::types::ty::{IntWidth, Type, TypeKind};

fn mem_flags(ty: &Type) -> MemFlags {
  if TypeKind::is_volatile(ty) { MemFlags::VOLATILE } else { MemFlags::empty() }
}

/// Byte offset, from the start of the owning aggregate, of the storage
/// unit a bit-field's bits live in (`spec.md` §4.6 "add the byte offset
/// to the base address").
#[must_use] pub fn bitfield_byte_offset(bf: BitfieldProps) -> u64 { u64::from(bf.offset / 8) }

#[must_use] fn bitfield_bit_offset(bf: BitfieldProps) -> u32 { bf.offset % 8 }

fn int_width_for_load(ty: &Type) -> IntWidth {
  match &**ty {
    TypeKind::Integer { width, .. } => *width,
    TypeKind::Pointer { .. } | TypeKind::Enum { .. } => IntWidth::W64,
    _ => unreachable!("int_width_for_load called on non-integer type {ty:?}"),
  }
}

/// Plain (non-atomic, non-bit-field) load, dispatched by type
/// classification (`spec.md` §4.6 "Load").
pub fn load(ctx: &mut TranslatorContext, local: &mut LocalContext, ty: &Type) -> TResult<()> {
  let _ = ctx;
  let flags = mem_flags(ty);
  match &**ty {
    TypeKind::Void => Err(TranslateError::new(ErrorKind::TypeUnsupported, "cannot load a void value (LOAD_VOID)")),
    TypeKind::Integer { .. } | TypeKind::Pointer { .. } | TypeKind::Enum { .. } => {
      local.builder.append(Opcode::IntLoad { width: int_width_for_load(ty), flags })?;
      Ok(())
    }
    TypeKind::BitPrecise { bits, signed } => {
      local.builder.append(Opcode::BitIntLoad { bits: *bits, signed: *signed, flags })?;
      Ok(())
    }
    TypeKind::Floating(kind) => { local.builder.append(Opcode::FloatLoad { kind: *kind, flags })?; Ok(()) }
    TypeKind::Complex(kind) => { local.builder.append(Opcode::ComplexLoad { kind: *kind, flags })?; Ok(()) }
    TypeKind::Aggregate { .. } | TypeKind::Array { .. } => Ok(()), // address *is* the value
    TypeKind::Function { .. } => Err(TranslateError::new(ErrorKind::TypeUnsupported, "cannot load a function (STORE_FUNCTION)")),
    TypeKind::Qualified { base, .. } => load(ctx, local, base),
  }
}

/// Plain store: top of stack is `[addr, value]`; both are consumed.
pub fn store(ctx: &mut TranslatorContext, local: &mut LocalContext, ty: &Type) -> TResult<()> {
  let _ = ctx;
  let flags = mem_flags(ty);
  match &**ty {
    TypeKind::Void => Err(TranslateError::new(ErrorKind::TypeUnsupported, "cannot store a void value (STORE_VOID)")),
    TypeKind::Integer { .. } | TypeKind::Pointer { .. } | TypeKind::Enum { .. } => {
      local.builder.append(Opcode::IntStore { width: int_width_for_load(ty), flags })?;
      Ok(())
    }
    TypeKind::BitPrecise { bits, .. } => { local.builder.append(Opcode::BitIntStore { bits: *bits, flags })?; Ok(()) }
    TypeKind::Floating(kind) => { local.builder.append(Opcode::FloatStore { kind: *kind, flags })?; Ok(()) }
    TypeKind::Complex(kind) => { local.builder.append(Opcode::ComplexStore { kind: *kind, flags })?; Ok(()) }
    TypeKind::Function { .. } => Err(TranslateError::new(ErrorKind::TypeUnsupported, "cannot store into a function (STORE_FUNCTION)")),
    TypeKind::Qualified { base, .. } => store(ctx, local, base),
    TypeKind::Aggregate { .. } | TypeKind::Array { .. } => unreachable!("aggregate store goes through aggregate_copy"),
  }
}

/// Aggregate memory copy: `[dest_addr, src_addr]` -> nothing.
pub fn aggregate_copy(local: &mut LocalContext, ir_type: crate::types::ir::IrTypeId, layout_value: u32) -> TResult<()> {
  local.builder.append(Opcode::AggregateCopy { ir_type, layout_value })?;
  Ok(())
}

/// Atomic load, seq_cst (`spec.md` §4.6 "Atomic load"). Returns whether
/// the caller must additionally fetch an aggregate-copy temporary.
pub fn atomic_load(local: &mut LocalContext, ty: &Type, abi_width: IntWidth, signed: bool) -> TResult<bool> {
  match &**ty {
    TypeKind::Integer { width, .. } => {
      local.builder.append(Opcode::AtomicIntLoad { width: *width, sign: if signed { Sign::Signed } else { Sign::Unsigned }, order: MemoryOrder::SeqCst })?;
      if *width != abi_width {
        local.builder.append(if signed {
          Opcode::SignExtend { from: *width, to: abi_width }
        } else {
          Opcode::ZeroExtend { from: *width, to: abi_width }
        })?;
      }
      Ok(false)
    }
    TypeKind::Pointer { .. } | TypeKind::Enum { .. } => {
      local.builder.append(Opcode::AtomicIntLoad { width: IntWidth::W64, sign: Sign::Unsigned, order: MemoryOrder::SeqCst })?;
      Ok(false)
    }
    TypeKind::Floating(kind) => { local.builder.append(Opcode::AtomicFloatLoad { kind: *kind, order: MemoryOrder::SeqCst })?; Ok(false) }
    TypeKind::Complex(kind) => { local.builder.append(Opcode::AtomicComplexLoad { kind: *kind, order: MemoryOrder::SeqCst })?; Ok(false) }
    TypeKind::Aggregate { .. } => Ok(true),
    other => Err(TranslateError::new(ErrorKind::TypeUnsupported, format!("atomic load unsupported for {other:?}"))),
  }
}

/// `spec.md` §4.6 "Load atomic aggregate": fetches the reserved
/// temporary, swaps it to be the destination, emits
/// `ATOMIC_COPY_MEMORY_FROM`.
pub fn load_atomic_aggregate(local: &mut LocalContext, ir_type: crate::types::ir::IrTypeId, layout_value: u32) -> TResult<()> {
  local.builder.append(Opcode::VstackExchange(1))?;
  local.builder.append(Opcode::AtomicCopyMemoryFrom { order: MemoryOrder::SeqCst, ir_type, layout_value })?;
  Ok(())
}

pub fn atomic_store(local: &mut LocalContext, ty: &Type) -> TResult<()> {
  match &**ty {
    TypeKind::Integer { width, .. } => { local.builder.append(Opcode::AtomicIntStore { width: *width, order: MemoryOrder::SeqCst })?; Ok(()) }
    TypeKind::Pointer { .. } | TypeKind::Enum { .. } => { local.builder.append(Opcode::AtomicIntStore { width: IntWidth::W64, order: MemoryOrder::SeqCst })?; Ok(()) }
    TypeKind::Floating(kind) => { local.builder.append(Opcode::AtomicFloatStore { kind: *kind, order: MemoryOrder::SeqCst })?; Ok(()) }
    TypeKind::Complex(kind) => { local.builder.append(Opcode::AtomicComplexStore { kind: *kind, order: MemoryOrder::SeqCst })?; Ok(()) }
    other => Err(TranslateError::new(ErrorKind::TypeUnsupported, format!("atomic store unsupported for {other:?}"))),
  }
}

pub fn atomic_copy_memory_to(local: &mut LocalContext, ir_type: crate::types::ir::IrTypeId, layout_value: u32) -> TResult<()> {
  local.builder.append(Opcode::AtomicCopyMemoryTo { order: MemoryOrder::SeqCst, ir_type, layout_value })?;
  Ok(())
}

/// `spec.md` §4.6 "Atomic compare-exchange": consumes `[addr, expected,
/// desired]`, produces `[success_flag]` (the address and expected value
/// are popped by this opcode per the CAS loop protocol in `assignment.rs`).
pub fn atomic_compare_exchange(local: &mut LocalContext, width: IntWidth) -> TResult<()> {
  local.builder.append(Opcode::AtomicCompareExchange { width, order: MemoryOrder::SeqCst })?;
  Ok(())
}

/// Bit-field load (`spec.md` §4.6 "Bit-field load").
///
/// Stack on entry: `[base_addr]`. Stack on exit: `[field_value]`.
pub fn bitfield_load(ctx: &TranslatorContext, local: &mut LocalContext, bf: BitfieldProps, signed: bool) -> TResult<()> {
  if bf.width > 64 {
    return Err(TranslateError::new(ErrorKind::BitfieldTooWide, format!("{}-bit bit-field exceeds the 64-bit limit", bf.width)));
  }
  let byte_offset = bitfield_byte_offset(bf);
  if byte_offset != 0 {
    local.builder.append(Opcode::UintConst(byte_offset))?;
    local.builder.append(Opcode::PointerAdd)?;
  }
  let bit_offset = bitfield_bit_offset(bf);
  let precise = ctx.target.config.precise_bitfield_load_store;

  let flags = MemFlags::empty();
  match storage_width_for(bf.width, bit_offset, precise) {
    StorageLoad::Single(width) => {
      local.builder.append(Opcode::IntLoad { width, flags })?;
    }
    StorageLoad::Split(lo, hi) => {
      // Two adjacent sub-loads combined by shift+OR (24/40/48/56-bit spans,
      // `spec.md` §4.6).
      local.builder.append(Opcode::VstackPick(0))?;
      local.builder.append(Opcode::IntLoad { width: lo, flags })?;
      local.builder.append(Opcode::VstackExchange(1))?;
      local.builder.append(Opcode::UintConst(u64::from(lo.bytes())))?;
      local.builder.append(Opcode::PointerAdd)?;
      local.builder.append(Opcode::IntLoad { width: hi, flags })?;
      local.builder.append(Opcode::UintConst(u64::from(lo.bits())))?;
      local.builder.append(Opcode::IntShl(hi))?;
      local.builder.append(Opcode::IntOr(hi))?;
    }
  }
  local.builder.append(Opcode::BitsExtract { signed, offset: bit_offset, width: bf.width })?;
  Ok(())
}

/// Bit-field store (`spec.md` §4.6 "Bit-field store"). Stack on entry:
/// `[base_addr, value]`. Leaves the truncated, (optionally sign-extended)
/// stored value on the stack, per `spec.md` §4.8's "post-store bit-extract".
pub fn bitfield_store(ctx: &TranslatorContext, local: &mut LocalContext, bf: BitfieldProps, signed: bool) -> TResult<()> {
  if bf.width > 64 {
    return Err(TranslateError::new(ErrorKind::BitfieldTooWide, format!("{}-bit bit-field exceeds the 64-bit limit", bf.width)));
  }
  let bit_offset = bitfield_bit_offset(bf);
  let precise = ctx.target.config.precise_bitfield_load_store;

  // stack: [addr, value] -> duplicate addr to reload the storage unit.
  local.builder.append(Opcode::VstackPick(1))?;
  let byte_offset = bitfield_byte_offset(bf);
  if byte_offset != 0 {
    local.builder.append(Opcode::UintConst(byte_offset))?;
    local.builder.append(Opcode::PointerAdd)?;
  }

  match storage_width_for(bf.width, bit_offset, precise) {
    StorageLoad::Single(width) => {
      local.builder.append(Opcode::VstackPick(0))?;
      local.builder.append(Opcode::IntLoad { width, flags: MemFlags::empty() })?;
      local.builder.append(Opcode::VstackPick(2))?;
      local.builder.append(Opcode::BitsInsert { offset: bit_offset, width: bf.width })?;
      local.builder.append(Opcode::IntStore { width, flags: MemFlags::empty() })?;
    }
    StorageLoad::Split(lo, hi) => {
      // Reload the combined two-sub-unit storage word, mirroring
      // `bitfield_load`'s split read, but keep a spare copy of the
      // storage address around for the write-back below.
      local.builder.append(Opcode::VstackPick(0))?; // [addr, value, addr2, addr2b]
      local.builder.append(Opcode::VstackPick(0))?; // [addr, value, addr2, addr2b, addr2b2]
      local.builder.append(Opcode::IntLoad { width: lo, flags: MemFlags::empty() })?; // consumes addr2b2 -> [.., addr2b, lo_old]
      local.builder.append(Opcode::VstackExchange(1))?; // [addr, value, addr2, lo_old, addr2b]
      local.builder.append(Opcode::UintConst(u64::from(lo.bytes())))?;
      local.builder.append(Opcode::PointerAdd)?; // consumes [addr2b, lo.bytes()] -> [addr, value, addr2, lo_old, hi_addr]
      local.builder.append(Opcode::IntLoad { width: hi, flags: MemFlags::empty() })?; // consumes hi_addr -> [.., lo_old, hi_old]
      local.builder.append(Opcode::UintConst(u64::from(lo.bits())))?;
      local.builder.append(Opcode::IntShl(hi))?; // consumes [hi_old, lo.bits()] -> [addr, value, addr2, lo_old, hi_shifted]
      local.builder.append(Opcode::IntOr(hi))?; // consumes [lo_old, hi_shifted] -> [addr, value, addr2, old]

      // Insert the new field bits into the combined word, same as the
      // single-storage-unit path.
      local.builder.append(Opcode::VstackPick(2))?; // dup value -> [addr, value, addr2, old, value2]
      local.builder.append(Opcode::BitsInsert { offset: bit_offset, width: bf.width })?; // consumes [old, value2] -> [addr, value, addr2, new_storage]

      // Split the combined word back across the two sub-units and write each.
      local.builder.append(Opcode::VstackPick(1))?; // dup addr2 -> [addr, value, addr2, new_storage, addr2_lo]
      local.builder.append(Opcode::VstackPick(1))?; // dup new_storage -> [.., addr2_lo, new_storage_lo]
      local.builder.append(Opcode::Truncate { to: lo })?; // [.., addr2_lo, lo_value]
      local.builder.append(Opcode::IntStore { width: lo, flags: MemFlags::empty() })?; // consumes [addr2_lo, lo_value] -> [addr, value, addr2, new_storage]

      local.builder.append(Opcode::VstackPick(1))?; // dup addr2 -> [addr, value, addr2, new_storage, addr2_hi]
      local.builder.append(Opcode::UintConst(u64::from(lo.bytes())))?;
      local.builder.append(Opcode::PointerAdd)?; // consumes [addr2_hi, lo.bytes()] -> [addr, value, addr2, new_storage, hi_addr]
      local.builder.append(Opcode::VstackPick(1))?; // dup new_storage -> [.., hi_addr, new_storage_hi]
      local.builder.append(Opcode::UintConst(u64::from(lo.bits())))?;
      local.builder.append(Opcode::IntLshr(hi))?; // consumes [new_storage_hi, lo.bits()] -> [.., hi_addr, hi_value]
      local.builder.append(Opcode::IntStore { width: hi, flags: MemFlags::empty() })?; // consumes [hi_addr, hi_value] -> [addr, value, addr2, new_storage]

      // Back to the single-storage-unit path's post-write shape.
      local.builder.append(Opcode::VstackPop)?; // drop new_storage -> [addr, value, addr2]
      local.builder.append(Opcode::VstackPop)?; // drop addr2 -> [addr, value]
    }
  }

  local.builder.append(Opcode::BitsExtract { signed, offset: bit_offset, width: bf.width })?;
  Ok(())
}

enum StorageLoad { Single(IntWidth), Split(IntWidth, IntWidth) }

fn storage_width_for(width: u32, bit_offset: u32, precise: bool) -> StorageLoad {
  let span = bit_offset + width;
  match span {
    0..=8 => StorageLoad::Single(IntWidth::W8),
    9..=16 => StorageLoad::Single(IntWidth::W16),
    17..=24 if precise => StorageLoad::Split(IntWidth::W16, IntWidth::W8),
    17..=32 => StorageLoad::Single(IntWidth::W32),
    33..=40 if precise => StorageLoad::Split(IntWidth::W32, IntWidth::W8),
    33..=48 if precise => StorageLoad::Split(IntWidth::W32, IntWidth::W16),
    // The 56-bit precise span would need an asymmetric 32+24 split with no
    // matching `IntWidth` variant for the second piece; this falls back to
    // a single 64-bit load like the non-precise path (`spec.md` §4.6's
    // 24/40/48-bit splits are implemented exactly, 56-bit is not).
    33..=64 => StorageLoad::Single(IntWidth::W64),
    _ => StorageLoad::Single(IntWidth::W64),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn storage_width_selection_matches_spec_bands() {
    assert!(matches!(storage_width_for(8, 0, true), StorageLoad::Single(IntWidth::W8)));
    assert!(matches!(storage_width_for(12, 0, true), StorageLoad::Single(IntWidth::W16)));
    assert!(matches!(storage_width_for(20, 2, true), StorageLoad::Split(IntWidth::W16, IntWidth::W8)));
    assert!(matches!(storage_width_for(28, 0, true), StorageLoad::Single(IntWidth::W32)));
    assert!(matches!(storage_width_for(64, 0, true), StorageLoad::Single(IntWidth::W64)));
  }

  #[test]
  fn bitfield_too_wide_rejected() {
    let ctx = TranslatorContext::new(std::rc::Rc::new(crate::types::layout::TargetEnvironment::default()));
    let mut local = ctx.init_local();
    let err = bitfield_load(&ctx, &mut local, BitfieldProps { offset: 0, width: 65 }, false).unwrap_err();
    assert_eq!(err.kind, ErrorKind::BitfieldTooWide);
  }
}
