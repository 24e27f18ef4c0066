//! IR block builder (`spec.md` §4.2 "C2 IR block builder").
//!
//! An append-only instruction buffer per function body. `append` is the
//! only way new instructions enter the stream; `patch_target` is the only
//! way an existing one is touched, and only ever rewrites a branch's
//! target field — forward branches are emitted with a placeholder and
//! patched once the destination is known.

use crate::error::{ErrorKind, TResult, TranslateError};
use crate::types::ir::{InstIndex, IrInstruction, Opcode};

/// Append-only sequence of opcoded instructions (`spec.md` §4.2).
#[derive(Default)]
pub struct IrBlockBuilder {
  instructions: Vec<IrInstruction>,
}

impl IrBlockBuilder {
  #[must_use] pub fn new() -> Self { Self::default() }

  /// Appends an instruction, returning the index it was inserted at.
  pub fn append(&mut self, op: Opcode) -> TResult<InstIndex> {
    let index = u32::try_from(self.instructions.len())
      .map_err(|_| TranslateError::new(ErrorKind::Oom, "instruction buffer exceeds u32::MAX entries"))?;
    self.instructions.push(IrInstruction::new(op));
    Ok(InstIndex(index))
  }

  #[must_use] pub fn current_index(&self) -> InstIndex {
    InstIndex(u32::try_from(self.instructions.len()).expect("instruction buffer overflowed u32"))
  }

  /// Rewrites the forward-branch target of a previously emitted
  /// `Jump`/`Branch`/`PushLabel` instruction (`spec.md` §4.2
  /// "patch_immediate... used for back-patching forward branches").
  pub fn patch_target(&mut self, at: InstIndex, new_target: InstIndex) {
    let inst = &mut self.instructions[at.0 as usize];
    *inst.op.target_mut().expect("patch_target called on a non-branch instruction") = new_target;
  }

  #[must_use] pub fn get(&self, at: InstIndex) -> &IrInstruction { &self.instructions[at.0 as usize] }

  #[must_use] pub fn len(&self) -> usize { self.instructions.len() }
  #[must_use] pub fn is_empty(&self) -> bool { self.instructions.is_empty() }

  #[must_use] pub fn into_instructions(self) -> Vec<IrInstruction> { self.instructions }
  #[must_use] pub fn as_slice(&self) -> &[IrInstruction] { &self.instructions }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn patch_target_rewrites_forward_jump() {
    let mut b = IrBlockBuilder::new();
    let jump = b.append(Opcode::Jump(InstIndex(0))).unwrap();
    b.append(Opcode::VstackPop).unwrap();
    let here = b.current_index();
    b.patch_target(jump, here);
    assert_eq!(b.get(jump).op, Opcode::Jump(here));
  }

  #[test]
  fn current_index_tracks_length() {
    let mut b = IrBlockBuilder::new();
    assert_eq!(b.current_index(), InstIndex(0));
    b.append(Opcode::VstackPop).unwrap();
    assert_eq!(b.current_index(), InstIndex(1));
  }
}
