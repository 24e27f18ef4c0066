//! Flow-control collaborator (`spec.md` §4.9's statement translator leans
//! on this for `goto`, computed `goto`, `break`/`continue`, and `switch`
//! dispatch; §6 "for labels — a flow-control point").
//!
//! Labels are forward-declarable in C, so a `goto` or `&&label` reached
//! before its target has been emitted gets a placeholder `Jump`/
//! `PushLabel` and a pending entry here; once the label's instruction
//! index is known the pending entries against its [`FlowPoint`] are
//! patched via [`crate::block::IrBlockBuilder::patch_target`]. `break`/
//! `continue` and `switch` dispatch follow the same append-now,
//! patch-later discipline against an explicit loop/switch frame stack
//! rather than a label: neither a loop's `continue` target (a `do`/
//! `while`'s condition re-check is only known after the body has been
//! walked) nor a `switch`'s exit (its dispatch chain is emitted after
//! the body too) is known at the point the jump into it is emitted, so
//! both collect placeholders for the caller to patch once the real
//! target instruction exists.

use hashbrown::HashMap;

use crate::block::IrBlockBuilder;
use crate::error::{ErrorKind, TResult, TranslateError};
use crate::types::ast::{CaseLabel, FlowPoint};
use crate::types::ir::{InstIndex, Opcode};

enum Frame {
  Loop { continue_patches: Vec<InstIndex>, break_patches: Vec<InstIndex> },
  Switch { cases: Vec<(CaseLabel, InstIndex)>, default_target: Option<InstIndex>, break_patches: Vec<InstIndex> },
}

/// Per-function flow-control state; lives on [`crate::context::LocalContext`]
/// next to the instruction buffer it patches.
#[derive(Default)]
pub struct FlowController {
  labels: HashMap<FlowPoint, InstIndex>,
  pending_gotos: Vec<(FlowPoint, InstIndex)>,
  pending_label_addresses: Vec<(FlowPoint, InstIndex)>,
  frames: Vec<Frame>,
}

impl FlowController {
  #[must_use] pub fn new() -> Self { Self::default() }

  /// Called when a `Labeled` statement is translated: records where
  /// control resumes for every `goto`/`&&label` targeting this point.
  pub fn define_label(&mut self, point: FlowPoint, at: InstIndex) {
    self.labels.insert(point, at);
  }

  /// `goto label;` (`spec.md` §4.9 "Goto"). Emits a `Jump` to `point`,
  /// resolved immediately if the label is already known, or queued for
  /// [`Self::finalize`] otherwise.
  pub fn emit_goto(&mut self, builder: &mut IrBlockBuilder, point: FlowPoint) -> TResult<()> {
    let at = builder.append(Opcode::Jump(InstIndex(0)))?;
    match self.labels.get(&point) {
      Some(&target) => builder.patch_target(at, target),
      None => self.pending_gotos.push((point, at)),
    }
    Ok(())
  }

  /// `&&label` (`spec.md` §4.7 "Label address"). Emits a `PushLabel`,
  /// resolved the same way as [`Self::emit_goto`].
  pub fn emit_label_address(&mut self, builder: &mut IrBlockBuilder, point: FlowPoint) -> TResult<()> {
    let at = builder.append(Opcode::PushLabel(InstIndex(0)))?;
    match self.labels.get(&point) {
      Some(&target) => builder.patch_target(at, target),
      None => self.pending_label_addresses.push((point, at)),
    }
    Ok(())
  }

  /// Resolves every placeholder left pending by a forward `goto`/
  /// `&&label`. Called once after the whole function body has been
  /// walked; any entry still unresolved here names a label the analyzer
  /// should have already rejected as undefined.
  pub fn finalize(&mut self, builder: &mut IrBlockBuilder) -> TResult<()> {
    for (point, at) in self.pending_gotos.drain(..) {
      let target = *self.labels.get(&point).ok_or_else(|| {
        TranslateError::new(ErrorKind::AnalysisError, "goto to a label that was never defined")
      })?;
      builder.patch_target(at, target);
    }
    for (point, at) in self.pending_label_addresses.drain(..) {
      let target = *self.labels.get(&point).ok_or_else(|| {
        TranslateError::new(ErrorKind::AnalysisError, "address of a label that was never defined")
      })?;
      builder.patch_target(at, target);
    }
    Ok(())
  }

  /// Opens a loop frame. `continue`/`break` inside it collect placeholder
  /// jumps; the caller patches them once the real targets are known via
  /// [`Self::patch_continues`] and [`Self::pop_loop`].
  pub fn push_loop(&mut self) {
    self.frames.push(Frame::Loop { continue_patches: Vec::new(), break_patches: Vec::new() });
  }

  /// Patches every `continue` inside the innermost loop frame to `target`
  /// — the condition re-check for `while`/`for`, the body entry for
  /// `do`/`while`, or the step expression for `for`. Called as soon as
  /// the statement translator knows that instruction's index, which may
  /// be before or after the loop body itself has been translated.
  pub fn patch_continues(&mut self, builder: &mut IrBlockBuilder, target: InstIndex) {
    match self.frames.last_mut() {
      Some(Frame::Loop { continue_patches, .. }) => {
        for at in continue_patches.drain(..) { builder.patch_target(at, target); }
      }
      _ => panic!("patch_continues called without a matching loop frame on top"),
    }
  }

  /// Closes the innermost loop frame, patching every `break` inside it
  /// to land just past the loop. Every `continue` must already have been
  /// patched by [`Self::patch_continues`].
  pub fn pop_loop(&mut self, builder: &mut IrBlockBuilder) {
    match self.frames.pop() {
      Some(Frame::Loop { continue_patches, break_patches }) => {
        assert!(continue_patches.is_empty(), "loop popped with unpatched continues");
        let here = builder.current_index();
        for at in break_patches { builder.patch_target(at, here); }
      }
      _ => panic!("pop_loop called without a matching loop frame on top"),
    }
  }

  pub fn push_switch(&mut self) {
    self.frames.push(Frame::Switch { cases: Vec::new(), default_target: None, break_patches: Vec::new() });
  }

  /// Records a `case` label's instruction index, for the dispatch chain
  /// the statement translator emits once the whole switch body has been
  /// walked (the body comes before the chain in program order, but the
  /// chain can only be built once every case's position is known).
  pub fn record_case(&mut self, label: CaseLabel, at: InstIndex) {
    match self.frames.last_mut() {
      Some(Frame::Switch { cases, .. }) => cases.push((label, at)),
      _ => panic!("case label outside any switch"),
    }
  }

  pub fn record_default(&mut self, at: InstIndex) {
    match self.frames.last_mut() {
      Some(Frame::Switch { default_target, .. }) => *default_target = Some(at),
      _ => panic!("default label outside any switch"),
    }
  }

  /// Closes the innermost switch frame, handing back the recorded cases,
  /// default target, and every `break` placeholder raw and unpatched.
  /// The dispatch chain a `switch` needs is emitted by the caller after
  /// the body, so the position `break` (and the body's own fallthrough)
  /// must land on isn't known until the caller finishes emitting that
  /// chain — unlike a loop, this frame can't patch its own breaks.
  #[must_use] pub fn pop_switch(&mut self) -> (Vec<(CaseLabel, InstIndex)>, Option<InstIndex>, Vec<InstIndex>) {
    match self.frames.pop() {
      Some(Frame::Switch { cases, default_target, break_patches }) => (cases, default_target, break_patches),
      _ => panic!("pop_switch called without a matching switch frame on top"),
    }
  }

  /// `continue;` targets the nearest enclosing loop, skipping over any
  /// `switch` frames in between (`spec.md` §4.9 "Continue"). Emits a
  /// placeholder `Jump` and queues it for that loop's next
  /// [`Self::patch_continues`].
  pub fn emit_continue(&mut self, builder: &mut IrBlockBuilder) -> TResult<()> {
    let at = builder.append(Opcode::Jump(InstIndex(0)))?;
    self.frames.iter_mut().rev().find_map(|f| match f {
      Frame::Loop { continue_patches, .. } => Some(continue_patches),
      Frame::Switch { .. } => None,
    }).expect("continue outside any loop").push(at);
    Ok(())
  }

  /// `break;` targets the innermost loop or switch, whichever is more
  /// deeply nested lexically (`spec.md` §4.9 "Break").
  pub fn emit_break(&mut self, builder: &mut IrBlockBuilder) -> TResult<()> {
    let at = builder.append(Opcode::Jump(InstIndex(0)))?;
    match self.frames.last_mut().expect("break outside any loop or switch") {
      Frame::Loop { break_patches, .. } | Frame::Switch { break_patches, .. } => break_patches.push(at),
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn goto_before_label_patches_on_define() {
    let mut builder = IrBlockBuilder::new();
    let mut flow = FlowController::new();
    let point = FlowPoint(1);
    flow.emit_goto(&mut builder, point).unwrap();
    builder.append(Opcode::VstackPop).unwrap();
    let label_here = builder.current_index();
    flow.define_label(point, label_here);
    flow.finalize(&mut builder).unwrap();
    assert_eq!(builder.get(InstIndex(0)).op, Opcode::Jump(label_here));
  }

  #[test]
  fn goto_after_label_resolves_immediately() {
    let mut builder = IrBlockBuilder::new();
    let mut flow = FlowController::new();
    let point = FlowPoint(2);
    let label_here = builder.current_index();
    flow.define_label(point, label_here);
    builder.append(Opcode::VstackPop).unwrap();
    flow.emit_goto(&mut builder, point).unwrap();
    assert_eq!(builder.get(InstIndex(1)).op, Opcode::Jump(label_here));
  }

  #[test]
  fn finalize_rejects_an_undefined_label() {
    let mut builder = IrBlockBuilder::new();
    let mut flow = FlowController::new();
    flow.emit_goto(&mut builder, FlowPoint(9)).unwrap();
    assert!(flow.finalize(&mut builder).is_err());
  }

  #[test]
  fn break_targets_the_innermost_frame() {
    let mut builder = IrBlockBuilder::new();
    let mut flow = FlowController::new();
    flow.push_loop();
    flow.push_switch();
    flow.emit_break(&mut builder).unwrap();
    let (_, _, switch_breaks) = flow.pop_switch();
    for at in switch_breaks { builder.patch_target(at, builder.current_index()); }
    let after_switch = builder.current_index();
    flow.patch_continues(&mut builder, after_switch);
    flow.pop_loop(&mut builder);
    match &builder.get(InstIndex(0)).op {
      Opcode::Jump(t) => assert_eq!(*t, after_switch),
      other => panic!("expected a Jump, got {other:?}"),
    }
  }

  #[test]
  fn continue_skips_over_an_enclosing_switch_frame() {
    let mut builder = IrBlockBuilder::new();
    let mut flow = FlowController::new();
    flow.push_loop();
    flow.push_switch();
    flow.emit_continue(&mut builder).unwrap();
    let (_, _, switch_breaks) = flow.pop_switch();
    assert!(switch_breaks.is_empty());
    let cond_recheck = builder.current_index();
    flow.patch_continues(&mut builder, cond_recheck);
    flow.pop_loop(&mut builder);
    assert_eq!(builder.get(InstIndex(0)).op, Opcode::Jump(cond_recheck));
  }
}
