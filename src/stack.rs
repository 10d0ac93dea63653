//! `StackManager` (SPEC_FULL.md §3.4, §4.5): the value stack plus the
//! control stack of frame/label/handler records that index into it.
//!
//! The source spec describes a single interleaved buffer of value, frame,
//! and handler records. This splits that into a flat `Vec<Val>` value stack
//! and a separate control stack of frame/label/handler records that each
//! remember a value-stack height -- the representation most Wasm
//! interpreters converge on, since it keeps the value stack homogeneous
//! (no tag bit per slot) while preserving every operation's O(1) cost and
//! the "popping a frame lands the value stack at base + arity" invariant.

use crate::indices::TagIndex;
use crate::module::ModuleInstance;
use crate::values::{Ref, Val};
use std::sync::Arc;

#[derive(Debug)]
pub struct CatchEntry {
    pub tag: Option<TagIndex>,
    pub target_label: u32,
    /// Whether resuming at `target_label` pushes the caught exception's
    /// reference back onto the value stack (`catch_ref`/`catch_all_ref`).
    pub ref_style: bool,
}

struct Frame {
    module: Arc<ModuleInstance>,
    ret_pc: u32,
    locals_base: usize,
    value_base: usize,
    arity: u32,
}

struct Label {
    param_n: u32,
    arity: u32,
    cont_pc: u32,
    value_base: usize,
}

struct Handler {
    try_pc: u32,
    param_n: u32,
    catches: Vec<CatchEntry>,
    value_base: usize,
    /// Index into `frames` this handler belongs to, so `branch_to`/unwind
    /// never pops a handler installed by an outer frame.
    frame_depth: usize,
}

enum Control {
    Label(Label),
    Handler(Handler),
}

/// Result of a successful `unwind_to_handler` search: the matched catch's
/// target label and the wasm call frame (by depth) the handler belongs to,
/// since that may be an ancestor of the frame that threw.
pub struct UnwindMatch {
    pub frame_depth: usize,
    pub label_depth: u32,
    pub ref_style: bool,
    pub has_payload: bool,
}

/// Running interpreter state for one call chain. A fresh `StackManager` is
/// created per top-level `Func::call`; reentrant calls (host functions
/// calling back into wasm) nest their own frames onto the same stack.
#[derive(Default)]
pub struct StackManager {
    values: Vec<Val>,
    frames: Vec<Frame>,
    control: Vec<Control>,
    locals: Vec<Val>,
}

impl StackManager {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&mut self, v: Val) {
        self.values.push(v);
    }

    pub fn pop(&mut self) -> Val {
        self.values.pop().expect("value stack underflow")
    }

    pub fn peek_top(&self) -> &Val {
        self.values.last().expect("value stack underflow")
    }

    pub fn peek_top_n(&self, off_from_top: usize) -> &Val {
        let idx = self.values.len().checked_sub(off_from_top + 1).expect("value stack underflow");
        &self.values[idx]
    }

    pub fn depth(&self) -> usize {
        self.values.len()
    }

    /// Local `i` of the current innermost frame.
    pub fn local(&self, i: u32) -> &Val {
        let base = self.frames.last().expect("no active frame").locals_base;
        &self.locals[base + i as usize]
    }

    pub fn local_mut(&mut self, i: u32) -> &mut Val {
        let base = self.frames.last().expect("no active frame").locals_base;
        &mut self.locals[base + i as usize]
    }

    pub fn current_module(&self) -> &Arc<ModuleInstance> {
        &self.frames.last().expect("no active frame").module
    }

    /// Installs a new frame. `arg_values` (already on top of the value
    /// stack, `arity_params` of them) become locals `0..arity_params`;
    /// `extra_locals` zero-initialized locals are appended after them.
    pub fn push_frame(
        &mut self,
        module: Arc<ModuleInstance>,
        ret_pc: u32,
        result_arity: u32,
        param_count: u32,
        extra_locals: impl Iterator<Item = Val>,
    ) {
        let value_base = self.values.len() - param_count as usize;
        let locals_base = self.locals.len();
        for v in self.values.drain(value_base..) {
            self.locals.push(v);
        }
        self.locals.extend(extra_locals);
        self.frames.push(Frame {
            module,
            ret_pc,
            locals_base,
            value_base,
            arity: result_arity,
        });
    }

    /// Drops everything above the frame's base plus its result arity,
    /// restores the caller's locals window, and returns the frame's
    /// recorded return PC.
    pub fn pop_frame(&mut self) -> u32 {
        let frame = self.frames.pop().expect("frame stack underflow");
        let arity = frame.arity as usize;
        let results_start = self.values.len() - arity;
        let results: Vec<Val> = self.values.split_off(results_start);
        self.values.truncate(frame.value_base);
        self.values.extend(results);
        self.locals.truncate(frame.locals_base);
        frame.ret_pc
    }

    pub fn push_label(&mut self, param_n: u32, arity: u32, cont_pc: u32) {
        self.control.push(Control::Label(Label {
            param_n,
            arity,
            cont_pc,
            value_base: self.values.len() - param_n as usize,
        }));
    }

    pub fn push_handler(&mut self, try_pc: u32, param_n: u32, catches: Vec<CatchEntry>) {
        self.control.push(Control::Handler(Handler {
            try_pc,
            param_n,
            catches,
            value_base: self.values.len() - param_n as usize,
            frame_depth: self.frames.len(),
        }));
    }

    /// Pops control records until `label_depth` labels (counting handlers as
    /// transparent to branch targeting, per the exception-handling proposal)
    /// have been popped, unwinding the value stack down to each popped
    /// label's base and finally leaving `arity` values from the branch
    /// target's continuation. Returns the continuation PC to jump to.
    pub fn branch_to(&mut self, label_depth: u32) -> u32 {
        let mut remaining = label_depth;
        loop {
            match self.control.pop().expect("control stack underflow") {
                Control::Label(l) => {
                    if remaining == 0 {
                        let arity = l.arity as usize;
                        let results_start = self.values.len() - arity;
                        let results: Vec<Val> = self.values.split_off(results_start);
                        self.values.truncate(l.value_base);
                        self.values.extend(results);
                        return l.cont_pc;
                    }
                    self.values.truncate(l.value_base);
                    remaining -= 1;
                }
                Control::Handler(_) => {
                    // Handlers don't count toward branch depth; just unwound.
                }
            }
        }
    }

    /// Finds the innermost handler whose catch list matches `tag`, searching
    /// outward across function-call frame boundaries when the throwing
    /// frame's own handlers don't catch it (SPEC_FULL.md §4.6.1: exception
    /// propagation continues up the call stack, not just up the throwing
    /// function's own control stack). Pops every label/handler above the
    /// match, and every call frame between the throw site and the handler's
    /// own frame, truncating the value/locals stacks down to each popped
    /// scope's base along the way. Returns the matched catch's target label
    /// (relative to the handler's own frame), which frame owns it, whether to
    /// push the exception ref (`catch_ref`/`catch_all_ref`), and whether to
    /// push the tag's payload values first (a specific `catch`/`catch_ref`;
    /// `catch_all`/`catch_all_ref` has no known payload shape and pushes
    /// none). The caller is responsible for resuming execution in the
    /// returned frame rather than its own, when the two differ.
    pub fn unwind_to_handler(&mut self, tag: Option<TagIndex>) -> Option<UnwindMatch> {
        loop {
            match self.control.last() {
                None => return None,
                Some(Control::Label(l)) => {
                    let value_base = l.value_base;
                    self.values.truncate(value_base);
                    self.control.pop();
                }
                Some(Control::Handler(h)) => {
                    let frame_depth = h.frame_depth;
                    let value_base = h.value_base;
                    let found = h
                        .catches
                        .iter()
                        .find(|c| c.tag == tag || c.tag.is_none())
                        .map(|c| (c.target_label, c.ref_style, c.tag.is_some()));
                    // A handler only ever belongs to the current frame or an
                    // ancestor of it; drop any frames between the throw site
                    // and this handler's own frame before deciding.
                    while self.frames.len() > frame_depth {
                        let frame = self.frames.pop().expect("frame stack underflow");
                        self.locals.truncate(frame.locals_base);
                    }
                    match found {
                        Some((label_depth, ref_style, has_payload)) => {
                            self.values.truncate(value_base);
                            return Some(UnwindMatch {
                                frame_depth,
                                label_depth,
                                ref_style,
                                has_payload,
                            });
                        }
                        None => {
                            self.control.pop();
                        }
                    }
                }
            }
        }
    }

    pub fn push_ref(&mut self, r: Ref) {
        self.push(Val::Ref(r));
    }

    pub fn pop_n(&mut self, n: usize) -> Vec<Val> {
        let start = self.values.len().checked_sub(n).expect("value stack underflow");
        self.values.split_off(start)
    }

    /// Hands back whatever remains on the value stack, emptying it. Only
    /// meaningful once every frame pushed onto this `StackManager` has
    /// returned, at which point what's left is exactly the top-level call's
    /// results.
    pub fn take_values(&mut self) -> Vec<Val> {
        std::mem::take(&mut self.values)
    }

    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    /// Depth of the control stack (labels plus handlers). Used by the
    /// dispatch loop to tell when a function body's own implicit outer label
    /// has been popped, i.e. the function is done executing.
    pub fn control_depth(&self) -> usize {
        self.control.len()
    }

    /// Number of `Label` entries at or above `base` (handlers don't count,
    /// matching `branch_to`'s own notion of depth). Used to compute the
    /// relative branch depth `return` needs to target a function's own
    /// implicit outer label, which -- unlike `br`'s -- isn't known statically
    /// by the decoder.
    pub fn label_count_from(&self, base: usize) -> u32 {
        self.control[base..]
            .iter()
            .filter(|c| matches!(c, Control::Label(_)))
            .count() as u32
    }

    /// Pops the innermost control record without touching the value stack,
    /// for the "fell off the end of a block/try_table" case where the value
    /// stack is already exactly where the label's arity says it should be.
    ///
    /// `try_table ... end` pushes a `Label` and then a `Handler` for the same
    /// scope but closes with a single `end`, so this peeks for a trailing
    /// `Handler` and pops it first, leaving the generic end-of-block dispatch
    /// unaware of which opener kind it's closing.
    pub fn end_control(&mut self) {
        if matches!(self.control.last(), Some(Control::Handler(_))) {
            self.control.pop();
        }
        self.control.pop().expect("control stack underflow");
    }
}
