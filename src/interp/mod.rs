//! The dispatch loop (SPEC_FULL.md §4): a PC-indexed walk over a decoded
//! function body's flat `Instr` sequence, driving the `StackManager` and
//! delegating operand evaluation to the sibling `numeric`/`memtable`/`refs`/
//! `vector` modules.
//!
//! `Func::call_unchecked`'s wasm arm calls straight into `call_exported`;
//! everything below it is private. Intra-module calls recurse natively
//! through `run_local` onto the same `StackManager`, so a function calling
//! another function in the same instance pays a Rust call but not a fresh
//! value/control stack; crossing a `Func` value boundary (a host import, or
//! a function belonging to a different instance) goes through `Func::call`
//! and gets its own `StackManager`, same as a fresh top-level invocation.

mod memtable;
mod numeric;
mod refs;
mod vector;

use crate::ast::{BlockType, Instr, LaneShape, LoadWidth, Signedness, VecInstr};
use crate::errors::Error;
use crate::func::Func;
use crate::indices::{FuncIndex, TagIndex};
use crate::module::{ModuleData, ModuleInstance, ResolvedFunc};
use crate::stack::{CatchEntry, StackManager, UnwindMatch};
use crate::store::Store;
use crate::trap::Trap;
use crate::types::{WasmRefType, WasmStorageType, WasmValType};
use crate::values::{Ref, Val};
use crate::waiter::WaitResult;
use std::sync::Arc;

/// Outcome of running a function body to completion: either it fell off the
/// end/returned normally, or an exception it threw was caught by a handler
/// belonging to an ancestor call frame rather than its own -- in which case
/// the caller (one level up the native call stack, corresponding to one
/// level up the wasm call stack) must check whether that ancestor is itself
/// before resuming its own dispatch loop at the handler's target label, or
/// propagating the same outcome further up.
enum Dispatch {
    Returned,
    Unwinding(UnwindMatch, TagIndex, Arc<[Val]>),
}

/// The module instance whose `GcAllocator`/type table a `ref.test`/`ref.cast`
/// of `r` must consult: the module that actually allocated a concrete
/// struct/array ref, which isn't necessarily `instance` (the one currently
/// executing) once the ref has crossed a module boundary. Non-GC ref kinds
/// have no allocating module, so `instance` itself is returned for them --
/// harmless, since their dynamic type never looks at the allocator.
fn ref_defining_module(r: &Ref, instance: &Arc<ModuleInstance>) -> Arc<ModuleInstance> {
    match r {
        Ref::Struct(g) | Ref::Array(g) => g.module(),
        _ => instance.clone(),
    }
}

/// Entry point for every wasm call, whether from the host or from a
/// recursive wasm call crossing an instance boundary. `index` is resolved
/// against `instance`'s own `resolved_funcs`, so it works whether the export
/// being invoked is locally defined or itself a re-exported import.
pub fn call_exported(
    store: &mut Store,
    instance: &Arc<ModuleInstance>,
    index: FuncIndex,
    params: &[Val],
) -> crate::Result<Vec<Val>> {
    match &instance.resolved_funcs[index.index()] {
        ResolvedFunc::Local(local_idx) => {
            let mut stack = StackManager::new();
            for p in params {
                stack.push(p.clone());
            }
            match run_local(store, &mut stack, instance, *local_idx)? {
                Dispatch::Returned => {}
                Dispatch::Unwinding(..) => {
                    unreachable!("a handler can never be registered above the outermost call frame")
                }
            }
            Ok(stack.take_values())
        }
        ResolvedFunc::Imported(f) => f.call(store, params),
    }
}

/// Runs a function already known to be locally defined in `instance`,
/// reusing the caller's `StackManager`. Installs a frame and an implicit
/// outer label spanning the whole body, runs the body to completion (normal
/// fallthrough or `return`), then collapses the frame down to its results.
fn run_local(store: &mut Store, stack: &mut StackManager, instance: &Arc<ModuleInstance>, index: FuncIndex) -> crate::Result<Dispatch> {
    if stack.frame_depth() >= store.config().max_control_stack_depth {
        return Err(Error::ResourceLimitExceeded("call stack depth exceeded".into()));
    }

    let data = instance.module.data();
    let body = data.func_bodies[index]
        .as_ref()
        .expect("a Local ResolvedFunc always names a defined function with a body");
    let type_idx = data.func_types[index];
    let func_ty = data.types.get(type_idx).unwrap_func();
    let param_count = func_ty.params.len() as u32;
    let result_arity = func_ty.results.len() as u32;

    let extra_locals = body.locals.iter().map(Val::default_for_type);
    stack.push_frame(instance.clone(), 0, result_arity, param_count, extra_locals);
    let base_control_depth = stack.control_depth();
    stack.push_label(0, result_arity, body.instrs.len() as u32);

    let (ends, elses) = compute_block_map(&body.instrs);
    match run_body(store, stack, instance, data, &body.instrs, &ends, &elses, base_control_depth)? {
        Dispatch::Returned => {
            stack.pop_frame();
            Ok(Dispatch::Returned)
        }
        // The thrown exception was caught by a handler in an ancestor frame;
        // `unwind_to_handler` already popped this frame (and everything
        // between it and the handler's own), so there's nothing left to
        // unwind here -- just forward the outcome to our own caller.
        unwinding @ Dispatch::Unwinding(..) => Ok(unwinding),
    }
}

fn block_arity(data: &ModuleData, bt: &BlockType) -> (u32, u32) {
    match bt {
        BlockType::Empty => (0, 0),
        BlockType::Value(_) => (0, 1),
        BlockType::Func(idx) => {
            let ft = data.types.get(*idx).unwrap_func();
            (ft.params.len() as u32, ft.results.len() as u32)
        }
    }
}

/// Two-pass precompute over a function body's flat instruction sequence:
/// for every `block`/`loop`/`if`/`try_table` opener, the PC of its matching
/// `end`; for every `if` with an `else`, the PC of that `else`. Avoids
/// rescanning the instruction stream at every branch the dispatch loop
/// takes.
fn compute_block_map(instrs: &[Instr]) -> (Vec<Option<usize>>, Vec<Option<usize>>) {
    let mut end = vec![None; instrs.len()];
    let mut else_ = vec![None; instrs.len()];
    let mut open: Vec<usize> = Vec::new();
    for (i, instr) in instrs.iter().enumerate() {
        match instr {
            Instr::Block(_) | Instr::Loop(_) | Instr::If(_) | Instr::TryTable(..) => open.push(i),
            Instr::Else => {
                let if_pc = *open.last().expect("else outside an if");
                else_[if_pc] = Some(i);
            }
            // A function body's decoded instruction stream always carries one
            // more `end` than there are tracked openers: the final one closes
            // the function's own implicit outer scope, pushed by `run_local`
            // itself rather than appearing as a `Block`/`Loop`/`If`/`TryTable`
            // instruction here. Nothing ever looks that `end`'s PC up in
            // `ends`/`elses`, so it's skipped rather than treated as an error.
            Instr::End => {
                if let Some(open_pc) = open.pop() {
                    end[open_pc] = Some(i);
                }
            }
            _ => {}
        }
    }
    for if_pc in 0..instrs.len() {
        if let Some(else_pc) = else_[if_pc] {
            end[else_pc] = end[if_pc];
        }
    }
    (end, else_)
}

/// Invokes `callee`, either by recursing natively onto `stack` (a call
/// staying within `caller_instance`) or by popping its arguments and going
/// through `Func::call` (a host call, or one crossing an instance
/// boundary, each of which gets its own fresh `StackManager`).
fn do_call(store: &mut Store, stack: &mut StackManager, caller_instance: &Arc<ModuleInstance>, callee: Func, param_count: usize) -> crate::Result<Dispatch> {
    match callee {
        Func::Wasm { instance, index } if Arc::ptr_eq(&instance, caller_instance) => run_local(store, stack, &instance, index),
        other => {
            let params = stack.pop_n(param_count);
            let results = other.call(store, &params)?;
            for r in results {
                stack.push(r);
            }
            Ok(Dispatch::Returned)
        }
    }
}

/// `return`'s branch target is the function's own implicit outer label,
/// which -- unlike `br`'s -- isn't known statically by the decoder; computed
/// here from how many labels are currently open above the frame's base.
fn do_return(stack: &mut StackManager, base_control_depth: usize) -> usize {
    let depth = stack.label_count_from(base_control_depth).saturating_sub(1);
    stack.branch_to(depth) as usize
}

#[allow(clippy::too_many_arguments)]
fn run_body(
    store: &mut Store,
    stack: &mut StackManager,
    instance: &Arc<ModuleInstance>,
    data: &ModuleData,
    instrs: &[Instr],
    ends: &[Option<usize>],
    elses: &[Option<usize>],
    base_control_depth: usize,
) -> crate::Result<Dispatch> {
    let mut pc: usize = 0;
    let my_frame_depth = stack.frame_depth();

    macro_rules! trap {
        ($e:expr, $op:expr) => {
            $e.map_err(|t: Trap| t.at($op, pc as u32))?
        };
    }

    // Resolves a `do_call` outcome: a normal return runs `$on_return` (which
    // advances `pc`); an exception caught by a handler belonging to this
    // frame is resolved right here (push its payload/ref, jump to the catch
    // label); one caught further up is forwarded to our own caller, since
    // only the frame that owns the handler can resume at its target label.
    macro_rules! dispatch {
        ($call:expr, $on_return:expr) => {
            match $call? {
                Dispatch::Returned => $on_return,
                Dispatch::Unwinding(m, tag, payload) if m.frame_depth == my_frame_depth => {
                    if m.has_payload {
                        for v in payload.iter().cloned() {
                            stack.push(v);
                        }
                    }
                    if m.ref_style {
                        stack.push_ref(Ref::Exn(tag, payload));
                    }
                    pc = stack.branch_to(m.label_depth) as usize;
                }
                unwinding @ Dispatch::Unwinding(..) => return Ok(unwinding),
            }
        };
    }

    loop {
        if stack.control_depth() == base_control_depth {
            return Ok(Dispatch::Returned);
        }
        let instr = &instrs[pc];

        match instr {
            Instr::Unreachable => return Err(Trap::Unreachable.at("unreachable", pc as u32).into()),
            Instr::Nop => {
                pc += 1;
            }

            Instr::Block(bt) => {
                let (p, r) = block_arity(data, bt);
                let end_pc = ends[pc].expect("block map built for this body");
                stack.push_label(p, r, (end_pc + 1) as u32);
                pc += 1;
            }
            Instr::Loop(bt) => {
                let (p, _r) = block_arity(data, bt);
                stack.push_label(p, p, (pc + 1) as u32);
                pc += 1;
            }
            Instr::If(bt) => {
                let cond = stack.pop().unwrap_i32();
                let (p, r) = block_arity(data, bt);
                let end_pc = ends[pc].expect("block map built for this body");
                stack.push_label(p, r, (end_pc + 1) as u32);
                pc = if cond != 0 {
                    pc + 1
                } else {
                    elses[pc].map(|e| e + 1).unwrap_or(end_pc)
                };
            }
            Instr::Else => {
                // Reached only by falling through the `then` arm: skip the
                // `else` arm and let the shared matching `end` close the label.
                pc = ends[pc].expect("block map built for this body");
            }
            Instr::End => {
                stack.end_control();
                pc += 1;
            }

            Instr::Br(label) => {
                pc = stack.branch_to(label.index() as u32) as usize;
            }
            Instr::BrIf(label) => {
                let cond = stack.pop().unwrap_i32();
                pc = if cond != 0 { stack.branch_to(label.index() as u32) as usize } else { pc + 1 };
            }
            Instr::BrTable(labels, default) => {
                let i = stack.pop().unwrap_i32();
                let label = labels.get(i as usize).copied().unwrap_or(*default);
                pc = stack.branch_to(label.index() as u32) as usize;
            }
            Instr::Return => {
                pc = do_return(stack, base_control_depth);
            }

            Instr::Call(idx) => {
                let func = Func::resolve(instance, *idx);
                let param_count = func.ty().params.len();
                dispatch!(do_call(store, stack, instance, func, param_count), pc += 1);
            }
            Instr::CallIndirect(table_idx, type_idx) => {
                let elem_idx = stack.pop().unwrap_i32() as u64;
                let func_ref = {
                    let table = instance.tables[table_idx.index()].lock().unwrap();
                    trap!(table.get(elem_idx), "call_indirect").clone()
                };
                let func_idx = match func_ref {
                    Ref::Func(idx) => idx,
                    Ref::Null(_) => return Err(Trap::UninitializedElement.at("call_indirect", pc as u32).into()),
                    _ => unreachable!("table element for call_indirect must be a funcref"),
                };
                let expected_ty = data.types.get(*type_idx).unwrap_func();
                let func = Func::resolve(instance, func_idx);
                if &func.ty() != expected_ty {
                    return Err(Trap::IndirectCallTypeMismatch.at("call_indirect", pc as u32).into());
                }
                let param_count = expected_ty.params.len();
                dispatch!(do_call(store, stack, instance, func, param_count), pc += 1);
            }
            Instr::ReturnCall(idx) => {
                let func = Func::resolve(instance, *idx);
                let param_count = func.ty().params.len();
                dispatch!(do_call(store, stack, instance, func, param_count), pc = do_return(stack, base_control_depth));
            }
            Instr::ReturnCallIndirect(table_idx, type_idx) => {
                let elem_idx = stack.pop().unwrap_i32() as u64;
                let func_ref = {
                    let table = instance.tables[table_idx.index()].lock().unwrap();
                    trap!(table.get(elem_idx), "return_call_indirect").clone()
                };
                let func_idx = match func_ref {
                    Ref::Func(idx) => idx,
                    Ref::Null(_) => return Err(Trap::UninitializedElement.at("return_call_indirect", pc as u32).into()),
                    _ => unreachable!("table element for call_indirect must be a funcref"),
                };
                let expected_ty = data.types.get(*type_idx).unwrap_func();
                let func = Func::resolve(instance, func_idx);
                if &func.ty() != expected_ty {
                    return Err(Trap::IndirectCallTypeMismatch.at("return_call_indirect", pc as u32).into());
                }
                let param_count = expected_ty.params.len();
                dispatch!(do_call(store, stack, instance, func, param_count), pc = do_return(stack, base_control_depth));
            }
            Instr::CallRef(type_idx) => {
                let r = stack.pop().unwrap_ref();
                if r.is_null() {
                    return Err(Trap::AccessNullFunc.at("call_ref", pc as u32).into());
                }
                let func_idx = match r {
                    Ref::Func(idx) => idx,
                    _ => unreachable!("call_ref operand must be a funcref"),
                };
                let func = Func::resolve(instance, func_idx);
                let param_count = data.types.get(*type_idx).unwrap_func().params.len();
                dispatch!(do_call(store, stack, instance, func, param_count), pc += 1);
            }
            Instr::ReturnCallRef(type_idx) => {
                let r = stack.pop().unwrap_ref();
                if r.is_null() {
                    return Err(Trap::AccessNullFunc.at("return_call_ref", pc as u32).into());
                }
                let func_idx = match r {
                    Ref::Func(idx) => idx,
                    _ => unreachable!("call_ref operand must be a funcref"),
                };
                let func = Func::resolve(instance, func_idx);
                let param_count = data.types.get(*type_idx).unwrap_func().params.len();
                dispatch!(do_call(store, stack, instance, func, param_count), pc = do_return(stack, base_control_depth));
            }

            Instr::Throw(tag_idx) => {
                let tag = instance.tags[tag_idx.index()];
                let n = data.types.get(tag.ty).unwrap_func().params.len();
                let payload: Arc<[Val]> = stack.pop_n(n).into();
                match stack.unwind_to_handler(Some(*tag_idx)) {
                    Some(m) if m.frame_depth == my_frame_depth => {
                        stack.end_control();
                        if m.has_payload {
                            for v in payload.iter().cloned() {
                                stack.push(v);
                            }
                        }
                        if m.ref_style {
                            stack.push_ref(Ref::Exn(*tag_idx, payload));
                        }
                        pc = stack.branch_to(m.label_depth) as usize;
                    }
                    // Matched, but the handler belongs to an ancestor call
                    // frame: this frame is done, let our own caller resolve
                    // or keep forwarding it.
                    Some(m) => return Ok(Dispatch::Unwinding(m, *tag_idx, payload)),
                    None => return Err(Trap::UnhandledException.at("throw", pc as u32).into()),
                }
            }
            Instr::ThrowRef => {
                let r = stack.pop().unwrap_ref();
                if r.is_null() {
                    return Err(Trap::AccessNullException.at("throw_ref", pc as u32).into());
                }
                let (tag_idx, payload) = match r {
                    Ref::Exn(tag, payload) => (tag, payload),
                    _ => unreachable!("throw_ref operand must be an exnref"),
                };
                match stack.unwind_to_handler(Some(tag_idx)) {
                    Some(m) if m.frame_depth == my_frame_depth => {
                        stack.end_control();
                        if m.has_payload {
                            for v in payload.iter().cloned() {
                                stack.push(v);
                            }
                        }
                        if m.ref_style {
                            stack.push_ref(Ref::Exn(tag_idx, payload));
                        }
                        pc = stack.branch_to(m.label_depth) as usize;
                    }
                    Some(m) => return Ok(Dispatch::Unwinding(m, tag_idx, payload)),
                    None => return Err(Trap::UnhandledException.at("throw_ref", pc as u32).into()),
                }
            }
            Instr::TryTable(bt, catches) => {
                let (p, r) = block_arity(data, bt);
                let end_pc = ends[pc].expect("block map built for this body");
                stack.push_label(p, r, (end_pc + 1) as u32);
                let entries: Vec<CatchEntry> = catches
                    .iter()
                    .map(|c| CatchEntry {
                        tag: c.tag,
                        target_label: c.label.index() as u32,
                        ref_style: c.ref_style,
                    })
                    .collect();
                stack.push_handler(pc as u32, p, entries);
                pc += 1;
            }

            Instr::Drop => {
                stack.pop();
                pc += 1;
            }
            Instr::Select(_) => {
                let cond = stack.pop().unwrap_i32();
                let val2 = stack.pop();
                let val1 = stack.pop();
                stack.push(if cond != 0 { val1 } else { val2 });
                pc += 1;
            }

            Instr::LocalGet(idx) => {
                stack.push(stack.local(idx.index() as u32).clone());
                pc += 1;
            }
            Instr::LocalSet(idx) => {
                let v = stack.pop();
                *stack.local_mut(idx.index() as u32) = v;
                pc += 1;
            }
            Instr::LocalTee(idx) => {
                let v = stack.peek_top().clone();
                *stack.local_mut(idx.index() as u32) = v;
                pc += 1;
            }
            Instr::GlobalGet(idx) => {
                let v = instance.globals[idx.index()].lock().unwrap().get().clone();
                stack.push(v);
                pc += 1;
            }
            Instr::GlobalSet(idx) => {
                let v = stack.pop();
                instance.globals[idx.index()].lock().unwrap().set(v);
                pc += 1;
            }

            Instr::TableGet(t) => {
                let i = stack.pop().unwrap_i32() as u64;
                let table = instance.tables[t.index()].lock().unwrap();
                let r = trap!(table.get(i), "table.get").clone();
                stack.push_ref(r);
                pc += 1;
            }
            Instr::TableSet(t) => {
                let r = stack.pop().unwrap_ref();
                let i = stack.pop().unwrap_i32() as u64;
                let mut table = instance.tables[t.index()].lock().unwrap();
                trap!(table.set(i, r), "table.set");
                pc += 1;
            }
            Instr::TableSize(t) => {
                let table = instance.tables[t.index()].lock().unwrap();
                stack.push(Val::I32(table.len() as i32));
                pc += 1;
            }
            Instr::TableGrow(t) => {
                let n = stack.pop().unwrap_i32();
                let init = stack.pop().unwrap_ref();
                let mut table = instance.tables[t.index()].lock().unwrap();
                let result = table.grow(n as u64, init).map(|v| v as i32).unwrap_or(-1);
                stack.push(Val::I32(result));
                pc += 1;
            }
            Instr::TableFill(t) => {
                let len = stack.pop().unwrap_i32() as u64;
                let val = stack.pop().unwrap_ref();
                let dst = stack.pop().unwrap_i32() as u64;
                let mut table = instance.tables[t.index()].lock().unwrap();
                trap!(table.fill(dst, val, len), "table.fill");
                pc += 1;
            }
            Instr::TableCopy(dst_idx, src_idx) => {
                let len = stack.pop().unwrap_i32() as u64;
                let src = stack.pop().unwrap_i32() as u64;
                let dst = stack.pop().unwrap_i32() as u64;
                let dst_arc = &instance.tables[dst_idx.index()];
                let src_arc = &instance.tables[src_idx.index()];
                if Arc::ptr_eq(dst_arc, src_arc) {
                    let mut t = dst_arc.lock().unwrap();
                    trap!(t.copy_within(dst, src, len), "table.copy");
                } else {
                    let src_table = src_arc.lock().unwrap();
                    let mut dst_table = dst_arc.lock().unwrap();
                    trap!(dst_table.copy_from(dst, &src_table, src, len), "table.copy");
                }
                pc += 1;
            }
            Instr::TableInit(t, elem_idx) => {
                let len = stack.pop().unwrap_i32() as u32;
                let src = stack.pop().unwrap_i32() as u32;
                let dst = stack.pop().unwrap_i32() as u64;
                let elem = instance.elements[elem_idx.index()].lock().unwrap();
                let mut table = instance.tables[t.index()].lock().unwrap();
                trap!(table.init(dst, elem.elems(), src, len), "table.init");
                pc += 1;
            }
            Instr::ElemDrop(elem_idx) => {
                instance.elements[elem_idx.index()].lock().unwrap().drop_segment();
                pc += 1;
            }

            Instr::I32Const(v) => {
                stack.push(Val::I32(*v));
                pc += 1;
            }
            Instr::I64Const(v) => {
                stack.push(Val::I64(*v));
                pc += 1;
            }
            Instr::F32Const(bits) => {
                stack.push(Val::F32(*bits));
                pc += 1;
            }
            Instr::F64Const(bits) => {
                stack.push(Val::F64(*bits));
                pc += 1;
            }

            Instr::IUnop(w, op) => {
                let v = stack.pop();
                stack.push(numeric::eval_iunop(*w, *op, v));
                pc += 1;
            }
            Instr::IBinop(w, op) => {
                let b = stack.pop();
                let a = stack.pop();
                stack.push(trap!(numeric::eval_ibinop(*w, *op, a, b), "ibinop"));
                pc += 1;
            }
            Instr::ITestop(w, op) => {
                let v = stack.pop();
                stack.push(numeric::eval_itestop(*w, *op, v));
                pc += 1;
            }
            Instr::IRelop(w, op) => {
                let b = stack.pop();
                let a = stack.pop();
                stack.push(numeric::eval_irelop(*w, *op, a, b));
                pc += 1;
            }
            Instr::FUnop(w, op) => {
                let v = stack.pop();
                stack.push(numeric::eval_funop(*w, *op, v));
                pc += 1;
            }
            Instr::FBinop(w, op) => {
                let b = stack.pop();
                let a = stack.pop();
                stack.push(numeric::eval_fbinop(*w, *op, a, b));
                pc += 1;
            }
            Instr::FRelop(w, op) => {
                let b = stack.pop();
                let a = stack.pop();
                stack.push(numeric::eval_frelop(*w, *op, a, b));
                pc += 1;
            }
            Instr::Cvt(op) => {
                let v = stack.pop();
                stack.push(trap!(numeric::eval_cvt(*op, v), "cvt"));
                pc += 1;
            }

            Instr::Load(width, sign, int_width, memarg) => {
                let addr = trap!(memtable::effective_addr(&stack.pop(), memarg), "load");
                let mem = instance.memories[memarg.memory_index.index()].lock().unwrap();
                stack.push(trap!(memtable::load_int(&mem, addr, *width, *sign, *int_width), "load"));
                pc += 1;
            }
            Instr::FLoad(width, memarg) => {
                let addr = trap!(memtable::effective_addr(&stack.pop(), memarg), "fload");
                let mem = instance.memories[memarg.memory_index.index()].lock().unwrap();
                stack.push(trap!(memtable::load_float(&mem, addr, *width), "fload"));
                pc += 1;
            }
            Instr::Store(width, int_width, memarg) => {
                let v = stack.pop();
                let addr = trap!(memtable::effective_addr(&stack.pop(), memarg), "store");
                let mut mem = instance.memories[memarg.memory_index.index()].lock().unwrap();
                trap!(memtable::store_int(&mut mem, addr, *width, *int_width, v), "store");
                pc += 1;
            }
            Instr::FStore(width, memarg) => {
                let v = stack.pop();
                let addr = trap!(memtable::effective_addr(&stack.pop(), memarg), "fstore");
                let mut mem = instance.memories[memarg.memory_index.index()].lock().unwrap();
                trap!(memtable::store_float(&mut mem, addr, *width, v), "fstore");
                pc += 1;
            }
            Instr::MemorySize(m) => {
                let mem = instance.memories[m.index()].lock().unwrap();
                stack.push(Val::I32(mem.page_count() as i32));
                pc += 1;
            }
            Instr::MemoryGrow(m) => {
                let delta = stack.pop().unwrap_i32() as u64;
                let mut mem = instance.memories[m.index()].lock().unwrap();
                let result = mem.grow(delta).map(|v| v as i32).unwrap_or(-1);
                stack.push(Val::I32(result));
                pc += 1;
            }
            Instr::MemoryFill(m) => {
                let len = stack.pop().unwrap_i32() as u64;
                let val = stack.pop().unwrap_i32() as u8;
                let dst = stack.pop().unwrap_i32() as u64;
                let mut mem = instance.memories[m.index()].lock().unwrap();
                trap!(mem.fill(dst, val, len), "memory.fill");
                pc += 1;
            }
            Instr::MemoryCopy(dst_idx, src_idx) => {
                let len = stack.pop().unwrap_i32() as u64;
                let src = stack.pop().unwrap_i32() as u64;
                let dst = stack.pop().unwrap_i32() as u64;
                let dst_arc = &instance.memories[dst_idx.index()];
                let src_arc = &instance.memories[src_idx.index()];
                if Arc::ptr_eq(dst_arc, src_arc) {
                    let mut m = dst_arc.lock().unwrap();
                    trap!(m.copy_within(dst, src, len), "memory.copy");
                } else {
                    let src_mem = src_arc.lock().unwrap();
                    let mut dst_mem = dst_arc.lock().unwrap();
                    trap!(dst_mem.copy_from(dst, &src_mem, src, len), "memory.copy");
                }
                pc += 1;
            }
            Instr::MemoryInit(m, data_idx) => {
                let len = stack.pop().unwrap_i32() as u32;
                let src = stack.pop().unwrap_i32() as u32;
                let dst = stack.pop().unwrap_i32() as u64;
                let data_inst = instance.datas[data_idx.index()].lock().unwrap();
                let mut mem = instance.memories[m.index()].lock().unwrap();
                trap!(mem.init(dst, &data_inst, src, len), "memory.init");
                pc += 1;
            }
            Instr::DataDrop(d) => {
                instance.datas[d.index()].lock().unwrap().drop_segment();
                pc += 1;
            }

            Instr::AtomicLoad(width, int_width, memarg) => {
                let addr = trap!(memtable::effective_addr(&stack.pop(), memarg), "atomic.load");
                let mut mem = instance.memories[memarg.memory_index.index()].lock().unwrap();
                stack.push(trap!(memtable::atomic_load(&mut mem, addr, *width, *int_width), "atomic.load"));
                pc += 1;
            }
            Instr::AtomicStore(width, int_width, memarg) => {
                let v = stack.pop();
                let addr = trap!(memtable::effective_addr(&stack.pop(), memarg), "atomic.store");
                let mut mem = instance.memories[memarg.memory_index.index()].lock().unwrap();
                trap!(memtable::atomic_store(&mut mem, addr, *width, *int_width, v), "atomic.store");
                pc += 1;
            }
            Instr::AtomicRmw(op, width, int_width, memarg) => {
                let operand = stack.pop();
                let addr = trap!(memtable::effective_addr(&stack.pop(), memarg), "atomic.rmw");
                let mut mem = instance.memories[memarg.memory_index.index()].lock().unwrap();
                stack.push(trap!(memtable::atomic_rmw(&mut mem, addr, *op, *width, *int_width, operand), "atomic.rmw"));
                pc += 1;
            }
            Instr::AtomicRmwCmpxchg(width, int_width, memarg) => {
                let replacement = stack.pop();
                let expected = stack.pop();
                let addr = trap!(memtable::effective_addr(&stack.pop(), memarg), "atomic.rmw.cmpxchg");
                let mut mem = instance.memories[memarg.memory_index.index()].lock().unwrap();
                stack.push(trap!(
                    memtable::atomic_cmpxchg(&mut mem, addr, *width, *int_width, expected, replacement),
                    "atomic.rmw.cmpxchg"
                ));
                pc += 1;
            }
            Instr::AtomicWait(int_width, memarg) => {
                let timeout_ns = stack.pop().unwrap_i64();
                let expected = stack.pop();
                let addr = trap!(memtable::effective_addr(&stack.pop(), memarg), "atomic.wait");
                let mem_arc = &instance.memories[memarg.memory_index.index()];
                if !mem_arc.lock().unwrap().ty().shared {
                    return Err(Trap::ExpectSharedMemory.at("atomic.wait", pc as u32).into());
                }
                let current = {
                    let mut mem = mem_arc.lock().unwrap();
                    trap!(memtable::atomic_load(&mut mem, addr, LoadWidth::Full, *int_width), "atomic.wait")
                };
                let matches = current == expected;
                let result = instance.waiters.wait(addr, matches, memtable::timeout_from_ns(timeout_ns));
                stack.push(Val::I32(match result {
                    WaitResult::Ok => 0,
                    WaitResult::Mismatch => 1,
                    WaitResult::TimedOut => 2,
                }));
                pc += 1;
            }
            Instr::AtomicNotify(memarg) => {
                let count = stack.pop().unwrap_i32() as u32;
                let addr = trap!(memtable::effective_addr(&stack.pop(), memarg), "atomic.notify");
                let woken = instance.waiters.notify(addr, count);
                stack.push(Val::I32(woken as i32));
                pc += 1;
            }
            Instr::AtomicFence => {
                // Every atomic access here already goes through SeqCst, so a
                // standalone fence has nothing further to enforce.
                pc += 1;
            }

            Instr::RefNull(ty) => {
                stack.push_ref(Ref::Null(WasmRefType {
                    nullable: true,
                    heap_type: ty.clone(),
                }));
                pc += 1;
            }
            Instr::RefIsNull => {
                let r = stack.pop().unwrap_ref();
                stack.push(Val::I32(r.is_null() as i32));
                pc += 1;
            }
            Instr::RefFunc(idx) => {
                stack.push_ref(Ref::Func(*idx));
                pc += 1;
            }
            Instr::RefAsNonNull => {
                let r = stack.pop().unwrap_ref();
                stack.push_ref(trap!(refs::ref_as_non_null(r), "ref.as_non_null"));
                pc += 1;
            }
            Instr::RefEq => {
                let b = stack.pop().unwrap_ref();
                let a = stack.pop().unwrap_ref();
                stack.push(Val::I32((a == b) as i32));
                pc += 1;
            }
            Instr::RefTest(ty, nullable) => {
                let r = stack.pop().unwrap_ref();
                let defining = ref_defining_module(&r, instance);
                let gc = defining.gc.lock().unwrap();
                let matches = refs::ref_test_or_cast(&r, *nullable, ty, instance.type_table(), defining.type_table(), &gc);
                drop(gc);
                stack.push(Val::I32(matches as i32));
                pc += 1;
            }
            Instr::RefCast(ty, nullable) => {
                let r = stack.pop().unwrap_ref();
                let defining = ref_defining_module(&r, instance);
                let gc = defining.gc.lock().unwrap();
                let matches = refs::ref_test_or_cast(&r, *nullable, ty, instance.type_table(), defining.type_table(), &gc);
                drop(gc);
                if !matches {
                    return Err(Trap::CastFailed.at("ref.cast", pc as u32).into());
                }
                stack.push_ref(r);
                pc += 1;
            }
            Instr::BrOnNull(label) => {
                let r = stack.pop().unwrap_ref();
                pc = if r.is_null() {
                    stack.branch_to(label.index() as u32) as usize
                } else {
                    stack.push_ref(r);
                    pc + 1
                };
            }
            Instr::BrOnNonNull(label) => {
                let r = stack.pop().unwrap_ref();
                pc = if !r.is_null() {
                    stack.push_ref(r);
                    stack.branch_to(label.index() as u32) as usize
                } else {
                    pc + 1
                };
            }
            Instr::BrOnCast(label, ty, nullable) => {
                let r = stack.pop().unwrap_ref();
                let matches = {
                    let defining = ref_defining_module(&r, instance);
                    let gc = defining.gc.lock().unwrap();
                    refs::ref_test_or_cast(&r, *nullable, ty, instance.type_table(), defining.type_table(), &gc)
                };
                stack.push_ref(r);
                pc = if matches { stack.branch_to(label.index() as u32) as usize } else { pc + 1 };
            }
            Instr::BrOnCastFail(label, ty, nullable) => {
                let r = stack.pop().unwrap_ref();
                let matches = {
                    let defining = ref_defining_module(&r, instance);
                    let gc = defining.gc.lock().unwrap();
                    refs::ref_test_or_cast(&r, *nullable, ty, instance.type_table(), defining.type_table(), &gc)
                };
                stack.push_ref(r);
                pc = if !matches { stack.branch_to(label.index() as u32) as usize } else { pc + 1 };
            }

            Instr::StructNew(ty) => {
                let n = data.types.get(*ty).unwrap_struct().fields.len();
                let fields = stack.pop_n(n);
                let mut gc = instance.gc.lock().unwrap();
                let r = refs::struct_new(&mut gc, instance, *ty, fields);
                drop(gc);
                stack.push_ref(r);
                pc += 1;
            }
            Instr::StructNewDefault(ty) => {
                let mut gc = instance.gc.lock().unwrap();
                let r = refs::struct_new_default(&mut gc, instance, instance.type_table(), *ty);
                drop(gc);
                stack.push_ref(r);
                pc += 1;
            }
            Instr::StructGet(_ty, field, sign) => {
                let r = trap!(refs::ref_as_non_null(stack.pop().unwrap_ref()), "struct.get");
                let gcref = match r {
                    Ref::Struct(g) => g,
                    _ => unreachable!("struct.get operand must be a structref"),
                };
                let module = gcref.module().clone();
                let gc = module.gc.lock().unwrap();
                stack.push(refs::struct_get(&gc, module.type_table(), gcref, *field, *sign));
                pc += 1;
            }
            Instr::StructSet(_ty, field) => {
                let v = stack.pop();
                let r = trap!(refs::ref_as_non_null(stack.pop().unwrap_ref()), "struct.set");
                let gcref = match r {
                    Ref::Struct(g) => g,
                    _ => unreachable!("struct.set operand must be a structref"),
                };
                let module = gcref.module().clone();
                let mut gc = module.gc.lock().unwrap();
                refs::struct_set(&mut gc, gcref, *field, v);
                pc += 1;
            }
            Instr::ArrayNew(ty) => {
                let len = stack.pop().unwrap_i32() as u32;
                let init = stack.pop();
                let mut gc = instance.gc.lock().unwrap();
                let r = refs::array_new(&mut gc, instance, *ty, init, len);
                drop(gc);
                stack.push_ref(r);
                pc += 1;
            }
            Instr::ArrayNewDefault(ty) => {
                let len = stack.pop().unwrap_i32() as u32;
                let mut gc = instance.gc.lock().unwrap();
                let r = refs::array_new_default(&mut gc, instance, instance.type_table(), *ty, len);
                drop(gc);
                stack.push_ref(r);
                pc += 1;
            }
            Instr::ArrayNewFixed(ty, n) => {
                let elems = stack.pop_n(*n as usize);
                let mut gc = instance.gc.lock().unwrap();
                let r = refs::array_new_fixed(&mut gc, instance, *ty, elems);
                drop(gc);
                stack.push_ref(r);
                pc += 1;
            }
            Instr::ArrayNewData(ty, data_idx) => {
                let len = stack.pop().unwrap_i32() as u32;
                let offset = stack.pop().unwrap_i32() as u32;
                let storage = data.types.get(*ty).unwrap_array().0.element_type.clone();
                let elem_size: u32 = match &storage {
                    WasmStorageType::I8 => 1,
                    WasmStorageType::I16 => 2,
                    WasmStorageType::Val(WasmValType::I32 | WasmValType::F32) => 4,
                    WasmStorageType::Val(WasmValType::I64 | WasmValType::F64) => 8,
                    WasmStorageType::Val(WasmValType::V128) => 16,
                    WasmStorageType::Val(WasmValType::Ref(_)) => unreachable!("array.new_data on a reftype element"),
                };
                let byte_len = elem_size.checked_mul(len).ok_or(Trap::DataSegDoesNotFit).map_err(|t| t.at("array.new_data", pc as u32))?;
                let data_inst = instance.datas[data_idx.index()].lock().unwrap();
                let bytes = trap!(data_inst.read(offset, byte_len).ok_or(Trap::DataSegDoesNotFit), "array.new_data");
                let elems: Vec<Val> = bytes
                    .chunks_exact(elem_size as usize)
                    .map(|c| match &storage {
                        WasmStorageType::I8 => Val::I32(c[0] as i8 as i32),
                        WasmStorageType::I16 => Val::I32(i16::from_le_bytes(c.try_into().unwrap()) as i32),
                        WasmStorageType::Val(WasmValType::I32) => Val::I32(i32::from_le_bytes(c.try_into().unwrap())),
                        WasmStorageType::Val(WasmValType::I64) => Val::I64(i64::from_le_bytes(c.try_into().unwrap())),
                        WasmStorageType::Val(WasmValType::F32) => Val::F32(u32::from_le_bytes(c.try_into().unwrap())),
                        WasmStorageType::Val(WasmValType::F64) => Val::F64(u64::from_le_bytes(c.try_into().unwrap())),
                        WasmStorageType::Val(WasmValType::V128) => Val::V128(u128::from_le_bytes(c.try_into().unwrap())),
                        WasmStorageType::Val(WasmValType::Ref(_)) => unreachable!(),
                    })
                    .collect();
                drop(data_inst);
                let mut gc = instance.gc.lock().unwrap();
                let r = refs::array_new_fixed(&mut gc, instance, *ty, elems);
                drop(gc);
                stack.push_ref(r);
                pc += 1;
            }
            Instr::ArrayNewElem(ty, elem_idx) => {
                let len = stack.pop().unwrap_i32() as u32;
                let offset = stack.pop().unwrap_i32() as u32;
                let elem_inst = instance.elements[elem_idx.index()].lock().unwrap();
                let end = offset.checked_add(len).ok_or(Trap::ElemSegDoesNotFit).map_err(|t| t.at("array.new_elem", pc as u32))?;
                let slice = trap!(
                    elem_inst.elems().get(offset as usize..end as usize).ok_or(Trap::ElemSegDoesNotFit),
                    "array.new_elem"
                );
                let elems: Vec<Val> = slice.iter().cloned().map(Val::Ref).collect();
                drop(elem_inst);
                let mut gc = instance.gc.lock().unwrap();
                let r = refs::array_new_fixed(&mut gc, instance, *ty, elems);
                drop(gc);
                stack.push_ref(r);
                pc += 1;
            }
            Instr::ArrayGet(_ty, sign) => {
                let idx = stack.pop().unwrap_i32() as u32;
                let r = trap!(refs::ref_as_non_null(stack.pop().unwrap_ref()), "array.get");
                let gcref = match r {
                    Ref::Array(g) => g,
                    _ => unreachable!("array.get operand must be an arrayref"),
                };
                let module = gcref.module().clone();
                let gc = module.gc.lock().unwrap();
                stack.push(trap!(refs::array_get(&gc, module.type_table(), gcref, idx, *sign), "array.get"));
                pc += 1;
            }
            Instr::ArraySet(_ty) => {
                let v = stack.pop();
                let idx = stack.pop().unwrap_i32() as u32;
                let r = trap!(refs::ref_as_non_null(stack.pop().unwrap_ref()), "array.set");
                let gcref = match r {
                    Ref::Array(g) => g,
                    _ => unreachable!("array.set operand must be an arrayref"),
                };
                let module = gcref.module().clone();
                let mut gc = module.gc.lock().unwrap();
                trap!(refs::array_set(&mut gc, gcref, idx, v), "array.set");
                pc += 1;
            }
            Instr::ArrayLen => {
                let r = trap!(refs::ref_as_non_null(stack.pop().unwrap_ref()), "array.len");
                let gcref = match r {
                    Ref::Array(g) => g,
                    _ => unreachable!("array.len operand must be an arrayref"),
                };
                let module = gcref.module().clone();
                let gc = module.gc.lock().unwrap();
                stack.push(Val::I32(refs::array_len(&gc, gcref) as i32));
                pc += 1;
            }
            Instr::ArrayFill(_ty) => {
                let len = stack.pop().unwrap_i32() as u32;
                let v = stack.pop();
                let offset = stack.pop().unwrap_i32() as u32;
                let r = trap!(refs::ref_as_non_null(stack.pop().unwrap_ref()), "array.fill");
                let gcref = match r {
                    Ref::Array(g) => g,
                    _ => unreachable!("array.fill operand must be an arrayref"),
                };
                let module = gcref.module().clone();
                let mut gc = module.gc.lock().unwrap();
                trap!(refs::array_fill(&mut gc, gcref, offset, v, len), "array.fill");
                pc += 1;
            }
            Instr::ArrayCopy(_dst_ty, _src_ty) => {
                let len = stack.pop().unwrap_i32() as u32;
                let src_off = stack.pop().unwrap_i32() as u32;
                let src_r = trap!(refs::ref_as_non_null(stack.pop().unwrap_ref()), "array.copy");
                let dst_off = stack.pop().unwrap_i32() as u32;
                let dst_r = trap!(refs::ref_as_non_null(stack.pop().unwrap_ref()), "array.copy");
                let (dst_gcref, src_gcref) = match (dst_r, src_r) {
                    (Ref::Array(d), Ref::Array(s)) => (d, s),
                    _ => unreachable!("array.copy operands must be arrayrefs"),
                };
                // `dst`/`src` may belong to different module instances (e.g.
                // a shared table holding arrays allocated by two modules), so
                // they can't always be serviced by one locked `GcAllocator`.
                let dst_module = dst_gcref.module();
                let src_module = src_gcref.module();
                if Arc::ptr_eq(&dst_module, &src_module) {
                    let mut gc = dst_module.gc.lock().unwrap();
                    trap!(refs::array_copy(&mut gc, dst_gcref, dst_off, src_gcref, src_off, len), "array.copy");
                } else {
                    let src_vals = {
                        let src_gc = src_module.gc.lock().unwrap();
                        trap!(refs::array_read_range(&src_gc, src_gcref, src_off, len), "array.copy")
                    };
                    let mut dst_gc = dst_module.gc.lock().unwrap();
                    trap!(refs::array_write_range(&mut dst_gc, dst_gcref, dst_off, &src_vals), "array.copy");
                }
                pc += 1;
            }
            Instr::RefI31 => {
                let v = stack.pop().unwrap_i32();
                stack.push_ref(Ref::I31(v & 0x7fff_ffff));
                pc += 1;
            }
            Instr::I31Get(sign) => {
                let r = trap!(refs::ref_as_non_null(stack.pop().unwrap_ref()), "i31.get");
                let raw = match r {
                    Ref::I31(x) => x,
                    _ => unreachable!("i31.get operand must be an i31ref"),
                };
                let v = match sign {
                    Signedness::Signed => (raw << 1) >> 1,
                    Signedness::Unsigned => raw,
                };
                stack.push(Val::I32(v));
                pc += 1;
            }

            Instr::AnyConvertExtern => {
                let r = stack.pop().unwrap_ref();
                stack.push_ref(if r.is_null() { Ref::Null(WasmRefType::NONE) } else { r });
                pc += 1;
            }
            Instr::ExternConvertAny => {
                let r = stack.pop().unwrap_ref();
                stack.push_ref(if r.is_null() { Ref::Null(WasmRefType::NOEXTERN) } else { r });
                pc += 1;
            }

            Instr::V128Const(bytes) => {
                stack.push(Val::V128(u128::from_le_bytes(*bytes)));
                pc += 1;
            }
            Instr::Vec(vi) => {
                match vi {
                    VecInstr::Load(width, memarg) => {
                        let addr = trap!(memtable::effective_addr(&stack.pop(), memarg), "v128.load");
                        let mem = instance.memories[memarg.memory_index.index()].lock().unwrap();
                        let v = match width {
                            LoadWidth::Full => {
                                let b = trap!(mem.load(addr, 16), "v128.load");
                                u128::from_le_bytes(b.try_into().unwrap())
                            }
                            _ => unreachable!("v128.load narrow widths go through load_splat/load_zero/load_lane"),
                        };
                        stack.push(Val::V128(v));
                    }
                    VecInstr::LoadSplat(shape, memarg) => {
                        let addr = trap!(memtable::effective_addr(&stack.pop(), memarg), "v128.load_splat");
                        let mem = instance.memories[memarg.memory_index.index()].lock().unwrap();
                        let v = match shape {
                            LaneShape::I8x16 => {
                                let b = trap!(mem.load(addr, 1), "v128.load_splat")[0] as i8;
                                vector::from_i8([b; 16])
                            }
                            LaneShape::I16x8 => {
                                let b = trap!(mem.load(addr, 2), "v128.load_splat");
                                vector::from_i16([i16::from_le_bytes(b.try_into().unwrap()); 8])
                            }
                            LaneShape::I32x4 => {
                                let b = trap!(mem.load(addr, 4), "v128.load_splat");
                                vector::from_i32([i32::from_le_bytes(b.try_into().unwrap()); 4])
                            }
                            LaneShape::I64x2 => {
                                let b = trap!(mem.load(addr, 8), "v128.load_splat");
                                vector::from_i64([i64::from_le_bytes(b.try_into().unwrap()); 2])
                            }
                            LaneShape::F32x4 | LaneShape::F64x2 => unreachable!("load_splat is only defined for integer lane shapes"),
                        };
                        stack.push(Val::V128(v));
                    }
                    VecInstr::LoadZero(shape, memarg) => {
                        let addr = trap!(memtable::effective_addr(&stack.pop(), memarg), "v128.load_zero");
                        let mem = instance.memories[memarg.memory_index.index()].lock().unwrap();
                        let v = match shape {
                            LaneShape::I32x4 => {
                                let b = trap!(mem.load(addr, 4), "v128.load_zero");
                                vector::from_i32([i32::from_le_bytes(b.try_into().unwrap()), 0, 0, 0])
                            }
                            LaneShape::I64x2 => {
                                let b = trap!(mem.load(addr, 8), "v128.load_zero");
                                vector::from_i64([i64::from_le_bytes(b.try_into().unwrap()), 0])
                            }
                            _ => unreachable!("load_zero is only defined for i32x4/i64x2"),
                        };
                        stack.push(Val::V128(v));
                    }
                    VecInstr::LoadLane(shape, memarg, lane) => {
                        let vec_val = stack.pop().unwrap_v128();
                        let addr = trap!(memtable::effective_addr(&stack.pop(), memarg), "v128.load_lane");
                        let mem = instance.memories[memarg.memory_index.index()].lock().unwrap();
                        let lane = *lane as usize;
                        let v = match shape {
                            LaneShape::I8x16 => {
                                let mut lanes = vector::lanes_i8(vec_val);
                                lanes[lane] = trap!(mem.load(addr, 1), "v128.load_lane")[0] as i8;
                                vector::from_i8(lanes)
                            }
                            LaneShape::I16x8 => {
                                let mut lanes = vector::lanes_i16(vec_val);
                                let b = trap!(mem.load(addr, 2), "v128.load_lane");
                                lanes[lane] = i16::from_le_bytes(b.try_into().unwrap());
                                vector::from_i16(lanes)
                            }
                            LaneShape::I32x4 => {
                                let mut lanes = vector::lanes_i32(vec_val);
                                let b = trap!(mem.load(addr, 4), "v128.load_lane");
                                lanes[lane] = i32::from_le_bytes(b.try_into().unwrap());
                                vector::from_i32(lanes)
                            }
                            LaneShape::I64x2 => {
                                let mut lanes = vector::lanes_i64(vec_val);
                                let b = trap!(mem.load(addr, 8), "v128.load_lane");
                                lanes[lane] = i64::from_le_bytes(b.try_into().unwrap());
                                vector::from_i64(lanes)
                            }
                            _ => unreachable!("load_lane is only defined for integer lane shapes"),
                        };
                        stack.push(Val::V128(v));
                    }
                    VecInstr::StoreLane(shape, memarg, lane) => {
                        let vec_val = stack.pop().unwrap_v128();
                        let addr = trap!(memtable::effective_addr(&stack.pop(), memarg), "v128.store_lane");
                        let mut mem = instance.memories[memarg.memory_index.index()].lock().unwrap();
                        let lane = *lane as usize;
                        match shape {
                            LaneShape::I8x16 => trap!(mem.store(addr, &[vector::lanes_i8(vec_val)[lane] as u8]), "v128.store_lane"),
                            LaneShape::I16x8 => trap!(mem.store(addr, &vector::lanes_i16(vec_val)[lane].to_le_bytes()), "v128.store_lane"),
                            LaneShape::I32x4 => trap!(mem.store(addr, &vector::lanes_i32(vec_val)[lane].to_le_bytes()), "v128.store_lane"),
                            LaneShape::I64x2 => trap!(mem.store(addr, &vector::lanes_i64(vec_val)[lane].to_le_bytes()), "v128.store_lane"),
                            _ => unreachable!("store_lane is only defined for integer lane shapes"),
                        };
                    }
                    VecInstr::Store(memarg) => {
                        let vec_val = stack.pop().unwrap_v128();
                        let addr = trap!(memtable::effective_addr(&stack.pop(), memarg), "v128.store");
                        let mut mem = instance.memories[memarg.memory_index.index()].lock().unwrap();
                        trap!(mem.store(addr, &vec_val.to_le_bytes()), "v128.store");
                    }
                    other => {
                        let v = vector::eval(other, |n| stack.pop_n(n));
                        stack.push(v);
                    }
                }
                pc += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{CatchClause, FunctionBody};
    use crate::indices::{EntityIndex, LabelIndex, ModuleInternedTypeIndex, TypeIndex};
    use crate::module::{ExportDef, Module};
    use crate::store::EngineConfig;
    use crate::tag::TagInstance;
    use crate::types::{TypeTable, WasmCompositeType, WasmFuncType, WasmSubType};
    use cranelift_entity::PrimaryMap;
    use std::sync::Mutex;

    fn func_type(types: &mut TypeTable, idx: usize, params: Vec<WasmValType>, results: Vec<WasmValType>) -> ModuleInternedTypeIndex {
        types.push(
            TypeIndex::new(idx),
            WasmSubType {
                is_final: true,
                supertype: None,
                composite_type: WasmCompositeType::new_func(
                    false,
                    WasmFuncType {
                        params: params.into_boxed_slice(),
                        results: results.into_boxed_slice(),
                    },
                ),
            },
        )
    }

    /// Builds a two-function module: `go` (exported) installs a `try_table`
    /// handler for `tag0` and calls `thrower`, which unconditionally
    /// `throw`s past its own body with no handler of its own.
    fn nested_throw_module() -> Arc<ModuleInstance> {
        let mut types = TypeTable::default();
        let go_ty = func_type(&mut types, 0, vec![], vec![WasmValType::I32]);
        let thrower_ty = func_type(&mut types, 1, vec![], vec![]);
        let tag_ty = func_type(&mut types, 2, vec![WasmValType::I32], vec![]);

        let mut func_types = PrimaryMap::new();
        func_types.push(go_ty);
        func_types.push(thrower_ty);

        let go_body = FunctionBody {
            locals: Box::new([]),
            instrs: Box::new([
                Instr::TryTable(
                    BlockType::Value(WasmValType::I32),
                    Box::new([CatchClause {
                        tag: Some(TagIndex::new(0)),
                        label: LabelIndex::new(0),
                        ref_style: false,
                    }]),
                ),
                Instr::Call(FuncIndex::new(1)),
                Instr::End, // closes try_table
                Instr::End, // closes go's own implicit scope
            ]),
        };
        let thrower_body = FunctionBody {
            locals: Box::new([]),
            instrs: Box::new([
                Instr::I32Const(99),
                Instr::Throw(TagIndex::new(0)),
                Instr::End, // unreachable, but present as a real decoder would emit it
            ]),
        };
        let mut func_bodies = PrimaryMap::new();
        func_bodies.push(Some(go_body));
        func_bodies.push(Some(thrower_body));

        let mut tags = PrimaryMap::new();
        tags.push(tag_ty);

        let data = ModuleData {
            types,
            imports: Vec::new(),
            func_types,
            func_bodies,
            num_imported_funcs: 0,
            tables: PrimaryMap::new(),
            num_imported_tables: 0,
            memories: PrimaryMap::new(),
            num_imported_memories: 0,
            globals: PrimaryMap::new(),
            num_imported_globals: 0,
            tags,
            num_imported_tags: 0,
            elements: Vec::new(),
            datas: Vec::new(),
            exports: vec![ExportDef {
                name: "go".to_string(),
                index: EntityIndex::Function(FuncIndex::new(0)),
            }],
            start: None,
        };
        let module = Module::for_test(data);
        Arc::new(ModuleInstance {
            module,
            memories: Vec::new(),
            tables: Vec::new(),
            globals: Vec::new(),
            tags: vec![TagInstance::new(tag_ty)],
            elements: Vec::new(),
            datas: Vec::new(),
            gc: Mutex::new(crate::gc::GcAllocator::new()),
            waiters: crate::waiter::WaiterRegistry::new(),
            resolved_funcs: vec![ResolvedFunc::Local(FuncIndex::new(0)), ResolvedFunc::Local(FuncIndex::new(1))],
        })
    }

    #[test_log::test]
    fn try_table_catches_throw_from_a_called_function() {
        let instance = nested_throw_module();
        let mut store = Store::new(EngineConfig::default());
        let results = call_exported(&mut store, &instance, FuncIndex::new(0), &[]).unwrap();
        assert_eq!(results, vec![Val::I32(99)]);
    }

    /// Same handler/tag shape as above, but the `throw` is in the same
    /// function as its `try_table`, exercising the direct (non-cross-frame)
    /// catch path in `Instr::Throw`'s own arm rather than `dispatch!`'s.
    fn local_throw_module() -> Arc<ModuleInstance> {
        let mut types = TypeTable::default();
        let go_ty = func_type(&mut types, 0, vec![], vec![WasmValType::I32]);
        let tag_ty = func_type(&mut types, 1, vec![WasmValType::I32], vec![]);

        let mut func_types = PrimaryMap::new();
        func_types.push(go_ty);

        let go_body = FunctionBody {
            locals: Box::new([]),
            instrs: Box::new([
                Instr::TryTable(
                    BlockType::Value(WasmValType::I32),
                    Box::new([CatchClause {
                        tag: Some(TagIndex::new(0)),
                        label: LabelIndex::new(0),
                        ref_style: false,
                    }]),
                ),
                Instr::I32Const(7),
                Instr::Throw(TagIndex::new(0)),
                Instr::End, // closes try_table
                Instr::End, // closes go's own implicit scope
            ]),
        };
        let mut func_bodies = PrimaryMap::new();
        func_bodies.push(Some(go_body));

        let mut tags = PrimaryMap::new();
        tags.push(tag_ty);

        let data = ModuleData {
            types,
            imports: Vec::new(),
            func_types,
            func_bodies,
            num_imported_funcs: 0,
            tables: PrimaryMap::new(),
            num_imported_tables: 0,
            memories: PrimaryMap::new(),
            num_imported_memories: 0,
            globals: PrimaryMap::new(),
            num_imported_globals: 0,
            tags,
            num_imported_tags: 0,
            elements: Vec::new(),
            datas: Vec::new(),
            exports: vec![ExportDef {
                name: "go".to_string(),
                index: EntityIndex::Function(FuncIndex::new(0)),
            }],
            start: None,
        };
        let module = Module::for_test(data);
        Arc::new(ModuleInstance {
            module,
            memories: Vec::new(),
            tables: Vec::new(),
            globals: Vec::new(),
            tags: vec![TagInstance::new(tag_ty)],
            elements: Vec::new(),
            datas: Vec::new(),
            gc: Mutex::new(crate::gc::GcAllocator::new()),
            waiters: crate::waiter::WaiterRegistry::new(),
            resolved_funcs: vec![ResolvedFunc::Local(FuncIndex::new(0))],
        })
    }

    #[test_log::test]
    fn try_table_catches_throw_in_its_own_body() {
        let instance = local_throw_module();
        let mut store = Store::new(EngineConfig::default());
        let results = call_exported(&mut store, &instance, FuncIndex::new(0), &[]).unwrap();
        assert_eq!(results, vec![Val::I32(7)]);
    }
}
