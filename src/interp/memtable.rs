//! Memory and table instruction evaluation (SPEC_FULL.md §4.2/§4.3/§4.8):
//! load/store (including the narrow/sign-extending forms and bulk-memory
//! ops), table access and bulk-table ops, and the shared-memory atomics.

use crate::ast::{AtomicRmwOp, IntWidth, LoadWidth, MemArg, Signedness};
use crate::memory::MemoryInstance;
use crate::trap::Trap;
use crate::values::Val;
use std::sync::atomic::{AtomicI32, AtomicI64, Ordering};
use std::time::Duration;

pub fn effective_addr(index: &Val, memarg: &MemArg) -> Result<u64, Trap> {
    let base = match index {
        Val::I32(v) => *v as u32 as u64,
        Val::I64(v) => *v as u64,
        _ => unreachable!("memory index operand must be an integer"),
    };
    base.checked_add(memarg.offset).ok_or(Trap::MemoryOutOfBounds)
}

fn load_width_bytes(w: LoadWidth, int_width: IntWidth) -> u32 {
    match w {
        LoadWidth::Full => match int_width {
            IntWidth::I32 => 4,
            IntWidth::I64 => 8,
        },
        LoadWidth::I8 => 1,
        LoadWidth::I16 => 2,
        LoadWidth::I32 => 4,
    }
}

/// Loads a narrow-or-full integer from memory, sign/zero-extending it to
/// `int_width`. `signedness` is `None` for full-width loads, where there is
/// nothing to extend.
pub fn load_int(
    mem: &MemoryInstance,
    addr: u64,
    width: LoadWidth,
    signedness: Option<Signedness>,
    int_width: IntWidth,
) -> Result<Val, Trap> {
    let len = load_width_bytes(width, int_width);
    let bytes = mem.load(addr, len)?;
    let raw: i64 = match len {
        1 => bytes[0] as i8 as i64,
        2 => i16::from_le_bytes(bytes.try_into().unwrap()) as i64,
        4 => i32::from_le_bytes(bytes.try_into().unwrap()) as i64,
        8 => i64::from_le_bytes(bytes.try_into().unwrap()),
        _ => unreachable!("load width must be 1, 2, 4 or 8 bytes"),
    };
    let raw = if matches!(signedness, Some(Signedness::Unsigned)) && len < 8 {
        raw & ((1i64 << (len * 8)) - 1)
    } else {
        raw
    };
    Ok(match int_width {
        IntWidth::I32 => Val::I32(raw as i32),
        IntWidth::I64 => Val::I64(raw),
    })
}

pub fn load_float(mem: &MemoryInstance, addr: u64, width: crate::ast::FloatWidth) -> Result<Val, Trap> {
    match width {
        crate::ast::FloatWidth::F32 => {
            let bytes = mem.load(addr, 4)?;
            Ok(Val::F32(u32::from_le_bytes(bytes.try_into().unwrap())))
        }
        crate::ast::FloatWidth::F64 => {
            let bytes = mem.load(addr, 8)?;
            Ok(Val::F64(u64::from_le_bytes(bytes.try_into().unwrap())))
        }
    }
}

pub fn store_int(mem: &mut MemoryInstance, addr: u64, width: LoadWidth, int_width: IntWidth, v: Val) -> Result<(), Trap> {
    let len = load_width_bytes(width, int_width);
    match int_width {
        IntWidth::I32 => {
            let x = v.unwrap_i32();
            let bytes = x.to_le_bytes();
            mem.store(addr, &bytes[..len as usize])
        }
        IntWidth::I64 => {
            let x = v.unwrap_i64();
            let bytes = x.to_le_bytes();
            mem.store(addr, &bytes[..len as usize])
        }
    }
}

pub fn store_float(mem: &mut MemoryInstance, addr: u64, width: crate::ast::FloatWidth, v: Val) -> Result<(), Trap> {
    match width {
        crate::ast::FloatWidth::F32 => mem.store(addr, &v.unwrap_f32().to_bits().to_le_bytes()),
        crate::ast::FloatWidth::F64 => mem.store(addr, &v.unwrap_f64().to_bits().to_le_bytes()),
    }
}

fn atomic_bytes(int_width: IntWidth, width: LoadWidth) -> u32 {
    load_width_bytes(width, int_width)
}

/// Bounds- and alignment-checks an atomic access, returning the raw byte
/// offset to operate on. Reuses `MemoryInstance::load`'s bounds check purely
/// for its side effect; the slice it returns is discarded since the atomic
/// op itself goes through a raw pointer.
fn check_atomic(mem: &MemoryInstance, addr: u64, len: u32) -> Result<usize, Trap> {
    mem.load(addr, len)?;
    if addr % u64::from(len) != 0 {
        return Err(Trap::UnalignedAtomicAccess);
    }
    Ok(addr as usize)
}

pub fn atomic_load(mem: &mut MemoryInstance, addr: u64, width: LoadWidth, int_width: IntWidth) -> Result<Val, Trap> {
    let len = atomic_bytes(int_width, width);
    let off = check_atomic(mem, addr, len)?;
    unsafe {
        let ptr = mem.get_pointer(off);
        Ok(match (int_width, width) {
            (IntWidth::I32, LoadWidth::Full) => Val::I32((*(ptr as *const AtomicI32)).load(Ordering::SeqCst)),
            (IntWidth::I64, LoadWidth::Full) => Val::I64((*(ptr as *const AtomicI64)).load(Ordering::SeqCst)),
            (IntWidth::I32, LoadWidth::I8) => Val::I32((*(ptr as *const std::sync::atomic::AtomicU8)).load(Ordering::SeqCst) as i32),
            (IntWidth::I32, LoadWidth::I16) => {
                Val::I32((*(ptr as *const std::sync::atomic::AtomicU16)).load(Ordering::SeqCst) as i32)
            }
            (IntWidth::I64, LoadWidth::I8) => Val::I64((*(ptr as *const std::sync::atomic::AtomicU8)).load(Ordering::SeqCst) as i64),
            (IntWidth::I64, LoadWidth::I16) => {
                Val::I64((*(ptr as *const std::sync::atomic::AtomicU16)).load(Ordering::SeqCst) as i64)
            }
            (IntWidth::I64, LoadWidth::I32) => {
                Val::I64((*(ptr as *const std::sync::atomic::AtomicU32)).load(Ordering::SeqCst) as i64)
            }
            (IntWidth::I32, LoadWidth::I32) => unreachable!("atomic.load32 on i32 is just the full-width form"),
        })
    }
}

pub fn atomic_store(mem: &mut MemoryInstance, addr: u64, width: LoadWidth, int_width: IntWidth, v: Val) -> Result<(), Trap> {
    let len = atomic_bytes(int_width, width);
    let off = check_atomic(mem, addr, len)?;
    unsafe {
        let ptr = mem.get_pointer(off);
        match (int_width, width) {
            (IntWidth::I32, LoadWidth::Full) => (*(ptr as *const AtomicI32)).store(v.unwrap_i32(), Ordering::SeqCst),
            (IntWidth::I64, LoadWidth::Full) => (*(ptr as *const AtomicI64)).store(v.unwrap_i64(), Ordering::SeqCst),
            (_, LoadWidth::I8) => (*(ptr as *const std::sync::atomic::AtomicU8))
                .store(v_as_i64(&v) as u8, Ordering::SeqCst),
            (_, LoadWidth::I16) => (*(ptr as *const std::sync::atomic::AtomicU16))
                .store(v_as_i64(&v) as u16, Ordering::SeqCst),
            (IntWidth::I64, LoadWidth::I32) => {
                (*(ptr as *const std::sync::atomic::AtomicU32)).store(v_as_i64(&v) as u32, Ordering::SeqCst)
            }
            (IntWidth::I32, LoadWidth::I32) => unreachable!("atomic.store32 on i32 is just the full-width form"),
        }
    }
    Ok(())
}

fn v_as_i64(v: &Val) -> i64 {
    match v {
        Val::I32(x) => *x as i64,
        Val::I64(x) => *x,
        _ => unreachable!("atomic operand must be an integer"),
    }
}

pub fn atomic_rmw(
    mem: &mut MemoryInstance,
    addr: u64,
    op: AtomicRmwOp,
    width: LoadWidth,
    int_width: IntWidth,
    operand: Val,
) -> Result<Val, Trap> {
    let len = atomic_bytes(int_width, width);
    let off = check_atomic(mem, addr, len)?;
    let operand = v_as_i64(&operand);
    macro_rules! rmw {
        ($atomic_ty:ty, $cast:ty) => {{
            let a = unsafe { &*(mem.get_pointer(off) as *const $atomic_ty) };
            let operand = operand as $cast;
            let prev = match op {
                AtomicRmwOp::Add => a.fetch_add(operand, Ordering::SeqCst),
                AtomicRmwOp::Sub => a.fetch_sub(operand, Ordering::SeqCst),
                AtomicRmwOp::And => a.fetch_and(operand, Ordering::SeqCst),
                AtomicRmwOp::Or => a.fetch_or(operand, Ordering::SeqCst),
                AtomicRmwOp::Xor => a.fetch_xor(operand, Ordering::SeqCst),
                AtomicRmwOp::Xchg => a.swap(operand, Ordering::SeqCst),
            };
            prev as i64
        }};
    }
    let prev = unsafe {
        match (int_width, width) {
            (IntWidth::I32, LoadWidth::Full) => rmw!(AtomicI32, i32),
            (IntWidth::I64, LoadWidth::Full) => rmw!(AtomicI64, i64),
            (_, LoadWidth::I8) => rmw!(std::sync::atomic::AtomicU8, u8) as i64,
            (_, LoadWidth::I16) => rmw!(std::sync::atomic::AtomicU16, u16) as i64,
            (IntWidth::I64, LoadWidth::I32) => rmw!(std::sync::atomic::AtomicU32, u32) as i64,
            (IntWidth::I32, LoadWidth::I32) => unreachable!("atomic.rmw32 on i32 is just the full-width form"),
        }
    };
    Ok(match int_width {
        IntWidth::I32 => Val::I32(prev as i32),
        IntWidth::I64 => Val::I64(prev),
    })
}

pub fn atomic_cmpxchg(
    mem: &mut MemoryInstance,
    addr: u64,
    width: LoadWidth,
    int_width: IntWidth,
    expected: Val,
    replacement: Val,
) -> Result<Val, Trap> {
    let len = atomic_bytes(int_width, width);
    let off = check_atomic(mem, addr, len)?;
    let expected = v_as_i64(&expected);
    let replacement = v_as_i64(&replacement);
    macro_rules! cmpxchg {
        ($atomic_ty:ty, $cast:ty) => {{
            let a = unsafe { &*(mem.get_pointer(off) as *const $atomic_ty) };
            a.compare_exchange(expected as $cast, replacement as $cast, Ordering::SeqCst, Ordering::SeqCst)
                .unwrap_or_else(|prev| prev) as i64
        }};
    }
    let prev = unsafe {
        match (int_width, width) {
            (IntWidth::I32, LoadWidth::Full) => cmpxchg!(AtomicI32, i32),
            (IntWidth::I64, LoadWidth::Full) => cmpxchg!(AtomicI64, i64),
            (_, LoadWidth::I8) => cmpxchg!(std::sync::atomic::AtomicU8, u8) as i64,
            (_, LoadWidth::I16) => cmpxchg!(std::sync::atomic::AtomicU16, u16) as i64,
            (IntWidth::I64, LoadWidth::I32) => cmpxchg!(std::sync::atomic::AtomicU32, u32) as i64,
            (IntWidth::I32, LoadWidth::I32) => unreachable!("atomic.rmw32.cmpxchg on i32 is just the full-width form"),
        }
    };
    Ok(match int_width {
        IntWidth::I32 => Val::I32(prev as i32),
        IntWidth::I64 => Val::I64(prev),
    })
}

/// `timeout_ns < 0` means "wait forever", matching the core spec's
/// `memory.atomic.wait`'s signed-i64-nanoseconds encoding of no timeout.
pub fn timeout_from_ns(timeout_ns: i64) -> Option<Duration> {
    if timeout_ns < 0 {
        None
    } else {
        Some(Duration::from_nanos(timeout_ns as u64))
    }
}
