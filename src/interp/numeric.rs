//! Numeric instruction evaluation (SPEC_FULL.md §4.6.1/§4.6.2): integer and
//! float unary/binary/test/relational operators and the `cvt` conversion
//! family, all pure functions over `Val` so the dispatch loop in `mod.rs`
//! only has to pop operands, call through, and push the result.

use crate::ast::{Cvtop, FloatBinop, FloatRelop, FloatUnop, FloatWidth, IntBinop, IntRelop, IntTestop, IntUnop, IntWidth};
use crate::trap::Trap;
use crate::values::Val;

pub fn eval_iunop(width: IntWidth, op: IntUnop, v: Val) -> Val {
    match width {
        IntWidth::I32 => {
            let x = v.unwrap_i32();
            Val::I32(match op {
                IntUnop::Clz => x.leading_zeros() as i32,
                IntUnop::Ctz => x.trailing_zeros() as i32,
                IntUnop::Popcnt => x.count_ones() as i32,
                IntUnop::Extend8S => x as i8 as i32,
                IntUnop::Extend16S => x as i16 as i32,
                IntUnop::Extend32S => x,
            })
        }
        IntWidth::I64 => {
            let x = v.unwrap_i64();
            Val::I64(match op {
                IntUnop::Clz => x.leading_zeros() as i64,
                IntUnop::Ctz => x.trailing_zeros() as i64,
                IntUnop::Popcnt => x.count_ones() as i64,
                IntUnop::Extend8S => x as i8 as i64,
                IntUnop::Extend16S => x as i16 as i64,
                IntUnop::Extend32S => x as i32 as i64,
            })
        }
    }
}

pub fn eval_ibinop(width: IntWidth, op: IntBinop, a: Val, b: Val) -> Result<Val, Trap> {
    Ok(match width {
        IntWidth::I32 => {
            let (a, b) = (a.unwrap_i32(), b.unwrap_i32());
            Val::I32(match op {
                IntBinop::Add => a.wrapping_add(b),
                IntBinop::Sub => a.wrapping_sub(b),
                IntBinop::Mul => a.wrapping_mul(b),
                IntBinop::DivS => {
                    if b == 0 {
                        return Err(Trap::DivideByZero);
                    }
                    a.checked_div(b).ok_or(Trap::IntegerOverflow)?
                }
                IntBinop::DivU => {
                    if b == 0 {
                        return Err(Trap::DivideByZero);
                    }
                    ((a as u32) / (b as u32)) as i32
                }
                IntBinop::RemS => {
                    if b == 0 {
                        return Err(Trap::DivideByZero);
                    }
                    a.checked_rem(b).unwrap_or(0)
                }
                IntBinop::RemU => {
                    if b == 0 {
                        return Err(Trap::DivideByZero);
                    }
                    ((a as u32) % (b as u32)) as i32
                }
                IntBinop::And => a & b,
                IntBinop::Or => a | b,
                IntBinop::Xor => a ^ b,
                IntBinop::Shl => a.wrapping_shl(b as u32),
                IntBinop::ShrS => a.wrapping_shr(b as u32),
                IntBinop::ShrU => ((a as u32).wrapping_shr(b as u32)) as i32,
                IntBinop::Rotl => a.rotate_left(b as u32 & 31),
                IntBinop::Rotr => a.rotate_right(b as u32 & 31),
            })
        }
        IntWidth::I64 => {
            let (a, b) = (a.unwrap_i64(), b.unwrap_i64());
            Val::I64(match op {
                IntBinop::Add => a.wrapping_add(b),
                IntBinop::Sub => a.wrapping_sub(b),
                IntBinop::Mul => a.wrapping_mul(b),
                IntBinop::DivS => {
                    if b == 0 {
                        return Err(Trap::DivideByZero);
                    }
                    a.checked_div(b).ok_or(Trap::IntegerOverflow)?
                }
                IntBinop::DivU => {
                    if b == 0 {
                        return Err(Trap::DivideByZero);
                    }
                    ((a as u64) / (b as u64)) as i64
                }
                IntBinop::RemS => {
                    if b == 0 {
                        return Err(Trap::DivideByZero);
                    }
                    a.checked_rem(b).unwrap_or(0)
                }
                IntBinop::RemU => {
                    if b == 0 {
                        return Err(Trap::DivideByZero);
                    }
                    ((a as u64) % (b as u64)) as i64
                }
                IntBinop::And => a & b,
                IntBinop::Or => a | b,
                IntBinop::Xor => a ^ b,
                IntBinop::Shl => a.wrapping_shl(b as u32),
                IntBinop::ShrS => a.wrapping_shr(b as u32),
                IntBinop::ShrU => ((a as u64).wrapping_shr(b as u32)) as i64,
                IntBinop::Rotl => a.rotate_left(b as u32 & 63),
                IntBinop::Rotr => a.rotate_right(b as u32 & 63),
            })
        }
    })
}

pub fn eval_itestop(width: IntWidth, op: IntTestop, v: Val) -> Val {
    let IntTestop::Eqz = op;
    Val::I32(match width {
        IntWidth::I32 => (v.unwrap_i32() == 0) as i32,
        IntWidth::I64 => (v.unwrap_i64() == 0) as i32,
    })
}

pub fn eval_irelop(width: IntWidth, op: IntRelop, a: Val, b: Val) -> Val {
    let result = match width {
        IntWidth::I32 => {
            let (a, b) = (a.unwrap_i32(), b.unwrap_i32());
            match op {
                IntRelop::Eq => a == b,
                IntRelop::Ne => a != b,
                IntRelop::LtS => a < b,
                IntRelop::LtU => (a as u32) < (b as u32),
                IntRelop::GtS => a > b,
                IntRelop::GtU => (a as u32) > (b as u32),
                IntRelop::LeS => a <= b,
                IntRelop::LeU => (a as u32) <= (b as u32),
                IntRelop::GeS => a >= b,
                IntRelop::GeU => (a as u32) >= (b as u32),
            }
        }
        IntWidth::I64 => {
            let (a, b) = (a.unwrap_i64(), b.unwrap_i64());
            match op {
                IntRelop::Eq => a == b,
                IntRelop::Ne => a != b,
                IntRelop::LtS => a < b,
                IntRelop::LtU => (a as u64) < (b as u64),
                IntRelop::GtS => a > b,
                IntRelop::GtU => (a as u64) > (b as u64),
                IntRelop::LeS => a <= b,
                IntRelop::LeU => (a as u64) <= (b as u64),
                IntRelop::GeS => a >= b,
                IntRelop::GeU => (a as u64) >= (b as u64),
            }
        }
    };
    Val::I32(result as i32)
}

fn fmin(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else if a == 0.0 && b == 0.0 {
        if a.is_sign_negative() || b.is_sign_negative() {
            -0.0
        } else {
            0.0
        }
    } else {
        a.min(b)
    }
}

fn fmax(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else if a == 0.0 && b == 0.0 {
        if a.is_sign_positive() || b.is_sign_positive() {
            0.0
        } else {
            -0.0
        }
    } else {
        a.max(b)
    }
}

pub fn eval_funop(width: FloatWidth, op: FloatUnop, v: Val) -> Val {
    match width {
        FloatWidth::F32 => {
            let x = v.unwrap_f32();
            let r = match op {
                FloatUnop::Abs => x.abs(),
                FloatUnop::Neg => -x,
                FloatUnop::Ceil => x.ceil(),
                FloatUnop::Floor => x.floor(),
                FloatUnop::Trunc => x.trunc(),
                FloatUnop::Nearest => round_ties_even_f32(x),
                FloatUnop::Sqrt => x.sqrt(),
            };
            Val::from(r)
        }
        FloatWidth::F64 => {
            let x = v.unwrap_f64();
            let r = match op {
                FloatUnop::Abs => x.abs(),
                FloatUnop::Neg => -x,
                FloatUnop::Ceil => x.ceil(),
                FloatUnop::Floor => x.floor(),
                FloatUnop::Trunc => x.trunc(),
                FloatUnop::Nearest => round_ties_even_f64(x),
                FloatUnop::Sqrt => x.sqrt(),
            };
            Val::from(r)
        }
    }
}

fn round_ties_even_f64(x: f64) -> f64 {
    let r = x.round();
    if (x - x.trunc()).abs() == 0.5 && (r as i64) % 2 != 0 {
        r - x.signum()
    } else {
        r
    }
}

fn round_ties_even_f32(x: f32) -> f32 {
    round_ties_even_f64(x as f64) as f32
}

pub fn eval_fbinop(width: FloatWidth, op: FloatBinop, a: Val, b: Val) -> Val {
    match width {
        FloatWidth::F32 => {
            let (a, b) = (a.unwrap_f32() as f64, b.unwrap_f32() as f64);
            let r = match op {
                FloatBinop::Add => a + b,
                FloatBinop::Sub => a - b,
                FloatBinop::Mul => a * b,
                FloatBinop::Div => a / b,
                FloatBinop::Min => fmin(a, b),
                FloatBinop::Max => fmax(a, b),
                FloatBinop::Copysign => a.copysign(b),
            };
            Val::from(r as f32)
        }
        FloatWidth::F64 => {
            let (a, b) = (a.unwrap_f64(), b.unwrap_f64());
            let r = match op {
                FloatBinop::Add => a + b,
                FloatBinop::Sub => a - b,
                FloatBinop::Mul => a * b,
                FloatBinop::Div => a / b,
                FloatBinop::Min => fmin(a, b),
                FloatBinop::Max => fmax(a, b),
                FloatBinop::Copysign => a.copysign(b),
            };
            Val::from(r)
        }
    }
}

pub fn eval_frelop(width: FloatWidth, op: FloatRelop, a: Val, b: Val) -> Val {
    let (a, b) = match width {
        FloatWidth::F32 => (a.unwrap_f32() as f64, b.unwrap_f32() as f64),
        FloatWidth::F64 => (a.unwrap_f64(), b.unwrap_f64()),
    };
    let result = match op {
        FloatRelop::Eq => a == b,
        FloatRelop::Ne => a != b,
        FloatRelop::Lt => a < b,
        FloatRelop::Gt => a > b,
        FloatRelop::Le => a <= b,
        FloatRelop::Ge => a >= b,
    };
    Val::I32(result as i32)
}

fn trunc_to_i32(f: f64, signed: bool) -> Result<i32, Trap> {
    if f.is_nan() {
        return Err(Trap::InvalidConvToInt);
    }
    let t = f.trunc();
    if signed {
        if t < i32::MIN as f64 || t > i32::MAX as f64 {
            return Err(Trap::IntegerOverflow);
        }
        Ok(t as i32)
    } else {
        if t < 0.0 || t > u32::MAX as f64 {
            return Err(Trap::IntegerOverflow);
        }
        Ok(t as u32 as i32)
    }
}

fn trunc_to_i64(f: f64, signed: bool) -> Result<i64, Trap> {
    if f.is_nan() {
        return Err(Trap::InvalidConvToInt);
    }
    let t = f.trunc();
    if signed {
        if t < i64::MIN as f64 || t >= 9223372036854775808.0 {
            return Err(Trap::IntegerOverflow);
        }
        Ok(t as i64)
    } else {
        if t < 0.0 || t >= 18446744073709551616.0 {
            return Err(Trap::IntegerOverflow);
        }
        Ok(t as u64 as i64)
    }
}

fn sat_to_i32(f: f64, signed: bool) -> i32 {
    if f.is_nan() {
        return 0;
    }
    let t = f.trunc();
    if signed {
        if t < i32::MIN as f64 {
            i32::MIN
        } else if t > i32::MAX as f64 {
            i32::MAX
        } else {
            t as i32
        }
    } else if t < 0.0 {
        0
    } else if t > u32::MAX as f64 {
        u32::MAX as i32
    } else {
        t as u32 as i32
    }
}

fn sat_to_i64(f: f64, signed: bool) -> i64 {
    if f.is_nan() {
        return 0;
    }
    let t = f.trunc();
    if signed {
        if t < i64::MIN as f64 {
            i64::MIN
        } else if t >= 9223372036854775808.0 {
            i64::MAX
        } else {
            t as i64
        }
    } else if t < 0.0 {
        0
    } else if t >= 18446744073709551616.0 {
        -1
    } else {
        t as u64 as i64
    }
}

pub fn eval_cvt(op: Cvtop, v: Val) -> Result<Val, Trap> {
    Ok(match op {
        Cvtop::WrapI64 => Val::I32(v.unwrap_i64() as i32),
        Cvtop::ExtendI32S => Val::I64(v.unwrap_i32() as i64),
        Cvtop::ExtendI32U => Val::I64(v.unwrap_i32() as u32 as i64),

        Cvtop::TruncF32SToI32 => Val::I32(trunc_to_i32(v.unwrap_f32() as f64, true)?),
        Cvtop::TruncF32UToI32 => Val::I32(trunc_to_i32(v.unwrap_f32() as f64, false)?),
        Cvtop::TruncF64SToI32 => Val::I32(trunc_to_i32(v.unwrap_f64(), true)?),
        Cvtop::TruncF64UToI32 => Val::I32(trunc_to_i32(v.unwrap_f64(), false)?),
        Cvtop::TruncF32SToI64 => Val::I64(trunc_to_i64(v.unwrap_f32() as f64, true)?),
        Cvtop::TruncF32UToI64 => Val::I64(trunc_to_i64(v.unwrap_f32() as f64, false)?),
        Cvtop::TruncF64SToI64 => Val::I64(trunc_to_i64(v.unwrap_f64(), true)?),
        Cvtop::TruncF64UToI64 => Val::I64(trunc_to_i64(v.unwrap_f64(), false)?),

        Cvtop::TruncSatF32SToI32 => Val::I32(sat_to_i32(v.unwrap_f32() as f64, true)),
        Cvtop::TruncSatF32UToI32 => Val::I32(sat_to_i32(v.unwrap_f32() as f64, false)),
        Cvtop::TruncSatF64SToI32 => Val::I32(sat_to_i32(v.unwrap_f64(), true)),
        Cvtop::TruncSatF64UToI32 => Val::I32(sat_to_i32(v.unwrap_f64(), false)),
        Cvtop::TruncSatF32SToI64 => Val::I64(sat_to_i64(v.unwrap_f32() as f64, true)),
        Cvtop::TruncSatF32UToI64 => Val::I64(sat_to_i64(v.unwrap_f32() as f64, false)),
        Cvtop::TruncSatF64SToI64 => Val::I64(sat_to_i64(v.unwrap_f64(), true)),
        Cvtop::TruncSatF64UToI64 => Val::I64(sat_to_i64(v.unwrap_f64(), false)),

        Cvtop::ConvertI32SToF32 => Val::from(v.unwrap_i32() as f32),
        Cvtop::ConvertI32UToF32 => Val::from(v.unwrap_i32() as u32 as f32),
        Cvtop::ConvertI64SToF32 => Val::from(v.unwrap_i64() as f32),
        Cvtop::ConvertI64UToF32 => Val::from(v.unwrap_i64() as u64 as f32),
        Cvtop::ConvertI32SToF64 => Val::from(v.unwrap_i32() as f64),
        Cvtop::ConvertI32UToF64 => Val::from(v.unwrap_i32() as u32 as f64),
        Cvtop::ConvertI64SToF64 => Val::from(v.unwrap_i64() as f64),
        Cvtop::ConvertI64UToF64 => Val::from(v.unwrap_i64() as u64 as f64),

        Cvtop::DemoteF64 => Val::from(v.unwrap_f64() as f32),
        Cvtop::PromoteF32 => Val::from(v.unwrap_f32() as f64),

        Cvtop::ReinterpretInt => match v {
            Val::I32(i) => Val::F32(i as u32),
            Val::I64(i) => Val::F64(i as u64),
            _ => unreachable!("reinterpret source must be an int"),
        },
        Cvtop::ReinterpretFloat => match v {
            Val::F32(bits) => Val::I32(bits as i32),
            Val::F64(bits) => Val::I64(bits as i64),
            _ => unreachable!("reinterpret source must be a float"),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // `Val::F64`/`Val::F32` store raw bit patterns, so comparing `Val`s
    // exercises exact NaN payload / signed-zero behavior without a direct
    // float comparison.
    #[test]
    fn fmin_propagates_nan_from_either_operand() {
        let nan = Val::from(f64::NAN);
        let one = Val::from(1.0_f64);
        assert_eq!(eval_fbinop(FloatWidth::F64, FloatBinop::Min, nan.clone(), one.clone()), nan);
        assert_eq!(eval_fbinop(FloatWidth::F64, FloatBinop::Min, one, nan.clone()), nan);
    }

    #[test]
    fn fmin_of_both_zeros_prefers_negative() {
        let pos = Val::from(0.0_f64);
        let neg = Val::from(-0.0_f64);
        assert_eq!(eval_fbinop(FloatWidth::F64, FloatBinop::Min, pos, neg), Val::from(-0.0_f64));
    }

    #[test]
    fn fmax_of_both_zeros_prefers_positive() {
        let pos = Val::from(0.0_f64);
        let neg = Val::from(-0.0_f64);
        assert_eq!(eval_fbinop(FloatWidth::F64, FloatBinop::Max, neg, pos), Val::from(0.0_f64));
    }

    #[test]
    fn fmax_propagates_nan_from_either_operand() {
        let nan = Val::from(f32::NAN);
        let one = Val::from(1.0_f32);
        assert_eq!(eval_fbinop(FloatWidth::F32, FloatBinop::Max, nan.clone(), one), nan);
    }

    #[test]
    fn fmin_ordinary_values_picks_the_smaller() {
        let a = Val::from(3.5_f64);
        let b = Val::from(-2.0_f64);
        assert_eq!(eval_fbinop(FloatWidth::F64, FloatBinop::Min, a, b), Val::from(-2.0_f64));
    }
}
