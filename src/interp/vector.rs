//! Vector (SIMD) instruction evaluation (SPEC_FULL.md §4.6.3): a
//! representative subset covering each operation category (arithmetic,
//! comparison, bitwise, shift, splat/extract/replace lane, load/store
//! variants) rather than the full opcode table -- the decoder
//! (`module::decode_operator`) only emits `Instr::Vec` for the subset
//! covered here; anything else falls through to its catch-all unsupported
//! error, consistent with the binary decoder being a thin convenience layer
//! rather than the core's required surface.

use crate::ast::{IntBinop, IntUnop, LaneShape, Signedness, VecInstr};
use crate::values::Val;

pub(crate) fn lanes_i8(bits: u128) -> [i8; 16] {
    bits.to_le_bytes().map(|b| b as i8)
}
pub(crate) fn lanes_i16(bits: u128) -> [i16; 8] {
    let bytes = bits.to_le_bytes();
    std::array::from_fn(|i| i16::from_le_bytes([bytes[i * 2], bytes[i * 2 + 1]]))
}
pub(crate) fn lanes_i32(bits: u128) -> [i32; 4] {
    let bytes = bits.to_le_bytes();
    std::array::from_fn(|i| i32::from_le_bytes(bytes[i * 4..i * 4 + 4].try_into().unwrap()))
}
pub(crate) fn lanes_i64(bits: u128) -> [i64; 2] {
    let bytes = bits.to_le_bytes();
    std::array::from_fn(|i| i64::from_le_bytes(bytes[i * 8..i * 8 + 8].try_into().unwrap()))
}
pub(crate) fn lanes_f32(bits: u128) -> [f32; 4] {
    lanes_i32(bits).map(|v| f32::from_bits(v as u32))
}
pub(crate) fn lanes_f64(bits: u128) -> [f64; 2] {
    lanes_i64(bits).map(|v| f64::from_bits(v as u64))
}

pub(crate) fn from_i8(lanes: [i8; 16]) -> u128 {
    let mut bytes = [0u8; 16];
    for (i, l) in lanes.iter().enumerate() {
        bytes[i] = *l as u8;
    }
    u128::from_le_bytes(bytes)
}
pub(crate) fn from_i16(lanes: [i16; 8]) -> u128 {
    let mut bytes = [0u8; 16];
    for (i, l) in lanes.iter().enumerate() {
        bytes[i * 2..i * 2 + 2].copy_from_slice(&l.to_le_bytes());
    }
    u128::from_le_bytes(bytes)
}
pub(crate) fn from_i32(lanes: [i32; 4]) -> u128 {
    let mut bytes = [0u8; 16];
    for (i, l) in lanes.iter().enumerate() {
        bytes[i * 4..i * 4 + 4].copy_from_slice(&l.to_le_bytes());
    }
    u128::from_le_bytes(bytes)
}
pub(crate) fn from_i64(lanes: [i64; 2]) -> u128 {
    let mut bytes = [0u8; 16];
    for (i, l) in lanes.iter().enumerate() {
        bytes[i * 8..i * 8 + 8].copy_from_slice(&l.to_le_bytes());
    }
    u128::from_le_bytes(bytes)
}
fn from_f32(lanes: [f32; 4]) -> u128 {
    from_i32(lanes.map(|v| v.to_bits() as i32))
}
fn from_f64(lanes: [f64; 2]) -> u128 {
    from_i64(lanes.map(|v| v.to_bits() as i64))
}

fn int_binop(a: i64, b: i64, op: IntBinop, bits: u32) -> i64 {
    let mask = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };
    let r = match op {
        IntBinop::Add => a.wrapping_add(b),
        IntBinop::Sub => a.wrapping_sub(b),
        IntBinop::Mul => a.wrapping_mul(b),
        IntBinop::And => a & b,
        IntBinop::Or => a | b,
        IntBinop::Xor => a ^ b,
        _ => a,
    };
    (r as u64 & mask) as i64
}

pub fn eval(instr: &VecInstr, pop: impl FnOnce(usize) -> Vec<Val>) -> Val {
    match *instr {
        VecInstr::Splat(shape) => {
            let v = pop(1).remove(0);
            Val::V128(match shape {
                LaneShape::I8x16 => from_i8([v.unwrap_i32() as i8; 16]),
                LaneShape::I16x8 => from_i16([v.unwrap_i32() as i16; 8]),
                LaneShape::I32x4 => from_i32([v.unwrap_i32(); 4]),
                LaneShape::I64x2 => from_i64([v.unwrap_i64(); 2]),
                LaneShape::F32x4 => from_f32([v.unwrap_f32(); 4]),
                LaneShape::F64x2 => from_f64([v.unwrap_f64(); 2]),
            })
        }
        VecInstr::ExtractLane(shape, lane, signedness) => {
            let v = pop(1).remove(0).unwrap_v128();
            match shape {
                LaneShape::I8x16 => {
                    let x = lanes_i8(v)[lane as usize];
                    Val::I32(match signedness {
                        Some(Signedness::Unsigned) => x as u8 as i32,
                        _ => x as i32,
                    })
                }
                LaneShape::I16x8 => {
                    let x = lanes_i16(v)[lane as usize];
                    Val::I32(match signedness {
                        Some(Signedness::Unsigned) => x as u16 as i32,
                        _ => x as i32,
                    })
                }
                LaneShape::I32x4 => Val::I32(lanes_i32(v)[lane as usize]),
                LaneShape::I64x2 => Val::I64(lanes_i64(v)[lane as usize]),
                LaneShape::F32x4 => Val::from(lanes_f32(v)[lane as usize]),
                LaneShape::F64x2 => Val::from(lanes_f64(v)[lane as usize]),
            }
        }
        VecInstr::ReplaceLane(shape, lane) => {
            let args = pop(2);
            let vec = args[0].unwrap_v128();
            let scalar = &args[1];
            Val::V128(match shape {
                LaneShape::I8x16 => {
                    let mut l = lanes_i8(vec);
                    l[lane as usize] = scalar.unwrap_i32() as i8;
                    from_i8(l)
                }
                LaneShape::I16x8 => {
                    let mut l = lanes_i16(vec);
                    l[lane as usize] = scalar.unwrap_i32() as i16;
                    from_i16(l)
                }
                LaneShape::I32x4 => {
                    let mut l = lanes_i32(vec);
                    l[lane as usize] = scalar.unwrap_i32();
                    from_i32(l)
                }
                LaneShape::I64x2 => {
                    let mut l = lanes_i64(vec);
                    l[lane as usize] = scalar.unwrap_i64();
                    from_i64(l)
                }
                LaneShape::F32x4 => {
                    let mut l = lanes_f32(vec);
                    l[lane as usize] = scalar.unwrap_f32();
                    from_f32(l)
                }
                LaneShape::F64x2 => {
                    let mut l = lanes_f64(vec);
                    l[lane as usize] = scalar.unwrap_f64();
                    from_f64(l)
                }
            })
        }
        VecInstr::Binop(shape, op) => {
            let args = pop(2);
            let (a, b) = (args[0].unwrap_v128(), args[1].unwrap_v128());
            Val::V128(match shape {
                LaneShape::I8x16 => {
                    let (la, lb) = (lanes_i8(a), lanes_i8(b));
                    from_i8(std::array::from_fn(|i| int_binop(la[i] as i64, lb[i] as i64, op, 8) as i8))
                }
                LaneShape::I16x8 => {
                    let (la, lb) = (lanes_i16(a), lanes_i16(b));
                    from_i16(std::array::from_fn(|i| int_binop(la[i] as i64, lb[i] as i64, op, 16) as i16))
                }
                LaneShape::I32x4 => {
                    let (la, lb) = (lanes_i32(a), lanes_i32(b));
                    from_i32(std::array::from_fn(|i| int_binop(la[i] as i64, lb[i] as i64, op, 32) as i32))
                }
                LaneShape::I64x2 => {
                    let (la, lb) = (lanes_i64(a), lanes_i64(b));
                    from_i64(std::array::from_fn(|i| int_binop(la[i], lb[i], op, 64)))
                }
                LaneShape::F32x4 | LaneShape::F64x2 => unreachable!("integer binop on a float lane shape"),
            })
        }
        VecInstr::FloatBinop(shape, op) => {
            let args = pop(2);
            let (a, b) = (args[0].unwrap_v128(), args[1].unwrap_v128());
            let apply = |x: f64, y: f64| -> f64 {
                match op {
                    crate::ast::FloatBinop::Add => x + y,
                    crate::ast::FloatBinop::Sub => x - y,
                    crate::ast::FloatBinop::Mul => x * y,
                    crate::ast::FloatBinop::Div => x / y,
                    crate::ast::FloatBinop::Min => x.min(y),
                    crate::ast::FloatBinop::Max => x.max(y),
                    crate::ast::FloatBinop::Copysign => x.copysign(y),
                }
            };
            Val::V128(match shape {
                LaneShape::F32x4 => {
                    let (la, lb) = (lanes_f32(a), lanes_f32(b));
                    from_f32(std::array::from_fn(|i| apply(la[i] as f64, lb[i] as f64) as f32))
                }
                LaneShape::F64x2 => {
                    let (la, lb) = (lanes_f64(a), lanes_f64(b));
                    from_f64(std::array::from_fn(|i| apply(la[i], lb[i])))
                }
                _ => unreachable!("float binop on an integer lane shape"),
            })
        }
        VecInstr::Unop(shape, op) => {
            let v = pop(1).remove(0).unwrap_v128();
            Val::V128(match shape {
                LaneShape::I8x16 => from_i8(lanes_i8(v).map(|x| apply_iunop(x as i64, op) as i8)),
                LaneShape::I16x8 => from_i16(lanes_i16(v).map(|x| apply_iunop(x as i64, op) as i16)),
                LaneShape::I32x4 => from_i32(lanes_i32(v).map(|x| apply_iunop(x as i64, op) as i32)),
                LaneShape::I64x2 => from_i64(lanes_i64(v).map(|x| apply_iunop(x, op))),
                _ => unreachable!("integer unop on a float lane shape"),
            })
        }
        VecInstr::Not => Val::V128(!pop(1).remove(0).unwrap_v128()),
        VecInstr::And => {
            let a = pop(2);
            Val::V128(a[0].unwrap_v128() & a[1].unwrap_v128())
        }
        VecInstr::Or => {
            let a = pop(2);
            Val::V128(a[0].unwrap_v128() | a[1].unwrap_v128())
        }
        VecInstr::Xor => {
            let a = pop(2);
            Val::V128(a[0].unwrap_v128() ^ a[1].unwrap_v128())
        }
        VecInstr::AndNot => {
            let a = pop(2);
            Val::V128(a[0].unwrap_v128() & !a[1].unwrap_v128())
        }
        VecInstr::Bitselect => {
            let a = pop(3);
            let (v1, v2, c) = (a[0].unwrap_v128(), a[1].unwrap_v128(), a[2].unwrap_v128());
            Val::V128((v1 & c) | (v2 & !c))
        }
        VecInstr::AnyTrue => Val::I32((pop(1).remove(0).unwrap_v128() != 0) as i32),
        VecInstr::AllTrue(shape) => {
            let v = pop(1).remove(0).unwrap_v128();
            let all = match shape {
                LaneShape::I8x16 => lanes_i8(v).iter().all(|&x| x != 0),
                LaneShape::I16x8 => lanes_i16(v).iter().all(|&x| x != 0),
                LaneShape::I32x4 => lanes_i32(v).iter().all(|&x| x != 0),
                LaneShape::I64x2 => lanes_i64(v).iter().all(|&x| x != 0),
                _ => unreachable!("all_true on a float lane shape"),
            };
            Val::I32(all as i32)
        }
        VecInstr::Bitmask(shape) => {
            let v = pop(1).remove(0).unwrap_v128();
            let mask = match shape {
                LaneShape::I8x16 => lanes_i8(v).iter().enumerate().fold(0i32, |m, (i, &x)| m | (((x < 0) as i32) << i)),
                LaneShape::I16x8 => lanes_i16(v).iter().enumerate().fold(0i32, |m, (i, &x)| m | (((x < 0) as i32) << i)),
                LaneShape::I32x4 => lanes_i32(v).iter().enumerate().fold(0i32, |m, (i, &x)| m | (((x < 0) as i32) << i)),
                LaneShape::I64x2 => lanes_i64(v).iter().enumerate().fold(0i32, |m, (i, &x)| m | (((x < 0) as i32) << i)),
                _ => unreachable!("bitmask on a float lane shape"),
            };
            Val::I32(mask)
        }
        VecInstr::Shl(shape) => {
            let a = pop(2);
            let (v, n) = (a[0].unwrap_v128(), a[1].unwrap_i32() as u32);
            Val::V128(match shape {
                LaneShape::I8x16 => from_i8(lanes_i8(v).map(|x| x.wrapping_shl(n & 7))),
                LaneShape::I16x8 => from_i16(lanes_i16(v).map(|x| x.wrapping_shl(n & 15))),
                LaneShape::I32x4 => from_i32(lanes_i32(v).map(|x| x.wrapping_shl(n & 31))),
                LaneShape::I64x2 => from_i64(lanes_i64(v).map(|x| x.wrapping_shl(n & 63))),
                _ => unreachable!("shl on a float lane shape"),
            })
        }
        VecInstr::ShrS(shape) => {
            let a = pop(2);
            let (v, n) = (a[0].unwrap_v128(), a[1].unwrap_i32() as u32);
            Val::V128(match shape {
                LaneShape::I8x16 => from_i8(lanes_i8(v).map(|x| x.wrapping_shr(n & 7))),
                LaneShape::I16x8 => from_i16(lanes_i16(v).map(|x| x.wrapping_shr(n & 15))),
                LaneShape::I32x4 => from_i32(lanes_i32(v).map(|x| x.wrapping_shr(n & 31))),
                LaneShape::I64x2 => from_i64(lanes_i64(v).map(|x| x.wrapping_shr(n & 63))),
                _ => unreachable!("shr_s on a float lane shape"),
            })
        }
        VecInstr::ShrU(shape) => {
            let a = pop(2);
            let (v, n) = (a[0].unwrap_v128(), a[1].unwrap_i32() as u32);
            Val::V128(match shape {
                LaneShape::I8x16 => from_i8(lanes_i8(v).map(|x| (x as u8).wrapping_shr(n & 7) as i8)),
                LaneShape::I16x8 => from_i16(lanes_i16(v).map(|x| (x as u16).wrapping_shr(n & 15) as i16)),
                LaneShape::I32x4 => from_i32(lanes_i32(v).map(|x| (x as u32).wrapping_shr(n & 31) as i32)),
                LaneShape::I64x2 => from_i64(lanes_i64(v).map(|x| (x as u64).wrapping_shr(n & 63) as i64)),
                _ => unreachable!("shr_u on a float lane shape"),
            })
        }
        VecInstr::Shuffle(lanes) => {
            let a = pop(2);
            let (v1, v2) = (lanes_i8(a[0].unwrap_v128()), lanes_i8(a[1].unwrap_v128()));
            let combined: [i8; 32] = std::array::from_fn(|i| if i < 16 { v1[i] } else { v2[i - 16] });
            Val::V128(from_i8(lanes.map(|i| combined[i as usize])))
        }
        VecInstr::Swizzle => {
            let a = pop(2);
            let (v, idx) = (lanes_i8(a[0].unwrap_v128()), lanes_i8(a[1].unwrap_v128()));
            Val::V128(from_i8(idx.map(|i| if (i as u8) < 16 { v[i as usize] } else { 0 })))
        }
        VecInstr::ConstBytes(bytes) => Val::V128(u128::from_le_bytes(bytes)),
        VecInstr::Load(..) | VecInstr::LoadSplat(..) | VecInstr::LoadZero(..) | VecInstr::LoadLane(..)
        | VecInstr::StoreLane(..) | VecInstr::Store(..) => {
            unreachable!("vector load/store variants are dispatched by the caller, which has memory access")
        }
    }
}

fn apply_iunop(x: i64, op: IntUnop) -> i64 {
    match op {
        IntUnop::Clz => x.leading_zeros() as i64,
        IntUnop::Ctz => x.trailing_zeros() as i64,
        IntUnop::Popcnt => x.count_ones() as i64,
        IntUnop::Extend8S => x as i8 as i64,
        IntUnop::Extend16S => x as i16 as i64,
        IntUnop::Extend32S => x as i32 as i64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::FloatBinop;

    #[test]
    fn splat_broadcasts_to_every_lane() {
        let v = eval(&VecInstr::Splat(LaneShape::I32x4), |n| {
            assert_eq!(n, 1);
            vec![Val::I32(7)]
        });
        assert_eq!(lanes_i32(v.unwrap_v128()), [7, 7, 7, 7]);
    }

    #[test]
    fn extract_lane_honors_signedness_on_packed_shapes() {
        let bits = from_i8([-1i8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        let unsigned = eval(&VecInstr::ExtractLane(LaneShape::I8x16, 0, Some(Signedness::Unsigned)), |_| vec![Val::V128(bits)]);
        let signed = eval(&VecInstr::ExtractLane(LaneShape::I8x16, 0, Some(Signedness::Signed)), |_| vec![Val::V128(bits)]);
        assert_eq!(unsigned, Val::I32(255));
        assert_eq!(signed, Val::I32(-1));
    }

    #[test]
    fn replace_lane_only_touches_the_target_lane() {
        let base = from_i32([1, 2, 3, 4]);
        let replaced = eval(&VecInstr::ReplaceLane(LaneShape::I32x4, 2), |_| vec![Val::V128(base), Val::I32(99)]);
        assert_eq!(lanes_i32(replaced.unwrap_v128()), [1, 2, 99, 4]);
    }

    #[test]
    fn integer_binop_add_wraps_per_lane() {
        let a = from_i32([i32::MAX, 1, 2, 3]);
        let b = from_i32([1, 1, 1, 1]);
        let sum = eval(&VecInstr::Binop(LaneShape::I32x4, IntBinop::Add), |_| vec![Val::V128(a), Val::V128(b)]);
        assert_eq!(lanes_i32(sum.unwrap_v128()), [i32::MIN, 2, 3, 4]);
    }

    #[test]
    fn float_binop_div_is_lanewise() {
        let a = from_f32([10.0, 9.0, 8.0, 1.0]);
        let b = from_f32([2.0, 3.0, 4.0, 2.0]);
        let quotient = eval(&VecInstr::FloatBinop(LaneShape::F32x4, FloatBinop::Div), |_| vec![Val::V128(a), Val::V128(b)]);
        assert_eq!(lanes_f32(quotient.unwrap_v128()), [5.0, 3.0, 2.0, 0.5]);
    }
}
