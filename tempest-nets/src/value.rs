//! Value head: a single hidden layer of `i16` weights with SCReLU
//! activation, producing a centipawn score, plus the cp <-> WDL maps.

use crate::feature::{for_each_feature, FEATURES};
use tempest_core::Board;

pub const QA: i32 = 255;
pub const QB: i32 = 64;
pub const EVAL_SCALE: i32 = 400;
pub const HIDDEN: usize = 32;

/// Centipawn scale of the logistic cp <-> WDL map.
pub const EVAL_DIVISOR: f64 = 400.0;

const BLOB_LEN: usize = (FEATURES * HIDDEN + HIDDEN + HIDDEN + 1) * 2;

#[repr(C, align(32))]
struct AlignedBlob<const N: usize>([u8; N]);

static BLOB: AlignedBlob<BLOB_LEN> = AlignedBlob(*include_bytes!("../networks/value.bin"));

struct ValueNet {
    l1_weights: &'static [i16], // [feature][hidden]
    l1_bias: &'static [i16],
    out_weights: &'static [i16],
    out_bias: i16,
}

fn net() -> ValueNet {
    let all: &'static [i16] = bytemuck::cast_slice(&BLOB.0);
    let (l1_weights, rest) = all.split_at(FEATURES * HIDDEN);
    let (l1_bias, rest) = rest.split_at(HIDDEN);
    let (out_weights, rest) = rest.split_at(HIDDEN);
    ValueNet {
        l1_weights,
        l1_bias,
        out_weights,
        out_bias: rest[0],
    }
}

#[inline]
fn screlu(x: i16) -> i32 {
    let clamped = (x as i32).clamp(0, QA);
    clamped * clamped
}

/// Static evaluation of `board` in centipawns, from the side to move.
pub fn evaluate(board: &Board) -> i32 {
    let nn = net();

    let mut acc = [0i16; HIDDEN];
    acc.copy_from_slice(nn.l1_bias);
    for_each_feature(board, |feature| {
        let row = &nn.l1_weights[feature * HIDDEN..(feature + 1) * HIDDEN];
        for (a, &w) in acc.iter_mut().zip(row) {
            *a = a.wrapping_add(w);
        }
    });

    // Full i32 precision through the reduction; dequantise once at the end.
    let mut sum = 0i32;
    for (i, &a) in acc.iter().enumerate() {
        sum += screlu(a) * nn.out_weights[i] as i32;
    }

    let eval = sum / QA + nn.out_bias as i32;
    eval * EVAL_SCALE / (QA * QB)
}

/// `cp -> [-1, 1]` through a logistic curve: `2 * sigmoid(cp / 400) - 1`.
pub fn cp_to_wdl(cp: i32) -> f64 {
    2.0 / (1.0 + (-(cp as f64) / EVAL_DIVISOR).exp()) - 1.0
}

/// Inverse of [`cp_to_wdl`] over the open interval `(-1, 1)`.
pub fn wdl_to_cp(wdl: f64) -> i32 {
    assert!(wdl > -1.0 && wdl < 1.0, "wdl {wdl} outside (-1, 1)");
    (EVAL_DIVISOR * ((1.0 + wdl) / (1.0 - wdl)).ln()).round() as i32
}
