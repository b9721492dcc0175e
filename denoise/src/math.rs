//! Scalar fast exponential used for NLM weights.
//!
//! Cephes-style range reduction + polynomial approximation:
//! 1. n = round(x / ln2), so x = n·ln2 + r with |r| ≤ ln2/2
//! 2. exp(r) ≈ 1 + r·P(r) with a degree-6 Taylor polynomial
//! 3. exp(x) = 2^n · exp(r), with 2^n built directly in the exponent bits
//!
//! Relative error stays around 1e-7 over the clamped input range, and
//! `fast_exp(0.0)` is exactly 1.0.

const EXP_C1: f32 = 1.0;
const EXP_C2: f32 = 0.5;
const EXP_C3: f32 = 0.166_666_67;
const EXP_C4: f32 = 0.041_666_668;
const EXP_C5: f32 = 0.008_333_334;
const EXP_C6: f32 = 0.001_388_889_1;

const LOG2E: f32 = std::f32::consts::LOG2_E;

// ln2 split so that n·LN2_HI is exact for the reachable n
const LN2_HI: f32 = 0.693_145_75;
const LN2_LO: f32 = 1.428_606_8e-6;

/// exp(-87.3) is about the smallest normal f32.
const EXP_LO: f32 = -87.3;
const EXP_HI: f32 = 88.0;

#[inline]
pub(crate) fn fast_exp(x: f32) -> f32 {
    let x = x.clamp(EXP_LO, EXP_HI);

    let n = (x * LOG2E + 0.5).floor();
    let r = x - n * LN2_HI - n * LN2_LO;

    let p = EXP_C6;
    let p = p * r + EXP_C5;
    let p = p * r + EXP_C4;
    let p = p * r + EXP_C3;
    let p = p * r + EXP_C2;
    let p = p * r + EXP_C1;
    let p = p * r + 1.0;

    let pow2n = f32::from_bits(((127 + n as i32) as u32) << 23);
    p * pow2n
}
