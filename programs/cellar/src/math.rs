use anchor_lang::prelude::*;

use crate::{constants::BPS_DENOMINATOR, errors::CellarError};

/// Rounding direction for share and value conversions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rounding {
    Down,
    Up,
}

/// `a * b / c` in u128 with the requested rounding
pub fn mul_div(a: u128, b: u128, c: u128, rounding: Rounding) -> Result<u128> {
    require!(c != 0, CellarError::DivisionByZero);
    let product = a.checked_mul(b).ok_or(error!(CellarError::MathOverflow))?;
    let quotient = product / c;
    if rounding == Rounding::Up && product % c != 0 {
        return quotient
            .checked_add(1)
            .ok_or(error!(CellarError::MathOverflow));
    }
    Ok(quotient)
}

/// `a * b / c` for u64 operands, result narrowed back to u64
pub fn mul_div_u64(a: u64, b: u64, c: u64, rounding: Rounding) -> Result<u64> {
    let value = mul_div(a as u128, b as u128, c as u128, rounding)?;
    to_u64(value)
}

pub fn to_u64(value: u128) -> Result<u64> {
    u64::try_from(value).map_err(|_| error!(CellarError::MathOverflow))
}

/// 10^exp as u128
pub fn pow10(exp: u8) -> Result<u128> {
    10u128
        .checked_pow(exp as u32)
        .ok_or(error!(CellarError::MathOverflow))
}

/// Rescale `amount` from `from` decimals to `to` decimals, rounding down
pub fn rescale(amount: u128, from: u8, to: u8) -> Result<u128> {
    if from == to {
        return Ok(amount);
    }
    if to > from {
        amount
            .checked_mul(pow10(to - from)?)
            .ok_or(error!(CellarError::MathOverflow))
    } else {
        Ok(amount / pow10(from - to)?)
    }
}

/// `amount * bps / 10_000`, rounding down
pub fn apply_bps(amount: u64, bps: u64) -> Result<u64> {
    mul_div_u64(amount, bps, BPS_DENOMINATOR, Rounding::Down)
}

/// Integer square root (floor)
pub fn isqrt(value: u128) -> u128 {
    if value < 2 {
        return value;
    }
    let mut x = value;
    let mut y = (x >> 1) + (x & 1);
    while y < x {
        x = y;
        y = (x + value / x) / 2;
    }
    x
}

/// Absolute difference of two values expressed in basis points of `reference`
pub fn deviation_bps(value: u128, reference: u128) -> Result<u128> {
    if reference == 0 {
        return Ok(if value == 0 { 0 } else { u128::MAX });
    }
    let diff = value.abs_diff(reference);
    mul_div(diff, BPS_DENOMINATOR as u128, reference, Rounding::Up)
}
