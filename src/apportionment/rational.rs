use std::cmp::Ordering;

use rust_decimal::Decimal;

use super::errors::ApportionmentError;

// ============================================================================
// Exact Rational Arithmetic
// ============================================================================
//
// Every rounding boundary of the apportionment is decided on non-negative
// rationals compared by cross-multiplication. Products are taken to 256
// bits, so comparisons never overflow; only constructing a new ratio can.
//
// ============================================================================

/// Scale used when a divisor has no finite decimal expansion
const REPORTING_SCALE: u32 = 10;

/// Smallest exponent tried when looking for a short decimal divisor
const MIN_DECIMAL_EXPONENT: i32 = -18;

/// Non-negative rational in lowest terms
#[derive(Clone, Copy, Debug)]
pub struct Ratio {
    num: u128,
    den: u128,
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Full 256-bit product as (high, low) words
pub(crate) fn widening_mul(a: u128, b: u128) -> (u128, u128) {
    const MASK: u128 = u64::MAX as u128;
    let (a_hi, a_lo) = (a >> 64, a & MASK);
    let (b_hi, b_lo) = (b >> 64, b & MASK);

    let ll = a_lo * b_lo;
    let lh = a_lo * b_hi;
    let hl = a_hi * b_lo;
    let hh = a_hi * b_hi;

    let mid = (ll >> 64) + (lh & MASK) + (hl & MASK);
    let lo = (ll & MASK) | (mid << 64);
    let hi = hh + (lh >> 64) + (hl >> 64) + (mid >> 64);
    (hi, lo)
}

fn overflow() -> ApportionmentError {
    ApportionmentError::ArithmeticOverflow
}

fn checked(value: Option<u128>) -> Result<u128, ApportionmentError> {
    value.ok_or_else(overflow)
}

impl Ratio {
    pub fn new(num: u128, den: u128) -> Result<Self, ApportionmentError> {
        if den == 0 {
            return Err(overflow());
        }
        if num == 0 {
            return Ok(Self::zero());
        }
        let divisor = gcd(num, den);
        Ok(Self {
            num: num / divisor,
            den: den / divisor,
        })
    }

    pub fn zero() -> Self {
        Self { num: 0, den: 1 }
    }

    pub fn integer(value: u64) -> Self {
        Self {
            num: value as u128,
            den: 1,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.num == 0
    }

    /// `self / (seats + 1/2)`, the standard-rounding quotient of a weight
    /// that already holds `seats` seats
    pub fn standard_quotient(&self, seats: u32) -> Result<Self, ApportionmentError> {
        let den = self.den.checked_mul(2 * seats as u128 + 1);
        Self::new(checked(self.num.checked_mul(2))?, checked(den)?)
    }

    pub fn checked_div(&self, other: &Ratio) -> Result<Self, ApportionmentError> {
        if other.is_zero() {
            return Err(overflow());
        }
        Self::new(
            checked(self.num.checked_mul(other.den))?,
            checked(self.den.checked_mul(other.num))?,
        )
    }

    /// `value / self`
    pub fn divide_integer(&self, value: u64) -> Result<Self, ApportionmentError> {
        Self::integer(value).checked_div(self)
    }

    pub fn midpoint(&self, other: &Ratio) -> Result<Self, ApportionmentError> {
        let left = checked(self.num.checked_mul(other.den))?;
        let right = checked(other.num.checked_mul(self.den))?;
        let den = checked(self.den.checked_mul(other.den).and_then(|d| d.checked_mul(2)))?;
        Self::new(checked(left.checked_add(right))?, den)
    }

    fn floor(&self) -> u128 {
        self.num / self.den
    }

    /// Exact when the expansion terminates within 28 places, else rounded
    /// half up to ten places
    pub fn to_decimal(&self) -> Result<Decimal, ApportionmentError> {
        for scale in 0..=28u32 {
            let Some(scaled) = 10u128.checked_pow(scale).and_then(|p| self.num.checked_mul(p)) else {
                break;
            };
            if scaled % self.den == 0 {
                return decimal(scaled / self.den, scale);
            }
        }

        let scaled = checked(
            10u128
                .checked_pow(REPORTING_SCALE)
                .and_then(|p| self.num.checked_mul(p))
                .and_then(|n| n.checked_mul(2))
                .and_then(|n| n.checked_add(self.den)),
        )?;
        decimal(scaled / (2 * self.den), REPORTING_SCALE).map(|d| d.normalize())
    }
}

fn decimal(mantissa: u128, scale: u32) -> Result<Decimal, ApportionmentError> {
    let mantissa = i128::try_from(mantissa).map_err(|_| overflow())?;
    Decimal::try_from_i128_with_scale(mantissa, scale).map_err(|_| overflow())
}

impl Ord for Ratio {
    fn cmp(&self, other: &Self) -> Ordering {
        widening_mul(self.num, other.den).cmp(&widening_mul(other.num, self.den))
    }
}

impl PartialOrd for Ratio {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Ratio {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ratio {}

fn digits(mut value: u128) -> i32 {
    let mut count = 0;
    while value > 0 {
        value /= 10;
        count += 1;
    }
    count
}

/// Decimal with the fewest significant digits strictly between `lo` and
/// `hi`; the smallest such value on ties. An unbounded interval is capped at
/// `2 * lo + 1`. Falls back to the midpoint when no candidate fits.
pub fn shortest_decimal_between(lo: &Ratio, hi: Option<&Ratio>) -> Result<Ratio, ApportionmentError> {
    let hi = match hi {
        Some(hi) => *hi,
        None => Ratio::new(
            checked(lo.num.checked_mul(2).and_then(|n| n.checked_add(lo.den)))?,
            lo.den,
        )?,
    };

    let mut exponent = if hi.floor() >= 1 { digits(hi.floor()) } else { 0 };
    while exponent >= MIN_DECIMAL_EXPONENT {
        let candidate = if exponent >= 0 {
            let Some(step) = 10u128.checked_pow(exponent as u32) else {
                exponent -= 1;
                continue;
            };
            let multiple = match lo.den.checked_mul(step) {
                Some(den) => lo.num / den + 1,
                None => 1,
            };
            multiple.checked_mul(step).map(|n| Ratio::new(n, 1))
        } else {
            let Some(scale) = 10u128.checked_pow((-exponent) as u32) else {
                break;
            };
            let Some(scaled) = lo.num.checked_mul(scale) else {
                break;
            };
            Some(Ratio::new(scaled / lo.den + 1, scale))
        };

        if let Some(candidate) = candidate.transpose()? {
            if candidate < hi {
                return Ok(candidate);
            }
        }
        exponent -= 1;
    }

    lo.midpoint(&hi)
}
