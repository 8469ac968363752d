use super::CombinableArbitrary;
use crate::error::{Result, TamarinError};
use crate::reflect::IntegerKind;
use crate::value::Decimal;

fn empty_range(what: &str, detail: String) -> TamarinError {
    TamarinError::ConstraintConflict {
        property: what.to_string(),
        message: detail,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Parity {
    Even,
    Odd,
}

/// Integer generator spec with an inclusive range and optional parity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegerArbitrary {
    min: i128,
    max: i128,
    parity: Option<Parity>,
}

impl IntegerArbitrary {
    /// Full range of a primitive integer type.
    pub fn new(kind: IntegerKind) -> Self {
        let (min, max) = kind.bounds();
        IntegerArbitrary {
            min,
            max,
            parity: None,
        }
    }

    /// Narrow to `[min, max]`, intersected with the current range.
    pub fn range(mut self, min: i128, max: i128) -> Self {
        self.min = self.min.max(min);
        self.max = self.max.min(max);
        self
    }

    pub fn positive(self) -> Self {
        self.range(1, i128::MAX)
    }

    pub fn negative(self) -> Self {
        self.range(i128::MIN, -1)
    }

    pub fn even(mut self) -> Self {
        self.parity = Some(Parity::Even);
        self
    }

    pub fn odd(mut self) -> Self {
        self.parity = Some(Parity::Odd);
        self
    }

    pub fn bounds(&self) -> (i128, i128) {
        (self.min, self.max)
    }

    /// Create the generator, failing when no integer satisfies the configured bounds.
    pub fn build(&self) -> Result<CombinableArbitrary<i128>> {
        let (mut min, mut max) = (self.min, self.max);
        if let Some(parity) = self.parity {
            let wanted = if parity == Parity::Even { 0 } else { 1 };
            if min.rem_euclid(2) != wanted {
                min = min.saturating_add(1);
            }
            if max.rem_euclid(2) != wanted {
                max = max.saturating_sub(1);
            }
        }
        if min > max {
            return Err(empty_range(
                "integer",
                format!("no value in [{}, {}] with {:?}", self.min, self.max, self.parity),
            ));
        }
        if self.parity.is_none() {
            return Ok(CombinableArbitrary::from_fn(move |source| Ok(source.int_in(min, max))));
        }
        // Both ends now share the parity; draw a step count over them.
        let steps = (max - min) / 2;
        Ok(CombinableArbitrary::from_fn(move |source| {
            Ok(min + 2 * source.int_in(0, steps))
        }))
    }
}

/// Floating point generator spec.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloatArbitrary {
    min: f64,
    max: f64,
    min_inclusive: bool,
    max_inclusive: bool,
}

impl Default for FloatArbitrary {
    fn default() -> Self {
        FloatArbitrary {
            min: -1.0e9,
            max: 1.0e9,
            min_inclusive: true,
            max_inclusive: true,
        }
    }
}

impl FloatArbitrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.min = min;
        self.max = max;
        self.min_inclusive = true;
        self.max_inclusive = true;
        self
    }

    pub fn min(mut self, min: f64, inclusive: bool) -> Self {
        self.min = min;
        self.min_inclusive = inclusive;
        self
    }

    pub fn max(mut self, max: f64, inclusive: bool) -> Self {
        self.max = max;
        self.max_inclusive = inclusive;
        self
    }

    /// Exclude zero and everything below it.
    pub fn positive(mut self) -> Self {
        if self.min <= 0.0 {
            self.min = 0.0;
            self.min_inclusive = false;
        }
        self
    }

    pub fn negative(mut self) -> Self {
        if self.max >= 0.0 {
            self.max = 0.0;
            self.max_inclusive = false;
        }
        self
    }

    pub fn build(&self) -> Result<CombinableArbitrary<f64>> {
        let spec = *self;
        let empty = spec.min > spec.max
            || (spec.min == spec.max && !(spec.min_inclusive && spec.max_inclusive));
        if empty || !spec.min.is_finite() || !spec.max.is_finite() {
            return Err(empty_range(
                "float",
                format!("range [{}, {}] admits no value", spec.min, spec.max),
            ));
        }
        Ok(CombinableArbitrary::from_fn(move |source| {
            for _ in 0..16 {
                let value = spec.min + source.next_f64() * (spec.max - spec.min);
                let below = value < spec.min || (!spec.min_inclusive && value == spec.min);
                let above = value > spec.max || (!spec.max_inclusive && value == spec.max);
                if !below && !above {
                    return Ok(value);
                }
            }
            Ok(spec.min + (spec.max - spec.min) / 2.0)
        }))
    }
}

/// Fixed-point decimal generator spec.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecimalArbitrary {
    range: FloatArbitrary,
    scale: u32,
    integer_digits: Option<u32>,
}

impl Default for DecimalArbitrary {
    fn default() -> Self {
        DecimalArbitrary {
            range: FloatArbitrary::default(),
            scale: 2,
            integer_digits: None,
        }
    }
}

impl DecimalArbitrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.range = self.range.range(min, max);
        self
    }

    pub fn min(mut self, min: f64, inclusive: bool) -> Self {
        self.range = self.range.min(min, inclusive);
        self
    }

    pub fn max(mut self, max: f64, inclusive: bool) -> Self {
        self.range = self.range.max(max, inclusive);
        self
    }

    pub fn positive(mut self) -> Self {
        self.range = self.range.positive();
        self
    }

    pub fn negative(mut self) -> Self {
        self.range = self.range.negative();
        self
    }

    /// Digits right of the decimal point.
    pub fn scale(mut self, scale: u32) -> Self {
        self.scale = scale;
        self
    }

    /// Maximum digits left of the decimal point.
    pub fn integer_digits(mut self, digits: u32) -> Self {
        self.integer_digits = Some(digits);
        self
    }

    pub fn build(&self) -> Result<CombinableArbitrary<Decimal>> {
        let FloatArbitrary {
            min,
            max,
            min_inclusive,
            max_inclusive,
        } = self.range;
        let factor = 10f64.powi(self.scale as i32);
        let mut lo = (min * factor).ceil();
        if !min_inclusive && lo == min * factor {
            lo += 1.0;
        }
        let mut hi = (max * factor).floor();
        if !max_inclusive && hi == max * factor {
            hi -= 1.0;
        }
        let (mut lo, mut hi) = (lo as i128, hi as i128);
        if let Some(digits) = self.integer_digits {
            let limit = 10i128
                .checked_pow(digits.saturating_add(self.scale))
                .map_or(i128::MAX, |bound| bound - 1);
            lo = lo.max(-limit);
            hi = hi.min(limit);
        }
        if lo > hi {
            return Err(empty_range(
                "decimal",
                format!(
                    "no value with scale {} in [{}, {}]",
                    self.scale, min, max
                ),
            ));
        }
        let scale = self.scale;
        Ok(CombinableArbitrary::from_fn(move |source| {
            Ok(Decimal::new(source.int_in(lo, hi), scale))
        }))
    }
}
