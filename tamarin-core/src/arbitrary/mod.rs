//! Combinable arbitraries: composable, lazily sampled value generators.

mod numeric;
mod temporal;
mod text;

pub use numeric::*;
pub use temporal::*;
pub use text::*;

use crate::data::Source;
use crate::error::{Result, TamarinError};
use crate::value::{Nullable, Value};
use std::fmt;
use std::sync::Arc;

type Sampler<T> = Arc<dyn Fn(&mut Source) -> Result<T> + Send + Sync>;

/// A generator for values of type `T`.
///
/// Arbitraries are immutable values; every transformation returns a new
/// arbitrary and leaves the receiver usable. [`CombinableArbitrary::fixed`]
/// reports whether repeated samples are guaranteed to be equal.
pub struct CombinableArbitrary<T> {
    sampler: Sampler<T>,
    fixed: bool,
}

/// The arbitrary every tree node produces.
pub type ValueArbitrary = CombinableArbitrary<Value>;

impl<T> Clone for CombinableArbitrary<T> {
    fn clone(&self) -> Self {
        CombinableArbitrary {
            sampler: Arc::clone(&self.sampler),
            fixed: self.fixed,
        }
    }
}

impl<T> fmt::Debug for CombinableArbitrary<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CombinableArbitrary")
            .field("fixed", &self.fixed)
            .finish_non_exhaustive()
    }
}

impl<T: 'static> CombinableArbitrary<T> {
    pub(crate) fn with_fixedness<F>(fixed: bool, sampler: F) -> Self
    where
        F: Fn(&mut Source) -> Result<T> + Send + Sync + 'static,
    {
        CombinableArbitrary {
            sampler: Arc::new(sampler),
            fixed,
        }
    }

    /// An arbitrary that always produces `value`.
    pub fn from_value(value: T) -> Self
    where
        T: Clone + Send + Sync,
    {
        Self::with_fixedness(true, move |_| Ok(value.clone()))
    }

    /// An arbitrary backed by a sampling function.
    pub fn from_fn<F>(sample: F) -> Self
    where
        F: Fn(&mut Source) -> Result<T> + Send + Sync + 'static,
    {
        Self::with_fixedness(false, sample)
    }

    /// An arbitrary re-evaluating `supplier` on every sample.
    pub fn lazy<F>(supplier: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::with_fixedness(false, move |_| Ok(supplier()))
    }

    /// Fold the samples of `parts`, in order, into one value.
    ///
    /// The result is fixed when every part is.
    pub fn combine<A, F>(parts: Vec<CombinableArbitrary<A>>, combiner: F) -> Self
    where
        A: 'static,
        F: Fn(Vec<A>) -> Result<T> + Send + Sync + 'static,
    {
        let fixed = parts.iter().all(|part| part.fixed);
        Self::with_fixedness(fixed, move |source| {
            let values = parts
                .iter()
                .map(|part| part.sample(source))
                .collect::<Result<Vec<_>>>()?;
            combiner(values)
        })
    }

    /// A uniform choice among `choices`.
    pub fn element_of(choices: Vec<T>) -> Self
    where
        T: Clone + Send + Sync,
    {
        let fixed = choices.len() == 1;
        Self::with_fixedness(fixed, move |source| {
            if choices.is_empty() {
                return Err(TamarinError::Resolution {
                    type_name: std::any::type_name::<T>().to_string(),
                    reason: "no choices to pick from".to_string(),
                });
            }
            Ok(choices[source.index(choices.len())].clone())
        })
    }

    /// Draw one value.
    pub fn sample(&self, source: &mut Source) -> Result<T> {
        (self.sampler)(source)
    }

    /// Whether repeated samples are guaranteed to be equal.
    pub fn fixed(&self) -> bool {
        self.fixed
    }

    pub fn map<U, F>(self, f: F) -> CombinableArbitrary<U>
    where
        U: 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let fixed = self.fixed;
        CombinableArbitrary::with_fixedness(fixed, move |source| self.sample(source).map(&f))
    }

    /// Map with a fallible function.
    pub fn try_map<U, F>(self, f: F) -> CombinableArbitrary<U>
    where
        U: 'static,
        F: Fn(T) -> Result<U> + Send + Sync + 'static,
    {
        let fixed = self.fixed;
        CombinableArbitrary::with_fixedness(fixed, move |source| self.sample(source).and_then(&f))
    }

    /// Resample until `predicate` holds, giving up after `max_tries` draws.
    pub fn filter<F>(self, predicate: F, max_tries: usize) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self::from_fn(move |source| {
            for _ in 0..max_tries {
                let value = self.sample(source)?;
                if predicate(&value) {
                    return Ok(value);
                }
            }
            Err(TamarinError::RetryBudgetExceeded {
                attempts: max_tries,
                context: format!("no {} satisfied the filter", std::any::type_name::<T>()),
            })
        })
    }

    /// Generate a value, then sample the arbitrary it selects.
    pub fn flat_map<U, F>(self, f: F) -> CombinableArbitrary<U>
    where
        U: 'static,
        F: Fn(T) -> CombinableArbitrary<U> + Send + Sync + 'static,
    {
        CombinableArbitrary::from_fn(move |source| {
            let value = self.sample(source)?;
            f(value).sample(source)
        })
    }

    /// Replace samples by null with the given probability.
    ///
    /// Fixed when the input is fixed and the outcome is certain.
    pub fn inject_null(self, probability: f64) -> Self
    where
        T: Nullable,
    {
        if probability <= 0.0 {
            return self;
        }
        if probability >= 1.0 {
            return Self::with_fixedness(true, |_| Ok(T::null()));
        }
        Self::from_fn(move |source| {
            if source.chance(probability) {
                Ok(T::null())
            } else {
                self.sample(source)
            }
        })
    }
}

impl<T: 'static> CombinableArbitrary<CombinableArbitrary<T>> {
    /// Sample the inner arbitrary produced by each outer sample.
    pub fn flatten(self) -> CombinableArbitrary<T> {
        self.flat_map(|inner| inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_value_is_fixed() {
        let arbitrary = CombinableArbitrary::from_value(7);
        let mut source = Source::from_u64(1);
        assert!(arbitrary.fixed());
        assert_eq!(arbitrary.sample(&mut source), Ok(7));
        assert_eq!(arbitrary.sample(&mut source), Ok(7));
    }

    #[test]
    fn test_fixedness_propagation() {
        let fixed = CombinableArbitrary::from_value(1);
        let random = CombinableArbitrary::from_fn(|source| Ok(source.next_u64()));

        assert!(fixed.clone().map(|v| v + 1).fixed());
        assert!(!fixed.clone().filter(|_| true, 5).fixed());
        assert!(!random.clone().map(|v| v as i32).fixed());
        assert!(CombinableArbitrary::combine(vec![fixed.clone(), fixed.clone()], |v| Ok(v.len())).fixed());
        assert!(!CombinableArbitrary::combine(
            vec![fixed.clone(), random.map(|v| v as i32)],
            |v| Ok(v.len())
        )
        .fixed());
        assert!(!CombinableArbitrary::lazy(|| 3).fixed());
        assert!(!fixed.clone().flat_map(CombinableArbitrary::from_value).fixed());
    }

    #[test]
    fn test_inject_null_fixedness() {
        let fixed = CombinableArbitrary::from_value(Some(3));
        assert!(fixed.clone().inject_null(0.0).fixed());
        assert!(fixed.clone().inject_null(1.0).fixed());
        assert!(!fixed.clone().inject_null(0.5).fixed());

        let mut source = Source::from_u64(5);
        assert_eq!(fixed.inject_null(1.0).sample(&mut source), Ok(None));
    }

    #[test]
    fn test_filter_finds_satisfying_value() {
        let arbitrary =
            CombinableArbitrary::from_fn(|source| Ok(source.int_in(0, 9))).filter(|v| v % 2 == 0, 100);
        let mut source = Source::from_u64(12);
        for _ in 0..200 {
            let value = arbitrary.sample(&mut source).unwrap();
            assert_eq!(value % 2, 0);
        }
    }

    #[test]
    fn test_filter_budget_is_a_hard_cap() {
        let arbitrary = CombinableArbitrary::from_value(1).filter(|v| *v > 1, 25);
        let mut source = Source::from_u64(3);
        let error = arbitrary.sample(&mut source).unwrap_err();
        assert_eq!(error.attempts(), Some(25));
    }

    #[test]
    fn test_combine_and_flatten() {
        let parts = vec![
            CombinableArbitrary::from_value("a".to_string()),
            CombinableArbitrary::from_value("b".to_string()),
        ];
        let joined = CombinableArbitrary::combine(parts, |values| Ok(values.concat()));
        let mut source = Source::from_u64(0);
        assert_eq!(joined.sample(&mut source), Ok("ab".to_string()));

        let nested = CombinableArbitrary::from_value(CombinableArbitrary::from_value(4));
        assert_eq!(nested.flatten().sample(&mut source), Ok(4));
    }

    #[test]
    fn test_element_of_and_try_map() {
        let mut source = Source::from_u64(8);
        let choice = CombinableArbitrary::element_of(vec!['x', 'y']);
        for _ in 0..20 {
            assert!(matches!(choice.sample(&mut source), Ok('x') | Ok('y')));
        }
        let failing = CombinableArbitrary::from_value(2).try_map(|_| -> Result<i32> {
            Err(TamarinError::conversion("i32", "test"))
        });
        assert!(failing.sample(&mut source).is_err());
        assert!(CombinableArbitrary::<u8>::element_of(vec![])
            .sample(&mut source)
            .is_err());
    }
}
