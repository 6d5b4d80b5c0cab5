//! Aggregation strategies for running one fallible step per item, in order.
//!
//! - [`collect_with_skip`]: a failing item is recorded and skipped; the rest still run.
//! - [`fail_fast`]: the first failure stops the batch; later items never run.
//!
//! Both run strictly sequentially, so side effects and output follow input order.

/// Outcome of [`collect_with_skip`].
#[derive(Debug)]
pub struct Collected<T, E> {
    /// Successful results, in input order.
    pub items: Vec<T>,

    /// Failed inputs (by label) with their errors, in input order.
    pub failures: Vec<(String, E)>,
}

impl<T, E> Collected<T, E> {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Runs `step` on every input, keeping successes and recording failures.
///
/// Failures are recorded under the input's label; logging them is up to
/// `step`, which knows what the input is. `on_success` fires once per
/// successful item, as it happens.
pub fn collect_with_skip<I, T, E, L, S, P>(
    inputs: I,
    label: L,
    mut step: S,
    mut on_success: P,
) -> Collected<T, E>
where
    I: IntoIterator,
    L: Fn(&I::Item) -> String,
    S: FnMut(&I::Item) -> Result<T, E>,
    P: FnMut(&T),
{
    let mut collected = Collected {
        items: Vec::new(),
        failures: Vec::new(),
    };

    for input in inputs {
        match step(&input) {
            Ok(item) => {
                on_success(&item);
                collected.items.push(item);
            }
            Err(error) => {
                collected.failures.push((label(&input), error));
            }
        }
    }

    collected
}

/// Runs `step` on every input until one fails.
///
/// Returns all results, or the first error.
pub fn fail_fast<I, T, E, S>(inputs: I, step: S) -> Result<Vec<T>, E>
where
    I: IntoIterator,
    S: FnMut(I::Item) -> Result<T, E>,
{
    inputs.into_iter().map(step).collect()
}
