//! Logging statistics from training runs
mod display;

pub use display::DisplayLogger;

use thiserror::Error;

/// A value that can be logged.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Loggable {
    /// A scalar value. Aggregate by taking means.
    Scalar(f64),
    /// An increment to an integer counter. Aggregate by taking sums.
    CounterIncrement(u64),
}

impl Loggable {
    /// Name of the variant; used in error messages.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::CounterIncrement(_) => "counter",
        }
    }
}

impl From<f64> for Loggable {
    #[inline]
    fn from(value: f64) -> Self {
        Self::Scalar(value)
    }
}

impl From<f32> for Loggable {
    #[inline]
    fn from(value: f32) -> Self {
        Self::Scalar(value.into())
    }
}

/// Log statistics from a training run.
pub trait StatsLogger {
    /// Log a value.
    ///
    /// # Returns
    /// An error if the logged value is structurally incompatible
    /// with previous values logged under the same name.
    fn log(&mut self, name: &'static str, value: Loggable) -> Result<(), LogError>;

    /// Write out any summarized values that have not been written yet.
    fn flush(&mut self);

    /// Log a scalar value.
    #[inline]
    fn log_scalar(&mut self, name: &'static str, value: f64) -> Result<(), LogError> {
        self.log(name, Loggable::Scalar(value))
    }

    /// Log an increment to a named counter.
    #[inline]
    fn log_counter_increment(
        &mut self,
        name: &'static str,
        increment: u64,
    ) -> Result<(), LogError> {
        self.log(name, Loggable::CounterIncrement(increment))
    }
}

/// Logger that does nothing
impl StatsLogger for () {
    #[inline]
    fn log(&mut self, _: &'static str, _: Loggable) -> Result<(), LogError> {
        Ok(())
    }

    #[inline]
    fn flush(&mut self) {}
}

impl<T: StatsLogger + ?Sized> StatsLogger for &'_ mut T {
    #[inline]
    fn log(&mut self, name: &'static str, value: Loggable) -> Result<(), LogError> {
        T::log(self, name, value)
    }

    #[inline]
    fn flush(&mut self) {
        T::flush(self)
    }
}

/// Error logging a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LogError {
    #[error("\"{name}\": incompatible value type {actual}, expected {expected}")]
    IncompatibleValue {
        name: &'static str,
        actual: &'static str,
        expected: &'static str,
    },
}
