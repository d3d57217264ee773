use serde::{Deserialize, Serialize};

/// Affine map between two closed ranges.
///
/// Used in both directions: output channels map an engineering range onto the
/// wire range, input channels map the wire range back onto engineering units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearMapping {
    from_min: f64,
    from_max: f64,
    to_min: f64,
    to_max: f64,
}

impl LinearMapping {
    /// Build a mapping. `from_max` must be strictly greater than `from_min`.
    pub fn new(from_min: f64, from_max: f64, to_min: f64, to_max: f64) -> Self {
        debug_assert!(
            from_max > from_min,
            "Mapping source range [{}, {}] is empty",
            from_min, from_max
        );

        Self {
            from_min,
            from_max,
            to_min,
            to_max,
        }
    }

    pub fn map(&self, from: f64) -> f64 {
        (from - self.from_min) / (self.from_max - self.from_min) * (self.to_max - self.to_min)
            + self.to_min
    }

    pub fn in_range(&self, from: f64) -> bool {
        from >= self.from_min && from <= self.from_max
    }

    /// The same map with source and target swapped.
    pub fn inverse(&self) -> Self {
        Self::new(self.to_min, self.to_max, self.from_min, self.from_max)
    }

    pub fn source_range(&self) -> (f64, f64) {
        (self.from_min, self.from_max)
    }

    pub fn target_range(&self) -> (f64, f64) {
        (self.to_min, self.to_max)
    }
}
