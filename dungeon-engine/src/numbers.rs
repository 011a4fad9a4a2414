//! Numeric conversion helpers centralizing float-to-integer casts.

use num_traits::cast::cast;

/// Floor a f64 and clamp it to the u64 range, returning 0 for NaN or negative values.
#[must_use]
pub fn floor_f64_to_u64(value: f64) -> u64 {
    if value.is_nan() || value <= 0.0 {
        return 0;
    }
    let max = cast::<u64, f64>(u64::MAX).unwrap_or(f64::MAX);
    let clamped = value.min(max).floor();
    cast::<f64, u64>(clamped).unwrap_or(u64::MAX)
}

/// Floor a f64 and clamp it to the u32 range, returning 0 for NaN or negative values.
#[must_use]
pub fn floor_f64_to_u32(value: f64) -> u32 {
    u32::try_from(floor_f64_to_u64(value)).unwrap_or(u32::MAX)
}

/// Convert u64 to f64 while allowing precision loss in a single location.
#[must_use]
pub fn u64_to_f64(value: u64) -> f64 {
    cast::<u64, f64>(value).unwrap_or(0.0)
}

/// Map a unit draw in `[0, 1)` onto an index below `len`.
///
/// Returns `None` for an empty collection. The result never reaches `len`,
/// even if the draw rounds up to `1.0`.
#[must_use]
pub fn unit_to_index(unit: f64, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let scaled = floor_f64_to_u64(unit * u64_to_f64(len as u64));
    let idx = usize::try_from(scaled).unwrap_or(usize::MAX);
    Some(idx.min(len - 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_handles_non_finite_and_negative() {
        assert_eq!(floor_f64_to_u64(f64::NAN), 0);
        assert_eq!(floor_f64_to_u64(-3.5), 0);
        assert_eq!(floor_f64_to_u64(f64::INFINITY), u64::MAX);
        assert_eq!(floor_f64_to_u64(149.999), 149);
    }

    #[test]
    fn floor_u32_saturates() {
        assert_eq!(floor_f64_to_u32(7.9), 7);
        assert_eq!(floor_f64_to_u32(1.0e12), u32::MAX);
    }

    #[test]
    fn unit_index_stays_in_bounds() {
        assert_eq!(unit_to_index(0.5, 0), None);
        assert_eq!(unit_to_index(0.0, 3), Some(0));
        assert_eq!(unit_to_index(0.5, 3), Some(1));
        assert_eq!(unit_to_index(0.999_999, 3), Some(2));
        assert_eq!(unit_to_index(1.0, 3), Some(2));
    }
}
