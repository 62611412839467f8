//! Numeric conversion helpers centralizing safe numeric casts.

use num_traits::cast::cast;

const QI_SUFFIXES: [&str; 14] = [
    "k", "M", "B", "T", "Qa", "Qi", "Sx", "Sp", "Oc", "No", "Dc", "Ud", "Dd", "Td",
];

/// Floor a f64 and clamp it to the u64 range, returning 0 for NaN or negative values.
#[must_use]
pub fn floor_f64_to_u64(value: f64) -> u64 {
    if value.is_nan() || value <= 0.0 {
        return 0;
    }
    if value.is_infinite() {
        return u64::MAX;
    }
    cast::<f64, u64>(value.floor()).unwrap_or(u64::MAX)
}

/// Convert u64 to f64 while allowing precision loss in a single location.
#[must_use]
pub fn u64_to_f64(value: u64) -> f64 {
    cast::<u64, f64>(value).unwrap_or(f64::MAX)
}

/// Convert u32 to i32 for exponent use, saturating at `i32::MAX`.
#[must_use]
pub fn u32_to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Round to two decimal places.
#[must_use]
pub fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Interpret a JSON number as a whole, non-negative count.
#[must_use]
pub fn whole_count(value: f64) -> Option<u64> {
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 {
        return None;
    }
    cast::<f64, u64>(value)
}

/// Render a qi amount with short-scale suffixes (`1.5k`, `2.3M`, ...).
#[must_use]
pub fn format_qi(value: f64) -> String {
    if !value.is_finite() {
        return "Infinite".to_string();
    }
    if value < 1_000.0 {
        return floor_f64_to_u64(value).to_string();
    }
    let magnitude = cast::<f64, usize>(value.log10().floor()).unwrap_or(usize::MAX);
    let mut suffix_index = magnitude / 3;
    if suffix_index > QI_SUFFIXES.len() {
        return "Infinite".to_string();
    }
    let exponent = i32::try_from(suffix_index * 3).unwrap_or(i32::MAX);
    let mut short = significant(value / 10f64.powi(exponent), 3);
    // Rounding can carry into the next suffix (999_999 -> 1000k -> 1M).
    if short >= 1_000.0 {
        suffix_index += 1;
        short /= 1_000.0;
        if suffix_index > QI_SUFFIXES.len() {
            return "Infinite".to_string();
        }
    }
    if short.fract() != 0.0 {
        short = (short * 10.0).round() / 10.0;
    }
    format!("{short}{}", QI_SUFFIXES[suffix_index - 1])
}

fn significant(value: f64, digits: i32) -> f64 {
    if value == 0.0 {
        return 0.0;
    }
    let magnitude = cast::<f64, i32>(value.abs().log10().floor()).unwrap_or(0);
    let factor = 10f64.powi(digits - 1 - magnitude);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_handles_edges() {
        assert_eq!(floor_f64_to_u64(f64::NAN), 0);
        assert_eq!(floor_f64_to_u64(-3.5), 0);
        assert_eq!(floor_f64_to_u64(30.17), 30);
        assert_eq!(floor_f64_to_u64(f64::INFINITY), u64::MAX);
    }

    #[test]
    fn whole_count_rejects_fractions_and_negatives() {
        assert_eq!(whole_count(3.0), Some(3));
        assert_eq!(whole_count(3.5), None);
        assert_eq!(whole_count(-1.0), None);
        assert_eq!(whole_count(f64::NAN), None);
    }

    #[test]
    fn format_qi_uses_suffixes() {
        assert_eq!(format_qi(999.9), "999");
        assert_eq!(format_qi(1_500.0), "1.5k");
        assert_eq!(format_qi(100_000.0), "100k");
        assert_eq!(format_qi(2_340_000.0), "2.3M");
        assert_eq!(format_qi(999_999.0), "1M");
        assert_eq!(format_qi(999_500.0), "1M");
        assert_eq!(format_qi(999_400.0), "999k");
        assert_eq!(format_qi(1e60), "Infinite");
    }

    #[test]
    fn cents_rounding() {
        assert!((round_to_cents(2.856) - 2.86).abs() < f64::EPSILON);
    }
}
