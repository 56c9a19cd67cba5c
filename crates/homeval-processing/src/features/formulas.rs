//! Scalar formulas shared by the feature engineer.

/// Numeric score of a quality label (`Ex`=5 … `Po`=1).
pub fn quality_score(label: Option<&str>) -> Option<f64> {
    match label? {
        "Ex" => Some(5.0),
        "Gd" => Some(4.0),
        "TA" => Some(3.0),
        "Fa" => Some(2.0),
        "Po" => Some(1.0),
        _ => None,
    }
}

/// Bucket of a house age. Intervals are closed on the right.
pub fn age_category(house_age: f64) -> &'static str {
    match house_age {
        a if a > 0.0 && a <= 5.0 => "Very New",
        a if a > 5.0 && a <= 10.0 => "New",
        a if a > 10.0 && a <= 20.0 => "Moderate",
        a if a > 20.0 && a <= 40.0 => "Old",
        a if a > 40.0 && a <= 100.0 => "Very Old",
        _ => "Unknown",
    }
}

/// Season of the month a house was sold in.
pub fn sale_season(month: f64) -> &'static str {
    if month.fract() != 0.0 {
        return "Unknown";
    }
    match month as i64 {
        12 | 1 | 2 => "Winter",
        3..=5 => "Spring",
        6..=8 => "Summer",
        9..=11 => "Fall",
        _ => "Unknown",
    }
}

/// `ln(1 + x)` for positive `x`, else 0.
#[inline]
pub fn log_area(value: f64) -> f64 {
    if value > 0.0 { value.ln_1p() } else { 0.0 }
}

/// 1 when the condition holds, else 0.
#[inline]
pub fn flag(condition: bool) -> i32 {
    i32::from(condition)
}

/// Replace non-finite results with 0.
#[inline]
pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}
