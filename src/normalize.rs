/// Parses a self-reported metric such as `"$1,200"` or `"45%"` into a number.
///
/// Every character other than an ASCII digit or `.` is dropped before parsing,
/// which includes a leading minus sign. Returns `None` when nothing numeric is
/// left or the remainder is not a finite float (e.g. `"1.2.3"`).
pub fn normalize(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    cleaned.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Like [`normalize`], but zero also counts as "no data".
///
/// Ratio calculations divide by these values, so only strictly positive
/// quantities are let through.
pub fn normalize_positive(raw: &str) -> Option<f64> {
    normalize(raw).filter(|value| *value > 0.0)
}
