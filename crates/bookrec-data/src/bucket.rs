//! Ordinal buckets for numeric attributes.
//!
//! Both functions are total: any integer lands in a bucket, with values
//! beyond either end clamped into the extreme bucket.

/// Number of age buckets.
pub const AGE_BUCKETS: usize = 6;

/// Number of publication-year buckets.
pub const YEAR_BUCKETS: usize = 4;

/// `<20, 20-29, 30-39, 40-49, 50-59, >=60` to `0..=5`.
pub fn age_bucket(age: i64) -> u32 {
    match age {
        i64::MIN..=19 => 0,
        20..=29 => 1,
        30..=39 => 2,
        40..=49 => 3,
        50..=59 => 4,
        _ => 5,
    }
}

/// `<1991, 1991-1995, 1996-1999, >=2000` to `0..=3`.
pub fn year_bucket(year: i64) -> u32 {
    match year {
        i64::MIN..=1990 => 0,
        1991..=1995 => 1,
        1996..=1999 => 2,
        _ => 3,
    }
}

/// Parses an integer cell, accepting float spellings such as `"34.0"`.
pub fn parse_integer(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    raw.parse::<i64>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| v.trunc() as i64))
}
