//! Basic numerical concepts used throughout the program

// Floating-point precision is configured here
/// Floating-point type used for times, rates and statistics
#[cfg(feature = "f32")]
pub type Float = f32;
/// Floating-point type used for times, rates and statistics
#[cfg(not(feature = "f32"))]
pub type Float = f64;

/// Convert an integer count to the configured floating-point type
pub fn count_to_float(count: impl Into<u64>) -> Float {
    let count: u64 = count.into();
    count as Float
}
