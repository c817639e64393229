//! Override-or-fallback resolution for scalar and list fields.
//!
//! A value wins unless it is empty or zero, in which case the fallback is
//! used. All functions are pure.

/// Returns `value` unless it equals the type's default (zero, empty string).
pub fn resolve<T: Default + PartialEq>(value: T, fallback: T) -> T {
    if value == T::default() { fallback } else { value }
}

/// Borrowing variant of [`resolve`] for string slices.
pub fn resolve_str<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() { fallback } else { value }
}

/// Returns `value` unless it has no elements.
pub fn resolve_slice<'a, T>(value: &'a [T], fallback: &'a [T]) -> &'a [T] {
    if value.is_empty() { fallback } else { value }
}
