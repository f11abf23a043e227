//! Picks the decorative style of a page header. Each style is a CSS class
//! defined by the blog's stylesheet.

use rand::seq::SliceRandom;
use rand::Rng;

/// The header styles, in no particular order.
pub const VARIANTS: [&str; 7] = [
    "header-circles",
    "header-dots",
    "header-grid",
    "header-stripes",
    "header-triangles",
    "header-waves",
    "header-zigzag",
];

/// Returns one of [`VARIANTS`], uniformly at random. Consecutive calls may
/// repeat a style.
pub fn random_variant<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    VARIANTS.choose(rng).copied().unwrap_or(VARIANTS[0])
}
