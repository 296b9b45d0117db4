/*================================================================================
=                            BANDING / PARTITIONING                              =
MinHash signatures are cut into `num_bands` contiguous bands of `band_size`
lanes. SimHash fingerprints are cut into `num_blocks` contiguous bit blocks.
Two items become candidates when they agree on a whole band / block.
================================================================================*/
use std::ops::Range;

use crate::simhash::SimHashBits;

/// Lane ranges of each band inside a signature of `num_bands * band_size` lanes.
pub fn band_ranges(num_bands: usize, band_size: usize) -> Vec<Range<usize>> {
    (0..num_bands)
        .map(|i| i * band_size..(i + 1) * band_size)
        .collect()
}

/// Probability that a pair with Jaccard similarity `s` shares at least one band.
pub fn candidate_probability(s: f64, num_bands: usize, band_size: usize) -> f64 {
    1.0 - (1.0 - s.powi(band_size as i32)).powi(num_bands as i32)
}

/// Similarity at which the S-curve is steepest, roughly (1/b)^(1/r).
pub fn s_curve_threshold(num_bands: usize, band_size: usize) -> f64 {
    (1.0 / num_bands as f64).powf(1.0 / band_size as f64)
}

/// Picks `(num_bands, band_size)` with `num_bands * band_size <= num_hashes`
/// whose S-curve threshold lands closest to `threshold`. Ties prefer more lanes.
pub fn optimal_bands(num_hashes: usize, threshold: f64) -> (usize, usize) {
    let mut best = (1, num_hashes.max(1));
    let mut best_error = f64::MAX;

    for band_size in 1..=num_hashes {
        let num_bands = num_hashes / band_size;
        if num_bands == 0 {
            break;
        }
        let error = (s_curve_threshold(num_bands, band_size) - threshold).abs();
        let better = error < best_error
            || (error == best_error && num_bands * band_size > best.0 * best.1);
        if better {
            best_error = error;
            best = (num_bands, band_size);
        }
    }
    best
}

/// Contiguous bit blocks of a fingerprint, represented as masks.
///
/// When the width is not a multiple of `num_blocks` the leading blocks are one
/// bit wider than the trailing ones.
#[derive(Debug, Clone)]
pub struct BlockPartition<S: SimHashBits> {
    masks: Vec<S>,
}

impl<S: SimHashBits> BlockPartition<S> {
    pub fn new(num_blocks: usize) -> Self {
        let base = S::BITS / num_blocks;
        let extra = S::BITS % num_blocks;
        let mut masks = Vec::with_capacity(num_blocks);
        let mut start = 0;
        for block in 0..num_blocks {
            let width = base + usize::from(block < extra);
            masks.push(Self::mask(start, width));
            start += width;
        }
        Self { masks }
    }

    fn mask(start: usize, width: usize) -> S {
        (start..start + width).fold(S::ZERO, |acc, bit| acc | (S::ONE << bit))
    }

    pub fn num_blocks(&self) -> usize {
        self.masks.len()
    }

    /// Key of `fingerprint` at block position `block`.
    #[inline]
    pub fn block_key(&self, fingerprint: S, block: usize) -> S {
        fingerprint & self.masks[block]
    }

    pub fn masks(&self) -> &[S] {
        &self.masks
    }
}
