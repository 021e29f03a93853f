//! Fixed-width skin influences
//!
//! Target formats carry at most four (joint, weight) pairs per vertex.
//! Influences are offered in bone-then-vertex order; once the four slots are
//! full an incoming weight only evicts the current smallest slot, and only
//! if it is larger.

/// Influences per vertex in the exported formats
pub const MAX_INFLUENCES: usize = 4;

/// Four-slot influence accumulator for one vertex
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SkinSlots {
    joints: [u16; MAX_INFLUENCES],
    weights: [f32; MAX_INFLUENCES],
    len: usize,
    offered: usize,
}

impl SkinSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer one influence
    pub fn offer(&mut self, joint: u16, weight: f32) {
        self.offered += 1;
        if self.len < MAX_INFLUENCES {
            self.joints[self.len] = joint;
            self.weights[self.len] = weight;
            self.len += 1;
            return;
        }

        // First smallest slot wins ties, keeping the result order-stable
        let mut smallest = 0;
        for slot in 1..MAX_INFLUENCES {
            if self.weights[slot] < self.weights[smallest] {
                smallest = slot;
            }
        }
        if weight > self.weights[smallest] {
            self.joints[smallest] = joint;
            self.weights[smallest] = weight;
        }
    }

    /// More influences were offered than fit
    pub fn overflowed(&self) -> bool {
        self.offered > MAX_INFLUENCES
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Final joints and weights; weights are renormalised to sum to 1 when
    /// influences had to be dropped
    pub fn finish(&self) -> ([u16; MAX_INFLUENCES], [f32; MAX_INFLUENCES]) {
        let mut weights = self.weights;
        if self.overflowed() {
            let sum: f32 = weights.iter().sum();
            if sum > 0.0 {
                for w in &mut weights {
                    *w /= sum;
                }
            }
        }
        (self.joints, weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_six_weights_keep_largest_four() {
        let mut slots = SkinSlots::new();
        for (joint, w) in [0.4, 0.3, 0.1, 0.1, 0.05, 0.05].into_iter().enumerate() {
            slots.offer(joint as u16, w);
        }
        assert!(slots.overflowed());

        let (joints, weights) = slots.finish();
        assert_eq!(joints, [0, 1, 2, 3]);
        let expected = [0.444, 0.333, 0.111, 0.111];
        for (w, e) in weights.iter().zip(expected) {
            assert!((w - e).abs() < 1e-3, "{weights:?}");
        }
    }

    #[test]
    fn test_larger_weight_evicts_smallest() {
        let mut slots = SkinSlots::new();
        for (joint, w) in [(0, 0.1), (1, 0.2), (2, 0.3), (3, 0.05), (4, 0.35)] {
            slots.offer(joint, w);
        }
        let (joints, weights) = slots.finish();
        assert_eq!(joints, [0, 1, 2, 4]);
        let sum: f32 = weights.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_under_four_untouched() {
        let mut slots = SkinSlots::new();
        slots.offer(7, 0.25);
        slots.offer(2, 0.25);
        let (joints, weights) = slots.finish();
        assert_eq!(joints, [7, 2, 0, 0]);
        assert_eq!(weights, [0.25, 0.25, 0.0, 0.0]);
        assert!(!slots.overflowed());
    }
}
