//! Short-history median filter for one distance channel.
//!
//! Sensors report 0 when they see nothing, so zeros are kept in the history
//! (they count towards "far") but never take part in the median.

use std::collections::VecDeque;

/// Samples retained per channel.
pub const HISTORY: usize = 3;
/// Anything beyond this is treated as open space.
pub const FAR_MM: u16 = 400;

#[derive(Debug, Clone, Default)]
pub struct DistanceFilter {
    samples: VecDeque<u16>,
}

impl DistanceFilter {
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(HISTORY),
        }
    }

    /// Push a sample, dropping the oldest once the history is full.
    pub fn accumulate(&mut self, sample_mm: u16) {
        if self.samples.len() == HISTORY {
            self.samples.pop_front();
        }
        self.samples.push_back(sample_mm);
    }

    /// Median of the non-zero samples, or 0 when there are none. With an even
    /// count the upper of the two middle values wins.
    pub fn best_guess(&self) -> u16 {
        let mut nonzero: Vec<u16> = self.samples.iter().copied().filter(|&s| s > 0).collect();
        if nonzero.is_empty() {
            return 0;
        }
        nonzero.sort_unstable();
        nonzero[nonzero.len() / 2]
    }

    /// Newest decisive sample wins: above [`FAR_MM`] means far, any other
    /// non-zero sample means near. No decisive sample at all also means far.
    pub fn is_far(&self) -> bool {
        for &s in self.samples.iter().rev() {
            if s > FAR_MM {
                return true;
            }
            if s > 0 {
                return false;
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Oldest first.
    pub fn samples(&self) -> impl Iterator<Item = u16> + '_ {
        self.samples.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn filled(samples: &[u16]) -> DistanceFilter {
        let mut f = DistanceFilter::new();
        for &s in samples {
            f.accumulate(s);
        }
        f
    }

    #[rstest]
    #[case(&[], 0)]
    #[case(&[0, 0, 0], 0)]
    #[case(&[120], 120)]
    #[case(&[100, 0, 300], 300)]
    #[case(&[300, 100, 200], 200)]
    #[case(&[5, 900, 7, 800], 800)]
    fn best_guess_is_median_of_nonzero(#[case] samples: &[u16], #[case] want: u16) {
        assert_eq!(filled(samples).best_guess(), want);
    }

    #[rstest]
    #[case(&[], true)]
    #[case(&[0, 0], true)]
    #[case(&[500, 50], false)]
    #[case(&[50, 500], true)]
    #[case(&[50, 401, 0], true)]
    #[case(&[900, 400, 0], false)]
    fn far_follows_newest_decisive_sample(#[case] samples: &[u16], #[case] want: bool) {
        assert_eq!(filled(samples).is_far(), want);
    }

    #[test]
    fn history_is_bounded() {
        let f = filled(&[1, 2, 3, 4, 5]);
        assert_eq!(f.len(), HISTORY);
        assert_eq!(f.samples().collect::<Vec<_>>(), vec![3, 4, 5]);
    }
}
