use proptest::prelude::*;
use rover_core::filter::{DistanceFilter, FAR_MM, HISTORY};

fn filled(samples: &[u16]) -> DistanceFilter {
    let mut f = DistanceFilter::new();
    for &s in samples {
        f.accumulate(s);
    }
    f
}

proptest! {
    #[test]
    fn best_guess_is_a_retained_nonzero_sample(samples in prop::collection::vec(0u16..3000, 0..10)) {
        let f = filled(&samples);
        let kept: Vec<u16> = samples.iter().rev().take(HISTORY).copied().collect();
        let guess = f.best_guess();
        if kept.iter().all(|&s| s == 0) {
            prop_assert_eq!(guess, 0);
        } else {
            prop_assert!(kept.contains(&guess));
            let below = kept.iter().filter(|&&s| s > 0 && s < guess).count();
            let above = kept.iter().filter(|&&s| s > guess).count();
            prop_assert!(below <= above + 1 && above <= below + 1);
        }
    }

    #[test]
    fn newest_nonzero_sample_decides_far(
        history in prop::collection::vec(0u16..3000, 0..3),
        last in 1u16..3000,
        zeros in 0usize..3,
    ) {
        let mut f = filled(&history);
        f.accumulate(last);
        for _ in 0..zeros.min(HISTORY - 1) {
            f.accumulate(0);
        }
        prop_assert_eq!(f.is_far(), last > FAR_MM);
    }
}
