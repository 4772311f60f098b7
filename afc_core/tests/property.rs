use afc_core::actuator::{Limits, Stepper};
use afc_core::config::{DirectionCfg, PowerCfg};
use afc_core::cooldown::blend_toward_home;
use afc_core::direction::{DirectionEngine, MAX_VOTE_SUM};
use afc_core::history::{HISTORY_LEN, Sample, SampleHistory};
use afc_core::sampling::to_db;
use proptest::prelude::*;

prop_compose! {
    fn sample_strategy()(
        position in 0u16..30_000,
        reverse_db in 0u16..8_000,
        forward_db in 0u16..8_000,
    ) -> Sample {
        Sample { position, reverse_db, forward_db }
    }
}

proptest! {
    #[test]
    fn to_db_is_monotonic_and_bounded(a in any::<u16>(), b in any::<u16>()) {
        let cfg = PowerCfg::default();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(to_db(lo, &cfg) >= to_db(hi, &cfg));
        prop_assert!(to_db(lo, &cfg) <= to_db(cfg.min_reading, &cfg));
        prop_assert_eq!(to_db(a, &cfg), to_db(a, &cfg));
    }

    #[test]
    fn stepper_never_leaves_bounds_once_inside(
        min in 0u16..10_000,
        span in 1u16..20_000,
        target in any::<u16>(),
        ticks in 1usize..2_000,
    ) {
        let max = min + span;
        let limits = Limits { min, max, target };
        let mut s = Stepper::new(min + span / 2, 64);
        for _ in 0..ticks {
            let r = s.tick(limits);
            prop_assert!(r.position >= min && r.position <= max);
        }
    }

    #[test]
    fn stepper_moves_one_unit_per_tick(start in any::<u16>(), target in any::<u16>()) {
        let mut s = Stepper::new(start, 64);
        let r = s.tick(Limits { min: 0, max: u16::MAX, target });
        prop_assert!(r.position.abs_diff(start) <= 1);
        prop_assert_eq!(r.moved, start != target);
    }

    #[test]
    fn vote_sum_stays_in_range(samples in prop::collection::vec(sample_strategy(), 1..64)) {
        let mut engine = DirectionEngine::new(DirectionCfg::default());
        for s in samples {
            let d = engine.decide(s, s.position, 0);
            prop_assert!(d.vote_sum <= MAX_VOTE_SUM);
            prop_assert!(engine.no_decision_counter() <= engine.cfg().max_no_decision);
        }
    }

    #[test]
    fn history_keeps_the_last_sixteen(samples in prop::collection::vec(sample_strategy(), 1..80)) {
        let mut h = SampleHistory::new();
        for s in &samples {
            h.push(*s);
        }
        prop_assert_eq!(h.latest(), *samples.last().unwrap_or(&Sample::default()));
        let expected: Vec<Sample> = samples
            .iter()
            .rev()
            .skip(1)
            .take(HISTORY_LEN - 1)
            .copied()
            .collect();
        let got: Vec<Sample> = h.previous().take(expected.len()).collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn cooldown_blend_stays_between_home_and_hot(
        hot in any::<u16>(),
        home in any::<u16>(),
        t1 in 0u32..200_000,
        t2 in 0u32..200_000,
    ) {
        let (early, late) = if t1 <= t2 { (t1, t2) } else { (t2, t1) };
        let a = blend_toward_home(hot, home, early, 9);
        let b = blend_toward_home(hot, home, late, 9);
        let (lo, hi) = if hot <= home { (hot, home) } else { (home, hot) };
        prop_assert!(a >= lo && a <= hi);
        // later idle time never moves back toward hot
        prop_assert!(b.abs_diff(home) <= a.abs_diff(home));
    }
}

#[test]
fn cooldown_reaches_home_exactly_at_saturation() {
    for hot in [0u16, 1_000, 16_000, 28_000, u16::MAX] {
        assert_eq!(blend_toward_home(hot, 14_000, 120_000, 9), 14_000);
    }
}
