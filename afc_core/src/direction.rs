//! Hill-climbing direction decision.
//!
//! Each new sample is compared against the previous 15 in the history. Every
//! comparison casts a vote (Up = 0, NoData = 1, Down = 2); the sum is measured
//! against the all-neutral value `COMPARISONS`, so a sum below it moves up and
//! a sum above it moves down. Ties repeat the previous direction a bounded
//! number of times and then force an inversion.

use crate::config::DirectionCfg;
use crate::history::{COMPARISONS, Sample, SampleHistory};

/// Vote sum when every comparison is neutral.
pub const TIE_SUM: u16 = COMPARISONS as u16;

/// Largest possible vote sum.
pub const MAX_VOTE_SUM: u16 = 2 * TIE_SUM;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    #[inline]
    pub fn inverted(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }
}

/// Result of one pairwise comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Vote {
    Up = 0,
    NoData = 1,
    Down = 2,
}

impl Vote {
    #[inline]
    pub fn weight(self) -> u16 {
        self as u16
    }
}

/// Step size regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuneSpeed {
    Fast,
    Slow,
}

/// Compare the new sample against one historical entry.
///
/// `min_rev_change` is the reverse-power noise threshold in effect.
pub fn compare(
    current: &Sample,
    previous: &Sample,
    min_position_change: u16,
    min_rev_change: u16,
) -> Vote {
    if previous.position == 0 || previous.reverse_db == 0 {
        return Vote::NoData;
    }
    if current.position.abs_diff(previous.position) < min_position_change {
        return Vote::NoData;
    }
    if current.reverse_db.abs_diff(previous.reverse_db) < min_rev_change {
        return Vote::NoData;
    }
    let moved_up = current.position > previous.position;
    let power_fell = current.reverse_db < previous.reverse_db;
    if moved_up == power_fell {
        Vote::Up
    } else {
        Vote::Down
    }
}

/// Outcome of processing one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub previous: Direction,
    pub direction: Direction,
    pub vote_sum: u16,
    /// True when a tie exhausted the no-decision allowance.
    pub forced_inversion: bool,
    pub speed: TuneSpeed,
    pub delta: u16,
    /// `current_position` moved by `delta` in `direction`, saturating.
    pub target: u16,
}

/// Direction-decision state: sample history, tie hysteresis, inversion count
/// and the fast-mode latch.
#[derive(Debug, Clone)]
pub struct DirectionEngine {
    cfg: DirectionCfg,
    history: SampleHistory,
    no_decision_counter: u8,
    inversion_counter: u32,
    fast_done: bool,
}

impl DirectionEngine {
    pub fn new(mut cfg: DirectionCfg) -> Self {
        cfg.rev_power_bands
            .sort_by(|a, b| b.from_position.cmp(&a.from_position));
        Self {
            cfg,
            history: SampleHistory::new(),
            no_decision_counter: 0,
            inversion_counter: 0,
            fast_done: false,
        }
    }

    pub fn cfg(&self) -> &DirectionCfg {
        &self.cfg
    }

    pub fn history(&self) -> &SampleHistory {
        &self.history
    }

    pub fn no_decision_counter(&self) -> u8 {
        self.no_decision_counter
    }

    pub fn inversion_counter(&self) -> u32 {
        self.inversion_counter
    }

    /// True once fine tuning has taken over.
    pub fn fast_done(&self) -> bool {
        self.fast_done
    }

    pub fn speed(&self) -> TuneSpeed {
        if self.fast_done {
            TuneSpeed::Slow
        } else {
            TuneSpeed::Fast
        }
    }

    /// Start a new run: fast mode again, inversions forgotten.
    ///
    /// History and the tie counter persist across runs.
    pub fn reset_run(&mut self) {
        self.fast_done = false;
        self.inversion_counter = 0;
    }

    /// Sum the votes of `sample` against the history without mutating it.
    fn vote(&self, sample: &Sample) -> u16 {
        let min_rev = self.cfg.min_rev_power_change(sample.position);
        self.history
            .previous()
            .map(|prev| compare(sample, &prev, self.cfg.min_position_change, min_rev).weight())
            .sum()
    }

    /// Process one completed sample.
    ///
    /// `current_position` is the actuator position now (not at the trigger);
    /// `pulses_on_this_run` counts pulses since the last cooldown.
    pub fn decide(
        &mut self,
        sample: Sample,
        current_position: u16,
        pulses_on_this_run: u32,
    ) -> Decision {
        let previous = if sample.position > self.history.latest().position {
            Direction::Up
        } else {
            Direction::Down
        };

        self.history.push(sample);
        let vote_sum = self.vote(&sample);
        debug_assert!(vote_sum <= MAX_VOTE_SUM);

        let mut forced_inversion = false;
        let direction = if vote_sum > TIE_SUM {
            self.no_decision_counter = 0;
            Direction::Down
        } else if vote_sum < TIE_SUM {
            self.no_decision_counter = 0;
            Direction::Up
        } else if self.no_decision_counter < self.cfg.max_no_decision {
            self.no_decision_counter += 1;
            previous
        } else {
            self.no_decision_counter = 0;
            forced_inversion = true;
            previous.inverted()
        };

        if direction != previous {
            self.inversion_counter = self.inversion_counter.saturating_add(1);
        }

        if !self.fast_done
            && (pulses_on_this_run >= self.cfg.max_fast_pulses
                || (pulses_on_this_run >= self.cfg.min_fast_pulses
                    && self.inversion_counter >= self.cfg.inversions_to_slow))
        {
            self.fast_done = true;
            tracing::debug!(
                pulses_on_this_run,
                inversions = self.inversion_counter,
                "fast tuning done"
            );
        }

        let speed = self.speed();
        let delta = match speed {
            TuneSpeed::Fast => self.cfg.fast_move_delta,
            TuneSpeed::Slow => self.cfg.slow_move_delta,
        };
        let target = match direction {
            Direction::Up => current_position.saturating_add(delta),
            Direction::Down => current_position.saturating_sub(delta),
        };

        tracing::trace!(
            position = sample.position,
            reverse_db = sample.reverse_db,
            vote_sum,
            ?direction,
            forced_inversion,
            target,
            "direction decision"
        );

        Decision {
            previous,
            direction,
            vote_sum,
            forced_inversion,
            speed,
            delta,
            target,
        }
    }
}
