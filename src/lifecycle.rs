//! Kernel lifecycle bookkeeping.
//!
//! Kernels move through four stages as they age and accumulate fitness.
//! Transitions are forward-only and advance at most one stage per call,
//! even when a later stage's thresholds are already met.

use serde::{Deserialize, Serialize};

/// Developmental stage of a kernel. `Senescent` is terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Stage {
    Embryonic,
    Juvenile,
    Mature,
    Senescent,
}

/// Exit transition for `stage` given the kernel's current age and fitness.
///
/// Only the transition leaving the current stage is considered; each call
/// moves at most one step along
/// `Embryonic -> Juvenile -> Mature -> Senescent`.
fn transition(stage: Stage, age: u32, fitness: f64) -> Stage {
    match stage {
        Stage::Embryonic if age > 5 && fitness > 0.3 => Stage::Juvenile,
        Stage::Juvenile if age > 15 && fitness > 0.6 => Stage::Mature,
        Stage::Mature if age > 50 || fitness < 0.4 => Stage::Senescent,
        other => other,
    }
}

/// Age, maturity and stage state of a kernel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lifecycle {
    pub stage: Stage,
    /// `min(1, age / 30)`, recomputed on every advance.
    pub maturity: f64,
    pub age: u32,
    pub generation: u32,
}

impl Lifecycle {
    /// Fresh embryonic state at the given generation.
    pub fn embryonic(generation: u32) -> Self {
        Self {
            stage: Stage::Embryonic,
            maturity: 0.0,
            age: 0,
            generation,
        }
    }

    /// Recomputes maturity and applies the single-step stage transition.
    pub fn advance(&mut self, fitness: f64) {
        self.maturity = (self.age as f64 / 30.0).min(1.0);
        self.stage = transition(self.stage, self.age, fitness);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_stage_is_skipped() {
        let mut lc = Lifecycle::embryonic(0);
        lc.age = 60;
        lc.advance(0.95);
        assert_eq!(lc.stage, Stage::Juvenile);
        lc.advance(0.95);
        assert_eq!(lc.stage, Stage::Mature);
        lc.advance(0.95);
        assert_eq!(lc.stage, Stage::Senescent);
    }

    #[test]
    fn thresholds_are_strict() {
        let mut lc = Lifecycle::embryonic(0);
        lc.age = 5;
        lc.advance(0.95);
        assert_eq!(lc.stage, Stage::Embryonic, "age 5 is not > 5");
        lc.age = 6;
        lc.advance(0.3);
        assert_eq!(lc.stage, Stage::Embryonic, "fitness 0.3 is not > 0.3");
        lc.advance(0.301);
        assert_eq!(lc.stage, Stage::Juvenile);
    }

    #[test]
    fn mature_kernels_senesce_on_low_fitness() {
        let mut lc = Lifecycle {
            stage: Stage::Mature,
            maturity: 1.0,
            age: 20,
            generation: 3,
        };
        lc.advance(0.39);
        assert_eq!(lc.stage, Stage::Senescent);
    }

    #[test]
    fn senescent_is_terminal() {
        let mut lc = Lifecycle {
            stage: Stage::Senescent,
            maturity: 1.0,
            age: 80,
            generation: 9,
        };
        lc.advance(0.99);
        assert_eq!(lc.stage, Stage::Senescent);
    }

    #[test]
    fn maturity_saturates_at_one() {
        let mut lc = Lifecycle::embryonic(0);
        lc.age = 15;
        lc.advance(0.0);
        assert!((lc.maturity - 0.5).abs() < 1e-12);
        lc.age = 90;
        lc.advance(0.0);
        assert_eq!(lc.maturity, 1.0);
    }
}
