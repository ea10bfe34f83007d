//! The poll decision rule.
//!
//! `needed = ⌈threshold × eligible⌉`. An option that reaches `needed` passes
//! immediately. A majority-required poll is rejected as soon as no option can
//! still reach `needed`. Once every eligible member has voted, or the poll
//! closes, the end-of-poll rule applies.

use chama_store::PollRecord;
use chama_types::{PollKind, PollResult, Threshold};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Pending,
    Passed { winner: u32 },
    Rejected,
    /// The leading options are level and the poll does not allow a
    /// tie-break by ordinal.
    Tied,
}

impl Decision {
    pub fn result(&self) -> PollResult {
        match self {
            Self::Pending => PollResult::Undeclared,
            Self::Passed { .. } => PollResult::Passed,
            Self::Rejected => PollResult::Rejected,
            Self::Tied => PollResult::Tied,
        }
    }

    pub fn winner(&self) -> Option<u32> {
        match self {
            Self::Passed { winner } => Some(*winner),
            _ => None,
        }
    }

    pub fn is_declared(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TallyRule {
    pub eligible: u32,
    pub threshold: Threshold,
    pub requires_majority: bool,
    /// When set, a level top at close is `Tied` instead of going to the
    /// lowest ordinal.
    pub ties_undecided: bool,
}

impl TallyRule {
    pub fn for_poll(poll: &PollRecord) -> Self {
        Self {
            eligible: poll.eligible_voter_count,
            threshold: poll.threshold,
            requires_majority: poll.requires_majority,
            ties_undecided: poll.kind == PollKind::RoleEscalation,
        }
    }

    pub fn needed(&self) -> u32 {
        self.threshold.required_votes(self.eligible).max(1)
    }

    /// Decision after a vote has been counted.
    pub fn after_vote(&self, counts: &[u32]) -> Decision {
        let needed = self.needed();
        let cast: u32 = counts.iter().sum();
        let (winner, top) = leader(counts);
        if top >= needed {
            return Decision::Passed { winner };
        }
        if self.requires_majority && self.eligible.saturating_sub(cast) + top < needed {
            return Decision::Rejected;
        }
        if cast >= self.eligible {
            return self.at_close(counts);
        }
        Decision::Pending
    }

    /// End-of-poll decision. Never `Pending`.
    pub fn at_close(&self, counts: &[u32]) -> Decision {
        let cast: u32 = counts.iter().sum();
        if cast == 0 {
            return Decision::Rejected;
        }
        let (winner, top) = leader(counts);
        if top >= self.needed() {
            return Decision::Passed { winner };
        }
        let level = counts.iter().filter(|&&c| c == top).count() > 1;
        if level && self.ties_undecided {
            return Decision::Tied;
        }
        if self.requires_majority {
            return Decision::Rejected;
        }
        Decision::Passed { winner }
    }
}

/// Lowest ordinal holding the maximum count, and that count.
fn leader(counts: &[u32]) -> (u32, u32) {
    let mut best = (0u32, 0u32);
    for (ordinal, &count) in (0u32..).zip(counts) {
        if count > best.1 {
            best = (ordinal, count);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rule(eligible: u32, majority: bool) -> TallyRule {
        TallyRule {
            eligible,
            threshold: Threshold::HALF,
            requires_majority: majority,
            ties_undecided: false,
        }
    }

    #[test]
    fn passes_as_soon_as_threshold_is_met() {
        let r = rule(4, false);
        assert_eq!(r.after_vote(&[1, 0]), Decision::Pending);
        assert_eq!(r.after_vote(&[2, 0]), Decision::Passed { winner: 0 });
        assert_eq!(r.after_vote(&[0, 2]), Decision::Passed { winner: 1 });
    }

    #[test]
    fn majority_polls_reject_when_unreachable() {
        let r = TallyRule {
            threshold: Threshold::from_bps(7_500).unwrap(),
            ..rule(4, true)
        };
        // needed = 3; one vote each leaves 2 uncast, 2 + 1 = 3: still reachable.
        assert_eq!(r.after_vote(&[1, 1]), Decision::Pending);
        assert_eq!(r.after_vote(&[1, 1, 1]), Decision::Rejected);
    }

    #[test]
    fn plurality_wins_at_close_without_majority() {
        let r = TallyRule {
            threshold: Threshold::from_bps(9_000).unwrap(),
            ..rule(5, false)
        };
        assert_eq!(r.at_close(&[1, 2, 0]), Decision::Passed { winner: 1 });
        assert_eq!(r.at_close(&[2, 2, 0]), Decision::Passed { winner: 0 });
        assert_eq!(r.at_close(&[0, 0, 0]), Decision::Rejected);
    }

    #[test]
    fn escalation_ties_are_undecided() {
        let r = TallyRule {
            ties_undecided: true,
            threshold: Threshold::from_bps(7_500).unwrap(),
            ..rule(6, false)
        };
        assert_eq!(r.at_close(&[2, 2]), Decision::Tied);
        assert_eq!(r.at_close(&[3, 2]), Decision::Passed { winner: 0 });
    }

    #[test]
    fn full_turnout_applies_close_rule() {
        let r = TallyRule {
            threshold: Threshold::from_bps(7_500).unwrap(),
            ..rule(2, false)
        };
        assert_eq!(r.after_vote(&[1, 1]), Decision::Passed { winner: 0 });
        let majority = TallyRule {
            threshold: Threshold::from_bps(7_500).unwrap(),
            ..rule(2, true)
        };
        assert_eq!(majority.after_vote(&[1, 1]), Decision::Rejected);
    }

    proptest! {
        #[test]
        fn close_always_decides(counts in prop::collection::vec(0u32..20, 2..6), bps in 1u32..=10_000, majority in any::<bool>(), ties in any::<bool>()) {
            let eligible = counts.iter().sum::<u32>().max(1) + 3;
            let r = TallyRule {
                eligible,
                threshold: Threshold::from_bps(bps).unwrap(),
                requires_majority: majority,
                ties_undecided: ties,
            };
            let decision = r.at_close(&counts);
            prop_assert!(decision.is_declared());
            if let Decision::Passed { winner } = decision {
                let top = *counts.iter().max().unwrap();
                prop_assert_eq!(counts[winner as usize], top);
                prop_assert!(counts[..winner as usize].iter().all(|&c| c < top));
            }
        }

        #[test]
        fn a_passed_vote_stays_passed_at_close(counts in prop::collection::vec(0u32..20, 2..6), bps in 1u32..=10_000) {
            let eligible = counts.iter().sum::<u32>().max(1);
            let r = TallyRule {
                eligible,
                threshold: Threshold::from_bps(bps).unwrap(),
                requires_majority: true,
                ties_undecided: false,
            };
            if let Decision::Passed { winner } = r.after_vote(&counts) {
                prop_assert_eq!(r.at_close(&counts), Decision::Passed { winner });
            }
        }
    }
}
