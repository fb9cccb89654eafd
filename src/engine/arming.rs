//! Per-(batch, trigger) arming state
//!
//! ```text
//!            Triggered                  delivered
//!   Quiet ─────────────► Firing ────────────────────► Alerted
//!     ▲                   │  ▲ Triggered / Holding       │
//!     │       Clear       │  └── (retry candidate)       │
//!     └───────────────────┘                              │
//!     ▲                       Clear                      │
//!     └──────────────────────────────────────────────────┘
//!     ▲
//!     └── reset() (batch status changed)
//! ```
//!
//! - **Quiet:** armed. The [`Episode`] says which stored alerts still count
//!   against the next candidate.
//! - **Firing:** condition true, delivery not yet confirmed. Every
//!   subsequent true evaluation yields a retry candidate.
//! - **Alerted:** delivered. Stays suppressed until the condition clears.
//!
//! `NotEnoughData` never moves the state in either direction.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::analysis::Evaluation;
use crate::types::{TriggerKind, TriggerResult};

/// Where the current episode of a trigger started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Episode {
    /// Not known (fresh process): stored alerts within the cooldown count
    Unknown,
    /// Condition last seen false at this reading timestamp
    Since(DateTime<Utc>),
    /// Opened by a batch status change: no earlier alert counts
    Fresh,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArmState {
    Quiet {
        episode: Episode,
    },
    Firing {
        /// Evidence of the triggering evaluation, reused while `Holding`
        evidence: TriggerResult,
        episode: Episode,
    },
    Alerted {
        at: DateTime<Utc>,
    },
}

impl Default for ArmState {
    fn default() -> Self {
        ArmState::Quiet {
            episode: Episode::Unknown,
        }
    }
}

/// An alert the arming table lets through; still subject to the history check.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub kind: TriggerKind,
    pub evidence: TriggerResult,
    pub episode: Episode,
}

/// Arming state for every trigger kind of one batch.
#[derive(Debug, Default)]
pub struct ArmTable {
    states: HashMap<TriggerKind, ArmState>,
}

impl ArmTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, kind: TriggerKind) -> ArmState {
        self.states.get(&kind).cloned().unwrap_or_default()
    }

    /// Feed one evaluation; returns a candidate when an alert should be attempted.
    pub fn observe(
        &mut self,
        kind: TriggerKind,
        evaluation: &Evaluation,
        now: DateTime<Utc>,
    ) -> Option<Candidate> {
        let state = self.states.entry(kind).or_default();
        match (&*state, evaluation) {
            (_, Evaluation::NotEnoughData) => None,

            (_, Evaluation::Clear) => {
                *state = ArmState::Quiet {
                    episode: Episode::Since(now),
                };
                None
            }

            (ArmState::Alerted { .. }, Evaluation::Triggered(_) | Evaluation::Holding) => None,

            (ArmState::Quiet { episode }, Evaluation::Triggered(evidence))
            | (ArmState::Firing { episode, .. }, Evaluation::Triggered(evidence)) => {
                let episode = *episode;
                *state = ArmState::Firing {
                    evidence: evidence.clone(),
                    episode,
                };
                Some(Candidate {
                    kind,
                    evidence: evidence.clone(),
                    episode,
                })
            }

            (ArmState::Firing { evidence, episode }, Evaluation::Holding) => Some(Candidate {
                kind,
                evidence: evidence.clone(),
                episode: *episode,
            }),

            // An edge crossed while we were not watching; wait for the next one
            (ArmState::Quiet { .. }, Evaluation::Holding) => None,
        }
    }

    /// Delivery confirmed (or found in history): suppress until the condition clears.
    pub fn confirm(&mut self, kind: TriggerKind, at: DateTime<Utc>) {
        self.states.insert(kind, ArmState::Alerted { at });
    }

    /// Re-arm every trigger after a batch status change.
    ///
    /// Not tied to a timestamp: device clocks may run ahead of ours, so only
    /// the arming state itself marks the new episode.
    pub fn reset(&mut self) {
        for kind in TriggerKind::ALL {
            self.states.insert(
                kind,
                ArmState::Quiet {
                    episode: Episode::Fresh,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(h: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap() + Duration::hours(h)
    }

    fn stable() -> Evaluation {
        Evaluation::Triggered(TriggerResult::GravityStable {
            range_points: 0.2,
            threshold_points: 0.5,
            window_hours: 12.0,
            span_hours: 12.0,
        })
    }

    const KIND: TriggerKind = TriggerKind::GravityStable;

    #[test]
    fn alerts_once_per_episode() {
        let mut arms = ArmTable::new();
        assert!(arms.observe(KIND, &stable(), t(0)).is_some());
        arms.confirm(KIND, t(0));
        assert!(arms.observe(KIND, &stable(), t(1)).is_none());
        assert!(arms.observe(KIND, &stable(), t(2)).is_none());

        assert!(arms.observe(KIND, &Evaluation::Clear, t(3)).is_none());
        let again = arms.observe(KIND, &stable(), t(4)).unwrap();
        assert_eq!(again.episode, Episode::Since(t(3)));
    }

    #[test]
    fn undelivered_alert_is_retried() {
        let mut arms = ArmTable::new();
        let first = arms.observe(KIND, &stable(), t(0)).unwrap();
        assert_eq!(first.episode, Episode::Unknown);
        // no confirm: delivery failed
        assert!(arms.observe(KIND, &stable(), t(1)).is_some());
    }

    #[test]
    fn holding_retries_only_while_firing() {
        let kind = TriggerKind::AttenuationReached;
        let crossed = Evaluation::Triggered(TriggerResult::AttenuationReached {
            attenuation: 0.81,
            previous_attenuation: 0.79,
            threshold: 0.8,
        });

        let mut arms = ArmTable::new();
        assert!(arms.observe(kind, &Evaluation::Holding, t(0)).is_none());

        assert!(arms.observe(kind, &crossed, t(1)).is_some());
        let retry = arms.observe(kind, &Evaluation::Holding, t(2)).unwrap();
        assert_eq!(retry.evidence, match crossed { Evaluation::Triggered(e) => e, _ => unreachable!() });

        arms.confirm(kind, t(2));
        assert!(arms.observe(kind, &Evaluation::Holding, t(3)).is_none());
    }

    #[test]
    fn not_enough_data_keeps_state() {
        let mut arms = ArmTable::new();
        arms.observe(KIND, &stable(), t(0));
        arms.confirm(KIND, t(0));
        arms.observe(KIND, &Evaluation::NotEnoughData, t(1));
        assert_eq!(arms.state(KIND), ArmState::Alerted { at: t(0) });
    }

    #[test]
    fn reset_rearms_everything() {
        let mut arms = ArmTable::new();
        arms.observe(KIND, &stable(), t(0));
        arms.confirm(KIND, t(0));
        arms.reset();
        for kind in TriggerKind::ALL {
            assert_eq!(arms.state(kind), ArmState::Quiet { episode: Episode::Fresh });
        }
        let candidate = arms.observe(KIND, &stable(), t(6)).unwrap();
        assert_eq!(candidate.episode, Episode::Fresh);

        // a failed delivery keeps the episode fresh for the retry
        let retry = arms.observe(KIND, &stable(), t(7)).unwrap();
        assert_eq!(retry.episode, Episode::Fresh);
    }
}
