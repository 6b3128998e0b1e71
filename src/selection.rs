/// Sort/metric toggles offered by chapters with a round picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    GapToPole,
    PaceDelta,
    PaceConsistency,
    PitMedian,
    PitBest,
}

pub const QUALIFYING_METRICS: &[Metric] = &[Metric::GapToPole];
pub const PACE_METRICS: &[Metric] = &[Metric::PaceDelta, Metric::PaceConsistency];
pub const PIT_METRICS: &[Metric] = &[Metric::PitMedian, Metric::PitBest];

pub fn metric_label(metric: Metric) -> &'static str {
    match metric {
        Metric::GapToPole => "Gap to pole",
        Metric::PaceDelta => "Pace delta",
        Metric::PaceConsistency => "Consistency",
        Metric::PitMedian => "Median stop",
        Metric::PitBest => "Best stop",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SelectionState {
    pub selected_round: Option<u32>,
    pub metric: Metric,
    metrics: &'static [Metric],
}

impl SelectionState {
    pub fn new(metrics: &'static [Metric]) -> Self {
        Self {
            selected_round: None,
            metric: metrics.first().copied().unwrap_or(Metric::GapToPole),
            metrics,
        }
    }

    /// Keep the current round when it is still valid, otherwise jump to the
    /// latest available one. `valid` must be ascending.
    pub fn reconcile(&mut self, valid: &[u32]) -> bool {
        let before = self.selected_round;
        match self.selected_round {
            Some(round) if valid.contains(&round) => {}
            _ => self.selected_round = valid.last().copied(),
        }
        before != self.selected_round
    }

    /// Move to the neighbouring valid round, stopping at either end.
    pub fn step_round(&mut self, valid: &[u32], forward: bool) -> bool {
        let Some(current) = self.selected_round else {
            return self.reconcile(valid);
        };
        let Some(pos) = valid.iter().position(|r| *r == current) else {
            return self.reconcile(valid);
        };
        let next = if forward {
            valid.get(pos + 1)
        } else {
            pos.checked_sub(1).and_then(|p| valid.get(p))
        };
        match next {
            Some(round) => {
                self.selected_round = Some(*round);
                true
            }
            None => false,
        }
    }

    /// Select `round` only when it is one of the valid rounds.
    pub fn select_round(&mut self, valid: &[u32], round: u32) -> bool {
        if valid.contains(&round) && self.selected_round != Some(round) {
            self.selected_round = Some(round);
            return true;
        }
        false
    }

    pub fn cycle_metric(&mut self) -> bool {
        if self.metrics.len() < 2 {
            return false;
        }
        let pos = self
            .metrics
            .iter()
            .position(|m| *m == self.metric)
            .unwrap_or(0);
        self.metric = self.metrics[(pos + 1) % self.metrics.len()];
        true
    }
}
