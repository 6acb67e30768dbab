//! Per-step telemetry recording.

use crate::network::StepSummary;
use gf_network::SolverNode;
use serde::Serialize;

/// One recorded step: the time, every node potential, and the solver
/// outcome.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub time: f64,
    pub potentials: Vec<f64>,
    pub minor_steps: usize,
    pub converged: bool,
}

/// Records every N-th step's potentials (decimation keeps long runs small).
#[derive(Debug, Clone)]
pub struct Recorder {
    record_every: usize,
    steps_seen: u64,
    records: Vec<StepRecord>,
}

impl Recorder {
    pub fn new(record_every: usize) -> Self {
        Self {
            record_every: record_every.max(1),
            steps_seen: 0,
            records: Vec::new(),
        }
    }

    /// Offer one step's outcome; records it when the decimation matches.
    pub fn observe<N: SolverNode>(&mut self, nodes: &[N], summary: &StepSummary) {
        self.steps_seen += 1;
        if self.steps_seen % self.record_every as u64 != 0 {
            return;
        }
        self.records.push(StepRecord {
            time: summary.time,
            potentials: nodes.iter().map(|n| n.potential()).collect(),
            minor_steps: summary.minor_steps,
            converged: summary.converged,
        });
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    /// Serialize the record stream as JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gf_network::BasicNode;

    fn summary(time: f64) -> StepSummary {
        StepSummary {
            time,
            step: 1,
            minor_steps: 1,
            converged: true,
        }
    }

    #[test]
    fn decimation_skips_steps() {
        let nodes = vec![BasicNode::new("a", 1.0), BasicNode::new("ground", 0.0)];
        let mut recorder = Recorder::new(2);
        recorder.observe(&nodes, &summary(0.1));
        recorder.observe(&nodes, &summary(0.2));
        recorder.observe(&nodes, &summary(0.3));
        recorder.observe(&nodes, &summary(0.4));
        assert_eq!(recorder.records().len(), 2);
        assert_eq!(recorder.records()[0].time, 0.2);
    }

    #[test]
    fn json_serialization() {
        let nodes = vec![BasicNode::new("a", 1.5), BasicNode::new("ground", 0.0)];
        let mut recorder = Recorder::new(1);
        recorder.observe(&nodes, &summary(0.1));
        let json = recorder.to_json().unwrap();
        assert!(json.contains("1.5"));
        assert!(json.contains("\"converged\": true"));
    }
}
