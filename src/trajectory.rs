use std::io::{self, BufRead, Write};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::{CaseState, StateCounts};
use crate::types::Day;

/// End-of-day state counts for one simulated day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub day: Day,
    pub counts: StateCounts,
}

impl Snapshot {
    pub fn population(&self) -> u64 {
        self.counts.total()
    }
}

/// The ordered per-day snapshots of one run, day 1 first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Trajectory(Vec<Snapshot>);

#[derive(Debug, Error)]
pub enum TrajectoryReadError {
    #[error("failed to read trajectory: {0}")]
    Io(#[from] io::Error),
    #[error("line {line}: {source}")]
    Json { line: usize, source: serde_json::Error },
}

impl Trajectory {
    pub fn with_capacity(days: usize) -> Self {
        Trajectory(Vec::with_capacity(days))
    }

    pub fn push(&mut self, snapshot: Snapshot) {
        self.0.push(snapshot);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.0
    }

    pub fn last(&self) -> Option<&Snapshot> {
        self.0.last()
    }

    /// Count of `state` on every day, in order.
    pub fn series(&self, state: CaseState) -> Vec<u64> {
        self.0.iter().map(|s| s.counts[state]).collect()
    }

    /// Write as CSV: `day` followed by one column per state.
    pub fn write_csv<W: Write>(&self, mut w: W) -> io::Result<()> {
        let header: Vec<&str> = CaseState::ALL.iter().map(|s| s.as_str()).collect();
        writeln!(w, "day,{}", header.join(","))?;
        for snap in &self.0 {
            write!(w, "{}", snap.day)?;
            for (_, n) in snap.counts.iter() {
                write!(w, ",{n}")?;
            }
            writeln!(w)?;
        }
        w.flush()
    }

    /// Write one JSON snapshot per line.
    pub fn write_ndjson<W: Write>(&self, mut w: W) -> io::Result<()> {
        for snap in &self.0 {
            serde_json::to_writer(&mut w, snap)?;
            writeln!(w)?;
        }
        w.flush()
    }

    /// Read a stream written by [`Trajectory::write_ndjson`]. Blank lines are skipped.
    pub fn read_ndjson<R: BufRead>(reader: R) -> Result<Self, TrajectoryReadError> {
        let mut trajectory = Trajectory::default();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let snap = serde_json::from_str(&line)
                .map_err(|source| TrajectoryReadError::Json { line: i + 1, source })?;
            trajectory.push(snap);
        }
        Ok(trajectory)
    }
}

impl<'a> IntoIterator for &'a Trajectory {
    type Item = &'a Snapshot;
    type IntoIter = std::slice::Iter<'a, Snapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use std::io::BufReader;

    use super::*;

    fn snap(day: u32, states: &[CaseState]) -> Snapshot {
        Snapshot { day: Day(day), counts: states.iter().copied().collect() }
    }

    fn sample() -> Trajectory {
        let mut t = Trajectory::default();
        t.push(snap(1, &[CaseState::Charged, CaseState::McBacklog]));
        t.push(snap(2, &[CaseState::McBacklog, CaseState::McBacklog, CaseState::Dismissed]));
        t
    }

    #[test]
    fn series_follows_day_order() {
        let t = sample();
        assert_eq!(t.series(CaseState::McBacklog), vec![1, 2]);
        assert_eq!(t.series(CaseState::Charged), vec![1, 0]);
        assert_eq!(t.last().map(Snapshot::population), Some(3));
    }

    #[test]
    fn csv_has_header_and_one_row_per_day() {
        let mut buf = Vec::new();
        sample().write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "day,UNDER_INVESTIGATION,CHARGED,MC_BACKLOG,IN_MC,CC_BACKLOG,IN_CC,CONVICTED,IMPRISONED,DISMISSED"
        );
        assert_eq!(lines[2], "2,0,0,2,0,0,0,0,0,1");
    }

    #[test]
    fn ndjson_snapshot_shape() {
        let mut buf = Vec::new();
        sample().write_ndjson(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let first: serde_json::Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();
        assert_eq!(first["day"], 1);
        assert_eq!(first["counts"]["CHARGED"], 1);

        let back = Trajectory::read_ndjson(BufReader::new(text.as_bytes())).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn read_reports_bad_line_number() {
        let text = "{\"day\":1,\"counts\":{}}\n\nnot json\n";
        let err = Trajectory::read_ndjson(BufReader::new(text.as_bytes())).unwrap_err();
        assert!(matches!(err, TrajectoryReadError::Json { line: 3, .. }), "{err}");
    }
}
