// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! JSON summary of a run.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::Context;
use kiln_agents::render_agent::FrameReport;
use kiln_infra::graphics::headless::HeadlessStats;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameSummary {
    pub frame_number: u64,
    pub slot: usize,
    pub lists: u32,
    pub lists_per_stage: Vec<(String, u32)>,
    pub fence: Option<u64>,
    pub cpu_time_us: u128,
}

impl From<&FrameReport> for FrameSummary {
    fn from(report: &FrameReport) -> Self {
        Self {
            frame_number: report.frame_number,
            slot: report.slot,
            lists: report.lists_submitted(),
            lists_per_stage: report
                .stage_lists
                .iter()
                .map(|(kind, lists)| (kind.to_string(), *lists))
                .collect(),
            fence: report.fence.map(|fence| fence.0),
            cpu_time_us: report.cpu_time.as_micros(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceSummary {
    pub batches: u64,
    pub lists_executed: u64,
    pub draw_calls: u64,
    pub clears: u64,
    pub fence_waits: u64,
    pub pipelines_created: u64,
    pub validation_errors: u64,
}

impl From<HeadlessStats> for DeviceSummary {
    fn from(stats: HeadlessStats) -> Self {
        Self {
            batches: stats.batches,
            lists_executed: stats.lists_executed,
            draw_calls: stats.draw_calls,
            clears: stats.clears,
            fence_waits: stats.fence_waits,
            pipelines_created: stats.pipelines_created,
            validation_errors: stats.validation_errors,
        }
    }
}

/// Everything written by `--report`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub queued_frame_count: usize,
    pub lanes: Vec<String>,
    pub frames: Vec<FrameSummary>,
    pub device: DeviceSummary,
}

impl RunReport {
    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        let file = File::create(path)
            .with_context(|| format!("failed to create report {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .with_context(|| format!("failed to write report {}", path.display()))?;
        log::info!("Wrote run report to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use kiln_core::lane::LaneKind;
    use kiln_core::renderer::FenceValue;

    #[test]
    fn frame_summaries_flatten_the_report() {
        let report = FrameReport {
            frame_number: 7,
            slot: 1,
            stage_lists: vec![(LaneKind::Geometry, 3), (LaneKind::PostProcess, 1)],
            fence: Some(FenceValue(8)),
            cpu_time: Duration::from_micros(250),
        };
        let summary = FrameSummary::from(&report);
        assert_eq!(summary.lists, 4);
        assert_eq!(summary.fence, Some(8));
        assert_eq!(summary.cpu_time_us, 250);
        assert_eq!(summary.lists_per_stage[0].1, 3);
    }

    #[test]
    fn reports_are_written_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        let report = RunReport {
            queued_frame_count: 2,
            lanes: vec!["ColorMapping".into()],
            frames: Vec::new(),
            device: HeadlessStats::default().into(),
        };
        report.write(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_reader(File::open(&path).unwrap()).unwrap();
        assert_eq!(value["queued_frame_count"], 2);
        assert_eq!(value["lanes"][0], "ColorMapping");
        assert_eq!(value["device"]["draw_calls"], 0);
    }
}
