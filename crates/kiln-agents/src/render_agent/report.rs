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

use std::time::Duration;

use kiln_core::lane::LaneKind;
use kiln_core::renderer::FenceValue;

/// What one call to `RenderAgent::render_frame` did.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    /// Monotonic frame counter.
    pub frame_number: u64,
    /// The in-flight slot the frame used.
    pub slot: usize,
    /// Command lists pushed per stage, clears included, in submission order.
    pub stage_lists: Vec<(LaneKind, u32)>,
    /// The fence signaled for the frame, `None` if nothing was recorded.
    pub fence: Option<FenceValue>,
    /// CPU time spent waiting, recording and submitting.
    pub cpu_time: Duration,
}

impl FrameReport {
    /// Total lists submitted for the frame.
    pub fn lists_submitted(&self) -> u32 {
        self.stage_lists.iter().map(|(_, count)| count).sum()
    }

    /// Lists pushed by the lanes (and clears) of `kind`.
    pub fn lists_for(&self, kind: LaneKind) -> u32 {
        self.stage_lists
            .iter()
            .find(|(k, _)| *k == kind)
            .map_or(0, |(_, count)| *count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_sum_every_stage() {
        let report = FrameReport {
            frame_number: 4,
            slot: 1,
            stage_lists: vec![(LaneKind::Geometry, 3), (LaneKind::Lighting, 1)],
            fence: Some(FenceValue(5)),
            cpu_time: Duration::ZERO,
        };
        assert_eq!(report.lists_submitted(), 4);
        assert_eq!(report.lists_for(LaneKind::Geometry), 3);
        assert_eq!(report.lists_for(LaneKind::SkyBox), 0);
    }
}
