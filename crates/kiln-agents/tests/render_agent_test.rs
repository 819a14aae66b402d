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

//! Integration tests of the RenderAgent frame loop on the headless device.

use std::sync::Arc;

use kiln_agents::render_agent::RenderAgent;
use kiln_core::lane::{LaneError, LaneKind};
use kiln_core::math::{Mat4, Vec3, Vec4};
use kiln_core::renderer::*;
use kiln_infra::graphics::headless::{HeadlessConfig, HeadlessDevice};
use kiln_infra::shaders::InMemoryShaderLoader;
use kiln_lanes::render_lane::*;

fn context(device: &HeadlessDevice, queued_frame_count: usize) -> GpuContext {
    let settings = RendererSettings {
        queued_frame_count,
        width: 32,
        height: 32,
        descriptor_heap_capacity: 128,
        ..Default::default()
    };
    let shaders = InMemoryShaderLoader::new();
    shaders.register_placeholders(pipelines::shader_paths(&settings).iter().map(String::as_str));
    GpuContext::new(Arc::new(device.clone()), Arc::new(shaders), settings).unwrap()
}

fn mesh(device: &HeadlessDevice, instances: usize) -> GeometryData {
    let worlds = (0..instances)
        .map(|i| Mat4::from_translation(Vec3::new(i as f32 * 2.0, 0.0, 0.0)))
        .collect();
    GeometryData::upload(device, "Quad", &[0u8; 4 * 48], 48, &[0, 1, 2, 0, 2, 3], worlds).unwrap()
}

fn textures(device: &HeadlessDevice, count: usize, dimension: TextureDimension) -> Vec<TextureId> {
    (0..count)
        .map(|_| {
            device
                .create_texture(
                    &TextureDescriptor {
                        label: None,
                        width: 8,
                        height: 8,
                        mip_level_count: 1,
                        format: TextureFormat::Rgba8Unorm,
                        dimension,
                    },
                    None,
                )
                .unwrap()
        })
        .collect()
}

fn back_buffer(device: &HeadlessDevice) -> CpuDescriptorHandle {
    let texture = device
        .create_texture(
            &TextureDescriptor {
                label: Some("Back buffer".into()),
                width: 32,
                height: 32,
                mip_level_count: 1,
                format: TextureFormat::Rgba8Unorm,
                dimension: TextureDimension::D2,
            },
            None,
        )
        .unwrap();
    device.create_render_target_view(texture).unwrap()
}

fn material() -> MaterialProperties {
    MaterialProperties::new(Vec4::ONE, 0.0, 0.5)
}

/// Registers one lane of every type, deliberately out of stage order.
fn full_agent(device: &HeadlessDevice, queued_frame_count: usize) -> RenderAgent {
    let mut agent = RenderAgent::new(context(device, queued_frame_count)).unwrap();
    let context = agent.context().clone();
    let targets = agent.targets().unwrap().clone();

    let mut post = PostProcessLane::new(context.clone()).unwrap();
    post.init(&targets).unwrap();
    agent.register_lane(Box::new(post)).unwrap();

    let mut sky = SkyBoxLane::new(context.clone()).unwrap();
    let cube = textures(device, 1, TextureDimension::Cube)[0];
    sky.init(mesh(device, 1), cube, &targets).unwrap();
    agent.register_lane(Box::new(sky)).unwrap();

    let mut occlusion = AmbientOcclusionLane::new(context.clone()).unwrap();
    occlusion.init(&targets).unwrap();
    agent.register_lane(Box::new(occlusion)).unwrap();

    let mut blur = BlurLane::new(context.clone()).unwrap();
    blur.init(&targets).unwrap();
    agent.register_lane(Box::new(blur)).unwrap();

    let mut light = PunctualLightLane::new(context.clone()).unwrap();
    let lights = [PunctualLight::new(Vec3::Y, 5.0, Vec3::ONE, 2.0)];
    light.init(&lights, &targets).unwrap();
    agent.register_lane(Box::new(light)).unwrap();

    let mut color = ColorLane::new(context.clone()).unwrap();
    color
        .init(GeometryInputs::new(vec![mesh(device, 2)], vec![material(); 2]), &targets)
        .unwrap();
    agent.register_lane(Box::new(color)).unwrap();

    let mut normal = NormalMappingLane::new(context.clone()).unwrap();
    let diffuse = textures(device, 3, TextureDimension::D2);
    let normals = textures(device, 3, TextureDimension::D2);
    normal
        .init(
            GeometryInputs::new(vec![mesh(device, 3)], vec![material(); 3]),
            &diffuse,
            &normals,
            &targets,
        )
        .unwrap();
    agent.register_lane(Box::new(normal)).unwrap();

    agent
}

fn stage_of(label: &str) -> LaneKind {
    match label {
        "Geometry clear" | ColorLane::NAME | NormalMappingLane::NAME => LaneKind::Geometry,
        PunctualLightLane::NAME => LaneKind::Lighting,
        "Ambient clear" | AmbientOcclusionLane::NAME | BlurLane::NAME => LaneKind::Ambient,
        SkyBoxLane::NAME => LaneKind::SkyBox,
        PostProcessLane::NAME => LaneKind::PostProcess,
        other => panic!("unexpected list '{other}'"),
    }
}

#[test]
fn stages_are_submitted_in_pipeline_order() {
    let device = HeadlessDevice::new();
    let mut agent = full_agent(&device, 2);

    let report = agent
        .render_frame(&FrameConstants::default(), back_buffer(&device))
        .unwrap();
    assert_eq!(report.lists_for(LaneKind::Geometry), 3);
    assert_eq!(report.lists_for(LaneKind::Lighting), 1);
    assert_eq!(report.lists_for(LaneKind::Ambient), 3);
    assert_eq!(report.lists_submitted(), 9);

    let labels: Vec<String> = device
        .submissions()
        .iter()
        .map(|s| s.label.clone().unwrap())
        .collect();
    let stages: Vec<LaneKind> = labels.iter().map(|l| stage_of(l)).collect();
    let mut sorted = stages.clone();
    sorted.sort();
    assert_eq!(stages, sorted, "submission order was {labels:?}");

    // Clears lead their stage and the blur follows the occlusion it reads.
    assert_eq!(labels[0], "Geometry clear");
    let ambient: Vec<&str> = labels
        .iter()
        .map(String::as_str)
        .filter(|l| stage_of(l) == LaneKind::Ambient)
        .collect();
    assert_eq!(ambient, vec!["Ambient clear", "AmbientOcclusion", "Blur"]);

    // One batch, one fence.
    assert!(device.submissions().iter().all(|s| Some(s.fence) == report.fence));
}

#[test]
fn many_frames_reuse_allocators_without_conflicts() {
    let device = HeadlessDevice::new();
    let mut agent = full_agent(&device, 3);
    let back_buffer = back_buffer(&device);

    for frame in 0..12u64 {
        let report = agent
            .render_frame(&FrameConstants::default(), back_buffer)
            .unwrap();
        assert_eq!(report.frame_number, frame);
        assert_eq!(report.slot, (frame % 3) as usize);
    }
    agent.flush().unwrap();

    assert!(device.validation_errors().is_empty(), "{:?}", device.validation_errors());
    // Slot reuse starts with the fourth frame; each reuse waits exactly once.
    assert_eq!(device.stats().fence_waits, 12 - 3 + 1);
    assert_eq!(device.completed_fence_value(), device.last_signaled_fence());
    // 2 + 3 geometry instances, 1 light, occlusion, blur, sky, post-process.
    assert_eq!(device.stats().draw_calls, 12 * (5 + 1 + 2 + 1 + 1));
}

#[test]
fn frames_already_completed_do_not_wait() {
    let device = HeadlessDevice::with_config(HeadlessConfig {
        complete_on_signal: true,
        ..Default::default()
    });
    let mut agent = full_agent(&device, 2);
    let back_buffer = back_buffer(&device);

    for _ in 0..6 {
        agent.render_frame(&FrameConstants::default(), back_buffer).unwrap();
    }
    assert_eq!(device.stats().fence_waits, 0);
    assert_eq!(agent.frame_count(), 6);
}

#[test]
fn uninitialized_lanes_are_not_registered() {
    let device = HeadlessDevice::new();
    let mut agent = RenderAgent::new(context(&device, 2)).unwrap();
    let lane = BlurLane::new(agent.context().clone()).unwrap();

    let err = agent.register_lane(Box::new(lane)).unwrap_err();
    assert!(matches!(err, LaneError::NotInitialized { lane: "Blur" }));
    assert!(agent.lanes().is_empty());
}

#[test]
fn lane_failure_still_submits_and_fences_the_frame() {
    let device = HeadlessDevice::new();
    let mut agent = full_agent(&device, 2);

    // A null back buffer makes the post-process lane fail after every
    // other stage has pushed its lists.
    let err = agent
        .render_frame(&FrameConstants::default(), CpuDescriptorHandle::NULL)
        .unwrap_err();
    assert!(matches!(err, LaneError::InvalidInput { lane: "PostProcess", .. }));
    assert_eq!(agent.context().executor.pending_count(), 0);
    assert_eq!(device.submissions().len(), 8);
    assert_eq!(agent.frame_count(), 0);
}

#[test]
fn release_waits_for_the_gpu_and_frees_buffers() {
    let device = HeadlessDevice::new();
    let mut agent = full_agent(&device, 2);
    agent
        .render_frame(&FrameConstants::default(), back_buffer(&device))
        .unwrap();
    let before = device.allocated_buffer_bytes();

    agent.release().unwrap();
    assert_eq!(device.completed_fence_value(), device.last_signaled_fence());
    assert!(device.allocated_buffer_bytes() < before);
    assert!(agent.lanes().is_empty());
    assert!(agent.targets().is_err());
}
