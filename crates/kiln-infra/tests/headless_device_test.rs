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

use kiln_core::renderer::*;
use kiln_infra::graphics::headless::{DescriptorView, DrawKind, HeadlessConfig, HeadlessDevice};

struct Fixture {
    device: HeadlessDevice,
    signature: BindingSignatureId,
    pipeline: PipelineStateId,
    heap: DescriptorHeapId,
    heap_start: (CpuDescriptorHandle, GpuDescriptorHandle),
    target: CpuDescriptorHandle,
}

fn descriptor() -> PipelineStateDescriptor {
    PipelineStateDescriptor {
        shaders: ShaderStages {
            vertex: Some("vs.cso".into()),
            pixel: Some("ps.cso".into()),
            ..Default::default()
        },
        binding_signature: Some("rs.cso".into()),
        input_layout: InputLayout::None,
        topology_type: PrimitiveTopologyType::Triangle,
        render_target_formats: vec![TextureFormat::Rgba8Unorm],
        depth_stencil_format: None,
        depth_stencil: DepthStencilMode::Disabled,
        blend: BlendMode::Opaque,
        cull: CullMode::None,
    }
}

fn fixture(config: HeadlessConfig) -> Fixture {
    let device = HeadlessDevice::with_config(config);
    let signature = device.create_binding_signature(b"rs", Some("rs")).unwrap();
    let descriptor = descriptor();
    let pipeline = device
        .create_pipeline_state(&PipelineStateCreateInfo {
            label: "test",
            descriptor: &descriptor,
            binding_signature: signature,
            vertex_shader: b"vs",
            hull_shader: None,
            domain_shader: None,
            geometry_shader: None,
            pixel_shader: Some(b"ps"),
        })
        .unwrap();
    let heap = device.create_descriptor_heap(16, Some("heap")).unwrap();
    let heap_start = device.descriptor_heap_start(heap).unwrap();
    let texture = device
        .create_texture(
            &TextureDescriptor {
                label: Some("target".into()),
                width: 4,
                height: 4,
                mip_level_count: 1,
                format: TextureFormat::Rgba8Unorm,
                dimension: TextureDimension::D2,
            },
            None,
        )
        .unwrap();
    let target = device.create_render_target_view(texture).unwrap();
    Fixture {
        device,
        signature,
        pipeline,
        heap,
        heap_start,
        target,
    }
}

fn record_draw(f: &Fixture, list: &mut dyn GraphicsCommandList, allocator: CommandAllocatorId) {
    list.reset(allocator, Some(f.pipeline)).unwrap();
    list.set_viewports(&[Viewport::full(4, 4)]);
    list.set_render_targets(&[f.target], None);
    list.set_descriptor_heaps(&[f.heap]);
    list.set_graphics_binding_signature(f.signature);
    list.set_graphics_root_descriptor_table(0, f.heap_start.1);
    list.set_primitive_topology(PrimitiveTopology::TriangleList);
    list.draw_instanced(6, 1, 0, 0);
    list.close().unwrap();
}

#[test]
fn allocator_reset_is_refused_until_its_fence_completes() {
    let f = fixture(HeadlessConfig::default());
    let allocator = f
        .device
        .create_command_allocator(CommandListKind::Direct, Some("a"))
        .unwrap();
    let mut list = f
        .device
        .create_command_list(CommandListKind::Direct, allocator, Some("list"))
        .unwrap();

    record_draw(&f, list.as_mut(), allocator);
    f.device.execute_command_lists(&[list.id()]).unwrap();

    // Executed but not yet signaled.
    assert!(matches!(
        f.device.reset_command_allocator(allocator),
        Err(RenderError::AllocatorInUse { .. })
    ));

    let fence = f.device.signal_fence().unwrap();
    match f.device.reset_command_allocator(allocator) {
        Err(RenderError::AllocatorInUse {
            pending_fence,
            completed_fence,
            ..
        }) => {
            assert_eq!(pending_fence, fence);
            assert_eq!(completed_fence, FenceValue::INITIAL);
        }
        other => panic!("expected AllocatorInUse, got {other:?}"),
    }

    f.device.wait_for_fence(fence).unwrap();
    assert_eq!(f.device.completed_fence_value(), fence);
    assert!(f.device.reset_command_allocator(allocator).is_ok());
    assert_eq!(f.device.stats().fence_waits, 1);
}

#[test]
fn completed_batches_are_replayed_with_their_bindings() {
    let f = fixture(HeadlessConfig {
        complete_on_signal: true,
        max_in_flight_batches: None,
    });
    let allocator = f
        .device
        .create_command_allocator(CommandListKind::Direct, None)
        .unwrap();
    let mut list = f
        .device
        .create_command_list(CommandListKind::Direct, allocator, Some("lane"))
        .unwrap();

    record_draw(&f, list.as_mut(), allocator);
    f.device.execute_command_lists(&[list.id()]).unwrap();
    let fence = f.device.signal_fence().unwrap();

    let draws = f.device.executed_draws();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].fence, fence);
    assert_eq!(draws[0].list_label.as_deref(), Some("lane"));
    assert_eq!(draws[0].pipeline, Some(f.pipeline));
    assert_eq!(draws[0].tables.get(&0), Some(&f.heap_start.1));
    assert_eq!(
        draws[0].kind,
        DrawKind::Vertices {
            vertex_count: 6,
            instance_count: 1
        }
    );
    assert!(f.device.validation_errors().is_empty());

    let submissions = f.device.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].fence, fence);
}

#[test]
fn unbound_state_is_reported_as_validation_errors() {
    let f = fixture(HeadlessConfig::default());
    let allocator = f
        .device
        .create_command_allocator(CommandListKind::Direct, None)
        .unwrap();
    let mut list = f
        .device
        .create_command_list(CommandListKind::Direct, allocator, None)
        .unwrap();

    list.reset(allocator, Some(f.pipeline)).unwrap();
    list.set_primitive_topology(PrimitiveTopology::PatchList3);
    list.draw_indexed_instanced(3, 1, 0, 0, 0);
    list.close().unwrap();
    f.device.execute_command_lists(&[list.id()]).unwrap();
    f.device.signal_fence().unwrap();
    f.device.poll();

    let errors = f.device.validation_errors();
    assert!(errors.iter().any(|e| e.contains("signature")));
    assert!(errors.iter().any(|e| e.contains("topology")));
    assert!(errors.iter().any(|e| e.contains("viewport")));
    assert!(errors.iter().any(|e| e.contains("index buffer")));
    assert_eq!(f.device.stats().validation_errors, errors.len() as u64);
}

#[test]
fn a_closed_list_must_be_submitted_before_it_is_reset() {
    let f = fixture(HeadlessConfig::default());
    let allocator = f
        .device
        .create_command_allocator(CommandListKind::Direct, None)
        .unwrap();
    let mut list = f
        .device
        .create_command_list(CommandListKind::Direct, allocator, None)
        .unwrap();
    assert!(list.is_closed());

    record_draw(&f, list.as_mut(), allocator);
    assert!(matches!(
        list.reset(allocator, None),
        Err(RenderError::InvalidCommandListState { .. })
    ));

    f.device.execute_command_lists(&[list.id()]).unwrap();
    assert!(matches!(
        f.device.execute_command_lists(&[list.id()]),
        Err(RenderError::InvalidCommandListState { .. })
    ));
    assert!(list.reset(allocator, None).is_ok());
    assert!(matches!(
        list.reset(allocator, None),
        Err(RenderError::InvalidCommandListState { .. })
    ));
}

#[test]
fn a_discarded_list_is_never_submitted_and_may_be_reset() {
    let f = fixture(HeadlessConfig::default());
    let allocator = f
        .device
        .create_command_allocator(CommandListKind::Direct, None)
        .unwrap();
    let mut list = f
        .device
        .create_command_list(CommandListKind::Direct, allocator, None)
        .unwrap();

    list.reset(allocator, Some(f.pipeline)).unwrap();
    list.draw_instanced(6, 1, 0, 0);
    list.discard();
    assert!(list.is_closed());
    assert!(matches!(
        f.device.execute_command_lists(&[list.id()]),
        Err(RenderError::InvalidCommandListState { .. })
    ));

    record_draw(&f, list.as_mut(), allocator);
    f.device.execute_command_lists(&[list.id()]).unwrap();
    assert!(f.device.validation_errors().is_empty());
}

#[test]
fn recording_into_a_closed_list_fails_at_the_next_close() {
    let f = fixture(HeadlessConfig::default());
    let allocator = f
        .device
        .create_command_allocator(CommandListKind::Direct, None)
        .unwrap();
    let mut list = f
        .device
        .create_command_list(CommandListKind::Direct, allocator, None)
        .unwrap();

    list.draw_instanced(3, 1, 0, 0);
    list.reset(allocator, None).unwrap();
    assert!(list.close().is_err());
    assert!(f.device.execute_command_lists(&[list.id()]).is_err());
}

#[test]
fn fences_complete_in_signal_order() {
    let f = fixture(HeadlessConfig::default());
    let first = f.device.signal_fence().unwrap();
    let second = f.device.signal_fence().unwrap();
    let third = f.device.signal_fence().unwrap();
    assert!(first < second && second < third);

    f.device.wait_for_fence(second).unwrap();
    assert_eq!(f.device.completed_fence_value(), second);
    assert!(f.device.wait_for_fence(third.next()).is_err());
    assert_eq!(f.device.poll(), third);
}

#[test]
fn in_flight_limit_retires_the_oldest_batches() {
    let f = fixture(HeadlessConfig {
        complete_on_signal: false,
        max_in_flight_batches: Some(2),
    });
    let first = f.device.signal_fence().unwrap();
    f.device.signal_fence().unwrap();
    assert_eq!(f.device.completed_fence_value(), FenceValue::INITIAL);

    f.device.signal_fence().unwrap();
    assert_eq!(f.device.completed_fence_value(), first);
}

#[test]
fn constant_buffer_views_read_back_their_bytes() {
    let f = fixture(HeadlessConfig::default());
    let buffer = f.device.create_upload_buffer(512, Some("constants")).unwrap();
    let address = f.device.buffer_gpu_address(buffer).unwrap();
    f.device.write_buffer(buffer, 256, &[9u8; 16]).unwrap();

    let view = ConstantBufferViewDescriptor {
        location: address.offset(256),
        size_in_bytes: 256,
    };
    let slot = f.heap_start.0.offset(3, f.device.descriptor_increment());
    f.device.create_constant_buffer_view(&view, slot).unwrap();

    let gpu = f.heap_start.1.offset(3, f.device.descriptor_increment());
    assert_eq!(
        f.device.descriptor_at(gpu),
        Some(DescriptorView::ConstantBuffer(view))
    );
    let bytes = f.device.read_constant_buffer(gpu).unwrap();
    assert_eq!(&bytes[..16], &[9u8; 16]);
    assert_eq!(bytes.len(), 256);

    let misaligned = ConstantBufferViewDescriptor {
        location: address.offset(16),
        size_in_bytes: 256,
    };
    assert!(f.device.create_constant_buffer_view(&misaligned, slot).is_err());
}

#[test]
fn device_local_buffers_are_not_cpu_writable() {
    let device = HeadlessDevice::new();
    let buffer = device
        .create_buffer_with_data(
            &BufferDescriptor {
                label: Some("vertices".into()),
                size: 0,
                memory: MemoryLocation::DeviceLocal,
            },
            &[1, 2, 3, 4],
        )
        .unwrap();
    assert_eq!(device.read_buffer(buffer, 0, 4).unwrap(), vec![1, 2, 3, 4]);
    assert!(device.write_buffer(buffer, 0, &[0]).is_err());
    device.destroy_buffer(buffer).unwrap();
    assert_eq!(device.allocated_buffer_bytes(), 0);
}
