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

//! Defines the hierarchy of error types for the rendering subsystem.

use crate::renderer::api::command::{CommandAllocatorId, CommandListId, FenceValue};
use std::fmt;

/// An error related to loading a compiled shader or binding-signature blob.
#[derive(Debug)]
pub enum ShaderError {
    /// An error occurred while trying to load the blob from a path.
    LoadError {
        /// The path of the blob that failed to load.
        path: String,
        /// The underlying I/O or source error.
        source_error: String,
    },
    /// The blob was found but is empty or otherwise unusable.
    InvalidBytecode {
        /// The path of the offending blob.
        path: String,
    },
    /// No blob is registered under the requested path.
    NotFound {
        /// The path that was looked up.
        path: String,
    },
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::LoadError { path, source_error } => {
                write!(f, "Failed to load shader blob from '{path}': {source_error}")
            }
            ShaderError::InvalidBytecode { path } => {
                write!(f, "Shader blob '{path}' contains no bytecode")
            }
            ShaderError::NotFound { path } => {
                write!(f, "Shader blob not found: '{path}'")
            }
        }
    }
}

impl std::error::Error for ShaderError {}

/// An error related to the creation or management of a pipeline state object.
#[derive(Debug)]
pub enum PipelineError {
    /// The descriptor names no vertex shader.
    MissingVertexShader {
        /// The symbolic name of the pipeline being created.
        name: String,
    },
    /// The descriptor names no binding signature blob.
    MissingBindingSignature {
        /// The symbolic name of the pipeline being created.
        name: String,
    },
    /// The descriptor has neither color targets nor a depth target.
    MissingRenderTargets {
        /// The symbolic name of the pipeline being created.
        name: String,
    },
    /// Tessellation stages must be provided together, and only with a patch topology.
    InconsistentTessellation {
        /// The symbolic name of the pipeline being created.
        name: String,
    },
    /// More color targets were requested than the device supports.
    TooManyRenderTargets {
        /// The symbolic name of the pipeline being created.
        name: String,
        /// The number of requested targets.
        count: usize,
    },
    /// A shader blob required by the pipeline failed to load.
    Shader(ShaderError),
    /// The backend refused to build the pipeline state object.
    CompilationFailed {
        /// The symbolic name of the pipeline, if available.
        label: Option<String>,
        /// Detailed error messages from the backend.
        details: String,
    },
    /// No pipeline is cached under the requested name.
    NotCached {
        /// The symbolic name that was looked up.
        name: String,
    },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::MissingVertexShader { name } => {
                write!(f, "Pipeline '{name}' has no vertex shader")
            }
            PipelineError::MissingBindingSignature { name } => {
                write!(f, "Pipeline '{name}' has no binding signature")
            }
            PipelineError::MissingRenderTargets { name } => {
                write!(f, "Pipeline '{name}' has no render target formats")
            }
            PipelineError::InconsistentTessellation { name } => {
                write!(
                    f,
                    "Pipeline '{name}' mixes tessellation stages and topology inconsistently"
                )
            }
            PipelineError::TooManyRenderTargets { name, count } => {
                write!(f, "Pipeline '{name}' requests {count} render targets")
            }
            PipelineError::Shader(err) => write!(f, "Pipeline shader error: {err}"),
            PipelineError::CompilationFailed { label, details } => {
                write!(
                    f,
                    "Pipeline compilation failed for '{}': {}",
                    label.as_deref().unwrap_or("Unknown"),
                    details
                )
            }
            PipelineError::NotCached { name } => {
                write!(f, "No pipeline state cached under '{name}'")
            }
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Shader(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ShaderError> for PipelineError {
    fn from(err: ShaderError) -> Self {
        PipelineError::Shader(err)
    }
}

/// An error related to the creation or use of a GPU resource (buffers, textures, descriptors).
#[derive(Debug)]
pub enum ResourceError {
    /// A shader-specific error occurred.
    Shader(ShaderError),
    /// A pipeline-specific error occurred.
    Pipeline(PipelineError),
    /// A generic resource could not be found.
    NotFound,
    /// The handle or ID used to reference a resource is invalid.
    InvalidHandle,
    /// An error originating from the specific graphics backend implementation.
    BackendError(String),
    /// An attempt was made to access a resource out of its bounds (e.g., in a buffer).
    OutOfBounds,
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::Shader(err) => write!(f, "Shader resource error: {err}"),
            ResourceError::Pipeline(err) => write!(f, "Pipeline resource error: {err}"),
            ResourceError::NotFound => write!(f, "Resource not found with ID."),
            ResourceError::InvalidHandle => write!(f, "Invalid resource handle or ID."),
            ResourceError::BackendError(msg) => {
                write!(f, "Backend-specific resource error: {msg}")
            }
            ResourceError::OutOfBounds => {
                write!(f, "Resource access out of bounds.")
            }
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResourceError::Shader(err) => Some(err),
            ResourceError::Pipeline(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ShaderError> for ResourceError {
    fn from(err: ShaderError) -> Self {
        ResourceError::Shader(err)
    }
}

impl From<PipelineError> for ResourceError {
    fn from(err: PipelineError) -> Self {
        ResourceError::Pipeline(err)
    }
}

/// A high-level error raised by the device, the submission queue or the frame pacer.
#[derive(Debug)]
pub enum RenderError {
    /// An operation was attempted before the rendering system was initialized.
    NotInitialized,
    /// The renderer settings are out of range.
    InvalidConfiguration(String),
    /// An error occurred while managing a GPU resource.
    ResourceError(ResourceError),
    /// The shader-visible descriptor heap cannot satisfy an allocation.
    DescriptorHeapExhausted {
        /// Number of slots requested.
        requested: u32,
        /// Number of slots still free in the heap.
        available: u32,
    },
    /// A command allocator was reset while the GPU may still read from it.
    AllocatorInUse {
        /// The allocator that was reset.
        allocator: CommandAllocatorId,
        /// The fence value that must complete before the reset is legal.
        pending_fence: FenceValue,
        /// The fence value the GPU has completed so far.
        completed_fence: FenceValue,
    },
    /// A command list was used in a state that does not allow the operation.
    InvalidCommandListState {
        /// The offending command list.
        list: CommandListId,
        /// What went wrong.
        reason: &'static str,
    },
    /// An unexpected or internal error occurred.
    Internal(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::NotInitialized => {
                write!(f, "The rendering system is not initialized.")
            }
            RenderError::InvalidConfiguration(msg) => {
                write!(f, "Invalid renderer configuration: {msg}")
            }
            RenderError::ResourceError(err) => {
                write!(f, "Graphics resource operation failed: {err}")
            }
            RenderError::DescriptorHeapExhausted {
                requested,
                available,
            } => write!(
                f,
                "Descriptor heap exhausted: requested {requested} slots, {available} available"
            ),
            RenderError::AllocatorInUse {
                allocator,
                pending_fence,
                completed_fence,
            } => write!(
                f,
                "Command allocator {allocator:?} reset while in use (needs fence {}, completed {})",
                pending_fence.0, completed_fence.0
            ),
            RenderError::InvalidCommandListState { list, reason } => {
                write!(f, "Invalid state for command list {list:?}: {reason}")
            }
            RenderError::Internal(msg) => {
                write!(f, "An internal or unexpected error occurred: {msg}")
            }
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::ResourceError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for RenderError {
    fn from(err: ResourceError) -> Self {
        RenderError::ResourceError(err)
    }
}

impl From<PipelineError> for RenderError {
    fn from(err: PipelineError) -> Self {
        RenderError::ResourceError(ResourceError::Pipeline(err))
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn shader_error_display() {
        let err = ShaderError::LoadError {
            path: "shaders/color_vs.cso".to_string(),
            source_error: "File not found".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "Failed to load shader blob from 'shaders/color_vs.cso': File not found"
        );
    }

    #[test]
    fn resource_error_display_wrapping_pipeline_error() {
        let pipeline_err: PipelineError = ShaderError::NotFound {
            path: "sky_ps.cso".to_string(),
        }
        .into();
        let res_err: ResourceError = pipeline_err.into();
        assert_eq!(
            format!("{res_err}"),
            "Pipeline resource error: Pipeline shader error: Shader blob not found: 'sky_ps.cso'"
        );
        assert!(res_err.source().is_some());
        assert!(res_err.source().unwrap().source().is_some());
    }

    #[test]
    fn heap_exhaustion_display() {
        let err = RenderError::DescriptorHeapExhausted {
            requested: 40,
            available: 8,
        };
        assert_eq!(
            format!("{err}"),
            "Descriptor heap exhausted: requested 40 slots, 8 available"
        );
        assert!(err.source().is_none());
    }

    #[test]
    fn allocator_in_use_display() {
        let err = RenderError::AllocatorInUse {
            allocator: CommandAllocatorId(7),
            pending_fence: FenceValue(4),
            completed_fence: FenceValue(2),
        };
        assert_eq!(
            format!("{err}"),
            "Command allocator CommandAllocatorId(7) reset while in use (needs fence 4, completed 2)"
        );
    }
}
