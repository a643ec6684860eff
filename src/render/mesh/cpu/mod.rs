//! The host implementation of the mesh renderer.
//!
//! The tensors are read to the host in `f64`, processed by the [`kernel`]s
//! and written back to the device of the input.

pub mod kernel;

pub use super::{backward, forward};

use crate::function::{from_values, into_values};
use burn::tensor::backend::Backend;

#[cfg(debug_assertions)]
fn size_readable(values: &[f64]) -> String {
    use humansize::{format_size, BINARY};

    format_size(std::mem::size_of_val(values), BINARY.decimal_places(1))
}

pub fn project_forward<B: Backend>(
    input: forward::ProjectInput<B>
) -> forward::ProjectOutput<B> {
    #[cfg(debug_assertions)]
    log::debug!(target: "softmesh::renderer::mesh::forward", "project > start");

    let arguments = input.arguments;
    // B
    let batch_size = arguments.batch_size as usize;
    // N
    let vertex_count = arguments.vertex_count as usize;

    let distortion = into_values::<B, 2>(input.distortion);
    let intrinsics = into_values::<B, 3>(input.intrinsics);
    let rotation = into_values::<B, 3>(input.rotation);
    let translation = into_values::<B, 3>(input.translation);
    let vertices = into_values::<B, 3>(input.vertices);

    let outputs = kernel::project::main(
        arguments,
        kernel::project::Inputs {
            distortion: &distortion,
            intrinsics: &intrinsics,
            rotation: &rotation,
            translation: &translation,
            vertices: &vertices,
        },
    );
    #[cfg(debug_assertions)]
    log::debug!(
        target: "softmesh::renderer::mesh::forward",
        "project > screen_vertices ({})",
        size_readable(&outputs.screen_vertices),
    );

    forward::ProjectOutput {
        screen_vertices: from_values::<B, 3>(
            outputs.screen_vertices,
            [batch_size, vertex_count, 3],
            &input.device,
        ),
        state: backward::ProjectInput {
            arguments,
            device: input.device,
            distortion,
            intrinsics,
            rotation,
            translation,
            vertices,
        },
    }
}

/// ## Arguments
///
/// * `screen_vertices_grad` - `[B, N, 3]`
pub fn project_backward<B: Backend>(
    state: backward::ProjectInput<B>,
    screen_vertices_grad: B::FloatTensorPrimitive,
) -> backward::ProjectOutput<B> {
    #[cfg(debug_assertions)]
    log::debug!(target: "softmesh::renderer::mesh::backward", "project > start");

    let arguments = state.arguments;
    // B
    let batch_size = arguments.batch_size as usize;
    // N
    let vertex_count = arguments.vertex_count as usize;
    let device = &state.device;

    let screen_vertices_grad = into_values::<B, 3>(screen_vertices_grad);
    let outputs = kernel::project_backward::main(
        arguments,
        kernel::project::Inputs {
            distortion: &state.distortion,
            intrinsics: &state.intrinsics,
            rotation: &state.rotation,
            translation: &state.translation,
            vertices: &state.vertices,
        },
        &screen_vertices_grad,
    );

    backward::ProjectOutput {
        distortion_grad: from_values::<B, 2>(
            outputs.distortion_grad,
            [batch_size, 5],
            device,
        ),
        intrinsics_grad: from_values::<B, 3>(
            outputs.intrinsics_grad,
            [batch_size, 3, 3],
            device,
        ),
        rotation_grad: from_values::<B, 3>(
            outputs.rotation_grad,
            [batch_size, 3, 3],
            device,
        ),
        translation_grad: from_values::<B, 3>(
            outputs.translation_grad,
            [batch_size, 1, 3],
            device,
        ),
        vertices_grad: from_values::<B, 3>(
            outputs.vertices_grad,
            [batch_size, vertex_count, 3],
            device,
        ),
    }
}

pub fn rasterize_forward<B: Backend>(
    input: forward::RasterizeInput<B>
) -> forward::RasterizeOutput<B> {
    #[cfg(debug_assertions)]
    log::debug!(target: "softmesh::renderer::mesh::forward", "rasterize > start");

    let arguments = input.arguments;
    // B
    let batch_size = arguments.batch_size as usize;
    // C
    let channel_count = arguments.channel_count as usize;
    // I_x
    let image_size_x = arguments.image_size_x as usize;
    // I_y
    let image_size_y = arguments.image_size_y as usize;

    let faces = into_values::<B, 4>(input.faces);
    let textures = into_values::<B, 4>(input.textures);
    #[cfg(debug_assertions)]
    log::debug!(
        target: "softmesh::renderer::mesh::forward",
        "rasterize > faces ({}) > textures ({})",
        size_readable(&faces),
        size_readable(&textures),
    );

    let outputs = kernel::rasterize::main(
        arguments,
        kernel::rasterize::Inputs {
            background: &input.background,
            faces: &faces,
            textures: &textures,
        },
    );
    #[cfg(debug_assertions)]
    log::debug!(
        target: "softmesh::renderer::mesh::forward",
        "rasterize > images ({})",
        size_readable(&outputs.images),
    );

    forward::RasterizeOutput {
        images: from_values::<B, 4>(
            outputs.images.to_owned(),
            [batch_size, image_size_y, image_size_x, channel_count + 2],
            &input.device,
        ),
        state: backward::RasterizeInput {
            arguments,
            background: input.background,
            depth_maxima: outputs.depth_maxima,
            device: input.device,
            faces,
            images: outputs.images,
            normalizers: outputs.normalizers,
            textures,
        },
    }
}

/// ## Arguments
///
/// * `images_grad` - `[B, I_y, I_x, C + 2]`
pub fn rasterize_backward<B: Backend>(
    state: backward::RasterizeInput<B>,
    images_grad: B::FloatTensorPrimitive,
) -> backward::RasterizeOutput<B> {
    #[cfg(debug_assertions)]
    log::debug!(target: "softmesh::renderer::mesh::backward", "rasterize > start");

    let arguments = state.arguments;
    // B
    let batch_size = arguments.batch_size as usize;
    // C
    let channel_count = arguments.channel_count as usize;
    // F
    let face_count = arguments.face_count as usize;
    // T³
    let texel_count = (arguments.texture_size as usize).pow(3);

    let images_grad = into_values::<B, 4>(images_grad);
    let outputs = kernel::rasterize_backward::main(
        arguments,
        kernel::rasterize::Inputs {
            background: &state.background,
            faces: &state.faces,
            textures: &state.textures,
        },
        kernel::rasterize_backward::ForwardOutputs {
            depth_maxima: &state.depth_maxima,
            images: &state.images,
            normalizers: &state.normalizers,
        },
        &images_grad,
    );
    #[cfg(debug_assertions)]
    log::debug!(
        target: "softmesh::renderer::mesh::backward",
        "rasterize > faces_grad ({}) > textures_grad ({})",
        size_readable(&outputs.faces_grad),
        size_readable(&outputs.textures_grad),
    );

    backward::RasterizeOutput {
        faces_grad: from_values::<B, 4>(
            outputs.faces_grad,
            [batch_size, face_count, 3, 3],
            &state.device,
        ),
        textures_grad: from_values::<B, 4>(
            outputs.textures_grad,
            [batch_size, face_count, texel_count, channel_count],
            &state.device,
        ),
    }
}

pub fn bake_forward<B: Backend>(input: forward::BakeInput<B>) -> forward::BakeOutput<B> {
    #[cfg(debug_assertions)]
    log::debug!(target: "softmesh::renderer::mesh::forward", "bake > start");

    let arguments = input.arguments;
    // C
    let channel_count = arguments.channel_count as usize;
    // F
    let face_count = arguments.face_count as usize;
    // T³
    let texel_count = (arguments.texture_size as usize).pow(3);

    let image = into_values::<B, 3>(input.image);
    let uv_layout = into_values::<B, 3>(input.uv_layout);

    let outputs = kernel::bake::main(
        arguments,
        kernel::bake::Inputs {
            image: &image,
            uv_layout: &uv_layout,
        },
    );
    #[cfg(debug_assertions)]
    log::debug!(
        target: "softmesh::renderer::mesh::forward",
        "bake > textures ({})",
        size_readable(&outputs.textures),
    );

    forward::BakeOutput {
        textures: from_values::<B, 3>(
            outputs.textures,
            [face_count, texel_count, channel_count],
            &input.device,
        ),
        state: backward::BakeInput {
            arguments,
            device: input.device,
            uv_layout,
        },
    }
}

/// ## Arguments
///
/// * `textures_grad` - `[F, T³, C]`
pub fn bake_backward<B: Backend>(
    state: backward::BakeInput<B>,
    textures_grad: B::FloatTensorPrimitive,
) -> backward::BakeOutput<B> {
    #[cfg(debug_assertions)]
    log::debug!(target: "softmesh::renderer::mesh::backward", "bake > start");

    let arguments = state.arguments;
    // C
    let channel_count = arguments.channel_count as usize;

    let textures_grad = into_values::<B, 3>(textures_grad);
    let outputs =
        kernel::bake_backward::main(arguments, &state.uv_layout, &textures_grad);

    backward::BakeOutput {
        image_grad: from_values::<B, 3>(
            outputs.image_grad,
            [
                arguments.image_size_y as usize,
                arguments.image_size_x as usize,
                channel_count,
            ],
            &state.device,
        ),
    }
}
