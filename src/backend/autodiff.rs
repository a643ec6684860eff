//! Registering the host kernels in the autodiff graph.

pub use super::*;

use crate::preset::backend::Autodiff;
use burn::backend::autodiff::{
    checkpoint::{base::Checkpointer, strategy::NoCheckpointing},
    grads::Gradients,
    ops::{Backward, Ops, OpsKind},
};
use std::marker;

#[derive(Clone, Copy, Debug, Default)]
struct ProjectBackward<B: Backend> {
    __: marker::PhantomData<B>,
}

#[derive(Clone, Copy, Debug, Default)]
struct RasterizeBackward<B: Backend> {
    __: marker::PhantomData<B>,
}

#[derive(Clone, Copy, Debug, Default)]
struct BakeBackward<B: Backend> {
    __: marker::PhantomData<B>,
}

impl<B: MeshRenderBackend> MeshRenderBackend for Autodiff<B> {
    fn project_mesh(input: forward::ProjectInput<Self>) -> FloatTensor<Self> {
        let distortion = input.distortion;
        let intrinsics = input.intrinsics;
        let rotation = input.rotation;
        let translation = input.translation;
        let vertices = input.vertices;

        let output = cpu::project_forward::<B>(forward::ProjectInput {
            arguments: input.arguments,
            device: input.device,
            distortion: distortion.primitive,
            intrinsics: intrinsics.primitive,
            rotation: rotation.primitive,
            translation: translation.primitive,
            vertices: vertices.primitive,
        });

        match ProjectBackward::<B>::default()
            .prepare::<NoCheckpointing>([
                distortion.node,
                intrinsics.node,
                rotation.node,
                translation.node,
                vertices.node,
            ])
            .compute_bound()
            .stateful()
        {
            OpsKind::Tracked(prep) => {
                prep.finish(output.state, output.screen_vertices)
            },
            OpsKind::UnTracked(prep) => prep.finish(output.screen_vertices),
        }
    }

    fn rasterize_mesh(input: forward::RasterizeInput<Self>) -> FloatTensor<Self> {
        let faces = input.faces;
        let textures = input.textures;

        let output = cpu::rasterize_forward::<B>(forward::RasterizeInput {
            arguments: input.arguments,
            background: input.background,
            device: input.device,
            faces: faces.primitive,
            textures: textures.primitive,
        });

        match RasterizeBackward::<B>::default()
            .prepare::<NoCheckpointing>([faces.node, textures.node])
            .compute_bound()
            .stateful()
        {
            OpsKind::Tracked(prep) => prep.finish(output.state, output.images),
            OpsKind::UnTracked(prep) => prep.finish(output.images),
        }
    }

    fn bake_texture(input: forward::BakeInput<Self>) -> FloatTensor<Self> {
        let image = input.image;

        let output = cpu::bake_forward::<B>(forward::BakeInput {
            arguments: input.arguments,
            device: input.device,
            image: image.primitive,
            // The layout is not differentiated.
            uv_layout: input.uv_layout.primitive,
        });

        match BakeBackward::<B>::default()
            .prepare::<NoCheckpointing>([image.node])
            .compute_bound()
            .stateful()
        {
            OpsKind::Tracked(prep) => prep.finish(output.state, output.textures),
            OpsKind::UnTracked(prep) => prep.finish(output.textures),
        }
    }
}

impl<B: Backend> Backward<B, 5> for ProjectBackward<B> {
    type State = backward::ProjectInput<B>;

    fn backward(
        self,
        ops: Ops<Self::State, 5>,
        grads: &mut Gradients,
        _checkpointer: &mut Checkpointer,
    ) {
        #[cfg(debug_assertions)]
        log::debug!(
            target: "softmesh::renderer::mesh::backward",
            "ProjectBackward::backward",
        );

        let screen_vertices_grad = grads.consume::<B>(&ops.node);

        if ops.parents.iter().all(Option::is_none) {
            return;
        }

        let output = cpu::project_backward::<B>(ops.state, screen_vertices_grad);

        if let Some(node) = &ops.parents[0] {
            grads.register::<B>(node.id, output.distortion_grad);
        }
        if let Some(node) = &ops.parents[1] {
            grads.register::<B>(node.id, output.intrinsics_grad);
        }
        if let Some(node) = &ops.parents[2] {
            grads.register::<B>(node.id, output.rotation_grad);
        }
        if let Some(node) = &ops.parents[3] {
            grads.register::<B>(node.id, output.translation_grad);
        }
        if let Some(node) = &ops.parents[4] {
            grads.register::<B>(node.id, output.vertices_grad);
        }
    }
}

impl<B: Backend> Backward<B, 2> for RasterizeBackward<B> {
    type State = backward::RasterizeInput<B>;

    fn backward(
        self,
        ops: Ops<Self::State, 2>,
        grads: &mut Gradients,
        _checkpointer: &mut Checkpointer,
    ) {
        #[cfg(debug_assertions)]
        log::debug!(
            target: "softmesh::renderer::mesh::backward",
            "RasterizeBackward::backward",
        );

        let images_grad = grads.consume::<B>(&ops.node);

        if ops.parents.iter().all(Option::is_none) {
            return;
        }

        let output = cpu::rasterize_backward::<B>(ops.state, images_grad);

        if let Some(node) = &ops.parents[0] {
            grads.register::<B>(node.id, output.faces_grad);
        }
        if let Some(node) = &ops.parents[1] {
            grads.register::<B>(node.id, output.textures_grad);
        }
    }
}

impl<B: Backend> Backward<B, 1> for BakeBackward<B> {
    type State = backward::BakeInput<B>;

    fn backward(
        self,
        ops: Ops<Self::State, 1>,
        grads: &mut Gradients,
        _checkpointer: &mut Checkpointer,
    ) {
        #[cfg(debug_assertions)]
        log::debug!(
            target: "softmesh::renderer::mesh::backward",
            "BakeBackward::backward",
        );

        let textures_grad = grads.consume::<B>(&ops.node);

        if let Some(node) = &ops.parents[0] {
            let output = cpu::bake_backward::<B>(ops.state, textures_grad);
            grads.register::<B>(node.id, output.image_grad);
        }
    }
}
