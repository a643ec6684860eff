#![allow(clippy::excessive_precision)]
#![allow(missing_docs)]

pub mod backend;
pub mod camera;
pub mod error;
pub mod function;
pub mod mesh;
pub mod preset;
pub mod render;
pub mod texture;

pub use camera::Camera;
pub use error::Error;
pub use mesh::Mesh;
pub use render::mesh::{MeshRenderOptions, MeshRenderOutput, MeshRenderer};
pub use texture::TextureGrid;
