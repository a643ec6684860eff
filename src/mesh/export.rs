//! Encoding Wavefront OBJ meshes.

pub use super::*;

use std::io::Write;

impl<B: Backend> Mesh<B> {
    /// Encoding the mesh as an OBJ with one-based indices.
    ///
    /// The texture coordinates are written per face corner.
    pub fn encode_obj<W: Write>(
        &self,
        writer: &mut W,
    ) -> Result<(), Error> {
        let vertices = self.vertices.to_owned().into_values();
        let faces = self
            .faces
            .to_owned()
            .into_data()
            .iter::<i64>()
            .collect::<Vec<_>>();
        let uvs = self.uvs.to_owned().map(|uvs| uvs.into_values());

        for vertex in vertices.chunks_exact(3) {
            writeln!(writer, "v {} {} {}", vertex[0], vertex[1], vertex[2])?;
        }
        if let Some(uvs) = &uvs {
            for uv in uvs.chunks_exact(2) {
                writeln!(writer, "vt {} {}", uv[0], uv[1])?;
            }
        }
        for (face_index, face) in faces.chunks_exact(3).enumerate() {
            match uvs {
                Some(_) => {
                    let uv = face_index * 3 + 1;
                    writeln!(
                        writer,
                        "f {}/{} {}/{} {}/{}",
                        face[0] + 1,
                        uv,
                        face[1] + 1,
                        uv + 1,
                        face[2] + 1,
                        uv + 2,
                    )?;
                },
                None => writeln!(
                    writer,
                    "f {} {} {}",
                    face[0] + 1,
                    face[1] + 1,
                    face[2] + 1
                )?,
            }
        }

        #[cfg(debug_assertions)]
        log::debug!(
            target: "softmesh::mesh::export",
            "encode_obj > size ({})",
            self.size_readable(),
        );

        Ok(())
    }
}
