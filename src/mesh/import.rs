//! Decoding Wavefront OBJ meshes.

pub use super::*;

use burn::tensor::TensorData;
use obj::raw::{object::Polygon, parse_obj};
use std::io::BufRead;

impl<B: Backend> Mesh<B> {
    /// Decoding the vertices, the texture coordinates and the faces of an OBJ.
    ///
    /// Polygons are triangulated as fans. The texture coordinates are kept
    /// only if every face corner has one.
    ///
    /// If `normalize` is set, the vertices are centered and scaled into
    /// `[-1, 1]` along the longest axis.
    pub fn decode_obj<R: BufRead>(
        reader: R,
        normalize: bool,
        device: &B::Device,
    ) -> Result<Self, Error> {
        let raw = parse_obj(reader)?;

        let mut corners = Vec::<[usize; 3]>::new();
        let mut corners_uvs = Vec::<[usize; 3]>::new();
        let mut is_uv_complete = true;

        for (polygon_index, polygon) in raw.polygons.iter().enumerate() {
            // (vertex, uv) per corner
            let polygon: Vec<(usize, Option<usize>)> = match polygon {
                Polygon::P(corners) => {
                    corners.iter().map(|&vertex| (vertex, None)).collect()
                },
                Polygon::PN(corners) => corners
                    .iter()
                    .map(|&(vertex, _)| (vertex, None))
                    .collect(),
                Polygon::PT(corners) => corners
                    .iter()
                    .map(|&(vertex, uv)| (vertex, Some(uv)))
                    .collect(),
                Polygon::PTN(corners) => corners
                    .iter()
                    .map(|&(vertex, uv, _)| (vertex, Some(uv)))
                    .collect(),
            };
            if polygon.len() < 3 {
                return Err(Error::Validation(
                    format!(
                        "The corner count of the polygon {polygon_index} ({})",
                        polygon.len()
                    ),
                    "at least 3".into(),
                ));
            }

            for index in 1..polygon.len() - 1 {
                let triangle = [polygon[0], polygon[index], polygon[index + 1]];
                corners.push(triangle.map(|(vertex, _)| vertex));
                match triangle.map(|(_, uv)| uv) {
                    [Some(a), Some(b), Some(c)] => corners_uvs.push([a, b, c]),
                    _ => is_uv_complete = false,
                }
            }
        }

        let mut vertices = raw
            .positions
            .iter()
            .map(|&(x, y, z, _)| [x, y, z].map(f64::from))
            .collect::<Vec<_>>();
        if normalize {
            normalize_vertices(&mut vertices);
        }
        let uvs = raw
            .tex_coords
            .iter()
            .map(|&(u, v, _)| [u, v].map(f64::from))
            .collect::<Vec<_>>();

        #[cfg(debug_assertions)]
        log::debug!(
            target: "softmesh::mesh::import",
            "decode_obj > vertices ({}), faces ({}), uvs ({})",
            vertices.len(),
            corners.len(),
            is_uv_complete && !corners_uvs.is_empty(),
        );

        let face_count = corners.len();
        let vertex_count = vertices.len();
        let faces = Tensor::<B, 2, Int>::from_data(
            TensorData::new(
                corners
                    .into_iter()
                    .flatten()
                    .map(|index| index as i64)
                    .collect::<Vec<_>>(),
                [face_count, 3],
            )
            .convert::<B::IntElem>(),
            device,
        );
        let vertices = Tensor::from_values(
            vertices.into_iter().flatten().collect(),
            [vertex_count, 3],
            device,
        );
        let mesh = Self::new(vertices, faces)?;

        if !is_uv_complete || face_count == 0 {
            return Ok(mesh);
        }
        if let Some(index) = corners_uvs.iter().flatten().find(|&&i| i >= uvs.len()) {
            return Err(Error::Validation(
                format!("The texture coordinate index ({index})"),
                format!("in [0, {})", uvs.len()),
            ));
        }
        let uvs = Tensor::from_values(
            corners_uvs
                .into_iter()
                .flatten()
                .flat_map(|index| uvs[index])
                .collect(),
            [face_count, 3, 2],
            device,
        );
        mesh.with_uvs(uvs)
    }
}

fn normalize_vertices(vertices: &mut [[f64; 3]]) {
    let Some(first) = vertices.first().copied() else {
        return;
    };
    let (min, max) =
        vertices.iter().fold((first, first), |(mut min, mut max), vertex| {
            for axis in 0..3 {
                min[axis] = min[axis].min(vertex[axis]);
                max[axis] = max[axis].max(vertex[axis]);
            }
            (min, max)
        });
    let center = [0, 1, 2].map(|axis| (min[axis] + max[axis]) / 2.0);
    let extent = (0..3)
        .map(|axis| (max[axis] - min[axis]) / 2.0)
        .fold(0.0_f64, f64::max);
    let scale = if extent > 0.0 { extent.recip() } else { 1.0 };

    for vertex in vertices.iter_mut() {
        for axis in 0..3 {
            vertex[axis] = (vertex[axis] - center[axis]) * scale;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preset::backend::NdArray;

    const SQUARE: &str = "\
# a unit square
v 0 0 0
v 2 0 0
v 2 2 0
v 0 2 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
f 1/1 2/2 3/3 4/4
";

    #[test]
    fn polygons_are_fan_triangulated() {
        let mesh = Mesh::<NdArray>::decode_obj(
            SQUARE.as_bytes(),
            false,
            &Default::default(),
        )
        .unwrap();

        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.face_count(), 2);
        assert_eq!(
            mesh.faces.to_owned().into_data().iter::<i64>().collect::<Vec<_>>(),
            [0, 1, 2, 0, 2, 3]
        );
        let uvs = mesh.uvs.unwrap().into_values();
        assert_eq!(&uvs[6..], [0.0, 0.0, 1.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn normalized_vertices_fit_unit_box() {
        let mesh = Mesh::<NdArray>::decode_obj(
            SQUARE.as_bytes(),
            true,
            &Default::default(),
        )
        .unwrap();

        let vertices = mesh.vertices.into_values();
        assert_eq!(&vertices[..3], [-1.0, -1.0, 0.0]);
        assert_eq!(&vertices[6..9], [1.0, 1.0, 0.0]);
    }

    #[test]
    fn faces_without_uvs_drop_uvs() {
        let source = "v 0 0 0\nv 1 0 0\nv 0 1 0\nv 1 1 0\nvt 0 0\nvt 1 0\nvt 0 1\n\
            f 1/1 2/2 3/3\nf 2 4 3\n";
        let mesh = Mesh::<NdArray>::decode_obj(
            source.as_bytes(),
            false,
            &Default::default(),
        )
        .unwrap();

        assert!(mesh.uvs.is_none());
        assert_eq!(mesh.face_count(), 2);
    }

    #[test]
    fn malformed_sources_are_rejected() {
        let device = Default::default();

        let source = "v 0 0 0\nv 1 x 0\n";
        let result = Mesh::<NdArray>::decode_obj(source.as_bytes(), false, &device);
        assert!(matches!(result, Err(Error::Obj(_))), "{result:?}");

        let source = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 4\n";
        let result = Mesh::<NdArray>::decode_obj(source.as_bytes(), false, &device);
        assert!(result.is_err(), "{result:?}");
    }
}
