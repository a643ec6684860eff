//! Building the extrinsics from a viewpoint.

pub use super::*;

/// The extrinsics of one camera, `p' = p * R^T + t`.
///
/// The camera looks at `+z`, with `+x` to the right and `+y` downwards.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    pub rotation: [[f64; 3]; 3],
    pub translation: [f64; 3],
}

impl Pose {
    /// Returns the rotation `[1, 3, 3]` and the translation `[1, 1, 3]`.
    pub fn into_tensors<B: Backend>(
        self,
        device: &B::Device,
    ) -> (Tensor<B, 3>, Tensor<B, 3>) {
        let rotation = Tensor::from_values(
            self.rotation.concat(),
            [1, 3, 3],
            device,
        );
        let translation =
            Tensor::from_values(self.translation.to_vec(), [1, 1, 3], device);
        (rotation, translation)
    }
}

/// Placing the camera at `eye`, looking at `target`, with `up` at the top
/// of the image.
pub fn look_at(
    eye: [f64; 3],
    target: [f64; 3],
    up: [f64; 3],
) -> Result<Pose, Error> {
    look(eye, sub(target, eye), up)
}

/// Placing the camera at `eye`, looking along `direction`, with `up` at the
/// top of the image.
pub fn look(
    eye: [f64; 3],
    direction: [f64; 3],
    up: [f64; 3],
) -> Result<Pose, Error> {
    let axis_z = normalize(direction).ok_or_else(|| {
        Error::Validation(
            format!("The viewing direction ({direction:?})"),
            "non-zero".into(),
        )
    })?;
    let axis_x = normalize(cross(axis_z, up)).ok_or_else(|| {
        Error::Validation(
            format!("The up vector ({up:?})"),
            format!("non-zero and not parallel to the viewing direction ({direction:?})"),
        )
    })?;
    let axis_y = cross(axis_z, axis_x);

    let rotation = [axis_x, axis_y, axis_z];
    // t = -R * eye
    let translation = rotation.map(|row| -dot(row, eye));

    Ok(Pose {
        rotation,
        translation,
    })
}

#[inline]
fn cross(
    a: [f64; 3],
    b: [f64; 3],
) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
fn dot(
    a: [f64; 3],
    b: [f64; 3],
) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
fn sub(
    a: [f64; 3],
    b: [f64; 3],
) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn normalize(a: [f64; 3]) -> Option<[f64; 3]> {
    let norm = dot(a, a).sqrt();
    (norm.is_finite() && norm > 1e-12).then(|| a.map(|v| v / norm))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn look_at_the_origin() {
        let pose = look_at([0.0, 0.0, -5.0], [0.0; 3], [0.0, 1.0, 0.0]).unwrap();

        assert_eq!(
            pose.rotation,
            [[-1.0, 0.0, 0.0], [0.0, -1.0, 0.0], [0.0, 0.0, 1.0]]
        );
        assert_eq!(pose.translation, [0.0, 0.0, 5.0]);
    }

    #[test]
    fn rotation_is_orthonormal() {
        let pose = look([1.0, 2.0, 3.0], [-0.3, 0.5, 0.8], [0.1, 0.9, 0.2]).unwrap();
        let r = pose.rotation;

        (0..3).for_each(|i| {
            (0..3).for_each(|j| {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((dot(r[i], r[j]) - expected).abs() < 1e-12);
            });
        });
        // det(R) = 1
        assert!((dot(cross(r[0], r[1]), r[2]) - 1.0).abs() < 1e-12);
        // The eye is at the origin of the view
        let eye_view = r.map(|row| dot(row, [1.0, 2.0, 3.0]));
        (0..3).for_each(|i| {
            assert!((eye_view[i] + pose.translation[i]).abs() < 1e-12);
        });
    }

    #[test]
    fn degenerate_directions_are_rejected() {
        let pose = look_at([1.0; 3], [1.0; 3], [0.0, 1.0, 0.0]);
        assert!(matches!(pose, Err(Error::Validation(_, _))));

        let pose = look([0.0; 3], [0.0, 2.0, 0.0], [0.0, 1.0, 0.0]);
        assert!(matches!(pose, Err(Error::Validation(_, _))));
    }
}
