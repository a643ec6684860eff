/// `θ`, the minimum coverage of a fragment.
pub const COVERAGE_THRESHOLD: f64 = 1e-4;
pub const DEPTH_FAR: f64 = 100.0;
pub const DEPTH_NEAR: f64 = 0.1;
/// `γ`
pub const DEPTH_SOFTNESS: f64 = 1e-4;
pub const IMAGE_SIZE: u32 = 256;
/// `ε`, added to the depth before the perspective division.
pub const PROJECTION_EPSILON: f64 = 1e-9;
/// `σ`, in inverse pixels.
pub const SHARPNESS: f64 = 2.0;
/// `T`
pub const TEXTURE_SIZE: u32 = 4;
