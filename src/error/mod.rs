#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("OBJ error: {0}")]
    Obj(#[from] obj::ObjError),

    #[error("Shape mismatch: {0} should be {1}")]
    ShapeMismatch(String, String),

    #[error("Validation error: {0} should be {1}")]
    Validation(String, String),
}
