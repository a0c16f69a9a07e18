pub use crate::openai::images::types::ImagesResponse as CreateImageResponse;
pub use crate::openai::images::types::ImagesResponse as CreateImageEditResponse;
