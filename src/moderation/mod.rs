pub mod analysis;
pub mod oracle;
pub mod policy;

pub use analysis::ImageAnalysis;
pub use oracle::{GeminiClassifier, ImageClassifier, ImageInput, GEMINI_BASE_URL};
