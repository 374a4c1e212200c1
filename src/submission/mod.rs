pub mod draft;
pub mod session;
pub mod types;

pub use draft::ListingDraft;
pub use session::SubmissionSession;
pub use types::{ImageFile, ImageStatus};
