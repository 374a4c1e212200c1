use std::fmt;
use std::path::Path;

use bytes::Bytes;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{Listing, ListingImage};
use crate::moderation::{ImageAnalysis, ImageInput};

/// Most photos one listing may carry
pub const MAX_IMAGES: usize = 6;

/// Stable handle for an attached image, assigned at attach time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ImageId(Uuid);

impl ImageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ImageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Photo picked by the seller
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub file_name: String,
    pub bytes: Bytes,
    pub content_type: String,
}

impl ImageFile {
    /// Content type is guessed from the file name
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let file_name = file_name.into();
        let content_type = mime_guess::from_path(&file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self {
            file_name,
            bytes: bytes.into(),
            content_type,
        }
    }

    /// Lowercased extension, `jpg` when the name has none
    pub fn extension(&self) -> String {
        Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
            .map(str::to_lowercase)
            .unwrap_or_else(|| "jpg".to_string())
    }

    pub fn to_input(&self) -> ImageInput {
        let mime_type = if self.content_type.starts_with("image/") {
            self.content_type.clone()
        } else {
            "image/jpeg".to_string()
        };
        ImageInput {
            bytes: self.bytes.clone(),
            mime_type,
        }
    }
}

/// Moderation state of one attached image
#[derive(Debug, Clone, PartialEq)]
pub enum ImageStatus {
    Pending,
    Approved(ImageAnalysis),
    Rejected(ImageAnalysis),
}

impl ImageStatus {
    pub fn from_analysis(analysis: ImageAnalysis) -> Self {
        if analysis.is_approved {
            ImageStatus::Approved(analysis)
        } else {
            ImageStatus::Rejected(analysis)
        }
    }

    pub fn analysis(&self) -> Option<&ImageAnalysis> {
        match self {
            ImageStatus::Pending => None,
            ImageStatus::Approved(a) | ImageStatus::Rejected(a) => Some(a),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ImageStatus::Pending)
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, ImageStatus::Approved(_))
    }
}

#[derive(Debug, Clone)]
pub struct CandidateImage {
    pub id: ImageId,
    pub file: ImageFile,
    pub status: ImageStatus,
}

/// Where a listing-creation session stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Collecting,
    Submittable,
    Persisting,
    UploadingImages,
    Complete,
    Failed,
}

/// Result of a successful submission
#[derive(Debug, Clone)]
pub struct SubmittedListing {
    pub listing: Listing,
    /// Image records that were uploaded and linked, in display order
    pub images: Vec<ListingImage>,
    /// Images whose upload or link step failed and were skipped
    pub skipped: Vec<ImageId>,
}
