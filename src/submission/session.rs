use std::sync::Arc;

use futures::future::{join_all, BoxFuture, FutureExt};
use tracing::{debug, error, info, warn};

use crate::error::{StoreError, SubmissionError, ValidationError};
use crate::models::{Listing, ListingImage};
use crate::moderation::{ImageAnalysis, ImageClassifier};
use crate::store::{ContentStore, RemoteStore, RemoteStoreExt, LISTINGS, LISTING_IMAGES};
use crate::submission::draft::{ListingDraft, NewListingImage};
use crate::submission::types::{
    CandidateImage, ImageFile, ImageId, ImageStatus, SessionState, SubmittedListing, MAX_IMAGES,
};

pub const DEFAULT_BUCKET: &str = "listing-images";

/// One listing-creation session: images go through moderation, then the
/// listing and its photos are persisted.
pub struct SubmissionSession {
    draft: ListingDraft,
    images: Vec<CandidateImage>,
    state: SessionState,
    classifier: Arc<dyn ImageClassifier>,
    store: Arc<dyn RemoteStore>,
    content: Arc<dyn ContentStore>,
    bucket: String,
}

impl SubmissionSession {
    pub fn new(
        draft: ListingDraft,
        classifier: Arc<dyn ImageClassifier>,
        store: Arc<dyn RemoteStore>,
        content: Arc<dyn ContentStore>,
    ) -> Self {
        Self {
            draft,
            images: Vec::new(),
            state: SessionState::Collecting,
            classifier,
            store,
            content,
            bucket: DEFAULT_BUCKET.to_string(),
        }
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    pub fn draft(&self) -> &ListingDraft {
        &self.draft
    }

    pub fn images(&self) -> &[CandidateImage] {
        &self.images
    }

    pub fn image(&self, id: ImageId) -> Option<&CandidateImage> {
        self.images.iter().find(|img| img.id == id)
    }

    pub fn state(&self) -> SessionState {
        match self.state {
            SessionState::Collecting | SessionState::Submittable => {
                if self.validate().is_ok() {
                    SessionState::Submittable
                } else {
                    SessionState::Collecting
                }
            }
            other => other,
        }
    }

    /// Attach images as `Pending`. Files beyond the free slots are dropped.
    pub fn attach(&mut self, files: Vec<ImageFile>) -> Result<Vec<ImageId>, ValidationError> {
        let free = MAX_IMAGES.saturating_sub(self.images.len());
        if free == 0 && !files.is_empty() {
            return Err(ValidationError::TooManyImages { max: MAX_IMAGES });
        }
        if files.len() > free {
            warn!(
                offered = files.len(),
                accepted = free,
                "Image limit reached, extra files ignored"
            );
        }

        let ids = files
            .into_iter()
            .take(free)
            .map(|file| {
                let id = ImageId::new();
                debug!(image = %id, file = %file.file_name, "Image attached");
                self.images.push(CandidateImage {
                    id,
                    file,
                    status: ImageStatus::Pending,
                });
                id
            })
            .collect();
        Ok(ids)
    }

    /// Start classifying `ids` concurrently.
    ///
    /// The returned future owns everything it needs, so the session can keep
    /// changing while it runs. Feed its output to [`Self::record_analyses`].
    pub fn dispatch_analysis(&self, ids: &[ImageId]) -> BoxFuture<'static, Vec<(ImageId, ImageAnalysis)>> {
        let jobs: Vec<_> = ids
            .iter()
            .filter_map(|id| self.image(*id))
            .map(|img| (img.id, img.file.to_input()))
            .collect();
        let classifier = Arc::clone(&self.classifier);

        async move {
            let analyses = join_all(jobs.iter().map(|(_, input)| classifier.classify(input))).await;
            jobs.into_iter().map(|(id, _)| id).zip(analyses).collect()
        }
        .boxed()
    }

    /// Apply finished analyses by image id. Results for removed images are dropped.
    ///
    /// Returns how many results were applied.
    pub fn record_analyses(&mut self, results: Vec<(ImageId, ImageAnalysis)>) -> usize {
        let mut applied = 0;
        for (id, analysis) in results {
            let Some(image) = self.images.iter_mut().find(|img| img.id == id) else {
                debug!(image = %id, "Discarding analysis for removed image");
                continue;
            };

            info!(
                image = %id,
                approved = analysis.is_approved,
                reason = %analysis.reason,
                "Moderation verdict"
            );
            if self.draft.category.is_none() && analysis.is_approved {
                if let Some(category) = analysis.suggested_category() {
                    debug!(%category, "Category suggested from image");
                    self.draft.category = Some(category);
                }
            }
            image.status = ImageStatus::from_analysis(analysis);
            applied += 1;
        }
        applied
    }

    /// Attach and classify in one go
    pub async fn attach_and_analyze(&mut self, files: Vec<ImageFile>) -> Result<Vec<ImageId>, ValidationError> {
        let ids = self.attach(files)?;
        let results = self.dispatch_analysis(&ids).await;
        self.record_analyses(results);
        Ok(ids)
    }

    /// Drop an image from the session. No other image is re-analyzed.
    pub fn remove_image(&mut self, id: ImageId) -> bool {
        let before = self.images.len();
        self.images.retain(|img| img.id != id);
        self.images.len() != before
    }

    /// Check everything that must hold before any network call
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.state == SessionState::Complete {
            return Err(ValidationError::AlreadySubmitted);
        }

        let pending = self.images.iter().filter(|img| img.status.is_pending()).count();
        if pending > 0 {
            return Err(ValidationError::ImagesPending { count: pending });
        }

        let rejected: Vec<String> = self
            .images
            .iter()
            .filter(|img| !img.status.is_approved())
            .map(|img| img.id.to_string())
            .collect();
        if !rejected.is_empty() {
            return Err(ValidationError::ImagesRejected { ids: rejected });
        }

        if self.images.is_empty() {
            return Err(ValidationError::NoImages);
        }

        self.draft.check_required()
    }

    /// Persist the listing, then upload and link every image.
    ///
    /// A failed upload or link is logged and skipped; the listing stays.
    pub async fn submit(&mut self) -> Result<SubmittedListing, SubmissionError> {
        self.validate()?;

        self.state = SessionState::Persisting;
        let is_modest = self
            .images
            .iter()
            .all(|img| img.status.analysis().is_some_and(|a| a.is_modest));
        let record = self.draft.to_record(is_modest);

        let listing: Listing = match self.store.insert_as(LISTINGS, &record).await {
            Ok(listing) => listing,
            Err(e) => {
                error!(error = %e, hint = ?e.hint(), "Listing creation failed");
                self.state = SessionState::Failed;
                return Err(e.into());
            }
        };
        info!(listing_id = %listing.id, images = self.images.len(), "Listing created");

        self.state = SessionState::UploadingImages;
        let outcomes = join_all(
            self.images
                .iter()
                .enumerate()
                .map(|(index, image)| self.upload_and_link(&listing.id, index, image)),
        )
        .await;

        let mut images = Vec::new();
        let mut skipped = Vec::new();
        for (image, outcome) in self.images.iter().zip(outcomes) {
            match outcome {
                Ok(linked) => images.push(linked),
                Err(_) => skipped.push(image.id),
            }
        }

        self.state = SessionState::Complete;
        info!(
            listing_id = %listing.id,
            linked = images.len(),
            skipped = skipped.len(),
            "Listing submitted"
        );

        Ok(SubmittedListing {
            listing,
            images,
            skipped,
        })
    }

    async fn upload_and_link(
        &self,
        listing_id: &str,
        index: usize,
        image: &CandidateImage,
    ) -> Result<ListingImage, StoreError> {
        let path = format!("{}/{}.{}", listing_id, index, image.file.extension());

        let result = async {
            self.content
                .upload(&self.bucket, &path, image.file.bytes.clone(), &image.file.content_type)
                .await?;
            let url = self.content.public_url(&self.bucket, &path);

            self.store
                .insert_as::<_, ListingImage>(
                    LISTING_IMAGES,
                    &NewListingImage {
                        listing_id,
                        image_url: &url,
                        display_order: index as i32,
                    },
                )
                .await
        }
        .await;

        if let Err(e) = &result {
            warn!(listing_id, index, path = %path, error = %e, "Skipping image");
        }
        result
    }
}
