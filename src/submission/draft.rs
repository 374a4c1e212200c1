use serde::Serialize;

use crate::error::ValidationError;
use crate::models::{Category, Condition, Coordinates, ListingMode, ListingStatus, Size};

/// Form fields of a listing being created
#[derive(Debug, Clone)]
pub struct ListingDraft {
    pub owner_id: String,
    pub title: String,
    pub description: String,
    pub category: Option<Category>,
    pub size: Option<Size>,
    pub condition: Option<Condition>,
    pub mode: ListingMode,
    pub price_per_day: f64,
    pub sell_price: Option<f64>,
    pub deposit_amount: Option<f64>,
    pub location: String,
    pub coordinates: Option<Coordinates>,
    pub shipping_available: bool,
}

impl ListingDraft {
    pub fn new(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            title: String::new(),
            description: String::new(),
            category: None,
            size: None,
            condition: None,
            mode: ListingMode::Rent,
            price_per_day: 0.0,
            sell_price: None,
            deposit_amount: None,
            location: String::new(),
            coordinates: None,
            shipping_available: true,
        }
    }

    pub fn check_required(&self) -> Result<(), ValidationError> {
        if self.owner_id.trim().is_empty() {
            return Err(ValidationError::MissingField("owner"));
        }
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingField("title"));
        }
        if self.description.trim().is_empty() {
            return Err(ValidationError::MissingField("description"));
        }
        if self.category.is_none() {
            return Err(ValidationError::MissingField("category"));
        }
        if self.condition.is_none() {
            return Err(ValidationError::MissingField("condition"));
        }
        self.check_price()?;
        if self.location.trim().is_empty() {
            return Err(ValidationError::MissingLocation);
        }
        Ok(())
    }

    /// Buy and borrow listings need a positive amount, otherwise they would read back as rentals
    pub fn check_price(&self) -> Result<(), ValidationError> {
        let positive = |amount: Option<f64>| amount.is_some_and(|a| a > 0.0);
        match self.mode {
            ListingMode::Rent => Ok(()),
            ListingMode::Buy if !positive(self.sell_price) => Err(ValidationError::InvalidPrice("sale price")),
            ListingMode::Borrow if !positive(self.deposit_amount) => {
                Err(ValidationError::InvalidPrice("deposit"))
            }
            _ => Ok(()),
        }
    }

    /// Row for the `listings` insert
    pub fn to_record(&self, is_modest: bool) -> NewListing<'_> {
        let (price_per_day, sell_price, deposit_amount) = match self.mode {
            ListingMode::Rent => (self.price_per_day, None, None),
            ListingMode::Buy => (self.sell_price.unwrap_or(0.0), self.sell_price, None),
            ListingMode::Borrow => (0.0, None, self.deposit_amount),
        };

        NewListing {
            owner_id: &self.owner_id,
            title: self.title.trim(),
            description: self.description.trim(),
            category: self.category,
            size: self.size,
            condition: self.condition,
            price_per_day,
            sell_price,
            deposit_amount,
            location: self.location.trim(),
            latitude: self.coordinates.map(|c| c.latitude),
            longitude: self.coordinates.map(|c| c.longitude),
            shipping_available: self.shipping_available,
            is_modest,
            status: ListingStatus::Active,
            is_approved: true,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NewListing<'a> {
    pub owner_id: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub category: Option<Category>,
    pub size: Option<Size>,
    pub condition: Option<Condition>,
    pub price_per_day: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sell_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deposit_amount: Option<f64>,
    pub location: &'a str,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub shipping_available: bool,
    pub is_modest: bool,
    pub status: ListingStatus,
    pub is_approved: bool,
}

#[derive(Debug, Serialize)]
pub struct NewListingImage<'a> {
    pub listing_id: &'a str,
    pub image_url: &'a str,
    pub display_order: i32,
}

#[cfg(test)]
pub(crate) fn complete_draft() -> ListingDraft {
    ListingDraft {
        title: "Navy chiffon abaya".into(),
        description: "Worn once for Eid".into(),
        category: Some(Category::Abaya),
        condition: Some(Condition::LikeNew),
        size: Some(Size::Medium),
        price_per_day: 12.0,
        location: "Mississauga, ON".into(),
        coordinates: Some(Coordinates::new(43.589, -79.6441)),
        ..ListingDraft::new("owner-1")
    }
}
