//! Rental cost quotes.
//!
//! A rental is charged per calendar day, both ends included. The renter pays
//! the subtotal, the listing's deposit, an optional flat cleaning fee and a 5%
//! service fee on the subtotal.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::error::ValidationError;
use crate::models::{Listing, ListingMode};

pub const DEFAULT_MIN_RENTAL_DAYS: u32 = 1;
pub const DEFAULT_MAX_RENTAL_DAYS: u32 = 30;

/// 5% of the subtotal
fn service_fee_rate() -> Decimal {
    Decimal::new(5, 2)
}

/// Inclusive date range of a rental
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RentalPeriod {
    start: NaiveDate,
    end: NaiveDate,
}

impl RentalPeriod {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ValidationError> {
        if end < start {
            return Err(ValidationError::InvalidRentalPeriod);
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of days charged. A same-day rental is one day.
    pub fn days(&self) -> u32 {
        (self.end - self.start).num_days() as u32 + 1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RentalCostBreakdown {
    pub daily_rate: Decimal,
    pub total_days: u32,
    pub subtotal: Decimal,
    pub deposit_amount: Decimal,
    pub cleaning_fee: Decimal,
    pub service_fee: Decimal,
    pub total_amount: Decimal,
}

pub fn calculate_rental_cost(
    daily_rate: Decimal,
    deposit_amount: Decimal,
    period: &RentalPeriod,
    cleaning_fee: Option<Decimal>,
) -> RentalCostBreakdown {
    let total_days = period.days();
    let subtotal = daily_rate * Decimal::from(total_days);
    let cleaning_fee = cleaning_fee.unwrap_or(Decimal::ZERO);
    let service_fee = (subtotal * service_fee_rate()).round_dp(2);

    RentalCostBreakdown {
        daily_rate,
        total_days,
        subtotal,
        deposit_amount,
        cleaning_fee,
        service_fee,
        total_amount: subtotal + deposit_amount + cleaning_fee + service_fee,
    }
}

/// What a renter asks for
#[derive(Debug, Clone)]
pub struct RentalRequest {
    pub renter_id: String,
    pub period: RentalPeriod,
    pub add_cleaning: bool,
}

/// Quotes rentals against a listing's rate, deposit and day limits
#[derive(Debug, Clone)]
pub struct RentalPricing {
    cleaning_fee: Decimal,
}

impl RentalPricing {
    pub fn new(cleaning_fee: f64) -> Result<Self, ValidationError> {
        Ok(Self {
            cleaning_fee: to_money(cleaning_fee, "cleaning fee")?,
        })
    }

    pub fn quote(
        &self,
        listing: &Listing,
        request: &RentalRequest,
        today: NaiveDate,
    ) -> Result<RentalCostBreakdown, ValidationError> {
        if !listing.is_publicly_visible() || listing.mode() == ListingMode::Buy {
            return Err(ValidationError::ListingUnavailable);
        }
        if listing.owner_id == request.renter_id {
            return Err(ValidationError::OwnListing);
        }
        if request.period.start() < today {
            return Err(ValidationError::RentalInPast);
        }

        let days = request.period.days();
        let min = listing.min_rental_days.unwrap_or(DEFAULT_MIN_RENTAL_DAYS);
        let max = listing.max_rental_days.unwrap_or(DEFAULT_MAX_RENTAL_DAYS);
        if days < min {
            return Err(ValidationError::RentalTooShort { min });
        }
        if days > max {
            return Err(ValidationError::RentalTooLong { max });
        }

        let daily_rate = to_money(listing.price_per_day.unwrap_or(0.0), "daily rate")?;
        let deposit = to_money(listing.deposit_amount.unwrap_or(0.0), "deposit")?;
        let cleaning = request.add_cleaning.then_some(self.cleaning_fee);

        let breakdown = calculate_rental_cost(daily_rate, deposit, &request.period, cleaning);
        debug!(
            listing_id = %listing.id,
            days,
            total = %breakdown.total_amount,
            "Rental quoted"
        );
        Ok(breakdown)
    }
}

/// Stored prices are floats; money math is done in cents-exact decimals
fn to_money(value: f64, field: &'static str) -> Result<Decimal, ValidationError> {
    match Decimal::try_from(value) {
        Ok(amount) if !amount.is_sign_negative() => Ok(amount.round_dp(2)),
        _ => Err(ValidationError::InvalidPrice(field)),
    }
}
