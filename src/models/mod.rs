use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Returned when a string does not name a known enumerated value
#[derive(Debug, Clone, Error, PartialEq)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Item category
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Hijab,
    Abaya,
    Thobe,
    Dress,
    Jewelry,
    Decor,
    EventWear,
    PrayerItems,
    Accessories,
    Other,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::Hijab,
        Category::Abaya,
        Category::Thobe,
        Category::Dress,
        Category::Jewelry,
        Category::Decor,
        Category::EventWear,
        Category::PrayerItems,
        Category::Accessories,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Hijab => "hijab",
            Category::Abaya => "abaya",
            Category::Thobe => "thobe",
            Category::Dress => "dress",
            Category::Jewelry => "jewelry",
            Category::Decor => "decor",
            Category::EventWear => "event_wear",
            Category::PrayerItems => "prayer_items",
            Category::Accessories => "accessories",
            Category::Other => "other",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Hijab => "Hijab",
            Category::Abaya => "Abaya",
            Category::Thobe => "Thobe",
            Category::Dress => "Dress",
            Category::Jewelry => "Jewelry",
            Category::Decor => "Decor",
            Category::EventWear => "Event Wear",
            Category::PrayerItems => "Prayer Items",
            Category::Accessories => "Accessories",
            Category::Other => "Other",
        }
    }
}

impl FromStr for Category {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| UnknownVariant {
                kind: "category",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Garment size
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Size {
    #[serde(rename = "XS")]
    ExtraSmall,
    #[serde(rename = "S")]
    Small,
    #[serde(rename = "M")]
    Medium,
    #[serde(rename = "L")]
    Large,
    #[serde(rename = "XL")]
    ExtraLarge,
    #[serde(rename = "one_size")]
    OneSize,
}

impl Size {
    pub fn as_str(&self) -> &'static str {
        match self {
            Size::ExtraSmall => "XS",
            Size::Small => "S",
            Size::Medium => "M",
            Size::Large => "L",
            Size::ExtraLarge => "XL",
            Size::OneSize => "one_size",
        }
    }
}

impl FromStr for Size {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "XS" | "xs" => Ok(Size::ExtraSmall),
            "S" | "s" => Ok(Size::Small),
            "M" | "m" => Ok(Size::Medium),
            "L" | "l" => Ok(Size::Large),
            "XL" | "xl" => Ok(Size::ExtraLarge),
            "one_size" | "one-size" | "One Size" => Ok(Size::OneSize),
            other => Err(UnknownVariant {
                kind: "size",
                value: other.to_string(),
            }),
        }
    }
}

/// Human-readable size label
pub fn format_size(size: &str) -> String {
    if size == "one_size" {
        "One Size".to_string()
    } else {
        size.to_string()
    }
}

/// Item condition
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    New,
    LikeNew,
    Good,
    Worn,
}

impl Condition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::New => "new",
            Condition::LikeNew => "like_new",
            Condition::Good => "good",
            Condition::Worn => "worn",
        }
    }
}

impl FromStr for Condition {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "new" => Ok(Condition::New),
            "like_new" => Ok(Condition::LikeNew),
            "good" => Ok(Condition::Good),
            "worn" => Ok(Condition::Worn),
            _ => Err(UnknownVariant {
                kind: "condition",
                value: s.to_string(),
            }),
        }
    }
}

/// Human-readable condition label; unknown values pass through untouched
pub fn format_condition(condition: &str) -> String {
    match condition {
        "new" => "New".to_string(),
        "like_new" => "Like New".to_string(),
        "good" => "Good".to_string(),
        "worn" => "Worn".to_string(),
        other => other.to_string(),
    }
}

/// Listing lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Active,
    Rented,
    Inactive,
    #[serde(other)]
    Unknown,
}

/// Which price field governs a listing
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ListingMode {
    Buy,
    Rent,
    Borrow,
}

impl ListingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingMode::Buy => "buy",
            ListingMode::Rent => "rent",
            ListingMode::Borrow => "borrow",
        }
    }
}

impl FromStr for ListingMode {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" => Ok(ListingMode::Buy),
            "rent" => Ok(ListingMode::Rent),
            "borrow" => Ok(ListingMode::Borrow),
            _ => Err(UnknownVariant {
                kind: "mode",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ListingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A point on the globe in decimal degrees
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Pair up optional lat/lng columns
    pub fn from_parts(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => Some(Self::new(latitude, longitude)),
            _ => None,
        }
    }
}

/// Photo attached to a listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListingImage {
    #[serde(default)]
    pub id: Option<String>,
    pub listing_id: String,
    pub image_url: String,
    #[serde(default)]
    pub display_order: i32,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Row of the `listings` table, optionally joined with its images
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: String,
    #[serde(default)]
    pub size: Option<String>,
    pub condition: String,
    #[serde(default)]
    pub price_per_day: Option<f64>,
    #[serde(default)]
    pub sell_price: Option<f64>,
    #[serde(default)]
    pub deposit_amount: Option<f64>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub shipping_available: Option<bool>,
    #[serde(default)]
    pub is_modest: Option<bool>,
    #[serde(default)]
    pub is_approved: Option<bool>,
    #[serde(default)]
    pub status: Option<ListingStatus>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub min_rental_days: Option<u32>,
    #[serde(default)]
    pub max_rental_days: Option<u32>,
    #[serde(default)]
    pub listing_images: Vec<ListingImage>,
}

impl Listing {
    /// Sale price wins, then deposit, otherwise the daily rate governs.
    /// Zero counts as absent.
    pub fn mode(&self) -> ListingMode {
        if is_set(self.sell_price) {
            ListingMode::Buy
        } else if is_set(self.deposit_amount) {
            ListingMode::Borrow
        } else {
            ListingMode::Rent
        }
    }

    /// Price shown next to the listing for its mode
    pub fn effective_price(&self) -> f64 {
        match self.mode() {
            ListingMode::Buy => self.sell_price.unwrap_or(0.0),
            ListingMode::Borrow => self.deposit_amount.unwrap_or(0.0),
            ListingMode::Rent => self.price_per_day.unwrap_or(0.0),
        }
    }

    /// Only active, approved listings belong in the public catalog
    pub fn is_publicly_visible(&self) -> bool {
        self.status == Some(ListingStatus::Active) && self.is_approved == Some(true)
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        Coordinates::from_parts(self.latitude, self.longitude)
    }

    /// Image URLs in display order
    pub fn photos(&self) -> Vec<&str> {
        let mut images: Vec<&ListingImage> = self.listing_images.iter().collect();
        images.sort_by_key(|img| img.display_order);
        images.into_iter().map(|img| img.image_url.as_str()).collect()
    }
}

fn is_set(price: Option<f64>) -> bool {
    matches!(price, Some(p) if p > 0.0)
}

/// Seller profile (`profiles` table)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub is_verified_email: Option<bool>,
    #[serde(default)]
    pub is_verified_phone: Option<bool>,
    #[serde(default)]
    pub is_verified_community: Option<bool>,
}

impl Profile {
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or("Community member")
    }

    /// Highest verification reached, from the profile's badge flags
    pub fn trust_level(&self) -> TrustLevel {
        self.badges()
            .last()
            .copied()
            .unwrap_or(TrustLevel::Unverified)
    }

    /// Verification badges held, lowest first
    pub fn badges(&self) -> Vec<TrustLevel> {
        [
            (self.is_verified_email, TrustLevel::EmailVerified),
            (self.is_verified_phone, TrustLevel::PhoneVerified),
            (self.is_verified_community, TrustLevel::CommunityVerified),
        ]
        .into_iter()
        .filter(|(flag, _)| *flag == Some(true))
        .map(|(_, level)| level)
        .collect()
    }
}

/// Verification tiers, ordered from least to most trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    Unverified,
    EmailVerified,
    PhoneVerified,
    CommunityVerified,
}

impl TrustLevel {
    pub fn label(&self) -> &'static str {
        match self {
            TrustLevel::Unverified => "Unverified",
            TrustLevel::EmailVerified => "Email verified",
            TrustLevel::PhoneVerified => "Phone verified",
            TrustLevel::CommunityVerified => "Community verified",
        }
    }
}

/// A user's saved listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Favorite {
    #[serde(default)]
    pub id: Option<String>,
    pub user_id: String,
    pub listing_id: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Thread between two users, usually about a listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    #[serde(default)]
    pub listing_id: Option<String>,
    pub participant_1: String,
    pub participant_2: String,
    #[serde(default)]
    pub last_message_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Conversation {
    pub fn involves(&self, user_id: &str) -> bool {
        self.participant_1 == user_id || self.participant_2 == user_id
    }

    pub fn other_participant(&self, user_id: &str) -> &str {
        if self.participant_1 == user_id {
            &self.participant_2
        } else {
            &self.participant_1
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    #[serde(default)]
    pub is_read: Option<bool>,
    pub created_at: DateTime<Utc>,
}
