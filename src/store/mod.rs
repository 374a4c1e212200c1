pub mod rest;
pub mod retry;
pub mod traits;
pub mod types;

pub use rest::RestStore;
pub use retry::RetryPolicy;
pub use traits::{ContentStore, RemoteStore, RemoteStoreExt};
pub use types::{Filter, Order, SelectQuery};

pub const LISTINGS: &str = "listings";
pub const LISTING_IMAGES: &str = "listing_images";
pub const PROFILES: &str = "profiles";
pub const FAVORITES: &str = "favorites";
pub const CONVERSATIONS: &str = "conversations";
pub const MESSAGES: &str = "messages";
