mod app_config;
pub mod booking;
mod config;
mod error;
pub mod listing;
pub mod query;
pub mod reference;
pub mod review;
pub mod seed;
pub mod user;

pub use app_config::{AppConfig, Environment};
pub use booking::Booking;
pub use config::{load_app_config, load_app_config_from_env};
pub use error::{ConfigError, CoreError};
pub use listing::{Listing, ListingDocument, ListingInput, ListingPatch, ValidationError};
pub use query::{parse_listing_query, ListingQuery};
pub use reference::{Ref, Referent};
pub use review::Review;
pub use user::{Role, User, UserSummary};
