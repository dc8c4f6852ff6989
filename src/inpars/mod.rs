mod client;
mod fetch_error;
pub(crate) mod fetcher;
mod models;

pub use client::InParsClient;
pub use fetch_error::FetchError;
pub use fetcher::{Fetcher, ListingFilters, PageRequest};
pub use models::{Listing, RateLimit};
