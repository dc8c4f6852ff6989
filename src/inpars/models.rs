use serde::{Deserialize, Deserializer, Serialize};

// listing
//  ├── id, regionId, cityId, metroId
//  ├── typeAd (1 rent out, 2 sell, 3 rent, 4 buy), sectionId, categoryId
//  ├── title, address, text, url, source
//  ├── floor, floors, sq, sqLiving, sqKitchen
//  ├── cost
//  ├── images[], phones[]
//  ├── agent (0 owner, 1 agent, 2 developer)
//  ├── created, updated
//  └── expanded: region, city, metro, category, material, rooms, rentTime

/// One upstream listing at fetch time.
///
/// The feed drops optional fields (or sends `null`) inconsistently between
/// requests, so every field falls back to its zero value instead of failing
/// the whole page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Listing {
    pub id: i64,
    #[serde(deserialize_with = "nullable")]
    pub region_id: i32,
    #[serde(deserialize_with = "nullable")]
    pub city_id: i32,
    #[serde(deserialize_with = "nullable")]
    pub metro_id: i32,
    #[serde(deserialize_with = "nullable")]
    pub type_ad: i32,
    #[serde(deserialize_with = "nullable")]
    pub section_id: i32,
    #[serde(deserialize_with = "nullable")]
    pub category_id: i32,

    #[serde(deserialize_with = "nullable")]
    pub title: String,
    #[serde(deserialize_with = "nullable")]
    pub address: String,
    #[serde(deserialize_with = "nullable")]
    pub text: String,
    #[serde(deserialize_with = "nullable")]
    pub url: String,
    #[serde(deserialize_with = "nullable")]
    pub source: String,

    #[serde(deserialize_with = "nullable")]
    pub floor: i32,
    #[serde(deserialize_with = "nullable")]
    pub floors: i32,
    #[serde(deserialize_with = "nullable")]
    pub sq: f64,
    #[serde(deserialize_with = "nullable")]
    pub sq_living: f64,
    #[serde(deserialize_with = "nullable")]
    pub sq_kitchen: f64,

    #[serde(deserialize_with = "nullable")]
    pub cost: i64,

    #[serde(deserialize_with = "nullable")]
    pub images: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub phones: Vec<i64>,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    #[serde(deserialize_with = "nullable")]
    pub agent: i32,

    #[serde(deserialize_with = "nullable")]
    pub lat: f64,
    #[serde(deserialize_with = "nullable")]
    pub lng: f64,

    #[serde(deserialize_with = "nullable")]
    pub created: String,
    #[serde(deserialize_with = "nullable")]
    pub updated: String,

    // Only present when requested through `expand`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metro: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rooms: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rent_time: Option<i32>,
}

impl Listing {
    pub fn image_count(&self) -> i32 {
        i32::try_from(self.images.len()).unwrap_or(i32::MAX)
    }
}

/// Rate-limit quota reported alongside every page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RateLimit {
    pub limit: u32,
    pub remaining: u32,
    pub reset_secs: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct Meta {
    pub limit: u32,
    pub total_count: u64,
    pub rate_limit: u32,
    pub rate_remaining: u32,
    pub rate_reset: u32,
}

impl From<&Meta> for RateLimit {
    fn from(meta: &Meta) -> Self {
        RateLimit {
            limit: meta.rate_limit,
            remaining: meta.rate_remaining,
            reset_secs: meta.rate_reset,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListingPageBody {
    #[serde(default)]
    pub data: Vec<Listing>,
    #[serde(default)]
    pub meta: Meta,
}

/// Error body the API returns for non-2xx responses.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ApiErrorBody {
    pub name: String,
    pub message: String,
    pub code: i64,
    pub status: i64,
}

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}
