use crate::inpars::{FetchError, Listing, RateLimit};
use async_trait::async_trait;

/// Source of listing pages. The monitor treats any error as "abort this cycle".
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_page(
        &self,
        filters: &ListingFilters,
        request: &PageRequest,
    ) -> Result<Page, FetchError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    IdAsc,
    IdDesc,
    UpdatedDesc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::IdAsc => "id_asc",
            SortOrder::IdDesc => "id_desc",
            SortOrder::UpdatedDesc => "updated_desc",
        }
    }
}

/// Cursor half of a page query; the filter half comes from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub sort: SortOrder,
    /// Only listings with an id strictly greater than this one.
    pub last_id: Option<i64>,
    pub limit: u32,
}

impl PageRequest {
    pub fn after(last_id: i64, limit: u32) -> Self {
        Self {
            sort: SortOrder::IdAsc,
            last_id: Some(last_id),
            limit,
        }
    }

    pub fn recently_updated(limit: u32) -> Self {
        Self {
            sort: SortOrder::UpdatedDesc,
            last_id: None,
            limit,
        }
    }

    pub fn newest(limit: u32) -> Self {
        Self {
            sort: SortOrder::IdDesc,
            last_id: None,
            limit,
        }
    }
}

/// One ordered batch of listings plus the quota left after fetching it.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub listings: Vec<Listing>,
    pub rate_limit: RateLimit,
}

/// Static filters passed through unmodified on every request.
/// Zero bounds and empty lists mean "no filter".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingFilters {
    pub region_ids: Vec<i32>,
    pub city_ids: Vec<i32>,
    pub type_ad: Vec<i32>,
    pub seller_types: Vec<i32>,
    pub cost_min: i64,
    pub cost_max: i64,
    pub floor_min: i32,
    pub floor_max: i32,
    pub expand: Vec<String>,
}

impl ListingFilters {
    pub fn query_pairs(&self, request: &PageRequest) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("sortBy", request.sort.as_str().to_string())];

        if let Some(last_id) = request.last_id {
            pairs.push(("lastId", last_id.to_string()));
        }

        let lists = [
            ("regionId", &self.region_ids),
            ("cityId", &self.city_ids),
            ("typeAd", &self.type_ad),
            ("sellerType", &self.seller_types),
        ];
        for (key, ids) in lists {
            if !ids.is_empty() {
                pairs.push((key, join(ids)));
            }
        }

        let bounds = [
            ("costMin", self.cost_min),
            ("costMax", self.cost_max),
            ("floorMin", i64::from(self.floor_min)),
            ("floorMax", i64::from(self.floor_max)),
        ];
        for (key, value) in bounds {
            if value > 0 {
                pairs.push((key, value.to_string()));
            }
        }

        if !self.expand.is_empty() {
            pairs.push(("expand", self.expand.join(",")));
        }
        if request.limit > 0 {
            pairs.push(("limit", request.limit.to_string()));
        }

        pairs
    }
}

fn join<T: ToString>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
