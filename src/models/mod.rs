use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub mod movie;
pub mod review;
pub mod user;

pub use movie::{Movie, MovieDraft, TaggedMovie};
pub use review::{NewReview, Rating, Review, ReviewDetail};
pub use user::{NewUser, User, UserUpdate};

pub type UserId = i64;
pub type MovieId = i64;
pub type GenreId = i64;
pub type ReviewId = i64;

/// A genre tag
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, sqlx::FromRow)]
pub struct Genre {
    pub id: GenreId,
    pub name: String,
}

// ============================================================================
// Pagination
// ============================================================================

const DEFAULT_PER_PAGE: u32 = 15;
const MAX_PER_PAGE: u32 = 100;

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    DEFAULT_PER_PAGE
}

/// 1-based page selection, deserialized from `?page=&per_page=`
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct PageRequest {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_PER_PAGE)
    }
}

impl PageRequest {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self { page, per_page }
    }

    /// Page number clamped to at least 1
    pub fn page(&self) -> u32 {
        self.page.max(1)
    }

    /// Page size clamped to 1..=100
    pub fn limit(&self) -> u32 {
        self.per_page.clamp(1, MAX_PER_PAGE)
    }

    pub fn offset(&self) -> u64 {
        (self.page() as u64 - 1) * self.limit() as u64
    }
}

/// One page of a larger result set
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub has_next: bool,
    pub next_page: Option<u32>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        let page = request.page();
        let per_page = request.limit();
        let has_next = request.offset() + (items.len() as u64) < total;
        Self {
            items,
            total,
            page,
            per_page,
            has_next,
            next_page: has_next.then_some(page + 1),
        }
    }

    /// Builds a page by slicing an already ordered, fully materialized list
    pub fn from_vec(all: Vec<T>, request: PageRequest) -> Self {
        let total = all.len() as u64;
        let items = all
            .into_iter()
            .skip(request.offset() as usize)
            .take(request.limit() as usize)
            .collect();
        Self::new(items, total, request)
    }
}

// ============================================================================
// List filters
// ============================================================================

/// Sort key for catalog listings
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MovieSort {
    #[default]
    Rating,
    Year,
    Favorites,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Desc,
    Asc,
}

/// Catalog search and filter parameters
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct MovieQuery {
    /// Case-insensitive substring of title or director
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub genre: Option<GenreId>,
    #[serde(default)]
    pub year_min: Option<i32>,
    #[serde(default)]
    pub year_max: Option<i32>,
    #[serde(default)]
    pub sort_by: MovieSort,
    #[serde(default)]
    pub order: SortOrder,
}

impl MovieQuery {
    /// Search text, `None` when blank
    pub fn search(&self) -> Option<&str> {
        non_blank(&self.q)
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoleFilter {
    #[default]
    All,
    Admin,
    User,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Banned,
}

/// Admin user-list filters
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct UserQuery {
    /// Substring of username or email
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub role: RoleFilter,
    #[serde(default)]
    pub status: StatusFilter,
}

impl UserQuery {
    pub fn search(&self) -> Option<&str> {
        non_blank(&self.q)
    }
}

/// Admin review-list filters
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ReviewQuery {
    /// Substring of the review content
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub rating: Option<Rating>,
    /// First day included (UTC)
    #[serde(default)]
    pub date_from: Option<NaiveDate>,
    /// Last day included (UTC)
    #[serde(default)]
    pub date_to: Option<NaiveDate>,
}

impl ReviewQuery {
    pub fn search(&self) -> Option<&str> {
        non_blank(&self.q)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Counters for the admin dashboard
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct DashboardStats {
    pub total_users: u64,
    pub total_movies: u64,
    pub total_reviews: u64,
    pub new_users_today: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_clamps() {
        let request = PageRequest::new(0, 1000);
        assert_eq!(request.page(), 1);
        assert_eq!(request.limit(), 100);
        assert_eq!(request.offset(), 0);

        assert_eq!(PageRequest::new(3, 15).offset(), 30);
    }

    #[test]
    fn test_page_from_vec() {
        let page = Page::from_vec((1..=7).collect::<Vec<_>>(), PageRequest::new(2, 3));
        assert_eq!(page.items, vec![4, 5, 6]);
        assert_eq!(page.total, 7);
        assert!(page.has_next);
        assert_eq!(page.next_page, Some(3));

        let last = Page::from_vec((1..=7).collect::<Vec<_>>(), PageRequest::new(3, 3));
        assert_eq!(last.items, vec![7]);
        assert!(!last.has_next);
        assert_eq!(last.next_page, None);
    }

    #[test]
    fn test_page_past_the_end_is_empty() {
        let page = Page::from_vec(vec![1, 2], PageRequest::new(5, 15));
        assert!(page.items.is_empty());
        assert!(!page.has_next);
    }

    #[test]
    fn test_movie_query_defaults() {
        let query: MovieQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.sort_by, MovieSort::Rating);
        assert_eq!(query.order, SortOrder::Desc);
        assert_eq!(query.search(), None);
    }

    #[test]
    fn test_blank_search_is_ignored() {
        let query = UserQuery {
            q: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(query.search(), None);
    }

    #[test]
    fn test_review_query_parses_dates_and_rating() {
        let query: ReviewQuery =
            serde_json::from_str(r#"{"rating": 3, "date_from": "2024-01-31"}"#).unwrap();
        assert_eq!(query.rating, Some(Rating::new(3).unwrap()));
        assert_eq!(query.date_from, NaiveDate::from_ymd_opt(2024, 1, 31));
        assert_eq!(query.date_to, None);
    }
}
