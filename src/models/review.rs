use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{MovieId, ReviewId, UserId};
use crate::error::{AppError, AppResult};

/// Star rating attached to a review, always within 1..=5
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(try_from = "i16", into = "i16")]
#[sqlx(transparent)]
pub struct Rating(i16);

impl Rating {
    pub const MIN: i16 = 1;
    pub const MAX: i16 = 5;

    /// Validates a raw star value
    pub fn new(value: i64) -> AppResult<Self> {
        if (Self::MIN as i64..=Self::MAX as i64).contains(&value) {
            Ok(Self(value as i16))
        } else {
            Err(AppError::InvalidInput(format!(
                "rating must be between {} and {}, got {}",
                Self::MIN,
                Self::MAX,
                value
            )))
        }
    }

    pub fn value(self) -> i16 {
        self.0
    }
}

impl TryFrom<i16> for Rating {
    type Error = AppError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        Rating::new(value as i64)
    }
}

impl From<Rating> for i16 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

impl Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user's review of a movie
#[derive(Debug, Clone, Serialize, PartialEq, sqlx::FromRow)]
pub struct Review {
    pub id: ReviewId,
    pub content: String,
    pub rating: Rating,
    pub created_at: DateTime<Utc>,
    pub user_id: UserId,
    pub movie_id: MovieId,
}

/// Review row joined with its author's username and the movie title
#[derive(Debug, Clone, Serialize, PartialEq, sqlx::FromRow)]
pub struct ReviewDetail {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub review: Review,
    pub author: String,
    pub movie_title: String,
}

/// Fields needed to insert a review
#[derive(Debug, Clone, PartialEq)]
pub struct NewReview {
    pub content: String,
    pub rating: Rating,
    pub user_id: UserId,
    pub movie_id: MovieId,
}
