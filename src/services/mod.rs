pub mod accounts;
pub mod admin;
pub mod catalog;
pub mod password;
pub mod rating;
pub mod recommendations;
pub mod reviews;
pub mod similarity;
pub mod validate;

pub use password::PasswordHasher;
pub use rating::{average_rating, recompute_rating, RatingUpdate};
pub use recommendations::get_recommendations;
pub use similarity::get_similar;
