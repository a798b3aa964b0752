use crate::{
    db::Store,
    error::{AppError, AppResult},
    models::{Movie, MovieId, TaggedMovie},
};

/// Result cap used when the caller does not supply one
pub const DEFAULT_SIMILAR_LIMIT: usize = 4;

/// Movies that share genres with `movie_id`, most overlapping first
pub async fn get_similar(store: &dyn Store, movie_id: MovieId, limit: usize) -> AppResult<Vec<Movie>> {
    let reference = store
        .tagged_movie(movie_id)
        .await?
        .ok_or_else(|| AppError::not_found("movie", movie_id))?;

    if reference.genres.is_empty() {
        return Ok(Vec::new());
    }

    let catalog = store.tagged_catalog().await?;
    Ok(similar(&reference, &catalog, limit))
}

/// Ranks `catalog` against `reference` by genre overlap
///
/// Order: shared genre count descending, then average rating descending,
/// then ascending id. Movies sharing nothing are excluded, as is the
/// reference itself.
pub fn similar(reference: &TaggedMovie, catalog: &[TaggedMovie], limit: usize) -> Vec<Movie> {
    let mut scored: Vec<(usize, &Movie)> = catalog
        .iter()
        .filter(|m| m.movie.id != reference.movie.id)
        .map(|m| (m.overlap(&reference.genres), &m.movie))
        .filter(|(overlap, _)| *overlap > 0)
        .collect();

    scored.sort_by(|(a_overlap, a), (b_overlap, b)| {
        b_overlap
            .cmp(a_overlap)
            .then(b.average_rating.total_cmp(&a.average_rating))
            .then(a.id.cmp(&b.id))
    });

    scored
        .into_iter()
        .take(limit)
        .map(|(_, movie)| movie.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GenreId;

    const A: GenreId = 1;
    const B: GenreId = 2;
    const C: GenreId = 3;

    fn movie(id: MovieId, rating: f64, genres: &[GenreId]) -> TaggedMovie {
        TaggedMovie::new(
            Movie {
                id,
                title: format!("Movie {}", id),
                year: None,
                director: None,
                description: None,
                poster_url: None,
                average_rating: rating,
            },
            genres.iter().copied(),
        )
    }

    fn ids(movies: &[Movie]) -> Vec<MovieId> {
        movies.iter().map(|m| m.id).collect()
    }

    #[test]
    fn test_larger_overlap_ranks_first() {
        let reference = movie(0, 3.0, &[A, B]);
        let catalog = vec![
            reference.clone(),
            movie(1, 5.0, &[A]),
            movie(2, 1.0, &[A, B]),
            movie(3, 5.0, &[C]),
        ];

        assert_eq!(ids(&similar(&reference, &catalog, 10)), vec![2, 1]);
    }

    #[test]
    fn test_rating_breaks_overlap_ties() {
        let reference = movie(0, 3.0, &[A]);
        let catalog = vec![movie(1, 2.0, &[A]), movie(2, 4.0, &[A, C]), movie(3, 4.0, &[A])];
        assert_eq!(ids(&similar(&reference, &catalog, 10)), vec![2, 3, 1]);
    }

    #[test]
    fn test_untagged_reference_has_no_similar_movies() {
        let reference = movie(0, 3.0, &[]);
        let catalog = vec![movie(1, 2.0, &[A])];
        assert!(similar(&reference, &catalog, 4).is_empty());
    }

    #[test]
    fn test_limit_applies_after_sorting() {
        let reference = movie(0, 3.0, &[A, B]);
        let catalog = vec![
            movie(1, 1.0, &[A]),
            movie(2, 2.0, &[A, B]),
            movie(3, 5.0, &[B]),
        ];
        assert_eq!(ids(&similar(&reference, &catalog, 2)), vec![2, 3]);
    }

    #[test]
    fn test_no_candidates_is_empty() {
        let reference = movie(0, 3.0, &[A]);
        let catalog = vec![reference.clone(), movie(1, 2.0, &[C])];
        assert!(similar(&reference, &catalog, 4).is_empty());
    }
}
