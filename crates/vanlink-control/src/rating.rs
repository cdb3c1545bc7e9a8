//! Driver rating aggregation.
//!
//! Rating is two phases: the rating is upserted, then every rating of the
//! driver is scanned and the aggregate written back. The phases are separate
//! writes, so two concurrent raters can each compute the aggregate from a
//! different set of ratings; the last recompute wins.

use chrono::Utc;
use vanlink_core::AccountId;
use vanlink_store::{Rating, Store, StoreError};

use crate::error::{ControlError, Result};
use crate::types::{ControlConfig, RateDriverRequest, RatingSummary};

/// Validate the score and comment of a rating request.
///
/// Returns the trimmed comment.
///
/// # Errors
///
/// Returns `InvalidArgument` for non-finite or out-of-range scores and
/// overlong comments, and `SelfRating` if the caller rates themself.
pub fn validate_rating(
    config: &ControlConfig,
    student_id: &AccountId,
    request: &RateDriverRequest,
) -> Result<String> {
    let score = request.score;
    if !score.is_finite() {
        return Err(ControlError::InvalidArgument(
            "score must be a number".to_string(),
        ));
    }

    if request.driver_id == *student_id {
        return Err(ControlError::SelfRating);
    }

    if score < config.min_score || score > config.max_score {
        return Err(ControlError::InvalidArgument(format!(
            "score must be between {} and {}",
            config.min_score, config.max_score
        )));
    }

    let comment = request.comment.as_deref().unwrap_or_default().trim();
    if comment.chars().count() > config.max_comment_chars {
        return Err(ControlError::InvalidArgument(format!(
            "comment exceeds {} characters",
            config.max_comment_chars
        )));
    }

    Ok(comment.to_string())
}

/// Compute the mean of a set of ratings.
///
/// With no ratings, the summary falls back to `fallback` with a count of zero.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn summarize(ratings: &[Rating], fallback: f64) -> RatingSummary {
    let count = u32::try_from(ratings.len()).unwrap_or(u32::MAX);
    if ratings.is_empty() {
        return RatingSummary {
            average: fallback,
            count,
        };
    }

    let sum: f64 = ratings.iter().map(|r| r.score).sum();
    RatingSummary {
        average: sum / ratings.len() as f64,
        count,
    }
}

/// Record a student's rating of a driver and refresh the driver's aggregate.
///
/// # Errors
///
/// Returns an error if validation fails, the driver does not exist, or a
/// database operation fails.
pub fn rate_driver<S: Store>(
    store: &S,
    config: &ControlConfig,
    student_id: &AccountId,
    request: &RateDriverRequest,
) -> Result<RatingSummary> {
    let comment = validate_rating(config, student_id, request)?;
    let driver_id = &request.driver_id;

    if store.get_driver(driver_id)?.is_none() {
        return Err(ControlError::DriverNotFound(driver_id.clone()));
    }

    store.put_rating(&Rating {
        driver_id: driver_id.clone(),
        student_id: student_id.clone(),
        score: request.score,
        comment,
        updated_at: Utc::now(),
    })?;

    let ratings = store.list_ratings_for_driver(driver_id)?;
    let summary = summarize(&ratings, request.score);

    store
        .update_driver_rating(driver_id, summary.average, summary.count, Utc::now())
        .map_err(|e| match e {
            StoreError::NotFound => ControlError::DriverNotFound(driver_id.clone()),
            other => other.into(),
        })?;

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use vanlink_store::{Driver, RocksStore};

    fn id(s: &str) -> AccountId {
        AccountId::new(s).unwrap()
    }

    fn create_test_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        store.put_driver(&Driver::new(id("driver-1"))).unwrap();
        (store, dir)
    }

    fn request(score: f64) -> RateDriverRequest {
        RateDriverRequest {
            driver_id: id("driver-1"),
            score,
            comment: None,
        }
    }

    #[test]
    fn out_of_range_scores_rejected() {
        let (store, _dir) = create_test_store();
        let config = ControlConfig::default();

        for score in [0.0, 6.0, 0.99, 5.01, f64::NAN, f64::INFINITY] {
            let result = rate_driver(&store, &config, &id("student-1"), &request(score));
            assert!(
                matches!(result, Err(ControlError::InvalidArgument(_))),
                "score {score} should be rejected"
            );
        }
        assert!(store.list_ratings_for_driver(&id("driver-1")).unwrap().is_empty());
    }

    #[test]
    fn boundary_scores_accepted() {
        let (store, _dir) = create_test_store();
        let config = ControlConfig::default();

        let summary = rate_driver(&store, &config, &id("student-1"), &request(1.0)).unwrap();
        assert_eq!(summary.count, 1);
        let summary = rate_driver(&store, &config, &id("student-2"), &request(5.0)).unwrap();
        assert_eq!(summary.count, 2);
        assert!((summary.average - 3.0).abs() < 1e-9);
    }

    #[test]
    fn fractional_score_kept_as_given() {
        let (store, _dir) = create_test_store();
        let config = ControlConfig::default();

        rate_driver(&store, &config, &id("student-1"), &request(4.5)).unwrap();
        let summary = rate_driver(&store, &config, &id("student-2"), &request(4.0)).unwrap();
        assert_eq!(summary.count, 2);
        assert!((summary.average - 4.25).abs() < 1e-9);

        let ratings = store.list_ratings_for_driver(&id("driver-1")).unwrap();
        assert!(ratings.iter().any(|r| (r.score - 4.5).abs() < 1e-9));
    }

    #[test]
    fn self_rating_fails_precondition() {
        let (store, _dir) = create_test_store();
        let result = rate_driver(
            &store,
            &ControlConfig::default(),
            &id("driver-1"),
            &request(5.0),
        );
        assert!(matches!(result, Err(ControlError::SelfRating)));
    }

    #[test]
    fn unknown_driver_not_found() {
        let (store, _dir) = create_test_store();
        let mut req = request(4.0);
        req.driver_id = id("ghost");

        let result = rate_driver(&store, &ControlConfig::default(), &id("student-1"), &req);
        assert!(matches!(result, Err(ControlError::DriverNotFound(_))));
    }

    #[test]
    fn average_across_students() {
        let (store, _dir) = create_test_store();
        let config = ControlConfig::default();

        rate_driver(&store, &config, &id("student-1"), &request(5.0)).unwrap();
        rate_driver(&store, &config, &id("student-2"), &request(3.0)).unwrap();
        let summary = rate_driver(&store, &config, &id("student-3"), &request(4.0)).unwrap();

        assert_eq!(summary.count, 3);
        assert!((summary.average - 4.0).abs() < 1e-9);

        let driver = store.get_driver(&id("driver-1")).unwrap().unwrap();
        assert_eq!(driver.rating_count, 3);
        assert!((driver.rating_average.unwrap() - 4.0).abs() < 1e-9);
        assert!(driver.rating_updated_at.is_some());
    }

    #[test]
    fn rerating_replaces_previous_score() {
        let (store, _dir) = create_test_store();
        let config = ControlConfig::default();

        rate_driver(&store, &config, &id("student-1"), &request(5.0)).unwrap();
        rate_driver(&store, &config, &id("student-2"), &request(3.0)).unwrap();
        let summary = rate_driver(&store, &config, &id("student-1"), &request(1.0)).unwrap();

        assert_eq!(summary.count, 2);
        assert!((summary.average - 2.0).abs() < 1e-9);
    }

    #[test]
    fn rating_keeps_linked_students() {
        let (store, _dir) = create_test_store();
        let mut driver = Driver::new(id("driver-1"));
        driver.student_ids.insert(id("student-1"));
        store.put_driver(&driver).unwrap();

        rate_driver(&store, &ControlConfig::default(), &id("student-1"), &request(4.0)).unwrap();

        let stored = store.get_driver(&id("driver-1")).unwrap().unwrap();
        assert!(stored.student_ids.contains(&id("student-1")));
    }

    #[test]
    fn comment_is_trimmed_and_bounded() {
        let (store, _dir) = create_test_store();
        let config = ControlConfig::default();

        let mut req = request(4.0);
        req.comment = Some("  great driver  ".to_string());
        rate_driver(&store, &config, &id("student-1"), &req).unwrap();
        let ratings = store.list_ratings_for_driver(&id("driver-1")).unwrap();
        assert_eq!(ratings[0].comment, "great driver");

        req.comment = Some("x".repeat(config.max_comment_chars + 1));
        let result = rate_driver(&store, &config, &id("student-2"), &req);
        assert!(matches!(result, Err(ControlError::InvalidArgument(_))));
    }

    #[test]
    fn missing_comment_defaults_to_empty() {
        let (store, _dir) = create_test_store();
        rate_driver(&store, &ControlConfig::default(), &id("student-1"), &request(3.0)).unwrap();

        let ratings = store.list_ratings_for_driver(&id("driver-1")).unwrap();
        assert_eq!(ratings[0].comment, "");
    }

    #[test]
    fn summarize_empty_uses_fallback() {
        let summary = summarize(&[], 4.5);
        assert_eq!(summary.count, 0);
        assert!((summary.average - 4.5).abs() < f64::EPSILON);
    }
}
