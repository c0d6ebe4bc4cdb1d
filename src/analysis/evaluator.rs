//! Confidence evaluation.
//!
//! Maps an extracted value and its confidence onto a routing [`Decision`].
//! Pure: same inputs always produce the same decision.

use crate::models::Decision;

/// Decide how an extracted field is routed.
///
/// A missing or blank value is `NotFound`. Otherwise the value is
/// `Accepted` when `confidence >= threshold` and `RequiresReview` below it.
/// The threshold has already been range-checked when the request was built.
pub fn evaluate(raw_value: Option<&str>, confidence: f64, threshold: f64) -> Decision {
    match raw_value {
        Some(value) if !value.trim().is_empty() => {
            if confidence >= threshold {
                Decision::Accepted
            } else {
                Decision::RequiresReview
            }
        }
        _ => Decision::NotFound,
    }
}

/// Value callers are allowed to see for a decision.
pub fn surfaced_value(decision: Decision, raw_value: Option<&str>) -> Option<&str> {
    match decision {
        Decision::Accepted => raw_value,
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_value_is_not_found() {
        for confidence in [0.0, 0.5, 1.0] {
            for threshold in [0.0, 0.7, 1.0] {
                assert_eq!(evaluate(None, confidence, threshold), Decision::NotFound);
            }
        }
    }

    #[test]
    fn test_blank_value_is_not_found() {
        assert_eq!(evaluate(Some("   "), 0.99, 0.5), Decision::NotFound);
        assert_eq!(evaluate(Some(""), 0.99, 0.5), Decision::NotFound);
    }

    #[test]
    fn test_threshold_boundary_is_accepted() {
        assert_eq!(evaluate(Some("SN-1"), 0.7, 0.7), Decision::Accepted);
        assert_eq!(evaluate(Some("SN-1"), 0.0, 0.0), Decision::Accepted);
        assert_eq!(evaluate(Some("SN-1"), 1.0, 1.0), Decision::Accepted);
    }

    #[test]
    fn test_below_threshold_requires_review() {
        assert_eq!(evaluate(Some("SN-1"), 0.69, 0.7), Decision::RequiresReview);
        assert_eq!(evaluate(Some("SN-1"), 0.99, 1.0), Decision::RequiresReview);
    }

    #[test]
    fn test_monotonic_in_threshold() {
        // Once accepted at t1, any t2 <= t1 also accepts.
        let confidence = 0.8;
        let thresholds = [0.0, 0.2, 0.5, 0.8, 0.81, 0.9, 1.0];
        for &t1 in &thresholds {
            if evaluate(Some("x"), confidence, t1) != Decision::Accepted {
                continue;
            }
            for &t2 in thresholds.iter().filter(|&&t| t <= t1) {
                assert_eq!(evaluate(Some("x"), confidence, t2), Decision::Accepted);
            }
        }
    }

    #[test]
    fn test_surfaced_value_only_for_accepted() {
        assert_eq!(surfaced_value(Decision::Accepted, Some("SN")), Some("SN"));
        assert_eq!(surfaced_value(Decision::RequiresReview, Some("SN")), None);
        assert_eq!(surfaced_value(Decision::NotFound, None), None);
        assert_eq!(surfaced_value(Decision::Failed, Some("SN")), None);
    }
}
