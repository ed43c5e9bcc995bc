//! Property tests over the pure routing and capacity math.

use proptest::prelude::*;

use dcm::domain::models::{clamp_score, normalize_keywords, CapacityZone};
use dcm::services::TokenService;

proptest! {
    #[test]
    fn clamp_always_lands_in_bounds(score in -1000.0f64..1000.0) {
        let clamped = clamp_score(score);
        prop_assert!((0.0..=10.0).contains(&clamped));
    }

    #[test]
    fn clamp_is_idempotent(score in -1000.0f64..1000.0) {
        let once = clamp_score(score);
        prop_assert_eq!(once, clamp_score(once));
    }

    #[test]
    fn normalized_keywords_are_lowercase_trimmed_nonempty(raw in ".{0,200}") {
        for keyword in normalize_keywords(&raw) {
            prop_assert!(!keyword.is_empty());
            prop_assert_eq!(keyword.clone(), keyword.trim().to_lowercase());
        }
    }

    #[test]
    fn normalization_is_idempotent(raw in "[a-z, ]{0,100}") {
        let first = normalize_keywords(&raw);
        let again = normalize_keywords(&first.join(","));
        prop_assert_eq!(first, again);
    }

    #[test]
    fn capacity_zones_are_monotonic(a in 0.0f64..3.0, b in 0.0f64..3.0) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        let rank = |zone: CapacityZone| match zone {
            CapacityZone::Green => 0,
            CapacityZone::Yellow => 1,
            CapacityZone::Orange => 2,
            CapacityZone::Red => 3,
            CapacityZone::Critical => 4,
        };
        prop_assert!(rank(CapacityZone::from_ratio(low)) <= rank(CapacityZone::from_ratio(high)));
    }

    #[test]
    fn tokens_round_trip_for_valid_identifiers(
        agent in "[A-Za-z0-9_-]{1,64}",
        session in proptest::option::of("[A-Za-z0-9_-]{1,128}"),
    ) {
        let service = TokenService::new("property-secret", 3600);
        let token = service.issue(&agent, session.as_deref()).unwrap();
        let claims = service.verify(&token).unwrap();
        prop_assert_eq!(claims.agent_id, agent);
        prop_assert_eq!(claims.session_id, session);
    }
}
