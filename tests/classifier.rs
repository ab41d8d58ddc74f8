//! Behaviour of the keyword-based environment classifier

use nlp_suite::{ENVIRONMENT_KEYWORDS, EnvironmentLabel, classify};

#[test]
fn test_three_keywords_saturate_confidence() {
    let result = classify("Climate change and pollution affect biodiversity").unwrap();
    assert_eq!(result.label, EnvironmentLabel::EnvironmentRelated);
    assert_eq!(result.match_count(), 3);
    assert_eq!(result.confidence, 1.0);
    assert_eq!(
        result.matched_keywords,
        vec!["climate", "pollution", "biodiversity"]
    );
    assert_eq!(
        result.render(),
        "Classification: Environment-related\nConfidence: 1.00\nKeywords found: 3\n\nEnvironmental keywords detected: climate, pollution, biodiversity"
    );
}

#[test]
fn test_more_than_three_keywords_stays_at_one() {
    let text = "carbon emissions, renewable energy, recycle and sustainability";
    let result = classify(text).unwrap();
    assert_eq!(result.match_count(), 5);
    assert_eq!(result.confidence, 1.0);
}

#[test]
fn test_single_keyword_is_one_third() {
    let result = classify("Deforestation is accelerating").unwrap();
    assert_eq!(result.label, EnvironmentLabel::EnvironmentRelated);
    assert!((result.confidence - 1.0 / 3.0).abs() < 1e-6);
    assert!(result.render().contains("Confidence: 0.33"));
}

#[test]
fn test_no_keywords_reports_full_confidence() {
    let result = classify("I like cats").unwrap();
    assert_eq!(result.label, EnvironmentLabel::NotEnvironmentRelated);
    assert_eq!(result.confidence, 1.0);
    assert!(result.matched_keywords.is_empty());
}

#[test]
fn test_case_insensitive() {
    let upper = classify("Climate").unwrap();
    let lower = classify("climate").unwrap();
    assert_eq!(upper.match_count(), lower.match_count());
    assert_eq!(upper, lower);
}

#[test]
fn test_matches_follow_table_order() {
    // Reverse of table order in the input
    let result = classify("biodiversity renewable earth climate").unwrap();
    assert_eq!(
        result.matched_keywords,
        vec!["climate", "earth", "renewable", "biodiversity"]
    );
}

#[test]
fn test_every_keyword_is_detected_alone() {
    for kw in ENVIRONMENT_KEYWORDS {
        let result = classify(&format!("something about {kw} here")).unwrap();
        assert!(result.matched_keywords.contains(&kw), "missed {kw}");
    }
}

#[test]
fn test_whitespace_only_is_rejected() {
    let err = classify(" \n  \t").unwrap_err();
    assert!(err.is_validation());
    assert_eq!(err.to_string(), "Please enter some text to analyze.");
}
