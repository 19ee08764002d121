//! Scenario and property tests for scoring and ranking

use proptest::prelude::*;
use record_linkage_matching::{
    fields::*, rank, record_from_pairs, score, Algorithm, Comparator, FieldRegistry, Language,
    LanguageConfig, MatchingConfig, Ranker, Record,
};

fn john_smith() -> Record {
    Record::new("source-1")
        .with_field(FIRST_NAME, "John")
        .with_field(LAST_NAME, "Smith")
        .with_field(BIRTH_DATE, "1980-05-01")
        .with_field(GENDER, "Male")
}

#[test]
fn test_near_duplicate_scenario() {
    let config = MatchingConfig::default();
    let target = Record::new("target-1")
        .with_field(FIRST_NAME, "Jon")
        .with_field(LAST_NAME, "Smith")
        .with_field(BIRTH_DATE, "1980-05-01")
        .with_field(GENDER, "male");

    let breakdown = score(&john_smith(), &target, &config, Algorithm::Deterministic);

    assert!(breakdown.score >= 80);
    for label in ["Last Name", "Birth Date", "Gender", "First Name (partial)"] {
        assert!(
            breakdown.matched_on.iter().any(|l| l == label),
            "missing {label} in {:?}",
            breakdown.matched_on
        );
    }
}

#[test]
fn test_gender_only_overlap_scores_low() {
    let config = MatchingConfig::default();
    let target = Record::new("target-2")
        .with_field(FIRST_NAME, "Mary")
        .with_field(LAST_NAME, "Jones")
        .with_field(BIRTH_DATE, "1995-11-20")
        .with_field(GENDER, "Male");

    let deterministic = score(&john_smith(), &target, &config, Algorithm::Deterministic);
    let probabilistic = score(&john_smith(), &target, &config, Algorithm::Probabilistic);

    assert!(deterministic.score < config.threshold.low);
    assert!(probabilistic.score < config.probabilistic.min_score);
    assert!(rank(&john_smith(), &[target], &config, Algorithm::Deterministic).is_empty());
}

#[test]
fn test_ethiopic_homophones_match() {
    let config = MatchingConfig::default().with_language(LanguageConfig::new(Language::Amharic));
    // ሐ and ሀ series spell the same name
    let source = Record::new("s").with_field(FIRST_NAME, "ሐጎስ").with_field(LAST_NAME, "ተስፋዬ");
    let target = Record::new("t").with_field(FIRST_NAME, "ሀጎስ").with_field(LAST_NAME, "ተስፋዬ");

    let breakdown = score(&source, &target, &config, Algorithm::Deterministic);
    assert_eq!(breakdown.score, 100);
}

#[test]
fn test_script_detection_overrides_default_language() {
    let config = MatchingConfig::default();
    let source = Record::new("s").with_field(FIRST_NAME, "ዐለሙ");
    let target = Record::new("t").with_field(FIRST_NAME, "አለሙ");

    let breakdown = score(&source, &target, &config, Algorithm::Deterministic);
    assert_eq!(breakdown.score, 100);
}

#[test]
fn test_identifiers_and_phone_contribute() {
    let config = MatchingConfig::default();
    let source = john_smith()
        .with_field(PHONE, "+251 911 234 567")
        .with_identifier("MRN", "A-100");
    let target = john_smith()
        .with_field(PHONE, "251911234567")
        .with_identifier("mrn", "a100");

    let breakdown = score(&source, &target, &config, Algorithm::Probabilistic);
    assert!(breakdown.matched_on.contains(&"Phone".to_string()));
    assert!(breakdown.matched_on.contains(&"Identifiers".to_string()));
    assert_eq!(breakdown.score, 100);
}

#[test]
fn test_imported_rows_rank_against_typed_records() {
    let config = MatchingConfig::default();
    let imported = record_from_pairs([
        ("RecordId", "import-7"),
        ("First Name", "Jon"),
        ("surname", "Smith"),
        ("DOB", "1980-05-01"),
        ("Sex", "M"),
    ])
    .unwrap();

    let ranked = rank(&john_smith(), &[imported], &config, Algorithm::Deterministic);
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].record.id, "import-7");
}

#[test]
fn test_custom_registry_through_ranker() {
    let config = MatchingConfig::default().with_weight("kebele", 30.0);
    let registry = FieldRegistry::standard().register("kebele", "Kebele", Comparator::Exact);
    let scorer = record_linkage_matching::ranker::scorer_with_registry(
        &config,
        Algorithm::Deterministic,
        registry,
    );
    let ranker = Ranker::new(&config, Algorithm::Deterministic).with_scorer(scorer);

    let source = john_smith().with_field("kebele", "07");
    let same = john_smith().with_field("kebele", "07");
    let other = john_smith().with_field("kebele", "08");

    let ranked = ranker.rank(&source, &[other, same]);
    assert_eq!(ranked[0].score, 100);
    assert_eq!(ranked[0].record.text("kebele"), Some("07"));
    assert!(ranked[1].score < 100);
}

fn name() -> impl Strategy<Value = String> {
    "[A-Za-z]{1,10}"
}

fn optional_text() -> impl Strategy<Value = Option<String>> {
    proptest::option::of("[A-Za-z ]{0,10}")
}

fn full_record() -> impl Strategy<Value = Record> {
    (
        (name(), name(), name(), name()),
        (1900i32..2020, 1u32..=12, 1u32..=28),
        (name(), name(), "[0-9]{6,10}", name()),
        "[A-Z0-9]{3,8}",
    )
        .prop_map(|((first, middle, last, gender), (y, m, d), (village, sub, phone, head), id)| {
            Record::new("r")
                .with_field(FIRST_NAME, first)
                .with_field(MIDDLE_NAME, middle)
                .with_field(LAST_NAME, last)
                .with_field(GENDER, gender)
                .with_field(BIRTH_DATE, format!("{:04}-{:02}-{:02}", y, m, d))
                .with_field(VILLAGE, village)
                .with_field(SUB_VILLAGE, sub)
                .with_field(PHONE, phone)
                .with_field(HOUSEHOLD_HEAD, head)
                .with_identifier("national_id", id)
        })
}

fn sparse_record() -> impl Strategy<Value = Record> {
    (
        optional_text(),
        optional_text(),
        optional_text(),
        proptest::option::of("19[0-9]{2}(-0[1-9](-1[0-9])?)?"),
        proptest::option::of(prop_oneof![Just("Male".to_string()), Just("Female".to_string())]),
    )
        .prop_map(|(first, last, village, birth, gender)| {
            let mut record = Record::new("p");
            record.first_name = first;
            record.last_name = last;
            record.village = village;
            record.birth_date = birth;
            record.gender = gender;
            record
        })
}

proptest! {
    #[test]
    fn prop_self_match_is_perfect(record in full_record()) {
        let config = MatchingConfig::default();
        let breakdown = score(&record, &record, &config, Algorithm::Deterministic);
        prop_assert_eq!(breakdown.score, 100);
    }

    #[test]
    fn prop_scores_are_bounded(a in sparse_record(), b in sparse_record()) {
        let config = MatchingConfig::default();
        for algorithm in [Algorithm::Deterministic, Algorithm::Probabilistic] {
            let breakdown = score(&a, &b, &config, algorithm);
            prop_assert!(breakdown.score <= 100);
            prop_assert!(breakdown.field_scores.values().all(|s| *s <= 100));
        }
    }

    #[test]
    fn prop_deterministic_score_is_symmetric(a in sparse_record(), b in sparse_record()) {
        let config = MatchingConfig::default();
        let forward = score(&a, &b, &config, Algorithm::Deterministic);
        let backward = score(&b, &a, &config, Algorithm::Deterministic);
        prop_assert_eq!(forward.score, backward.score);
        prop_assert_eq!(forward.field_scores, backward.field_scores);
    }

    #[test]
    fn prop_probabilistic_score_is_symmetric(a in sparse_record(), b in sparse_record()) {
        let config = MatchingConfig::default();
        let forward = score(&a, &b, &config, Algorithm::Probabilistic);
        let backward = score(&b, &a, &config, Algorithm::Probabilistic);
        prop_assert_eq!(forward.score, backward.score);
    }

    #[test]
    fn prop_rank_is_ordered_and_thresholded(
        source in sparse_record(),
        pool in proptest::collection::vec(sparse_record(), 0..12),
    ) {
        let config = MatchingConfig::lenient();
        for algorithm in [Algorithm::Deterministic, Algorithm::Probabilistic] {
            let ranked = rank(&source, &pool, &config, algorithm);
            let minimum = match algorithm {
                Algorithm::Deterministic => config.threshold.low,
                Algorithm::Probabilistic => config.probabilistic.min_score,
            };

            prop_assert!(ranked.len() <= pool.len());
            prop_assert!(ranked.iter().all(|c| c.score >= minimum));
            prop_assert!(ranked.windows(2).all(|pair| pair[0].score >= pair[1].score));
        }
    }
}
