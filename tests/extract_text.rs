// tests/extract_text.rs
use housing_signals::extract::{extract_price, normalize_text, Gazetteer, GazetteerEntry, TextExtractor};

fn gazetteer() -> Gazetteer {
    let rows = [
        ("New York", "NY", 8_300_000),
        ("York", "PA", 45_000),
        ("Austin", "TX", 960_000),
        ("Portland", "OR", 650_000),
        ("Portland", "ME", 68_000),
        ("San Antonio", "TX", 1_400_000),
        ("Antioch", "CA", 115_000),
    ];
    Gazetteer::from_entries(
        rows.into_iter().map(|(c, s, p)| GazetteerEntry {
            city: c.into(),
            state: s.into(),
            population: p,
        }),
        200_000,
    )
    .unwrap()
}

#[test]
fn price_examples() {
    assert_eq!(extract_price("$450K"), Some(450_000.0));
    assert_eq!(extract_price("450k"), Some(450_000.0));
    assert_eq!(extract_price("$1.2M"), Some(1_200_000.0));
    assert_eq!(extract_price("$450,000"), Some(450_000.0));
    assert_eq!(extract_price("$999"), None);
}

#[test]
fn suffix_amounts_are_exact_multiples() {
    for (amount, suffix, factor) in [("275", "K", 1_000.0), ("3.5", "m", 1_000_000.0), ("0.9", "M", 1_000_000.0)] {
        let text = format!("under contract at ${amount}{suffix} today");
        let expected = amount.parse::<f64>().unwrap() * factor;
        assert_eq!(extract_price(&text), Some(expected));
    }
}

#[test]
fn explicit_location_wins() {
    let x = TextExtractor::new(gazetteer());
    assert_eq!(
        x.extract_location("moving to Austin, TX next year").as_deref(),
        Some("Austin, TX")
    );
    // unknown state code falls through to the gazetteer
    assert_eq!(
        x.extract_location("Springfield, ZZ or maybe portland").as_deref(),
        Some("Portland, OR")
    );
    assert_eq!(x.extract_location("somewhere quiet"), None);
}

#[test]
fn only_the_first_city_state_candidate_counts() {
    let x = TextExtractor::new(gazetteer());
    // "Thanks, AI" comes first and is not a state pair, so the later
    // "Boise, ID" is never looked at.
    assert_eq!(
        x.extract_location("Thanks, AI helped. We left Austin for Boise, ID").as_deref(),
        Some("Austin, TX")
    );
    assert_eq!(
        x.extract_location("Thanks, AI helped. No idea yet, ID later"),
        None
    );
}

#[test]
fn mentions_prefer_longer_names_and_dedupe() {
    let x = TextExtractor::new(gazetteer());
    let text = normalize_text("Leaving New York for San Antonio \u{2014} or Austin, TX. austin wins?");
    let mentions = x.extract_city_mentions(&text);
    assert_eq!(mentions, vec!["Austin, TX", "San Antonio, TX", "New York, NY"]);
}

#[test]
fn small_cities_are_not_matched() {
    let x = TextExtractor::new(gazetteer());
    assert!(x.extract_city_mentions("we toured york and antioch").is_empty());
}
