// tests/normalize_roundtrip.rs
use housing_signals::normalize::zillow::normalize_table;
use housing_signals::normalize::{melt, pivot_to_wide, WideTable};

const EXPORT: &str = "\
RegionID,SizeRank,RegionName,RegionType,StateName,2023-11-30,2023-12-31,2024-01-31
394913,1,\"New York, NY\",msa,NY,650000,652000.5,655000
753899,2,\"Los Angeles, CA\",msa,CA,900000,,910000
394514,3,\"Chicago, IL\",msa,IL,300000,301000,302000
";

fn id_columns() -> Vec<String> {
    ["RegionID", "SizeRank", "RegionName", "RegionType", "StateName"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[test]
fn melt_then_pivot_reproduces_the_matrix() {
    let wide = WideTable::from_reader(EXPORT.as_bytes()).unwrap();
    let long = melt(&wide, &id_columns()).unwrap();
    assert_eq!(long.dropped_nulls, 1);
    assert_eq!(long.rows.len(), 8);

    let back = pivot_to_wide(&long);
    assert_eq!(back.rows.len(), wide.rows.len());
    assert_eq!(&back.headers[5..], &wide.headers[5..]);
    for (orig, rebuilt) in wide.rows.iter().zip(&back.rows) {
        assert_eq!(&orig[..5], &rebuilt[..5]);
        for (a, b) in orig[5..].iter().zip(&rebuilt[5..]) {
            let a: Option<f64> = a.parse().ok();
            let b: Option<f64> = b.parse().ok();
            assert_eq!(a, b);
        }
    }
}

#[test]
fn facts_keep_identity_and_metric_tag() {
    let wide = WideTable::from_reader(EXPORT.as_bytes()).unwrap();
    let (facts, dropped) = normalize_table(&wide, "zhvi", &id_columns()).unwrap();
    assert_eq!(dropped, 1);
    assert_eq!(facts.len(), 8);
    assert!(facts.iter().all(|f| f.metric_type == "zhvi" && f.region_type == "msa"));
    let la: Vec<_> = facts.iter().filter(|f| f.region_id == "753899").collect();
    assert_eq!(la.len(), 2);
    assert_eq!(la[0].state_name.as_deref(), Some("CA"));
}
