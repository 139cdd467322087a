//! Property tests for the tip and db-sync parsers.

use proptest::prelude::*;
use syncbench::domain::models::{parse_db_sync_row, ProgressReading, SyncPrecision};

fn tip_json(epoch: u64, block: u64, slot: u64, percent: Option<f64>, as_string: bool) -> String {
    let mut doc = serde_json::json!({
        "epoch": epoch,
        "block": block,
        "hash": "9c1a",
        "slot": slot,
        "era": "Conway",
    });
    if let Some(p) = percent {
        doc["syncProgress"] = if as_string {
            serde_json::Value::String(format!("{p:.2}"))
        } else {
            serde_json::json!(p)
        };
    }
    doc.to_string()
}

proptest! {
    #[test]
    fn sync_percent_is_none_iff_field_absent(
        epoch in 0u64..10_000,
        block in 0u64..100_000_000,
        slot in 0u64..1_000_000_000,
        percent in proptest::option::of(0.0f64..=100.0),
        as_string in any::<bool>(),
        float in any::<bool>(),
    ) {
        let precision = if float { SyncPrecision::Float } else { SyncPrecision::Integer };
        let reading = ProgressReading::from_tip_json(
            &tip_json(epoch, block, slot, percent, as_string),
            precision,
        ).unwrap();

        prop_assert_eq!(reading.sync_percent.is_none(), percent.is_none());
        prop_assert_eq!(reading.block, block);
        prop_assert_eq!(reading.epoch, Some(epoch));
        prop_assert_eq!(reading.era.as_str(), "conway");
    }

    #[test]
    fn integer_precision_never_exceeds_the_source(percent in 0.0f64..=100.0) {
        let reading = ProgressReading::from_tip_json(
            &tip_json(1, 1, 1, Some(percent), false),
            SyncPrecision::Integer,
        ).unwrap();
        let p = reading.sync_percent.unwrap();

        prop_assert_eq!(p.fract(), 0.0);
        prop_assert!(p <= percent);
        prop_assert!(percent - p < 1.0);
    }

    #[test]
    fn db_sync_rows_keep_float_precision(
        percent in 0.0f64..=100.0,
        block in 0u64..100_000_000,
        slot in 0u64..1_000_000_000,
    ) {
        let row = format!(" {percent} | 12 | {block} | abcdef | {slot}");
        let (parsed, tip) = parse_db_sync_row(&row).unwrap();

        prop_assert!((parsed - percent).abs() < 1e-9);
        prop_assert_eq!(tip.block, block);
        prop_assert_eq!(tip.slot, slot);
    }
}
