use std::collections::HashSet;

use elasticutils_core::query::{QueryBuilder, SortField, SortOrder};
use elasticutils_core::scan::{PaginatedScanner, ScanOptions, ScanState};
use elasticutils_core::transport::memory::InMemoryEngine;
use serde_json::{json, Value};

const BASE: &str = "http://cluster.test:9200";

fn seeded(n: u64) -> InMemoryEngine {
    let engine = InMemoryEngine::new(BASE);
    engine.create_index("metrics");
    for i in 0..n {
        // repeated timestamps force the tie-breaker to matter
        engine.insert("metrics", json!({ "seq": i, "timestamp": i / 3 }));
    }
    engine
}

fn seqs(records: &[Value]) -> Vec<u64> {
    records.iter().map(|r| r["seq"].as_u64().unwrap()).collect()
}

#[test]
fn scan_emits_min_of_total_and_cap_without_duplicates() {
    for (n, batch, cap) in [
        (0, 5, 10),
        (7, 3, 100),
        (7, 7, 100),
        (20, 6, 13),
        (20, 6, 20),
        (20, 50, 5),
        (31, 4, 31),
    ] {
        let engine = seeded(n);
        let scanner = PaginatedScanner::new(&engine, BASE);
        let pit = scanner.open("metrics", "1m").unwrap();

        let mut scan = scanner
            .scan(
                &pit,
                &QueryBuilder::new().build(),
                ScanOptions::new().batch_size(batch).max_records(cap),
            )
            .unwrap();
        let records: Vec<Value> = scan.by_ref().map(|h| h.unwrap().source).collect();

        let expected = n.min(cap) as usize;
        assert_eq!(records.len(), expected, "n={n} batch={batch} cap={cap}");

        let unique: HashSet<u64> = seqs(&records).into_iter().collect();
        assert_eq!(unique.len(), expected, "duplicates for n={n} batch={batch}");

        let expected_state = if n < cap {
            ScanState::Exhausted
        } else {
            ScanState::LimitReached
        };
        assert_eq!(scan.state(), expected_state, "n={n} batch={batch} cap={cap}");

        for req in engine.requests() {
            if let Some(size) = req.body.as_ref().and_then(|b| b["size"].as_u64()) {
                assert!(size <= batch && size >= 1, "bad page size {size}");
            }
        }
    }
}

#[test]
fn resuming_from_cursor_continues_the_sequence() {
    let engine = seeded(40);
    let scanner = PaginatedScanner::new(&engine, BASE);
    let pit = scanner.open("metrics", "1m").unwrap();
    let query = QueryBuilder::new().build();

    let (whole, _) = scanner
        .collect(&pit, &query, ScanOptions::new().batch_size(7))
        .unwrap();
    assert_eq!(whole.len(), 40);

    // cut mid-batch: 11 is not a multiple of 7
    let (head, cursor) = scanner
        .collect(&pit, &query, ScanOptions::new().batch_size(7).max_records(11))
        .unwrap();
    let (tail, _) = scanner
        .collect(
            &pit,
            &query,
            ScanOptions::new().batch_size(7).initial_cursor(cursor),
        )
        .unwrap();

    let mut joined = head;
    joined.extend(tail);
    assert_eq!(seqs(&joined), seqs(&whole));
}

#[test]
fn lazy_scan_cursor_supports_resume_after_early_stop() {
    let engine = seeded(12);
    let scanner = PaginatedScanner::new(&engine, BASE);
    let pit = scanner.open("metrics", "1m").unwrap();
    let query = QueryBuilder::new().build();

    let mut scan = scanner
        .scan(&pit, &query, ScanOptions::new().batch_size(5))
        .unwrap();
    let first: Vec<Value> = scan.by_ref().take(3).map(|h| h.unwrap().source).collect();
    assert_eq!(scan.state(), ScanState::HasMore);
    let cursor = scan.cursor().cloned();
    drop(scan);

    let (rest, _) = scanner
        .collect(&pit, &query, ScanOptions::new().initial_cursor(cursor))
        .unwrap();
    assert_eq!(first.len() + rest.len(), 12);

    let mut all = seqs(&first);
    all.extend(seqs(&rest));
    let unique: HashSet<u64> = all.iter().copied().collect();
    assert_eq!(unique.len(), 12);
}

#[test]
fn snapshot_ignores_documents_written_after_open() {
    let engine = seeded(10);
    let scanner = PaginatedScanner::new(&engine, BASE);
    let pit = scanner.open("metrics", "1m").unwrap();

    for i in 100..105 {
        engine.insert("metrics", json!({ "seq": i, "timestamp": 1000 }));
    }

    let (records, _) = scanner
        .collect(
            &pit,
            &QueryBuilder::new().build(),
            ScanOptions::new().batch_size(4),
        )
        .unwrap();
    assert_eq!(records.len(), 10);
    assert!(seqs(&records).iter().all(|s| *s < 100));
}

#[test]
fn ascending_composite_sort_is_honoured() {
    let engine = seeded(9);
    let scanner = PaginatedScanner::new(&engine, BASE);
    let pit = scanner.open("metrics", "1m").unwrap();

    let sort = vec![
        SortField::new("timestamp", SortOrder::Asc),
        SortField::new("seq", SortOrder::Desc),
    ];
    let (records, cursor) = scanner
        .collect(
            &pit,
            &QueryBuilder::new().build(),
            ScanOptions::new().batch_size(2).sort(sort),
        )
        .unwrap();
    assert_eq!(seqs(&records), vec![2, 1, 0, 5, 4, 3, 8, 7, 6]);
    assert_eq!(cursor.unwrap().values()[..2], [json!(2), json!(6)]);
}

#[test]
fn two_scans_share_one_snapshot() {
    let engine = seeded(6);
    let scanner = PaginatedScanner::new(&engine, BASE);
    let pit = scanner.open("metrics", "1m").unwrap();
    let query = QueryBuilder::new().build();

    let mut a = scanner
        .scan(&pit, &query, ScanOptions::new().batch_size(2))
        .unwrap();
    let mut b = scanner
        .scan(&pit, &query, ScanOptions::new().batch_size(4))
        .unwrap();

    let mut from_a = Vec::new();
    let mut from_b = Vec::new();
    loop {
        let na = a.next();
        let nb = b.next();
        if na.is_none() && nb.is_none() {
            break;
        }
        if let Some(h) = na {
            from_a.push(h.unwrap().source);
        }
        if let Some(h) = nb {
            from_b.push(h.unwrap().source);
        }
    }
    assert_eq!(seqs(&from_a), seqs(&from_b));
    assert_eq!(from_a.len(), 6);

    let report = scanner.close_pit(&pit).unwrap();
    assert!(report.succeeded);
    assert_eq!(engine.open_snapshots(), 0);
}
