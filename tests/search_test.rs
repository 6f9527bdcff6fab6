use quickfind::search::orchestrator::COARSE_LIMIT;
use quickfind::search::session::BATCH_SIZE;
use quickfind::{FileRecord, IndexStore, Result, SearchEvent, SearchOrchestrator};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn orchestrator_with(temp_dir: &TempDir, records: &[FileRecord]) -> Result<Arc<SearchOrchestrator>> {
    let store = IndexStore::open_at(&temp_dir.path().join("index.redb"))?;
    store.upsert_batch(records)?;
    Ok(Arc::new(SearchOrchestrator::new(Arc::new(store))))
}

fn record(path: &str, mtime: f64) -> FileRecord {
    FileRecord::new(PathBuf::from(path), mtime, 1)
}

#[test]
fn test_refine_drops_negated_terms_and_extensions() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let orchestrator = orchestrator_with(
        &temp_dir,
        &[
            record("/docs/report.pdf", 10.0),
            record("/docs/report_draft.pdf", 20.0),
            record("/docs/report.docx", 30.0),
            record("/docs/summary.pdf", 40.0),
        ],
    )?;

    let names = |query: &str| -> Vec<String> {
        orchestrator.search(query).into_iter().map(|r| r.name).collect()
    };

    assert_eq!(names("report !draft"), vec!["report.docx", "report.pdf"]);
    assert_eq!(names("report !.docx"), vec!["report_draft.pdf", "report.pdf"]);
    assert_eq!(names("report .pdf"), vec!["report_draft.pdf", "report.pdf"]);
    assert_eq!(names(".pdf"), vec!["summary.pdf", "report_draft.pdf", "report.pdf"]);
    assert!(names("nothing-like-this").is_empty());
    Ok(())
}

#[test]
fn test_and_terms_all_required() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let orchestrator = orchestrator_with(
        &temp_dir,
        &[
            record("/a/report_2024.pdf", 1.0),
            record("/a/report_2023.pdf", 2.0),
            record("/a/budget_2024.xlsx", 3.0),
        ],
    )?;

    let results = orchestrator.search("REPORT 2024");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].name, "report_2024.pdf");
    Ok(())
}

#[test]
fn test_or_alternatives_are_merged_without_duplicates() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let orchestrator = orchestrator_with(
        &temp_dir,
        &[
            record("/x/invoice.pdf", 1.0),
            record("/x/receipt.pdf", 2.0),
            record("/x/invoice_receipt.pdf", 3.0),
            record("/x/letter.pdf", 4.0),
        ],
    )?;

    let results = orchestrator.search("invoice|receipt");
    let paths: Vec<_> = results.iter().map(|r| r.path.clone()).collect();
    let unique: HashSet<_> = paths.iter().collect();
    assert_eq!(paths.len(), 3);
    assert_eq!(unique.len(), 3);
    assert!(!paths.contains(&PathBuf::from("/x/letter.pdf")));
    Ok(())
}

#[test]
fn test_coarse_stage_is_capped() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let records: Vec<_> = (0..COARSE_LIMIT + 200)
        .map(|i| record(&format!("/logs/app_{:05}.log", i), i as f64))
        .collect();
    let orchestrator = orchestrator_with(&temp_dir, &records)?;

    let results = orchestrator.search("app");
    assert_eq!(results.len(), COARSE_LIMIT);
    // The cap keeps the most recent candidates
    assert_eq!(results[0].mtime, (COARSE_LIMIT + 199) as f64);
    Ok(())
}

#[test]
fn test_background_search_emits_bounded_batches() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let records: Vec<_> = (0..120)
        .map(|i| record(&format!("/data/file_{:03}.txt", i), i as f64))
        .collect();
    let orchestrator = orchestrator_with(&temp_dir, &records)?;

    let batches = orchestrator.start("file").batches();
    let sizes: Vec<_> = batches.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![BATCH_SIZE, BATCH_SIZE, 20]);

    let mtimes: Vec<_> = batches.iter().flatten().map(|r| r.mtime).collect();
    assert!(mtimes.windows(2).all(|w| w[0] >= w[1]));
    Ok(())
}

#[test]
fn test_empty_query_finishes_immediately() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let orchestrator = orchestrator_with(&temp_dir, &[record("/a/b.txt", 1.0)])?;

    for text in ["", "   ", "|"] {
        let handle = orchestrator.start(text);
        assert_eq!(handle.recv_timeout(Duration::from_secs(5)), Some(SearchEvent::Finished));
        assert_eq!(handle.recv_timeout(Duration::from_millis(50)), None);
    }
    assert!(orchestrator.search("").is_empty());
    Ok(())
}

#[test]
fn test_new_search_supersedes_previous() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let orchestrator = orchestrator_with(
        &temp_dir,
        &[record("/a/alpha.txt", 1.0), record("/a/beta.txt", 2.0)],
    )?;

    let first = orchestrator.start("alpha");
    let second = orchestrator.start("beta");
    assert!(first.is_cancelled());
    assert!(!second.is_cancelled());

    // The superseded handle still terminates
    first.batches();

    let results = second.collect();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].name, "beta.txt");

    let third = orchestrator.start("alpha");
    orchestrator.cancel_current();
    assert!(third.is_cancelled());
    Ok(())
}
