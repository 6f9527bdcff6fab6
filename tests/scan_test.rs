use quickfind::search::session::BATCH_SIZE;
use quickfind::{Config, LiveScanner, Result, ScanOptions, SearchEvent};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};
use tempfile::TempDir;

fn touch(path: &Path, mtime: u64) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, b"x")?;
    fs::File::options()
        .write(true)
        .open(path)?
        .set_modified(UNIX_EPOCH + Duration::from_secs(mtime))?;
    Ok(())
}

/// Scan options that do not skip the temp directory
fn options(max_depth: usize) -> ScanOptions {
    ScanOptions {
        max_depth,
        show_hidden: false,
        excluded_prefixes: Vec::new(),
        batch_size: BATCH_SIZE,
    }
}

#[test]
fn test_overlapping_roots_report_each_file_once() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("root");
    touch(&root.join("sub/shared_match.txt"), 10)?;
    touch(&root.join("top_match.txt"), 20)?;
    touch(&root.join("other.txt"), 30)?;

    let scanner = LiveScanner::new(options(100));
    let results = scanner
        .scan("match", &[root.clone(), root.join("sub"), root.clone()])
        .collect();

    let paths: Vec<_> = results.iter().map(|r| r.path.clone()).collect();
    let unique: HashSet<_> = paths.iter().cloned().collect();
    assert_eq!(paths.len(), 2);
    assert_eq!(unique.len(), 2);
    assert!(unique.contains(&root.join("sub/shared_match.txt")));
    assert!(unique.contains(&root.join("top_match.txt")));
    Ok(())
}

#[test]
fn test_batches_are_bounded_and_newest_first() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("root");
    for i in 0..130u64 {
        touch(&root.join(format!("dir_{}/hit_{:03}.txt", i % 4, i)), 1_000 + i)?;
    }

    let scanner = LiveScanner::new(options(100));
    let batches = scanner.scan("hit .txt", &[root]).batches();

    let total: usize = batches.iter().map(Vec::len).sum();
    assert_eq!(total, 130);
    for batch in &batches {
        assert!(!batch.is_empty());
        assert!(batch.len() <= BATCH_SIZE);
        assert!(batch.windows(2).all(|w| w[0].mtime >= w[1].mtime));
    }
    let unique: HashSet<PathBuf> = batches.into_iter().flatten().map(|r| r.path).collect();
    assert_eq!(unique.len(), 130);
    Ok(())
}

#[test]
fn test_cancelled_scan_ends_with_finished() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("root");
    for i in 0..400u64 {
        touch(&root.join(format!("d{}/e{}/item_{}.dat", i % 10, i % 7, i)), i)?;
    }

    let scanner = LiveScanner::new(options(100));
    let handle = scanner.scan("item", &[root]);
    handle.cancel();

    let mut finished = false;
    while let Some(event) = handle.recv_timeout(Duration::from_secs(10)) {
        if event == SearchEvent::Finished {
            finished = true;
            break;
        }
    }
    assert!(finished, "cancelled scan never reported Finished");
    // Nothing follows the terminal signal
    assert_eq!(handle.recv_timeout(Duration::from_millis(200)), None);
    Ok(())
}

#[test]
fn test_cancel_after_first_batch() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("root");
    for i in 0..600u64 {
        touch(&root.join(format!("d{}/item_{}.dat", i % 12, i)), i)?;
    }

    let mut small_batches = options(100);
    small_batches.batch_size = 10;
    let scanner = LiveScanner::new(small_batches);
    let handle = scanner.scan("item", &[root]);

    let first = handle.recv_timeout(Duration::from_secs(10));
    assert!(matches!(first, Some(SearchEvent::Batch(ref batch)) if !batch.is_empty()));

    handle.cancel();
    let mut finished = false;
    while let Some(event) = handle.recv_timeout(Duration::from_secs(10)) {
        match event {
            SearchEvent::Batch(batch) => assert!(batch.len() <= 10),
            SearchEvent::Finished => {
                finished = true;
                break;
            }
        }
    }
    assert!(finished, "cancelled scan never reported Finished");
    assert_eq!(handle.recv_timeout(Duration::from_millis(200)), None);
    Ok(())
}

#[test]
fn test_relative_roots_report_absolute_paths() -> Result<()> {
    let scratch = TempDir::new_in(".").unwrap();
    let relative_root = scratch.path().join("root");
    assert!(relative_root.is_relative());
    touch(&relative_root.join("found.txt"), 1)?;

    let results = LiveScanner::new(options(100))
        .scan("found", &[relative_root])
        .collect();
    assert_eq!(results.len(), 1);
    assert!(results[0].path.is_absolute());
    Ok(())
}

#[test]
fn test_scan_respects_max_depth() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("root");
    touch(&root.join("one_target.txt"), 1)?;
    touch(&root.join("a/two_target.txt"), 1)?;
    touch(&root.join("a/b/three_target.txt"), 1)?;

    let scanner = LiveScanner::new(options(2));
    let names: HashSet<String> = scanner
        .scan("target", &[root])
        .collect()
        .into_iter()
        .map(|r| r.name)
        .collect();

    assert!(names.contains("one_target.txt"));
    assert!(names.contains("two_target.txt"));
    assert!(!names.contains("three_target.txt"));
    Ok(())
}

#[test]
fn test_scan_skips_hidden_ignored_and_excluded() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("root");
    let reserved = temp_dir.path().join("reserved");
    touch(&root.join("notes_found.md"), 1)?;
    touch(&root.join(".hidden_found.md"), 1)?;
    touch(&root.join(".config/nested_found.md"), 1)?;
    touch(&root.join("node_modules/pkg_found.md"), 1)?;
    touch(&reserved.join("reserved_found.md"), 1)?;

    let scanner = LiveScanner::new(options(100).with_excluded_prefixes(vec![reserved.clone()]));
    let names: Vec<String> = scanner
        .scan("found", &[root.clone(), reserved.clone()])
        .collect()
        .into_iter()
        .map(|r| r.name)
        .collect();
    assert_eq!(names, vec!["notes_found.md".to_string()]);

    let mut visible = options(100);
    visible.show_hidden = true;
    let names: HashSet<String> = LiveScanner::new(visible)
        .scan("found", &[root])
        .collect()
        .into_iter()
        .map(|r| r.name)
        .collect();
    assert!(names.contains(".hidden_found.md"));
    assert!(names.contains("nested_found.md"));
    assert!(!names.contains("pkg_found.md"));
    Ok(())
}

#[test]
fn test_scan_applies_exclusions() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("root");
    touch(&root.join("report.pdf"), 1)?;
    touch(&root.join("report_draft.pdf"), 2)?;
    touch(&root.join("report.docx"), 3)?;

    let scanner = LiveScanner::new(options(100));
    let names: Vec<String> = scanner
        .scan("report !draft !.docx", &[root])
        .collect()
        .into_iter()
        .map(|r| r.name)
        .collect();
    assert_eq!(names, vec!["report.pdf".to_string()]);
    Ok(())
}

#[test]
fn test_empty_query_and_missing_roots() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let scanner = LiveScanner::new(options(100));

    let handle = scanner.scan("  ", &[temp_dir.path().to_path_buf()]);
    assert_eq!(handle.recv_timeout(Duration::from_secs(5)), Some(SearchEvent::Finished));

    let results = scanner
        .scan("anything", &[temp_dir.path().join("does-not-exist")])
        .collect();
    assert!(results.is_empty());
    Ok(())
}

#[test]
fn test_new_scan_supersedes_previous() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("root");
    touch(&root.join("first.txt"), 1)?;
    touch(&root.join("second.txt"), 1)?;

    let scanner = LiveScanner::new(options(100));
    let first = scanner.scan("first", &[root.clone()]);
    let second = scanner.scan("second", &[root]);
    assert!(first.is_cancelled());

    first.batches();
    let results = second.collect();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].name, "second.txt");
    Ok(())
}

#[test]
fn test_options_from_config() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::new(Some(temp_dir.path().join("qf")))?
        .with_show_hidden(true)
        .with_max_depth(7);
    let options = ScanOptions::from_config(&config);
    assert_eq!(options.max_depth, 7);
    assert!(options.show_hidden);
    assert_eq!(options.batch_size, BATCH_SIZE);
    assert!(options.excluded_prefixes.contains(&PathBuf::from("/tmp")));
    Ok(())
}
