use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use trawl::{
    search, CancellationToken, DirectoryPredicate, EmptyOption, EntryKind, ExtensionFilter,
    Filter, MatcherOptions, SearchTarget, SizeFilter, TerminationReason, TrawlError,
};

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// Create a temporary directory tree for testing.
///
/// Structure:
/// ```
/// tmp/
///   invoice_jan.txt
///   invoice_feb.txt
///   report.txt
///   notes.md
///   subdir/
///     invoice_mar.txt
///     other.rs
///     deep/
///       data.bin
/// ```
fn setup_test_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    fs::write(root.join("invoice_jan.txt"), "january invoice").unwrap();
    fs::write(root.join("invoice_feb.txt"), "february invoice").unwrap();
    fs::write(root.join("report.txt"), "quarterly report").unwrap();
    fs::write(root.join("notes.md"), "some notes").unwrap();

    let sub = root.join("subdir");
    fs::create_dir(&sub).unwrap();
    fs::write(sub.join("invoice_mar.txt"), "march invoice").unwrap();
    fs::write(sub.join("other.rs"), "fn main() {}").unwrap();

    let deep = sub.join("deep");
    fs::create_dir(&deep).unwrap();
    fs::write(deep.join("data.bin"), [0u8, 1, 2, 3, 4, 5]).unwrap();

    dir
}

fn named(pattern: &str) -> MatcherOptions {
    MatcherOptions::named(Filter::new(pattern).unwrap())
}

/// Paths of every match, in walk order.
fn walk(builder: trawl::SearchBuilder) -> Vec<PathBuf> {
    builder
        .build()
        .unwrap()
        .map(|entry| entry.unwrap().into_path())
        .collect()
}

fn file_names(paths: &[PathBuf]) -> BTreeSet<String> {
    paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

#[test]
fn finds_matching_files() {
    let dir = setup_test_dir();
    let results = search(dir.path())
        .files(named("invoice"))
        .collect_matches(true)
        .run()
        .unwrap();

    assert_eq!(results.telemetry.matches, 3, "should find 3 invoice files");
    assert_eq!(results.matches.len(), 3);
    assert_eq!(results.termination, TerminationReason::Completed);
    assert!(results
        .matches
        .iter()
        .all(|m| m.kind() == EntryKind::File && m.name_capture().unwrap().value == "invoice"));
}

#[test]
fn matches_are_not_collected_by_default() {
    let dir = setup_test_dir();
    let results = search(dir.path()).files(named("invoice")).run().unwrap();

    assert_eq!(results.telemetry.matches, 3);
    assert!(results.matches.is_empty());
}

#[test]
fn respects_limit() {
    let dir = setup_test_dir();
    let results = search(dir.path())
        .files(named("invoice"))
        .limit(2)
        .collect_matches(true)
        .run()
        .unwrap();

    assert_eq!(results.matches.len(), 2);
    assert_eq!(results.termination, TerminationReason::MaxReached);
}

#[test]
fn zero_limit_is_rejected() {
    let dir = setup_test_dir();
    let err = search(dir.path()).limit(0).build().unwrap_err();
    assert!(matches!(err, TrawlError::InvalidConfig(_)));
    assert!(!err.is_recoverable());
}

#[test]
fn missing_root_is_an_invalid_source() {
    let dir = setup_test_dir();
    let missing = dir.path().join("nope");
    let err = search(&missing).run().unwrap_err();
    assert!(matches!(err, TrawlError::InvalidSource(ref p) if p == &missing));
}

#[test]
fn file_only_filters_are_rejected_for_directories() {
    let dir = setup_test_dir();
    let options = MatcherOptions {
        extension: Some(ExtensionFilter::new(["txt"])),
        ..MatcherOptions::default()
    };
    let err = search(dir.path()).directories(options).build().unwrap_err();
    assert!(matches!(err, TrawlError::InvalidConfig(_)));
}

#[test]
fn yields_the_full_listing_and_repeats_it() {
    let dir = setup_test_dir();

    let first = walk(search(dir.path()).target(SearchTarget::All));
    let second = walk(search(dir.path()).target(SearchTarget::All));

    let expected: BTreeSet<PathBuf> = walkdir::WalkDir::new(dir.path())
        .min_depth(1)
        .into_iter()
        .map(|e| e.unwrap().into_path())
        .collect();
    let found: BTreeSet<PathBuf> = first.iter().cloned().collect();

    assert_eq!(found, expected);
    assert_eq!(first.len(), expected.len(), "no entry may be yielded twice");
    assert_eq!(first, second, "same tree, same sequence");
}

#[test]
fn walks_breadth_first_with_files_before_subdirectories() {
    let dir = setup_test_dir();
    let mut walker = search(dir.path()).target(SearchTarget::All).build().unwrap();

    let mut seen: Vec<(PathBuf, usize, bool)> = Vec::new();
    for entry in walker.by_ref() {
        let entry = entry.unwrap();
        seen.push((entry.path().to_path_buf(), entry.depth(), entry.is_directory()));
    }

    let depths: Vec<usize> = seen.iter().map(|(_, depth, _)| *depth).collect();
    assert!(depths.windows(2).all(|w| w[0] <= w[1]), "depths: {depths:?}");

    for (parent, _, _) in seen.iter().filter(|(_, _, is_dir)| *is_dir) {
        let children: Vec<bool> = seen
            .iter()
            .filter(|(p, _, _)| p.parent() == Some(parent.as_path()))
            .map(|(_, _, is_dir)| *is_dir)
            .collect();
        let first_dir = children.iter().position(|d| *d).unwrap_or(children.len());
        assert!(children[first_dir..].iter().all(|d| *d), "files after a directory in {parent:?}");
    }

    let telemetry = walker.telemetry();
    assert_eq!(telemetry.searched_directories, 3);
    assert_eq!(telemetry.files, 7);
    assert_eq!(telemetry.directories, 2);
    assert_eq!(telemetry.matches, 9);
}

#[test]
fn filters_by_extension() {
    let dir = setup_test_dir();
    let options = MatcherOptions {
        extension: Some(ExtensionFilter::new([".TXT"])),
        ..MatcherOptions::default()
    };
    let found = walk(search(dir.path()).files(options));

    assert_eq!(
        file_names(&found),
        ["invoice_feb.txt", "invoice_jan.txt", "invoice_mar.txt", "report.txt"]
            .into_iter()
            .map(String::from)
            .collect()
    );
}

#[test]
fn size_is_summed_for_matches() {
    let dir = setup_test_dir();
    let results = search(dir.path())
        .files(named(r"\.bin$"))
        .run()
        .unwrap();
    assert_eq!(results.telemetry.matches, 1);
    assert_eq!(results.telemetry.total_size, 6);
}

#[test]
fn walker_sums_sizes_a_filter_already_fetched() {
    let dir = setup_test_dir();
    let options = MatcherOptions {
        size: Some(SizeFilter::AtLeast(1)),
        ..named(r"\.bin$")
    };
    let mut walker = search(dir.path()).files(options).build().unwrap();
    let entry = walker.next().unwrap().unwrap();

    assert!(entry.metadata_state().is_fetched());
    assert_eq!(walker.telemetry().total_size, 6);
}

#[test]
fn recurse_off_stays_in_the_root() {
    let dir = setup_test_dir();
    let found = walk(search(dir.path()).files(named("invoice")).recurse(false));
    assert_eq!(found.len(), 2);
    assert!(found.iter().all(|p| p.parent() == Some(dir.path())));
}

#[test]
fn matched_directories_are_not_entered_without_recurse_match() {
    let dir = setup_test_dir();

    let entered = walk(search(dir.path()).target(SearchTarget::Directories));
    assert_eq!(entered, vec![dir.path().join("subdir"), dir.path().join("subdir/deep")]);

    let not_entered = walk(
        search(dir.path())
            .target(SearchTarget::Directories)
            .can_recurse_match(false),
    );
    assert_eq!(not_entered, vec![dir.path().join("subdir")]);
}

// ---------------------------------------------------------------------------
// Directory predicate
// ---------------------------------------------------------------------------

#[test]
fn negative_predicate_prunes_the_subtree() {
    let dir = setup_test_dir();
    let predicate = DirectoryPredicate::new(Filter::new("^subdir$").unwrap().negate());
    let found = walk(
        search(dir.path())
            .target(SearchTarget::All)
            .directory_predicate(predicate),
    );

    assert!(!found.iter().any(|p| p.starts_with(dir.path().join("subdir"))));
    assert_eq!(found.len(), 4);
}

#[test]
fn positive_predicate_limits_which_files_match() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("a/keep/inner")).unwrap();
    fs::create_dir_all(root.join("a/drop")).unwrap();
    fs::write(root.join("a/top.txt"), "").unwrap();
    fs::write(root.join("a/keep/x.txt"), "").unwrap();
    fs::write(root.join("a/keep/inner/z.txt"), "").unwrap();
    fs::write(root.join("a/drop/y.txt"), "").unwrap();

    let predicate = DirectoryPredicate::new(Filter::new("^keep$").unwrap());
    let found = walk(search(root).directory_predicate(predicate));

    assert_eq!(
        file_names(&found),
        ["x.txt", "z.txt"].into_iter().map(String::from).collect()
    );
}

#[test]
fn gitignore_predicate_skips_ignored_directories() {
    let dir = setup_test_dir();
    let root = dir.path();
    fs::create_dir(root.join("build")).unwrap();
    fs::write(root.join("build/out.txt"), "artifact").unwrap();
    fs::write(root.join(".gitignore"), "build/\n").unwrap();

    let predicate = DirectoryPredicate::from_gitignore(root, root.join(".gitignore")).unwrap();
    let found = walk(search(root).directory_predicate(predicate));

    assert!(!found.iter().any(|p| p.starts_with(root.join("build"))));
    assert!(found.contains(&root.join("subdir/deep/data.bin")));
}

// ---------------------------------------------------------------------------
// Content and emptiness
// ---------------------------------------------------------------------------

#[test]
fn content_filter_reads_utf16_with_bom() {
    let dir = tempfile::tempdir().unwrap();
    let mut bytes = vec![0xFF, 0xFE];
    bytes.extend("hello world".encode_utf16().flat_map(u16::to_le_bytes));
    fs::write(dir.path().join("wide.txt"), bytes).unwrap();
    fs::write(dir.path().join("plain.txt"), "hello there").unwrap();

    let options = MatcherOptions {
        content: Some(Filter::new("world").unwrap()),
        ..MatcherOptions::default()
    };
    let results = search(dir.path())
        .files(options)
        .collect_matches(true)
        .run()
        .unwrap();

    assert_eq!(results.matches.len(), 1);
    let found = &results.matches[0];
    assert_eq!(found.path(), dir.path().join("wide.txt"));
    assert_eq!(found.content_capture().unwrap().start, 6);
    let text = found.text().unwrap();
    assert!(text.has_bom);
    assert_eq!(text.encoding.name(), "UTF-16LE");
}

#[test]
fn default_encoding_applies_without_bom() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("menu.txt"), b"caf\xE9").unwrap();

    let options = MatcherOptions {
        content: Some(Filter::new("café").unwrap()),
        ..MatcherOptions::default()
    };

    let utf8 = search(dir.path()).files(options.clone()).run().unwrap();
    assert_eq!(utf8.telemetry.matches, 0);

    let latin = search(dir.path())
        .files(options)
        .default_encoding(encoding_rs::WINDOWS_1252)
        .run()
        .unwrap();
    assert_eq!(latin.telemetry.matches, 1);
}

#[test]
fn bom_only_files_count_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("zero.txt"), "").unwrap();
    fs::write(dir.path().join("bom.txt"), [0xEF, 0xBB, 0xBF]).unwrap();
    fs::write(dir.path().join("full.txt"), "x").unwrap();

    let options = MatcherOptions {
        empty: EmptyOption::Empty,
        ..MatcherOptions::default()
    };
    let found = walk(search(dir.path()).files(options));
    assert_eq!(
        file_names(&found),
        ["bom.txt", "zero.txt"].into_iter().map(String::from).collect()
    );
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[test]
fn cancellation_yields_a_prefix() {
    let dir = setup_test_dir();
    let full = walk(search(dir.path()).target(SearchTarget::All));

    let token = CancellationToken::new();
    let mut walker = search(dir.path())
        .target(SearchTarget::All)
        .cancellation(token.clone())
        .build()
        .unwrap();

    let prefix: Vec<PathBuf> = walker
        .by_ref()
        .take(2)
        .map(|e| e.unwrap().into_path())
        .collect();
    token.cancel();

    assert!(walker.next().is_none());
    assert_eq!(walker.termination(), Some(TerminationReason::Canceled));
    assert_eq!(prefix.as_slice(), &full[..2]);
}

#[test]
fn cancelled_before_start_yields_nothing() {
    let dir = setup_test_dir();
    let token = CancellationToken::new();
    token.cancel();

    let results = search(dir.path()).cancellation(token).run().unwrap();
    assert_eq!(results.telemetry.matches, 0);
    assert_eq!(results.termination, TerminationReason::Canceled);
}

#[test]
fn entry_metadata_is_lazy() {
    let dir = setup_test_dir();
    let mut walker = search(dir.path()).files(named("report")).build().unwrap();
    let mut entry = walker.next().unwrap().unwrap();

    // A name filter needs no metadata.
    assert!(!entry.metadata_state().is_fetched());
    assert_eq!(walker.telemetry().total_size, 0);
    assert_eq!(entry.metadata().unwrap().len(), "quarterly report".len() as u64);
    assert!(entry.metadata_state().is_fetched());
    assert_eq!(entry.span().unwrap().as_str(), "report.txt");
    assert_eq!(Path::new(entry.span().unwrap().path()), entry.path());
}
