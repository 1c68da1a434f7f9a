use jarsmith_core::archive::{Conflict, ConflictOutcome, ConflictResolver, Resolution};
use jarsmith_core::manifest::MANIFEST_PATH;
use jarsmith_core::{assemble_uber, Error, Manifest, MergePolicy, UberOptions};
use jarsmith_testing::assertions::assert_unique_entries;
use jarsmith_testing::fixtures::{
    write_corrupt_jar, write_jar, write_jar_with_corrupt_entry, JAR_ENTRY_EPOCH_SECS,
};
use jarsmith_testing::helpers::{digest, file_entry_names, pin_tree_mtimes, read_entries};
use jarsmith_testing::{init_tracing, TestDir};
use std::fs;
use std::path::{Path, PathBuf};

fn manifest() -> Manifest {
    Manifest::build("jarsmith-test", "17", Some("com.acme.App")).unwrap()
}

/// L1 = {a.txt: x}, L2 = {a.txt: y, b.txt: z} and an empty class directory
fn two_libraries(test_dir: &TestDir) -> (PathBuf, PathBuf, PathBuf) {
    let l1 = write_jar(&test_dir.join("lib/l1.jar"), &[("a.txt", b"x")]).unwrap();
    let l2 = write_jar(
        &test_dir.join("lib/l2.jar"),
        &[("a.txt", b"y"), ("b.txt", b"z")],
    )
    .unwrap();
    let classes = test_dir.create_dir("classes").unwrap();
    (l1, l2, classes)
}

fn staging_options(test_dir: &TestDir) -> UberOptions {
    UberOptions {
        staging_root: Some(test_dir.join("staging")),
        ..Default::default()
    }
}

fn is_empty_dir(path: &Path) -> bool {
    fs::read_dir(path).unwrap().next().is_none()
}

#[test]
fn test_last_library_wins_and_conflict_is_reported() {
    init_tracing();
    let test_dir = TestDir::new().unwrap();
    let (l1, l2, classes) = two_libraries(&test_dir);
    let uber = test_dir.join("target/app-standalone.jar");

    let report = assemble_uber(
        &[&l1, &l2],
        &classes,
        &uber,
        &manifest(),
        UberOptions::default(),
    )
    .unwrap();

    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(report.conflicts[0].path.as_str(), "a.txt");
    assert_eq!(report.conflicts[0].source, l2);
    assert_eq!(report.conflicts[0].previous_source, Some(l1.clone()));
    assert_eq!(report.conflicts[0].outcome, ConflictOutcome::Overwritten);

    assert_unique_entries(&uber).unwrap();
    assert_eq!(file_entry_names(&uber).unwrap(), vec!["a.txt", "b.txt"]);
    let entries = read_entries(&uber).unwrap();
    assert_eq!(entries["a.txt"], b"y");
    assert_eq!(entries["b.txt"], b"z");
    assert_eq!(report.jar.files, 2);
    assert!(report.staging_dir.is_none());
}

#[test]
fn test_swapping_library_order_flips_the_winner() {
    let test_dir = TestDir::new().unwrap();
    let (l1, l2, classes) = two_libraries(&test_dir);
    let uber = test_dir.join("app.jar");

    let report = assemble_uber(
        &[&l2, &l1],
        &classes,
        &uber,
        &manifest(),
        UberOptions::default(),
    )
    .unwrap();

    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(report.conflicts[0].source, l1);
    let entries = read_entries(&uber).unwrap();
    assert_eq!(entries["a.txt"], b"x");
    assert_eq!(entries["b.txt"], b"z");
}

#[test]
fn test_directory_sources_report_conflicts_too() {
    let test_dir = TestDir::new().unwrap();
    test_dir.create_file("lib-dir/a.txt", b"from library").unwrap();
    test_dir.create_file("classes/a.txt", b"from classes").unwrap();
    let library = test_dir.join("lib-dir");
    let classes = test_dir.join("classes");
    let uber = test_dir.join("app.jar");

    let report = assemble_uber(
        &[&library],
        &classes,
        &uber,
        &manifest(),
        UberOptions::default(),
    )
    .unwrap();

    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(report.conflicts[0].source, classes);
    assert_eq!(report.conflicts[0].previous_source, Some(library));
    assert_eq!(read_entries(&uber).unwrap()["a.txt"], b"from classes");
}

#[test]
fn test_first_wins_policy_keeps_earliest() {
    let test_dir = TestDir::new().unwrap();
    let (l1, l2, classes) = two_libraries(&test_dir);
    let uber = test_dir.join("app.jar");
    let options = UberOptions {
        merge_policy: MergePolicy::FirstWins,
        ..Default::default()
    };

    let report = assemble_uber(&[&l1, &l2], &classes, &uber, &manifest(), options).unwrap();

    assert_eq!(report.conflicts[0].outcome, ConflictOutcome::Kept);
    assert_eq!(read_entries(&uber).unwrap()["a.txt"], b"x");
}

#[test]
fn test_error_on_conflict_aborts_without_output() {
    let test_dir = TestDir::new().unwrap();
    let (l1, l2, classes) = two_libraries(&test_dir);
    let uber = test_dir.join("app.jar");
    let options = UberOptions {
        merge_policy: MergePolicy::ErrorOnConflict,
        ..staging_options(&test_dir)
    };

    let err = assemble_uber(&[&l1, &l2], &classes, &uber, &manifest(), options).unwrap_err();

    match err {
        Error::MergeConflict { path, origin } => {
            assert_eq!(path, "a.txt");
            assert_eq!(origin, l2);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!uber.exists());
    assert!(is_empty_dir(&test_dir.join("staging")));
}

struct ConcatenateServices;

impl ConflictResolver for ConcatenateServices {
    fn resolve(&mut self, conflict: &Conflict<'_>) -> jarsmith_core::Result<Resolution> {
        if conflict.path.as_str().starts_with("META-INF/services/") {
            let mut merged = fs::read(conflict.staged)?;
            merged.extend_from_slice(conflict.incoming);
            Ok(Resolution::Replace(merged))
        } else {
            Ok(Resolution::Overwrite)
        }
    }
}

#[test]
fn test_custom_resolver_merges_service_files() {
    let test_dir = TestDir::new().unwrap();
    let service = "META-INF/services/com.acme.Plugin";
    let l1 = write_jar(&test_dir.join("lib/l1.jar"), &[(service, b"one.Impl\n")]).unwrap();
    let l2 = write_jar(&test_dir.join("lib/l2.jar"), &[(service, b"two.Impl\n")]).unwrap();
    let classes = test_dir.create_dir("classes").unwrap();
    let uber = test_dir.join("app.jar");
    let options = UberOptions {
        merge_policy: MergePolicy::custom(ConcatenateServices),
        ..Default::default()
    };

    let report = assemble_uber(&[&l1, &l2], &classes, &uber, &manifest(), options).unwrap();

    assert_eq!(report.conflicts[0].outcome, ConflictOutcome::Replaced);
    assert_eq!(read_entries(&uber).unwrap()[service], b"one.Impl\ntwo.Impl\n");
}

#[test]
fn test_library_manifests_and_signatures_are_excluded() {
    let test_dir = TestDir::new().unwrap();
    let l1 = write_jar(
        &test_dir.join("lib/l1.jar"),
        &[
            ("META-INF/", b""),
            (MANIFEST_PATH, b"Manifest-Version: 1.0\r\nMain-Class: lib.One\r\n\r\n"),
            ("META-INF/SIGNER.SF", b"sig"),
            ("META-INF/SIGNER.RSA", b"key"),
            ("META-INF/maven/acme/one/pom.xml", b"<project/>"),
        ],
    )
    .unwrap();
    let l2 = write_jar(
        &test_dir.join("lib/l2.jar"),
        &[(MANIFEST_PATH, b"Manifest-Version: 1.0\r\nMain-Class: lib.Two\r\n\r\n")],
    )
    .unwrap();
    let classes = test_dir.create_dir("classes").unwrap();
    let uber = test_dir.join("app.jar");

    let report = assemble_uber(
        &[&l1, &l2],
        &classes,
        &uber,
        &manifest(),
        UberOptions::default(),
    )
    .unwrap();

    assert!(report.conflicts.is_empty());
    assert_unique_entries(&uber).unwrap();
    let entries = read_entries(&uber).unwrap();
    assert!(!entries.contains_key("META-INF/SIGNER.SF"));
    assert!(!entries.contains_key("META-INF/SIGNER.RSA"));
    assert!(entries.contains_key("META-INF/maven/acme/one/pom.xml"));
    let packaged = Manifest::parse(&entries[MANIFEST_PATH]).unwrap();
    assert_eq!(packaged.main_class(), Some("com.acme.App"));
}

#[test]
fn test_class_directory_is_merged_last() {
    let test_dir = TestDir::new().unwrap();
    let (l1, _, _) = two_libraries(&test_dir);
    test_dir.create_file("classes/a.txt", b"local").unwrap();
    test_dir.create_file("classes/com/acme/App.class", b"\xCA\xFE").unwrap();
    let classes = test_dir.join("classes");
    let uber = test_dir.join("app.jar");

    let report = assemble_uber(&[&l1], &classes, &uber, &manifest(), UberOptions::default())
        .unwrap();

    assert_eq!(report.conflicts.len(), 1);
    let entries = read_entries(&uber).unwrap();
    assert_eq!(entries["a.txt"], b"local");
    assert!(entries.contains_key("com/acme/"));
    assert!(entries.contains_key("com/acme/App.class"));
}

#[test]
fn test_staging_is_removed_after_success() {
    let test_dir = TestDir::new().unwrap();
    let (l1, l2, classes) = two_libraries(&test_dir);
    let uber = test_dir.join("app.jar");

    let report = assemble_uber(
        &[&l1, &l2],
        &classes,
        &uber,
        &manifest(),
        staging_options(&test_dir),
    )
    .unwrap();

    assert!(report.staging_dir.is_none());
    assert!(is_empty_dir(&test_dir.join("staging")));
}

#[test]
fn test_kept_staging_holds_merged_tree_with_entry_times() {
    let test_dir = TestDir::new().unwrap();
    let (l1, l2, classes) = two_libraries(&test_dir);
    let uber = test_dir.join("app.jar");
    let options = UberOptions {
        keep_staging: true,
        ..staging_options(&test_dir)
    };

    let report = assemble_uber(&[&l1, &l2], &classes, &uber, &manifest(), options).unwrap();

    let staging = report.staging_dir.expect("staging directory kept");
    assert!(staging.starts_with(test_dir.join("staging")));
    assert_eq!(fs::read(staging.join("a.txt")).unwrap(), b"y");
    assert_eq!(fs::read(staging.join("b.txt")).unwrap(), b"z");

    let mtime = filetime::FileTime::from_last_modification_time(
        &fs::metadata(staging.join("b.txt")).unwrap(),
    );
    assert_eq!(mtime.unix_seconds(), JAR_ENTRY_EPOCH_SECS);
}

#[test]
fn test_corrupt_library_is_archive_format_error() {
    let test_dir = TestDir::new().unwrap();
    let (l1, _, classes) = two_libraries(&test_dir);
    let broken = write_corrupt_jar(&test_dir.join("lib/broken.jar")).unwrap();
    let uber = test_dir.join("app.jar");

    let result = assemble_uber(
        &[&l1, &broken],
        &classes,
        &uber,
        &manifest(),
        staging_options(&test_dir),
    );

    assert!(matches!(result, Err(Error::ArchiveFormat(_))));
    assert!(!uber.exists());
    assert!(is_empty_dir(&test_dir.join("staging")));
}

#[test]
fn test_corrupt_entry_body_is_archive_format_error() {
    let test_dir = TestDir::new().unwrap();
    let broken = write_jar_with_corrupt_entry(&test_dir.join("lib/l1.jar")).unwrap();
    let classes = test_dir.create_dir("classes").unwrap();
    let uber = test_dir.join("app.jar");

    let result = assemble_uber(
        &[&broken],
        &classes,
        &uber,
        &manifest(),
        staging_options(&test_dir),
    );

    match result {
        Err(Error::ArchiveFormat(message)) => assert!(message.contains("a.txt")),
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(!uber.exists());
    assert!(is_empty_dir(&test_dir.join("staging")));
}

#[test]
fn test_rebuild_later_is_byte_identical() {
    let test_dir = TestDir::new().unwrap();
    let library = write_jar(
        &test_dir.join("lib/dep.jar"),
        &[("com/", b"".as_slice()), ("com/Dep.class", b"dep".as_slice())],
    )
    .unwrap();
    test_dir
        .create_file("classes/org/acme/App.class", b"app")
        .unwrap();
    let classes = test_dir.join("classes");
    pin_tree_mtimes(&classes, 1_600_000_000).unwrap();
    let first = test_dir.join("first.jar");
    let second = test_dir.join("second.jar");

    assemble_uber(&[&library], &classes, &first, &manifest(), UberOptions::default()).unwrap();
    // Past the two-second resolution of DOS timestamps
    std::thread::sleep(std::time::Duration::from_millis(2100));
    assemble_uber(&[&library], &classes, &second, &manifest(), UberOptions::default()).unwrap();

    assert_eq!(
        file_entry_names(&first).unwrap(),
        vec!["com/Dep.class", "org/acme/App.class"]
    );
    assert_eq!(digest(&first).unwrap(), digest(&second).unwrap());
}

#[test]
fn test_missing_library_is_not_found() {
    let test_dir = TestDir::new().unwrap();
    let classes = test_dir.create_dir("classes").unwrap();
    let missing = test_dir.join("lib/missing.jar");

    let result = assemble_uber(
        &[&missing],
        &classes,
        test_dir.join("app.jar"),
        &manifest(),
        UberOptions::default(),
    );

    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[test]
fn test_missing_class_directory_is_not_found() {
    let test_dir = TestDir::new().unwrap();
    let (l1, _, _) = two_libraries(&test_dir);

    let result = assemble_uber(
        &[&l1],
        test_dir.join("no-classes"),
        test_dir.join("app.jar"),
        &manifest(),
        UberOptions::default(),
    );

    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[test]
fn test_non_archive_library_files_are_skipped() {
    let test_dir = TestDir::new().unwrap();
    let (l1, _, classes) = two_libraries(&test_dir);
    let pom = test_dir.create_file("lib/l1.pom", b"<project/>").unwrap();
    let uber = test_dir.join("app.jar");

    let report = assemble_uber(
        &[&l1, &pom],
        &classes,
        &uber,
        &manifest(),
        UberOptions::default(),
    )
    .unwrap();

    assert!(report.conflicts.is_empty());
    assert_eq!(file_entry_names(&uber).unwrap(), vec!["a.txt"]);
}
