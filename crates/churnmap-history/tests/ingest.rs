use chrono::NaiveDate;
use churnmap_core::ChurnmapError;
use churnmap_history::duration::Duration;
use churnmap_history::hotgraph::{build_hotgraph, HotgraphOptions};
use churnmap_history::hotspots::{detect_hotspots, HotspotOptions};
use churnmap_history::mining::{ingest, IngestOptions};
use churnmap_history::table::CommitTable;
use git2::{Commit, Oid, Repository, Signature, Time};
use tempfile::TempDir;

const DEC_01_2022: i64 = 1_669_852_800;
const MAR_01_2023: i64 = 1_677_628_800;
const MAR_02_2023: i64 = 1_677_715_200;
const APR_01_2023: i64 = 1_680_307_200;
const MAY_01_2023: i64 = 1_682_899_200;
const FEB_01_2024: i64 = 1_706_745_600;
const DAY: i64 = 86_400;

struct Fixture {
    _dir: TempDir,
    repo: Repository,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        Self { _dir: dir, repo }
    }

    fn path(&self) -> &std::path::Path {
        self._dir.path()
    }

    /// Commit a flat tree derived from `base` with `changes` applied
    /// (`None` deletes). `reference` of `None` leaves HEAD untouched.
    fn commit(
        &self,
        reference: Option<&str>,
        author: &str,
        time: i64,
        base: Option<Oid>,
        changes: &[(&str, Option<&str>)],
        parents: &[Oid],
    ) -> Oid {
        let base_tree = base.map(|id| self.repo.find_commit(id).unwrap().tree().unwrap());
        let mut builder = self.repo.treebuilder(base_tree.as_ref()).unwrap();
        for (path, content) in changes {
            match content {
                Some(text) => {
                    let blob = self.repo.blob(text.as_bytes()).unwrap();
                    builder.insert(*path, blob, 0o100644).unwrap();
                }
                None => builder.remove(*path).unwrap(),
            }
        }
        let tree = self.repo.find_tree(builder.write().unwrap()).unwrap();
        let sig = Signature::new(author, &format!("{author}@example.com"), &Time::new(time, 0)).unwrap();
        let parents: Vec<Commit> = parents
            .iter()
            .map(|id| self.repo.find_commit(*id).unwrap())
            .collect();
        let parent_refs: Vec<&Commit> = parents.iter().collect();
        self.repo
            .commit(reference, &sig, &sig, "change", &tree, &parent_refs)
            .unwrap()
    }
}

fn lines(n: usize, tag: &str) -> String {
    (0..n).map(|i| format!("{tag} line {i}\n")).collect()
}

fn year_2023(full: bool) -> IngestOptions {
    IngestOptions {
        branch: None,
        duration: Duration::range("2023-01-01", "2024-01-01").unwrap(),
        full,
    }
}

#[test]
fn window_bounds_and_merge_zeroing() {
    let fx = Fixture::new();
    let head = Some("HEAD");
    let c0 = fx.commit(head, "alice", DEC_01_2022, None, &[("a.txt", Some("one\n"))], &[]);
    let c1 = fx.commit(head, "alice", MAR_01_2023, Some(c0), &[("a.txt", Some("one\ntwo\nthree\n"))], &[c0]);
    let side = fx.commit(None, "bob", MAR_02_2023, Some(c1), &[("side.txt", Some("x\ny\n"))], &[c1]);
    let merge = fx.commit(head, "alice", APR_01_2023, Some(c1), &[("side.txt", Some("x\ny\n"))], &[c1, side]);
    fx.commit(head, "carol", FEB_01_2024, Some(merge), &[("a.txt", Some("changed\n"))], &[merge]);

    let table = ingest(fx.path(), &year_2023(true)).unwrap();
    let hashes: Vec<String> = table.records().iter().map(|r| r.hash.clone()).collect();
    assert_eq!(hashes, vec![c1.to_string(), side.to_string(), merge.to_string()]);

    let first = &table.records()[0];
    assert_eq!(first.insertions, 2);
    assert_eq!(first.deletions, 0);
    assert_eq!(first.file_count, 1);
    assert_eq!(first.author, "alice");
    assert_eq!(
        first.date,
        NaiveDate::from_ymd_opt(2023, 3, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
    );

    let merged = &table.records()[2];
    assert_eq!(merged.insertions, 0);
    assert_eq!(merged.deletions, 0);
    assert_eq!(merged.lines, 0);
    assert_eq!(merged.file_count, 0);
    assert_eq!(merged.per_file.as_ref().map(|m| m.len()), Some(0));
}

#[test]
fn renamed_files_resolve_to_their_newest_name() {
    let fx = Fixture::new();
    let head = Some("HEAD");
    let body = lines(20, "lib");
    let renamed_body = format!("{body}extra\n");
    let c1 = fx.commit(head, "alice", MAR_01_2023, None, &[("old.rs", Some(body.as_str()))], &[]);
    let c2 = fx.commit(
        head,
        "alice",
        MAR_01_2023 + 10 * DAY,
        Some(c1),
        &[("old.rs", None), ("new.rs", Some(renamed_body.as_str()))],
        &[c1],
    );
    fx.commit(
        head,
        "bob",
        MAR_01_2023 + 20 * DAY,
        Some(c2),
        &[("new.rs", Some(format!("{renamed_body}more\n").as_str()))],
        &[c2],
    );

    let table = ingest(fx.path(), &year_2023(true)).unwrap();
    let rename = table.records()[1].per_file.as_ref().unwrap();
    let stat = rename.get("old.rs => new.rs").expect("rename notation key");
    assert_eq!((stat.insertions, stat.deletions), (1, 0));

    let rows = table.expand_files(None);
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r.file_name == "new.rs"));
}

#[test]
fn root_commit_counts_every_line() {
    let fx = Fixture::new();
    fx.commit(Some("HEAD"), "alice", MAR_01_2023, None, &[("a.txt", Some("1\n2\n3\n")), ("b.txt", Some("1\n"))], &[]);

    let table = ingest(fx.path(), &year_2023(false)).unwrap();
    assert_eq!(table.len(), 1);
    let root = &table.records()[0];
    assert_eq!(root.insertions, 4);
    assert_eq!(root.file_count, 2);
    assert!(root.per_file.is_none());
}

#[test]
fn summary_export_has_no_detail_column() {
    let fx = Fixture::new();
    fx.commit(Some("HEAD"), "alice", MAR_01_2023, None, &[("a.txt", Some("1\n"))], &[]);

    let table = ingest(fx.path(), &year_2023(false)).unwrap();
    let mut buf = Vec::new();
    table.write_csv(&mut buf).unwrap();
    let text = String::from_utf8(buf).unwrap();
    assert!(text.starts_with("date,hexsha,author,insertions,deletions,lines,files\n"));
    assert!(text.contains("2023-03-01 00:00:00"));
}

#[test]
fn unknown_branch_is_a_git_error() {
    let fx = Fixture::new();
    fx.commit(Some("HEAD"), "alice", MAR_01_2023, None, &[("a.txt", Some("1\n"))], &[]);

    let options = IngestOptions {
        branch: Some("no-such-branch".into()),
        ..year_2023(false)
    };
    let err = ingest(fx.path(), &options).unwrap_err();
    assert!(matches!(err, ChurnmapError::Git(msg) if msg.contains("no-such-branch")));
}

#[test]
fn empty_window_gives_empty_table() {
    let fx = Fixture::new();
    fx.commit(Some("HEAD"), "alice", DEC_01_2022, None, &[("a.txt", Some("1\n"))], &[]);

    let table = ingest(fx.path(), &year_2023(true)).unwrap();
    assert!(table.is_empty());
    assert!(table.expand_files(None).is_empty());
}

#[test]
fn export_import_then_analyse() {
    let fx = Fixture::new();
    let head = Some("HEAD");
    let mut parent = fx.commit(head, "alice", MAR_01_2023, None, &[("api.rs", Some("0\n")), ("api_test.rs", Some("0\n"))], &[]);
    for i in 1..=4i64 {
        let author = if i % 2 == 0 { "alice" } else { "bob" };
        let api = lines(i as usize + 1, "api");
        let test = lines(i as usize + 1, "test");
        parent = fx.commit(
            head,
            author,
            MAR_01_2023 + i * DAY,
            Some(parent),
            &[("api.rs", Some(api.as_str())), ("api_test.rs", Some(test.as_str()))],
            &[parent],
        );
    }
    fx.commit(head, "carol", MAY_01_2023, Some(parent), &[("README.md", Some("hi\n"))], &[parent]);

    let table = ingest(fx.path(), &year_2023(true)).unwrap();
    assert_eq!(table.len(), 6);

    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.csv");
    let second = dir.path().join("second.csv");
    table.write_csv_path(&first).unwrap();
    table.write_csv_path(&second).unwrap();
    let back = CommitTable::read_csvs(&[first, second]).unwrap();
    assert_eq!(back, table);

    let rows = back.expand_files(None);
    let now = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
    let hotspots = detect_hotspots(rows.clone(), now, &HotspotOptions::default());
    assert!(hotspots.iter().any(|h| h.file_name == "api.rs" && h.authors == 2));

    let options = HotgraphOptions {
        rank: 0,
        min_threshold: 3,
        stop_retry: true,
        ..HotgraphOptions::default()
    };
    let report = build_hotgraph(&rows, &hotspots, &options);
    let edge = report.graph.edge("api.rs", "api_test.rs").expect("co-change edge");
    assert_eq!(edge.weight, 5);
    assert!(report.graph.node("README.md").is_none());
}

#[test]
fn subdirectory_path_finds_the_enclosing_repository() {
    let fx = Fixture::new();
    fx.commit(Some("HEAD"), "alice", MAR_01_2023, None, &[("a.txt", Some("1\n"))], &[]);
    let nested = fx.path().join("src").join("deep");
    std::fs::create_dir_all(&nested).unwrap();

    let table = ingest(&nested, &year_2023(false)).unwrap();
    assert_eq!(table.len(), 1);
}
