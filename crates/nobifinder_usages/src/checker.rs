use anyhow::{Context, Result};
use log::{debug, info, trace, warn};
use rayon::prelude::*;
use std::{
    fs,
    path::{Path, PathBuf},
    thread,
};

use nobifinder_core::{
    CollectorConfig, Dialect, FileResult, FinderError, MemberKind, MemberSpec, ParseError,
    SearchMode, Target, UsageHit, collect_source_files, find_package, resolve_target_file,
};

use crate::{
    config::{Config, EngineChoice},
    engine::{HeuristicEngine, collect_evidence, scan},
    filter::{self, FilterPolicy},
    producer::{Query, UsageProducer},
    syntax::JavaSyntaxAdapter,
    types::{ScanStats, SearchResult, SourceText},
};

static HEURISTIC: HeuristicEngine = HeuristicEngine;
static JAVA_SYNTAX: JavaSyntaxAdapter = JavaSyntaxAdapter;

/// Filtered hits of one source text.
#[derive(Debug, Clone)]
pub struct SourceScan {
    pub hits: Vec<UsageHit>,
    /// Package of the scanned file
    pub package: Option<String>,
    /// Set when the syntax producer failed and the heuristic scan was used
    pub fallback: Option<ParseError>,
}

enum FileOutcome {
    Scanned { result: Option<FileResult>, fell_back: bool },
    Skipped,
}

fn plural(kind: MemberKind) -> &'static str {
    match kind {
        MemberKind::Method => "methods",
        MemberKind::Field => "fields",
    }
}

/// Checks a member selection against what the target declares. Skipped when
/// the target declares nothing of the kind, since the listing is advisory.
fn validate_members(
    target: &Target,
    kind: MemberKind,
    raw: &str,
    spec: &MemberSpec,
) -> Result<(), FinderError> {
    let declared = target.members_of(kind);
    if declared.is_empty() {
        debug!("Target declares no {}; member selection not validated", plural(kind));
        return Ok(());
    }
    let unknown: Vec<&str> = match spec {
        MemberSpec::All => Vec::new(),
        MemberSpec::Names(names) => {
            names.iter().map(String::as_str).filter(|n| !declared.contains(n)).collect()
        }
        MemberSpec::Pattern(_) => {
            if spec.select(&declared).is_empty() {
                vec![raw.trim()]
            } else {
                Vec::new()
            }
        }
    };
    if unknown.is_empty() {
        return Ok(());
    }
    Err(FinderError::UnknownMember {
        kind: plural(kind),
        names: unknown.join(", "),
        available: declared.join(", "),
    })
}

/// Builds the per-file query from the resolved target and the member options.
pub fn build_query(target: Target, mode: SearchMode, member: Option<&str>) -> Result<Query> {
    let Some(kind) = mode.member_kind() else {
        return Ok(Query::class(target));
    };
    let raw = member.ok_or_else(|| FinderError::MissingMember(mode.to_string()))?;
    let spec = MemberSpec::compile(raw)?;
    validate_members(&target, kind, raw, &spec)?;
    Ok(Query::members(target, mode, spec).restrict_to_declared())
}

fn producer_for(engine: EngineChoice, dialect: Dialect) -> &'static dyn UsageProducer {
    match engine {
        EngineChoice::Auto if JAVA_SYNTAX.supports(dialect) => &JAVA_SYNTAX,
        _ => &HEURISTIC,
    }
}

/// Scans one source text: produce raw hits, gather file evidence, filter.
/// Never fails; a syntax producer error falls back to the heuristic scan.
pub fn scan_source(
    source: &SourceText,
    query: &Query,
    policy: &FilterPolicy,
    engine: EngineChoice,
) -> SourceScan {
    let producer = producer_for(engine, source.dialect);
    trace!("Scanning with producer '{}'", producer.name());
    let (raw, fallback) = match producer.produce(source, query) {
        Ok(raw) => (raw, None),
        Err(err) => (scan(source, query), Some(err)),
    };

    let evidence = collect_evidence(source, &query.target);
    let package = find_package(source.scrubbed.as_str());
    let hits = filter::apply(raw, &query.target, package.as_deref(), &evidence, policy);
    SourceScan { hits, package, fallback }
}

fn read_source(path: &Path) -> Result<SourceText, FinderError> {
    let bytes =
        fs::read(path).map_err(|source| FinderError::FileRead { path: path.to_path_buf(), source })?;
    let text = String::from_utf8(bytes).map_err(|_| FinderError::Decode { path: path.to_path_buf() })?;
    Ok(SourceText::new(text, Dialect::from_path_or_default(path)))
}

fn scan_file(
    path: &Path,
    root: &Path,
    query: &Query,
    policy: &FilterPolicy,
    engine: EngineChoice,
) -> FileOutcome {
    let thread_id = thread::current().id();
    debug!("Thread {:?} processing: {}", thread_id, path.display());

    let source = match read_source(path) {
        Ok(source) => source,
        Err(err) => {
            warn!("Skipping {}", err);
            return FileOutcome::Skipped;
        }
    };

    let scanned = scan_source(&source, query, policy, engine);
    if let Some(err) = &scanned.fallback {
        warn!("{}: {}; using heuristic scan", path.display(), err);
    }
    debug!("{}: {} hits after filtering", path.display(), scanned.hits.len());

    let result = (!scanned.hits.is_empty()).then(|| {
        let relative = path.strip_prefix(root).unwrap_or(path).to_path_buf();
        FileResult::new(relative, scanned.package, scanned.hits)
    });
    FileOutcome::Scanned { result, fell_back: scanned.fallback.is_some() }
}

pub fn run_usage_search(mut cfg: Config) -> Result<SearchResult> {
    info!("Starting usage search");
    cfg.initialize()?;
    let root: PathBuf = cfg.root.clone().context("root not resolved")?;
    info!("Using root directory: {}", root.display());

    let target = resolve_target_file(&cfg.target)?;
    info!("Target: {} ({} mode)", target.fqn, cfg.mode);
    let query = build_query(target, cfg.mode, cfg.member.as_deref())?;
    let policy = cfg.filter_policy();
    debug!("Filter policy: {:?}", policy);

    let files = collect_source_files(&CollectorConfig {
        root: root.clone(),
        extensions: cfg.extensions.clone(),
        exclude: Some(cfg.target.clone()),
        follow_links: cfg.follow_symlinks,
    })?;
    info!("Found {} source files", files.len());

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(cfg.max_workers)
        .build()
        .context("failed to build worker pool")?;
    debug!("Scanning with {} worker threads", pool.current_num_threads());

    let engine = cfg.engine;
    let outcomes: Vec<FileOutcome> = pool.install(|| {
        files.par_iter().map(|path| scan_file(path, &root, &query, &policy, engine)).collect()
    });

    let mut stats = ScanStats::default();
    let mut results = Vec::new();
    for outcome in outcomes {
        match outcome {
            FileOutcome::Scanned { result, fell_back } => {
                stats.files_scanned += 1;
                stats.syntax_fallbacks += usize::from(fell_back);
                results.extend(result);
            }
            FileOutcome::Skipped => stats.files_skipped += 1,
        }
    }
    results.sort_by(|a, b| a.path.cmp(&b.path));

    info!(
        "Usage search complete. {} files with hits ({} scanned, {} skipped, {} fallbacks)",
        results.len(),
        stats.files_scanned,
        stats.files_skipped,
        stats.syntax_fallbacks
    );
    let members = query.selected_members();
    Ok(SearchResult { target: query.target, mode: query.mode, members, root, results, stats })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nobifinder_core::UsageKind;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn create_test_file(dir: &Path, path: &str, content: &str) -> PathBuf {
        let file_path = dir.join(path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&file_path, content).unwrap();
        file_path
    }

    /// Target, users, an override, false positives and a gitignored build dir.
    fn create_project() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(root, ".gitignore", "build/\n*.tmp\n");
        create_test_file(
            root,
            "Foo.kt",
            r#"package com.example

data class Foo(val id: Int, var name: String) {
    fun doSomething() {}
    fun helper(x: Int) = x
    val computed: String get() = "test"
}
"#,
        );
        create_test_file(
            root,
            "MethodUser.kt",
            r#"package com.other
import com.example.Foo

class MethodUser {
    val foo = Foo(1, "test")

    fun test() {
        foo.doSomething()
        foo.helper(42)
    }
}
"#,
        );
        create_test_file(
            root,
            "FieldUser.kt",
            r#"package com.other
import com.example.Foo

class FieldUser {
    val f: Foo = Foo(1, "a")

    fun printName() {
        println(f.name)
        println(f.id)
    }
}
"#,
        );
        create_test_file(
            root,
            "Override.kt",
            r#"package com.other
import com.example.Foo

class SubClass : SomeBase() {
    override fun doSomething() {
        super.doSomething()
    }
}
"#,
        );
        create_test_file(
            root,
            "FalsePositives.kt",
            r#"package com.test

class FalsePositives {
    // This mentions doSomething in a comment
    val message = "doSomething is a method"
    val realUsage = com.example.Foo(1, "test")

    fun test() {
        realUsage.name = "updated"
    }
}
"#,
        );
        create_test_file(
            root,
            "build/Generated.kt",
            r#"package com.generated
import com.example.Foo

class Generated {
    val foo = Foo(1, "test")
    fun test() {
        foo.doSomething()
    }
}
"#,
        );
        temp_dir
    }

    fn config(root: &Path, mode: SearchMode, member: Option<&str>) -> Config {
        let mut cfg = Config::new(root.join("Foo.kt"));
        cfg.root = Some(root.to_path_buf());
        cfg.mode = mode;
        cfg.member = member.map(str::to_string);
        cfg
    }

    fn file_names(result: &SearchResult) -> Vec<String> {
        result.results.iter().map(|r| r.path.to_string_lossy().replace('\\', "/")).collect()
    }

    #[test]
    fn test_class_mode_project() {
        let project = create_project();
        let result = run_usage_search(config(project.path(), SearchMode::Class, None)).unwrap();

        assert_eq!(result.target.fqn, "com.example.Foo");
        assert_eq!(
            file_names(&result),
            vec!["FalsePositives.kt", "FieldUser.kt", "MethodUser.kt", "Override.kt"]
        );
        let field_user = &result.results[1];
        let kinds: Vec<_> = field_user.hits().iter().map(|h| (h.line, h.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                (2, UsageKind::Import),
                (5, UsageKind::TypeReference),
                (5, UsageKind::ConstructorCall)
            ]
        );
        assert_eq!(field_user.package.as_deref(), Some("com.other"));
        assert!(field_user.hits().iter().all(|h| h.member.is_none()));
        assert_eq!(result.stats.files_scanned, 4);
        assert_eq!(result.stats.files_skipped, 0);
    }

    #[test]
    fn test_method_mode_project() {
        let project = create_project();
        let cfg = config(project.path(), SearchMode::Method, Some("doSomething"));
        let result = run_usage_search(cfg).unwrap();

        assert_eq!(file_names(&result), vec!["MethodUser.kt", "Override.kt"]);
        let method_user = result.results[0].hits();
        assert_eq!(method_user.len(), 1);
        assert_eq!(method_user[0].kind, UsageKind::MethodCall);
        assert_eq!((method_user[0].line, method_user[0].column), (8, 12));
        assert_eq!(method_user[0].snippet, "foo.doSomething()");

        let overrides: Vec<_> = result.results[1].hits().iter().map(|h| h.kind).collect();
        assert_eq!(overrides, vec![UsageKind::Override, UsageKind::MethodCall]);
    }

    #[test]
    fn test_field_mode_project() {
        let project = create_project();
        let cfg = config(project.path(), SearchMode::Field, Some("name"));
        let result = run_usage_search(cfg).unwrap();

        assert_eq!(file_names(&result), vec!["FalsePositives.kt", "FieldUser.kt"]);
        assert_eq!(result.results[0].hits()[0].kind, UsageKind::FieldAssignment);
        assert_eq!(result.results[1].hits()[0].kind, UsageKind::FieldAccess);
        assert!(
            result.results.iter().flat_map(|r| r.hits()).all(|h| h.member.as_deref() == Some("name"))
        );
    }

    #[test]
    fn test_strict_import_drops_unqualified_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(root, "User.kt", "package com.example\n\nclass User {\n    fun doSomething() {}\n}\n");
        create_test_file(root, "app/Main.kt", "val u = User(\"x\")\nu.doSomething()\n");

        let mut cfg = Config::new(root.join("User.kt"));
        cfg.root = Some(root.to_path_buf());
        let permissive = run_usage_search(cfg.clone()).unwrap();
        assert_eq!(permissive.total_hits(), 1);

        cfg.strict_import = true;
        let strict = run_usage_search(cfg).unwrap();
        assert!(strict.results.is_empty());
    }

    #[test]
    fn test_same_package_relaxation() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(root, "User.kt", "package com.example\n\nclass User\n");
        create_test_file(root, "Near.kt", "package com.example\n\nval u: User? = null\n");
        create_test_file(root, "Far.kt", "package com.far\n\nval u: User? = null\n");

        let mut cfg = Config::new(root.join("User.kt"));
        cfg.root = Some(root.to_path_buf());
        cfg.strict_import = true;
        cfg.same_package_ok = true;
        let result = run_usage_search(cfg).unwrap();
        assert_eq!(file_names(&result), vec!["Near.kt"]);
    }

    #[test]
    fn test_member_errors_are_typed() {
        let project = create_project();

        let missing = run_usage_search(config(project.path(), SearchMode::Method, None)).unwrap_err();
        assert!(matches!(
            missing.downcast_ref::<FinderError>(),
            Some(FinderError::MissingMember(mode)) if mode == "method"
        ));

        let unknown = run_usage_search(config(project.path(), SearchMode::Method, Some("nope")))
            .unwrap_err();
        match unknown.downcast_ref::<FinderError>() {
            Some(FinderError::UnknownMember { kind, names, available }) => {
                assert_eq!(*kind, "methods");
                assert_eq!(names, "nope");
                assert!(available.contains("doSomething"));
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let invalid = run_usage_search(config(project.path(), SearchMode::Field, Some("/(/")))
            .unwrap_err();
        assert!(matches!(
            invalid.downcast_ref::<FinderError>(),
            Some(FinderError::InvalidPattern { .. })
        ));

        let unmatched = run_usage_search(config(project.path(), SearchMode::Field, Some("/zzz.*/")))
            .unwrap_err();
        assert!(matches!(
            unmatched.downcast_ref::<FinderError>(),
            Some(FinderError::UnknownMember { kind: "fields", .. })
        ));
    }

    #[test]
    fn test_target_without_class_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        create_test_file(temp_dir.path(), "Empty.kt", "package com.example\n\nfun top() = 1\n");
        let mut cfg = Config::new(temp_dir.path().join("Empty.kt"));
        cfg.root = Some(temp_dir.path().to_path_buf());
        let err = run_usage_search(cfg).unwrap_err();
        let finder = err.downcast_ref::<FinderError>().unwrap();
        assert!(matches!(finder, FinderError::TargetParse(_)));
        assert!(finder.is_fatal());
    }

    #[test]
    fn test_undecodable_file_is_skipped() {
        let project = create_project();
        fs::write(project.path().join("Binary.kt"), [0xff, 0xfe, 0x00, 0x46, 0x6f, 0x6f]).unwrap();
        let result = run_usage_search(config(project.path(), SearchMode::Class, None)).unwrap();
        assert_eq!(result.stats.files_skipped, 1);
        assert_eq!(result.results.len(), 4);
    }

    #[test]
    fn test_java_parse_failure_falls_back() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(root, "User.java", "package com.example;\n\npublic class User {}\n");
        create_test_file(
            root,
            "Good.java",
            "import com.example.User;\n\nclass Good {\n    User u = new User();\n}\n",
        );
        create_test_file(
            root,
            "Broken.java",
            "import com.example.User;\n\nclass Broken {\n    User u = new User(;\n",
        );

        let mut cfg = Config::new(root.join("User.java"));
        cfg.root = Some(root.to_path_buf());
        let auto = run_usage_search(cfg.clone()).unwrap();
        assert_eq!(auto.stats.syntax_fallbacks, 1);
        assert_eq!(file_names(&auto), vec!["Broken.java", "Good.java"]);

        cfg.engine = EngineChoice::Heuristic;
        let heuristic = run_usage_search(cfg).unwrap();
        assert_eq!(heuristic.stats.syntax_fallbacks, 0);
        assert_eq!(heuristic.results, auto.results);
    }

    #[test]
    fn test_worker_count_does_not_change_results() {
        let project = create_project();
        for i in 0..12 {
            create_test_file(
                project.path(),
                &format!("copies/c{i:02}/MethodUser.kt"),
                "package com.other\nimport com.example.Foo\n\nfun run() {\n    val foo = Foo(1, \"x\")\n    foo.doSomething()\n}\n",
            );
            create_test_file(
                project.path(),
                &format!("copies/c{i:02}/Plain.kt"),
                "package com.other\n\nfun run(foo: Any) {\n    foo.doSomething()\n}\n",
            );
        }

        let mut single = config(project.path(), SearchMode::Method, Some("doSomething"));
        single.max_workers = 1;
        let mut many = single.clone();
        many.max_workers = 4;

        let single = run_usage_search(single).unwrap();
        let many = run_usage_search(many).unwrap();
        assert_eq!(single.results, many.results);
        assert_eq!(single.stats, many.stats);
        assert_eq!(single.results.len(), 2 + 12);
    }

    #[test]
    fn test_build_query_restricts_to_declared() {
        let members = BTreeSet::from([
            nobifinder_core::DeclaredMember { name: "getName".into(), kind: MemberKind::Method },
            nobifinder_core::DeclaredMember { name: "setName".into(), kind: MemberKind::Method },
        ]);
        let target = Target::new("p", "User", members);
        let query = build_query(target, SearchMode::Method, Some("/get.*/")).unwrap();
        assert!(query.wants("getName"));
        assert!(!query.wants("getOther"));
        assert!(!query.wants("setName"));
    }
}
