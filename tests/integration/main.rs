//! Integration tests for once-again

mod memo_tests {
    use once_again::cache::{CacheEntry, EntryStore};
    use once_again::{
        impl_canonical, impl_keywords, ClassMethod, Function, Memo, Method, OnceAgainError,
        StaticMethod,
    };
    use std::cell::Cell;
    use std::collections::HashMap;
    use std::fs::{self, File};
    use std::path::Path;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    type Res<T> = Result<T, OnceAgainError>;

    thread_local! {
        static F_CALLS: Cell<usize> = const { Cell::new(0) };
    }

    fn keyword(kw: &[(&str, i64)], name: &str) -> i64 {
        kw.iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| *v)
            .unwrap_or(0)
    }

    fn f(args: &(i64, i64), kw: &[(&str, i64); 2]) -> Res<i64> {
        F_CALLS.with(|c| c.set(c.get() + 1));
        Ok(args.0 * args.1 + keyword(kw, "c") * keyword(kw, "d"))
    }

    struct Weights {
        c: i64,
        d: i64,
    }
    impl_keywords!(Weights { c, d });

    struct Dataset {
        values: Vec<i64>,
    }
    impl_canonical!(Dataset { values });

    impl Dataset {
        fn sumsq(&self, _: &(), _: &()) -> Res<i64> {
            Ok(self.values.iter().map(|x| x * x).sum())
        }

        fn describe(_: &(), _: &()) -> Res<String> {
            Ok("dataset".to_string())
        }

        fn shift(args: &(Vec<i64>, i64), _: &()) -> Res<Vec<i64>> {
            Ok(args.0.iter().map(|x| x + args.1).collect())
        }
    }

    struct Series {
        values: Vec<i64>,
    }
    impl_canonical!(Series { values });

    impl Series {
        fn sumsq(&self, _: &(), _: &()) -> Res<i64> {
            Ok(self.values.iter().map(|x| x * x).sum())
        }
    }

    fn setup() -> (Memo, TempDir) {
        let temp = TempDir::new().unwrap();
        let memo = Memo::new(temp.path().join("cache"));
        (memo, temp)
    }

    fn entry_files(root: &Path) -> usize {
        fs::read_dir(root).map(|dir| dir.count()).unwrap_or(0)
    }

    fn mtime(path: &Path) -> SystemTime {
        fs::metadata(path).unwrap().modified().unwrap()
    }

    fn backdate(path: &Path, by: Duration) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - by).unwrap();
    }

    #[test]
    fn end_to_end_single_entry() {
        let (memo, _temp) = setup();
        F_CALLS.with(|c| c.set(0));

        let result = memo
            .call(&Function::new(f), &(10, 20), &[("c", 30), ("d", 4)])
            .unwrap();
        assert_eq!(result, 320);
        assert_eq!(entry_files(memo.store().root()), 1);

        let again = memo
            .call(&Function::new(f), &(10, 20), &[("c", 30), ("d", 4)])
            .unwrap();
        assert_eq!(again, 320);
        assert_eq!(entry_files(memo.store().root()), 1);
        assert_eq!(F_CALLS.with(|c| c.get()), 1);

        let stored = memo.store().list().unwrap();
        assert!(stored[0].qualified_name.ends_with("memo_tests.f"));
    }

    #[test]
    fn second_call_is_served_from_cache() {
        let (memo, _temp) = setup();
        let calls = Cell::new(0);
        let add = Function::named("demo.add", |args: &(i64, i64), _: &()| -> Res<i64> {
            calls.set(calls.get() + 1);
            Ok(args.0 + args.1)
        });

        assert_eq!(memo.call(&add, &(2, 3), &()).unwrap(), 5);
        let path = memo.entry_path(&add, &(2, 3), &()).unwrap();
        let first = mtime(&path);

        assert_eq!(memo.call(&add, &(2, 3), &()).unwrap(), 5);
        assert_eq!(calls.get(), 1);
        assert_eq!(mtime(&path), first);

        assert_eq!(memo.call(&add, &(3, 2), &()).unwrap(), 5);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn receivers_get_separate_entries() {
        let (memo, _temp) = setup();
        let x = Dataset {
            values: vec![1, 2, 3],
        };
        let y = Dataset { values: vec![4, 5] };

        assert_eq!(memo.call(&Method::new(&x, Dataset::sumsq), &(), &()).unwrap(), 14);
        assert_eq!(memo.call(&Method::new(&y, Dataset::sumsq), &(), &()).unwrap(), 41);

        let entries = memo.store().list().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].qualified_name, entries[1].qualified_name);
        assert_ne!(entries[0].key, entries[1].key);

        let entry: CacheEntry<i64> = memo.store().load(&entries[0].path).unwrap();
        assert!(entry.positional[0].starts_with("Dataset(values="));
    }

    #[test]
    fn same_method_name_on_other_type_is_separate() {
        let (memo, _temp) = setup();
        let a = Dataset { values: vec![2] };
        let b = Series { values: vec![2] };

        let pa = memo
            .entry_path(&Method::new(&a, Dataset::sumsq), &(), &())
            .unwrap();
        let pb = memo
            .entry_path(&Method::new(&b, Series::sumsq), &(), &())
            .unwrap();
        assert_ne!(pa, pb);

        memo.call(&Method::new(&a, Dataset::sumsq), &(), &()).unwrap();
        memo.call(&Method::new(&b, Series::sumsq), &(), &()).unwrap();

        let names: Vec<_> = memo
            .store()
            .list()
            .unwrap()
            .into_iter()
            .map(|e| e.qualified_name)
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.iter().any(|n| n.ends_with("Dataset.sumsq")));
        assert!(names.iter().any(|n| n.ends_with("Series.sumsq")));
    }

    #[test]
    fn static_method_via_type_or_instance_shares_entry() {
        let (memo, _temp) = setup();
        let ds = Dataset { values: vec![7] };
        let of = StaticMethod::<Dataset, _>::of(Dataset::shift);
        let via = StaticMethod::via(&ds, Dataset::shift);

        assert_eq!(
            memo.entry_path(&of, &(vec![1, 2], 10), &()).unwrap(),
            memo.entry_path(&via, &(vec![1, 2], 10), &()).unwrap()
        );

        assert_eq!(memo.call(&of, &(vec![1, 2], 10), &()).unwrap(), vec![11, 12]);
        assert_eq!(memo.call(&via, &(vec![1, 2], 10), &()).unwrap(), vec![11, 12]);
        assert_eq!(memo.store().list().unwrap().len(), 1);
    }

    #[test]
    fn class_method_keys_on_type() {
        let (memo, _temp) = setup();
        let ds = Dataset { values: vec![] };

        let by_type = ClassMethod::<Dataset, _>::new(Dataset::describe);
        let by_instance = ClassMethod::via(&ds, Dataset::describe);
        assert_eq!(memo.call(&by_type, &(), &()).unwrap(), "dataset");
        assert_eq!(memo.call(&by_instance, &(), &()).unwrap(), "dataset");

        let entries = memo.store().list().unwrap();
        assert_eq!(entries.len(), 1);
        let entry: CacheEntry<String> = memo.store().load(&entries[0].path).unwrap();
        assert!(entry.positional[0].starts_with("<type "));
    }

    #[test]
    fn ttl_expiry_recomputes() {
        let temp = TempDir::new().unwrap();
        let memo = Memo::new(temp.path().join("cache")).with_ttl(Some(Duration::from_secs(60)));
        let calls = Cell::new(0);
        let square = Function::named("demo.square", |args: &(i64,), _: &()| -> Res<i64> {
            calls.set(calls.get() + 1);
            Ok(args.0 * args.0)
        });

        memo.call(&square, &(9,), &()).unwrap();
        let path = memo.entry_path(&square, &(9,), &()).unwrap();

        // Within the ttl
        memo.call(&square, &(9,), &()).unwrap();
        assert_eq!(calls.get(), 1);

        backdate(&path, Duration::from_secs(120));
        let stale = mtime(&path);

        assert_eq!(memo.call(&square, &(9,), &()).unwrap(), 81);
        assert_eq!(calls.get(), 2);
        assert!(mtime(&path) > stale);

        memo.call(&square, &(9,), &()).unwrap();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn without_ttl_old_entries_stay_valid() {
        let (memo, _temp) = setup();
        let calls = Cell::new(0);
        let g = Function::named("demo.g", |args: &(i64,), _: &()| -> Res<i64> {
            calls.set(calls.get() + 1);
            Ok(args.0)
        });

        memo.call(&g, &(1,), &()).unwrap();
        backdate(
            &memo.entry_path(&g, &(1,), &()).unwrap(),
            Duration::from_secs(10 * 365 * 24 * 3600),
        );
        memo.call(&g, &(1,), &()).unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn keyword_order_does_not_matter() {
        let (memo, _temp) = setup();
        F_CALLS.with(|c| c.set(0));

        let cd = memo
            .call(&Function::new(f), &(1, 2), &[("c", 3), ("d", 4)])
            .unwrap();
        let dc = memo
            .call(&Function::new(f), &(1, 2), &[("d", 4), ("c", 3)])
            .unwrap();
        assert_eq!(cd, 14);
        assert_eq!(dc, 14);
        assert_eq!(F_CALLS.with(|c| c.get()), 1);
        assert_eq!(memo.store().list().unwrap().len(), 1);
    }

    #[test]
    fn keyword_maps_and_structs_agree() {
        let (memo, _temp) = setup();
        let calls = Cell::new(0);
        let weighted = Function::named("demo.weighted", |_: &(), kw: &HashMap<String, i64>| {
            calls.set(calls.get() + 1);
            Res::Ok(kw.values().sum::<i64>())
        });

        let mut forward = HashMap::new();
        forward.insert("c".to_string(), 30);
        forward.insert("d".to_string(), 4);
        let mut backward = HashMap::new();
        backward.insert("d".to_string(), 4);
        backward.insert("c".to_string(), 30);

        memo.call(&weighted, &(), &forward).unwrap();
        memo.call(&weighted, &(), &backward).unwrap();
        assert_eq!(calls.get(), 1);

        let by_struct = Function::named("demo.weighted", |_: &(), kw: &Weights| {
            Res::Ok(kw.c + kw.d)
        });
        assert_eq!(
            memo.entry_path(&by_struct, &(), &Weights { c: 30, d: 4 })
                .unwrap(),
            memo.entry_path(&weighted, &(), &forward).unwrap()
        );
    }

    #[test]
    fn unnamed_closure_is_rejected() {
        let (memo, _temp) = setup();
        let closure = Function::new(|args: &(i64,), _: &()| -> Res<i64> { Ok(args.0) });

        let err = memo.call(&closure, &(1,), &()).unwrap_err();
        assert!(matches!(err, OnceAgainError::UnsupportedCallableKind { .. }));
        assert!(err.hint().is_some());
    }

    #[test]
    fn file_at_cache_root_is_a_conflict() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("cache");
        fs::write(&root, "").unwrap();

        let err = Memo::new(&root)
            .call(&Function::new(f), &(1, 1), &[("c", 1), ("d", 1)])
            .unwrap_err();
        assert!(matches!(err, OnceAgainError::CacheDirectoryConflict(_)));
    }

    #[test]
    fn store_failure_still_returns_result() {
        let (memo, _temp) = setup();
        let calls = Cell::new(0);
        let h = Function::named("demo.h", |args: &(i64,), _: &()| -> Res<i64> {
            calls.set(calls.get() + 1);
            Ok(args.0 * 3)
        });

        // A directory squatting on the entry path makes the rename fail
        let path = memo.entry_path(&h, &(2,), &()).unwrap();
        fs::create_dir_all(&path).unwrap();

        assert_eq!(memo.call(&h, &(2,), &()).unwrap(), 6);
        assert_eq!(memo.call(&h, &(2,), &()).unwrap(), 6);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn float_results_come_back_bit_exact() {
        let (memo, _temp) = setup();
        let calls = Cell::new(0);
        let from_bits = Function::named("demo.from_bits", |args: &(u64,), _: &()| -> Res<f64> {
            calls.set(calls.get() + 1);
            Ok(f64::from_bits(args.0))
        });

        let mut bits = vec![
            1.079907802215119e-66f64.to_bits(),
            0.1f64.to_bits(),
            f64::MAX.to_bits(),
            f64::MIN_POSITIVE.to_bits(),
            1,
        ];
        let mut state = 0x9e37_79b9_7f4a_7c15u64;
        while bits.len() < 2000 {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            if f64::from_bits(state).is_finite() {
                bits.push(state);
            }
        }

        for b in &bits {
            memo.call(&from_bits, &(*b,), &()).unwrap();
        }
        for b in &bits {
            let cached = memo.call(&from_bits, &(*b,), &()).unwrap();
            assert_eq!(cached.to_bits(), *b, "{:e} changed on reload", f64::from_bits(*b));
        }
        assert_eq!(calls.get(), bits.len());
    }

    #[test]
    fn non_finite_results_are_returned_but_not_stored() {
        let (memo, _temp) = setup();
        let calls = Cell::new(0);
        let ratio = Function::named("demo.ratio", |args: &(i64, i64), _: &()| -> Res<f64> {
            calls.set(calls.get() + 1);
            Ok(args.0 as f64 / args.1 as f64)
        });

        assert!(memo.call(&ratio, &(0, 0), &()).unwrap().is_nan());
        assert!(memo.call(&ratio, &(0, 0), &()).unwrap().is_nan());
        assert_eq!(memo.call(&ratio, &(1, 0), &()).unwrap(), f64::INFINITY);
        assert_eq!(calls.get(), 3);
        assert_eq!(entry_files(memo.store().root()), 0);

        assert_eq!(memo.call(&ratio, &(1, 4), &()).unwrap(), 0.25);
        assert_eq!(memo.call(&ratio, &(1, 4), &()).unwrap(), 0.25);
        assert_eq!(calls.get(), 4);
    }

    fn label<T>(_: &(), _: &()) -> Res<String> {
        Ok(std::any::type_name::<T>().to_string())
    }

    #[test]
    fn generic_instantiations_do_not_share_entries() {
        let (memo, _temp) = setup();

        let by_value = memo.call(&Function::new(label::<Option<u8>>), &(), &()).unwrap();
        let by_ref = memo.call(&Function::new(label::<Option<&u8>>), &(), &()).unwrap();

        assert_ne!(by_value, by_ref);
        assert!(by_ref.contains('&'));
        assert_eq!(entry_files(memo.store().root()), 2);
    }

    #[test]
    fn duplicate_keyword_is_an_error() {
        let (memo, _temp) = setup();
        F_CALLS.with(|c| c.set(0));

        let err = memo
            .call(&Function::new(f), &(1, 2), &[("c", 1), ("c", 2)])
            .unwrap_err();
        assert!(matches!(err, OnceAgainError::DuplicateKeyword(ref name) if name == "c"));
        assert_eq!(F_CALLS.with(|c| c.get()), 0);
        assert_eq!(entry_files(memo.store().root()), 0);
    }

    #[test]
    fn memo_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Memo>();
        assert_send_sync::<EntryStore>();
    }
}

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use once_again::cache::{fingerprint, CacheEntry, CanonicalArgs, EntryStore};
    use predicates::prelude::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn cli(temp: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("once-again");
        cmd.current_dir(temp.path())
            .env("ONCE_AGAIN_CONFIG", temp.path().join("config.toml"))
            .env_remove("RUST_LOG");
        cmd
    }

    fn seed(root: &Path) -> EntryStore {
        let store = EntryStore::new(root);
        store.ensure_root().unwrap();
        for (name, value) in [("demo.f", 320i64), ("demo.g", 7)] {
            let args = CanonicalArgs::collect(vec![], &(10, 20), &[("c", 30), ("d", 4)]).unwrap();
            let path = store.path_for(name, &fingerprint(&args));
            store.store(&path, &CacheEntry::new(name, &args, value)).unwrap();
        }
        store
    }

    #[test]
    fn help_displays() {
        let temp = TempDir::new().unwrap();
        cli(&temp)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("inspect and maintain a result cache"));
    }

    #[test]
    fn version_displays() {
        let temp = TempDir::new().unwrap();
        cli(&temp)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("once-again"));
    }

    #[test]
    fn list_empty() {
        let temp = TempDir::new().unwrap();
        cli(&temp)
            .args(["list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cache entries"));
    }

    #[test]
    fn list_formats() {
        let temp = TempDir::new().unwrap();
        seed(&temp.path().join("cache"));

        cli(&temp)
            .args(["list", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("demo.f.").and(predicate::str::contains("demo.g.")));

        cli(&temp)
            .args(["list", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"qualified_name\": \"demo.f\""));

        cli(&temp)
            .args(["list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("NAME").and(predicate::str::contains("2 entr(ies)")));
    }

    #[test]
    fn root_flag_overrides_config() {
        let temp = TempDir::new().unwrap();
        seed(&temp.path().join("elsewhere"));

        cli(&temp)
            .args(["list", "--format", "plain", "--root", "elsewhere"])
            .assert()
            .success()
            .stdout(predicate::str::contains("demo.f."));
    }

    #[test]
    fn local_config_sets_root() {
        let temp = TempDir::new().unwrap();
        seed(&temp.path().join("results"));
        fs::write(
            temp.path().join(".once-again.toml"),
            "[cache]\nroot = \"results\"\n",
        )
        .unwrap();

        cli(&temp)
            .args(["list", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("demo.g."));

        cli(&temp)
            .args(["--no-local", "list", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("demo.g.").not());
    }

    #[test]
    fn show_entry() {
        let temp = TempDir::new().unwrap();
        let store = seed(&temp.path().join("cache"));
        let name = store.list().unwrap()[0].file_name();

        cli(&temp)
            .args(["show", &name])
            .assert()
            .success()
            .stdout(
                predicate::str::contains("demo.f")
                    .and(predicate::str::contains("c="))
                    .and(predicate::str::contains("320")),
            );
    }

    #[test]
    fn show_missing_entry() {
        let temp = TempDir::new().unwrap();
        cli(&temp)
            .args(["show", "demo.f.0123456789abcdef"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Cache entry not found"));
    }

    #[test]
    fn show_unreadable_entry_points_to_gc() {
        let temp = TempDir::new().unwrap();
        let store = seed(&temp.path().join("cache"));
        fs::write(store.root().join("demo.h.0123456789abcdef.cache"), "garbage").unwrap();

        cli(&temp)
            .args(["show", "demo.h.0123456789abcdef"])
            .assert()
            .failure()
            .stderr(
                predicate::str::contains("Corrupt cache entry")
                    .and(predicate::str::contains("once-again gc")),
            );
    }

    #[test]
    fn clear_requires_confirmation() {
        let temp = TempDir::new().unwrap();
        let store = seed(&temp.path().join("cache"));

        // Non-interactive sessions decline by default
        cli(&temp).args(["clear"]).assert().success();
        assert_eq!(store.list().unwrap().len(), 2);

        cli(&temp)
            .args(["clear", "--name", "demo.f", "--yes"])
            .assert()
            .success();
        let left = store.list().unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].qualified_name, "demo.g");
    }

    #[test]
    fn gc_removes_unreadable_entries() {
        let temp = TempDir::new().unwrap();
        let store = seed(&temp.path().join("cache"));
        fs::write(store.root().join("demo.h.0123456789abcdef.cache"), "garbage").unwrap();

        cli(&temp)
            .args(["gc", "--dry-run"])
            .assert()
            .success()
            .stdout(predicate::str::contains("demo.h").and(predicate::str::contains("Dry run")));
        assert_eq!(store.list().unwrap().len(), 3);

        cli(&temp).args(["gc"]).assert().success();
        assert_eq!(store.list().unwrap().len(), 2);
    }

    #[test]
    fn gc_older_than() {
        let temp = TempDir::new().unwrap();
        let store = seed(&temp.path().join("cache"));

        cli(&temp)
            .args(["gc", "--older-than", "3600"])
            .assert()
            .success();
        assert_eq!(store.list().unwrap().len(), 2);

        cli(&temp)
            .args(["gc", "--older-than", "0"])
            .assert()
            .success();
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn config_path() {
        let temp = TempDir::new().unwrap();
        cli(&temp)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let temp = TempDir::new().unwrap();
        cli(&temp)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[cache]"));
    }

    #[test]
    fn config_init_writes_file() {
        let temp = TempDir::new().unwrap();
        cli(&temp).args(["config", "init"]).assert().success();
        assert!(temp.path().join("config.toml").is_file());
    }

    #[test]
    fn invalid_config_reports_hint() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("config.toml"), "[cache]\nttl_secs = -1.0\n").unwrap();

        cli(&temp)
            .args(["list"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration").and(predicate::str::contains("Hint:")));
    }

    #[test]
    fn huge_ttl_is_rejected() {
        let temp = TempDir::new().unwrap();
        seed(&temp.path().join("cache"));
        fs::write(temp.path().join("config.toml"), "[cache]\nttl_secs = 1e20\n").unwrap();

        cli(&temp)
            .args(["gc"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("ttl_secs").and(predicate::str::contains("panicked").not()));
    }

    #[test]
    fn completions_generate() {
        let temp = TempDir::new().unwrap();
        cli(&temp)
            .args(["completions", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("once-again"));
    }
}
