use embedlib::error::ErrorKind;
use embedlib::{Bundle, Config, Verification};
use embedlib_bundle::MockSource;
use embedlib_loader::MockLoader;
use rstest::{fixture, rstest};
use std::sync::Arc;
use std::time::Duration;

const LIBEXAMPLE: &str = "native/linux-x86_64/libexample.so";
const LIBZ: &str = "native/linux-x86_64/libz.so";
const MANIFEST: &str = "native/linux-x86_64/bundle.toml";

struct Setup {
    // Keeps the cache root alive for the duration of the test.
    _temp_dir: tempfile::TempDir,
    cache_root: std::path::PathBuf,
    source: Arc<MockSource>,
    loader: Arc<MockLoader>,
}

impl Setup {
    fn new(files: &[(&str, &str)], loader: MockLoader) -> Self {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache_root = temp_dir.path().join("cache");
        Self {
            _temp_dir: temp_dir,
            cache_root,
            source: Arc::new(MockSource::with_files(files.iter().copied())),
            loader: Arc::new(loader),
        }
    }

    fn bundle(&self, os: &str, arch: &str) -> Bundle {
        Bundle::builder(self.source.clone())
            .loader(self.loader.clone())
            .cache_root(&self.cache_root)
            .raw_platform(os, arch)
            .build()
    }
}

#[fixture]
fn example() -> Setup {
    Setup::new(&[(LIBEXAMPLE, "example-linux-x86_64-v1")], MockLoader::default())
}

#[rstest]
fn second_request_returns_the_same_handle(example: Setup) {
    let bundle = example.bundle("linux", "x86_64");

    let first = bundle.request_library("example").unwrap();
    assert!(first.path().starts_with(&example.cache_root));
    assert_eq!(std::fs::read_to_string(first.path()).unwrap(), "example-linux-x86_64-v1");

    let second = bundle.request_library("example").unwrap();
    assert_eq!(first, second);
    assert_eq!(example.source.reads(), 1);
    assert_eq!(example.loader.opens(), 1);
    assert_eq!(bundle.outstanding("example"), 2);
    assert_eq!(bundle.loaded(), vec!["example"]);
}

#[rstest]
#[case("Linux", "amd64")]
#[case("linux", "x64")]
fn raw_platform_goes_through_aliases(example: Setup, #[case] os: &str, #[case] arch: &str) {
    let bundle = example.bundle(os, arch);
    assert_eq!(bundle.platform().unwrap().token(), "linux-x86_64");
    assert!(bundle.request_library("example").is_ok());
}

#[rstest]
fn unsupported_platform_touches_nothing(example: Setup) {
    let bundle = example.bundle("plan9", "x86_64");
    for _ in 0..2 {
        let err = bundle.request_library("example").unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnsupportedPlatform { os, arch } if os == "plan9" && arch == "x86_64"));
        assert!(!err.is_retryable());
    }
    assert_eq!(example.source.reads(), 0);
    assert_eq!(example.loader.opens(), 0);
    assert!(!example.cache_root.exists());
}

#[rstest]
fn missing_variant_is_resource_not_found(example: Setup) {
    let bundle = example.bundle("macos", "aarch64");
    let err = bundle.request_library("example").unwrap_err();
    assert!(matches!(
        &*err,
        ErrorKind::ResourceNotFound { name, platform, path }
            if name == "example" && platform == "macos-aarch64" && path == "native/macos-aarch64/libexample.dylib"
    ));
    assert_eq!(example.loader.opens(), 0);
    assert!(!example.cache_root.exists());
    assert!(bundle.loaded().is_empty());
}

#[rstest]
#[case("")]
#[case("../example")]
#[case("lib/example")]
fn invalid_names_are_rejected(example: Setup, #[case] name: &str) {
    let bundle = example.bundle("linux", "x86_64");
    let err = bundle.request_library(name).unwrap_err();
    assert!(matches!(&*err, ErrorKind::InvalidName(_)));
    assert_eq!(example.source.reads(), 0);
}

#[rstest]
fn release_then_shutdown_deletes_the_file(example: Setup) {
    let bundle = example.bundle("linux", "x86_64");
    let handle = bundle.request_library("example").unwrap();
    let path = handle.path().to_path_buf();

    let sweep = bundle.shutdown();
    assert_eq!(sweep.retained, vec![path.clone()]);
    assert!(path.exists());

    assert!(bundle.release_library("example"));
    assert!(!bundle.release_library("example"));
    let sweep = bundle.shutdown();
    assert_eq!(sweep.removed, vec![path.clone()]);
    assert!(sweep.is_clean());
    assert!(!path.exists());

    // Still loaded; asking again doesn't extract or load anything.
    assert_eq!(bundle.request_library("example").unwrap(), handle);
    assert_eq!(example.source.reads(), 1);
    assert_eq!(example.loader.opens(), 1);
}

#[rstest]
fn shutdown_guard_cleans_up_on_drop(example: Setup) {
    let bundle = example.bundle("linux", "x86_64");
    let path = {
        let _guard = bundle.shutdown_guard();
        let handle = bundle.request_library("example").unwrap();
        bundle.release_library("example");
        handle.path().to_path_buf()
    };
    assert!(!path.exists());
}

#[test]
fn load_failure_is_memoized() {
    let setup = Setup::new(&[(LIBEXAMPLE, "corrupt")], MockLoader::default().failing("libexample.so"));
    let bundle = setup.bundle("linux", "x86_64");

    for _ in 0..3 {
        let err = bundle.request_library("example").unwrap_err();
        assert!(matches!(
            &*err,
            ErrorKind::Load { name, reason } if name == "example" && reason.contains("invalid ELF header")
        ));
    }
    assert_eq!(setup.source.reads(), 1);
    assert_eq!(setup.loader.opens(), 1);
    assert_eq!(bundle.outstanding("example"), 0);

    // Nobody holds the file of a library that failed to load.
    assert_eq!(bundle.shutdown().removed.len(), 1);
}

#[rstest]
fn forced_path_bypasses_the_bundle(example: Setup) {
    let forced = example.cache_root.with_file_name("libexample-dev.so");
    std::fs::write(&forced, b"dev build").unwrap();
    let bundle = Bundle::builder(example.source.clone())
        .loader(example.loader.clone())
        .cache_root(&example.cache_root)
        .raw_platform("plan9", "mips")
        .force("example", &forced)
        .build();

    let handle = bundle.request_library("example").unwrap();
    assert_eq!(handle.path(), forced);
    assert_eq!(example.source.reads(), 0);
    assert_eq!(example.loader.opened(), vec![forced.clone()]);

    assert!(bundle.release_library("example"));
    assert!(bundle.shutdown().removed.is_empty());
    assert!(forced.exists());
}

#[test]
fn manifest_dependencies_load_first() {
    let manifest = "system = [\"m\"]\n\n[[library]]\nname = \"example\"\ndepends = [\"z\"]\n\n[[library]]\nname = \"z\"\n";
    let setup = Setup::new(
        &[(LIBEXAMPLE, "example"), (LIBZ, "z"), (MANIFEST, manifest)],
        MockLoader::default(),
    );
    let bundle = setup.bundle("linux", "x86_64");

    let handle = bundle.request_library("example").unwrap();
    let opened = setup.loader.opened();
    assert_eq!(opened.len(), 2);
    assert_eq!(opened[0].file_name().unwrap(), "libz.so");
    assert_eq!(opened[1], handle.path());
    assert_eq!(bundle.outstanding("z"), 1);

    assert!(bundle.release_library("example"));
    assert_eq!(bundle.outstanding("z"), 0);
    assert_eq!(bundle.shutdown().removed.len(), 2);
}

#[test]
fn missing_dependency_releases_what_was_acquired() {
    let manifest = "[[library]]\nname = \"example\"\ndepends = [\"z\", \"ssl\"]\n\n[[library]]\nname = \"z\"\n\n[[library]]\nname = \"ssl\"\n";
    let setup = Setup::new(&[(LIBEXAMPLE, "example"), (LIBZ, "z"), (MANIFEST, manifest)], MockLoader::default());
    let bundle = setup.bundle("linux", "x86_64");

    let err = bundle.request_library("example").unwrap_err();
    assert!(matches!(&*err, ErrorKind::ResourceNotFound { name, .. } if name == "ssl"));
    assert_eq!(bundle.outstanding("z"), 0);
    assert_eq!(bundle.outstanding("example"), 0);
}

#[test]
fn invalid_manifest_is_reported() {
    let manifest = "[[library]]\nname = \"example\"\ndepends = [\"example\"]\n";
    let setup = Setup::new(&[(LIBEXAMPLE, "example"), (MANIFEST, manifest)], MockLoader::default());
    let bundle = setup.bundle("linux", "x86_64");
    let err = bundle.request_library("example").unwrap_err();
    assert!(matches!(&*err, ErrorKind::Manifest(reason) if reason.contains("cycle")));
    assert_eq!(setup.loader.opens(), 0);
}

#[test]
fn concurrent_requests_share_one_load() {
    let setup = Setup::new(&[(LIBEXAMPLE, "example")], MockLoader::default().with_delay(Duration::from_millis(20)));
    let bundle = setup.bundle("linux", "x86_64");

    let handles: Vec<_> = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..8).map(|_| scope.spawn(|| bundle.request_library("example").unwrap())).collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    assert!(handles.iter().all(|h| *h == handles[0]));
    assert_eq!(setup.source.reads(), 1);
    assert_eq!(setup.loader.opens(), 1);
    assert_eq!(bundle.outstanding("example"), 8);

    for _ in 0..8 {
        assert!(bundle.release_library("example"));
    }
    assert_eq!(bundle.shutdown().removed, vec![handles[0].path().to_path_buf()]);
}

#[test]
fn bundles_sharing_a_cache_root_only_delete_their_own_files() {
    let setup = Setup::new(&[(LIBEXAMPLE, "example")], MockLoader::default());
    let writer = setup.bundle("linux", "x86_64");
    let reader = setup.bundle("linux", "x86_64");

    let path = writer.request_library("example").unwrap().path().to_path_buf();
    assert_eq!(reader.request_library("example").unwrap().path(), path);

    reader.release_library("example");
    assert!(reader.shutdown().removed.is_empty());
    assert!(path.exists());

    writer.release_library("example");
    assert_eq!(writer.shutdown().removed, vec![path.clone()]);
}

#[test]
fn from_config() {
    let temp_dir = tempfile::tempdir().unwrap();
    let forced = temp_dir.path().join("libexample.so");
    std::fs::write(&forced, b"ELF").unwrap();
    let config = Config {
        cache_root: Some(temp_dir.path().join("cache")),
        verification: Verification::Always,
        forced: [("example".to_string(), forced.clone())].into(),
        ..Config::default()
    };
    let source = Arc::new(MockSource::default());
    let bundle = Bundle::builder(source.clone())
        .config(&config)
        .unwrap()
        .loader(Arc::new(MockLoader::default()))
        .build();

    assert_eq!(bundle.cache_root(), temp_dir.path().join("cache"));
    assert_eq!(bundle.locator().namespace(), "native");
    assert_eq!(bundle.request_library("example").unwrap().path(), forced);
    assert_eq!(source.reads(), 0);

    let bad = Config { namespace: "/abs".to_string(), ..Config::default() };
    let err = Bundle::from_config(source, &bad).err().unwrap();
    assert!(matches!(&*err, ErrorKind::Config));
}

#[test]
fn request_all_follows_the_manifest_load_order() {
    let manifest = "[[library]]\nname = \"example\"\ndepends = [\"z\"]\n\n[[library]]\nname = \"z\"\n";
    let setup = Setup::new(&[(LIBEXAMPLE, "example"), (LIBZ, "z"), (MANIFEST, manifest)], MockLoader::default());
    let bundle = setup.bundle("linux", "x86_64");

    let loaded = bundle.request_all().unwrap();
    let names: Vec<&str> = loaded.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["z", "example"]);
    assert_eq!(setup.loader.opens(), 2);
    assert_eq!(bundle.outstanding("z"), 2);
    assert_eq!(bundle.outstanding("example"), 1);

    for (name, _) in &loaded {
        assert!(bundle.release_library(name));
    }
    assert_eq!(bundle.outstanding("z"), 0);
    assert_eq!(bundle.shutdown().removed.len(), 2);
}

#[rstest]
fn request_all_without_a_manifest_loads_nothing(example: Setup) {
    let bundle = example.bundle("linux", "x86_64");
    assert!(bundle.request_all().unwrap().is_empty());
    assert_eq!(example.source.reads(), 0);
    assert_eq!(example.loader.opens(), 0);
}

#[test]
fn request_all_releases_everything_on_failure() {
    let manifest = "[[library]]\nname = \"z\"\n\n[[library]]\nname = \"ssl\"\n";
    let setup = Setup::new(&[(LIBZ, "z"), (MANIFEST, manifest)], MockLoader::default());
    let bundle = setup.bundle("linux", "x86_64");

    let err = bundle.request_all().unwrap_err();
    assert!(matches!(&*err, ErrorKind::ResourceNotFound { name, .. } if name == "ssl"));
    assert_eq!(bundle.outstanding("z"), 0);
    assert_eq!(bundle.shutdown().removed.len(), 1);
}

#[test]
fn resources_lists_the_platform_directory() {
    let setup = Setup::new(
        &[(LIBZ, "z"), (LIBEXAMPLE, "example"), ("native/windows-x86_64/example.dll", "dll")],
        MockLoader::default(),
    );
    assert_eq!(
        setup.bundle("linux", "x86_64").resources().unwrap(),
        vec![LIBEXAMPLE.to_string(), LIBZ.to_string()]
    );
    assert!(setup.bundle("macos", "aarch64").resources().unwrap().is_empty());
    assert!(setup.bundle("plan9", "x86_64").resources().is_err());
    assert_eq!(setup.source.reads(), 0);
}
