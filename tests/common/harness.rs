use cortexdb::config::CortexConfig;
use cortexdb::db::CortexDb;

/// Install a tracing subscriber once per test binary so `RUST_LOG` works.
fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Test harness owning a temp data directory and an open engine.
///
/// The directory outlives engine restarts, so dropping and reopening the
/// engine simulates a crash + recovery against the same files.
pub struct TestHarness {
    pub dir: tempfile::TempDir,
    pub db: Option<CortexDb>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config_fn(|_| {})
    }

    /// Build a harness after letting the caller tweak the default config.
    pub fn with_config_fn(tweak: impl FnOnce(&mut CortexConfig)) -> Self {
        init_tracing();
        let dir = tempfile::tempdir().expect("create temp dir");
        let mut config = CortexConfig::new(dir.path());
        tweak(&mut config);
        let db = CortexDb::open(config).expect("open engine");
        Self { dir, db: Some(db) }
    }

    pub fn db(&self) -> &CortexDb {
        self.db.as_ref().expect("engine is open")
    }

    /// Drop the engine without snapshotting and reopen from disk, as a crash
    /// and restart would.
    pub fn reopen(&mut self) {
        self.reopen_with(|_| {});
    }

    pub fn reopen_with(&mut self, tweak: impl FnOnce(&mut CortexConfig)) {
        self.db = None;
        let mut config = CortexConfig::new(self.dir.path());
        tweak(&mut config);
        self.db = Some(CortexDb::open(config).expect("reopen engine"));
    }

    /// Path to the engine's write-ahead log file.
    pub fn wal_path(&self) -> std::path::PathBuf {
        self.dir.path().join("wal.log")
    }
}
