use prometheus::{register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec};

lazy_static::lazy_static! {
    pub static ref INSERTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "cortexdb_inserts_total", "Vectors inserted", &["collection"]
    ).unwrap();
    pub static ref DELETES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "cortexdb_deletes_total", "Vectors tombstoned", &["collection"]
    ).unwrap();
    pub static ref SEARCHES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "cortexdb_searches_total", "Search queries", &["collection"]
    ).unwrap();
    pub static ref SEARCH_DURATION: HistogramVec = register_histogram_vec!(
        "cortexdb_search_duration_seconds", "Search duration", &["collection"],
        vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0]
    ).unwrap();
    pub static ref WAL_APPENDS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "cortexdb_wal_appends_total", "WAL appends", &["collection"]
    ).unwrap();
    pub static ref COMPACTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "cortexdb_compactions_total", "Compactions", &["collection", "status"]
    ).unwrap();
    pub static ref SNAPSHOTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "cortexdb_snapshots_total", "Snapshot cycles", &["status"]
    ).unwrap();
}

pub fn init() {
    lazy_static::initialize(&INSERTS_TOTAL);
    lazy_static::initialize(&DELETES_TOTAL);
    lazy_static::initialize(&SEARCHES_TOTAL);
    lazy_static::initialize(&SEARCH_DURATION);
    lazy_static::initialize(&WAL_APPENDS_TOTAL);
    lazy_static::initialize(&COMPACTIONS_TOTAL);
    lazy_static::initialize(&SNAPSHOTS_TOTAL);
}
