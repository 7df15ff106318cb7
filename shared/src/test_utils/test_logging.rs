/// Initializes env_logger for tests. Safe to call from every test; only
/// the first call wins.
pub fn init_test_logging() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Debug)
        .try_init();
}
