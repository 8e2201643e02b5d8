use super::*;

#[test]
fn test_defaults() {
    let config = Config::new("/tmp/somewhere", "mytable");
    assert_eq!(config.node_size, DEFAULT_NODE_SIZE);
    assert_eq!(config.cache_capacity, crate::cache::DEFAULT_CACHE_SIZE);
    assert!(!config.lock_wait);
    assert!(!config.no_log);
    assert_eq!(config.path(), std::path::PathBuf::from("/tmp/somewhere/mytable"));
}

#[test]
fn test_chained_setters() {
    let mut config = Config::new("/tmp/somewhere", "mytable");
    config.set_node_size(8192).set_cache_capacity(64).set_lock_wait(true).set_no_log(true);
    assert_eq!(config.node_size, 8192);
    assert_eq!(config.cache_capacity, 64);
    assert!(config.lock_wait);
    assert!(config.no_log);
    assert!(config.open_mode().no_log);
}

#[test]
fn test_open_mode_default_carries_log() {
    let config = Config::new("/tmp/somewhere", "mytable");
    assert!(!config.open_mode().no_log);
}
