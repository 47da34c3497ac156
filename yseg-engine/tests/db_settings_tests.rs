//! Database settings tests
//!
//! Runtime settings live in the `settings` table of the on-disk database
//! and survive reopening it.

use tempfile::TempDir;
use yseg_engine::db::parameters::{load_clustering_parameters, save_clustering_parameters};
use yseg_engine::db::settings::{get_max_lock_wait_ms, get_setting, set_setting, DEFAULT_MAX_LOCK_WAIT_MS};
use yseg_engine::db::init_database_pool;
use yseg_engine::models::ClusteringParameters;

#[tokio::test]
async fn test_new_database_has_default_settings() {
    let dir = TempDir::new().unwrap();
    let pool = init_database_pool(&dir.path().join("segments.db")).await.unwrap();

    assert_eq!(get_max_lock_wait_ms(&pool).await.unwrap(), DEFAULT_MAX_LOCK_WAIT_MS);
    assert_eq!(
        load_clustering_parameters(&pool).await.unwrap(),
        ClusteringParameters::default()
    );

    let k_max: Option<usize> = get_setting(&pool, "clustering_k_max").await.unwrap();
    assert_eq!(k_max, Some(8));
}

#[tokio::test]
async fn test_saved_parameters_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("segments.db");

    let tuned = ClusteringParameters {
        k_max: 5,
        seed: 7,
        n_init: 2,
        ..ClusteringParameters::default()
    };
    {
        let pool = init_database_pool(&db_path).await.unwrap();
        save_clustering_parameters(&pool, &tuned).await.unwrap();
        set_setting(&pool, "database_max_lock_wait_ms", 1500u64).await.unwrap();
        pool.close().await;
    }

    // Reopening must not reset stored values to defaults
    let pool = init_database_pool(&db_path).await.unwrap();
    assert_eq!(load_clustering_parameters(&pool).await.unwrap(), tuned);
    assert_eq!(get_max_lock_wait_ms(&pool).await.unwrap(), 1500);
}

#[tokio::test]
async fn test_malformed_setting_is_config_error() {
    let dir = TempDir::new().unwrap();
    let pool = init_database_pool(&dir.path().join("segments.db")).await.unwrap();

    set_setting(&pool, "clustering_seed", "forty-two").await.unwrap();
    let err = load_clustering_parameters(&pool).await.unwrap_err();
    assert!(matches!(err, yseg_common::Error::Config(_)));
}
