//! Clustering parameter persistence
//!
//! `ClusteringParameters` live in the `settings` table under `clustering_*`
//! keys. Defaults are written on database init; missing keys read as
//! defaults.

use sqlx::SqlitePool;
use tracing::{debug, info};
use yseg_common::db::ensure_setting;
use yseg_common::Result;

use super::settings::{get_setting, set_setting};
use crate::models::ClusteringParameters;

const K_MIN: &str = "clustering_k_min";
const K_MAX: &str = "clustering_k_max";
const MAX_ITERATIONS: &str = "clustering_max_iterations";
const TOLERANCE: &str = "clustering_tolerance";
const SEED: &str = "clustering_seed";
const N_INIT: &str = "clustering_n_init";
const MIN_POPULATION: &str = "clustering_min_population";
const MIN_VARIANCE: &str = "clustering_min_variance";
const SELECTION_EPSILON: &str = "clustering_selection_epsilon";

/// Write default values for any parameter key that is missing or NULL
pub async fn init_parameter_defaults(pool: &SqlitePool) -> Result<()> {
    let defaults = ClusteringParameters::default();
    ensure_setting(pool, K_MIN, &defaults.k_min.to_string()).await?;
    ensure_setting(pool, K_MAX, &defaults.k_max.to_string()).await?;
    ensure_setting(pool, MAX_ITERATIONS, &defaults.max_iterations.to_string()).await?;
    ensure_setting(pool, TOLERANCE, &defaults.tolerance.to_string()).await?;
    ensure_setting(pool, SEED, &defaults.seed.to_string()).await?;
    ensure_setting(pool, N_INIT, &defaults.n_init.to_string()).await?;
    ensure_setting(pool, MIN_POPULATION, &defaults.min_population.to_string()).await?;
    ensure_setting(pool, MIN_VARIANCE, &defaults.min_variance.to_string()).await?;
    ensure_setting(pool, SELECTION_EPSILON, &defaults.selection_epsilon.to_string()).await?;
    Ok(())
}

/// Load clustering parameters, falling back to defaults per key
///
/// The combined result is validated; an inconsistent stored set is a
/// configuration error.
pub async fn load_clustering_parameters(pool: &SqlitePool) -> Result<ClusteringParameters> {
    let mut params = ClusteringParameters::default();
    let mut loaded_count = 0;

    if let Some(val) = get_setting(pool, K_MIN).await? {
        params.k_min = val;
        loaded_count += 1;
    }
    if let Some(val) = get_setting(pool, K_MAX).await? {
        params.k_max = val;
        loaded_count += 1;
    }
    if let Some(val) = get_setting(pool, MAX_ITERATIONS).await? {
        params.max_iterations = val;
        loaded_count += 1;
    }
    if let Some(val) = get_setting(pool, TOLERANCE).await? {
        params.tolerance = val;
        loaded_count += 1;
    }
    if let Some(val) = get_setting(pool, SEED).await? {
        params.seed = val;
        loaded_count += 1;
    }
    if let Some(val) = get_setting(pool, N_INIT).await? {
        params.n_init = val;
        loaded_count += 1;
    }
    if let Some(val) = get_setting(pool, MIN_POPULATION).await? {
        params.min_population = val;
        loaded_count += 1;
    }
    if let Some(val) = get_setting(pool, MIN_VARIANCE).await? {
        params.min_variance = val;
        loaded_count += 1;
    }
    if let Some(val) = get_setting(pool, SELECTION_EPSILON).await? {
        params.selection_epsilon = val;
        loaded_count += 1;
    }

    params.validate()?;
    debug!("Loaded {} clustering parameters from database (9 total)", loaded_count);
    Ok(params)
}

/// Save clustering parameters after validating them
pub async fn save_clustering_parameters(
    pool: &SqlitePool,
    params: &ClusteringParameters,
) -> Result<()> {
    params.validate()?;
    info!("Saving clustering parameters to database: {:?}", params);

    set_setting(pool, K_MIN, params.k_min).await?;
    set_setting(pool, K_MAX, params.k_max).await?;
    set_setting(pool, MAX_ITERATIONS, params.max_iterations).await?;
    set_setting(pool, TOLERANCE, params.tolerance).await?;
    set_setting(pool, SEED, params.seed).await?;
    set_setting(pool, N_INIT, params.n_init).await?;
    set_setting(pool, MIN_POPULATION, params.min_population).await?;
    set_setting(pool, MIN_VARIANCE, params.min_variance).await?;
    set_setting(pool, SELECTION_EPSILON, params.selection_epsilon).await?;

    Ok(())
}
