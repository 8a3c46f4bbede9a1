use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use geovax::io::params_json::ParameterStore;
use geovax::io::population::{load_age_shares_csv, load_case_seeds_csv, load_locations_csv};
use geovax::model::epidemic::EpidemicModel;
use geovax::space::environment::{GeoEnvironment, GeoEnvironmentConfig};
use geovax::space::geo::GeoSpace;

#[derive(Clone)]
struct AppState {
    params_file: String,
    geojson_file: String,
    geojson_feature_key: String,
    locations_csv: String,
    case_seeds_csv: String,
    age_shares_csv: String,
    last_run: Arc<RwLock<Option<RunArtifacts>>>,
}

struct RunArtifacts {
    run_id: String,
    summaries: BTreeMap<String, serde_json::Value>,
    map_view: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RunRequest {
    steps: Option<u32>,
    seed: Option<u64>,
    vaccines_available: Option<u32>,
    scale: Option<u32>,
}

#[derive(Debug, Serialize)]
struct RunResponse {
    return_code: i32,
    run_id: String,
    locations: usize,
    steps: u32,
    total_population: u32,
    final_infected: u32,
    final_vaccinated: u32,
    vaccines_allocated: u32,
}

#[tokio::main]
async fn main() {
    geovax::logging::init();

    let state = AppState {
        params_file: env_or("PARAMS_FILE", "data/parameters.json"),
        geojson_file: env_or("GEOJSON_FILE", "data/regions.geojson"),
        geojson_feature_key: env_or("GEOJSON_FEATURE_KEY", "name"),
        locations_csv: env_or("LOCATIONS_CSV", "data/locations.csv"),
        case_seeds_csv: env_or("CASE_SEEDS_CSV", "data/case_seeds.csv"),
        age_shares_csv: env_or("AGE_SHARES_CSV", "data/age_shares.csv"),
        last_run: Arc::new(RwLock::new(None)),
    };

    let host = env_or("HOST", "0.0.0.0");
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000);

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/run_simulation", post(run_simulation))
        .route("/location_data/latest", get(location_data_latest))
        .route("/summary/:location_key", get(summary_by_key))
        .route("/map/latest", get(map_latest))
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse().expect("invalid HOST/PORT");
    tracing::info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.expect("bind failed");
    axum::serve(listener, app).await.expect("server failed");
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

async fn healthz() -> impl IntoResponse {
    Json(json!({"ok": true}))
}

async fn run_simulation(State(st): State<AppState>, Json(req): Json<RunRequest>) -> impl IntoResponse {
    // Simulation work is CPU-bound; keep it off the async workers.
    let last_run = st.last_run.clone();
    let join = tokio::task::spawn_blocking(move || run_simulation_sync(&st, req));

    match join.await {
        Ok(Ok((resp, artifacts))) => match store_last_run(&last_run, artifacts) {
            Ok(()) => (StatusCode::OK, Json(resp)).into_response(),
            Err((code, body)) => (code, Json(body)).into_response(),
        },
        Ok(Err((code, body))) => (code, Json(body)).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"return_code": 2, "error": format!("join error: {e}")})),
        )
            .into_response(),
    }
}

type RunError = (StatusCode, serde_json::Value);

/// Publish the run artifacts for the read-side handlers. A poisoned lock is
/// an error, not a silent drop; otherwise `/map/latest` and `/summary/*`
/// would keep serving the previous run after a 200.
fn store_last_run(
    lock: &RwLock<Option<RunArtifacts>>,
    artifacts: RunArtifacts,
) -> Result<(), RunError> {
    let mut guard = lock.write().map_err(|_| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"return_code": 2, "error": "last-run state poisoned"}),
        )
    })?;
    *guard = Some(artifacts);
    Ok(())
}

fn bad_request(err: anyhow::Error, what: &str) -> RunError {
    (
        StatusCode::BAD_REQUEST,
        json!({"return_code": 1, "error": format!("{}: {:#}", what, err)}),
    )
}

fn run_simulation_sync(st: &AppState, req: RunRequest) -> Result<(RunResponse, RunArtifacts), RunError> {
    let steps = req.steps.unwrap_or(30).max(1);

    let (locations, population) =
        load_locations_csv(&st.locations_csv).map_err(|e| bad_request(e, "failed to load locations"))?;
    let case_seeds = load_case_seeds_csv(&st.case_seeds_csv, &locations)
        .map_err(|e| bad_request(e, "failed to load case seeds"))?;
    let age_shares = load_age_shares_csv(&st.age_shares_csv, &locations)
        .map_err(|e| bad_request(e, "failed to load age shares"))?;

    let space = GeoSpace::from_geojson(&st.geojson_file, &st.geojson_feature_key, &locations)
        .map_err(|e| bad_request(e, "failed to load geospace"))?;
    let center = mean_centroid(&space);

    let store = ParameterStore::new(&st.params_file);
    let mut scenario = store
        .scenario()
        .map_err(|e| bad_request(e, "failed to load scenario parameters"))?;
    if let Some(seed) = req.seed {
        scenario.seed = seed;
    }
    if let Some(v) = req.vaccines_available {
        scenario.vaccines_available = v;
    }
    if let Some(scale) = req.scale {
        scenario.scale = scale.max(1);
    }

    let run_id = format!("{}-{}", scenario.seed, now_millis());
    let total_population: u32 = population.iter().sum();

    let config = GeoEnvironmentConfig {
        locations,
        center_coords: center,
        population,
        case_seeds,
        age_shares,
    };
    let env = GeoEnvironment::new(space, config, store, scenario).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            json!({"return_code": 1, "error": format!("invalid environment: {:#}", e)}),
        )
    })?;

    let mut model = EpidemicModel::new(env).map_err(|e| bad_request(e, "failed to spawn agents"))?;
    model.run(steps).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"return_code": 2, "error": format!("simulation failed: {:#}", e)}),
        )
    })?;

    let env = model.env();
    let mut summaries = BTreeMap::new();
    for (chart, collector) in env.summaries().iter().zip(env.collectors().iter()) {
        summaries.insert(collector.key.clone(), chart.render(collector));
    }
    let map_view = env.map().render(env.space().regions(), model.persons());

    let last = model.timeline().last().copied().unwrap_or_default();
    let vaccines_allocated: u32 = env.records().iter().map(|r| r.vaccine_allocation.total()).sum();

    let resp = RunResponse {
        return_code: 0,
        run_id: run_id.clone(),
        locations: env.locations().len(),
        steps,
        total_population,
        final_infected: last.infected,
        final_vaccinated: last.vaccinated,
        vaccines_allocated,
    };
    let artifacts = RunArtifacts { run_id, summaries, map_view };
    Ok((resp, artifacts))
}

async fn location_data_latest(State(st): State<AppState>) -> impl IntoResponse {
    let params_file = st.params_file.clone();
    let join = tokio::task::spawn_blocking(move || {
        ParameterStore::new(&params_file)
            .read_location_data()
            .map_err(|e| format!("{:#}", e))
    });
    match join.await {
        Ok(Ok(records)) => (StatusCode::OK, Json(json!(records))).into_response(),
        Ok(Err(e)) => (StatusCode::NOT_FOUND, Json(json!({"error": e}))).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": format!("join error: {e}")})),
        )
            .into_response(),
    }
}

async fn summary_by_key(State(st): State<AppState>, Path(location_key): Path<String>) -> impl IntoResponse {
    let guard = match st.last_run.read() {
        Ok(g) => g,
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "last-run state poisoned"})),
            )
                .into_response()
        }
    };
    match guard.as_ref().and_then(|run| run.summaries.get(&location_key)) {
        Some(summary) => (StatusCode::OK, Json(summary.clone())).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"error": "no run for that location"}))).into_response(),
    }
}

async fn map_latest(State(st): State<AppState>) -> impl IntoResponse {
    let guard = match st.last_run.read() {
        Ok(g) => g,
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "last-run state poisoned"})),
            )
                .into_response()
        }
    };
    match guard.as_ref() {
        Some(run) => (
            StatusCode::OK,
            Json(json!({"run_id": run.run_id, "map": run.map_view})),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"error": "no run yet"}))).into_response(),
    }
}

fn mean_centroid(space: &GeoSpace) -> (f64, f64) {
    let n = space.len().max(1) as f64;
    let sum = space
        .regions()
        .iter()
        .fold((0.0, 0.0), |acc, r| (acc.0 + r.centroid.0, acc.1 + r.centroid.1));
    (sum.0 / n, sum.1 / n)
}

fn now_millis() -> u128 {
    // avoid adding a chrono dependency just for an id
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

#[cfg(test)]
mod tests {
    use super::{store_last_run, RunArtifacts};
    use axum::http::StatusCode;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::{Arc, RwLock};

    fn artifacts() -> RunArtifacts {
        RunArtifacts {
            run_id: "r1".to_string(),
            summaries: BTreeMap::new(),
            map_view: json!({}),
        }
    }

    #[test]
    fn stores_artifacts_on_a_healthy_lock() {
        let lock = RwLock::new(None);
        store_last_run(&lock, artifacts()).expect("store");
        assert_eq!(lock.read().unwrap().as_ref().unwrap().run_id, "r1");
    }

    #[test]
    fn poisoned_lock_reports_a_server_error() {
        let lock = Arc::new(RwLock::new(None));
        let poisoner = lock.clone();
        std::thread::spawn(move || {
            let _guard = poisoner.write().unwrap();
            panic!("poison the last-run lock");
        })
        .join()
        .unwrap_err();

        let (code, body) = store_last_run(&lock, artifacts()).unwrap_err();
        assert_eq!(code, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["return_code"], 2);
    }
}
