use crate::scheduler::wall_clock_ms;
use crate::state::{AppState, EventEnvelope};
use axum::{
    extract::{Path, Query, State},
    http::{Method, StatusCode},
    response::{
        sse::{Event as SseEvent, Sse},
        Json,
    },
    routing::{get, post},
    Router,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;
use settle_core::{
    area_stats, enqueue, enqueue_upgrade, severity_from_user_scale, town_hall_level, BuildError,
    DisasterEvent, DisasterId, DisasterKind, DisasterStatus, Event, ProfileId, SettlementId,
    SettlementState, StructureId, WorldId,
};
use settle_store::{SettlementStore, StoreError};
use std::convert::Infallible;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[cfg(test)]
pub fn make_router(state: AppState) -> Router {
    make_router_with_cors(state, "http://localhost:5173")
}

pub fn make_router_with_cors(state: AppState, cors_origin: &str) -> Router {
    let cors = match cors_origin.parse::<axum::http::HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any),
        Err(_) => {
            tracing::warn!(cors_origin, "invalid CORS origin, allowing any");
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(Any)
        }
    };

    Router::new()
        .route("/api/v1/meta", get(meta_handler))
        .route(
            "/api/v1/settlements",
            get(list_settlements_handler).post(found_handler),
        )
        .route("/api/v1/settlements/:id", get(settlement_handler))
        .route("/api/v1/settlements/:id/area", get(area_handler))
        .route("/api/v1/settlements/:id/history", get(history_handler))
        .route("/api/v1/settlements/:id/build", post(build_handler))
        .route("/api/v1/settlements/:id/upgrade", post(upgrade_handler))
        .route(
            "/api/v1/disasters",
            get(list_disasters_handler).post(trigger_disaster_handler),
        )
        .route("/api/v1/pause", post(pause_handler))
        .route("/api/v1/resume", post(resume_handler))
        .route("/api/v1/stream", get(stream_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

type ApiResponse = (StatusCode, Json<serde_json::Value>);

fn store_error_response(err: &StoreError) -> ApiResponse {
    match err {
        StoreError::NotFound(what) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "NOT_FOUND", "message": what})),
        ),
        StoreError::WorldBusy(world) => (
            StatusCode::CONFLICT,
            Json(serde_json::json!({
                "error": "REGION_BUSY",
                "message": format!("world {world} already has an unresolved disaster"),
            })),
        ),
        StoreError::VersionConflict { .. } | StoreError::Unavailable(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"error": "UNAVAILABLE", "message": err.to_string()})),
        ),
    }
}

fn build_error_response(err: &BuildError) -> ApiResponse {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(serde_json::json!({"error": err.code(), "message": err.to_string()})),
    )
}

/// Full client-facing view of one settlement. Quantities are floored to
/// whole units; the fractional remainders are an internal accumulator.
fn settlement_view(settlement: &SettlementState, state: &AppState) -> serde_json::Value {
    let (rates, _missing) = settle_core::current_rates(settlement, &state.content);
    serde_json::json!({
        "id": settlement.id,
        "profile": settlement.profile,
        "world": settlement.world,
        "tile_quality": settlement.tile_quality,
        "resilience": settlement.resilience,
        "town_hall_level": town_hall_level(settlement, &state.content),
        "resources": settlement.storage.amounts.floored(),
        "storage_capacity": settlement.storage.capacity,
        "rates": rates,
        "population": {
            "current": settlement.population.headcount(),
            "capacity": settlement.population.capacity,
            "happiness": settlement.population.happiness,
        },
        "structures": settlement.structures,
        "queue": settlement.queue,
        "area": area_stats(settlement, &state.content),
    })
}

async fn meta_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let settlements = state.store.list_settlements().await.len();
    Json(serde_json::json!({
        "content_version": state.content.content_version,
        "passes": state.passes.load(Ordering::Relaxed),
        "paused": state.paused.load(Ordering::Relaxed),
        "settlements": settlements,
        "pass_interval_ms": state.config.pass_interval_ms,
        "settlement_interval_ms": state.config.settlement_interval_ms,
    }))
}

async fn list_settlements_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let ids = state.store.list_settlements().await;
    Json(serde_json::json!({ "settlements": ids }))
}

#[derive(Deserialize)]
struct FoundRequest {
    profile: ProfileId,
    world: WorldId,
}

async fn found_handler(
    State(state): State<AppState>,
    Json(req): Json<FoundRequest>,
) -> ApiResponse {
    let now_ms = wall_clock_ms();
    let id = SettlementId(state.ids.settlement_id());
    let mut rng = ChaCha8Rng::seed_from_u64(state.seed ^ now_ms);
    let settlement = settle_world::found_settlement(
        &state.content,
        id.clone(),
        req.profile,
        req.world,
        now_ms,
        &mut rng,
    );
    let view = settlement_view(&settlement, &state);
    if let Err(err) = state.store.insert_settlement(settlement, now_ms).await {
        return store_error_response(&err);
    }
    tracing::info!(settlement = %id, "settlement founded");
    (StatusCode::CREATED, Json(view))
}

async fn settlement_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResponse {
    let id = SettlementId(id);
    match state.store.load_settlement(&id).await {
        Ok(loaded) => {
            // Viewing counts as activity for the tick rotation.
            let _ = state.store.touch(&id, wall_clock_ms()).await;
            (StatusCode::OK, Json(settlement_view(&loaded.state, &state)))
        }
        Err(err) => store_error_response(&err),
    }
}

async fn area_handler(State(state): State<AppState>, Path(id): Path<String>) -> ApiResponse {
    match state.store.load_settlement(&SettlementId(id)).await {
        Ok(loaded) => {
            let stats = area_stats(&loaded.state, &state.content);
            (
                StatusCode::OK,
                Json(serde_json::to_value(stats).unwrap_or_default()),
            )
        }
        Err(err) => store_error_response(&err),
    }
}

#[derive(Deserialize)]
struct HistoryParams {
    #[serde(default = "default_history_limit")]
    limit: usize,
}

fn default_history_limit() -> usize {
    settle_store::MAX_HISTORY
}

async fn history_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> ApiResponse {
    match state
        .store
        .recent_history(&SettlementId(id), params.limit)
        .await
    {
        Ok(rows) => (
            StatusCode::OK,
            Json(serde_json::json!({ "history": rows })),
        ),
        Err(err) => store_error_response(&err),
    }
}

/// Load-mutate-commit with a bounded retry against concurrent ticks.
async fn mutate_settlement<T>(
    state: &AppState,
    id: &SettlementId,
    mut op: impl FnMut(&mut SettlementState) -> Result<T, BuildError>,
) -> Result<T, ApiResponse> {
    for _ in 0..3 {
        let loaded = match state.store.load_settlement(id).await {
            Ok(loaded) => loaded,
            Err(err) => return Err(store_error_response(&err)),
        };
        let mut settlement = loaded.state;
        let value = match op(&mut settlement) {
            Ok(value) => value,
            Err(err) => return Err(build_error_response(&err)),
        };
        match state
            .store
            .commit_settlement(settlement, loaded.version)
            .await
        {
            Ok(_) => return Ok(value),
            Err(StoreError::VersionConflict { .. }) => continue,
            Err(err) => return Err(store_error_response(&err)),
        }
    }
    Err((
        StatusCode::SERVICE_UNAVAILABLE,
        Json(serde_json::json!({"error": "UNAVAILABLE", "message": "concurrent update, retry"})),
    ))
}

#[derive(Deserialize)]
struct BuildRequest {
    def: String,
}

async fn build_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<BuildRequest>,
) -> ApiResponse {
    let id = SettlementId(id);
    let now_ms = wall_clock_ms();
    let result = mutate_settlement(&state, &id, |settlement| {
        enqueue(settlement, &state.content, &req.def)
    })
    .await;
    match result {
        Ok(project) => {
            let _ = state.store.touch(&id, now_ms).await;
            state.bus.publish(
                &world_of(&state, &id).await,
                Event::ConstructionQueued {
                    settlement: id.clone(),
                    project: project.clone(),
                    def: req.def,
                },
                now_ms,
            );
            (
                StatusCode::ACCEPTED,
                Json(serde_json::json!({ "project": project })),
            )
        }
        Err(response) => response,
    }
}

#[derive(Deserialize)]
struct UpgradeRequest {
    structure: StructureId,
}

async fn upgrade_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpgradeRequest>,
) -> ApiResponse {
    let id = SettlementId(id);
    let now_ms = wall_clock_ms();
    let result = mutate_settlement(&state, &id, |settlement| {
        enqueue_upgrade(settlement, &state.content, &req.structure)
    })
    .await;
    match result {
        Ok(project) => {
            let _ = state.store.touch(&id, now_ms).await;
            (
                StatusCode::ACCEPTED,
                Json(serde_json::json!({ "project": project })),
            )
        }
        Err(response) => response,
    }
}

async fn world_of(state: &AppState, id: &SettlementId) -> WorldId {
    state
        .store
        .load_settlement(id)
        .await
        .map(|loaded| loaded.state.world)
        .unwrap_or_else(|_| WorldId(String::new()))
}

async fn list_disasters_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let events: Vec<DisasterEvent> = state
        .store
        .unresolved_disasters()
        .await
        .into_iter()
        .map(|(event, _)| event)
        .collect();
    Json(serde_json::json!({ "disasters": events }))
}

/// Either the user-facing 1–5 scale or a raw internal severity. The legacy
/// scale is resolved to an internal value here, at the boundary; everything
/// past this point speaks 0–100.
#[derive(Deserialize)]
#[serde(untagged)]
enum TriggerSeverity {
    UserScale { scale: u8 },
    Internal { severity: f32 },
}

/// Disasters hit whole worlds; a request naming a settlement targets that
/// settlement's world.
#[derive(Deserialize)]
#[serde(untagged)]
enum TriggerTarget {
    World { world: WorldId },
    Settlement { settlement: SettlementId },
}

#[derive(Deserialize)]
struct TriggerRequest {
    #[serde(flatten)]
    target: TriggerTarget,
    kind: DisasterKind,
    #[serde(flatten)]
    severity: TriggerSeverity,
    /// Replaces the tuned impact window, in seconds.
    #[serde(default)]
    duration_override_secs: Option<f32>,
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
async fn trigger_disaster_handler(
    State(state): State<AppState>,
    Json(req): Json<TriggerRequest>,
) -> ApiResponse {
    let now_ms = wall_clock_ms();
    let mut rng = ChaCha8Rng::seed_from_u64(state.seed ^ now_ms);

    let world = match &req.target {
        TriggerTarget::World { world } => world.clone(),
        TriggerTarget::Settlement { settlement } => {
            match state.store.load_settlement(settlement).await {
                Ok(loaded) => loaded.state.world,
                Err(err) => return store_error_response(&err),
            }
        }
    };

    let severity = match req.severity {
        TriggerSeverity::UserScale { scale } => match severity_from_user_scale(scale, &mut rng) {
            Ok(severity) => severity,
            Err(err) => {
                return (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(serde_json::json!({
                        "error": "INVALID_SEVERITY",
                        "message": err.to_string(),
                    })),
                );
            }
        },
        TriggerSeverity::Internal { severity } => {
            if !(0.0..=100.0).contains(&severity) {
                return (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(serde_json::json!({
                        "error": "INVALID_SEVERITY",
                        "message": format!("severity must be 0-100, got {severity}"),
                    })),
                );
            }
            severity
        }
    };

    let tuning = &state.content.disasters;
    let warning_ms = (tuning.default_warning_secs * 1000.0) as u64;
    let impact_duration_ms = match req.duration_override_secs {
        Some(secs) if secs > 0.0 => (secs * 1000.0) as u64,
        Some(secs) => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(serde_json::json!({
                    "error": "INVALID_DURATION",
                    "message": format!("duration override must be positive, got {secs}"),
                })),
            );
        }
        None => (tuning.default_impact_secs * 1000.0) as u64,
    };
    let event = DisasterEvent {
        id: DisasterId(state.ids.disaster_id()),
        world,
        kind: req.kind,
        severity,
        status: DisasterStatus::Warning,
        warning_issued_at_ms: now_ms,
        scheduled_at_ms: now_ms + warning_ms,
        impact_duration_ms,
        aftermath_at_ms: None,
        resolved_at_ms: None,
    };

    if let Err(err) = state.store.insert_disaster(event.clone()).await {
        return store_error_response(&err);
    }
    // Wake the affected world so idle settlements tick through the event.
    for settlement in state.store.settlements_in_world(&event.world).await {
        let _ = state.store.touch(&settlement, now_ms).await;
    }
    tracing::info!(
        disaster = %event.id,
        world = %event.world,
        kind = req.kind.label(),
        severity,
        "disaster scheduled",
    );
    state.bus.publish(
        &event.world,
        Event::DisasterWarning {
            disaster: event.id.clone(),
            kind: event.kind,
            world: event.world.clone(),
            warning_remaining_ms: warning_ms,
        },
        now_ms,
    );

    (
        StatusCode::CREATED,
        Json(serde_json::to_value(&event).unwrap_or_default()),
    )
}

async fn pause_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.paused.store(true, Ordering::Relaxed);
    Json(serde_json::json!({"paused": true}))
}

async fn resume_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.paused.store(false, Ordering::Relaxed);
    Json(serde_json::json!({"paused": false}))
}

#[derive(Deserialize)]
struct StreamParams {
    world: Option<String>,
}

async fn stream_handler(
    State(state): State<AppState>,
    Query(params): Query<StreamParams>,
) -> Sse<impl futures_core::Stream<Item = Result<SseEvent, Infallible>>> {
    let mut rx = state.bus.subscribe();
    let passes = state.passes.clone();
    let world_filter = params.world;

    let stream = async_stream::stream! {
        let mut heartbeat = tokio::time::interval(Duration::from_secs(5));
        heartbeat.tick().await; // discard the immediate first tick
        let mut flush = tokio::time::interval(Duration::from_millis(50));
        flush.tick().await; // discard the immediate first tick
        let mut pending: Vec<EventEnvelope> = Vec::new();
        loop {
            tokio::select! {
                result = rx.recv() => {
                    match result {
                        Ok(envelope) => {
                            let keep = world_filter
                                .as_deref()
                                .is_none_or(|world| envelope.world.0 == world);
                            if keep {
                                pending.push(envelope);
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            tracing::debug!(missed, "stream subscriber lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                _ = flush.tick() => {
                    if !pending.is_empty() {
                        let data = serde_json::to_string(&pending).unwrap_or_default();
                        pending.clear();
                        yield Ok(SseEvent::default().data(data));
                    }
                }
                _ = heartbeat.tick() => {
                    let hb = serde_json::json!({
                        "heartbeat": true,
                        "passes": passes.load(Ordering::Relaxed),
                    });
                    yield Ok(SseEvent::default().data(hb.to_string()));
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("ping"),
    )
}
