//! API Handlers
//!
//! HTTP request handlers for each admin endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::cache::CacheEngine;
use crate::error::{CacheError, Result};
use crate::facades::Category;
use crate::models::{
    HealthResponse, InstanceHealth, InstanceStats, InvalidateQuery, InvalidateResponse,
    StatsResponse,
};
use crate::registry::CacheRegistry;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<CacheRegistry>,
}

impl AppState {
    pub fn new(registry: Arc<CacheRegistry>) -> Self {
        Self { registry }
    }
}

/// Resolves a path segment to an engine. Known categories are created on
/// demand; other names must already exist.
async fn resolve(state: &AppState, name: &str) -> Result<(String, Arc<CacheEngine>)> {
    if let Ok(category) = name.parse::<Category>() {
        let engine = state.registry.get_instance(category).await?;
        return Ok((category.as_str().to_string(), engine));
    }
    match state.registry.existing(name).await {
        Some(engine) => Ok((name.to_string(), engine)),
        None => Err(CacheError::Config(format!("Unknown cache instance: {}", name))),
    }
}

/// Handler for GET /health
///
/// Pings L2 from every instance; answers 503 if any of them is down.
pub async fn health_handler(
    State(state): State<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    let mut checks = Vec::new();
    for (name, engine) in state.registry.instances().await {
        match engine.ping().await {
            Ok(()) => checks.push(InstanceHealth::up(name)),
            Err(e) => checks.push(InstanceHealth::down(name, e.to_string())),
        }
    }

    let response = HealthResponse::from_checks(checks);
    let status = if response.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let instances = state
        .registry
        .instances()
        .await
        .into_iter()
        .map(|(name, engine)| InstanceStats::new(name, engine.stats()))
        .collect();

    Json(StatsResponse { instances })
}

/// Handler for GET /stats/:category
pub async fn category_stats_handler(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<InstanceStats>> {
    let (name, engine) = resolve(&state, &category).await?;
    Ok(Json(InstanceStats::new(name, engine.stats())))
}

/// Handler for DELETE /invalidate/:category?pattern=...
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Query(query): Query<InvalidateQuery>,
) -> Result<Json<InvalidateResponse>> {
    let (name, engine) = resolve(&state, &category).await?;
    let pattern = query.pattern().to_string();
    let removed = engine.del_pattern(&pattern).await;

    Ok(Json(InvalidateResponse {
        instance: name,
        pattern,
        removed,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::store::MemoryStore;

    fn state_over(store: &MemoryStore) -> AppState {
        AppState::new(Arc::new(CacheRegistry::with_connector(
            Config::default(),
            Arc::new(store.clone()),
        )))
    }

    #[tokio::test]
    async fn test_health_handler() {
        let store = MemoryStore::new();
        let state = state_over(&store);
        state.registry.get_instance(Category::Users).await.unwrap();

        let (status, response) = health_handler(State(state.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response.status, "healthy");

        store.set_available(false);
        let (status, response) = health_handler(State(state)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.instances[0].l2, "down");
    }

    #[tokio::test]
    async fn test_stats_handler_lists_instances() {
        let state = state_over(&MemoryStore::new());
        state.registry.get_instance(Category::Content).await.unwrap();
        state.registry.get_instance(Category::Users).await.unwrap();

        let response = stats_handler(State(state)).await;
        let names: Vec<&str> = response.instances.iter().map(|i| i.instance.as_str()).collect();
        assert_eq!(names, vec!["content", "users"]);
    }

    #[tokio::test]
    async fn test_category_stats_unknown() {
        let state = state_over(&MemoryStore::new());

        let result = category_stats_handler(State(state), Path("billing".to_string())).await;
        assert!(matches!(result, Err(CacheError::Config(_))));
    }

    #[tokio::test]
    async fn test_invalidate_handler() {
        let state = state_over(&MemoryStore::new());
        let content = state.registry.content().await.unwrap();
        content.set_list("5", 1, &["a"]).await.unwrap();
        content.set_list("6", 1, &["b"]).await.unwrap();

        let response = invalidate_handler(
            State(state),
            Path("content".to_string()),
            Query(InvalidateQuery {
                pattern: Some("list:5:*".to_string()),
            }),
        )
        .await
        .unwrap();

        assert_eq!(response.removed.l2_removed, 1);
        assert!(content.get_list::<Vec<String>>("6", 1).await.is_some());
    }
}
