use choreo_core::config;
use choreo_core::pipeline::{Coordinator, EnhancementUpdate, PlanRequest};
use choreo_core::types::PipelineMode;
use serde::Serialize;
use std::env;

#[derive(Debug, Serialize)]
struct FinalReport {
    #[serde(flatten)]
    response: choreo_core::pipeline::CoreResponse,
    enhancement: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    tracing::info!("Starting choreography planner host");

    let args: Vec<String> = env::args().collect();
    let config_path = args.get(1).map(String::as_str).unwrap_or("choreo.toml");
    let scenario_path = args.get(2).map(String::as_str).unwrap_or("scenario.json");

    tracing::info!("Loading configuration from: {}", config_path);
    let cfg = config::load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Falling back to default configuration: {}", e);
        config::Config::default()
    });
    cfg.validate().map_err(|e| {
        tracing::error!("Invalid configuration: {}", e);
        Box::new(e) as Box<dyn std::error::Error + Send + Sync + 'static>
    })?;

    tracing::info!("Loading scenario from: {}", scenario_path);
    let scenario_contents = std::fs::read_to_string(scenario_path).map_err(|e| {
        tracing::error!("Failed to read scenario file '{}': {}", scenario_path, e);
        Box::new(e) as Box<dyn std::error::Error + Send + Sync + 'static>
    })?;
    let request: PlanRequest = serde_json::from_str(&scenario_contents).map_err(|e| {
        tracing::error!("Failed to parse scenario JSON: {}", e);
        Box::new(e) as Box<dyn std::error::Error + Send + Sync + 'static>
    })?;

    let used_pre_constraint = matches!(request.mode, PipelineMode::PreAndRank);
    let coordinator = Coordinator::new(cfg);
    let (mut response, handle) = coordinator.run(request).await?;

    tracing::info!(
        "Pipeline selected strategy '{}' among {} candidates in {}ms",
        response.metadata.selected_strategy,
        response.metadata.total_candidates,
        response.metadata.compute_time_ms
    );

    let enhancement = match handle {
        Some(h) => {
            let update = h.await_update().await;
            let summary = match &update {
                EnhancementUpdate::Success(ranking) => format!("enhanced selection: {}", ranking.selected_id),
                EnhancementUpdate::Timeout => "provider timed out; kept local selection".to_string(),
                EnhancementUpdate::Failed(reason) => format!("provider failed ({reason}); kept local selection"),
            };
            response.apply_enhancement(update, used_pre_constraint);
            Some(summary)
        }
        None => None,
    };

    let report = FinalReport { response, enhancement };
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
