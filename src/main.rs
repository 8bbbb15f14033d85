// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::env;

use anyhow::{Context, Result};
use framegraph::config::{load_engine_config, ConfigMap, EngineConfig, SchedulerKind};
use framegraph::engine::{AsyncPipeline, PipelineReport, SyncPipeline};
use framegraph::graph::{BuiltPipeline, PipelineGraph};
use framegraph::observability::init_tracing;
use framegraph::processes::{Collector, CollectorHandle, SlidingDifference, VecSource};

/// Synthetic "frame brightness" samples fed through the demo pipeline.
const SAMPLES: [i64; 8] = [12, 15, 15, 22, 40, 38, 41, 60];

/// Build `source -> sliding_difference -> collector`.
fn build_demo(config: &EngineConfig) -> Result<(BuiltPipeline, CollectorHandle<i64>)> {
    let (collector, collected) = Collector::new();

    let mut graph = PipelineGraph::with_default_capacity(config.edges.get_default_capacity());
    let source = graph.add_node("frames", VecSource::new(SAMPLES.to_vec()), ConfigMap::new())?;
    let diff = graph.add_node(
        "motion",
        SlidingDifference::new(),
        ConfigMap::new().with("span", 2_i64),
    )?;
    let sink = graph.add_node(
        "sink",
        collector,
        ConfigMap::new().with("publish_as", "last_motion"),
    )?;
    graph.connect_default(source.port("out"), diff.port("in"))?;
    graph.connect_default(diff.port("out"), sink.port("in"))?;

    println!("{}", graph.to_dot());
    Ok((graph.build()?, collected))
}

async fn run(config: &EngineConfig, built: BuiltPipeline) -> Result<PipelineReport> {
    match config.scheduler {
        SchedulerKind::Sync => {
            let mut pipeline = SyncPipeline::from_config(built, config)?;
            pipeline.start()?;
            pipeline.run()?;
            Ok(pipeline.report())
        }
        SchedulerKind::Async => {
            let mut pipeline = AsyncPipeline::from_config(built, config);
            pipeline.start()?;
            pipeline.run_until_drained().await?;
            Ok(pipeline.report())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() > 2 {
        eprintln!("Usage: {} [engine-config.yaml|.json|.toml]", args[0]);
        std::process::exit(1);
    }

    let config = match args.get(1) {
        Some(path) => load_engine_config(path)
            .with_context(|| format!("loading engine config from {}", path))?,
        None => EngineConfig::default(),
    };
    if let Err(e) = init_tracing(config.logging.get_filter()) {
        eprintln!("tracing already initialized: {}", e);
    }

    let (built, collected) = build_demo(&config)?;
    let resources = built.resources().clone();
    let report = run(&config, built).await?;

    println!("differences: {:?}", collected.values());
    println!("last_motion: {:?}", resources.get::<i64>("last_motion"));
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
