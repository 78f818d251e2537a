use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::{Duration, sleep};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use courier_core::{Broker, CourierBuilder, CourierConfig, HandlerError, Job, JobHandler};

const RESULTS_TOPIC: &str = "jobs.done";
const DEFAULT_JOBS: u64 = 12;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct HelloPayload {
    name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct HelloReply {
    job_id: u64,
    greeting: String,
    took_ms: u64,
}

/// Greets, then reports the reply on `jobs.done`.
///
/// 結果チャネルは無いので、結果が欲しい job は自分で publish する
struct HelloHandler {
    broker: Arc<Broker<String>>,
}

#[async_trait]
impl JobHandler<HelloPayload> for HelloHandler {
    async fn handle(&self, job: Job<HelloPayload>) -> Result<(), HandlerError> {
        let took_ms = rand::thread_rng().gen_range(5..50);
        sleep(Duration::from_millis(took_ms)).await;

        if job.payload().name.is_empty() {
            return Err(HandlerError::new("empty name"));
        }

        let reply = HelloReply {
            job_id: job.id().get(),
            greeting: format!("Hello, {}!", job.payload().name),
            took_ms,
        };
        let body = serde_json::to_string(&reply)
            .map_err(|e| HandlerError::new(format!("json encode: {e}")))?;
        self.broker.publish(RESULTS_TOPIC, body).await;
        Ok(())
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // 既に subscriber が入っていても続行
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let jobs = match std::env::args().nth(1) {
        Some(arg) => arg
            .parse::<u64>()
            .with_context(|| format!("job count must be a number, got {arg:?}"))?,
        None => DEFAULT_JOBS,
    };

    // (A) 設定を読んで Courier を組み立てる
    let config = CourierConfig::load().context("loading configuration")?;
    info!(?config, jobs, "starting courier demo");

    let courier = CourierBuilder::<HelloPayload, String>::new()
        .config(config)
        .handler_with(|broker| HelloHandler { broker })
        .build()
        .context("building courier")?;

    // (B) 結果 topic を購読（submit より先に）
    let mut results = courier.subscribe(RESULTS_TOPIC)?;

    // (C) job 投入は別タスクで。inbox が満杯だと handler 側の publish が待つため
    let queue = courier.queue();
    let producer = tokio::spawn(async move {
        for id in 1..=jobs {
            // 7 の倍数はわざと失敗させる
            let name = if id % 7 == 0 { String::new() } else { format!("courier-{id}") };
            if let Err(e) = queue.submit(Job::new(id, HelloPayload { name })).await {
                warn!(error = %e, "submit failed");
                break;
            }
        }
    });

    // (D) 結果を集める。失敗分は届かないので件数が揃うか Ctrl-C まで
    let expected = (1..=jobs).filter(|id| id % 7 != 0).count();
    let mut received = 0;
    let mut interrupted = false;
    while received < expected {
        tokio::select! {
            msg = results.recv() => {
                let Some(body) = msg else { break };
                let reply: HelloReply = serde_json::from_str(&body).context("decoding reply")?;
                info!(job_id = reply.job_id, took_ms = reply.took_ms, "{}", reply.greeting);
                received += 1;
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("interrupted");
                interrupted = true;
                break;
            }
        }
    }

    // 読み手がいなくなった inbox は publish 時に prune されるので handler が詰まらない
    drop(results);

    let counts = if interrupted {
        producer.abort();
        courier.stop().await
    } else {
        producer.await.context("producer task")?;
        courier.shutdown().await
    };
    println!("{}", serde_json::to_string_pretty(&counts)?);
    Ok(())
}
