use tracing::info;

use crate::context::AppContext;
use crate::error::{AppError, AppResult};
use crate::ingest::IngestPipeline;
use crate::outbound::OutboundPipeline;
use crate::queue::Shutdown;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pipelines {
    All,
    Download,
    Send,
}

impl Pipelines {
    fn download(self) -> bool {
        matches!(self, Pipelines::All | Pipelines::Download)
    }

    fn send(self) -> bool {
        matches!(self, Pipelines::All | Pipelines::Send)
    }
}

pub async fn run(ctx: &AppContext, pipelines: Pipelines) -> AppResult<()> {
    let service = ctx.mailbox()?;
    let shutdown = Shutdown::new();

    info!("starting with profile {}", ctx.profile);

    let mut ingest = None;
    if pipelines.download() {
        ingest = Some(IngestPipeline::start(service.clone(), &ctx.settings, shutdown.clone()).await?);
    }

    let mut outbound = None;
    if pipelines.send() {
        match OutboundPipeline::start(service, &ctx.settings, shutdown.clone()) {
            Ok(pipeline) => outbound = Some(pipeline),
            Err(err) => {
                stop(&shutdown, ingest, None).await;
                return Err(err);
            }
        }
    }

    let outcome = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            info!("interrupted, shutting down");
            signal.map_err(AppError::from)
        }
        err = ingest_failure(&mut ingest) => Err(err),
    };

    stop(&shutdown, ingest, outbound).await;
    outcome?;

    ctx.output.emit("stopped", &serde_json::json!({ "status": "stopped" }))
}

async fn ingest_failure(ingest: &mut Option<IngestPipeline>) -> AppError {
    match ingest {
        Some(pipeline) => pipeline.failed().await,
        None => std::future::pending().await,
    }
}

async fn stop(
    shutdown: &Shutdown,
    ingest: Option<IngestPipeline>,
    outbound: Option<OutboundPipeline>,
) {
    shutdown.trigger();

    if let Some(pipeline) = ingest {
        pipeline.stop().await;
    }
    if let Some(pipeline) = outbound {
        pipeline.stop().await;
    }
}
