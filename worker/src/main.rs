use std::{env, io};

use log::{info, warn};
use tokio::{signal, sync::mpsc};

use worker::{ActivationReport, TrainingService, WorkerConfig};

/// The variable holding the path of the json configuration file.
const CONFIG_VAR: &str = "WORKER_CONFIG";

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    let once = env::args().skip(1).any(|arg| arg == "--once");

    let config = match env::var(CONFIG_VAR) {
        Ok(path) => WorkerConfig::from_path(&path)?,
        Err(_) => WorkerConfig::default(),
    }
    .with_env()?;

    let (wake_tx, mut wake_rx) = mpsc::channel(1);
    let service = TrainingService::new(config, wake_tx)?;
    info!(
        host = service.config().host.as_str(),
        interval_secs = service.config().interval_secs;
        "training service up"
    );

    run_activation(&service).await;

    if once {
        service.deactivate();
        return Ok(());
    }

    loop {
        tokio::select! {
            wake = wake_rx.recv() => {
                if wake.is_none() {
                    break;
                }
                run_activation(&service).await;
            }
            _ = signal::ctrl_c() => {
                info!("received SIGTERM");
                break;
            }
        }
    }

    service.deactivate();
    Ok(())
}

async fn run_activation(service: &TrainingService) {
    match service.activate().await {
        Ok(report) => log_report(&report),
        Err(e) => warn!("activation could not start: {e}"),
    }
}

fn log_report(report: &ActivationReport) {
    for failure in &report.failures {
        warn!("activation recovered from: {failure}");
    }

    info!(
        training:? = report.training,
        publish:? = report.publish;
        "activation report"
    );
}
