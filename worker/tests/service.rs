use std::{
    env, fs,
    net::SocketAddr,
    path::{Path, PathBuf},
    process,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use machine_learning::{arch::Sequential, encoding::Example};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    sync::mpsc,
};
use worker::{PublishOutcome, TrainingService, TrainingStatus, WorkerConfig};

/// Answers every request with the same best rating and counts the requests per path.
async fn registry(rating: f64) -> (SocketAddr, Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let queries = Arc::new(AtomicUsize::new(0));
    let publishes = Arc::new(AtomicUsize::new(0));
    let (q, p) = (Arc::clone(&queries), Arc::clone(&publishes));

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let head = read_request(&mut stream).await;

            if head.starts_with("POST /best_rating.php") {
                q.fetch_add(1, Ordering::SeqCst);
            } else if head.starts_with("POST /save_neural_network.php") {
                p.fetch_add(1, Ordering::SeqCst);
            }

            let body = format!("{{\"rating\": {rating}}}");
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    });

    (addr, queries, publishes)
}

/// Reads a whole request and returns its head.
async fn read_request(stream: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0; 4096];

    loop {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed mid request");
        buf.extend_from_slice(&chunk[..n]);

        let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };

        let head = String::from_utf8_lossy(&buf[..end]).to_string();
        let len: usize = head
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse().unwrap())
            })
            .unwrap_or(0);

        if buf.len() >= end + 4 + len {
            return head;
        }
    }
}

fn scratch(name: &str) -> PathBuf {
    let dir = env::temp_dir().join(format!("worker-service-{name}-{}", process::id()));
    let _ = fs::remove_dir_all(&dir);
    dir
}

fn spool(dir: &Path, n: usize) {
    fs::create_dir_all(dir).unwrap();

    for i in 0..n {
        let example = Example {
            board: (0..7).map(|r| (0..4).map(|c| ((r * c + i) % 5) as i32).collect()).collect(),
            player: i % 4 + 1,
            column: i % 4,
        };
        let path = dir.join(format!("{i:04}.json"));
        fs::write(path, serde_json::to_string(&example).unwrap()).unwrap();
    }
}

fn config(addr: SocketAddr, dir: &Path) -> WorkerConfig {
    WorkerConfig {
        host: addr.to_string(),
        model_path: dir.join("model.json"),
        examples_dir: dir.join("spool"),
        seed: Some(3),
        ..Default::default()
    }
}

#[tokio::test]
async fn activation_trains_stores_and_publishes() {
    let dir = scratch("publish");
    let (addr, queries, publishes) = registry(1e9).await;
    let config = config(addr, &dir);
    spool(&config.examples_dir, 12);

    let (tx, _rx) = mpsc::channel(1);
    let service = TrainingService::new(config.clone(), tx).unwrap();

    let report = service.activate().await.unwrap();

    assert!(service.is_scheduled());
    assert!(report.published(), "{:?}", report.failures);
    assert!(matches!(report.training, TrainingStatus::Trained { saved: true, .. }));
    assert_eq!(queries.load(Ordering::SeqCst), 1);
    assert_eq!(publishes.load(Ordering::SeqCst), 1);

    let stored = Sequential::from_blob(&fs::read_to_string(&config.model_path).unwrap()).unwrap();
    assert_eq!(stored.input_width(), 32);
    assert_eq!(stored.output_width(), 4);
    assert_eq!(fs::read_dir(&config.examples_dir).unwrap().count(), 2);

    service.deactivate();
    assert!(!service.is_scheduled());

    fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn drained_spool_leaves_registry_alone() {
    let dir = scratch("drained");
    let (addr, queries, publishes) = registry(0.).await;
    let config = config(addr, &dir);
    spool(&config.examples_dir, 4);

    let (tx, _rx) = mpsc::channel(1);
    let service = TrainingService::new(config.clone(), tx).unwrap();

    let report = service.activate().await.unwrap();

    assert_eq!(report.training, TrainingStatus::NoTrainingPerformed { available: 4 });
    assert_eq!(report.publish, PublishOutcome::NoTraining);
    assert_eq!(queries.load(Ordering::SeqCst), 0);
    assert_eq!(publishes.load(Ordering::SeqCst), 0);
    assert!(!config.model_path.exists());

    fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn worse_model_is_stored_but_not_published() {
    let dir = scratch("skip");
    let (addr, queries, publishes) = registry(0.).await;
    let config = config(addr, &dir);
    spool(&config.examples_dir, 10);

    let (tx, _rx) = mpsc::channel(1);
    let service = TrainingService::new(config.clone(), tx).unwrap();

    let report = service.activate().await.unwrap();

    assert!(matches!(
        report.publish,
        PublishOutcome::Skipped { remote: Some(r), .. } if r == 0.
    ));
    assert_eq!(queries.load(Ordering::SeqCst), 1);
    assert_eq!(publishes.load(Ordering::SeqCst), 0);
    assert!(config.model_path.exists());

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn invalid_configuration_is_rejected() {
    let (tx, _rx) = mpsc::channel(1);
    let config = WorkerConfig {
        batch_size: 0,
        ..Default::default()
    };

    assert!(TrainingService::new(config, tx).is_err());
}
