use crate::priv_prelude::*;
use crate::tests::{init_logging, random_bytes};
use tokio::io::DuplexStream;

const TIMEOUT: Duration = Duration::from_secs(5);

struct Harness {
    client: DuplexStream,
    server: DuplexStream,
    shutdown: CancellationToken,
    relay: JoinHandle<SimplexReport<DuplexStream, DuplexStream>>,
}

fn spawn_relay(chunk_size: usize, distribution: Distribution) -> Harness {
    init_logging();
    let (client, source) = tokio::io::duplex(1 << 16);
    let (sink, server) = tokio::io::duplex(1 << 16);
    let shutdown = CancellationToken::new();
    let relay = SimplexRelay::new(
        "client -> server",
        source,
        sink,
        chunk_size,
        Arc::new(distribution),
        shutdown.clone(),
    );
    let relay = tokio::spawn(relay.run());
    Harness { client, server, shutdown, relay }
}

#[tokio::test(flavor = "multi_thread")]
async fn forwards_unmodified_and_in_order() {
    const NUM_MSGS: usize = 1000;

    let Harness { mut client, mut server, relay, .. } = spawn_relay(64, Distribution::constant(0.0));
    let data = random_bytes(NUM_MSGS * 37);

    let sender = {
        let data = data.clone();
        async move {
            for msg in data.chunks(37) {
                client.write_all(msg).await.unwrap();
            }
            client.shutdown().await.unwrap();
            client
        }
    };
    let receiver = async move {
        let mut received = vec![0u8; NUM_MSGS * 37];
        server.read_exact(&mut received).await.unwrap();
        received
    };
    let sender = tokio::spawn(sender);
    let receiver = tokio::spawn(receiver);
    let (sender_res, receiver_res) = tokio::join!(sender, receiver);
    let _client = sender_res.unwrap();
    assert!(receiver_res.unwrap() == data);

    let report = tokio::time::timeout(TIMEOUT, relay).await.unwrap().unwrap();
    assert!(matches!(report.end, SimplexEnd::Eof));
    assert_eq!(report.bytes, data.len() as u64);
}

#[tokio::test(flavor = "multi_thread")]
async fn constant_delay_is_applied_per_chunk() {
    const CHUNK_SIZE: usize = 4;
    const NUM_CHUNKS: usize = 10;
    const DELAY: Duration = Duration::from_millis(50);

    let Harness { mut client, mut server, shutdown, relay } = {
        spawn_relay(CHUNK_SIZE, Distribution::constant(DELAY.as_secs_f64()))
    };
    let data = random_bytes(CHUNK_SIZE * NUM_CHUNKS);

    let start_instant = Instant::now();
    client.write_all(&data).await.unwrap();
    let mut received = vec![0u8; data.len()];
    server.read_exact(&mut received).await.unwrap();
    let elapsed = start_instant.elapsed();

    assert_eq!(received, data);
    assert!(elapsed >= DELAY * NUM_CHUNKS as u32);

    shutdown.cancel();
    let report = tokio::time::timeout(TIMEOUT, relay).await.unwrap().unwrap();
    assert!(matches!(report.end, SimplexEnd::Cancelled));
    assert!(report.chunks >= NUM_CHUNKS as u64);
}

#[tokio::test(flavor = "multi_thread")]
async fn cancel_interrupts_delay() {
    let Harness { mut client, mut server, shutdown, relay } = spawn_relay(64, Distribution::constant(3600.0));

    client.write_all(b"hello").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.cancel();

    let report = tokio::time::timeout(TIMEOUT, relay).await.unwrap().unwrap();
    assert!(matches!(report.end, SimplexEnd::Cancelled));
    assert_eq!(report.bytes, 0);

    // nothing was forwarded, and nothing will be once the sink is dropped
    drop(report);
    let mut buffer = Vec::new();
    let n = server.read_to_end(&mut buffer).await.unwrap();
    assert_eq!(n, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn cancel_interrupts_read_from_silent_source() {
    let Harness { client: _client, server: _server, shutdown, relay } = {
        spawn_relay(64, Distribution::constant(0.0))
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!relay.is_finished());
    shutdown.cancel();

    let report = tokio::time::timeout(TIMEOUT, relay).await.unwrap().unwrap();
    assert!(matches!(report.end, SimplexEnd::Cancelled));
}

#[tokio::test(flavor = "multi_thread")]
async fn source_close_ends_relay() {
    let Harness { client, server: _server, relay, .. } = spawn_relay(64, Distribution::constant(0.0));

    drop(client);

    let report = tokio::time::timeout(TIMEOUT, relay).await.unwrap().unwrap();
    assert!(matches!(report.end, SimplexEnd::Eof));
    assert_eq!(report.chunks, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn sink_failure_ends_relay() {
    let Harness { mut client, server, relay, .. } = spawn_relay(64, Distribution::constant(0.0));

    drop(server);
    client.write_all(b"hello").await.unwrap();

    let report = tokio::time::timeout(TIMEOUT, relay).await.unwrap().unwrap();
    match report.end {
        SimplexEnd::Failed(err) => assert_eq!(err.kind(), io::ErrorKind::BrokenPipe),
        end => panic!("unexpected end {:?}", end),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn distribution_is_shared_between_relays() {
    init_logging();
    let distribution = Arc::new(Distribution::exponential(0.001));
    let shutdown = CancellationToken::new();

    let mut relays = Vec::new();
    let mut ends = Vec::new();
    for _ in 0..2 {
        let (client, source) = tokio::io::duplex(1024);
        let (sink, server) = tokio::io::duplex(1024);
        let relay = SimplexRelay::new("shared", source, sink, 16, distribution.clone(), shutdown.clone());
        relays.push(tokio::spawn(relay.run()));
        ends.push((client, server));
    }

    for (client, server) in &mut ends {
        client.write_all(&[7u8; 100]).await.unwrap();
        let mut received = [0u8; 100];
        server.read_exact(&mut received).await.unwrap();
        assert_eq!(received, [7u8; 100]);
    }

    shutdown.cancel();
    for relay in relays {
        let report = tokio::time::timeout(TIMEOUT, relay).await.unwrap().unwrap();
        assert_eq!(report.bytes, 100);
    }
}
