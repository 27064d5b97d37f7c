use procgauge::metrics::registry::names;
use procgauge::{
    start_web_server, ConfigController, ControlFlags, LoopState, MetricFamily, MetricRegistry,
    ProcFs, ReadError, Sampler, SamplingConfig, WebConfig,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

const MEMINFO: &str = "MemTotal:        1000 kB\nMemFree:          100 kB\nMemAvailable:     250 kB\n";
const DISKSTATS: &str = "   8       0 sda 10 0 300 0 5 0 200 0 0 0 0\n   8       1 sda1 5 0 100 0 2 0 50 0 0 0 0\n";
const NET_DEV: &str = "Inter-|   Receive |  Transmit
 face |bytes packets errs drop fifo frame compressed multicast|bytes packets errs drop fifo colls carrier compressed
    lo: 100 1 0 0 0 0 0 0 100 1 0 0 0 0 0 0
  eth0: 900 9 3 0 0 0 0 0 400 4 2 0 0 1 0 0
";

fn stat(cpu_line: &str) -> String {
    format!("{}\nctxt 4242\nprocs_running 7\n", cpu_line)
}

/// A fake `/proc` tree plus a config file.
struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new(config_json: &str) -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("proc/net")).unwrap();
        let fixture = Self { dir };
        fixture.write("proc/stat", &stat("cpu  100 0 100 700 0 0 0 0"));
        fixture.write("proc/meminfo", MEMINFO);
        fixture.write("proc/diskstats", DISKSTATS);
        fixture.write("proc/net/dev", NET_DEV);
        fixture.write("config.json", config_json);
        fixture
    }

    fn write(&self, relative: &str, contents: &str) {
        fs::write(self.dir.path().join(relative), contents).unwrap();
    }

    fn remove(&self, relative: &str) {
        fs::remove_file(self.dir.path().join(relative)).unwrap();
    }

    fn config_path(&self) -> std::path::PathBuf {
        self.dir.path().join("config.json")
    }

    fn proc_root(&self) -> &Path {
        self.dir.path()
    }

    fn sampler(&self) -> (Sampler, Arc<MetricRegistry>, Arc<ControlFlags>) {
        let registry = Arc::new(MetricRegistry::with_default_gauges().unwrap());
        let flags = Arc::new(ControlFlags::new());
        let sampler = Sampler::new(
            ProcFs::new(self.proc_root().join("proc")),
            Arc::clone(&registry),
            ConfigController::load_initial(self.config_path()),
            Arc::clone(&flags),
        );
        (sampler, registry, flags)
    }
}

/// Two successive /proc/stat samples produce a delta-based CPU usage
#[test]
fn test_cpu_usage_end_to_end() {
    let fixture = Fixture::new("{}");
    let (mut sampler, registry, _) = fixture.sampler();

    let first = sampler.run_once();
    assert!(first
        .failed
        .iter()
        .any(|(family, e)| *family == MetricFamily::Cpu && *e == ReadError::NoBaseline));
    assert!(!first.published.contains(&names::CPU_USAGE));
    assert_eq!(registry.get(names::CPU_USAGE), Some(0.0));

    fixture.write("proc/stat", &stat("cpu  110 0 110 720 0 0 0 0"));
    let second = sampler.run_once();
    assert!(second.failed.is_empty());
    assert_eq!(registry.get(names::CPU_USAGE), Some(50.0));
}

/// Every enabled family lands in its gauges
#[test]
fn test_all_gauges_published() {
    let fixture = Fixture::new("{}");
    let (mut sampler, registry, _) = fixture.sampler();
    sampler.run_once();

    let snapshot = registry.snapshot();
    assert_eq!(snapshot[names::MEMORY_USAGE], 75.0);
    assert_eq!(snapshot[names::DISK_IO_READS], 400.0);
    assert_eq!(snapshot[names::DISK_IO_WRITES], 250.0);
    assert_eq!(snapshot[names::NETWORK_RX_BYTES], 1000.0);
    assert_eq!(snapshot[names::NETWORK_TX_BYTES], 500.0);
    assert_eq!(snapshot[names::NETWORK_RX_ERRORS], 3.0);
    assert_eq!(snapshot[names::NETWORK_TX_ERRORS], 2.0);
    assert_eq!(snapshot[names::NETWORK_COLLISIONS], 1.0);
    assert_eq!(snapshot[names::PROCESS_COUNT], 7.0);
    assert_eq!(snapshot[names::CONTEXT_SWITCHES], 4242.0);
}

/// A failed reading leaves the last published value in place
#[test]
fn test_failed_reading_keeps_previous_value() {
    let fixture = Fixture::new("{}");
    let (mut sampler, registry, _) = fixture.sampler();
    sampler.run_once();
    assert_eq!(registry.get(names::DISK_IO_READS), Some(400.0));

    fixture.remove("proc/diskstats");
    fixture.write("proc/meminfo", "MemTotal: 1000 kB\n");
    let report = sampler.run_once();

    assert!(report.failed.iter().any(|(family, e)| *family == MetricFamily::DiskIo
        && matches!(e, ReadError::SourceUnavailable { .. })));
    assert!(report
        .failed
        .iter()
        .any(|(family, _)| *family == MetricFamily::Memory));
    assert_eq!(registry.get(names::DISK_IO_READS), Some(400.0));
    assert_eq!(registry.get(names::MEMORY_USAGE), Some(75.0));
}

/// Reloading a config with memory disabled stops memory updates only
#[test]
fn test_reload_disables_memory_and_changes_interval() {
    let fixture = Fixture::new("{}");
    let (mut sampler, registry, flags) = fixture.sampler();
    sampler.run_once();
    assert_eq!(registry.get(names::MEMORY_USAGE), Some(75.0));

    fixture.write(
        "config.json",
        r#"{"metrics":{"cpu":true,"memory":false},"interval":2}"#,
    );
    fixture.write("proc/meminfo", "MemTotal: 1000 kB\nMemAvailable: 500 kB\n");
    fixture.write("proc/stat", &stat("cpu  110 0 110 720 0 0 0 0"));
    flags.request_reload();

    let report = sampler.run_once();
    assert!(report.reload_requested);
    assert!(!report.reload_failed);
    assert_eq!(sampler.config().interval, 2);
    assert!(!sampler.config().metrics.memory);
    assert!(!report.published.contains(&names::MEMORY_USAGE));
    assert!(report.published.contains(&names::CPU_USAGE));
    assert_eq!(registry.get(names::MEMORY_USAGE), Some(75.0));
    assert_eq!(registry.get(names::CPU_USAGE), Some(50.0));
}

/// A malformed config file leaves the active config unchanged
#[test]
fn test_malformed_reload_keeps_config() {
    let fixture = Fixture::new(r#"{"metrics":{"network_stats":false},"interval":3}"#);
    let (mut sampler, _, flags) = fixture.sampler();
    let before: SamplingConfig = sampler.config().clone();

    fixture.write("config.json", r#"{"metrics": {"cpu": false"#);
    flags.request_reload();
    let report = sampler.run_once();

    assert!(report.reload_failed);
    assert_eq!(sampler.config(), &before);
    assert!(!report.published.contains(&names::NETWORK_RX_BYTES));
}

/// The loop finishes its cycle and stops once a stop is requested
#[tokio::test(start_paused = true)]
async fn test_run_stops_when_requested() {
    let fixture = Fixture::new(r#"{"interval":1}"#);
    let (mut sampler, registry, flags) = fixture.sampler();

    flags.request_stop();
    tokio::time::timeout(Duration::from_secs(5), sampler.run())
        .await
        .expect("loop should stop after one cycle");

    assert_eq!(sampler.state(), LoopState::Stopping);
    assert_eq!(registry.get(names::PROCESS_COUNT), Some(7.0));
}

/// After a reload the loop sleeps for the new interval and CPU keeps updating
#[tokio::test(start_paused = true)]
async fn test_run_uses_reloaded_interval() {
    let fixture = Fixture::new(r#"{"interval":10}"#);
    let (mut sampler, registry, flags) = fixture.sampler();
    assert_eq!(sampler.config().interval, 10);

    fixture.write("config.json", r#"{"interval":2}"#);
    flags.request_reload();

    let start = tokio::time::Instant::now();
    let control = async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        fixture.write("proc/stat", &stat("cpu  110 0 110 720 0 0 0 0"));
        tokio::time::sleep(Duration::from_secs(2)).await;
        flags.request_stop();
    };
    tokio::join!(sampler.run(), control);

    // cycles at 0s and 2s, stop seen after the second 2s sleep
    assert_eq!(start.elapsed(), Duration::from_secs(4));
    assert_eq!(sampler.config().interval, 2);
    assert_eq!(registry.get(names::CPU_USAGE), Some(50.0));
}

/// Scraping /metrics over TCP returns the text exposition format
#[tokio::test]
async fn test_metrics_served_over_http() {
    let registry = Arc::new(MetricRegistry::with_default_gauges().unwrap());
    registry.set(names::CONTEXT_SWITCHES, 1234.0).unwrap();

    let config = WebConfig::new("127.0.0.1", 0);
    let (addr, server) = start_web_server(&config, Arc::clone(&registry))
        .await
        .unwrap();

    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /metrics HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();

    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.contains("context_switches 1234"));
    assert!(response.contains("# HELP cpu_usage_percentage CPU usage percentage"));

    server.abort();
}

/// An occupied port is reported instead of failing inside the server task
#[tokio::test]
async fn test_bind_failure_is_reported() {
    let registry = Arc::new(MetricRegistry::new());
    let occupied = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = occupied.local_addr().unwrap().port();

    let result = start_web_server(&WebConfig::new("127.0.0.1", port), registry).await;
    assert!(result.is_err());
}
