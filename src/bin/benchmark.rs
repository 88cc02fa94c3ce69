use reqwest::Client;
use serde_json::Value;
use std::fmt::Write as _;
use std::time::{Duration, Instant};

const HOSTS: &[&str] = &["web-1", "web-2", "web-3", "db-1", "db-2", "cache-1", "api-1", "api-2"];
const REGIONS: &[&str] = &["us-east", "us-west", "eu-west", "ap-south"];
const IFACES: &[&str] = &["eth0", "eth1", "lo"];

fn fast_random(seed: &mut u64) -> u64 {
    *seed ^= *seed << 13;
    *seed ^= *seed >> 7;
    *seed ^= *seed << 17;
    *seed
}

fn now_nanos() -> i64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
}

/// One `cpu` line per host, all hosts sharing each timestamp
fn generate_cpu(count: usize, batch_num: usize, seed: &mut u64) -> String {
    let base = now_nanos() - (batch_num * count) as i64 * 10_000_000_000;
    let mut out = String::new();
    for i in 0..count {
        let host = HOSTS[i % HOSTS.len()];
        let ts = base + (i / HOSTS.len()) as i64 * 10_000_000_000;
        let idle = (fast_random(seed) % 1000) as f64 / 10.0;
        let _ = writeln!(
            out,
            "cpu,host={},region={} usage_idle={},usage_user={},usage_system={} {}",
            host,
            REGIONS[fast_random(seed) as usize % REGIONS.len()],
            idle,
            (100.0 - idle) * 0.7,
            (100.0 - idle) * 0.3,
            ts
        );
    }
    out
}

fn generate_net(count: usize, batch_num: usize, seed: &mut u64) -> String {
    let base = now_nanos() - (batch_num * count) as i64 * 1_000_000_000;
    let mut out = String::new();
    for i in 0..count {
        let _ = writeln!(
            out,
            "net,host={},interface={} bytes_recv={}i,bytes_sent={}i,up={} {}",
            HOSTS[fast_random(seed) as usize % HOSTS.len()],
            IFACES[fast_random(seed) as usize % IFACES.len()],
            fast_random(seed) % 1_000_000_000,
            fast_random(seed) % 1_000_000_000,
            fast_random(seed) % 10 != 0,
            base + i as i64 * 1_000_000_000
        );
    }
    out
}

struct BenchmarkStats {
    total_lines: usize,
    total_frames: u64,
    total_duration: Duration,
    batch_latencies: Vec<Duration>,
}

impl BenchmarkStats {
    fn lines_per_sec(&self) -> f64 {
        self.total_lines as f64 / self.total_duration.as_secs_f64()
    }

    fn sorted(&self) -> Vec<Duration> {
        let mut sorted = self.batch_latencies.clone();
        sorted.sort();
        sorted
    }

    fn avg_latency(&self) -> Duration {
        let sum: Duration = self.batch_latencies.iter().sum();
        sum / self.batch_latencies.len().max(1) as u32
    }

    fn percentile(&self, pct: usize) -> Duration {
        let sorted = self.sorted();
        sorted
            .get(sorted.len() * pct / 100)
            .or(sorted.last())
            .copied()
            .unwrap_or_default()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    let lines_per_batch: usize = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(1000);
    let num_batches: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(10);
    let host = std::env::var("LINEFRAME_HOST").unwrap_or_else(|_| "localhost".to_string());
    let port = std::env::var("LINEFRAME_PORT").unwrap_or_else(|_| "8080".to_string());
    let base_url = format!("http://{}:{}", host, port);

    println!("lineframe Benchmark");
    println!("===================");
    println!("Target:          {}", base_url);
    println!("Lines per batch: {}", lines_per_batch);
    println!("Batches:         {}", num_batches);
    println!();

    let client = Client::new();
    let mut seed: u64 = 12345;

    for (metric, labels_column) in [("cpu", false), ("cpu", true), ("net", false), ("net", true)] {
        print!("Benchmarking {} (labels_column={})... ", metric, labels_column);
        std::io::Write::flush(&mut std::io::stdout())?;

        let mut batch_latencies = Vec::with_capacity(num_batches);
        let mut total_frames = 0u64;
        let start = Instant::now();

        for batch_num in 0..num_batches {
            let body = match metric {
                "cpu" => generate_cpu(lines_per_batch, batch_num, &mut seed),
                "net" => generate_net(lines_per_batch, batch_num, &mut seed),
                _ => unreachable!(),
            };

            let batch_start = Instant::now();
            let response = client
                .post(format!(
                    "{}/write?labels_column={}&float_numbers=true",
                    base_url, labels_column
                ))
                .body(body)
                .send()
                .await?;

            if !response.status().is_success() {
                eprintln!("Error: {}", response.text().await?);
                return Ok(());
            }
            let result: Value = response.json().await?;
            total_frames += result["frame_count"].as_u64().unwrap_or(0);
            batch_latencies.push(batch_start.elapsed());
        }

        let stats = BenchmarkStats {
            total_lines: lines_per_batch * num_batches,
            total_frames,
            total_duration: start.elapsed(),
            batch_latencies,
        };

        println!("done");
        println!("  Lines/sec:   {:.0}", stats.lines_per_sec());
        println!("  Frames:      {}", stats.total_frames);
        println!("  Total time:  {:?}", stats.total_duration);
        println!("  Latency:     avg={:?} p50={:?} p99={:?}",
            stats.avg_latency(), stats.percentile(50), stats.percentile(99));
        println!();
    }

    println!("Server Statistics:");
    let resp: Value = client
        .get(format!("{}/stats", base_url))
        .send()
        .await?
        .json()
        .await?;
    println!(
        "  accepted={} rejected={} frames={}",
        resp["batches_accepted"], resp["batches_rejected"], resp["frames_emitted"]
    );

    Ok(())
}
