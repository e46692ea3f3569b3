//! Load testing for the reverse proxy.

use std::time::{Duration, Instant};

mod common;

#[tokio::test]
async fn test_concurrent_counts_are_exact() {
    let backend = common::start_mock_backend(200, "Hello from backend").await;
    let proxy = common::start_proxy(common::localhost_config(&[(backend.port(), "api")])).await;

    let concurrency = 20;
    let requests_per_task = 25;
    let total_requests = concurrency * requests_per_task;

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let start = Instant::now();

    let mut tasks = Vec::new();
    for task in 0..concurrency {
        let client = client.clone();
        let url = proxy.url("/");
        tasks.push(tokio::spawn(async move {
            let mut latencies = Vec::new();
            // Every fifth task hits an unknown subdomain.
            let host = if task % 5 == 0 { "missing.localhost" } else { "api.localhost" };
            for _ in 0..requests_per_task {
                let req_start = Instant::now();
                if let Ok(res) = client.get(&url).header("Host", host).send().await {
                    let _ = res.bytes().await;
                    latencies.push(req_start.elapsed());
                }
            }
            latencies
        }));
    }

    let mut all_latencies: Vec<Duration> = Vec::new();
    for task in tasks {
        all_latencies.extend(task.await.unwrap());
    }
    let duration = start.elapsed();

    assert_eq!(all_latencies.len(), total_requests, "some requests failed outright");

    let stats = proxy.stats.snapshot();
    let not_found = (concurrency / 5) * requests_per_task;
    assert_eq!(stats.errored, not_found as u64);
    assert_eq!(stats.successful, (total_requests - not_found) as u64);
    assert_eq!(stats.total(), total_requests as u64);

    all_latencies.sort();
    let p50 = all_latencies[all_latencies.len() / 2];
    let p99 = all_latencies[(all_latencies.len() as f64 * 0.99) as usize];

    println!("\n--- Load Test Results ---");
    println!("Total Requests: {}", total_requests);
    println!("Concurrency:    {}", concurrency);
    println!("Total Duration: {:?}", duration);
    println!("Requests/sec:   {:.2}", total_requests as f64 / duration.as_secs_f64());
    println!("P50 Latency:    {:?}", p50);
    println!("P99 Latency:    {:?}", p99);
    println!("-------------------------\n");
}
