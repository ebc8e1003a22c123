use std::time::Duration;

use stout::{
    inc, measure, set, set_delta, setup_client, ConsoleBackend, ErrorReaction,
    HarnessConfig, MetricResult, MonitoringBackend, ProcessSpec, Server, ServerConfig,
};

const SERVER_PORT: u16 = 9999;

fn main() -> MetricResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // a front end would load this from a profile file
    let cfg = HarnessConfig {
        server_port: SERVER_PORT,
        initial_delay_s: 1,
        sampling_time_s: 1,
        error_reaction: ErrorReaction::Log,
        processes: vec![ProcessSpec {
            id: "demo".to_owned(),
            instance_count: 1,
            watches: vec!["lat avg < 50%".parse()?],
        }],
    };

    let (stop_tx, stop_rx) = crossbeam::channel::unbounded();
    let server_cfg = ServerConfig::new(cfg.server_port)
        .flush_every(cfg.sampling_time_s)?
        .pre_flush(|| tracing::debug!("flushing"))
        .add_backend(ConsoleBackend)
        .add_backend(MonitoringBackend::new(&cfg, stop_tx));
    let server = Server::run(server_cfg)?;

    setup_client("127.0.0.1", cfg.server_port)
        .namespace("stout")
        .install()?;

    // synthetic workload: steady counters and a latency distribution
    // under the watched prefix
    for round in 0_i64..8 {
        for i in 0_i64..20 {
            inc("demo.hits");
            measure("demo.lat.0", 10 + (i * 3) % 25);
        }
        set("demo.queue.size", 40);
        set_delta("demo.queue.size", round - 4);

        if stop_rx.try_recv().is_ok() {
            println!("stop requested by monitoring, shutting down");
            break;
        }
        std::thread::sleep(Duration::from_millis(500));
    }

    server.stop();
    server.join();
    Ok(())
}
