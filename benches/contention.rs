//! Payment-confirmation contention against a running server.
//!
//! Many guests book the same nights; every payment callback then races to
//! confirm. Exactly one confirmation per round may win.

use std::time::{Duration, Instant};

use tokio_postgres::{Client, Config, NoTls};
use ulid::Ulid;

async fn connect(host: &str, port: u16, dbname: &str, password: &str) -> Client {
    let mut config = Config::new();
    config
        .host(host)
        .port(port)
        .dbname(dbname)
        .user("bench")
        .password(password);

    let (client, conn) = config.connect(NoTls).await.expect("connect failed");
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            eprintln!("connection error: {e}");
        }
    });
    client
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        println!("  {label}: no samples");
        return;
    }
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    let ms = |d: Duration| d.as_secs_f64() * 1000.0;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        ms(avg),
        ms(percentile(latencies, 50.0)),
        ms(percentile(latencies, 95.0)),
        ms(percentile(latencies, 99.0)),
        ms(latencies[latencies.len() - 1]),
    );
}

/// Nights `[day, day + 2)` of round `round`, far enough apart to never overlap.
fn stay_for_round(round: usize) -> (String, String) {
    let start = chrono::NaiveDate::from_ymd_opt(2030, 1, 1).expect("valid date")
        + chrono::Days::new(round as u64 * 3);
    let end = start + chrono::Days::new(2);
    (start.format("%Y-%m-%d").to_string(), end.format("%Y-%m-%d").to_string())
}

#[tokio::main]
async fn main() {
    let host = std::env::var("INNKEEP_HOST").unwrap_or_else(|_| "127.0.0.1".into());
    let port: u16 = std::env::var("INNKEEP_PORT")
        .unwrap_or_else(|_| "5433".into())
        .parse()
        .expect("invalid INNKEEP_PORT");
    let password = std::env::var("INNKEEP_PASSWORD").unwrap_or_else(|_| "innkeep".into());
    let racers: usize = std::env::var("INNKEEP_BENCH_RACERS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(32);
    let rounds: usize = std::env::var("INNKEEP_BENCH_ROUNDS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(20);

    // Fresh property per run
    let dbname = format!("bench_{}", Ulid::new());
    println!("=== innkeep confirmation contention ===");
    println!("target: {host}:{port}/{dbname}, {racers} racers x {rounds} rounds\n");

    let setup = connect(&host, port, &dbname, &password).await;
    let room = Ulid::new();
    setup
        .batch_execute(&format!(
            "INSERT INTO rooms (id, name, base_price, service_fee_percent) VALUES ('{room}', 'Bench Suite', 120, NULL)"
        ))
        .await
        .expect("create room");

    let mut clients = Vec::with_capacity(racers);
    for _ in 0..racers {
        clients.push(connect(&host, port, &dbname, &password).await);
    }

    let mut create_latencies = Vec::new();
    let mut winner_latencies = Vec::new();
    let mut loser_latencies = Vec::new();
    let mut bad_rounds = 0;
    let started = Instant::now();

    for round in 0..rounds {
        let (check_in, check_out) = stay_for_round(round);

        let mut bookings = Vec::with_capacity(racers);
        for _ in 0..racers {
            let id = Ulid::new();
            let t = Instant::now();
            setup
                .batch_execute(&format!(
                    "INSERT INTO bookings (id, room_id, guest_name, guest_email, guest_phone, check_in, check_out) \
                     VALUES ('{id}', '{room}', 'Racer', NULL, NULL, '{check_in}', '{check_out}')"
                ))
                .await
                .expect("create booking");
            create_latencies.push(t.elapsed());
            bookings.push(id);
        }

        let mut handles = Vec::with_capacity(racers);
        for (client, id) in clients.iter().zip(bookings) {
            let sql = format!("INSERT INTO payments (booking_id, outcome, detail) VALUES ('{id}', 'succeeded', 'pay_{id}')");
            handles.push(async move {
                let t = Instant::now();
                let ok = client.batch_execute(&sql).await.is_ok();
                (ok, t.elapsed())
            });
        }

        let mut winners = 0;
        for (ok, elapsed) in futures::future::join_all(handles).await {
            if ok {
                winners += 1;
                winner_latencies.push(elapsed);
            } else {
                loser_latencies.push(elapsed);
            }
        }
        if winners != 1 {
            bad_rounds += 1;
            eprintln!("round {round}: {winners} confirmations won");
        }
    }

    println!("[results] {rounds} rounds in {:.2}s", started.elapsed().as_secs_f64());
    print_latency("create booking", &mut create_latencies);
    print_latency("winning confirmation", &mut winner_latencies);
    print_latency("stale confirmation", &mut loser_latencies);

    if bad_rounds > 0 {
        println!("\n!! {bad_rounds} rounds did not have exactly one winner");
        std::process::exit(1);
    }
    println!("\n=== benchmark complete ===");
}
