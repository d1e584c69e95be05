//! bluem-ctl: command-line interface for the Bluem daemon.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

const DEFAULT_PORT: u16 = 9101;

const BLOOD_GROUPS: [&str; 9] = ["A+", "A-", "B+", "B-", "AB+", "AB-", "O+", "O-", "Unknown"];

// ── Response types ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct StatusResponse {
    advertising:  bool,
    scanning:     bool,
    peers_known:  usize,
    peers_active: usize,
    custom_names: usize,
    uptime_secs:  u64,
}

#[derive(Deserialize)]
struct PeersResponse {
    peers: Vec<PeerInfo>,
}

#[derive(Deserialize)]
struct PeerInfo {
    address:        String,
    display_name:   String,
    active:         bool,
    rssi:           i16,
    distance_m:     Option<f64>,
    last_seen_secs: u64,
    blood_group:    Option<String>,
    location:       Option<(f64, f64)>,
    phone_hint:     Option<String>,
}

#[derive(Deserialize)]
struct NameResponse {
    address: String,
    name:    Option<String>,
    known:   bool,
}

#[derive(Deserialize)]
struct AdvertiseResponse {
    advertising: bool,
    changed:     bool,
}

#[derive(Serialize, Deserialize)]
struct Profile {
    phone_number: String,
    blood_group:  Option<u8>,
    latitude:     Option<f64>,
    longitude:    Option<f64>,
}

// ── HTTP helpers ──────────────────────────────────────────────────────────────

fn base_url(port: u16) -> String {
    format!("http://127.0.0.1:{}", port)
}

async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("daemon returned {}: {}", status, body);
    }
    resp.json::<T>().await.context("failed to parse response")
}

async fn get_json<T: DeserializeOwned>(url: &str) -> Result<T> {
    let resp = reqwest::get(url)
        .await
        .with_context(|| format!("failed to connect to bluemd at {}, is it running?", url))?;
    read_json(resp).await
}

async fn send_json<T: DeserializeOwned, B: Serialize>(
    method: reqwest::Method,
    url: &str,
    body: Option<&B>,
) -> Result<T> {
    let mut req = reqwest::Client::new().request(method, url);
    if let Some(body) = body {
        req = req.json(body);
    }
    let resp = req
        .send()
        .await
        .with_context(|| format!("failed to connect to bluemd at {}, is it running?", url))?;
    read_json(resp).await
}

// ── Subcommand handlers ───────────────────────────────────────────────────────

async fn cmd_status(port: u16) -> Result<()> {
    let resp: StatusResponse = get_json(&format!("{}/status", base_url(port))).await?;

    println!("═══════════════════════════════════════");
    println!("  Bluem Daemon Status");
    println!("═══════════════════════════════════════");
    println!("  Advertising  : {}", if resp.advertising { "on" } else { "off" });
    println!("  Scanning     : {}", if resp.scanning { "on" } else { "off" });
    println!("  Peers        : {} ({} active)", resp.peers_known, resp.peers_active);
    println!("  Custom names : {}", resp.custom_names);
    println!("  Uptime       : {}s", resp.uptime_secs);

    Ok(())
}

async fn cmd_peers(port: u16) -> Result<()> {
    let resp: PeersResponse = get_json(&format!("{}/peers", base_url(port))).await?;

    if resp.peers.is_empty() {
        println!("No pings received yet.");
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  Nearby Beacons ({})", resp.peers.len());
    println!("═══════════════════════════════════════");

    for p in &resp.peers {
        let state = if p.active { "active" } else { "inactive" };
        let distance = p
            .distance_m
            .map(|d| format!("~{:.1} m", d))
            .unwrap_or_else(|| "?".to_string());
        let location = p
            .location
            .map(|(lat, lon)| format!("{:.2}, {:.2}", lat, lon))
            .unwrap_or_else(|| "N/A".to_string());

        println!("  ┌─ {} [{}]", p.display_name, state);
        println!("  │  address     : {}", p.address);
        println!("  │  signal      : {} dBm ({})", p.rssi, distance);
        println!("  │  blood group : {}", p.blood_group.as_deref().unwrap_or("N/A"));
        println!("  │  location    : {}", location);
        if let Some(hint) = &p.phone_hint {
            println!("  │  phone       : ...{}", hint);
        }
        println!("  └─ last seen   : {}s ago", p.last_seen_secs);
    }

    Ok(())
}

async fn cmd_name(port: u16, address: &str, name: Option<&str>) -> Result<()> {
    let url = format!("{}/peers/{}/name", base_url(port), address);
    let body = serde_json::json!({ "name": name });
    let resp: NameResponse = send_json(reqwest::Method::POST, &url, Some(&body)).await?;

    match &resp.name {
        Some(name) => println!("{} is now \"{}\".", resp.address, name),
        None => println!("Custom name cleared for {}.", resp.address),
    }
    if !resp.known {
        println!("(Not seen yet. The name applies on first ping.)");
    }
    Ok(())
}

async fn cmd_advertise(port: u16, action: &str) -> Result<()> {
    let url = format!("{}/advertise/{}", base_url(port), action);
    let resp: AdvertiseResponse = send_json(reqwest::Method::POST, &url, None::<&()>).await?;

    let state = if resp.advertising { "on" } else { "off" };
    if resp.changed {
        println!("Advertising {}.", state);
    } else {
        println!("Advertising already {}.", state);
    }
    Ok(())
}

async fn cmd_profile(port: u16) -> Result<()> {
    let profile: Profile = get_json(&format!("{}/profile", base_url(port))).await?;
    print_profile(&profile);
    Ok(())
}

/// Apply `key=value` edits on top of the current profile and upload it.
async fn cmd_profile_set(port: u16, edits: &[&str]) -> Result<()> {
    let url = format!("{}/profile", base_url(port));
    let mut profile: Profile = get_json(&url).await?;

    for edit in edits {
        let (key, value) = edit
            .split_once('=')
            .with_context(|| format!("expected key=value, got '{}'", edit))?;
        let clear = value.is_empty();
        match key {
            "phone" => profile.phone_number = value.to_string(),
            "blood" => {
                profile.blood_group = if clear {
                    None
                } else {
                    Some(parse_blood_group(value)?)
                }
            }
            "lat" => profile.latitude = if clear { None } else { Some(value.parse().context("lat must be a number")?) },
            "lon" => profile.longitude = if clear { None } else { Some(value.parse().context("lon must be a number")?) },
            other => anyhow::bail!("unknown profile field '{}'", other),
        }
    }

    let stored: Profile = send_json(reqwest::Method::PUT, &url, Some(&profile)).await?;
    println!("Profile updated.");
    print_profile(&stored);
    Ok(())
}

/// Accepts a label ("O-") or an index ("7").
fn parse_blood_group(value: &str) -> Result<u8> {
    if let Some(index) = BLOOD_GROUPS.iter().position(|g| g.eq_ignore_ascii_case(value)) {
        return Ok(index as u8);
    }
    value
        .parse()
        .with_context(|| format!("unknown blood group '{}'", value))
}

fn print_profile(profile: &Profile) {
    let blood = profile
        .blood_group
        .and_then(|i| BLOOD_GROUPS.get(i as usize).copied())
        .unwrap_or("Unknown");
    let location = match (profile.latitude, profile.longitude) {
        (Some(lat), Some(lon)) => format!("{:.2}, {:.2}", lat, lon),
        _ => "N/A".to_string(),
    };

    println!("═══════════════════════════════════════");
    println!("  Local Profile");
    println!("═══════════════════════════════════════");
    println!("  Phone       : {}", if profile.phone_number.is_empty() { "-" } else { profile.phone_number.as_str() });
    println!("  Blood group : {}", blood);
    println!("  Location    : {}", location);
}

fn print_usage() {
    println!("Usage: bluem-ctl [--port <port>] <command>");
    println!();
    println!("Commands:");
    println!("  status                   Show daemon status");
    println!("  peers                    List received pings, most recent first");
    println!("  name <address> [name]    Set a custom name (omit name to clear)");
    println!("  start                    Start advertising the local profile");
    println!("  stop                     Stop advertising");
    println!("  profile                  Show the local profile");
    println!("  profile set <k=v>...     Edit the profile (phone, blood, lat, lon)");
    println!();
    println!("Options:");
    println!("  --port <port>   API port (default: {})", DEFAULT_PORT);
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    // Parse --port option
    let mut port = DEFAULT_PORT;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--port" {
            i += 1;
            port = args
                .get(i)
                .context("--port requires a value")?
                .parse()
                .context("--port must be a number")?;
        } else {
            remaining.push(&args[i]);
        }
        i += 1;
    }

    match remaining.as_slice() {
        ["status"] | []                  => cmd_status(port).await,
        ["peers"]                        => cmd_peers(port).await,
        ["name", address]                => cmd_name(port, address, None).await,
        ["name", address, name @ ..]     => cmd_name(port, address, Some(&name.join(" "))).await,
        ["start"]                        => cmd_advertise(port, "start").await,
        ["stop"]                         => cmd_advertise(port, "stop").await,
        ["profile"]                      => cmd_profile(port).await,
        ["profile", "set", edits @ ..]   => cmd_profile_set(port, edits).await,
        ["help"] | ["--help"] | ["-h"]   => { print_usage(); Ok(()) }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
