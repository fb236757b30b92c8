//! AI Gateway CLI — 缓存键推导、缓存策略查询、响应恢复与配置检查的命令行工具
//!
//! Usage:
//!   ai-gateway-cli key <endpoint> <user> <payload-json>   Derive the cache key for a request
//!   ai-gateway-cli policy [endpoint]                      Show cacheability and TTLs
//!   ai-gateway-cli recover <file> [--shape lesson]        Recover structured JSON from a reply
//!   ai-gateway-cli config [--file <path>]                 Print the effective configuration

use ai_gateway::cache::KeyDeriver;
use ai_gateway::structured::{ExpectedShape, ResponseRecoverer};
use ai_gateway::{Endpoint, GatewayConfig};
use anyhow::{anyhow, bail, Context};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    match args[1].as_str() {
        "key" => cmd_key(&args[2..]),
        "policy" => cmd_policy(&args[2..]),
        "recover" => cmd_recover(&args[2..]),
        "config" => cmd_config(&args[2..]),
        "version" | "--version" | "-V" => {
            cmd_version();
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!(
        r#"ai-gateway-cli — AI 网关命令行工具

USAGE:
    ai-gateway-cli <COMMAND> [OPTIONS]

COMMANDS:
    key <endpoint> <user> <payload-json>   Derive the cache key for a request
    policy [endpoint]                      Show cacheability rules and TTLs
    recover <file> [--shape lesson]        Recover structured JSON from a raw reply ('-' for stdin)
    config [--file <path>]                 Print the effective configuration as YAML
    version                                Show version information
    help                                   Show this help message

ENDPOINTS:
    chat, image-analysis, voice-analysis, lesson-generation

ENVIRONMENT:
    AI_GATEWAY_CONFIG                      Default configuration file
    AI_GATEWAY_*                           Configuration overrides (see `config`)
    RUST_LOG                               Log filter (default: info)"#
    );
}

fn cmd_version() {
    println!("ai-gateway-cli {}", env!("CARGO_PKG_VERSION"));
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn load_config(args: &[String]) -> anyhow::Result<GatewayConfig> {
    let path = flag_value(args, "--file")
        .map(str::to_string)
        .or_else(|| std::env::var("AI_GATEWAY_CONFIG").ok());
    let config = match path {
        Some(p) => GatewayConfig::from_yaml_file(&p)
            .with_context(|| format!("failed to load config from {p}"))?,
        None => GatewayConfig::default(),
    };
    let config = config.with_env_overrides()?;
    config.validate()?;
    Ok(config)
}

fn parse_endpoint(raw: &str) -> anyhow::Result<Endpoint> {
    raw.parse::<Endpoint>().map_err(|e| anyhow!(e))
}

fn cmd_key(args: &[String]) -> anyhow::Result<()> {
    let [endpoint, user, payload, ..] = args else {
        bail!("usage: ai-gateway-cli key <endpoint> <user> <payload-json>");
    };
    let endpoint = parse_endpoint(endpoint)?;
    let payload: serde_json::Value =
        serde_json::from_str(payload).context("payload is not valid JSON")?;
    let config = load_config(&args[3..])?;

    let deriver = KeyDeriver::with_namespace(config.key_namespace);
    println!("{}", deriver.derive(endpoint, &payload, user));
    Ok(())
}

fn cmd_policy(args: &[String]) -> anyhow::Result<()> {
    let config = load_config(args)?;
    let policy = config.policy();
    let endpoints = match args.first().filter(|a| !a.starts_with("--")) {
        Some(name) => vec![parse_endpoint(name)?],
        None => Endpoint::ALL.to_vec(),
    };

    println!("{:<20} {:>10}  {:<10} CACHEABLE WHEN", "ENDPOINT", "TTL(s)", "RETRIED");
    for endpoint in endpoints {
        let rule = if endpoint.is_media_analysis() {
            "stable reference, not streaming, no inline binary"
        } else {
            "not streaming, no inline binary"
        };
        println!(
            "{:<20} {:>10}  {:<10} {}",
            endpoint.as_str(),
            policy.ttl_seconds(endpoint),
            if endpoint.is_generation() { "yes" } else { "no" },
            rule
        );
    }
    println!();
    println!(
        "retry deadlines: {:?} ms, pause {} ms, min viable length {}",
        config.retry.deadlines_ms, config.retry.pause_ms, config.retry.min_viable_len
    );
    println!("direct timeout: {} ms", config.direct_timeout_ms);
    Ok(())
}

fn cmd_recover(args: &[String]) -> anyhow::Result<()> {
    let Some(path) = args.first() else {
        bail!("usage: ai-gateway-cli recover <file> [--shape lesson]");
    };
    let shape_name = flag_value(args, "--shape").unwrap_or("lesson");
    let shape = ExpectedShape::builtin(shape_name)
        .ok_or_else(|| anyhow!("unknown shape: {shape_name}"))?;

    let raw = if path == "-" {
        std::io::read_to_string(std::io::stdin()).context("failed to read stdin")?
    } else {
        std::fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?
    };

    let recovered = ResponseRecoverer::new().recover(&raw, &shape);
    eprintln!("quality: {}", recovered.quality);
    if !recovered.filled_fields.is_empty() {
        eprintln!("filled: {}", recovered.filled_fields.join(", "));
    }
    println!("{}", serde_json::to_string_pretty(&recovered.value)?);
    Ok(())
}

fn cmd_config(args: &[String]) -> anyhow::Result<()> {
    let config = load_config(args)?;
    print!("{}", config.to_yaml_string()?);
    Ok(())
}
