//! FEC option diagnostic tool
//!
//! Usage: fec-probe <COMMAND> [OPTIONS]
//!
//! Built with `--features cli`.
//!
//! Commands:
//!   decode     Decode a raw FEC payload
//!   scan       Find and decode the FEC option in a TCP options block
//!   handshake  Run an in-memory handshake and print the outcome

use std::env;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use bytes::BytesMut;

use tcp_fec::option::{find_fec_payload, DecodeContext};
use tcp_fec::{
    FecConfig, FecConnection, FecMetrics, FecOption, FecSysctl, InboundSegment, OutboundSegment,
};

fn main() -> anyhow::Result<()> {
    // Respects RUST_LOG (e.g. RUST_LOG=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();

    let Some(command) = args.first() else {
        print_usage();
        return Ok(());
    };

    match command.as_str() {
        "-h" | "--help" => print_usage(),
        "decode" => decode(&args[1..])?,
        "scan" => scan(&args[1..])?,
        "handshake" => handshake(&args[1..])?,
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage();
        }
    }

    Ok(())
}

fn print_usage() {
    println!(
        r#"fec-probe - TCP FEC option diagnostics

USAGE:
    fec-probe <COMMAND> [OPTIONS]

COMMANDS:
    decode [--syn] [--seq N] [--ack N] <HEX>   Decode a raw FEC payload
    scan [--syn] [--seq N] [--ack N] <HEX>     Decode the FEC option in a TCP options block
    handshake [--type T] [--config FILE]       Negotiate between two in-memory endpoints
    -h, --help                                 Print help information

EXAMPLES:
    Decode an encoded-segment payload at sequence 1000:
        fec-probe decode --seq 1000 10000014

    Decode the option from a captured options block:
        fec-probe scan 020405b4fe08dc6020000008 --ack 2000

    Negotiate XOR-every-other-chunk:
        fec-probe handshake --type 2
"#
    );
}

/// Segment context and the positional hex argument.
struct SegmentArgs {
    ctx: DecodeContext,
    hex: Vec<u8>,
}

fn parse_segment_args(args: &[String]) -> anyhow::Result<SegmentArgs> {
    let mut ctx = DecodeContext::default();
    let mut hex_arg = None;
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--syn" => ctx.is_syn = true,
            "--seq" => ctx.seq = next_number(&mut iter, "--seq")?,
            "--ack" => ctx.ack_seq = next_number(&mut iter, "--ack")?,
            other => hex_arg = Some(other.to_string()),
        }
    }

    let hex_arg = hex_arg.ok_or_else(|| anyhow!("missing hex argument"))?;
    let hex = hex::decode(hex_arg.trim()).context("argument is not valid hex")?;
    Ok(SegmentArgs { ctx, hex })
}

fn next_number<'a>(
    iter: &mut impl Iterator<Item = &'a String>,
    flag: &str,
) -> anyhow::Result<u32> {
    let value = iter.next().ok_or_else(|| anyhow!("{} requires a value", flag))?;
    value
        .parse()
        .with_context(|| format!("{} expects a number, got {:?}", flag, value))
}

fn print_option(option: &FecOption) {
    println!("option:   {:?}", option);
    println!("flags:    {:?}", option.flags());
    if let Some(ty) = option.encoding_type() {
        println!("type:     {:?} ({})", ty, ty as u8);
    }
    if let Some(range) = option.encoded_range() {
        println!("encoded:  seq={} len={}", range.seq, range.len);
    }
    if let Some(range) = option.lost_range() {
        println!("lost:     seq={} len={}", range.seq, range.len);
    }
}

fn decode(args: &[String]) -> anyhow::Result<()> {
    let SegmentArgs { ctx, hex } = parse_segment_args(args)?;
    let option = FecOption::decode(&hex, ctx)?;
    print_option(&option);
    Ok(())
}

fn scan(args: &[String]) -> anyhow::Result<()> {
    let SegmentArgs { ctx, hex } = parse_segment_args(args)?;
    let payload = find_fec_payload(&hex).ok_or_else(|| anyhow!("no FEC option in block"))?;
    println!("payload:  {}", hex::encode(payload));
    let option = FecOption::decode(payload, ctx)?;
    print_option(&option);
    Ok(())
}

fn handshake(args: &[String]) -> anyhow::Result<()> {
    let mut requested: Option<i32> = None;
    let mut config = FecConfig::default();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--type" => requested = Some(next_number(&mut iter, "--type")? as i32),
            "--config" => {
                let path = iter.next().ok_or_else(|| anyhow!("--config requires a file path"))?;
                config = FecConfig::load(path)
                    .with_context(|| format!("loading {}", path))?;
            }
            other => bail!("unknown handshake option: {}", other),
        }
    }

    let sysctl = Arc::new(FecSysctl::from_config(&config));
    let metrics = Arc::new(FecMetrics::new());
    let mut active = FecConnection::active(&config, sysctl.clone(), metrics.clone());
    let mut passive = FecConnection::passive(&config, sysctl, metrics.clone());

    if let Some(ty) = requested {
        active.set_fec_type(ty)?;
    }

    tracing::info!("Starting handshake requesting type {}", active.fec_type());

    let steps = [
        ("SYN", true, true),
        ("SYN-ACK", true, false),
        ("ACK", false, true),
    ];
    for (name, syn, from_active) in steps {
        let (from, to) = if from_active {
            (&mut active, &mut passive)
        } else {
            (&mut passive, &mut active)
        };

        let out = OutboundSegment {
            syn,
            option_space: 40,
            ..OutboundSegment::default()
        };
        let mut options = BytesMut::new();
        let written = from.write_option(&out, &mut options);
        println!("{:<8} option bytes: {}", name, hex::encode(&options[..written]));

        let inbound = InboundSegment {
            syn,
            fec_payload: find_fec_payload(&options),
            ..InboundSegment::default()
        };
        to.process_inbound(&inbound, &mut ());
    }

    println!();
    println!("active:   {:?}, type {}", active.phase(), active.fec_type());
    println!("passive:  {:?}, type {}", passive.phase(), passive.fec_type());
    println!("metrics:  {:?}", metrics.snapshot());

    Ok(())
}
