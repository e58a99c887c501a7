#![warn(missing_docs)]

//! Entry point for the `textwire-tester` binary.

mod cli;
mod error;

use std::{process, thread, time::Duration};

use clap::Parser;
use textwire_protocol::frame::strip_ansi;
use textwire_server::Client;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, registry};

use crate::{
    cli::{Cli, Commands, FrameArgs, SendArgs, TypeArgs, WatchArgs},
    error::{Error, Result},
};

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        process::exit(1);
    }
}

/// Parse CLI arguments, install logging, and dispatch to the chosen
/// subcommand.
fn run() -> Result<()> {
    let cli = Cli::parse();
    let env_filter = logging::env_filter_from_spec(&cli.log.spec());
    registry()
        .with(env_filter)
        .with(fmt::layer().without_time().with_writer(std::io::stderr))
        .try_init()
        .ok();

    let timeout = Duration::from_millis(cli.timeout_ms);
    let mut client = Client::connect(&cli.host, cli.port, timeout)?;
    debug!(host = %cli.host, port = cli.port, "connected");

    if let Some(token) = &cli.auth {
        client.auth(token, timeout)?;
    }

    match &cli.command {
        Commands::Frame(args) => frame(&mut client, args, timeout),
        Commands::Type(args) => type_line(&mut client, args, timeout),
        Commands::Stats => request_line(&mut client, "STATS", timeout),
        Commands::Send(args) => send(&mut client, args, timeout),
        Commands::Watch(args) => watch(&mut client, args, timeout),
    }
}

fn frame(client: &mut Client, args: &FrameArgs, timeout: Duration) -> Result<()> {
    let parsed = client.request_frame(timeout)?;
    if args.meta {
        for (key, value) in &parsed.metadata {
            println!("{key}={value}");
        }
    }
    if args.plain {
        print!("{}", strip_ansi(&parsed.payload));
        println!();
    } else {
        println!("{}", parsed.payload);
    }
    Ok(())
}

fn type_line(client: &mut Client, args: &TypeArgs, timeout: Duration) -> Result<()> {
    let line = format!("TYPE {}", args.tokens.join(" "));
    request_line(client, &line, timeout)
}

fn send(client: &mut Client, args: &SendArgs, timeout: Duration) -> Result<()> {
    let reply = client.request(&args.line, timeout)?;
    print!("{reply}");
    Ok(())
}

fn request_line(client: &mut Client, line: &str, timeout: Duration) -> Result<()> {
    let reply = client.request(line, timeout)?;
    if let Some(reason) = reply.strip_prefix("ERR ") {
        return Err(Error::Service(reason.trim_end().to_string()));
    }
    print!("{reply}");
    Ok(())
}

fn watch(client: &mut Client, args: &WatchArgs, timeout: Duration) -> Result<()> {
    let mut last = String::new();
    let mut seen = 0u32;
    loop {
        let parsed = client.request_frame(timeout)?;
        let plain = strip_ansi(&parsed.payload);
        if plain != last {
            println!("{plain}");
            println!("---");
            last = plain;
        }
        seen += 1;
        if args.count > 0 && seen >= args.count {
            return Ok(());
        }
        thread::sleep(Duration::from_millis(args.interval_ms));
    }
}
