#![cfg(target_os = "linux")]
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use clap::{
    arg,
    builder::{PossibleValuesParser, TypedValueParser},
    command, value_parser,
};
use log::{LevelFilter, debug, info, warn};
use swaymux_ipc::client::{Client, SOCKET_ENV};
use swaymux_ipc::codec::ByteOrder;
use swaymux_ipc::message::EventType;
use swaymux_ipc::node;
use swaymux_ipc::subscription::Subscription;

mod config;
mod logger;

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args();

    logger::init(args.log_level)?;

    debug!("Loading config...");
    let cfg = config::load(&args.config_file).await?;

    let socket: PathBuf = match args.socket.or(cfg.socket.clone()) {
        Some(path) => path,
        None => std::env::var_os(SOCKET_ENV)
            .map(PathBuf::from)
            .with_context(|| {
                format!("No socket path: set {} or pass --socket", SOCKET_ENV)
            })?,
    };

    let mut events = Vec::new();
    for name in args.events.unwrap_or_else(|| cfg.watch_events()) {
        match EventType::from_name(&name) {
            Some(event) => events.push(event),
            None => bail!("Unknown event type `{}`", name),
        }
    }

    snapshot(&socket).await?;
    watch(&socket, &events).await
}

/// Point-in-time queries over a request/reply connection.
async fn snapshot(socket: &Path) -> Result<()> {
    let client = Client::connect_to(socket, ByteOrder::Little).await?;

    let version = client.version().await?;
    info!("sway {}", version.human_readable);

    for workspace in client.workspaces().await? {
        info!(
            "workspace {} on {}{}",
            workspace.name,
            workspace.output,
            if workspace.focused { " (focused)" } else { "" }
        );
    }

    let tree = client.tree().await?;
    info!(
        "tree: {} nodes, {} leaves",
        tree.count(&|_: &node::Node| true),
        tree.count(&node::is_leaf)
    );

    if let Some(focused) = tree.first(&node::is_focused) {
        info!(
            "focused: {} (id {})",
            focused.name.as_deref().unwrap_or("-"),
            focused.id
        );
    }

    Ok(())
}

/// Streams events over a dedicated connection until interrupted.
async fn watch(socket: &Path, events: &[EventType]) -> Result<()> {
    let sub = Subscription::connect_to(socket, ByteOrder::Little).await?;

    let mut errors = sub.errors();
    tokio::spawn(async move {
        while let Some(err) = errors.recv().await {
            warn!("monitor: {}", err);
        }
    });

    for event in events {
        register_printer(&sub, *event).await?;
    }

    let mut runner = tokio::spawn({
        let sub = sub.clone();
        async move { sub.run().await }
    });

    info!("Watching events, ^C to quit.");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            debug!("SIGINT/CTRL-C detected!");
            sub.close();
            (&mut runner).await??;
        }
        result = &mut runner => {
            result??;
        }
    }

    info!("Closing swaymux...");
    Ok(())
}

async fn register_printer(
    sub: &Subscription<tokio::net::UnixStream>,
    event: EventType,
) -> Result<()> {
    match event {
        EventType::Workspace => {
            sub.workspace_changes(|change| {
                info!(
                    "workspace {:?}: {}",
                    change.change,
                    change
                        .current
                        .as_ref()
                        .and_then(|n| n.name.as_deref())
                        .unwrap_or("-")
                );
            })
            .await?;
        }
        EventType::Mode => {
            sub.mode_changes(|change| {
                info!("binding mode: {}", change.change);
            })
            .await?;
        }
        EventType::Window => {
            sub.window_changes(|change| {
                info!(
                    "window {:?}: {} (id {})",
                    change.change,
                    change.container.name.as_deref().unwrap_or("-"),
                    change.container.id
                );
            })
            .await?;
        }
        EventType::Binding => {
            sub.binding_changes(|change| {
                info!("binding {:?}: {}", change.change, change.command);
            })
            .await?;
        }
        EventType::Shutdown => {
            sub.shutdown_changes(|change| {
                info!("shutdown: {:?}", change.change);
            })
            .await?;
        }
        EventType::Tick => {
            sub.ticks(|tick| {
                info!("tick: {}", tick.payload);
            })
            .await?;
        }
        other => {
            warn!("No dispatcher for `{}` events.", other.name());
        }
    }

    Ok(())
}

struct ParsedArgs {
    config_file: PathBuf,
    log_level: LevelFilter,
    socket: Option<PathBuf>,
    events: Option<Vec<String>>,
}

fn parse_args() -> ParsedArgs {
    let possible_levels: Vec<_> =
        LevelFilter::iter().map(|v| v.as_str()).collect();

    let matches = command!("swaymux inspector")
        .arg(
            arg!(-c --config <FILE> "Sets a custom config file")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            arg!(-s --socket <PATH> "Overrides the sway IPC socket path")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            arg!(-l --level <LEVEL> "Sets a log level")
                .value_parser(
                    PossibleValuesParser::new(possible_levels)
                        .map(|s| LevelFilter::from_str(&s).unwrap()),
                )
                .ignore_case(true)
                .default_value("INFO"),
        )
        .arg(
            arg!(-e --events <EVENTS> "Event types to watch")
                .value_delimiter(','),
        )
        .get_matches();

    let log_level = *matches.get_one::<LevelFilter>("level").unwrap();
    let config_file = matches
        .get_one::<PathBuf>("config")
        .cloned()
        .unwrap_or_else(config::default_path);
    let socket = matches.get_one::<PathBuf>("socket").cloned();
    let events = matches
        .get_many::<String>("events")
        .map(|vals| vals.cloned().collect());

    ParsedArgs {
        config_file,
        log_level,
        socket,
        events,
    }
}
