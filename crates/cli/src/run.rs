//! Subcommands that talk to the target: `sync` and `run`.

use std::io::{self, BufRead};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use cellcast_core::TargetSink;
use cellcast_config::SettingsFile;
use cellcast_engine::{
    CycleMode, CycleReport, MappingState, Poller, PollerConfig, Registry, Session, SharedSession,
};
use cellcast_io::SnapshotProvider;
use cellcast_obs_client::TargetAdapter;
use log::{info, warn};

use crate::app::{group_at, mapping_at, Context};
use crate::edit::{cmd_import, describe};
use crate::exit_codes::EXIT_ERROR;
use crate::preview::display_state;
use crate::CliError;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Connect, send every mapping once, disconnect.
pub fn cmd_sync(ctx: &Context) -> Result<(), CliError> {
    let adapter = TargetAdapter::obs();
    adapter.connect(&ctx.endpoint()).map_err(|e| CliError::connect(&e))?;

    let mut session = ctx.session();
    let report = session.run_cycle(CycleMode::Manual, &adapter);
    adapter.disconnect();

    println!("Manual update: {}", report.summary());
    print_failures(session.bridge().registry(), &report);

    if let Some(e) = &report.read_error {
        return Err(CliError::read(e));
    }
    match report.failed() {
        0 => Ok(()),
        n => Err(CliError::new(EXIT_ERROR, format!("{} update(s) failed", n))),
    }
}

/// Poll until `quit` or end of input.
pub fn cmd_run(ctx: &mut Context, interval_ms: Option<u64>) -> Result<(), CliError> {
    let mut poll = ctx.settings.poll_settings.clone();
    if let Some(ms) = interval_ms {
        poll.interval_ms = ms;
    }

    let adapter = Arc::new(TargetAdapter::obs());
    if let Err(e) = adapter.connect(&ctx.endpoint()) {
        warn!("Not connected ({}); type `reconnect` to retry", e);
    }

    let session = ctx.session().into_shared();
    let sink: Arc<dyn TargetSink> = adapter.clone();
    let config = PollerConfig {
        interval: poll.interval(),
        ..PollerConfig::default()
    };
    let handle = Poller::new(Arc::clone(&session), sink, config)
        .spawn()
        .map_err(|e| CliError::io(format!("cannot start update thread: {}", e)))?;
    info!("Polling every {:?}; type `help` for commands", config.interval);

    for line in io::stdin().lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Cannot read input: {}", e);
                break;
            }
        };
        match run_command(ctx, &session, &adapter, &line) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => break,
            Err(CliError { message, hint, .. }) => {
                eprintln!("error: {}", message);
                if let Some(hint) = hint {
                    eprintln!("hint:  {}", hint);
                }
            }
        }
    }

    info!("Stopping...");
    handle.shutdown(SHUTDOWN_TIMEOUT);
    adapter.disconnect();
    Ok(())
}

enum Flow {
    Continue,
    Quit,
}

const COMMANDS: &str = "\
Commands:
  sync, u                 send every mapping now
  status                  show connection and mapping states
  reconnect               reconnect to the target
  reload                  re-read the settings file
  import <FILE>           replace all settings with FILE
  remove <GROUP> <INDEX>  remove a mapping
  collapse <GROUP>        collapse a group
  expand <GROUP>          expand a group
  quit, q                 stop";

fn run_command(
    ctx: &mut Context,
    session: &SharedSession<SnapshotProvider>,
    adapter: &Arc<TargetAdapter>,
    line: &str,
) -> Result<Flow, CliError> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(Flow::Continue);
    };
    let args: Vec<&str> = words.collect();
    match (command, args.as_slice()) {
        ("sync" | "u", []) => manual_update(session, adapter.as_ref()),
        ("status", []) => print_status(session, adapter.as_ref()),
        ("reconnect", []) => {
            if let Err(e) = adapter.connect_in_background(ctx.endpoint()) {
                warn!("Could not start connect thread: {}", e);
            }
        }
        ("reload", []) => {
            *ctx = Context::load(Some(ctx.path.clone()))?;
            apply_settings(&mut session.lock(), &ctx.settings);
            println!("Reloaded {}", ctx.path.display());
        }
        ("import", [file]) => {
            cmd_import(ctx, Path::new(file))?;
            apply_settings(&mut session.lock(), &ctx.settings);
        }
        ("remove", [group, index]) => {
            let (group, index) = (parse_index(group)?, parse_index(index)?);
            let mut session = session.lock();
            let id = mapping_at(session.bridge().registry(), group, index)?;
            let removed = session
                .bridge()
                .registry()
                .mapping(id)
                .map(|m| describe(&m.fields))
                .unwrap_or_default();
            session
                .bridge_mut()
                .delete_mapping(id)
                .map_err(|e| CliError::args(e.to_string()))?;
            store(ctx, session.bridge().registry())?;
            println!("Removed mapping {}.{}: {}", group, index, removed);
        }
        (verb @ ("collapse" | "expand"), [group]) => {
            let group = parse_index(group)?;
            let collapsed = verb == "collapse";
            let mut session = session.lock();
            let id = group_at(session.bridge().registry(), group)?;
            session
                .bridge_mut()
                .set_group_collapsed(id, collapsed)
                .map_err(|e| CliError::args(e.to_string()))?;
            store(ctx, session.bridge().registry())?;
            println!("Group {} {}", group, if collapsed { "collapsed" } else { "expanded" });
        }
        ("quit" | "q", []) => return Ok(Flow::Quit),
        ("help" | "?", _) => println!("{}", COMMANDS),
        _ => println!("Unknown command '{}'; type `help` for commands", line.trim()),
    }
    Ok(Flow::Continue)
}

/// Point a live session at new settings. Value memory and the cached sheet
/// are dropped; the poll interval and connection are left as they are.
fn apply_settings(session: &mut Session<SnapshotProvider>, settings: &SettingsFile) {
    session
        .source_mut()
        .set_source(settings.source_path(), settings.sheet_name());
    session.bridge_mut().set_policy(settings.collapse_policy());
    session.replace_registry(settings.to_registry());
}

fn store(ctx: &mut Context, registry: &Registry) -> Result<(), CliError> {
    ctx.settings.store_registry(registry);
    ctx.save()
}

fn parse_index(text: &str) -> Result<usize, CliError> {
    text.parse()
        .map_err(|_| CliError::args(format!("'{}' is not a number", text)))
}

fn manual_update(session: &SharedSession<SnapshotProvider>, sink: &dyn TargetSink) {
    if !sink.is_connected() {
        println!("Not connected; type `reconnect` first");
        return;
    }
    let mut session = session.lock();
    let report = session.run_cycle(CycleMode::Manual, sink);
    println!("Manual update: {}", report.summary());
    print_failures(session.bridge().registry(), &report);
}

fn print_status(session: &SharedSession<SnapshotProvider>, sink: &dyn TargetSink) {
    let session = session.lock();
    let bridge = session.bridge();
    println!("Connection: {}", sink.state());
    for (g, group) in bridge.registry().groups().iter().enumerate() {
        let suffix = if group.collapsed { " (collapsed)" } else { "" };
        println!("{}. {}{}", g + 1, group.name, suffix);
        for (m, mapping) in group.mappings.iter().enumerate() {
            let state = bridge.state(mapping.id);
            println!(
                "   {}.{} {} = {}",
                g + 1,
                m + 1,
                describe(&mapping.fields),
                display_state(state)
            );
        }
    }
}

fn print_failures(registry: &Registry, report: &CycleReport) {
    for outcome in &report.outcomes {
        if let MappingState::SendFailed { error, .. } = &outcome.state {
            let target = registry
                .mapping(outcome.id)
                .map(|m| m.fields.target_name().to_string())
                .unwrap_or_default();
            println!("  {}: {}", target, error);
        }
    }
}
