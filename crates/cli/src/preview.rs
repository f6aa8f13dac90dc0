//! Read-only subcommands: `show` and `preview`.

use cellcast_core::value::PREVIEW_CHARS;
use cellcast_core::{ReadError, Snapshot};
use cellcast_engine::{observe, ActiveMapping, MappingState, Registry};
use serde_json::{json, Value};

use crate::app::Context;
use crate::edit::describe;
use crate::CliError;

const MASK: &str = "********";

pub fn cmd_show(ctx: &Context, json: bool) -> Result<(), CliError> {
    let mut settings = ctx.settings.clone();
    if !settings.obs_settings.password.is_empty() {
        settings.obs_settings.password = MASK.to_string();
    }
    let registry = settings.to_registry();

    if json {
        settings.store_registry(&registry);
        print!("{}", settings.to_json().map_err(CliError::settings)?);
        return Ok(());
    }

    let poll = &settings.poll_settings;
    println!("Settings: {}", ctx.path.display());
    println!(
        "Target:   {} ({})",
        ctx.endpoint(),
        if settings.password().is_some() { "password set" } else { "no password" }
    );
    match (settings.source_path(), settings.sheet_name()) {
        (Some(path), Some(sheet)) => println!("Source:   {} [{}]", path.display(), sheet),
        (Some(path), None) => println!("Source:   {}", path.display()),
        (None, _) => println!("Source:   (not set)"),
    }
    println!(
        "Polling:  every {} ms, collapsed groups {}",
        poll.interval().as_millis(),
        if poll.skip_collapsed_groups { "skipped" } else { "polled" }
    );
    for (g, group) in registry.groups().iter().enumerate() {
        let suffix = if group.collapsed { " (collapsed)" } else { "" };
        println!("{}. {}{}", g + 1, group.name, suffix);
        if group.mappings.is_empty() {
            println!("   (no mappings)");
        }
        for (m, mapping) in group.mappings.iter().enumerate() {
            println!("   {}.{} {}", g + 1, m + 1, describe(&mapping.fields));
        }
    }
    Ok(())
}

/// Read the sheet once and print what each mapping currently resolves to.
pub fn cmd_preview(ctx: &Context, json: bool) -> Result<(), CliError> {
    let mut source = ctx.source();
    let snapshot = source.ensure_fresh(true);
    let snapshot = snapshot.as_deref();
    let registry = ctx.registry();

    if json {
        let mappings: Vec<Value> = registry
            .iter_active()
            .map(|active| preview_json(&registry, active, snapshot))
            .collect();
        let doc = json!({
            "source": ctx.settings.excel_settings.file_path,
            "sheet": ctx.settings.excel_settings.sheet_name,
            "shape": snapshot.ok().map(|s| {
                let (rows, cols) = s.shape();
                json!({"rows": rows, "cols": cols})
            }),
            "read_error": snapshot.err().map(|e| e.to_string()),
            "mappings": mappings,
        });
        let text = serde_json::to_string_pretty(&doc).map_err(|e| CliError::io(e.to_string()))?;
        println!("{}", text);
    } else {
        if let Ok(snapshot) = snapshot {
            let (rows, cols) = snapshot.shape();
            println!("Sheet: {} rows x {} cols", rows, cols);
        }
        for (g, group) in registry.groups().iter().enumerate() {
            println!("{}. {}", g + 1, group.name);
            for (m, mapping) in group.mappings.iter().enumerate() {
                let state = observe(&mapping.fields, snapshot);
                println!(
                    "   {}.{} {} = {}",
                    g + 1,
                    m + 1,
                    describe(&mapping.fields),
                    display_state(&state)
                );
            }
        }
    }

    match snapshot {
        Err(e) => Err(CliError::read(e)),
        Ok(_) => Ok(()),
    }
}

fn preview_json(
    registry: &Registry,
    active: ActiveMapping<'_>,
    snapshot: Result<&Snapshot, &ReadError>,
) -> Value {
    let fields = active.fields();
    let state = observe(fields, snapshot);
    let group = registry
        .groups()
        .iter()
        .position(|g| g.id == active.group.id)
        .map_or(0, |i| i + 1);
    json!({
        "group": group,
        "group_name": active.group.name,
        "collapsed": active.collapsed(),
        "row": fields.row,
        "col": fields.col,
        "target": fields.target_name(),
        "kind": fields.kind.label(),
        "auto_update": fields.auto_update,
        "value": state.value().map(|v| v.to_string()),
        "marker": state.marker(),
    })
}

pub fn display_state(state: &MappingState) -> String {
    match (state.value(), state.marker()) {
        (Some(value), _) => format!("'{}'", value.preview(PREVIEW_CHARS)),
        (None, Some(marker)) => marker.to_string(),
        (None, None) => String::new(),
    }
}
