// cellcast CLI - mirror spreadsheet cells into OBS inputs

mod app;
mod edit;
mod exit_codes;
mod preview;
mod run;

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use cellcast_config::SettingsError;
use cellcast_core::{ReadError, ValueKind};
use cellcast_obs_client::ConnectError;
use clap::{Args, Parser, Subcommand};

use exit_codes::{
    connect_exit_code, read_exit_code, EXIT_ERROR, EXIT_SETTINGS, EXIT_SUCCESS, EXIT_USAGE,
};

#[derive(Parser)]
#[command(name = "cellcast")]
#[command(about = "Push spreadsheet cell values into OBS inputs over obs-websocket")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Settings file (default: <config dir>/cellcast/settings.json)
    #[arg(long, global = true, env = "CELLCAST_SETTINGS")]
    settings: Option<PathBuf>,

    /// More log output (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a fresh settings file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the current settings
    Show {
        /// Machine-readable output (password masked)
        #[arg(long)]
        json: bool,
    },

    /// Set the spreadsheet to read
    #[command(after_help = "\
Examples:
  cellcast source --file scores.xlsx --sheet Sheet1
  cellcast source --file scores.csv")]
    Source {
        /// Workbook or CSV file
        #[arg(long)]
        file: Option<PathBuf>,

        /// Sheet name (not needed for CSV/TSV)
        #[arg(long)]
        sheet: Option<String>,
    },

    /// Set the obs-websocket endpoint
    Connection {
        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,

        /// Password; pass an empty string to clear it
        #[arg(long)]
        password: Option<String>,
    },

    /// Manage mapping groups
    #[command(subcommand)]
    Group(GroupCommands),

    /// Manage mappings
    #[command(subcommand)]
    Mapping(MappingCommands),

    /// Replace all settings with the contents of a file
    Import { file: PathBuf },

    /// Write the current settings to a file
    Export { file: PathBuf },

    /// Read the sheet once and show what every mapping points at
    Preview {
        #[arg(long)]
        json: bool,
    },

    /// Connect, send every mapping once, and disconnect
    Sync,

    /// Connect and keep pushing changes until `quit` or end of input
    #[command(after_help = "\
Commands read from stdin while running:
  sync, u                 send every mapping now
  status                  show connection and mapping states
  reconnect               reconnect to the target
  reload                  re-read the settings file
  import <FILE>           replace all settings with FILE
  remove <GROUP> <INDEX>  remove a mapping
  collapse <GROUP>        collapse a group
  expand <GROUP>          expand a group
  quit, q                 stop (end of input also stops)")]
    Run {
        /// Poll interval in milliseconds (overrides the settings file)
        #[arg(long)]
        interval_ms: Option<u64>,
    },
}

#[derive(Subcommand)]
enum GroupCommands {
    /// Add a group at the end
    Add { name: String },
    /// Rename group INDEX (1-based)
    Rename { index: usize, name: String },
    /// Remove group INDEX and all its mappings
    Remove { index: usize },
    /// Collapse group INDEX
    Collapse { index: usize },
    /// Expand group INDEX
    Expand { index: usize },
}

#[derive(Subcommand)]
enum MappingCommands {
    /// Add a mapping to a group
    #[command(after_help = "\
Examples:
  cellcast mapping add --group 1 --target HomeScore --row 2 --col 3
  cellcast mapping add --group 1 --target Logo --row 4 --col 1 --kind image --manual")]
    Add {
        /// Group index (1-based)
        #[arg(long, default_value_t = 1)]
        group: usize,

        #[command(flatten)]
        fields: FieldArgs,

        /// Only send on manual sync
        #[arg(long)]
        manual: bool,
    },
    /// Change fields of mapping INDEX in GROUP
    Edit {
        group: usize,
        index: usize,

        #[command(flatten)]
        fields: FieldArgs,

        /// Auto-update on or off
        #[arg(long)]
        auto: Option<bool>,
    },
    /// Remove mapping INDEX from GROUP
    Remove { group: usize, index: usize },
}

#[derive(Args)]
struct FieldArgs {
    /// Target input name
    #[arg(long)]
    target: Option<String>,

    /// Row (1-based)
    #[arg(long)]
    row: Option<String>,

    /// Column (1-based)
    #[arg(long)]
    col: Option<String>,

    /// text, image, browser-url or media-file
    #[arg(long, value_parser = parse_kind)]
    kind: Option<ValueKind>,
}

fn parse_kind(s: &str) -> Result<ValueKind, String> {
    s.parse()
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\ntarget:  ", env!("TARGET"),
    )
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - {} - {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                std::thread::current().name().unwrap_or("main"),
                record.args()
            )
        })
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = app::Context::load(cli.settings).and_then(|mut ctx| match cli.command {
        Commands::Init { force } => edit::cmd_init(&mut ctx, force),
        Commands::Show { json } => preview::cmd_show(&ctx, json),
        Commands::Source { file, sheet } => edit::cmd_source(&mut ctx, file, sheet),
        Commands::Connection { host, port, password } => edit::cmd_connection(&mut ctx, host, port, password),
        Commands::Group(command) => match command {
            GroupCommands::Add { name } => edit::cmd_group_add(&mut ctx, &name),
            GroupCommands::Rename { index, name } => edit::cmd_group_rename(&mut ctx, index, &name),
            GroupCommands::Remove { index } => edit::cmd_group_remove(&mut ctx, index),
            GroupCommands::Collapse { index } => edit::cmd_group_collapse(&mut ctx, index, true),
            GroupCommands::Expand { index } => edit::cmd_group_collapse(&mut ctx, index, false),
        },
        Commands::Mapping(command) => match command {
            MappingCommands::Add { group, fields, manual } => edit::cmd_mapping_add(
                &mut ctx,
                group,
                edit::FieldChanges {
                    target: fields.target,
                    row: fields.row,
                    col: fields.col,
                    kind: fields.kind,
                    auto_update: Some(!manual),
                },
            ),
            MappingCommands::Edit { group, index, fields, auto } => edit::cmd_mapping_edit(
                &mut ctx,
                group,
                index,
                edit::FieldChanges {
                    target: fields.target,
                    row: fields.row,
                    col: fields.col,
                    kind: fields.kind,
                    auto_update: auto,
                },
            ),
            MappingCommands::Remove { group, index } => edit::cmd_mapping_remove(&mut ctx, group, index),
        },
        Commands::Import { file } => edit::cmd_import(&mut ctx, &file),
        Commands::Export { file } => edit::cmd_export(&ctx, &file),
        Commands::Preview { json } => preview::cmd_preview(&ctx, json),
        Commands::Sync => run::cmd_sync(&ctx),
        Commands::Run { interval_ms } => run::cmd_run(&mut ctx, interval_ms),
    });

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(EXIT_ERROR, msg)
    }

    pub fn settings(err: SettingsError) -> Self {
        Self::new(EXIT_SETTINGS, err.to_string())
    }

    pub fn read(err: &ReadError) -> Self {
        let error = Self::new(read_exit_code(err), err.to_string());
        match err {
            ReadError::MissingConfig => error.with_hint("set one with `cellcast source --file <PATH> --sheet <NAME>`"),
            _ => error,
        }
    }

    pub fn connect(err: &ConnectError) -> Self {
        Self::new(connect_exit_code(err), err.to_string())
            .with_hint("is OBS running with the WebSocket server enabled? check `cellcast show`")
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
