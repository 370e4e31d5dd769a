//! regopts command-line tool
//!
//! Reads, writes and reconciles options in a store described by a
//! `StoreConfig` (TOML file via `--config`, plus `REGOPTS_ROOT` and
//! `REGOPTS_PATH` overrides). Logs go to stderr, filtered by `RUST_LOG`.

use regopts::options::{OptionError, RegOptionsManager, ValueType, VariantValue};
use regopts::persistence::{BackendType, OptionStore, StoreConfig, ValueCodec};
use regopts::storage::{InMemoryStore, LocalFsStore, PersistentStore};
use serde_json::{json, Map, Value};
use std::env;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
usage: regopts [--config <file>] <command>

commands:
  get <name> <int|bool|string>
  set <name> <int|bool|string> <value>
  remove <name>              (a name ending in / removes the whole key)
  export <file>
  import <file>
  list";

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    // REGOPTS_LOG_JSON=1 switches to one JSON object per event
    if env::var("REGOPTS_LOG_JSON").is_ok_and(|v| v == "1") {
        builder.json().init();
    } else {
        builder.init();
    }

    let args: Vec<String> = env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> Result<(), Box<dyn Error>> {
    let (config_path, command) = match args {
        [flag, path, rest @ ..] if flag == "--config" => (Some(PathBuf::from(path)), rest),
        rest => (None, rest),
    };

    let config = match config_path {
        Some(path) => StoreConfig::load(&path)?,
        None => StoreConfig::default(),
    }
    .with_env_overrides();

    match config.backend {
        BackendType::LocalFs => {
            let store = LocalFsStore::new(config.local_path.clone())?;
            info!(path = %config.local_path.display(), "Using local store");
            execute(store, &config, command)
        }
        BackendType::InMemory => execute(InMemoryStore::new(), &config, command),
    }
}

fn parse_type(raw: &str) -> Result<ValueType, Box<dyn Error>> {
    ValueType::parse(raw).ok_or_else(|| format!("unknown type {:?} (expected int, bool or string)", raw).into())
}

fn execute<S: PersistentStore>(
    store: S,
    config: &StoreConfig,
    command: &[String],
) -> Result<(), Box<dyn Error>> {
    match command {
        [cmd, name, ty] if cmd == "get" => {
            let options = OptionStore::open(store, config)?;
            let value = options.read(name, parse_type(ty)?)?;
            println!("{}", value);
        }
        [cmd, name, ty, raw] if cmd == "set" => {
            let value = match parse_type(ty)? {
                ValueType::String => VariantValue::String(raw.clone()),
                other => ValueCodec::from_text(raw, other).map_err(|e| e.for_option(name))?,
            };
            let options = OptionStore::open(store, config)?;
            options.write_async(name, value);
            options.flush();
        }
        [cmd, name] if cmd == "remove" => {
            let options = OptionStore::open(store, config)?;
            options.remove(name)?;
        }
        [cmd, file] if cmd == "export" => {
            let manager = RegOptionsManager::open(store, config)?;
            let stats = manager.export_options(Path::new(file))?;
            println!("exported {} values from {} keys", stats.exported, stats.keys_visited);
        }
        [cmd, file] if cmd == "import" => {
            let mut manager = RegOptionsManager::open(store, config)?;
            let stats = manager.import_options(Path::new(file))?;
            manager.flush_options();
            println!(
                "imported {} values ({} untyped, {} invalid, {} failed)",
                stats.imported, stats.skipped_untyped, stats.skipped_invalid, stats.failed
            );
        }
        [cmd] if cmd == "list" => {
            let options = OptionStore::open(store, config)?;
            println!("{}", serde_json::to_string_pretty(&list_json(&options)?)?);
        }
        _ => return Err(USAGE.into()),
    }
    Ok(())
}

fn list_json<S: PersistentStore>(options: &OptionStore<S>) -> Result<Value, OptionError> {
    let mut out = Map::new();
    for (name, stored) in options.list()? {
        let entry = match ValueCodec::decode_native(&stored.data, stored.store_type) {
            Some(VariantValue::Int(v)) => json!({ "type": "int", "value": v }),
            Some(VariantValue::String(s)) => json!({ "type": "string", "value": s }),
            _ => json!({ "type": stored.store_type.to_string(), "bytes": stored.data }),
        };
        out.insert(name, entry);
    }
    Ok(Value::Object(out))
}
