//! Command-line host for the authentication core.
//!
//! Thin wrapper: file-backed profile store, env-provided process secret,
//! audio read from disk with the container format taken from the file
//! extension. All decisions and scores come from the library.

use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use voxguard::{AudioFormat, CoreConfig, FileStore, ProcessSecret, VoiceAuthEngine};

const SECRET_ENV: &str = "VOXGUARD_SECRET";
const STORE_ENV: &str = "VOXGUARD_STORE_DIR";
const CONFIG_ENV: &str = "VOXGUARD_CONFIG";

const USAGE: &str = "\
voxguard - voice biometric enrollment and verification

Usage:
  voxguard enroll <user-id> <audio-file>
  voxguard re-enroll <user-id> <audio-file>
  voxguard verify <user-id> <audio-file>
  voxguard delete <user-id>
  voxguard list

Environment:
  VOXGUARD_SECRET      process secret, at least 32 bytes (required)
  VOXGUARD_STORE_DIR   profile directory (default: OS data dir)
  VOXGUARD_CONFIG      optional TOML configuration file
";

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match args.first().map(String::as_str) {
        Some(c) => c,
        None => {
            eprint!("{USAGE}");
            std::process::exit(2);
        }
    };

    let config = load_config()?;
    let store = FileStore::open(&store_dir()?).context("failed to open profile store")?;

    match (command, args.len()) {
        ("enroll", 3) => {
            let engine = build_engine(config)?;
            let (bytes, format) = read_audio(&args[2])?;
            let outcome = engine.enroll(&store, &args[1], &bytes, format)?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        ("re-enroll", 3) => {
            let engine = build_engine(config)?;
            let (bytes, format) = read_audio(&args[2])?;
            let outcome = engine.re_enroll(&store, &args[1], &bytes, format)?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        ("verify", 3) => {
            let engine = build_engine(config)?;
            let (bytes, format) = read_audio(&args[2])?;
            let outcome = engine.verify(&store, &args[1], &bytes, format)?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        ("delete", 2) => {
            let engine = build_engine(config)?;
            engine.delete(&store, &args[1])?;
            println!("deleted voiceprint for '{}'", args[1]);
        }
        ("list", 1) => {
            for user in store.list_users()? {
                println!("{user}");
            }
        }
        _ => {
            eprint!("{USAGE}");
            std::process::exit(2);
        }
    }

    Ok(())
}

fn build_engine(config: CoreConfig) -> Result<VoiceAuthEngine> {
    let secret = std::env::var(SECRET_ENV)
        .with_context(|| format!("{SECRET_ENV} must be set"))?;
    let secret = ProcessSecret::new(secret.into_bytes())?;
    Ok(VoiceAuthEngine::new(config, secret)?)
}

fn load_config() -> Result<CoreConfig> {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) => {
            let path = PathBuf::from(path);
            CoreConfig::load(&path)
                .with_context(|| format!("failed to load config from {}", path.display()))
        }
        None => Ok(CoreConfig::default()),
    }
}

fn store_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(STORE_ENV) {
        return Ok(PathBuf::from(dir));
    }
    let dirs = ProjectDirs::from("dev", "Voxguard", "Voxguard")
        .context("failed to determine a data directory; set VOXGUARD_STORE_DIR")?;
    Ok(dirs.data_dir().join("voiceprints"))
}

fn read_audio(path_arg: &str) -> Result<(Vec<u8>, AudioFormat)> {
    let path = Path::new(path_arg);
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .with_context(|| format!("cannot infer container format from '{path_arg}'"))?;
    let format = AudioFormat::from_str(extension)?;
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {path_arg}"))?;
    if bytes.is_empty() {
        bail!("{path_arg} is empty");
    }
    Ok((bytes, format))
}
