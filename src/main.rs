use clap::{Arg, ArgAction, ArgMatches, Command};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::{env, fs};

use picosync::config::{Config, TargetConfig};
use picosync::engine::{SyncEngine, SyncOptions};
use picosync::logging::{self, *};
use picosync::progress::{format_summary, ConsoleReporter};
use picosync::remote::{open_store, MpremoteStore, RemoteError, RemoteStore};
use picosync::shutdown::{setup_signal_handlers, ShutdownFlag};

fn build_cli() -> Command {
	Command::new("picosync")
		.version(env!("CARGO_PKG_VERSION"))
		.about("Mirror a local source tree onto a MicroPython board")
		.arg(
			Arg::new("config")
				.short('c')
				.long("config")
				.value_name("FILE")
				.value_parser(clap::value_parser!(PathBuf))
				.global(true)
				.help("Config file (default: picosync.toml or picosync.json5 in the working directory)"),
		)
		.arg(
			Arg::new("port")
				.short('p')
				.long("port")
				.value_name("PORT")
				.global(true)
				.conflicts_with("target-dir")
				.help("Serial port of the board"),
		)
		.arg(
			Arg::new("target-dir")
				.long("target-dir")
				.value_name("DIR")
				.value_parser(clap::value_parser!(PathBuf))
				.global(true)
				.help("Mirror into a mounted directory instead of a serial board"),
		)
		.arg(
			Arg::new("src")
				.short('s')
				.long("src")
				.value_name("DIR")
				.value_parser(clap::value_parser!(PathBuf))
				.global(true)
				.help("Source directory to sync"),
		)
		.arg(
			Arg::new("hash")
				.long("hash")
				.value_name("ALGORITHM")
				.global(true)
				.help("Content hash: sha256 or blake3"),
		)
		.arg(
			Arg::new("verbose")
				.short('v')
				.long("verbose")
				.action(ArgAction::Count)
				.global(true)
				.help("More log output (repeat for trace)"),
		)
		.arg(
			Arg::new("quiet")
				.short('q')
				.long("quiet")
				.action(ArgAction::SetTrue)
				.global(true)
				.help("Only log errors"),
		)
		.subcommand(
			Command::new("sync")
				.about("Synchronize the source directory onto the target")
				.arg(
					Arg::new("dry-run")
						.short('n')
						.long("dry-run")
						.action(ArgAction::SetTrue)
						.help("Show what would change without touching the target"),
				)
				.arg(
					Arg::new("no-prune")
						.long("no-prune")
						.action(ArgAction::SetTrue)
						.help("Keep empty remote directories"),
				)
				.arg(
					Arg::new("hide-unchanged")
						.long("hide-unchanged")
						.action(ArgAction::SetTrue)
						.help("Do not print files that are already up to date"),
				),
		)
		.subcommand(
			Command::new("ls")
				.about("List a directory on the target")
				.arg(Arg::new("path").default_value("/")),
		)
		.subcommand(
			Command::new("cat")
				.about("Print a file from the target")
				.arg(Arg::new("file").required(true)),
		)
		.subcommand(
			Command::new("edit")
				.about("Edit a file on the target with $EDITOR (default: nano)")
				.arg(Arg::new("file").required(true)),
		)
		.subcommand(Command::new("reset").about("Soft-reset the board"))
}

/// Defaults < config file < CLI flags
fn resolve_config(matches: &ArgMatches) -> Result<Config, Box<dyn Error>> {
	let cwd = env::current_dir()?;
	let explicit = matches.get_one::<PathBuf>("config").map(PathBuf::as_path);
	let mut config = Config::load(explicit, &cwd)?;

	if let Some(src) = matches.get_one::<PathBuf>("src") {
		config.source_dir = src.clone();
	}
	if let Some(dir) = matches.get_one::<PathBuf>("target-dir") {
		config.target = TargetConfig::Directory { path: dir.clone() };
	}
	if let Some(port) = matches.get_one::<String>("port") {
		config.set_port(port);
	}
	if let Some(hash) = matches.get_one::<String>("hash") {
		config.hash_algorithm = hash.parse()?;
	}

	let verbose = matches.get_count("verbose");
	let quiet = matches.get_flag("quiet");
	if verbose > 0 || quiet {
		config.log_level = logging::level_for(verbose, quiet).to_string();
	}
	Ok(config)
}

async fn cmd_sync(config: &mut Config, matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
	if matches.get_flag("dry-run") {
		config.dry_run = true;
	}
	if matches.get_flag("no-prune") {
		config.prune_empty_dirs = false;
	}
	if !config.source_dir.is_dir() {
		return Err(format!("Source directory {} does not exist", config.source_dir.display()).into());
	}

	let mut store = open_store(&config.target, config.hash_algorithm)?;

	let cancel = ShutdownFlag::new();
	setup_signal_handlers(cancel.clone());
	let options = SyncOptions { cancel: Some(cancel), ..SyncOptions::from(&*config) };

	let mut reporter = ConsoleReporter::stdout(config.dry_run);
	if matches.get_flag("hide-unchanged") {
		reporter = reporter.hide_unchanged();
	}

	let report = SyncEngine::new(store.as_mut(), options)
		.with_observer(reporter)
		.run(&config.source_dir)
		.await?;
	println!("{}", format_summary(&report, &config.source_dir));
	Ok(())
}

async fn cmd_ls(config: &Config, path: &str) -> Result<(), Box<dyn Error>> {
	let mut store = open_store(&config.target, config.hash_algorithm)?;
	for entry in store.list_dir(path).await? {
		println!("{} {}", if entry.is_dir { 'd' } else { '-' }, entry.name);
	}
	Ok(())
}

async fn cmd_cat(config: &Config, path: &str) -> Result<(), Box<dyn Error>> {
	let mut store = open_store(&config.target, config.hash_algorithm)?;
	let data = store.read(path).await?;
	print!("{}", String::from_utf8_lossy(&data));
	Ok(())
}

async fn cmd_edit(config: &Config, path: &str) -> Result<(), Box<dyn Error>> {
	let mut store = open_store(&config.target, config.hash_algorithm)?;
	let original = read_for_edit(store.as_mut(), path).await?;

	let tmp = env::temp_dir().join(temp_name(path));
	fs::write(&tmp, &original)?;
	let status = run_editor(&tmp).await;
	let edited = fs::read(&tmp);
	let _ = fs::remove_file(&tmp);

	let status = status?;
	if !status.success() {
		return Err(format!("Editor exited with {}", status).into());
	}
	let edited = edited?;
	if edited == original {
		println!("[SKIP same] {}", path);
		return Ok(());
	}
	store.write(path, &edited).await?;
	println!("[UPLOAD edited] {}", path);
	Ok(())
}

/// Current content of `path`, or nothing if the target has no such file
///
/// Any other failure is returned, so a file that exists but cannot be read
/// is never replaced by an empty buffer.
async fn read_for_edit(store: &mut dyn RemoteStore, path: &str) -> Result<Vec<u8>, RemoteError> {
	match store.read(path).await {
		Err(RemoteError::NotFound(_)) => {
			info!("{} does not exist on target, starting empty", path);
			Ok(Vec::new())
		}
		other => other,
	}
}

/// Unique temp file name keeping the remote extension for syntax highlighting
fn temp_name(remote: &str) -> String {
	let base = remote.rsplit('/').next().unwrap_or("file");
	format!("picosync-{}-{}", uuid::Uuid::new_v4(), base)
}

async fn run_editor(file: &Path) -> std::io::Result<std::process::ExitStatus> {
	let editor = env::var("VISUAL").or_else(|_| env::var("EDITOR")).unwrap_or_else(|_| "nano".to_string());
	let mut parts = editor.split_whitespace();
	let program = parts.next().unwrap_or("nano");
	tokio::process::Command::new(program).args(parts).arg(file).status().await
}

async fn cmd_reset(config: &Config) -> Result<(), Box<dyn Error>> {
	match &config.target {
		TargetConfig::Serial(serial) => {
			println!("Resetting board on {}", serial.port);
			MpremoteStore::new(serial.clone()).reset().await?;
			Ok(())
		}
		TargetConfig::Directory { path } => {
			Err(format!("reset needs a serial target, not directory {}", path.display()).into())
		}
	}
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
	let mut cli = build_cli();
	let matches = cli.clone().get_matches();

	let Some((name, sub)) = matches.subcommand() else {
		cli.print_help()?;
		println!();
		return Ok(());
	};

	let mut config = resolve_config(sub)?;
	logging::init_tracing(&config.log_level);
	debug!("Config: {:?}", config);

	match name {
		"sync" => cmd_sync(&mut config, sub).await,
		"ls" => {
			let path = sub.get_one::<String>("path").map(String::as_str).unwrap_or("/");
			cmd_ls(&config, path).await
		}
		"cat" => {
			let file = sub.get_one::<String>("file").ok_or("cat: file argument required")?;
			cmd_cat(&config, file).await
		}
		"edit" => {
			let file = sub.get_one::<String>("file").ok_or("edit: file argument required")?;
			cmd_edit(&config, file).await
		}
		"reset" => cmd_reset(&config).await,
		other => Err(format!("Unknown command: {}", other).into()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use picosync::remote::MemoryStore;

	#[tokio::test]
	async fn test_edit_starts_empty_only_for_missing_file() {
		let mut store = MemoryStore::new().with_file("/main.py", "x = 1");
		assert_eq!(read_for_edit(&mut store, "/main.py").await.unwrap(), b"x = 1");
		assert!(read_for_edit(&mut store, "/new.py").await.unwrap().is_empty());

		// A board-side failure must not look like an empty file
		let mut store = MemoryStore::new().with_file("/big.py", "data").fail_on("read", 1);
		assert!(read_for_edit(&mut store, "/big.py").await.is_err());
	}

	#[test]
	fn test_cli_is_valid() {
		build_cli().debug_assert();
	}

	#[test]
	fn test_global_flags_reach_subcommand() {
		let matches = build_cli()
			.try_get_matches_from(["picosync", "sync", "--dry-run", "-p", "/dev/ttyUSB0", "-vv"])
			.unwrap();
		let (name, sub) = matches.subcommand().unwrap();
		assert_eq!(name, "sync");
		assert!(sub.get_flag("dry-run"));
		assert_eq!(sub.get_one::<String>("port").map(String::as_str), Some("/dev/ttyUSB0"));
		assert_eq!(sub.get_count("verbose"), 2);
	}

	#[test]
	fn test_port_conflicts_with_target_dir() {
		let res = build_cli().try_get_matches_from([
			"picosync",
			"ls",
			"--port",
			"COM3",
			"--target-dir",
			"/mnt",
		]);
		assert!(res.is_err());
	}

	#[test]
	fn test_temp_name_keeps_extension() {
		let name = temp_name("/lib/main.py");
		assert!(name.starts_with("picosync-"));
		assert!(name.ends_with("-main.py"));
	}
}

// vim: ts=4
