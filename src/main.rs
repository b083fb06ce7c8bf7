use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use tarsnap_bridge::config::{Config, default_config_path, load_config};
use tarsnap_bridge::exec::{CreateOptions, ExtractOptions, Tarsnap};
use tarsnap_bridge::rules::{Rule, translate_pattern, translate_template};

/// Environment variable holding the log filter.
const LOG_ENV: &str = "TSBRIDGE_LOG";

#[derive(Parser)]
#[command(name = "tsbridge")]
#[command(author, version, about = "Typed front end for the tarsnap command-line tool")]
#[command(arg_required_else_help = true)]
struct Cli {
	#[command(subcommand)]
	command: Commands,

	/// Read settings from this file instead of the default config.toml
	#[arg(long, global = true, value_name = "PATH")]
	config: Option<PathBuf>,

	/// tarsnap binary to run
	#[arg(long, global = true, value_name = "BINARY")]
	tool: Option<String>,

	/// Key file passed to tarsnap
	#[arg(long, global = true, value_name = "PATH")]
	keyfile: Option<PathBuf>,

	/// Print results as JSON
	#[arg(long, global = true)]
	json: bool,

	/// Log every tarsnap invocation
	#[arg(short, long, global = true)]
	verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
	/// List archives, oldest first
	List {
		/// Only show the latest archive whose name starts with this base
		#[arg(long)]
		base: Option<String>,
	},
	/// List the entries of an archive
	Entries { archive: String },
	/// Show storage sizes, for the whole account or the named archives
	Size { archives: Vec<String> },
	/// Create an archive
	Create(CreateArgs),
	/// Extract from an archive
	Extract(ExtractArgs),
	/// Delete archives
	Delete {
		#[arg(required = true)]
		archives: Vec<String>,
	},
	/// Show how a BRE pattern or replacement is translated
	Translate {
		text: String,

		/// Translate a replacement string instead of a pattern
		#[arg(long)]
		template: bool,
	},
	/// Apply a /old/new/flags rule to each path
	Rewrite {
		rule: String,
		#[arg(required = true)]
		paths: Vec<String>,
	},
	/// Show the current cache sequence tag
	CacheTag,
	/// Configuration management commands
	Config {
		#[command(subcommand)]
		action: ConfigAction,
	},
}

#[derive(Subcommand)]
enum ConfigAction {
	/// Display the effective configuration and tarsnap's own settings
	Show,
}

#[derive(Args)]
struct CreateArgs {
	name: String,

	/// Files or directories to archive
	#[arg(required = true)]
	include: Vec<String>,

	/// Change to this directory first
	#[arg(short = 'C', long)]
	directory: Option<PathBuf>,

	/// Rename entries with a /old/new/flags rule
	#[arg(short = 's', long = "modify", value_name = "RULE")]
	modify: Vec<String>,

	/// Skip paths matching this pattern
	#[arg(long)]
	exclude: Vec<String>,

	/// Follow symlinks
	#[arg(short = 'H', long)]
	follow_symlinks: bool,

	/// Store access times
	#[arg(long)]
	store_atime: bool,

	/// Preserve absolute paths
	#[arg(short = 'P', long)]
	preserve_paths: bool,

	/// Creation time, in seconds since the Unix epoch
	#[arg(long, value_name = "SECONDS")]
	creation_time: Option<i64>,

	/// Simulate creating the archive
	#[arg(long)]
	dry_run: bool,
}

#[derive(Args)]
struct ExtractArgs {
	name: String,

	/// Only extract entries matching these patterns
	include: Vec<String>,

	/// Extract into this directory
	#[arg(short = 'C', long)]
	directory: Option<PathBuf>,

	/// Rename entries with a /old/new/flags rule
	#[arg(short = 's', long = "modify", value_name = "RULE")]
	modify: Vec<String>,

	/// Skip paths matching this pattern
	#[arg(long)]
	exclude: Vec<String>,

	/// Restore permissions and ownership
	#[arg(short = 'p', long)]
	restore_perms: bool,

	/// Ignore owners stored in the archive
	#[arg(short = 'o', long, requires = "restore_perms")]
	ignore_owners: bool,

	/// Stop after the first match of each pattern
	#[arg(long)]
	fast_read: bool,
}

#[derive(Serialize)]
struct Rewrite<'a> {
	input: &'a str,
	output: String,
	matched: bool,
}

fn main() -> ExitCode {
	match run() {
		Ok(code) => code,
		Err(e) => {
			eprintln!("error: {e:?}");
			ExitCode::FAILURE
		}
	}
}

fn run() -> Result<ExitCode> {
	let Cli {
		command,
		config,
		tool,
		keyfile,
		json,
		verbose,
	} = Cli::parse();
	init_logging(verbose);

	// Only commands that run tarsnap need the config.
	let tarsnap = || -> Result<Tarsnap> {
		let config = effective_config(config.as_deref(), tool.clone(), keyfile.clone())?;
		Ok(Tarsnap::new(Some(config)))
	};

	match command {
		Commands::Translate { text, template } => handle_translate(&text, template),
		Commands::Rewrite { rule, paths } => handle_rewrite(&rule, &paths, json),
		Commands::List { base } => handle_list(&tarsnap()?, base.as_deref(), json),
		Commands::Entries { archive } => handle_entries(&tarsnap()?, &archive, json),
		Commands::Size { archives } => handle_size(&tarsnap()?, &archives, json),
		Commands::Create(args) => handle_create(&tarsnap()?, args),
		Commands::Extract(args) => handle_extract(&tarsnap()?, args),
		Commands::Delete { archives } => {
			tarsnap()?
				.delete(&archives)
				.with_context(|| format!("Failed to delete {}", archives.join(", ")))?;
			Ok(ExitCode::SUCCESS)
		}
		Commands::CacheTag => handle_cache_tag(&tarsnap()?),
		Commands::Config {
			action: ConfigAction::Show,
		} => handle_config_show(&tarsnap()?, config.as_deref()),
	}
}

fn init_logging(verbose: bool) {
	let default = if verbose { "debug" } else { "warn" };
	let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.init();
}

/// The config file overlaid with command-line settings.
fn effective_config(
	path: Option<&Path>,
	tool: Option<String>,
	keyfile: Option<PathBuf>,
) -> Result<Config> {
	let mut config = load_config(path).context("Failed to load configuration")?;
	config.merge(Config {
		tool,
		keyfile,
		work_dir: None,
	});
	Ok(config)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
	println!("{}", serde_json::to_string_pretty(value)?);
	Ok(())
}

fn handle_translate(text: &str, template: bool) -> Result<ExitCode> {
	if template {
		println!("{}", translate_template(text));
	} else {
		println!("{}", translate_pattern(text));
	}
	Ok(ExitCode::SUCCESS)
}

fn handle_rewrite(rule: &str, paths: &[String], json: bool) -> Result<ExitCode> {
	let rule = Rule::parse(rule).with_context(|| format!("Invalid rule: {}", rule))?;

	let results: Vec<Rewrite> = paths
		.iter()
		.map(|input| {
			let (output, matched) = rule.apply(input);
			Rewrite {
				input: input.as_str(),
				output,
				matched,
			}
		})
		.collect();

	if json {
		return print_json(&results).map(|_| ExitCode::SUCCESS);
	}
	for r in &results {
		if rule.print && r.matched {
			eprintln!("{} >> {}", r.input, r.output);
		}
		println!("{}", r.output);
	}
	Ok(ExitCode::SUCCESS)
}

fn handle_list(tarsnap: &Tarsnap, base: Option<&str>, json: bool) -> Result<ExitCode> {
	let archives = tarsnap.list().context("Failed to list archives")?;

	if let Some(base) = base {
		let latest = archives
			.latest(base)
			.ok_or_else(|| anyhow::anyhow!("No archive with base: {}", base))?;
		if json {
			print_json(latest)?;
		} else {
			println!("{}\t{}", latest.name, latest.created.to_rfc3339());
		}
		return Ok(ExitCode::SUCCESS);
	}

	if json {
		print_json(&archives)?;
	} else {
		for archive in archives.iter() {
			println!("{}\t{}", archive.name, archive.created.to_rfc3339());
		}
	}
	Ok(ExitCode::SUCCESS)
}

fn handle_entries(tarsnap: &Tarsnap, archive: &str, json: bool) -> Result<ExitCode> {
	let stdout = std::io::stdout();
	let mut out = stdout.lock();

	// A closed stdout fails the callback, which stops tarsnap early.
	tarsnap
		.entries(archive, |entry| -> Result<()> {
			if json {
				serde_json::to_writer(&mut out, &entry)?;
				writeln!(out)?;
			} else {
				writeln!(out, "{}", entry)?;
			}
			Ok(())
		})
		.with_context(|| format!("Failed to list entries of {}", archive))?;

	Ok(ExitCode::SUCCESS)
}

fn handle_size(tarsnap: &Tarsnap, archives: &[String], json: bool) -> Result<ExitCode> {
	let info = tarsnap.size(archives).context("Failed to read storage sizes")?;

	if json {
		print_json(&info)?;
		return Ok(ExitCode::SUCCESS);
	}
	if let Some(ref all) = info.all {
		println!("All archives\t{}", all);
	}
	for (name, sizes) in &info.archives {
		println!("{}\t{}", name, sizes);
	}
	Ok(ExitCode::SUCCESS)
}

fn handle_create(tarsnap: &Tarsnap, args: CreateArgs) -> Result<ExitCode> {
	let creation_time = args
		.creation_time
		.map(|secs| {
			chrono::DateTime::from_timestamp(secs, 0)
				.ok_or_else(|| anyhow::anyhow!("Creation time out of range: {}", secs))
		})
		.transpose()?;

	let opts = CreateOptions {
		include: args.include,
		work_dir: args.directory,
		modify: args.modify,
		exclude: args.exclude,
		follow_symlinks: args.follow_symlinks,
		store_access_time: args.store_atime,
		preserve_paths: args.preserve_paths,
		creation_time,
		dry_run: args.dry_run,
	};
	tarsnap
		.create(&args.name, &opts)
		.with_context(|| format!("Failed to create {}", args.name))?;

	Ok(ExitCode::SUCCESS)
}

fn handle_extract(tarsnap: &Tarsnap, args: ExtractArgs) -> Result<ExitCode> {
	let opts = ExtractOptions {
		include: args.include,
		exclude: args.exclude,
		modify: args.modify,
		work_dir: args.directory,
		restore_permissions: args.restore_perms,
		ignore_owners: args.ignore_owners,
		fast_read: args.fast_read,
	};
	tarsnap
		.extract(&args.name, &opts)
		.with_context(|| format!("Failed to extract {}", args.name))?;

	Ok(ExitCode::SUCCESS)
}

fn handle_cache_tag(tarsnap: &Tarsnap) -> Result<ExitCode> {
	match tarsnap.cache_tag().context("Failed to read cache tag")? {
		Some(tag) => println!("{}", tag),
		None => println!("No cache directory configured."),
	}
	Ok(ExitCode::SUCCESS)
}

fn handle_config_show(tarsnap: &Tarsnap, explicit: Option<&Path>) -> Result<ExitCode> {
	match explicit {
		Some(path) => println!("# Source: {}", path.display()),
		None => {
			let path = default_config_path()?;
			let note = if path.exists() { "" } else { " (not found)" };
			println!("# Source: {}{}", path.display(), note);
		}
	}
	println!("tool: {}", tarsnap.config().tool());
	if let Some(ref keyfile) = tarsnap.config().keyfile {
		println!("keyfile: {}", keyfile.display());
	}
	if let Some(ref dir) = tarsnap.config().work_dir {
		println!("work-dir: {}", dir.display());
	}

	let rc = tarsnap.rc().context("Failed to read tarsnap configuration")?;
	println!();
	println!("# tarsnap settings");
	for (key, value) in rc.iter() {
		println!("{} {}", key, value);
	}

	Ok(ExitCode::SUCCESS)
}
