use std::{
	fs,
	io::{self, Read},
	path::PathBuf,
	sync::Mutex,
};

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, bail};
use okrs::{
	config::{AppConfig, GithubConfig, OrgConfig, Output, ProjectConfig, RepoConfig},
	document::parse_markdown,
	format::Format,
	github::create_client,
	pipeline,
};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(author, version = concat!(env!("CARGO_PKG_VERSION"), " ", env!("GIT_HASH")), about = "tool for building OKR trees", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand)]
enum Commands {
	/// Build the tree described by a config file and write every configured output
	Run {
		config: PathBuf,
	},
	/// Markdown-related tools
	#[command(subcommand)]
	Md(MdCommands),
	/// GitHub-related tools
	#[command(subcommand)]
	Github(GithubCommands),
}

#[derive(Subcommand)]
enum MdCommands {
	/// Parse a markdown file (stdin when omitted or `-`) into an OKR tree
	Tree {
		file: Option<PathBuf>,
		#[clap(flatten)]
		out: OutArgs,
	},
}

#[derive(Subcommand)]
enum GithubCommands {
	/// Load the OKR tree from the issues of a repository
	Repo {
		/// `org/repo`, or just `repo` together with `--org`
		repo: String,
		#[clap(flatten)]
		gh: GithubArgs,
		#[clap(flatten)]
		out: OutArgs,
	},
	/// Load the OKR tree from classic project boards of an organization
	Proj {
		/// Project names
		names: Vec<String>,
		#[clap(flatten)]
		gh: GithubArgs,
		#[clap(flatten)]
		out: OutArgs,
	},
}

#[derive(Args)]
struct GithubArgs {
	#[arg(long)]
	org: Option<String>,
	/// Falls back to $GITHUB_TOKEN
	#[arg(long)]
	token: Option<String>,
	/// Directory to cache API responses in
	#[arg(long)]
	cache: Option<PathBuf>,
}

#[derive(Args)]
struct OutArgs {
	#[arg(long, short, value_enum)]
	format: Option<Format>,
	/// Output path, stdout when omitted
	#[arg(long, short)]
	output: Option<String>,
}

impl OutArgs {
	fn output(self) -> Output {
		Output {
			path: self.output.unwrap_or_else(|| "-".to_string()),
			format: self.format,
		}
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	init_tracing()?;
	let cli = Cli::parse();

	match cli.command {
		Commands::Run { config } => {
			let config = AppConfig::load(&config)?;
			let client = config.github.as_ref().map(|gh| create_client(gh.token.clone(), gh.cache.clone()));
			pipeline::run(&config, client.as_deref()).await
		}
		Commands::Md(MdCommands::Tree { file, out }) => {
			let text = match file.as_ref().filter(|f| f.as_os_str() != "-") {
				Some(path) => fs::read_to_string(path).wrap_err_with(|| format!("reading {}", path.display()))?,
				None => {
					let mut text = String::new();
					io::stdin().read_to_string(&mut text)?;
					text
				}
			};
			let tree = parse_markdown(&text)?;
			info!(children = tree.children.len(), "parsed markdown");
			out.output().write_tree(&tree)
		}
		Commands::Github(GithubCommands::Repo { repo, gh, out }) => {
			let (org, repo) = split_repo(&repo, gh.org.as_deref())?;
			let org = OrgConfig::new(org, vec![RepoConfig::new(repo)], Vec::new());
			run_github(gh, org, out).await
		}
		Commands::Github(GithubCommands::Proj { names, gh, out }) => {
			let Some(org) = gh.org.clone() else {
				bail!("organization should be specified");
			};
			let org = OrgConfig::new(org, Vec::new(), names.into_iter().map(ProjectConfig::new).collect());
			run_github(gh, org, out).await
		}
	}
}

async fn run_github(gh: GithubArgs, org: OrgConfig, out: OutArgs) -> Result<()> {
	let github = GithubConfig {
		token: gh.token.or_else(|| std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty())),
		cache: gh.cache,
		orgs: vec![org],
	};
	let client = create_client(github.token.clone(), github.cache.clone());
	let config = AppConfig {
		github: Some(github),
		markdown: Vec::new(),
		output: vec![out.output()],
	};
	pipeline::run(&config, Some(client.as_ref())).await
}

/// `org/repo`, or `repo` with the org given separately.
fn split_repo(arg: &str, org: Option<&str>) -> Result<(String, String)> {
	let (org, repo) = match (org, arg.split_once('/')) {
		(Some(org), _) => (org, arg.strip_prefix(&format!("{org}/")).unwrap_or(arg)),
		(None, Some((org, repo))) => (org, repo),
		(None, None) => bail!("organization should be specified"),
	};
	if repo.is_empty() {
		bail!("repository should be specified");
	}
	Ok((org.to_string(), repo.to_string()))
}

/// `RUST_LOG`, else the directives baked in at build time, else `info`. Human-readable to stderr; additionally
/// JSON lines to `$OKRS_TRACE_FILE` when set.
fn init_tracing() -> Result<()> {
	let directives = std::env::var("RUST_LOG")
		.ok()
		.filter(|d| !d.is_empty())
		.or_else(|| option_env!("LOG_DIRECTIVES").map(str::to_string))
		.unwrap_or_else(|| "info".to_string());

	let trace_file = match std::env::var_os("OKRS_TRACE_FILE") {
		Some(path) => {
			let file = fs::File::create(&path).wrap_err_with(|| format!("creating trace file {}", path.to_string_lossy()))?;
			Some(tracing_subscriber::fmt::layer().json().with_writer(Mutex::new(file)))
		}
		None => None,
	};

	tracing_subscriber::registry()
		.with(EnvFilter::new(directives))
		.with(tracing_subscriber::fmt::layer().with_writer(io::stderr).with_target(false))
		.with(trace_file)
		.init();
	Ok(())
}
