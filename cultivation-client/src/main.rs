mod clock;
mod commands;
mod config;
mod logic;
mod storage;
mod util;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use cultivation_game::Faction;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clock::SystemClock;
use commands::PlayOptions;
use config::{ClientConfig, Overrides};
use cultivation_game::SyncSession;
use logic::{LogicTester, ScenarioResult, get_scenario, list_scenarios};
use storage::{FileCache, HttpStore};
use util::{parse_seeds, split_csv};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Reconcile and print the current save
    Status,
    /// Click, buy and idle, then flush the save on exit
    Play,
    /// Reconcile and push the local save to the server
    Sync,
    /// Wipe all progress in both stores
    Reset,
    /// Exchange a username and password for a user id
    Login,
    /// Run seeded save-reconciliation scenarios against in-memory stores
    Scenarios,
}

impl Mode {
    const fn needs_session(self) -> bool {
        matches!(self, Self::Status | Self::Play | Self::Sync | Self::Reset)
    }
}

#[derive(Debug, Parser)]
#[command(name = "cultivation-client", version = "0.1.0")]
#[command(about = "Headless client for the cultivation idle game")]
struct Args {
    /// What to do
    #[arg(long, value_enum, default_value_t = Mode::Scenarios)]
    mode: Mode,

    /// JSON config file (schedule, server_url, cache_path, user_id, token)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Base URL of the save API, e.g. http://localhost:5000/api
    #[arg(long)]
    server_url: Option<String>,

    /// Local save cache file
    #[arg(long)]
    cache_path: Option<PathBuf>,

    /// Account whose save is loaded and written
    #[arg(long)]
    user_id: Option<String>,

    /// Bearer token sent with save requests
    #[arg(long)]
    token: Option<String>,

    /// Username for login mode
    #[arg(long)]
    username: Option<String>,

    /// Password for login mode
    #[arg(long)]
    password: Option<String>,

    /// Clicks to perform in play mode
    #[arg(long, default_value_t = 0)]
    clicks: usize,

    /// Seconds of passive production in play mode
    #[arg(long, default_value_t = 0)]
    idle_secs: u64,

    /// Buy affordable generators after every click
    #[arg(long)]
    auto_buy: bool,

    /// Break through as soon as enough qi is held
    #[arg(long)]
    auto_breakthrough: bool,

    /// Faction to join before playing (righteous, demonic, heavenly)
    #[arg(long)]
    faction: Option<Faction>,

    /// Scenarios to run (comma-separated, or "all")
    #[arg(long, default_value = "smoke")]
    scenarios: String,

    /// List all available scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Seeds to run (comma-separated)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Number of iterations per scenario and seed
    #[arg(long, default_value_t = 10)]
    iterations: usize,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console"])]
    report: String,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            server_url: self.server_url.clone(),
            cache_path: self.cache_path.clone(),
            user_id: self.user_id.clone(),
            token: self.token.clone(),
        }
    }

    fn play_options(&self) -> PlayOptions {
        PlayOptions {
            clicks: self.clicks,
            idle: Duration::from_secs(self.idle_secs),
            auto_buy: self.auto_buy,
            auto_breakthrough: self.auto_breakthrough,
            faction: self.faction,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if maybe_list_scenarios(&args)? {
        return Ok(());
    }

    announce_banner();

    if args.mode.needs_session() {
        return run_session(&args).await;
    }
    if args.mode == Mode::Login {
        return run_login(&args).await;
    }

    let start_time = Instant::now();
    let scenarios = expand_scenarios(&args.scenarios);
    let seeds = parse_seeds(&args.seeds)?;

    let all_results = run_logic_scenarios(&args, &scenarios, &seeds).await;

    write_reports(&args, &all_results, start_time)?;

    if all_results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }

    Ok(())
}

fn maybe_list_scenarios(args: &Args) -> Result<bool> {
    if !args.list_scenarios {
        return Ok(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(output_target.writer(), "Available scenarios:")?;
    for (key, description) in list_scenarios() {
        writeln!(output_target.writer(), "  {key:25} - {description}")?;
    }
    output_target.flush_inner()?;
    Ok(true)
}

fn announce_banner() {
    println!("{}", "🧘 Cultivation Client".bright_cyan().bold());
    println!("{}", "=====================".cyan());
}

fn expand_scenarios(scenarios_arg: &str) -> Vec<String> {
    let mut scenarios = split_csv(scenarios_arg);
    if scenarios.iter().any(|s| s == "all") {
        scenarios.retain(|s| s != "all");
        for (key, _) in list_scenarios() {
            if !scenarios.iter().any(|s| s == key) {
                scenarios.push(key.to_string());
            }
        }
    }
    scenarios
}

async fn run_logic_scenarios(
    args: &Args,
    scenarios: &[String],
    seeds: &[u64],
) -> Vec<ScenarioResult> {
    println!("{}", "🧠 Running Save Scenarios".bright_yellow().bold());
    println!("{}", "-".repeat(30).yellow());

    let logic_tester = LogicTester::new(args.verbose);
    let mut results = Vec::new();

    for scenario_name in scenarios {
        if let Some(scenario) = get_scenario(scenario_name) {
            let scenario_results = logic_tester
                .run_scenario(&scenario, seeds, args.iterations)
                .await;
            results.extend(scenario_results);
        } else {
            eprintln!("⚠️  Unknown scenario: {}", scenario_name.yellow());
        }
    }

    results
}

async fn run_session(args: &Args) -> Result<()> {
    let config = ClientConfig::resolve(args.config.as_deref(), args.overrides())?;
    let user_id = config.require_user_id()?;
    let remote = HttpStore::new(
        &config.server_url,
        user_id,
        config.token.clone(),
        config.request_timeout(),
    )
    .context("failed to build the HTTP client")?;
    let local = FileCache::new(config.cache_path.clone());
    log::info!(
        "using cache {} and server {}",
        local.path().display(),
        config.server_url
    );

    let mut session = SyncSession::new(local, remote, SystemClock::new(), config.schedule);
    let mut out = stdout();
    commands::boot(&mut session, &mut out).await?;

    match args.mode {
        Mode::Play => {
            commands::play(&mut session, &args.play_options(), &mut out).await?;
        }
        Mode::Sync => match session.manual_sync().await {
            Ok(receipt) => println!("☁️  Saved to the cloud at {}", receipt.timestamp),
            Err(err) => eprintln!("⚠️  {}", err.to_string().yellow()),
        },
        Mode::Reset => match session.hard_reset().await {
            Ok(()) => println!("🧹 Progress wiped in both stores"),
            Err(err) => eprintln!(
                "⚠️  Local progress wiped, cloud copy not overwritten: {}",
                err.to_string().yellow()
            ),
        },
        Mode::Status | Mode::Login | Mode::Scenarios => {}
    }

    if let Some(state) = session.state() {
        commands::render_status(&mut out, state, session.health())?;
    }

    if args.mode == Mode::Play {
        let report = session.logout().await;
        if report.flushed {
            println!("👋 Final save flushed");
        } else if report.skipped {
            println!("👋 Nothing to save");
        } else if let Some(err) = report.error {
            eprintln!("⚠️  Final save not flushed: {}", err.yellow());
        }
    }
    Ok(())
}

async fn run_login(args: &Args) -> Result<()> {
    let config = ClientConfig::resolve(args.config.as_deref(), args.overrides())?;
    let username = args.username.as_deref().context("--username is required")?;
    let password = args.password.as_deref().context("--password is required")?;
    let user_id = storage::login(
        &config.server_url,
        username,
        password,
        config.request_timeout(),
    )
    .await?;
    println!("🔑 Signed in as {username}; user id {}", user_id.bright_white());
    Ok(())
}

fn write_reports(args: &Args, results: &[ScenarioResult], start_time: Instant) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report.as_str() {
        "json" => {
            if results.is_empty() {
                writeln!(&mut output_target, "[]")?;
            } else {
                logic::reports::generate_json_report(&mut output_target, results)?;
            }
        }
        "markdown" => {
            if results.is_empty() {
                writeln!(
                    &mut output_target,
                    "# Cultivation Scenario Results\n\n_No scenarios executed._"
                )?;
            } else {
                logic::reports::generate_markdown_report(&mut output_target, results)?;
            }
        }
        _ => {
            if results.is_empty() {
                writeln!(&mut output_target, "No scenarios executed.")?;
            } else {
                logic::reports::generate_console_report(
                    &mut output_target,
                    results,
                    start_time.elapsed(),
                )?;
            }
        }
    }

    if args.report != "json" {
        let duration = start_time.elapsed();
        writeln!(&mut output_target)?;
        writeln!(&mut output_target, "🏁 Total time: {duration:?}")?;
    }
    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn base_args() -> Args {
        Args {
            mode: Mode::Scenarios,
            config: None,
            server_url: None,
            cache_path: None,
            user_id: None,
            token: None,
            username: None,
            password: None,
            clicks: 0,
            idle_secs: 0,
            auto_buy: false,
            auto_breakthrough: false,
            faction: None,
            scenarios: "smoke".to_string(),
            list_scenarios: false,
            seeds: "1337".to_string(),
            iterations: 1,
            report: "json".to_string(),
            verbose: false,
            output: None,
        }
    }

    fn temp_path(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "cultivation-main-{label}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ))
    }

    fn sample_result(passed: bool) -> ScenarioResult {
        ScenarioResult {
            scenario_name: "Smoke Test".to_string(),
            seed: 1337,
            passed,
            iterations_run: 3,
            successful_iterations: if passed { 3 } else { 2 },
            failures: if passed {
                Vec::new()
            } else {
                vec!["failure".to_string()]
            },
            average_duration: Duration::from_millis(10),
            performance_data: vec![Duration::from_millis(10)],
        }
    }

    #[test]
    fn expands_all_scenarios_keyword() {
        let expanded = expand_scenarios("smoke,all");
        assert_eq!(expanded[0], "smoke");
        assert_eq!(expanded.len(), list_scenarios().len());
        assert!(expanded.contains(&"clock-skew".to_string()));
    }

    #[test]
    fn expand_scenarios_without_all_preserves_order() {
        let expanded = expand_scenarios("hard-reset,smoke");
        assert_eq!(
            expanded,
            vec!["hard-reset".to_string(), "smoke".to_string()]
        );
    }

    #[test]
    fn session_modes_are_flagged() {
        assert!(Mode::Play.needs_session());
        assert!(Mode::Status.needs_session());
        assert!(!Mode::Scenarios.needs_session());
        assert!(!Mode::Login.needs_session());
    }

    #[test]
    fn play_options_follow_flags() {
        let args = Args {
            clicks: 12,
            idle_secs: 3,
            auto_buy: true,
            faction: Some(Faction::Heavenly),
            ..base_args()
        };
        let options = args.play_options();
        assert_eq!(options.clicks, 12);
        assert_eq!(options.idle, Duration::from_secs(3));
        assert!(options.auto_buy);
        assert!(!options.auto_breakthrough);
        assert_eq!(options.faction, Some(Faction::Heavenly));
    }

    #[test]
    fn run_logic_scenarios_skips_unknown_names() {
        let args = base_args();
        let results = tokio_test::block_on(run_logic_scenarios(
            &args,
            &["does-not-exist".to_string()],
            &[1],
        ));
        assert!(results.is_empty());
    }

    #[test]
    fn write_reports_emits_json_output() {
        let temp = temp_path("report.json");
        let args = Args {
            output: Some(temp.clone()),
            ..base_args()
        };
        write_reports(&args, &[sample_result(true)], Instant::now()).unwrap();
        let content = std::fs::read_to_string(temp).unwrap();
        let parsed: Vec<ScenarioResult> = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn write_reports_handles_empty_markdown() {
        let temp = temp_path("report.md");
        let args = Args {
            report: "markdown".to_string(),
            output: Some(temp.clone()),
            ..base_args()
        };
        write_reports(&args, &[], Instant::now()).unwrap();
        let content = std::fs::read_to_string(temp).unwrap();
        assert!(content.contains("_No scenarios executed._"));
        assert!(content.contains("🏁 Total time"));
    }

    #[test]
    fn write_reports_console_lists_failures() {
        colored::control::set_override(false);
        let temp = temp_path("report.txt");
        let args = Args {
            report: "console".to_string(),
            output: Some(temp.clone()),
            ..base_args()
        };
        write_reports(&args, &[sample_result(false)], Instant::now()).unwrap();
        let content = std::fs::read_to_string(temp).unwrap();
        assert!(content.contains("❌ FAIL"));
        assert!(content.contains("failure"));
    }

    #[test]
    fn maybe_list_scenarios_writes_output() {
        let temp = temp_path("scenarios.txt");
        let args = Args {
            list_scenarios: true,
            output: Some(temp.clone()),
            ..base_args()
        };
        assert!(maybe_list_scenarios(&args).unwrap());
        let content = std::fs::read_to_string(temp).unwrap();
        assert!(content.contains("offline-reconnect"));
    }

    #[test]
    fn maybe_list_scenarios_is_a_no_op_by_default() {
        assert!(!maybe_list_scenarios(&base_args()).unwrap());
    }

    #[test]
    fn args_parse_from_command_line() {
        let args = Args::try_parse_from([
            "cultivation-client",
            "--mode",
            "play",
            "--clicks",
            "5",
            "--faction",
            "demonic",
            "--user-id",
            "6",
        ])
        .unwrap();
        assert_eq!(args.mode, Mode::Play);
        assert_eq!(args.faction, Some(Faction::Demonic));
        assert_eq!(args.overrides().user_id.as_deref(), Some("6"));
    }
}
