mod app;

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use app::{any_failed, execute, init_tracing, Command, PlaytestConfig};

fn main() -> ExitCode {
    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::from(1)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Overrides {
    level: Option<PathBuf>,
    script: Option<PathBuf>,
    repairs: Option<PathBuf>,
    max_ticks: Option<u64>,
    ticks_per_second: Option<u32>,
}

impl Overrides {
    fn apply(self, config: &mut PlaytestConfig) {
        if let Some(level) = self.level {
            config.level_path = level;
        }
        if let Some(script) = self.script {
            config.script_path = script;
        }
        if let Some(repairs) = self.repairs {
            config.repair_path = repairs;
        }
        if let Some(max_ticks) = self.max_ticks {
            config.max_ticks = max_ticks;
        }
        if let Some(ticks_per_second) = self.ticks_per_second {
            config.ticks_per_second = ticks_per_second;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Invocation {
    Help,
    Run {
        command: Command,
        overrides: Overrides,
    },
}

fn run_cli() -> Result<(), String> {
    let args = env::args().skip(1).collect::<Vec<_>>();
    let (command, overrides) = match parse_args(&args)? {
        Invocation::Help => {
            print_usage();
            return Ok(());
        }
        Invocation::Run { command, overrides } => (command, overrides),
    };

    init_tracing();
    let mut config = PlaytestConfig::from_env().map_err(|error| error.to_string())?;
    overrides.apply(&mut config);

    let runs = execute(command, &config).map_err(|error| error.to_string())?;
    for run in &runs {
        println!("{}", run.render());
    }
    if any_failed(&runs) {
        return Err(format!("{} reported failures", command.name()));
    }
    Ok(())
}

fn parse_args(args: &[String]) -> Result<Invocation, String> {
    if args.is_empty() {
        return Err(usage_text());
    }
    if args[0] == "-h" || args[0] == "--help" {
        return Ok(Invocation::Help);
    }

    let mut overrides = Overrides::default();
    let mut index = 0usize;
    while index < args.len() {
        match args[index].as_str() {
            "--level" => {
                let value = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --level".to_string())?;
                overrides.level = Some(PathBuf::from(value));
                index += 2;
            }
            "--script" => {
                let value = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --script".to_string())?;
                overrides.script = Some(PathBuf::from(value));
                index += 2;
            }
            "--repairs" => {
                let value = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --repairs".to_string())?;
                overrides.repairs = Some(PathBuf::from(value));
                index += 2;
            }
            "--max-ticks" => {
                let value = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --max-ticks".to_string())?;
                let ticks = value
                    .parse::<u64>()
                    .map_err(|_| format!("invalid --max-ticks value '{value}' (expected u64)"))?;
                if ticks == 0 {
                    return Err("--max-ticks must be positive".to_string());
                }
                overrides.max_ticks = Some(ticks);
                index += 2;
            }
            "--tps" => {
                let value = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --tps".to_string())?;
                let tps = value
                    .parse::<u32>()
                    .map_err(|_| format!("invalid --tps value '{value}' (expected u32)"))?;
                if tps == 0 {
                    return Err("--tps must be positive".to_string());
                }
                overrides.ticks_per_second = Some(tps);
                index += 2;
            }
            _ => break,
        }
    }

    let name = args
        .get(index)
        .ok_or_else(|| "missing subcommand".to_string())?;
    let command =
        Command::parse(name).ok_or_else(|| format!("unknown subcommand '{name}'\n\n{}", usage_text()))?;
    if index + 1 < args.len() {
        return Err(format!("{} takes no arguments", command.name()));
    }
    Ok(Invocation::Run { command, overrides })
}

fn print_usage() {
    println!("{}", usage_text());
}

fn usage_text() -> String {
    [
        "playtest - level validity oracle",
        "",
        "Usage:",
        "  playtest [options] <command>",
        "",
        "Commands:",
        "  validate",
        "  coverage",
        "  progression",
        "  encounters",
        "  golden",
        "  replay-check",
        "  repair",
        "  all",
        "",
        "Options:",
        "  --level <file>      level fixture",
        "  --script <file>     critical-path script",
        "  --repairs <file>    repair plan",
        "  --max-ticks <u64>   golden path tick budget",
        "  --tps <u32>         simulation ticks per second",
        "",
        "Defaults:",
        "  --level assets/levels/foundry.json",
        "  --script assets/scripts/critical_path.json",
        "  --repairs assets/repairs.json",
        "  --max-ticks 20000 (or LEVEL_ORACLE_MAX_TICKS)",
        "  --tps 60",
        "",
        "Environment:",
        "  LEVEL_ORACLE_ROOT  project root holding assets/",
        "  RUST_LOG           tracing filter (default info)",
        "",
        "Exit status is 1 when any suite reports a failure.",
    ]
    .join("\n")
}
