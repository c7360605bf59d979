//! Release Warden CLI
//!
//! Runs release validation and the release workflow for a project directory.

use std::path::PathBuf;
use std::sync::Arc;

use release_warden::checks::presets;
use release_warden::report::area;
use release_warden::{
    release_workflow, Aggregator, CheckOptions, CiStatusSource, Context, GhCiStatus, GitCli,
    ReleaseConfig, ReleaseEnv, ReportMeta, Result, RunFlags, Runner, VersionControl,
};

const USAGE: &str = "\
Usage:
  release-warden check [DIR] [--json]
  release-warden validate [DIR] [--version VERSION] [--skip AREA]... [--json]
  release-warden release VERSION [DIR] [--dry-run] [--skip-checks] [--skip-ci] [--verbose] [--json]

Areas: pm-validation, qa-validation, docs-validation, security-validation, release-validation";

#[derive(Debug, PartialEq)]
enum Command {
    Check {
        dir: PathBuf,
        json: bool,
    },
    Validate {
        dir: PathBuf,
        version: Option<String>,
        skip: Vec<String>,
        json: bool,
    },
    Release {
        version: String,
        dir: PathBuf,
        flags: RunFlags,
        json: bool,
    },
}

fn parse_args(args: &[String]) -> std::result::Result<Command, String> {
    let (command, rest) = args.split_first().ok_or("missing command")?;

    let mut positional = Vec::new();
    let mut json = false;
    let mut version = None;
    let mut skip = Vec::new();
    let mut flags = RunFlags::default();

    let mut iter = rest.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--json" => json = true,
            "--dry-run" => flags.dry_run = true,
            "--skip-checks" => flags.skip_checks = true,
            "--skip-ci" => flags.skip_ci = true,
            "--verbose" | "-v" => flags.verbose = true,
            "--version" => {
                version = Some(iter.next().ok_or("--version needs a value")?.clone());
            }
            "--skip" => {
                let area_id = iter.next().ok_or("--skip needs an area")?;
                if !area::is_known_area(area_id) {
                    return Err(format!("unknown area '{}'", area_id));
                }
                skip.push(area_id.clone());
            }
            flag if flag.starts_with('-') => return Err(format!("unknown option '{}'", flag)),
            value => positional.push(value.to_string()),
        }
    }

    let dir_at = |i: usize| {
        positional
            .get(i)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
    };

    match command.as_str() {
        "check" if positional.len() <= 1 => Ok(Command::Check { dir: dir_at(0), json }),
        "validate" if positional.len() <= 1 => Ok(Command::Validate {
            dir: dir_at(0),
            version,
            skip,
            json,
        }),
        "release" => {
            let version = positional.first().ok_or("release needs a VERSION")?.clone();
            if positional.len() > 2 {
                return Err("too many arguments".to_string());
            }
            Ok(Command::Release {
                version,
                dir: dir_at(1),
                flags,
                json,
            })
        }
        "check" | "validate" => Err("too many arguments".to_string()),
        other => Err(format!("unknown command '{}'", other)),
    }
}

async fn validate(
    dir: PathBuf,
    version: Option<String>,
    skip: Vec<String>,
    json: bool,
    only: Option<&str>,
) -> Result<bool> {
    let config = ReleaseConfig::load(&dir)?;
    let vcs: Arc<dyn VersionControl> = Arc::new(GitCli::new(&dir).with_remote(&config.git.remote));

    let mut plans = presets::plan(&dir, &config, vcs)?;
    if let Some(only) = only {
        plans.retain(|p| p.area.id == only);
    }

    let version = version.map(|v| release_warden::checks::normalize_version(&v));
    let meta = ReportMeta {
        project: config.project_name(&dir),
        version: version.clone().unwrap_or_default(),
        phase: config.project.phase.clone(),
    };
    let aggregator = Aggregator::new(CheckOptions {
        version,
        verbose: false,
    })
    .with_skipped(skip);

    let report = aggregator.run(&plans, &dir, meta).await?;
    if json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report.render_text());
    }
    Ok(report.is_go())
}

async fn release(version: String, dir: PathBuf, flags: RunFlags, json: bool) -> Result<bool> {
    let config = ReleaseConfig::load(&dir)?;
    let git = GitCli::new(&dir)
        .with_remote(&config.git.remote)
        .with_signed_tags(config.git.sign_tags);

    let ci: Option<Arc<dyn CiStatusSource>> = match git
        .remote_url()
        .and_then(|url| GhCiStatus::from_remote_url(&url, &dir))
    {
        Ok(source) => Some(Arc::new(source) as Arc<dyn CiStatusSource>),
        Err(e) => {
            tracing::warn!(error = %e, "CI status unavailable");
            None
        }
    };

    let mut env = ReleaseEnv::new(config, Arc::new(git));
    if let Some(ci) = ci {
        env = env.with_ci(ci);
    }

    let workflow = release_workflow(&version, env);
    let mut ctx = Context::new(dir, version);
    let result = Runner::new(flags).run(&workflow, &mut ctx).await;

    if json {
        println!("{}", result.to_json()?);
    } else {
        for line in &result.output {
            println!("{}", line);
        }
        println!();
        print!("{}", result.summary());
    }
    Ok(result.success)
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so stdout carries only the report.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match parse_args(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("error: {}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };

    let outcome = match command {
        Command::Check { dir, json } => validate(dir, None, Vec::new(), json, Some(area::QA)).await,
        Command::Validate {
            dir,
            version,
            skip,
            json,
        } => validate(dir, version, skip, json, None).await,
        Command::Release {
            version,
            dir,
            flags,
            json,
        } => release(version, dir, flags, json).await,
    };

    match outcome {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    }
}
