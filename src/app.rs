use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task;

use crate::cli::args::CliArgs;
use crate::cli::validation;
use crate::config;
use crate::output::{self, OutputFormat};
use crate::probe::{Outcome, ProbeResult};
use crate::runner::{Mode, Options, Runner, WordlistSource};
use crate::scanner::CancelFlag;

fn print_banner() {
    const BANNER: &str = r#"
               __
 _      ____  / /_  ___  ____  __  ______ ___
| | /| / / _ \/ __ \/ _ \/ __ \/ / / / __ `__ \
| |/ |/ /  __/ /_/ /  __/ / / / /_/ / / / / / /
|__/|__/\___/_.___/\___/_/ /_/\__,_/_/ /_/ /_/

       bruteforce HTTP URIs and subdomains
    "#;
    print!("{}", BANNER);
    println!();
}

fn format_kv_line(label: &str, value: &str) {
    println!(":: {:<10}: {}", label, value);
}

fn bailout(json_mode: bool, msg: &str) -> i32 {
    if json_mode {
        println!("{}", json!({ "error": msg }));
    } else {
        eprintln!("{} {}", "Error:".bold().red(), msg);
    }
    1
}

fn print_hit(pb: &ProgressBar, result: &ProbeResult, mode: Mode) {
    match mode {
        Mode::HttpPath => {
            let status = result.status.unwrap_or_default();
            let status_str = status.to_string();
            let status_colored = match status {
                200..=299 => status_str.bold().green(),
                300..=399 => status_str.bold().blue(),
                400..=499 => status_str.bold().yellow(),
                _ => status_str.bold().red(),
            };
            pb.println(format!(
                "{}{}{} {}",
                "[".bold().white(),
                status_colored,
                "]".bold().white(),
                result.target.bold().blue(),
            ));
        }
        Mode::DnsSubdomain => {
            pb.println(format!(
                "{} {} {:?}",
                result.target.bold().blue(),
                ">".bold().white(),
                result.addrs,
            ));
        }
    }
}

/// Binary entry: parse flags, merge the config file underneath them, run the
/// scan with Ctrl-C wired to graceful cancellation, and render the results.
/// Returns the process exit code.
pub async fn run() -> i32 {
    let args = CliArgs::parse();
    let json_mode = args.json;

    if let Err(msg) = validation::validate(&args) {
        return bailout(json_mode, &msg);
    }

    let (config_path, allow_missing) = match args.config.as_deref() {
        Some(path) => (Some(config::expand_tilde(path)), false),
        None => (config::default_config_path(), true),
    };
    let file = match config_path {
        Some(path) => match config::load_config(&path, allow_missing) {
            Ok(file) => file,
            Err(msg) => return bailout(json_mode, &msg),
        },
        None => config::ConfigFile::default(),
    };
    let json_mode = json_mode || file.json.unwrap_or(false);

    let mode = match validation::detect_mode(&args.path) {
        Ok(mode) => mode,
        Err(msg) => return bailout(json_mode, &msg),
    };

    let defaults = Options::default();
    let miss_status = match args
        .miss_status
        .as_deref()
        .or(file.miss_status.as_deref())
    {
        Some(raw) => match crate::utils::parse_u16_set_csv(raw) {
            Ok(set) => set,
            Err(e) => return bailout(json_mode, &format!("invalid miss_status '{raw}': {e}")),
        },
        None => defaults.miss_status.clone(),
    };

    let options = Options {
        target: args.path.trim().to_string(),
        mode,
        wordlist: WordlistSource::FilePath(args.wordlist.clone()),
        max_depth: args.depth.or(file.depth).unwrap_or(defaults.max_depth),
        threads: args.threads.or(file.threads).unwrap_or(defaults.threads),
        trailing_slash: args.trailing_slash || file.trailing_slash.unwrap_or(false),
        proxy: args.proxy.clone().or(file.proxy.clone()),
        miss_status,
        rate: args.rate.or(file.rate).unwrap_or(defaults.rate),
        timeout_seconds: args
            .timeout
            .or(file.timeout)
            .unwrap_or(defaults.timeout_seconds),
        retries: args.retries.or(file.retries).unwrap_or(defaults.retries),
        backoff_ms: defaults.backoff_ms,
    };
    let output_path = args.output.clone().or(file.output.clone());

    let runner = match Runner::new(options) {
        Ok(runner) => runner,
        Err(e) => return bailout(json_mode, &e.to_string()),
    };

    if !json_mode {
        print_banner();
        let options = runner.options();
        format_kv_line("target", &options.target);
        format_kv_line(
            "mode",
            match mode {
                Mode::HttpPath => "uri bruteforce",
                Mode::DnsSubdomain => "subdomain bruteforce",
            },
        );
        format_kv_line("wordlist", &args.wordlist);
        format_kv_line("threads", &options.threads.to_string());
        format_kv_line("depth", &options.max_depth.to_string());
        format_kv_line("rate", &options.rate.to_string());
        if mode == Mode::DnsSubdomain && options.proxy.is_some() {
            println!(
                "{} {}",
                "[WRN]".bold().yellow(),
                "proxy is ignored for subdomain scans".bold().white()
            );
        }
        println!();
    }

    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        task::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let pb = if json_mode {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} {pos} probed {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    };

    let (event_tx, mut event_rx) = mpsc::channel::<ProbeResult>(1024);
    let printer = task::spawn({
        let pb = pb.clone();
        async move {
            while let Some(result) = event_rx.recv().await {
                pb.inc(1);
                match result.outcome {
                    Outcome::Hit => print_hit(&pb, &result, mode),
                    Outcome::Error => pb.println(format!(
                        "{} {} {}",
                        "[err]".bold().red(),
                        result.target.white(),
                        result.error.as_deref().unwrap_or("transport failure"),
                    )),
                    Outcome::Miss => {}
                }
            }
        }
    });

    let scan = match runner.run(cancel.clone(), event_tx).await {
        Ok(scan) => scan,
        Err(e) => {
            pb.finish_and_clear();
            return bailout(json_mode, &e.to_string());
        }
    };
    let _ = printer.await;
    pb.finish_and_clear();

    if !json_mode && !scan.wildcard.is_empty() {
        println!(
            "{} {} {:?}",
            format!("*.{}", runner.options().target).bold().blue(),
            ">".bold().white(),
            scan.wildcard,
        );
    }
    if !json_mode && cancel.is_cancelled() {
        println!(
            "{} {}",
            "[WRN]".bold().yellow(),
            "scan interrupted, results are partial".bold().white()
        );
    }

    let format = if json_mode {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };
    let rendered = match format {
        OutputFormat::Json => output::render_json(&scan, mode),
        OutputFormat::Text => output::render_text(&scan),
    };

    match output_path.as_deref().filter(|p| !p.trim().is_empty()) {
        Some(path) => {
            if let Err(e) = output::save(path, &rendered).await {
                return bailout(json_mode, &format!("failed to write output '{path}': {e}"));
            }
        }
        None => {
            print!("{}", String::from_utf8_lossy(&rendered));
            if format == OutputFormat::Json {
                println!();
            }
        }
    }

    0
}
