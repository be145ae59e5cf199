use std::io::Write;
use std::process;
use std::sync::Arc;

use readme_pilot::continuation::{CancelFlag, ContinuationStreamer};
use readme_pilot::github::{self, GithubClient};
use readme_pilot::keys::KeyStore;
use readme_pilot::llms::gemini::GeminiClient;
use readme_pilot::prompt;
use readme_pilot::reconcile;
use readme_pilot::settings::Settings;

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return;
    }

    let mut settings = Settings::load();
    let mut repo_input: Option<String> = None;
    let mut to_stdout = false;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--output" | "-o" if i + 1 < args.len() => {
                settings.output = args[i + 1].clone();
                i += 2;
            }
            "--model" if i + 1 < args.len() => {
                settings.model = args[i + 1].clone();
                i += 2;
            }
            "--max-passes" if i + 1 < args.len() => {
                settings.max_passes = match args[i + 1].parse() {
                    Ok(n) if n >= 1 => n,
                    _ => {
                        eprintln!("--max-passes expects a positive integer");
                        process::exit(1);
                    }
                };
                i += 2;
            }
            "--stdout" => {
                to_stdout = true;
                i += 1;
            }
            arg if arg.starts_with('-') => {
                eprintln!("Unknown argument: {}", arg);
                process::exit(1);
            }
            arg => {
                if repo_input.is_some() {
                    eprintln!("Unexpected extra argument: {}", arg);
                    process::exit(1);
                }
                repo_input = Some(arg.to_string());
                i += 1;
            }
        }
    }

    let Some(repo_input) = repo_input else {
        print_usage();
        process::exit(1);
    };

    if let Err(err) = run(&repo_input, &settings, to_stdout) {
        eprintln!("{}", err);
        process::exit(1);
    }
}

fn run(repo_input: &str, settings: &Settings, to_stdout: bool) -> Result<(), String> {
    let keys = KeyStore::from_env();

    let id = github::parse_repo_url(repo_input).ok_or_else(|| {
        "Enter a valid GitHub URL like https://github.com/owner/repo or owner/repo".to_string()
    })?;

    eprintln!("Fetching snapshot of {}…", id.pretty());
    let gh = GithubClient::new(&keys);
    let snapshot = gh.fetch_snapshot(repo_input).map_err(|e| {
        if e.contains("403") {
            "GitHub API rate limit hit. Set GITHUB_TOKEN (classic, repo:read) to raise the limit."
                .to_string()
        } else {
            e
        }
    })?;
    eprintln!(
        "Snapshot ready: {} files on branch {}",
        snapshot.files.len(),
        snapshot.default_branch
    );

    let context = prompt::build_context(&snapshot);
    let initial_prompt = prompt::build_readme_prompt(&snapshot, &context);

    let client = Arc::new(GeminiClient::new(&keys).with_model(settings.model.clone()));
    let streamer = ContinuationStreamer::new(client)
        .with_max_passes(settings.max_passes)
        .with_tail_window(settings.tail_window);

    eprintln!("Generating README with {}…", settings.model);

    let cancel = CancelFlag::new();
    let mut document = String::new();

    for delta in streamer.stream(initial_prompt, cancel.clone()) {
        let delta = delta.map_err(|e| e.to_string())?;
        if to_stdout {
            print!("{}", delta);
            let _ = std::io::stdout().flush();
        }
        document.push_str(&delta);
        if cancel.is_cancelled() {
            break;
        }
    }

    let complete = reconcile::contains_end_mark(&document);

    if to_stdout {
        println!();
    } else {
        std::fs::write(&settings.output, &document)
            .map_err(|e| format!("Cannot write {}: {}", settings.output, e))?;
        eprintln!("Wrote {} ({} chars)", settings.output, document.chars().count());
    }

    if complete {
        eprintln!("README generated.");
    } else {
        eprintln!("Pass budget exhausted before the end marker; output may be incomplete.");
    }
    Ok(())
}

fn print_usage() {
    eprintln!("Usage: rpilot <github-repo-url> [--output PATH] [--model MODEL] [--max-passes N] [--stdout]");
    eprintln!();
    eprintln!("Generates a README.md for a public GitHub repository.");
    eprintln!("Requires GEMINI_API_KEY (environment or .env).");
    eprintln!("GITHUB_TOKEN is optional but avoids API rate limits.");
}
