use clap::CommandFactory;
use colored::*;
use env_logger::{Builder, Env, Target};
use log::{debug, info};
use revgrep::output::{formatter_for, OutputFormatterTrait};
use revgrep::{file_filter, Cli, Commands, Config, Parser, Result as RevgrepResult, RevgrepError};
use std::fs;
use std::process;
use std::time::Instant;

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("{} {e}", "error:".red().bold());
        process::exit(2);
    }
}

fn run(cli: Cli) -> RevgrepResult<()> {
    setup_logging(&cli)?;

    match &cli.command {
        Commands::Search {
            query,
            rev,
            base,
            ignore_case,
            regex,
            limit,
            context,
            no_path,
            no_content,
            exclude,
            format,
        } => {
            let config = match &cli.config {
                Some(path) => Config::load_from(path)?,
                None => Config::load()?,
            };

            let mut options = config.search_options();
            options.base_revision = base.clone();
            if *ignore_case {
                options.case_sensitive = false;
            }
            if *regex {
                options.regex = true;
            }
            if let Some(limit) = limit {
                options.limit = *limit;
            }
            if let Some(context) = context {
                options.context_lines = *context;
            }
            options.search_path = !no_path;
            options.search_content = !no_content;
            if !exclude.is_empty() {
                let mut patterns = config.search.exclude.clone();
                patterns.extend(exclude.iter().cloned());
                options.file_filter = Some(file_filter(move |path| {
                    Ok(!patterns.iter().any(|pattern| path.contains(pattern.as_str())))
                }));
            }
            debug!("Search options: {:?}", options);

            let start_time = Instant::now();
            info!("Searching {} at {} for {:?}", cli.repo.display(), rev, query);
            let outcome = config.engine().search(&cli.repo, rev, query, &options)?;
            info!(
                "Search completed in {:.2?}: {} results, {} matches",
                start_time.elapsed(),
                outcome.results.len(),
                outcome.total_matches
            );

            print!("{}", formatter_for(*format).format(&outcome, query, rev));
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "revgrep", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn setup_logging(cli: &Cli) -> RevgrepResult<()> {
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let mut builder = Builder::from_env(Env::default().default_filter_or(default_level));

    builder.format(|buf, record| {
        use std::io::Write;
        writeln!(
            buf,
            "{} [{}] [{}] {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.module_path().unwrap_or("unknown"),
            record.args()
        )
    });

    if let Some(log_path) = &cli.log {
        if let Some(parent_dir) = log_path.parent() {
            if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
                fs::create_dir_all(parent_dir)?;
            }
        }
        let log_file = fs::File::create(log_path)?;
        builder.target(Target::Pipe(Box::new(log_file)));
    } else {
        builder.target(Target::Stderr);
    }

    builder
        .try_init()
        .map_err(|e| RevgrepError::Config(format!("failed to initialise logging: {e}")))?;
    Ok(())
}
