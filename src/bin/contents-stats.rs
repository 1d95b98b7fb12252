use std::env;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::anyhow;
use anyhow::Context;
use anyhow::Error;
use clap::{command, value_parser, Arg, ArgAction};
use contents_stats::fetch::HttpFetcher;
use contents_stats::rank;
use contents_stats::rank::Limit;
use contents_stats::rank::Order;
use contents_stats::system::System;
use contents_stats::system::DEFAULT_MIRROR;
use contents_stats::system::DEFAULT_RETRIES;
use contents_stats::system::DEFAULT_TIMEOUT;
use log::info;

fn main() -> Result<(), Error> {
    let matches = command!()
        .about(concat!(
            "Shows which packages own the most files, by parsing a Contents indice",
            " (https://wiki.debian.org/RepositoryFormat#A.22Contents.22_indices)",
            " from a Debian mirror, for the given architecture."
        ))
        .arg(
            Arg::new("arch")
                .required(true)
                .value_name("ARCH")
                .help("architecture of the contents indice to parse, e.g. 'amd64'"),
        )
        .arg(
            Arg::new("mirror-url")
                .long("mirror-url")
                .alias("mirror_url")
                .short('m')
                .value_name("URL")
                .default_value(DEFAULT_MIRROR)
                .help("repository component to list the contents indices of"),
        )
        .arg(
            Arg::new("count")
                .long("count")
                .short('c')
                .value_name("N")
                .default_value("10")
                .allow_negative_numbers(true)
                .value_parser(value_parser!(i64))
                .help("number of packages to list; -1 lists all"),
        )
        .arg(
            Arg::new("ascending")
                .long("ascending")
                .short('a')
                .action(ArgAction::SetTrue)
                .help("sort by number of files in ascending order"),
        )
        .arg(
            Arg::new("output-dir")
                .long("output-dir")
                .short('o')
                .value_name("DIRECTORY")
                .value_parser(value_parser!(PathBuf))
                .help("where to store downloaded indices (default: current directory)"),
        )
        .arg(
            Arg::new("reuse-if-exists")
                .long("reuse-if-exists")
                .short('r')
                .action(ArgAction::SetTrue)
                .help("reuse an indice already downloaded into the output directory"),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_name("SECONDS")
                .value_parser(value_parser!(u64))
                .help("per-request timeout (default: 60)"),
        )
        .arg(
            Arg::new("retries")
                .long("retries")
                .value_name("N")
                .value_parser(value_parser!(u32))
                .help("retries for timeouts, connection failures and 5xx responses (default: 2)"),
        )
        .arg(
            Arg::new("jobs")
                .long("jobs")
                .short('j')
                .value_name("N")
                .default_value("1")
                .value_parser(value_parser!(usize))
                .help("indices to download in parallel"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .action(ArgAction::Count)
                .help("more logging; repeat for even more"),
        )
        .get_matches();

    let level = match matches.get_count("verbose") {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let output_dir = match matches.get_one::<PathBuf>("output-dir") {
        Some(dir) => dir.to_path_buf(),
        None => env::current_dir().with_context(|| anyhow!("finding current directory"))?,
    };
    fs::create_dir_all(&output_dir)
        .with_context(|| anyhow!("creating output directory: {:?}", output_dir))?;

    let timeout = matches
        .get_one::<u64>("timeout")
        .map(|secs| Duration::from_secs(*secs))
        .unwrap_or(DEFAULT_TIMEOUT);
    let retries = matches
        .get_one::<u32>("retries")
        .copied()
        .unwrap_or(DEFAULT_RETRIES);
    let fetcher = HttpFetcher::new(timeout, retries)?;

    let mirror = matches.get_one::<String>("mirror-url").unwrap();
    let mut system = System::with_fetcher(mirror, &output_dir, Box::new(fetcher))?;
    system.set_reuse_if_exists(matches.get_flag("reuse-if-exists"));
    system.set_jobs(*matches.get_one::<usize>("jobs").unwrap());

    let order = if matches.get_flag("ascending") {
        Order::Ascending
    } else {
        Order::Descending
    };
    let limit = Limit::from(*matches.get_one::<i64>("count").unwrap());

    let arch = matches.get_one::<String>("arch").unwrap();
    let stats = system.stats(arch, order, limit)?;

    rank::write_report(io::stdout().lock(), &stats.entries)
        .with_context(|| anyhow!("writing report"))?;

    info!(
        "{} packages, {} lines parsed, {} skipped",
        stats.packages, stats.parse.lines, stats.parse.skipped
    );

    Ok(())
}
