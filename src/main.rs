use anyhow::{anyhow, Result};
use bbblog::blog::{load_renderer, parse_date_arg, Blog};
use bbblog::config::Config;
use bbblog::format::Formatter;
use bbblog::html;
use chrono::{Local, NaiveDate};
use clap::{crate_version, App, AppSettings, Arg, ArgMatches, SubCommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

// Cards are printed at the depth they sit at in the index page.
const CARD_INDENT: &str = "      ";

fn app() -> App<'static, 'static> {
    App::new("bbblog")
        .version(crate_version!())
        .about("Manages a hand-written HTML blog")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("config")
                .long("config")
                .value_name("FILE")
                .takes_value(true)
                .help("Uses FILE instead of searching for bbblog.yaml"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Logs what each command does"),
        )
        .subcommand(
            SubCommand::with_name("mkindex")
                .about("Prints the index card for an article")
                .arg(Arg::with_name("path").required(true))
                .arg(
                    Arg::with_name("insert")
                        .long("insert")
                        .help("Inserts the card into the index page instead"),
                ),
        )
        .subcommand(
            SubCommand::with_name("mkarticle")
                .about("Creates an empty article dated today")
                .arg(Arg::with_name("title").required(true).multiple(true)),
        )
        .subcommand(
            SubCommand::with_name("changedate")
                .about("Changes an article's publish date (default: today)")
                .arg(Arg::with_name("path").required(true))
                .arg(Arg::with_name("date")),
        )
        .subcommand(
            SubCommand::with_name("randomizeheader")
                .about("Gives each page a randomly chosen header style")
                .arg(Arg::with_name("paths").required(true).multiple(true)),
        )
        .subcommand(
            SubCommand::with_name("mkrss")
                .about("Regenerates the Atom feed")
                .arg(
                    Arg::with_name("max-entries")
                        .long("max-entries")
                        .value_name("N")
                        .takes_value(true),
                ),
        )
}

fn init_tracing(verbose: bool) {
    let env_filter = std::env::var("RUST_LOG")
        .ok()
        .unwrap_or_else(|| String::from(if verbose { "debug" } else { "warn" }));

    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::new(env_filter))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    if subscriber.try_init().is_err() {
        tracing::warn!("tracing subscriber already initialised");
    }
}

fn main() {
    let matches = app().get_matches();
    init_tracing(matches.is_present("verbose"));
    if let Err(e) = run(&matches) {
        eprintln!("Error: {:?}", e);
        std::process::exit(1);
    }
}

fn run(matches: &ArgMatches) -> Result<()> {
    let config = Config::load(matches.value_of_os("config").map(Path::new))?;
    let renderer = load_renderer(&config)?;
    let formatter = Formatter::new(config.formatter.clone());
    let blog = Blog::new(config, renderer, formatter);

    match matches.subcommand() {
        ("mkindex", Some(m)) => {
            let path = path_arg(m, "path")?;
            if m.is_present("insert") {
                let index = blog.insert_card(&path)?;
                println!("{}", index.display());
            } else {
                print!("{}", indented_card(&blog.mkindex(&path)?));
            }
        }
        ("mkarticle", Some(m)) => {
            let title = m
                .values_of("title")
                .map(|words| words.collect::<Vec<_>>().join(" "))
                .unwrap_or_default();
            let path = blog.mkarticle(&title, today(), &mut rand::thread_rng())?;
            println!("{}", path.display());
        }
        ("changedate", Some(m)) => {
            let path = path_arg(m, "path")?;
            let date = match m.value_of("date") {
                Some(date) => parse_date_arg(date)?,
                None => today(),
            };
            let path = blog.changedate(&path, date)?;
            println!("{}", path.display());
        }
        ("randomizeheader", Some(m)) => {
            let paths: Vec<PathBuf> = m
                .values_of_os("paths")
                .map(|paths| paths.map(PathBuf::from).collect())
                .unwrap_or_default();
            for (path, variant) in blog.randomize_header(&paths, &mut rand::thread_rng())? {
                println!("{}: {}", path.display(), variant);
            }
        }
        ("mkrss", Some(m)) => {
            let max_entries = match m.value_of("max-entries") {
                Some(n) => Some(
                    n.parse::<usize>()
                        .map_err(|e| anyhow!("Invalid --max-entries `{}`: {}", n, e))?,
                ),
                None => None,
            };
            let path = blog.mkrss(max_entries)?;
            println!("{}", path.display());
        }
        (name, _) => return Err(anyhow!("Unknown command `{}`", name)),
    }
    Ok(())
}

fn path_arg(matches: &ArgMatches, name: &str) -> Result<PathBuf> {
    matches
        .value_of_os(name)
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("Missing argument `{}`", name))
}

// `html::indent` drops the trailing newline; the printed card ends with one.
fn indented_card(card: &str) -> String {
    format!("{}\n", html::indent(card.trim_end(), CARD_INDENT))
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}
