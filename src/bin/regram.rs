//! Command-line interface for regram
//!
//! Usage:
//!   regram parse `<grammar>` `<input>` [--format `<format>`] [--max-depth `<n>`]  - Print the parse tree of a file
//!   regram regex `<grammar>` `<rule>` [--direct]                               - Print the compiled pattern of a rule
//!   regram check `<grammar>`                                                  - Compile a grammar and report problems
//!   regram rules `<grammar>`                                                  - List rules in canonical form
//!   regram list-formats                                                     - List available output formats
//!
//! Every command accepts `--config <file>` (TOML layered over the built-in
//! defaults) and `-v` (repeatable) to raise log verbosity.

use clap::{Arg, ArgAction, ArgMatches, Command};
use log::{debug, LevelFilter};
use regram::regram::config::{Loader, RegramConfig};
use regram::regram::dsl::parse_grammar;
use regram::regram::processor::{
    compile_grammar, process_files, read_source, rule_regex, ProcessOptions, ProcessingError,
};

fn main() {
    let matches = Command::new("regram")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Compile grammar descriptions to regular expressions and parse text with them")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("Configuration file layered over the defaults")
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Increase log verbosity (-v info, -vv debug, -vvv trace)")
                .action(ArgAction::Count)
                .global(true),
        )
        .subcommand(
            Command::new("parse")
                .about("Parse a file and print its parse tree")
                .arg(
                    Arg::new("grammar")
                        .help("Path to the grammar file")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("input")
                        .help("Path to the file to parse")
                        .required(true)
                        .index(2),
                )
                .arg(
                    Arg::new("format")
                        .long("format")
                        .short('f')
                        .help("Output format (see list-formats)"),
                )
                .arg(
                    Arg::new("max-depth")
                        .long("max-depth")
                        .help("Maximum descent depth of the tree builder")
                        .value_parser(clap::value_parser!(u32)),
                ),
        )
        .subcommand(
            Command::new("regex")
                .about("Print the compiled regular expression of a rule")
                .arg(
                    Arg::new("grammar")
                        .help("Path to the grammar file")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("rule")
                        .help("Name of the rule")
                        .required(true)
                        .index(2),
                )
                .arg(
                    Arg::new("direct")
                        .long("direct")
                        .help("Print the direct-group pattern instead")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("check")
                .about("Compile a grammar and report the first problem")
                .arg(
                    Arg::new("grammar")
                        .help("Path to the grammar file")
                        .required(true)
                        .index(1),
                ),
        )
        .subcommand(
            Command::new("rules")
                .about("List the rules of a grammar in canonical form")
                .arg(
                    Arg::new("grammar")
                        .help("Path to the grammar file")
                        .required(true)
                        .index(1),
                ),
        )
        .subcommand(Command::new("list-formats").about("List available output formats"))
        .get_matches();

    if let Err(e) = run(&matches) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(matches: &ArgMatches) -> Result<(), ProcessingError> {
    let Some((name, sub_matches)) = matches.subcommand() else {
        unreachable!()
    };

    let config = load_config(sub_matches)?;
    init_logging(sub_matches.get_count("verbose"), &config);
    debug!("running '{name}' with {config:?}");

    match name {
        "parse" => {
            let grammar = required(sub_matches, "grammar");
            let input = required(sub_matches, "input");
            handle_parse_command(grammar, input, &config)
        }
        "regex" => {
            let grammar = required(sub_matches, "grammar");
            let rule = required(sub_matches, "rule");
            handle_regex_command(grammar, rule, sub_matches.get_flag("direct"))
        }
        "check" => handle_check_command(required(sub_matches, "grammar")),
        "rules" => handle_rules_command(required(sub_matches, "grammar")),
        "list-formats" => {
            handle_list_formats_command(&config);
            Ok(())
        }
        _ => unreachable!(),
    }
}

/// Positional arguments are declared `required`, so clap guarantees them.
fn required<'a>(matches: &'a ArgMatches, id: &str) -> &'a str {
    matches
        .get_one::<String>(id)
        .map(String::as_str)
        .unwrap_or_default()
}

/// Defaults, then `--config`, then per-command flag overrides.
fn load_config(matches: &ArgMatches) -> Result<RegramConfig, ProcessingError> {
    let mut loader = Loader::new();
    if let Some(path) = matches.get_one::<String>("config") {
        loader = loader.with_file(path);
    }
    if let Ok(Some(format)) = matches.try_get_one::<String>("format") {
        loader = loader.set_override("output.format", format.as_str())?;
    }
    if let Ok(Some(depth)) = matches.try_get_one::<u32>("max-depth") {
        loader = loader.set_override("parse.max_depth", i64::from(*depth))?;
    }
    Ok(loader.build()?)
}

fn init_logging(verbosity: u8, config: &RegramConfig) {
    let level = match verbosity {
        0 => config.log.level_filter().unwrap_or(LevelFilter::Warn),
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    // Only fails if a logger is already installed
    let _ = simplelog::TermLogger::init(
        level,
        simplelog::ConfigBuilder::new()
            .set_time_format_custom(&[])
            .build(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Never,
    );
}

fn handle_parse_command(
    grammar: &str,
    input: &str,
    config: &RegramConfig,
) -> Result<(), ProcessingError> {
    let options = ProcessOptions::from(config);
    let output = process_files(grammar, input, &options)?;
    if output.ends_with('\n') {
        print!("{}", output);
    } else {
        println!("{}", output);
    }
    Ok(())
}

fn handle_regex_command(grammar: &str, rule: &str, direct: bool) -> Result<(), ProcessingError> {
    let compiled = compile_grammar(&read_source(grammar)?)?;
    println!("{}", rule_regex(&compiled, rule, direct)?);
    Ok(())
}

fn handle_check_command(grammar: &str) -> Result<(), ProcessingError> {
    let compiled = compile_grammar(&read_source(grammar)?)?;
    println!(
        "OK: {} rules, start rule '{}'",
        compiled.rules().len(),
        compiled.start_rule().name
    );
    Ok(())
}

fn handle_rules_command(grammar: &str) -> Result<(), ProcessingError> {
    let parsed = parse_grammar(&read_source(grammar)?)?;
    for rule in parsed.rules() {
        println!("{}", rule);
    }
    Ok(())
}

fn handle_list_formats_command(config: &RegramConfig) {
    let registry = ProcessOptions::from(config).registry();
    println!("Available formats:\n");
    for (name, description) in registry.describe_formats() {
        println!("  {}", name);
        println!("    {}", description);
    }
}
