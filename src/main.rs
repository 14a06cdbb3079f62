//! RANALONE CLI - scheduled jobs and triggers for a forum run by five AI agents.

use clap::Parser;
use ranalone::cli::{AgentCommands, Cli, Commands, ConfigCommands, PostCommands, RelationshipCommands};
use ranalone::commands::{self, Output};
use ranalone::config::{ConfigOverrides, GeneratorKind, resolve_config};
use ranalone::logging;
use std::process;

fn main() {
    let cli = Cli::parse();
    let human = cli.human_readable;

    if let Err(e) = run(cli) {
        if human {
            eprintln!("Error: {}", e);
        } else {
            eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
        }
        process::exit(1);
    }
}

fn overrides_from(cli: &Cli) -> Result<ConfigOverrides, ranalone::Error> {
    let mut overrides = ConfigOverrides::new();
    if let Some(dir) = &cli.data_dir {
        overrides = overrides.with_data_dir(dir);
    }
    if let Some(path) = &cli.config {
        overrides = overrides.with_config_path(path);
    }
    if let Some(raw) = &cli.generator {
        let generator = GeneratorKind::parse(raw).ok_or_else(|| {
            ranalone::Error::InvalidInput(format!(
                "unknown generator '{}', expected gemini or canned",
                raw
            ))
        })?;
        overrides = overrides.with_generator(generator);
    }
    Ok(overrides)
}

fn run(cli: Cli) -> Result<(), ranalone::Error> {
    let human = cli.human_readable;
    let config = resolve_config(&overrides_from(&cli)?)?;

    // Only the daemon writes a log file.
    let log_dir = match cli.command {
        Commands::Daemon { .. } => config.log_dir(),
        _ => None,
    };
    let _guard = logging::init(config.log_format(), log_dir)?;

    let data_dir = config.data_dir();
    match cli.command {
        Commands::Init => output(&commands::init(data_dir)?, human),
        Commands::Run { job, seed } => {
            let generator = commands::build_generator(&config)?;
            output(&commands::run(data_dir, generator.as_ref(), &job, seed)?, human)
        }
        Commands::Events { max, seed } => {
            let generator = commands::build_generator(&config)?;
            output(&commands::events(data_dir, generator.as_ref(), max, seed)?, human)
        }
        Commands::Daemon { seed } => {
            let generator = commands::build_generator(&config)?;
            output(&commands::daemon(data_dir, generator.as_ref(), seed)?, human)
        }
        Commands::Status => output(&commands::status(data_dir)?, human),
        Commands::Agent { command } => match command {
            AgentCommands::List => output(&commands::agent_list(data_dir)?, human),
            AgentCommands::Show { id } => output(&commands::agent_show(data_dir, &id)?, human),
        },
        Commands::Relationship { command } => match command {
            RelationshipCommands::Adjust {
                subject,
                object,
                direction,
            } => output(
                &commands::relationship_adjust(data_dir, &subject, &object, &direction)?,
                human,
            ),
        },
        Commands::Post { command } => match command {
            PostCommands::Create {
                author,
                subforum,
                title,
                content,
            } => output(
                &commands::post_create(data_dir, &author, &subforum, &title, &content)?,
                human,
            ),
        },
        Commands::Config { command } => match command {
            ConfigCommands::Show => output(&commands::config_show(&config), human),
        },
    }

    Ok(())
}

/// Print output in JSON or human-readable format.
fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}
