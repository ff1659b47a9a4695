mod cli;

use anyhow::Context;
use eztf::config::Document;

fn main() {
    use clap::Parser;
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("EZTF_LOG"))
        .with_writer(std::io::stderr)
        .init();

    for new_path in cli.directory.iter() {
        match new_path.canonicalize() {
            Err(e) => {
                eprintln!(
                    "Failed to resolve path for -C/--directory {}\n{}",
                    new_path.display(),
                    e
                );
                std::process::exit(1);
            }
            Ok(cwd) => {
                if let Err(err) = std::env::set_current_dir(&cwd) {
                    eprintln!("Failed to set work directory to {}\n{}", cwd.display(), err,);
                    std::process::exit(1);
                }

                tracing::info!(directory=%cwd.display(), "Changed working directory");
            }
        }
    }

    let command_result = match cli.command {
        cli::Command::Generate(generate_cli) => generate(generate_cli),
        cli::Command::Stacks(stacks_cli) => stacks(stacks_cli),
        cli::Command::Dev(dev_cli) => dev(dev_cli),
    };

    if let Err(e) = command_result {
        for error in e.chain() {
            eprintln!("{error}")
        }
        std::process::exit(1);
    }
}

fn load(config: &cli::ConfigArgs) -> anyhow::Result<Document> {
    Document::load_file(&config.config)
        .with_context(|| format!("Failed to load config {}", config.config.display()))
}

pub fn generate(cli: cli::GenerateCommand) -> anyhow::Result<()> {
    let document = load(&cli.config)?;
    let generation = eztf::generate::generate(&document, &cli.stacks)?;

    for stack in &generation.stacks {
        if !stack.dangling.is_empty() {
            eprintln!(
                "{}: {} reference(s) to blocks that are not generated",
                stack.name,
                stack.dangling.len()
            );
        }
    }

    let repo = eztf::output::write_repo(&generation, &cli.output)?;
    println!("{}", repo.display());

    if cli.write_back {
        let is_json = cli
            .config
            .config
            .extension()
            .is_some_and(|extension| extension.eq_ignore_ascii_case("json"));
        anyhow::ensure!(!is_json, "--write-back only supports yaml configs");

        std::fs::write(&cli.config.config, generation.document.to_yaml_string()?)
            .with_context(|| format!("Failed to update {}", cli.config.config.display()))?;
        tracing::info!(path=%cli.config.config.display(), "updated config");
    }

    Ok(())
}

pub fn stacks(cli: cli::StacksCommand) -> anyhow::Result<()> {
    let document = load(&cli.config)?;
    let domain = document
        .domain()
        .context("`variable.domain` is required to name the stacks")?;

    for sub_stack in eztf::generate::terraform_stacks(&document) {
        println!(
            "{sub_stack}\t{}",
            eztf::generate::stack_name(&domain, &sub_stack)
        );
    }
    Ok(())
}

/// (eztf-)developer utilities
///
/// A quick way to expose internal structures for debugging purposes
pub fn dev(cli: cli::DevCommand) -> anyhow::Result<()> {
    use cli::DevSubCommand::*;

    let document = load(&cli.config)?;
    let generated = eztf::generate::generate_stack(&document, &cli.stack)?;

    match cli.command {
        Registry => println!("{:#?}", generated.stack.registry),
        Sections => {
            for (file_name, content) in &generated.files {
                println!("# {file_name}\n{content}");
            }
        }
    }

    Ok(())
}
