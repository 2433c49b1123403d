use std::sync::Arc;

use anyhow::Context;
use futures::StreamExt;

use deepsearch::cli::output::Output;
use deepsearch::cli::{Cli, Commands};
use deepsearch::research::{AgentLoop, AnnotationSink, RunOptions, RunTrace};
use deepsearch::types::{Annotation, Message};
use deepsearch::utils::logging::init_tracing;
use deepsearch::{CacheStore, DeepSearchConfig, MemoryCacheStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    let config = match DeepSearchConfig::load_or_default(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            output.error(&format!("Invalid configuration in {}", cli.config.display()));
            output.hint("deepsearch.example.toml lists every supported key with its default");
            return Err(e.into());
        }
    };
    init_tracing(&config.logging, cli.verbose);

    match cli.command {
        Commands::Config { validate } => {
            if !cli.config.exists() {
                output.info(&format!(
                    "No config file at {}, showing defaults",
                    cli.config.display()
                ));
            }
            show_config(&config, validate, &output)
        }
        Commands::Ask {
            question,
            step_budget,
        } => {
            let mut config = config;
            if let Some(budget) = step_budget {
                config.research.step_budget = budget;
                config.validate()?;
            }
            ask(&config, question.join(" "), &output, cli.verbose).await
        }
    }
}

fn show_config(config: &DeepSearchConfig, validate: bool, output: &Output) -> anyhow::Result<()> {
    if validate {
        // load_or_default has already validated it
        output.success("Configuration is valid");
    }

    output.header("Resolved configuration");
    let rendered = toml::to_string_pretty(config).context("Failed to render configuration")?;
    println!("{}", rendered);
    Ok(())
}

async fn ask(
    config: &DeepSearchConfig,
    question: String,
    output: &Output,
    verbose: bool,
) -> anyhow::Result<()> {
    if verbose {
        output.banner();
        output.kv("provider", &format!("{:?}", config.llm.provider));
        output.kv("model", &config.llm.model);
        output.kv("step budget", &config.research.step_budget.to_string());
    }

    let store: Arc<dyn CacheStore> = Arc::new(MemoryCacheStore::new(config.cache.store_config()));
    let agent = AgentLoop::from_config(config, store)
        .await
        .context("Failed to set up the research agent")?;

    let (sink, mut annotations) = AnnotationSink::channel();
    let budget = agent.step_budget();
    let printer_output = Output {
        colored: output.colored,
    };
    let printer = tokio::spawn(async move {
        let mut step = 0;
        while let Some(annotation) = annotations.recv().await {
            if matches!(annotation, Annotation::NewAction { .. }) {
                step += 1;
            }
            printer_output.annotation(step, budget, &annotation);
        }
    });

    let options = RunOptions::new()
        .with_annotations(sink)
        .with_trace(RunTrace::new(None));
    let result = agent.run(vec![Message::user(question)], options).await;

    // The sink is dropped once run returns, which ends the printer
    printer.await.ok();

    let mut answer = match result {
        Ok(answer) => answer,
        Err(e) => {
            output.error("Research failed");
            return Err(e.into());
        }
    };

    if answer.is_final() {
        output.warning("Step budget exhausted, answering with the evidence gathered so far");
    }
    output.header("Answer");
    output.newline();

    while let Some(chunk) = answer.next().await {
        let chunk = chunk.context("Answer stream failed")?;
        output.answer_chunk(&chunk)?;
    }
    output.newline();

    Ok(())
}
