//! lmstudio-terminal binary entry point

use std::{
    io::{self, Write},
    path::Path,
    sync::Arc,
};

use clap::CommandFactory;
use color_eyre::Result;
use lmstudio_terminal::{
    cli::{Cli, Commands},
    history::ChatHistory,
    services::openai::HttpClientFactory,
    ConfigOverrides, LmStudioService, ServiceEvent,
};
use tokio::{
    io::{stdin, AsyncBufReadExt, BufReader},
    sync::broadcast,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Install error handler
    color_eyre::install()?;

    // .env never overrides variables already set in the process
    dotenv::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("lmstudio_terminal=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let env = ConfigOverrides::from_env();
    let file = ConfigOverrides::load_file_or_default(&cli.config_path());
    let mut service =
        LmStudioService::with_factory(&cli.overrides(), &env, &file, Arc::new(HttpClientFactory));

    // Handle commands
    match cli.command {
        Some(Commands::Ask {
            prompt,
            context,
            stream,
        }) => {
            let result = ask(&mut service, &prompt, context.as_deref(), stream).await;
            service.disconnect();
            result?;
        }
        Some(Commands::Chat { history }) => {
            let path = history.unwrap_or_else(ChatHistory::default_path);
            let result = chat(&mut service, &path).await;
            service.disconnect();
            result?;
        }
        Some(Commands::Models) => {
            let result = models(&mut service).await;
            service.disconnect();
            result?;
        }
        Some(Commands::Config) => {
            println!("{}", serde_json::to_string_pretty(service.config())?);
        }
        Some(Commands::Version) => {
            println!("lmstudio-terminal version {}", env!("CARGO_PKG_VERSION"));
        }
        None => {
            Cli::command().print_help()?;
        }
    }

    Ok(())
}

async fn ask(
    service: &mut LmStudioService,
    prompt: &str,
    context: Option<&str>,
    stream: bool,
) -> Result<()> {
    let mut events = service.subscribe();
    service.connect().await?;
    log_events(&mut events);

    if stream {
        let mut stdout = io::stdout();
        service
            .get_streaming_completion(
                prompt,
                |token| {
                    // Best effort: a closed stdout should not abort generation
                    let _ = write!(stdout, "{token}");
                    let _ = stdout.flush();
                },
                context,
            )
            .await?;
        println!();
    } else {
        let reply = service.get_completion(prompt, context).await?;
        println!("{reply}");
    }

    Ok(())
}

async fn chat(service: &mut LmStudioService, path: &Path) -> Result<()> {
    let mut events = service.subscribe();
    service.connect().await?;
    log_events(&mut events);

    let mut history = ChatHistory::load(path);
    if !history.is_empty() {
        eprintln!("Loaded {} context entries from {}", history.len(), path.display());
    }
    eprintln!("Type `clear` to reset the context, `exit` to quit");

    let mut lines = BufReader::new(stdin()).lines();
    loop {
        eprint!("> ");
        io::stderr().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        match input.to_lowercase().as_str() {
            "" => continue,
            "exit" | "quit" => break,
            "clear" => {
                history.clear();
                save_history(&mut history, path);
                eprintln!("Context cleared");
                continue;
            }
            _ => {}
        }

        let context = history.context();
        let mut reply = String::new();
        let mut stdout = io::stdout();
        let result = service
            .get_streaming_completion(
                input,
                |token| {
                    reply.push_str(token);
                    let _ = write!(stdout, "{token}");
                    let _ = stdout.flush();
                },
                context.as_deref(),
            )
            .await;
        println!();

        // A failed turn is reported and left out of the context
        match result {
            Ok(()) => {
                history.record(input, &reply);
                save_history(&mut history, path);
            }
            Err(e) => eprintln!("Error: {e}"),
        }
    }

    Ok(())
}

fn save_history(history: &mut ChatHistory, path: &Path) {
    if let Err(e) = history.save(path) {
        warn!(path = %path.display(), error = %e, "failed to save chat context");
    }
}

async fn models(service: &mut LmStudioService) -> Result<()> {
    let mut events = service.subscribe();
    service.connect().await?;
    log_events(&mut events);

    let active = service.active_model().map(|model| model.id.clone());
    for model in service.list_models().await? {
        let marker = if Some(&model.id) == active.as_ref() { '*' } else { ' ' };
        println!("{marker} {}", model.id);
    }

    Ok(())
}

fn log_events(events: &mut broadcast::Receiver<ServiceEvent>) {
    while let Ok(event) = events.try_recv() {
        match event {
            ServiceEvent::Connected(model) => info!(%model, "connected to LM Studio"),
            ServiceEvent::Disconnected => info!("disconnected from LM Studio"),
            ServiceEvent::Error(e) => warn!(error = %e, "LM Studio error"),
        }
    }
}
