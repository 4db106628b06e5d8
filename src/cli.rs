// command line interface

use crate::output::Output;
use crate::{AskOptions, LlmSettings, Provider, Server, Settings, StorageSettings};
use clap::{Parser, Subcommand};
use miette::Result;
use tracing::warn;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "smartql",
    about = "Answer credit questions directly or from the database"
)]
struct Cli {
    /// ai provider (openai, claude)
    #[arg(long, short = 'p', default_value = "openai", global = true)]
    provider: Provider,

    /// api key for the ai provider
    /// [env: OPENAI_API_KEY, or ANTHROPIC_API_KEY / CLAUDE_API_KEY for claude]
    #[arg(long, short = 'k', global = true)]
    api_key: Option<String>,

    /// model name (defaults to OPENAI_MODEL for openai, else the provider's)
    #[arg(long, short = 'm', global = true)]
    model: Option<String>,

    /// output budget for plain chat
    #[arg(long, env = "OPENAI_MAX_TOKENS", default_value = "150", global = true)]
    max_tokens: u32,

    /// sampling temperature for answers
    #[arg(long, env = "OPENAI_TEMPERATURE", default_value = "0.7", global = true)]
    temperature: f32,

    /// supabase project url
    #[arg(long, env = "SUPABASE_URL", default_value = "", global = true)]
    supabase_url: String,

    /// supabase api key
    #[arg(
        long,
        env = "SUPABASE_API_KEY",
        default_value = "",
        hide_env_values = true,
        global = true
    )]
    supabase_key: String,

    /// log as json lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// ask a question, using the database when it needs data
    Ask {
        question: String,

        /// print the full answer as json
        #[arg(long)]
        json: bool,

        /// print the query that was run
        #[arg(long)]
        show_sql: bool,
    },

    /// send a message straight to the model
    Chat { message: String },

    /// start as http server
    Serve {
        /// port number
        #[arg(long, short = 'P', env = "PORT", default_value = "3000")]
        port: u16,

        /// host to bind
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
    },
}

impl Cli {
    fn settings(&self) -> Settings {
        self.settings_from(|name| std::env::var(name).ok())
    }

    // each provider only reads its own env vars, a key never crosses providers
    fn settings_from(&self, env: impl Fn(&str) -> Option<String>) -> Settings {
        let (api_key, model) = match self.provider {
            Provider::OpenAI => (
                self.api_key.clone().or_else(|| env("OPENAI_API_KEY")),
                self.model.clone().or_else(|| env("OPENAI_MODEL")),
            ),
            Provider::Claude => (
                self.api_key
                    .clone()
                    .or_else(|| env("ANTHROPIC_API_KEY"))
                    .or_else(|| env("CLAUDE_API_KEY")),
                self.model.clone(),
            ),
        };

        Settings {
            llm: LlmSettings {
                provider: self.provider,
                api_key: api_key.unwrap_or_default(),
                model,
                max_tokens: self.max_tokens,
                temperature: self.temperature,
            },
            storage: StorageSettings {
                url: self.supabase_url.clone(),
                api_key: self.supabase_key.clone(),
            },
        }
    }
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    let settings = cli.settings();
    for warning in settings.warnings() {
        warn!("{warning}");
    }

    match cli.command {
        Commands::Serve { port, host } => Ok(Server::run(settings, &host, port).await?),

        Commands::Ask {
            question,
            json,
            show_sql,
        } => {
            let chat = settings.smart_chat();
            let answer = chat
                .answer_or_cancel(&question, &AskOptions::default(), ctrl_c())
                .await?;

            if json {
                Output::raw(&answer);
            } else {
                Output::pretty(&answer, show_sql);
            }
            Ok(())
        }

        Commands::Chat { message } => {
            let chat = settings.smart_chat();
            let completion = chat.chat(&message, &AskOptions::default()).await?;
            Output::chat(&completion);
            Ok(())
        }
    }
}

// resolves on ctrl-c; never resolves if the handler can't be installed
async fn ctrl_c() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout is for answers
    let result = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    if let Err(e) = result {
        eprintln!("logging disabled: {e}");
    }
}
