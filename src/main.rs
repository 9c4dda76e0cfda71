use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use folio_gateway::backend::{BackendCaller, GeminiClient, model_attempt_list};
use folio_gateway::client::{AiCaller, CallerConfig, ClientRateLimiter, FileHistoryStore};
use folio_gateway::config::{Args, BackendEnv, ClientArgs, Command, ServeArgs};
use folio_gateway::rate_limit::{RateLimiter, idle_sweeper};
use folio_gateway::state::AppState;
use folio_gateway::{chat, handlers, prompt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // logs go to stderr so chat output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let env = BackendEnv::from_env();

    match args.command {
        Command::Serve(serve_args) => serve(serve_args, env).await,
        Command::Ask(ask_args) => {
            let (caller, _) = build_caller(&ask_args.client, &env)?;
            println!("{}", caller.ask(&ask_args.prompt, ask_args.system.as_deref()).await);
            Ok(())
        }
        Command::Challenge(client_args) => {
            let (caller, _) = build_caller(&client_args, &env)?;
            let answer = caller
                .ask(prompt::CHALLENGE_PROMPT, Some(prompt::CHALLENGE_SYSTEM_INSTRUCTION))
                .await;
            println!("{answer}");
            Ok(())
        }
        Command::Chat(client_args) => {
            let (caller, greeting) = build_caller(&client_args, &env)?;
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let mut stdout = std::io::stdout();
            let transcript = chat::run(&caller, chat::Transcript::with_greeting(greeting), stdin, &mut stdout).await?;
            tracing::debug!(messages = transcript.len(), "chat ended");
            Ok(())
        }
    }
}

async fn serve(args: ServeArgs, env: BackendEnv) -> anyhow::Result<()> {
    let limiter = Arc::new(RateLimiter::in_memory(args.rate_limit()));
    let models = model_attempt_list(env.preferred_model.as_deref());

    let backend: Option<Arc<dyn BackendCaller>> = match env.api_key {
        Some(api_key) => Some(Arc::new(GeminiClient::new(
            reqwest::Client::new(),
            args.backend_url.clone(),
            api_key,
            Duration::from_secs(args.backend_timeout),
        ))),
        None => {
            tracing::warn!("no GEMINI_API_KEY configured, AI requests will fail with 500");
            None
        }
    };

    if let Some(every) = args.sweep_every() {
        tokio::spawn(idle_sweeper(limiter.clone(), every));
    }

    let state = Arc::new(AppState::new(limiter, backend, models.clone()));
    let app = handlers::router(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    let limits = args.rate_limit();
    tracing::info!(port = args.port, backend = %args.backend_url, ?models, "gateway listening");
    tracing::info!(
        min_interval_ms = limits.min_interval_ms,
        per_minute = limits.max_per_minute,
        per_day = limits.max_per_day,
        "rate limits"
    );

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("server failed")?;
    Ok(())
}

// Caller plus the greeting for a fresh transcript
fn build_caller(args: &ClientArgs, env: &BackendEnv) -> anyhow::Result<(AiCaller<FileHistoryStore>, String)> {
    let profile = args
        .profile
        .as_deref()
        .map(prompt::load_profile)
        .transpose()?;

    let mut config = CallerConfig::new(args.proxy_url.clone());
    config.request_timeout = Duration::from_secs(args.request_timeout);
    config.allow_direct_backend_fallback = args.dev_fallback;
    config.fallback_models = model_attempt_list(env.preferred_model.as_deref());

    let http = reqwest::Client::new();
    let store = FileHistoryStore::new(&args.state_dir);
    tracing::debug!(path = %store.path().display(), "client rate history");
    let limiter = ClientRateLimiter::new(store, args.rate_limit());
    let mut caller = AiCaller::new(http.clone(), limiter, config, prompt::system_instruction(profile.as_ref()));

    if args.dev_fallback {
        if let Some(api_key) = &env.api_key {
            caller = caller.with_direct_backend(Arc::new(GeminiClient::new(
                http,
                args.backend_url.clone(),
                api_key.clone(),
                Duration::from_secs(args.dev_fallback_timeout),
            )));
        }
    }

    Ok((caller, prompt::greeting(profile.as_ref())))
}
