//! CLI binary for vigil.

use clap::{Parser, Subcommand};
use cpal::traits::{DeviceTrait, HostTrait};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use vigil::automation::{AutomationExecutor, NativeDesktop};
use vigil::classifier::IntentClassifier;
use vigil::config::ProviderEndpoint;
use vigil::dispatch::Dispatcher;
use vigil::emergency::alert::{AlertDispatcher, WebhookChannel};
use vigil::emergency::monitor::DistressMonitor;
use vigil::emergency::{EmergencyMachine, MicClipRecorder};
use vigil::geo::IpGeolocator;
use vigil::providers::fallback::FallbackCompletion;
use vigil::providers::http::HttpCompletionProvider;
use vigil::providers::CompletionProvider;
use vigil::responder::{GeneralResponder, InstantAnswerSearch, RealtimeResponder};
use vigil::speech::{CommandSynthesizer, SpeakerStack, StdinCapture};
use vigil::transcript::TranscriptStore;
use vigil::{audio, AssistantConfig, Runtime, SessionContext};

/// Vigil: voice-driven personal assistant with emergency escalation.
#[derive(Parser)]
#[command(name = "vigil", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Run the assistant loop.
    Run,

    /// List available audio input devices.
    Devices,

    /// Write a default config file and print its path.
    InitConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(AssistantConfig::default_config_path);
    let config = if config_path.exists() {
        AssistantConfig::from_file(&config_path)?
    } else {
        AssistantConfig::default()
    };

    // Console logs at the env-filter level, full logs in a daily file.
    let log_dir = config.data_dir().join("logs");
    let file_appender = tracing_appender::rolling::daily(&log_dir, "vigil.log");
    let (file_writer, _log_guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vigil=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .init();

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config).await,
        Command::Devices => list_devices(),
        Command::InitConfig => init_config(&config_path, &config),
    }
}

async fn run(config: AssistantConfig) -> anyhow::Result<()> {
    println!("Vigil v{}", env!("CARGO_PKG_VERSION"));

    let provider = build_provider_stack(&config)?;
    let session = Arc::new(SessionContext::new(config.transcript.max_turns));

    let transcript_path = config.transcript.path.clone().unwrap_or_else(|| {
        config.data_dir().join("transcript.json")
    });
    let transcript = TranscriptStore::new(transcript_path, config.transcript.max_turns);
    transcript.ensure_greeting(&config.identity.username, &config.identity.assistant_name)?;
    session.seed_history(transcript.load());

    let search = Arc::new(InstantAnswerSearch::new(
        config.search.endpoint.clone(),
        Duration::from_secs(config.search.timeout_secs),
    )?);
    let speaker = SpeakerStack::new(
        Arc::new(CommandSynthesizer::new(
            config.speech.tts_command.clone(),
            config.speech.tts_args.clone(),
        )),
        Arc::new(CommandSynthesizer::new(
            config.speech.offline_tts_command.clone(),
            config.speech.offline_tts_args.clone(),
        )),
    );

    let dispatcher = Dispatcher::new(
        AutomationExecutor::new(
            Arc::new(NativeDesktop),
            provider.clone(),
            config.data_dir().join("content"),
            &config.identity.assistant_name,
        ),
        GeneralResponder::new(
            provider.clone(),
            &config.identity.username,
            &config.identity.assistant_name,
        ),
        RealtimeResponder::new(
            provider.clone(),
            search,
            &config.identity.username,
            &config.identity.assistant_name,
            config.search.max_results,
        ),
        speaker,
        session.clone(),
        transcript,
        Duration::from_millis(config.dispatch.automation_delay_ms),
        config.providers.history_turns,
    );

    let recording_dir = config
        .audio
        .recording_dir
        .clone()
        .unwrap_or_else(|| config.data_dir().join("recordings"));
    let channel = Arc::new(WebhookChannel::new(
        config.emergency.webhook_url.clone(),
        Duration::from_secs(10),
    )?);
    let emergency = EmergencyMachine::new(
        config.emergency.clone(),
        Arc::new(MicClipRecorder::new(config.audio.clone(), recording_dir)),
        Arc::new(IpGeolocator::new(Duration::from_secs(10))?),
        AlertDispatcher::new(
            channel,
            config.emergency.contacts.clone(),
            &config.identity.username,
        ),
    );
    if config.emergency.contacts.is_empty() {
        warn!("no emergency contacts configured, escalations cannot alert anyone");
    }

    let cancel = CancellationToken::new();

    // Surface escalation phases: each transition (and its deadline, for the
    // timed phases) is observable in the logs.
    let mut phases = emergency.subscribe();
    let phase_cancel = cancel.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = phase_cancel.cancelled() => return,
                changed = phases.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    let update = *phases.borrow_and_update();
                    info!(phase = ?update.phase, deadline = ?update.deadline, "emergency phase");
                }
            }
        }
    });

    // Continuous acoustic distress monitoring, sharing the machine (and so
    // its cooldown gate) with the keyword path.
    match audio::spawn_window_stream(&config.audio) {
        Ok((windows, _capture_guard)) => {
            let monitor = DistressMonitor::new(
                &config.emergency,
                config.audio.sample_rate,
                audio::WINDOW_SAMPLES,
            );
            tokio::spawn(vigil::runtime::run_monitor(
                windows,
                monitor,
                emergency.clone(),
                session.clone(),
                cancel.clone(),
            ));
        }
        Err(e) => warn!(error = %e, "distress monitor disabled"),
    }

    session.set_mic_armed(true);
    let runtime = Runtime::new(
        Arc::new(StdinCapture::new()),
        IntentClassifier::new(provider, config.classifier.max_attempts),
        dispatcher,
        emergency,
        session,
        cancel.clone(),
    );

    tokio::select! {
        result = runtime.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down");
            cancel.cancel();
        }
    }
    Ok(())
}

/// Primary + fallback completion stack shared by the classifier, the
/// responders, and the content writer.
fn build_provider_stack(config: &AssistantConfig) -> anyhow::Result<Arc<dyn CompletionProvider>> {
    let primary = with_env_key(&config.providers.primary, "VIGIL_PRIMARY_API_KEY");
    let secondary = with_env_key(&config.providers.secondary, "VIGIL_SECONDARY_API_KEY");
    Ok(Arc::new(FallbackCompletion::new(
        Arc::new(HttpCompletionProvider::new("primary", &primary)?),
        Arc::new(HttpCompletionProvider::new("secondary", &secondary)?),
    )))
}

/// An empty configured key means read it from the environment.
fn with_env_key(endpoint: &ProviderEndpoint, var: &str) -> ProviderEndpoint {
    let mut endpoint = endpoint.clone();
    if endpoint.api_key.is_empty() {
        if let Ok(key) = std::env::var(var) {
            endpoint.api_key = key;
        } else {
            warn!(var, "no API key configured or in environment");
        }
    }
    endpoint
}

fn list_devices() -> anyhow::Result<()> {
    let host = cpal::default_host();
    let default_name = host
        .default_input_device()
        .and_then(|d| d.description().ok().map(|desc| desc.name().to_owned()));
    println!("Input devices:");
    for device in host.input_devices()? {
        let name = device
            .description()
            .map(|desc| desc.name().to_owned())
            .unwrap_or_else(|_| "<unknown>".to_owned());
        let default = default_name.as_deref() == Some(name.as_str());
        println!("  {}{}", name, if default { " (default)" } else { "" });
    }
    Ok(())
}

fn init_config(path: &PathBuf, config: &AssistantConfig) -> anyhow::Result<()> {
    config.save_to_file(path)?;
    println!("Wrote {}", path.display());
    Ok(())
}
