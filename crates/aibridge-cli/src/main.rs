//! CLI binary for exercising registered AI provider adapters.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::{json, Map};

use aibridge_provider::{
    ChatInput, ChatMessage, ChatReply, ConfigStore, EnvConfig, EnvCredentialStore, ImageAttachment,
    OperationType, ProviderAdapter, ProviderContext, ProviderRegistry,
};

#[derive(Parser)]
#[command(name = "aibridge", version, about = "Drive AI provider adapters from the command line")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Provider id to use
    #[arg(short, long, global = true, default_value = "gemini")]
    provider: String,

    /// Environment variable holding the API key, used when the provider config has none
    #[arg(long, global = true, default_value = "GEMINI_API_KEY")]
    api_key_ref: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered providers
    Providers,

    /// Show setup data, capabilities and the configuration schema of the provider
    Describe,

    /// List the models the provider offers
    Models {
        /// Only list models for this operation (chat, embeddings, ...)
        #[arg(short, long)]
        operation: Option<OperationType>,
    },

    /// Send a chat conversation
    Chat {
        /// Model id, e.g. models/gemini-1.5-pro
        #[arg(short, long)]
        model: String,

        /// System instruction prepended to the conversation
        #[arg(long)]
        system: Option<String>,

        /// Print the reply as it is generated
        #[arg(long)]
        stream: bool,

        /// Comma-separated stop sequences
        #[arg(long)]
        stop: Option<String>,

        #[arg(long)]
        temperature: Option<f32>,

        #[arg(long)]
        max_tokens: Option<u32>,

        /// Image attached to the last message, as mime:path (repeatable)
        #[arg(long = "image", value_name = "MIME:PATH")]
        images: Vec<String>,

        /// Messages as role:text; text without a role prefix is a user turn
        #[arg(required = true)]
        messages: Vec<String>,
    },

    /// Compute an embedding vector
    Embed {
        /// Model id, e.g. models/embedding-001
        #[arg(short, long)]
        model: String,

        /// Text to embed
        text: String,
    },
}

/// Provider config from `AIBRIDGE_<PROVIDER>_*` variables, with the credential
/// reference falling back to `--api-key-ref`.
struct CliConfig {
    env: EnvConfig,
    api_key_ref: String,
}

impl ConfigStore for CliConfig {
    fn get(&self, key: &str) -> Option<String> {
        self.env.get(key).or_else(|| {
            (key == "api_key" && !self.api_key_ref.is_empty()).then(|| self.api_key_ref.clone())
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let registry = ProviderRegistry::with_builtin();
    if let Commands::Providers = cli.command {
        for (id, label) in registry.providers() {
            println!("{id}\t{label}");
        }
        return Ok(());
    }

    let config = CliConfig {
        env: EnvConfig::new(format!("AIBRIDGE_{}", cli.provider)),
        api_key_ref: cli.api_key_ref.clone(),
    };
    let ctx = ProviderContext::new(Arc::new(config), Arc::new(EnvCredentialStore::new()));
    let mut provider = registry.create(&cli.provider, &ctx)?;

    match cli.command {
        Commands::Providers => {}
        Commands::Describe => cmd_describe(provider.as_ref())?,
        Commands::Models { operation } => {
            let models = provider.list_models(operation).await?;
            for (id, name) in &models {
                println!("{id}\t{name}");
            }
        }
        Commands::Chat {
            model,
            system,
            stream,
            stop,
            temperature,
            max_tokens,
            images,
            messages,
        } => {
            let mut settings = Map::new();
            if let Some(stop) = stop {
                settings.insert("stopSequences".into(), json!(stop));
            }
            if let Some(temperature) = temperature {
                settings.insert("temperature".into(), json!(temperature));
            }
            if let Some(max_tokens) = max_tokens {
                settings.insert("maxOutputTokens".into(), json!(max_tokens));
            }
            provider.set_generation_config(&settings)?;
            provider.set_system_instruction(system.as_deref());

            let messages = parse_messages(&messages, &images)?;
            cmd_chat(provider.as_mut(), messages, &model, stream).await?;
        }
        Commands::Embed { model, text } => {
            let output = provider.embeddings(text.into(), &model).await?;
            println!("{}", serde_json::to_string(&output.values)?);
            tracing::info!(dimensions = output.values.len(), model = %model, "embedding computed");
        }
    }

    Ok(())
}

fn cmd_describe(provider: &dyn ProviderAdapter) -> anyhow::Result<()> {
    let operations: Vec<&str> = provider
        .supported_operation_types()
        .iter()
        .map(OperationType::as_str)
        .collect();
    let description = json!({
        "id": provider.id(),
        "label": provider.label(),
        "usable": provider.is_usable(None),
        "operations": operations,
        "setup": provider.setup_data(),
        "definition": provider.api_definition()?,
    });
    println!("{}", serde_json::to_string_pretty(&description)?);
    Ok(())
}

async fn cmd_chat(
    provider: &mut dyn ProviderAdapter,
    messages: Vec<ChatMessage>,
    model: &str,
    stream: bool,
) -> anyhow::Result<()> {
    let output = provider
        .chat(ChatInput::new(messages).streamed(stream), model)
        .await?;

    if let Some(usage) = &output.usage {
        tracing::debug!(
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "token usage"
        );
    }

    match output.message {
        ChatReply::Stream(mut chunks) => {
            let mut stdout = std::io::stdout();
            while let Some(delta) = chunks.next_chunk().await {
                let delta = delta?;
                write!(stdout, "{}", delta.text)?;
                stdout.flush()?;
            }
            writeln!(stdout)?;
            tracing::debug!(chunks = chunks.pulled(), "stream finished");
        }
        ChatReply::Complete(message) => println!("{}", message.text),
    }
    Ok(())
}

/// `role:text` arguments into messages. Images attach to the last message.
fn parse_messages(args: &[String], images: &[String]) -> anyhow::Result<Vec<ChatMessage>> {
    let mut messages: Vec<ChatMessage> = args
        .iter()
        .map(|arg| match arg.split_once(':') {
            Some((role, text)) if is_role_name(role) => ChatMessage::new(role, text),
            _ => ChatMessage::user(arg.as_str()),
        })
        .collect();

    for image_arg in images {
        let (mime_type, path) = image_arg
            .split_once(':')
            .with_context(|| format!("image must be given as mime:path, got '{image_arg}'"))?;
        let path = PathBuf::from(path);
        let bytes = std::fs::read(&path)
            .with_context(|| format!("failed to read image {}", path.display()))?;
        let image = ImageAttachment::from_bytes(mime_type, &bytes)?;
        let last = messages
            .pop()
            .context("an image needs a message to attach to")?;
        messages.push(last.with_image(image));
    }
    Ok(messages)
}

fn is_role_name(candidate: &str) -> bool {
    !candidate.is_empty() && candidate.chars().all(|c| c.is_ascii_alphabetic() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use aibridge_provider::Role;

    #[test]
    fn messages_parse_role_prefixes() {
        let args = vec![
            "system:You are terse.".to_string(),
            "Hi there".to_string(),
            "assistant:Hello".to_string(),
            "user:What is 2:3?".to_string(),
        ];
        let messages = parse_messages(&args, &[]).unwrap();
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].text, "Hi there");
        assert_eq!(messages[2].role, Role::Assistant);
        assert_eq!(messages[3].text, "What is 2:3?");
    }

    #[test]
    fn text_with_non_role_prefix_stays_user_text() {
        let messages = parse_messages(&["see http://x".to_string()], &[]).unwrap();
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].text, "see http://x");
    }

    #[test]
    fn malformed_image_argument_is_rejected() {
        let err = parse_messages(&["hi".to_string()], &["no-separator".to_string()]).unwrap_err();
        assert!(err.to_string().contains("mime:path"));
    }

    #[test]
    fn api_key_ref_backs_missing_config() {
        let config = CliConfig {
            env: EnvConfig::new("AIBRIDGE_GEMINI").with_lookup(|_| None),
            api_key_ref: "MY_KEY".into(),
        };
        assert_eq!(config.get("api_key").as_deref(), Some("MY_KEY"));
        assert_eq!(config.get("base_url"), None);
    }
}
