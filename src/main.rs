use anyhow::{anyhow, bail, Context};
use legally_lib::services::{
    load_app_config, relevant_laws, ConfigStore, DocumentService, PROVIDER_NAME,
};
use tracing::info;

const USAGE: &str = "Usage:
  legally analyze <path.pdf> [--max-chars <n>] [--concurrency <n>] [--attempts <n>] [--out <json_path>]
  legally history [--limit <n>]
  legally laws
  legally set-key <openrouter_api_key>
  legally delete-key

Notes:
  - API key: OPENROUTER_API_KEY (or LEGALLY_OPENROUTER_API_KEY) overrides the config file.
  - LEGALLY_API_URL / LEGALLY_MODEL override the endpoint and model.";

fn parse_arg_value(args: &[String], key: &str) -> Option<String> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn parse_usize_arg(args: &[String], key: &str) -> anyhow::Result<Option<usize>> {
    parse_arg_value(args, key)
        .map(|v| {
            v.parse::<usize>()
                .with_context(|| format!("{} expects a non-negative integer, got {:?}", key, v))
        })
        .transpose()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Analyze,
    History,
    Laws,
    SetKey,
    DeleteKey,
}

impl Command {
    fn parse(name: &str) -> anyhow::Result<Self> {
        match name {
            "analyze" => Ok(Command::Analyze),
            "history" => Ok(Command::History),
            "laws" => Ok(Command::Laws),
            "set-key" => Ok(Command::SetKey),
            "delete-key" => Ok(Command::DeleteKey),
            other => bail!("unknown command: {}\n\n{}", other, USAGE),
        }
    }
}

fn default_store() -> anyhow::Result<ConfigStore> {
    ConfigStore::default_config_dir()
        .map(ConfigStore::new)
        .ok_or_else(|| anyhow!("no config directory available on this platform"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let Some(name) = args.get(1) else {
        eprintln!("{}", USAGE);
        return Ok(());
    };
    let command = Command::parse(name)?;

    legally_lib::init_logging();
    let mut config = load_app_config();

    match command {
        Command::Analyze => {
            let path = args
                .get(2)
                .filter(|p| !p.starts_with("--"))
                .ok_or_else(|| anyhow!("analyze requires a PDF path\n\n{}", USAGE))?;

            if let Some(n) = parse_usize_arg(&args, "--max-chars")? {
                config.analysis.max_segment_chars = n;
            }
            if let Some(n) = parse_usize_arg(&args, "--concurrency")? {
                config.analysis.concurrency = n;
            }
            if let Some(n) = parse_usize_arg(&args, "--attempts")? {
                config.analysis.max_attempts = n;
            }

            let bytes =
                std::fs::read(path).with_context(|| format!("read file failed: {}", path))?;
            let file_name = std::path::Path::new(path)
                .file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| path.clone());

            let service = DocumentService::from_config(&config)?;
            info!(
                options = ?service.pipeline_options(),
                "analyzing {} ({} bytes)",
                file_name,
                bytes.len()
            );

            match service.analyze_document(&file_name, &bytes).await {
                Ok(response) => {
                    let json = serde_json::to_string_pretty(&response)?;
                    if let Some(out_path) = parse_arg_value(&args, "--out") {
                        std::fs::write(&out_path, &json)
                            .with_context(|| format!("write out failed: {}", out_path))?;
                        eprintln!("Wrote JSON: {}", out_path);
                    }
                    println!("{}", json);
                    info!(
                        "analysis finished {} ms after startup",
                        legally_lib::startup_elapsed_ms()
                    );
                }
                Err(e) => {
                    println!("{}", serde_json::to_string_pretty(&e.to_body())?);
                    bail!("analysis failed ({}): {}", e.status_code(), e);
                }
            }
        }
        Command::History => {
            let limit = parse_usize_arg(&args, "--limit")?;
            let service = DocumentService::from_config(&config)?;
            let records = service.history(limit)?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Command::Laws => {
            let laws = serde_json::json!({ "laws": relevant_laws() });
            println!("{}", serde_json::to_string_pretty(&laws)?);
        }
        Command::SetKey => {
            let key = args
                .get(2)
                .ok_or_else(|| anyhow!("set-key requires a key\n\n{}", USAGE))?;
            let store = default_store()?;
            store.set_api_key(PROVIDER_NAME, key.trim()).map_err(|e| anyhow!(e))?;
            eprintln!("API key saved to {}", store.config_file().display());
        }
        Command::DeleteKey => {
            let store = default_store()?;
            if store.delete_api_key(PROVIDER_NAME).map_err(|e| anyhow!(e))? {
                eprintln!("API key removed from {}", store.config_file().display());
            } else {
                eprintln!("No API key stored in {}", store.config_file().display());
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parse() {
        assert_eq!(Command::parse("analyze").unwrap(), Command::Analyze);
        assert_eq!(Command::parse("delete-key").unwrap(), Command::DeleteKey);
        let err = Command::parse("analyse").unwrap_err();
        assert!(err.to_string().starts_with("unknown command: analyse"));
    }

    #[test]
    fn test_parse_usize_arg() {
        let args: Vec<String> = [
            "legally",
            "analyze",
            "a.pdf",
            "--concurrency",
            "4",
            "--limit",
            "x",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(parse_usize_arg(&args, "--concurrency").unwrap(), Some(4));
        assert_eq!(parse_usize_arg(&args, "--max-chars").unwrap(), None);
        assert!(parse_usize_arg(&args, "--limit").is_err());
    }
}
