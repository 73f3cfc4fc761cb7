use clap::Parser;

/// Runtime configuration, resolved from CLI flags and the environment
/// (`.env` is loaded before this runs).
#[derive(Debug, Clone)]
pub struct Config {
    pub supabase_url: String,
    pub anon_key: String,
    pub access_token: Option<String>,
    pub username: String,
    pub zone: String,
}

/// Per-zone realtime chat client for the Lyon risk-alert platform.
#[derive(Debug, Parser)]
#[command(name = "lyon-zone-chat")]
struct Cli {
    /// Backend project URL (falls back to SUPABASE_URL).
    #[arg(long)]
    url: Option<String>,
    /// Zone to open at startup (arrondissement id, 1-9).
    #[arg(long, default_value = "1")]
    zone: String,
    /// Display name attached to sent messages (falls back to CHAT_USERNAME).
    #[arg(long)]
    username: Option<String>,
}

pub fn load() -> Result<Config, String> {
    let cli = Cli::parse();

    let supabase_url = cli
        .url
        .or_else(|| std::env::var("SUPABASE_URL").ok())
        .ok_or_else(|| "SUPABASE_URL is not set".to_string())?;
    let anon_key = std::env::var("SUPABASE_ANON_KEY")
        .map_err(|_| "SUPABASE_ANON_KEY is not set".to_string())?;
    let access_token = std::env::var("SUPABASE_ACCESS_TOKEN").ok();
    let username = cli
        .username
        .or_else(|| std::env::var("CHAT_USERNAME").ok())
        .unwrap_or_else(|| "users".to_string());

    Ok(Config {
        supabase_url,
        anon_key,
        access_token,
        username,
        zone: cli.zone,
    })
}
