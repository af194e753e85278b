use std::path::PathBuf;

use axum::http::{header, Request};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use url::Url;

use mobile_view_proxy::config::{load_config, ProxyConfig};
use mobile_view_proxy::mobile::MobileSite;

#[derive(Parser)]
#[command(name = "mobile-cli")]
#[command(about = "Offline tooling for the mobile view proxy configuration", long_about = None)]
struct Cli {
    /// Proxy configuration file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration file
    Check,
    /// Show how a request would be resolved
    Resolve {
        /// Absolute request URL
        url: String,
        /// Extra request header as `Name: value` (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
        /// Cookie header value
        #[arg(short = 'b', long)]
        cookie: Option<String>,
        #[arg(short = 'A', long)]
        user_agent: Option<String>,
    },
    /// Translate a URL between desktop and mobile form
    Translate {
        url: String,
        /// Translate mobile → desktop instead
        #[arg(long)]
        to_desktop: bool,
    },
    /// List the URLs to purge for the given pages
    PurgeUrls { urls: Vec<String> },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    let site = MobileSite::from_config(config.mobile.clone());

    let output = match cli.command {
        Commands::Check => json!({
            "status": "ok",
            "evaluators": site.resolver.tiers(),
            "translation": site.translator.is_enabled(),
        }),
        Commands::Resolve {
            url,
            headers,
            cookie,
            user_agent,
        } => resolve(&site, &url, &headers, cookie, user_agent)?,
        Commands::Translate { url, to_desktop } => {
            let translated = if to_desktop {
                site.translator.to_desktop(&url)
            } else {
                site.translator.to_mobile(&url)
            };
            json!({ "input": url, "output": translated })
        }
        Commands::PurgeUrls { urls } => json!(site.translator.purge_urls(&urls)),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn resolve(
    site: &MobileSite,
    url: &str,
    headers: &[String],
    cookie: Option<String>,
    user_agent: Option<String>,
) -> Result<Value, Box<dyn std::error::Error>> {
    let parsed = Url::parse(url)?;
    let host = match (parsed.host_str(), parsed.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => return Err(format!("URL has no host: {url}").into()),
    };
    let path = match parsed.query() {
        Some(query) => format!("{}?{query}", parsed.path()),
        None => parsed.path().to_string(),
    };

    let mut builder = Request::builder().uri(path).header(header::HOST, host);
    for raw in headers {
        let (name, value) = raw
            .split_once(':')
            .ok_or_else(|| format!("expected `Name: value`, got {raw:?}"))?;
        builder = builder.header(name.trim(), value.trim());
    }
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    if let Some(user_agent) = user_agent {
        builder = builder.header(header::USER_AGENT, user_agent);
    }
    let mut request = builder.body(())?;

    site.mark_mobile_host(&mut request);
    let ctx = site.context_for(&request);
    let resolution = ctx.resolution();
    let skin = (ctx.is_mobile() && !ctx.is_blacklisted_page())
        .then(|| site.skins.select(ctx.signals().use_skin.as_deref()));

    Ok(json!({
        "mode": resolution.mode.as_str(),
        "decided_by": resolution.decided_by,
        "consulted": resolution.consulted,
        "vary": resolution.vary.iter().map(|h| h.as_str()).collect::<Vec<_>>(),
        "skin": skin,
        "beta": ctx.is_beta(),
    }))
}
