use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde_json::Value;
use url::Url;

#[derive(Parser)]
#[command(name = "pathmux-cli")]
#[command(about = "Management CLI for the pathmux admin API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "PATHMUX_ADMIN_KEY", default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check server status and route counts
    Status,
    /// List routes
    Routes {
        /// Show registered routes, including edits not yet refreshed
        #[arg(long)]
        pending: bool,
    },
    /// Build the path of a named route
    Path {
        name: String,
        args: Vec<String>,
    },
    /// Rebuild the router from its registered routes
    Refresh,
    /// Take a route offline (served after the next refresh)
    Offline { name: String },
    /// Bring an offline route back (served after the next refresh)
    Online { name: String },
    /// Change the method of a route (served after the next refresh)
    Method { method: String, name: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let (method, url) = match &cli.command {
        Commands::Status => (Method::GET, admin_url(&cli.url, &["status"], None)?),
        Commands::Routes { pending } => {
            let mut url = admin_url(&cli.url, &["routes"], None)?;
            if *pending {
                url.query_pairs_mut().append_pair("pending", "true");
            }
            (Method::GET, url)
        }
        Commands::Path { name, args } => {
            let mut url = admin_url(&cli.url, &["path"], Some(name.as_str()))?;
            if !args.is_empty() {
                url.query_pairs_mut().append_pair("args", &args.join(","));
            }
            (Method::GET, url)
        }
        Commands::Refresh => (Method::POST, admin_url(&cli.url, &["refresh"], None)?),
        Commands::Offline { name } => (Method::POST, admin_url(&cli.url, &["offline"], Some(name.as_str()))?),
        Commands::Online { name } => (Method::POST, admin_url(&cli.url, &["online"], Some(name.as_str()))?),
        Commands::Method { method, name } => (
            Method::POST,
            admin_url(&cli.url, &["method", method.as_str()], Some(name.as_str()))?,
        ),
    };

    let res = client.request(method, url).headers(headers).send().await?;
    print_response(res).await
}

/// `{base}/admin/{segments..}/{name}` with every segment percent-encoded.
/// Route names keep their slashes as path separators.
fn admin_url(base: &str, segments: &[&str], name: Option<&str>) -> Result<Url, Box<dyn std::error::Error>> {
    let mut url = Url::parse(base)?;
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| format!("'{}' cannot be a base URL", base))?;
        path.pop_if_empty().push("admin").extend(segments);
        if let Some(name) = name {
            path.extend(name.trim_start_matches('/').split('/'));
        }
    }
    Ok(url)
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
