//! Keygate CLI - Command line interface.

use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::redirect::Policy;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

// ============================================================================
// CLI Structure
// ============================================================================

#[derive(Parser)]
#[command(name = "keygate")]
#[command(about = "Keygate CLI - Log into OpenStack through a Keygate server")]
#[command(version)]
struct Cli {
    /// Keygate server address
    #[arg(long, default_value = "http://localhost:9999", env = "KEYGATE_ADDR")]
    addr: String,

    /// Session token (printed by `login`)
    #[arg(long, env = "KEYGATE_SESSION")]
    session: Option<String>,

    /// Name of the session cookie
    #[arg(long, default_value = "session", env = "KEYGATE_COOKIE_NAME")]
    cookie_name: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check server status
    Health,
    /// Show WebSSO availability
    Sso,
    /// Log in with a password or an existing keystone token
    Login {
        /// Region to log into
        #[arg(long, default_value = "RegionOne")]
        region: String,
        /// User name (password login)
        #[arg(long)]
        username: Option<String>,
        /// Password (read from stdin if not provided)
        #[arg(long, requires = "username")]
        password: Option<String>,
        /// User domain name
        #[arg(long, requires = "username")]
        domain: Option<String>,
        /// Keystone token (token login)
        #[arg(long, env = "OS_TOKEN")]
        token: Option<String>,
        /// Print the whole profile as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the current session profile
    Profile {
        /// Print the whole profile as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rescope the session to another project
    SwitchProject {
        /// Project id
        project_id: String,
    },
    /// End the session
    Logout,
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
    #[serde(default)]
    detail: String,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    message: String,
}

#[derive(Debug, Deserialize)]
struct SsoResponse {
    enable_sso: bool,
    protocols: Vec<SsoProtocol>,
}

#[derive(Debug, Deserialize)]
struct SsoProtocol {
    protocol: String,
    url: String,
}

#[derive(Serialize)]
#[serde(untagged)]
enum LoginRequest {
    Password {
        region: String,
        username: String,
        password: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        domain: Option<String>,
    },
    Token {
        region: String,
        token: String,
    },
}

#[derive(Debug, Deserialize)]
struct Named {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ProjectSummary {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ProfileSummary {
    region: String,
    project: Named,
    user: Named,
    #[serde(default)]
    roles: Vec<Named>,
    exp: i64,
    uuid: String,
    #[serde(default)]
    projects: BTreeMap<String, ProjectSummary>,
    #[serde(default)]
    default_project_id: Option<String>,
}

// ============================================================================
// HTTP Client
// ============================================================================

struct KeygateClient {
    client: Client,
    base_url: String,
    cookie_name: String,
    session: Option<String>,
}

impl KeygateClient {
    fn new(base_url: &str, cookie_name: String, session: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .redirect(Policy::none())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            cookie_name,
            session,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    fn session_cookie(&self) -> Result<String> {
        let session = self
            .session
            .as_ref()
            .context("Session token required. Set KEYGATE_SESSION or use --session")?;
        Ok(format!("{}={}", self.cookie_name, session))
    }

    /// Returns the session token set by `resp`, if any.
    fn issued_session(&self, resp: &Response) -> Option<String> {
        let prefix = format!("{}=", self.cookie_name);
        resp.headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| value.strip_prefix(prefix.as_str()))
            .filter_map(|value| value.split(';').next())
            .find(|value| !value.is_empty())
            .map(str::to_string)
    }

    async fn check(resp: Response, action: &str) -> Result<Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let error: ErrorResponse = resp.json().await.unwrap_or(ErrorResponse {
            error: "Unknown error".into(),
            detail: status.to_string(),
        });
        bail!("{} failed: {} ({})", action, error.error, error.detail);
    }

    async fn health(&self) -> Result<HealthResponse> {
        let resp = self
            .client
            .get(self.url("/health"))
            .send()
            .await
            .context("Failed to connect to server")?;

        let resp = Self::check(resp, "Health check").await?;
        resp.json().await.context("Failed to parse response")
    }

    async fn sso(&self) -> Result<SsoResponse> {
        let resp = self
            .client
            .get(self.url("/sso"))
            .send()
            .await
            .context("Failed to connect to server")?;

        let resp = Self::check(resp, "SSO lookup").await?;
        resp.json().await.context("Failed to parse response")
    }

    async fn login(&self, req: &LoginRequest) -> Result<(serde_json::Value, String)> {
        let resp = self
            .client
            .post(self.url("/login"))
            .json(req)
            .send()
            .await
            .context("Failed to connect to server")?;

        let resp = Self::check(resp, "Login").await?;
        let session = self
            .issued_session(&resp)
            .context("Server did not set a session cookie")?;
        let profile = resp.json().await.context("Failed to parse response")?;

        Ok((profile, session))
    }

    async fn profile(&self) -> Result<(serde_json::Value, Option<String>)> {
        let resp = self
            .client
            .get(self.url("/profile"))
            .header(COOKIE, self.session_cookie()?)
            .send()
            .await
            .context("Failed to connect to server")?;

        let resp = Self::check(resp, "Profile").await?;
        let renewed = self.issued_session(&resp);
        let profile = resp.json().await.context("Failed to parse response")?;

        Ok((profile, renewed))
    }

    async fn switch_project(&self, project_id: &str) -> Result<(serde_json::Value, String)> {
        let resp = self
            .client
            .post(self.url(&format!("/switch_project/{}", project_id)))
            .header(COOKIE, self.session_cookie()?)
            .send()
            .await
            .context("Failed to connect to server")?;

        let resp = Self::check(resp, "Switch project").await?;
        let session = self
            .issued_session(&resp)
            .context("Server did not set a session cookie")?;
        let profile = resp.json().await.context("Failed to parse response")?;

        Ok((profile, session))
    }

    async fn logout(&self) -> Result<MessageResponse> {
        let mut req = self.client.post(self.url("/logout"));

        if self.session.is_some() {
            req = req.header(COOKIE, self.session_cookie()?);
        }

        let resp = req.send().await.context("Failed to connect to server")?;

        let resp = Self::check(resp, "Logout").await?;
        resp.json().await.context("Failed to parse response")
    }
}

// ============================================================================
// Command Handlers
// ============================================================================

fn print_profile(profile: serde_json::Value, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
        return Ok(());
    }

    let profile: ProfileSummary =
        serde_json::from_value(profile).context("Failed to parse profile")?;

    println!("Session {}:", profile.uuid);
    println!("  User:       {} ({})", profile.user.name, profile.user.id);
    println!("  Project:    {} ({})", profile.project.name, profile.project.id);
    println!("  Region:     {}", profile.region);
    let roles: Vec<&str> = profile.roles.iter().map(|r| r.name.as_str()).collect();
    println!("  Roles:      {}", roles.join(", "));
    println!("  Expires at: {}", profile.exp);

    if !profile.projects.is_empty() {
        println!("  Projects:");
        for (id, project) in &profile.projects {
            let marker = if profile.default_project_id.as_deref() == Some(id.as_str()) {
                " (default)"
            } else {
                ""
            };
            println!("    {} {}{}", id, project.name, marker);
        }
    }

    Ok(())
}

async fn cmd_health(client: &KeygateClient) -> Result<()> {
    let health = client.health().await?;

    println!("Keygate server status:");
    println!("  Status:  {}", health.status);
    println!("  Version: {}", health.version);

    Ok(())
}

async fn cmd_sso(client: &KeygateClient) -> Result<()> {
    let sso = client.sso().await?;

    if !sso.enable_sso {
        println!("WebSSO is disabled");
        return Ok(());
    }

    println!("WebSSO protocols:");
    for protocol in &sso.protocols {
        println!("  {}: {}", protocol.protocol, protocol.url);
    }

    Ok(())
}

fn read_password() -> Result<String> {
    print!("Password: ");
    io::stdout().flush()?;
    let stdin = io::stdin();
    let mut line = String::new();
    stdin.lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

async fn cmd_login(client: &KeygateClient, req: LoginRequest, json: bool) -> Result<()> {
    let (profile, session) = client.login(&req).await?;

    print_profile(profile, json)?;
    println!();
    println!("Session token: {}", session);
    println!("Export it to reuse the session: export KEYGATE_SESSION={}", session);

    Ok(())
}

async fn cmd_profile(client: &KeygateClient, json: bool) -> Result<()> {
    let (profile, renewed) = client.profile().await?;

    print_profile(profile, json)?;
    if let Some(session) = renewed {
        println!();
        println!("Session renewed, new token: {}", session);
    }

    Ok(())
}

async fn cmd_switch_project(client: &KeygateClient, project_id: &str) -> Result<()> {
    let (profile, session) = client.switch_project(project_id).await?;

    print_profile(profile, false)?;
    println!();
    println!("Session token: {}", session);

    Ok(())
}

async fn cmd_logout(client: &KeygateClient) -> Result<()> {
    let result = client.logout().await?;
    println!("{}", result.message);
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = KeygateClient::new(&cli.addr, cli.cookie_name, cli.session)?;

    match cli.command {
        Commands::Health => cmd_health(&client).await,
        Commands::Sso => cmd_sso(&client).await,
        Commands::Login {
            region,
            username,
            password,
            domain,
            token,
            json,
        } => {
            let req = match (username, token) {
                (Some(username), _) => {
                    let password = match password {
                        Some(p) => p,
                        None => read_password()?,
                    };
                    if password.is_empty() {
                        bail!("Password cannot be empty");
                    }
                    LoginRequest::Password {
                        region,
                        username,
                        password,
                        domain,
                    }
                },
                (None, Some(token)) => LoginRequest::Token { region, token },
                (None, None) => bail!("Provide --username or --token"),
            };
            cmd_login(&client, req, json).await
        },
        Commands::Profile { json } => cmd_profile(&client, json).await,
        Commands::SwitchProject { project_id } => cmd_switch_project(&client, &project_id).await,
        Commands::Logout => cmd_logout(&client).await,
    }
}
