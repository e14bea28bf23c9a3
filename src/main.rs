//! # Recipe Client CLI
//!
//! Command-line front end for the recipe backend. Tokens are persisted to the
//! configured token file so a login survives between invocations.
//!
//! ## Environment Setup
//! Configure via environment or a `.env` file:
//! ```bash
//! RECIPE_API_URL=http://localhost:5000/api/v1
//! RECIPE_TOKEN_FILE=.recipe-client/tokens.json
//! RUST_LOG=info
//! ```
//!
//! ## Examples
//! ```bash
//! recipe-client login --email test@example.com --password password123
//! recipe-client whoami
//! recipe-client recipes list --search pasta
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use recipe_client::auth::RegisterRequest;
use recipe_client::services::{CategoryService, Difficulty, RecipeQuery, RecipeService};
use recipe_client::storage::FileStorage;
use recipe_client::{ClientConfig, SessionManager, SessionState};

#[derive(Parser, Debug)]
#[command(name = "recipe-client", about = "Recipe sharing API client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "RECIPE_PASSWORD")]
        password: String,
    },
    Register {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "RECIPE_PASSWORD")]
        password: String,
    },
    Logout,
    /// Show the signed-in user, refreshing the session if needed
    Whoami,
    /// Report whether a valid access token is stored, without network calls
    Status,
    Refresh,
    ChangePassword {
        #[arg(long)]
        current: String,
        #[arg(long)]
        new: String,
    },
    ForgotPassword {
        #[arg(long)]
        email: String,
    },
    ResetPassword {
        #[arg(long)]
        token: String,
        #[arg(long)]
        password: String,
    },
    Recipes(RecipesCommand),
    Categories,
}

#[derive(Args, Debug)]
struct RecipesCommand {
    #[command(subcommand)]
    command: RecipesSubcommand,
}

#[derive(Subcommand, Debug)]
enum RecipesSubcommand {
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long, value_parser = parse_difficulty)]
        difficulty: Option<Difficulty>,
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        limit: Option<u32>,
    },
    Show {
        id: String,
    },
    Favorites,
}

fn parse_difficulty(raw: &str) -> Result<Difficulty, String> {
    match raw.to_ascii_lowercase().as_str() {
        "easy" => Ok(Difficulty::Easy),
        "medium" => Ok(Difficulty::Medium),
        "hard" => Ok(Difficulty::Hard),
        other => Err(format!("unknown difficulty {other:?}, expected easy, medium or hard")),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false).compact())
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::from_env().context("Failed to load configuration from environment")?;
    tracing::debug!("API base URL: {}", config.api_base_url);

    let storage = Arc::new(FileStorage::new(&config.token_file));
    let session = Arc::new(SessionManager::from_config(&config, storage)?);

    match cli.command {
        Command::Login { email, password } => {
            let user = session.login(&email, &password).await?;
            print_json(&user)?;
        }
        Command::Register {
            first_name,
            last_name,
            email,
            password,
        } => {
            let user = session
                .register(&RegisterRequest {
                    first_name,
                    last_name,
                    email,
                    password,
                })
                .await?;
            print_json(&user)?;
        }
        Command::Logout => {
            session.logout();
            println!("Logged out");
        }
        Command::Whoami => match session.bootstrap().await {
            SessionState::Authenticated(user) => print_json(&user)?,
            _ => anyhow::bail!("not logged in"),
        },
        Command::Status => {
            println!(
                "{}",
                if session.is_authenticated() { "authenticated" } else { "unauthenticated" }
            );
        }
        Command::Refresh => match session.refresh_token().await {
            Some(_) => println!("Session refreshed"),
            None => anyhow::bail!("refresh failed; please log in again"),
        },
        Command::ChangePassword { current, new } => {
            println!("{}", session.change_password(&current, &new).await?);
        }
        Command::ForgotPassword { email } => {
            println!("{}", session.forgot_password(&email).await?);
        }
        Command::ResetPassword { token, password } => {
            println!("{}", session.reset_password(&token, &password).await?);
        }
        Command::Recipes(RecipesCommand { command }) => {
            let recipes = RecipeService::new(session.clone());
            match command {
                RecipesSubcommand::List {
                    search,
                    category,
                    difficulty,
                    tags,
                    page,
                    limit,
                } => {
                    let query = RecipeQuery {
                        search,
                        category,
                        difficulty,
                        tags,
                        page,
                        limit,
                        sort: None,
                    };
                    print_json(&recipes.list(&query).await?)?;
                }
                RecipesSubcommand::Show { id } => print_json(&recipes.get(&id).await?)?,
                RecipesSubcommand::Favorites => print_json(&recipes.favorites().await?)?,
            }
        }
        Command::Categories => {
            print_json(&CategoryService::new(session.clone()).list().await?)?;
        }
    }

    Ok(())
}
