use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use storefront_core::api::DEFAULT_POPULAR_LIMIT;
use storefront_core::models::{NewReview, Registration, Resource};
use storefront_core::{
    AccountApi, ApiError, CatalogApi, Config, ResourceFeed, SessionClient, SessionStatus,
};

#[derive(Debug, Parser)]
#[command(name = "storefront", version, about = "Browse the storefront from the terminal")]
pub struct Cli {
    /// Override the API base URL
    #[arg(long, global = true)]
    pub api_base: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in and remember the session
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// End the session
    Logout,
    /// Create an account
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
    /// Show who is logged in
    Whoami,
    /// List catalog entries
    Products {
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Walk every page
        #[arg(long)]
        all: bool,
    },
    /// Show one catalog entry with its reviews
    Product { id: i64 },
    /// Highest-rated entries
    Popular {
        #[arg(long, default_value_t = DEFAULT_POPULAR_LIMIT)]
        limit: usize,
    },
    /// Save settings to the config file
    Config {
        /// API base URL to use from now on
        #[arg(long)]
        set_api_base: Option<String>,
    },
    /// Review a catalog entry
    Review {
        id: i64,
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=5))]
        rating: u8,
        #[arg(long)]
        comment: Option<String>,
    },
}

pub fn is_session_expired(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ApiError>()
        .is_some_and(ApiError::is_session_expired)
}

pub async fn run(config: &mut Config, client: &SessionClient, command: Command) -> Result<()> {
    let catalog = CatalogApi::new(client.clone());
    let account = AccountApi::new(client.clone());

    match command {
        Command::Login { email } => {
            let email = match email {
                Some(email) => email,
                None => prompt("Email: ")?,
            };
            let password = rpassword::prompt_password("Password: ")?;
            client.login(&email, &password).await?;
            match client.session().user() {
                Some(user) => println!("Logged in as {} <{}>", user.name, user.email),
                None => println!("Logged in"),
            }
        }
        Command::Logout => {
            client.logout().await;
            println!("Logged out");
        }
        Command::Register { name, email } => {
            let password = rpassword::prompt_password("Password: ")?;
            let confirm = rpassword::prompt_password("Confirm password: ")?;
            if password != confirm {
                anyhow::bail!("Passwords do not match");
            }
            let user = account
                .register(&Registration::new(&name, &email, &password))
                .await?;
            println!("Account created for {}. Log in with `storefront login`.", user.email);
        }
        Command::Whoami => match client.session().current() {
            SessionStatus::Authenticated { user: Some(user), since } => {
                println!("{} <{}> (session since {})", user.name, user.email, since.format("%Y-%m-%d %H:%M"));
            }
            SessionStatus::Authenticated { user: None, .. } => {
                let user = account.me().await?;
                println!("{} <{}>", user.name, user.email);
            }
            SessionStatus::Anonymous => println!("Not logged in"),
        },
        Command::Products { page, all } => {
            if all {
                let mut feed = ResourceFeed::new();
                feed.reload(&catalog).await?;
                while feed.load_more(&catalog).await? {}
                print_resources(feed.items());
            } else {
                let page = catalog.list(page).await?;
                print_resources(&page.data);
                println!("Page {} of {}", page.current_page, page.last_page);
            }
        }
        Command::Product { id } => {
            let resource = catalog.get(id).await?;
            println!("{} - {}", resource.name, resource.price_display());
            println!("{}", resource.stock_display());
            if let Some(ref description) = resource.description {
                println!("\n{}", description);
            }
            if let Some(ref seller) = resource.user {
                println!("Sold by {}", seller.name);
            }
            println!("\nRating: {:.1} ({} reviews)", resource.rating(), resource.reviews.len());
            for review in &resource.reviews {
                println!(
                    "  [{}/5] {}: {}",
                    review.rating,
                    review.author_display(),
                    review.comment.as_deref().unwrap_or("No comment")
                );
            }
        }
        Command::Popular { limit } => {
            print_resources(&catalog.popular(limit).await?);
        }
        Command::Config { set_api_base } => {
            if let Some(base) = set_api_base {
                config.api_base = base;
                config.save()?;
                println!("Saved API base {}", config.api_base);
            } else {
                println!("API base: {}", config.api_base);
                println!("Credentials: {:?}", config.credential_backend);
            }
        }
        Command::Review { id, rating, comment } => {
            let review = catalog
                .create_review(id, &NewReview { rating, comment })
                .await?;
            println!("Review {} saved", review.id);
        }
    }
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin()
        .read_line(&mut input)
        .context("Failed to read input")?;
    Ok(input.trim().to_string())
}

fn print_resources(resources: &[Resource]) {
    if resources.is_empty() {
        println!("No products found");
        return;
    }
    for resource in resources {
        println!(
            "{:>6}  {:<40} {:>10}  {:.1}*  {}",
            resource.id,
            resource.name,
            resource.price_display(),
            resource.rating(),
            if resource.in_stock() { "" } else { "(out of stock)" }
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_products_flags() {
        let cli = Cli::parse_from(["storefront", "products", "--page", "3"]);
        assert!(matches!(
            cli.command,
            Some(Command::Products { page: 3, all: false })
        ));
    }

    #[test]
    fn test_review_rating_is_bounded() {
        assert!(Cli::try_parse_from(["storefront", "review", "7", "--rating", "6"]).is_err());
        assert!(Cli::try_parse_from(["storefront", "review", "7", "--rating", "5"]).is_ok());
    }

    #[test]
    fn test_parse_config_command() {
        let cli = Cli::parse_from(["storefront", "config", "--set-api-base", "https://shop.example/api"]);
        match cli.command {
            Some(Command::Config { set_api_base }) => {
                assert_eq!(set_api_base.as_deref(), Some("https://shop.example/api"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_session_expired_is_detected_through_anyhow() {
        let err: anyhow::Error = ApiError::SessionExpired.into();
        assert!(is_session_expired(&err));
        let other: anyhow::Error = ApiError::NotFound("x".to_string()).into();
        assert!(!is_session_expired(&other));
    }
}
