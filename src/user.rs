use clap::{Parser, Subcommand};
use eduresource_server::resource::handlers::postgres_handler::PostgresHandler as ResourcePostgresHandler;
use eduresource_server::resource::service::ResourceService;
use eduresource_server::resource::types::resource::ResourceInput;
use eduresource_server::shared::handlers::postgres_handler::PostgresHandler as SharedPostgresHandler;
use eduresource_server::shared::types::account::{NewUser, Role, UserFilter, UserId};
use eduresource_server::shared::util::config;
use eduresource_server::shared::util::handler::UserStore;

use std::process::exit;
use std::sync::Arc;

/// Operator tooling. Works on the database directly, so none of the HTTP
/// authorization rules apply.
#[derive(Parser)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a user ahead of their first sign in
    Add {
        external_id: String,
        email: String,
        #[arg(long, default_value = "user", value_parser = parse_role)]
        role: Role,
        #[arg(long)]
        approved: bool,
    },
    /// Change a user's role (user, admin, superAdmin)
    Role {
        id: UserId,
        #[arg(value_parser = parse_role)]
        role: Role,
    },
    /// Approve a user
    Approve { id: UserId },
    /// Delete a user
    Delete { id: UserId },
    /// List users
    List,
    /// Load system owned, approved resources from a JSON array
    Seed { file: String },
}

fn parse_role(role: &str) -> Result<Role, String> {
    role.parse()
}

async fn run(command: Commands) -> Result<String, String> {
    let pool = config::get_pool().await.map_err(|e| format!("db error: {e}"))?;
    let users = SharedPostgresHandler::with_pool(pool.clone());
    users.init().await.map_err(|e| format!("db error: {e}"))?;

    match command {
        Commands::Add { external_id, email, role, approved } => {
            let user = users.create_user(&NewUser {
                external_id, email, first_name: None, last_name: None, role, is_approved: approved
            }).await.map_err(|e| format!("Error: {e}"))?;
            Ok(format!("Successfully created user {}", user.id))
        },
        Commands::Role { id, role } => {
            let user = users.set_role(id, role).await.map_err(|e| format!("Error: {e}"))?;
            Ok(format!("User {} is now {}", user.id, user.role))
        },
        Commands::Approve { id } => {
            users.set_approved(id, true).await.map_err(|e| format!("Error: {e}"))?;
            Ok(format!("Approved user {id}"))
        },
        Commands::Delete { id } => {
            users.delete_user(id).await.map_err(|e| format!("Error: {e}"))?;
            Ok(format!("Successfully deleted user {id}"))
        },
        Commands::List => {
            let found = users.list_users(&UserFilter::default()).await.map_err(|e| format!("db error: {e}"))?;
            Ok(found.iter()
                .map(|u| format!("{}\t{}\t{}\t{}\t{}", u.id, u.external_id, u.email, u.role,
                    if u.is_approved { "approved" } else { "pending" }))
                .collect::<Vec<_>>()
                .join("\n"))
        },
        Commands::Seed { file } => {
            let contents = std::fs::read_to_string(&file).map_err(|e| format!("Could not read {file}: {e}"))?;
            let inputs: Vec<ResourceInput> = serde_json::from_str(&contents)
                .map_err(|e| format!("{file} is not a JSON array of resources: {e}"))?;

            let resources = ResourcePostgresHandler::with_pool(pool);
            resources.init().await.map_err(|e| format!("db error: {e}"))?;
            let service = ResourceService::new(Arc::new(resources), config::get_config().limits.clone());

            let total = inputs.len();
            let mut created = 0;
            for (index, input) in inputs.into_iter().enumerate() {
                match service.create(input, None).await {
                    Ok(_) => created += 1,
                    Err(e) => eprintln!("item {index}: {}", e)
                }
            }
            Ok(format!("Seeded {created} of {total} resources"))
        },
    }
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    match run(cli.command).await {
        Ok(msg) => println!("{msg}"),
        Err(msg) => {
            eprintln!("{msg}");
            exit(1);
        }
    }
}
