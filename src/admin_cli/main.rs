use clap::{Parser, Subcommand};
use sea_orm::TransactionTrait;
use taller::{
    api::validation::{FieldErrors, normalize_email, require_email, require_string},
    config::DatabaseSettings,
    database::{self, DB, schema},
    services::{
        auth::{self, NewUser},
        permissions,
    },
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, verbatim_doc_comment)]
/// Command line administration for the taller service.
/// Creates and wipes the schema, seeds roles and manages user accounts.
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Schema and seed data.
    Db {
        #[command(subcommand)]
        db_command: DbCommand,
    },
    /// User accounts and their roles.
    User {
        #[command(subcommand)]
        user_command: UserCommand,
    },
}

#[derive(Subcommand, Debug)]
enum DbCommand {
    /// Creates every missing table from the entity definitions.
    Migrate,
    /// Inserts the permission catalogue and the admin, recepcion and mecanico roles.
    Seed,
    /// Drops ALL application tables. Use with care!
    Wipe {
        /// Skip the confirmation check.
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    /// Creates a user account.
    Create {
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        #[arg(long)]
        password: String,

        /// Role to assign right away (admin, recepcion, mecanico).
        #[arg(long)]
        role: Option<String>,

        /// Mark the email address as already verified.
        #[arg(long)]
        verified: bool,
    },
    /// Gives an existing user one more role.
    AssignRole {
        #[arg(long)]
        email: String,

        #[arg(long)]
        role: String,
    },
}

async fn get_db_connection() -> Result<DB, Box<dyn std::error::Error>> {
    let settings = DatabaseSettings::from_env()?;
    Ok(database::connect_with_settings(&settings).await?)
}

fn describe(errors: &FieldErrors) -> String {
    errors
        .fields()
        .filter_map(|field| errors.first(field))
        .collect::<Vec<_>>()
        .join(" ")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    let cli = Cli::parse();
    let db = get_db_connection().await?;

    match cli.command {
        Commands::Db { db_command } => match db_command {
            DbCommand::Migrate => {
                schema::create_tables(&db).await?;
                println!("Schema is up to date.");
            }
            DbCommand::Seed => {
                permissions::seed_roles(&db).await?;
                println!("Roles and permissions seeded.");
            }
            DbCommand::Wipe { yes } => {
                if !yes {
                    return Err("Refusing to drop every table without --yes".into());
                }
                schema::drop_tables(&db).await?;
                println!("All tables dropped.");
            }
        },
        Commands::User { user_command } => match user_command {
            UserCommand::Create {
                name,
                email,
                password,
                role,
                verified,
            } => {
                let email = normalize_email(&email);
                let mut errors = FieldErrors::new();
                require_string(&mut errors, "name", &name);
                require_email(&mut errors, "email", &email);
                if password.chars().count() < 8 {
                    errors.add("password", "The password field must be at least 8 characters.");
                }
                if !errors.is_empty() {
                    return Err(describe(&errors).into());
                }

                let password_hash = auth::hash_password(&password)?;
                let txn = db.begin().await?;
                let account = auth::create_user(
                    &txn,
                    NewUser {
                        name: &name,
                        email: &email,
                        password: &password,
                        verified,
                    },
                    password_hash,
                )
                .await?;
                if let Some(role) = role.as_deref() {
                    permissions::assign_role(&txn, account.id, role).await?;
                }
                txn.commit().await?;

                println!(
                    "Created user {} <{}> with id {}{}",
                    account.name,
                    account.email,
                    account.id,
                    role.map(|r| format!(" and role {}", r)).unwrap_or_default()
                );
            }
            UserCommand::AssignRole { email, role } => {
                let account = auth::find_user_by_email(&db, &email)
                    .await?
                    .ok_or_else(|| format!("No user with email {}", email))?;
                permissions::assign_role(&db, account.id, &role).await?;
                println!("Role {} assigned to {}.", role, account.email);
            }
        },
    }

    Ok(())
}
