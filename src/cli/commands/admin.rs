use clap::Subcommand;
use serde_json::json;
use std::sync::Arc;

use crate::auth::TokenService;
use crate::cli::utils::output_success;
use crate::cli::{connect, OutputFormat};
use crate::services::{AdminCreateUserRequest, IdentityRegistry};
use crate::storage::LocalFileStore;
use crate::types::Role;

#[derive(Subcommand)]
pub enum AdminCommands {
    #[command(about = "Create an administrator account")]
    Create {
        #[arg(long, help = "Login email")]
        email: String,

        #[arg(long, help = "Initial password")]
        password: String,

        #[arg(long, help = "First name")]
        first_name: String,

        #[arg(long, help = "Last name")]
        last_name: String,
    },
}

pub async fn handle(cmd: AdminCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        AdminCommands::Create {
            email,
            password,
            first_name,
            last_name,
        } => {
            let (config, pool) = connect().await?;
            let pictures = LocalFileStore::open(&config.storage.picture_dir).await?;
            let registry = IdentityRegistry::new(
                pool,
                TokenService::from_config(&config.security),
                Arc::new(pictures),
                config.storage.max_picture_bytes,
            );

            let user = registry
                .admin_create(AdminCreateUserRequest {
                    first_name: Some(first_name),
                    last_name: Some(last_name),
                    email: Some(email),
                    password: Some(password),
                    role: Some(Role::Admin.to_string()),
                    ..AdminCreateUserRequest::default()
                })
                .await?;

            output_success(
                &output_format,
                &format!("Administrator {} created (id {})", user.email, user.id),
                Some(json!({ "user": user })),
            )
        }
    }
}
