use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::output_empty_collection;
use crate::cli::{connect, OutputFormat};
use crate::services::ModerationEngine;

#[derive(Subcommand)]
pub enum DatasetCommands {
    #[command(about = "List datasets waiting for review")]
    Pending,
}

pub async fn handle(cmd: DatasetCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        DatasetCommands::Pending => {
            let (_, pool) = connect().await?;
            let pending = ModerationEngine::new(pool).list_pending().await?;

            if pending.is_empty() {
                return output_empty_collection(&output_format, "datasets", "No datasets awaiting review");
            }

            match output_format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&json!({ "datasets": pending }))?);
                }
                OutputFormat::Text => {
                    println!("{:<6} {:<30} {:<15} {:<10} {:<28} {}", "ID", "NAME", "CATEGORY", "SIZE", "UPLOADER", "UPDATED");
                    println!("{}", "-".repeat(110));

                    for detail in &pending {
                        let dataset = &detail.dataset;
                        println!(
                            "{:<6} {:<30} {:<15} {:<10} {:<28} {}",
                            dataset.id,
                            dataset.name,
                            dataset.category,
                            dataset.size,
                            detail.uploader_email,
                            dataset.last_updated.format("%Y-%m-%d %H:%M")
                        );
                    }
                }
            }

            Ok(())
        }
    }
}
