use std::path::Path;

use anyhow::Context;
use clap::Args;
use scandesk_core::TagId;
use scandesk_storage::SqliteTagDirectory;

use crate::console::OutputFormat;

#[derive(Debug, Args)]
pub struct AddUserArgs {
    /// Name shown on login
    pub name: String,

    /// Badge tag as read by the RFID reader (8-20 hex characters)
    pub tag: String,
}

pub async fn execute(
    args: &AddUserArgs,
    config_path: Option<&Path>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let tag = TagId::parse(&args.tag).context("invalid badge tag")?;
    let config = super::load_config(config_path)?;
    let db = super::open_database(&config).await?;

    let directory = SqliteTagDirectory::new(db.pool().clone());
    let user = directory
        .add_user(&args.name, &tag)
        .await
        .context("failed to register user")?;
    db.close().await;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&user)?),
        OutputFormat::Text => println!("✓ {} (user {}) registered with tag {tag}", user.display_name, user.id),
    }
    Ok(())
}
