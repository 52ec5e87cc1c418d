use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use saturn_codes::{
    config::{database, settings},
    core::{
        code::assign_code_with,
        template as templates,
        variant::{self as variants, AttributeOptions, Attributes},
    },
    errors::Result,
};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "saturn")]
#[command(version)]
#[command(about = "Manage item templates, variants and their Saturn Codes")]
struct Cli {
    /// Path to the settings file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database tables
    Init,

    /// Manage template items
    #[command(subcommand)]
    Template(TemplateCommand),

    /// Create and list variants
    #[command(subcommand)]
    Variant(VariantCommand),

    /// Show the code the next variant of a template would get
    Preview {
        /// Template item name
        template: String,
    },

    /// Assign codes to variants stored without one
    Backfill,
}

#[derive(Subcommand)]
enum TemplateCommand {
    /// Add a template item
    Add {
        /// Item name (identifier)
        name: String,
        /// Display name used for the code abbreviation
        #[arg(long)]
        item_name: String,
        /// Group number
        #[arg(long)]
        group_number: Option<String>,
    },
    /// Set a template's group number
    SetGroup {
        /// Template item name
        name: String,
        /// New group number
        group_number: String,
    },
    /// Change what a template's variants are based on
    SetBasedOn {
        /// Template item name
        name: String,
        /// "Item Attribute" or "Manufacturer"
        based_on: String,
    },
}

#[derive(Subcommand)]
enum VariantCommand {
    /// Create one variant, e.g. `--attr Colour=Red --attr Size=L`
    Create {
        /// Template item name
        template: String,
        /// Attribute as NAME=VALUE
        #[arg(long = "attr", value_parser = parse_attribute, required = true)]
        attributes: Vec<(String, String)>,
    },
    /// Create every missing combination, e.g. `--attr Colour=Red,Blue --attr Size=S,M`
    Bulk {
        /// Template item name
        template: String,
        /// Attribute as NAME=VALUE[,VALUE...]
        #[arg(long = "attr", value_parser = parse_attribute, required = true)]
        attributes: Vec<(String, String)>,
    },
    /// List a template's variants
    List {
        /// Template item name
        template: String,
    },
}

fn parse_attribute(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .filter(|(name, value)| !name.is_empty() && !value.is_empty())
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))
}

fn to_options(attributes: Vec<(String, String)>) -> AttributeOptions {
    let mut options = AttributeOptions::new();
    for (name, values) in attributes {
        options.entry(name).or_default().extend(
            values
                .split(',')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(ToString::to_string),
        );
    }
    options
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file, env vars can also be set externally
    dotenv().ok();

    let cli = Cli::parse();

    // 3. Load settings
    let settings = settings::load_settings_or_default(&cli.config)
        .inspect_err(|e| error!("Failed to load settings: {}", e))?;

    // 4. Connect to the database
    let database_url = database::get_database_url(settings.database.url.as_deref());
    let db = database::create_connection(&database_url)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db).await?;

    let codes = settings.codes;
    match cli.command {
        Commands::Init => info!("Database ready at {database_url}"),
        Commands::Template(TemplateCommand::Add {
            name,
            item_name,
            group_number,
        }) => {
            let created =
                templates::create_template(&db, &name, &item_name, group_number.as_deref()).await?;
            println!("{}", created.name);
        }
        Commands::Template(TemplateCommand::SetGroup { name, group_number }) => {
            templates::set_group_number(&db, &name, &group_number).await?;
        }
        Commands::Template(TemplateCommand::SetBasedOn { name, based_on }) => {
            templates::update_variant_based_on(&db, &name, &based_on).await?;
        }
        Commands::Variant(VariantCommand::Create {
            template,
            attributes,
        }) => {
            let attributes: Attributes = attributes.into_iter().collect();
            let created = variants::create_variant(&db, &template, &attributes, &codes).await?;
            println!(
                "{}\t{}",
                created.saturn_code.unwrap_or_default(),
                created.name
            );
        }
        Commands::Variant(VariantCommand::Bulk {
            template,
            attributes,
        }) => {
            let options = to_options(attributes);
            for created in variants::create_multiple_variants(&db, &template, &options, &codes).await? {
                println!(
                    "{}\t{}",
                    created.saturn_code.unwrap_or_default(),
                    created.name
                );
            }
        }
        Commands::Variant(VariantCommand::List { template }) => {
            templates::get_template(&db, &template).await?;
            for listed in variants::list_variants(&db, &template).await? {
                println!(
                    "{}\t{}",
                    listed.saturn_code.unwrap_or_default(),
                    listed.name
                );
            }
        }
        Commands::Preview { template } => {
            println!("{}", assign_code_with(&db, &template, None, &codes).await?);
        }
        Commands::Backfill => {
            let report = variants::backfill_missing_codes(&db, &codes).await?;
            for (name, code) in &report.assigned {
                println!("{code}\t{name}");
            }
            for (name, err) in &report.failed {
                error!("{name}: {err}");
            }
            report.ensure_complete()?;
        }
    }

    Ok(())
}
