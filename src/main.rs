use anyhow::Result;
use clap::Parser;
use querysmith::config::Config;
use querysmith::executor::{ExecutionOutcome, QueryExecutor};
use querysmith::gateway::LlmGateway;
use querysmith::pipeline::QueryPipeline;
use querysmith::schema;
use querysmith::validator::{DataProbe, FeasibilityValidator, MySqlProbe};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "querysmith")]
#[command(about = "Generate and run MySQL statements from natural language")]
struct Args {
    /// The request in natural language
    request: String,

    /// Target database (defaults to MYSQL_DATABASE)
    #[arg(short, long)]
    database: Option<String>,

    /// Execute the generated statement and print advisories
    #[arg(short, long)]
    execute: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = Config::from_env()?;
    let database = args
        .database
        .unwrap_or_else(|| config.mysql.database.clone());

    info!("Request: {}", args.request);
    info!("Database: {}", database);

    let snapshot = schema::introspect_schema(&config.mysql, &database).await?;

    let gateway = Arc::new(LlmGateway::from_config(&config.providers));
    info!("Provider chain: {:?}", gateway.provider_names());

    let probe: Arc<dyn DataProbe> =
        Arc::new(MySqlProbe::new(config.mysql.clone(), database.clone()));
    let validator = FeasibilityValidator::new(Arc::clone(&gateway), Some(probe));
    let pipeline = QueryPipeline::new(gateway, validator);

    let ctx = pipeline.run(&args.request, &database, snapshot).await;

    if let Some(error) = &ctx.error {
        println!("ERROR: {}", error);
        return Ok(());
    }

    let statement = match &ctx.statement {
        Some(statement) => statement.clone(),
        None => {
            println!("Failed to generate a SQL statement.");
            return Ok(());
        }
    };

    println!("\nGenerated SQL:\n{}", statement);

    if args.execute {
        let executor = QueryExecutor::for_mysql(config.mysql.clone(), database);
        let report = executor.run(&statement).await?;

        println!("\nOperation: {:?}", report.operation);
        match report.outcome {
            ExecutionOutcome::Rows(rows) => {
                println!("Results ({} rows):", rows.len());
                for row in rows {
                    println!("{}", serde_json::to_string(&row)?);
                }
            }
            ExecutionOutcome::Affected(count) => {
                println!("Rows affected: {}", count);
            }
        }

        if !report.advisories.is_empty() {
            println!("\nOptimization tips:");
            for advisory in report.advisories {
                println!("- {}", advisory.message);
            }
        }
    }

    Ok(())
}
