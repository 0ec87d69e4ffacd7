use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use portfolio_sdk::multipart::mime_for_path;
use portfolio_sdk::{
    ApiClient, ClientError, ListQuery, MultipartForm, ResourceClient, ResourceId, SortSpec, StaticToken,
};
use serde::Serialize;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Resource client for the portfolio gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    /// Bearer token; switches to the private client.
    #[arg(short, long, env = "GATEWAY_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List a page of a resource
    List {
        resource: String,
        #[arg(long, default_value_t = 0)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        size: u32,
        /// Sort column
        #[arg(long)]
        sort: Option<String>,
        #[arg(long, requires = "sort")]
        desc: bool,
        /// Column filter as key=value, repeatable
        #[arg(long = "filter", value_parser = parse_pair)]
        filters: Vec<(String, String)>,
        /// Resource has no partialList endpoint
        #[arg(long)]
        unpaged: bool,
    },
    /// Fetch one record
    Get { resource: String, id: ResourceId },
    /// Look a record up by parameters (key=value)
    Find {
        resource: String,
        #[arg(value_parser = parse_pair, required = true)]
        params: Vec<(String, String)>,
    },
    /// Download an export
    Export {
        resource: String,
        #[arg(long = "type", default_value = "pdf")]
        kind: String,
        #[arg(long, default_value = "all")]
        scope: String,
        #[arg(long, value_delimiter = ',')]
        ids: Vec<ResourceId>,
        /// Output file; defaults to the server-suggested name
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Delete one or more records
    Delete {
        resource: String,
        #[arg(required = true)]
        ids: Vec<ResourceId>,
    },
    /// Apply a state transition, e.g. `mark messages markAsRead --id 7`
    Mark {
        resource: String,
        path: String,
        #[arg(long, required_unless_present = "all", conflicts_with = "all")]
        id: Option<ResourceId>,
        /// Apply to every record (`PUT /<path>`)
        #[arg(long)]
        all: bool,
    },
    /// Create or update a record with a file attachment
    Upload {
        resource: String,
        #[arg(long)]
        file: PathBuf,
        #[arg(long, default_value = "file")]
        field: String,
        /// JSON part as name=<json>, repeatable
        #[arg(long = "json", value_parser = parse_pair)]
        json: Vec<(String, String)>,
        #[arg(long)]
        update: bool,
    },
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let api = match cli.token {
        Some(token) => ApiClient::private(&cli.url, Arc::new(StaticToken::new(token)))?,
        None => ApiClient::public(&cli.url)?,
    };

    if let Err(e) = run(api, cli.command).await {
        report(&e);
        std::process::exit(1);
    }
    Ok(())
}

async fn run(api: ApiClient, command: Commands) -> Result<(), ClientError> {
    match command {
        Commands::List {
            resource,
            page,
            size,
            sort,
            desc,
            filters,
            unpaged,
        } => {
            let client: ResourceClient<Value> = if unpaged {
                api.unpaged_resource(&resource)
            } else {
                api.resource(&resource)
            };
            let mut query = ListQuery::new(page, size);
            if let Some(column) = sort {
                query = query.sort_by(if desc { SortSpec::desc(column) } else { SortSpec::asc(column) });
            }
            for (id, value) in filters {
                query = query.filter(id, value);
            }
            print_json(&client.get_all(&query).await?)
        }
        Commands::Get { resource, id } => {
            print_json(&api.resource::<Value>(&resource).get_one(id).await?)
        }
        Commands::Find { resource, params } => {
            print_json(&api.resource::<Value>(&resource).get_by_params(params).await?)
        }
        Commands::Export {
            resource,
            kind,
            scope,
            ids,
            out,
        } => {
            let file = api.resource::<Value>(&resource).export_data(&kind, &scope, &ids).await?;
            let path = out
                .or_else(|| file.file_name.clone().map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from(format!("{resource}-export.{kind}")));
            tokio::fs::write(&path, &file.bytes)
                .await
                .map_err(|source| ClientError::Io {
                    path: path.clone(),
                    source,
                })?;
            println!("wrote {} bytes to {}", file.bytes.len(), path.display());
            Ok(())
        }
        Commands::Delete { resource, ids } => {
            let client = api.resource::<Value>(&resource);
            let ack = match ids.as_slice() {
                [id] => client.delete(*id).await?,
                many => client.delete_multiple(many).await?,
            };
            print_json(&ack)
        }
        Commands::Mark {
            resource,
            path,
            id,
            ..
        } => {
            let client = api.resource::<Value>(&resource);
            match id {
                Some(id) => print_json(&client.update_by_id::<Value>(id, &path).await?),
                None => print_json(&client.put_all(&path).await?),
            }
        }
        Commands::Upload {
            resource,
            file,
            field,
            json,
            update,
        } => {
            let mut form = MultipartForm::new();
            for (name, raw) in json {
                let value: Value = serde_json::from_str(&raw).map_err(ClientError::Encode)?;
                form = form.json(name, &value)?;
            }
            let mime = mime_for_path(&file);
            let form = form.file_from_path(field, &file, mime).await?;

            let client = api.resource::<Value>(&resource);
            let saved = if update {
                client.update_multipart(form).await?
            } else {
                client.create_multipart(form).await?
            };
            print_json(&saved)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), ClientError> {
    println!("{}", serde_json::to_string_pretty(value).map_err(ClientError::Encode)?);
    Ok(())
}

fn report(error: &ClientError) {
    match error.api() {
        Some(api) => {
            eprintln!("Error: gateway returned {}", api.status);
            eprintln!("Message: {}", api.message());
            for (field, message) in api.field_errors() {
                eprintln!("  {field}: {message}");
            }
            for message in api.general_errors() {
                eprintln!("  {message}");
            }
        }
        None => eprintln!("Error: {error}"),
    }
}
