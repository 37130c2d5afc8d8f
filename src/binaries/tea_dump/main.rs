use std::collections::HashSet;

use clap::Parser;
use common_base::iterator::{AsyncIterator, AsyncIterators};
use iotdb_tsdb::tea::TeaFileReader;
use iotdb_utils::time::time_format;
use serde::Deserialize;
use serde::Serialize;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Parser)]
#[clap(about, version, author)]
struct Config {
    /// day or archive files, dumped in the given order
    #[clap(long, required = true)]
    pub path: Vec<String>,

    /// only print records of these entity ids
    #[clap(long)]
    pub id: Vec<i64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    tracing::info!("config: {:?}", config);
    if config.path.iter().any(|p| p.is_empty()) {
        println!("path MUST not be empty!");
        return Ok(());
    }

    let mut readers = Vec::with_capacity(config.path.len());
    for path in &config.path {
        let reader = TeaFileReader::open(path).await?;
        println!("{}: {} records", path, reader.remaining());
        readers.push(reader);
    }

    let ids: HashSet<i64> = config.id.iter().copied().collect();
    let mut itr = AsyncIterators::new(readers);
    let mut i = 0;
    while let Some(item) = itr.try_next().await? {
        if !ids.is_empty() && !ids.contains(&item.entity_id) {
            continue;
        }
        println!(
            "{:010}> {} | {} | {:.4}",
            i,
            time_format(item.timestamp),
            item.entity_id,
            item.value
        );
        i += 1;
    }

    Ok(())
}
