//! Tests against a running Elasticsearch at localhost:9200 and a MySQL server
//! configured through the usual `MYSQL_*` variables.
#![cfg(feature = "live_test")]

use anyhow::Result;
use elastic_etl_rs::cli::ExtraColumns;
use elastic_etl_rs::config::{SourceConfig, StoreConfig};
use elastic_etl_rs::elasticsearch::create_client;
use elastic_etl_rs::pipeline::{Pipeline, PipelineOptions};
use elastic_etl_rs::source::ElasticSource;
use elastic_etl_rs::store::MySqlStore;
use elasticsearch::{
    Elasticsearch,
    http::request::JsonBody,
    indices::{IndicesCreateParts, IndicesDeleteParts, IndicesRefreshParts},
};
use serde_json::{Value, json};
use std::{
    path::Path,
    process::{Command, Stdio},
    sync::atomic::{AtomicU32, Ordering},
    thread,
    time::{Duration, Instant},
};
use tempfile::TempDir;
use url::Url;

const ES_URL: &str = "http://localhost:9200";
const TEST_INDEX_PREFIX: &str = "elastic_etl_test";
const TEST_DATABASE: &str = "elastic_etl_live_test";

// Unique index names keep parallel tests apart
static INDEX_COUNTER: AtomicU32 = AtomicU32::new(0);

fn get_unique_test_index() -> String {
    let counter = INDEX_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("{}_{}_{}", TEST_INDEX_PREFIX, std::process::id(), counter)
}

fn source_config(page_size: usize) -> Result<SourceConfig> {
    Ok(SourceConfig {
        host: Url::parse(ES_URL)?,
        username: std::env::var("ES_USER").ok(),
        password: std::env::var("ES_PASSWORD").ok(),
        page_size,
        scroll_ttl: "1m".to_string(),
        compress: false,
    })
}

fn store_config() -> StoreConfig {
    StoreConfig {
        host: std::env::var("MYSQL_HOST").unwrap_or_else(|_| "localhost".into()),
        port: std::env::var("MYSQL_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3306),
        user: std::env::var("MYSQL_USER").unwrap_or_else(|_| "root".into()),
        password: std::env::var("MYSQL_PASSWORD").ok(),
        database: TEST_DATABASE.to_string(),
    }
}

async fn wait_for_elasticsearch(client: &Elasticsearch) -> Result<()> {
    for attempt in 1..=5 {
        match client.ping().send().await {
            Ok(_) => return Ok(()),
            Err(err) if attempt == 5 => {
                return Err(anyhow::anyhow!(
                    "Failed to connect to Elasticsearch: {}",
                    err
                ));
            }
            Err(err) => {
                println!("Connection failed: {}. Retrying in 2 seconds...", err);
                thread::sleep(Duration::from_secs(2));
            }
        }
    }
    unreachable!()
}

/// Create `test_index` and bulk load `docs` into it
async fn setup_index(client: &Elasticsearch, test_index: &str, docs: Vec<Value>) -> Result<()> {
    wait_for_elasticsearch(client).await?;

    let _ = client
        .indices()
        .delete(IndicesDeleteParts::Index(&[test_index]))
        .send()
        .await;

    let create_response = client
        .indices()
        .create(IndicesCreateParts::Index(test_index))
        .body(json!({
            "settings": { "number_of_shards": 1, "number_of_replicas": 0 }
        }))
        .send()
        .await?;
    assert!(
        create_response.status_code().is_success(),
        "Failed to create index: {:?}",
        create_response.text().await?
    );

    for chunk in docs.chunks(500) {
        let mut body: Vec<JsonBody<Value>> = Vec::with_capacity(chunk.len() * 2);
        for doc in chunk {
            match doc.get("id") {
                Some(id) => body.push(json!({ "index": { "_id": id } }).into()),
                None => body.push(json!({ "index": {} }).into()),
            }
            body.push(doc.clone().into());
        }

        let response = client
            .bulk(elasticsearch::BulkParts::Index(test_index))
            .body(body)
            .send()
            .await?;
        let response_body: Value = response.json().await?;
        assert!(
            !response_body["errors"].as_bool().unwrap_or(false),
            "Bulk insert reported errors: {}",
            response_body
        );
    }

    client
        .indices()
        .refresh(IndicesRefreshParts::Index(&[test_index]))
        .send()
        .await?;
    Ok(())
}

async fn cleanup(client: &Elasticsearch, store: &MySqlStore, test_index: &str) -> Result<()> {
    let _ = client
        .indices()
        .delete(IndicesDeleteParts::Index(&[test_index]))
        .send()
        .await;
    sqlx::query(&format!("DROP TABLE IF EXISTS `{}`", test_index))
        .execute(store.pool())
        .await?;
    Ok(())
}

async fn row_count(store: &MySqlStore, table: &str) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM `{}`", table))
        .fetch_one(store.pool())
        .await?;
    Ok(count)
}

fn artifact_len(dir: &Path, index: &str) -> Result<usize> {
    let text = std::fs::read_to_string(dir.join(format!("{}.json", index)))?;
    let docs: Vec<Value> = serde_json::from_str(&text)?;
    Ok(docs.len())
}

fn sample_docs(count: u32) -> Vec<Value> {
    (1..=count)
        .map(|i| {
            json!({
                "id": i.to_string(),
                "name": format!("Test Document {}", i),
                "score": i as f64 / 2.0,
                "rank": i,
                "tags": ["test", if i % 2 == 0 { "even" } else { "odd" }],
                "meta": { "source": "live", "bucket": i % 10 }
            })
        })
        .collect()
}

#[tokio::test]
async fn test_pipeline_loads_index() -> Result<()> {
    let test_index = get_unique_test_index();
    let config = source_config(25)?;
    let client = create_client(&config)?;
    setup_index(&client, &test_index, sample_docs(100)).await?;

    let store = MySqlStore::connect(&store_config()).await?;
    let source = ElasticSource::new(client.clone(), &config);
    let dir = TempDir::new()?;
    let options = PipelineOptions {
        batch_size: 30,
        output_dir: dir.path().to_path_buf(),
        extra_columns: ExtraColumns::Drop,
    };

    let report = Pipeline::new(&source, &store, options.clone())
        .run(&[test_index.clone()])
        .await;
    assert_eq!(report.success_count(), 1, "{:?}", report.failures());
    assert_eq!(artifact_len(dir.path(), &test_index)?, 100);
    assert_eq!(row_count(&store, &test_index).await?, 100);

    // running again updates rows in place
    let report = Pipeline::new(&source, &store, options)
        .run(&[test_index.clone()])
        .await;
    assert_eq!(report.success_count(), 1);
    assert_eq!(row_count(&store, &test_index).await?, 100);

    let (meta, score): (String, f64) = sqlx::query_as(&format!(
        "SELECT `meta`, `score` FROM `{}` WHERE `id` = '7'",
        test_index
    ))
    .fetch_one(store.pool())
    .await?;
    let meta: Value = serde_json::from_str(&meta)?;
    assert_eq!(meta, json!({ "source": "live", "bucket": 7 }));
    assert_eq!(score, 3.5);

    cleanup(&client, &store, &test_index).await?;
    store.close().await;
    Ok(())
}

#[tokio::test]
async fn test_binary_reports_missing_index() -> Result<()> {
    let test_index = get_unique_test_index();
    let config = source_config(50)?;
    let client = create_client(&config)?;
    setup_index(&client, &test_index, sample_docs(10)).await?;
    let dir = TempDir::new()?;
    let output_dir = dir.path().to_string_lossy().to_string();
    let indices = format!("{},{}_missing", test_index, test_index);

    let output = Command::new("cargo")
        .args(["run", "--"])
        .args([
            "--indices",
            &indices,
            "--output-dir",
            &output_dir,
            "--mysql-database",
            TEST_DATABASE,
            "--log-file",
            "-",
            "--quiet",
        ])
        .stderr(Stdio::inherit())
        .output()?;

    assert!(output.status.success(), "elastic-etl-rs command failed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("ETL run completed: 1 OK, 0 FAIL"), "{}", stdout);
    assert!(stdout.contains(&format!("Index '{}_missing' not found", test_index)));
    assert_eq!(artifact_len(dir.path(), &test_index)?, 10);

    let store = MySqlStore::connect(&store_config()).await?;
    assert_eq!(row_count(&store, &test_index).await?, 10);
    cleanup(&client, &store, &test_index).await?;
    store.close().await;
    Ok(())
}

#[cfg(feature = "large_scale_test")]
#[tokio::test]
async fn test_large_scale_load() -> Result<()> {
    let test_index = get_unique_test_index();
    let config = source_config(1000)?;
    let client = create_client(&config)?;

    let docs: Vec<Value> = (1..=20_000u32)
        .map(|i| {
            json!({
                "id": i.to_string(),
                "name": format!("Bulk Test Document {}", i),
                "extra": lipsum::lipsum(60),
                "nested_field": { "value1": format!("nested value {}", i), "value2": i * 10 },
                "array_field": [i, i * 2, i * 3]
            })
        })
        .collect();
    setup_index(&client, &test_index, docs).await?;

    let store = MySqlStore::connect(&store_config()).await?;
    let source = ElasticSource::new(client.clone(), &config);
    let dir = TempDir::new()?;
    let options = PipelineOptions {
        batch_size: 1000,
        output_dir: dir.path().to_path_buf(),
        extra_columns: ExtraColumns::Drop,
    };

    let start = Instant::now();
    let report = Pipeline::new(&source, &store, options)
        .run(&[test_index.clone()])
        .await;
    println!("Loaded 20000 documents in {:.2?}", start.elapsed());

    assert_eq!(report.success_count(), 1, "{:?}", report.failures());
    assert_eq!(report.total_documents(), 20_000);
    assert_eq!(row_count(&store, &test_index).await?, 20_000);

    cleanup(&client, &store, &test_index).await?;
    store.close().await;
    Ok(())
}
