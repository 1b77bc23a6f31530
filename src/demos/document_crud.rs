//! Document CRUD Example
//!
//! Creates a scratch collection, writes and reads a few documents, pages
//! through them with a cursor and drops the collection again.
//!
//! Run with: cargo run --example document_crud -- http://localhost:8529

use c8db_rs::*;
use serde_json::json;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("c8db_rs=debug,c8db_core=debug")),
        )
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://localhost:8529".to_string());
    let connection = Arc::new(Connection::new(Config::from_url(&url))?);
    if let Ok(password) = std::env::var("C8DB_PASSWORD") {
        connection.use_basic_auth("root", &password);
    }

    let name = format!("demo_{}", uuid::Uuid::new_v4().simple());
    let users = connection.collection(name.as_str());
    users.create(json!({})).await?;
    println!("✅ Created collection {}\n", users.name());

    let alice = users.save(&json!({"name": "Alice", "age": 31}), true).await?;
    println!("📝 Saved {} (rev {})", alice.id, alice.rev);

    let updated = users
        .update(
            alice.key.as_str(),
            &json!({"age": 32, "nickname": null}),
            WriteOptions::default().keep_null(false).return_new(true),
        )
        .await?;
    println!("   Updated to rev {}", updated.rev);

    let rows = (0..5).map(|i| json!({"_key": format!("u{}", i), "n": i})).collect::<Vec<_>>();
    let imported = users.import(rows, &ImportOptions::default()).await?;
    println!("📦 Imported {} documents ({} errors)\n", imported.created, imported.errors);

    let opts = SimpleQueryOptions {
        batch_size: Some(2),
        ..Default::default()
    };
    let mut cursor = users.all(&opts).await?;
    println!("🔍 All documents:");
    while cursor.has_next() {
        let doc = cursor.next().await?;
        println!("   {}", doc["_key"]);
    }

    match users.document_graceful("missing").await? {
        Some(doc) => println!("\nUnexpected document: {}", doc),
        None => println!("\nDocument 'missing' does not exist"),
    }

    users.drop_collection(false).await?;
    println!("🗑  Dropped collection {}", name);

    Ok(())
}
