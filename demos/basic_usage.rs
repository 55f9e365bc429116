//! Basic usage example for the dataapi-rs client.

use dataapi_rs::{params, Connection, Params};
use futures_util::FutureExt;
use std::error::Error;

const REGION: &str = "eu-west-1";
const ACCOUNT: &str = "123456789012";
const CLUSTER: &str = "my-cluster";
const SECRET: &str = "my-secret";
const DATABASE: &str = "app";

/// Opens a connection that waits for a paused cluster to resume.
fn example_connection() -> Result<Connection, Box<dyn Error>> {
    let url = format!(
        "awsrds://{}:{}@{}.{}.aws/{}?maxconcurrency=4&awaitstartup=true&querytimeout=45000",
        DATABASE, SECRET, REGION, ACCOUNT, CLUSTER
    );
    Ok(Connection::connect(&url)?)
}

/// Runs a positional query and returns the number of rows.
async fn example_simple_select(conn: &Connection) -> Result<usize, Box<dyn Error>> {
    let result = conn
        .query(
            "select tablename::text from pg_tables where schemaname = $1",
            Params::positional(["pg_catalog"]),
        )
        .await?;
    Ok(result.rows().len())
}

/// Creates a table, fills it inside a transaction, reads it back and drops it.
async fn example_transaction(conn: &Connection) -> Result<usize, Box<dyn Error>> {
    conn.query(
        "create table if not exists ::table (id serial primary key, name text, created_at timestamp)",
        params! { "table" => "example_users" },
    )
    .await?;

    conn.transaction(|tx| {
        async move {
            for name in ["Alice", "Bob", "Charlie"] {
                tx.query(
                    "insert into ::table (name, created_at) values (:name, now())",
                    params! { "table" => "example_users", "name" => name },
                )
                .await?;
            }
            Ok(())
        }
        .boxed()
    })
    .await?;

    let result = conn
        .query(
            "select id, name, created_at from ::table order by id",
            params! { "table" => "example_users" },
        )
        .await?;
    for row in result.rows() {
        println!("  {}", serde_json::to_string(row)?);
    }

    conn.query("drop table ::table", params! { "table" => "example_users" })
        .await?;
    Ok(result.rows().len())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let conn = example_connection()?;
    println!("Cluster running: {}", conn.await_startup().await);

    let rows = example_simple_select(&conn).await?;
    println!("Simple select: {} row(s)", rows);

    let rows = example_transaction(&conn).await?;
    println!("Transaction: {} row(s)", rows);

    conn.close().await?;
    println!("Done");

    Ok(())
}
