//! End-to-end marshalling through a connection: placeholder rewriting,
//! parameter encoding, result decoding and transaction statements.

mod common;

use chrono::{TimeZone, Utc};
use common::*;
use dataapi_rs::query::{
    DatetimeConversion, FormatOptions, ParamSet, ParameterFormatter, TimeZoneMode,
};
use dataapi_rs::transport::{BatchExecuteStatementResponse, ExecuteStatementResponse, UpdateResultEntry};
use dataapi_rs::types::{ArrayValue, ColumnMetadata, WireValue};
use dataapi_rs::{params, Params, QueryOptions, Value};
use futures_util::FutureExt;
use serde_json::json;

#[tokio::test]
async fn test_positional_placeholder_is_rewritten_and_bound() {
    let transport = ScriptedTransport::new();
    let connection = warm_connection(test_params().build().unwrap(), transport.clone());

    connection
        .query(
            "select * from t where name = $1",
            Params::positional(["pg_tables"]),
        )
        .await
        .unwrap();

    let request = transport.last_executed();
    assert_eq!(request.sql, "select * from t where name = :posparam1");
    assert_eq!(
        serde_json::to_value(&request.parameters).unwrap(),
        json!([{ "name": "posparam1", "value": { "stringValue": "pg_tables" } }])
    );
    assert_eq!(request.database.as_deref(), Some("app"));
    assert!(request.include_result_metadata);
}

#[tokio::test]
async fn test_named_and_identifier_placeholders() {
    let transport = ScriptedTransport::new();
    let connection = warm_connection(test_params().build().unwrap(), transport.clone());

    connection
        .query(
            "SELECT ::column FROM ::table WHERE id = :id",
            params! {
                "column" => "full_name",
                "table" => "crm.users",
                "id" => 42,
                "unused" => true,
            },
        )
        .await
        .unwrap();

    let request = transport.last_executed();
    assert_eq!(
        request.sql,
        r#"SELECT "full_name" FROM "crm"."users" WHERE id = :id"#
    );
    assert_eq!(
        serde_json::to_value(&request.parameters).unwrap(),
        json!([{ "name": "id", "value": { "longValue": 42 } }])
    );
}

#[tokio::test]
async fn test_stringified_array_column() {
    let transport = ScriptedTransport::new();
    let connection = warm_connection(test_params().build().unwrap(), transport.clone());
    transport.respond(Ok(ExecuteStatementResponse {
        records: Some(vec![vec![WireValue::Array(ArrayValue::Strings(vec![
            "a".to_string(),
            "b".to_string(),
        ]))]]),
        column_metadata: Some(vec![ColumnMetadata::new("tags", "_text")]),
        ..Default::default()
    }));

    let options = QueryOptions::new().format(FormatOptions {
        stringify_arrays: true,
        ..Default::default()
    });
    let result = connection
        .query_with("SELECT tags FROM posts", Params::None, &options)
        .await
        .unwrap();

    assert_eq!(
        result.rows()[0].get("tags"),
        Some(&Value::String(r#"["a","b"]"#.to_string()))
    );
}

#[tokio::test]
async fn test_values_survive_a_wire_round_trip() {
    let timestamp = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 30).unwrap();
    let cases = vec![
        ("text", "varchar", Value::String("héllo".to_string())),
        ("flag", "bool", Value::Bool(true)),
        ("count", "int8", Value::Int(-17)),
        ("ratio", "float8", Value::Float(2.5)),
        ("missing", "varchar", Value::Null),
        ("payload", "bytea", Value::Bytes(vec![0, 159, 146, 150])),
        ("created", "timestamp", Value::Timestamp(timestamp)),
    ];

    let format = FormatOptions {
        datetime_conversion: DatetimeConversion::ToDate,
        ..Default::default()
    };

    let mut record = Vec::new();
    let mut columns = Vec::new();
    for (label, type_name, value) in &cases {
        let parameter = ParameterFormatter::format(label, value, &format).unwrap();
        record.push(parameter.value);
        columns.push(ColumnMetadata::new(*label, *type_name));
    }

    let transport = ScriptedTransport::new();
    let connection = warm_connection(test_params().build().unwrap(), transport.clone());
    transport.respond(Ok(ExecuteStatementResponse {
        records: Some(vec![record]),
        column_metadata: Some(columns),
        ..Default::default()
    }));

    let result = connection
        .query_with("SELECT *", Params::None, &QueryOptions::new().format(format))
        .await
        .unwrap();

    let row = &result.rows()[0];
    for (label, _, value) in &cases {
        assert_eq!(row.get(label), Some(value), "column {}", label);
    }
}

#[tokio::test]
async fn test_timestamp_columns_as_iso_strings() {
    let transport = ScriptedTransport::new();
    let params = test_params()
        .treat_as_time_zone(TimeZoneMode::Utc)
        .build()
        .unwrap();
    let connection = warm_connection(params, transport.clone());
    transport.respond(Ok(ExecuteStatementResponse {
        records: Some(vec![vec![WireValue::String("2024-03-09 14:05:30.250".to_string())]]),
        column_metadata: Some(vec![ColumnMetadata::new("created_at", "timestamp")]),
        ..Default::default()
    }));

    let result = connection.query("SELECT created_at", Params::None).await.unwrap();

    assert_eq!(
        result.rows()[0].get("created_at").and_then(Value::as_str),
        Some("2024-03-09T14:05:30.250Z")
    );
}

#[tokio::test]
async fn test_hydrated_rows_with_camel_case_labels() {
    let transport = ScriptedTransport::new();
    let params = test_params().convert_snake_to_camel(true).build().unwrap();
    let connection = warm_connection(params, transport.clone());
    transport.respond(Ok(ExecuteStatementResponse {
        records: Some(vec![
            vec![WireValue::Long(1), WireValue::String("Ann".to_string())],
            vec![WireValue::Long(2), WireValue::null()],
        ]),
        column_metadata: Some(vec![
            ColumnMetadata::new("user_id", "int4"),
            ColumnMetadata::new("first_name", "varchar"),
        ]),
        ..Default::default()
    }));

    let result = connection.query("SELECT user_id, first_name FROM users", Params::None).await.unwrap();

    let rows = result.rows();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("userId"), Some(&Value::Int(1)));
    assert_eq!(rows[0].get("firstName"), Some(&Value::String("Ann".to_string())));
    assert_eq!(rows[1].get("firstName"), Some(&Value::Null));
    assert_eq!(
        serde_json::to_value(&rows[0]).unwrap(),
        json!({ "userId": 1, "firstName": "Ann" })
    );
    assert!(result.number_of_records_updated.is_none());
}

#[tokio::test]
async fn test_positional_rows_without_hydration() {
    let transport = ScriptedTransport::new();
    let connection = warm_connection(test_params().build().unwrap(), transport.clone());
    transport.respond(Ok(ExecuteStatementResponse {
        records: Some(vec![vec![WireValue::Long(7), WireValue::Boolean(false)]]),
        ..Default::default()
    }));

    let options = QueryOptions::new().hydrate(false).format(FormatOptions {
        datetime_conversion: DatetimeConversion::KeepRaw,
        ..Default::default()
    });
    let result = connection
        .query_with("SELECT 7, false", Params::None, &options)
        .await
        .unwrap();

    assert!(!transport.last_executed().include_result_metadata);
    assert_eq!(
        result.rows()[0].clone().into_values(),
        vec![Value::Int(7), Value::Bool(false)]
    );
}

#[tokio::test]
async fn test_insert_reports_id_and_update_count() {
    let transport = ScriptedTransport::new();
    let connection = warm_connection(test_params().build().unwrap(), transport.clone());
    transport.respond(Ok(ExecuteStatementResponse {
        number_of_records_updated: Some(1),
        generated_fields: Some(vec![WireValue::Long(1001)]),
        ..Default::default()
    }));

    let result = connection
        .query(
            "INSERT INTO users (name) VALUES (:name) RETURNING id",
            params! { "name" => "Ann" },
        )
        .await
        .unwrap();

    assert_eq!(result.insert_id, Some(1001));
    assert_eq!(result.number_of_records_updated, Some(1));
    assert!(result.records.is_none());
}

#[tokio::test]
async fn test_begin_and_commit_statements() {
    let transport = ScriptedTransport::new();
    let connection = warm_connection(test_params().build().unwrap(), transport.clone());

    let begin = connection.query("BEGIN", Params::None).await.unwrap();
    assert_eq!(begin.transaction_id.as_deref(), Some("tx-1"));

    let err = connection.query("begin", Params::None).await.unwrap_err();
    assert_eq!(err.code(), "transaction-error");

    let result = connection
        .query("UPDATE users SET active = true", Params::None)
        .await
        .unwrap();
    assert_eq!(result.transaction_id.as_deref(), Some("tx-1"));
    assert_eq!(
        transport.last_executed().transaction_id.as_deref(),
        Some("tx-1")
    );

    let commit = connection.query("  COMMIT;", Params::None).await.unwrap();
    assert_eq!(commit.transaction_id.as_deref(), Some("tx-1"));
    assert_eq!(
        commit.transaction_status.as_deref(),
        Some("Transaction Committed")
    );
    assert_eq!(transport.commits.lock().len(), 1);
    assert!(!connection.in_transaction().await);

    connection.query("SELECT 1", Params::None).await.unwrap();
    assert!(transport.last_executed().transaction_id.is_none());
}

#[tokio::test]
async fn test_rollback_without_transaction_fails() {
    let transport = ScriptedTransport::new();
    let connection = warm_connection(test_params().build().unwrap(), transport.clone());

    let err = connection.query("ROLLBACK", Params::None).await.unwrap_err();
    assert_eq!(err.code(), "transaction-error");
    assert_eq!(transport.rollback_count(), 0);
}

#[tokio::test]
async fn test_batch_insert_ids() {
    let transport = ScriptedTransport::new();
    let connection = warm_connection(test_params().build().unwrap(), transport.clone());
    transport.respond_batch(Ok(BatchExecuteStatementResponse {
        update_results: vec![
            UpdateResultEntry {
                generated_fields: vec![WireValue::Long(1)],
            },
            UpdateResultEntry {
                generated_fields: vec![WireValue::Long(2)],
            },
        ],
    }));

    let rows = Params::Batch(vec![
        vec![
            ParamSet::map([("table", Value::from("users"))]),
            ParamSet::map([("name", Value::from("Ann"))]),
        ],
        vec![
            ParamSet::map([("table", Value::from("ignored"))]),
            ParamSet::map([("name", Value::from("Bob"))]),
        ],
    ]);
    let result = connection
        .batch_query("INSERT INTO ::table (name) VALUES (:name)", rows)
        .await
        .unwrap();

    let ids: Vec<_> = result.update_results.iter().map(|r| r.insert_id).collect();
    assert_eq!(ids, vec![Some(1), Some(2)]);

    let batch = transport.batches.lock()[0].clone();
    assert_eq!(batch.sql, r#"INSERT INTO "users" (name) VALUES (:name)"#);
    assert_eq!(
        serde_json::to_value(&batch.parameter_sets).unwrap(),
        json!([
            [{ "name": "name", "value": { "stringValue": "Ann" } }],
            [{ "name": "name", "value": { "stringValue": "Bob" } }]
        ])
    );
}

#[tokio::test]
async fn test_batch_params_rejected_by_query() {
    let transport = ScriptedTransport::new();
    let connection = warm_connection(test_params().build().unwrap(), transport.clone());

    let err = connection
        .query(
            "INSERT INTO t VALUES (:a)",
            Params::Batch(vec![vec![ParamSet::map([("a", 1)])]]),
        )
        .await
        .unwrap_err();

    assert_eq!(err.code(), "invalid-input");
    assert!(transport.executed.lock().is_empty());
}

#[tokio::test]
async fn test_unsupported_value_names_parameter() {
    let transport = ScriptedTransport::new();
    let connection = warm_connection(test_params().build().unwrap(), transport.clone());

    let err = connection
        .query(
            "SELECT :doc",
            params! { "doc" => Value::Json(json!({ "nested": true })) },
        )
        .await
        .unwrap_err();

    assert_eq!(err.code(), "invalid-type");
    assert_eq!(err.params()["name"], "doc");
}

#[tokio::test]
async fn test_transaction_closure_commits() {
    let transport = ScriptedTransport::new();
    let connection = warm_connection(test_params().build().unwrap(), transport.clone());

    let inserted = connection
        .transaction(|tx| {
            async move {
                let result = tx
                    .query("INSERT INTO t VALUES (:v)", params! { "v" => 1 })
                    .await?;
                Ok(result.transaction_id)
            }
            .boxed()
        })
        .await
        .unwrap();

    assert_eq!(inserted.as_deref(), Some("tx-1"));
    assert_eq!(transport.commits.lock().len(), 1);
    assert_eq!(transport.rollback_count(), 0);
    assert!(!connection.in_transaction().await);
}

#[tokio::test]
async fn test_transaction_closure_rolls_back_on_error() {
    let transport = ScriptedTransport::new();
    let connection = warm_connection(test_params().build().unwrap(), transport.clone());

    let err = connection
        .transaction(|tx| {
            async move {
                tx.query("SELECT :bad", params! { "bad" => f64::NAN }).await?;
                Ok(())
            }
            .boxed()
        })
        .await
        .unwrap_err();

    assert_eq!(err.code(), "invalid-type");
    assert_eq!(transport.commits.lock().len(), 0);
    assert_eq!(transport.rollback_count(), 1);
    assert_eq!(transport.rollbacks.lock()[0].transaction_id, "tx-1");
}

#[tokio::test]
async fn test_transaction_closure_rolls_back_when_commit_fails() {
    let transport = ScriptedTransport::new();
    let connection = warm_connection(test_params().build().unwrap(), transport.clone());
    transport.respond_commit(Err(dataapi_rs::TransportError::Http(
        "commit failed".to_string(),
    )));

    let err = connection
        .transaction(|tx| {
            async move {
                tx.query("INSERT INTO t VALUES (:v)", params! { "v" => 1 })
                    .await?;
                Ok(())
            }
            .boxed()
        })
        .await
        .unwrap_err();

    assert!(err.to_string().contains("commit failed"));
    assert_eq!(transport.commits.lock().len(), 1);
    assert_eq!(transport.rollback_count(), 1);
    assert_eq!(transport.rollbacks.lock()[0].transaction_id, "tx-1");
}

#[tokio::test]
async fn test_zero_padded_positional_placeholder_is_bound() {
    let transport = ScriptedTransport::new();
    let connection = warm_connection(test_params().build().unwrap(), transport.clone());

    connection
        .query("select $01, $2", Params::positional(["x", "y"]))
        .await
        .unwrap();

    let request = transport.last_executed();
    assert_eq!(request.sql, "select :posparam1, :posparam2");
    assert_eq!(
        serde_json::to_value(&request.parameters).unwrap(),
        json!([
            { "name": "posparam1", "value": { "stringValue": "x" } },
            { "name": "posparam2", "value": { "stringValue": "y" } }
        ])
    );
}

#[tokio::test]
async fn test_sql_rewrite_hooks_run_before_dispatch() {
    let transport = ScriptedTransport::new();
    let connection = dataapi_rs::Connection::builder(test_params().build().unwrap())
        .transport(transport.clone())
        .hook("tag", |sql| Some(format!("/* app */ {}", sql)))
        .hook("noop", |_| None)
        .build();
    connection.executor().warmup().mark_running();

    connection.query("SELECT 1", Params::None).await.unwrap();

    assert_eq!(transport.last_executed().sql, "/* app */ SELECT 1");
}

#[tokio::test]
async fn test_close_rolls_back_open_transaction() {
    let transport = ScriptedTransport::new();
    let connection = warm_connection(test_params().build().unwrap(), transport.clone());

    connection.begin_transaction().await.unwrap();
    assert!(connection.close().await.unwrap());

    assert_eq!(transport.rollback_count(), 1);
    assert!(connection.is_closed().await);
}
