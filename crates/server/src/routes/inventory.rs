//! Bulk inventory route handlers.

use axum::{Json, extract::State};
use shopfront_core::{IngestMode, IngestReport, IngestRequest, InventoryRow, InventorySnapshot};

use crate::error::{AppError, Result};
use crate::middleware::RequireMerchant;
use crate::state::AppState;

/// Replace the merchant's whole catalog with the rows. Destructive.
pub async fn replace(
    State(state): State<AppState>,
    RequireMerchant(store_id): RequireMerchant,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestReport>> {
    let report = state
        .catalog()
        .ingest(store_id, IngestMode::Replace, request.source_name, request.rows)
        .await?;
    Ok(Json(report))
}

/// Update products matched by name and insert the rest.
pub async fn merge(
    State(state): State<AppState>,
    RequireMerchant(store_id): RequireMerchant,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestReport>> {
    let report = state
        .catalog()
        .ingest(store_id, IngestMode::Merge, request.source_name, request.rows)
        .await?;
    Ok(Json(report))
}

pub async fn snapshot(
    State(state): State<AppState>,
    RequireMerchant(store_id): RequireMerchant,
) -> Result<Json<InventorySnapshot>> {
    state
        .catalog()
        .snapshot(store_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no inventory ingested for store {store_id}")))
}

pub async fn rows(
    State(state): State<AppState>,
    RequireMerchant(store_id): RequireMerchant,
) -> Result<Json<Vec<InventoryRow>>> {
    Ok(Json(state.catalog().export_rows(store_id).await?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::testing::{MERCHANT_TOKEN, TestApp};

    fn row(name: &str, quantity: i64) -> serde_json::Value {
        json!({"name": name, "unit_price": "2.00", "quantity": quantity})
    }

    #[tokio::test]
    async fn test_replace_then_merge() {
        let app = TestApp::new().await;
        app.seed_product("Old", 1).await;

        let (status, report) = app
            .request(
                Method::POST,
                "/api/merchant/inventory/replace",
                Some(MERCHANT_TOKEN),
                Some(json!({"source_name": "april.xlsx", "rows": [row("Widget", 20), row("Gadget", 3)]})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["removed"], 1);
        assert_eq!(report["inserted"], 2);
        assert_eq!(report["low_stock"][0]["name"], "Gadget");

        let (status, report) = app
            .request(
                Method::POST,
                "/api/merchant/inventory/merge",
                Some(MERCHANT_TOKEN),
                Some(json!({"source_name": "recount.xlsx", "rows": [row("Widget", 5)]})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["updated"], 1);

        let (_, rows) = app
            .request(Method::GET, "/api/merchant/inventory/rows", Some(MERCHANT_TOKEN), None)
            .await;
        let widget = rows
            .as_array()
            .unwrap()
            .iter()
            .find(|r| r["name"] == "Widget")
            .unwrap();
        assert_eq!(widget["quantity"], 5);

        let (_, snapshot) = app
            .request(Method::GET, "/api/merchant/inventory/snapshot", Some(MERCHANT_TOKEN), None)
            .await;
        assert_eq!(snapshot["source_name"], "recount.xlsx");
    }

    #[tokio::test]
    async fn test_bad_rows_rejected_with_indexes() {
        let app = TestApp::new().await;
        let (status, body) = app
            .request(
                Method::POST,
                "/api/merchant/inventory/replace",
                Some(MERCHANT_TOKEN),
                Some(json!({"source_name": "bad.xlsx", "rows": [row("", 1), row("Ok", 1), row("Neg", -4)]})),
            )
            .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["rows"][0]["index"], 0);
        assert_eq!(body["rows"][1]["index"], 2);
    }

    #[tokio::test]
    async fn test_snapshot_missing_is_not_found() {
        let app = TestApp::new().await;
        let (status, _) = app
            .request(Method::GET, "/api/merchant/inventory/snapshot", Some(MERCHANT_TOKEN), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
