//! Server integration tests: liveness, auth and the `/api/user` routes.

mod common;

use anyhow::Result;
use chrono::Utc;
use dhruv_store::NewWaterIntake;
use dhruv_types::{WaterSource, WaterUnit};
use serde_json::{Value, json};

#[tokio::test]
async fn test_server_starts_and_responds_to_health() -> Result<()> {
    let server = common::TestServer::start().await?;
    assert!(server.health().await?, "Server should be healthy");

    let body: Value = server
        .client
        .get(format!("{}/health", server.base_url()))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body["status"], "ok");
    assert!(body.get("version").is_some());
    Ok(())
}

#[tokio::test]
async fn test_ping() -> Result<()> {
    let server = common::TestServer::start().await?;
    let resp = server
        .client
        .get(format!("{}/ping", server.base_url()))
        .send()
        .await?;
    assert_eq!(resp.text().await?, "pong");
    Ok(())
}

#[tokio::test]
async fn test_api_auth() -> Result<()> {
    let server = common::TestServer::start().await?;
    let url = format!("{}/api/user/intake?userId={}", server.base_url(), server.user.id);

    let resp = server.client.get(&url).send().await?;
    assert_eq!(resp.status().as_u16(), 401);

    let resp = server.client.get(&url).bearer_auth("wrong-token").send().await?;
    assert_eq!(resp.status().as_u16(), 401);

    let resp = server
        .client
        .get(&url)
        .header("Authorization", format!("Basic {}", server.token))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 400);

    let resp = server.client.get(&url).bearer_auth(&server.token).send().await?;
    assert!(resp.status().is_success());
    Ok(())
}

#[tokio::test]
async fn test_intake_requires_user_id() -> Result<()> {
    let server = common::TestServer::start().await?;

    let resp = server.get("/api/user/intake").send().await?;
    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = resp.json().await?;
    assert_eq!(body, json!({"success": false, "error": "User ID is required"}));
    Ok(())
}

#[tokio::test]
async fn test_intake_summary_shape() -> Result<()> {
    let server = common::TestServer::start().await?;
    server.store.add_water_intake(
        server.user.id,
        NewWaterIntake {
            amount: 250.0,
            unit: WaterUnit::Ml,
            consumed_at: Some(Utc::now()),
            notes: None,
            source: WaterSource::App,
        },
    )?;

    let resp = server
        .get(&format!("/api/user/intake?userId={}", server.user.id))
        .send()
        .await?;
    assert!(resp.status().is_success());

    let body: Value = resp.json().await?;
    assert_eq!(body["success"], true);
    let data = &body["data"];
    assert_eq!(data["waterIntakeAmount"], 250.0);
    assert_eq!(data["waterEntryCount"], 1);
    assert_eq!(data["calorieAmount"], 0.0);
    assert_eq!(data["timezone"], "IST (UTC+5:30)");
    assert_eq!(data["date"].as_str().map(str::len), Some(10));
    for field in ["waterIntakeAmountOZ", "carbsAmount", "proteinsAmount", "fatsAmount", "calorieEntryCount"] {
        assert!(data.get(field).is_some(), "missing {field}");
    }
    Ok(())
}

#[tokio::test]
async fn test_update_details() -> Result<()> {
    let server = common::TestServer::start().await?;

    let resp = server
        .post("/api/user/update-details")
        .json(&json!({
            "email": "asha@example.com",
            "firstName": "Asha",
            "dateOfBirth": "1990-04-12",
            "weight": "72",
            "foodLiking": ["dal", "paneer"],
        }))
        .send()
        .await?;
    assert!(resp.status().is_success());
    assert_eq!(resp.json::<Value>().await?, json!({"success": true}));

    let profile = server.store.user_profile(server.user.id)?.unwrap_or_default();
    assert_eq!(profile.first_name.as_deref(), Some("Asha"));
    assert_eq!(profile.food_liking, vec!["dal", "paneer"]);

    // A later step of the form only sends its own fields.
    let resp = server
        .post("/api/user/update-details")
        .json(&json!({"email": "asha@example.com", "weight": "70"}))
        .send()
        .await?;
    assert!(resp.status().is_success());
    let profile = server.store.user_profile(server.user.id)?.unwrap_or_default();
    assert_eq!(profile.weight.as_deref(), Some("70"));
    assert_eq!(profile.first_name.as_deref(), Some("Asha"));
    assert_eq!(profile.date_of_birth.as_deref(), Some("1990-04-12"));
    assert_eq!(profile.food_liking, vec!["dal", "paneer"]);

    // No account matches: nothing is written, still a success.
    let resp = server
        .post("/api/user/update-details")
        .json(&json!({"email": "nobody@example.com", "firstName": "X"}))
        .send()
        .await?;
    assert!(resp.status().is_success());
    assert_eq!(resp.json::<Value>().await?, json!({"success": true}));

    let resp = server
        .post("/api/user/update-details")
        .json(&json!({"firstName": "X"}))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 500);
    let body: Value = resp.json().await?;
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());
    Ok(())
}
