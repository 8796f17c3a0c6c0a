use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;
use wiremock::matchers::{body_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use food_snap_client::config::BackendConfig;
use food_snap_client::models::{AnalysisType, MealType};
use food_snap_client::services::{BackendClient, SessionManager, UploadFile};
use food_snap_client::ClientError;

async fn signed_in(server: &MockServer) -> BackendClient {
    let config = BackendConfig::new(server.uri());
    let session = Arc::new(SessionManager::new(&config, None).unwrap());
    session.restore("token").await;
    BackendClient::new(&config, session).unwrap()
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
}

#[tokio::test]
async fn test_health_analysis_posts_range_and_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/health-analysis"))
        .and(header("Authorization", "Bearer token"))
        .and(body_json(json!({
            "start_date": "2024-03-01",
            "end_date": "2024-03-07",
            "analysis_type": "nutrition",
            "description": "trying to eat less sugar"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "analysis": "Protein intake is on target; sugar is above the weekly goal."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = signed_in(&server).await;
    let analysis = client
        .analyze_health(day(1), day(7), AnalysisType::Nutrition, Some("trying to eat less sugar"))
        .await
        .unwrap();
    assert!(analysis.contains("sugar is above"));
}

#[tokio::test]
async fn test_health_analysis_rejected_range_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/health-analysis"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "start date after end date"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = signed_in(&server).await;
    match client
        .analyze_health(day(7), day(1), AnalysisType::Comprehensive, None)
        .await
        .unwrap_err()
    {
        ClientError::Api { status, body } => {
            assert_eq!(status.as_u16(), 400);
            assert!(body.contains("start date after end date"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_admin_stats_and_users() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/admin/stats"))
        .and(header("Authorization", "Bearer token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_users": 12,
            "verified_users": 9,
            "unverified_users": 3
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/admin/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "users": [
                {"ID": 1, "Name": "admin", "Email": "admin@example.com", "Role": "admin", "Verified": true},
                {"ID": 2, "Name": "tester", "Email": "tester@example.com", "Role": "user", "Verified": false}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = signed_in(&server).await;
    let stats = client.system_stats().await.unwrap();
    assert_eq!(stats.total_users, 12);
    assert_eq!(stats.verified_users, 9);
    assert_eq!(stats.unverified_users, 3);

    let users = client.list_users().await.unwrap();
    assert_eq!(users.len(), 2);
    assert!(users[0].is_admin());
    assert!(!users[1].verified);
}

#[tokio::test]
async fn test_admin_stats_forbidden_for_users() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/admin/stats"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({"error": "admin only"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = signed_in(&server).await;
    assert!(matches!(client.system_stats().await, Err(ClientError::Forbidden { .. })));
}

#[tokio::test]
async fn test_remote_analyze_and_save() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/analyze-and-save"))
        .and(body_string_contains("name=\"meal_type\""))
        .and(body_string_contains("晚餐"))
        .and(body_string_contains("fruit salad"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "saved",
            "record": {"ID": 8, "food_name": "fruit salad", "weight": 220.0, "calories": 130.0, "meal_type": "晚餐"},
            "analysis": {
                "hasFood": true,
                "foodType": "fruit salad",
                "weight": 220,
                "nutrition": {"calories": 130, "sugar": 22.5}
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = signed_in(&server).await;
    let upload = UploadFile {
        file_name: "salad.jpg".to_string(),
        bytes: b"jpeg bytes".to_vec(),
    };
    let saved = client
        .analyze_and_save_remote(&upload, &MealType::Dinner, "", Some("fruit salad"))
        .await
        .unwrap();
    assert_eq!(saved.record.id, Some(8));
    assert_eq!(saved.analysis.food_type.as_deref(), Some("fruit salad"));
    assert_eq!(saved.analysis.nutrition.unwrap().sugar, 22.5);
}

#[tokio::test]
async fn test_image_info() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/image/lunch.png"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "filename": "lunch.png",
            "size": 2048,
            "url": "/static/images/lunch.png",
            "created_at": "2024-03-01T12:30:00+08:00"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/image/gone.png"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "image not found"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = signed_in(&server).await;
    let info = client.image_info("lunch.png").await.unwrap();
    assert_eq!(info.size, 2048);
    assert_eq!(info.url, "/static/images/lunch.png");
    assert!(info.created_at.is_some());

    assert!(matches!(
        client.image_info("gone.png").await,
        Err(ClientError::ResourceMissing { .. })
    ));
}
