use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::{json, Value};

mod common;

use common::{send, RecordingNotifier};

async fn register_student(app: &axum::Router, username: &str, parent_email: Option<&str>) -> String {
    let mut body = json!({
        "username": username,
        "password": "secret-pass",
        "fullName": format!("{username} student"),
        "mobileNumber": format!("mobile-{username}"),
        "class": "6",
    });
    if let Some(email) = parent_email {
        body["parentEmail"] = json!(email);
    }

    let (status, json) = send(app, "POST", "/api/auth/student/register", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    assert!(json["token"].as_str().is_some());
    json["user"]["id"].as_str().unwrap().to_string()
}

async fn create_video(app: &axum::Router, answer: &str) -> String {
    let (status, json) = send(
        app,
        "POST",
        "/api/videos",
        Some(json!({
            "title": "Fractions",
            "description": "Adding fractions",
            "language": "en",
            "classes": ["6"],
            "videoUrl": "https://videos.example/fractions.mp4",
            "assignment": "What is 1/2 + 1/4?",
            "assignmentAnswer": answer,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    json["id"].as_str().unwrap().to_string()
}

async fn submit(app: &axum::Router, video_id: &str, learner_id: &str, answer: &str) -> Value {
    let (status, json) = send(
        app,
        "POST",
        &format!("/api/videos/{video_id}/submit"),
        Some(json!({ "studentId": learner_id, "answer": answer })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    json
}

#[tokio::test]
async fn test_health_live() {
    let app = common::create_test_app().await;
    let (status, json) = send(&app, "GET", "/health/live", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn test_health_ready_reports_database() {
    let app = common::create_test_app().await;
    let (status, json) = send(&app, "GET", "/health/ready", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["database"], "connected");
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = common::create_test_app().await;
    let (status, json) = send(&app, "GET", "/nope", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_scores_for_unknown_learner_are_zero() {
    let app = common::create_test_app().await;
    let (status, json) = send(&app, "GET", "/learners/ghost/scores", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json,
        json!({
            "totalScore": 0,
            "totalPossibleScore": 0,
            "eligibilityPercentage": 0.0,
            "isEligible": false,
        })
    );
}

#[tokio::test]
async fn test_scores_aggregate_across_videos() {
    let app = common::create_test_app().await;
    let learner = register_student(&app, "asha", None).await;
    let first = create_video(&app, "3/4").await;
    let second = create_video(&app, "3/4").await;

    assert_eq!(submit(&app, &first, &learner, "3/4").await["score"], 1);
    assert_eq!(submit(&app, &first, &learner, "2/6").await["score"], 0);
    submit(&app, &second, &learner, "3/4").await;
    submit(&app, &second, &learner, "3/4").await;

    let (status, json) = send(&app, "GET", &format!("/learners/{learner}/scores"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["totalScore"], 3);
    assert_eq!(json["totalPossibleScore"], 4);
    assert_eq!(json["eligibilityPercentage"], 75.0);
    assert_eq!(json["isEligible"], true);

    let (_, alias) = send(&app, "GET", &format!("/api/auth/student/{learner}/scores"), None).await;
    assert_eq!(alias, json);
}

#[tokio::test]
async fn test_scores_below_threshold_are_ineligible() {
    let app = common::create_test_app().await;
    let learner = register_student(&app, "ravi", None).await;
    let video = create_video(&app, "3/4").await;

    for answer in ["3/4", "3/4", "no", "no", "no"] {
        submit(&app, &video, &learner, answer).await;
    }

    let (_, json) = send(&app, "GET", &format!("/learners/{learner}/scores"), None).await;
    assert_eq!(json["totalScore"], 2);
    assert_eq!(json["totalPossibleScore"], 5);
    assert_eq!(json["eligibilityPercentage"], 40.0);
    assert_eq!(json["isEligible"], true);

    submit(&app, &video, &learner, "no").await;
    let (_, json) = send(&app, "GET", &format!("/learners/{learner}/scores"), None).await;
    assert_eq!(json["isEligible"], false);
}

#[tokio::test]
async fn test_duplicate_username_is_rejected() {
    let app = common::create_test_app().await;
    register_student(&app, "meera", None).await;

    let (status, json) = send(
        &app,
        "POST",
        "/api/auth/student/register",
        Some(json!({
            "username": "meera",
            "password": "other-pass",
            "fullName": "Another Meera",
            "mobileNumber": "mobile-other",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_login_round_trip() {
    let app = common::create_test_app().await;
    register_student(&app, "kiran", None).await;

    let (status, json) = send(
        &app,
        "POST",
        "/api/auth/student/login",
        Some(json!({ "username": "kiran", "password": "secret-pass" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user"]["username"], "kiran");
    assert!(json["user"].get("passwordHash").is_none());

    let (status, _) = send(
        &app,
        "POST",
        "/api/auth/student/login",
        Some(json!({ "username": "kiran", "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_video_view_hides_expected_answer() {
    let app = common::create_test_app().await;
    let video = create_video(&app, "3/4").await;

    let (status, json) = send(&app, "GET", &format!("/api/videos/{video}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["hasAssessment"], true);
    assert!(json.get("assignmentAnswer").is_none());

    let (status, _) = send(&app, "GET", "/api/videos/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_inactivity_check_notifies_only_inactive_guardians() {
    let notifier = Arc::new(RecordingNotifier {
        reject: vec!["bounce@example.com".to_string()],
        ..Default::default()
    });
    let app = common::create_test_app_with(Arc::clone(&notifier)).await;

    let active = register_student(&app, "active", Some("active-parent@example.com")).await;
    let idle = register_student(&app, "idle", Some("idle-parent@example.com")).await;
    register_student(&app, "bounced", Some("bounce@example.com")).await;
    register_student(&app, "orphan", None).await;
    let video = create_video(&app, "3/4").await;

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/videos/{video}/progress"),
        Some(json!({ "studentId": active, "watchTime": 120 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, report) = send(&app, "POST", "/inactivity-check", None).await;
    assert_eq!(status, StatusCode::OK, "{report}");
    assert_eq!(report["scannedLearners"], 4);
    assert_eq!(report["activeLearners"], 1);
    assert_eq!(report["inactiveLearners"], 3);
    assert_eq!(report["notified"], 1);
    assert_eq!(report["failed"], 1);
    assert_eq!(report["unreachable"], 1);

    let sent = notifier.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1, "idle-parent@example.com");
    assert!(sent[0].2.contains("idle student"));

    let outcome = report["outcomes"]
        .as_array()
        .unwrap()
        .iter()
        .find(|o| o["learnerId"] == idle.as_str())
        .cloned()
        .unwrap();
    assert_eq!(outcome["deliveries"][0]["status"], "sent");
}

#[tokio::test]
async fn test_inactivity_check_alias_repeats_notifications() {
    let notifier = Arc::new(RecordingNotifier::default());
    let app = common::create_test_app_with(Arc::clone(&notifier)).await;
    register_student(&app, "sleepy", Some("sleepy-parent@example.com")).await;

    send(&app, "POST", "/inactivity-check", None).await;
    let (status, _) = send(&app, "POST", "/api/auth/student/check-inactivity", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(notifier.sent.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_analytics_overview_counts() {
    let app = common::create_test_app().await;
    let learner = register_student(&app, "tara", None).await;
    let video = create_video(&app, "3/4").await;
    submit(&app, &video, &learner, "3/4").await;

    let (status, json) = send(&app, "GET", "/api/analytics/overview", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["totalVideos"], 1);
    assert_eq!(json["totalLearners"], 1);
    assert_eq!(json["totalSubmissions"], 1);
}

#[tokio::test]
async fn test_scores_store_failure_is_500_with_message() {
    let app = common::create_broken_store_app(Arc::new(RecordingNotifier::default()));

    for uri in ["/learners/asha/scores", "/api/auth/student/asha/scores"] {
        let (status, json) = send(&app, "GET", uri, None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["code"], "STORE_ERROR");
        assert_eq!(json["success"], false);
        let message = json["error"].as_str().unwrap();
        assert!(message.contains(common::BROKEN_STORE_REASON), "{message}");
    }
}

#[tokio::test]
async fn test_inactivity_check_store_failure_sends_nothing() {
    let notifier = Arc::new(RecordingNotifier::default());
    let app = common::create_broken_store_app(Arc::clone(&notifier));

    for uri in ["/inactivity-check", "/api/auth/student/check-inactivity"] {
        let (status, json) = send(&app, "POST", uri, None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["code"], "STORE_ERROR");
        assert!(json["error"]
            .as_str()
            .unwrap()
            .contains(common::BROKEN_STORE_REASON));
    }

    assert!(notifier.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_health_reports_unavailable_database() {
    let app = common::create_broken_store_app(Arc::new(RecordingNotifier::default()));

    let (status, json) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["database"], "disconnected");

    let (status, json) = send(&app, "GET", "/health/ready", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["status"], "unhealthy");
}

#[tokio::test]
async fn test_register_rejects_guardian_email_with_line_breaks() {
    let app = common::create_test_app().await;

    let (status, json) = send(
        &app,
        "POST",
        "/api/auth/student/register",
        Some(json!({
            "username": "mallory",
            "password": "secret-pass",
            "fullName": "Mallory",
            "mobileNumber": "mobile-mallory",
            "parentEmail": "parent@home.in>\r\nRCPT TO:<victim@evil.example",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");

    let (_, learners) = send(&app, "GET", "/api/auth/student/all", None).await;
    assert_eq!(learners, json!([]));
}

#[tokio::test]
async fn test_health_exposes_only_documented_probes() {
    let app = common::create_test_app().await;

    let (status, _) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = send(&app, "GET", "/health/info", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
}
