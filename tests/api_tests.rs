// tests/api_tests.rs

use quiz_backend::{config::Config, routes, state::AppState};
use serde_json::{Value, json};
use sqlx::{PgPool, postgres::PgPoolOptions};

/// Spawns the app on a random port against the Postgres in `DATABASE_URL`.
/// Returns `None` (and the test is skipped) when no database is configured.
async fn spawn_app() -> Option<(String, PgPool)> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping database test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: database_url.clone(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        upload_dir: std::env::temp_dir()
            .join("quiz_backend_uploads")
            .to_string_lossy()
            .into_owned(),
        cors_origins: vec!["http://localhost:3000".to_string()],
    };

    let app = routes::create_router(AppState::new(pool.clone(), config));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let address = format!("http://{}", listener.local_addr().unwrap());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Some((address, pool))
}

fn unique_name(prefix: &str) -> String {
    format!("{}_{}", prefix, &uuid::Uuid::new_v4().to_string()[..8])
}

/// Registers a fresh user and returns (user_id, token).
async fn register_and_login(client: &reqwest::Client, address: &str) -> (i64, String) {
    let username = unique_name("u");
    let password = "password123";

    let user: Value = client
        .post(format!("{}/api/auth/register", address))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await
        .expect("Register failed")
        .json()
        .await
        .unwrap();

    let login: Value = client
        .post(format!("{}/api/auth/login", address))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await
        .expect("Login failed")
        .json()
        .await
        .unwrap();

    (
        user["id"].as_i64().expect("user id"),
        login["token"].as_str().expect("token").to_string(),
    )
}

/// Creates a two-question test: q1 has one correct answer, q2 has two.
async fn create_sample_test(client: &reqwest::Client, address: &str, token: &str) -> i64 {
    let resp = client
        .post(format!("{}/api/tests", address))
        .bearer_auth(token)
        .json(&json!({
            "title": "Rust basics",
            "subject": unique_name("rust"),
            "questions": [
                {
                    "content": "Which keyword declares an immutable binding?",
                    "answers": [
                        { "content": "let", "is_correct": true },
                        { "content": "mut", "is_correct": false }
                    ]
                },
                {
                    "content": "Which types are Copy?",
                    "answers": [
                        { "content": "i32", "is_correct": true },
                        { "content": "bool", "is_correct": true },
                        { "content": "String", "is_correct": false }
                    ]
                }
            ]
        }))
        .send()
        .await
        .expect("Create test failed");
    assert_eq!(resp.status().as_u16(), 201);

    let body: Value = resp.json().await.unwrap();
    body["id"].as_i64().unwrap()
}

/// Fetches a test and returns, per question, (question_id, [(answer_id, content)]).
async fn fetch_questions(
    client: &reqwest::Client,
    address: &str,
    test_id: i64,
) -> Vec<(i64, Vec<(i64, String)>)> {
    let detail: Value = client
        .get(format!("{}/api/tests/{}", address, test_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    detail["questions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|q| {
            let answers = q["answers"]
                .as_array()
                .unwrap()
                .iter()
                .map(|a| {
                    assert!(a.get("is_correct").is_none());
                    (
                        a["id"].as_i64().unwrap(),
                        a["content"].as_str().unwrap().to_string(),
                    )
                })
                .collect();
            (q["id"].as_i64().unwrap(), answers)
        })
        .collect()
}

fn ids_of(answers: &[(i64, String)], wanted: &[&str]) -> Vec<i64> {
    answers
        .iter()
        .filter(|(_, content)| wanted.contains(&content.as_str()))
        .map(|(id, _)| *id)
        .collect()
}

async fn count_rows(pool: &PgPool, statistic_id: i64) -> (i64, i64) {
    let statistics: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM statistics WHERE id = $1")
        .bind(statistic_id)
        .fetch_one(pool)
        .await
        .unwrap();
    let records: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM statistic_answers WHERE statistic_id = $1")
            .bind(statistic_id)
            .fetch_one(pool)
            .await
            .unwrap();
    (statistics, records)
}

#[tokio::test]
async fn unknown_path_is_404() {
    let Some((address, _pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_rejects_short_username_and_duplicates() {
    let Some((address, _pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();

    let short = client
        .post(format!("{}/api/auth/register", address))
        .json(&json!({ "username": "yo", "password": "password123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(short.status().as_u16(), 400);

    let username = unique_name("dup");
    for expected in [201, 409] {
        let resp = client
            .post(format!("{}/api/auth/register", address))
            .json(&json!({ "username": username, "password": "password123" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), expected);
    }
}

#[tokio::test]
async fn login_with_wrong_password_is_401() {
    let Some((address, _pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();
    let username = unique_name("u");

    client
        .post(format!("{}/api/auth/register", address))
        .json(&json!({ "username": username, "password": "password123" }))
        .send()
        .await
        .unwrap();

    let resp = client
        .post(format!("{}/api/auth/login", address))
        .json(&json!({ "username": username, "password": "nope1234" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);
}

#[tokio::test]
async fn create_test_requires_auth() {
    let Some((address, _pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/tests", address))
        .json(&json!({ "title": "x", "subject": "y", "questions": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);
}

#[tokio::test]
async fn submission_flow_scores_and_persists() {
    let Some((address, pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();
    let (user_id, token) = register_and_login(&client, &address).await;
    let test_id = create_sample_test(&client, &address, &token).await;
    let questions = fetch_questions(&client, &address, test_id).await;
    assert_eq!(questions.len(), 2);

    let (q1, q1_answers) = &questions[0];
    let (q2, q2_answers) = &questions[1];

    // All correct
    let all_correct = json!({
        "user_id": user_id,
        "test_id": test_id,
        "time_spent": 30,
        "answers": [
            { "question_id": q1, "answer_ids": ids_of(q1_answers, &["let"]) },
            { "question_id": q2, "answer_ids": ids_of(q2_answers, &["bool", "i32"]) }
        ]
    });
    let resp = client
        .post(format!("{}/api/submit", address))
        .json(&all_correct)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let result: Value = resp.json().await.unwrap();
    assert_eq!(result["score"], 100);
    assert_eq!(result["total"], 2);

    let first_id = result["statistic_id"].as_i64().unwrap();
    assert_eq!(count_rows(&pool, first_id).await, (1, 2));

    // Superset on q2 is wrong: 1 of 2 -> 50
    let superset = json!({
        "user_id": user_id,
        "test_id": test_id,
        "answers": [
            { "question_id": q1, "answer_ids": ids_of(q1_answers, &["let"]) },
            { "question_id": q2, "answer_ids": ids_of(q2_answers, &["bool", "i32", "String"]) }
        ]
    });
    let result: Value = client
        .post(format!("{}/api/submit", address))
        .json(&superset)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(result["score"], 50);

    // Same payload again creates a second, independent result.
    let again: Value = client
        .post(format!("{}/api/submit", address))
        .json(&all_correct)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let again_id = again["statistic_id"].as_i64().unwrap();
    assert_ne!(again_id, first_id);
    assert_eq!(count_rows(&pool, again_id).await, (1, 2));

    // Stored detail is readable by its owner.
    let detail: Value = client
        .get(format!("{}/api/statistics/{}", address, first_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail["score"], 100);
    assert_eq!(detail["time_spent"], 30);
    assert_eq!(detail["answers"].as_array().unwrap().len(), 2);
    assert!(
        detail["answers"]
            .as_array()
            .unwrap()
            .iter()
            .all(|a| a["is_correct"] == true)
    );

    let mine: Vec<Value> = client
        .get(format!("{}/api/statistics/me", address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(mine.len(), 3);
    assert_eq!(mine[0]["test_title"], "Rust basics");

    let leaderboard: Vec<Value> = client
        .get(format!("{}/api/tests/{}/leaderboard", address, test_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(leaderboard[0]["score"], 100);
}

#[tokio::test]
async fn invalid_submission_writes_nothing() {
    let Some((address, pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();
    let (user_id, token) = register_and_login(&client, &address).await;
    let test_id = create_sample_test(&client, &address, &token).await;

    let before: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM statistics WHERE test_id = $1")
        .bind(test_id)
        .fetch_one(&pool)
        .await
        .unwrap();

    let resp = client
        .post(format!("{}/api/submit", address))
        .json(&json!({ "user_id": user_id, "test_id": test_id, "answers": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());

    let after: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM statistics WHERE test_id = $1")
        .bind(test_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn submission_for_unknown_test_is_500_without_rows() {
    let Some((address, pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();
    let (user_id, _token) = register_and_login(&client, &address).await;

    let resp = client
        .post(format!("{}/api/submit", address))
        .json(&json!({
            "user_id": user_id,
            "test_id": i64::MAX,
            "answers": [{ "question_id": 1, "answer_ids": [1] }]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 500);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM statistics WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 0);
}

#[tokio::test]
async fn oversized_submission_is_stored_in_full() {
    let Some((address, pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();
    let (user_id, token) = register_and_login(&client, &address).await;
    let test_id = create_sample_test(&client, &address, &token).await;
    let questions = fetch_questions(&client, &address, test_id).await;
    let (first_id, first_answers) = &questions[0];
    let let_ids = ids_of(first_answers, &["let"]);

    // More answer records than one INSERT could bind.
    let answers: Vec<Value> = (0..20_000)
        .map(|_| json!({ "question_id": first_id, "answer_ids": let_ids }))
        .collect();

    let resp = client
        .post(format!("{}/api/submit", address))
        .json(&json!({ "user_id": user_id, "test_id": test_id, "answers": answers }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["score"], 100);
    assert_eq!(body["total"], 20_000);

    let statistic_id = body["statistic_id"].as_i64().unwrap();
    assert_eq!(count_rows(&pool, statistic_id).await, (1, 20_000));
}
