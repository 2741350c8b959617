// src/test_support.rs

//! In-memory doubles shared by unit tests.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use serde_json::Value;
use tower::ServiceExt;

use crate::{
    config::Config,
    models::statistic::{NewAnswerRecord, NewStatistic},
    routes::create_router,
    services::store::{AnswerKey, ResultWriter, SubmissionStore},
    state::AppState,
};

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://localhost/quiz_unused".to_string(),
        jwt_secret: "router_test_secret".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        upload_dir: std::env::temp_dir().to_string_lossy().into_owned(),
        cors_origins: vec!["http://localhost:3000".to_string()],
    }
}

/// Full router backed by `store`. The pool is lazy, so requests that reach
/// the database fail; only use it for paths that stop before that.
pub fn test_router(store: MemoryStore) -> Router {
    let config = test_config();
    let pool = sqlx::PgPool::connect_lazy(&config.database_url).expect("lazy pool");
    create_router(AppState {
        pool,
        config,
        store: Arc::new(store),
    })
}

/// Sends a JSON `POST` through `router` and decodes the JSON reply.
pub async fn post_json(router: Router, uri: &str, body: String) -> (StatusCode, Value) {
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .expect("response");

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

/// Storage operation a [`MemoryStore`] can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    CorrectAnswers,
    InsertStatistic,
    InsertAnswerRecords,
}

#[derive(Default)]
struct MemoryState {
    /// (test_id, question_id) -> correct answer ids
    correct: HashMap<(i64, i64), BTreeSet<i64>>,
    statistics: Vec<(i64, NewStatistic)>,
    records: Vec<(i64, NewAnswerRecord)>,
    next_id: i64,
    fail_at: Option<FailPoint>,
}

/// `SubmissionStore` keeping committed rows in memory.
///
/// Writes are staged on the writer and only appended on commit, so a failed
/// or dropped writer leaves no trace, like a rolled back transaction.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn add_correct(&self, test_id: i64, question_id: i64, answer_ids: &[i64]) {
        let mut state = self.state.lock().unwrap();
        state
            .correct
            .entry((test_id, question_id))
            .or_default()
            .extend(answer_ids.iter().copied());
    }

    pub fn fail_at(&self, point: FailPoint) {
        self.state.lock().unwrap().fail_at = Some(point);
    }

    pub fn statistics(&self) -> Vec<(i64, NewStatistic)> {
        self.state.lock().unwrap().statistics.clone()
    }

    pub fn answer_records(&self) -> Vec<(i64, NewAnswerRecord)> {
        self.state.lock().unwrap().records.clone()
    }

    fn check(&self, point: FailPoint) -> Result<(), sqlx::Error> {
        if self.state.lock().unwrap().fail_at == Some(point) {
            return Err(sqlx::Error::Protocol(format!("induced failure at {:?}", point)));
        }
        Ok(())
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn correct_answers(
        &self,
        test_id: i64,
        question_ids: &[i64],
    ) -> Result<AnswerKey, sqlx::Error> {
        self.check(FailPoint::CorrectAnswers)?;
        let state = self.state.lock().unwrap();
        Ok(question_ids
            .iter()
            .filter_map(|qid| {
                state
                    .correct
                    .get(&(test_id, *qid))
                    .map(|ids| (*qid, ids.clone()))
            })
            .collect())
    }

    async fn begin(&self) -> Result<Box<dyn ResultWriter>, sqlx::Error> {
        Ok(Box::new(MemoryWriter {
            store: self.clone(),
            statistic: None,
            records: Vec::new(),
        }))
    }
}

struct MemoryWriter {
    store: MemoryStore,
    statistic: Option<(i64, NewStatistic)>,
    records: Vec<(i64, NewAnswerRecord)>,
}

#[async_trait]
impl ResultWriter for MemoryWriter {
    async fn insert_statistic(&mut self, statistic: &NewStatistic) -> Result<i64, sqlx::Error> {
        self.store.check(FailPoint::InsertStatistic)?;
        let id = {
            let mut state = self.store.state.lock().unwrap();
            state.next_id += 1;
            state.next_id
        };
        self.statistic = Some((id, statistic.clone()));
        Ok(id)
    }

    async fn insert_answer_records(
        &mut self,
        statistic_id: i64,
        records: &[NewAnswerRecord],
    ) -> Result<(), sqlx::Error> {
        self.store.check(FailPoint::InsertAnswerRecords)?;
        self.records
            .extend(records.iter().map(|r| (statistic_id, r.clone())));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), sqlx::Error> {
        let MemoryWriter {
            store,
            statistic,
            records,
        } = *self;
        let mut state = store.state.lock().unwrap();
        if let Some(statistic) = statistic {
            state.statistics.push(statistic);
        }
        state.records.extend(records);
        Ok(())
    }
}
