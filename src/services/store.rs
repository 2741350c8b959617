// src/services/store.rs

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};

use crate::models::statistic::{NewAnswerRecord, NewStatistic};

/// Answer records per `INSERT`. Each record binds four parameters and
/// Postgres accepts at most 65535 per statement.
const RECORDS_PER_INSERT: usize = 5000;

/// Correct answer ids per question id.
pub type AnswerKey = HashMap<i64, BTreeSet<i64>>;

/// Storage the submission scorer reads answer keys from and writes results to.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Returns the ids of answers flagged correct for each of `question_ids`
    /// that belongs to `test_id`. Questions without any correct answer are absent.
    async fn correct_answers(
        &self,
        test_id: i64,
        question_ids: &[i64],
    ) -> Result<AnswerKey, sqlx::Error>;

    /// Opens a unit of work for persisting one submission's results.
    async fn begin(&self) -> Result<Box<dyn ResultWriter>, sqlx::Error>;
}

/// Transactional writer for a statistic and its answer records.
///
/// Nothing written through the writer is visible until [`ResultWriter::commit`]
/// succeeds. Dropping the writer without committing discards every write.
#[async_trait]
pub trait ResultWriter: Send {
    async fn insert_statistic(&mut self, statistic: &NewStatistic) -> Result<i64, sqlx::Error>;

    async fn insert_answer_records(
        &mut self,
        statistic_id: i64,
        records: &[NewAnswerRecord],
    ) -> Result<(), sqlx::Error>;

    async fn commit(self: Box<Self>) -> Result<(), sqlx::Error>;
}

/// Postgres implementation backed by the shared pool.
#[derive(Clone)]
pub struct PgSubmissionStore {
    pool: PgPool,
}

impl PgSubmissionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubmissionStore for PgSubmissionStore {
    async fn correct_answers(
        &self,
        test_id: i64,
        question_ids: &[i64],
    ) -> Result<AnswerKey, sqlx::Error> {
        let rows: Vec<(i64, i64)> = sqlx::query_as(
            r#"
            SELECT a.question_id, a.id
            FROM answers a
            JOIN questions q ON q.id = a.question_id
            WHERE q.test_id = $1
              AND a.question_id = ANY($2)
              AND a.is_correct
            "#,
        )
        .bind(test_id)
        .bind(question_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut key = AnswerKey::new();
        for (question_id, answer_id) in rows {
            key.entry(question_id).or_default().insert(answer_id);
        }
        Ok(key)
    }

    async fn begin(&self) -> Result<Box<dyn ResultWriter>, sqlx::Error> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgResultWriter { tx }))
    }
}

struct PgResultWriter {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl ResultWriter for PgResultWriter {
    async fn insert_statistic(&mut self, statistic: &NewStatistic) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            INSERT INTO statistics (user_id, test_id, score, time_spent, correct_count, total_count)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(statistic.user_id)
        .bind(statistic.test_id)
        .bind(statistic.score)
        .bind(statistic.time_spent)
        .bind(statistic.correct_count)
        .bind(statistic.total_count)
        .fetch_one(&mut *self.tx)
        .await
    }

    async fn insert_answer_records(
        &mut self,
        statistic_id: i64,
        records: &[NewAnswerRecord],
    ) -> Result<(), sqlx::Error> {
        for chunk in records.chunks(RECORDS_PER_INSERT) {
            let mut query_builder = QueryBuilder::<Postgres>::new(
                "INSERT INTO statistic_answers (statistic_id, question_id, answer_ids, is_correct) ",
            );
            query_builder.push_values(chunk, |mut row, record| {
                row.push_bind(statistic_id)
                    .push_bind(record.question_id)
                    .push_bind(record.answer_ids.clone())
                    .push_bind(record.is_correct);
            });

            query_builder.build().execute(&mut *self.tx).await?;
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), sqlx::Error> {
        self.tx.commit().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_batches_stay_under_bind_limit() {
        assert!(RECORDS_PER_INSERT * 4 <= u16::MAX as usize);
    }
}
