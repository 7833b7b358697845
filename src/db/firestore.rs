// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users and their Strava tokens
//! - Activities (synced Strava summaries)
//! - Activity streams (ingested GPS points)
//! - Quality metrics, quality labels and ML feature snapshots
//!
//! The same API is served from process memory when the store is created with
//! [`FirestoreDb::in_memory`].

use crate::db::{collections, LabelQuery, MemoryStore};
use crate::error::AppError;
use crate::models::{
    Activity, ActivityStream, MlFeatureSnapshot, QualityLabel, QualityMetric, TrackPoint, User,
    UserTokens,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

/// Points per stream chunk document. A chunk stays far below the 1 MiB
/// Firestore document limit.
const STREAM_CHUNK_POINTS: usize = 2000;

/// Chunk documents per commit, keeping each request well under 10 MiB.
const CHUNKS_PER_COMMIT: usize = 16;

/// Stream document in `activity_streams`. The points live in
/// `activity_stream_chunks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StreamHeader {
    activity_id: u64,
    ingested_at: String,
    point_count: u32,
    chunk_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StreamChunk {
    activity_id: u64,
    /// Position of this chunk in the stream (0, 1, 2, ...)
    chunk: u32,
    points: Vec<TrackPoint>,
}

fn chunk_doc_id(activity_id: u64, chunk: u32) -> String {
    format!("{}_{}", activity_id, chunk)
}

fn split_stream(stream: &ActivityStream) -> (StreamHeader, Vec<StreamChunk>) {
    let chunks: Vec<StreamChunk> = stream
        .points
        .chunks(STREAM_CHUNK_POINTS)
        .zip(0u32..)
        .map(|(points, chunk)| StreamChunk {
            activity_id: stream.activity_id,
            chunk,
            points: points.to_vec(),
        })
        .collect();

    let header = StreamHeader {
        activity_id: stream.activity_id,
        ingested_at: stream.ingested_at.clone(),
        point_count: stream.points.len() as u32,
        chunk_count: chunks.len() as u32,
    };
    (header, chunks)
}

/// Reassemble a stream from its header and chunk documents.
///
/// Chunks past `chunk_count` are left over from a longer earlier ingest and
/// are ignored.
fn join_stream(
    header: StreamHeader,
    mut chunks: Vec<StreamChunk>,
) -> Result<ActivityStream, AppError> {
    chunks.retain(|c| c.chunk < header.chunk_count);
    chunks.sort_by_key(|c| c.chunk);

    let points: Vec<TrackPoint> = chunks.into_iter().flat_map(|c| c.points).collect();
    if points.len() != header.point_count as usize {
        return Err(AppError::Database(format!(
            "Stream for activity {} is incomplete: expected {} points, found {}",
            header.activity_id,
            header.point_count,
            points.len()
        )));
    }

    Ok(ActivityStream {
        activity_id: header.activity_id,
        points,
        ingested_at: header.ingested_at,
    })
}

#[derive(Clone)]
enum Backend {
    Firestore(firestore::FirestoreDb),
    Memory(Arc<MemoryStore>),
}

/// Database client.
#[derive(Clone)]
pub struct FirestoreDb {
    backend: Backend,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // The emulator does not accept real credentials; use a dummy token.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            backend: Backend::Firestore(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            backend: Backend::Firestore(client),
        })
    }

    /// Create a store that keeps everything in process memory.
    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory(Arc::new(MemoryStore::default())),
        }
    }

    // ─── Generic Document Helpers ────────────────────────────────

    async fn get_doc<T>(
        client: &firestore::FirestoreDb,
        collection: &str,
        id: u64,
    ) -> Result<Option<T>, AppError>
    where
        T: for<'de> Deserialize<'de> + Send,
    {
        client
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(&id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn set_doc<T>(
        client: &firestore::FirestoreDb,
        collection: &str,
        id: u64,
        object: &T,
    ) -> Result<(), AppError>
    where
        T: Serialize + for<'de> Deserialize<'de> + Send + Sync,
    {
        let _: T = client
            .fluent()
            .update()
            .in_col(collection)
            .document_id(id.to_string())
            .object(object)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn delete_doc(
        client: &firestore::FirestoreDb,
        collection: &str,
        id: u64,
    ) -> Result<(), AppError> {
        client
            .fluent()
            .delete()
            .from(collection)
            .document_id(id.to_string())
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete documents by ID, committing in batches.
    async fn batch_delete(
        client: &firestore::FirestoreDb,
        collection: &str,
        doc_ids: &[String],
    ) -> Result<(), AppError> {
        for chunk in doc_ids.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for doc_id in chunk {
                client
                    .fluent()
                    .delete()
                    .from(collection)
                    .document_id(doc_id)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add deletion to transaction for {}: {}",
                            collection, e
                        ))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::Database(format!("Failed to commit batch deletion: {}", e))
            })?;
        }

        Ok(())
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by their Strava athlete ID.
    pub async fn get_user(&self, athlete_id: u64) -> Result<Option<User>, AppError> {
        match &self.backend {
            Backend::Firestore(client) => {
                Self::get_doc(client, collections::USERS, athlete_id).await
            }
            Backend::Memory(store) => Ok(store.users.get(&athlete_id).map(|u| u.clone())),
        }
    }

    /// Create or update a user.
    pub async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        match &self.backend {
            Backend::Firestore(client) => {
                Self::set_doc(client, collections::USERS, user.strava_athlete_id, user).await
            }
            Backend::Memory(store) => {
                store.users.insert(user.strava_athlete_id, user.clone());
                Ok(())
            }
        }
    }

    // ─── Token Operations ────────────────────────────────────────

    /// Get Strava tokens for a user.
    pub async fn get_tokens(&self, athlete_id: u64) -> Result<Option<UserTokens>, AppError> {
        match &self.backend {
            Backend::Firestore(client) => {
                Self::get_doc(client, collections::TOKENS, athlete_id).await
            }
            Backend::Memory(store) => Ok(store.tokens.get(&athlete_id).map(|t| t.clone())),
        }
    }

    /// Store Strava tokens for a user (1:1 with the user).
    pub async fn set_tokens(&self, athlete_id: u64, tokens: &UserTokens) -> Result<(), AppError> {
        match &self.backend {
            Backend::Firestore(client) => {
                Self::set_doc(client, collections::TOKENS, athlete_id, tokens).await
            }
            Backend::Memory(store) => {
                store.tokens.insert(athlete_id, tokens.clone());
                Ok(())
            }
        }
    }

    /// Delete tokens (logout or revoked access).
    pub async fn delete_tokens(&self, athlete_id: u64) -> Result<(), AppError> {
        match &self.backend {
            Backend::Firestore(client) => {
                Self::delete_doc(client, collections::TOKENS, athlete_id).await
            }
            Backend::Memory(store) => {
                store.tokens.remove(&athlete_id);
                Ok(())
            }
        }
    }

    // ─── Activity Operations ─────────────────────────────────────

    /// Get an activity by Strava ID.
    pub async fn get_activity(&self, activity_id: u64) -> Result<Option<Activity>, AppError> {
        match &self.backend {
            Backend::Firestore(client) => {
                Self::get_doc(client, collections::ACTIVITIES, activity_id).await
            }
            Backend::Memory(store) => Ok(store.activities.get(&activity_id).map(|a| a.clone())),
        }
    }

    /// Create or replace an activity summary.
    pub async fn upsert_activity(&self, activity: &Activity) -> Result<(), AppError> {
        match &self.backend {
            Backend::Firestore(client) => {
                Self::set_doc(
                    client,
                    collections::ACTIVITIES,
                    activity.strava_activity_id,
                    activity,
                )
                .await
            }
            Backend::Memory(store) => {
                store
                    .activities
                    .insert(activity.strava_activity_id, activity.clone());
                Ok(())
            }
        }
    }

    /// Get activities for a user, newest first, with offset pagination.
    pub async fn get_activities_for_user(
        &self,
        athlete_id: u64,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Activity>, AppError> {
        match &self.backend {
            Backend::Firestore(client) => client
                .fluent()
                .select()
                .from(collections::ACTIVITIES)
                .filter(move |q| q.for_all([q.field("athlete_id").eq(athlete_id)]))
                // Null sorts lowest in Firestore, so undated activities come last.
                .order_by([
                    ("start_date", firestore::FirestoreQueryDirection::Descending),
                    (
                        "strava_activity_id",
                        firestore::FirestoreQueryDirection::Descending,
                    ),
                ])
                .limit(limit)
                .offset(offset)
                .obj()
                .query()
                .await
                .map_err(|e| AppError::Database(e.to_string())),
            Backend::Memory(store) => Ok(store.activities_for_athlete(athlete_id, limit, offset)),
        }
    }

    /// IDs of every activity owned by a user, ascending.
    pub async fn get_activity_ids_for_user(&self, athlete_id: u64) -> Result<Vec<u64>, AppError> {
        match &self.backend {
            Backend::Firestore(client) => {
                let activities: Vec<Activity> = client
                    .fluent()
                    .select()
                    .from(collections::ACTIVITIES)
                    .filter(move |q| q.for_all([q.field("athlete_id").eq(athlete_id)]))
                    .order_by([(
                        "strava_activity_id",
                        firestore::FirestoreQueryDirection::Ascending,
                    )])
                    .obj()
                    .query()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                Ok(activities.into_iter().map(|a| a.strava_activity_id).collect())
            }
            Backend::Memory(store) => Ok(store.activity_ids_for_athlete(athlete_id)),
        }
    }

    // ─── Stream Operations ───────────────────────────────────────

    /// Get the ingested GPS stream for an activity.
    pub async fn get_stream(&self, activity_id: u64) -> Result<Option<ActivityStream>, AppError> {
        match &self.backend {
            Backend::Firestore(client) => {
                let header: Option<StreamHeader> =
                    Self::get_doc(client, collections::ACTIVITY_STREAMS, activity_id).await?;
                let Some(header) = header else {
                    return Ok(None);
                };

                let chunks: Vec<StreamChunk> = client
                    .fluent()
                    .select()
                    .from(collections::ACTIVITY_STREAM_CHUNKS)
                    .filter(move |q| q.for_all([q.field("activity_id").eq(activity_id)]))
                    .obj()
                    .query()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;

                join_stream(header, chunks).map(Some)
            }
            Backend::Memory(store) => Ok(store.streams.get(&activity_id).map(|s| s.clone())),
        }
    }

    /// Replace the GPS stream for an activity.
    ///
    /// On Firestore the points are written as fixed-size chunk documents
    /// first, then the header that makes them visible. Chunks left over from
    /// a longer previous stream are deleted afterwards.
    pub async fn set_stream(&self, stream: &ActivityStream) -> Result<(), AppError> {
        match &self.backend {
            Backend::Firestore(client) => {
                let activity_id = stream.activity_id;
                let previous: Option<StreamHeader> =
                    Self::get_doc(client, collections::ACTIVITY_STREAMS, activity_id).await?;
                let (header, chunks) = split_stream(stream);

                for batch in chunks.chunks(CHUNKS_PER_COMMIT) {
                    let mut transaction = client.begin_transaction().await.map_err(|e| {
                        AppError::Database(format!("Failed to begin transaction: {}", e))
                    })?;

                    for chunk in batch {
                        client
                            .fluent()
                            .update()
                            .in_col(collections::ACTIVITY_STREAM_CHUNKS)
                            .document_id(chunk_doc_id(activity_id, chunk.chunk))
                            .object(chunk)
                            .add_to_transaction(&mut transaction)
                            .map_err(|e| {
                                AppError::Database(format!(
                                    "Failed to add stream chunk to transaction: {}",
                                    e
                                ))
                            })?;
                    }

                    transaction.commit().await.map_err(|e| {
                        AppError::Database(format!("Failed to commit stream chunks: {}", e))
                    })?;
                }

                Self::set_doc(client, collections::ACTIVITY_STREAMS, activity_id, &header).await?;

                if let Some(previous) = previous {
                    let stale: Vec<String> = (header.chunk_count..previous.chunk_count)
                        .map(|n| chunk_doc_id(activity_id, n))
                        .collect();
                    Self::batch_delete(client, collections::ACTIVITY_STREAM_CHUNKS, &stale)
                        .await?;
                }

                tracing::debug!(
                    activity_id,
                    points = header.point_count,
                    chunks = header.chunk_count,
                    "Stored activity stream"
                );
                Ok(())
            }
            Backend::Memory(store) => {
                store.streams.insert(stream.activity_id, stream.clone());
                Ok(())
            }
        }
    }

    /// Remove the GPS stream for an activity.
    pub async fn delete_stream(&self, activity_id: u64) -> Result<(), AppError> {
        match &self.backend {
            Backend::Firestore(client) => {
                let header: Option<StreamHeader> =
                    Self::get_doc(client, collections::ACTIVITY_STREAMS, activity_id).await?;
                let Some(header) = header else {
                    return Ok(());
                };

                Self::delete_doc(client, collections::ACTIVITY_STREAMS, activity_id).await?;
                let chunk_ids: Vec<String> = (0..header.chunk_count)
                    .map(|n| chunk_doc_id(activity_id, n))
                    .collect();
                Self::batch_delete(client, collections::ACTIVITY_STREAM_CHUNKS, &chunk_ids).await
            }
            Backend::Memory(store) => {
                store.streams.remove(&activity_id);
                Ok(())
            }
        }
    }

    // ─── Quality Metric Operations ───────────────────────────────

    pub async fn get_quality_metric(
        &self,
        activity_id: u64,
    ) -> Result<Option<QualityMetric>, AppError> {
        match &self.backend {
            Backend::Firestore(client) => {
                Self::get_doc(client, collections::QUALITY_METRICS, activity_id).await
            }
            Backend::Memory(store) => Ok(store.metrics.get(&activity_id).map(|m| m.clone())),
        }
    }

    pub async fn set_quality_metric(&self, metric: &QualityMetric) -> Result<(), AppError> {
        match &self.backend {
            Backend::Firestore(client) => {
                Self::set_doc(
                    client,
                    collections::QUALITY_METRICS,
                    metric.activity_id,
                    metric,
                )
                .await
            }
            Backend::Memory(store) => {
                store.metrics.insert(metric.activity_id, metric.clone());
                Ok(())
            }
        }
    }

    // ─── Quality Label Operations ────────────────────────────────

    /// Get the label attached to an activity, if any.
    pub async fn get_label(&self, activity_id: u64) -> Result<Option<QualityLabel>, AppError> {
        match &self.backend {
            Backend::Firestore(client) => {
                Self::get_doc(client, collections::QUALITY_LABELS, activity_id).await
            }
            Backend::Memory(store) => Ok(store.labels.get(&activity_id).map(|l| l.clone())),
        }
    }

    /// Create or replace the label for an activity.
    pub async fn upsert_label(&self, label: &QualityLabel) -> Result<(), AppError> {
        match &self.backend {
            Backend::Firestore(client) => {
                Self::set_doc(client, collections::QUALITY_LABELS, label.activity_id, label).await
            }
            Backend::Memory(store) => {
                store.labels.insert(label.activity_id, label.clone());
                Ok(())
            }
        }
    }

    /// List a user's labels, newest first.
    pub async fn list_labels(
        &self,
        athlete_id: u64,
        query: &LabelQuery,
    ) -> Result<Vec<QualityLabel>, AppError> {
        match &self.backend {
            Backend::Firestore(client) => {
                let label_bad = query.label_bad;
                let label_source = query.label_source.clone();
                let activity_id = query.activity_id;

                client
                    .fluent()
                    .select()
                    .from(collections::QUALITY_LABELS)
                    .filter(move |q| {
                        q.for_all([
                            q.field("athlete_id").eq(athlete_id),
                            label_bad.and_then(|v| q.field("label_bad").eq(v)),
                            label_source
                                .clone()
                                .and_then(|v| q.field("label_source").eq(v)),
                            activity_id.and_then(|v| q.field("activity_id").eq(v)),
                        ])
                    })
                    .order_by([
                        ("created_at", firestore::FirestoreQueryDirection::Descending),
                        ("id", firestore::FirestoreQueryDirection::Descending),
                    ])
                    .limit(query.limit)
                    .offset(query.offset)
                    .obj()
                    .query()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))
            }
            Backend::Memory(store) => Ok(store.labels_for_athlete(athlete_id, query)),
        }
    }

    // ─── ML Feature Snapshot Operations ──────────────────────────

    pub async fn get_feature_snapshot(
        &self,
        activity_id: u64,
    ) -> Result<Option<MlFeatureSnapshot>, AppError> {
        match &self.backend {
            Backend::Firestore(client) => {
                Self::get_doc(client, collections::ML_FEATURES, activity_id).await
            }
            Backend::Memory(store) => Ok(store.features.get(&activity_id).map(|f| f.clone())),
        }
    }

    /// Create or replace the feature snapshot for an activity.
    pub async fn set_feature_snapshot(&self, snapshot: &MlFeatureSnapshot) -> Result<(), AppError> {
        match &self.backend {
            Backend::Firestore(client) => {
                Self::set_doc(
                    client,
                    collections::ML_FEATURES,
                    snapshot.activity_id,
                    snapshot,
                )
                .await
            }
            Backend::Memory(store) => {
                store.features.insert(snapshot.activity_id, snapshot.clone());
                Ok(())
            }
        }
    }

    /// Number of feature snapshots stored for a user.
    pub async fn count_feature_snapshots(&self, athlete_id: u64) -> Result<usize, AppError> {
        match &self.backend {
            Backend::Firestore(client) => {
                let snapshots: Vec<MlFeatureSnapshot> = client
                    .fluent()
                    .select()
                    .from(collections::ML_FEATURES)
                    .filter(move |q| q.for_all([q.field("athlete_id").eq(athlete_id)]))
                    .obj()
                    .query()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                Ok(snapshots.len())
            }
            Backend::Memory(store) => Ok(store
                .features
                .iter()
                .filter(|f| f.athlete_id == athlete_id)
                .count()),
        }
    }
}
