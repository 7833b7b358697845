// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Process-local storage used for development and tests.

use crate::db::LabelQuery;
use crate::models::{
    Activity, ActivityStream, MlFeatureSnapshot, QualityLabel, QualityMetric, User, UserTokens,
};
use dashmap::DashMap;
use std::cmp::Ordering;

/// In-memory collections keyed the same way as the Firestore documents.
#[derive(Default)]
pub struct MemoryStore {
    pub(crate) users: DashMap<u64, User>,
    pub(crate) tokens: DashMap<u64, UserTokens>,
    pub(crate) activities: DashMap<u64, Activity>,
    pub(crate) streams: DashMap<u64, ActivityStream>,
    pub(crate) metrics: DashMap<u64, QualityMetric>,
    pub(crate) labels: DashMap<u64, QualityLabel>,
    pub(crate) features: DashMap<u64, MlFeatureSnapshot>,
}

impl MemoryStore {
    /// Activities for an athlete, newest first with undated ones last.
    pub(crate) fn activities_for_athlete(
        &self,
        athlete_id: u64,
        limit: u32,
        offset: u32,
    ) -> Vec<Activity> {
        let mut activities: Vec<Activity> = self
            .activities
            .iter()
            .filter(|a| a.athlete_id == athlete_id)
            .map(|a| a.value().clone())
            .collect();

        activities.sort_by(|a, b| {
            match (&a.start_date, &b.start_date) {
                (Some(x), Some(y)) => y.cmp(x),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
            .then_with(|| b.strava_activity_id.cmp(&a.strava_activity_id))
        });

        activities
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect()
    }

    pub(crate) fn activity_ids_for_athlete(&self, athlete_id: u64) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .activities
            .iter()
            .filter(|a| a.athlete_id == athlete_id)
            .map(|a| a.strava_activity_id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub(crate) fn labels_for_athlete(&self, athlete_id: u64, query: &LabelQuery) -> Vec<QualityLabel> {
        let mut labels: Vec<QualityLabel> = self
            .labels
            .iter()
            .filter(|l| l.athlete_id == athlete_id)
            .filter(|l| query.label_bad.is_none_or(|v| l.label_bad == v))
            .filter(|l| {
                query
                    .label_source
                    .as_deref()
                    .is_none_or(|s| l.label_source == s)
            })
            .filter(|l| query.activity_id.is_none_or(|id| l.activity_id == id))
            .map(|l| l.value().clone())
            .collect();

        labels.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        labels
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect()
    }
}
