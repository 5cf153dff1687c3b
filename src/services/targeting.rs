//! Audience resolution for offer notifications
//!
//! Favorites mode returns every user who favorited the venue. Proximity mode
//! returns users who checked in recently at any venue inside the offer radius.
//! Device tokens are attached but users without one are kept; the sender
//! decides what to do with them.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::get_config;
use crate::errors::Result;
use crate::storage::SeaOrmStorage;
use crate::utils::{Coordinates, distance_km};

/// Who to target for one offer
#[derive(Debug, Clone)]
pub struct TargetingQuery {
    pub venue_id: String,
    pub venue_location: Option<Coordinates>,
    pub radius_km: f64,
    pub favorites_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetUser {
    pub user_id: String,
    pub device_token: Option<String>,
}

#[derive(Clone)]
pub struct TargetingEngine {
    storage: Arc<SeaOrmStorage>,
}

impl TargetingEngine {
    pub fn new(storage: Arc<SeaOrmStorage>) -> Self {
        Self { storage }
    }

    /// Resolve recipients; any lookup failure yields an empty audience
    pub async fn resolve_targets(&self, query: &TargetingQuery) -> Vec<TargetUser> {
        match self.try_resolve(query).await {
            Ok(targets) => {
                debug!(
                    "Resolved {} targets for venue {} (favorites_only={})",
                    targets.len(),
                    query.venue_id,
                    query.favorites_only
                );
                targets
            }
            Err(e) => {
                warn!(
                    "Target resolution failed for venue {}, sending to nobody: {}",
                    query.venue_id, e
                );
                Vec::new()
            }
        }
    }

    async fn try_resolve(&self, query: &TargetingQuery) -> Result<Vec<TargetUser>> {
        let user_ids = if query.favorites_only {
            self.storage.favorite_user_ids(&query.venue_id).await?
        } else {
            self.nearby_visitors(query).await?
        };
        let user_ids = dedup_preserving_order(user_ids);

        let mut tokens = self.storage.device_tokens_for(&user_ids).await?;
        Ok(user_ids
            .into_iter()
            .map(|user_id| TargetUser {
                device_token: tokens.remove(&user_id),
                user_id,
            })
            .collect())
    }

    async fn nearby_visitors(&self, query: &TargetingQuery) -> Result<Vec<String>> {
        let Some(origin) = query.venue_location else {
            debug!(
                "Venue {} has no coordinates, proximity audience is empty",
                query.venue_id
            );
            return Ok(Vec::new());
        };

        let venue_ids: Vec<String> = self
            .storage
            .list_located_venues()
            .await?
            .into_iter()
            .filter_map(|v| {
                let at = v.coordinates?;
                (distance_km(origin, at) <= query.radius_km).then_some(v.id)
            })
            .collect();

        let since = Utc::now() - Duration::days(get_config().targeting.lookback_days);
        self.storage
            .recent_check_in_user_ids(&venue_ids, since)
            .await
    }
}

fn dedup_preserving_order(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.into_iter()
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_keeps_first_seen_order() {
        let ids = vec!["b", "a", "b", "c", "a"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(dedup_preserving_order(ids), vec!["b", "a", "c"]);
    }
}
