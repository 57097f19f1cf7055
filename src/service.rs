//! Keeps meal rows and their photo files consistent.
//!
//! The two stores share no transaction, so every flow orders its steps so a
//! failure part-way leaves either no row or a row whose photo still exists.
//! The only inconsistency a failure may leave behind is an unreferenced photo
//! file, which `cleanup_orphans` removes.

use chrono::{NaiveDate, NaiveTime};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use tokio::sync::watch;

use crate::db::MealRepository;
use crate::error::Result;
use crate::models::{normalize_note, now_millis, truncate_to_minute, Meal, MealType};
use crate::photos::PhotoStore;

/// User-editable fields of a meal.
#[derive(Debug, Clone)]
pub struct MealDraft {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub meal_type: MealType,
    pub note: Option<String>,
}

/// What an update does to the meal's photo.
#[derive(Debug, Clone, Default)]
pub enum PhotoChange {
    #[default]
    Keep,
    /// Copy a newly picked image in and release the old one.
    Replace(PathBuf),
    Remove,
}

/// Everything views need after a change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub meals: Vec<Meal>,
    pub marked_dates: BTreeSet<NaiveDate>,
}

pub struct MealService {
    repo: MealRepository,
    photos: PhotoStore,
    snapshot: watch::Sender<Snapshot>,
}

impl MealService {
    pub fn new(repo: MealRepository, photos: PhotoStore) -> Self {
        let (snapshot, _) = watch::channel(Snapshot::default());
        Self {
            repo,
            photos,
            snapshot,
        }
    }

    pub fn photos(&self) -> &PhotoStore {
        &self.photos
    }

    /// Receiver that sees a fresh snapshot after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot.subscribe()
    }

    /// Re-reads all meals and marked dates and publishes them.
    pub async fn refresh(&self) -> Result<Snapshot> {
        let snapshot = Snapshot {
            meals: self.repo.list().await?,
            marked_dates: self.repo.distinct_dates().await?,
        };
        self.snapshot.send_replace(snapshot.clone());
        Ok(snapshot)
    }

    pub async fn list(&self) -> Result<Vec<Meal>> {
        self.repo.list().await
    }

    pub async fn list_by_date(&self, date: NaiveDate) -> Result<Vec<Meal>> {
        self.repo.list_by_date(date).await
    }

    pub async fn get(&self, id: &str) -> Result<Option<Meal>> {
        self.repo.get_by_id(id).await
    }

    pub async fn count(&self) -> Result<i64> {
        self.repo.count().await
    }

    pub async fn marked_dates(&self) -> Result<BTreeSet<NaiveDate>> {
        self.repo.distinct_dates().await
    }

    /// Records a new meal, copying `photo` into the photo store first.
    pub async fn add(&self, draft: MealDraft, photo: Option<PathBuf>) -> Result<Meal> {
        let photo_uri = match photo {
            Some(source) => Some(self.photos.save(&source).await?),
            None => None,
        };

        let mut meal = Meal::new(draft.date, draft.time, draft.meal_type);
        meal.note = normalize_note(draft.note.as_deref());
        meal.photo_uri = photo_uri;

        let created = match self.repo.create(&meal).await {
            Ok(created) => created,
            Err(e) => {
                if let Some(orphan) = &meal.photo_uri {
                    tracing::error!("Meal insert failed, photo {} is now orphaned", orphan);
                }
                return Err(e);
            }
        };

        tracing::info!(id = %created.id, date = %created.date, "Added meal");
        self.refresh().await?;
        Ok(created)
    }

    /// Applies `draft` and `photo` to an existing meal.
    ///
    /// Returns `Ok(None)` when the meal does not exist; nothing is touched.
    pub async fn update(
        &self,
        id: &str,
        draft: MealDraft,
        photo: PhotoChange,
    ) -> Result<Option<Meal>> {
        let Some(previous) = self.repo.get_by_id(id).await? else {
            return Ok(None);
        };

        let photo = match photo {
            PhotoChange::Replace(source)
                if previous.photo_uri.as_deref().map(Path::new) == Some(source.as_path()) =>
            {
                PhotoChange::Keep
            }
            other => other,
        };

        // New photo is durable before the row points at it
        let new_photo_uri = match &photo {
            PhotoChange::Replace(source) => Some(self.photos.save(source).await?),
            _ => None,
        };

        let mut meal = previous.clone();
        meal.date = draft.date;
        meal.time = truncate_to_minute(draft.time);
        meal.meal_type = draft.meal_type;
        meal.note = normalize_note(draft.note.as_deref());
        meal.updated_at = now_millis().max(previous.updated_at + 1);
        match &photo {
            PhotoChange::Keep => {}
            PhotoChange::Replace(_) => meal.photo_uri = new_photo_uri.clone(),
            PhotoChange::Remove => meal.photo_uri = None,
        }

        let written = match self.repo.update(&meal).await {
            Ok(written) => written,
            Err(e) => {
                if let Some(orphan) = &new_photo_uri {
                    tracing::error!("Meal update failed, photo {} is now orphaned", orphan);
                }
                return Err(e);
            }
        };

        if !written {
            // A newer write won; the old photo may still be referenced.
            tracing::warn!(id, "Meal update lost to a newer write");
            if let Some(unused) = &new_photo_uri {
                self.photos.delete(unused).await;
            }
            self.refresh().await?;
            return self.repo.get_by_id(id).await;
        }

        // Only after the row stopped referencing the old photo
        if !matches!(photo, PhotoChange::Keep) {
            if let Some(old) = &previous.photo_uri {
                self.photos.delete(old).await;
            }
        }

        tracing::info!(id, "Updated meal");
        self.refresh().await?;
        Ok(Some(meal))
    }

    /// Deletes a meal and the photo it owns. Returns whether it existed.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let Some(meal) = self.repo.get_by_id(id).await? else {
            return Ok(false);
        };

        if let Some(photo) = &meal.photo_uri {
            self.photos.delete(photo).await;
        }
        self.repo.delete(id).await?;

        tracing::info!(id, "Deleted meal");
        self.refresh().await?;
        Ok(true)
    }

    /// Removes photo files no meal references. Returns how many were removed.
    pub async fn cleanup_orphans(&self) -> Result<usize> {
        let mut removed = self.photos.remove_partial_writes().await?;

        let referenced: HashSet<String> = self
            .repo
            .list()
            .await?
            .into_iter()
            .filter_map(|m| m.photo_uri)
            .collect();

        for reference in self.photos.list().await? {
            if referenced.contains(&reference) {
                continue;
            }
            self.photos.delete(&reference).await;
            if !self.photos.exists(&reference).await {
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::info!("Removed {} orphaned photo file(s)", removed);
        }
        Ok(removed)
    }
}
