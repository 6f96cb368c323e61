//! Adding, removing and bulk-seeding set buckets
//!
//! The overflow bucket stays last and can never be removed; every operation
//! renumbers orders so they remain contiguous.

use std::collections::HashSet;

use bandbook_common::db::Song;
use tracing::{info, warn};
use uuid::Uuid;

use super::columns::{Bucket, ColumnModel};
use crate::error::{Error, Result};

/// Cap on songs per set when seeding sets in bulk
pub const MAX_SONGS_PER_SET: usize = 15;

impl ColumnModel {
    /// Insert an empty set just before overflow; returns its order
    pub fn add_bucket(&mut self) -> usize {
        let order = self.overflow_order();
        self.buckets_mut().insert(order, Bucket::empty(order));
        self.settle();
        order
    }

    /// Remove a set, appending its songs to the overflow bucket
    ///
    /// Removing the overflow bucket is refused (logged, returns `false`).
    pub fn remove_bucket(&mut self, order: usize) -> Result<bool> {
        if order >= self.len() {
            return Err(Error::validation(
                "bucket",
                format!("bucket {} does not exist", order),
            ));
        }
        if self.is_overflow(order) {
            warn!("Refusing to remove the overflow bucket");
            return Ok(false);
        }

        let removed = self.buckets_mut().remove(order);
        let moved = removed.songs.len();
        self.overflow_mut().songs.extend(removed.songs);
        self.settle();

        info!("Removed set bucket {}, returned {} songs to overflow", order, moved);
        Ok(true)
    }

    /// Replace all sets with `set_count` fresh ones filled round-robin
    ///
    /// Uses [`MAX_SONGS_PER_SET`] as the per-set cap.
    pub fn seed_buckets(&mut self, set_count: usize, all_songs: &[Song]) -> Result<()> {
        self.seed_buckets_with_cap(set_count, all_songs, MAX_SONGS_PER_SET)
    }

    /// Destructive: previous set contents are discarded back to overflow.
    /// Songs past `cap * set_count` stay in (or join) the overflow bucket.
    pub fn seed_buckets_with_cap(
        &mut self,
        set_count: usize,
        all_songs: &[Song],
        cap: usize,
    ) -> Result<()> {
        if set_count == 0 {
            return Err(Error::validation("setCount", "at least one set is required"));
        }

        let capacity = set_count.saturating_mul(cap);
        let mut fresh: Vec<Bucket> = (0..set_count).map(Bucket::empty).collect();
        let mut assigned: HashSet<Uuid> = HashSet::new();

        for song in all_songs {
            if assigned.len() >= capacity {
                break;
            }
            if assigned.insert(song.id) {
                let slot = (assigned.len() - 1) % set_count;
                fresh[slot].songs.push(song.clone());
            }
        }

        let buckets = self.buckets_mut();
        let old_overflow = buckets.pop().map(|bucket| bucket.songs).unwrap_or_default();
        let displaced: Vec<Song> = buckets.drain(..).flat_map(|bucket| bucket.songs).collect();

        let mut overflow: Vec<Song> = Vec::new();
        let mut in_overflow: HashSet<Uuid> = HashSet::new();
        for song in old_overflow
            .into_iter()
            .chain(displaced)
            .chain(all_songs.iter().cloned())
        {
            if !assigned.contains(&song.id) && in_overflow.insert(song.id) {
                overflow.push(song);
            }
        }

        let overflow_order = fresh.len();
        buckets.extend(fresh);
        buckets.push(Bucket {
            order: overflow_order,
            songs: overflow,
        });
        self.settle();

        info!(
            "Seeded {} sets with {} songs ({} left in overflow)",
            set_count,
            assigned.len(),
            self.overflow().songs.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::test_support::{catalog, model_with, titles};

    #[test]
    fn test_add_bucket_goes_before_overflow() {
        let mut model = model_with(&[&["S1"]], &["S2"]);

        let order = model.add_bucket();

        assert_eq!(order, 1);
        assert_eq!(model.len(), 3);
        assert!(model.snapshot()[1].songs.is_empty());
        assert_eq!(titles(model.overflow()), vec!["S2"]);
        assert_eq!(model.overflow().order, 2);
    }

    #[test]
    fn test_remove_bucket_appends_songs_to_overflow() {
        let mut model = model_with(&[&["S1", "S2"], &["S3"]], &["S4"]);

        assert!(model.remove_bucket(1).unwrap());

        assert_eq!(model.len(), 2);
        assert_eq!(titles(&model.snapshot()[0]), vec!["S1", "S2"]);
        assert_eq!(titles(model.overflow()), vec!["S4", "S3"]);
        assert_eq!(model.snapshot()[0].order, 0);
        assert_eq!(model.overflow().order, 1);
    }

    #[test]
    fn test_remove_first_bucket_renumbers() {
        let mut model = model_with(&[&["S1"], &["S2"]], &[]);

        model.remove_bucket(0).unwrap();

        assert_eq!(titles(&model.snapshot()[0]), vec!["S2"]);
        assert_eq!(model.snapshot()[0].order, 0);
        assert_eq!(titles(model.overflow()), vec!["S1"]);
        assert!(model.check_invariants().is_ok());
    }

    #[test]
    fn test_remove_overflow_is_refused() {
        let mut model = model_with(&[&["S1"]], &["S2"]);
        let before = model.clone();

        let removed = model.remove_bucket(model.overflow_order()).unwrap();

        assert!(!removed);
        assert_eq!(model, before);
    }

    #[test]
    fn test_remove_unknown_bucket_is_validation_error() {
        let mut model = model_with(&[&["S1"]], &[]);
        assert!(matches!(model.remove_bucket(9), Err(Error::Validation { .. })));
    }

    #[test]
    fn test_all_sets_can_be_removed() {
        let mut model = model_with(&[&["S1"]], &["S2"]);

        model.remove_bucket(0).unwrap();

        assert_eq!(model.len(), 1);
        assert_eq!(titles(model.overflow()), vec!["S2", "S1"]);
    }

    #[test]
    fn test_seed_round_robin() {
        let songs = catalog(&["S1", "S2", "S3", "S4", "S5"]);
        let mut model = ColumnModel::new_setlist(songs.clone());

        model.seed_buckets(2, &songs).unwrap();

        assert_eq!(model.len(), 3);
        assert_eq!(titles(&model.snapshot()[0]), vec!["S1", "S3", "S5"]);
        assert_eq!(titles(&model.snapshot()[1]), vec!["S2", "S4"]);
        assert!(model.overflow().songs.is_empty());
    }

    #[test]
    fn test_seed_cap_leaves_rest_in_overflow() {
        let songs = catalog(&["S1", "S2", "S3", "S4", "S5"]);
        let mut model = ColumnModel::new_setlist(songs.clone());

        model.seed_buckets_with_cap(2, &songs, 1).unwrap();

        assert_eq!(titles(&model.snapshot()[0]), vec!["S1"]);
        assert_eq!(titles(&model.snapshot()[1]), vec!["S2"]);
        assert_eq!(titles(model.overflow()), vec!["S3", "S4", "S5"]);
    }

    #[test]
    fn test_seed_discards_previous_sets_to_overflow() {
        let mut model = model_with(&[&["S1", "S2"], &["S3"], &["S4"]], &["S5"]);
        let s5 = model.overflow().songs[0].clone();

        model.seed_buckets(1, &[s5]).unwrap();

        assert_eq!(model.len(), 2);
        assert_eq!(titles(&model.snapshot()[0]), vec!["S5"]);
        assert_eq!(titles(model.overflow()), vec!["S1", "S2", "S3", "S4"]);
        assert!(model.check_invariants().is_ok());
    }

    #[test]
    fn test_seed_zero_sets_is_rejected() {
        let songs = catalog(&["S1"]);
        let mut model = ColumnModel::new_setlist(songs.clone());
        let before = model.clone();

        assert!(model.seed_buckets(0, &songs).is_err());
        assert_eq!(model, before);
    }
}
