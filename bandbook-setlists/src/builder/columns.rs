//! Column model: the in-memory arrangement of a setlist being built
//!
//! Buckets are kept in a `Vec` whose index always equals the bucket's
//! `order`. The last bucket is the overflow bucket holding songs not yet
//! placed in a set. Mutations live in sibling modules (`reorder`,
//! `lifecycle`, `picker`) and all end by calling [`ColumnModel::settle`].

use std::collections::{HashMap, HashSet};

use bandbook_common::db::{Set, Song};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::error::{Error, Result};

/// One column of the builder: a set, or the overflow bucket when last
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bucket {
    pub order: usize,
    pub songs: Vec<Song>,
}

impl Bucket {
    pub(crate) fn empty(order: usize) -> Self {
        Self {
            order,
            songs: Vec::new(),
        }
    }

    /// Drag-and-drop key of this bucket (its order in string form)
    pub fn key(&self) -> String {
        self.order.to_string()
    }

    /// Index of a song within this bucket
    pub fn position_of(&self, song_id: Uuid) -> Option<usize> {
        self.songs.iter().position(|song| song.id == song_id)
    }
}

/// Ordered buckets plus the band catalog they were seeded from
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnModel {
    buckets: Vec<Bucket>,
    catalog: Vec<Song>,
}

impl ColumnModel {
    /// Model for a new setlist: one empty set, overflow holding the catalog
    pub fn new_setlist(catalog: Vec<Song>) -> Self {
        let catalog = dedup_catalog(catalog);
        let overflow = Bucket {
            order: 1,
            songs: catalog.clone(),
        };
        Self {
            buckets: vec![Bucket::empty(0), overflow],
            catalog,
        }
    }

    /// Build the model from persisted sets (edit mode) or from scratch
    ///
    /// In edit mode each persisted set becomes one bucket in `order`, and the
    /// overflow bucket receives the catalog songs not used by any set. A set
    /// referencing a song missing from the catalog, or a song used twice,
    /// is rejected.
    pub fn initialize(existing_sets: Option<&[Set]>, catalog: Vec<Song>) -> Result<Self> {
        let Some(sets) = existing_sets else {
            return Ok(Self::new_setlist(catalog));
        };

        let catalog = dedup_catalog(catalog);
        let by_id: HashMap<Uuid, &Song> = catalog.iter().map(|song| (song.id, song)).collect();

        let mut sorted: Vec<&Set> = sets.iter().collect();
        sorted.sort_by_key(|set| set.order);

        let mut placed: HashSet<Uuid> = HashSet::new();
        let mut buckets = Vec::with_capacity(sorted.len() + 1);

        for (index, set) in sorted.iter().enumerate() {
            let mut entries: Vec<_> = set.songs.iter().collect();
            entries.sort_by_key(|entry| entry.position);

            let mut songs = Vec::with_capacity(entries.len());
            for entry in entries {
                let song = by_id.get(&entry.song.id).ok_or_else(|| {
                    Error::validation(
                        "sets",
                        format!(
                            "{} references song {} which is no longer in the catalog",
                            set.name, entry.song.id
                        ),
                    )
                })?;
                if !placed.insert(song.id) {
                    return Err(Error::validation(
                        "sets",
                        format!("song '{}' appears in more than one set", song.title),
                    ));
                }
                songs.push((*song).clone());
            }
            buckets.push(Bucket {
                order: index,
                songs,
            });
        }

        let overflow_songs = catalog
            .iter()
            .filter(|song| !placed.contains(&song.id))
            .cloned()
            .collect();
        buckets.push(Bucket {
            order: buckets.len(),
            songs: overflow_songs,
        });

        let model = Self { buckets, catalog };
        model.check_invariants()?;
        Ok(model)
    }

    /// Full bucket list, overflow last
    pub fn snapshot(&self) -> &[Bucket] {
        &self.buckets
    }

    /// Number of buckets including overflow
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(|bucket| bucket.songs.is_empty())
    }

    pub fn bucket(&self, order: usize) -> Option<&Bucket> {
        self.buckets.get(order)
    }

    pub fn overflow_order(&self) -> usize {
        self.buckets.len() - 1
    }

    pub fn is_overflow(&self, order: usize) -> bool {
        order == self.overflow_order()
    }

    pub fn overflow(&self) -> &Bucket {
        &self.buckets[self.overflow_order()]
    }

    /// The set buckets (everything but overflow)
    pub fn set_buckets(&self) -> &[Bucket] {
        &self.buckets[..self.overflow_order()]
    }

    pub fn catalog(&self) -> &[Song] {
        &self.catalog
    }

    pub fn catalog_song(&self, song_id: Uuid) -> Option<&Song> {
        self.catalog.iter().find(|song| song.id == song_id)
    }

    /// Ids of songs already placed in a set
    pub fn used_song_ids(&self) -> HashSet<Uuid> {
        self.set_buckets()
            .iter()
            .flat_map(|bucket| bucket.songs.iter().map(|song| song.id))
            .collect()
    }

    /// `(bucket order, index)` of a song, if the model knows it
    pub fn locate(&self, song_id: Uuid) -> Option<(usize, usize)> {
        self.buckets.iter().find_map(|bucket| {
            bucket
                .position_of(song_id)
                .map(|index| (bucket.order, index))
        })
    }

    /// Verify contiguous orders and exactly-one membership
    pub fn check_invariants(&self) -> Result<()> {
        if self.buckets.is_empty() {
            return Err(Error::ConsistencyViolation(
                "overflow bucket is missing".to_string(),
            ));
        }

        for (index, bucket) in self.buckets.iter().enumerate() {
            if bucket.order != index {
                return Err(Error::ConsistencyViolation(format!(
                    "bucket at position {} has order {}",
                    index, bucket.order
                )));
            }
        }

        let mut seen = HashSet::new();
        for bucket in &self.buckets {
            for song in &bucket.songs {
                if !seen.insert(song.id) {
                    return Err(Error::ConsistencyViolation(format!(
                        "song {} appears in more than one place",
                        song.id
                    )));
                }
            }
        }

        Ok(())
    }

    pub(crate) fn buckets_mut(&mut self) -> &mut Vec<Bucket> {
        &mut self.buckets
    }

    pub(crate) fn overflow_mut(&mut self) -> &mut Bucket {
        let order = self.overflow_order();
        &mut self.buckets[order]
    }

    /// Renumber orders to match positions, then assert invariants in debug builds
    pub(crate) fn settle(&mut self) {
        for (index, bucket) in self.buckets.iter_mut().enumerate() {
            bucket.order = index;
        }
        debug_assert!(
            self.check_invariants().is_ok(),
            "column model invariant broken: {:?}",
            self.check_invariants()
        );
    }
}

fn dedup_catalog(catalog: Vec<Song>) -> Vec<Song> {
    let mut seen = HashSet::new();
    let total = catalog.len();
    let deduped: Vec<Song> = catalog
        .into_iter()
        .filter(|song| seen.insert(song.id))
        .collect();
    if deduped.len() != total {
        warn!(
            "Catalog contained {} duplicate song ids, keeping first occurrences",
            total - deduped.len()
        );
    }
    deduped
}
