//! Drag-and-drop reordering
//!
//! The engine knows nothing about any drag library. A gesture source reports
//! where a drag started and where (if anywhere) it ended through
//! [`ReorderSink::on_reorder`]; droppable ids are bucket keys, parsed with
//! [`DropLocation::parse`].

use tracing::{debug, warn};

use super::columns::ColumnModel;
use crate::error::{Error, Result};

/// A position inside a bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropLocation {
    pub bucket: usize,
    pub index: usize,
}

impl DropLocation {
    pub fn new(bucket: usize, index: usize) -> Self {
        Self { bucket, index }
    }

    /// Parse a droppable id (bucket key) into a location
    pub fn parse(droppable_id: &str, index: usize) -> Result<Self> {
        let bucket = droppable_id.trim().parse::<usize>().map_err(|_| {
            Error::validation(
                "bucket",
                format!("'{}' is not a bucket identifier", droppable_id),
            )
        })?;
        Ok(Self { bucket, index })
    }
}

/// Capability a drag gesture source drives
pub trait ReorderSink {
    /// Apply a finished drag. `destination` is `None` when the drag was
    /// dropped outside any bucket. Returns whether anything moved.
    fn on_reorder(
        &mut self,
        source: DropLocation,
        destination: Option<DropLocation>,
    ) -> Result<bool>;
}

impl ColumnModel {
    /// Move one song between (or within) buckets
    ///
    /// A cancelled drag leaves the model untouched. The overflow bucket is a
    /// valid source and destination.
    pub fn move_song(
        &mut self,
        source: DropLocation,
        destination: Option<DropLocation>,
    ) -> Result<bool> {
        let Some(destination) = destination else {
            warn!(
                "Drag from bucket {} index {} ended without a destination, ignoring",
                source.bucket, source.index
            );
            return Ok(false);
        };

        let source_len = self
            .bucket(source.bucket)
            .ok_or_else(|| unknown_bucket(source.bucket))?
            .songs
            .len();
        let destination_len = self
            .bucket(destination.bucket)
            .ok_or_else(|| unknown_bucket(destination.bucket))?
            .songs
            .len();

        if source.index >= source_len {
            return Err(Error::validation(
                "index",
                format!(
                    "bucket {} has no song at index {}",
                    source.bucket, source.index
                ),
            ));
        }

        let buckets = self.buckets_mut();

        if source.bucket == destination.bucket {
            // After removal the bucket is one shorter
            let target = destination.index.min(source_len - 1);
            if target == source.index {
                return Ok(false);
            }
            let songs = &mut buckets[source.bucket].songs;
            let song = songs.remove(source.index);
            songs.insert(target, song);
        } else {
            let target = destination.index.min(destination_len);
            let song = buckets[source.bucket].songs.remove(source.index);
            buckets[destination.bucket].songs.insert(target, song);
        }

        debug!(
            from_bucket = source.bucket,
            from_index = source.index,
            to_bucket = destination.bucket,
            to_index = destination.index,
            "Moved song"
        );
        self.settle();
        Ok(true)
    }
}

impl ReorderSink for ColumnModel {
    fn on_reorder(
        &mut self,
        source: DropLocation,
        destination: Option<DropLocation>,
    ) -> Result<bool> {
        self.move_song(source, destination)
    }
}

fn unknown_bucket(order: usize) -> Error {
    Error::validation("bucket", format!("bucket {} does not exist", order))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::test_support::{catalog, model_with, titles};

    #[test]
    fn test_cancelled_drag_is_noop() {
        let mut model = model_with(&[&["S1", "S2"], &["S3"]], &["S4"]);
        let before = model.clone();

        let moved = model.move_song(DropLocation::new(0, 1), None).unwrap();

        assert!(!moved);
        assert_eq!(model, before);
    }

    #[test]
    fn test_move_within_bucket_forward_and_back() {
        let mut model = model_with(&[&["S1", "S2", "S3"]], &[]);

        model
            .move_song(DropLocation::new(0, 0), Some(DropLocation::new(0, 2)))
            .unwrap();
        assert_eq!(titles(&model.snapshot()[0]), vec!["S2", "S3", "S1"]);

        model
            .move_song(DropLocation::new(0, 2), Some(DropLocation::new(0, 0)))
            .unwrap();
        assert_eq!(titles(&model.snapshot()[0]), vec!["S1", "S2", "S3"]);
    }

    #[test]
    fn test_move_within_bucket_leaves_others_untouched() {
        let mut model = model_with(&[&["S1", "S2"], &["S3"]], &["S4"]);
        let other = model.snapshot()[1].clone();
        let overflow = model.overflow().clone();

        model
            .move_song(DropLocation::new(0, 1), Some(DropLocation::new(0, 0)))
            .unwrap();

        assert_eq!(model.snapshot()[1], other);
        assert_eq!(model.overflow(), &overflow);
    }

    #[test]
    fn test_move_across_buckets_keeps_relative_order() {
        let mut model = model_with(&[&["S1", "S2", "S3"], &["S4", "S5"]], &[]);

        model
            .move_song(DropLocation::new(0, 1), Some(DropLocation::new(1, 1)))
            .unwrap();

        assert_eq!(titles(&model.snapshot()[0]), vec!["S1", "S3"]);
        assert_eq!(titles(&model.snapshot()[1]), vec!["S4", "S2", "S5"]);
        assert!(model.check_invariants().is_ok());
    }

    #[test]
    fn test_move_into_and_out_of_overflow() {
        let mut model = model_with(&[&["S1"]], &["S2"]);

        model
            .move_song(DropLocation::new(0, 0), Some(DropLocation::new(1, 0)))
            .unwrap();
        assert!(model.snapshot()[0].songs.is_empty());
        assert_eq!(titles(model.overflow()), vec!["S1", "S2"]);

        model
            .move_song(DropLocation::new(1, 1), Some(DropLocation::new(0, 0)))
            .unwrap();
        assert_eq!(titles(&model.snapshot()[0]), vec!["S2"]);
    }

    #[test]
    fn test_destination_index_past_end_appends() {
        let mut model = model_with(&[&["S1"], &["S2"]], &[]);

        model
            .move_song(DropLocation::new(0, 0), Some(DropLocation::new(1, 99)))
            .unwrap();

        assert_eq!(titles(&model.snapshot()[1]), vec!["S2", "S1"]);
    }

    #[test]
    fn test_unknown_bucket_and_index_are_rejected() {
        let mut model = model_with(&[&["S1"]], &[]);
        let before = model.clone();

        let bad_bucket = model.move_song(DropLocation::new(7, 0), Some(DropLocation::new(0, 0)));
        assert!(matches!(bad_bucket, Err(Error::Validation { .. })));

        let bad_index = model.move_song(DropLocation::new(0, 3), Some(DropLocation::new(1, 0)));
        assert!(matches!(bad_index, Err(Error::Validation { .. })));

        assert_eq!(model, before);
    }

    #[test]
    fn test_reorder_sink_parses_droppable_ids() {
        let mut model = ColumnModel::new_setlist(catalog(&["S1", "S2"]));

        let source = DropLocation::parse("1", 0).unwrap();
        let destination = DropLocation::parse("0", 0).unwrap();
        assert!(model.on_reorder(source, Some(destination)).unwrap());
        assert_eq!(titles(&model.snapshot()[0]), vec!["S1"]);

        assert!(DropLocation::parse("set-a", 0).is_err());
    }
}
