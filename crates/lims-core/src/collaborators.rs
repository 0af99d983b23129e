//! Seams to the systems around the workflows: batch and tag-group lookups,
//! and the channel that carries user-facing messages.

use crate::error::LimsError;
use crate::store::LabStore;
use crate::types::{Request, Tag, TagGroup};
use lims_lineage::{Asset, AssetKind, BatchId, TagGroupId};
use parking_lot::Mutex;

/// Resolves a batch to its requests and plate
pub trait BatchLookup: Send + Sync {
    /// Requests of the batch, in batch order
    ///
    /// # Errors
    /// `UnknownBatch` or `UnknownRequest`
    fn batch_requests(&self, batch: BatchId) -> Result<Vec<Request>, LimsError>;

    /// Plate holding the batch's wells
    ///
    /// # Errors
    /// `UnknownBatch` or `BatchHasNoPlate`
    fn batch_plate(&self, batch: BatchId) -> Result<Asset, LimsError>;
}

/// Resolves tag groups and their tags
pub trait TagGroupLookup: Send + Sync {
    /// # Errors
    /// `UnknownTagGroup`
    fn tag_group(&self, id: TagGroupId) -> Result<TagGroup, LimsError>;

    /// Tags of the group ordered by `map_id`
    ///
    /// # Errors
    /// `UnknownTagGroup` or `UnknownTag`
    fn tags_in_group(&self, id: TagGroupId) -> Result<Vec<Tag>, LimsError>;
}

/// User-facing message sink
pub trait MessageChannel: Send + Sync {
    fn notice(&self, message: &str);
    fn warning(&self, message: &str);
    fn error(&self, message: &str);
}

impl BatchLookup for LabStore {
    fn batch_requests(&self, batch: BatchId) -> Result<Vec<Request>, LimsError> {
        self.read(|state| state.batch_requests(batch))
    }

    fn batch_plate(&self, batch: BatchId) -> Result<Asset, LimsError> {
        self.read(|state| {
            let requests = state.batch_requests(batch)?;
            requests
                .iter()
                .flat_map(|request| state.graph.parents_of(request.asset))
                .filter_map(|parent| state.graph.asset(parent))
                .find(|asset| asset.kind == AssetKind::Plate)
                .cloned()
                .ok_or(LimsError::BatchHasNoPlate(batch))
        })
    }
}

impl TagGroupLookup for LabStore {
    fn tag_group(&self, id: TagGroupId) -> Result<TagGroup, LimsError> {
        self.read(|state| {
            state
                .tag_groups
                .get(&id)
                .cloned()
                .ok_or(LimsError::UnknownTagGroup(id))
        })
    }

    fn tags_in_group(&self, id: TagGroupId) -> Result<Vec<Tag>, LimsError> {
        self.read(|state| {
            let group = state
                .tag_groups
                .get(&id)
                .ok_or(LimsError::UnknownTagGroup(id))?;
            let mut tags = group
                .tags
                .iter()
                .map(|tag| {
                    state
                        .tags
                        .get(tag)
                        .cloned()
                        .ok_or(LimsError::UnknownTag(*tag))
                })
                .collect::<Result<Vec<_>, _>>()?;
            tags.sort_by_key(|tag| tag.map_id);
            Ok(tags)
        })
    }
}

/// Message with its severity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flash {
    Notice(String),
    Warning(String),
    Error(String),
}

impl Flash {
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Notice(text) | Self::Warning(text) | Self::Error(text) => text,
        }
    }
}

/// Collects messages in memory until drained
#[derive(Debug, Default)]
pub struct FlashMessages {
    inner: Mutex<Vec<Flash>>,
}

impl FlashMessages {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages so far, oldest first
    #[must_use]
    pub fn messages(&self) -> Vec<Flash> {
        self.inner.lock().clone()
    }

    /// Take every pending message
    pub fn drain(&self) -> Vec<Flash> {
        std::mem::take(&mut *self.inner.lock())
    }

    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        self.inner
            .lock()
            .iter()
            .filter_map(|flash| match flash {
                Flash::Warning(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.inner
            .lock()
            .iter()
            .filter_map(|flash| match flash {
                Flash::Error(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }
}

impl MessageChannel for FlashMessages {
    fn notice(&self, message: &str) {
        self.inner.lock().push(Flash::Notice(message.to_string()));
    }

    fn warning(&self, message: &str) {
        self.inner.lock().push(Flash::Warning(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.inner.lock().push(Flash::Error(message.to_string()));
    }
}

/// Forwards messages to the tracing subscriber
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMessages;

impl MessageChannel for TracingMessages {
    fn notice(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn warning(&self, message: &str) {
        tracing::warn!("{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!("{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LabState;
    use crate::types::{Batch, Request};
    use lims_lineage::{StudyId, SubmissionId, WellPosition};

    #[test]
    fn flash_messages_drain() {
        let flash = FlashMessages::new();
        flash.warning("careful");
        flash.error("broken");
        assert_eq!(flash.warnings(), vec!["careful".to_string()]);
        assert_eq!(flash.errors(), vec!["broken".to_string()]);

        let drained = flash.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].text(), "careful");
        assert!(flash.messages().is_empty());
    }

    #[test]
    fn tags_are_ordered_by_map_id() {
        let mut state = LabState::new();
        let second = state.add_tag(Tag::new(2, "CCCC"));
        let first = state.add_tag(Tag::new(1, "AAAA"));
        let group = state.add_tag_group(TagGroup::new("group", vec![second, first]));

        let store = LabStore::from_snapshot(state);
        let tags = store.tags_in_group(group).unwrap();
        let ids: Vec<_> = tags.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![first, second]);
    }

    #[test]
    fn plate_is_parent_of_batch_wells() {
        let mut state = LabState::new();
        let plate = state
            .graph
            .insert_asset(Asset::new(AssetKind::Plate))
            .unwrap();
        let a1 = WellPosition::new(0, 1).unwrap();
        let well = state
            .graph
            .insert_asset(Asset::new(AssetKind::Well).with_position(a1))
            .unwrap();
        state.graph.add_link(plate, well).unwrap();
        let request = state.add_request(Request::new(StudyId::new(), well, SubmissionId::new()));
        let batch = state.add_batch(Batch::new(vec![request]));
        let orphan = state.add_batch(Batch::new(Vec::new()));

        let store = LabStore::from_snapshot(state);
        assert_eq!(store.batch_plate(batch).unwrap().id, plate);
        assert!(matches!(
            store.batch_plate(orphan),
            Err(LimsError::BatchHasNoPlate(_))
        ));
        assert!(matches!(
            store.batch_requests(BatchId::new()),
            Err(LimsError::UnknownBatch(_))
        ));
    }
}
