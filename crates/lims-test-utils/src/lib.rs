//! Testing utilities for the LIMS workspace
//!
//! Shared fixtures for the documented lab scenarios, plus a tracker wired to
//! in-memory audit and message sinks.

#![allow(missing_docs)]

use lims_core::{
    AssetGroup, Batch, FlashMessages, LabState, LabStore, LimsConfig, Request, SampleTracker,
    Sample, Study, Tag, TagGroup,
};
use lims_lineage::{
    Asset, AssetGroupId, AssetId, AssetKind, AuditLog, BatchId, Material, RequestId, SampleId,
    StudyId, SubmissionId, TagGroupId, TagId, WellPosition,
};
use std::sync::Arc;

/// Tracker plus handles on its audit log and message channel
pub struct Harness {
    pub tracker: SampleTracker,
    pub audit: Arc<AuditLog>,
    pub messages: Arc<FlashMessages>,
}

impl Harness {
    pub fn new(state: LabState, config: LimsConfig) -> Self {
        let audit = Arc::new(AuditLog::new());
        let messages = Arc::new(FlashMessages::new());
        let tracker = SampleTracker::new(Arc::new(LabStore::from_snapshot(state)), config)
            .with_audit(audit.clone())
            .with_messages(messages.clone());
        Self {
            tracker,
            audit,
            messages,
        }
    }

    pub fn snapshot(&self) -> LabState {
        self.tracker.store().snapshot()
    }
}

pub fn insert(state: &mut LabState, asset: Asset) -> AssetId {
    state.graph.insert_asset(asset).unwrap()
}

pub fn insert_with_sample(state: &mut LabState, kind: AssetKind, sample: SampleId) -> AssetId {
    let asset = Asset::new(kind)
        .with_material(Material::Sample(sample))
        .unwrap();
    insert(state, asset)
}

pub fn link(state: &mut LabState, ancestor: AssetId, descendant: AssetId) {
    state.graph.add_link(ancestor, descendant).unwrap();
}

/// Target group in `study_to`, already holding one unrelated asset
fn existing_target_group(state: &mut LabState, study_to: StudyId) -> AssetGroupId {
    let sample_to = state.add_sample(Sample::new("sample to"));
    let asset_to = insert_with_sample(state, AssetKind::SampleTube, sample_to);
    let group = state.add_asset_group(AssetGroup::new("Asset_Exist_To", study_to));
    state.add_membership(group, asset_to);
    group
}

/// Two sample tubes feeding one multiplexed tube and a lane
///
/// ```text
/// sample_tube   -> library_tube   \
///                                  multiplex_tube -> lane
/// sample_tube_2 -> library_tube_2 /
/// ```
///
/// `sample_tube_2` holds a sample of `study_2` and sits in `study_2`'s
/// group, but all five requests belong to `study`.
pub struct LinearChain {
    pub state: LabState,
    pub study: StudyId,
    pub study_2: StudyId,
    pub study_to: StudyId,
    pub sample: SampleId,
    pub sample_2: SampleId,
    pub sample_tube: AssetId,
    pub library_tube: AssetId,
    pub sample_tube_2: AssetId,
    pub library_tube_2: AssetId,
    pub multiplex_tube: AssetId,
    pub lane: AssetId,
    pub asset_group: AssetGroupId,
    pub asset_group_2: AssetGroupId,
    pub asset_group_to_new: AssetGroupId,
    pub requests: Vec<RequestId>,
}

pub fn linear_chain() -> LinearChain {
    let mut state = LabState::new();
    let study = state.add_study(Study::new("study"));
    let study_2 = state.add_study(Study::new("study 2"));
    let study_to = state.add_study(Study::new("study to"));

    let sample = state.add_sample(Sample::new("sample"));
    let sample_2 = state.add_sample(Sample::new("sample 2"));
    state.link_study_sample(study, sample);
    state.link_study_sample(study_2, sample_2);

    let sample_tube = insert_with_sample(&mut state, AssetKind::SampleTube, sample);
    let library_tube = insert_with_sample(&mut state, AssetKind::LibraryTube, sample);
    let sample_tube_2 = insert_with_sample(&mut state, AssetKind::SampleTube, sample_2);
    let library_tube_2 = insert_with_sample(&mut state, AssetKind::LibraryTube, sample_2);
    let multiplex_tube = insert(&mut state, Asset::new(AssetKind::MultiplexedLibraryTube));
    let lane = insert(&mut state, Asset::new(AssetKind::Lane));

    link(&mut state, sample_tube, library_tube);
    link(&mut state, sample_tube_2, library_tube_2);
    link(&mut state, library_tube, multiplex_tube);
    link(&mut state, library_tube_2, multiplex_tube);
    link(&mut state, multiplex_tube, lane);

    let asset_group = state.add_asset_group(AssetGroup::new("group", study));
    state.add_membership(asset_group, sample_tube);
    let asset_group_2 = state.add_asset_group(AssetGroup::new("group 2", study_2));
    state.add_membership(asset_group_2, sample_tube_2);

    let submission = SubmissionId::new();
    let requests = [
        (sample_tube, sample),
        (library_tube, sample),
        (sample_tube_2, sample_2),
        (multiplex_tube, sample),
        (lane, sample),
    ]
    .into_iter()
    .map(|(asset, s)| state.add_request(Request::new(study, asset, submission).with_sample(s)))
    .collect();

    let asset_group_to_new = existing_target_group(&mut state, study_to);

    LinearChain {
        state,
        study,
        study_2,
        study_to,
        sample,
        sample_2,
        sample_tube,
        library_tube,
        sample_tube_2,
        library_tube_2,
        multiplex_tube,
        lane,
        asset_group,
        asset_group_2,
        asset_group_to_new,
        requests,
    }
}

/// One sample tube fanning out to two library tubes that rejoin in a pool
///
/// ```text
///              / library_tube   \
/// sample_tube                     multiplex_tube
///              \ library_tube_2 /
/// ```
pub struct Diamond {
    pub state: LabState,
    pub study: StudyId,
    pub study_to: StudyId,
    pub sample: SampleId,
    pub sample_tube: AssetId,
    pub library_tube: AssetId,
    pub library_tube_2: AssetId,
    pub multiplex_tube: AssetId,
    pub asset_group: AssetGroupId,
    pub asset_group_to_new: AssetGroupId,
    pub request_sample_tube: RequestId,
    pub request_library_tube: RequestId,
    pub request_multiplex: RequestId,
}

pub fn diamond() -> Diamond {
    let mut state = LabState::new();
    let study = state.add_study(Study::new("study"));
    let study_to = state.add_study(Study::new("study to"));
    let sample = state.add_sample(Sample::new("sample"));
    state.link_study_sample(study, sample);

    let sample_tube = insert_with_sample(&mut state, AssetKind::SampleTube, sample);
    let library_tube = insert_with_sample(&mut state, AssetKind::LibraryTube, sample);
    let library_tube_2 = insert_with_sample(&mut state, AssetKind::LibraryTube, sample);
    let multiplex_tube = insert(&mut state, Asset::new(AssetKind::MultiplexedLibraryTube));

    link(&mut state, sample_tube, library_tube);
    link(&mut state, sample_tube, library_tube_2);
    link(&mut state, library_tube, multiplex_tube);
    link(&mut state, library_tube_2, multiplex_tube);

    let asset_group = state.add_asset_group(AssetGroup::new("group", study));
    state.add_membership(asset_group, sample_tube);

    let submission = SubmissionId::new();
    let mut request_on = |asset| {
        state.add_request(Request::new(study, asset, submission).with_sample(sample))
    };
    let request_sample_tube = request_on(sample_tube);
    let request_library_tube = request_on(library_tube);
    let request_multiplex = request_on(multiplex_tube);

    let asset_group_to_new = existing_target_group(&mut state, study_to);

    Diamond {
        state,
        study,
        study_to,
        sample,
        sample_tube,
        library_tube,
        library_tube_2,
        multiplex_tube,
        asset_group,
        asset_group_to_new,
        request_sample_tube,
        request_library_tube,
        request_multiplex,
    }
}

/// A plate of wells, each feeding its own library tube, processed as one
/// batch split across several submissions
pub struct TaggingPlate {
    pub state: LabState,
    pub study: StudyId,
    pub plate: AssetId,
    /// Wells in column-major order
    pub wells: Vec<AssetId>,
    /// Library tube produced from each well, same order as `wells`
    pub libraries: Vec<AssetId>,
    pub submissions: Vec<SubmissionId>,
    pub batch: BatchId,
    pub tag_group: TagGroupId,
    /// Tags of `tag_group` by `map_id`
    pub tags: Vec<TagId>,
}

impl TaggingPlate {
    /// Submission a well's request belongs to
    pub fn submission_of(&self, well: AssetId) -> SubmissionId {
        self.state.requests_on(well).next().unwrap().submission
    }
}

/// `per_submission[i]` wells for submission `i`, laid out A1, B1, ...;
/// the tag group holds `tag_count` tags
pub fn tagging_plate(per_submission: &[usize], tag_count: u32) -> TaggingPlate {
    let mut state = LabState::new();
    let study = state.add_study(Study::new("study"));
    let plate = insert(&mut state, Asset::new(AssetKind::Plate).with_barcode("DN1"));

    let mut wells = Vec::new();
    let mut libraries = Vec::new();
    let mut submissions = Vec::new();
    let mut requests = Vec::new();
    let mut index: usize = 0;
    for &count in per_submission {
        let submission = SubmissionId::new();
        submissions.push(submission);
        for _ in 0..count {
            let sample = state.add_sample(Sample::new(format!("sample {index}")));
            state.link_study_sample(study, sample);
            let row = u8::try_from(index % 8).unwrap();
            let column = u16::try_from(index / 8 + 1).unwrap();
            let well = insert(
                &mut state,
                Asset::new(AssetKind::Well)
                    .with_position(WellPosition::new(row, column).unwrap())
                    .with_material(Material::Sample(sample))
                    .unwrap(),
            );
            link(&mut state, plate, well);
            let library = insert_with_sample(&mut state, AssetKind::LibraryTube, sample);
            link(&mut state, well, library);

            requests.push(state.add_request(
                Request::new(study, well, submission)
                    .with_sample(sample)
                    .with_target(library),
            ));
            wells.push(well);
            libraries.push(library);
            index += 1;
        }
    }
    let batch = state.add_batch(Batch::new(requests));

    let tags: Vec<TagId> = (1..=tag_count)
        .map(|map_id| state.add_tag(Tag::new(map_id, format!("OLIGO{map_id}"))))
        .collect();
    let tag_group = state.add_tag_group(TagGroup::new("tag group", tags.clone()));

    TaggingPlate {
        state,
        study,
        plate,
        wells,
        libraries,
        submissions,
        batch,
        tag_group,
        tags,
    }
}
