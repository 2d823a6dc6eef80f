//! Shared sync pipeline entrypoint used by `sync` and `refresh-synced`.

use winget_mirror_core::{ManifestIndex, MirrorContext, PackageFilter};

use crate::engine::{SyncEngine, SyncReport};
use crate::fetch::Fetcher;
use crate::SyncError;

/// Which packages a run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncScope {
    /// Latest version of every catalog package matching the filter.
    Filter(PackageFilter),
    /// Every package already in the state store.
    Synced,
}

/// Build the manifest index for `ctx` and run the engine over `scope`.
///
/// `revision` is stamped onto every record this run writes.
pub fn run(
    ctx: &mut MirrorContext,
    scope: &SyncScope,
    fetcher: &dyn Fetcher,
    revision: Option<String>,
) -> Result<SyncReport, SyncError> {
    let index = ManifestIndex::build(&ctx.manifests_dir(), ctx.config.manifest_layout)?;
    if !index.errors().is_empty() {
        tracing::warn!(
            "{} manifest director{} could not be indexed",
            index.errors().len(),
            if index.errors().len() == 1 { "y" } else { "ies" }
        );
    }
    run_with_index(ctx, &index, scope, fetcher, revision)
}

/// Same as [`run`] against an index the caller already built.
pub fn run_with_index(
    ctx: &mut MirrorContext,
    index: &ManifestIndex,
    scope: &SyncScope,
    fetcher: &dyn Fetcher,
    revision: Option<String>,
) -> Result<SyncReport, SyncError> {
    let mut engine = SyncEngine::new(ctx, index, fetcher)?.with_revision(revision);
    match scope {
        SyncScope::Filter(filter) => engine.sync_filtered(filter),
        SyncScope::Synced => engine.refresh_synced(),
    }
}
