//! Parent-chain traversal over a remote's layer graph.

use crate::{ImageId, ImageMetadata, Remote, RemoteError};
use std::collections::HashSet;
use tracing::debug;

/// What a walk visitor wants to happen next.
#[derive(Debug)]
pub enum Visit<E> {
    /// Move on to the parent of the current node.
    Continue,
    /// Stop here. The walk ends successfully.
    Break,
    /// Stop here and fail the walk with this error.
    Fail(E),
}

/// Walk from `from` up the parent chain, calling `visit` once per node.
///
/// The visitor receives the node's metadata, or the error the remote produced
/// while describing it, and decides whether that is fatal. Returns `Ok(())`
/// when the root is reached, when the visitor breaks, or when metadata for a
/// node could not be read and the visitor chose to continue anyway (there is
/// no parent to move to). A parent pointer back to an already visited id is
/// handed to the visitor as [`RemoteError::ParentCycle`]; an id that is not a
/// single path segment is handed over as [`RemoteError::Serialization`]
/// without asking the remote about it.
pub fn walk_images<R, E, F>(remote: &R, from: &ImageId, mut visit: F) -> Result<(), E>
where
    R: Remote + ?Sized,
    F: FnMut(&ImageId, Result<ImageMetadata, RemoteError>) -> Visit<E>,
{
    let mut seen = HashSet::new();
    let mut cursor = from.clone();

    loop {
        let meta = if !cursor.is_valid_component() {
            Err(RemoteError::Serialization(format!(
                "invalid image id '{cursor}' in parent chain"
            )))
        } else if seen.insert(cursor.clone()) {
            remote.image_metadata(&cursor)
        } else {
            Err(RemoteError::ParentCycle(cursor.to_string()))
        };
        let parent = meta.as_ref().ok().and_then(|m| m.parent.clone());

        debug!("walk: visiting {}", cursor.short());
        match visit(&cursor, meta) {
            Visit::Continue => {}
            Visit::Break => {
                debug!("walk: stopped at {}", cursor.short());
                return Ok(());
            }
            Visit::Fail(e) => return Err(e),
        }

        match parent {
            Some(next) => cursor = next,
            None => return Ok(()),
        }
    }
}
