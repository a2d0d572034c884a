//! Compute-or-fetch entry point for the prep phase.

use prep_common::Matrix4;

use crate::cache::CacheHandle;
use crate::codec::PrepCompute;
use crate::name::{ObjectName, RawObject};

/// A solid awaiting prep: its placement and the prep data once known.
#[derive(Debug, Clone, PartialEq)]
pub struct Solid<P> {
    /// Placement of the solid; identity if `None`.
    pub matrix: Option<Matrix4>,
    /// Prep data, filled in by [`ensure_prepared`].
    pub prep: Option<P>,
}

impl<P> Solid<P> {
    /// A solid with no prep data yet.
    pub fn new(matrix: Option<Matrix4>) -> Self {
        Self { matrix, prep: None }
    }
}

/// Ensures `solid` carries prep data, fetching it from `cache` when possible.
///
/// Without a cache, or when no name can be derived for `raw`, this is exactly
/// `backend.compute`. Otherwise a cache hit is used directly and a miss is
/// computed and then stored. Storing is best effort: its failure is logged
/// and never changes the result. Returns `false` only if prep data could not
/// be computed.
pub fn ensure_prepared<B: PrepCompute>(
    cache: Option<&CacheHandle>,
    backend: &B,
    solid: &mut Solid<B::Prep>,
    raw: &RawObject<'_>,
) -> bool {
    let cached = cache.and_then(|c| {
        ObjectName::generate(solid.matrix.as_ref(), raw).map(|name| (c, name))
    });
    let Some((cache, name)) = cached else {
        return compute_into(backend, solid, raw);
    };

    if let Some(prep) = cache.load(&name, backend) {
        solid.prep = Some(prep);
        return true;
    }

    let Some(prep) = backend.compute(solid.matrix.as_ref(), raw) else {
        return false;
    };
    if !cache.is_read_only() {
        if let Err(e) = cache.store(&name, raw, &prep, backend) {
            cache.hooks.warn(format_args!(
                "prep for {} not cached ({}): {e}",
                raw.name,
                e.kind()
            ));
        }
    }
    solid.prep = Some(prep);
    true
}

fn compute_into<B: PrepCompute>(
    backend: &B,
    solid: &mut Solid<B::Prep>,
    raw: &RawObject<'_>,
) -> bool {
    match backend.compute(solid.matrix.as_ref(), raw) {
        Some(prep) => {
            solid.prep = Some(prep);
            true
        }
        None => false,
    }
}
