use std::sync::OnceLock;

use ahash::AHashMap;
use parking_lot::Mutex;

use crate::FeedGraphError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    /// After the edge row is written, before the follow transaction commits.
    FollowBeforeCommit,
    /// Before each per-follower feed append during fan-out.
    FeedAppend,
    /// After fan-out finished, before the publish transaction commits.
    PublishBeforeCommit,
}

/// How an armed fault point behaves.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FaultSpec {
    /// Hits that pass before the first failure.
    pub skip: usize,
    /// Number of failures to inject once `skip` is used up.
    pub failures: usize,
    /// Surface as [`FeedGraphError::Transient`] instead of `Fatal`.
    pub transient: bool,
}

fn registry() -> &'static Mutex<AHashMap<FaultPoint, FaultSpec>> {
    static REGISTRY: OnceLock<Mutex<AHashMap<FaultPoint, FaultSpec>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(AHashMap::new()))
}

pub fn reset_faults() {
    registry().lock().clear();
}

/// Fails the next `failures` hits of `point` with a fatal store error.
pub fn configure_fault(point: FaultPoint, failures: usize) {
    configure_fault_with(
        point,
        FaultSpec {
            failures,
            ..FaultSpec::default()
        },
    );
}

/// Lets `skip` hits of `point` through, then fails the next `failures`.
pub fn configure_fault_after(point: FaultPoint, skip: usize, failures: usize) {
    configure_fault_with(
        point,
        FaultSpec {
            skip,
            failures,
            transient: false,
        },
    );
}

pub fn configure_fault_with(point: FaultPoint, spec: FaultSpec) {
    let mut guard = registry().lock();
    if spec.failures == 0 {
        guard.remove(&point);
    } else {
        guard.insert(point, spec);
    }
}

pub(crate) fn check_fault(point: FaultPoint) -> Result<(), FeedGraphError> {
    let mut guard = registry().lock();
    let Some(entry) = guard.get_mut(&point) else {
        return Ok(());
    };
    if entry.skip > 0 {
        entry.skip -= 1;
        return Ok(());
    }
    let transient = entry.transient;
    entry.failures -= 1;
    if entry.failures == 0 {
        guard.remove(&point);
    }
    let msg = format!("fault injected at {point:?}");
    if transient {
        Err(FeedGraphError::transient(msg))
    } else {
        Err(FeedGraphError::fatal(msg))
    }
}
