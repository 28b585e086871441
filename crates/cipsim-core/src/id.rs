use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

use crate::route::RouteSegment;

new_key_type! {
    /// Identifies a vessel (or other hygienic unit) in the plant.
    pub struct VesselId;
}

/// Identifies a launched recipe process. Assigned sequentially, so ordering
/// by `ProcessId` is registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProcessId(pub u64);

/// An exclusive FIFO lock: either a vessel's own lock or a route token.
///
/// The derived ordering puts every vessel lock before every route token and
/// routes in plant topology order; recipes that take several locks take them
/// in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LockId {
    Vessel(VesselId),
    Route(RouteSegment),
}

impl From<RouteSegment> for LockId {
    fn from(segment: RouteSegment) -> Self {
        LockId::Route(segment)
    }
}

impl From<VesselId> for LockId {
    fn from(vessel: VesselId) -> Self {
        LockId::Vessel(vessel)
    }
}
