//! Physical pipe segments of the plant.
//!
//! Each segment is one exclusive route token. The enum declaration order is
//! the plant topology order (source, filter, transfer, destination,
//! downstream filter, valve node) and is the one global order in which a
//! recipe spanning several segments must acquire them.

use serde::{Deserialize, Serialize};

use crate::vessel::{LineSlot, VesselKind};

/// A named pipe segment between two units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RouteSegment {
    DissolverToParticleFilter,
    ParticleFilterToTransfer,
    TransferToFiller1,
    TransferToFiller2,
    Filler1ToSterileFilter1,
    Filler2ToSterileFilter2,
    SterileFilter1ToValveNode,
    SterileFilter2ToValveNode,
}

impl RouteSegment {
    /// Every segment, in acquisition order.
    pub const ALL: [RouteSegment; 8] = [
        RouteSegment::DissolverToParticleFilter,
        RouteSegment::ParticleFilterToTransfer,
        RouteSegment::TransferToFiller1,
        RouteSegment::TransferToFiller2,
        RouteSegment::Filler1ToSterileFilter1,
        RouteSegment::Filler2ToSterileFilter2,
        RouteSegment::SterileFilter1ToValveNode,
        RouteSegment::SterileFilter2ToValveNode,
    ];

    /// Short plant tag, used as the observer subject.
    pub fn name(self) -> &'static str {
        match self {
            RouteSegment::DissolverToParticleFilter => "LB-P",
            RouteSegment::ParticleFilterToTransfer => "P-T",
            RouteSegment::TransferToFiller1 => "T-AB1",
            RouteSegment::TransferToFiller2 => "T-AB2",
            RouteSegment::Filler1ToSterileFilter1 => "AB1-K1",
            RouteSegment::Filler2ToSterileFilter2 => "AB2-K2",
            RouteSegment::SterileFilter1ToValveNode => "K1-VK",
            RouteSegment::SterileFilter2ToValveNode => "K2-VK",
        }
    }

    fn transfer_to_filler(slot: LineSlot) -> Self {
        match slot {
            LineSlot::One => RouteSegment::TransferToFiller1,
            LineSlot::Two => RouteSegment::TransferToFiller2,
        }
    }

    fn filler_to_sterile(slot: LineSlot) -> Self {
        match slot {
            LineSlot::One => RouteSegment::Filler1ToSterileFilter1,
            LineSlot::Two => RouteSegment::Filler2ToSterileFilter2,
        }
    }

    fn sterile_to_node(slot: LineSlot) -> Self {
        match slot {
            LineSlot::One => RouteSegment::SterileFilter1ToValveNode,
            LineSlot::Two => RouteSegment::SterileFilter2ToValveNode,
        }
    }
}

/// Sort and deduplicate segments into acquisition order.
pub fn acquisition_order(mut segments: Vec<RouteSegment>) -> Vec<RouteSegment> {
    segments.sort();
    segments.dedup();
    segments
}

/// Segments a unit's own CIP circulates through.
pub fn cleaning_route(kind: VesselKind, slot: LineSlot) -> Vec<RouteSegment> {
    let segments = match kind {
        VesselKind::Dissolver => Vec::new(),
        // Trans-in rinse runs back through the transfer line.
        VesselKind::Filler => vec![RouteSegment::transfer_to_filler(slot)],
        VesselKind::ParticleFilter => vec![
            RouteSegment::DissolverToParticleFilter,
            RouteSegment::ParticleFilterToTransfer,
        ],
        VesselKind::TransferLine => vec![
            RouteSegment::ParticleFilterToTransfer,
            RouteSegment::TransferToFiller1,
            RouteSegment::TransferToFiller2,
        ],
        VesselKind::SterileFilter => vec![
            RouteSegment::filler_to_sterile(slot),
            RouteSegment::sterile_to_node(slot),
        ],
        VesselKind::ValveNode => vec![
            RouteSegment::SterileFilter1ToValveNode,
            RouteSegment::SterileFilter2ToValveNode,
        ],
    };
    acquisition_order(segments)
}

/// Segments a product transfer from the dissolver into the filler on `slot`
/// occupies.
pub fn product_route(slot: LineSlot) -> Vec<RouteSegment> {
    acquisition_order(vec![
        RouteSegment::transfer_to_filler(slot),
        RouteSegment::ParticleFilterToTransfer,
        RouteSegment::DissolverToParticleFilter,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_is_in_topology_order() {
        let mut sorted = RouteSegment::ALL.to_vec();
        sorted.sort();
        assert_eq!(sorted, RouteSegment::ALL.to_vec());
    }

    #[test]
    fn acquisition_order_sorts_and_dedups() {
        let order = acquisition_order(vec![
            RouteSegment::SterileFilter1ToValveNode,
            RouteSegment::DissolverToParticleFilter,
            RouteSegment::SterileFilter1ToValveNode,
            RouteSegment::TransferToFiller1,
        ]);
        assert_eq!(
            order,
            vec![
                RouteSegment::DissolverToParticleFilter,
                RouteSegment::TransferToFiller1,
                RouteSegment::SterileFilter1ToValveNode,
            ]
        );
    }

    #[test]
    fn product_route_runs_source_to_destination() {
        assert_eq!(
            product_route(LineSlot::Two),
            vec![
                RouteSegment::DissolverToParticleFilter,
                RouteSegment::ParticleFilterToTransfer,
                RouteSegment::TransferToFiller2,
            ]
        );
    }

    #[test]
    fn cleaning_routes_follow_slot() {
        assert_eq!(
            cleaning_route(VesselKind::SterileFilter, LineSlot::Two),
            vec![
                RouteSegment::Filler2ToSterileFilter2,
                RouteSegment::SterileFilter2ToValveNode,
            ]
        );
        assert!(cleaning_route(VesselKind::Dissolver, LineSlot::One).is_empty());
        assert_eq!(cleaning_route(VesselKind::ValveNode, LineSlot::Two).len(), 2);
    }

    #[test]
    fn segment_names_are_unique() {
        let mut names: Vec<_> = RouteSegment::ALL.iter().map(|s| s.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), RouteSegment::ALL.len());
    }
}
