//! Distribution of extra free space among planned volumes
//!
//! Each volume starts at its minimum valid size. The space left over is
//! handed out in rounds, proportionally to the volumes' weights. A volume
//! never grows past its max size; whatever it cannot take stays in the pool
//! for the next round, shared among the volumes that still have room.

use crate::disk::size::DiskSize;
use crate::proposal::planned_volume::Allocation;
use tracing::info;

/// Grow the allocations using up to `extra` bytes of additional space.
///
/// Returns the space that could not be distributed (zero in the common
/// case). Whether leftover space is acceptable is up to the caller.
pub fn distribute_extra_space(allocations: &mut [Allocation], extra: DiskSize) -> DiskSize {
    let mut extra = extra;

    while !extra.is_zero() {
        let candidates = extra_space_candidates(allocations);
        if candidates.is_empty() {
            break;
        }
        let total_weight: f64 = candidates
            .iter()
            .map(|&i| weight_of(&allocations[i]))
            .sum();
        if total_weight <= 0.0 {
            break;
        }

        info!(
            "Distributing {} extra space among {} volumes",
            extra,
            candidates.len()
        );

        // Flooring each share loses a few bytes per round; the last weighted
        // candidate gets the remainder so the shares add up to `extra`.
        let last_weighted = candidates
            .iter()
            .rposition(|&i| weight_of(&allocations[i]) > 0.0);

        let mut shared = DiskSize::ZERO;
        let mut assigned = DiskSize::ZERO;
        for (pos, &i) in candidates.iter().enumerate() {
            let alloc = &mut allocations[i];
            let share = if Some(pos) == last_weighted {
                extra - shared
            } else {
                extra.mul_f64(weight_of(alloc) / total_weight)
            };
            shared += share;

            let vol_extra = volume_extra_size(alloc, share);
            if vol_extra.is_zero() {
                continue;
            }
            alloc.size += vol_extra;
            assigned += vol_extra;
            info!(
                "Distributing {} to {}; now {}",
                vol_extra,
                alloc.volume.mount_label(),
                alloc.size
            );
        }

        if assigned.is_zero() {
            break;
        }
        extra -= assigned;
    }

    if !extra.is_zero() {
        info!("Could not distribute {}", extra);
    }
    extra
}

/// Indices of the allocations that may grow: not reused and below max
fn extra_space_candidates(allocations: &[Allocation]) -> Vec<usize> {
    allocations
        .iter()
        .enumerate()
        .filter(|(_, a)| a.can_grow())
        .map(|(i, _)| i)
        .collect()
}

/// Part of `share` the volume can actually take without exceeding its max
fn volume_extra_size(alloc: &Allocation, share: DiskSize) -> DiskSize {
    let room = alloc.volume.max_size - alloc.size;
    share.min(room)
}

fn weight_of(alloc: &Allocation) -> f64 {
    if alloc.volume.weight.is_nan() {
        0.0
    } else {
        alloc.volume.weight.max(0.0)
    }
}
