use crate::arrays::Array2D;
use crate::assign::UNASSIGNED;
use crate::common::ConnectRule;
use assume::assume;
use log::trace;
use multiversion::multiversion;
use rayon::current_num_threads;
use rayon::prelude::*;

const NO_COMPONENT: u32 = u32::MAX;

/// Connected components of a label grid.
///
/// Components are numbered in row-major order of their first pixel (the leader).
#[derive(Debug)]
pub struct ComponentSet {
    pub num_components: usize,
    /// Component number of every pixel.
    pub component_assignment: Vec<u32>,
    pub num_component_members: Vec<u32>,
    /// Index of the first pixel of every component.
    pub component_leaders: Vec<u32>,
}

#[inline(always)]
fn neighbor_index(
    x: usize,
    y: usize,
    (dx, dy): (isize, isize),
    width: usize,
    height: usize,
) -> Option<usize> {
    let nx = x.checked_add_signed(dx).filter(|nx| *nx < width)?;
    let ny = y.checked_add_signed(dy).filter(|ny| *ny < height)?;
    Some(ny * width + nx)
}

/// Flood-fills every component of equal labels.
#[multiversion(targets = "simd")]
pub fn label_components(labels: &Array2D<u32>, rule: ConnectRule) -> ComponentSet {
    let (width, height) = (labels.width, labels.height);
    let num_pixels = labels.data.len();
    let offsets = rule.offsets();
    let mut component_assignment = vec![NO_COMPONENT; num_pixels];
    let mut num_component_members = Vec::new();
    let mut component_leaders = Vec::new();
    let mut stack: Vec<usize> = Vec::new();

    for leader in 0..num_pixels {
        if component_assignment[leader] != NO_COMPONENT {
            continue;
        }
        let component_no = component_leaders.len() as u32;
        let label = labels.data[leader];
        let mut members = 0u32;
        component_assignment[leader] = component_no;
        stack.push(leader);
        while let Some(index) = stack.pop() {
            members += 1;
            let (x, y) = (index % width, index / width);
            for offset in offsets {
                let Some(neighbor) = neighbor_index(x, y, *offset, width, height) else {
                    continue;
                };
                assume!(unsafe: neighbor < component_assignment.len(), "neighbor: {neighbor} > {}", component_assignment.len());
                if component_assignment[neighbor] == NO_COMPONENT && labels.data[neighbor] == label {
                    component_assignment[neighbor] = component_no;
                    stack.push(neighbor);
                }
            }
        }
        component_leaders.push(leader as u32);
        num_component_members.push(members);
    }

    ComponentSet {
        num_components: component_leaders.len(),
        component_assignment,
        num_component_members,
        component_leaders,
    }
}

/// Re-floods `component_no` and returns the final label of the first neighboring pixel whose
/// component already has one.
#[allow(clippy::too_many_arguments)]
fn find_merge_target(
    cc_set: &ComponentSet,
    component_no: u32,
    substitute: &[u32],
    rule: ConnectRule,
    (width, height): (usize, usize),
    seen: &mut [u32],
    epoch: u32,
    stack: &mut Vec<usize>,
) -> Option<u32> {
    stack.clear();
    let leader = cc_set.component_leaders[component_no as usize] as usize;
    seen[leader] = epoch;
    stack.push(leader);
    while let Some(index) = stack.pop() {
        let (x, y) = (index % width, index / width);
        for offset in rule.offsets() {
            let Some(neighbor) = neighbor_index(x, y, *offset, width, height) else {
                continue;
            };
            let neighbor_component = cc_set.component_assignment[neighbor];
            if neighbor_component == component_no {
                if seen[neighbor] != epoch {
                    seen[neighbor] = epoch;
                    stack.push(neighbor);
                }
            } else if substitute[neighbor_component as usize] != UNASSIGNED {
                return Some(substitute[neighbor_component as usize]);
            }
        }
    }
    None
}

#[multiversion(targets = "simd")]
fn relabel(labels: &mut [u32], components: &[u32], substitute: &[u32]) {
    for (label, component) in labels.iter_mut().zip(components) {
        assume!(unsafe: (*component as usize) < substitute.len(), "component: {component} > {}", substitute.len());
        *label = substitute[*component as usize];
    }
}

/// This function implements the connectivity enforcement step.
///
/// For every label only its largest component survives (ties go to the earlier leader), and
/// only if it has at least `min_size` pixels. Survivors are renumbered `0..n` in leader order.
/// Every other component is merged into the first finalized neighbor met while flood-filling
/// it, visiting components in leader order. Returns the number of regions left.
pub fn enforce_connectivity(
    assignments: &mut Array2D<u32>,
    rule: ConnectRule,
    min_size: usize,
) -> usize {
    if assignments.data.is_empty() {
        return 0;
    }
    debug_assert!(assignments.data.iter().all(|l| *l != UNASSIGNED));
    let num_labels = assignments.data.iter().copied().max().unwrap_or(0) as usize + 1;
    let cc_set = label_components(assignments, rule);

    // largest component of every label
    let mut largest = vec![NO_COMPONENT; num_labels];
    for component_no in 0..cc_set.num_components {
        let leader = cc_set.component_leaders[component_no] as usize;
        let label = assignments.data[leader] as usize;
        let best = largest[label];
        if best == NO_COMPONENT
            || cc_set.num_component_members[component_no]
                > cc_set.num_component_members[best as usize]
        {
            largest[label] = component_no as u32;
        }
    }
    let mut comps: Vec<u32> = largest
        .into_iter()
        .filter(|c| *c != NO_COMPONENT)
        .filter(|c| cc_set.num_component_members[*c as usize] as usize >= min_size)
        .collect();
    comps.sort_unstable();

    let mut substitute = vec![UNASSIGNED; cc_set.num_components];
    let mut num_regions = 0u32;
    for component_no in comps {
        substitute[component_no as usize] = num_regions;
        num_regions += 1;
    }

    // Merge the rest
    let dims = (assignments.width, assignments.height);
    let mut pending: Vec<u32> = (0..cc_set.num_components as u32)
        .filter(|c| substitute[*c as usize] == UNASSIGNED)
        .collect();
    let num_orphans = pending.len();
    let mut seen = vec![0u32; assignments.data.len()];
    let mut epoch = 0u32;
    let mut stack = Vec::new();
    while !pending.is_empty() {
        let before = pending.len();
        let mut unresolved = Vec::new();
        for component_no in pending.drain(..) {
            epoch += 1;
            let target = find_merge_target(
                &cc_set,
                component_no,
                &substitute,
                rule,
                dims,
                &mut seen,
                epoch,
                &mut stack,
            );
            match target {
                Some(label) => substitute[component_no as usize] = label,
                None => unresolved.push(component_no),
            }
        }
        if unresolved.len() == before {
            // nothing left to merge into, promote the first orphan to a region
            let component_no = unresolved.remove(0);
            substitute[component_no as usize] = num_regions;
            num_regions += 1;
        }
        pending = unresolved;
    }
    trace!(
        "{} components, {num_orphans} merged or promoted, {num_regions} regions",
        cc_set.num_components
    );

    let chunk_size = assignments
        .data
        .len()
        .div_ceil(current_num_threads())
        .max(1);
    assignments
        .data
        .par_chunks_mut(chunk_size)
        .zip(cc_set.component_assignment.par_chunks(chunk_size))
        .for_each(|(labels, components)| relabel(labels, components, &substitute));
    num_regions as usize
}
