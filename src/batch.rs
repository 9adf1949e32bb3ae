//! Split origin groups into size-bounded request chunks.

use crate::coordinate::Coord;
use crate::grouping::{Origin, OriginGroup};
use crate::table::RowId;

/// One matrix request worth of destinations sharing an origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Chunk<'a> {
    pub origin: &'a Origin,
    /// Position of this chunk within its origin.
    pub index: usize,
    pub row_ids: &'a [RowId],
    pub destinations: &'a [Coord],
}

impl Chunk<'_> {
    pub fn len(&self) -> usize {
        self.row_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_ids.is_empty()
    }
}

/// Number of chunks one origin needs: `ceil(len / chunk_size)`.
pub fn chunk_count(len: usize, chunk_size: usize) -> usize {
    len.div_ceil(chunk_size.max(1))
}

/// Total chunks across all origins, known before any request is sent.
pub fn total_steps(groups: &[OriginGroup], chunk_size: usize) -> usize {
    groups
        .iter()
        .map(|group| chunk_count(group.len(), chunk_size))
        .sum()
}

/// The chunks of every origin, origin by origin, in row order.
#[derive(Debug, Clone, Copy)]
pub struct BatchPlan<'a> {
    groups: &'a [OriginGroup],
    chunk_size: usize,
}

impl<'a> BatchPlan<'a> {
    pub fn new(groups: &'a [OriginGroup], chunk_size: usize) -> Self {
        Self {
            groups,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn total_steps(&self) -> usize {
        total_steps(self.groups, self.chunk_size)
    }

    /// Chunks of a single origin group.
    pub fn chunks_for(&self, group: &'a OriginGroup) -> impl Iterator<Item = Chunk<'a>> + use<'a> {
        chunk_group(group, self.chunk_size)
    }

    /// Every chunk of the plan, in processing order.
    pub fn chunks(&self) -> impl Iterator<Item = Chunk<'a>> + use<'a> {
        let chunk_size = self.chunk_size;
        self.groups
            .iter()
            .flat_map(move |group| chunk_group(group, chunk_size))
    }
}

fn chunk_group(group: &OriginGroup, chunk_size: usize) -> impl Iterator<Item = Chunk<'_>> {
    group
        .row_ids
        .chunks(chunk_size)
        .zip(group.destinations.chunks(chunk_size))
        .enumerate()
        .map(move |(index, (row_ids, destinations))| Chunk {
            origin: &group.origin,
            index,
            row_ids,
            destinations,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(name: &str, len: usize) -> OriginGroup {
        OriginGroup {
            origin: Origin {
                name: name.to_string(),
                coord: Coord::new(9.70, 48.48),
            },
            row_ids: (0..len).map(RowId).collect(),
            destinations: (0..len).map(|i| Coord::new(i as f64, i as f64)).collect(),
        }
    }

    #[test]
    fn test_chunk_count_rounds_up() {
        assert_eq!(chunk_count(0, 50), 0);
        assert_eq!(chunk_count(1, 50), 1);
        assert_eq!(chunk_count(50, 50), 1);
        assert_eq!(chunk_count(51, 50), 2);
        assert_eq!(chunk_count(3, 2), 2);
    }

    #[test]
    fn test_total_steps_matches_emitted_chunks() {
        let groups = vec![group("A", 7), group("B", 3), group("C", 0), group("D", 6)];
        let plan = BatchPlan::new(&groups, 3);

        assert_eq!(plan.total_steps(), 3 + 1 + 0 + 2);
        assert_eq!(plan.chunks().count(), plan.total_steps());
    }

    #[test]
    fn test_chunks_partition_each_origin_in_order() {
        let groups = vec![group("A", 7), group("B", 5)];
        let plan = BatchPlan::new(&groups, 3);

        for group in &groups {
            let chunks: Vec<Chunk> = plan.chunks_for(group).collect();
            assert!(chunks.iter().all(|chunk| chunk.len() <= 3 && !chunk.is_empty()));
            assert!(chunks.iter().all(|chunk| chunk.origin == &group.origin));

            let rows: Vec<RowId> = chunks.iter().flat_map(|c| c.row_ids.iter().copied()).collect();
            let dests: Vec<Coord> = chunks.iter().flat_map(|c| c.destinations.iter().copied()).collect();
            assert_eq!(rows, group.row_ids);
            assert_eq!(dests, group.destinations);

            let indices: Vec<usize> = chunks.iter().map(|c| c.index).collect();
            assert_eq!(indices, (0..chunks.len()).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_replanning_is_deterministic() {
        let groups = vec![group("A", 11), group("B", 4)];
        let boundaries = |plan: &BatchPlan| -> Vec<(String, Vec<RowId>)> {
            plan.chunks()
                .map(|chunk| (chunk.origin.name.clone(), chunk.row_ids.to_vec()))
                .collect()
        };

        let first = boundaries(&BatchPlan::new(&groups, 4));
        let second = boundaries(&BatchPlan::new(&groups, 4));
        assert_eq!(first, second);
    }

    #[test]
    fn test_three_destinations_chunk_size_two() {
        let groups = vec![group("Ulm", 3)];
        let plan = BatchPlan::new(&groups, 2);
        let sizes: Vec<usize> = plan.chunks().map(|chunk| chunk.len()).collect();
        assert_eq!(sizes, vec![2, 1]);
    }

    #[test]
    fn test_zero_chunk_size_is_clamped() {
        let groups = vec![group("A", 2)];
        let plan = BatchPlan::new(&groups, 0);
        assert_eq!(plan.chunk_size(), 1);
        assert_eq!(plan.chunks().count(), 2);
    }
}
