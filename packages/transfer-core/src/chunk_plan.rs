//! Deterministic, pure chunk planning.
//!
//! A [`ChunkPlan`] divides a file of a known size into main chunks, each
//! subdivided into sub-chunks. Sub-chunks are numbered by a single
//! "flat index" that runs across the whole file, independent of which
//! main chunk they belong to — this is the unit the wire protocol and
//! the send/receive pipelines operate on.

use serde::{Deserialize, Serialize};

/// One sub-chunk: the unit of transmission, digesting, and acking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubChunk {
    /// Index unique across the whole file.
    pub flat_index: u32,
    pub main_index: u32,
    pub sub_index: u32,
    pub start: u64,
    pub end: u64,
}

impl SubChunk {
    pub fn len(&self) -> u32 {
        (self.end - self.start) as u32
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// One main chunk: a contiguous run of sub-chunks, used for
/// coarse-grained progress reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MainChunk {
    pub index: u32,
    pub start: u64,
    pub end: u64,
    pub sub_chunks: Vec<SubChunk>,
}

impl MainChunk {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }
}

/// A complete, deterministic chunking of a file of known size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    pub main_chunk_size: u64,
    pub sub_chunk_size: u32,
    pub total_size: u64,
    pub main_chunks: Vec<MainChunk>,
}

impl ChunkPlan {
    /// Build a plan for a file of `total_size` bytes, given the main
    /// and sub chunk sizes. Pure and total: a zero-size file yields a
    /// plan with no main chunks at all.
    pub fn new(total_size: u64, main_chunk_size: u64, sub_chunk_size: u32) -> Self {
        assert!(main_chunk_size > 0, "main_chunk_size must be positive");
        assert!(sub_chunk_size > 0, "sub_chunk_size must be positive");

        let mut main_chunks = Vec::new();
        let mut flat_index: u32 = 0;
        let mut main_index: u32 = 0;
        let mut offset = 0u64;

        while offset < total_size {
            let main_end = (offset + main_chunk_size).min(total_size);
            let mut sub_chunks = Vec::new();
            let mut sub_offset = offset;
            let mut sub_index: u32 = 0;

            while sub_offset < main_end {
                let sub_end = (sub_offset + sub_chunk_size as u64).min(main_end);
                sub_chunks.push(SubChunk {
                    flat_index,
                    main_index,
                    sub_index,
                    start: sub_offset,
                    end: sub_end,
                });
                flat_index += 1;
                sub_index += 1;
                sub_offset = sub_end;
            }

            main_chunks.push(MainChunk {
                index: main_index,
                start: offset,
                end: main_end,
                sub_chunks,
            });

            main_index += 1;
            offset = main_end;
        }

        Self {
            main_chunk_size,
            sub_chunk_size,
            total_size,
            main_chunks,
        }
    }

    /// Recompute a plan on the receiving side and check it agrees with
    /// the sub-chunk count the sender announced in `file-start`.
    pub fn derive_for_receiver(
        total_size: u64,
        announced_sub_count: u32,
        main_chunk_size: u64,
        sub_chunk_size: u32,
    ) -> crate::error::Result<Self> {
        let plan = Self::new(total_size, main_chunk_size, sub_chunk_size);
        let derived = plan.total_sub_chunks();
        if derived != announced_sub_count {
            return Err(crate::error::Error::PlanMismatch {
                announced: announced_sub_count,
                derived,
            });
        }
        Ok(plan)
    }

    pub fn total_main_chunks(&self) -> u32 {
        self.main_chunks.len() as u32
    }

    pub fn total_sub_chunks(&self) -> u32 {
        self.main_chunks
            .iter()
            .map(|m| m.sub_chunks.len() as u32)
            .sum()
    }

    /// Iterate all sub-chunks across all main chunks, in flat order.
    pub fn sub_chunks(&self) -> impl Iterator<Item = &SubChunk> {
        self.main_chunks.iter().flat_map(|m| m.sub_chunks.iter())
    }

    pub fn sub_chunk(&self, flat_index: u32) -> Option<&SubChunk> {
        self.sub_chunks().find(|s| s.flat_index == flat_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_size_file_has_no_chunks() {
        let plan = ChunkPlan::new(0, 1024, 256);
        assert_eq!(plan.total_main_chunks(), 0);
        assert_eq!(plan.total_sub_chunks(), 0);
    }

    #[test]
    fn exact_multiple_sizes_divide_evenly() {
        let plan = ChunkPlan::new(2048, 1024, 256);
        assert_eq!(plan.total_main_chunks(), 2);
        assert_eq!(plan.total_sub_chunks(), 8);
        for m in &plan.main_chunks {
            assert_eq!(m.sub_chunks.len(), 4);
        }
    }

    #[test]
    fn trailing_partial_chunks_are_shorter() {
        let plan = ChunkPlan::new(300, 256, 100);
        assert_eq!(plan.total_main_chunks(), 2);
        assert_eq!(plan.main_chunks[0].len(), 256);
        assert_eq!(plan.main_chunks[1].len(), 44);
        let last_sub = plan.main_chunks[1].sub_chunks.last().unwrap();
        assert_eq!(last_sub.len(), 44);
    }

    #[test]
    fn flat_indexes_are_contiguous_and_strictly_increasing() {
        let plan = ChunkPlan::new(10_000, 1024, 300);
        let indexes: Vec<u32> = plan.sub_chunks().map(|s| s.flat_index).collect();
        for (i, idx) in indexes.iter().enumerate() {
            assert_eq!(*idx, i as u32);
        }
    }

    #[test]
    fn sub_chunks_cover_the_file_without_gaps_or_overlap() {
        let plan = ChunkPlan::new(123_456, 50_000, 7_000);
        let mut expected_start = 0u64;
        for s in plan.sub_chunks() {
            assert_eq!(s.start, expected_start);
            assert!(s.end > s.start);
            expected_start = s.end;
        }
        assert_eq!(expected_start, 123_456);
    }

    #[test]
    fn main_chunk_bounds_match_first_and_last_sub_chunk() {
        let plan = ChunkPlan::new(50_000, 12_000, 2_000);
        for m in &plan.main_chunks {
            assert_eq!(m.start, m.sub_chunks.first().unwrap().start);
            assert_eq!(m.end, m.sub_chunks.last().unwrap().end);
        }
    }

    #[test]
    fn receiver_derivation_detects_mismatch() {
        let err = ChunkPlan::derive_for_receiver(10_000, 999, 1024, 300).unwrap_err();
        assert!(matches!(err, crate::error::Error::PlanMismatch { .. }));
    }

    #[test]
    fn receiver_derivation_agrees_with_sender() {
        let sender_plan = ChunkPlan::new(10_000, 1024, 300);
        let announced = sender_plan.total_sub_chunks();
        let receiver_plan =
            ChunkPlan::derive_for_receiver(10_000, announced, 1024, 300).unwrap();
        assert_eq!(sender_plan, receiver_plan);
    }

    #[test]
    fn main_chunk_count_matches_ceil_division() {
        let plan = ChunkPlan::new(10_000, 3_000, 700);
        assert_eq!(plan.total_main_chunks(), 4); // ceil(10000/3000)
        // Sub-chunk counting resets at each main-chunk boundary, so the
        // total isn't simply ceil(total/sub_size) when boundaries don't
        // align: three full 3000-byte mains each split into 5 sub-chunks
        // (4 x 700 + 1 x 200), plus a trailing 1000-byte main split into 2
        // (700 + 300).
        assert_eq!(plan.total_sub_chunks(), 17);
    }
}
