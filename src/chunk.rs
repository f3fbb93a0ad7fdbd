use crate::geometry::BBox;
use crate::labels::TokenLabel;
use crate::tokenize::AlignedTokens;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkWindow {
    pub start: usize,
    pub end: usize,
}

// Windows advance by exactly `stride`; the final window is allowed to be
// shorter than `max_len` and ends exactly at the sequence length.
pub fn sliding_windows(total_tokens: usize, max_len: usize, stride: usize) -> Vec<ChunkWindow> {
    let mut windows = Vec::new();
    if total_tokens == 0 || max_len == 0 {
        return windows;
    }

    let mut start = 0usize;
    while start < total_tokens {
        let end = (start + max_len).min(total_tokens);
        windows.push(ChunkWindow { start, end });

        if end == total_tokens {
            break;
        }

        let mut next_start = start + stride;
        if next_start <= start {
            next_start = end;
        }
        start = next_start;
    }

    windows
}

// Each chunk keeps its absolute window so callers can map token positions
// back to the full sequence.
#[derive(Debug, Clone)]
pub struct TokenChunk {
    pub window: ChunkWindow,
    pub input_ids: Vec<u32>,
    pub attention_mask: Vec<u32>,
    pub labels: Vec<TokenLabel>,
    pub bboxes: Vec<BBox>,
}

pub fn split_into_chunks(aligned: &AlignedTokens, max_len: usize, stride: usize) -> Vec<TokenChunk> {
    sliding_windows(aligned.input_ids.len(), max_len, stride)
        .into_iter()
        .map(|window| TokenChunk {
            window,
            input_ids: aligned.input_ids[window.start..window.end].to_vec(),
            attention_mask: aligned.attention_mask[window.start..window.end].to_vec(),
            labels: aligned.labels[window.start..window.end].to_vec(),
            bboxes: aligned.bboxes[window.start..window.end].to_vec(),
        })
        .collect()
}
