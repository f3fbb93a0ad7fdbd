use std::path::Path;

use anyhow::{Result, anyhow, bail};
use tokenizers::Tokenizer;

use crate::geometry::BBox;
use crate::labels::{BioLabel, TokenLabel};

pub const SPECIAL_TOKEN_WORD: &str = "[SPECIAL]";

#[derive(Debug, Clone)]
pub struct WordEncoding {
    pub input_ids: Vec<u32>,
    pub attention_mask: Vec<u32>,
    pub word_ids: Vec<Option<u32>>,
}

pub trait WordTokenizer: Send + Sync {
    fn encode_words(&self, words: &[String], boxes: &[BBox]) -> Result<WordEncoding>;
}

pub struct HfWordTokenizer {
    tokenizer: Tokenizer,
}

impl HfWordTokenizer {
    pub fn from_file(path: &Path) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(path)
            .map_err(|err| anyhow!("failed to load tokenizer from {}: {err}", path.display()))?;

        Ok(Self { tokenizer })
    }
}

impl WordTokenizer for HfWordTokenizer {
    fn encode_words(&self, words: &[String], boxes: &[BBox]) -> Result<WordEncoding> {
        if words.len() != boxes.len() {
            bail!(
                "tokenizer input mismatch: {} words, {} boxes",
                words.len(),
                boxes.len()
            );
        }

        let encoding = self
            .tokenizer
            .encode(words.to_vec(), true)
            .map_err(|err| anyhow!("tokenization failed: {err}"))?;

        Ok(WordEncoding {
            input_ids: encoding.get_ids().to_vec(),
            attention_mask: encoding.get_attention_mask().to_vec(),
            word_ids: encoding.get_word_ids().to_vec(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct AlignedTokens {
    pub input_ids: Vec<u32>,
    pub attention_mask: Vec<u32>,
    pub labels: Vec<TokenLabel>,
    pub bboxes: Vec<BBox>,
    pub words: Vec<String>,
}

pub fn align_word_labels(
    words: &[String],
    boxes: &[BBox],
    word_labels: &[BioLabel],
    encoding: &WordEncoding,
) -> Result<AlignedTokens> {
    if words.len() != boxes.len() || words.len() != word_labels.len() {
        bail!(
            "word-level arrays disagree: {} words, {} boxes, {} labels",
            words.len(),
            boxes.len(),
            word_labels.len()
        );
    }

    let token_count = encoding.input_ids.len();
    if encoding.attention_mask.len() != token_count || encoding.word_ids.len() != token_count {
        bail!(
            "tokenizer returned misaligned arrays: {} ids, {} attention flags, {} word ids",
            token_count,
            encoding.attention_mask.len(),
            encoding.word_ids.len()
        );
    }

    let mut labels = Vec::with_capacity(token_count);
    let mut bboxes = Vec::with_capacity(token_count);
    let mut token_words = Vec::with_capacity(token_count);

    for &word_id in &encoding.word_ids {
        match word_id {
            None => {
                labels.push(TokenLabel::Ignore);
                bboxes.push(BBox::ZERO);
                token_words.push(SPECIAL_TOKEN_WORD.to_string());
            }
            Some(index) => {
                let index = index as usize;
                let Some(&label) = word_labels.get(index) else {
                    bail!(
                        "tokenizer reported word index {index} outside {} words",
                        words.len()
                    );
                };

                labels.push(TokenLabel::Bio(label));
                bboxes.push(boxes[index]);
                token_words.push(words[index].clone());
            }
        }
    }

    Ok(AlignedTokens {
        input_ids: encoding.input_ids.clone(),
        attention_mask: encoding.attention_mask.clone(),
        labels,
        bboxes,
        words: token_words,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    fn encoding_for(word_ids: Vec<Option<u32>>) -> WordEncoding {
        let token_count = word_ids.len();
        WordEncoding {
            input_ids: (0..token_count as u32).collect(),
            attention_mask: vec![1; token_count],
            word_ids,
        }
    }

    #[test]
    fn tokens_inherit_their_source_word_label_and_box() {
        let words = words(&["1.", "Introduction"]);
        let boxes = vec![BBox::new(40, 50, 70, 80), BBox::new(80, 50, 260, 80)];
        let labels = vec![BioLabel::HeaderBegin, BioLabel::HeaderInside];
        // [CLS] "1" "." "Intro" "duction" [SEP]
        let encoding = encoding_for(vec![None, Some(0), Some(0), Some(1), Some(1), None]);

        let aligned = align_word_labels(&words, &boxes, &labels, &encoding).unwrap();

        assert_eq!(aligned.labels[1], TokenLabel::Bio(BioLabel::HeaderBegin));
        assert_eq!(aligned.labels[2], TokenLabel::Bio(BioLabel::HeaderBegin));
        assert_eq!(aligned.labels[3], TokenLabel::Bio(BioLabel::HeaderInside));
        assert_eq!(aligned.bboxes[1], boxes[0]);
        assert_eq!(aligned.bboxes[4], boxes[1]);
        assert_eq!(aligned.words[3], "Introduction");
    }

    #[test]
    fn special_tokens_get_ignore_label_zero_box_and_placeholder() {
        let words = words(&["Lorem"]);
        let boxes = vec![BBox::new(10, 10, 90, 40)];
        let labels = vec![BioLabel::Outside];
        let encoding = encoding_for(vec![None, Some(0), None]);

        let aligned = align_word_labels(&words, &boxes, &labels, &encoding).unwrap();

        assert_eq!(aligned.labels[0], TokenLabel::Ignore);
        assert_eq!(aligned.bboxes[0], BBox::ZERO);
        assert_eq!(aligned.words[0], SPECIAL_TOKEN_WORD);
        assert_eq!(aligned.labels[2], TokenLabel::Ignore);
        assert_eq!(aligned.words[2], SPECIAL_TOKEN_WORD);
    }

    #[test]
    fn aligned_arrays_share_one_length() {
        let words = words(&["a", "b", "c"]);
        let boxes = vec![BBox::ZERO; 3];
        let labels = vec![BioLabel::Outside; 3];
        let encoding = encoding_for(vec![None, Some(0), Some(1), Some(1), Some(2), None]);

        let aligned = align_word_labels(&words, &boxes, &labels, &encoding).unwrap();

        assert_eq!(aligned.input_ids.len(), 6);
        assert_eq!(aligned.attention_mask.len(), 6);
        assert_eq!(aligned.labels.len(), 6);
        assert_eq!(aligned.bboxes.len(), 6);
        assert_eq!(aligned.words.len(), 6);
    }

    #[test]
    fn out_of_range_word_index_is_a_fatal_alignment_error() {
        let words = words(&["only"]);
        let boxes = vec![BBox::ZERO];
        let labels = vec![BioLabel::Outside];
        let encoding = encoding_for(vec![None, Some(3), None]);

        let error = align_word_labels(&words, &boxes, &labels, &encoding).unwrap_err();
        assert!(error.to_string().contains("word index 3"));
    }

    #[test]
    fn misaligned_encoding_arrays_are_rejected() {
        let words = words(&["only"]);
        let boxes = vec![BBox::ZERO];
        let labels = vec![BioLabel::Outside];
        let encoding = WordEncoding {
            input_ids: vec![0, 1, 2],
            attention_mask: vec![1, 1],
            word_ids: vec![None, Some(0), None],
        };

        assert!(align_word_labels(&words, &boxes, &labels, &encoding).is_err());
    }

    #[test]
    fn word_level_array_disagreement_is_rejected() {
        let words = words(&["a", "b"]);
        let boxes = vec![BBox::ZERO];
        let labels = vec![BioLabel::Outside, BioLabel::Outside];
        let encoding = encoding_for(vec![Some(0)]);

        assert!(align_word_labels(&words, &boxes, &labels, &encoding).is_err());
    }
}
