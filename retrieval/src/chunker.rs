//! Overlapping character windows over extracted text.

/// Splits text into windows of at most `size` characters, each starting
/// `size - overlap` characters after the previous one. Window ends are pulled
/// back to the last whitespace in the window's final fifth when there is one,
/// so words are not cut in half.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    size: usize,
    overlap: usize
}

impl Chunker {
    /// `overlap` is clamped below `size`.
    pub fn new(size: usize, overlap: usize) -> Self {
        let size = size.max(1);
        Self {
            size,
            overlap: overlap.min(size - 1)
        }
    }

    pub fn from_config(config: &config::IngestionConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Whitespace-only input yields no chunks.
    pub fn split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        if chars.iter().all(|c| c.is_whitespace()) {
            return Vec::new();
        }

        let mut chunks = Vec::new();
        let mut start = 0;
        while start < chars.len() {
            let hard_end = (start + self.size).min(chars.len());
            let end = if hard_end == chars.len() {
                hard_end
            } else {
                self.soft_end(&chars, start, hard_end)
            };

            let chunk: String = chars[start..end].iter().collect();
            let trimmed = chunk.trim();
            if !trimmed.is_empty() {
                chunks.push(trimmed.to_string());
            }
            if end == chars.len() {
                break;
            }

            let step = (end - start).saturating_sub(self.overlap).max(1);
            start += step;
        }
        chunks
    }

    fn soft_end(&self, chars: &[char], start: usize, hard_end: usize) -> usize {
        let floor = hard_end - (hard_end - start) / 5;
        (floor..hard_end)
            .rev()
            .find(|&i| chars[i].is_whitespace())
            .map(|i| i + 1)
            .unwrap_or(hard_end)
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(1000, 200)
    }
}
