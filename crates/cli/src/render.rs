use docsplit_chunker::{ChunkedDocument, DocumentChunk};

const PREVIEW_CHARS: usize = 72;

/// Human-readable listing, one line per chunk
pub fn summary(chunked: &ChunkedDocument) -> String {
    let mut out = format!(
        "{}: {} chunks ({})\n",
        chunked.document_id,
        chunked.chunks.len(),
        chunked.strategy
    );
    for chunk in &chunked.chunks {
        out.push_str(&chunk_line(chunk));
        out.push('\n');
    }
    out
}

fn chunk_line(chunk: &DocumentChunk) -> String {
    let overlap = if chunk.overlap_len > 0 {
        format!(", overlap {}B", chunk.overlap_len)
    } else {
        String::new()
    };
    format!(
        "#{:<4} {:>7}..{:<7} {:>5} tokens{}  {}",
        chunk.chunk_index,
        chunk.start_offset,
        chunk.end_offset,
        chunk.token_count(),
        overlap,
        preview(chunk.own_content(), PREVIEW_CHARS)
    )
}

/// Single-line preview with whitespace runs collapsed
pub fn preview(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }
    let mut cut: String = collapsed.chars().take(max_chars.saturating_sub(1)).collect();
    cut.push('…');
    cut
}
