use anyhow::{Context, Result};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

const CHUNK_SIZE: usize = 4096;

/// Last non-empty line of a file, read backwards from EOF in fixed-size
/// chunks. Trailing newlines are ignored. `None` for an empty file.
pub fn read_last_line(path: &Path) -> Result<Option<String>> {
    let mut file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut end = file.metadata()?.len();

    let mut line: Vec<u8> = Vec::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut skipping_newlines = true;

    while end > 0 {
        let start = end.saturating_sub(CHUNK_SIZE as u64);
        let size = (end - start) as usize;
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(&mut buf[..size])
            .with_context(|| format!("Failed to read {}", path.display()))?;
        end = start;

        let mut chunk = &buf[..size];
        if skipping_newlines {
            let content_len = chunk
                .iter()
                .rposition(|b| !matches!(b, b'\n' | b'\r'))
                .map_or(0, |i| i + 1);
            chunk = &chunk[..content_len];
            if chunk.is_empty() {
                continue;
            }
            skipping_newlines = false;
        }

        match chunk.iter().rposition(|b| *b == b'\n') {
            Some(newline) => {
                prepend(&mut line, &chunk[newline + 1..]);
                break;
            }
            None => prepend(&mut line, chunk),
        }
    }

    if line.is_empty() {
        return Ok(None);
    }
    let text = String::from_utf8_lossy(&line);
    Ok(Some(text.trim_end_matches('\r').to_string()))
}

fn prepend(line: &mut Vec<u8>, bytes: &[u8]) {
    line.splice(0..0, bytes.iter().copied());
}
