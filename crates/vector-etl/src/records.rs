//! JSONL point source.
//!
//! Each non-blank line is one point: `{"id": 1, "vector": {"image": [..]}, "payload": {..}}`.
//! Lines that fail to parse are mapping failures; the upload skips them.

use std::path::Path;

use futures::stream::{self, Stream, StreamExt};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

use vector_manager::MappingError;
use vector_types::Point;

/// One line of the input file with its 1-based line number.
#[derive(Debug)]
pub struct Line {
    pub number: usize,
    pub text: std::io::Result<String>,
}

/// Stream the non-blank lines of a JSONL file.
///
/// A read error is yielded once and ends the stream.
pub async fn read_lines(path: &Path) -> std::io::Result<impl Stream<Item = Line>> {
    let file = File::open(path).await?;
    let lines = BufReader::new(file).lines();

    let stream = stream::unfold(Some((lines, 0usize)), |state| async move {
        let (mut lines, number) = state?;
        let number = number + 1;
        match lines.next_line().await {
            Ok(Some(text)) => Some((
                Line {
                    number,
                    text: Ok(text),
                },
                Some((lines, number)),
            )),
            Ok(None) => None,
            Err(e) => Some((
                Line {
                    number,
                    text: Err(e),
                },
                None,
            )),
        }
    })
    .filter(|line| {
        let blank = matches!(&line.text, Ok(text) if text.trim().is_empty());
        futures::future::ready(!blank)
    });
    Ok(stream)
}

/// Parse one line into a point.
pub fn parse_point(line: Line) -> Result<Point, MappingError> {
    let text = line
        .text
        .map_err(|e| MappingError::new(format!("line {}: {}", line.number, e)))?;
    serde_json::from_str(&text)
        .map_err(|e| MappingError::new(format!("line {}: {}", line.number, e)))
}
