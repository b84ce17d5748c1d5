use super::{Chunks, ChunksError};

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    ChunksError(ChunksError),
    InvalidPayload,
}

/// A type for reading server-sent events from a chunk stream.
pub struct Sse {
    buf: Vec<u8>,
    chunks: Chunks,
}

impl Sse {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: Vec::new(),
            chunks,
        }
    }

    /// Returns the data of the next event, or `None` once the underlying
    /// stream is exhausted. An incomplete trailing event is discarded.
    pub async fn next_event(&mut self) -> Result<Option<String>, Error> {
        loop {
            // Drain what is already buffered before asking for more.
            if let Some(event) = self.try_parse_event()? {
                return Ok(Some(event));
            }

            let Some(bytes) =
                self.chunks.next_chunk().await.map_err(Error::ChunksError)?
            else {
                return Ok(None);
            };
            // Bytes are kept raw until a whole event is framed, so a
            // multi-byte character split across chunks is still valid.
            self.buf.extend_from_slice(&bytes);
        }
    }

    fn try_parse_event(&mut self) -> Result<Option<String>, Error> {
        // event         = *( comment / field ) end-of-line
        // field         = 1*name-char [ colon [ space ] *any-char ] end-of-line
        // end-of-line   = ( cr lf / lf )
        loop {
            let Some((end, sep_len)) = find_event_end(&self.buf) else {
                return Ok(None);
            };
            let block: Vec<u8> = self.buf.drain(0..end + sep_len).collect();
            let Ok(block) = std::str::from_utf8(&block[0..end]) else {
                return Err(Error::InvalidPayload);
            };

            let mut data_lines = Vec::new();
            for line in block.lines() {
                if line.is_empty() || line.starts_with(':') {
                    continue;
                }
                let Some((name, value)) = line.split_once(':') else {
                    return Err(Error::InvalidPayload);
                };
                let value = value.strip_prefix(' ').unwrap_or(value);
                match name {
                    "data" => data_lines.push(value),
                    "event" | "id" | "retry" => {}
                    _ => return Err(Error::InvalidPayload),
                }
            }

            // Comment-only blocks carry nothing, keep looking.
            if !data_lines.is_empty() {
                return Ok(Some(data_lines.join("\n")));
            }
        }
    }
}

fn find_event_end(buf: &[u8]) -> Option<(usize, usize)> {
    (0..buf.len()).find_map(|idx| {
        let rest = &buf[idx..];
        if rest.starts_with(b"\n\n") {
            Some((idx, 2))
        } else if rest.starts_with(b"\r\n\r\n") {
            Some((idx, 4))
        } else {
            None
        }
    })
}
