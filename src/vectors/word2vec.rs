// Reader for the word2vec binary key-vector format.
//
// Layout: an ASCII header line `<vocab_size> <dim>\n`, then for each key the
// raw key bytes terminated by a single space, followed by `dim` little-endian
// f32 components. Most writers put a newline after each record; some don't,
// so leading newlines before a key are skipped.
//
// Records are yielded in the file's native key order.

use std::io::{BufRead, ErrorKind, Read};

use anyhow::{Context, Result};

/// Largest dimension accepted from a header. Published stores top out at a
/// few thousand; anything past this is a corrupt header.
pub const MAX_DIM: usize = 10_000;

/// Longest key read before the record is treated as corrupt.
const MAX_KEY_BYTES: usize = 4096;

/// Streaming reader over a word2vec binary file.
pub struct Word2VecReader<R> {
    reader: R,
    vocab_size: usize,
    dim: usize,
    read: usize,
}

impl<R: BufRead> Word2VecReader<R> {
    /// Parse the header and position the reader on the first record.
    pub fn new(mut reader: R) -> Result<Self> {
        let mut header = String::new();
        reader
            .read_line(&mut header)
            .context("Failed to read word2vec header")?;

        let mut fields = header.split_whitespace();
        let vocab_size: usize = fields
            .next()
            .context("word2vec header is empty")?
            .parse()
            .context("word2vec header: vocabulary size is not an integer")?;
        let dim: usize = fields
            .next()
            .context("word2vec header is missing the dimension")?
            .parse()
            .context("word2vec header: dimension is not an integer")?;

        if dim == 0 {
            anyhow::bail!("word2vec header declares zero-dimensional vectors");
        }
        if dim > MAX_DIM {
            anyhow::bail!("word2vec header declares {dim} dimensions (limit {MAX_DIM})");
        }

        Ok(Self {
            reader,
            vocab_size,
            dim,
            read: 0,
        })
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    fn read_key(&mut self) -> Result<String> {
        let mut key = Vec::new();
        loop {
            let mut byte = [0u8; 1];
            self.reader
                .read_exact(&mut byte)
                .with_context(|| format!("Truncated key at record {}", self.read))?;
            match byte[0] {
                b'\n' if key.is_empty() => continue,
                b' ' => break,
                _ if key.len() >= MAX_KEY_BYTES => {
                    anyhow::bail!("Key longer than {MAX_KEY_BYTES} bytes at record {}", self.read)
                }
                b => key.push(b),
            }
        }
        Ok(String::from_utf8_lossy(&key).into_owned())
    }

    fn read_record(&mut self) -> Result<(String, Vec<f32>)> {
        let key = self.read_key()?;
        let mut buf = vec![0u8; self.dim * 4];
        self.reader
            .read_exact(&mut buf)
            .with_context(|| format!("Truncated vector for key {key:?}"))?;
        let vec = buf
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok((key, vec))
    }
}

impl<R: BufRead> Iterator for Word2VecReader<R> {
    type Item = Result<(String, Vec<f32>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.read >= self.vocab_size {
            return None;
        }
        let record = self.read_record();
        self.read += 1;
        if let Err(e) = &record {
            // A truncated stream cannot be resynchronized; stop after reporting.
            if e.downcast_ref::<std::io::Error>()
                .is_some_and(|io| io.kind() == ErrorKind::UnexpectedEof)
            {
                self.read = self.vocab_size;
            }
        }
        Some(record)
    }
}

#[cfg(test)]
pub(crate) fn encode(records: &[(&str, Vec<f32>)], trailing_newline: bool) -> Vec<u8> {
    let dim = records.first().map(|(_, v)| v.len()).unwrap_or(0);
    let mut out = format!("{} {}\n", records.len(), dim).into_bytes();
    for (key, vec) in records {
        out.extend_from_slice(key.as_bytes());
        out.push(b' ');
        for v in vec {
            out.extend_from_slice(&v.to_le_bytes());
        }
        if trailing_newline {
            out.push(b'\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_reads_records_in_order() {
        let bytes = encode(
            &[("King", vec![1.0, 2.0]), ("queen", vec![-0.5, 0.25])],
            true,
        );
        let reader = Word2VecReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.vocab_size(), 2);
        assert_eq!(reader.dim(), 2);

        let records: Vec<_> = reader.map(|r| r.unwrap()).collect();
        assert_eq!(records[0].0, "King");
        assert_eq!(records[0].1, vec![1.0, 2.0]);
        assert_eq!(records[1].0, "queen");
        assert_eq!(records[1].1, vec![-0.5, 0.25]);
    }

    #[test]
    fn test_reads_without_record_newlines() {
        let bytes = encode(&[("aa", vec![1.0]), ("bb", vec![2.0])], false);
        let records: Vec<_> = Word2VecReader::new(Cursor::new(bytes))
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].0, "bb");
    }

    #[test]
    fn test_truncated_stream_errors_once() {
        let mut bytes = encode(&[("aa", vec![1.0, 2.0]), ("bb", vec![3.0, 4.0])], true);
        bytes.truncate(bytes.len() - 3);
        let results: Vec<_> = Word2VecReader::new(Cursor::new(bytes)).unwrap().collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }

    #[test]
    fn test_bad_header() {
        assert!(Word2VecReader::new(Cursor::new(b"abc 3\n".to_vec())).is_err());
        assert!(Word2VecReader::new(Cursor::new(b"3\n".to_vec())).is_err());
    }

    #[test]
    fn test_oversized_header_dimension_is_error() {
        let header = format!("1 {}\n", usize::MAX / 2);
        let err = Word2VecReader::new(Cursor::new(header.into_bytes())).err().unwrap();
        assert!(err.to_string().contains("dimensions"), "{err}");
        assert!(Word2VecReader::new(Cursor::new(format!("1 {MAX_DIM}\n").into_bytes())).is_ok());
    }

    #[test]
    fn test_runaway_key_is_error() {
        let mut bytes = b"1 1\n".to_vec();
        bytes.extend(std::iter::repeat(b'a').take(MAX_KEY_BYTES + 10));
        let results: Vec<_> = Word2VecReader::new(Cursor::new(bytes)).unwrap().collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }
}
