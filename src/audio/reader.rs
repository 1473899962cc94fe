//! Decoding of raw signed 16-bit little-endian mono PCM.

use std::io::{self, BufReader, Read};

use anyhow::{bail, Context};
use byteorder::{LittleEndian, ReadBytesExt};

/// Sequential sample source over any byte stream.
pub struct SampleReader<R: Read> {
    inner: BufReader<R>,
    samples_read: u64,
}

impl<R: Read> SampleReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
            samples_read: 0,
        }
    }

    /// Samples successfully decoded so far.
    #[cfg(test)]
    pub fn samples_read(&self) -> u64 {
        self.samples_read
    }

    /// Read the next sample. End of stream is an error: without audio there
    /// is nothing left to decide on.
    pub fn next_sample(&mut self) -> anyhow::Result<i16> {
        match self.inner.read_i16::<LittleEndian>() {
            Ok(sample) => {
                self.samples_read += 1;
                Ok(sample)
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                bail!("audio stream ended after {} samples", self.samples_read)
            }
            Err(e) => Err(e).context("error reading next sample"),
        }
    }
}
