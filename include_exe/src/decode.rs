//! The streaming decode pipeline: payload text → base64 → zstd → executable bytes.
use std::io::{self, BufReader, Read};

use base64::{
    engine::{GeneralPurpose, general_purpose::STANDARD_NO_PAD},
    read::DecoderReader,
};

/// The text engine shared by the encoder and the decoder.
pub(crate) static PAYLOAD_ENGINE: GeneralPurpose = STANDARD_NO_PAD;

type Zstd<R> = zstd::stream::read::Decoder<'static, BufReader<R>>;

/// A forward-only reader over the decoded executable.
///
/// Returned by [`EmbeddedArtifact::open_stream`](crate::EmbeddedArtifact::open_stream).
/// Each reader owns its own pipeline; to read the executable again, open a new stream.
pub struct ExeReader<'a> {
    inner: Zstd<DecoderReader<'static, GeneralPurpose, Unfold<'a>>>,
}

impl<'a> ExeReader<'a> {
    pub(crate) fn new(payload: &'a str) -> io::Result<Self> {
        let text = DecoderReader::new(Unfold::new(payload.as_bytes()), &PAYLOAD_ENGINE);
        let inner = zstd::stream::read::Decoder::new(text)?;
        Ok(Self { inner })
    }
}

impl Read for ExeReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl std::fmt::Debug for ExeReader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExeReader").finish_non_exhaustive()
    }
}

/// Reads payload text with the cosmetic line breaks removed.
struct Unfold<'a> {
    rest: &'a [u8],
}

impl<'a> Unfold<'a> {
    const fn new(text: &'a [u8]) -> Self {
        Self { rest: text }
    }
}

impl Read for Unfold<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut written = 0;
        while written < buf.len() {
            let Some((&byte, rest)) = self.rest.split_first() else {
                break;
            };
            self.rest = rest;
            if !byte.is_ascii_whitespace() {
                buf[written] = byte;
                written += 1;
            }
        }
        Ok(written)
    }
}
