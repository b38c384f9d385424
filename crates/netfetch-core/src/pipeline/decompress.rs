//! Response decompression (SPEC_FULL §4.10): `gzip`/`deflate` via `flate2`; `br` is explicitly
//! unsupported.

use std::io::Read;

use bytes::Bytes;
use flate2::read::{DeflateDecoder, GzDecoder};

use crate::error::{BodyError, NetfetchError, Result};

pub fn decompress(content_encoding: Option<&str>, body: Bytes) -> Result<Bytes> {
    match content_encoding.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("identity") => Ok(body),
        Some("gzip") | Some("x-gzip") => {
            let mut out = Vec::new();
            GzDecoder::new(&body[..])
                .read_to_end(&mut out)
                .map_err(|e| NetfetchError::Body(BodyError::DecompressionFailed(e.to_string())))?;
            Ok(Bytes::from(out))
        }
        Some("deflate") => {
            let mut out = Vec::new();
            DeflateDecoder::new(&body[..])
                .read_to_end(&mut out)
                .map_err(|e| NetfetchError::Body(BodyError::DecompressionFailed(e.to_string())))?;
            Ok(Bytes::from(out))
        }
        Some("br") => Err(NetfetchError::Body(BodyError::UnsupportedEncoding("br".into()))),
        Some(other) => Err(NetfetchError::Body(BodyError::UnsupportedEncoding(other.to_string()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::{DeflateEncoder, GzEncoder};
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn no_encoding_returns_body_unchanged() {
        let body = Bytes::from_static(b"hello");
        assert_eq!(decompress(None, body.clone()).unwrap(), body);
    }

    #[test]
    fn gzip_round_trips() {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(b"hello gzip").unwrap();
        let compressed = enc.finish().unwrap();
        let out = decompress(Some("gzip"), Bytes::from(compressed)).unwrap();
        assert_eq!(&*out, b"hello gzip");
    }

    #[test]
    fn deflate_round_trips() {
        let mut enc = DeflateEncoder::new(Vec::new(), Compression::default());
        enc.write_all(b"hello deflate").unwrap();
        let compressed = enc.finish().unwrap();
        let out = decompress(Some("deflate"), Bytes::from(compressed)).unwrap();
        assert_eq!(&*out, b"hello deflate");
    }

    #[test]
    fn brotli_is_explicitly_unsupported() {
        let err = decompress(Some("br"), Bytes::new()).unwrap_err();
        assert!(matches!(err, NetfetchError::Body(BodyError::UnsupportedEncoding(_))));
    }
}
