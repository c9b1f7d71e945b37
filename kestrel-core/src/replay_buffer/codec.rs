//! Lossless compression of single frames.
use crate::{error::KestrelError, FrameShape};
use image::{
    codecs::png::{PngDecoder, PngEncoder},
    ColorType, ImageDecoder,
};
use serde::{Deserialize, Serialize};

/// Encoding of frames kept in the replay store.
///
/// Every variant is lossless and deterministic: decoding the output of
/// [`FrameCodec::encode`] restores the frame byte for byte.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy)]
pub enum FrameCodec {
    /// PNG with an 8-bit luma channel.
    Png,

    /// `(run length, value)` byte pairs. Compact for flat-coloured game screens.
    RunLength,

    /// No compression.
    Raw,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::RunLength
    }
}

impl FrameCodec {
    /// Compresses a frame.
    pub fn encode(&self, frame: &[u8], shape: FrameShape) -> Result<Vec<u8>, KestrelError> {
        if frame.len() != shape.len() {
            return Err(KestrelError::FrameSize {
                expected: shape.len(),
                actual: frame.len(),
            });
        }

        match self {
            Self::Png => encode_png(frame, shape),
            Self::RunLength => Ok(encode_run_length(frame)),
            Self::Raw => Ok(frame.to_vec()),
        }
    }

    /// Restores a frame into `out`, which must have the size of `shape`.
    ///
    /// Fails with [`KestrelError::DecodeCorruption`] if `bytes` does not describe
    /// a frame of exactly that size.
    pub fn decode(&self, bytes: &[u8], shape: FrameShape, out: &mut [u8]) -> Result<(), KestrelError> {
        if out.len() != shape.len() {
            return Err(KestrelError::FrameSize {
                expected: shape.len(),
                actual: out.len(),
            });
        }

        match self {
            Self::Png => decode_png(bytes, shape, out),
            Self::RunLength => decode_run_length(bytes, out),
            Self::Raw => {
                if bytes.len() != out.len() {
                    return Err(KestrelError::DecodeCorruption(format!(
                        "raw frame of {} bytes, expected {}",
                        bytes.len(),
                        out.len()
                    )));
                }
                out.copy_from_slice(bytes);
                Ok(())
            }
        }
    }
}

fn encode_png(frame: &[u8], shape: FrameShape) -> Result<Vec<u8>, KestrelError> {
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf)
        .encode(frame, shape.width as u32, shape.height as u32, ColorType::L8)
        .map_err(|e| KestrelError::FrameEncoding(e.to_string()))?;
    Ok(buf)
}

fn decode_png(bytes: &[u8], shape: FrameShape, out: &mut [u8]) -> Result<(), KestrelError> {
    let corrupt = |e: image::ImageError| KestrelError::DecodeCorruption(e.to_string());
    let decoder = PngDecoder::new(bytes).map_err(corrupt)?;
    let (width, height) = decoder.dimensions();

    if decoder.color_type() != ColorType::L8
        || width as usize != shape.width
        || height as usize != shape.height
    {
        return Err(KestrelError::DecodeCorruption(format!(
            "png image {}x{} {:?}, expected {}x{} L8",
            width,
            height,
            decoder.color_type(),
            shape.width,
            shape.height
        )));
    }

    decoder.read_image(out).map_err(corrupt)
}

fn encode_run_length(frame: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut iter = frame.iter().copied();

    if let Some(first) = iter.next() {
        let (mut value, mut run) = (first, 1u8);
        for p in iter {
            if p == value && run < u8::MAX {
                run += 1;
            } else {
                buf.push(run);
                buf.push(value);
                value = p;
                run = 1;
            }
        }
        buf.push(run);
        buf.push(value);
    }

    buf
}

fn decode_run_length(bytes: &[u8], out: &mut [u8]) -> Result<(), KestrelError> {
    if bytes.len() % 2 != 0 {
        return Err(KestrelError::DecodeCorruption(
            "truncated run-length pair".to_string(),
        ));
    }

    let mut pos = 0;
    for pair in bytes.chunks_exact(2) {
        let (run, value) = (pair[0] as usize, pair[1]);
        if run == 0 || pos + run > out.len() {
            return Err(KestrelError::DecodeCorruption(format!(
                "run of {} at offset {} overflows a frame of {} bytes",
                run,
                pos,
                out.len()
            )));
        }
        out[pos..pos + run].iter_mut().for_each(|p| *p = value);
        pos += run;
    }

    if pos != out.len() {
        return Err(KestrelError::DecodeCorruption(format!(
            "decoded {} bytes, expected {}",
            pos,
            out.len()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // A frame with flat areas and some noise.
    fn test_frame(shape: FrameShape) -> Vec<u8> {
        (0..shape.len())
            .map(|i| if i % 97 < 60 { 0 } else { (i * 31 % 251) as u8 })
            .collect()
    }

    #[test]
    fn test_codecs_are_lossless() {
        let shape = FrameShape::new(84, 84);
        let frame = test_frame(shape);

        for codec in [FrameCodec::Png, FrameCodec::RunLength, FrameCodec::Raw] {
            let bytes = codec.encode(&frame, shape).unwrap();
            let mut out = vec![0u8; shape.len()];
            codec.decode(&bytes, shape, &mut out).unwrap();
            assert_eq!(out, frame, "{:?}", codec);
        }
    }

    #[test]
    fn test_run_length_compresses_flat_frames() {
        let shape = FrameShape::new(84, 84);
        let frame = vec![17u8; shape.len()];
        let bytes = FrameCodec::RunLength.encode(&frame, shape).unwrap();
        // 7056 = 27 * 255 + 171
        assert_eq!(bytes.len(), 2 * 28);
    }

    #[test]
    fn test_truncated_bytes_are_reported_as_corruption() {
        let shape = FrameShape::new(10, 10);
        let frame = test_frame(shape);
        let mut out = vec![0u8; shape.len()];

        for codec in [FrameCodec::Png, FrameCodec::RunLength, FrameCodec::Raw] {
            let bytes = codec.encode(&frame, shape).unwrap();
            let truncated = &bytes[..bytes.len() / 2];
            match codec.decode(truncated, shape, &mut out) {
                Err(KestrelError::DecodeCorruption(_)) => {}
                r => panic!("{:?}: unexpected {:?}", codec, r),
            }
        }
    }

    #[test]
    fn test_wrong_frame_size_is_rejected() {
        let shape = FrameShape::new(4, 4);
        assert_eq!(
            FrameCodec::RunLength.encode(&[0u8; 15], shape),
            Err(KestrelError::FrameSize {
                expected: 16,
                actual: 15
            })
        );
    }
}
