//! Fixture builders shared by the integration tests.
//!
//! Nothing is checked in: array frames are written with a minimal `.npy`
//! writer and videos are encoded on the fly with FFmpeg's MPEG-4 Part 2
//! encoder. Video tests skip themselves when that encoder is unavailable.

#![allow(dead_code)]

use std::path::Path;

use ffmpeg_next::{
    Packet, Rational,
    codec::{Id, context::Context as CodecContext},
    format::{Flags as FormatFlags, Pixel},
    frame::Video as VideoFrame,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};

/// Write a version 1.0 `.npy` file.
pub fn write_npy(path: &Path, descr: &str, shape: &[usize], payload: &[u8]) {
    let dims: Vec<String> = shape.iter().map(usize::to_string).collect();
    let shape_text = if dims.len() == 1 {
        format!("({},)", dims[0])
    } else {
        format!("({})", dims.join(", "))
    };
    let mut header =
        format!("{{'descr': '{descr}', 'fortran_order': False, 'shape': {shape_text}, }}");
    while (10 + header.len() + 1) % 64 != 0 {
        header.push(' ');
    }
    header.push('\n');

    let mut bytes = b"\x93NUMPY\x01\x00".to_vec();
    bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
    bytes.extend_from_slice(header.as_bytes());
    bytes.extend_from_slice(payload);
    std::fs::write(path, bytes).expect("Failed to write .npy fixture");
}

/// Write a `uint8` array filled with `value`.
pub fn write_u8_frame(path: &Path, shape: &[usize], value: u8) {
    let len = shape.iter().product();
    write_npy(path, "|u1", shape, &vec![value; len]);
}

/// Write a little-endian `float32` array whose values come from `value_at`
/// in C order.
pub fn write_f32_frame(path: &Path, shape: &[usize], value_at: impl Fn(usize) -> f32) {
    let len: usize = shape.iter().product();
    let payload: Vec<u8> = (0..len).flat_map(|i| value_at(i).to_le_bytes()).collect();
    write_npy(path, "<f4", shape, &payload);
}

/// Encode `frame_count` solid-colour frames of `width`x`height` at 25 fps.
///
/// Returns `None` when the encoder or muxer is unavailable so the caller can
/// skip.
pub fn encode_test_video(path: &Path, width: u32, height: u32, frame_count: usize) -> Option<()> {
    const FPS: i32 = 25;

    ffmpeg_next::init().ok()?;
    let mut output = ffmpeg_next::format::output(path).ok()?;
    let needs_global_header = output.format().flags().contains(FormatFlags::GLOBAL_HEADER);

    let codec = ffmpeg_next::encoder::find(Id::MPEG4)?;
    let mut stream = output.add_stream(codec).ok()?;
    let stream_index = stream.index();

    let mut encoder = CodecContext::from_parameters(stream.parameters())
        .ok()?
        .encoder()
        .video()
        .ok()?;
    encoder.set_width(width);
    encoder.set_height(height);
    encoder.set_format(Pixel::YUV420P);
    encoder.set_time_base(Rational::new(1, FPS));
    encoder.set_frame_rate(Some(Rational::new(FPS, 1)));
    if needs_global_header {
        unsafe {
            (*encoder.as_mut_ptr()).flags |= ffmpeg_sys_next::AV_CODEC_FLAG_GLOBAL_HEADER as i32;
        }
    }

    let mut encoder = encoder.open_as(codec).ok()?;
    stream.set_parameters(&encoder);
    output.write_header().ok()?;
    let stream_time_base = output.stream(stream_index)?.time_base();

    let mut scaler = ScalingContext::get(
        Pixel::RGB24,
        width,
        height,
        Pixel::YUV420P,
        width,
        height,
        ScalingFlags::BILINEAR,
    )
    .ok()?;

    for index in 0..frame_count {
        let shade = (40 + index * 60 % 200) as u8;
        let mut rgb_frame = VideoFrame::new(Pixel::RGB24, width, height);
        let stride = rgb_frame.stride(0);
        let data = rgb_frame.data_mut(0);
        for y in 0..height as usize {
            for x in 0..width as usize {
                let at = y * stride + x * 3;
                data[at..at + 3].copy_from_slice(&[shade, 255 - shade, 128]);
            }
        }

        let mut yuv_frame = VideoFrame::empty();
        scaler.run(&rgb_frame, &mut yuv_frame).ok()?;
        yuv_frame.set_pts(Some(index as i64));

        encoder.send_frame(&yuv_frame).ok()?;
        let mut packet = Packet::empty();
        while encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(stream_index);
            packet.rescale_ts(Rational::new(1, FPS), stream_time_base);
            packet.write_interleaved(&mut output).ok()?;
        }
    }

    encoder.send_eof().ok()?;
    let mut packet = Packet::empty();
    while encoder.receive_packet(&mut packet).is_ok() {
        packet.set_stream(stream_index);
        packet.rescale_ts(Rational::new(1, FPS), stream_time_base);
        packet.write_interleaved(&mut output).ok()?;
    }
    output.write_trailer().ok()?;
    Some(())
}

/// Number of entries directly inside `directory`.
pub fn entry_count(directory: &Path) -> usize {
    std::fs::read_dir(directory)
        .expect("Failed to list directory")
        .count()
}

/// Cut an AVI file halfway through its frame data.
///
/// The header, including the stored frame count, stays intact; the index
/// and the later frames are lost. Returns `None` if the chunk layout is not
/// recognised.
pub fn truncate_avi(path: &Path) -> Option<()> {
    let bytes = std::fs::read(path).ok()?;
    let find = |tag: &[u8]| bytes.windows(tag.len()).position(|window| window == tag);
    let frames_start = find(b"movi")? + 4;
    let index_start = find(b"idx1")?;
    if index_start <= frames_start {
        return None;
    }
    let cut = frames_start + (index_start - frames_start) / 2;
    std::fs::write(path, &bytes[..cut]).ok()
}
