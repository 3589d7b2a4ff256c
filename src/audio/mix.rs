// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
// Saturating additive mixing of encoded PCM. Runs on the render thread, so
// nothing in here allocates.

use super::format::SampleEncoding;

/// Full-scale volume. Volumes are expressed in 1/128ths.
pub const MAX_VOLUME: i32 = 128;

/// Mixes `src` into `dst`, scaling `src` by `volume / MAX_VOLUME` and clamping
/// each summed sample to the encoding's range.
///
/// Only whole samples are mixed; a trailing partial sample is ignored. If the
/// slices differ in length the shorter one bounds the mix.
pub fn mix_audio(dst: &mut [u8], src: &[u8], encoding: SampleEncoding, volume: i32) {
    if volume <= 0 {
        return;
    }
    let volume = volume.min(MAX_VOLUME);
    let len = dst.len().min(src.len());
    let (dst, src) = (&mut dst[..len], &src[..len]);

    match encoding {
        SampleEncoding::U8 => mix_u8(dst, src, volume),
        SampleEncoding::S16 => mix_s16(dst, src, volume),
        SampleEncoding::S32 => mix_s32(dst, src, volume),
        SampleEncoding::F32 => mix_f32(dst, src, volume),
    }
}

fn mix_u8(dst: &mut [u8], src: &[u8], volume: i32) {
    for (d, &s) in dst.iter_mut().zip(src) {
        let scaled = ((s as i32 - 128) * volume) / MAX_VOLUME;
        let mixed = (scaled + (*d as i32 - 128)).clamp(-128, 127);
        *d = (mixed + 128) as u8;
    }
}

fn mix_s16(dst: &mut [u8], src: &[u8], volume: i32) {
    for (d, s) in dst.chunks_exact_mut(2).zip(src.chunks_exact(2)) {
        let s = i16::from_le_bytes([s[0], s[1]]) as i32;
        let current = i16::from_le_bytes([d[0], d[1]]) as i32;
        let mixed = ((s * volume) / MAX_VOLUME + current).clamp(i16::MIN as i32, i16::MAX as i32);
        d.copy_from_slice(&(mixed as i16).to_le_bytes());
    }
}

fn mix_s32(dst: &mut [u8], src: &[u8], volume: i32) {
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let s = i32::from_le_bytes([s[0], s[1], s[2], s[3]]) as i64;
        let current = i32::from_le_bytes([d[0], d[1], d[2], d[3]]) as i64;
        let mixed = ((s * volume as i64) / MAX_VOLUME as i64 + current)
            .clamp(i32::MIN as i64, i32::MAX as i64);
        d.copy_from_slice(&(mixed as i32).to_le_bytes());
    }
}

fn mix_f32(dst: &mut [u8], src: &[u8], volume: i32) {
    let gain = volume as f32 / MAX_VOLUME as f32;
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let s = f32::from_le_bytes([s[0], s[1], s[2], s[3]]);
        let current = f32::from_le_bytes([d[0], d[1], d[2], d[3]]);
        let mixed = (s * gain + current).clamp(-1.0, 1.0);
        d.copy_from_slice(&mixed.to_le_bytes());
    }
}
