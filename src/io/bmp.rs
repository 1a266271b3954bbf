use std::io::{self, Write};

use byteorder::{LittleEndian, WriteBytesExt};

use crate::dsp::color::Rgba8;

const FILE_HEADER_SIZE: u32 = 14;
const DIB_HEADER_SIZE: u32 = 108;
const PIXEL_ARRAY_OFFSET: u32 = FILE_HEADER_SIZE + DIB_HEADER_SIZE;

/// Writes `pixels` (row-major, top-to-bottom, `width * height` long) as a
/// 32-bit BGRA, `BI_BITFIELDS`-compressed BMP with a 108-byte DIB header —
/// byte-compatible with any compliant BMP reader.
pub fn write<W: Write>(writer: &mut W, width: u32, height: u32, pixels: &[Rgba8]) -> io::Result<()> {
    assert_eq!(pixels.len(), (width as usize) * (height as usize));

    let row_bytes = width * 4;
    let pixel_array_size = row_bytes * height;
    let file_size = PIXEL_ARRAY_OFFSET + pixel_array_size;

    // File header.
    writer.write_u8(b'B')?;
    writer.write_u8(b'M')?;
    writer.write_u32::<LittleEndian>(file_size)?;
    writer.write_u16::<LittleEndian>(0)?; // reserved1
    writer.write_u16::<LittleEndian>(0)?; // reserved2
    writer.write_u32::<LittleEndian>(PIXEL_ARRAY_OFFSET)?;

    // DIB header (BITMAPV4-style, 108 bytes).
    writer.write_u32::<LittleEndian>(DIB_HEADER_SIZE)?;
    writer.write_i32::<LittleEndian>(width as i32)?;
    writer.write_i32::<LittleEndian>(height as i32)?;
    writer.write_u16::<LittleEndian>(1)?; // colour planes
    writer.write_u16::<LittleEndian>(32)?; // bits per pixel
    writer.write_u32::<LittleEndian>(0x03)?; // BI_BITFIELDS
    writer.write_u32::<LittleEndian>(pixel_array_size)?;
    writer.write_i32::<LittleEndian>(2835)?; // horizontal resolution, px/m
    writer.write_i32::<LittleEndian>(2835)?; // vertical resolution, px/m
    writer.write_u32::<LittleEndian>(0)?; // palette colour count
    writer.write_u32::<LittleEndian>(0)?; // important colour count
    writer.write_u32::<LittleEndian>(0x00FF_0000)?; // red mask
    writer.write_u32::<LittleEndian>(0x0000_FF00)?; // green mask
    writer.write_u32::<LittleEndian>(0x0000_00FF)?; // blue mask
    writer.write_u32::<LittleEndian>(0xFF00_0000)?; // alpha mask

    // Pixel array: bottom-to-top rows, BGRA bytes.
    for y in (0..height as usize).rev() {
        let row = &pixels[y * width as usize..(y + 1) * width as usize];
        for px in row {
            writer.write_u8(px.b)?;
            writer.write_u8(px.g)?;
            writer.write_u8(px.r)?;
            writer.write_u8(px.a)?;
        }
    }
    Ok(())
}
