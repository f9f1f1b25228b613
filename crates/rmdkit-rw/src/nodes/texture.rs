//! Texture dictionary and texture native structs.
//!
//! A texture native node holds two struct children that share the same tag:
//! the first is the [`TextureStruct`], the second a raster struct which in
//! turn holds a [`RasterInfo`] struct followed by the raw raster data.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Platform id of PS2 texture natives (`"PS2\0"`).
pub const PLATFORM_PS2: u32 = u32::from_le_bytes(*b"PS2\0");

/// Struct of a texture dictionary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(C)]
pub struct TextureDictionaryStruct {
    pub texture_count: u16,
    pub device_id: u16,
}

/// First struct of a texture native.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(C)]
pub struct TextureStruct {
    pub platform_id: u32,
    /// Filter mode in the low byte, addressing in the next.
    pub filter_and_addressing: u32,
}

impl Default for TextureStruct {
    fn default() -> Self {
        Self {
            platform_id: PLATFORM_PS2,
            filter_and_addressing: 0,
        }
    }
}

impl TextureStruct {
    pub fn filter(&self) -> u8 {
        (self.filter_and_addressing & 0xFF) as u8
    }

    pub fn addressing(&self) -> u8 {
        ((self.filter_and_addressing >> 8) & 0xFF) as u8
    }
}

/// Raster description of a PS2 texture native, including the GS registers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(C)]
pub struct RasterInfo {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub raster_format: u32,
    pub tex0: u64,
    pub tex1: u64,
    pub miptbp1: u64,
    pub miptbp2: u64,
    pub pixel_data_size: u32,
    pub palette_data_size: u32,
    pub gpu_aligned_size: u32,
    pub sky_mipmap_value: u32,
}

impl RasterInfo {
    /// Encoded size.
    pub const SIZE: usize = 64;

    /// Whether the raster carries a palette.
    pub fn has_palette(&self) -> bool {
        self.palette_data_size != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layouts() {
        assert_eq!(std::mem::size_of::<RasterInfo>(), RasterInfo::SIZE);
        assert_eq!(std::mem::size_of::<TextureStruct>(), 8);
        assert_eq!(std::mem::size_of::<TextureDictionaryStruct>(), 4);
    }

    #[test]
    fn test_platform_id() {
        assert_eq!(PLATFORM_PS2, 0x0032_5350);
        let tex = TextureStruct {
            platform_id: PLATFORM_PS2,
            filter_and_addressing: 0x1106,
        };
        assert_eq!(tex.filter(), 6);
        assert_eq!(tex.addressing(), 0x11);
    }
}
