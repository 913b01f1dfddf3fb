//! Launch formation geometry.
//!
//! A master launching a squad places each member at an offset that is a pure
//! function of its squad index, the launch facing, and the configured squad
//! offset. Facings use the classic 256-unit circle, quantized to the number
//! of steps the unit type supports.

use crate::cell::CellPos;

/// Full circle in facing units.
pub const FACING_FULL: u32 = 256;

/// Map a step index in `0..quantized` onto the 256-unit facing circle.
pub fn quantize_facing(step: u32, quantized: u32) -> u32 {
    if quantized == 0 {
        return 0;
    }
    (FACING_FULL * (step % quantized)) / quantized
}

/// Rotate an (x, y) cell offset by a facing on the 256-unit circle.
pub fn rotate_offset(dx: i32, dy: i32, facing: u32) -> (i32, i32) {
    let angle = (facing % FACING_FULL) as f32 * std::f32::consts::TAU / FACING_FULL as f32;
    let (sin, cos) = angle.sin_cos();
    let rx = dx as f32 * cos - dy as f32 * sin;
    let ry = dx as f32 * sin + dy as f32 * cos;
    (rx.round() as i32, ry.round() as i32)
}

/// Spawn offset for squad member `index` (centered: -n/2..=n/2), launched at
/// `facing` with the configured squad offset.
///
/// Lateral spread comes from the offset's y component, fall-back distance
/// from its x component, mirroring symmetrically around the squad center.
pub fn squad_offset(index: i32, facing: u32, offset: (i32, i32)) -> (i32, i32) {
    let (ox, oy) = offset;
    rotate_offset(index * oy, -index.abs() * ox, facing)
}

/// The cell a squad member spawns into.
pub fn spawn_cell(center: CellPos, index: i32, facing: u32, offset: (i32, i32)) -> CellPos {
    let (dx, dy) = squad_offset(index, facing, offset);
    center.offset(dx, dy)
}
