//! Tests for rect-addressed working buffers.

use std::collections::HashSet;

use super::*;

#[test]
fn test_stride_is_padded_to_alignment() {
    let layout = BufferLayout::new(Rect::new(0, 0, 5, 3), 4);
    assert_eq!(layout.width(), 5);
    assert_eq!(layout.stride(), 8);
    assert_eq!(layout.len(), 24);

    let unaligned = BufferLayout::new(Rect::new(0, 0, 5, 3), 1);
    assert_eq!(unaligned.stride(), 5);
    assert_eq!(unaligned.len(), 15);
}

#[test]
fn test_index_is_relative_to_rect_origin() {
    let layout = BufferLayout::new(Rect::new(10, 20, 15, 23), DEFAULT_ROW_ALIGNMENT);
    // stride = align_up(5, 4) = 8
    assert_eq!(layout.index(10, 20), 0);
    assert_eq!(layout.index(14, 20), 4);
    assert_eq!(layout.index(10, 21), 8);
    assert_eq!(layout.index(12, 22), 18); // 2 * 8 + 2
}

#[test]
fn test_index_is_injective_and_in_range() {
    for rect in [
        Rect::new(0, 0, 1, 1),
        Rect::new(-3, 2, 4, 9),
        Rect::new(7, 7, 20, 11),
    ] {
        for alignment in [1, 4, 16] {
            let layout = BufferLayout::new(rect, alignment);
            let mut seen = HashSet::new();
            for (x, y) in rect.pixels() {
                let idx = layout.index(x, y);
                assert!(idx < layout.len(), "index {idx} out of {}", layout.len());
                assert!(seen.insert(idx), "duplicate index {idx} at ({x}, {y})");
            }
            assert_eq!(seen.len(), (rect.width() * rect.height()) as usize);
        }
    }
}

#[test]
#[should_panic(expected = "buffer rect must not be empty")]
fn test_empty_rect_panics() {
    BufferLayout::new(Rect::new(3, 3, 3, 8), 4);
}

#[test]
fn test_layers_are_separated_by_layer_len() {
    let layout = BufferLayout::new(Rect::new(0, 0, 3, 2), 4);
    let mut buffer: RectBuffer<f32> = RectBuffer::new_layered(layout, 2);
    assert_eq!(buffer.layer_offset(), 8);
    assert_eq!(buffer.pixels().len(), 16);

    let idx = layout.index(2, 1);
    {
        let (a, b) = buffer.halves_mut();
        a[idx] = 1.0;
        b[idx] = 2.0;
    }
    assert_eq!(buffer.pixels()[idx], 1.0);
    assert_eq!(buffer.pixels()[idx + buffer.layer_offset()], 2.0);
    assert_eq!(buffer.layer(1)[idx], 2.0);
}

#[test]
#[should_panic(expected = "halves require a two-layer buffer")]
fn test_halves_on_single_layer_panics() {
    let layout = BufferLayout::new(Rect::new(0, 0, 2, 2), 4);
    let buffer: RectBuffer<f32> = RectBuffer::new_default(layout);
    let _ = buffer.halves();
}

#[test]
#[should_panic(expected = "pixels length must equal stride * height * layers")]
fn test_from_vec_size_mismatch_panics() {
    let layout = BufferLayout::new(Rect::new(0, 0, 3, 3), 4);
    RectBuffer::from_vec(layout, 1, vec![0.0f32; 9]);
}

#[test]
fn test_from_fn_leaves_padding_default() {
    let layout = BufferLayout::new(Rect::new(1, 1, 3, 3), 4);
    let buffer = RectBuffer::from_fn(layout, |x, y| (x * 10 + y) as f32);
    assert_eq!(buffer[(1, 1)], 11.0);
    assert_eq!(buffer[(2, 2)], 22.0);
    // Row 0 padding: columns 2 and 3
    assert_eq!(buffer.pixels()[2], 0.0);
    assert_eq!(buffer.pixels()[3], 0.0);
}

#[test]
fn test_index_tuple_roundtrip() {
    let layout = BufferLayout::new(Rect::new(-2, -2, 2, 2), 4);
    let mut buffer = RectBuffer::new_filled(layout, 0u8);
    buffer[(-2, 1)] = 9;
    assert_eq!(*buffer.get(-2, 1), 9);
    assert_eq!(buffer.pixels()[layout.index(-2, 1)], 9);
}
