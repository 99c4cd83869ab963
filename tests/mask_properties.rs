//! Properties that must hold for arbitrary masks

use garment_cutout::{
    area_ratio, clean_mask, cutout_rgba, fill_holes, tight_bbox, BgrImage, SegmentationMask,
};
use proptest::prelude::*;

/// Arbitrary mask up to 24x24 with any byte values
fn any_mask() -> impl Strategy<Value = SegmentationMask> {
    (1u32..24, 1u32..24).prop_flat_map(|(w, h)| {
        proptest::collection::vec(any::<u8>(), (w * h) as usize)
            .prop_map(move |data| SegmentationMask::new(data, (w, h)))
    })
}

/// Arbitrary binary mask up to 24x24
fn binary_mask() -> impl Strategy<Value = SegmentationMask> {
    (1u32..24, 1u32..24).prop_flat_map(|(w, h)| {
        proptest::collection::vec(prop_oneof![Just(0u8), Just(255u8)], (w * h) as usize)
            .prop_map(move |data| SegmentationMask::new(data, (w, h)))
    })
}

fn kernel() -> impl Strategy<Value = u32> {
    prop_oneof![Just(1u32), Just(3), Just(5), Just(7)]
}

fn blur() -> impl Strategy<Value = u32> {
    prop_oneof![Just(0u32), Just(1), Just(3), Just(5), Just(7), Just(9)]
}

proptest! {
    #[test]
    fn clean_mask_output_is_binary(mask in any_mask(), k in kernel(), b in blur()) {
        let cleaned = clean_mask(&mask, k, b);
        prop_assert_eq!(cleaned.dimensions, mask.dimensions);
        prop_assert!(cleaned.data.iter().all(|&v| v == 0 || v == 255));
    }

    #[test]
    fn fill_holes_is_binary_and_never_shrinks(mask in any_mask()) {
        let filled = fill_holes(&mask);
        prop_assert!(filled.data.iter().all(|&v| v == 0 || v == 255));
        prop_assert!(filled.count_nonzero() >= mask.count_nonzero());
    }

    #[test]
    fn fill_holes_is_idempotent(mask in binary_mask()) {
        let once = fill_holes(&mask);
        prop_assert_eq!(fill_holes(&once), once);
    }

    #[test]
    fn area_ratio_is_a_fraction(mask in any_mask()) {
        let ratio = area_ratio(&mask);
        prop_assert!((0.0..=1.0).contains(&ratio));
    }

    #[test]
    fn tight_bbox_encloses_and_is_minimal(mask in binary_mask()) {
        prop_assume!(mask.count_nonzero() > 0);
        let bbox = tight_bbox(&mask).unwrap();
        let (w, h) = mask.dimensions;
        prop_assert!(bbox.fits_within(w, h));

        let [bx, by, bw, bh] = bbox.to_xywh();
        for y in 0..h {
            for x in 0..w {
                if mask.get(x, y) != 0 {
                    prop_assert!(bbox.contains(x, y));
                }
            }
        }
        // Each edge touches a foreground pixel
        prop_assert!((by..by + bh).any(|y| mask.get(bx, y) != 0));
        prop_assert!((by..by + bh).any(|y| mask.get(bx + bw - 1, y) != 0));
        prop_assert!((bx..bx + bw).any(|x| mask.get(x, by) != 0));
        prop_assert!((bx..bx + bw).any(|x| mask.get(x, by + bh - 1) != 0));
    }

    #[test]
    fn cutout_alpha_is_mask_and_channels_swap(
        (mask, pixels) in any_mask().prop_flat_map(|m| {
            let len = m.area() * 3;
            (Just(m), proptest::collection::vec(any::<u8>(), len))
        })
    ) {
        let (w, h) = mask.dimensions;
        let image = BgrImage::from_raw(w, h, pixels.clone()).unwrap();
        let cutout = cutout_rgba(&image, &mask).unwrap();

        for (i, pixel) in cutout.pixels().enumerate() {
            prop_assert_eq!(pixel.0[0], pixels[i * 3 + 2]);
            prop_assert_eq!(pixel.0[1], pixels[i * 3 + 1]);
            prop_assert_eq!(pixel.0[2], pixels[i * 3]);
            prop_assert_eq!(pixel.0[3], mask.data[i]);
        }
    }
}
