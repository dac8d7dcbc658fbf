use image::Rgb;

use crate::background::PreparedBackground;
use crate::segmentation::Mask;
use crate::video::types::Frame;

/// Combine a frame with its background replacement
///
/// Pixels where `mask` is foreground come from `frame`; all others come from
/// `background`. The caller guarantees that `frame`, `mask` and an image
/// background share the same dimensions.
pub fn composite(frame: &Frame, mask: &Mask, background: &PreparedBackground) -> Frame {
    debug_assert_eq!(frame.dimensions(), mask.dimensions());

    let mut output = frame.as_image().clone();
    let keep = mask.as_slice();

    match background {
        PreparedBackground::Transparent => {
            for (pixel, _) in output.pixels_mut().zip(keep).filter(|&(_, &k)| !k) {
                *pixel = Rgb([0, 0, 0]);
            }
        }
        PreparedBackground::SolidColor(color) => {
            for (pixel, _) in output.pixels_mut().zip(keep).filter(|&(_, &k)| !k) {
                *pixel = Rgb(*color);
            }
        }
        PreparedBackground::Image(image) => {
            debug_assert_eq!(image.dimensions(), frame.dimensions());
            for ((pixel, backdrop), _) in output
                .pixels_mut()
                .zip(image.pixels())
                .zip(keep)
                .filter(|&(_, &k)| !k)
            {
                *pixel = *backdrop;
            }
        }
    }

    Frame::new(output)
}
