//! # Anima Body
//!
//! Expressive outputs: the TFT face with screen navigation, and the
//! three-LED warm lighthouse.

pub mod face;
pub mod led;

pub use face::{
    FaceRenderer, FaceState, JoystickSample, Navigator, Screen, AUTO_RETURN_SECONDS,
};
pub use led::{
    mood_color, Color, Dance, LedFrame, Lighthouse, DEFAULT_BRIGHTNESS, DISTRESS_COLOR,
    LED_COUNT, MAX_BRIGHTNESS, MIN_RAMP_SECONDS,
};
