pub mod capture;
pub mod similarity;

pub use capture::{Frame, ScreenCapture, XcapCapture};
pub use similarity::{frames_similar, similarity, SIMILARITY_THRESHOLD};
