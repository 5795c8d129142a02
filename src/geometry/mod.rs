pub mod contour;
pub mod util;
