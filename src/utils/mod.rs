pub mod geo;
pub mod token;

pub use geo::{Coordinates, distance_km};
pub use token::{TOKEN_LEN, generate_redemption_token, normalize_token};
